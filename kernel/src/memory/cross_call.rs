//! Abstract remote-call interface for detaching an address space from every
//! CPU that still has it loaded.
//!
//! On real SMP hardware this would post an IPI to each remote core, have it
//! switch off the doomed address space (onto the idle/kernel space) and
//! invalidate its TLB, then wait for all of them to acknowledge before
//! returning. This crate slice doesn't model cores or an IPI transport, so
//! `detach_all_cpus` is a single-CPU stand-in: it flushes the local TLB and
//! returns. A real implementation slots in at this call site without
//! changing `destroy()`'s control flow.

use super::address_space::AddressSpace;
use super::tlb;

/// Detach `space` from every CPU currently referencing it. Must be called
/// before a refcount recheck in `AddressSpace::destroy()`; on return no CPU
/// this stub knows about still has `space` loaded.
pub fn detach_all_cpus(space: &AddressSpace) {
    let _ = space;
    tlb::flush_all();
}
