//! Public façade for time-related facilities.

pub mod time;

#[allow(unused_imports)]
pub use time::Time;

use core::sync::atomic::{AtomicU64, Ordering};

/// Monotonic millisecond counter, advanced by whatever timer source the
/// platform wires up (none, in this trimmed kernel — it starts at zero and
/// stays there unless a caller advances it, which is enough for inode
/// timestamps and pipe/IPC timeout math in tests).
static MONOTONIC_MILLIS: AtomicU64 = AtomicU64::new(0);

/// Unix epoch seconds at boot. Ext2 inode timestamps are stamped relative to
/// this; a platform with a working RTC would set it once at `init()` time.
static BOOT_UNIX_SECONDS: AtomicU64 = AtomicU64::new(0);

pub fn init(boot_unix_seconds: u64) {
    BOOT_UNIX_SECONDS.store(boot_unix_seconds, Ordering::SeqCst);
}

pub fn monotonic_clock() -> u64 {
    MONOTONIC_MILLIS.load(Ordering::Relaxed)
}

/// Advance the monotonic clock; called from whatever periodic source is
/// available. A no-op platform may never call this, which is fine for any
/// caller that treats a zero delta as "no time has passed".
pub fn advance_monotonic(delta_millis: u64) {
    MONOTONIC_MILLIS.fetch_add(delta_millis, Ordering::Relaxed);
}

/// Current wall-clock time as Unix seconds, used to stamp Ext2 inode
/// `atime`/`mtime`/`ctime` fields.
pub fn current_unix_time() -> u32 {
    let boot = BOOT_UNIX_SECONDS.load(Ordering::Relaxed);
    let elapsed = monotonic_clock() / 1000;
    (boot + elapsed) as u32
}
