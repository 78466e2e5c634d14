//! Kernel logger: buffers log messages until the serial port is ready, then
//! writes every record out over serial via the `log` crate's global logger.

use crate::serial_println;
use core::fmt::{self, Write};
use log::{Level, LevelFilter, Log, Metadata, Record};
use spin::Mutex;

const BUFFER_SIZE: usize = 8192;

/// Buffer for storing log messages before serial is initialized
struct LogBuffer {
    buffer: [u8; BUFFER_SIZE],
    position: usize,
}

impl LogBuffer {
    const fn new() -> Self {
        Self {
            buffer: [0; BUFFER_SIZE],
            position: 0,
        }
    }

    fn contents(&self) -> &str {
        core::str::from_utf8(&self.buffer[..self.position]).unwrap_or("<invalid UTF-8>")
    }
}

impl Write for LogBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let bytes = s.as_bytes();
        let remaining = BUFFER_SIZE - self.position;
        if bytes.len() > remaining {
            // Buffer full: drop the message rather than overflow.
            return Ok(());
        }
        self.buffer[self.position..self.position + bytes.len()].copy_from_slice(bytes);
        self.position += bytes.len();
        Ok(())
    }
}

enum LoggerState {
    /// Buffering messages until serial is ready.
    Buffering,
    /// Serial is initialized; every record goes straight out.
    SerialReady,
}

pub struct CombinedLogger {
    buffer: Mutex<LogBuffer>,
    state: Mutex<LoggerState>,
}

impl CombinedLogger {
    const fn new() -> Self {
        CombinedLogger {
            buffer: Mutex::new(LogBuffer::new()),
            state: Mutex::new(LoggerState::Buffering),
        }
    }

    /// Call this after serial is initialized to flush any buffered messages.
    pub fn serial_ready(&self) {
        let mut state = self.state.lock();
        let buffer = self.buffer.lock();

        if buffer.position > 0 {
            serial_println!("=== Buffered Boot Messages ===");
            serial_println!("{}", buffer.contents());
            serial_println!("=== End Buffered Messages ===");
        }

        *state = LoggerState::SerialReady;
    }
}

impl Log for CombinedLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Trace
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // Trace is suppressed to cut boot noise, but arguments still get
        // formatted so timing stays the same whether or not this fires.
        if record.level() == Level::Trace {
            let _ = format_args!("{}", record.args());
            return;
        }

        let level = record.level();
        let target = record.target();
        let args = record.args();

        // try_lock so a log call from interrupt context never blocks behind
        // a held lock.
        let state = match self.state.try_lock() {
            Some(state) => state,
            None => {
                serial_println!("[INTR] {}: {}", target, args);
                return;
            }
        };

        match *state {
            LoggerState::Buffering => {
                drop(state);
                match self.buffer.try_lock() {
                    Some(mut buffer) => {
                        let _ = write!(&mut *buffer, "[{:>5}] {}: {}\n", level, target, args);
                    }
                    None => serial_println!("[BUFF] {}: {}", target, args),
                }
            }
            LoggerState::SerialReady => {
                drop(state);
                serial_println!("[{:>5}] {}: {}", level, target, args);
            }
        }
    }

    fn flush(&self) {}
}

pub static COMBINED_LOGGER: CombinedLogger = CombinedLogger::new();

/// Initialize the logger early - can be called before serial is ready.
pub fn init_early() {
    log::set_logger(&COMBINED_LOGGER).expect("Logger already set");
    log::set_max_level(LevelFilter::Trace);
}

/// Call after the serial port is initialized.
pub fn serial_ready() {
    COMBINED_LOGGER.serial_ready();
}
