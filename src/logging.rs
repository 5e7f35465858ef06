//! Boot log
//!
//! Log records are written to the debug console port of the emulator when running on bare metal.
//! Hosted builds (e.g. unit tests) discard them.

use core::fmt::Write;
use log::{LevelFilter, Metadata, Record, SetLoggerError};

/// Global instance of the boot logger.
static LOGGER: BootLog = BootLog {};

/// Install the boot logger. Records above `level` are dropped.
pub fn initialize_boot_log(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER).map(|()| log::set_max_level(level))
}

struct BootLog;

impl log::Log for BootLog {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            // Nothing sensible to do if the console fails.
            let _ = write_record(&mut DebugWriter {}, record);
        }
    }

    fn flush(&self) {}
}

/// Format a single log line: level, module and message.
fn write_record(writer: &mut impl Write, record: &Record) -> core::fmt::Result {
    writeln!(
        writer,
        "[{:<5} {}] {}",
        record.level(),
        record.target(),
        record.args()
    )
}

struct DebugWriter;

impl Write for DebugWriter {
    #[cfg(all(target_os = "none", any(target_arch = "x86", target_arch = "x86_64")))]
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        crate::arch::io::Port::DEBUG_CONSOLE.write_bytes(s.as_bytes());
        Ok(())
    }

    #[cfg(not(all(target_os = "none", any(target_arch = "x86", target_arch = "x86_64"))))]
    fn write_str(&mut self, _: &str) -> core::fmt::Result {
        Ok(())
    }
}
