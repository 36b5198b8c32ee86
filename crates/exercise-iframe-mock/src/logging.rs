//! Capturing `log` backend for assertions on logged errors.
//!
//! Records are kept per thread, so tests running in parallel do not see each
//! other's output.

use std::cell::RefCell;
use std::sync::Once;

use log::{Level, LevelFilter, Log, Metadata, Record};

thread_local! {
    static RECORDS: RefCell<Vec<(Level, String)>> = const { RefCell::new(Vec::new()) };
}

struct CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let line = record.args().to_string();
        RECORDS.with(|records| records.borrow_mut().push((record.level(), line)));
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;
static INIT: Once = Once::new();

/// Start capturing log records on the current thread.
///
/// Installs the capturing logger on first use and clears anything this
/// thread logged before.
pub fn capture_logs() -> LogCapture {
    INIT.call_once(|| {
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(LevelFilter::Trace);
        }
    });
    RECORDS.with(|records| records.borrow_mut().clear());
    LogCapture { _private: () }
}

/// View of the records captured on the current thread.
pub struct LogCapture {
    _private: (),
}

impl LogCapture {
    /// All captured records, oldest first
    pub fn records(&self) -> Vec<(Level, String)> {
        RECORDS.with(|records| records.borrow().clone())
    }

    /// Check if any message containing `needle` was logged
    pub fn has_log_containing(&self, needle: &str) -> bool {
        self.count_containing(None, needle) > 0
    }

    /// Check if an error containing `needle` was logged
    pub fn has_error_containing(&self, needle: &str) -> bool {
        self.count_containing(Some(Level::Error), needle) > 0
    }

    /// Count records containing `needle`, optionally at one level only
    pub fn count_containing(&self, level: Option<Level>, needle: &str) -> usize {
        RECORDS.with(|records| {
            records
                .borrow()
                .iter()
                .filter(|(l, line)| level.map_or(true, |level| *l == level) && line.contains(needle))
                .count()
        })
    }

    pub fn clear(&self) {
        RECORDS.with(|records| records.borrow_mut().clear());
    }
}
