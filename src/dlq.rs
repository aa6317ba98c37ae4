use parking_lot::Mutex;

use crate::domain::{DeadLetterQueue, Error};

#[derive(Default, Debug)]
pub struct StdErrDLQ {}

impl DeadLetterQueue for StdErrDLQ {
    fn report(&self, error: &Error) {
        eprintln!("DLQ Report - Error: {}", error);
    }
}

/// Keeps every rejection in arrival order.
#[derive(Default, Debug)]
pub struct MemoryDLQ {
    reports: Mutex<Vec<String>>,
}

impl MemoryDLQ {
    pub fn reports(&self) -> Vec<String> {
        self.reports.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.lock().is_empty()
    }
}

impl DeadLetterQueue for MemoryDLQ {
    fn report(&self, error: &Error) {
        self.reports.lock().push(error.to_string());
    }
}
