use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Bad locus definition or malformed locus graph; fatal for the affected
    /// locus but not for the run.
    #[error("Configuration error: {0}")]
    Config(String),
    /// Malformed CIGAR or read record; the offending record is skipped.
    #[error("Parse error: {0}")]
    Parse(String),
    /// I/O failure on BAM, FASTA, or output files; propagates to the driver.
    #[error("Resource error: {0}")]
    Resource(String),
    /// Violated invariant; aborts with a diagnostic.
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

pub fn handle_error_and_exit(err: Error) -> ! {
    log::error!("{}", err);
    std::process::exit(1);
}

/// Cooperative cancellation flag shared between the driver and the workers.
/// Workers check it between reads and between candidate evaluations and
/// discard partial locus results once it is set.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_starts_clear_and_latches() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
