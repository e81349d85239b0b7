//! Logging context injected into the catalog client.
//!
//! The client reports through a [`Logger`] it was constructed with instead of
//! calling the `log` macros directly, so callers decide where messages go and
//! tests can assert on exactly which messages were emitted.

#[cfg_attr(test, mockall::automock)]
pub trait Logger: Send + Sync {
    fn debug(&self, message: &str);
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// Forwards every message to the `log` facade under a fixed target.
#[derive(Debug, Clone)]
pub struct LogLogger {
    target: &'static str,
}

impl LogLogger {
    pub const DEFAULT_TARGET: &'static str = "chromedriver_downloader";

    pub fn new(target: &'static str) -> Self {
        Self { target }
    }
}

impl Default for LogLogger {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TARGET)
    }
}

impl Logger for LogLogger {
    fn debug(&self, message: &str) {
        log::debug!(target: self.target, "{}", message);
    }

    fn info(&self, message: &str) {
        log::info!(target: self.target, "{}", message);
    }

    fn warn(&self, message: &str) {
        log::warn!(target: self.target, "{}", message);
    }

    fn error(&self, message: &str) {
        log::error!(target: self.target, "{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_logger_default_target() {
        let logger = LogLogger::default();
        assert_eq!(logger.target, "chromedriver_downloader");
        // No logger installed in tests; calls must still be harmless.
        logger.info("listing");
        logger.error("failed");
    }
}
