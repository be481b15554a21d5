use crate::error::{EngineError, Result};

/// Configuration shared by both engine sides.
#[derive(Debug, Clone)]
pub struct MuxConfig {
    /// Number of logical streams, fixed for the engine pair's lifetime.
    pub streams: u32,
    /// Credit window: maximum unacknowledged frames per stream, and the
    /// initial credit granted to every stream.
    pub blocking_factor: u32,
    /// Total send-buffer budget in bytes, split evenly across streams to
    /// bound each bundle's size.
    pub buffer_size: usize,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            streams: 1,
            blocking_factor: 8,
            buffer_size: 256 * 1024,
        }
    }
}

impl MuxConfig {
    /// Create a config for the given stream count.
    pub fn new(streams: u32) -> Self {
        Self {
            streams,
            ..Self::default()
        }
    }

    /// Override the credit window.
    pub fn with_blocking_factor(mut self, blocking_factor: u32) -> Self {
        self.blocking_factor = blocking_factor;
        self
    }

    /// Override the total send-buffer budget.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Per-stream bundle byte budget.
    pub fn bundle_budget(&self) -> usize {
        self.buffer_size / (self.streams.max(1) as usize)
    }

    /// Sequence distance between successive credit grants: half the window,
    /// degenerating to every frame at a window of 1.
    pub fn grant_step(&self) -> u32 {
        (self.blocking_factor / 2).max(1)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.streams == 0 {
            return Err(EngineError::Config("stream count must be at least 1"));
        }
        if self.blocking_factor == 0 {
            return Err(EngineError::Config("blocking factor must be at least 1"));
        }
        if self.buffer_size == 0 {
            return Err(EngineError::Config("buffer size must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(MuxConfig::default().validate().is_ok());
    }

    #[test]
    fn builder_overrides() {
        let cfg = MuxConfig::new(4)
            .with_blocking_factor(2)
            .with_buffer_size(8 * 1024);
        assert_eq!(cfg.streams, 4);
        assert_eq!(cfg.blocking_factor, 2);
        assert_eq!(cfg.bundle_budget(), 2 * 1024);
    }

    #[test]
    fn grant_step_is_half_window() {
        assert_eq!(MuxConfig::new(1).with_blocking_factor(8).grant_step(), 4);
        assert_eq!(MuxConfig::new(1).with_blocking_factor(3).grant_step(), 1);
        assert_eq!(MuxConfig::new(1).with_blocking_factor(1).grant_step(), 1);
    }

    #[test]
    fn zero_fields_rejected() {
        assert!(MuxConfig::new(0).validate().is_err());
        assert!(MuxConfig::new(1).with_blocking_factor(0).validate().is_err());
        assert!(MuxConfig::new(1).with_buffer_size(0).validate().is_err());
    }
}
