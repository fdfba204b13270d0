use std::time::Duration;

use nav_config::{BackoffConfig, BackoffStrategy};

/// Poll schedule with a hard attempt ceiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub strategy: BackoffStrategy,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl BackoffPolicy {
    pub fn fixed(delay: Duration, max_attempts: u32) -> Self {
        Self {
            strategy: BackoffStrategy::Fixed,
            initial_delay: delay,
            max_delay: delay,
            max_attempts,
        }
    }

    pub fn exponential(initial_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            strategy: BackoffStrategy::Exponential,
            initial_delay,
            max_delay,
            max_attempts,
        }
    }

    pub fn from_config(cfg: &BackoffConfig) -> Self {
        Self {
            strategy: cfg.strategy,
            initial_delay: Duration::from_millis(cfg.initial_delay_ms),
            max_delay: Duration::from_millis(cfg.max_delay_ms),
            max_attempts: cfg.max_attempts.max(1),
        }
    }

    /// Delay to wait after poll number `attempt` (1-based) before the next one.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.strategy {
            BackoffStrategy::Fixed => self.initial_delay,
            BackoffStrategy::Exponential => {
                let exp = attempt.saturating_sub(1).min(20);
                let factor = 1u32 << exp;
                self.initial_delay
                    .checked_mul(factor)
                    .unwrap_or(self.max_delay)
                    .min(self.max_delay)
            }
        }
    }
}
