// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Exponential backoff for the control-plane watch stream.
// Retries after 500ms, 1s, 2s... capped at 30s; unlimited by default.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Multiplier applied to delay after each failure
    pub multiplier: u32,
    /// Consecutive failures before giving up (0 = unlimited)
    pub max_retries: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2,
            max_retries: 0,
        }
    }
}

#[derive(Debug)]
pub struct BackoffState {
    config: BackoffConfig,
    consecutive_failures: u32,
    current_delay: Duration,
}

impl BackoffState {
    pub fn new(config: BackoffConfig) -> Self {
        let current_delay = config.initial_delay;
        Self {
            config,
            consecutive_failures: 0,
            current_delay,
        }
    }

    /// Record a healthy stream (resets backoff)
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.current_delay = self.config.initial_delay;
    }

    /// Record a failure and return the delay before the next attempt, or
    /// `None` once `max_retries` is exceeded.
    pub fn record_failure(&mut self) -> Option<Duration> {
        self.consecutive_failures += 1;

        if self.config.max_retries > 0 && self.consecutive_failures > self.config.max_retries {
            return None;
        }

        let delay = self.current_delay;
        self.current_delay = std::cmp::min(
            self.current_delay * self.config.multiplier,
            self.config.max_delay,
        );

        Some(delay)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}
