//! Human-like pacing between browser actions.
//!
//! Every randomized wait in the engine is a named [`PauseRange`] sampled by one [`Pacer`].

use std::sync::Mutex;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Inclusive range of milliseconds to pause for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PauseRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl PauseRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }
}

pub const FOCUS: PauseRange = PauseRange::new(200, 500);
pub const CLEAR: PauseRange = PauseRange::new(300, 700);
pub const KEYSTROKE: PauseRange = PauseRange::new(50, 250);
pub const THINKING: PauseRange = PauseRange::new(500, 1500);
/// Probability per character of a "thinking" pause while typing.
pub const THINKING_CHANCE: f64 = 0.15;
pub const AFTER_TYPING: PauseRange = PauseRange::new(300, 800);
pub const AFTER_FILL: PauseRange = PauseRange::new(1500, 3500);
pub const READ_ERROR: PauseRange = PauseRange::new(2000, 4000);
pub const AFTER_CORRECTION: PauseRange = PauseRange::new(1500, 3000);
pub const BEFORE_CLICK: PauseRange = PauseRange::new(300, 800);
pub const READ_OPTIONS: PauseRange = PauseRange::new(1000, 2500);
pub const OPEN_DROPDOWN: PauseRange = PauseRange::new(500, 1500);
pub const AFTER_SELECT: PauseRange = PauseRange::new(1500, 3000);
pub const READ_CHECKBOX: PauseRange = PauseRange::new(1000, 2000);
pub const CONTACT_PREFILL: PauseRange = PauseRange::new(1000, 2000);
pub const SCAN_FORM: PauseRange = PauseRange::new(2000, 4000);
pub const BEFORE_ACTION: PauseRange = PauseRange::new(2000, 4000);
pub const AFTER_SUBMIT: PauseRange = PauseRange::new(4000, 7000);
pub const BETWEEN_STEPS: PauseRange = PauseRange::new(3000, 6000);
pub const MODAL_SETTLE: PauseRange = PauseRange::new(3000, 5000);
pub const BETWEEN_APPLICATIONS: PauseRange = PauseRange::new(15_000, 45_000);

/// Samples and sleeps through pause ranges. An instant pacer never sleeps, and its
/// `chance` is always false.
pub struct Pacer {
    rng: Mutex<StdRng>,
    enabled: bool,
}

impl Pacer {
    pub fn human() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
            enabled: true,
        }
    }

    #[cfg(test)]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            enabled: true,
        }
    }

    #[cfg(test)]
    pub fn instant() -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(0)),
            enabled: false,
        }
    }

    pub fn sample(&self, range: PauseRange) -> Duration {
        if !self.enabled {
            return Duration::ZERO;
        }
        let (low, high) = if range.min_ms <= range.max_ms {
            (range.min_ms, range.max_ms)
        } else {
            (range.max_ms, range.min_ms)
        };
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        Duration::from_millis(rng.random_range(low..=high))
    }

    pub async fn pause(&self, range: PauseRange) {
        let delay = self.sample(range);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    pub fn chance(&self, probability: f64) -> bool {
        if !self.enabled {
            return false;
        }
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.random_bool(probability.clamp(0.0, 1.0))
    }
}
