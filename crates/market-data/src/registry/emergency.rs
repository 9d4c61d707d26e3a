//! Cross-provider emergency breaker.
//!
//! A two-state machine shared by every provider:
//!
//! - **Normal**: requests are gated only by quotas.
//! - **Tripped**: every provider is denied until the cooldown elapses or an
//!   administrator resets the breaker.
//!
//! The breaker trips when `failure_threshold` failed requests accumulate
//! inside `failure_window` with no successful request in between. Any
//! success clears the streak. State is in-memory and resets on restart.

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

/// Default failures (with no intervening success) before tripping.
const DEFAULT_FAILURE_THRESHOLD: u32 = 10;

/// Default window the failures must fall into.
const DEFAULT_FAILURE_WINDOW: Duration = Duration::from_secs(120);

/// Default time spent tripped before returning to normal.
const DEFAULT_COOLDOWN: Duration = Duration::from_secs(600);

/// Emergency breaker state.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmergencyState {
    Normal,
    Tripped,
}

impl fmt::Display for EmergencyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "NORMAL"),
            Self::Tripped => write!(f, "TRIPPED"),
        }
    }
}

/// Emergency breaker configuration.
#[derive(Clone, Debug)]
pub struct EmergencyConfig {
    /// Consecutive failures (inside the window) that trip the breaker.
    pub failure_threshold: u32,
    /// Only failures this recent count toward the threshold.
    pub failure_window: Duration,
    /// How long the breaker stays tripped.
    pub cooldown: Duration,
}

impl Default for EmergencyConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            failure_window: DEFAULT_FAILURE_WINDOW,
            cooldown: DEFAULT_COOLDOWN,
        }
    }
}

/// Snapshot reported by `emergency_status()`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyStatus {
    pub active: bool,
    pub state: EmergencyState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tripped_at: Option<DateTime<Utc>>,
    /// Seconds until automatic return to normal (0 when not tripped)
    pub remaining_secs: u64,
    /// Failures currently counted toward the threshold
    pub recent_failures: u32,
    pub failure_threshold: u32,
    /// Times the breaker has tripped since start
    pub trip_count: u32,
    pub message: String,
}

/// The breaker itself. Not thread-safe; the rate governor owns it behind
/// its own mutex.
#[derive(Debug)]
pub struct EmergencyBreaker {
    config: EmergencyConfig,
    state: EmergencyState,
    until: Option<Instant>,
    tripped_at: Option<DateTime<Utc>>,
    reason: Option<String>,
    failures: VecDeque<Instant>,
    trip_count: u32,
}

impl EmergencyBreaker {
    pub fn new(config: EmergencyConfig) -> Self {
        Self {
            config,
            state: EmergencyState::Normal,
            until: None,
            tripped_at: None,
            reason: None,
            failures: VecDeque::new(),
            trip_count: 0,
        }
    }

    /// Returns to Normal once the cooldown has elapsed.
    fn refresh(&mut self, now: Instant) {
        if self.state == EmergencyState::Tripped {
            if let Some(until) = self.until {
                if now >= until {
                    info!("Emergency mode: cooldown elapsed, returning to normal operation");
                    self.clear();
                }
            }
        }
    }

    fn clear(&mut self) {
        self.state = EmergencyState::Normal;
        self.until = None;
        self.tripped_at = None;
        self.reason = None;
        self.failures.clear();
    }

    fn prune(&mut self, now: Instant) {
        while let Some(first) = self.failures.front() {
            if now.saturating_duration_since(*first) > self.config.failure_window {
                self.failures.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn state(&mut self, now: Instant) -> EmergencyState {
        self.refresh(now);
        self.state
    }

    pub fn is_active(&mut self, now: Instant) -> bool {
        self.state(now) == EmergencyState::Tripped
    }

    /// Record a failed request. Returns true if this failure tripped the breaker.
    pub fn record_failure(&mut self, now: Instant) -> bool {
        self.refresh(now);
        if self.state == EmergencyState::Tripped {
            return false;
        }

        self.failures.push_back(now);
        self.prune(now);

        if self.failures.len() as u32 >= self.config.failure_threshold {
            let reason = format!(
                "{} consecutive provider failures within {}s",
                self.failures.len(),
                self.config.failure_window.as_secs()
            );
            self.trip(reason, now);
            return true;
        }
        false
    }

    pub fn record_success(&mut self) {
        if self.state == EmergencyState::Normal {
            self.failures.clear();
        }
    }

    pub fn trip(&mut self, reason: impl Into<String>, now: Instant) {
        let reason = reason.into();
        info!(
            "Emergency mode: tripping for {}s ({})",
            self.config.cooldown.as_secs(),
            reason
        );
        self.state = EmergencyState::Tripped;
        self.until = Some(now + self.config.cooldown);
        self.tripped_at = Some(Utc::now());
        self.reason = Some(reason);
        self.trip_count += 1;
    }

    pub fn reset(&mut self) {
        if self.state == EmergencyState::Tripped {
            info!("Emergency mode: manual reset");
        }
        self.clear();
    }

    pub fn status(&mut self, now: Instant) -> EmergencyStatus {
        self.refresh(now);
        self.prune(now);

        let remaining = self
            .until
            .map(|until| until.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO);
        let active = self.state == EmergencyState::Tripped;
        let message = if active {
            format!(
                "Emergency mode active - providers paused for {}s more",
                remaining.as_secs()
            )
        } else {
            "Normal operation".to_string()
        };

        EmergencyStatus {
            active,
            state: self.state,
            reason: self.reason.clone(),
            tripped_at: self.tripped_at,
            remaining_secs: remaining.as_secs(),
            recent_failures: self.failures.len() as u32,
            failure_threshold: self.config.failure_threshold,
            trip_count: self.trip_count,
            message,
        }
    }
}

impl Default for EmergencyBreaker {
    fn default() -> Self {
        Self::new(EmergencyConfig::default())
    }
}
