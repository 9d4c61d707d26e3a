//! Request budget governor for market data providers.
//!
//! Tracks fixed-window hourly and daily quotas per provider plus a global
//! budget across all providers, paces callers after each request, and owns
//! the cross-provider [`EmergencyBreaker`].
//!
//! All mutable state lives behind a single mutex. The lock is never held
//! across an await point; pacing sleeps happen after the guard is dropped.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::emergency::{EmergencyBreaker, EmergencyConfig, EmergencyStatus};
use crate::models::ProviderId;

/// Default global budget per hour across all providers.
const DEFAULT_GLOBAL_HOURLY_LIMIT: u32 = 300;

/// Default global budget per day across all providers.
const DEFAULT_GLOBAL_DAILY_LIMIT: u32 = 5_000;

/// Number of recent request outcomes kept for the failure rate.
const DEFAULT_HISTORY_SIZE: usize = 100;

/// Quota for a single provider.
#[derive(Clone, Debug, PartialEq)]
pub struct ProviderQuota {
    /// Maximum requests per hourly window.
    pub hourly_limit: u32,
    /// Maximum requests per daily window.
    pub daily_limit: u32,
    /// Delay applied after each recorded request.
    pub pacing: Duration,
}

impl Default for ProviderQuota {
    fn default() -> Self {
        Self {
            hourly_limit: 100,
            daily_limit: 2_400,
            pacing: Duration::from_secs(1),
        }
    }
}

/// Governor configuration.
#[derive(Clone, Debug)]
pub struct GovernorConfig {
    pub global_hourly_limit: u32,
    pub global_daily_limit: u32,
    /// Length of the "hourly" window.
    pub hourly_window: Duration,
    /// Length of the "daily" window.
    pub daily_window: Duration,
    /// Quota applied to providers that were never configured.
    pub default_quota: ProviderQuota,
    /// Recent outcomes kept for the health score.
    pub history_size: usize,
    pub emergency: EmergencyConfig,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            global_hourly_limit: DEFAULT_GLOBAL_HOURLY_LIMIT,
            global_daily_limit: DEFAULT_GLOBAL_DAILY_LIMIT,
            hourly_window: Duration::from_secs(3_600),
            daily_window: Duration::from_secs(86_400),
            default_quota: ProviderQuota::default(),
            history_size: DEFAULT_HISTORY_SIZE,
            emergency: EmergencyConfig::default(),
        }
    }
}

/// Fixed-window counters for one budget.
#[derive(Debug)]
struct UsageCounter {
    hourly: u32,
    daily: u32,
    hour_started: Instant,
    day_started: Instant,
    total: u64,
    successes: u64,
    failures: u64,
    denied: u64,
    last_request: Option<DateTime<Utc>>,
}

impl UsageCounter {
    fn new(now: Instant) -> Self {
        Self {
            hourly: 0,
            daily: 0,
            hour_started: now,
            day_started: now,
            total: 0,
            successes: 0,
            failures: 0,
            denied: 0,
            last_request: None,
        }
    }

    /// Reset counters whose window has elapsed. A window that elapsed several
    /// times over is reset once and restarts at `now`.
    fn roll(&mut self, now: Instant, hourly_window: Duration, daily_window: Duration) {
        if now.saturating_duration_since(self.hour_started) >= hourly_window {
            self.hourly = 0;
            self.hour_started = now;
        }
        if now.saturating_duration_since(self.day_started) >= daily_window {
            self.daily = 0;
            self.day_started = now;
        }
    }

    fn has_room(&self, hourly_limit: u32, daily_limit: u32) -> bool {
        self.hourly < hourly_limit && self.daily < daily_limit
    }

    fn take_slot(&mut self) {
        self.hourly = self.hourly.saturating_add(1);
        self.daily = self.daily.saturating_add(1);
    }

    fn tally(&mut self, success: bool) {
        self.total += 1;
        if success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        self.last_request = Some(Utc::now());
    }
}

#[derive(Debug)]
struct RequestRecord {
    success: bool,
}

#[derive(Debug)]
struct GovernorState {
    providers: HashMap<String, UsageCounter>,
    quotas: HashMap<String, ProviderQuota>,
    global: UsageCounter,
    history: VecDeque<RequestRecord>,
    emergency: EmergencyBreaker,
}

/// Usage of one provider's budget.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderUsage {
    pub provider: String,
    pub hourly_count: u32,
    pub hourly_limit: u32,
    pub daily_count: u32,
    pub daily_limit: u32,
    pub hourly_utilization: f64,
    pub daily_utilization: f64,
    pub total_requests: u64,
    pub successes: u64,
    pub failures: u64,
    /// Requests refused by `can_request`
    pub denied: u64,
    pub success_rate: f64,
    pub pacing_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_request: Option<DateTime<Utc>>,
}

/// Usage of the global budget.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalUsage {
    pub hourly_count: u32,
    pub hourly_limit: u32,
    pub daily_count: u32,
    pub daily_limit: u32,
    pub hourly_utilization: f64,
    pub daily_utilization: f64,
    pub total_requests: u64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "HEALTHY"),
            Self::Warning => write!(f, "WARNING"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Observability-only health summary. Never used to gate requests.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub score: u8,
    pub status: HealthStatus,
    /// Failure percentage over the recent request history
    pub recent_failure_rate: f64,
    pub recommendations: Vec<String>,
}

/// Full snapshot returned by [`RateGovernor::status`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernorStatus {
    pub global: GlobalUsage,
    pub providers: Vec<ProviderUsage>,
    pub health: HealthReport,
    pub emergency: EmergencyStatus,
    pub generated_at: DateTime<Utc>,
}

/// Thread-safe request governor shared by all concurrent fetches.
pub struct RateGovernor {
    config: GovernorConfig,
    state: Mutex<GovernorState>,
}

impl RateGovernor {
    /// Create a governor with default settings.
    pub fn new() -> Self {
        Self::with_config(GovernorConfig::default())
    }

    /// Create a governor with custom configuration.
    pub fn with_config(config: GovernorConfig) -> Self {
        let now = Instant::now();
        let state = GovernorState {
            providers: HashMap::new(),
            quotas: HashMap::new(),
            global: UsageCounter::new(now),
            history: VecDeque::with_capacity(config.history_size),
            emergency: EmergencyBreaker::new(config.emergency.clone()),
        };
        Self {
            config,
            state: Mutex::new(state),
        }
    }

    /// Lock the state mutex, recovering from poison if necessary.
    ///
    /// Counters are plain integers, so a poisoned guard still holds usable
    /// data.
    fn lock_state(&self) -> MutexGuard<'_, GovernorState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("Rate governor mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn quota_for<'a>(&'a self, state: &'a GovernorState, provider: &str) -> &'a ProviderQuota {
        state
            .quotas
            .get(provider)
            .unwrap_or(&self.config.default_quota)
    }

    /// Configure the quota for a specific provider.
    pub fn configure(&self, provider: &ProviderId, quota: ProviderQuota) {
        let mut state = self.lock_state();
        state.quotas.insert(provider.to_string(), quota);
    }

    /// Go/no-go decision for one request to `provider`.
    ///
    /// False while emergency mode is active, or when the provider's or the
    /// global hourly/daily budget is spent. Does not reserve anything; callers
    /// that go on to make the request should use
    /// [`try_acquire`](Self::try_acquire) instead.
    pub fn can_request(&self, provider: &ProviderId) -> bool {
        self.admit(provider, false)
    }

    /// Check the budgets and, when they allow it, take one slot from both the
    /// provider's and the global windows under the same lock.
    ///
    /// A granted slot is already counted against the quota. Report the outcome
    /// with [`settle`](Self::settle), not [`record`](Self::record).
    pub fn try_acquire(&self, provider: &ProviderId) -> bool {
        self.admit(provider, true)
    }

    fn admit(&self, provider: &ProviderId, reserve: bool) -> bool {
        let now = Instant::now();
        let mut state = self.lock_state();

        if state.emergency.is_active(now) {
            debug!("Rate governor: emergency mode active, denying '{}'", provider);
            return false;
        }

        let (hourly_window, daily_window) = (self.config.hourly_window, self.config.daily_window);
        state.global.roll(now, hourly_window, daily_window);
        let global_ok = state
            .global
            .has_room(self.config.global_hourly_limit, self.config.global_daily_limit);

        let quota = self.quota_for(&state, provider).clone();
        let counter = state
            .providers
            .entry(provider.to_string())
            .or_insert_with(|| UsageCounter::new(now));
        counter.roll(now, hourly_window, daily_window);
        let provider_ok = counter.has_room(quota.hourly_limit, quota.daily_limit);

        if global_ok && provider_ok {
            if reserve {
                counter.take_slot();
                state.global.take_slot();
            }
            return true;
        }

        counter.denied += 1;
        if !global_ok {
            debug!("Rate governor: global budget exhausted, denying '{}'", provider);
        } else {
            debug!(
                "Rate governor: quota exhausted for '{}' ({}/{} hourly, {}/{} daily)",
                provider, counter.hourly, quota.hourly_limit, counter.daily, quota.daily_limit
            );
        }
        false
    }

    /// Count one request and its outcome, then wait out the provider's pacing
    /// delay.
    pub async fn record(&self, provider: &ProviderId, success: bool) {
        self.finish(provider, success, true).await;
    }

    /// Outcome of a request whose slot was taken by
    /// [`try_acquire`](Self::try_acquire). Tallies the result and applies
    /// pacing without charging the windows a second time.
    pub async fn settle(&self, provider: &ProviderId, success: bool) {
        self.finish(provider, success, false).await;
    }

    async fn finish(&self, provider: &ProviderId, success: bool, take_slot: bool) {
        let pacing = self.register(provider, success, take_slot);
        if pacing > Duration::ZERO {
            tokio::time::sleep(pacing).await;
        }
    }

    /// Counting half of [`record`](Self::record). Returns the pacing delay.
    fn register(&self, provider: &ProviderId, success: bool, take_slot: bool) -> Duration {
        let now = Instant::now();
        let (hourly_window, daily_window) = (self.config.hourly_window, self.config.daily_window);
        let mut state = self.lock_state();

        state.global.roll(now, hourly_window, daily_window);
        if take_slot {
            state.global.take_slot();
        }
        state.global.tally(success);

        let pacing = self.quota_for(&state, provider).pacing;
        let counter = state
            .providers
            .entry(provider.to_string())
            .or_insert_with(|| UsageCounter::new(now));
        counter.roll(now, hourly_window, daily_window);
        if take_slot {
            counter.take_slot();
        }
        counter.tally(success);

        if state.history.len() >= self.config.history_size.max(1) {
            state.history.pop_front();
        }
        state.history.push_back(RequestRecord { success });

        if success {
            state.emergency.record_success();
        } else if state.emergency.record_failure(now) {
            warn!(
                "Rate governor: emergency mode tripped after failure from '{}'",
                provider
            );
        }

        pacing
    }

    pub fn is_emergency(&self) -> bool {
        self.lock_state().emergency.is_active(Instant::now())
    }

    /// Force emergency mode on.
    pub fn trip_emergency(&self, reason: &str) {
        self.lock_state().emergency.trip(reason, Instant::now());
    }

    /// Administrative reset back to normal operation.
    pub fn reset_emergency(&self) {
        self.lock_state().emergency.reset();
    }

    pub fn emergency_status(&self) -> EmergencyStatus {
        self.lock_state().emergency.status(Instant::now())
    }

    /// Administrative reset of every usage counter and the request history.
    pub fn reset_usage(&self) {
        let now = Instant::now();
        let mut state = self.lock_state();
        state.providers.clear();
        state.global = UsageCounter::new(now);
        state.history.clear();
    }

    /// Usage and health snapshot.
    pub fn status(&self) -> GovernorStatus {
        let now = Instant::now();
        let (hourly_window, daily_window) = (self.config.hourly_window, self.config.daily_window);
        let mut state = self.lock_state();

        state.global.roll(now, hourly_window, daily_window);
        let global = GlobalUsage {
            hourly_count: state.global.hourly,
            hourly_limit: self.config.global_hourly_limit,
            daily_count: state.global.daily,
            daily_limit: self.config.global_daily_limit,
            hourly_utilization: percent(state.global.hourly, self.config.global_hourly_limit),
            daily_utilization: percent(state.global.daily, self.config.global_daily_limit),
            total_requests: state.global.total,
        };

        let mut names: Vec<String> = state.providers.keys().cloned().collect();
        names.extend(state.quotas.keys().cloned());
        names.sort();
        names.dedup();

        let mut providers = Vec::with_capacity(names.len());
        for name in names {
            let quota = self.quota_for(&state, &name).clone();
            let counter = state
                .providers
                .entry(name.clone())
                .or_insert_with(|| UsageCounter::new(now));
            counter.roll(now, hourly_window, daily_window);
            let success_rate = if counter.total == 0 {
                100.0
            } else {
                counter.successes as f64 / counter.total as f64 * 100.0
            };
            providers.push(ProviderUsage {
                provider: name,
                hourly_count: counter.hourly,
                hourly_limit: quota.hourly_limit,
                daily_count: counter.daily,
                daily_limit: quota.daily_limit,
                hourly_utilization: percent(counter.hourly, quota.hourly_limit),
                daily_utilization: percent(counter.daily, quota.daily_limit),
                total_requests: counter.total,
                successes: counter.successes,
                failures: counter.failures,
                denied: counter.denied,
                success_rate,
                pacing_ms: quota.pacing.as_millis() as u64,
                last_request: counter.last_request,
            });
        }

        let failures = state.history.iter().filter(|r| !r.success).count();
        let recent_failure_rate = if state.history.is_empty() {
            0.0
        } else {
            failures as f64 / state.history.len() as f64 * 100.0
        };

        let emergency = state.emergency.status(now);
        let health = health_report(&global, &providers, recent_failure_rate, emergency.active);

        GovernorStatus {
            global,
            providers,
            health,
            emergency,
            generated_at: Utc::now(),
        }
    }
}

impl Default for RateGovernor {
    fn default() -> Self {
        Self::new()
    }
}

fn percent(count: u32, limit: u32) -> f64 {
    if limit == 0 {
        100.0
    } else {
        count as f64 / limit as f64 * 100.0
    }
}

fn health_report(
    global: &GlobalUsage,
    providers: &[ProviderUsage],
    recent_failure_rate: f64,
    emergency_active: bool,
) -> HealthReport {
    let mut score = 100.0;
    score -= (global.daily_utilization - 50.0).max(0.0);
    score -= (global.hourly_utilization - 70.0).max(0.0);
    score -= recent_failure_rate;
    let score = score.clamp(0.0, 100.0).round() as u8;

    let status = match score {
        80..=u8::MAX => HealthStatus::Healthy,
        60..=79 => HealthStatus::Warning,
        _ => HealthStatus::Critical,
    };

    let mut recommendations = Vec::new();
    if emergency_active {
        recommendations
            .push("Emergency mode active - serving cached and fallback data".to_string());
    }
    if global.hourly_utilization > 80.0 {
        recommendations.push("Reduce request frequency - approaching hourly limit".to_string());
    }
    if global.daily_utilization > 80.0 {
        recommendations.push("Cache more aggressively - approaching daily limit".to_string());
    }
    if recent_failure_rate > 20.0 {
        recommendations
            .push("High failure rate detected - check provider availability".to_string());
    }
    for usage in providers {
        if usage.hourly_utilization >= 90.0 {
            recommendations.push(format!(
                "Provider {} is near its hourly quota ({:.0}%)",
                usage.provider, usage.hourly_utilization
            ));
        }
    }
    if recommendations.is_empty() {
        recommendations.push("System operating normally".to_string());
    }

    HealthReport {
        score,
        status,
        recent_failure_rate,
        recommendations,
    }
}
