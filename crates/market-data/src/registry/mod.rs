//! Acquisition registry.
//!
//! This module holds the shared, process-wide state of the acquisition
//! pipeline and the orchestrator that drives it:
//! - Per-provider and global request budgets with an emergency breaker
//! - Price and series validation
//! - Provider ordering, failover and degraded-mode fallback
//! - Diagnostic tracking for each fetch

mod emergency;
mod orchestrator;
mod rate_governor;
mod skip_reason;
mod validator;

pub use emergency::{EmergencyBreaker, EmergencyConfig, EmergencyState, EmergencyStatus};
pub use orchestrator::{AcquisitionOrchestrator, OrchestratorConfig};
pub use rate_governor::{
    GlobalUsage, GovernorConfig, GovernorStatus, HealthReport, HealthStatus, ProviderQuota,
    ProviderUsage, RateGovernor,
};
pub use skip_reason::{DataOrigin, FetchDiagnostics, ProviderAttempt, SkipReason};
pub use validator::{
    active_sessions, is_forex_weekend, CategoryCheck, ChangeThreshold, CheckStatus, PriceRange,
    PriceValidator, ValidationChecks, ValidationPenalties, ValidationResult, ValidationStats,
    ValidatorConfig, DEFAULT_MIN_CONFIDENCE,
};
