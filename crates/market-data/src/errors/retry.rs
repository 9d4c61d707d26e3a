/// Classification for failover policy.
///
/// Used by the orchestrator to decide what an error from one provider means
/// for the rest of the chain and for the rate governor.
///
/// # Behavior Summary
///
/// | Class | Try Next Provider? | Record Governor Failure? |
/// |-------|-------------------|--------------------------|
/// | `Never` | No | No |
/// | `FailoverWithPenalty` | Yes | Yes (feeds emergency tracking) |
/// | `NextProvider` | Yes | No |
/// | `Degraded` | No (go to degraded path) | No |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Never retry - unknown pair, bad request parameters, or terminal exhaustion.
    Never,

    /// Failover to the next provider and record a failed request.
    ///
    /// Used for network errors, timeouts, HTTP failures and unparseable
    /// bodies. The failure counts toward the provider's failure rate and the
    /// cross-provider emergency breaker.
    FailoverWithPenalty,

    /// Try the next provider without recording any penalty.
    ///
    /// Used when the request was never sent (local quota exhausted, missing
    /// API key, unsupported operation) or when the response arrived but the
    /// validator rejected it.
    NextProvider,

    /// Emergency mode is active. Skip the provider chain entirely.
    Degraded,
}
