use std::borrow::Cow;

/// Provider identifier - mostly static constants
pub type ProviderId = Cow<'static, str>;

/// Currency code (ISO 4217 or crypto ticker) - mostly static
pub type Currency = Cow<'static, str>;

/// Canonical pair symbol such as `EURUSD` or `BTCUSD`
pub type Symbol = Cow<'static, str>;
