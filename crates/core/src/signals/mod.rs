//! Signal service: the facade over acquisition, indicators and fusion.

mod signals_service;
mod signals_traits;

pub use signals_service::SignalService;
pub use signals_traits::SignalServiceTrait;
