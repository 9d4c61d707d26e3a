pub mod settings_env;
pub mod settings_model;

pub use settings_env::{apply_env_overrides, ENV_PREFIX};
pub use settings_model::Settings;
