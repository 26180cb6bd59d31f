pub mod data;
pub mod defaults;

pub use data::{BridgeConfig, ConfigError, ConfigOverrides};
