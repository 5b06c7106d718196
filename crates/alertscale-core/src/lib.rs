//! alertscale-core: types shared by every alertscale crate.
//!
//! - [`types`]: group capacity, tag metadata, policy filters
//! - [`error`]: provider, scaling, and configuration error kinds
//! - [`config`]: `alertscale.toml` parsing into runtime settings

pub mod config;
pub mod error;
pub mod types;

pub use config::{CooldownSettings, RetryPolicy, ScalerConfig, WorkerLimits};
pub use error::{ConfigError, ProviderError, ProviderResult, ScaleError, ScaleResult};
pub use types::*;
