pub mod broker;
pub mod config;
pub mod control;
pub mod deposit;
pub mod gate;
pub mod jobs;
pub mod messages;
pub mod metrics;
pub mod notify;
pub mod ops;
pub mod pipeline;
pub mod runtime;
pub mod testing;
pub mod worker;

pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use runtime::PipelineRuntime;
