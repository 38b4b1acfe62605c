pub mod alert;
pub mod config;
pub mod config_loader;
pub mod events;
pub mod logging;
pub mod metrics;

pub use alert::Alerter;
pub use config::{ConfigError, EngineConfig, Environment};
pub use config_loader::ConfigLoader;
pub use events::{EngineEvent, EventBus};
pub use metrics::{EngineMetrics, MetricsServer};
