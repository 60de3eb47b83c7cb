pub mod bbox;
pub mod classify;
pub mod config;
pub mod executor;
pub mod geo;
pub mod lifecycle;
pub mod progress;
pub mod selection;
pub mod session;
pub mod status;
pub mod target;
pub mod web;

pub use bbox::{BBoxError, BBoxOutcome, BboxMessage, BoundingBox};
pub use classify::AreaTier;
pub use config::AppConfig;
pub use lifecycle::{GenerationLifecycle, JobExecutor, JobForm, TriggerOutcome};
pub use session::Session;
