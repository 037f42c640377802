pub mod config;
pub mod documents;
pub mod flows;
pub mod geolocation;
pub mod locale;
pub mod models;
pub mod service;
pub mod telemetry;
pub mod workflow;

pub use config::ServiceConfig;
pub use locale::Locale;
pub use models::*;
pub use service::{AppState, build_router, create_app};
