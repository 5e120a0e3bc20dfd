pub mod clinic_context;
pub mod config;
pub mod jwt_auth;
pub mod redis_helper;
mod responses;
mod telemetry;
pub mod utils;

pub use self::config::AppConfig;
pub use clinic_context::ClinicContext;
pub use redis_helper::*;
pub use responses::*;
pub use telemetry::*;
pub use utils::*;
