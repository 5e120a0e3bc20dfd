pub mod appointments;
pub mod billing;
pub mod notifications;
pub mod prescriptions;
pub mod queue;
pub mod scheduling;
pub mod stock;
pub mod subscriptions;
pub mod usage_limits;
