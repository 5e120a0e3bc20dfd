pub mod appointments;
pub mod bills;
pub mod clinics;
pub mod common;
pub mod medicines;
pub mod notifications;
pub mod pagination;
pub mod patients;
pub mod prescriptions;
pub mod queue;
pub mod staff;
pub mod subscriptions;
pub mod treatment_history;
