pub mod clinic_web_server;
pub mod core;
pub mod db;
pub mod jobs;
pub mod models;
pub mod routes;
pub mod services;
