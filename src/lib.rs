#![doc = "The `taskhub` library crate."]
#![doc = ""]
#![doc = "Business logic for the task-management API: authentication, the central"]
#![doc = "task visibility policy, domain models, route handlers and error handling."]
#![doc = "The binary in `main.rs` wires these into a running actix-web server."]

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod policy;
pub mod rate_limit;
pub mod routes;
pub mod security;
