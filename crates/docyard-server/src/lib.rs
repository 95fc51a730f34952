//! `docyard` HTTP server.
//!
//! Wires the core library and the static file manager into a running Axum
//! server: configuration from the environment, database bootstrap, a status
//! endpoint, and per-project doc serving by subdomain.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
