//! Core library for `docyard`.
//!
//! Accounts own documentation projects. A project is one row in the
//! relational store plus one directory under the static root, bound together
//! by the project title. This crate holds:
//!
//! - [`credential`]: username/password/title rules and Argon2id hashing;
//! - [`models`]: the `Account` and `Project` records;
//! - [`store`]: the [`DocStore`] trait, with [`postgres::PostgresStore`]
//!   (feature `postgres`, on by default) and [`memory::MemoryStore`];
//! - [`auth`]: the authentication and authorization gate;
//! - [`service`]: [`DocService`], which pairs every relational write with the
//!   matching static file operation.

pub mod auth;
pub mod credential;
pub mod error;
pub mod memory;
pub mod models;
pub mod service;
pub mod store;

#[cfg(feature = "postgres")]
pub mod migrations;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "postgres")]
pub mod transaction;

pub use auth::{AuthGate, Credentials};
pub use error::{AuthError, ErrorKind, ServiceError, StoreError, ValidationError};
pub use memory::MemoryStore;
pub use models::{Account, AccountUpdate, Project};
pub use service::DocService;
pub use store::DocStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;
