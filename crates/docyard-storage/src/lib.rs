//! Static file manager for `docyard`.
//!
//! Turns an uploaded site archive (a zip file) into a servable directory tree
//! under a single static root. Each project owns exactly one directory,
//! `<root>/<name>`, where `<name>` is the archive name with its directory
//! components and `.zip` suffix stripped. The relational store and this crate
//! share that name as the key binding a project row to its files.
//!
//! This crate knows nothing about accounts, projects, or the database. Callers
//! are expected to pair every [`StaticFiles::upload`] and
//! [`StaticFiles::remove`] with the matching relational write.
//!
//! All operations are blocking filesystem calls. Async callers should run them
//! on a blocking thread (`tokio::task::spawn_blocking`).

mod error;
mod filesys;
pub mod normalize;

pub use error::StorageError;
pub use filesys::{StaticFiles, directory_name};
