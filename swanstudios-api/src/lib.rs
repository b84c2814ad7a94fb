//! # SwanStudios API Server Library
//!
//! HTTP layer over `swanstudios-shared`: configuration, error mapping,
//! middleware and route handlers. The binaries in `src/main.rs` and
//! `src/bin/` are thin wrappers around it.
//!
//! ## Modules
//!
//! - `app`: application state and router builder
//! - `config`: environment configuration
//! - `error`: `ApiError` and its HTTP mapping
//! - `extract`: `Json`, `Path` and `Query` wrappers with JSON rejections
//! - `middleware`: security headers
//! - `routes`: handlers, one module per resource

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
