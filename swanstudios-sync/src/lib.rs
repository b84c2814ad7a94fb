//! # SwanStudios Offline Gateway
//!
//! Sits between the web client and the API and keeps the app usable without
//! a network:
//!
//! - `router`: classifies requests (API-critical, static, video, passthrough)
//! - `cache`: versioned response caches
//! - `queue`: offline workout writes waiting for replay
//! - `gateway`: the per-class network/cache strategy
//! - `sync`: background replay of queued workouts
//! - `messages`: `SKIP_WAITING`, `GET_OFFLINE_WORKOUTS`, `FORCE_SYNC`
//! - `proxy`: the axum front end

pub mod cache;
pub mod config;
pub mod gateway;
pub mod messages;
pub mod proxy;
pub mod queue;
pub mod router;
pub mod sync;
pub mod transport;
