//! # Stashbox
//!
//! A self-hostable object store: users own named buckets of files and share
//! them with other users at `view`, `upload` or `full` access. Usable both as
//! a standalone binary and as a library.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! stashbox = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stashbox::blob::FsBlobStore;
//! use stashbox::config::ServerConfig;
//! use stashbox::server::{AppState, create_router};
//! use stashbox::store::{SqliteStore, Store};
//!
//! let config = ServerConfig::default();
//! let store = SqliteStore::new(config.db_path()).unwrap();
//! store.initialize().unwrap();
//!
//! let blobs = FsBlobStore::new(&config.data_dir);
//! let state = Arc::new(AppState::new(Arc::new(store), Arc::new(blobs), config));
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): builds the `stashbox` binary. Disable with
//!   `default-features = false`.

pub mod auth;
pub mod blob;
pub mod config;
pub mod error;
pub mod server;
pub mod service;
pub mod store;
pub mod types;
