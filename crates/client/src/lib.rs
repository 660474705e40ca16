//! Session and cart synchronization client for the Pasar storefront backend.
//!
//! # Architecture
//!
//! The backend is the single source of truth for cart contents; this crate
//! keeps a local snapshot reconciled with it across the guest and
//! authenticated identity lifecycle:
//!
//! - [`store`] - persisted session state (token, user, guest ID, cached cart)
//! - [`api`] - the backend's network contract and its `reqwest` implementation
//! - [`auth`] - identity ownership, login with guest cart handoff, logout,
//!   background token and role verification
//! - [`guest`] - guest session bootstrapping
//! - [`cart`] - throttled cart fetches and user-facing mutations
//! - [`context`] - wiring, lifecycle, and the background loops
//!
//! Components coordinate through the typed [`events`] bus rather than calling
//! each other, mirroring how independent contexts coordinate in a multi-tab
//! browser session.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use pasar_client::api::HttpBackend;
//! use pasar_client::config::ClientConfig;
//! use pasar_client::context::SessionContext;
//! use pasar_client::store::FileStore;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::from_env()?;
//! let backend = Arc::new(HttpBackend::new(&config)?);
//! let store = Arc::new(FileStore::open("session.json"));
//! let ctx = Arc::new(SessionContext::new(config, backend, store));
//!
//! ctx.initialize().await;
//! let (_events, _verify) = ctx.spawn_background();
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod auth;
pub mod cart;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod guest;
pub mod models;
pub mod store;

pub use auth::{AuthSession, GuestCartHandoff, LoginReport, VerificationOutcome};
pub use cart::CartSync;
pub use config::ClientConfig;
pub use context::SessionContext;
pub use error::{AuthError, CartError};
pub use events::{EventBus, SessionEvent};
pub use models::{CartLine, CartSnapshot, Identity, LoginOutcome, UserRecord};
