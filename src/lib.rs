//! Workflow engine for a sheet-metal quoting desk.
//!
//! Inquiries, quotations, and orders move through fixed status pipelines with
//! role-gated transitions. This crate owns the transition table, the pure
//! guards in front of it, the HTTP client for the persistence collaborator,
//! and the controller that ties them together: fetch, guard, persist, notify.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod client;
pub mod config;
pub mod errors;
pub mod events;
pub mod guard;
pub mod lifecycle;
pub mod models;
pub mod services;
pub mod timeline;

pub use auth::ActorRole;
pub use client::{HttpPersistenceApi, PersistenceApi};
pub use config::{load_config, WorkflowConfig};
pub use errors::WorkflowError;
pub use events::{Event, EventSender};
pub use guard::Denial;
pub use services::workflow::{DispatchRequest, WorkflowService};
