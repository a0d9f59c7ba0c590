//! `actito-sdk` is the async client runtime of the Actito platform.
//!
//! It provides:
//! - [`RequestExecutor`], which retries transient failures with exponential
//!   backoff,
//! - [`ActitoClient`], the Basic-auth JSON client for the services API,
//! - durable local databases for undelivered events and inbox items,
//! - the [`LaunchComponent`] lifecycle driven by [`Launcher`],
//! - the [`Actito`] facade exposing every peer module.

mod actito;
mod client;
mod context;
mod error;
mod executor;
mod options;
mod request;
mod wire;

#[cfg(test)]
mod test_support;

pub mod events;
pub mod in_app;
pub mod inbox;
pub mod launch;
pub mod models;
pub mod presentation;
pub mod store;
pub mod transport;

pub use actito::{Actito, ActitoBuilder};
pub use client::ActitoClient;
pub use context::Context;
pub use error::{ActitoError, NetworkError};
pub use executor::{RequestExecutor, ACCEPTED_STATUS};
pub use launch::{LaunchComponent, LaunchState, Launcher};
pub use options::{ActitoConfig, ActitoOptions, DEFAULT_SERVICES_URL};
pub use request::{ApiRequest, NetworkRequest};

pub type Result<T> = std::result::Result<T, ActitoError>;
