//! SAML/WS-Trust authentication for federated cloud control planes.
//!
//! [`Connector::client`] is the entry point: it returns an
//! [`AuthenticatedClient`] for a set of [`ConnectionParameters`], either from
//! the session cache or by running a fresh handshake.
//!
//! [`ConnectionParameters`]: config::ConnectionParameters

pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod connector;
#[cfg(feature = "cli")]
pub mod observability;

#[cfg(test)]
mod tests;

pub use auth::{Authenticate, AuthError, AuthPhase, SamlAuthenticator};
pub use client::AuthenticatedClient;
pub use config::{AuthClientConfig, ConnectionParameters};
pub use connector::Connector;
