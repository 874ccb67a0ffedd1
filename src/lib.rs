//! Declarative management of users, applications and authenticators in an
//! Okta-style identity API.
//!
//! The [`reconciler`] moves a remote user from its recorded state to a
//! desired configuration through the [`client::DirectoryApi`] trait;
//! [`client::OktaClient`] implements that trait over HTTP.

pub mod apps;
pub mod authenticators;
pub mod client;
pub mod config;
pub mod models;
#[cfg(feature = "cli")]
pub mod observability;
pub mod reconciler;
pub mod schema;

#[cfg(test)]
mod tests;
