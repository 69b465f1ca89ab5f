//! Infrastructure layer: concrete sockets, interface enumeration and config.
//!
//! - [`discovery`] – non-blocking UDP receiver for server announcements.
//! - [`tcp`] – framed TCP publisher, subscriber and requester.
//! - [`interfaces`] – local IPv4 address enumeration.
//! - [`config`] – TOML configuration file.
//! - [`mock`] – in-memory transport used by tests.

pub mod config;
pub mod discovery;
pub mod interfaces;
pub mod mock;
pub mod tcp;
