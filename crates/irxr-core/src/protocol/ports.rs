//! Well-known port numbers.
//!
//! The server and the client use distinct ports for the same role so both
//! can run on one machine during development.  Discovery shares one port.
//!
//! | Role      | Server | Client |
//! |-----------|--------|--------|
//! | Discovery | 7720   | 7720   |
//! | Service   | 7721   | 7723   |
//! | Topic     | 7722   | 7724   |
//!
//! The client service port is reserved for server-to-client service calls
//! and is not bound by the current client.

/// Ports the server listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ServerPort {
    Discovery = 7720,
    Service = 7721,
    Topic = 7722,
}

/// Ports the client listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ClientPort {
    Discovery = 7720,
    Service = 7723,
    Topic = 7724,
}

impl ServerPort {
    /// Returns the numeric port.
    pub const fn port(self) -> u16 {
        self as u16
    }
}

impl ClientPort {
    /// Returns the numeric port.
    pub const fn port(self) -> u16 {
        self as u16
    }
}
