//! Domain types shared by the client and by test servers.
//!
//! - **`host_info`** – The identity record (`name`, `ip`, `topics`, `services`)
//!   that a server announces and that a client registers.
//! - **`subnet`** – Pure address arithmetic used to choose which local IPv4
//!   address should be advertised to a discovered server.

pub mod host_info;
pub mod subnet;
