//! Application layer for the client.
//!
//! # What lives here?
//!
//! - **`transport`** – the socket traits the rest of the layer is written
//!   against.  Concrete sockets live in the infrastructure layer.
//!
//! - **`subnet_matcher`** – chooses the local address on the server's subnet.
//!
//! - **`registry`** – this client's `HostInfo` and the service callbacks.
//!
//! - **`pubsub`** / **`reqres`** – the two messaging channels.
//!
//! - **`net_manager`** – the Idle/Connected state machine that discovers the
//!   server, wires the channels up on announcement and tears them down when
//!   the server goes quiet.

pub mod net_manager;
pub mod pubsub;
pub mod registry;
pub mod reqres;
pub mod subnet_matcher;
pub mod transport;
