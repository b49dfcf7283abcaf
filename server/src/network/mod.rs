//! Network layer for the arena server.

mod server;

pub use server::Server;
