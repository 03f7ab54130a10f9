//! Data model: ports, connections, properties, and image payloads.

pub mod connection;
pub mod image;
pub mod port;
pub mod property;
