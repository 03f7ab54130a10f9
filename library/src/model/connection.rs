//! Connection model for the processor network.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::port::PortKey;

/// A connection between two ports (a directed edge in the network).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Connection {
    pub id: Uuid,
    /// Source port (outport)
    pub from: PortKey,
    /// Destination port (inport)
    pub to: PortKey,
}

impl Connection {
    pub fn new(from: PortKey, to: PortKey) -> Self {
        Self {
            id: Uuid::new_v4(),
            from,
            to,
        }
    }
}
