//! Port model for the processor network.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::image::ImageDims;

/// Data type carried by a port (socket type).
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PortDataType {
    /// Layered image data
    Image,
    /// Floating point scalar (f64)
    Scalar,
    /// Integer value (i64)
    Integer,
    /// Boolean value
    Boolean,
    /// Text string
    Text,
    /// Accepts any type (generic)
    Any,
}

impl PortDataType {
    /// Whether an inport of this type accepts data of `other`.
    pub fn accepts(&self, other: PortDataType) -> bool {
        *self == PortDataType::Any || other == PortDataType::Any || *self == other
    }
}

/// Direction of a port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

/// Severity of staleness for a port or processor.
///
/// Ordered `Valid < InvalidOutput < InvalidResources`; a higher level
/// subsumes a lower one during propagation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InvalidationLevel {
    Valid,
    InvalidOutput,
    InvalidResources,
}

/// Definition of a port on a processor type.
#[derive(Clone, Debug)]
pub struct PortDefinition {
    /// Internal name used for connections (e.g. "image_in", "value")
    pub name: String,
    /// Display name shown by frontends (e.g. "Image", "Value")
    pub display_name: String,
    /// Whether this is an input or output port
    pub direction: PortDirection,
    /// Data type of this port
    pub data_type: PortDataType,
    /// Inports only: the owning processor can run without a connection here
    pub optional: bool,
    /// Inports only: maximum number of connected outports
    pub max_connections: usize,
    /// Image inports only: accept whatever size the outport currently has
    /// instead of taking part in size negotiation
    pub outport_determines_size: bool,
    /// Image outports only: resize the owned master data when a larger
    /// size is negotiated
    pub handle_resize_events: bool,
    /// Coordination group tag; all outports sharing a tag on one
    /// processor converge to the same negotiated size
    pub group: Option<String>,
}

impl PortDefinition {
    pub fn input(name: &str, display_name: &str, data_type: PortDataType) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            direction: PortDirection::Input,
            data_type,
            optional: false,
            max_connections: 1,
            outport_determines_size: false,
            handle_resize_events: true,
            group: None,
        }
    }

    pub fn output(name: &str, display_name: &str, data_type: PortDataType) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            direction: PortDirection::Output,
            data_type,
            optional: false,
            max_connections: usize::MAX,
            outport_determines_size: false,
            handle_resize_events: true,
            group: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Allow any number of upstream connections (multi-inport).
    pub fn unbounded(mut self) -> Self {
        self.max_connections = usize::MAX;
        self
    }

    pub fn outport_determines_size(mut self) -> Self {
        self.outport_determines_size = true;
        self
    }

    /// Mark an image outport as never resizing its data.
    pub fn fixed_size(mut self) -> Self {
        self.handle_resize_events = false;
        self
    }

    pub fn with_group(mut self, group: &str) -> Self {
        self.group = Some(group.to_string());
        self
    }
}

/// Identifies a specific port on a specific processor.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PortKey {
    pub processor: Uuid,
    pub port: String,
}

impl PortKey {
    pub fn new(processor: Uuid, port: &str) -> Self {
        Self {
            processor,
            port: port.to_string(),
        }
    }
}

impl std::fmt::Display for PortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.processor, self.port)
    }
}

/// Event delivered to port subscribers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortEvent {
    pub port: PortKey,
    pub kind: PortEventKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PortEventKind {
    /// The data visible through the port has changed since the owning
    /// processor last consumed it.
    Changed,
    /// The port transitioned from valid to invalid.
    Invalidated(InvalidationLevel),
    /// The negotiated size of an image outport changed.
    Resized(ImageDims),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalidation_level_ordering() {
        assert!(InvalidationLevel::Valid < InvalidationLevel::InvalidOutput);
        assert!(InvalidationLevel::InvalidOutput < InvalidationLevel::InvalidResources);
        assert_eq!(
            InvalidationLevel::InvalidOutput.max(InvalidationLevel::InvalidResources),
            InvalidationLevel::InvalidResources
        );
    }

    #[test]
    fn test_data_type_compatibility() {
        assert!(PortDataType::Image.accepts(PortDataType::Image));
        assert!(PortDataType::Any.accepts(PortDataType::Scalar));
        assert!(PortDataType::Scalar.accepts(PortDataType::Any));
        assert!(!PortDataType::Scalar.accepts(PortDataType::Image));
    }
}
