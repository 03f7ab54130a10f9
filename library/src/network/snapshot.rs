//! Externally driven state round-trips.
//!
//! The concrete persistence format is out of scope; a snapshot is a plain
//! serde value describing properties, requested sizes, and edges. Restoring
//! drives everything back through the normal mutation operations, so the
//! invalidation cascade matches the live edits that produced the state.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GraphError;
use crate::model::image::ImageDims;
use crate::model::port::{PortDataType, PortKey};
use crate::model::property::PropertyMap;

use super::ProcessorNetwork;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ProcessorSnapshot {
    pub id: Uuid,
    pub type_id: String,
    pub enabled: bool,
    pub properties: PropertyMap,
    /// Requested dimensions per image inport.
    pub requested_dims: Vec<(String, ImageDims)>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ConnectionSnapshot {
    pub from: PortKey,
    pub to: PortKey,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NetworkSnapshot {
    pub processors: Vec<ProcessorSnapshot>,
    pub connections: Vec<ConnectionSnapshot>,
}

impl ProcessorNetwork {
    /// Capture the externally restorable state of the network.
    pub fn snapshot(&self) -> NetworkSnapshot {
        let processors = self
            .processor_ids()
            .iter()
            .filter_map(|&id| {
                let node = self.node(id)?;
                let requested_dims = node
                    .inports
                    .iter()
                    .filter(|p| p.def.data_type == PortDataType::Image)
                    .map(|p| (p.def.name.clone(), p.requested_dims))
                    .collect();
                Some(ProcessorSnapshot {
                    id,
                    type_id: node.type_id.clone(),
                    enabled: node.enabled,
                    properties: node.properties.clone(),
                    requested_dims,
                })
            })
            .collect();
        let connections = self
            .connections()
            .iter()
            .map(|c| ConnectionSnapshot {
                from: c.from.clone(),
                to: c.to.clone(),
            })
            .collect();
        NetworkSnapshot {
            processors,
            connections,
        }
    }

    /// Restore a snapshot onto the live network. Processors must already
    /// exist (kernels are live objects, not serialized); properties,
    /// enabled flags, requested sizes and edges are replayed through the
    /// regular operations.
    pub fn restore(&mut self, snapshot: &NetworkSnapshot) -> Result<(), GraphError> {
        for proc in &snapshot.processors {
            if !self.contains_processor(proc.id) {
                return Err(GraphError::configuration(format!(
                    "snapshot references unknown processor {} ({})",
                    proc.id, proc.type_id
                )));
            }
            if self.processor_type_id(proc.id) != Some(proc.type_id.as_str()) {
                return Err(GraphError::configuration(format!(
                    "snapshot type mismatch for processor {}: expected {}",
                    proc.id, proc.type_id
                )));
            }
        }

        for proc in &snapshot.processors {
            self.set_enabled(proc.id, proc.enabled);
            let entries: Vec<_> = proc
                .properties
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            for (name, value) in entries {
                self.set_property(proc.id, &name, value)?;
            }
            for (port, dims) in &proc.requested_dims {
                self.set_requested_dims(&PortKey::new(proc.id, port), *dims)?;
            }
        }

        // Tear down edges the snapshot does not contain, then add the
        // missing ones.
        let existing: Vec<(PortKey, PortKey)> = self
            .connections()
            .iter()
            .map(|c| (c.from.clone(), c.to.clone()))
            .collect();
        for (from, to) in &existing {
            let wanted = snapshot
                .connections
                .iter()
                .any(|c| c.from == *from && c.to == *to);
            if !wanted {
                self.disconnect(from, to)?;
            }
        }
        for conn in &snapshot.connections {
            if !self.has_connection(&conn.from, &conn.to) {
                self.connect(&conn.from, &conn.to)?;
            }
        }
        Ok(())
    }
}
