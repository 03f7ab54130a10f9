//! Processing context handed to kernels.
//!
//! The context is a kernel's only window into the network during
//! `process()`: typed reads from inports (resolving the resize cache for
//! image data) and typed writes to outports. Kernels never hold port data
//! across calls; ownership moves to the outport through the write
//! operations.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::GraphError;
use crate::model::image::{Image, ImageDims};
use crate::model::port::{PortDataType, PortKey};
use crate::model::property::{PropertyValue, Vec2};
use crate::network::{ImageSlot, PortData, ProcessorNetwork};

pub struct ProcessContext<'a> {
    network: &'a mut ProcessorNetwork,
    processor: Uuid,
}

impl<'a> ProcessContext<'a> {
    pub(crate) fn new(network: &'a mut ProcessorNetwork, processor: Uuid) -> Self {
        Self { network, processor }
    }

    pub fn processor_id(&self) -> Uuid {
        self.processor
    }

    fn key(&self, port: &str) -> PortKey {
        PortKey::new(self.processor, port)
    }

    // ----------------------------------------------------------- properties

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.network.properties(self.processor)?.get(name)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.property(name).and_then(PropertyValue::as_number)
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        self.property(name).and_then(PropertyValue::as_integer)
    }

    pub fn boolean(&self, name: &str) -> Option<bool> {
        self.property(name).and_then(PropertyValue::as_boolean)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.property(name).and_then(PropertyValue::as_text)
    }

    pub fn vec2(&self, name: &str) -> Option<Vec2> {
        self.property(name).and_then(PropertyValue::as_vec2)
    }

    // ---------------------------------------------------------------- reads

    /// Image visible through an inport: the upstream master at this port's
    /// requested dimensions, or the unresized master if the port lets the
    /// outport determine the size. `None` while disconnected.
    pub fn read_image(&mut self, port: &str) -> Result<Option<Arc<Image>>, GraphError> {
        let key = self.key(port);
        let (upstream, opted_out, requested) = match self.network.inport_state(&key) {
            Some(state) => (
                state.connections.first().cloned(),
                state.outport_determines_size,
                state.requested_dims,
            ),
            None => {
                return Err(GraphError::configuration(format!(
                    "unknown inport {}",
                    key
                )))
            }
        };
        let upstream = match upstream {
            Some(up) => up,
            None => return Ok(None),
        };
        if opted_out {
            Ok(self.network.outport_image(&upstream))
        } else {
            self.network.get_resized_image(&upstream, requested)
        }
    }

    /// All images visible through a multi-inport, in connection order.
    pub fn read_images(&mut self, port: &str) -> Result<Vec<Arc<Image>>, GraphError> {
        let key = self.key(port);
        let (connections, opted_out, requested) = match self.network.inport_state(&key) {
            Some(state) => (
                state.connections.clone(),
                state.outport_determines_size,
                state.requested_dims,
            ),
            None => {
                return Err(GraphError::configuration(format!(
                    "unknown inport {}",
                    key
                )))
            }
        };
        let mut images = Vec::with_capacity(connections.len());
        for upstream in connections {
            let image = if opted_out {
                self.network.outport_image(&upstream)
            } else {
                self.network.get_resized_image(&upstream, requested)?
            };
            if let Some(image) = image {
                images.push(image);
            }
        }
        Ok(images)
    }

    fn read_data(&self, port: &str) -> Option<PortData> {
        let key = self.key(port);
        let upstream = self.network.inport_state(&key)?.connections.first()?;
        self.network
            .outport_state(upstream)
            .map(|o| o.data.clone())
    }

    pub fn read_scalar(&self, port: &str) -> Option<f64> {
        match self.read_data(port)? {
            PortData::Scalar(v) => Some(v),
            PortData::Integer(v) => Some(v as f64),
            _ => None,
        }
    }

    pub fn read_integer(&self, port: &str) -> Option<i64> {
        match self.read_data(port)? {
            PortData::Integer(v) => Some(v),
            _ => None,
        }
    }

    pub fn read_boolean(&self, port: &str) -> Option<bool> {
        match self.read_data(port)? {
            PortData::Boolean(v) => Some(v),
            _ => None,
        }
    }

    pub fn read_text(&self, port: &str) -> Option<String> {
        match self.read_data(port)? {
            PortData::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn inport_changed(&self, port: &str) -> bool {
        self.network
            .inport_changed(&self.key(port))
            .unwrap_or(false)
    }

    /// Negotiated target dimensions for an image outport; producers render
    /// at this size.
    pub fn outport_dims(&self, port: &str) -> ImageDims {
        self.network
            .outport_dims(&self.key(port))
            .unwrap_or_else(|| self.network.default_dims())
    }

    // --------------------------------------------------------------- writes

    fn write_data(&mut self, port: &str, expected: PortDataType, data: PortData) -> Result<(), GraphError> {
        let key = self.key(port);
        let out = self.network.outport_state_mut(&key).ok_or_else(|| {
            GraphError::configuration(format!("unknown outport {}", key))
        })?;
        if !out.def.data_type.accepts(expected) {
            return Err(GraphError::configuration(format!(
                "outport {} does not carry {:?} data",
                key, expected
            )));
        }
        out.data = data;
        Ok(())
    }

    /// Publish an owned image on an outport. The outport takes ownership of
    /// the master; its dimensions follow the data and the resize cache is
    /// rebuilt lazily against the new master.
    pub fn write_image(&mut self, port: &str, image: Image) -> Result<(), GraphError> {
        let key = self.key(port);
        let out = self.network.outport_state_mut(&key).ok_or_else(|| {
            GraphError::configuration(format!("unknown outport {}", key))
        })?;
        if out.def.data_type != PortDataType::Image {
            return Err(GraphError::configuration(format!(
                "outport {} does not carry image data",
                key
            )));
        }
        out.dims = image.dims();
        out.data = PortData::Image(ImageSlot::Owned(Arc::new(image)));
        out.cache.clear();
        Ok(())
    }

    /// Publish externally owned image data on an outport. The outport only
    /// references the master: it never resizes or caches it.
    pub fn write_image_ref(&mut self, port: &str, image: Arc<Image>) -> Result<(), GraphError> {
        let key = self.key(port);
        let out = self.network.outport_state_mut(&key).ok_or_else(|| {
            GraphError::configuration(format!("unknown outport {}", key))
        })?;
        if out.def.data_type != PortDataType::Image {
            return Err(GraphError::configuration(format!(
                "outport {} does not carry image data",
                key
            )));
        }
        out.dims = image.dims();
        out.data = PortData::Image(ImageSlot::Referenced(image));
        out.cache.clear();
        Ok(())
    }

    pub fn write_scalar(&mut self, port: &str, value: f64) -> Result<(), GraphError> {
        self.write_data(port, PortDataType::Scalar, PortData::Scalar(value))
    }

    pub fn write_integer(&mut self, port: &str, value: i64) -> Result<(), GraphError> {
        self.write_data(port, PortDataType::Integer, PortData::Integer(value))
    }

    pub fn write_boolean(&mut self, port: &str, value: bool) -> Result<(), GraphError> {
        self.write_data(port, PortDataType::Boolean, PortData::Boolean(value))
    }

    pub fn write_text(&mut self, port: &str, value: impl Into<String>) -> Result<(), GraphError> {
        self.write_data(port, PortDataType::Text, PortData::Text(value.into()))
    }
}

impl ProcessorNetwork {
    /// Run a processor's kernel against the live network. The kernel is
    /// taken out for the duration of the call so the context can borrow the
    /// network mutably.
    pub(crate) fn run_processor(&mut self, id: Uuid) -> Result<(), GraphError> {
        let mut kernel = match self.node_mut(id).and_then(|n| n.kernel.take()) {
            Some(kernel) => kernel,
            None => {
                return Err(GraphError::processing(format!(
                    "processor {} has no kernel",
                    id
                )))
            }
        };
        let result = {
            let mut ctx = ProcessContext::new(self, id);
            kernel.process(&mut ctx)
        };
        if let Some(node) = self.node_mut(id) {
            node.kernel = Some(kernel);
        }
        result
    }
}
