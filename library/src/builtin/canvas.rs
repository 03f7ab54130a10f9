//! Terminal image consumer.

use std::sync::{Arc, Mutex};

use log::debug;

use crate::error::GraphError;
use crate::evaluation::context::ProcessContext;
use crate::model::image::Image;
use crate::model::port::{PortDataType, PortDefinition};
use crate::processor::{ProcessorCategory, ProcessorKernel, ProcessorTypeDefinition};

/// Shared slot a canvas publishes its latest frame into.
pub type CanvasCapture = Arc<Mutex<Option<Arc<Image>>>>;

/// Sink that consumes the image arriving on its inport. The requested
/// display size is set on the inport through `set_requested_dims`; an
/// optional capture slot receives every consumed frame.
pub struct Canvas {
    definition: ProcessorTypeDefinition,
    capture: Option<CanvasCapture>,
}

impl Canvas {
    pub fn new() -> Self {
        Self {
            definition: ProcessorTypeDefinition::new(
                "sink.canvas",
                "Canvas",
                ProcessorCategory::Sink,
            )
            .with_description("Displays the incoming image")
            .with_inputs(vec![PortDefinition::input(
                "image_in",
                "Image",
                PortDataType::Image,
            )]),
            capture: None,
        }
    }

    /// Canvas that stores every consumed frame into `slot`.
    pub fn with_capture(slot: CanvasCapture) -> Self {
        Self {
            capture: Some(slot),
            ..Self::new()
        }
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessorKernel for Canvas {
    fn definition(&self) -> &ProcessorTypeDefinition {
        &self.definition
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), GraphError> {
        let image = ctx
            .read_image("image_in")?
            .ok_or_else(|| GraphError::processing("canvas: no input image"))?;
        debug!("canvas consumed frame at {}", image.dims());
        if let Some(slot) = &self.capture {
            if let Ok(mut guard) = slot.lock() {
                *guard = Some(image);
            }
        }
        Ok(())
    }
}
