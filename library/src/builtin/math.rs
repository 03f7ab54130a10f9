//! Analysis and scalar math kernels.

use crate::error::GraphError;
use crate::evaluation::context::ProcessContext;
use crate::model::image::LayerKind;
use crate::model::port::{PortDataType, PortDefinition};
use crate::model::property::PropertyMap;
use crate::processor::{ProcessorCategory, ProcessorKernel, ProcessorTypeDefinition};

/// Mean luminance of the input image, as a 0..1 scalar.
pub struct Luminance {
    definition: ProcessorTypeDefinition,
}

impl Luminance {
    pub fn new() -> Self {
        Self {
            definition: ProcessorTypeDefinition::new(
                "analysis.luminance",
                "Luminance",
                ProcessorCategory::Analysis,
            )
            .with_description("Mean luminance of the input image")
            .with_inputs(vec![PortDefinition::input(
                "image_in",
                "Image",
                PortDataType::Image,
            )])
            .with_outputs(vec![PortDefinition::output(
                "value",
                "Value",
                PortDataType::Scalar,
            )]),
        }
    }
}

impl Default for Luminance {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessorKernel for Luminance {
    fn definition(&self) -> &ProcessorTypeDefinition {
        &self.definition
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), GraphError> {
        let input = ctx
            .read_image("image_in")?
            .ok_or_else(|| GraphError::processing("luminance: no input image"))?;
        let layer = input
            .layer(LayerKind::Color)
            .ok_or_else(|| GraphError::processing("luminance: input has no color layer"))?;
        let mut sum = 0u64;
        for px in layer.data.chunks_exact(4) {
            sum += (px[0] as u64 + px[1] as u64 + px[2] as u64) / 3;
        }
        let pixels = input.dims().area().max(1);
        let mean = sum as f64 / pixels as f64 / 255.0;
        ctx.write_scalar("value", mean)
    }
}

/// Sum of two scalars plus a constant bias. The second operand is
/// optional and treated as zero while disconnected.
pub struct Add {
    definition: ProcessorTypeDefinition,
}

impl Add {
    pub fn new() -> Self {
        let mut props = PropertyMap::new();
        props.set("bias", 0.0);
        Self {
            definition: ProcessorTypeDefinition::new("math.add", "Add", ProcessorCategory::Math)
                .with_description("a + b + bias")
                .with_inputs(vec![
                    PortDefinition::input("a", "A", PortDataType::Scalar),
                    PortDefinition::input("b", "B", PortDataType::Scalar).optional(),
                ])
                .with_outputs(vec![PortDefinition::output(
                    "sum",
                    "Sum",
                    PortDataType::Scalar,
                )])
                .with_default_properties(props),
        }
    }
}

impl Default for Add {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessorKernel for Add {
    fn definition(&self) -> &ProcessorTypeDefinition {
        &self.definition
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), GraphError> {
        let a = ctx
            .read_scalar("a")
            .ok_or_else(|| GraphError::processing("add: no value on inport a"))?;
        let b = ctx.read_scalar("b").unwrap_or(0.0);
        let bias = ctx.number("bias").unwrap_or(0.0);
        ctx.write_scalar("sum", a + b + bias)
    }
}
