//! Image sources: deterministic producers that render at whatever size
//! their outports have negotiated.

use crate::error::GraphError;
use crate::evaluation::context::ProcessContext;
use crate::model::image::{Image, ImageDims, Layer, LayerKind};
use crate::model::port::{PortDataType, PortDefinition};
use crate::model::property::PropertyMap;
use crate::processor::{ProcessorCategory, ProcessorKernel, ProcessorTypeDefinition};

/// Deterministic pseudo-noise, seeded through the "seed" property.
pub struct NoiseSource {
    definition: ProcessorTypeDefinition,
}

impl NoiseSource {
    pub fn new() -> Self {
        let mut props = PropertyMap::new();
        props.set("seed", 0i64);
        Self {
            definition: ProcessorTypeDefinition::new(
                "source.noise",
                "Noise Source",
                ProcessorCategory::Source,
            )
            .with_description("Deterministic hash noise")
            .with_outputs(vec![PortDefinition::output(
                "image_out",
                "Image",
                PortDataType::Image,
            )])
            .with_default_properties(props),
        }
    }
}

impl Default for NoiseSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessorKernel for NoiseSource {
    fn definition(&self) -> &ProcessorTypeDefinition {
        &self.definition
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), GraphError> {
        let dims = ctx.outport_dims("image_out");
        let seed = ctx.integer("seed").unwrap_or(0);
        let mut data = Vec::with_capacity(dims.area() as usize * 4);
        for y in 0..dims.height as i64 {
            for x in 0..dims.width as i64 {
                let v = ((x * 31 + y * 17 + seed * 13) % 256) as u8;
                data.extend_from_slice(&[v, v, v, 255]);
            }
        }
        let image = Image::with_layers(
            dims,
            vec![Layer {
                kind: LayerKind::Color,
                data,
            }],
        );
        ctx.write_image("image_out", image)
    }
}

/// Uniform gray image; the "value" property is the 0..1 brightness.
pub struct SolidSource {
    definition: ProcessorTypeDefinition,
}

impl SolidSource {
    pub fn new() -> Self {
        let mut props = PropertyMap::new();
        props.set("value", 0.5);
        Self {
            definition: ProcessorTypeDefinition::new(
                "source.solid",
                "Solid Source",
                ProcessorCategory::Source,
            )
            .with_description("Uniform gray image")
            .with_outputs(vec![PortDefinition::output(
                "image_out",
                "Image",
                PortDataType::Image,
            )])
            .with_default_properties(props),
        }
    }
}

impl Default for SolidSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessorKernel for SolidSource {
    fn definition(&self) -> &ProcessorTypeDefinition {
        &self.definition
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), GraphError> {
        let dims = ctx.outport_dims("image_out");
        let value = ctx.number("value").unwrap_or(0.5).clamp(0.0, 1.0);
        let gray = (value * 255.0).round() as u8;
        ctx.write_image("image_out", Image::solid(dims, [gray, gray, gray, 255]))
    }
}

/// Multi-outport source whose color, depth and picking outputs share one
/// size coordination group, so all three stay at the same resolution.
pub struct GBufferSource {
    definition: ProcessorTypeDefinition,
}

impl GBufferSource {
    pub const GROUP: &'static str = "gbuffer";

    pub fn new() -> Self {
        Self {
            definition: ProcessorTypeDefinition::new(
                "source.gbuffer",
                "GBuffer Source",
                ProcessorCategory::Source,
            )
            .with_description("Color, depth and picking buffers at a shared size")
            .with_outputs(vec![
                PortDefinition::output("color", "Color", PortDataType::Image)
                    .with_group(Self::GROUP),
                PortDefinition::output("depth", "Depth", PortDataType::Image)
                    .with_group(Self::GROUP),
                PortDefinition::output("picking", "Picking", PortDataType::Image)
                    .with_group(Self::GROUP),
            ]),
        }
    }

    fn gradient(dims: ImageDims, kind: LayerKind, channel: usize) -> Image {
        let mut data = Vec::with_capacity(dims.area() as usize * 4);
        for y in 0..dims.height {
            for x in 0..dims.width {
                let v = ((x + y) % 256) as u8;
                let mut px = [0u8, 0, 0, 255];
                px[channel] = v;
                data.extend_from_slice(&px);
            }
        }
        Image::with_layers(dims, vec![Layer { kind, data }])
    }
}

impl Default for GBufferSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessorKernel for GBufferSource {
    fn definition(&self) -> &ProcessorTypeDefinition {
        &self.definition
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), GraphError> {
        // The group keeps all three at the same negotiated size; any of
        // the outports reports it.
        let dims = ctx.outport_dims("color");
        ctx.write_image("color", Self::gradient(dims, LayerKind::Color, 0))?;
        ctx.write_image("depth", Self::gradient(dims, LayerKind::Depth, 1))?;
        ctx.write_image("picking", Self::gradient(dims, LayerKind::Picking, 2))?;
        Ok(())
    }
}
