//! Image-to-image filter kernels.

use crate::error::GraphError;
use crate::evaluation::background::BackgroundCompute;
use crate::evaluation::context::ProcessContext;
use crate::model::image::{Image, Layer, LayerKind};
use crate::model::port::{PortDataType, PortDefinition};
use crate::model::property::PropertyMap;
use crate::processor::{ProcessorCategory, ProcessorKernel, ProcessorTypeDefinition};

/// Invert the RGB channels, leaving alpha untouched.
pub struct Invert {
    definition: ProcessorTypeDefinition,
}

impl Invert {
    pub fn new() -> Self {
        Self {
            definition: ProcessorTypeDefinition::new(
                "filter.invert",
                "Invert",
                ProcessorCategory::Filter,
            )
            .with_description("Invert RGB channels")
            .with_inputs(vec![PortDefinition::input(
                "image_in",
                "Image",
                PortDataType::Image,
            )])
            .with_outputs(vec![PortDefinition::output(
                "image_out",
                "Image",
                PortDataType::Image,
            )]),
        }
    }
}

impl Default for Invert {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessorKernel for Invert {
    fn definition(&self) -> &ProcessorTypeDefinition {
        &self.definition
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), GraphError> {
        let input = ctx
            .read_image("image_in")?
            .ok_or_else(|| GraphError::processing("invert: no input image"))?;
        let mut output = (*input).clone();
        if let Some(layer) = output.layer_mut(LayerKind::Color) {
            for px in layer.data.chunks_exact_mut(4) {
                px[0] = 255 - px[0];
                px[1] = 255 - px[1];
                px[2] = 255 - px[2];
            }
        }
        ctx.write_image("image_out", output)
    }
}

/// Forwards its input untouched. The inport accepts whatever size the
/// upstream outport has and the outport republishes the upstream master
/// by reference, so this node neither resizes nor caches anything.
pub struct Passthrough {
    definition: ProcessorTypeDefinition,
}

impl Passthrough {
    pub fn new() -> Self {
        Self {
            definition: ProcessorTypeDefinition::new(
                "filter.passthrough",
                "Passthrough",
                ProcessorCategory::Filter,
            )
            .with_description("Forward the upstream image unchanged")
            .with_inputs(vec![PortDefinition::input(
                "image_in",
                "Image",
                PortDataType::Image,
            )
            .outport_determines_size()])
            .with_outputs(vec![PortDefinition::output(
                "image_out",
                "Image",
                PortDataType::Image,
            )
            .fixed_size()]),
        }
    }
}

impl Default for Passthrough {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessorKernel for Passthrough {
    fn definition(&self) -> &ProcessorTypeDefinition {
        &self.definition
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), GraphError> {
        let input = ctx
            .read_image("image_in")?
            .ok_or_else(|| GraphError::processing("passthrough: no input image"))?;
        ctx.write_image_ref("image_out", input)
    }
}

/// Average any number of input images, resampled to the output size.
pub struct Blend {
    definition: ProcessorTypeDefinition,
}

impl Blend {
    pub fn new() -> Self {
        Self {
            definition: ProcessorTypeDefinition::new(
                "filter.blend",
                "Blend",
                ProcessorCategory::Filter,
            )
            .with_description("Average all connected images")
            .with_inputs(vec![PortDefinition::input(
                "images",
                "Images",
                PortDataType::Image,
            )
            .unbounded()])
            .with_outputs(vec![PortDefinition::output(
                "image_out",
                "Image",
                PortDataType::Image,
            )]),
        }
    }
}

impl Default for Blend {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessorKernel for Blend {
    fn definition(&self) -> &ProcessorTypeDefinition {
        &self.definition
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), GraphError> {
        let dims = ctx.outport_dims("image_out");
        let inputs = ctx.read_images("images")?;
        if inputs.is_empty() {
            return Err(GraphError::processing("blend: no input images"));
        }

        let mut acc = vec![0u32; dims.area() as usize * 4];
        for input in &inputs {
            let resampled;
            let source = if input.dims() == dims {
                &**input
            } else {
                resampled = input.resized(dims);
                &resampled
            };
            if let Some(layer) = source.layer(LayerKind::Color) {
                for (sum, &v) in acc.iter_mut().zip(layer.data.iter()) {
                    *sum += v as u32;
                }
            }
        }
        let count = inputs.len() as u32;
        let data = acc.iter().map(|sum| (sum / count) as u8).collect();
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

/// City-block distance to the nearest bright pixel, offloaded to a worker
/// thread. The result is committed synchronously within the same
/// `process()` call; superseded computations are discarded.
pub struct DistanceField {
    definition: ProcessorTypeDefinition,
    background: BackgroundCompute<Image>,
}

impl DistanceField {
    pub fn new() -> Self {
        let mut props = PropertyMap::new();
        props.set("threshold", 0.5);
        Self {
            definition: ProcessorTypeDefinition::new(
                "filter.distance_field",
                "Distance Field",
                ProcessorCategory::Filter,
            )
            .with_description("City-block distance to the nearest bright pixel")
            .with_inputs(vec![PortDefinition::input(
                "image_in",
                "Image",
                PortDataType::Image,
            )])
            .with_outputs(vec![PortDefinition::output(
                "image_out",
                "Image",
                PortDataType::Image,
            )])
            .with_default_properties(props),
            background: BackgroundCompute::new(),
        }
    }

    fn compute(input: &Image, threshold: f64) -> Image {
        let dims = input.dims();
        let w = dims.width as usize;
        let h = dims.height as usize;
        let cutoff = (threshold.clamp(0.0, 1.0) * 255.0) as u32;
        let far = (w + h) as u32;

        let mut dist = vec![far; w * h];
        if let Some(layer) = input.layer(LayerKind::Color) {
            for (i, px) in layer.data.chunks_exact(4).enumerate() {
                let luma = (px[0] as u32 + px[1] as u32 + px[2] as u32) / 3;
                if luma >= cutoff {
                    dist[i] = 0;
                }
            }
        }

        // Two-pass chamfer sweep over the 4-neighborhood.
        for y in 0..h {
            for x in 0..w {
                let i = y * w + x;
                if x > 0 {
                    dist[i] = dist[i].min(dist[i - 1] + 1);
                }
                if y > 0 {
                    dist[i] = dist[i].min(dist[i - w] + 1);
                }
            }
        }
        for y in (0..h).rev() {
            for x in (0..w).rev() {
                let i = y * w + x;
                if x + 1 < w {
                    dist[i] = dist[i].min(dist[i + 1] + 1);
                }
                if y + 1 < h {
                    dist[i] = dist[i].min(dist[i + w] + 1);
                }
            }
        }

        let mut data = Vec::with_capacity(w * h * 4);
        for d in dist {
            let v = d.min(255) as u8;
            data.extend_from_slice(&[v, v, v, 255]);
        }
        Image::with_layers(
            dims,
            vec![Layer {
                kind: LayerKind::Color,
                data,
            }],
        )
    }
}

impl Default for DistanceField {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessorKernel for DistanceField {
    fn definition(&self) -> &ProcessorTypeDefinition {
        &self.definition
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), GraphError> {
        let input = ctx
            .read_image("image_in")?
            .ok_or_else(|| GraphError::processing("distance field: no input image"))?;
        let threshold = ctx.number("threshold").unwrap_or(0.5);

        self.background
            .start(move || Self::compute(&input, threshold));
        match self.background.block_on_current() {
            Some(result) => ctx.write_image("image_out", result),
            None => Err(GraphError::processing(
                "distance field: background worker terminated",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::image::ImageDims;

    #[test]
    fn test_distance_field_zero_on_bright_pixels() {
        let dims = ImageDims::new(4, 1);
        let mut input = Image::solid(dims, [0, 0, 0, 255]);
        if let Some(layer) = input.layer_mut(LayerKind::Color) {
            layer.data[0..4].copy_from_slice(&[255, 255, 255, 255]);
        }

        let out = DistanceField::compute(&input, 0.5);
        assert_eq!(out.pixel(0, 0), Some([0, 0, 0, 255]));
        assert_eq!(out.pixel(1, 0), Some([1, 1, 1, 255]));
        assert_eq!(out.pixel(3, 0), Some([3, 3, 3, 255]));
    }

    #[test]
    fn test_distance_field_all_dark_saturates() {
        let dims = ImageDims::new(2, 2);
        let input = Image::solid(dims, [0, 0, 0, 255]);
        let out = DistanceField::compute(&input, 0.5);
        // No seed pixel anywhere: every distance stays at the width+height
        // upper bound.
        assert_eq!(out.pixel(0, 0), Some([4, 4, 4, 255]));
        assert_eq!(out.pixel(1, 1), Some([4, 4, 4, 255]));
    }
}
