//! Layered image payload exchanged through image ports.

use serde::{Deserialize, Serialize};

/// 2D extent of an image, in pixels.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ImageDims {
    pub width: u32,
    pub height: u32,
}

/// Fallback extent used before any consumer has made a real request.
pub const DEFAULT_DIMS: ImageDims = ImageDims {
    width: 8,
    height: 8,
};

impl ImageDims {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl std::fmt::Display for ImageDims {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Role of a layer within an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Color,
    Depth,
    Picking,
}

/// A single RGBA8 pixel plane.
#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    pub kind: LayerKind,
    pub data: Vec<u8>,
}

impl Layer {
    pub fn new(kind: LayerKind, dims: ImageDims) -> Self {
        Self {
            kind,
            data: vec![0; dims.area() as usize * 4],
        }
    }

    pub fn solid(kind: LayerKind, dims: ImageDims, rgba: [u8; 4]) -> Self {
        let mut data = Vec::with_capacity(dims.area() as usize * 4);
        for _ in 0..dims.area() {
            data.extend_from_slice(&rgba);
        }
        Self { kind, data }
    }
}

/// A stack of equally sized layers.
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    dims: ImageDims,
    layers: Vec<Layer>,
}

impl Image {
    /// Image with a single zeroed color layer.
    pub fn new(dims: ImageDims) -> Self {
        Self {
            dims,
            layers: vec![Layer::new(LayerKind::Color, dims)],
        }
    }

    pub fn solid(dims: ImageDims, rgba: [u8; 4]) -> Self {
        Self {
            dims,
            layers: vec![Layer::solid(LayerKind::Color, dims, rgba)],
        }
    }

    /// All layers must match `dims`; mismatched layers are resampled.
    pub fn with_layers(dims: ImageDims, layers: Vec<Layer>) -> Self {
        let layers = layers
            .into_iter()
            .map(|l| {
                if l.data.len() == dims.area() as usize * 4 {
                    l
                } else {
                    Layer::new(l.kind, dims)
                }
            })
            .collect();
        Self { dims, layers }
    }

    pub fn dims(&self) -> ImageDims {
        self.dims
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, kind: LayerKind) -> Option<&Layer> {
        self.layers.iter().find(|l| l.kind == kind)
    }

    pub fn layer_mut(&mut self, kind: LayerKind) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.kind == kind)
    }

    /// RGBA pixel at (x, y) of the color layer.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let layer = self.layer(LayerKind::Color)?;
        if x >= self.dims.width || y >= self.dims.height {
            return None;
        }
        let idx = (y as usize * self.dims.width as usize + x as usize) * 4;
        layer.data[idx..idx + 4].try_into().ok()
    }

    /// Nearest-neighbor resample of every layer to `dims`.
    pub fn resized(&self, dims: ImageDims) -> Image {
        if dims == self.dims {
            return self.clone();
        }
        let layers = self
            .layers
            .iter()
            .map(|layer| {
                let mut data = Vec::with_capacity(dims.area() as usize * 4);
                for y in 0..dims.height {
                    let src_y = (y as u64 * self.dims.height as u64 / dims.height.max(1) as u64)
                        .min(self.dims.height.saturating_sub(1) as u64)
                        as usize;
                    for x in 0..dims.width {
                        let src_x = (x as u64 * self.dims.width as u64 / dims.width.max(1) as u64)
                            .min(self.dims.width.saturating_sub(1) as u64)
                            as usize;
                        let idx = (src_y * self.dims.width as usize + src_x) * 4;
                        data.extend_from_slice(&layer.data[idx..idx + 4]);
                    }
                }
                Layer {
                    kind: layer.kind,
                    data,
                }
            })
            .collect();
        Image { dims, layers }
    }

    /// Resize in place, resampling existing content.
    pub fn resize(&mut self, dims: ImageDims) {
        if dims != self.dims {
            *self = self.resized(dims);
        }
    }
}
