//! Dataflow processor-network engine.
//!
//! Processors exchange typed data through ports; the network owns the
//! graph, propagates invalidation downstream, negotiates image sizes with
//! a per-outport resize cache, and an evaluator recomputes stale
//! processors in topological order.

pub mod builtin;
pub mod error;
pub mod evaluation;
pub mod model;
pub mod network;
pub mod processor;
pub mod util;

pub use error::GraphError;
pub use evaluation::background::BackgroundCompute;
pub use evaluation::context::ProcessContext;
pub use evaluation::evaluator::{EvaluationReport, NetworkEvaluator};
pub use model::image::{Image, ImageDims, Layer, LayerKind, DEFAULT_DIMS};
pub use model::port::{
    InvalidationLevel, PortDataType, PortDefinition, PortDirection, PortEvent, PortEventKind,
    PortKey,
};
pub use model::property::{PropertyMap, PropertyValue, Vec2};
pub use network::snapshot::{ConnectionSnapshot, NetworkSnapshot, ProcessorSnapshot};
pub use network::{CallbackHandle, ImageSlot, PortData, ProcessorNetwork, ProcessorStatus};
pub use processor::{ProcessorCategory, ProcessorKernel, ProcessorTypeDefinition};
