//! Processor type definitions and the kernel trait.
//!
//! A `ProcessorTypeDefinition` describes what a processor of a given type
//! looks like: its ports and default properties. The behavior lives in a
//! `ProcessorKernel` implementation; instances are registered in a
//! `ProcessorNetwork`, which owns all graph state.

use crate::error::GraphError;
use crate::evaluation::context::ProcessContext;
use crate::model::port::{PortDefinition, PortDirection};
use crate::model::property::PropertyMap;

/// Category of a processor type, for grouping by frontends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessorCategory {
    /// Data producers (noise, solid color, geometry buffers)
    Source,
    /// Image-to-image operations
    Filter,
    /// Image analysis producing scalar data
    Analysis,
    /// Scalar/vector math
    Math,
    /// Terminal consumers (canvas)
    Sink,
    /// Plugin-defined custom category
    Custom,
}

impl std::fmt::Display for ProcessorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProcessorCategory::Source => "Source",
            ProcessorCategory::Filter => "Filter",
            ProcessorCategory::Analysis => "Analysis",
            ProcessorCategory::Math => "Math",
            ProcessorCategory::Sink => "Sink",
            ProcessorCategory::Custom => "Custom",
        };
        write!(f, "{}", s)
    }
}

/// Definition of a processor type.
#[derive(Debug, Clone)]
pub struct ProcessorTypeDefinition {
    /// Unique type identifier (e.g. "source.noise", "filter.invert")
    pub type_id: String,
    /// Human-readable name (e.g. "Noise Source")
    pub display_name: String,
    /// Category for grouping
    pub category: ProcessorCategory,
    /// Description shown in tooltips
    pub description: String,
    /// Input port definitions
    pub inputs: Vec<PortDefinition>,
    /// Output port definitions
    pub outputs: Vec<PortDefinition>,
    /// Default properties for new instances of this type
    pub default_properties: PropertyMap,
}

impl ProcessorTypeDefinition {
    pub fn new(type_id: &str, display_name: &str, category: ProcessorCategory) -> Self {
        Self {
            type_id: type_id.to_string(),
            display_name: display_name.to_string(),
            category,
            description: String::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            default_properties: PropertyMap::new(),
        }
    }

    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = desc.to_string();
        self
    }

    pub fn with_inputs(mut self, inputs: Vec<PortDefinition>) -> Self {
        debug_assert!(inputs
            .iter()
            .all(|p| p.direction == PortDirection::Input));
        self.inputs = inputs;
        self
    }

    pub fn with_outputs(mut self, outputs: Vec<PortDefinition>) -> Self {
        debug_assert!(outputs
            .iter()
            .all(|p| p.direction == PortDirection::Output));
        self.outputs = outputs;
        self
    }

    pub fn with_default_properties(mut self, properties: PropertyMap) -> Self {
        self.default_properties = properties;
        self
    }

    pub fn input(&self, name: &str) -> Option<&PortDefinition> {
        self.inputs.iter().find(|p| p.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&PortDefinition> {
        self.outputs.iter().find(|p| p.name == name)
    }
}

/// Behavior of a processor: reads inports, writes outports.
///
/// Kernels must not retain references to port data beyond the `process`
/// call; ownership is transferred to the outport explicitly through the
/// context's write operations.
pub trait ProcessorKernel: Send {
    fn definition(&self) -> &ProcessorTypeDefinition;

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), GraphError>;
}
