//! The processor network: sole owner of processors and connection edges.
//!
//! Ports never hold owning references to their peers; every back-reference
//! (inport to outport, port to owning processor) is a `PortKey` resolved by
//! graph lookup. Connections exist only in the network's edge list, so
//! removing a processor tears down every edge that touches it and no
//! dangling peer reference can survive.

pub mod analysis;
pub mod invalidation;
pub mod resize;
pub mod snapshot;

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use uuid::Uuid;

use crate::error::GraphError;
use crate::model::connection::Connection;
use crate::model::image::{Image, ImageDims, DEFAULT_DIMS};
use crate::model::port::{
    InvalidationLevel, PortDataType, PortDefinition, PortEvent, PortEventKind, PortKey,
};
use crate::model::property::{PropertyMap, PropertyValue};
use crate::processor::ProcessorKernel;
use resize::ResizeCache;

/// Data held by an outport.
#[derive(Clone, Debug)]
pub enum PortData {
    Empty,
    Scalar(f64),
    Integer(i64),
    Boolean(bool),
    Text(String),
    Image(ImageSlot),
}

impl PortData {
    pub fn is_empty(&self) -> bool {
        matches!(self, PortData::Empty)
    }
}

/// Ownership mode of image data on an outport. Switching mode happens only
/// through an explicit write (`write_image` vs `write_image_ref`), never by
/// inference.
#[derive(Clone, Debug)]
pub enum ImageSlot {
    /// The outport owns the master and may resize it in place.
    Owned(Arc<Image>),
    /// Externally owned data; returned unresized, never cached.
    Referenced(Arc<Image>),
}

impl ImageSlot {
    pub fn image(&self) -> &Arc<Image> {
        match self {
            ImageSlot::Owned(img) | ImageSlot::Referenced(img) => img,
        }
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, ImageSlot::Owned(_))
    }
}

/// Observable state of a processor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProcessorStatus {
    /// Computed successfully and up to date.
    Valid,
    /// Stale; will run on the next evaluation pass.
    Invalid(InvalidationLevel),
    /// Skipped by the evaluator (disabled or missing mandatory input).
    NotReady,
    /// Last `process()` call failed; retried on the next pass.
    Error(String),
}

/// Runtime state of an inport.
pub(crate) struct InportState {
    pub def: PortDefinition,
    /// Connected outports, in connection order.
    pub connections: Vec<PortKey>,
    pub level: InvalidationLevel,
    /// Data read through this port differs from what the owning processor
    /// last observed. Reset only after a successful `process()`.
    pub changed: bool,
    /// Outports that contributed to the most recent change (per-edge dirty
    /// markers).
    pub changed_sources: Vec<PortKey>,
    pub requested_dims: ImageDims,
    pub outport_determines_size: bool,
}

/// Runtime state of an outport.
pub(crate) struct OutportState {
    pub def: PortDefinition,
    /// Connected inports, in connection order.
    pub connections: Vec<PortKey>,
    pub level: InvalidationLevel,
    pub data: PortData,
    /// Master dimensions (image outports).
    pub dims: ImageDims,
    pub handle_resize_events: bool,
    pub cache: ResizeCache,
}

impl OutportState {
    /// True iff this outport owns its data and resizing is enabled.
    /// Referenced data is never resized.
    pub fn handles_resize(&self) -> bool {
        self.handle_resize_events
            && !matches!(self.data, PortData::Image(ImageSlot::Referenced(_)))
    }
}

/// A processor instance registered in the network.
pub struct ProcessorNode {
    pub id: Uuid,
    pub name: String,
    pub(crate) type_id: String,
    pub(crate) kernel: Option<Box<dyn ProcessorKernel>>,
    pub(crate) properties: PropertyMap,
    pub(crate) enabled: bool,
    pub(crate) level: InvalidationLevel,
    pub(crate) last_error: Option<String>,
    pub(crate) inports: Vec<InportState>,
    pub(crate) outports: Vec<OutportState>,
}

impl ProcessorNode {
    pub(crate) fn inport(&self, name: &str) -> Option<&InportState> {
        self.inports.iter().find(|p| p.def.name == name)
    }

    pub(crate) fn inport_mut(&mut self, name: &str) -> Option<&mut InportState> {
        self.inports.iter_mut().find(|p| p.def.name == name)
    }

    pub(crate) fn outport(&self, name: &str) -> Option<&OutportState> {
        self.outports.iter().find(|p| p.def.name == name)
    }

    pub(crate) fn outport_mut(&mut self, name: &str) -> Option<&mut OutportState> {
        self.outports.iter_mut().find(|p| p.def.name == name)
    }
}

/// Token returned by a subscription, used for removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallbackHandle(u64);

type Callback = Box<dyn Fn(&PortEvent)>;

#[derive(Default)]
struct CallbackRegistry {
    next: u64,
    on_change: HashMap<PortKey, Vec<(u64, Callback)>>,
    on_invalid: HashMap<PortKey, Vec<(u64, Callback)>>,
}

impl CallbackRegistry {
    fn fire(&self, event: &PortEvent) {
        let list = match event.kind {
            PortEventKind::Invalidated(_) => self.on_invalid.get(&event.port),
            PortEventKind::Changed | PortEventKind::Resized(_) => {
                self.on_change.get(&event.port)
            }
        };
        if let Some(list) = list {
            for (_, callback) in list {
                callback(event);
            }
        }
    }
}

/// The graph: a set of processors plus the connection edges between their
/// ports.
pub struct ProcessorNetwork {
    processors: HashMap<Uuid, ProcessorNode>,
    /// Declaration order; drives deterministic scheduling tie-breaks.
    order: Vec<Uuid>,
    connections: Vec<Connection>,
    default_dims: ImageDims,
    callbacks: CallbackRegistry,
    /// Events collected during a mutation, dispatched synchronously once
    /// the mutation has finished and the graph is consistent again.
    pub(crate) pending_events: Vec<PortEvent>,
}

impl Default for ProcessorNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessorNetwork {
    pub fn new() -> Self {
        Self::with_default_dims(DEFAULT_DIMS)
    }

    /// Use an externally supplied default size for image ports before any
    /// real request exists.
    pub fn with_default_dims(default_dims: ImageDims) -> Self {
        Self {
            processors: HashMap::new(),
            order: Vec::new(),
            connections: Vec::new(),
            default_dims,
            callbacks: CallbackRegistry::default(),
            pending_events: Vec::new(),
        }
    }

    pub fn default_dims(&self) -> ImageDims {
        self.default_dims
    }

    // ---------------------------------------------------------------- nodes

    pub fn add_processor(&mut self, kernel: impl ProcessorKernel + 'static) -> Uuid {
        self.add_processor_with_id(Uuid::new_v4(), kernel)
    }

    pub fn add_processor_with_id(
        &mut self,
        id: Uuid,
        kernel: impl ProcessorKernel + 'static,
    ) -> Uuid {
        let kernel: Box<dyn ProcessorKernel> = Box::new(kernel);
        let def = kernel.definition();
        let inports = def
            .inputs
            .iter()
            .map(|p| InportState {
                def: p.clone(),
                connections: Vec::new(),
                level: InvalidationLevel::Valid,
                changed: false,
                changed_sources: Vec::new(),
                requested_dims: self.default_dims,
                outport_determines_size: p.outport_determines_size,
            })
            .collect();
        let outports = def
            .outputs
            .iter()
            .map(|p| OutportState {
                def: p.clone(),
                connections: Vec::new(),
                level: InvalidationLevel::InvalidResources,
                data: PortData::Empty,
                dims: self.default_dims,
                handle_resize_events: p.handle_resize_events,
                cache: ResizeCache::new(),
            })
            .collect();
        let node = ProcessorNode {
            id,
            name: def.display_name.clone(),
            type_id: def.type_id.clone(),
            properties: def.default_properties.clone(),
            kernel: Some(kernel),
            enabled: true,
            level: InvalidationLevel::InvalidResources,
            last_error: None,
            inports,
            outports,
        };
        debug!("add processor {} ({})", node.name, id);
        self.processors.insert(id, node);
        self.order.push(id);
        id
    }

    /// Remove a processor and every edge that touches it. Peers are
    /// unregistered before the node is dropped, so no stale reference to
    /// the removed processor remains anywhere in the graph.
    pub fn remove_processor(&mut self, id: Uuid) -> Result<(), GraphError> {
        if !self.processors.contains_key(&id) {
            return Err(GraphError::configuration(format!(
                "processor {} not found",
                id
            )));
        }
        let edges: Vec<(PortKey, PortKey)> = self
            .connections
            .iter()
            .filter(|c| c.from.processor == id || c.to.processor == id)
            .map(|c| (c.from.clone(), c.to.clone()))
            .collect();
        for (from, to) in edges {
            self.disconnect(&from, &to)?;
        }
        self.callbacks.on_change.retain(|k, _| k.processor != id);
        self.callbacks.on_invalid.retain(|k, _| k.processor != id);
        self.processors.remove(&id);
        self.order.retain(|p| *p != id);
        debug!("removed processor {}", id);
        Ok(())
    }

    pub fn processor_ids(&self) -> &[Uuid] {
        &self.order
    }

    pub fn contains_processor(&self, id: Uuid) -> bool {
        self.processors.contains_key(&id)
    }

    pub(crate) fn node(&self, id: Uuid) -> Option<&ProcessorNode> {
        self.processors.get(&id)
    }

    pub(crate) fn node_mut(&mut self, id: Uuid) -> Option<&mut ProcessorNode> {
        self.processors.get_mut(&id)
    }

    pub fn processor_label(&self, id: Uuid) -> String {
        self.node(id)
            .map(|n| n.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    pub fn processor_type_id(&self, id: Uuid) -> Option<&str> {
        self.node(id).map(|n| n.type_id.as_str())
    }

    pub fn processor_level(&self, id: Uuid) -> Option<InvalidationLevel> {
        self.node(id).map(|n| n.level)
    }

    pub fn processor_status(&self, id: Uuid) -> Option<ProcessorStatus> {
        let node = self.node(id)?;
        if let Some(err) = &node.last_error {
            return Some(ProcessorStatus::Error(err.clone()));
        }
        if !self.is_ready(id) {
            return Some(ProcessorStatus::NotReady);
        }
        match node.level {
            InvalidationLevel::Valid => Some(ProcessorStatus::Valid),
            level => Some(ProcessorStatus::Invalid(level)),
        }
    }

    pub fn is_enabled(&self, id: Uuid) -> bool {
        self.node(id).map(|n| n.enabled).unwrap_or(false)
    }

    pub fn set_enabled(&mut self, id: Uuid, enabled: bool) {
        let changed = match self.node_mut(id) {
            Some(node) if node.enabled != enabled => {
                node.enabled = enabled;
                true
            }
            _ => false,
        };
        if changed && enabled {
            self.invalidate_processor(id, InvalidationLevel::InvalidOutput);
        }
    }

    /// True iff every mandatory inport has at least one connection
    /// delivering valid data. Optional ports are exempt; a disabled
    /// processor is never ready.
    pub fn is_ready(&self, id: Uuid) -> bool {
        let node = match self.node(id) {
            Some(n) => n,
            None => return false,
        };
        if !node.enabled {
            return false;
        }
        node.inports.iter().filter(|p| !p.def.optional).all(|p| {
            !p.connections.is_empty()
                && p.connections.iter().all(|up| {
                    self.outport_state(up)
                        .map(|o| o.level == InvalidationLevel::Valid && !o.data.is_empty())
                        .unwrap_or(false)
                })
        })
    }

    // ----------------------------------------------------------- properties

    pub fn properties(&self, id: Uuid) -> Option<&PropertyMap> {
        self.node(id).map(|n| &n.properties)
    }

    /// Parameter-change entry point of the propagation protocol: a property
    /// that actually changes value invalidates the owning processor.
    pub fn set_property(
        &mut self,
        id: Uuid,
        name: &str,
        value: impl Into<PropertyValue>,
    ) -> Result<(), GraphError> {
        let node = self.node_mut(id).ok_or_else(|| {
            GraphError::configuration(format!("processor {} not found", id))
        })?;
        if node.properties.set_changed(name, value) {
            self.invalidate_processor(id, InvalidationLevel::InvalidOutput);
        }
        Ok(())
    }

    // ---------------------------------------------------------- port state

    pub(crate) fn inport_state(&self, key: &PortKey) -> Option<&InportState> {
        self.node(key.processor)?.inport(&key.port)
    }

    pub(crate) fn inport_state_mut(&mut self, key: &PortKey) -> Option<&mut InportState> {
        self.node_mut(key.processor)?.inport_mut(&key.port)
    }

    pub(crate) fn outport_state(&self, key: &PortKey) -> Option<&OutportState> {
        self.node(key.processor)?.outport(&key.port)
    }

    pub(crate) fn outport_state_mut(&mut self, key: &PortKey) -> Option<&mut OutportState> {
        self.node_mut(key.processor)?.outport_mut(&key.port)
    }

    pub fn outport_dims(&self, key: &PortKey) -> Option<ImageDims> {
        self.outport_state(key).map(|o| o.dims)
    }

    pub fn outport_level(&self, key: &PortKey) -> Option<InvalidationLevel> {
        self.outport_state(key).map(|o| o.level)
    }

    /// Master image of an outport, without any resizing.
    pub fn outport_image(&self, key: &PortKey) -> Option<Arc<Image>> {
        match &self.outport_state(key)?.data {
            PortData::Image(slot) => Some(slot.image().clone()),
            _ => None,
        }
    }

    pub fn requested_dims(&self, key: &PortKey) -> Option<ImageDims> {
        self.inport_state(key).map(|p| p.requested_dims)
    }

    pub fn inport_changed(&self, key: &PortKey) -> Option<bool> {
        self.inport_state(key).map(|p| p.changed)
    }

    pub fn changed_sources(&self, key: &PortKey) -> Option<&[PortKey]> {
        self.inport_state(key).map(|p| p.changed_sources.as_slice())
    }

    pub fn inport_connection_count(&self, key: &PortKey) -> usize {
        self.inport_state(key)
            .map(|p| p.connections.len())
            .unwrap_or(0)
    }

    // ---------------------------------------------------------- connections

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn has_connection(&self, from: &PortKey, to: &PortKey) -> bool {
        self.connections
            .iter()
            .any(|c| c.from == *from && c.to == *to)
    }

    /// Validate a prospective connection without mutating the graph.
    ///
    /// Type and cardinality compatibility is resolved here, once, at
    /// connection time; the edge list itself is the cached result and the
    /// check is never repeated per evaluation pass.
    pub fn can_connect(&self, from: &PortKey, to: &PortKey) -> Result<(), GraphError> {
        let out = self.outport_state(from).ok_or_else(|| {
            GraphError::connection(format!("outport {} not found", from))
        })?;
        let inp = self.inport_state(to).ok_or_else(|| {
            GraphError::connection(format!("inport {} not found", to))
        })?;
        if from.processor == to.processor {
            return Err(GraphError::connection(
                "cannot connect a processor to itself",
            ));
        }
        if self.has_connection(from, to) {
            return Err(GraphError::connection(format!(
                "{} is already connected to {}",
                from, to
            )));
        }
        if !inp.def.data_type.accepts(out.def.data_type) {
            return Err(GraphError::connection(format!(
                "type mismatch: {:?} outport {} cannot feed {:?} inport {}",
                out.def.data_type, from, inp.def.data_type, to
            )));
        }
        if inp.connections.len() >= inp.def.max_connections {
            return Err(GraphError::connection(format!(
                "inport {} already at capacity ({})",
                to, inp.def.max_connections
            )));
        }
        if analysis::would_create_cycle(self, from.processor, to.processor) {
            return Err(GraphError::cycle(format!(
                "connecting {} to {} would close a cycle",
                from, to
            )));
        }
        Ok(())
    }

    /// Establish an edge from an outport to an inport.
    ///
    /// Fails (leaving the graph unchanged) if the pairing is rejected; on
    /// success the consumer is invalidated and, for image ports, an initial
    /// size-negotiation round runs before any data flows.
    pub fn connect(&mut self, from: &PortKey, to: &PortKey) -> Result<Uuid, GraphError> {
        self.can_connect(from, to)?;

        let connection = Connection::new(from.clone(), to.clone());
        let id = connection.id;
        self.connections.push(connection);
        if let Some(out) = self.outport_state_mut(from) {
            out.connections.push(to.clone());
        }
        let negotiate = {
            let inp = self.inport_state_mut(to).expect("validated above");
            inp.connections.push(from.clone());
            inp.def.data_type == PortDataType::Image && !inp.outport_determines_size
        };
        debug!("connected {} -> {}", from, to);

        if negotiate {
            let requested = self
                .inport_state(to)
                .map(|p| p.requested_dims)
                .unwrap_or(self.default_dims);
            self.propagate_resize(from, requested)?;
        }

        // New upstream data is now visible to the consumer.
        if self.mark_inport(to, Some(from), InvalidationLevel::InvalidOutput) {
            self.invalidate_processor_inner(to.processor, InvalidationLevel::InvalidOutput);
        }
        self.dispatch_events();
        Ok(id)
    }

    /// Remove the edge in both directions. An inport losing its last
    /// connection has no data anymore; the owning processor is invalidated
    /// either way since its visible input changed.
    pub fn disconnect(&mut self, from: &PortKey, to: &PortKey) -> Result<(), GraphError> {
        let idx = self
            .connections
            .iter()
            .position(|c| c.from == *from && c.to == *to)
            .ok_or_else(|| {
                GraphError::connection(format!("no connection from {} to {}", from, to))
            })?;
        self.connections.remove(idx);
        if let Some(out) = self.outport_state_mut(from) {
            out.connections.retain(|k| k != to);
        }
        if let Some(inp) = self.inport_state_mut(to) {
            inp.connections.retain(|k| k != from);
            inp.changed_sources.retain(|k| k != from);
        }
        debug!("disconnected {} -> {}", from, to);

        if self.mark_inport(to, None, InvalidationLevel::InvalidOutput) {
            self.invalidate_processor_inner(to.processor, InvalidationLevel::InvalidOutput);
        }
        self.dispatch_events();
        Ok(())
    }

    pub fn predecessors(&self, id: Uuid) -> Vec<Uuid> {
        analysis::predecessors(self, id)
    }

    // -------------------------------------------------------- subscriptions

    /// Subscribe to change notifications on a port. Fired synchronously on
    /// the evaluation thread right before the owning processor runs, and
    /// for resize notifications on image outports.
    pub fn on_change(
        &mut self,
        port: &PortKey,
        callback: impl Fn(&PortEvent) + 'static,
    ) -> CallbackHandle {
        self.callbacks.next += 1;
        let token = self.callbacks.next;
        self.callbacks
            .on_change
            .entry(port.clone())
            .or_default()
            .push((token, Box::new(callback)));
        CallbackHandle(token)
    }

    /// Subscribe to invalidation on a port. Fired exactly once per
    /// valid-to-invalid transition.
    pub fn on_invalid(
        &mut self,
        port: &PortKey,
        callback: impl Fn(&PortEvent) + 'static,
    ) -> CallbackHandle {
        self.callbacks.next += 1;
        let token = self.callbacks.next;
        self.callbacks
            .on_invalid
            .entry(port.clone())
            .or_default()
            .push((token, Box::new(callback)));
        CallbackHandle(token)
    }

    pub fn remove_on_change(&mut self, port: &PortKey, handle: CallbackHandle) {
        if let Some(list) = self.callbacks.on_change.get_mut(port) {
            list.retain(|(token, _)| *token != handle.0);
        }
    }

    pub fn remove_on_invalid(&mut self, port: &PortKey, handle: CallbackHandle) {
        if let Some(list) = self.callbacks.on_invalid.get_mut(port) {
            list.retain(|(token, _)| *token != handle.0);
        }
    }

    pub(crate) fn dispatch_events(&mut self) {
        if self.pending_events.is_empty() {
            return;
        }
        let events = std::mem::take(&mut self.pending_events);
        // Callbacks only receive the event, never the network, so firing
        // them cannot re-enter a graph mutation.
        let callbacks = std::mem::take(&mut self.callbacks);
        for event in &events {
            callbacks.fire(event);
        }
        self.callbacks = callbacks;
    }
}

pub(crate) fn push_unique<T: PartialEq>(vec: &mut Vec<T>, value: T) {
    if !vec.contains(&value) {
        vec.push(value);
    }
}
