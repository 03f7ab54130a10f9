//! Image size negotiation and the resize cache.
//!
//! Consumers may request the same outport's image at different
//! resolutions. The outport keeps its master at the largest requested
//! size and serves smaller requests from a cache of downsamples, pruned
//! on every renegotiation so it only ever holds dimensions some connected
//! inport still asks for.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;

use log::debug;
use lru::LruCache;
use uuid::Uuid;

use crate::error::GraphError;
use crate::model::image::{Image, ImageDims};
use crate::model::port::{InvalidationLevel, PortDataType, PortEvent, PortEventKind, PortKey};

use super::{push_unique, ImageSlot, PortData, ProcessorNetwork};

const RESIZE_CACHE_SIZE: usize = 16;

/// Auxiliary store of an outport's master image resampled to previously
/// requested dimensions. Always rebuildable from the master; dropping
/// every entry loses recomputation time, never data.
pub struct ResizeCache {
    entries: LruCache<ImageDims, Arc<Image>>,
}

impl ResizeCache {
    pub fn new() -> Self {
        let capacity =
            NonZeroUsize::new(RESIZE_CACHE_SIZE).expect("RESIZE_CACHE_SIZE must be > 0");
        Self {
            entries: LruCache::new(capacity),
        }
    }

    pub fn get(&mut self, dims: ImageDims) -> Option<Arc<Image>> {
        self.entries.get(&dims).cloned()
    }

    pub fn put(&mut self, dims: ImageDims, image: Arc<Image>) {
        self.entries.put(dims, image);
    }

    pub fn contains(&self, dims: ImageDims) -> bool {
        self.entries.contains(&dims)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drop entries for dimensions no connected inport requests anymore,
    /// bounding the cache by the set of distinct active requesters.
    pub fn prune(&mut self, active: &[ImageDims]) {
        let stale: Vec<ImageDims> = self
            .entries
            .iter()
            .map(|(k, _)| *k)
            .filter(|k| !active.contains(k))
            .collect();
        for dims in stale {
            self.entries.pop(&dims);
        }
    }
}

impl Default for ResizeCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessorNetwork {
    /// Change the dimensions an inport requests from its upstream
    /// outports, triggering a renegotiation round.
    pub fn set_requested_dims(
        &mut self,
        inport: &PortKey,
        dims: ImageDims,
    ) -> Result<(), GraphError> {
        if dims.area() == 0 {
            return Err(GraphError::configuration(format!(
                "requested dimensions {} must be positive",
                dims
            )));
        }
        let upstream = match self.inport_state_mut(inport) {
            Some(state) => {
                state.requested_dims = dims;
                state.connections.clone()
            }
            None => {
                return Err(GraphError::configuration(format!(
                    "inport {} not found",
                    inport
                )))
            }
        };
        for outport in upstream {
            self.propagate_resize(&outport, dims)?;
        }
        self.dispatch_events();
        Ok(())
    }

    /// Let an image inport accept whatever size the outport currently has
    /// instead of taking part in negotiation.
    pub fn set_outport_determines_size(
        &mut self,
        inport: &PortKey,
        value: bool,
    ) -> Result<(), GraphError> {
        match self.inport_state_mut(inport) {
            Some(state) => {
                state.outport_determines_size = value;
                Ok(())
            }
            None => Err(GraphError::configuration(format!(
                "inport {} not found",
                inport
            ))),
        }
    }

    /// Resize request arriving at an outport.
    pub(crate) fn propagate_resize(
        &mut self,
        outport: &PortKey,
        requested: ImageDims,
    ) -> Result<(), GraphError> {
        if requested.area() == 0 {
            return Err(GraphError::configuration(format!(
                "requested dimensions {} must be positive",
                requested
            )));
        }
        let mut visited = HashSet::new();
        self.change_dimensions(outport, requested, &mut visited);
        Ok(())
    }

    /// One negotiation round at a single outport, recursing upstream and to
    /// chained pass-through outports. `visited` keeps the walk terminating
    /// on diamond topologies.
    fn change_dimensions(
        &mut self,
        key: &PortKey,
        requested: ImageDims,
        visited: &mut HashSet<PortKey>,
    ) {
        if !visited.insert(key.clone()) {
            return;
        }
        let (consumers, group) = match self.outport_state(key) {
            Some(out) if out.def.data_type == PortDataType::Image => {
                (out.connections.clone(), out.def.group.clone())
            }
            _ => return,
        };

        // Gather every dimension some consumer still needs: non-opted-out
        // connected inports, coordination-group siblings, and the incoming
        // request itself.
        let mut registered: Vec<ImageDims> = Vec::new();
        for consumer in &consumers {
            if let Some(inport) = self.inport_state(consumer) {
                if inport.def.data_type == PortDataType::Image && !inport.outport_determines_size {
                    push_unique(&mut registered, inport.requested_dims);
                }
            }
        }
        let siblings = self.group_siblings(key, group.as_deref());
        for sibling in &siblings {
            if let Some(out) = self.outport_state(sibling) {
                push_unique(&mut registered, out.dims);
            }
        }
        push_unique(&mut registered, requested);

        // Largest request by area wins; equal areas resolve on width, then
        // height, keeping the outcome independent of registration order.
        let new_dims = *registered
            .iter()
            .max_by_key(|d| (d.area(), d.width, d.height))
            .expect("registered always holds the incoming request");

        let resized = self.apply_dimensions(key, new_dims, Some(&registered));
        for sibling in &siblings {
            self.apply_dimensions(sibling, new_dims, None);
        }

        if resized {
            // Chained outports downstream of a pass-through serve this
            // master; they have to renegotiate too.
            for consumer in &consumers {
                let chained = self.pass_through_outports(consumer.processor);
                for outport in chained {
                    self.change_dimensions(&outport, new_dims, visited);
                }
            }
        }

        // Propagate upstream so earlier stages produce the right amount of
        // data.
        let inports: Vec<PortKey> = match self.node(key.processor) {
            Some(node) => node
                .inports
                .iter()
                .filter(|p| {
                    p.def.data_type == PortDataType::Image && !p.outport_determines_size
                })
                .map(|p| PortKey::new(key.processor, &p.def.name))
                .collect(),
            None => Vec::new(),
        };
        for inport in inports {
            let upstream = match self.inport_state_mut(&inport) {
                Some(state) => {
                    state.requested_dims = new_dims;
                    state.connections.clone()
                }
                None => continue,
            };
            for outport in upstream {
                self.change_dimensions(&outport, new_dims, visited);
            }
        }

        // A producer whose master actually changed size renders stale data
        // now; the evaluator recomputes it at the new size.
        if resized {
            self.invalidate_processor_inner(key.processor, InvalidationLevel::InvalidOutput);
        }
    }

    /// Resize an outport's master to `dims` if it handles resize events.
    /// Returns whether the master dimensions actually changed.
    fn apply_dimensions(
        &mut self,
        key: &PortKey,
        dims: ImageDims,
        active: Option<&[ImageDims]>,
    ) -> bool {
        let resized = match self.outport_state_mut(key) {
            Some(out) => {
                let mut resized = false;
                if out.handles_resize() && out.dims != dims {
                    if let PortData::Image(ImageSlot::Owned(image)) = &mut out.data {
                        Arc::make_mut(image).resize(dims);
                    }
                    out.dims = dims;
                    out.cache.clear();
                    resized = true;
                }
                if let Some(active) = active {
                    out.cache.prune(active);
                }
                resized
            }
            None => false,
        };
        if resized {
            debug!("outport {} negotiated to {}", key, dims);
            self.pending_events.push(PortEvent {
                port: key.clone(),
                kind: PortEventKind::Resized(dims),
            });
        }
        resized
    }

    /// Image outports on the same processor sharing a coordination group
    /// tag with `key`; converge to one size after any member is resized.
    fn group_siblings(&self, key: &PortKey, group: Option<&str>) -> Vec<PortKey> {
        let group = match group {
            Some(g) => g,
            None => return Vec::new(),
        };
        match self.node(key.processor) {
            Some(node) => node
                .outports
                .iter()
                .filter(|o| {
                    o.def.name != key.port
                        && o.def.data_type == PortDataType::Image
                        && o.def.group.as_deref() == Some(group)
                })
                .map(|o| PortKey::new(key.processor, &o.def.name))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Image outports of a processor that do not own a resizable master
    /// (referenced data or resize handling turned off).
    fn pass_through_outports(&self, id: Uuid) -> Vec<PortKey> {
        match self.node(id) {
            Some(node) => node
                .outports
                .iter()
                .filter(|o| o.def.data_type == PortDataType::Image && !o.handles_resize())
                .map(|o| PortKey::new(id, &o.def.name))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Serve an image at `dims` from an outport: referenced masters are
    /// returned unresized, a matching master is returned directly, and any
    /// other size comes from the resize cache, synthesized lazily on the
    /// first request.
    pub fn get_resized_image(
        &mut self,
        outport: &PortKey,
        dims: ImageDims,
    ) -> Result<Option<Arc<Image>>, GraphError> {
        if dims.area() == 0 {
            return Err(GraphError::configuration(format!(
                "requested dimensions {} must be positive",
                dims
            )));
        }
        let out = self.outport_state_mut(outport).ok_or_else(|| {
            GraphError::configuration(format!("outport {} not found", outport))
        })?;
        match &out.data {
            PortData::Empty => Ok(None),
            PortData::Image(ImageSlot::Referenced(image)) => Ok(Some(image.clone())),
            PortData::Image(ImageSlot::Owned(image)) => {
                if image.dims() == dims {
                    return Ok(Some(image.clone()));
                }
                let master = image.clone();
                if let Some(hit) = out.cache.get(dims) {
                    return Ok(Some(hit));
                }
                let resized = Arc::new(master.resized(dims));
                out.cache.put(dims, resized.clone());
                Ok(Some(resized))
            }
            _ => Err(GraphError::configuration(format!(
                "outport {} does not carry image data",
                outport
            ))),
        }
    }

    /// Whether the outport's resize cache currently holds `dims`.
    pub fn resize_cache_contains(&self, outport: &PortKey, dims: ImageDims) -> bool {
        self.outport_state(outport)
            .map(|o| o.cache.contains(dims))
            .unwrap_or(false)
    }

    pub fn resize_cache_len(&self, outport: &PortKey) -> usize {
        self.outport_state(outport).map(|o| o.cache.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::image::Image;

    #[test]
    fn test_prune_keeps_active_entries() {
        let mut cache = ResizeCache::new();
        let small = ImageDims::new(50, 50);
        let medium = ImageDims::new(100, 100);
        cache.put(small, Arc::new(Image::new(small)));
        cache.put(medium, Arc::new(Image::new(medium)));

        cache.prune(&[medium]);
        assert!(!cache.contains(small));
        assert!(cache.contains(medium));
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut cache = ResizeCache::new();
        let dims = ImageDims::new(16, 16);
        cache.put(dims, Arc::new(Image::new(dims)));
        cache.clear();
        assert!(cache.is_empty());
    }
}
