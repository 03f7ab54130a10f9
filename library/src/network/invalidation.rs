//! Invalidation propagation through the network.
//!
//! A parameter or upstream change invalidates an outport, which walks its
//! connected inports; each inport records the originating outport, raises
//! its own level, and forwards the invalidation to its owning processor
//! exactly once per cascade. `set_valid` walks back down after a
//! successful `process()` call.

use std::collections::HashMap;

use uuid::Uuid;

use crate::model::port::{InvalidationLevel, PortEvent, PortEventKind, PortKey};

use super::{push_unique, ProcessorNetwork};

impl ProcessorNetwork {
    /// Invalidate a processor and everything downstream of it.
    pub fn invalidate_processor(&mut self, id: Uuid, level: InvalidationLevel) {
        self.invalidate_processor_inner(id, level);
        self.dispatch_events();
    }

    /// Invalidate a single outport and everything downstream of it. The
    /// owning processor is raised to the same level so the next pass
    /// regenerates the outport's data; its sibling outports keep their
    /// own levels.
    pub fn invalidate_outport(&mut self, key: &PortKey, level: InvalidationLevel) {
        if let Some(node) = self.node_mut(key.processor) {
            node.level = node.level.max(level);
        }
        let mut best = HashMap::new();
        let mut stack = Vec::new();
        self.mark_outport(key, level, &mut stack);
        self.cascade(&mut best, &mut stack);
        self.dispatch_events();
    }

    pub(crate) fn invalidate_processor_inner(&mut self, id: Uuid, level: InvalidationLevel) {
        let mut best = HashMap::new();
        let mut stack = vec![(id, level)];
        self.cascade(&mut best, &mut stack);
    }

    /// Worklist walk over downstream processors. The `best` map guards
    /// re-entry: a processor already visited at an equal or higher level in
    /// this cascade is not forwarded to again.
    fn cascade(
        &mut self,
        best: &mut HashMap<Uuid, InvalidationLevel>,
        stack: &mut Vec<(Uuid, InvalidationLevel)>,
    ) {
        while let Some((id, level)) = stack.pop() {
            if best.get(&id).is_some_and(|b| *b >= level) {
                continue;
            }
            best.insert(id, level);
            let out_keys: Vec<PortKey> = match self.node_mut(id) {
                Some(node) => {
                    node.level = node.level.max(level);
                    node.outports
                        .iter()
                        .map(|o| PortKey::new(id, &o.def.name))
                        .collect()
                }
                None => continue,
            };
            for key in out_keys {
                self.mark_outport(&key, level, stack);
            }
        }
    }

    /// Raise an outport's level, drop its derived resize cache, and mark
    /// every connected inport. Downstream processors are pushed onto the
    /// cascade stack.
    pub(crate) fn mark_outport(
        &mut self,
        key: &PortKey,
        level: InvalidationLevel,
        stack: &mut Vec<(Uuid, InvalidationLevel)>,
    ) {
        let consumers = match self.outport_state_mut(key) {
            Some(out) => {
                if level > InvalidationLevel::Valid {
                    out.cache.clear();
                }
                out.level = out.level.max(level);
                out.connections.clone()
            }
            None => return,
        };
        for consumer in consumers {
            if self.mark_inport(&consumer, Some(key), level) {
                stack.push((consumer.processor, level));
            }
        }
    }

    /// Mark an inport as changed. Fires the on-invalid notification only on
    /// the valid-to-invalid transition; repeated invalidation while already
    /// invalid stays silent. Returns whether the owning processor should be
    /// forwarded to.
    pub(crate) fn mark_inport(
        &mut self,
        key: &PortKey,
        source: Option<&PortKey>,
        level: InvalidationLevel,
    ) -> bool {
        let fire = match self.inport_state_mut(key) {
            Some(inport) => {
                let was_valid = inport.level == InvalidationLevel::Valid;
                inport.level = inport.level.max(level);
                inport.changed = true;
                if let Some(source) = source {
                    push_unique(&mut inport.changed_sources, source.clone());
                }
                was_valid && level > InvalidationLevel::Valid
            }
            None => return false,
        };
        if fire {
            self.pending_events.push(PortEvent {
                port: key.clone(),
                kind: PortEventKind::Invalidated(level),
            });
        }
        true
    }

    /// Called after a successful `process()`: the processor and its ports
    /// become valid, and the change flags of its own inports are reset.
    /// Other consumers of the same upstream outports keep their own flags;
    /// clearing is per edge, never global.
    pub(crate) fn set_valid(&mut self, id: Uuid) {
        if let Some(node) = self.node_mut(id) {
            node.level = InvalidationLevel::Valid;
            node.last_error = None;
            for inport in &mut node.inports {
                inport.changed = false;
                inport.changed_sources.clear();
                inport.level = InvalidationLevel::Valid;
            }
            for outport in &mut node.outports {
                outport.level = InvalidationLevel::Valid;
            }
        }
    }

    /// Record a failed `process()` call: the processor stays invalid so the
    /// next pass retries it, and the error is visible through
    /// `processor_status`.
    pub(crate) fn mark_failed(&mut self, id: Uuid, message: &str) {
        if let Some(node) = self.node_mut(id) {
            node.level = node.level.max(InvalidationLevel::InvalidOutput);
            node.last_error = Some(message.to_string());
        }
    }

    /// Fire on-change notifications for every inport of `id` whose data
    /// changed since the last successful `process()`. Invoked by the
    /// evaluator strictly before the `process()` call itself.
    pub(crate) fn call_on_change_if_changed(&mut self, id: Uuid) {
        let changed: Vec<PortKey> = match self.node(id) {
            Some(node) => node
                .inports
                .iter()
                .filter(|p| p.changed)
                .map(|p| PortKey::new(id, &p.def.name))
                .collect(),
            None => return,
        };
        for port in changed {
            self.pending_events.push(PortEvent {
                port,
                kind: PortEventKind::Changed,
            });
        }
        self.dispatch_events();
    }
}
