//! Graph analysis for the processor network.
//!
//! Connection validation relies on `would_create_cycle`, and the evaluator
//! uses `topological_sort` to determine processing order.

use std::collections::{HashMap, HashSet, VecDeque};

use uuid::Uuid;

use super::ProcessorNetwork;
use crate::error::GraphError;

/// Check if connecting from_processor -> to_processor would create a cycle.
/// Returns true if to_processor can already reach from_processor via
/// existing connections.
pub fn would_create_cycle(net: &ProcessorNetwork, from_processor: Uuid, to_processor: Uuid) -> bool {
    // BFS from to_processor: if from_processor is reachable, adding
    // from -> to closes a cycle.
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(to_processor);

    while let Some(current) = queue.pop_front() {
        if current == from_processor {
            return true;
        }
        if !visited.insert(current) {
            continue;
        }
        for conn in net.connections() {
            if conn.from.processor == current {
                queue.push_back(conn.to.processor);
            }
        }
    }
    false
}

/// Every processor reachable by walking inport -> outport edges backward
/// from `id`, in discovery order. `id` itself is not included.
pub fn predecessors(net: &ProcessorNetwork, id: Uuid) -> Vec<Uuid> {
    let mut found = Vec::new();
    let mut queue = VecDeque::new();
    queue.push_back(id);

    while let Some(current) = queue.pop_front() {
        for conn in net.connections() {
            if conn.to.processor == current && !found.contains(&conn.from.processor) {
                found.push(conn.from.processor);
                queue.push_back(conn.from.processor);
            }
        }
    }
    found
}

/// Topological sort of all processors in the network.
///
/// Returns processors in dependency order (sources first, sinks last).
/// Ties are broken by declaration order, so the result is deterministic.
/// Returns Err if there's a cycle (the connect path rejects those, so this
/// only fires on a corrupted graph).
pub fn topological_sort(net: &ProcessorNetwork) -> Result<Vec<Uuid>, GraphError> {
    let ids = net.processor_ids();
    let mut in_degree: HashMap<Uuid, usize> = HashMap::new();
    let mut adj: HashMap<Uuid, Vec<Uuid>> = HashMap::new();

    for &id in ids {
        in_degree.insert(id, 0);
        adj.insert(id, Vec::new());
    }

    for conn in net.connections() {
        adj.get_mut(&conn.from.processor)
            .expect("connection endpoints are registered processors")
            .push(conn.to.processor);
        *in_degree
            .get_mut(&conn.to.processor)
            .expect("connection endpoints are registered processors") += 1;
    }

    // Kahn's algorithm, seeded in declaration order.
    let mut queue: VecDeque<Uuid> = ids
        .iter()
        .filter(|id| in_degree[id] == 0)
        .copied()
        .collect();

    let mut sorted = Vec::with_capacity(ids.len());

    while let Some(id) = queue.pop_front() {
        sorted.push(id);
        if let Some(neighbors) = adj.get(&id) {
            for &neighbor in neighbors {
                let deg = in_degree.get_mut(&neighbor).expect("seeded above");
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(neighbor);
                }
            }
        }
    }

    if sorted.len() != ids.len() {
        return Err(GraphError::cycle("cycle detected in processor network"));
    }

    Ok(sorted)
}
