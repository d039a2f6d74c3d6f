// The MIT License (MIT)
//
// Copyright (c) 2017 Will Medrano (will.s.medrano@gmail.com)
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:

// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.

// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! The directed edges between ports.
//!
//! Cycle safety is checked at the *client* level: a client's process
//! callback is an opaque function of all of its inputs, so any connection
//! that would let a client's own output reach (transitively) one of its own
//! inputs is rejected, including the degenerate case of a client connecting
//! directly to itself. This collapses the "same-client input to output
//! pseudo-edge" rule from the data model down to one check: a connection
//! whose two endpoints share an owner is *always* a self-loop in the
//! client-level graph, so it is always cyclic, with or without an explicit
//! [`crate::client::Tie`] between those exact two ports. See `DESIGN.md`.

use std::collections::{HashMap, HashSet};

use crate::error::{Result, ServerError};
use crate::ids::{ClientId, PortId};
use crate::port::Port;
use crate::registry::PortRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Connection {
    pub source: PortId,
    pub destination: PortId,
}

#[derive(Default)]
pub struct ConnectionSet {
    edges: HashSet<Connection>,
    by_source: HashMap<PortId, Vec<PortId>>,
    by_destination: HashMap<PortId, Vec<PortId>>,
}

impl ConnectionSet {
    pub fn new() -> Self {
        ConnectionSet::default()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.edges.iter()
    }

    pub fn sources_of(&self, destination: PortId) -> &[PortId] {
        self.by_destination
            .get(&destination)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn destinations_of(&self, source: PortId) -> &[PortId] {
        self.by_source.get(&source).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_connected(&self, a: PortId, b: PortId) -> bool {
        self.edges.contains(&Connection {
            source: a,
            destination: b,
        }) || self.edges.contains(&Connection {
            source: b,
            destination: a,
        })
    }

    /// `true` if there is a directed path from `from` to `to` through
    /// existing connections, at port granularity.
    pub fn reaches(&self, from: PortId, to: PortId) -> bool {
        if from == to {
            return true;
        }
        let mut stack = vec![from];
        let mut seen = HashSet::new();
        while let Some(node) = stack.pop() {
            if !seen.insert(node) {
                continue;
            }
            for &next in self.destinations_of(node) {
                if next == to {
                    return true;
                }
                stack.push(next);
            }
        }
        false
    }

    /// Validate and install a connection between two ports named by id.
    /// `requester` is the client asking for the connection, used for the
    /// lock check; `None` means an internal/privileged caller.
    pub fn connect(
        &mut self,
        registry: &PortRegistry,
        requester: Option<ClientId>,
        source: PortId,
        destination: PortId,
    ) -> Result<()> {
        let src = registry
            .get(source)
            .ok_or_else(|| ServerError::NotFound(format!("{:?}", source)))?;
        let dst = registry
            .get(destination)
            .ok_or_else(|| ServerError::NotFound(format!("{:?}", destination)))?;

        self.validate_endpoints(registry, src, dst)?;

        if !registry.is_mutable_by(source, requester) || !registry.is_mutable_by(destination, requester) {
            let locked = if !registry.is_mutable_by(source, requester) {
                src.qualified_name()
            } else {
                dst.qualified_name()
            };
            return Err(ServerError::Locked(locked));
        }

        let edge = Connection { source, destination };
        if self.edges.contains(&edge) {
            return Err(ServerError::Duplicate(format!(
                "{} -> {}",
                src.qualified_name(),
                dst.qualified_name()
            )));
        }

        if self.would_cycle(registry, src, dst) {
            return Err(ServerError::WouldCycle {
                source_port: src.qualified_name(),
                destination: dst.qualified_name(),
            });
        }

        self.insert(edge);
        tracing::info!(source = %src.qualified_name(), destination = %dst.qualified_name(), "connected");
        Ok(())
    }

    fn validate_endpoints(&self, _registry: &PortRegistry, src: &Port, dst: &Port) -> Result<()> {
        if !src.flags().is_output() || !dst.flags().is_input() {
            return Err(ServerError::WrongDirection {
                source_port: src.qualified_name(),
                destination: dst.qualified_name(),
            });
        }
        if src.port_type() != dst.port_type() {
            return Err(ServerError::TypeMismatch {
                source_type: src.port_type().to_string(),
                destination_type: dst.port_type().to_string(),
            });
        }
        Ok(())
    }

    /// `true` if connecting `src -> dst` would create a cycle in the
    /// client-level graph. A same-owner connection is always a self-loop and
    /// is therefore always cyclic; otherwise a cycle exists iff `dst`'s
    /// client can already reach `src`'s client through existing connections
    /// (via any of their ports, not just the two named here).
    fn would_cycle(&self, registry: &PortRegistry, src: &Port, dst: &Port) -> bool {
        if src.owner() == dst.owner() {
            return true;
        }
        let adjacency = client_edges(registry, self);
        client_reaches(&adjacency, dst.owner(), src.owner())
    }

    fn insert(&mut self, edge: Connection) {
        self.edges.insert(edge);
        self.by_source.entry(edge.source).or_default().push(edge.destination);
        self.by_destination
            .entry(edge.destination)
            .or_default()
            .push(edge.source);
    }

    pub fn disconnect(&mut self, source: PortId, destination: PortId) -> Result<()> {
        let edge = Connection { source, destination };
        if !self.edges.remove(&edge) {
            return Err(ServerError::NotFound(format!("{:?} -> {:?}", source, destination)));
        }
        if let Some(v) = self.by_source.get_mut(&source) {
            v.retain(|&d| d != destination);
        }
        if let Some(v) = self.by_destination.get_mut(&destination) {
            v.retain(|&s| s != source);
        }
        Ok(())
    }

    /// Remove every connection touching `port`, in either direction.
    pub fn disconnect_all(&mut self, port: PortId) -> Vec<Connection> {
        let removed: Vec<Connection> = self
            .edges
            .iter()
            .filter(|c| c.source == port || c.destination == port)
            .copied()
            .collect();
        for edge in &removed {
            self.edges.remove(edge);
            if let Some(v) = self.by_source.get_mut(&edge.source) {
                v.retain(|&d| d != edge.destination);
            }
            if let Some(v) = self.by_destination.get_mut(&edge.destination) {
                v.retain(|&s| s != edge.source);
            }
        }
        removed
    }

    pub fn connections_of(&self, port: PortId) -> Vec<Connection> {
        self.edges
            .iter()
            .filter(|c| c.source == port || c.destination == port)
            .copied()
            .collect()
    }
}

/// Build the client-level adjacency list used by the graph compiler's full
/// Kahn's-algorithm pass (§4.4): one edge `owner(source) -> owner(destination)`
/// per connection. Cycle/self-loop handling is identical to
/// [`ConnectionSet::would_cycle`]: a same-owner connection can never be
/// installed in the first place, so this adjacency never contains it either.
pub fn client_edges(
    registry: &PortRegistry,
    connections: &ConnectionSet,
) -> HashMap<ClientId, Vec<ClientId>> {
    let mut adjacency: HashMap<ClientId, Vec<ClientId>> = HashMap::new();
    for edge in connections.iter() {
        let (Some(src), Some(dst)) = (registry.get(edge.source), registry.get(edge.destination)) else {
            continue;
        };
        adjacency.entry(src.owner()).or_default().push(dst.owner());
    }
    adjacency
}

/// `true` if `to` is reachable from `from` by following `adjacency`
/// (BFS/DFS is equivalent here; `Vec` used as a stack). A node always
/// reaches itself.
pub fn client_reaches(adjacency: &HashMap<ClientId, Vec<ClientId>>, from: ClientId, to: ClientId) -> bool {
    if from == to {
        return true;
    }
    let mut stack = vec![from];
    let mut seen = HashSet::new();
    while let Some(node) = stack.pop() {
        if !seen.insert(node) {
            continue;
        }
        if let Some(neighbors) = adjacency.get(&node) {
            for &next in neighbors {
                if next == to {
                    return true;
                }
                stack.push(next);
            }
        }
    }
    false
}
