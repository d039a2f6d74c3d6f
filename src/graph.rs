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

//! Compiles the control-domain state (registry + connections + clients) into
//! an immutable [`CompiledGraph`] the realtime thread can run without
//! allocating or locking (§4.4).
//!
//! The compiler never has to reject a cycle: [`crate::connection::ConnectionSet::connect`]
//! already refuses any edge that would create one, so by the time a
//! [`CompiledGraph`] is built, the client-level graph is guaranteed acyclic
//! and Kahn's algorithm always visits every client.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::client::ClientSession;
use crate::connection::{client_edges, ConnectionSet};
use crate::ids::{ClientId, PortId};
use crate::registry::PortRegistry;

/// Where one input port's samples come from: nothing, one source aliased
/// in, or several summed together (§4.3).
#[derive(Debug, Clone)]
pub enum Routing {
    Silence,
    Sources(Vec<PortId>),
}

/// A run-list entry: one active client, the input ports it owns that need
/// routing resolved right before it runs, and the ties to execute right
/// after its callback returns (§4.3 Ties, §4.5).
///
/// `inputs` is scoped to this client alone — not every port in the graph —
/// so that [`crate::driver::CycleDriver::run_cycle`] resolves each
/// destination's fan-in exactly once per cycle, at the single point in
/// schedule order where every one of its sources is guaranteed already
/// written.
#[derive(Debug, Clone)]
pub struct ScheduledClient {
    pub client: ClientId,
    pub inputs: Vec<PortId>,
    pub ties: Vec<(PortId, PortId)>,
}

/// An immutable snapshot of everything the cycle driver needs to run one
/// realtime cycle: who runs, in what order, how their inputs are fed, and
/// which ports have a buffer at all (§4.4).
///
/// Published via [`arc_swap::ArcSwap`] so the realtime thread can load a
/// fresh graph with a single atomic read; see [`crate::driver::CycleDriver`].
#[derive(Debug)]
pub struct CompiledGraph {
    pub run_list: Vec<ScheduledClient>,
    pub routing: HashMap<PortId, Routing>,
    pub buffer_ports: Vec<PortId>,
}

impl CompiledGraph {
    pub fn routing_for(&self, port: PortId) -> &Routing {
        self.routing.get(&port).unwrap_or(&Routing::Silence)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CompileError {
    /// Should be unreachable given [`ConnectionSet::connect`]'s own cycle
    /// check; kept as a defensive result rather than a panic so a future bug
    /// upstream fails loudly on the control thread instead of corrupting a
    /// published graph.
    #[error("client graph contains a cycle that connect() should have rejected")]
    CycleDetected,

    /// A non-builtin-type input has two or more inbound sources. Fan-in mix
    /// is only meaningful for the builtin audio type (§4.3, §9); summing raw
    /// bytes of an opaque declared-size type has no defined meaning, so the
    /// compiler refuses rather than silently f32-summing it.
    #[error("{destination} is not the builtin audio type and has {source_count} inbound sources; fan-in mix is only defined for audio")]
    NonAudioFanIn { destination: String, source_count: usize },
}

impl From<CompileError> for crate::error::ServerError {
    fn from(err: CompileError) -> Self {
        crate::error::ServerError::InvalidState {
            client: "graph".to_string(),
            reason: err.to_string(),
        }
    }
}

pub struct GraphCompiler;

impl GraphCompiler {
    /// Builds a fresh [`CompiledGraph`] from the current control-domain
    /// state. `active` must be exactly the set of clients in
    /// [`crate::client::ClientState::Active`].
    pub fn compile(
        registry: &PortRegistry,
        connections: &ConnectionSet,
        clients: &HashMap<ClientId, ClientSession>,
        active: &HashSet<ClientId>,
    ) -> Result<CompiledGraph, CompileError> {
        let run_list = Self::topo_sort(registry, connections, active)?;

        let mut routing: HashMap<PortId, Routing> = HashMap::new();
        for dst in registry.all_ids() {
            let sources = connections.sources_of(dst).to_vec();
            if sources.len() >= 2 {
                let is_audio = registry.get(dst).map(|p| p.is_builtin_audio()).unwrap_or(true);
                if !is_audio {
                    return Err(CompileError::NonAudioFanIn {
                        destination: registry
                            .get(dst)
                            .map(|p| p.qualified_name())
                            .unwrap_or_else(|| format!("{:?}", dst)),
                        source_count: sources.len(),
                    });
                }
            }
            let routing_entry = if sources.is_empty() {
                Routing::Silence
            } else {
                Routing::Sources(sources)
            };
            routing.insert(dst, routing_entry);
        }

        let buffer_ports: Vec<PortId> = registry.all_ids().collect();

        let scheduled = run_list
            .into_iter()
            .map(|client_id| {
                let ties = clients
                    .get(&client_id)
                    .map(|session| {
                        session
                            .ties()
                            .map(|tie| (tie.input, tie.output))
                            .collect()
                    })
                    .unwrap_or_default();
                let inputs = registry
                    .ports_of(client_id)
                    .filter(|&port| {
                        registry
                            .get(port)
                            .map(|p| p.flags().is_input())
                            .unwrap_or(false)
                    })
                    .collect();
                ScheduledClient {
                    client: client_id,
                    inputs,
                    ties,
                }
            })
            .collect();

        Ok(CompiledGraph {
            run_list: scheduled,
            routing,
            buffer_ports,
        })
    }

    /// Kahn's algorithm over the client-level adjacency built from real
    /// connections (§4.4 Scheduling order). Clients with no connections at
    /// all to other active clients still appear, each as a free-standing
    /// run-list entry with in-degree zero.
    fn topo_sort(
        registry: &PortRegistry,
        connections: &ConnectionSet,
        active: &HashSet<ClientId>,
    ) -> Result<Vec<ClientId>, CompileError> {
        let adjacency = client_edges(registry, connections);
        // client_edges filters nothing by active set; restrict here so a
        // client that registered ports but never activated is excluded from
        // scheduling without disturbing its ports' routing.
        let mut in_degree: HashMap<ClientId, u32> = active.iter().map(|&c| (c, 0)).collect();
        let mut filtered: HashMap<ClientId, Vec<ClientId>> = HashMap::new();
        for (&src, dsts) in &adjacency {
            if !active.contains(&src) {
                continue;
            }
            let kept: Vec<ClientId> = dsts.iter().copied().filter(|d| active.contains(d)).collect();
            for &dst in &kept {
                *in_degree.entry(dst).or_insert(0) += 1;
            }
            filtered.insert(src, kept);
        }

        let mut queue: VecDeque<ClientId> = in_degree
            .iter()
            .filter(|&(_, &deg)| deg == 0)
            .map(|(&c, _)| c)
            .collect();
        let mut order = Vec::with_capacity(active.len());

        while let Some(client) = queue.pop_front() {
            order.push(client);
            if let Some(dsts) = filtered.get(&client) {
                for &dst in dsts {
                    let deg = in_degree.get_mut(&dst).expect("dst tracked in in_degree");
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(dst);
                    }
                }
            }
        }

        if order.len() != active.len() {
            return Err(CompileError::CycleDetected);
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::PortFlags;
    use crate::port::PortSpec;

    fn client(n: u64) -> ClientId {
        slotmap::KeyData::from_ffi(n).into()
    }

    #[test]
    fn independent_clients_both_scheduled() {
        let mut registry = PortRegistry::new(64);
        let a = client(1);
        let b = client(2);
        registry
            .register(a, "a", PortSpec::audio("out", PortFlags::IS_OUTPUT))
            .unwrap();
        registry
            .register(b, "b", PortSpec::audio("in", PortFlags::IS_INPUT))
            .unwrap();
        let connections = ConnectionSet::new();
        let clients = HashMap::new();
        let active: HashSet<ClientId> = [a, b].into_iter().collect();

        let compiled = GraphCompiler::compile(&registry, &connections, &clients, &active).unwrap();
        assert_eq!(compiled.run_list.len(), 2);
    }

    #[test]
    fn downstream_client_scheduled_after_upstream() {
        let mut registry = PortRegistry::new(64);
        let a = client(1);
        let b = client(2);
        let a_out = registry
            .register(a, "a", PortSpec::audio("out", PortFlags::IS_OUTPUT))
            .unwrap();
        let b_in = registry
            .register(b, "b", PortSpec::audio("in", PortFlags::IS_INPUT))
            .unwrap();
        let mut connections = ConnectionSet::new();
        connections.connect(&registry, None, a_out, b_in).unwrap();
        let clients = HashMap::new();
        let active: HashSet<ClientId> = [a, b].into_iter().collect();

        let compiled = GraphCompiler::compile(&registry, &connections, &clients, &active).unwrap();
        let positions: HashMap<ClientId, usize> = compiled
            .run_list
            .iter()
            .enumerate()
            .map(|(i, s)| (s.client, i))
            .collect();
        assert!(positions[&a] < positions[&b]);
    }

    #[test]
    fn unconnected_input_routes_to_silence() {
        let mut registry = PortRegistry::new(64);
        let a = client(1);
        let a_in = registry
            .register(a, "a", PortSpec::audio("in", PortFlags::IS_INPUT))
            .unwrap();
        let connections = ConnectionSet::new();
        let clients = HashMap::new();
        let active: HashSet<ClientId> = [a].into_iter().collect();

        let compiled = GraphCompiler::compile(&registry, &connections, &clients, &active).unwrap();
        assert!(matches!(compiled.routing_for(a_in), Routing::Silence));
    }

    #[test]
    fn fan_in_on_non_audio_type_is_rejected() {
        let mut registry = PortRegistry::new(64);
        let a = client(1);
        let b = client(2);
        let c = client(3);
        let midi_out = |short_name: &str, flags: PortFlags| crate::port::PortSpec {
            short_name: short_name.to_string(),
            port_type: "midi".to_string(),
            flags,
            declared_buffer_size: Some(32),
        };
        let a_out = registry.register(a, "a", midi_out("out", PortFlags::IS_OUTPUT)).unwrap();
        let b_out = registry.register(b, "b", midi_out("out", PortFlags::IS_OUTPUT)).unwrap();
        let c_in = registry.register(c, "c", midi_out("in", PortFlags::IS_INPUT)).unwrap();

        let mut connections = ConnectionSet::new();
        connections.connect(&registry, None, a_out, c_in).unwrap();
        connections.connect(&registry, None, b_out, c_in).unwrap();
        let clients = HashMap::new();
        let active: HashSet<ClientId> = [a, b, c].into_iter().collect();

        let err = GraphCompiler::compile(&registry, &connections, &clients, &active).unwrap_err();
        assert!(matches!(err, CompileError::NonAudioFanIn { .. }));
    }
}
