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

//! Total latency (§4.8): for a port, the maximum over every path from that
//! port to any `IsTerminal` port of the sum of declared latencies along the
//! path, inclusive of the starting port's own latency.
//!
//! This is the same longest-path-over-a-DAG shape as
//! [`crate::graph::GraphCompiler::topo_sort`]'s Kahn's-algorithm pass, run at
//! port granularity instead of client granularity and relaxing a distance
//! instead of just ordering, but in the opposite direction: distances flow
//! from terminals back toward sources, since a port's total latency depends
//! on what is downstream of it, not what feeds it. Like [`crate::connection`]'s
//! cycle check, a client's own input ports are treated as feeding every one
//! of its own output ports — a same-owner pseudo-edge standing in for the
//! fact that a client's process callback is free to route any input to any
//! output — except through a port marked `IsTerminal`, which never forwards
//! a pseudo-edge on the side the flag names (§4.2 rule 4).

use std::collections::{HashMap, VecDeque};

use crate::connection::ConnectionSet;
use crate::ids::PortId;
use crate::registry::PortRegistry;

/// Every port `port`'s signal can reach in one hop, toward a terminal: real
/// connections, plus — if `port` is a non-terminal input — every non-terminal
/// output port owned by the same client.
fn downstream_of(port: PortId, registry: &PortRegistry, connections: &ConnectionSet) -> Vec<PortId> {
    let mut downstream: Vec<PortId> = connections.destinations_of(port).to_vec();
    let Some(p) = registry.get(port) else {
        return downstream;
    };
    if p.flags().is_input() && !p.flags().is_terminal() {
        for sibling in registry.ports_of(p.owner()) {
            if sibling == port {
                continue;
            }
            if let Some(s) = registry.get(sibling) {
                if s.flags().is_output() && !s.flags().is_terminal() {
                    downstream.push(sibling);
                }
            }
        }
    }
    downstream
}

/// Total latency in frames for every port, recomputed in full whenever a
/// connection or a per-port latency value changes (§4.8: "recomputed
/// lazily, never on the realtime path"). A port with no path to any
/// terminal reports its own declared latency.
pub struct LatencyTable {
    totals: HashMap<PortId, u32>,
}

impl LatencyTable {
    pub fn total_for(&self, port: PortId) -> u32 {
        self.totals.get(&port).copied().unwrap_or(0)
    }

    /// Reverse Kahn's algorithm: ports with no downstream edge at all (true
    /// sinks, which includes every terminal port once its own outbound
    /// pseudo-edge is suppressed) are resolved first, at their own declared
    /// latency; everything upstream of a resolved port then takes the max
    /// of its resolved downstream neighbors plus its own latency.
    pub fn recompute(registry: &PortRegistry, connections: &ConnectionSet) -> Self {
        let adjacency: HashMap<PortId, Vec<PortId>> = registry
            .all_ids()
            .map(|port| (port, downstream_of(port, registry, connections)))
            .collect();

        let mut out_degree: HashMap<PortId, u32> = registry.all_ids().map(|port| (port, 0)).collect();
        let mut upstream: HashMap<PortId, Vec<PortId>> = registry.all_ids().map(|port| (port, Vec::new())).collect();
        for (&port, downstream) in &adjacency {
            out_degree.insert(port, downstream.len() as u32);
            for &d in downstream {
                upstream.entry(d).or_default().push(port);
            }
        }

        let mut totals: HashMap<PortId, u32> = HashMap::new();
        let mut queue: VecDeque<PortId> = VecDeque::new();
        for port in registry.all_ids() {
            if out_degree[&port] == 0 {
                let own = registry.get(port).map(|p| p.latency_frames()).unwrap_or(0);
                totals.insert(port, own);
                queue.push_back(port);
            }
        }

        while let Some(port) = queue.pop_front() {
            let resolved_total = totals[&port];
            for &up in upstream.get(&port).map(Vec::as_slice).unwrap_or(&[]) {
                let entry = totals.entry(up).or_insert(0);
                if resolved_total > *entry {
                    *entry = resolved_total;
                }
                let deg = out_degree.get_mut(&up).expect("tracked port");
                *deg -= 1;
                if *deg == 0 {
                    let own = registry.get(up).map(|p| p.latency_frames()).unwrap_or(0);
                    let finalized = own + totals[&up];
                    totals.insert(up, finalized);
                    queue.push_back(up);
                }
            }
        }

        LatencyTable { totals }
    }
}
