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

//! The realtime cycle loop (§4.5, §5).
//!
//! [`CycleDriver::run_cycle`] is the one function in this crate that runs on
//! the realtime thread. It never locks a [`std::sync::Mutex`], never
//! allocates on the steady-state path, and reads the compiled graph through
//! a single [`arc_swap::ArcSwap`] load.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use crossbeam_channel::RecvTimeoutError;

use crate::buffer::BufferSet;
use crate::callbacks::{Control, ProcessScope};
use crate::client::ClientSession;
use crate::graph::CompiledGraph;
use crate::graph::Routing;
use crate::graph::ScheduledClient;
use crate::ids::{ClientId, PortId};

/// Outcome of one realtime cycle, reported back to the control domain for
/// logging and notification dispatch; never blocks or allocates on the
/// realtime thread itself (the `Vec`s are small and pre-sized against the
/// run-list length).
#[derive(Debug, Default)]
pub struct CycleReport {
    pub overruns: Vec<ClientId>,
    pub quit_requested: Vec<ClientId>,
}

/// Owns the published graph and the buffer storage it routes through.
///
/// A new [`BufferSet`] is built every time the graph recompiles, since a
/// recompile can add or drop ports; the old `BufferSet` is dropped once the
/// old [`CompiledGraph`] Arc it was published alongside is dropped (one
/// cycle later, per §4.4's "one-cycle grace" retirement rule — the control
/// domain holds the previous Arc until after the next `run_cycle` returns).
pub struct CycleDriver {
    graph: ArcSwap<(CompiledGraph, BufferSet)>,
    soft_deadline: Duration,
}

impl CycleDriver {
    pub fn new(initial: CompiledGraph, buffers: BufferSet, soft_deadline: Duration) -> Self {
        CycleDriver {
            graph: ArcSwap::new(Arc::new((initial, buffers))),
            soft_deadline,
        }
    }

    /// Publishes a newly compiled graph and its buffer set. Called only from
    /// the control domain.
    pub fn publish(&self, graph: CompiledGraph, buffers: BufferSet) {
        self.graph.store(Arc::new((graph, buffers)));
    }

    /// Runs one cycle: zero buffers, run every active client in schedule
    /// order, resolve routing before each client that has inbound
    /// connections, execute ties after, report overruns and quit requests.
    ///
    /// `clients` must contain every [`ClientId`] named in the published
    /// graph's run-list; the scheduler/session manager guarantees this by
    /// construction (a client is only ever added to the run-list by
    /// recompiling the graph after it is already present in the map).
    pub fn run_cycle(
        &self,
        clients: &mut HashMap<ClientId, ClientSession>,
        n_frames: u32,
    ) -> CycleReport {
        let snapshot = self.graph.load();
        let (graph, buffers) = (&snapshot.0, &snapshot.1);
        let mut report = CycleReport::default();

        buffers.zero_all();

        for scheduled in &graph.run_list {
            Self::resolve_inputs(graph, buffers, scheduled);

            let Some(session) = clients.get_mut(&scheduled.client) else {
                continue;
            };

            match Self::run_client_with_deadline(session, buffers, n_frames, self.soft_deadline) {
                Ok(Control::Continue) => session.consecutive_overruns = 0,
                Ok(Control::Quit) => {
                    session.consecutive_overruns = 0;
                    report.quit_requested.push(scheduled.client);
                }
                Err(RecvTimeoutError::Timeout) => {
                    session.overrun_count += 1;
                    session.consecutive_overruns += 1;
                    report.overruns.push(scheduled.client);
                }
                Err(RecvTimeoutError::Disconnected) => {
                    report.overruns.push(scheduled.client);
                }
            }

            for &(input, output) in &scheduled.ties {
                let samples = buffers.read(input).to_vec();
                buffers.copy_into(output, &samples);
            }
        }

        report
    }

    /// Sums every source feeding each of `scheduled`'s own input ports into
    /// that port's buffer. Called once per run-list entry, right before
    /// that client's callback, so every source has already been written by
    /// whichever upstream client owns it (guaranteed by schedule order) and
    /// each destination is resolved exactly once per cycle.
    fn resolve_inputs(graph: &CompiledGraph, buffers: &BufferSet, scheduled: &ScheduledClient) {
        for &port in &scheduled.inputs {
            if let Routing::Sources(sources) = graph.routing_for(port) {
                for &source in sources {
                    let samples = buffers.read(source).to_vec();
                    buffers.accumulate(port, &samples);
                }
            }
        }
    }

    /// Runs `session`'s callback on a scoped thread and waits up to
    /// `deadline` for it to finish. A client that blows through the
    /// deadline is reported as an overrun (§7 scenario 5); its outputs are
    /// whatever it had written by the time the deadline elapsed, and its
    /// downstream inputs read whatever was summed before the timeout, which
    /// in the common case of "wrote nothing yet" is silence.
    fn run_client_with_deadline(
        session: &mut ClientSession,
        buffers: &BufferSet,
        n_frames: u32,
        deadline: Duration,
    ) -> Result<Control, RecvTimeoutError> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let callback = &mut session.callback;
        std::thread::scope(|scope| {
            scope.spawn(move || {
                let mut process_scope = ProcessScope::new(buffers, n_frames);
                let control = callback.process(&mut process_scope);
                let _ = tx.send(control);
            });
            rx.recv_timeout(deadline)
        })
    }
}
