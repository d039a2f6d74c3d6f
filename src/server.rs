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

//! The control-domain session manager (§4.6) — the one type external code
//! constructs. Owns the registry, connection set, client table, transport,
//! and latency table behind a single [`parking_lot::Mutex`], and the
//! realtime [`CycleDriver`] alongside it.
//!
//! Every method here is control-domain: it may block briefly on the mutator
//! lock but never touches buffer memory and never runs on the thread that
//! drives the audio period. [`Server::run_cycle`] is the one bridge between
//! the two domains (§6, "Audio driver interface"): the embedding driver
//! calls it once per hardware period.

use std::collections::HashSet;

use parking_lot::Mutex;

use crate::buffer::BufferSet;
use crate::callbacks::{NotificationSink, ProcessCallback};
use crate::client::{ClientSession, ClientState};
use crate::config::ServerConfig;
use crate::connection::ConnectionSet;
use crate::driver::{CycleDriver, CycleReport};
use crate::error::{Result, ServerError};
use crate::graph::GraphCompiler;
use crate::ids::{ClientId, PortId};
use crate::latency::LatencyTable;
use crate::notify::{Notification, NotificationHub};
use crate::port::PortSpec;
use crate::registry::PortRegistry;
use crate::transport::{Transport, TransportInfo};

/// A client overrunning this many cycles in a row is presumed dead (§4.5
/// "a client detected dead... transitions to Dying") rather than merely
/// slow; it is evicted instead of left silently dragging on the run-list.
const MAX_CONSECUTIVE_OVERRUNS: u32 = 3;

/// Everything the control domain mutates, gathered behind one lock so a
/// connect request from one client and an activate request from another
/// serialize instead of racing (§5, "Control domain... mutations are
/// serialized through a single mutator").
struct ControlState {
    registry: PortRegistry,
    connections: ConnectionSet,
    clients: std::collections::HashMap<ClientId, ClientSession>,
    active: HashSet<ClientId>,
    transport: Transport,
    latency: LatencyTable,
    notify: NotificationHub,
}

pub struct Server {
    config: ServerConfig,
    state: Mutex<ControlState>,
    driver: CycleDriver,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        let registry = PortRegistry::new(config.max_ports);
        let connections = ConnectionSet::new();
        let clients = std::collections::HashMap::new();
        let active = HashSet::new();
        let latency = LatencyTable::recompute(&registry, &connections);
        let graph = GraphCompiler::compile(&registry, &connections, &clients, &active)
            .expect("an empty graph is always acyclic");
        let buffers = BufferSet::new(&registry, registry.all_ids(), config.period_frames);
        let driver = CycleDriver::new(graph, buffers, config.soft_deadline());

        Server {
            config,
            state: Mutex::new(ControlState {
                registry,
                connections,
                clients,
                active,
                transport: Transport::new(),
                latency,
                notify: NotificationHub::new(),
            }),
            driver,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn register_notification_sink(&self, sink: Box<dyn NotificationSink>) {
        self.state.lock().notify.register(sink);
    }

    /// Registers a new client session in the
    /// [`crate::client::ClientState::Registered`] state. Returns the id the
    /// caller uses for every subsequent call.
    pub fn add_client(&self, name: impl Into<String>, callback: Box<dyn ProcessCallback>) -> Result<ClientId> {
        let name = name.into();
        if name.len() > self.config.max_client_name_len {
            return Err(ServerError::InvalidState {
                client: name,
                reason: format!(
                    "client name exceeds max_client_name_len ({} bytes)",
                    self.config.max_client_name_len
                ),
            });
        }
        let mut state = self.state.lock();
        let client_id = Self::mint_client_id();
        let session = ClientSession::new(client_id, name.clone(), callback);
        tracing::info!(client = %name, "client registered");
        state.clients.insert(client_id, session);
        Ok(client_id)
    }

    /// Replaces a client's process callback. A real client only ever
    /// supplies one callback over its lifetime, set at [`Server::add_client`]
    /// time; this exists for hosts (and tests) that need to register a
    /// client's ports before the callback closing over their [`PortId`]s can
    /// be constructed.
    pub fn set_callback(&self, client: ClientId, callback: Box<dyn ProcessCallback>) -> Result<()> {
        let mut state = self.state.lock();
        let session = state
            .clients
            .get_mut(&client)
            .ok_or_else(|| ServerError::NotFound(format!("{:?}", client)))?;
        session.callback = callback;
        Ok(())
    }

    fn mint_client_id() -> ClientId {
        use std::sync::atomic::{AtomicU64, Ordering};
        static NEXT: AtomicU64 = AtomicU64::new(1);
        let raw = NEXT.fetch_add(1, Ordering::Relaxed);
        slotmap::KeyData::from_ffi(raw).into()
    }

    pub fn register_port(&self, client: ClientId, spec: PortSpec) -> Result<PortId> {
        let mut state = self.state.lock();
        let owner_name = Self::client_name(&state, client)?;
        let port = state.registry.register(client, &owner_name, spec)?;
        state.latency = LatencyTable::recompute(&state.registry, &state.connections);
        let name = state.registry.get(port).unwrap().qualified_name();
        state
            .notify
            .dispatch(&Notification::PortRegistered { port, name });
        Ok(port)
    }

    pub fn unregister_port(&self, port: PortId) -> Result<()> {
        let mut state = self.state.lock();
        let removed = state.registry.unregister(port)?;
        state.connections.disconnect_all(port);
        state.latency = LatencyTable::recompute(&state.registry, &state.connections);
        state
            .notify
            .dispatch(&Notification::PortUnregistered { port, name: removed.qualified_name() });
        Ok(())
    }

    pub fn connect(&self, requester: Option<ClientId>, source: PortId, destination: PortId) -> Result<()> {
        let mut state = self.state.lock();
        let state = &mut *state;
        state.connections.connect(&state.registry, requester, source, destination)?;
        state.latency = LatencyTable::recompute(&state.registry, &state.connections);
        state
            .notify
            .dispatch(&Notification::PortsConnected { source, destination });
        Ok(())
    }

    pub fn disconnect(&self, source: PortId, destination: PortId) -> Result<()> {
        let mut state = self.state.lock();
        state.connections.disconnect(source, destination)?;
        state.latency = LatencyTable::recompute(&state.registry, &state.connections);
        state
            .notify
            .dispatch(&Notification::PortsDisconnected { source, destination });
        Ok(())
    }

    /// Marks a client active and recompiles the graph so it joins the
    /// run-list at the next cycle boundary (§4.4). If
    /// [`ServerConfig::elect_timebase_on_first_active`] is set and the seat
    /// is vacant, this client takes it.
    pub fn activate(&self, client: ClientId) -> Result<()> {
        let mut state = self.state.lock();
        {
            let session = state
                .clients
                .get_mut(&client)
                .ok_or_else(|| ServerError::NotFound(format!("{:?}", client)))?;
            session.state = ClientState::Active;
        }
        state.active.insert(client);
        if self.config.elect_timebase_on_first_active && state.transport.timebase_master().is_none() {
            state.transport.request_timebase(client, true);
        }
        self.recompile(&mut state)?;
        tracing::info!(client = ?client, "client activated");
        Ok(())
    }

    pub fn deactivate(&self, client: ClientId) -> Result<()> {
        let mut state = self.state.lock();
        {
            let session = state
                .clients
                .get_mut(&client)
                .ok_or_else(|| ServerError::NotFound(format!("{:?}", client)))?;
            session.state = ClientState::Registered;
        }
        state.active.remove(&client);
        state.transport.release_timebase_if_held_by(client);
        self.recompile(&mut state)?;
        tracing::info!(client = ?client, "client deactivated");
        Ok(())
    }

    /// Removes a client entirely: drops its ports (and their connections),
    /// evicts it from the run-list, and recompiles.
    pub fn remove_client(&self, client: ClientId, reason: &str) -> Result<()> {
        let mut state = self.state.lock();
        self.remove_client_locked(&mut state, client, reason)?;
        tracing::warn!(client = ?client, reason, "client removed");
        Ok(())
    }

    pub fn tie(&self, client: ClientId, input: PortId, output: PortId) -> Result<()> {
        let mut state = self.state.lock();
        let session = state
            .clients
            .get_mut(&client)
            .ok_or_else(|| ServerError::NotFound(format!("{:?}", client)))?;
        session.tie(input, output);
        self.recompile(&mut state)?;
        Ok(())
    }

    pub fn untie(&self, client: ClientId, output: PortId) -> Result<()> {
        let mut state = self.state.lock();
        let session = state
            .clients
            .get_mut(&client)
            .ok_or_else(|| ServerError::NotFound(format!("{:?}", client)))?;
        session.untie(output);
        self.recompile(&mut state)?;
        Ok(())
    }

    pub fn request_timebase(&self, client: ClientId, conditional: bool) -> bool {
        self.state.lock().transport.request_timebase(client, conditional)
    }

    pub fn transport_info(&self) -> TransportInfo {
        self.state.lock().transport.info()
    }

    pub fn start_transport(&self) {
        self.state.lock().transport.start();
    }

    pub fn stop_transport(&self) {
        self.state.lock().transport.stop();
    }

    pub fn total_latency(&self, port: PortId) -> u32 {
        self.state.lock().latency.total_for(port)
    }

    /// Sets a port's own declared latency in frames and recomputes the
    /// latency table (§4.8: "invalidated whenever connections or declared
    /// latencies change").
    pub fn set_port_latency(&self, port: PortId, frames: u32) -> Result<()> {
        let mut state = self.state.lock();
        state.registry.set_latency(port, frames)?;
        state.latency = LatencyTable::recompute(&state.registry, &state.connections);
        Ok(())
    }

    /// Runs one realtime cycle (§4.5, §6 "Audio driver interface"). The
    /// embedding driver calls this once per hardware period with the
    /// period's frame count.
    ///
    /// This briefly holds the control mutator to get exclusive access to the
    /// client table; the realtime-critical work inside
    /// [`CycleDriver::run_cycle`] itself never touches the mutex or the
    /// registry, only the already-published [`crate::graph::CompiledGraph`]
    /// and [`BufferSet`]. See `DESIGN.md` for why this is an acceptable
    /// relaxation of §5's "never locks" rule for a library that is not
    /// itself the hardware interrupt handler.
    pub fn run_cycle(&self, n_frames: u32) -> CycleReport {
        let mut state = self.state.lock();
        let report = self.driver.run_cycle(&mut state.clients, n_frames);
        state.transport.advance(n_frames);

        let mut to_evict = Vec::new();
        for &client in &report.overruns {
            if let Some(session) = state.clients.get(&client) {
                state
                    .notify
                    .dispatch(&Notification::Xrun { client_name: session.name().to_string() });
                if session.consecutive_overruns() >= MAX_CONSECUTIVE_OVERRUNS {
                    to_evict.push((client, "repeated overrun"));
                }
            }
        }
        for &client in &report.quit_requested {
            to_evict.push((client, "client requested quit"));
        }
        for (client, reason) in to_evict {
            let _ = self.remove_client_locked(&mut state, client, reason);
        }

        report
    }

    fn remove_client_locked(&self, state: &mut ControlState, client: ClientId, reason: &str) -> Result<()> {
        let name = Self::client_name(state, client)?;
        for port in state.registry.unregister_all_of(client) {
            state.connections.disconnect_all(port);
        }
        state.active.remove(&client);
        state.transport.release_timebase_if_held_by(client);
        state.clients.remove(&client);
        state.latency = LatencyTable::recompute(&state.registry, &state.connections);
        let graph = GraphCompiler::compile(&state.registry, &state.connections, &state.clients, &state.active)?;
        let buffers = BufferSet::new(&state.registry, state.registry.all_ids(), self.config.period_frames);
        self.driver.publish(graph, buffers);
        state.notify.dispatch(&Notification::ClientShutdown {
            client_name: name,
            reason: reason.to_string(),
        });
        Ok(())
    }

    fn recompile(&self, state: &mut ControlState) -> Result<()> {
        let graph = GraphCompiler::compile(&state.registry, &state.connections, &state.clients, &state.active)?;
        let buffers = BufferSet::new(&state.registry, state.registry.all_ids(), self.config.period_frames);
        self.driver.publish(graph, buffers);
        state.notify.dispatch(&Notification::GraphReordered);
        Ok(())
    }

    fn client_name(state: &ControlState, client: ClientId) -> Result<String> {
        state
            .clients
            .get(&client)
            .map(|s| s.name().to_string())
            .ok_or_else(|| ServerError::NotFound(format!("{:?}", client)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::{Control, ProcessScope};
    use crate::flags::PortFlags;

    struct NoopCallback;
    impl ProcessCallback for NoopCallback {
        fn process(&mut self, _scope: &mut ProcessScope) -> Control {
            Control::Continue
        }
    }

    #[test]
    fn register_connect_activate_and_run_a_cycle() {
        let server = Server::new(ServerConfig {
            period_frames: 4,
            ..ServerConfig::default()
        });
        let a = server.add_client("a", Box::new(NoopCallback)).unwrap();
        let b = server.add_client("b", Box::new(NoopCallback)).unwrap();
        let a_out = server
            .register_port(a, PortSpec::audio("out", PortFlags::IS_OUTPUT))
            .unwrap();
        let b_in = server
            .register_port(b, PortSpec::audio("in", PortFlags::IS_INPUT))
            .unwrap();
        server.connect(None, a_out, b_in).unwrap();
        server.activate(a).unwrap();
        server.activate(b).unwrap();

        let report = server.run_cycle(4);
        assert!(report.overruns.is_empty());
    }

    #[test]
    fn self_connect_is_rejected_through_the_public_api() {
        let server = Server::new(ServerConfig::default());
        let a = server.add_client("a", Box::new(NoopCallback)).unwrap();
        let out = server
            .register_port(a, PortSpec::audio("out", PortFlags::IS_OUTPUT))
            .unwrap();
        let inp = server
            .register_port(a, PortSpec::audio("in", PortFlags::IS_INPUT))
            .unwrap();
        let err = server.connect(None, out, inp).unwrap_err();
        assert!(matches!(err, ServerError::WouldCycle { .. }));
    }

    #[test]
    fn removing_a_client_drops_its_ports() {
        let server = Server::new(ServerConfig::default());
        let a = server.add_client("a", Box::new(NoopCallback)).unwrap();
        let out = server
            .register_port(a, PortSpec::audio("out", PortFlags::IS_OUTPUT))
            .unwrap();
        server.remove_client(a, "test teardown").unwrap();
        assert!(server.register_port(a, PortSpec::audio("x", PortFlags::IS_OUTPUT)).is_err());
        let _ = out;
    }

    #[test]
    fn first_active_client_is_elected_timebase_master_when_configured() {
        let server = Server::new(ServerConfig {
            elect_timebase_on_first_active: true,
            ..ServerConfig::default()
        });
        let a = server.add_client("a", Box::new(NoopCallback)).unwrap();
        server.activate(a).unwrap();
        assert_eq!(server.state.lock().transport.timebase_master(), Some(a));
    }

    #[test]
    fn client_name_over_the_configured_limit_is_rejected() {
        let server = Server::new(ServerConfig {
            max_client_name_len: 4,
            ..ServerConfig::default()
        });
        let err = server.add_client("too-long", Box::new(NoopCallback)).unwrap_err();
        assert!(matches!(err, ServerError::InvalidState { .. }));
    }
}
