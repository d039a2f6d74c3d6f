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

//! End-to-end scenarios driven entirely through the public [`Server`] API,
//! one per numbered case.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use audiograph_server::{
    Control, PortFlags, PortSpec, ProcessCallback, ProcessScope, Server, ServerConfig, ServerError,
};

struct NoopCallback;
impl ProcessCallback for NoopCallback {
    fn process(&mut self, _scope: &mut ProcessScope) -> Control {
        Control::Continue
    }
}

struct WriteCallback {
    output: audiograph_server::PortId,
    values: Vec<f32>,
}
impl ProcessCallback for WriteCallback {
    fn process(&mut self, scope: &mut ProcessScope) -> Control {
        let buf = scope.audio_output(self.output);
        for (d, s) in buf.iter_mut().zip(self.values.iter()) {
            *d = *s;
        }
        Control::Continue
    }
}

struct RecordInputCallback {
    input: audiograph_server::PortId,
    captured: Arc<std::sync::Mutex<Vec<f32>>>,
}
impl ProcessCallback for RecordInputCallback {
    fn process(&mut self, scope: &mut ProcessScope) -> Control {
        *self.captured.lock().unwrap() = scope.audio_input(self.input).to_vec();
        Control::Continue
    }
}

struct WriteThenTieIgnoredCallback {
    output: audiograph_server::PortId,
}
impl ProcessCallback for WriteThenTieIgnoredCallback {
    fn process(&mut self, scope: &mut ProcessScope) -> Control {
        for s in scope.audio_output(self.output).iter_mut() {
            *s = 9.0;
        }
        Control::Continue
    }
}

struct SleepForeverCallback {
    n_calls: Arc<AtomicU32>,
}
impl ProcessCallback for SleepForeverCallback {
    fn process(&mut self, _scope: &mut ProcessScope) -> Control {
        self.n_calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(100));
        Control::Continue
    }
}

/// Scenario 1: `A:out -> A:in` is always a cycle.
#[test]
fn scenario_1_self_connect_is_a_cycle() {
    let server = Server::new(ServerConfig::default());
    let a = server.add_client("A", Box::new(NoopCallback)).unwrap();
    let out = server
        .register_port(a, PortSpec::audio("out", PortFlags::IS_OUTPUT))
        .unwrap();
    let inp = server
        .register_port(a, PortSpec::audio("in", PortFlags::IS_INPUT))
        .unwrap();
    let err = server.connect(None, out, inp).unwrap_err();
    assert!(matches!(err, ServerError::WouldCycle { .. }));
}

/// Scenario 2: `A:out -> B:in` then `B:out -> A:in` is a cycle on the second connect.
#[test]
fn scenario_2_two_client_round_trip_is_a_cycle() {
    let server = Server::new(ServerConfig::default());
    let a = server.add_client("A", Box::new(NoopCallback)).unwrap();
    let b = server.add_client("B", Box::new(NoopCallback)).unwrap();
    let a_out = server
        .register_port(a, PortSpec::audio("out", PortFlags::IS_OUTPUT))
        .unwrap();
    let a_in = server
        .register_port(a, PortSpec::audio("in", PortFlags::IS_INPUT))
        .unwrap();
    let b_out = server
        .register_port(b, PortSpec::audio("out", PortFlags::IS_OUTPUT))
        .unwrap();
    let b_in = server
        .register_port(b, PortSpec::audio("in", PortFlags::IS_INPUT))
        .unwrap();

    server.connect(None, a_out, b_in).unwrap();
    let err = server.connect(None, b_out, a_in).unwrap_err();
    assert!(matches!(err, ServerError::WouldCycle { .. }));
}

/// Scenario 3: two producers fan into one consumer; the consumer reads the
/// element-wise sum.
#[test]
fn scenario_3_three_client_fan_in_sums() {
    let server = Server::new(ServerConfig {
        period_frames: 4,
        ..ServerConfig::default()
    });
    let a = server.add_client("A", Box::new(NoopCallback)).unwrap();
    let b = server.add_client("B", Box::new(NoopCallback)).unwrap();
    let c = server.add_client("C", Box::new(NoopCallback)).unwrap();

    let a_out = server
        .register_port(a, PortSpec::audio("out", PortFlags::IS_OUTPUT))
        .unwrap();
    let b_out = server
        .register_port(b, PortSpec::audio("out", PortFlags::IS_OUTPUT))
        .unwrap();
    let c_in = server
        .register_port(c, PortSpec::audio("in", PortFlags::IS_INPUT))
        .unwrap();

    server.connect(None, a_out, c_in).unwrap();
    server.connect(None, b_out, c_in).unwrap();

    let captured = Arc::new(std::sync::Mutex::new(Vec::new()));
    let server = replace_callback(server, c, Box::new(RecordInputCallback { input: c_in, captured: captured.clone() }));
    let server = replace_callback(server, a, Box::new(WriteCallback { output: a_out, values: vec![1.0, 1.0, 1.0, 1.0] }));
    let server = replace_callback(server, b, Box::new(WriteCallback { output: b_out, values: vec![2.5, -0.5, 0.0, 4.0] }));

    server.activate(a).unwrap();
    server.activate(b).unwrap();
    server.activate(c).unwrap();

    server.run_cycle(4);
    assert_eq!(*captured.lock().unwrap(), vec![3.5, 0.5, 1.0, 5.0]);
}

/// Scenario 4: a same-client tie overrides whatever the callback wrote to
/// the tied output.
#[test]
fn scenario_4_tie_overrides_callback_output() {
    let server = Server::new(ServerConfig {
        period_frames: 4,
        ..ServerConfig::default()
    });
    let upstream = server.add_client("upstream", Box::new(NoopCallback)).unwrap();
    let x = server.add_client("X", Box::new(NoopCallback)).unwrap();

    let src_out = server
        .register_port(upstream, PortSpec::audio("out", PortFlags::IS_OUTPUT))
        .unwrap();
    let x_in = server
        .register_port(x, PortSpec::audio("in", PortFlags::IS_INPUT))
        .unwrap();
    let x_out = server
        .register_port(x, PortSpec::audio("out", PortFlags::IS_OUTPUT))
        .unwrap();
    let downstream = server.add_client("downstream", Box::new(NoopCallback)).unwrap();
    let d_in = server
        .register_port(downstream, PortSpec::audio("in", PortFlags::IS_INPUT))
        .unwrap();

    server.connect(None, src_out, x_in).unwrap();
    server.connect(None, x_out, d_in).unwrap();
    server.tie(x, x_in, x_out).unwrap();

    let server = replace_callback(
        server,
        upstream,
        Box::new(WriteCallback { output: src_out, values: vec![7.0, 7.0, 7.0, 7.0] }),
    );
    let server = replace_callback(server, x, Box::new(WriteThenTieIgnoredCallback { output: x_out }));
    let captured = Arc::new(std::sync::Mutex::new(Vec::new()));
    let server = replace_callback(server, downstream, Box::new(RecordInputCallback { input: d_in, captured: captured.clone() }));

    server.activate(upstream).unwrap();
    server.activate(x).unwrap();
    server.activate(downstream).unwrap();
    server.run_cycle(4);
    server.run_cycle(4);

    // X's callback wrote 9.0 into x_out, but the tie copies x_in's routed
    // value (upstream's 7.0) over it after the callback returns; downstream
    // sees the tie's value on the following cycle.
    assert_eq!(*captured.lock().unwrap(), vec![7.0, 7.0, 7.0, 7.0]);
}

/// Scenario 5: a client that blows past its deadline is marked overrun and
/// the chain keeps running on the next cycle.
#[test]
fn scenario_5_overrun_silences_downstream_and_chain_continues() {
    let server = Server::new(ServerConfig {
        period_frames: 4,
        sample_rate: 4_000_000, // tiny period -> tight deadline without a real sleep budget
        overrun_slack: 0.1,
        ..ServerConfig::default()
    });
    let a = server.add_client("A", Box::new(NoopCallback)).unwrap();
    let y = server.add_client("Y", Box::new(NoopCallback)).unwrap();
    let z = server.add_client("Z", Box::new(NoopCallback)).unwrap();

    let a_out = server
        .register_port(a, PortSpec::audio("out", PortFlags::IS_OUTPUT))
        .unwrap();
    let y_in = server
        .register_port(y, PortSpec::audio("in", PortFlags::IS_INPUT))
        .unwrap();
    let y_out = server
        .register_port(y, PortSpec::audio("out", PortFlags::IS_OUTPUT))
        .unwrap();
    let z_in = server
        .register_port(z, PortSpec::audio("in", PortFlags::IS_INPUT))
        .unwrap();

    server.connect(None, a_out, y_in).unwrap();
    server.connect(None, y_out, z_in).unwrap();

    let n_calls = Arc::new(AtomicU32::new(0));
    let server = replace_callback(server, y, Box::new(SleepForeverCallback { n_calls: n_calls.clone() }));

    server.activate(a).unwrap();
    server.activate(y).unwrap();
    server.activate(z).unwrap();

    let report = server.run_cycle(4);
    assert_eq!(report.overruns, vec![y]);
    assert_eq!(n_calls.load(Ordering::SeqCst), 1);

    // the chain keeps running next cycle; Y is not yet evicted after one overrun
    let report2 = server.run_cycle(4);
    assert_eq!(report2.overruns, vec![y]);
    assert_eq!(n_calls.load(Ordering::SeqCst), 2);
}

/// Scenario 6: declared per-port latencies accumulate along the longest
/// path to a terminal.
#[test]
fn scenario_6_latency_propagation_chain() {
    let server = Server::new(ServerConfig::default());
    let a = server.add_client("A", Box::new(NoopCallback)).unwrap();
    let b = server.add_client("B", Box::new(NoopCallback)).unwrap();
    let out = server.add_client("OUT", Box::new(NoopCallback)).unwrap();

    let a_in = server
        .register_port(a, PortSpec::audio("in", PortFlags::IS_INPUT))
        .unwrap();
    let a_out = server
        .register_port(a, PortSpec::audio("out", PortFlags::IS_OUTPUT))
        .unwrap();
    let b_in = server
        .register_port(b, PortSpec::audio("in", PortFlags::IS_INPUT))
        .unwrap();
    let b_out = server
        .register_port(b, PortSpec::audio("out", PortFlags::IS_OUTPUT))
        .unwrap();
    let out_in = server
        .register_port(out, PortSpec::audio("in", PortFlags::IS_INPUT | PortFlags::IS_TERMINAL))
        .unwrap();

    server.connect(None, a_out, b_in).unwrap();
    server.connect(None, b_out, out_in).unwrap();

    server.set_port_latency(a_in, 64).unwrap();
    server.set_port_latency(a_out, 0).unwrap();
    server.set_port_latency(b_in, 0).unwrap();
    server.set_port_latency(b_out, 128).unwrap();
    server.set_port_latency(out_in, 32).unwrap();

    // A:in(64) chains through to A:out via the same-client pseudo-edge, then
    // across the wire to B:in(+0), through to B:out(+128), then to OUT:in(+32).
    assert_eq!(server.total_latency(a_in), 224);
    // OUT:in is itself terminal: its total is just its own declared latency.
    assert_eq!(server.total_latency(out_in), 32);
}

/// These scenarios need a callback that closes over a [`PortId`], which
/// only exists after the port is registered — so the client is added with a
/// placeholder callback first, then [`Server::set_callback`] installs the
/// real one once its ports exist.
fn replace_callback(server: Server, client: audiograph_server::ClientId, callback: Box<dyn ProcessCallback>) -> Server {
    server.set_callback(client, callback).unwrap();
    server
}
