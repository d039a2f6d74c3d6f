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

//! Fans a control-domain event out to every registered
//! [`crate::callbacks::NotificationSink`] (§4.6).

use crate::callbacks::NotificationSink;
use crate::ids::PortId;

/// One event the session manager dispatches after a control-domain mutation
/// or end-of-cycle report. Kept as an enum (rather than calling straight
/// into the trait at each call site) so a future transport — a queue to a
/// different thread, say — has one value type to carry.
#[derive(Debug, Clone)]
pub enum Notification {
    PortRegistered { port: PortId, name: String },
    PortUnregistered { port: PortId, name: String },
    PortsConnected { source: PortId, destination: PortId },
    PortsDisconnected { source: PortId, destination: PortId },
    GraphReordered,
    Xrun { client_name: String },
    SampleRateChanged { new_rate: u32 },
    BufferSizeChanged { new_size: u32 },
    ClientShutdown { client_name: String, reason: String },
}

#[derive(Default)]
pub struct NotificationHub {
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        NotificationHub { sinks: Vec::new() }
    }

    pub fn register(&mut self, sink: Box<dyn NotificationSink>) {
        self.sinks.push(sink);
    }

    pub fn dispatch(&self, event: &Notification) {
        for sink in &self.sinks {
            match event {
                Notification::PortRegistered { port, name } => sink.port_registered(*port, name),
                Notification::PortUnregistered { port, name } => {
                    sink.port_unregistered(*port, name)
                }
                Notification::PortsConnected { source, destination } => {
                    sink.ports_connected(*source, *destination)
                }
                Notification::PortsDisconnected { source, destination } => {
                    sink.ports_disconnected(*source, *destination)
                }
                Notification::GraphReordered => sink.graph_reordered(),
                Notification::Xrun { client_name } => sink.xrun(client_name),
                Notification::SampleRateChanged { new_rate } => {
                    sink.sample_rate_changed(*new_rate)
                }
                Notification::BufferSizeChanged { new_size } => {
                    sink.buffer_size_changed(*new_size)
                }
                Notification::ClientShutdown { client_name, reason } => {
                    sink.client_shutdown(client_name, reason)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSink(Arc<AtomicUsize>);
    impl NotificationSink for CountingSink {
        fn graph_reordered(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn dispatch_reaches_every_registered_sink() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut hub = NotificationHub::new();
        hub.register(Box::new(CountingSink(counter.clone())));
        hub.register(Box::new(CountingSink(counter.clone())));

        hub.dispatch(&Notification::GraphReordered);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
