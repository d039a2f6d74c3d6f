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

use crate::flags::{PortFlags, AUDIO_TYPE};
use crate::ids::{ClientId, PortId};

/// A single registered port.
///
/// The fully qualified name (`owner_name:short_name`) is cached at
/// registration time rather than recomputed from a client lookup on every
/// access, since it is read far more often (enumeration, connection
/// resolution) than it changes (only on rename or owner-name change, and a
/// client's own name is immutable once registered).
#[derive(Debug, Clone)]
pub struct Port {
    pub(crate) id: PortId,
    pub(crate) owner: ClientId,
    pub(crate) owner_name: String,
    pub(crate) short_name: String,
    pub(crate) port_type: String,
    pub(crate) flags: PortFlags,
    pub(crate) latency_frames: u32,
    pub(crate) monitor_count: i32,
    pub(crate) locked_by: Option<ClientId>,
    /// Per-cycle buffer size in bytes for non-builtin types. `None` for the
    /// builtin audio type, whose buffer size is `nframes * 4`.
    pub(crate) declared_buffer_size: Option<usize>,
}

impl Port {
    pub fn id(&self) -> PortId {
        self.id
    }

    pub fn owner(&self) -> ClientId {
        self.owner
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    /// `<client-name>:<short-name>`, globally unique.
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.owner_name, self.short_name)
    }

    pub fn port_type(&self) -> &str {
        &self.port_type
    }

    pub fn is_builtin_audio(&self) -> bool {
        self.port_type == AUDIO_TYPE
    }

    pub fn flags(&self) -> PortFlags {
        self.flags
    }

    pub fn latency_frames(&self) -> u32 {
        self.latency_frames
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor_count > 0
    }

    pub fn locked_by(&self) -> Option<ClientId> {
        self.locked_by
    }

    /// Buffer size in bytes for one cycle of this port's type.
    pub fn buffer_size_bytes(&self, period_frames: u32) -> usize {
        match self.declared_buffer_size {
            Some(bytes) => bytes,
            None => period_frames as usize * std::mem::size_of::<f32>(),
        }
    }
}

/// Arguments needed to register a new port, gathered up front so
/// [`crate::registry::PortRegistry::register`] can validate everything
/// before mutating the arena.
#[derive(Debug, Clone)]
pub struct PortSpec {
    pub short_name: String,
    pub port_type: String,
    pub flags: PortFlags,
    pub declared_buffer_size: Option<usize>,
}

impl PortSpec {
    /// A builtin-audio port spec; `declared_buffer_size` is ignored for this
    /// type so it is not part of the constructor.
    pub fn audio(short_name: impl Into<String>, flags: PortFlags) -> Self {
        PortSpec {
            short_name: short_name.into(),
            port_type: AUDIO_TYPE.to_string(),
            flags,
            declared_buffer_size: None,
        }
    }
}
