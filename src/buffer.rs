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

// ----- SAFETY NOTE ---------------------------------------------------------
//
// Each port's samples live in an `UnsafeCell<Vec<f32>>`. Access is confined
// to this file; everything outside borrows through `read`/`write`/
// `accumulate`, which hand out plain slices.
//
// The cycle driver is the sole caller during a cycle and upholds the one
// invariant that makes this sound: a port's buffer is written by at most one
// place at a time. An input's buffer is written only by `accumulate` calls
// the driver issues serially while resolving that one input's sources; an
// output's buffer is written only by the owning client's own `process` call,
// which runs on one thread. No two call sites ever hold a `&mut` to the same
// port's slice concurrently.
// ---------------------------------------------------------------------------

use std::cell::UnsafeCell;
use std::collections::HashMap;

use crate::ids::PortId;
use crate::registry::PortRegistry;

struct Slot {
    samples: UnsafeCell<Vec<f32>>,
}

// SAFETY: see the module-level safety note.
unsafe impl Sync for Slot {}

/// Per-cycle sample storage for every port with a live buffer assignment, as
/// produced by [`crate::graph::GraphCompiler`] (§4.3, §4.4).
///
/// Rebuilt whenever the graph recompiles; reused across cycles until then.
pub struct BufferSet {
    slots: HashMap<PortId, Slot>,
    n_frames: u32,
}

impl BufferSet {
    /// Allocates one slot per port, sized from `registry`: `nframes * 4`
    /// bytes for the builtin audio type, the port's own declared per-cycle
    /// size otherwise (§4.3). Storage is always `f32`-granular, so a
    /// declared size that isn't a multiple of 4 bytes rounds up.
    pub fn new(registry: &PortRegistry, ports: impl IntoIterator<Item = PortId>, n_frames: u32) -> Self {
        let slots = ports
            .into_iter()
            .map(|port| {
                let element_size = std::mem::size_of::<f32>();
                let len = registry
                    .get(port)
                    .map(|p| {
                        let bytes = p.buffer_size_bytes(n_frames);
                        (bytes + element_size - 1) / element_size
                    })
                    .unwrap_or(n_frames as usize);
                (
                    port,
                    Slot {
                        samples: UnsafeCell::new(vec![0.0; len]),
                    },
                )
            })
            .collect();
        BufferSet { slots, n_frames }
    }

    pub fn n_frames(&self) -> u32 {
        self.n_frames
    }

    pub fn has_port(&self, port: PortId) -> bool {
        self.slots.contains_key(&port)
    }

    /// Zero every buffer. Called once at the start of each cycle before any
    /// client runs or any routing is resolved (§4.3 edge case: an input with
    /// zero connected sources reads silence).
    pub fn zero_all(&self) {
        for slot in self.slots.values() {
            // SAFETY: called before any client runs this cycle; no aliasing
            // `read`/`write`/`accumulate` call is in flight.
            let buf = unsafe { &mut *slot.samples.get() };
            buf.iter_mut().for_each(|s| *s = 0.0);
        }
    }

    /// Samples currently held for `port`. Empty slice if `port` has no
    /// buffer assigned this cycle.
    pub fn read(&self, port: PortId) -> &[f32] {
        match self.slots.get(&port) {
            // SAFETY: see module-level safety note.
            Some(slot) => unsafe { &*slot.samples.get() },
            None => &[],
        }
    }

    /// Exclusive access to `port`'s buffer for the owning client to fill.
    ///
    /// # Safety
    /// Caller must not hold this alongside any other live borrow of the same
    /// port's buffer (see module-level safety note).
    pub unsafe fn write(&self, port: PortId) -> &mut [f32] {
        match self.slots.get(&port) {
            Some(slot) => &mut *slot.samples.get(),
            None => &mut [],
        }
    }

    /// Sums `source` into `destination`'s buffer, sample by sample, clamped
    /// to the shorter of the two lengths. Used by the cycle driver to
    /// implement fan-in (§4.3: "multiple sources into one destination are
    /// summed").
    pub fn accumulate(&self, destination: PortId, source: &[f32]) {
        if let Some(slot) = self.slots.get(&destination) {
            // SAFETY: see module-level safety note; the driver issues these
            // serially per destination while resolving its source list.
            let dst = unsafe { &mut *slot.samples.get() };
            for (d, s) in dst.iter_mut().zip(source.iter()) {
                *d += s;
            }
        }
    }

    /// Overwrites `destination`'s buffer with `source` verbatim. Used for
    /// tie execution, where the spec calls for a copy rather than a sum
    /// (§4.3 Ties).
    pub fn copy_into(&self, destination: PortId, source: &[f32]) {
        if let Some(slot) = self.slots.get(&destination) {
            // SAFETY: see module-level safety note.
            let dst = unsafe { &mut *slot.samples.get() };
            for (d, s) in dst.iter_mut().zip(source.iter()) {
                *d = *s;
            }
            for d in dst.iter_mut().skip(source.len()) {
                *d = 0.0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(n: u64) -> PortId {
        slotmap::KeyData::from_ffi(n).into()
    }

    fn client(n: u64) -> crate::ids::ClientId {
        slotmap::KeyData::from_ffi(n).into()
    }

    #[test]
    fn zero_all_clears_previous_cycle_data() {
        let registry = PortRegistry::new(4);
        let set = BufferSet::new(&registry, [port(1)], 4);
        set.copy_into(port(1), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(set.read(port(1)), &[1.0, 2.0, 3.0, 4.0]);
        set.zero_all();
        assert_eq!(set.read(port(1)), &[0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn accumulate_sums_multiple_sources() {
        let registry = PortRegistry::new(4);
        let set = BufferSet::new(&registry, [port(1)], 3);
        set.accumulate(port(1), &[1.0, 1.0, 1.0]);
        set.accumulate(port(1), &[2.0, 2.0, 2.0]);
        assert_eq!(set.read(port(1)), &[3.0, 3.0, 3.0]);
    }

    #[test]
    fn unassigned_port_reads_empty() {
        let registry = PortRegistry::new(4);
        let set = BufferSet::new(&registry, [port(1)], 3);
        assert_eq!(set.read(port(2)), &[] as &[f32]);
    }

    #[test]
    fn non_builtin_type_gets_its_declared_byte_size() {
        let mut registry = PortRegistry::new(4);
        let owner = client(1);
        let midi_in = registry
            .register(
                owner,
                "m",
                crate::port::PortSpec {
                    short_name: "in".to_string(),
                    port_type: "midi".to_string(),
                    flags: crate::flags::PortFlags::IS_INPUT,
                    declared_buffer_size: Some(128),
                },
            )
            .unwrap();
        let set = BufferSet::new(&registry, [midi_in], 4);
        // 128 declared bytes / 4-byte f32 storage units = 32 elements,
        // independent of `n_frames`.
        assert_eq!(set.read(midi_in).len(), 32);
    }
}
