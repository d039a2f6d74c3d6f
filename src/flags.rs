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

use bitflags::bitflags;

bitflags! {
    /// Flags attached to a port at registration time.
    ///
    /// `IS_INPUT` and `IS_OUTPUT` are mutually exclusive and exactly one of
    /// the two must be set; [`PortFlags::direction_is_valid`] checks this.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PortFlags: u32 {
        const IS_INPUT = 0x1;
        const IS_OUTPUT = 0x2;
        const IS_PHYSICAL = 0x4;
        const CAN_MONITOR = 0x8;
        const IS_TERMINAL = 0x10;
    }
}

impl PortFlags {
    /// `true` if exactly one of `IS_INPUT`/`IS_OUTPUT` is set.
    pub fn direction_is_valid(self) -> bool {
        self.contains(PortFlags::IS_INPUT) ^ self.contains(PortFlags::IS_OUTPUT)
    }

    pub fn is_input(self) -> bool {
        self.contains(PortFlags::IS_INPUT)
    }

    pub fn is_output(self) -> bool {
        self.contains(PortFlags::IS_OUTPUT)
    }

    pub fn is_terminal(self) -> bool {
        self.contains(PortFlags::IS_TERMINAL)
    }

    pub fn can_monitor(self) -> bool {
        self.contains(PortFlags::CAN_MONITOR)
    }
}

/// The single type token the core understands natively: contiguous,
/// native-endian IEEE-754 32-bit floats, one per frame.
pub const AUDIO_TYPE: &str = "32 bit float mono audio";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_both_directions() {
        let flags = PortFlags::IS_INPUT | PortFlags::IS_OUTPUT;
        assert!(!flags.direction_is_valid());
    }

    #[test]
    fn rejects_no_direction() {
        assert!(!PortFlags::CAN_MONITOR.direction_is_valid());
    }

    #[test]
    fn accepts_single_direction() {
        assert!(PortFlags::IS_INPUT.direction_is_valid());
        assert!(PortFlags::IS_OUTPUT.direction_is_valid());
    }

    #[test]
    fn bitmask_matches_external_interface_contract() {
        assert_eq!(PortFlags::IS_INPUT.bits(), 0x1);
        assert_eq!(PortFlags::IS_OUTPUT.bits(), 0x2);
        assert_eq!(PortFlags::IS_PHYSICAL.bits(), 0x4);
        assert_eq!(PortFlags::CAN_MONITOR.bits(), 0x8);
        assert_eq!(PortFlags::IS_TERMINAL.bits(), 0x10);
    }
}
