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

//! Server-wide tunables. The core reads these once at construction; it never
//! touches the environment or the filesystem itself, that belongs to whatever
//! out-of-scope process embeds the core.

#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServerConfig {
    /// Sample rate in Hz, as would be reported by `sample_rate()`.
    pub sample_rate: u32,

    /// Number of frames the audio driver delivers per period.
    pub period_frames: u32,

    /// Maximum length, in bytes, of a client's registered name.
    pub max_client_name_len: usize,

    /// Maximum number of live ports the registry will accept.
    pub max_ports: usize,

    /// Fraction of the period reserved as a client's soft deadline margin.
    /// A client whose callback has not returned by
    /// `period_frames / sample_rate * (1.0 - overrun_slack)` is still given
    /// until the hard period deadline, but the margin exists so a
    /// well-behaved client has room to notice it's running long.
    pub overrun_slack: f32,

    /// Whether the first client to activate automatically becomes the
    /// timebase master if the role is vacant.
    pub elect_timebase_on_first_active: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            sample_rate: 48_000,
            period_frames: 1024,
            max_client_name_len: 63,
            max_ports: 4096,
            overrun_slack: 0.1,
            elect_timebase_on_first_active: false,
        }
    }
}

impl ServerConfig {
    /// The hard per-cycle deadline implied by `period_frames` and
    /// `sample_rate`.
    pub fn period_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.period_frames as f64 / self.sample_rate as f64)
    }

    /// The soft per-client deadline derived from `overrun_slack`.
    pub fn soft_deadline(&self) -> std::time::Duration {
        self.period_duration().mul_f32(1.0 - self.overrun_slack)
    }
}
