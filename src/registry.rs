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

//! The name-indexed directory of every live port.
//!
//! Owned entirely by the control domain. The realtime driver never touches
//! this type directly; it only ever sees the immutable projection the graph
//! compiler publishes (see [`crate::graph`]).

use std::collections::{HashMap, HashSet};

use regex::Regex;
use slotmap::SlotMap;

use crate::error::{Result, ServerError};
use crate::flags::PortFlags;
use crate::ids::{ClientId, PortId};
use crate::port::{Port, PortSpec};

#[derive(Default)]
pub struct PortRegistry {
    ports: SlotMap<PortId, Port>,
    by_qualified_name: HashMap<String, PortId>,
    by_owner: HashMap<ClientId, HashSet<PortId>>,
    max_ports: usize,
}

impl PortRegistry {
    pub fn new(max_ports: usize) -> Self {
        PortRegistry {
            ports: SlotMap::with_key(),
            by_qualified_name: HashMap::new(),
            by_owner: HashMap::new(),
            max_ports,
        }
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn get(&self, id: PortId) -> Option<&Port> {
        self.ports.get(id)
    }

    pub fn lookup(&self, qualified_name: &str) -> Option<PortId> {
        self.by_qualified_name.get(qualified_name).copied()
    }

    pub fn ports_of(&self, owner: ClientId) -> impl Iterator<Item = PortId> + '_ {
        self.by_owner
            .get(&owner)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    pub fn all_ids(&self) -> impl Iterator<Item = PortId> + '_ {
        self.ports.keys()
    }

    #[tracing::instrument(skip(self, spec), fields(short_name = %spec.short_name))]
    pub fn register(
        &mut self,
        owner: ClientId,
        owner_name: &str,
        spec: PortSpec,
    ) -> Result<PortId> {
        if spec.short_name.is_empty() {
            return Err(ServerError::InvalidState {
                client: owner_name.to_string(),
                reason: "port short name must not be empty".to_string(),
            });
        }
        if !spec.flags.direction_is_valid() {
            return Err(ServerError::WrongDirection {
                source_port: spec.short_name.clone(),
                destination: spec.short_name.clone(),
            });
        }
        if self.ports.len() >= self.max_ports {
            return Err(ServerError::InvalidState {
                client: owner_name.to_string(),
                reason: "port registry is at capacity".to_string(),
            });
        }

        let qualified = format!("{}:{}", owner_name, spec.short_name);
        if self.by_qualified_name.contains_key(&qualified) {
            return Err(ServerError::Duplicate(qualified));
        }

        let id = self.ports.insert_with_key(|id| Port {
            id,
            owner,
            owner_name: owner_name.to_string(),
            short_name: spec.short_name,
            port_type: spec.port_type,
            flags: spec.flags,
            latency_frames: 0,
            monitor_count: 0,
            locked_by: None,
            declared_buffer_size: spec.declared_buffer_size,
        });
        self.by_qualified_name.insert(qualified, id);
        self.by_owner.entry(owner).or_default().insert(id);
        tracing::info!(port = ?id, "port registered");
        Ok(id)
    }

    pub fn unregister(&mut self, id: PortId) -> Result<Port> {
        let port = self
            .ports
            .remove(id)
            .ok_or_else(|| ServerError::NotFound(format!("{:?}", id)))?;
        self.by_qualified_name.remove(&port.qualified_name());
        if let Some(set) = self.by_owner.get_mut(&port.owner) {
            set.remove(&id);
        }
        tracing::info!(port = ?id, "port unregistered");
        Ok(port)
    }

    /// Remove every port owned by `owner`, returning their ids so the caller
    /// (the session manager) can also drop incident connections.
    pub fn unregister_all_of(&mut self, owner: ClientId) -> Vec<PortId> {
        let ids: Vec<PortId> = self
            .by_owner
            .remove(&owner)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();
        for id in &ids {
            if let Some(port) = self.ports.remove(*id) {
                self.by_qualified_name.remove(&port.qualified_name());
            }
        }
        ids
    }

    /// Renames the short name of `id`, failing atomically if the resulting
    /// fully qualified name collides with an existing port.
    pub fn rename(&mut self, id: PortId, new_short_name: &str) -> Result<()> {
        let port = self
            .ports
            .get(id)
            .ok_or_else(|| ServerError::NotFound(format!("{:?}", id)))?;
        let new_qualified = format!("{}:{}", port.owner_name, new_short_name);
        if self.by_qualified_name.contains_key(&new_qualified) {
            return Err(ServerError::Duplicate(new_qualified));
        }
        let old_qualified = port.qualified_name();

        let port = self.ports.get_mut(id).unwrap();
        port.short_name = new_short_name.to_string();
        self.by_qualified_name.remove(&old_qualified);
        self.by_qualified_name.insert(new_qualified, id);
        Ok(())
    }

    pub fn set_latency(&mut self, id: PortId, frames: u32) -> Result<()> {
        let port = self
            .ports
            .get_mut(id)
            .ok_or_else(|| ServerError::NotFound(format!("{:?}", id)))?;
        port.latency_frames = frames;
        Ok(())
    }

    pub fn latency(&self, id: PortId) -> Result<u32> {
        self.ports
            .get(id)
            .map(|p| p.latency_frames)
            .ok_or_else(|| ServerError::NotFound(format!("{:?}", id)))
    }

    /// Counted monitor request: `on` increments, `off` decrements, floored at
    /// zero. Has no effect on ports without `CAN_MONITOR`.
    pub fn request_monitor(&mut self, id: PortId, on: bool) -> Result<()> {
        let port = self
            .ports
            .get_mut(id)
            .ok_or_else(|| ServerError::NotFound(format!("{:?}", id)))?;
        if !port.flags.can_monitor() {
            return Ok(());
        }
        if on {
            port.monitor_count += 1;
        } else {
            port.monitor_count = (port.monitor_count - 1).max(0);
        }
        Ok(())
    }

    /// Absolute monitor request: forces the count to `>= 1` on, `0` off.
    pub fn ensure_monitor(&mut self, id: PortId, on: bool) -> Result<()> {
        let port = self
            .ports
            .get_mut(id)
            .ok_or_else(|| ServerError::NotFound(format!("{:?}", id)))?;
        if !port.flags.can_monitor() {
            return Ok(());
        }
        port.monitor_count = if on { port.monitor_count.max(1) } else { 0 };
        Ok(())
    }

    pub fn lock(&mut self, id: PortId, by: ClientId) -> Result<()> {
        let port = self
            .ports
            .get_mut(id)
            .ok_or_else(|| ServerError::NotFound(format!("{:?}", id)))?;
        port.locked_by = Some(by);
        Ok(())
    }

    /// Releases the lock, regardless of who holds it. The session manager is
    /// responsible for calling this on client death so locks do not outlive
    /// their owner.
    pub fn unlock(&mut self, id: PortId) -> Result<()> {
        let port = self
            .ports
            .get_mut(id)
            .ok_or_else(|| ServerError::NotFound(format!("{:?}", id)))?;
        port.locked_by = None;
        Ok(())
    }

    /// `true` if `id` may be mutated by `requester` — unlocked, or locked by
    /// `requester` itself.
    pub fn is_mutable_by(&self, id: PortId, requester: Option<ClientId>) -> bool {
        match self.ports.get(id) {
            Some(port) => match port.locked_by {
                None => true,
                Some(owner) => Some(owner) == requester,
            },
            None => false,
        }
    }

    /// Enumerate ports matching a name regex, a type regex, and a flag mask.
    /// `None`/empty patterns skip that filter; an empty flag mask skips flag
    /// filtering. A non-empty mask matches ports whose flags are a superset
    /// of the mask (bitwise inclusion).
    pub fn enumerate(
        &self,
        name_pattern: Option<&str>,
        type_pattern: Option<&str>,
        flags_mask: PortFlags,
    ) -> Result<Vec<PortId>> {
        let name_re = match name_pattern.filter(|s| !s.is_empty()) {
            Some(p) => Some(Regex::new(p).map_err(|e| ServerError::InvalidState {
                client: "registry".to_string(),
                reason: format!("invalid name pattern: {}", e),
            })?),
            None => None,
        };
        let type_re = match type_pattern.filter(|s| !s.is_empty()) {
            Some(p) => Some(Regex::new(p).map_err(|e| ServerError::InvalidState {
                client: "registry".to_string(),
                reason: format!("invalid type pattern: {}", e),
            })?),
            None => None,
        };

        Ok(self
            .ports
            .iter()
            .filter(|(_, port)| {
                name_re
                    .as_ref()
                    .map_or(true, |re| re.is_match(&port.qualified_name()))
            })
            .filter(|(_, port)| type_re.as_ref().map_or(true, |re| re.is_match(&port.port_type)))
            .filter(|(_, port)| flags_mask.is_empty() || port.flags.contains(flags_mask))
            .map(|(id, _)| id)
            .collect())
    }
}
