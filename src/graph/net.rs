/*
 * Copyright (c) 2020-2020 Thomas Kramer.
 *
 * This file is part of LibrEDA
 * (see https://codeberg.org/libreda).
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <http://www.gnu.org/licenses/>.
 */
//! `Net` (SPEC_FULL.md §3), called `Node` in the original source.

use crate::ids::{CircuitTag, DeviceId, NetClassId, NetId};

/// Back-pointer from a `Net` to one of the pins connected to it.
#[derive(Debug, Clone, Copy)]
pub struct NetPinRef {
    /// The device owning the pin.
    pub device: DeviceId,
    /// Index of the pin within `Device::pins`.
    pub pin_index: usize,
}

/// One electrical node (SPEC_FULL.md §3).
#[derive(Debug, Clone)]
pub struct Net {
    id: NetId,
    /// Which input circuit this net came from.
    pub circuit: CircuitTag,
    /// Net name.
    pub name: String,
    /// Whether this is one of the cell's declared global nets (power, ground, ...).
    pub is_global: bool,
    /// Pins connected to this net. Unconnected device pins are *not* represented here
    /// (SPEC_FULL.md §4.1: "Unconnected pins are dropped from the net side").
    pub pins: Vec<NetPinRef>,
    /// Transient 64-bit hash, recomputed every refinement iteration.
    pub hash: u64,
    /// Current net-class.
    pub class: NetClassId,
    /// Set by pre-reduction (SPEC_FULL.md §4.4) when a series merge retires this net (it sat
    /// between exactly the two devices being merged) and it should no longer participate in
    /// refinement. Never cleared.
    pub absorbed: bool,
}

impl Net {
    /// Construct a fresh, unclassed, unconnected net.
    pub fn new(id: NetId, circuit: CircuitTag, name: impl Into<String>, is_global: bool) -> Self {
        Net {
            id,
            circuit,
            name: name.into(),
            is_global,
            pins: Vec::new(),
            hash: 0,
            class: NetClassId::new(0),
            absorbed: false,
        }
    }

    /// This net's arena index.
    #[inline]
    pub fn id(&self) -> NetId {
        self.id
    }

    /// Whether exactly one device connects to this net and it is not global: the eligibility
    /// condition for the shared net in a series merge (SPEC_FULL.md §4.4: "an *internal* net
    /// (connected to no other device)").
    ///
    /// "Connected to no other device" is interpreted, per the original's `series_optimize`
    /// family, as: exactly two pin connections, both belonging to the two candidate devices.
    pub fn is_internal_to(&self, a: DeviceId, b: DeviceId) -> bool {
        !self.is_global
            && self.pins.len() == 2
            && self.pins.iter().all(|p| p.device == a || p.device == b)
            && self.pins.iter().any(|p| p.device == a)
            && self.pins.iter().any(|p| p.device == b)
    }
}
