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
//! `Device` (SPEC_FULL.md §3), called `Element` in the original source.

use crate::ids::{CircuitTag, DeviceClassId, DeviceId, NetId};
use crate::property::PropertyRecord;

/// The edge between a `Device` and a `Net` (SPEC_FULL.md §3 `PinEndpoint`).
#[derive(Debug, Clone)]
pub struct PinEndpoint {
    /// Declared pin name (used for reporting and for `ResolveAutomorphsByPin`-style lookups).
    pub pin_name: String,
    /// The net this pin connects to, or `None` for an unconnected (sentinel) pin.
    pub net: Option<NetId>,
    /// Permutation magic: two pins on the same device with equal magic are interchangeable
    /// (SPEC_FULL.md §4.3). Stable across refinement; never derived from neighbour classes.
    pub permutation_magic: u64,
}

/// One circuit instance: a transistor, resistor, or subcircuit call (SPEC_FULL.md §3).
#[derive(Debug, Clone)]
pub struct Device {
    id: DeviceId,
    /// Which input circuit this device came from.
    pub circuit: CircuitTag,
    /// Instance name, for reporting and name-based tie-breaking.
    pub name: String,
    /// Device-class name (`DeviceKind::class_name`), used by the hierarchical driver and by the
    /// default source/drain permutation rule.
    pub class_name: String,
    /// Ordered pin endpoints, one per declared pin (including any dummy pins inserted to
    /// equalize arity, SPEC_FULL.md §4.1/§4.7).
    pub pins: Vec<PinEndpoint>,
    /// Transient 64-bit hash, recomputed every refinement iteration.
    pub hash: u64,
    /// Current device-class.
    pub class: DeviceClassId,
    /// Properties attached to this instance, if any (post pre-reduction, this is the merged
    /// summary record; `merge_trail` carries the full expanded history).
    pub properties: Option<PropertyRecord>,
    /// Expanded trail of property records accumulated by series/parallel merging
    /// (SPEC_FULL.md §4.4): one entry per original device folded into this one, in merge order.
    /// Empty for a device that was never merged.
    pub merge_trail: Vec<PropertyRecord>,
    /// Set by pre-reduction (SPEC_FULL.md §4.4) when this device has been folded into another and
    /// should no longer participate in refinement. Never cleared.
    pub absorbed: bool,
}

impl Device {
    /// Construct a fresh, unclassed device. `class` must be set by the graph builder once the
    /// root class exists.
    pub fn new(
        id: DeviceId,
        circuit: CircuitTag,
        name: impl Into<String>,
        class_name: impl Into<String>,
        pins: Vec<PinEndpoint>,
        properties: Option<PropertyRecord>,
    ) -> Self {
        Device {
            id,
            circuit,
            name: name.into(),
            class_name: class_name.into(),
            pins,
            hash: 0,
            class: DeviceClassId::new(0),
            properties,
            merge_trail: Vec::new(),
            absorbed: false,
        }
    }

    /// This device's arena index.
    #[inline]
    pub fn id(&self) -> DeviceId {
        self.id
    }
}
