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
//! The bipartite device/net graph and its class partitions (SPEC_FULL.md §3).
//!
//! Two owning arenas (`devices`, `nets`) hold every `Device`/`Net` for the duration of one
//! `Compare` call; everything else (class membership, pin endpoints, merge trails) is addressed
//! by index rather than by pointer, per the Design Notes "Cyclic graphs" guidance.

pub mod class;
pub mod device;
pub mod net;

pub use class::{DeviceClass, NetClass};
pub use device::{Device, PinEndpoint};
pub use net::{Net, NetPinRef};

use crate::ids::{CircuitTag, DeviceClassId, DeviceId, NetClassId, NetId};

/// Owning arenas for one `Compare` run's devices, nets, and current class partitions.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// All devices from both circuits, combined.
    pub devices: Vec<Device>,
    /// All nets from both circuits, combined.
    pub nets: Vec<Net>,
    /// Current device-class partition. Rebuilt wholesale by `Fracture` every iteration
    /// (REDESIGN FLAG 1).
    pub device_classes: Vec<DeviceClass>,
    /// Current net-class partition.
    pub net_classes: Vec<NetClass>,
}

impl Graph {
    /// An empty graph.
    pub fn new() -> Self {
        Default::default()
    }

    /// Push a device, returning its freshly assigned id.
    pub fn push_device(&mut self, build: impl FnOnce(DeviceId) -> Device) -> DeviceId {
        let id = DeviceId::new(self.devices.len());
        self.devices.push(build(id));
        id
    }

    /// Push a net, returning its freshly assigned id.
    pub fn push_net(&mut self, build: impl FnOnce(NetId) -> Net) -> NetId {
        let id = NetId::new(self.nets.len());
        self.nets.push(build(id));
        id
    }

    #[inline]
    pub fn device(&self, id: DeviceId) -> &Device {
        &self.devices[id.index()]
    }

    #[inline]
    pub fn device_mut(&mut self, id: DeviceId) -> &mut Device {
        &mut self.devices[id.index()]
    }

    #[inline]
    pub fn net(&self, id: NetId) -> &Net {
        &self.nets[id.index()]
    }

    #[inline]
    pub fn net_mut(&mut self, id: NetId) -> &mut Net {
        &mut self.nets[id.index()]
    }

    #[inline]
    pub fn device_class(&self, id: DeviceClassId) -> &DeviceClass {
        &self.device_classes[id.index()]
    }

    #[inline]
    pub fn net_class(&self, id: NetClassId) -> &NetClass {
        &self.net_classes[id.index()]
    }

    /// Which circuit a device belongs to: convenience closure target for
    /// `DeviceClass::circuit_counts`/`is_automorphism`.
    #[inline]
    pub fn device_circuit(&self, id: DeviceId) -> CircuitTag {
        self.device(id).circuit
    }

    /// Which circuit a net belongs to.
    #[inline]
    pub fn net_circuit(&self, id: NetId) -> CircuitTag {
        self.net(id).circuit
    }

    /// Total device + net count, checked against `EngineConfig::max_elements`
    /// (SPEC_FULL.md §4.1a).
    pub fn element_count(&self) -> usize {
        self.devices.len() + self.nets.len()
    }

    /// Place every non-[`absorbed`](device::Device::absorbed) device/net into one root class
    /// (SPEC_FULL.md §4.1: "each initially containing one class that holds the union of both
    /// cells' devices/nets"). Devices/nets retired by pre-reduction (SPEC_FULL.md §4.4) are left
    /// out of every class and take no further part in refinement.
    pub fn reset_to_root_classes(&mut self, device_magic: u64, net_magic: u64) {
        let mut device_class = DeviceClass::new(DeviceClassId::new(0), device_magic);
        device_class.members = (0..self.devices.len())
            .map(DeviceId::new)
            .filter(|&id| !self.device(id).absorbed)
            .collect();
        for d in &mut self.devices {
            d.class = DeviceClassId::new(0);
        }
        self.device_classes = vec![device_class];

        let mut net_class = NetClass::new(NetClassId::new(0), net_magic);
        net_class.members = (0..self.nets.len())
            .map(NetId::new)
            .filter(|&id| !self.net(id).absorbed)
            .collect();
        for n in &mut self.nets {
            n.class = NetClassId::new(0);
        }
        self.net_classes = vec![net_class];
    }

    /// `true` iff every device-class and net-class has exactly one member per circuit
    /// (SPEC_FULL.md §3, Invariant 3: the "matched" state).
    pub fn is_fully_matched(&self) -> bool {
        self.device_classes.iter().all(DeviceClass::is_matched_pair)
            && self.net_classes.iter().all(NetClass::is_matched_pair)
    }

    /// Any class with unequal circuit counts.
    pub fn has_illegal_partition(&self) -> bool {
        self.device_classes.iter().any(|c| !c.legal_partition)
            || self.net_classes.iter().any(|c| !c.legal_partition)
    }
}
