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
//! Hash & refine (SPEC_FULL.md §4.2): the engine.
//!
//! Grounded on `netcmp.c`'s `ElementHash`/`NodeHash`/`Iterate`/`FractureElementClass`/
//! `FractureNodeClass`/`VerifyMatching`. Classes are rebuilt wholesale every round rather than
//! mutated in place (REDESIGN FLAG 1); `BTreeMap` (not `HashMap`) buckets the hash groups so class
//! ordering is deterministic across runs with the same `SplitMix64` seed.

use std::collections::BTreeMap;

use log::{debug, trace};

use crate::error::{NetcmpError, NetcmpResult};
use crate::graph::{DeviceClass, Graph, NetClass};
use crate::ids::{DeviceClassId, DeviceId, NetClassId, NetId};
use crate::rng::{magic, SplitMix64};

/// Substituted for a neighbour net-class's magic when a device pin is unconnected (sentinel net
/// reference, SPEC_FULL.md §4.1), so that a dangling pin still contributes a stable, distinctive
/// term to `DeviceHash`.
pub const UNCONNECTED_NET_MAGIC: u64 = u64::MAX;

/// Outcome of a converged refinement (`VerifyMatching`, SPEC_FULL.md §6).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MatchVerdict {
    /// No illegal partitions, every class has exactly one member per circuit.
    Perfect,
    /// No illegal partitions, but `count` classes have equal circuit counts > 1.
    Automorphisms(usize),
    /// At least one class has unequal circuit counts.
    Mismatch,
}

impl MatchVerdict {
    /// The original's `-1`/`0`/`k` encoding (SPEC_FULL.md §6 `VerifyMatching() -> int`).
    pub fn as_code(self) -> i32 {
        match self {
            MatchVerdict::Mismatch => -1,
            MatchVerdict::Perfect => 0,
            MatchVerdict::Automorphisms(k) => k as i32,
        }
    }
}

/// Run one refinement round: reassign class magics, rehash every device/net, and fracture both
/// class partitions. Returns `true` once a round produces no further splits (`Iterate() ->
/// bool_done`, SPEC_FULL.md §6).
pub fn iterate(graph: &mut Graph, rng: &mut SplitMix64, exhaustive: bool) -> bool {
    for class in &mut graph.device_classes {
        class.magic = magic(rng);
    }
    for class in &mut graph.net_classes {
        class.magic = magic(rng);
    }

    let old_device_hash: Vec<u64> = graph.devices.iter().map(|d| d.hash).collect();

    let mut new_device_hash = vec![0u64; graph.devices.len()];
    for device in &graph.devices {
        let mut h = old_device_hash[device.id().index()];
        for pin in &device.pins {
            let net_class_magic = match pin.net {
                Some(net_id) => graph.net_class(graph.net(net_id).class).magic,
                None => UNCONNECTED_NET_MAGIC,
            };
            h ^= pin.permutation_magic ^ net_class_magic;
        }
        new_device_hash[device.id().index()] = h;
    }

    let mut new_net_hash = vec![0u64; graph.nets.len()];
    for net in &graph.nets {
        let mut h = 0u64;
        for pin_ref in &net.pins {
            let device = graph.device(pin_ref.device);
            let pin = &device.pins[pin_ref.pin_index];
            let device_class_magic = graph.device_class(device.class).magic;
            h ^= pin.permutation_magic ^ old_device_hash[device.id().index()] ^ device_class_magic;
        }
        new_net_hash[net.id().index()] = h;
    }

    for device in &mut graph.devices {
        device.hash = new_device_hash[device.id().index()];
    }
    for net in &mut graph.nets {
        net.hash = new_net_hash[net.id().index()];
    }

    let device_splits = fracture_device_classes(graph, exhaustive);
    let net_splits = fracture_net_classes(graph, exhaustive);
    trace!(
        "iterate: {} device classes ({} splits), {} net classes ({} splits)",
        graph.device_classes.len(),
        device_splits,
        graph.net_classes.len(),
        net_splits
    );

    device_splits == 0 && net_splits == 0
}

/// Run `iterate` until it reports no further splits, polling `poll_interrupt` at each round
/// boundary (SPEC_FULL.md §5: "checked ... at the top of each `Iterate` call"). Returns the number
/// of rounds executed.
pub fn run_to_fixed_point(
    graph: &mut Graph,
    rng: &mut SplitMix64,
    exhaustive: bool,
    mut poll_interrupt: impl FnMut() -> bool,
) -> NetcmpResult<u32> {
    let mut rounds = 0u32;
    loop {
        if !poll_interrupt() {
            return Err(NetcmpError::Interrupted);
        }
        let done = iterate(graph, rng, exhaustive);
        rounds += 1;
        if done {
            debug!("refinement converged after {} round(s)", rounds);
            return Ok(rounds);
        }
    }
}

/// `VerifyMatching()` (SPEC_FULL.md §4.2/§6): read the converged partition's verdict without
/// mutating it.
pub fn verify_matching(graph: &Graph) -> MatchVerdict {
    if graph.has_illegal_partition() {
        return MatchVerdict::Mismatch;
    }
    let automorphisms = graph
        .device_classes
        .iter()
        .filter(|c| c.is_automorphism(|d| graph.device_circuit(d)))
        .count()
        + graph
            .net_classes
            .iter()
            .filter(|c| c.is_automorphism(|n| graph.net_circuit(n)))
            .count();
    if automorphisms == 0 {
        MatchVerdict::Perfect
    } else {
        MatchVerdict::Automorphisms(automorphisms)
    }
}

/// Poke specific devices'/nets' hash values directly, then fracture both partitions once with
/// exhaustive subdivision, without recomputing hashes from class magics first.
///
/// Used only by the symmetry breaker (SPEC_FULL.md §4.6), which mirrors the original's direct
/// `hashval` assignments in `ResolveAutomorphsByPin`/`ByProperty`/arbitrary breaking, those
/// routines hand-pick which members of an automorphic class should land in the same new bucket,
/// rather than letting a fresh class magic decide it.
pub(crate) fn fracture_with_overrides(
    graph: &mut Graph,
    device_overrides: &[(DeviceId, u64)],
    net_overrides: &[(NetId, u64)],
) -> (usize, usize) {
    for &(id, h) in device_overrides {
        graph.device_mut(id).hash = h;
    }
    for &(id, h) in net_overrides {
        graph.net_mut(id).hash = h;
    }
    let d = fracture_device_classes(graph, true);
    let n = fracture_net_classes(graph, true);
    (d, n)
}

/// `FractureElementClass` (SPEC_FULL.md §4.2): rebuild `graph.device_classes` by bucketing each
/// existing class's members by their freshly computed hash. Returns the number of classes
/// produced in excess of the original count (the loop's split counter); the illegal-partition
/// merge sweep runs after and does not affect this count.
fn fracture_device_classes(graph: &mut Graph, exhaustive: bool) -> usize {
    let old_classes = std::mem::take(&mut graph.device_classes);
    let mut splits = 0usize;
    let mut legal: Vec<DeviceClass> = Vec::new();
    let mut illegal_members: Vec<DeviceId> = Vec::new();

    for class in old_classes {
        if !exhaustive && class.is_matched_pair() {
            legal.push(class);
            continue;
        }
        let mut buckets: BTreeMap<u64, Vec<DeviceId>> = BTreeMap::new();
        for member in class.members {
            buckets.entry(graph.device(member).hash).or_default().push(member);
        }
        if buckets.len() > 1 {
            splits += buckets.len() - 1;
        }
        for (_, members) in buckets {
            let (c1, c2) = circuit_split(&members, |d| graph.device_circuit(d));
            if c1 == c2 {
                legal.push(DeviceClass {
                    id: DeviceClassId::new(0),
                    magic: 0,
                    members,
                    legal_partition: true,
                });
            } else {
                illegal_members.extend(members);
            }
        }
    }

    if !illegal_members.is_empty() {
        legal.push(DeviceClass {
            id: DeviceClassId::new(0),
            magic: 0,
            members: illegal_members,
            legal_partition: false,
        });
    }

    for (i, class) in legal.iter_mut().enumerate() {
        class.id = DeviceClassId::new(i);
        for &member in &class.members {
            graph.device_mut(member).class = class.id;
        }
    }
    graph.device_classes = legal;
    splits
}

/// `FractureNodeClass`, mirroring [`fracture_device_classes`] for nets.
fn fracture_net_classes(graph: &mut Graph, exhaustive: bool) -> usize {
    let old_classes = std::mem::take(&mut graph.net_classes);
    let mut splits = 0usize;
    let mut legal: Vec<NetClass> = Vec::new();
    let mut illegal_members: Vec<NetId> = Vec::new();

    for class in old_classes {
        if !exhaustive && class.is_matched_pair() {
            legal.push(class);
            continue;
        }
        let mut buckets: BTreeMap<u64, Vec<NetId>> = BTreeMap::new();
        for member in class.members {
            buckets.entry(graph.net(member).hash).or_default().push(member);
        }
        if buckets.len() > 1 {
            splits += buckets.len() - 1;
        }
        for (_, members) in buckets {
            let (c1, c2) = circuit_split(&members, |n| graph.net_circuit(n));
            if c1 == c2 {
                legal.push(NetClass {
                    id: NetClassId::new(0),
                    magic: 0,
                    members,
                    legal_partition: true,
                });
            } else {
                illegal_members.extend(members);
            }
        }
    }

    if !illegal_members.is_empty() {
        legal.push(NetClass {
            id: NetClassId::new(0),
            magic: 0,
            members: illegal_members,
            legal_partition: false,
        });
    }

    for (i, class) in legal.iter_mut().enumerate() {
        class.id = NetClassId::new(i);
        for &member in &class.members {
            graph.net_mut(member).class = class.id;
        }
    }
    graph.net_classes = legal;
    splits
}

fn circuit_split<T: Copy, F: Fn(T) -> crate::ids::CircuitTag>(members: &[T], tag_of: F) -> (usize, usize) {
    let mut c1 = 0;
    let mut c2 = 0;
    for &m in members {
        match tag_of(m) {
            crate::ids::CircuitTag::One => c1 += 1,
            crate::ids::CircuitTag::Two => c2 += 1,
        }
    }
    (c1, c2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Device, Net, PinEndpoint};
    use crate::ids::CircuitTag;

    /// Two isomorphic one-resistor circuits: `R1` between `A`/`B` on each side.
    fn two_resistor_graph() -> Graph {
        let mut graph = Graph::new();
        let a1 = graph.push_net(|id| Net::new(id, CircuitTag::One, "A", false));
        let b1 = graph.push_net(|id| Net::new(id, CircuitTag::One, "B", false));
        let a2 = graph.push_net(|id| Net::new(id, CircuitTag::Two, "A", false));
        let b2 = graph.push_net(|id| Net::new(id, CircuitTag::Two, "B", false));

        let d1 = graph.push_device(|id| {
            Device::new(
                id,
                CircuitTag::One,
                "R1",
                "resistor",
                vec![
                    PinEndpoint { pin_name: "1".into(), net: Some(a1), permutation_magic: 1 },
                    PinEndpoint { pin_name: "2".into(), net: Some(b1), permutation_magic: 2 },
                ],
                None,
            )
        });
        let d2 = graph.push_device(|id| {
            Device::new(
                id,
                CircuitTag::Two,
                "R1",
                "resistor",
                vec![
                    PinEndpoint { pin_name: "1".into(), net: Some(a2), permutation_magic: 1 },
                    PinEndpoint { pin_name: "2".into(), net: Some(b2), permutation_magic: 2 },
                ],
                None,
            )
        });

        graph.net_mut(a1).pins.push(crate::graph::NetPinRef { device: d1, pin_index: 0 });
        graph.net_mut(b1).pins.push(crate::graph::NetPinRef { device: d1, pin_index: 1 });
        graph.net_mut(a2).pins.push(crate::graph::NetPinRef { device: d2, pin_index: 0 });
        graph.net_mut(b2).pins.push(crate::graph::NetPinRef { device: d2, pin_index: 1 });

        graph.reset_to_root_classes(1, 1);
        graph
    }

    #[test]
    fn identical_circuits_converge_to_perfect_match() {
        let mut graph = two_resistor_graph();
        let mut rng = SplitMix64::new(7);
        run_to_fixed_point(&mut graph, &mut rng, false, || true).expect("no interrupt");
        assert_eq!(verify_matching(&graph), MatchVerdict::Perfect);
        assert!(graph.is_fully_matched());
    }

    #[test]
    fn interrupt_is_reported() {
        let mut graph = two_resistor_graph();
        let mut rng = SplitMix64::new(7);
        let mut polls = 0;
        let result = run_to_fixed_point(&mut graph, &mut rng, false, || {
            polls += 1;
            polls < 1
        });
        assert_eq!(result.unwrap_err(), NetcmpError::Interrupted);
    }

    #[test]
    fn mismatched_wiring_is_detected() {
        let mut graph = two_resistor_graph();
        // Rewire circuit 2's R1 pin 1 onto net B instead of A: now both pins land on B.
        let a2 = graph.nets.iter().find(|n| n.circuit == CircuitTag::Two && n.name == "A").unwrap().id();
        let b2 = graph.nets.iter().find(|n| n.circuit == CircuitTag::Two && n.name == "B").unwrap().id();
        let d2 = graph.devices.iter().find(|d| d.circuit == CircuitTag::Two).unwrap().id();
        graph.net_mut(a2).pins.retain(|p| !(p.device == d2 && p.pin_index == 0));
        graph.device_mut(d2).pins[0].net = Some(b2);
        graph.net_mut(b2).pins.push(crate::graph::NetPinRef { device: d2, pin_index: 0 });

        let mut rng = SplitMix64::new(7);
        run_to_fixed_point(&mut graph, &mut rng, false, || true).unwrap();
        assert_eq!(verify_matching(&graph), MatchVerdict::Mismatch);
    }
}
