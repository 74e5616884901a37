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
//! Reporter (SPEC_FULL.md §4.8), grounded on `netcmp.c`'s `FormatBadElementFragment`/
//! `FormatBadNodeFragment`/`SummarizeDataStructures`.
//!
//! Turns a converged [`Graph`] into two parallel listings (matched / mismatched) plus a summary,
//! without mutating anything. Interrupt is polled once per enumeration, per SPEC_FULL.md §5.

use crate::cell::CellDefinition;
use crate::error::{NetcmpError, NetcmpResult};
use crate::graph::Graph;
use crate::ids::CircuitTag;
use crate::properties_match::property_match;
use crate::refine::{verify_matching, MatchVerdict};

/// One legal, fully-matched device class (§4.8 "matched groups").
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchedDevicePair {
    /// Circuit-1 device's instance name.
    pub name1: String,
    /// Circuit-2 device's instance name.
    pub name2: String,
    /// Device class name (resistor, mosfet3, ...).
    pub class_name: String,
}

/// One legal, fully-matched net class.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchedNetPair {
    /// Circuit-1 net's name.
    pub name1: String,
    /// Circuit-2 net's name.
    pub name2: String,
}

/// One member of an illegal (mismatched) class, with its fanout signature (§4.8).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FanoutEntry {
    /// Which circuit this member came from.
    pub circuit: CircuitTag,
    /// Instance (device) or net name.
    pub name: String,
    /// `(pin_name, connected)` for a device, or `(model:pin-name, endpoint_count)`-style label
    /// for a net, see [`device_fanout`]/[`net_fanout`].
    pub fanout: Vec<(String, usize)>,
}

/// One illegal class: every member's fanout signature, grouped for display.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MismatchedGroup {
    /// Members of the illegal class, both circuits interleaved in discovery order.
    pub members: Vec<FanoutEntry>,
}

/// One property mismatch surfaced during reporting (SPEC_FULL.md §4.8: "the full list of property
/// mismatches").
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PropertyMismatch {
    /// Circuit-1 device instance name.
    pub name1: String,
    /// Circuit-2 device instance name.
    pub name2: String,
    /// Number of mismatched property keys (`PropertyMatch`'s return value, §4.5).
    pub mismatched_keys: i32,
}

/// The reporter's full output for one `Compare` (§4.8).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompareReport {
    /// `VerifyMatching` outcome this report was built from.
    pub verdict: MatchVerdict,
    /// Circuit-1 / circuit-2 device counts.
    pub device_count: (usize, usize),
    /// Circuit-1 / circuit-2 net counts.
    pub net_count: (usize, usize),
    /// Matched device class pairs, first-encountered order (§5: "Matched-pair reporting is
    /// stable").
    pub matched_devices: Vec<MatchedDevicePair>,
    /// Matched net class pairs.
    pub matched_nets: Vec<MatchedNetPair>,
    /// Illegal device classes.
    pub mismatched_devices: Vec<MismatchedGroup>,
    /// Illegal net classes.
    pub mismatched_nets: Vec<MismatchedGroup>,
    /// Property mismatches across every matched device pair.
    pub property_mismatches: Vec<PropertyMismatch>,
}

/// Build the full report for a converged graph (§4.8). `poll_interrupt` is checked once per
/// enumeration (device classes, net classes, property pass), SPEC_FULL.md §5: "checked ... at the
/// start of each enumeration in the reporter".
pub fn build_report(
    graph: &Graph,
    cell1: &CellDefinition,
    cell2: &CellDefinition,
    mut poll_interrupt: impl FnMut() -> bool,
) -> NetcmpResult<CompareReport> {
    let verdict = verify_matching(graph);

    let device_count = count_by_circuit(graph.devices.iter().map(|d| (d.circuit, d.absorbed)));
    let net_count = count_by_circuit(graph.nets.iter().map(|n| (n.circuit, n.absorbed)));

    if !poll_interrupt() {
        return Err(NetcmpError::Interrupted);
    }
    let mut matched_devices = Vec::new();
    let mut mismatched_devices = Vec::new();
    for class in &graph.device_classes {
        if class.is_matched_pair() {
            let one = class.members.iter().copied().find(|&d| graph.device_circuit(d) == CircuitTag::One);
            let two = class.members.iter().copied().find(|&d| graph.device_circuit(d) == CircuitTag::Two);
            if let (Some(a), Some(b)) = (one, two) {
                matched_devices.push(MatchedDevicePair {
                    name1: graph.device(a).name.clone(),
                    name2: graph.device(b).name.clone(),
                    class_name: graph.device(a).class_name.clone(),
                });
            }
        } else if !class.legal_partition {
            let members = class
                .members
                .iter()
                .map(|&id| {
                    let d = graph.device(id);
                    FanoutEntry {
                        circuit: d.circuit,
                        name: d.name.clone(),
                        fanout: device_fanout(graph, id),
                    }
                })
                .collect();
            mismatched_devices.push(MismatchedGroup { members });
        }
    }

    if !poll_interrupt() {
        return Err(NetcmpError::Interrupted);
    }
    let mut matched_nets = Vec::new();
    let mut mismatched_nets = Vec::new();
    for class in &graph.net_classes {
        if class.is_matched_pair() {
            let one = class.members.iter().copied().find(|&n| graph.net_circuit(n) == CircuitTag::One);
            let two = class.members.iter().copied().find(|&n| graph.net_circuit(n) == CircuitTag::Two);
            if let (Some(a), Some(b)) = (one, two) {
                matched_nets.push(MatchedNetPair {
                    name1: graph.net(a).name.clone(),
                    name2: graph.net(b).name.clone(),
                });
            }
        } else if !class.legal_partition {
            let members = class
                .members
                .iter()
                .map(|&id| {
                    let n = graph.net(id);
                    FanoutEntry {
                        circuit: n.circuit,
                        name: n.name.clone(),
                        fanout: net_fanout(graph, id),
                    }
                })
                .collect();
            mismatched_nets.push(MismatchedGroup { members });
        }
    }

    if !poll_interrupt() {
        return Err(NetcmpError::Interrupted);
    }
    let case_insensitive = cell1.case_insensitive_strings || cell2.case_insensitive_strings;
    let mut property_mismatches = Vec::new();
    for pair in &matched_devices {
        let one = graph.devices.iter().find(|d| d.circuit == CircuitTag::One && d.name == pair.name1);
        let two = graph.devices.iter().find(|d| d.circuit == CircuitTag::Two && d.name == pair.name2);
        if let (Some(d1), Some(d2)) = (one, two) {
            let n = property_match(&cell1.property_dict, &cell2.property_dict, d1, d2, case_insensitive);
            if n > 0 {
                property_mismatches.push(PropertyMismatch {
                    name1: pair.name1.clone(),
                    name2: pair.name2.clone(),
                    mismatched_keys: n,
                });
            }
        }
    }

    Ok(CompareReport {
        verdict,
        device_count,
        net_count,
        matched_devices,
        matched_nets,
        mismatched_devices,
        mismatched_nets,
        property_mismatches,
    })
}

fn count_by_circuit(items: impl Iterator<Item = (CircuitTag, bool)>) -> (usize, usize) {
    let mut c1 = 0;
    let mut c2 = 0;
    for (circuit, absorbed) in items {
        if absorbed {
            continue;
        }
        match circuit {
            CircuitTag::One => c1 += 1,
            CircuitTag::Two => c2 += 1,
        }
    }
    (c1, c2)
}

/// `FormatBadElementFragment` (§4.8): for each pin, whether it is connected, grouped by
/// permutation magic so interchangeable pins (source/drain) report as one bucket rather than two
/// arbitrarily-ordered ones.
fn device_fanout(graph: &Graph, id: crate::ids::DeviceId) -> Vec<(String, usize)> {
    use itertools::Itertools;
    graph
        .device(id)
        .pins
        .iter()
        .map(|p| (p.permutation_magic, p.pin_name.clone(), p.net.is_some()))
        .sorted_by_key(|(magic, _, _)| *magic)
        .group_by(|(magic, _, _)| *magic)
        .into_iter()
        .map(|(_, group)| {
            let group: Vec<_> = group.collect();
            let label = group.iter().map(|(_, name, _)| name.as_str()).join("/");
            let connected = group.iter().filter(|(_, _, c)| *c).count();
            (label, connected)
        })
        .collect()
}

/// `FormatBadNodeFragment` (§4.8): `model:pin-name` endpoint counts for a net, i.e. how many pins
/// of each `(device class, pin name)` shape connect to it.
fn net_fanout(graph: &Graph, id: crate::ids::NetId) -> Vec<(String, usize)> {
    use itertools::Itertools;
    graph
        .net(id)
        .pins
        .iter()
        .map(|pin_ref| {
            let device = graph.device(pin_ref.device);
            let pin = &device.pins[pin_ref.pin_index];
            format!("{}:{}", device.class_name, pin.pin_name)
        })
        .counts()
        .into_iter()
        .sorted()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_graph;
    use crate::cell::{CellDefinition, CellLibrary, Direction, DeviceInstanceDef, DeviceKind, PrimitiveClass};
    use crate::property::PropertyRecord;
    use crate::refine::run_to_fixed_point;
    use crate::rng::SplitMix64;

    fn resistor_cell(name: &str, net_a: &str, net_b: &str) -> CellDefinition {
        CellDefinition::new(name)
            .with_pin("a", Direction::InOut)
            .with_pin("b", Direction::InOut)
            .with_device(DeviceInstanceDef::new(
                "R1",
                DeviceKind::Primitive(PrimitiveClass::Resistor),
                vec![("1", Some(net_a.to_string())), ("2", Some(net_b.to_string()))],
                PropertyRecord::new(),
            ))
    }

    #[test]
    fn identical_circuits_report_one_matched_device_and_no_mismatches() {
        let mut lib = CellLibrary::new();
        lib.insert(1, resistor_cell("top", "A", "B"));
        lib.insert(2, resistor_cell("top", "A", "B"));
        let cell1 = lib.get("top", 1).unwrap().clone();
        let cell2 = lib.get("top", 2).unwrap().clone();

        let mut graph = build_graph(&lib, "top", 1, "top", 2, 10_000).unwrap();
        graph.reset_to_root_classes(1, 1);
        let mut rng = SplitMix64::new(3);
        run_to_fixed_point(&mut graph, &mut rng, false, || true).unwrap();

        let report = build_report(&graph, &cell1, &cell2, || true).unwrap();
        assert_eq!(report.verdict, MatchVerdict::Perfect);
        assert_eq!(report.device_count, (1, 1));
        assert_eq!(report.net_count, (2, 2));
        assert_eq!(report.matched_devices.len(), 1);
        assert!(report.mismatched_devices.is_empty());
        assert!(report.property_mismatches.is_empty());
    }

    #[test]
    fn mismatched_wiring_is_reported_with_fanout() {
        let mut lib = CellLibrary::new();
        lib.insert(1, resistor_cell("top", "A", "B"));
        // Circuit 2: both pins of R1 land on B (rewired), so hashing can never pair it with A/B.
        lib.insert(2, resistor_cell("top", "B", "B"));
        let cell1 = lib.get("top", 1).unwrap().clone();
        let cell2 = lib.get("top", 2).unwrap().clone();

        let mut graph = build_graph(&lib, "top", 1, "top", 2, 10_000).unwrap();
        graph.reset_to_root_classes(1, 1);
        let mut rng = SplitMix64::new(3);
        run_to_fixed_point(&mut graph, &mut rng, false, || true).unwrap();

        let report = build_report(&graph, &cell1, &cell2, || true).unwrap();
        assert_eq!(report.verdict, MatchVerdict::Mismatch);
        assert!(!report.mismatched_nets.is_empty());
    }

    #[test]
    fn interrupt_during_reporting_is_propagated() {
        let mut lib = CellLibrary::new();
        lib.insert(1, resistor_cell("top", "A", "B"));
        lib.insert(2, resistor_cell("top", "A", "B"));
        let cell1 = lib.get("top", 1).unwrap().clone();
        let cell2 = lib.get("top", 2).unwrap().clone();

        let mut graph = build_graph(&lib, "top", 1, "top", 2, 10_000).unwrap();
        graph.reset_to_root_classes(1, 1);
        let mut rng = SplitMix64::new(3);
        run_to_fixed_point(&mut graph, &mut rng, false, || true).unwrap();

        let err = build_report(&graph, &cell1, &cell2, || false).unwrap_err();
        assert_eq!(err, NetcmpError::Interrupted);
    }
}
