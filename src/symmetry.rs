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
//! Symmetry breaker (SPEC_FULL.md §4.6), grounded on `netcmp.c`'s `ResolveAutomorphsByPin`/
//! `ResolveAutomorphsByProperty`/`ResolveAutomorphisms`.
//!
//! Each strategy hand-picks which members of an automorphic class should be forced into the same
//! new bucket by poking their hash directly (`refine::fracture_with_overrides`) rather than
//! waiting for a random class magic to (maybe) do it, then reconverges with exhaustive
//! subdivision enabled so the rest of the partition can react to the forced split.

use crate::cell::CellDefinition;
use crate::error::NetcmpResult;
use crate::graph::Graph;
use crate::ids::{CircuitTag, DeviceId, NetId};
use crate::properties_match::property_match;
use crate::refine::{fracture_with_overrides, run_to_fixed_point, verify_matching, MatchVerdict};
use crate::rng::SplitMix64;

/// Strategy 1 (SPEC_FULL.md §4.6.1): within each automorphic net-class, a net in circuit 2 that
/// has exactly the same name as a net in circuit 1 is forced into the same bucket as that net.
pub fn resolve_by_pin_name(graph: &mut Graph, rng: &mut SplitMix64, mut poll: impl FnMut() -> bool) -> NetcmpResult<MatchVerdict> {
    let mut net_overrides: Vec<(NetId, u64)> = Vec::new();
    for class in &graph.net_classes {
        if !class.is_automorphism(|n| graph.net_circuit(n)) {
            continue;
        }
        let ones: Vec<NetId> = class.members.iter().copied().filter(|&n| graph.net_circuit(n) == CircuitTag::One).collect();
        let twos: Vec<NetId> = class.members.iter().copied().filter(|&n| graph.net_circuit(n) == CircuitTag::Two).collect();
        let mut twos_taken = vec![false; twos.len()];
        for &n1 in &ones {
            if let Some((j, &n2)) = twos.iter().enumerate().find(|&(j, &n2)| !twos_taken[j] && graph.net(n2).name == graph.net(n1).name) {
                twos_taken[j] = true;
                let fresh = rng.next_u64();
                net_overrides.push((n1, fresh));
                net_overrides.push((n2, fresh));
            }
        }
    }
    fracture_with_overrides(graph, &[], &net_overrides);
    run_to_fixed_point(graph, rng, true, &mut poll)?;
    Ok(verify_matching(graph))
}

/// Strategy 2 (SPEC_FULL.md §4.6.2): within each automorphic device-class, group devices whose
/// property records match (§4.5) under a common fresh hash. A device whose property comparison
/// fails for every candidate on the other side is left where it was; it remains automorphic (or
/// becomes the arbitrary strategy's problem) rather than being force-matched incorrectly.
pub fn resolve_by_property(
    graph: &mut Graph,
    cell1: &CellDefinition,
    cell2: &CellDefinition,
    rng: &mut SplitMix64,
    mut poll: impl FnMut() -> bool,
) -> NetcmpResult<MatchVerdict> {
    let mut device_overrides: Vec<(DeviceId, u64)> = Vec::new();

    for class in &graph.device_classes {
        if !class.is_automorphism(|d| graph.device_circuit(d)) {
            continue;
        }
        let mut remaining: Vec<DeviceId> = class.members.clone();
        while let Some(anchor) = remaining.first().copied() {
            remaining.remove(0);
            let (anchor_dict, other_dict) = if graph.device_circuit(anchor) == CircuitTag::One {
                (&cell1.property_dict, &cell2.property_dict)
            } else {
                (&cell2.property_dict, &cell1.property_dict)
            };
            let case_insensitive = cell1.case_insensitive_strings || cell2.case_insensitive_strings;

            // Find the first still-unassigned candidate from the *other* circuit whose
            // properties match; at most one per circuit participates per fresh hash (a cleaner
            // automorphism of size > 2 per circuit is left for a later round).
            let partner_pos = remaining.iter().position(|&cand| {
                graph.device_circuit(cand) != graph.device_circuit(anchor)
                    && property_match(anchor_dict, other_dict, graph.device(anchor), graph.device(cand), case_insensitive) == 0
            });
            if let Some(pos) = partner_pos {
                let partner = remaining.remove(pos);
                let fresh = rng.next_u64();
                device_overrides.push((anchor, fresh));
                device_overrides.push((partner, fresh));
            }
        }
    }

    fracture_with_overrides(graph, &device_overrides, &[]);
    run_to_fixed_point(graph, rng, true, &mut poll)?;
    Ok(verify_matching(graph))
}

/// `ResolveAutomorphisms() -> int` (SPEC_FULL.md §6): strategy 3, one arbitrary-breaking step.
/// Picks one still-automorphic class (devices first, then nets), arbitrarily pairs one member
/// from each circuit under a fresh hash, and reconverges. Callers loop on this until it returns a
/// non-positive `VerifyMatching` code (SPEC_FULL.md §4.6.3: "Repeat until no automorphisms remain
/// or an illegal partition appears").
pub fn resolve_one_step(graph: &mut Graph, rng: &mut SplitMix64, mut poll: impl FnMut() -> bool) -> NetcmpResult<MatchVerdict> {
    let mut device_overrides: Vec<(DeviceId, u64)> = Vec::new();
    let mut net_overrides: Vec<(NetId, u64)> = Vec::new();

    'devices: for class in &graph.device_classes {
        if class.is_automorphism(|d| graph.device_circuit(d)) {
            let one = class.members.iter().copied().find(|&d| graph.device_circuit(d) == CircuitTag::One);
            let two = class.members.iter().copied().find(|&d| graph.device_circuit(d) == CircuitTag::Two);
            if let (Some(a), Some(b)) = (one, two) {
                let fresh = rng.next_u64();
                device_overrides.push((a, fresh));
                device_overrides.push((b, fresh));
                break 'devices;
            }
        }
    }

    if device_overrides.is_empty() {
        'nets: for class in &graph.net_classes {
            if class.is_automorphism(|n| graph.net_circuit(n)) {
                let one = class.members.iter().copied().find(|&n| graph.net_circuit(n) == CircuitTag::One);
                let two = class.members.iter().copied().find(|&n| graph.net_circuit(n) == CircuitTag::Two);
                if let (Some(a), Some(b)) = (one, two) {
                    let fresh = rng.next_u64();
                    net_overrides.push((a, fresh));
                    net_overrides.push((b, fresh));
                    break 'nets;
                }
            }
        }
    }

    fracture_with_overrides(graph, &device_overrides, &net_overrides);
    run_to_fixed_point(graph, rng, true, &mut poll)?;
    Ok(verify_matching(graph))
}

/// Run all three strategies in order (SPEC_FULL.md §4.6: "Three strategies are attempted in
/// order"), looping the arbitrary step until no automorphisms remain or a mismatch appears.
/// Convenience wrapper used by the hierarchical driver and by `Engine`'s top-level `compare`.
pub fn resolve_to_completion(
    graph: &mut Graph,
    cell1: &CellDefinition,
    cell2: &CellDefinition,
    rng: &mut SplitMix64,
    mut poll: impl FnMut() -> bool,
) -> NetcmpResult<MatchVerdict> {
    let mut verdict = verify_matching(graph);
    if !matches!(verdict, MatchVerdict::Automorphisms(_)) {
        return Ok(verdict);
    }

    verdict = resolve_by_pin_name(graph, rng, &mut poll)?;
    if matches!(verdict, MatchVerdict::Automorphisms(_)) {
        verdict = resolve_by_property(graph, cell1, cell2, rng, &mut poll)?;
    }
    while matches!(verdict, MatchVerdict::Automorphisms(_)) {
        let before = match verdict {
            MatchVerdict::Automorphisms(k) => k,
            _ => 0,
        };
        verdict = resolve_one_step(graph, rng, &mut poll)?;
        if let MatchVerdict::Automorphisms(after) = verdict {
            // An arbitrary pick that doesn't reduce the automorphism count can't converge;
            // SPEC_FULL.md §4.6.3 treats a bad, asymmetric arbitrary pick as a mismatch, but a
            // pick that merely fails to progress (a perfectly symmetric remainder) is reported
            // as-is rather than looped forever.
            if after >= before {
                break;
            }
        }
    }
    Ok(verdict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_graph;
    use crate::cell::{CellDefinition, CellLibrary, Direction, DeviceInstanceDef, DeviceKind, PrimitiveClass};
    use crate::property::PropertyRecord;

    /// `top { inv1, inv2 }` on both sides, where `inv1`/`inv2` are identical inverters whose
    /// outputs drive a shared net (SPEC_FULL.md §8 testable property 8 / end-to-end scenario E4).
    fn two_identical_instances_cell(name: &str) -> CellDefinition {
        CellDefinition::new(name)
            .with_pin("vout", Direction::Output)
            .with_device(DeviceInstanceDef::new(
                "inv1",
                DeviceKind::Primitive(PrimitiveClass::Resistor),
                vec![("1", Some("vin".to_string())), ("2", Some("vout".to_string()))],
                PropertyRecord::new(),
            ))
            .with_device(DeviceInstanceDef::new(
                "inv2",
                DeviceKind::Primitive(PrimitiveClass::Resistor),
                vec![("1", Some("vin".to_string())), ("2", Some("vout".to_string()))],
                PropertyRecord::new(),
            ))
    }

    #[test]
    fn arbitrary_breaking_resolves_a_two_way_automorphism() {
        let mut lib = CellLibrary::new();
        lib.insert(1, two_identical_instances_cell("top"));
        lib.insert(2, two_identical_instances_cell("top"));
        let cell1 = lib.get("top", 1).unwrap().clone();
        let cell2 = lib.get("top", 2).unwrap().clone();

        let mut graph = build_graph(&lib, "top", 1, "top", 2, 10_000).unwrap();
        graph.reset_to_root_classes(1, 1);

        let mut rng = SplitMix64::new(99);
        crate::refine::run_to_fixed_point(&mut graph, &mut rng, false, || true).unwrap();
        assert!(matches!(verify_matching(&graph), MatchVerdict::Automorphisms(_)));

        let verdict = resolve_to_completion(&mut graph, &cell1, &cell2, &mut rng, || true).unwrap();
        assert_eq!(verdict, MatchVerdict::Perfect);
    }
}
