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
//! Pre-reduction: series/parallel device merging (SPEC_FULL.md §4.4).
//!
//! Grounded on `netcmp.c`'s `series_sort`/`parallel_sort`/`series_optimize`/`PropertyOptimize`
//! family. Runs once per circuit, independently, before the graph builder's output is ever handed
//! to `refine.rs`; a merged-away device/net is marked [`absorbed`](crate::graph::Device::absorbed)
//! rather than physically removed from its arena (REDESIGN FLAG 1 applies here too: a `Vec`
//! can't cheaply drop an interior element without invalidating every later index).
//!
//! Series merging is supported for devices with exactly two pins (the canonical resistor-chain
//! case in SPEC_FULL.md's testable properties and end-to-end scenarios); a device with more or
//! fewer pins is simply never offered as a series-merge candidate. Generalizing to arbitrary
//! arity would require matching "the other pins connect appropriately" against a canonical
//! ordering that the distilled spec leaves unspecified.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::cell::CellDefinition;
use crate::graph::{Graph, NetPinRef, PinEndpoint};
use crate::ids::{CircuitTag, DeviceId, NetId};
use crate::permute::compute_pin_magics;
use crate::property::{values_match, MergePolicy, PropertyDict, PropertyKey, PropertyRecord, PropertyType, PropertyValue, Slop, KEY_M, KEY_S};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum MergeDirection {
    Parallel,
    Series,
}

/// Run parallel and series merge passes to a fixed point (SPEC_FULL.md §4.4: "alternating
/// parallel and series passes"). Returns the total number of merges performed.
pub fn reduce_to_fixed_point(graph: &mut Graph, cell1: &CellDefinition, cell2: &CellDefinition) -> usize {
    let mut total = 0;
    loop {
        let parallel = parallel_pass(graph, cell1, cell2);
        let series = series_pass(graph, cell1, cell2);
        total += parallel + series;
        debug!("pre-reduction pass: {} parallel, {} series merges", parallel, series);
        if parallel == 0 && series == 0 {
            break;
        }
    }
    total
}

fn cell_for(circuit: CircuitTag, cell1: &CellDefinition, cell2: &CellDefinition) -> (&CellDefinition, ()) {
    match circuit {
        CircuitTag::One => (cell1, ()),
        CircuitTag::Two => (cell2, ()),
    }
}

/// Combine two devices known to be parallel- or series-mergeable (SPEC_FULL.md §4.4: "combined
/// into one device with summed additives").
fn merge_properties(dict: &PropertyDict, direction: MergeDirection, a: &PropertyRecord, b: &PropertyRecord) -> PropertyRecord {
    let mut keys: BTreeSet<String> = dict.declared_keys().map(String::from).collect();
    keys.insert(KEY_M.to_string());
    keys.insert(KEY_S.to_string());
    keys.extend(a.keys().map(String::from));
    keys.extend(b.keys().map(String::from));

    let mut result = PropertyRecord::new();
    for key in keys {
        let def = dict
            .get(&key)
            .unwrap_or_else(|| PropertyKey::numeric(PropertyType::Integer, Slop::Absolute(0)));
        let policy = match direction {
            MergeDirection::Parallel => def.parallel,
            MergeDirection::Series => def.series,
        };
        let va = a.get(&key).cloned().unwrap_or_else(|| def.default.clone().unwrap_or(PropertyValue::Integer(0)));
        let vb = b.get(&key).cloned().unwrap_or_else(|| def.default.clone().unwrap_or(PropertyValue::Integer(0)));
        let value = if policy == MergePolicy::Additive { add_values(&va, &vb) } else { va };
        result.set(key, value);
    }
    result
}

fn add_values(a: &PropertyValue, b: &PropertyValue) -> PropertyValue {
    match (a, b) {
        (PropertyValue::Integer(x), PropertyValue::Integer(y)) => PropertyValue::Integer(x + y),
        _ => PropertyValue::Double(a.as_f64().unwrap_or(0.0) + b.as_f64().unwrap_or(0.0)),
    }
}

/// Whether every `direction`-critical declared property (plus the implicit `M`/`S`) matches
/// within slop between `a` and `b` (SPEC_FULL.md §4.4: "all *parallel-critical* properties match
/// within slop" / "series-critical properties match within slop").
fn critical_properties_match(dict: &PropertyDict, direction: MergeDirection, a: &PropertyRecord, b: &PropertyRecord) -> bool {
    let mut keys: BTreeSet<String> = dict.declared_keys().map(String::from).collect();
    keys.insert(KEY_M.to_string());
    keys.insert(KEY_S.to_string());

    for key in keys {
        let def = match dict.get(&key) {
            Some(def) => def,
            None => continue,
        };
        let policy = match direction {
            MergeDirection::Parallel => def.parallel,
            MergeDirection::Series => def.series,
        };
        if policy != MergePolicy::Critical {
            continue;
        }
        let va = a.get(&key).cloned().unwrap_or_else(|| def.default.clone().unwrap_or(PropertyValue::Integer(0)));
        let vb = b.get(&key).cloned().unwrap_or_else(|| def.default.clone().unwrap_or(PropertyValue::Integer(0)));
        if !values_match(&def, &va, &vb) {
            return false;
        }
    }
    true
}

fn remove_device_backrefs(graph: &mut Graph, device: DeviceId) {
    let nets: Vec<NetId> = graph.device(device).pins.iter().filter_map(|p| p.net).collect();
    for net in nets {
        graph.net_mut(net).pins.retain(|p| p.device != device);
    }
}

/// `M`/`S` exclusivity (DESIGN.md Open Question 3, SPEC_FULL.md §9): a device already folded by
/// the *other* reduction direction is not eligible for this one.
fn exclusivity_ok(graph: &Graph, device: DeviceId, direction: MergeDirection) -> bool {
    let props = graph.device(device).properties.as_ref();
    match direction {
        MergeDirection::Parallel => props.map(|p| p.series_count()).unwrap_or(1) == 1,
        MergeDirection::Series => props.map(|p| p.multiplicity()).unwrap_or(1) == 1,
    }
}

// ---------------------------------------------------------------------------------------------
// Parallel merging
// ---------------------------------------------------------------------------------------------

fn parallel_pass(graph: &mut Graph, cell1: &CellDefinition, cell2: &CellDefinition) -> usize {
    let mut merges = 0;
    for circuit in [CircuitTag::One, CircuitTag::Two] {
        let (cell, ()) = cell_for(circuit, cell1, cell2);

        let mut groups: BTreeMap<(String, Vec<(u64, Option<NetId>)>), Vec<DeviceId>> = BTreeMap::new();
        for device in &graph.devices {
            if device.absorbed || device.circuit != circuit {
                continue;
            }
            let mut signature: Vec<(u64, Option<NetId>)> = device.pins.iter().map(|p| (p.permutation_magic, p.net)).collect();
            signature.sort();
            groups.entry((device.class_name.clone(), signature)).or_default().push(device.id());
        }

        for (_, mut members) in groups {
            let mut i = 0;
            while i < members.len() {
                let mut j = i + 1;
                while j < members.len() {
                    if can_parallel_merge(graph, cell, members[i], members[j]) {
                        merge_parallel(graph, cell, members[i], members[j]);
                        members.remove(j);
                        merges += 1;
                    } else {
                        j += 1;
                    }
                }
                i += 1;
            }
        }
    }
    merges
}

fn can_parallel_merge(graph: &Graph, cell: &CellDefinition, a: DeviceId, b: DeviceId) -> bool {
    if !exclusivity_ok(graph, a, MergeDirection::Parallel) || !exclusivity_ok(graph, b, MergeDirection::Parallel) {
        return false;
    }
    let pa = graph.device(a).properties.clone().unwrap_or_default();
    let pb = graph.device(b).properties.clone().unwrap_or_default();
    critical_properties_match(&cell.property_dict, MergeDirection::Parallel, &pa, &pb)
}

fn merge_parallel(graph: &mut Graph, cell: &CellDefinition, survivor: DeviceId, absorbed: DeviceId) {
    let merged = merge_properties(
        &cell.property_dict,
        MergeDirection::Parallel,
        &graph.device(survivor).properties.clone().unwrap_or_default(),
        &graph.device(absorbed).properties.clone().unwrap_or_default(),
    );
    let trail = extend_merge_trail(graph, survivor, absorbed);

    remove_device_backrefs(graph, absorbed);

    let survivor_mut = graph.device_mut(survivor);
    survivor_mut.properties = Some(merged);
    survivor_mut.merge_trail = trail;

    let absorbed_mut = graph.device_mut(absorbed);
    absorbed_mut.absorbed = true;
    absorbed_mut.pins.clear();
}

fn extend_merge_trail(graph: &Graph, survivor: DeviceId, absorbed: DeviceId) -> Vec<PropertyRecord> {
    let survivor_dev = graph.device(survivor);
    let mut trail = if survivor_dev.merge_trail.is_empty() {
        vec![survivor_dev.properties.clone().unwrap_or_default()]
    } else {
        survivor_dev.merge_trail.clone()
    };
    let absorbed_dev = graph.device(absorbed);
    if absorbed_dev.merge_trail.is_empty() {
        trail.push(absorbed_dev.properties.clone().unwrap_or_default());
    } else {
        trail.extend(absorbed_dev.merge_trail.clone());
    }
    trail
}

// ---------------------------------------------------------------------------------------------
// Series merging
// ---------------------------------------------------------------------------------------------

fn series_pass(graph: &mut Graph, cell1: &CellDefinition, cell2: &CellDefinition) -> usize {
    let mut merges = 0;
    for circuit in [CircuitTag::One, CircuitTag::Two] {
        let (cell, ()) = cell_for(circuit, cell1, cell2);

        loop {
            let candidates: Vec<DeviceId> = graph
                .devices
                .iter()
                .filter(|d| !d.absorbed && d.circuit == circuit && d.pins.len() == 2)
                .map(|d| d.id())
                .collect();

            let mut found = None;
            'search: for (idx, &a) in candidates.iter().enumerate() {
                for &b in &candidates[idx + 1..] {
                    if let Some(shared) = can_series_merge(graph, cell, a, b) {
                        found = Some((a, b, shared));
                        break 'search;
                    }
                }
            }

            match found {
                Some((a, b, shared)) => {
                    merge_series(graph, cell, a, b, shared);
                    merges += 1;
                }
                None => break,
            }
        }
    }
    merges
}

fn shared_internal_net(graph: &Graph, a: DeviceId, b: DeviceId) -> Option<NetId> {
    let da = graph.device(a);
    let db = graph.device(b);
    da.pins
        .iter()
        .filter_map(|p| p.net)
        .find(|&n| db.pins.iter().any(|p| p.net == Some(n)) && graph.net(n).is_internal_to(a, b))
}

fn can_series_merge(graph: &Graph, cell: &CellDefinition, a: DeviceId, b: DeviceId) -> Option<NetId> {
    let da = graph.device(a);
    let db = graph.device(b);
    if da.class_name != db.class_name {
        return None;
    }
    if !exclusivity_ok(graph, a, MergeDirection::Series) || !exclusivity_ok(graph, b, MergeDirection::Series) {
        return None;
    }
    let shared = shared_internal_net(graph, a, b)?;

    let pa = da.properties.clone().unwrap_or_default();
    let pb = db.properties.clone().unwrap_or_default();
    if critical_properties_match(&cell.property_dict, MergeDirection::Series, &pa, &pb) {
        Some(shared)
    } else {
        None
    }
}

fn merge_series(graph: &mut Graph, cell: &CellDefinition, survivor: DeviceId, absorbed: DeviceId, shared: NetId) {
    let outer_survivor = graph.device(survivor).pins.iter().find(|p| p.net != Some(shared)).and_then(|p| p.net);
    let outer_absorbed = graph.device(absorbed).pins.iter().find(|p| p.net != Some(shared)).and_then(|p| p.net);

    let merged = merge_properties(
        &cell.property_dict,
        MergeDirection::Series,
        &graph.device(survivor).properties.clone().unwrap_or_default(),
        &graph.device(absorbed).properties.clone().unwrap_or_default(),
    );
    let trail = extend_merge_trail(graph, survivor, absorbed);

    remove_device_backrefs(graph, survivor);
    remove_device_backrefs(graph, absorbed);

    let class_name = graph.device(survivor).class_name.clone();
    let permute_pairs = cell.permutes.get(&class_name).cloned().unwrap_or_default();
    let pin_names = vec!["1".to_string(), "2".to_string()];
    let magics = compute_pin_magics(&class_name, &pin_names, &permute_pairs);

    let new_pins = vec![
        PinEndpoint {
            pin_name: pin_names[0].clone(),
            net: outer_survivor,
            permutation_magic: magics[0],
        },
        PinEndpoint {
            pin_name: pin_names[1].clone(),
            net: outer_absorbed,
            permutation_magic: magics[1],
        },
    ];

    let survivor_mut = graph.device_mut(survivor);
    survivor_mut.pins = new_pins;
    survivor_mut.properties = Some(merged);
    survivor_mut.merge_trail = trail;

    let absorbed_mut = graph.device_mut(absorbed);
    absorbed_mut.absorbed = true;
    absorbed_mut.pins.clear();

    graph.net_mut(shared).absorbed = true;
    graph.net_mut(shared).pins.clear();

    if let Some(n) = outer_survivor {
        graph.net_mut(n).pins.push(NetPinRef { device: survivor, pin_index: 0 });
    }
    if let Some(n) = outer_absorbed {
        graph.net_mut(n).pins.push(NetPinRef { device: survivor, pin_index: 1 });
    }
}
