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
//! Graph builder (SPEC_FULL.md §4.1): turns two [`CellDefinition`]s into one [`Graph`].
//!
//! Grounded on `netcmp.c`'s `CreateTwoLists`/`CreateElementList`/`CreateNodeList`: walk each cell's
//! device table, emit a `Device` per instance with one `PinEndpoint` per declared pin, resolving
//! each pin's net by name within its own circuit. Unconnected pins keep a sentinel (`None`) net
//! reference rather than being dropped from the device side.

use std::collections::HashMap;

use crate::cell::{CellDefinition, CellLibrary, FileTag};
use crate::error::{NetcmpError, NetcmpResult};
use crate::graph::{Device, Graph, Net, PinEndpoint};
use crate::ids::{CircuitTag, NetId};
use crate::permute::compute_pin_magics;

/// Build the combined device/net graph for `(name1, tag1)` vs `(name2, tag2)`, with both cells'
/// elements starting in the single root class (`Graph::reset_to_root_classes` is left to the
/// caller, since it needs fresh magics from the engine's RNG).
///
/// `max_elements` is the ceiling enforced in place of the original's `malloc` failure path
/// (SPEC_FULL.md §4.1a); the projected device+net count is checked before any arena is populated.
pub fn build_graph(
    lib: &CellLibrary,
    name1: &str,
    tag1: FileTag,
    name2: &str,
    tag2: FileTag,
    max_elements: usize,
) -> NetcmpResult<Graph> {
    let cell1 = lib.get(name1, tag1).ok_or_else(|| NetcmpError::CellNotFound {
        name: name1.to_string(),
        file_tag: tag1,
    })?;
    let cell2 = lib.get(name2, tag2).ok_or_else(|| NetcmpError::CellNotFound {
        name: name2.to_string(),
        file_tag: tag2,
    })?;

    let projected = projected_element_count(cell1) + projected_element_count(cell2);
    if projected > max_elements {
        return Err(NetcmpError::AllocationError {
            attempted: projected,
            max: max_elements,
        });
    }

    let mut graph = Graph::new();
    populate_circuit(&mut graph, cell1, CircuitTag::One);
    populate_circuit(&mut graph, cell2, CircuitTag::Two);
    Ok(graph)
}

/// Upper bound on the elements one cell contributes: one per device, plus one per distinct net
/// name actually referenced by a pin (globals that are never wired to a pin contribute nothing).
fn projected_element_count(cell: &CellDefinition) -> usize {
    let mut net_names: std::collections::HashSet<&str> = std::collections::HashSet::new();
    for device in &cell.devices {
        for net in device.pin_nets.iter().flatten() {
            net_names.insert(net.as_str());
        }
    }
    cell.devices.len() + net_names.len()
}

fn populate_circuit(graph: &mut Graph, cell: &CellDefinition, circuit: CircuitTag) {
    let mut net_ids: HashMap<String, NetId> = HashMap::new();

    for instance in &cell.devices {
        let class_name = instance.kind.class_name();
        let permute_pairs = cell.permutes.get(&class_name).cloned().unwrap_or_default();
        let magics = compute_pin_magics(&class_name, &instance.pin_names, &permute_pairs);

        let mut pins = Vec::with_capacity(instance.pin_names.len());
        let mut resolved_nets = Vec::with_capacity(instance.pin_names.len());
        for (i, pin_name) in instance.pin_names.iter().enumerate() {
            let net_name = instance.pin_nets.get(i).cloned().flatten();
            let net_id = net_name.map(|name| get_or_create_net(graph, &mut net_ids, cell, circuit, &name));
            resolved_nets.push(net_id);
            pins.push(PinEndpoint {
                pin_name: pin_name.clone(),
                net: net_id,
                permutation_magic: magics[i],
            });
        }

        let device_id = graph.push_device(|id| {
            Device::new(
                id,
                circuit,
                instance.name.clone(),
                class_name.clone(),
                pins,
                Some(instance.properties.clone()),
            )
        });

        for (pin_index, net_id) in resolved_nets.into_iter().enumerate() {
            if let Some(net_id) = net_id {
                graph.net_mut(net_id).pins.push(crate::graph::NetPinRef {
                    device: device_id,
                    pin_index,
                });
            }
        }
    }
}

fn get_or_create_net(
    graph: &mut Graph,
    net_ids: &mut HashMap<String, NetId>,
    cell: &CellDefinition,
    circuit: CircuitTag,
    name: &str,
) -> NetId {
    if let Some(&id) = net_ids.get(name) {
        return id;
    }
    let is_global = cell.globals.contains(name);
    let id = graph.push_net(|id| Net::new(id, circuit, name, is_global));
    net_ids.insert(name.to_string(), id);
    id
}

/// Append dummy, unconnected [`PinEndpoint`]s (sentinel `net: None`, pin name `__proxy$i`, and a
/// magic distinct from every real pin on the device) to whichever of `a`/`b` is shorter, until
/// both have equal length.
///
/// Used by the hierarchical driver (SPEC_FULL.md §4.7) to equalize pin arity between two matched
/// subcell instances before their parent is re-compared, and available here because it is a
/// builder-level concern (device pin lists, not a hierarchy concept) per SPEC_FULL.md §4.1: "Dummy
/// pins are inserted so that the two cells being compared have equal pin arity."
pub fn equalize_pin_arity(a: &mut Vec<PinEndpoint>, b: &mut Vec<PinEndpoint>) {
    let proxy_magic_base = u64::MAX - 1;
    while a.len() < b.len() {
        let i = a.len();
        a.push(PinEndpoint {
            pin_name: format!("__proxy${}", i),
            net: None,
            permutation_magic: proxy_magic_base.wrapping_sub(i as u64),
        });
    }
    while b.len() < a.len() {
        let i = b.len();
        b.push(PinEndpoint {
            pin_name: format!("__proxy${}", i),
            net: None,
            permutation_magic: proxy_magic_base.wrapping_sub(i as u64),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{Direction, DeviceInstanceDef, DeviceKind, PrimitiveClass};
    use crate::property::PropertyRecord;

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
    fn builds_matching_device_and_net_counts() {
        let mut lib = CellLibrary::new();
        lib.insert(1, resistor_cell("r", "A", "B"));
        lib.insert(1, {
            let mut c = resistor_cell("r2", "A", "B");
            c.name = "r2".to_string();
            c
        });
        let graph = build_graph(&lib, "r", 1, "r2", 1, 10_000).expect("build should succeed");
        assert_eq!(graph.devices.len(), 2);
        assert_eq!(graph.nets.len(), 4);
    }

    #[test]
    fn missing_cell_is_reported() {
        let lib = CellLibrary::new();
        let err = build_graph(&lib, "nope", 1, "nope2", 2, 10_000).unwrap_err();
        assert_eq!(
            err,
            NetcmpError::CellNotFound {
                name: "nope".to_string(),
                file_tag: 1
            }
        );
    }

    #[test]
    fn allocation_ceiling_is_enforced() {
        let mut lib = CellLibrary::new();
        lib.insert(1, resistor_cell("r", "A", "B"));
        lib.insert(2, resistor_cell("r", "A", "B"));
        let err = build_graph(&lib, "r", 1, "r", 2, 1).unwrap_err();
        assert!(matches!(err, NetcmpError::AllocationError { .. }));
    }

    #[test]
    fn source_drain_share_a_magic_by_default() {
        let cell = CellDefinition::new("mos").with_device(DeviceInstanceDef::new(
            "M1",
            DeviceKind::Primitive(PrimitiveClass::Mosfet3),
            vec![
                ("drain", Some("D".to_string())),
                ("gate", Some("G".to_string())),
                ("source", Some("S".to_string())),
            ],
            PropertyRecord::new(),
        ));
        let mut lib = CellLibrary::new();
        lib.insert(1, cell.clone());
        let mut cell2 = cell;
        cell2.name = "mos2".to_string();
        lib.insert(1, cell2);

        let graph = build_graph(&lib, "mos", 1, "mos2", 1, 10_000).unwrap();
        let dev = &graph.devices[0];
        let drain = dev.pins.iter().find(|p| p.pin_name == "drain").unwrap();
        let source = dev.pins.iter().find(|p| p.pin_name == "source").unwrap();
        let gate = dev.pins.iter().find(|p| p.pin_name == "gate").unwrap();
        assert_eq!(drain.permutation_magic, source.permutation_magic);
        assert_ne!(drain.permutation_magic, gate.permutation_magic);
    }
}
