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
//! Pin permutation (SPEC_FULL.md §4.3), grounded on `netcmp.c`'s `Permute`/`PermuteSetup`/
//! `PermuteForget`.
//!
//! `build_graph` (§4.1) already seeds every pin with a magic grouped by the permutes declared in
//! each cell *at build time*. This module exists so that `PermuteSetup`/`PermuteForget` calls made
//! after `CreateTwoLists` (SPEC_FULL.md §6 lists them as separate operations) are reflected before
//! the first `Iterate()`: `permute()` recomputes every device's pin magics from the cells' current
//! permutes tables, so it is safe, and idempotent, to call any number of times before refinement
//! starts.

use std::hash::{Hash, Hasher};

use crate::cell::CellDefinition;
use crate::graph::Graph;
use crate::ids::CircuitTag;

/// The pin-name pair that's permutable by default for `class_name`, per `DeviceKind::class_name`
/// (SPEC_FULL.md §4.3: "Default transistor rules", plus the original's resistor/capacitor/
/// inductor node permutability: a symmetric two-terminal primitive has no preferred terminal
/// order, so its two pins ("1"/"2") share a magic the same way MOS source/drain does).
fn default_permute_pair(class_name: &str) -> Option<(&'static str, &'static str)> {
    match class_name {
        "mosfet3" | "mosfet4" => Some(("source", "drain")),
        "resistor" | "capacitor" | "inductor" => Some(("1", "2")),
        _ => None,
    }
}

/// Recompute every device's pin permutation magics from `cell1`/`cell2`'s current `permutes`
/// tables (`Permute()`, SPEC_FULL.md §6).
pub fn permute(graph: &mut Graph, cell1: &CellDefinition, cell2: &CellDefinition) {
    for device in &mut graph.devices {
        let cell = match device.circuit {
            CircuitTag::One => cell1,
            CircuitTag::Two => cell2,
        };
        let permute_pairs = cell.permutes.get(&device.class_name).cloned().unwrap_or_default();

        let pin_names: Vec<String> = device.pins.iter().map(|p| p.pin_name.clone()).collect();
        let magics = compute_pin_magics(&device.class_name, &pin_names, &permute_pairs);
        for (pin, magic) in device.pins.iter_mut().zip(magics) {
            pin.permutation_magic = magic;
        }
    }
}

/// Seed one magic per pin from a hash of the device's class name plus positional index, then
/// union pins declared permutable (explicit `permute_pairs`, plus the class's default
/// permutation pair, if any) so every pin in a permutation group shares one magic
/// (SPEC_FULL.md §4.1/§4.3).
pub fn compute_pin_magics(class_name: &str, pin_names: &[String], permute_pairs: &[(String, String)]) -> Vec<u64> {
    let base = fnv_hash(class_name);
    let mut magics: Vec<u64> = (0..pin_names.len()).map(|i| base.wrapping_add(i as u64)).collect();

    let mut dsu = DisjointSet::new(pin_names.len());
    let index_of = |name: &str| pin_names.iter().position(|p| p == name);

    for (a, b) in permute_pairs {
        if let (Some(i), Some(j)) = (index_of(a), index_of(b)) {
            dsu.union(i, j);
        }
    }
    if let Some((a, b)) = default_permute_pair(class_name) {
        if let (Some(i), Some(j)) = (index_of(a), index_of(b)) {
            dsu.union(i, j);
        }
    }

    for i in 0..pin_names.len() {
        let root = dsu.find(i);
        magics[i] = magics[root];
    }
    magics
}

fn fnv_hash(s: &str) -> u64 {
    let mut hasher = fnv::FnvHasher::default();
    s.hash(&mut hasher);
    hasher.finish()
}

/// Minimal union-find over pin indices, used only to group permutable pins before magic
/// assignment.
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        DisjointSet {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            // Lower index wins as root so the group's shared magic is deterministic.
            if ra < rb {
                self.parent[rb] = ra;
            } else {
                self.parent[ra] = rb;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpaired_pins_keep_distinct_magics() {
        let pins = vec!["drain".to_string(), "gate".to_string(), "source".to_string()];
        let magics = compute_pin_magics("bjt", &pins, &[]);
        assert_ne!(magics[0], magics[1]);
        assert_ne!(magics[1], magics[2]);
        assert_ne!(magics[0], magics[2]);
    }

    #[test]
    fn explicit_permute_pair_shares_a_magic() {
        let pins = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let pairs = vec![("a".to_string(), "c".to_string())];
        let magics = compute_pin_magics("module", &pins, &pairs);
        assert_eq!(magics[0], magics[2]);
        assert_ne!(magics[0], magics[1]);
    }

    #[test]
    fn default_mos_rule_only_applies_to_mos_classes() {
        let pins = vec!["drain".to_string(), "gate".to_string(), "source".to_string()];
        let magics_mos = compute_pin_magics("mosfet3", &pins, &[]);
        assert_eq!(magics_mos[0], magics_mos[2]);

        let magics_other = compute_pin_magics("bjt", &pins, &[]);
        assert_ne!(magics_other[0], magics_other[2]);
    }

    #[test]
    fn default_two_terminal_rule_unions_resistor_and_capacitor_pins() {
        let pins = vec!["1".to_string(), "2".to_string()];
        let magics_r = compute_pin_magics("resistor", &pins, &[]);
        assert_eq!(magics_r[0], magics_r[1]);

        let magics_c = compute_pin_magics("capacitor", &pins, &[]);
        assert_eq!(magics_c[0], magics_c[1]);

        let magics_bjt = compute_pin_magics("bjt", &pins, &[]);
        assert_ne!(magics_bjt[0], magics_bjt[1]);
    }
}
