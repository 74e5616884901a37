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
//! Hierarchical driver (SPEC_FULL.md §4.7), grounded on `netcmp.c`'s `CreateCompareQueue`/
//! `DescendCountQueue`/`DescendCompareQueue`/`MatchPins`/`addproxies`.
//!
//! The compare-queue builder is naturally recursive over the subcell DAG in the original source;
//! per the Design Notes ("Recursive descent") this is an explicit work stack here instead, so a
//! pathological hierarchy can't blow the call stack.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::cell::{CellDefinition, CellLibrary, DeviceKind, FileTag};

/// One scheduled pair of subcells to compare: the spec's "Correspondence entry"
/// `(className1, fileTag1, className2, fileTag2)`, and one element of the CompareQueue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparePair {
    /// Circuit-1 subcell class name.
    pub class1: String,
    /// Circuit-1 file tag.
    pub file1: FileTag,
    /// Circuit-2 subcell class name.
    pub class2: String,
    /// Circuit-2 file tag.
    pub file2: FileTag,
}

/// `CreateCompareQueue(top1, top2) -> code` result (SPEC_FULL.md §6): `Ok(())` success, `Err(1)`
/// if `top1` is unresolved, `Err(2)` if `top2` is unresolved.
pub type QueueBuildResult<T> = Result<T, u8>;

/// User hints (`EquivalenceClasses`/`equate class`) plus the cross-call memory of which subcell
/// class pairs a previous `Compare` has already judged equivalent (SPEC_FULL.md §4.7 point:
/// "record the class-hash equivalence globally").
#[derive(Debug, Default)]
pub struct HierarchyDriver {
    equate: HashMap<(String, FileTag), (String, FileTag)>,
    class_equivalent: HashMap<(String, FileTag), (String, FileTag)>,
}

impl HierarchyDriver {
    /// A driver with no pre-matched classes yet.
    pub fn new() -> Self {
        Default::default()
    }

    /// `EquivalenceClasses(name1, tag1, name2, tag2)` (SPEC_FULL.md §6): declare a user-supplied
    /// pre-match between two subcell classes, consulted ahead of automatic matching in
    /// `create_compare_queue`.
    pub fn equate_classes(&mut self, name1: impl Into<String>, tag1: FileTag, name2: impl Into<String>, tag2: FileTag) {
        let (name1, name2) = (name1.into(), name2.into());
        self.equate.insert((name1.clone(), tag1), (name2.clone(), tag2));
        self.equate.insert((name2, tag2), (name1, tag1));
    }

    /// Record that two subcell classes compared equal, so later lookups in the same (or a
    /// subsequent) queue build treat them as pre-matched too.
    pub fn record_match(&mut self, name1: &str, tag1: FileTag, name2: &str, tag2: FileTag) {
        self.class_equivalent
            .insert((name1.to_string(), tag1), (name2.to_string(), tag2));
        self.class_equivalent
            .insert((name2.to_string(), tag2), (name1.to_string(), tag1));
    }

    fn prematched(&self, name: &str, tag: FileTag) -> Option<&(String, FileTag)> {
        self.class_equivalent
            .get(&(name.to_string(), tag))
            .or_else(|| self.equate.get(&(name.to_string(), tag)))
    }

    /// `CreateCompareQueue(top1, top2) -> code` (SPEC_FULL.md §4.7/§6): walk both hierarchies
    /// bottom-up, greedily matching unmatched subcells level by level, deepest first, and append
    /// the top-level pair last.
    pub fn create_compare_queue(
        &self,
        lib: &CellLibrary,
        top1: &str,
        file1: FileTag,
        top2: &str,
        file2: FileTag,
    ) -> QueueBuildResult<Vec<ComparePair>> {
        lib.get(top1, file1).ok_or(1u8)?;
        lib.get(top2, file2).ok_or(2u8)?;

        let levels1 = levels_by_depth(lib, top1, file1);
        let levels2 = levels_by_depth(lib, top2, file2);
        let max_level = levels1.keys().chain(levels2.keys()).copied().max().unwrap_or(0);

        let mut matched1: HashSet<String> = HashSet::new();
        let mut matched2: HashSet<String> = HashSet::new();
        let mut queue = Vec::new();

        for level in (1..=max_level).rev() {
            // Circuit 1 -> circuit 2, then circuit 2 -> circuit 1 (`DescendCompareQueue` is run
            // once per direction per level in the original, to catch matches discoverable only
            // from one side's name-equivalence lookup).
            if let Some(names1) = levels1.get(&level) {
                for name1 in names1 {
                    if matched1.contains(name1) {
                        continue;
                    }
                    if let Some(name2) = self.find_candidate(lib, name1, file1, file2, &levels2, level, &matched2) {
                        matched1.insert(name1.clone());
                        matched2.insert(name2.clone());
                        queue.push(ComparePair {
                            class1: name1.clone(),
                            file1,
                            class2: name2,
                            file2,
                        });
                    }
                }
            }
            if let Some(names2) = levels2.get(&level) {
                for name2 in names2 {
                    if matched2.contains(name2) {
                        continue;
                    }
                    if let Some(name1) = self.find_candidate(lib, name2, file2, file1, &levels1, level, &matched1) {
                        matched1.insert(name1.clone());
                        matched2.insert(name2.clone());
                        queue.push(ComparePair {
                            class1: name1,
                            file1,
                            class2: name2.clone(),
                            file2,
                        });
                    }
                }
            }
        }

        queue.push(ComparePair {
            class1: top1.to_string(),
            file1,
            class2: top2.to_string(),
            file2,
        });
        Ok(queue)
    }

    /// Find a match for `name`/`own_file` among `other_levels[level]`, not already matched: (a)
    /// user/prior-compare equivalence, (b) structural class-hash equality, (c) name equality
    /// modulo duplicate-suffix stripping.
    fn find_candidate(
        &self,
        lib: &CellLibrary,
        name: &str,
        own_file: FileTag,
        other_file: FileTag,
        other_levels: &HashMap<u32, Vec<String>>,
        level: u32,
        other_matched: &HashSet<String>,
    ) -> Option<String> {
        let candidates = other_levels.get(&level)?;

        if let Some((eq_name, eq_file)) = self.prematched(name, own_file) {
            if *eq_file == other_file && candidates.contains(eq_name) && !other_matched.contains(eq_name) {
                return Some(eq_name.clone());
            }
        }

        let own_cell = lib.get(name, own_file);
        if let Some(own_cell) = own_cell {
            let own_hash = structural_class_hash(own_cell);
            if let Some(found) = candidates.iter().find(|c| {
                !other_matched.contains(*c)
                    && lib.get(c, other_file).map(structural_class_hash) == Some(own_hash)
            }) {
                return Some(found.clone());
            }
        }

        let stripped = strip_duplicate_suffix(name);
        candidates
            .iter()
            .find(|c| !other_matched.contains(*c) && strip_duplicate_suffix(c) == stripped)
            .cloned()
    }
}

/// A cheap structural fingerprint of a cell's device netlist (device class names, sorted, plus
/// pin count), used as the "equal class-hash (name-based)" matching step (§4.7 point 2b). Not the
/// same thing as the refinement engine's per-iteration class magic, this is a static hash
/// computed once from a cell's shape, independent of any particular comparison.
fn structural_class_hash(cell: &CellDefinition) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut names: Vec<String> = cell.devices.iter().map(|d| d.kind.class_name()).collect();
    names.sort();
    let mut hasher = fnv::FnvHasher::default();
    names.hash(&mut hasher);
    cell.pins.len().hash(&mut hasher);
    hasher.finish()
}

/// Strip a trailing duplicate-cell marker such as `$3` or `[2]` (SPEC_FULL.md §4.7 point 2c:
/// "name equality modulo duplicate-suffix stripping").
fn strip_duplicate_suffix(name: &str) -> &str {
    if let Some(stripped) = name.strip_suffix(']') {
        if let Some(idx) = stripped.rfind('[') {
            if stripped[idx + 1..].chars().all(|c| c.is_ascii_digit()) {
                return &name[..idx];
            }
        }
    }
    if let Some(idx) = name.rfind('$') {
        if name[idx + 1..].chars().all(|c| c.is_ascii_digit()) && !name[idx + 1..].is_empty() {
            return &name[..idx];
        }
    }
    name
}

/// BFS over the subcell DAG from `top`, returning, for every subcircuit class reachable from it
/// (`top` itself excluded), the greatest depth at which it is instantiated, "deepest first" per
/// SPEC_FULL.md §4.7 point 1. Explicit queue + visited set rather than recursion (Design Notes
/// "Recursive descent").
fn levels_by_depth(lib: &CellLibrary, top: &str, file: FileTag) -> HashMap<u32, Vec<String>> {
    let mut depth_of: HashMap<String, u32> = HashMap::new();
    let mut queue: VecDeque<(String, u32)> = VecDeque::new();
    queue.push_back((top.to_string(), 0));

    while let Some((name, depth)) = queue.pop_front() {
        let entry = depth_of.entry(name.clone()).or_insert(depth);
        if *entry < depth {
            *entry = depth;
        }
        let Some(cell) = lib.get(&name, file) else { continue };
        for device in &cell.devices {
            if let DeviceKind::Subcircuit(sub_name) = &device.kind {
                if sub_name == &name {
                    continue;
                }
                queue.push_back((sub_name.clone(), depth + 1));
            }
        }
    }

    depth_of.remove(top);
    let mut levels: HashMap<u32, Vec<String>> = HashMap::new();
    for (name, depth) in depth_of {
        levels.entry(depth).or_default().push(name);
    }
    levels
}

/// Match-pins post-step (SPEC_FULL.md §4.7): after a successful subcell compare, reorder `cell2`'s
/// pin interface to align with `cell1`'s, adding proxy (dummy) pins to whichever side is missing
/// a name so both have equal arity. Mutates both cell definitions in place.
pub fn match_pins(cell1: &mut CellDefinition, cell2: &mut CellDefinition) {
    let cell1_names: HashSet<String> = cell1.pins.iter().map(|p| p.name.clone()).collect();
    let cell2_names: HashSet<String> = cell2.pins.iter().map(|p| p.name.clone()).collect();

    let cell2_only: Vec<String> = cell2.pins.iter().map(|p| p.name.clone()).filter(|n| !cell1_names.contains(n)).collect();
    for name in cell2_only {
        cell1.pins.push(crate::cell::PinDef {
            name,
            direction: crate::cell::Direction::InOut,
        });
    }

    let cell1_only: Vec<String> = cell1.pins.iter().map(|p| p.name.clone()).filter(|n| !cell2_names.contains(n)).collect();
    for name in cell1_only {
        cell2.pins.push(crate::cell::PinDef {
            name,
            direction: crate::cell::Direction::InOut,
        });
    }

    let order: Vec<String> = cell1.pins.iter().map(|p| p.name.clone()).collect();
    let mut by_name: HashMap<String, crate::cell::PinDef> = cell2.pins.drain(..).map(|p| (p.name.clone(), p)).collect();
    cell2.pins = order
        .iter()
        .map(|name| by_name.remove(name).expect("cell2 was padded with a proxy pin for every name in cell1"))
        .collect();
}

/// Flattening (SPEC_FULL.md §4.7/GLOSSARY): inline one subcircuit instance into its parent,
/// replacing the instance with the subcell's own devices (renamed `instance.subdevice`) and
/// internal nets (renamed `instance.subnet`; pins wired to one of the instance's own connections
/// keep the parent-side net instead). Returns `false` if `inst_name` is not a device of `parent`.
pub fn flatten_instance(parent: &mut CellDefinition, inst_name: &str, sub: &CellDefinition) -> bool {
    let Some(inst_index) = parent.devices.iter().position(|d| d.name == inst_name) else {
        return false;
    };
    let inst = parent.devices.remove(inst_index);

    let mut pin_to_parent_net: HashMap<&str, Option<String>> = HashMap::new();
    for (i, pin_name) in inst.pin_names.iter().enumerate() {
        pin_to_parent_net.insert(pin_name.as_str(), inst.pin_nets.get(i).cloned().flatten());
    }

    let rename_net = |name: &str| -> Option<String> {
        match pin_to_parent_net.get(name) {
            Some(parent_net) => parent_net.clone(),
            None => Some(format!("{}.{}", inst_name, name)),
        }
    };

    for sub_device in &sub.devices {
        let mut flattened = sub_device.clone();
        flattened.name = format!("{}.{}", inst_name, sub_device.name);
        flattened.pin_nets = sub_device.pin_nets.iter().map(|net| net.as_ref().and_then(|n| rename_net(n))).collect();
        parent.devices.push(flattened);
    }
    true
}
