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
//! Minimal in-memory cell/hierarchy representation (SPEC_FULL.md §3a).
//!
//! Real netlist parsing and hierarchy management are out of scope (SPEC_FULL.md §1): this module
//! is only the thin, concrete shape the engine needs in order to compile, run, and be tested
//! without a parser. It plays the role the spec assigns to the external "Cell/hierarchy manager"
//! collaborator, generalized from the teacher's `netlist::circuit` + `property_storage` modules.

use crate::property::{PropertyDict, PropertyRecord};
use std::collections::{HashMap, HashSet};

/// Recognized device classes, carried over from the original implementation's `CLASS_*`
/// enumeration (`netgen.h`). Used only to pick the default pin-permutation rule (SPEC_FULL.md
/// §4.3) and to label reports; no placement or SPICE-model semantics are attached here.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum PrimitiveClass {
    /// 3-terminal MOSFET of unknown or generic polarity (drain, gate, source).
    Mosfet3,
    /// 4-terminal MOSFET (drain, gate, source, bulk).
    Mosfet4,
    /// Bipolar junction transistor (collector/base/emitter, or equivalent 3 terminals).
    Bjt,
    /// Two-terminal resistor.
    Resistor,
    /// Two-terminal capacitor.
    Capacitor,
    /// Two-terminal diode.
    Diode,
    /// Two-terminal inductor.
    Inductor,
    /// Black-box subcircuit call with an opaque pin list (sim "x" module).
    Module,
    /// Anything not covered above, identified by its model/class name.
    Other(String),
}

/// What a device instance refers to: either a recognized primitive, or a named subcircuit
/// (itself a `CellDefinition` elsewhere in the library).
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum DeviceKind {
    /// A primitive device (transistor, resistor, ...).
    Primitive(PrimitiveClass),
    /// A call to another cell, by name.
    Subcircuit(String),
}

impl DeviceKind {
    /// The name used to key the pin-permutation table and hierarchical compare-queue lookups.
    pub fn class_name(&self) -> String {
        match self {
            DeviceKind::Primitive(PrimitiveClass::Mosfet3) => "mosfet3".to_string(),
            DeviceKind::Primitive(PrimitiveClass::Mosfet4) => "mosfet4".to_string(),
            DeviceKind::Primitive(PrimitiveClass::Bjt) => "bjt".to_string(),
            DeviceKind::Primitive(PrimitiveClass::Resistor) => "resistor".to_string(),
            DeviceKind::Primitive(PrimitiveClass::Capacitor) => "capacitor".to_string(),
            DeviceKind::Primitive(PrimitiveClass::Diode) => "diode".to_string(),
            DeviceKind::Primitive(PrimitiveClass::Inductor) => "inductor".to_string(),
            DeviceKind::Primitive(PrimitiveClass::Module) => "module".to_string(),
            DeviceKind::Primitive(PrimitiveClass::Other(name)) => name.clone(),
            DeviceKind::Subcircuit(name) => name.clone(),
        }
    }

    /// `true` if this instance is a call to another cell (a candidate for hierarchical descent,
    /// SPEC_FULL.md §4.7), as opposed to a primitive device.
    pub fn is_subcircuit(&self) -> bool {
        matches!(self, DeviceKind::Subcircuit(_))
    }
}

/// Signal direction of a circuit pin.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Direction {
    /// Driven from outside the cell.
    Input,
    /// Driven from inside the cell.
    Output,
    /// Driven from both directions, or unknown.
    InOut,
}

/// One named pin in a cell's interface.
#[derive(Debug, Clone)]
pub struct PinDef {
    /// Pin name, unique within the cell.
    pub name: String,
    /// Signal direction.
    pub direction: Direction,
}

/// One device instance inside a cell (SPEC_FULL.md §3a).
#[derive(Debug, Clone)]
pub struct DeviceInstanceDef {
    /// Instance name, unique within the cell.
    pub name: String,
    /// What kind of device this is.
    pub kind: DeviceKind,
    /// Net name connected to each pin, in declaration order; `None` for an unconnected pin.
    pub pin_nets: Vec<Option<String>>,
    /// Declared pin names, in the same order as `pin_nets`. Used for permutation lookup and
    /// fanout reporting; primitives get conventional names (drain/gate/source[/bulk]) when not
    /// explicitly supplied.
    pub pin_names: Vec<String>,
    /// Properties attached to this instance.
    pub properties: PropertyRecord,
}

impl DeviceInstanceDef {
    /// Construct an instance with explicit pin names.
    pub fn new(
        name: impl Into<String>,
        kind: DeviceKind,
        pins: Vec<(impl Into<String>, Option<String>)>,
        properties: PropertyRecord,
    ) -> Self {
        let mut pin_names = Vec::with_capacity(pins.len());
        let mut pin_nets = Vec::with_capacity(pins.len());
        for (pname, net) in pins {
            pin_names.push(pname.into());
            pin_nets.push(net);
        }
        DeviceInstanceDef {
            name: name.into(),
            kind,
            pin_nets,
            pin_names,
            properties,
        }
    }
}

/// A named container of a pin signature, a device netlist, and a property dictionary
/// (SPEC_FULL.md §3/§3a). The core's only view of "a circuit".
#[derive(Debug, Clone, Default)]
pub struct CellDefinition {
    /// Cell name.
    pub name: String,
    /// Ordered pin interface.
    pub pins: Vec<PinDef>,
    /// Net names that are global (power, ground, ...); excluded from series-merge eligibility
    /// (SPEC_FULL.md §4.4: "that net is non-global").
    pub globals: HashSet<String>,
    /// Device instances, in declaration order.
    pub devices: Vec<DeviceInstanceDef>,
    /// Recognized property keys for devices in this cell.
    pub property_dict: PropertyDict,
    /// Case-insensitive string property comparison (SPEC_FULL.md §4.5, "per-cell flag").
    pub case_insensitive_strings: bool,
    /// Explicit pin-permutation pairs declared via `PermuteSetup` (SPEC_FULL.md §4.3), keyed by
    /// the device class name (`DeviceKind::class_name`).
    pub permutes: HashMap<String, Vec<(String, String)>>,
}

impl CellDefinition {
    /// An empty cell with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        CellDefinition {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builder-style pin addition.
    pub fn with_pin(mut self, name: impl Into<String>, direction: Direction) -> Self {
        self.pins.push(PinDef {
            name: name.into(),
            direction,
        });
        self
    }

    /// Builder-style device addition.
    pub fn with_device(mut self, device: DeviceInstanceDef) -> Self {
        self.devices.push(device);
        self
    }

    /// Builder-style global net declaration.
    pub fn with_global(mut self, net: impl Into<String>) -> Self {
        self.globals.insert(net.into());
        self
    }

    /// Declare a permutable pin pair on a device class (`PermuteSetup`, SPEC_FULL.md §4.3/§6).
    pub fn permute_setup(&mut self, class_name: impl Into<String>, pin1: impl Into<String>, pin2: impl Into<String>) {
        self.permutes
            .entry(class_name.into())
            .or_default()
            .push((pin1.into(), pin2.into()));
    }

    /// Remove a previously declared permutable pin pair (`PermuteForget`).
    pub fn permute_forget(&mut self, class_name: &str, pin1: &str, pin2: &str) {
        if let Some(pairs) = self.permutes.get_mut(class_name) {
            pairs.retain(|(a, b)| !((a == pin1 && b == pin2) || (a == pin2 && b == pin1)));
        }
    }

    /// Find a device instance by name.
    pub fn device_by_name(&self, name: &str) -> Option<&DeviceInstanceDef> {
        self.devices.iter().find(|d| d.name == name)
    }
}

/// Which of the two input files a cell name is being looked up in (SPEC_FULL.md §3,
/// `(className, fileTag)`).
pub type FileTag = u8;

/// A name-indexed store of cells (SPEC_FULL.md §3a): the minimal stand-in for the "Cell/hierarchy
/// manager" external collaborator.
#[derive(Debug, Clone, Default)]
pub struct CellLibrary {
    cells: HashMap<(String, FileTag), CellDefinition>,
}

impl CellLibrary {
    /// An empty library.
    pub fn new() -> Self {
        Default::default()
    }

    /// Register a cell under a given file tag.
    pub fn insert(&mut self, file_tag: FileTag, cell: CellDefinition) {
        self.cells.insert((cell.name.clone(), file_tag), cell);
    }

    /// Register a cell under an explicit `(name, file_tag)` key, for merging two libraries built
    /// independently (e.g. in tests that assemble circuit 1 and circuit 2 separately).
    pub fn insert_raw(&mut self, key: (String, FileTag), cell: CellDefinition) {
        self.cells.insert(key, cell);
    }

    /// Look up a cell by name and file tag.
    pub fn get(&self, name: &str, file_tag: FileTag) -> Option<&CellDefinition> {
        self.cells.get(&(name.to_string(), file_tag))
    }

    /// Mutable lookup, e.g. for `PermuteSetup`/`IgnoreClass`.
    pub fn get_mut(&mut self, name: &str, file_tag: FileTag) -> Option<&mut CellDefinition> {
        self.cells.get_mut(&(name.to_string(), file_tag))
    }

    /// Remove all devices of a given class from every cell under `file_tag`
    /// (`IgnoreClass(name, kind)`, SPEC_FULL.md §6). `delete_if_shorted` additionally requires
    /// that the device's pins all land on already-merged (identical) nets before dropping it;
    /// the plain `delete` variant always drops it.
    pub fn ignore_class(&mut self, class_name: &str, file_tag: FileTag, delete_if_shorted: bool) {
        for ((_, tag), cell) in self.cells.iter_mut() {
            if *tag != file_tag {
                continue;
            }
            cell.devices.retain(|d| {
                if d.kind.class_name() != class_name {
                    return true;
                }
                if delete_if_shorted {
                    // Keep devices whose pins are not all tied to the same net: dropping them
                    // would silently change connectivity rather than removing a no-op short.
                    let nets: HashSet<&Option<String>> = d.pin_nets.iter().collect();
                    nets.len() > 1
                } else {
                    false
                }
            });
        }
    }
}

impl IntoIterator for CellLibrary {
    type Item = ((String, FileTag), CellDefinition);
    type IntoIter = std::collections::hash_map::IntoIter<(String, FileTag), CellDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.cells.into_iter()
    }
}
