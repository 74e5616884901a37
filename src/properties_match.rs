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
//! Property matcher (SPEC_FULL.md §4.5), grounded on `netcmp.c`'s `PropertyCheckMismatch`/
//! `PropertyMatch`.
//!
//! Compares the property record(s) of two devices the engine has already paired into one class
//! of size two. When pre-reduction (`reduce.rs`) folded several devices into one of these two,
//! `Device::merge_trail` carries the expanded history; this module sorts each side's trail by its
//! declared-critical values (Design Notes "Series/parallel merging": "partition sort... group by
//! critical-within-slop, then order groups by additive") and compares pairwise so that
//! structurally equivalent subsequences line up even when the trails were built in a different
//! order on each side.

use std::collections::BTreeSet;

use crate::graph::Device;
use crate::property::{values_match, MergePolicy, PropertyDict, PropertyKey, PropertyRecord, PropertyType, PropertyValue, Slop, KEY_M, KEY_S};

/// `PropertyMatch(dev1, dev2) -> int` (SPEC_FULL.md §4.5/§6).
///
/// Returns `-1` if the two devices are not eligible for comparison (different device classes,
/// they should never have been paired by refinement in the first place), otherwise the number of
/// mismatched properties across the aligned record sequence (`0` = perfect property match).
pub fn property_match(dict1: &PropertyDict, dict2: &PropertyDict, dev1: &Device, dev2: &Device, case_insensitive: bool) -> i32 {
    if dev1.class_name != dev2.class_name {
        return -1;
    }

    let trail1 = aligned_trail(dict1, dev1);
    let trail2 = aligned_trail(dict2, dev2);

    let mut mismatches = 0i32;
    let n = trail1.len().max(trail2.len());
    for i in 0..n {
        match (trail1.get(i), trail2.get(i)) {
            (Some(a), Some(b)) => mismatches += compare_records(dict1, dict2, a, b, case_insensitive),
            // Differing record counts after reduction: SPEC_FULL.md §4.5 point 4, each
            // unmatched record on the longer side is a mismatch by itself.
            _ => mismatches += 1,
        }
    }
    mismatches
}

/// The per-device record sequence to compare: its merge trail if pre-reduction expanded it,
/// otherwise its single summary record. Sorted by critical value so that two trails built up in
/// a different merge order still line up index-for-index.
fn aligned_trail(dict: &PropertyDict, dev: &Device) -> Vec<PropertyRecord> {
    let mut trail = if dev.merge_trail.is_empty() {
        vec![dev.properties.clone().unwrap_or_default()]
    } else {
        dev.merge_trail.clone()
    };
    trail.sort_by(|a, b| sort_key(dict, a).partial_cmp(&sort_key(dict, b)).unwrap_or(std::cmp::Ordering::Equal));
    trail
}

/// Sort key approximating "primary critical value, then additive value" (Design Notes): the
/// critical-declared numeric properties in key order, then the additive ones (`M`/`S` included).
fn sort_key(dict: &PropertyDict, record: &PropertyRecord) -> Vec<f64> {
    let mut critical = Vec::new();
    let mut additive = Vec::new();
    let mut keys: BTreeSet<String> = dict.declared_keys().map(String::from).collect();
    keys.insert(KEY_M.to_string());
    keys.insert(KEY_S.to_string());
    for key in keys {
        let def = match dict.get(&key) {
            Some(def) => def,
            None => continue,
        };
        let value = record.get(&key).and_then(PropertyValue::as_f64).unwrap_or(0.0);
        match (def.parallel, def.series) {
            (MergePolicy::Critical, _) | (_, MergePolicy::Critical) => critical.push(value),
            (MergePolicy::Additive, _) | (_, MergePolicy::Additive) => additive.push(value),
            _ => {}
        }
    }
    critical.extend(additive);
    critical
}

/// Compare two aligned property records (SPEC_FULL.md §4.5 points 1-4). Returns the number of
/// mismatched keys.
fn compare_records(dict1: &PropertyDict, dict2: &PropertyDict, a: &PropertyRecord, b: &PropertyRecord, case_insensitive: bool) -> i32 {
    let mut keys: BTreeSet<String> = dict1.declared_keys().map(String::from).collect();
    keys.extend(dict2.declared_keys().map(String::from));
    keys.insert(KEY_M.to_string());
    keys.insert(KEY_S.to_string());

    let mut mismatches = 0i32;
    for key in keys {
        let mut def = dict1
            .get(&key)
            .or_else(|| dict2.get(&key))
            .unwrap_or_else(|| PropertyKey::numeric(PropertyType::Integer, Slop::Absolute(0)));
        def.case_insensitive = def.case_insensitive || case_insensitive;

        // Point 1: promote a missing M/S to the implicit default 1 (PropertyDict::get already
        // returns `default: Some(Integer(1))` for the implicit keys; this also covers any
        // explicitly-declared key that carries a default).
        let va = a.get(&key).cloned().or_else(|| def.default.clone());
        let vb = b.get(&key).cloned().or_else(|| def.default.clone());

        match (va, vb) {
            (None, None) => {}
            (Some(va), Some(vb)) => {
                let (va, vb) = promote(va, vb);
                if !values_match(&def, &va, &vb) {
                    mismatches += 1;
                }
            }
            // Point 4: a key declared on one side only, with no usable default, is a mismatch.
            _ => mismatches += 1,
        }
    }
    mismatches
}

/// Point 2: "if one side is integer and the other double, coerce to double." Strings and
/// expressions are returned unchanged, they never auto-promote.
fn promote(a: PropertyValue, b: PropertyValue) -> (PropertyValue, PropertyValue) {
    use PropertyValue::*;
    match (&a, &b) {
        (Integer(i), Double(_)) => (Double(*i as f64), b),
        (Double(_), Integer(j)) => (a, Double(*j as f64)),
        _ => (a, b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::PinEndpoint;
    use crate::ids::{CircuitTag, DeviceId};
    use crate::property::PropertyKey;

    fn resistor_dict() -> PropertyDict {
        let mut dict = PropertyDict::new();
        dict.insert("R", {
            let mut k = PropertyKey::numeric(PropertyType::Double, Slop::Relative(0.05));
            k.parallel = MergePolicy::Critical;
            k.series = MergePolicy::Critical;
            k
        });
        dict
    }

    fn device_with(props: PropertyRecord) -> Device {
        Device::new(DeviceId::new(0), CircuitTag::One, "R1", "resistor", Vec::<PinEndpoint>::new(), Some(props))
    }

    #[test]
    fn identical_properties_match() {
        let dict = resistor_dict();
        let a = device_with(PropertyRecord::new().with("R", PropertyValue::Double(1000.0)));
        let mut b = device_with(PropertyRecord::new().with("R", PropertyValue::Double(1000.0)));
        b.circuit = CircuitTag::Two;
        assert_eq!(property_match(&dict, &dict, &a, &b, false), 0);
    }

    #[test]
    fn out_of_slop_is_a_mismatch() {
        let dict = resistor_dict();
        let a = device_with(PropertyRecord::new().with("R", PropertyValue::Double(1000.0)));
        let mut b = device_with(PropertyRecord::new().with("R", PropertyValue::Double(2000.0)));
        b.circuit = CircuitTag::Two;
        assert_eq!(property_match(&dict, &dict, &a, &b, false), 1);
    }

    #[test]
    fn missing_m_defaults_to_one() {
        let dict = PropertyDict::new();
        let a = device_with(PropertyRecord::new());
        let mut b = device_with(PropertyRecord::new().with(KEY_M, PropertyValue::Integer(1)));
        b.circuit = CircuitTag::Two;
        assert_eq!(property_match(&dict, &dict, &a, &b, false), 0);
    }

    #[test]
    fn expression_property_never_matches() {
        let mut dict = PropertyDict::new();
        dict.insert("W", PropertyKey::numeric(PropertyType::Expression, Slop::StringExact));
        let a = device_with(PropertyRecord::new().with("W", PropertyValue::Expression("2*L".to_string())));
        let mut b = device_with(PropertyRecord::new().with("W", PropertyValue::Expression("2*L".to_string())));
        b.circuit = CircuitTag::Two;
        assert_eq!(property_match(&dict, &dict, &a, &b, false), 1);
    }

    #[test]
    fn mismatched_class_name_is_minus_one() {
        let dict = PropertyDict::new();
        let a = device_with(PropertyRecord::new());
        let mut b = device_with(PropertyRecord::new());
        b.circuit = CircuitTag::Two;
        b.class_name = "capacitor".to_string();
        assert_eq!(property_match(&dict, &dict, &a, &b, false), -1);
    }
}
