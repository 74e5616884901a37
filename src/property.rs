/*
 * Copyright (c) 2020-2021 Thomas Kramer.
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
//! Property (parameter) records attached to device instances (SPEC_FULL.md §3, §4.5).
//!
//! Generalizes the teacher's `property_storage::PropertyValue` (string/bytes/int/uint/float) to
//! the four types the comparator's property matcher actually needs to distinguish: integer,
//! double, string, and unresolved expression.

use std::collections::HashMap;

/// One property value. Unlike the teacher's `PropertyValue`, this distinguishes an "unresolved
/// expression" from a plain string: expressions never compare equal (SPEC_FULL.md §4.5.3).
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// A whole-number parameter, e.g. `M = 2`.
    Integer(i64),
    /// A real-valued parameter, e.g. `R = 1000.0`.
    Double(f64),
    /// A string-valued parameter, e.g. a model name.
    String(String),
    /// A parameter whose value is an unresolved expression (e.g. `W = 2*L`); always a mismatch
    /// when compared, per SPEC_FULL.md §4.5.3.
    Expression(String),
}

impl PropertyValue {
    /// Type discriminant, used to decide whether two values need promotion before comparison.
    pub fn kind(&self) -> PropertyType {
        match self {
            PropertyValue::Integer(_) => PropertyType::Integer,
            PropertyValue::Double(_) => PropertyType::Double,
            PropertyValue::String(_) => PropertyType::String,
            PropertyValue::Expression(_) => PropertyType::Expression,
        }
    }

    /// View this value as `f64`, promoting integers. Returns `None` for string/expression.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Integer(i) => Some(*i as f64),
            PropertyValue::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// View this value as `i64` without promotion (doubles are not truncated implicitly).
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

/// Discriminant for [`PropertyValue`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PropertyType {
    /// See [`PropertyValue::Integer`].
    Integer,
    /// See [`PropertyValue::Double`].
    Double,
    /// See [`PropertyValue::String`].
    String,
    /// See [`PropertyValue::Expression`].
    Expression,
}

/// How a property combines when two devices are merged (SPEC_FULL.md §4.4).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MergePolicy {
    /// Values are summed across merged devices (the canonical case: `M`, `S`).
    Additive,
    /// Values must match (within slop) for the merge to be allowed; the value is preserved.
    Critical,
    /// The property plays no role in merge eligibility and is not combined.
    Nothing,
}

/// Per-property numeric/string tolerance ("slop", SPEC_FULL.md §4.5).
#[derive(Debug, Copy, Clone)]
pub enum Slop {
    /// Relative tolerance used for [`PropertyValue::Double`]: pass iff `2|a-b|/(a+b) <= slop`.
    Relative(f64),
    /// Absolute tolerance used for [`PropertyValue::Integer`]: pass iff `|a-b| <= slop`.
    Absolute(i64),
    /// Exact or case-insensitive match, per [`PropertyKey::case_insensitive`].
    StringExact,
    /// Match iff the first `n` characters agree.
    StringPrefix(usize),
}

/// One recognized property key's metadata, as declared by a cell's property dictionary.
#[derive(Debug, Clone)]
pub struct PropertyKey {
    /// The type this property is declared as.
    pub value_type: PropertyType,
    /// Default value substituted when a device omits the property, if any.
    pub default: Option<PropertyValue>,
    /// Numeric/string tolerance for equality.
    pub slop: Slop,
    /// How this property behaves under parallel merge (SPEC_FULL.md §4.4).
    pub parallel: MergePolicy,
    /// How this property behaves under series merge (SPEC_FULL.md §4.4).
    pub series: MergePolicy,
    /// Case-insensitive string comparison (per-cell flag mentioned in SPEC_FULL.md §4.5.3).
    pub case_insensitive: bool,
}

impl PropertyKey {
    /// A plain numeric property with the given slop and no special merge behavior.
    pub fn numeric(value_type: PropertyType, slop: Slop) -> Self {
        PropertyKey {
            value_type,
            default: None,
            slop,
            parallel: MergePolicy::Nothing,
            series: MergePolicy::Nothing,
            case_insensitive: false,
        }
    }

    /// The implicit `M` (multiplicity) key: integer, additive under parallel merge, default 1.
    pub fn implicit_m() -> Self {
        PropertyKey {
            value_type: PropertyType::Integer,
            default: Some(PropertyValue::Integer(1)),
            slop: Slop::Absolute(0),
            parallel: MergePolicy::Additive,
            series: MergePolicy::Nothing,
            case_insensitive: false,
        }
    }

    /// The implicit `S` (series count) key: integer, additive under series merge, default 1.
    pub fn implicit_s() -> Self {
        PropertyKey {
            value_type: PropertyType::Integer,
            default: Some(PropertyValue::Integer(1)),
            slop: Slop::Absolute(0),
            parallel: MergePolicy::Nothing,
            series: MergePolicy::Additive,
            case_insensitive: false,
        }
    }
}

/// A cell's dictionary of recognized property keys (SPEC_FULL.md §3).
#[derive(Debug, Clone, Default)]
pub struct PropertyDict {
    keys: HashMap<String, PropertyKey>,
}

/// Canonical key name for multiplicity.
pub const KEY_M: &str = "M";
/// Canonical key name for series count.
pub const KEY_S: &str = "S";

impl PropertyDict {
    /// An empty dictionary.
    pub fn new() -> Self {
        Default::default()
    }

    /// Declare (or replace) a property key.
    pub fn insert(&mut self, key: impl Into<String>, def: PropertyKey) {
        self.keys.insert(key.into(), def);
    }

    /// Look up a declared property key, falling back to the implicit `M`/`S` definitions if the
    /// key is one of those and not otherwise declared.
    pub fn get(&self, key: &str) -> Option<PropertyKey> {
        if let Some(k) = self.keys.get(key) {
            return Some(k.clone());
        }
        if key == KEY_M {
            Some(PropertyKey::implicit_m())
        } else if key == KEY_S {
            Some(PropertyKey::implicit_s())
        } else {
            None
        }
    }

    /// Iterate declared (non-implicit) key names.
    pub fn declared_keys(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }
}

/// Compare two values of a declared property for equality within `key`'s slop (SPEC_FULL.md
/// §4.5.3). Shared by pre-reduction (§4.4, critical-property merge eligibility) and the property
/// matcher (§4.5) so the two components never disagree on what "equal" means for a given key.
///
/// An [`PropertyValue::Expression`] on either side never matches (§4.5.3, point 3: "expression:
/// always reported as unresolved"). Integer/double promotion happens here: an integer compared
/// against a double is promoted to `f64` before the relative-tolerance check.
pub fn values_match(key: &PropertyKey, a: &PropertyValue, b: &PropertyValue) -> bool {
    match (a, b) {
        (PropertyValue::Expression(_), _) | (_, PropertyValue::Expression(_)) => false,
        (PropertyValue::String(sa), PropertyValue::String(sb)) => match key.slop {
            Slop::StringPrefix(n) => prefix_eq(sa, sb, n, key.case_insensitive),
            _ => {
                if key.case_insensitive {
                    sa.eq_ignore_ascii_case(sb)
                } else {
                    sa == sb
                }
            }
        },
        (PropertyValue::String(_), _) | (_, PropertyValue::String(_)) => false,
        (PropertyValue::Integer(ia), PropertyValue::Integer(ib)) => match key.slop {
            Slop::Absolute(tol) => (ia - ib).abs() <= tol,
            _ => ia == ib,
        },
        _ => {
            // At least one side is a double: promote both to f64 (SPEC_FULL.md §4.5.3, point 2).
            let fa = a.as_f64().expect("non-string, non-expression value has an f64 view");
            let fb = b.as_f64().expect("non-string, non-expression value has an f64 view");
            match key.slop {
                Slop::Relative(tol) => {
                    let denom = fa + fb;
                    if denom == 0.0 {
                        fa == fb
                    } else {
                        2.0 * (fa - fb).abs() / denom.abs() <= tol
                    }
                }
                Slop::Absolute(tol) => (fa - fb).abs() <= tol as f64,
                _ => fa == fb,
            }
        }
    }
}

fn prefix_eq(a: &str, b: &str, n: usize, case_insensitive: bool) -> bool {
    let pa: String = a.chars().take(n).collect();
    let pb: String = b.chars().take(n).collect();
    if case_insensitive {
        pa.eq_ignore_ascii_case(&pb)
    } else {
        pa == pb
    }
}

/// An instance-local, ordered list of `(key, value)` pairs (SPEC_FULL.md §3).
///
/// Kept as a `Vec` rather than a `HashMap` because the property matcher needs ordered,
/// positional access to align merge-trail records after series/parallel reduction
/// (SPEC_FULL.md §4.4/§4.5, "sorts the two property lists ... compares pairwise").
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyRecord {
    entries: Vec<(String, PropertyValue)>,
}

impl PropertyRecord {
    /// An empty record.
    pub fn new() -> Self {
        Default::default()
    }

    /// Set (or replace) a property value.
    pub fn set(&mut self, key: impl Into<String>, value: PropertyValue) {
        let key = key.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Builder-style `set`.
    pub fn with(mut self, key: impl Into<String>, value: PropertyValue) -> Self {
        self.set(key, value);
        self
    }

    /// Look up a property's value by key.
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// `M`, defaulting to 1 if absent or not an integer.
    pub fn multiplicity(&self) -> i64 {
        self.get(KEY_M).and_then(PropertyValue::as_i64).unwrap_or(1)
    }

    /// `S`, defaulting to 1 if absent or not an integer.
    pub fn series_count(&self) -> i64 {
        self.get(KEY_S).and_then(PropertyValue::as_i64).unwrap_or(1)
    }

    /// All declared keys in this record, in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// All entries, in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of declared entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether this record has no declared entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
