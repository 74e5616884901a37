// Copyright (c) 2020-2021 Thomas Kramer.
// SPDX-FileCopyrightText: 2022 Thomas Kramer
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The `prelude` helps to import most commonly used types.

pub use crate::cell::{CellDefinition, CellLibrary, DeviceInstanceDef, DeviceKind, Direction, FileTag, PinDef, PrimitiveClass};
pub use crate::engine::{Engine, EngineConfig};
pub use crate::error::{NetcmpError, NetcmpResult};
pub use crate::hierarchy::{ComparePair, HierarchyDriver, QueueBuildResult};
pub use crate::ids::{CircuitTag, DeviceClassId, DeviceId, NetClassId, NetId};
pub use crate::property::{MergePolicy, PropertyDict, PropertyKey, PropertyRecord, PropertyType, PropertyValue, Slop, KEY_M, KEY_S};
pub use crate::refine::MatchVerdict;
pub use crate::report::{CompareReport, FanoutEntry, MatchedDevicePair, MatchedNetPair, MismatchedGroup, PropertyMismatch};
