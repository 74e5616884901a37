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
//! Small `Copy` index newtypes addressing the engine's arenas.
//!
//! Mirrors the teacher's `CircuitIndex`/`NetIndex` pattern (`netlist/netlist.rs`): a thin wrapper
//! around `usize` rather than a pointer, so devices/nets/classes can be addressed without
//! borrow-checker fights while the graph is being refined.

use std::fmt;

macro_rules! index_newtype {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Copy, Clone, Debug, Hash, PartialOrd, Ord, PartialEq, Eq)]
        pub struct $name {
            index: usize,
        }

        impl $name {
            /// Wrap a raw arena index.
            #[inline]
            pub fn new(index: usize) -> Self {
                $name { index }
            }

            /// The raw arena index.
            #[inline]
            pub fn index(self) -> usize {
                self.index
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.index)
            }
        }
    };
}

index_newtype!(DeviceId, "Identifies one `Device` in the device arena.");
index_newtype!(NetId, "Identifies one `Net` in the net arena.");
index_newtype!(
    DeviceClassId,
    "Identifies one `DeviceClass` in the current device-class partition."
);
index_newtype!(
    NetClassId,
    "Identifies one `NetClass` in the current net-class partition."
);

/// Which of the two circuits being compared an object came from.
///
/// Called `graph` in the original source (`short graph`) and `file`/`fileTag` elsewhere in the
/// spec; unified here under one name since it is the same "1 or 2" tag throughout.
#[derive(Copy, Clone, Debug, Hash, PartialOrd, Ord, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CircuitTag {
    /// First circuit argument to `Compare`.
    One,
    /// Second circuit argument to `Compare`.
    Two,
}

impl CircuitTag {
    /// The other tag.
    #[inline]
    pub fn other(self) -> CircuitTag {
        match self {
            CircuitTag::One => CircuitTag::Two,
            CircuitTag::Two => CircuitTag::One,
        }
    }

    /// Numeric file tag (1 or 2), matching the spec's "owning circuit tag (1 or 2)" wording.
    #[inline]
    pub fn as_u8(self) -> u8 {
        match self {
            CircuitTag::One => 1,
            CircuitTag::Two => 2,
        }
    }
}

impl fmt::Display for CircuitTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}
