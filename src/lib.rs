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
//! Structural netlist comparator: an iterative partition-refinement engine that decides whether
//! two circuit netlists are isomorphic up to renaming of devices and nets, with pin permutation,
//! hierarchical matching, series/parallel device reduction, property tolerance, and symmetry
//! (automorphism) breaking.
//!
//! [`Engine`](engine::Engine) is the entry point; see its methods for the external interface
//! (`create_two_lists`, `iterate`, `verify_matching`, `resolve_automorphisms`, ...) and
//! [`Engine::compare`](engine::Engine::compare) for the common end-to-end path.

#![deny(missing_docs)]

pub mod builder;
pub mod cell;
pub mod engine;
pub mod error;
pub mod graph;
pub mod hierarchy;
pub mod ids;
pub mod permute;
pub mod prelude;
pub mod properties_match;
pub mod property;
pub mod reduce;
pub mod refine;
pub mod report;
pub mod rng;
pub mod symmetry;
