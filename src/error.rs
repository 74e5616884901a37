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
//! Error kinds for the comparator engine.
//!
//! `MismatchDetected` and property mismatches are *not* represented here: those are normal
//! results of a comparison, returned as values (`MatchVerdict`, mismatch counts), never as `Err`.

use thiserror::Error;

/// Everything that can stop a `Compare` call before it produces a verdict.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetcmpError {
    /// A cell name could not be found in the cell library.
    #[error("cell not found: {name} (file tag {file_tag})")]
    CellNotFound {
        /// The cell name that was looked up.
        name: String,
        /// Which of the two input files the name was expected in.
        file_tag: u8,
    },

    /// The combined device+net count would exceed `EngineConfig::max_elements`.
    ///
    /// Stands in for the original's `malloc` failure path (see SPEC_FULL.md §4.1a): Rust cannot
    /// portably recover from real allocator exhaustion, so a configurable ceiling is enforced
    /// instead.
    #[error("allocation error: {attempted} elements exceeds configured maximum of {max}")]
    AllocationError {
        /// Number of devices + nets the build would have produced.
        attempted: usize,
        /// The configured ceiling.
        max: usize,
    },

    /// Cancellation was observed at an iteration boundary.
    ///
    /// The engine's internal state is left exactly as it was at the moment of cancellation; it is
    /// safe to inspect (partial classes, partial report) or to call `reset_state()` and discard it.
    #[error("comparison interrupted")]
    Interrupted,

    /// A second `compare`-family call was attempted while one was already in progress.
    #[error("engine is already comparing; a Compare must finish (or be reset) before starting another")]
    ReentrancyViolation,

    /// An internal invariant was violated (e.g. a class lost its member-count bookkeeping).
    ///
    /// Fatal for the current compare only; `reset_state()` returns the engine to a usable state.
    #[error("fatal internal error: {0}")]
    FatalInternalError(String),
}

/// Result alias used throughout the engine.
pub type NetcmpResult<T> = Result<T, NetcmpError>;
