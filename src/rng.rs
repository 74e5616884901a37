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
//! A small splittable 64-bit generator for class magics (SPEC_FULL.md §9).
//!
//! Refinement correctness only needs magics that don't collide across structurally distinct
//! roles; it does not need cryptographic randomness. `SplitMix64` is seeded from a hash of the
//! two input cell names so that comparing the same pair of netlists twice always produces the
//! same sequence of magics and, in turn, the same class ordering in reports.

use rand::{RngCore, SeedableRng};

/// Splittable 64-bit pseudo-random generator (Vigna's `splitmix64`).
#[derive(Debug, Clone)]
pub struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    /// Create a generator seeded directly from a `u64`.
    pub fn new(seed: u64) -> Self {
        SplitMix64 { state: seed }
    }

    /// Seed from the names of the two cells being compared, so a given pair of netlists always
    /// refines along the same sequence of class magics.
    pub fn from_cell_names(name1: &str, name2: &str) -> Self {
        use std::hash::{Hash, Hasher};
        let mut hasher = fnv::FnvHasher::default();
        name1.hash(&mut hasher);
        name2.hash(&mut hasher);
        SplitMix64::new(hasher.finish())
    }
}

impl SeedableRng for SplitMix64 {
    type Seed = [u8; 8];

    fn from_seed(seed: Self::Seed) -> Self {
        SplitMix64 {
            state: u64::from_le_bytes(seed),
        }
    }
}

impl RngCore for SplitMix64 {
    fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E3779B97F4A7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
        z ^ (z >> 31)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        rand_core_fill_bytes_via_next(self, dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// Minimal `fill_bytes` helper so we don't have to pull in `rand_core` directly; `rand`
/// re-exports the trait but not this free function.
fn rand_core_fill_bytes_via_next<R: RngCore + ?Sized>(rng: &mut R, dest: &mut [u8]) {
    let mut chunks = dest.chunks_exact_mut(8);
    for chunk in &mut chunks {
        chunk.copy_from_slice(&rng.next_u64().to_le_bytes());
    }
    let rem = chunks.into_remainder();
    if !rem.is_empty() {
        let bytes = rng.next_u64().to_le_bytes();
        rem.copy_from_slice(&bytes[..rem.len()]);
    }
}

/// Draw a fresh 64-bit class magic. Kept as a free function (mirrors the source's `Magic(a)`
/// macro) so call sites read the same way the original `Magic(EC->magic)` assignments do.
#[inline]
pub fn magic(rng: &mut SplitMix64) -> u64 {
    rng.next_u64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reproducible_from_same_seed() {
        let mut a = SplitMix64::new(42);
        let mut b = SplitMix64::new(42);
        for _ in 0..16 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn distinct_seeds_diverge() {
        let mut a = SplitMix64::new(1);
        let mut b = SplitMix64::new(2);
        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn cell_name_seeding_is_order_sensitive_and_stable() {
        let mut a = SplitMix64::from_cell_names("inv1", "inv2");
        let mut b = SplitMix64::from_cell_names("inv1", "inv2");
        assert_eq!(a.next_u64(), b.next_u64());

        let mut c = SplitMix64::from_cell_names("inv2", "inv1");
        // Not required to differ forever, but the first draw should with overwhelming
        // probability given the hash mixes argument order into the seed.
        assert_ne!(
            SplitMix64::from_cell_names("inv1", "inv2").state,
            SplitMix64::from_cell_names("inv2", "inv1").state
        );
        let _ = &mut c;
    }
}
