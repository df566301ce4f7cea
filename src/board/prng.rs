/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

/// Fixed seed state, so that generated keys are identical between compilations.
const SEEDS: [u64; 4] = [
    0x91C5_AB3C_EBFD_5A71,
    0x06BA_253B_9DD8_97CD,
    0x8015_B5E5_9CC2_75E9,
    0xF8F4_27FC_5411_DE53,
];

/// A `const` pseudo-random number generator using the xoshiro256** algorithm.
///
/// Adapted from <https://prng.di.unimi.it/xoshiro256starstar.c>.
/// Every step consumes `self` and returns the advanced state, so it can drive table
/// construction inside `const fn`s.
#[derive(Clone, Copy, Debug)]
pub struct XoShiRo([u64; 4]);

impl XoShiRo {
    /// A generator seeded with the crate's fixed seeds.
    #[inline(always)]
    pub const fn new() -> Self {
        Self(SEEDS)
    }

    /// Returns the next number in the sequence along with the advanced generator.
    ///
    /// # Example
    /// ```
    /// # use newt::XoShiRo;
    /// let (a, rng) = XoShiRo::new().next_const();
    /// let (b, _) = rng.next_const();
    /// assert_ne!(a, b);
    /// ```
    pub const fn next_const(self) -> (u64, Self) {
        let mut s = self.0;
        let result = s[1].wrapping_mul(5).rotate_left(7).wrapping_mul(9);
        let t = s[1] << 17;

        s[2] ^= s[0];
        s[3] ^= s[1];
        s[1] ^= s[2];
        s[0] ^= s[3];
        s[2] ^= t;
        s[3] = s[3].rotate_left(45);

        (result, Self(s))
    }
}

impl Default for XoShiRo {
    #[inline(always)]
    fn default() -> Self {
        Self::new()
    }
}
