/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use crate::{Move, Score, ZobristKey};

/// Number of bytes in a megabyte
const BYTES_IN_MB: usize = 1024 * 1024;

/// Number of entries in a [`Bucket`].
const BUCKET_LEN: usize = 3;

/// Ages wrap around after this many searches.
const MAX_AGE: u8 = 32;

/// How a stored score relates to the true score of its position.
///
/// See [CPW](https://www.chessprogramming.org/Node_Types) for more.
#[repr(u8)]
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash, Default)]
pub enum Bound {
    /// Nothing is known about the score; the entry only caches a static evaluation.
    #[default]
    None = 0,

    /// The score is at most this value (all-node, failed low).
    Upper = 1,

    /// The score is at least this value (cut-node, failed high).
    Lower = 2,

    /// The score is exact (PV-node).
    Exact = 3,
}

impl Bound {
    /// Classifies the result `best` of a search that started with the window `(alpha, beta)`.
    ///
    /// ```text
    /// if best >= beta:
    ///     LOWERBOUND
    /// else if best > alpha:
    ///     EXACT
    /// else:
    ///     UPPERBOUND
    /// ```
    #[inline(always)]
    pub fn new(best: Score, alpha: Score, beta: Score) -> Self {
        if best >= beta {
            Self::Lower
        } else if best > alpha {
            Self::Exact
        } else {
            Self::Upper
        }
    }

    #[inline(always)]
    const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Self::None,
            1 => Self::Upper,
            2 => Self::Lower,
            _ => Self::Exact,
        }
    }

    /// Returns `true` if a score with this bound proves a cutoff in the window `(alpha, beta)`.
    #[inline(always)]
    pub fn cuts(self, score: Score, alpha: Score, beta: Score) -> bool {
        match self {
            Self::Exact => true,
            Self::Lower => score >= beta,
            Self::Upper => score <= alpha,
            Self::None => false,
        }
    }
}

/// A single record of the transposition table, as returned by [`TTable::get`].
///
/// The layout is exactly 10 bytes wide.
#[repr(C, packed)]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct TTEntry {
    /// Low bits of the Zobrist key of the position.
    key: u16,
    mv: u16,
    score: i16,
    eval: i16,
    depth: u8,

    /// `age:5 | pv:1 | bound:2`
    flags: u8,
}

impl TTEntry {
    #[inline(always)]
    const fn unpack(data: u64, meta: u16) -> Self {
        Self {
            key: data as u16,
            mv: (data >> 16) as u16,
            score: (data >> 32) as u16 as i16,
            eval: (data >> 48) as u16 as i16,
            depth: meta as u8,
            flags: (meta >> 8) as u8,
        }
    }

    #[inline(always)]
    const fn data(&self) -> u64 {
        self.key as u64 | (self.mv as u64) << 16 | (self.score as u16 as u64) << 32 | (self.eval as u16 as u64) << 48
    }

    #[inline(always)]
    const fn meta(&self) -> u16 {
        self.depth as u16 | (self.flags as u16) << 8
    }

    /// Returns `true` if this slot was never written.
    ///
    /// Every write stores either a bound or [`Score::NONE`], so only an untouched slot is all zeros.
    #[inline(always)]
    const fn is_empty(&self) -> bool {
        self.data() == 0 && self.meta() == 0
    }

    /// Best move found in this position, which may be [`Move::NULL`].
    #[inline(always)]
    pub const fn mv(&self) -> Move {
        Move::from_bits(self.mv)
    }

    /// Search score, re-anchored to be relative to the root of a search at `ply`.
    #[inline(always)]
    pub fn score(&self, ply: usize) -> Score {
        Score(self.score as i32).absolute(ply)
    }

    /// Raw static evaluation of the position.
    #[inline(always)]
    pub const fn eval(&self) -> Score {
        Score(self.eval as i32)
    }

    #[inline(always)]
    pub const fn depth(&self) -> i32 {
        self.depth as i32
    }

    #[inline(always)]
    pub const fn bound(&self) -> Bound {
        Bound::from_bits(self.flags)
    }

    /// Whether this position was ever part of a principal variation.
    #[inline(always)]
    pub const fn is_pv(&self) -> bool {
        self.flags & 0b100 != 0
    }

    #[inline(always)]
    pub const fn age(&self) -> u8 {
        self.flags >> 3
    }
}

/// Three entries sharing one cache-aligned 32 byte block.
///
/// Entry `i` keeps its key, move, score and eval in `data[i]`, and its depth and flags in bits `16*i..16*i+16` of `meta`.
#[repr(C, align(32))]
#[derive(Debug, Default)]
struct Bucket {
    data: [AtomicU64; BUCKET_LEN],
    meta: AtomicU64,
}

impl Bucket {
    #[inline(always)]
    fn load(&self, index: usize) -> TTEntry {
        let data = self.data[index].load(Ordering::Relaxed);
        let meta = (self.meta.load(Ordering::Relaxed) >> (16 * index)) as u16;
        TTEntry::unpack(data, meta)
    }

    /// Writes entry `index`, leaving the lanes of its siblings untouched even if they are written concurrently.
    #[inline(always)]
    fn store(&self, index: usize, entry: TTEntry) {
        let shift = 16 * index;
        let mask = 0xFFFF << shift;
        let lane = (entry.meta() as u64) << shift;

        self.data[index].store(entry.data(), Ordering::Relaxed);
        _ = self
            .meta
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |meta| Some(meta & !mask | lane));
    }

    fn clear(&self) {
        for data in &self.data {
            data.store(0, Ordering::Relaxed);
        }
        self.meta.store(0, Ordering::Relaxed);
    }
}

/// Location of an entry, found by [`TTable::get`] and written by [`TTable::set`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TTSlot {
    bucket: usize,
    index: usize,
}

/// Transposition Table.
///
/// Used during a search to keep track of previous search results on positions,
/// avoiding unnecessary re-computations. It is shared by every search thread without locking.
#[derive(Debug)]
pub struct TTable {
    buckets: Box<[Bucket]>,

    /// Age of the current search, stamped on every entry written during it.
    age: AtomicU8,
}

impl TTable {
    /// Default size of the Transposition Table, in megabytes.
    pub const DEFAULT_SIZE: usize = 16;

    /// Minimum size of the Transposition Table, in megabytes.
    pub const MIN_SIZE: usize = 1;

    /// Maximum size of the Transposition Table, in megabytes.
    pub const MAX_SIZE: usize = 65_536;

    /// Create a new [`TTable`] that is `size` megabytes.
    #[inline(always)]
    pub fn new(size: usize) -> Self {
        Self::from_capacity(size * BYTES_IN_MB / size_of::<Bucket>())
    }

    /// Create a new [`TTable`] with `buckets` buckets.
    pub fn from_capacity(buckets: usize) -> Self {
        Self {
            buckets: (0..buckets.max(1)).map(|_| Bucket::default()).collect(),
            age: AtomicU8::new(0),
        }
    }

    /// Re-allocates this table to be `size` megabytes, discarding all entries.
    #[inline(always)]
    pub fn resize(&mut self, size: usize) {
        *self = Self::new(size);
    }

    /// Clears the entries of this [`TTable`].
    pub fn clear(&self) {
        self.buckets.iter().for_each(Bucket::clear);
        self.age.store(0, Ordering::Relaxed);
    }

    /// Returns the size of this [`TTable`], in megabytes.
    #[inline(always)]
    pub fn size(&self) -> usize {
        self.buckets.len() * size_of::<Bucket>() / BYTES_IN_MB
    }

    /// Age of the current search.
    #[inline(always)]
    pub fn age(&self) -> u8 {
        self.age.load(Ordering::Relaxed)
    }

    /// Advances the age, so entries of earlier searches become preferred victims. Called once per search.
    #[inline(always)]
    pub fn update(&self) {
        self.age.store((self.age() + 1) % MAX_AGE, Ordering::Relaxed);
    }

    /// Map `key` to the index of its bucket.
    #[inline(always)]
    fn index(&self, key: ZobristKey) -> usize {
        ((key.inner() as u128 * self.buckets.len() as u128) >> 64) as usize
    }

    /// Hints that `key` is about to be probed by loading its bucket.
    #[inline(always)]
    pub fn prefetch(&self, key: ZobristKey) {
        let _ = self.buckets[self.index(key)].meta.load(Ordering::Relaxed);
    }

    /// Looks up `key`, returning its entry (if any) and the slot that [`TTable::set`] should write to.
    ///
    /// On a miss, the slot is the least valuable entry of the bucket: the shallowest, with old entries losing 4 plies per age.
    pub fn get(&self, key: ZobristKey) -> (Option<TTEntry>, TTSlot) {
        let bucket_index = self.index(key);
        let bucket = &self.buckets[bucket_index];
        let hash = key.inner() as u16;
        let age = self.age();

        let mut victim = 0;
        let mut victim_worth = i32::MAX;

        for index in 0..BUCKET_LEN {
            let entry = bucket.load(index);
            let slot = TTSlot {
                bucket: bucket_index,
                index,
            };

            if entry.key == hash && !entry.is_empty() {
                return (Some(entry), slot);
            }

            let age_distance = ((MAX_AGE + age - entry.age()) % MAX_AGE) as i32;
            let worth = entry.depth() - 4 * age_distance;
            if worth < victim_worth {
                victim = index;
                victim_worth = worth;
            }
        }

        let slot = TTSlot {
            bucket: bucket_index,
            index: victim,
        };
        (None, slot)
    }

    /// Writes a search result for `key` into `slot`.
    ///
    /// An existing move for the same position survives a write without one, and the rest of the entry is only
    /// replaced by exact results, different positions, newer searches, or results that are not much shallower.
    /// Mate scores are stored relative to the node at `ply`.
    #[allow(clippy::too_many_arguments)]
    pub fn set(
        &self,
        slot: TTSlot,
        key: ZobristKey,
        mv: Move,
        score: Score,
        eval: Score,
        depth: i32,
        pv: bool,
        bound: Bound,
        ply: usize,
    ) {
        let bucket = &self.buckets[slot.bucket];
        let mut entry = bucket.load(slot.index);
        let hash = key.inner() as u16;
        let age = self.age();

        let same_position = entry.key == hash && !entry.is_empty();

        if mv.is_some() || !same_position {
            entry.mv = mv.bits();
        }

        if bound == Bound::Exact || !same_position || entry.age() != age || depth + 4 + 2 * pv as i32 > entry.depth() {
            entry.key = hash;
            entry.score = score.relative(ply).0 as i16;
            entry.eval = eval.0 as i16;
            entry.depth = depth.clamp(0, u8::MAX as i32) as u8;
            entry.flags = age << 3 | (pv as u8) << 2 | bound as u8;
        }

        bucket.store(slot.index, entry);
    }

    /// Permill of entries written during the current search, sampled from the first 1000 buckets.
    pub fn hashfull(&self) -> usize {
        let sample = &self.buckets[..self.buckets.len().min(1000)];
        let age = self.age();

        let used = sample
            .iter()
            .flat_map(|bucket| (0..BUCKET_LEN).map(|index| bucket.load(index)))
            .filter(|entry| !entry.is_empty() && entry.age() == age)
            .count();

        used * 1000 / (sample.len() * BUCKET_LEN)
    }
}

impl Default for TTable {
    #[inline(always)]
    fn default() -> Self {
        Self::new(Self::DEFAULT_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MoveKind, Square};

    /// Keys that all land in bucket 0 of a small table, with distinct low bits.
    fn colliding_key(n: u64) -> ZobristKey {
        ZobristKey(n + 1)
    }

    fn some_move() -> Move {
        Move::new(Square::E2, Square::E4, MoveKind::Normal)
    }

    #[test]
    fn test_layout() {
        assert_eq!(size_of::<TTEntry>(), 10);
        assert_eq!(size_of::<Bucket>(), 32);
        assert_eq!(align_of::<Bucket>(), 32);
        assert_eq!(TTable::new(1).buckets.len(), BYTES_IN_MB / 32);
    }

    #[test]
    fn test_store_and_probe() {
        let tt = TTable::from_capacity(16);
        let key = ZobristKey(0xDEAD_BEEF_1234_5678);

        let (entry, slot) = tt.get(key);
        assert!(entry.is_none());

        tt.set(slot, key, some_move(), Score(42), Score(-7), 5, true, Bound::Exact, 0);
        let (entry, _) = tt.get(key);
        let entry = entry.unwrap();

        assert_eq!(entry.mv(), some_move());
        assert_eq!(entry.score(0), Score(42));
        assert_eq!(entry.eval(), Score(-7));
        assert_eq!(entry.depth(), 5);
        assert_eq!(entry.bound(), Bound::Exact);
        assert!(entry.is_pv());
        assert_eq!(entry.age(), 0);
    }

    #[test]
    fn test_empty_slots_never_match() {
        let tt = TTable::from_capacity(16);

        // The low 16 bits of this key are all zero, as is the key of an empty slot
        let key = ZobristKey(0xABCD_0000);
        let (entry, slot) = tt.get(key);
        assert!(entry.is_none());

        tt.set(slot, key, Move::NULL, Score::NONE, Score(0), 0, false, Bound::None, 0);
        let entry = tt.get(key).0.unwrap();
        assert_eq!(entry.eval(), Score(0));
        assert_eq!(entry.bound(), Bound::None);
    }

    #[test]
    fn test_concurrent_writes_to_sibling_entries() {
        const WRITES: u16 = 50_000;
        let tt = TTable::from_capacity(1);

        // The entry a writer to `index` stores on its `n`th write
        let entry = |index: usize, n: u16| TTEntry {
            key: 0x100 + index as u16,
            mv: n,
            score: n as i16,
            eval: n.wrapping_neg() as i16,
            depth: (n % 251) as u8,
            flags: (n % 4) as u8 | (index as u8) << 2,
        };

        std::thread::scope(|s| {
            for index in 0..BUCKET_LEN {
                let tt = &tt;
                s.spawn(move || {
                    for n in 1..=WRITES {
                        tt.buckets[0].store(index, entry(index, n));
                    }
                });
            }
        });

        // No entry lost its depth or bound to a write of its neighbour
        for index in 0..BUCKET_LEN {
            let loaded = tt.buckets[0].load(index);
            assert_eq!(loaded, entry(index, WRITES), "entry {index}");
            assert_eq!(loaded.depth(), (WRITES % 251) as i32);
            assert_eq!(loaded.bound(), Bound::from_bits((WRITES % 4) as u8));
        }
    }

    #[test]
    fn test_mate_scores_are_ply_independent() {
        let tt = TTable::from_capacity(16);
        let key = ZobristKey(77);

        // Mate found 3 plies below a node at ply 4
        let (_, slot) = tt.get(key);
        tt.set(slot, key, some_move(), Score::mate_in(7), Score(0), 3, false, Bound::Lower, 4);

        // Reached again at ply 10, the mate is still 3 plies away
        let (entry, _) = tt.get(key);
        assert_eq!(entry.unwrap().score(10), Score::mate_in(13));

        let (_, slot) = tt.get(key);
        tt.set(slot, key, some_move(), Score::mated_in(6), Score(0), 3, false, Bound::Exact, 2);
        let (entry, _) = tt.get(key);
        assert_eq!(entry.unwrap().score(0), Score::mated_in(4));

        // NONE is never adjusted
        let (_, slot) = tt.get(key);
        tt.set(slot, key, Move::NULL, Score::NONE, Score(10), 0, false, Bound::None, 9);
        let (entry, _) = tt.get(key);
        assert_eq!(entry.unwrap().score(3), Score::NONE);
    }

    #[test]
    fn test_null_move_keeps_best_move() {
        let tt = TTable::from_capacity(16);
        let key = ZobristKey(12345);

        let (_, slot) = tt.get(key);
        tt.set(slot, key, some_move(), Score(10), Score(0), 8, false, Bound::Lower, 0);

        // A shallower result without a move overwrites nothing
        let (_, slot) = tt.get(key);
        tt.set(slot, key, Move::NULL, Score(99), Score(0), 2, false, Bound::Upper, 0);
        let entry = tt.get(key).0.unwrap();
        assert_eq!(entry.mv(), some_move());
        assert_eq!(entry.depth(), 8);
        assert_eq!(entry.score(0), Score(10));

        // An exact result replaces the data but still keeps the move
        let (_, slot) = tt.get(key);
        tt.set(slot, key, Move::NULL, Score(99), Score(0), 2, false, Bound::Exact, 0);
        let entry = tt.get(key).0.unwrap();
        assert_eq!(entry.mv(), some_move());
        assert_eq!(entry.score(0), Score(99));
        assert_eq!(entry.bound(), Bound::Exact);
    }

    #[test]
    fn test_replacement_prefers_shallow_and_old() {
        let tt = TTable::from_capacity(1);

        for (n, depth) in [(0, 10), (1, 3), (2, 7)] {
            let key = colliding_key(n);
            let (_, slot) = tt.get(key);
            tt.set(slot, key, some_move(), Score(0), Score(0), depth, false, Bound::Exact, 0);
        }

        // The depth 3 entry is the victim
        let (entry, slot) = tt.get(colliding_key(3));
        assert!(entry.is_none());
        assert_eq!(slot, tt.get(colliding_key(1)).1);

        // After enough searches, the deep entry is older than it is valuable
        for _ in 0..3 {
            tt.update();
        }
        let key = colliding_key(1);
        let (_, slot) = tt.get(key);
        tt.set(slot, key, some_move(), Score(0), Score(0), 3, false, Bound::Exact, 0);
        let key = colliding_key(2);
        let (_, slot) = tt.get(key);
        tt.set(slot, key, some_move(), Score(0), Score(0), 7, false, Bound::Exact, 0);

        // 10 - 4 * 3 = -2 is now worth less than 3 or 7
        let (_, slot) = tt.get(colliding_key(4));
        assert_eq!(slot, tt.get(colliding_key(0)).1);
    }

    #[test]
    fn test_age_wraps_and_clear() {
        let tt = TTable::from_capacity(4);
        for _ in 0..MAX_AGE {
            tt.update();
        }
        assert_eq!(tt.age(), 0);

        tt.update();
        let key = ZobristKey(5);
        let (_, slot) = tt.get(key);
        tt.set(slot, key, some_move(), Score(0), Score(0), 1, false, Bound::Exact, 0);
        assert_eq!(tt.get(key).0.unwrap().age(), 1);

        tt.clear();
        assert!(tt.get(key).0.is_none());
        assert_eq!(tt.age(), 0);
    }

    #[test]
    fn test_hashfull() {
        let tt = TTable::from_capacity(10);
        assert_eq!(tt.hashfull(), 0);

        // One entry in each bucket fills a third of the table
        let mut filled = 0;
        let mut n = 1u64;
        while filled < 10 {
            let key = ZobristKey(n.wrapping_mul(0x9E37_79B9_7F4A_7C15));
            n += 1;
            let (entry, slot) = tt.get(key);
            if entry.is_some() || !tt.buckets[slot.bucket].load(0).is_empty() {
                continue;
            }
            tt.set(slot, key, some_move(), Score(0), Score(0), 1, false, Bound::Exact, 0);
            filled += 1;
        }
        assert_eq!(tt.hashfull(), 333);

        // Entries of previous searches do not count
        tt.update();
        assert_eq!(tt.hashfull(), 0);
    }
}
