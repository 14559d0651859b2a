//! Bit vector with constant-time rank and logarithmic select.
//!
//! Layout:
//! - Bits packed LSB-first into `u64` words.
//! - One [`RankBlock`] per 512 bits: absolute count of ones before the block
//!   plus seven 9-bit counts relative to the block start (one per word).
//! - One select hint per 512 ones (and per 512 zeros): the block holding that
//!   bit. `select` binary-searches the rank blocks between two hints, then
//!   scans at most eight words.

const WORD_BITS: usize = 64;
const WORDS_PER_BLOCK: usize = 8;
const BLOCK_BITS: usize = WORD_BITS * WORDS_PER_BLOCK;
const SELECT_SAMPLE: usize = 512;

// =============================================================================
// Word-level select
// =============================================================================

#[inline]
fn select_in_word_fallback(mut word: u64, mut rank: u32) -> u32 {
    let mut base = 0u32;
    loop {
        let c = (word & 0xFF).count_ones();
        if rank < c {
            break;
        }
        rank -= c;
        word >>= 8;
        base += 8;
    }
    let mut byte = word & 0xFF;
    for _ in 0..rank {
        byte &= byte - 1;
    }
    base + byte.trailing_zeros()
}

// Newer toolchains treat the intrinsic as safe inside a matching
// `target_feature` fn; older ones require the block.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "bmi2")]
#[allow(unused_unsafe)]
unsafe fn select_in_word_bmi2(word: u64, rank: u32) -> u32 {
    // SAFETY: Caller guarantees BMI2.
    unsafe { core::arch::x86_64::_pdep_u64(1u64 << rank, word).trailing_zeros() }
}

/// Position of the `rank`-th (0-based) set bit of `word`.
#[inline]
fn select_in_word(word: u64, rank: u32) -> u32 {
    debug_assert!(rank < word.count_ones());
    #[cfg(target_arch = "x86_64")]
    {
        if std::is_x86_feature_detected!("bmi2") {
            // SAFETY: feature detected at runtime.
            return unsafe { select_in_word_bmi2(word, rank) };
        }
    }
    select_in_word_fallback(word, rank)
}

// =============================================================================
// Rank blocks
// =============================================================================

#[derive(Clone, Copy, Debug, Default)]
struct RankBlock {
    abs: u32,
    /// Ones before words 1..=7 of the block, 9 bits each.
    rel: u64,
}

impl RankBlock {
    #[inline]
    fn rel(self, word: usize) -> usize {
        if word == 0 {
            0
        } else {
            ((self.rel >> ((word - 1) * 9)) & 0x1FF) as usize
        }
    }

    #[inline]
    fn set_rel(&mut self, word: usize, count: usize) {
        debug_assert!((1..WORDS_PER_BLOCK).contains(&word) && count < BLOCK_BITS);
        self.rel |= (count as u64) << ((word - 1) * 9);
    }
}

// =============================================================================
// BitVector
// =============================================================================

#[derive(Clone, Debug, Default)]
pub(crate) struct BitVector {
    words: Vec<u64>,
    num_bits: usize,
    num_ones: usize,
    ranks: Vec<RankBlock>,
    select0s: Vec<u32>,
    select1s: Vec<u32>,
}

impl BitVector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Rebuild a vector from its packed words. Bits past `num_bits` must be zero.
    pub(crate) fn from_words(words: Vec<u64>, num_bits: usize) -> Option<Self> {
        if words.len() != num_bits.div_ceil(WORD_BITS) {
            return None;
        }
        let tail_bits = num_bits % WORD_BITS;
        if tail_bits != 0 {
            let last = *words.last()?;
            if last >> tail_bits != 0 {
                return None;
            }
        }
        let num_ones = words.iter().map(|w| w.count_ones() as usize).sum();
        let mut bv = Self {
            words,
            num_bits,
            num_ones,
            ..Self::default()
        };
        bv.build_index();
        Some(bv)
    }

    #[inline]
    pub(crate) fn push(&mut self, bit: bool) {
        let off = self.num_bits % WORD_BITS;
        if off == 0 {
            self.words.push(0);
        }
        if bit {
            if let Some(last) = self.words.last_mut() {
                *last |= 1u64 << off;
            }
            self.num_ones += 1;
        }
        self.num_bits += 1;
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.num_bits
    }

    #[inline]
    pub(crate) fn num_ones(&self) -> usize {
        self.num_ones
    }

    #[inline]
    pub(crate) fn num_zeros(&self) -> usize {
        self.num_bits - self.num_ones
    }

    #[inline]
    pub(crate) fn get(&self, i: usize) -> bool {
        debug_assert!(i < self.num_bits);
        (self.words[i / WORD_BITS] >> (i % WORD_BITS)) & 1 == 1
    }

    pub(crate) fn words(&self) -> &[u64] {
        &self.words
    }

    /// Build rank blocks and select hints. Must run after the last `push`.
    pub(crate) fn build_index(&mut self) {
        let num_blocks = self.num_bits / BLOCK_BITS + 1;
        let mut ranks = Vec::with_capacity(num_blocks);
        let mut ones = 0usize;
        for b in 0..num_blocks {
            let mut block = RankBlock {
                abs: ones as u32,
                rel: 0,
            };
            for w in 0..WORDS_PER_BLOCK {
                if w > 0 {
                    block.set_rel(w, ones - block.abs as usize);
                }
                if let Some(word) = self.words.get(b * WORDS_PER_BLOCK + w) {
                    ones += word.count_ones() as usize;
                }
            }
            ranks.push(block);
        }

        let mut select1s = Vec::new();
        let mut select0s = Vec::new();
        let mut ones = 0usize;
        let mut zeros = 0usize;
        for (w, word) in self.words.iter().enumerate() {
            let valid = (self.num_bits - w * WORD_BITS).min(WORD_BITS);
            let c1 = word.count_ones() as usize;
            let c0 = valid - c1;
            // A word holds < SELECT_SAMPLE bits, so at most one hint lands in it.
            if select1s.len() * SELECT_SAMPLE < ones + c1 {
                select1s.push((w / WORDS_PER_BLOCK) as u32);
            }
            if select0s.len() * SELECT_SAMPLE < zeros + c0 {
                select0s.push((w / WORDS_PER_BLOCK) as u32);
            }
            ones += c1;
            zeros += c0;
        }

        self.ranks = ranks;
        self.select1s = select1s;
        self.select0s = select0s;
    }

    /// Number of ones in `[0, i)`.
    #[inline]
    pub(crate) fn rank1(&self, i: usize) -> usize {
        debug_assert!(i <= self.num_bits);
        let block = self.ranks[i / BLOCK_BITS];
        let word = i / WORD_BITS;
        let mut r = block.abs as usize + block.rel(word % WORDS_PER_BLOCK);
        let bit = i % WORD_BITS;
        if bit != 0 {
            r += (self.words[word] & ((1u64 << bit) - 1)).count_ones() as usize;
        }
        r
    }

    /// Position of the `k`-th (0-based) one.
    #[inline]
    pub(crate) fn select1(&self, k: usize) -> usize {
        debug_assert!(k < self.num_ones);
        self.select(k, true)
    }

    /// Position of the `k`-th (0-based) zero.
    #[inline]
    pub(crate) fn select0(&self, k: usize) -> usize {
        debug_assert!(k < self.num_zeros());
        self.select(k, false)
    }

    fn select(&self, k: usize, ones: bool) -> usize {
        let samples = if ones { &self.select1s } else { &self.select0s };
        let s = k / SELECT_SAMPLE;
        let count_before = |b: usize| -> usize {
            let abs = self.ranks[b].abs as usize;
            if ones {
                abs
            } else {
                b * BLOCK_BITS - abs
            }
        };

        // Last block in [lo, hi) whose preceding count is <= k.
        let mut lo = samples[s] as usize;
        let mut hi = samples
            .get(s + 1)
            .map_or(self.ranks.len(), |&b| b as usize + 1);
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            if count_before(mid) <= k {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        let block = lo;
        let remaining = k - count_before(block);

        let rank = self.ranks[block];
        let rel_count = |w: usize| -> usize {
            if ones {
                rank.rel(w)
            } else {
                w * WORD_BITS - rank.rel(w)
            }
        };
        let mut w = 1;
        while w < WORDS_PER_BLOCK && rel_count(w) <= remaining {
            w += 1;
        }
        w -= 1;

        let word_idx = block * WORDS_PER_BLOCK + w;
        let word = if ones {
            self.words[word_idx]
        } else {
            !self.words[word_idx]
        };
        word_idx * WORD_BITS + select_in_word(word, (remaining - rel_count(w)) as u32) as usize
    }

    pub(crate) fn memory_usage(&self) -> usize {
        self.words.capacity() * 8
            + self.ranks.capacity() * std::mem::size_of::<RankBlock>()
            + self.select0s.capacity() * 4
            + self.select1s.capacity() * 4
    }

    pub(crate) fn shrink_to_fit(&mut self) {
        self.words.shrink_to_fit();
        self.ranks.shrink_to_fit();
        self.select0s.shrink_to_fit();
        self.select1s.shrink_to_fit();
    }
}

impl FromIterator<bool> for BitVector {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        let mut bv = BitVector::new();
        for bit in iter {
            bv.push(bit);
        }
        bv.build_index();
        bv
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn check_against_naive(bits: &[bool]) {
        let bv: BitVector = bits.iter().copied().collect();
        assert_eq!(bv.len(), bits.len());

        let mut ones = 0usize;
        let mut one_positions = Vec::new();
        let mut zero_positions = Vec::new();
        for (i, &b) in bits.iter().enumerate() {
            assert_eq!(bv.get(i), b, "get({i})");
            assert_eq!(bv.rank1(i), ones, "rank1({i})");
            if b {
                ones += 1;
                one_positions.push(i);
            } else {
                zero_positions.push(i);
            }
        }
        assert_eq!(bv.rank1(bits.len()), ones);
        assert_eq!(bv.num_ones(), ones);

        for (k, &pos) in one_positions.iter().enumerate() {
            assert_eq!(bv.select1(k), pos, "select1({k})");
        }
        for (k, &pos) in zero_positions.iter().enumerate() {
            assert_eq!(bv.select0(k), pos, "select0({k})");
        }
    }

    #[test]
    fn test_select_in_word() {
        let word = 0b1011_0000_0000_0001_0000_0000_0000_0000_0000_0000_1000_0100u64;
        let mut expected = Vec::new();
        for i in 0..64 {
            if (word >> i) & 1 == 1 {
                expected.push(i as u32);
            }
        }
        for (r, &pos) in expected.iter().enumerate() {
            assert_eq!(select_in_word(word, r as u32), pos);
            assert_eq!(select_in_word_fallback(word, r as u32), pos);
        }
        assert_eq!(select_in_word(u64::MAX, 63), 63);
    }

    #[test]
    fn test_empty() {
        let bv: BitVector = std::iter::empty().collect();
        assert_eq!(bv.len(), 0);
        assert_eq!(bv.rank1(0), 0);
        assert_eq!(bv.num_ones(), 0);
    }

    #[test]
    fn test_small_patterns() {
        check_against_naive(&[true]);
        check_against_naive(&[false]);
        check_against_naive(&[true, false, true, true, false]);
        check_against_naive(&vec![true; 64]);
        check_against_naive(&vec![false; 512]);
        check_against_naive(&vec![true; 1025]);
    }

    #[test]
    fn test_random_densities() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for &density in &[0.01f64, 0.1, 0.5, 0.9, 0.99] {
            let n = rng.gen_range(1..5000);
            let bits: Vec<bool> = (0..n).map(|_| rng.gen_bool(density)).collect();
            check_against_naive(&bits);
        }
    }

    #[test]
    fn test_sparse_long_runs() {
        // Several empty blocks between set bits exercise the select hints.
        let mut bits = vec![false; 10_000];
        for i in [0usize, 1, 700, 4096, 4097, 9999] {
            bits[i] = true;
        }
        check_against_naive(&bits);
    }

    #[test]
    fn test_from_words() {
        let bv: BitVector = [true, false, true].into_iter().collect();
        let copy = BitVector::from_words(bv.words().to_vec(), bv.len()).unwrap();
        assert_eq!(copy.num_ones(), 2);
        assert_eq!(copy.select1(1), 2);

        // Wrong word count.
        assert!(BitVector::from_words(vec![0, 0], 3).is_none());
        // Set padding bits.
        assert!(BitVector::from_words(vec![0b1000], 3).is_none());
    }
}
