//! Fixed-width bit-packed unsigned integers.
//!
//! Every value uses `width` bits, where `width` is just large enough for the
//! largest value. Used for tail offsets and the key-id table.

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct PackedVec {
    words: Vec<u64>,
    width: u8,
    len: usize,
}

#[inline]
fn words_for(len: usize, width: u8) -> usize {
    (len * width as usize).div_ceil(64)
}

impl PackedVec {
    pub(crate) fn from_values(values: &[u64]) -> Self {
        let max = values.iter().copied().max().unwrap_or(0);
        let width = (64 - max.leading_zeros()) as u8;
        let mut words = vec![0u64; words_for(values.len(), width)];
        if width > 0 {
            for (i, &v) in values.iter().enumerate() {
                let pos = i * width as usize;
                let (word, shift) = (pos / 64, pos % 64);
                words[word] |= v << shift;
                if shift + width as usize > 64 {
                    words[word + 1] |= v >> (64 - shift);
                }
            }
        }
        Self {
            words,
            width,
            len: values.len(),
        }
    }

    /// Rebuild from raw parts, rejecting inconsistent sizes.
    pub(crate) fn from_raw(width: u8, len: usize, words: Vec<u64>) -> Option<Self> {
        if width > 64 || len.checked_mul(width as usize)?.div_ceil(64) != words.len() {
            return None;
        }
        Some(Self { words, width, len })
    }

    #[inline]
    pub(crate) fn get(&self, i: usize) -> u64 {
        debug_assert!(i < self.len);
        if self.width == 0 {
            return 0;
        }
        let width = self.width as usize;
        let pos = i * width;
        let (word, shift) = (pos / 64, pos % 64);
        let mut v = self.words[word] >> shift;
        if shift + width > 64 {
            v |= self.words[word + 1] << (64 - shift);
        }
        if width == 64 {
            v
        } else {
            v & ((1u64 << width) - 1)
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn width(&self) -> u8 {
        self.width
    }

    pub(crate) fn words(&self) -> &[u64] {
        &self.words
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        (0..self.len).map(move |i| self.get(i))
    }

    pub(crate) fn memory_usage(&self) -> usize {
        self.words.capacity() * 8
    }

    pub(crate) fn shrink_to_fit(&mut self) {
        self.words.shrink_to_fit();
    }
}
