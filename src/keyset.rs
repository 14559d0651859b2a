//! Append-only staging area for keys before a build.

/// Keys collected for [`Builder::build`](crate::Builder::build).
///
/// All key bytes live in one arena; `ends[i]` is the end offset of key `i`.
/// No ordering or uniqueness is enforced here.
#[derive(Clone, Debug, Default)]
pub struct Keyset {
    data: Vec<u8>,
    ends: Vec<usize>,
}

impl Keyset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(num_keys: usize, total_bytes: usize) -> Self {
        Self {
            data: Vec::with_capacity(total_bytes),
            ends: Vec::with_capacity(num_keys),
        }
    }

    pub fn push(&mut self, key: impl AsRef<[u8]>) {
        self.data.extend_from_slice(key.as_ref());
        self.ends.push(self.data.len());
    }

    /// Number of keys pushed, duplicates included.
    #[inline]
    pub fn size(&self) -> usize {
        self.ends.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ends.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ends.is_empty()
    }

    /// Sum of key lengths, duplicates included.
    #[inline]
    pub fn total_bytes(&self) -> usize {
        self.data.len()
    }

    pub fn get(&self, i: usize) -> Option<&[u8]> {
        let end = *self.ends.get(i)?;
        let start = if i == 0 { 0 } else { self.ends[i - 1] };
        Some(&self.data[start..end])
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8]> + '_ {
        let starts = std::iter::once(0).chain(self.ends.iter().copied());
        starts
            .zip(self.ends.iter().copied())
            .map(move |(start, end)| &self.data[start..end])
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.ends.clear();
    }

    pub fn memory_usage(&self) -> usize {
        self.data.capacity() + self.ends.capacity() * std::mem::size_of::<usize>()
    }
}

impl<K: AsRef<[u8]>> Extend<K> for Keyset {
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        for key in iter {
            self.push(key);
        }
    }
}

impl<K: AsRef<[u8]>> FromIterator<K> for Keyset {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut keyset = Keyset::new();
        keyset.extend(iter);
        keyset
    }
}
