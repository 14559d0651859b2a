//! One-shot construction of a [`TrieIndex`] from a [`Keyset`].
//!
//! Keys are sorted and deduplicated, then the trie is laid out breadth-first
//! directly from ranges of the sorted key array: a range `[begin, end)` at
//! `depth` is one node whose keys all share `key[..depth]`. No pointer-based
//! intermediate tree is ever materialized.

use std::collections::VecDeque;

use crate::bits::BitVector;
use crate::config::{Config, MAX_NUM_KEYS};
use crate::error::{Result, TrieError};
use crate::keyset::Keyset;
use crate::packed::PackedVec;
use crate::trie::TrieIndex;

/// LOUDS positions and rank counts are stored as `u32`; the LOUDS bitmap has
/// `2 * num_nodes + 1` bits.
pub(crate) const MAX_NUM_NODES: usize = (u32::MAX as usize - 1) / 2;

#[inline]
fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

/// Pack multi-byte label remainders into one tail, sharing common suffixes.
///
/// Labels are visited in descending order of their reversed bytes. In that
/// order a label that is a suffix of any other label is a suffix of the one
/// just before it, so it can point into bytes already written.
///
/// Returns the tail and, per label, its start offset.
fn build_tail(labels: &[&[u8]]) -> (Vec<u8>, Vec<u64>) {
    let mut order: Vec<usize> = (0..labels.len()).collect();
    order.sort_unstable_by(|&a, &b| labels[b].iter().rev().cmp(labels[a].iter().rev()));

    let mut tail = Vec::new();
    let mut starts = vec![0u64; labels.len()];
    let mut prev: Option<(&[u8], usize)> = None;
    for i in order {
        let label = labels[i];
        let end = match prev {
            Some((p, end)) if p.ends_with(label) => end,
            _ => {
                tail.extend_from_slice(label);
                tail.len()
            }
        };
        starts[i] = (end - label.len()) as u64;
        prev = Some((label, end));
    }
    (tail, starts)
}

/// Builds tries with a fixed [`Config`].
#[derive(Debug, Clone, Default)]
pub struct Builder {
    config: Config,
}

impl Builder {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build an index from `keyset`.
    ///
    /// Duplicates are dropped and insertion order is irrelevant. Fails only
    /// when the distinct keys exceed a configured or structural limit; on
    /// failure nothing is returned.
    pub fn build(&self, keyset: &Keyset) -> Result<TrieIndex> {
        let mut keys: Vec<&[u8]> = keyset.iter().collect();
        keys.sort_unstable();
        keys.dedup();

        self.check_limits(&keys)?;
        let trie = self.build_sorted(&keys)?;

        tracing::debug!(
            pushed = keyset.size(),
            num_keys = trie.num_keys(),
            num_nodes = trie.num_nodes(),
            bytes = trie.memory_usage(),
            "trie built"
        );
        Ok(trie)
    }

    fn check_limits(&self, keys: &[&[u8]]) -> Result<()> {
        let max_keys = self.config.max_keys.min(MAX_NUM_KEYS);
        if keys.len() > max_keys {
            return Err(TrieError::Build(format!(
                "{} distinct keys exceed the limit of {}",
                keys.len(),
                max_keys
            )));
        }
        let total_bytes: usize = keys.iter().map(|k| k.len()).sum();
        if total_bytes > self.config.max_total_bytes {
            return Err(TrieError::Build(format!(
                "{} key bytes exceed the limit of {}",
                total_bytes, self.config.max_total_bytes
            )));
        }
        Ok(())
    }

    /// `keys` must be sorted and free of duplicates.
    fn build_sorted(&self, keys: &[&[u8]]) -> Result<TrieIndex> {
        debug_assert!(keys.windows(2).all(|w| w[0] < w[1]));

        let mut louds = BitVector::new();
        let mut terminals = BitVector::new();
        let mut links = BitVector::new();
        let mut labels: Vec<u8> = Vec::new();
        // Label bytes after the first, one entry per linked node.
        let mut link_labels: Vec<&[u8]> = Vec::new();
        // Sorted position of each terminal, in terminal (BFS) order.
        let mut terminal_ids: Vec<u64> = Vec::new();

        // Super-root pointing at the root.
        louds.push(true);
        louds.push(false);
        labels.push(0);
        links.push(false);

        let mut queue: VecDeque<(usize, usize, usize)> = VecDeque::new();
        queue.push_back((0, keys.len(), 0));

        while let Some((mut begin, end, depth)) = queue.pop_front() {
            // Sorted and unique: only the first key of a range can end here.
            if begin < end && keys[begin].len() == depth {
                terminals.push(true);
                terminal_ids.push(begin as u64);
                begin += 1;
            } else {
                terminals.push(false);
            }

            while begin < end {
                let byte = keys[begin][depth];
                let group_end = begin + keys[begin..end].partition_point(|k| k[depth] <= byte);

                let label_end = if self.config.path_compression {
                    // Sorted range: the first/last LCP is the LCP of the group.
                    depth
                        + common_prefix_len(&keys[begin][depth..], &keys[group_end - 1][depth..])
                } else {
                    depth + 1
                };

                louds.push(true);
                labels.push(byte);
                if label_end > depth + 1 {
                    links.push(true);
                    link_labels.push(&keys[begin][depth + 1..label_end]);
                } else {
                    links.push(false);
                }
                if labels.len() > MAX_NUM_NODES {
                    return Err(TrieError::Build(format!(
                        "trie exceeds {} nodes",
                        MAX_NUM_NODES
                    )));
                }

                queue.push_back((begin, group_end, label_end));
                begin = group_end;
            }
            louds.push(false);
        }

        louds.build_index();
        terminals.build_index();
        links.build_index();

        let (tail, tail_starts) = build_tail(&link_labels);
        let tail_lens: Vec<u64> = link_labels.iter().map(|l| l.len() as u64).collect();
        let ids = self
            .config
            .enable_key_ids
            .then(|| PackedVec::from_values(&terminal_ids));

        let mut trie = TrieIndex::from_parts(
            louds,
            terminals,
            labels,
            links,
            tail,
            PackedVec::from_values(&tail_starts),
            PackedVec::from_values(&tail_lens),
            ids,
            self.config.path_compression,
        );
        trie.shrink_to_fit();
        Ok(trie)
    }
}
