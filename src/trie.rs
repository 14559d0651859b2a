//! The immutable succinct trie and its query algorithms.
//!
//! Topology is a LOUDS bitmap: `"10"` for a super-root, then for every node
//! in breadth-first order one `1` per child followed by a `0`. Node ids are
//! breadth-first ranks with the root at 0. For node `i`:
//!
//! - children occupy LOUDS positions `select0(i) + 1 .. select0(i + 1)`,
//!   and the child at position `p` has id `p - i - 1`;
//! - the parent of `i` is `select1(i) - i - 1`.
//!
//! `labels[i]` is the first byte of the edge into `i`. Siblings are stored
//! in ascending label order, so children are found by binary search and
//! depth-first traversal yields keys in byte order. With path compression an
//! edge can carry more bytes; `links` marks those nodes and the remaining
//! bytes live in `tail` at `tail_starts[r]` for `tail_lens[r]` bytes, where
//! `r = links.rank1(node)`. Labels sharing a suffix share tail bytes, so
//! ranges may overlap.

use std::fmt;
use std::ops::Range;

use crate::agent::{Agent, Frame, SearchState};
use crate::bits::BitVector;
use crate::builder::Builder;
use crate::error::{Result, TrieError};
use crate::keyset::Keyset;
use crate::packed::PackedVec;

const NO_KEY_IDS: &str = "key ids were disabled at build time";

/// Dense lexicographic key ids.
#[derive(Clone, Debug)]
pub(crate) struct KeyIds {
    /// Terminal rank (BFS order) -> key id. This is the persisted table.
    pub(crate) by_terminal: PackedVec,
    /// Key id -> terminal rank, rebuilt from `by_terminal`.
    pub(crate) terminal_of: PackedVec,
}

impl KeyIds {
    fn new(by_terminal: PackedVec) -> Self {
        let mut inverse = vec![0u64; by_terminal.len()];
        for (terminal, id) in by_terminal.iter().enumerate() {
            inverse[id as usize] = terminal as u64;
        }
        Self {
            by_terminal,
            terminal_of: PackedVec::from_values(&inverse),
        }
    }
}

/// Immutable succinct index over a static set of byte-string keys.
///
/// Built once by a [`Builder`], then queried through an [`Agent`]. All query
/// methods take `&self`; the index is `Send + Sync` and can be shared by any
/// number of threads, each with its own agent.
///
/// ```rust
/// use succinct_trie::{Agent, TrieIndex};
///
/// let trie = TrieIndex::build(["apple", "orange"]).unwrap();
/// let mut agent = Agent::new();
///
/// agent.set_query(b"apple");
/// assert!(trie.lookup(&mut agent));
/// assert_eq!(agent.id().unwrap(), 0);
///
/// agent.set_query(b"banana");
/// assert!(!trie.lookup(&mut agent));
/// ```
#[derive(Clone)]
pub struct TrieIndex {
    pub(crate) louds: BitVector,
    pub(crate) terminals: BitVector,
    pub(crate) labels: Vec<u8>,
    pub(crate) links: BitVector,
    pub(crate) tail: Vec<u8>,
    pub(crate) tail_starts: PackedVec,
    pub(crate) tail_lens: PackedVec,
    pub(crate) ids: Option<KeyIds>,
    pub(crate) path_compression: bool,
}

impl TrieIndex {
    /// Callers guarantee the parts are mutually consistent and indexed.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        louds: BitVector,
        terminals: BitVector,
        labels: Vec<u8>,
        links: BitVector,
        tail: Vec<u8>,
        tail_starts: PackedVec,
        tail_lens: PackedVec,
        id_table: Option<PackedVec>,
        path_compression: bool,
    ) -> Self {
        Self {
            louds,
            terminals,
            labels,
            links,
            tail,
            tail_starts,
            tail_lens,
            ids: id_table.map(KeyIds::new),
            path_compression,
        }
    }

    /// Build an index with the default [`Config`](crate::Config).
    pub fn build<I, K>(keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[u8]>,
    {
        let keyset: Keyset = keys.into_iter().collect();
        Builder::default().build(&keyset)
    }

    /// Number of distinct keys.
    #[inline]
    pub fn num_keys(&self) -> usize {
        self.terminals.num_ones()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.num_keys()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_keys() == 0
    }

    /// Number of trie nodes, root included.
    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn has_key_ids(&self) -> bool {
        self.ids.is_some()
    }

    #[inline]
    pub fn is_path_compressed(&self) -> bool {
        self.path_compression
    }

    /// Heap bytes held by the index.
    pub fn memory_usage(&self) -> usize {
        self.louds.memory_usage()
            + self.terminals.memory_usage()
            + self.labels.capacity()
            + self.links.memory_usage()
            + self.tail.capacity()
            + self.tail_starts.memory_usage()
            + self.tail_lens.memory_usage()
            + self.ids.as_ref().map_or(0, |ids| {
                ids.by_terminal.memory_usage() + ids.terminal_of.memory_usage()
            })
    }

    /// Release spare capacity. Freshly built indexes are already shrunk.
    pub fn shrink_to_fit(&mut self) {
        self.louds.shrink_to_fit();
        self.terminals.shrink_to_fit();
        self.labels.shrink_to_fit();
        self.links.shrink_to_fit();
        self.tail.shrink_to_fit();
        self.tail_starts.shrink_to_fit();
        self.tail_lens.shrink_to_fit();
        if let Some(ids) = &mut self.ids {
            ids.by_terminal.shrink_to_fit();
            ids.terminal_of.shrink_to_fit();
        }
    }
}

// =============================================================================
// Node navigation
// =============================================================================

impl TrieIndex {
    /// Node ids of the children of `node`, in ascending label order.
    #[inline]
    fn children(&self, node: usize) -> Range<usize> {
        let start = self.louds.select0(node) + 1;
        let end = self.louds.select0(node + 1);
        let first = start - node - 1;
        first..first + (end - start)
    }

    #[inline]
    fn parent(&self, node: usize) -> usize {
        debug_assert!(node > 0);
        self.louds.select1(node) - node - 1
    }

    #[inline]
    fn find_child(&self, node: usize, byte: u8) -> Option<usize> {
        let range = self.children(node);
        self.labels[range.clone()]
            .binary_search(&byte)
            .ok()
            .map(|i| range.start + i)
    }

    /// Edge bytes after the first label byte.
    #[inline]
    fn tail_of(&self, node: usize) -> &[u8] {
        if !self.links.get(node) {
            return &[];
        }
        let link = self.links.rank1(node);
        let start = self.tail_starts.get(link) as usize;
        let len = self.tail_lens.get(link) as usize;
        &self.tail[start..start + len]
    }

    #[inline]
    fn push_label(&self, node: usize, key: &mut Vec<u8>) {
        key.push(self.labels[node]);
        key.extend_from_slice(self.tail_of(node));
    }

    #[inline]
    fn key_id(&self, node: usize) -> Option<u32> {
        self.ids
            .as_ref()
            .map(|ids| ids.by_terminal.get(self.terminals.rank1(node)) as u32)
    }

    /// Node reached by consuming all of `query`, ending on a node boundary.
    fn walk_exact(&self, query: &[u8]) -> Option<usize> {
        let mut node = 0;
        let mut pos = 0;
        while pos < query.len() {
            let child = self.find_child(node, query[pos])?;
            let tail = self.tail_of(child);
            if !query[pos + 1..].starts_with(tail) {
                return None;
            }
            pos += 1 + tail.len();
            node = child;
        }
        Some(node)
    }

    /// Shallowest node whose path has `query` as a prefix. The query may end
    /// inside an edge label. `key` receives the full path of that node.
    fn walk_prefix(&self, query: &[u8], key: &mut Vec<u8>) -> Option<usize> {
        key.clear();
        let mut node = 0;
        let mut pos = 0;
        while pos < query.len() {
            let child = self.find_child(node, query[pos])?;
            let tail = self.tail_of(child);
            let rest = &query[pos + 1..];
            let n = rest.len().min(tail.len());
            if rest[..n] != tail[..n] {
                return None;
            }
            self.push_label(child, key);
            pos += 1 + n;
            node = child;
        }
        Some(node)
    }

    /// Rebuild the full key of `node` by walking parent links.
    fn restore_into(&self, mut node: usize, key: &mut Vec<u8>) {
        key.clear();
        while node != 0 {
            key.extend(self.tail_of(node).iter().rev());
            key.push(self.labels[node]);
            node = self.parent(node);
        }
        key.reverse();
    }

    /// Push a frame for `node`'s children and report whether it is terminal.
    #[inline]
    fn visit(&self, agent: &mut Agent, node: usize) -> bool {
        let children = self.children(node);
        if !children.is_empty() {
            agent.stack.push(Frame {
                next: children.start as u32,
                end: children.end as u32,
                key_len: agent.key.len(),
            });
        }
        if self.terminals.get(node) {
            agent.set_match(self.key_id(node));
            true
        } else {
            false
        }
    }
}

// =============================================================================
// Queries
// =============================================================================

impl TrieIndex {
    /// Exact-match lookup of `agent.query()`.
    ///
    /// On a match the agent's key is the query and its id is the key id.
    /// Discards any search in progress on the agent.
    pub fn lookup(&self, agent: &mut Agent) -> bool {
        agent.state = SearchState::NotStarted;
        agent.stack.clear();
        agent.key.clear();

        match self.walk_exact(&agent.query) {
            Some(node) if self.terminals.get(node) => {
                agent.key.extend_from_slice(&agent.query);
                agent.set_match(self.key_id(node));
                true
            }
            _ => {
                agent.clear_match();
                false
            }
        }
    }

    /// Whether `key` is in the index.
    pub fn contains(&self, key: impl AsRef<[u8]>) -> bool {
        self.walk_exact(key.as_ref())
            .is_some_and(|node| self.terminals.get(node))
    }

    /// Next key having `agent.query()` as a prefix, in ascending byte order.
    ///
    /// Call repeatedly until it returns `false`; after that it keeps
    /// returning `false` until [`Agent::set_query`] starts a new search.
    pub fn predictive_search(&self, agent: &mut Agent) -> bool {
        match agent.state {
            SearchState::NotStarted => {
                agent.stack.clear();
                let Some(node) = self.walk_prefix(&agent.query, &mut agent.key) else {
                    agent.exhaust();
                    return false;
                };
                agent.state = SearchState::Predicting;
                if self.visit(agent, node) {
                    return true;
                }
            }
            SearchState::Predicting => agent.clear_match(),
            SearchState::CommonPrefix { .. } | SearchState::Exhausted => {
                agent.exhaust();
                return false;
            }
        }

        while let Some(frame) = agent.stack.last_mut() {
            if frame.next == frame.end {
                agent.stack.pop();
                continue;
            }
            let child = frame.next as usize;
            frame.next += 1;
            let key_len = frame.key_len;

            // State left over from a different index.
            if child >= self.num_nodes() || key_len > agent.key.len() {
                break;
            }

            agent.key.truncate(key_len);
            self.push_label(child, &mut agent.key);
            if self.visit(agent, child) {
                return true;
            }
        }

        agent.exhaust();
        false
    }

    /// Next key that is a prefix of `agent.query()`, shortest first.
    ///
    /// Same calling convention as [`predictive_search`](Self::predictive_search).
    pub fn common_prefix_search(&self, agent: &mut Agent) -> bool {
        let (mut node, mut pos) = match agent.state {
            SearchState::NotStarted => {
                agent.stack.clear();
                agent.key.clear();
                agent.state = SearchState::CommonPrefix { node: 0, pos: 0 };
                if self.terminals.get(0) {
                    agent.set_match(self.key_id(0));
                    return true;
                }
                (0, 0)
            }
            SearchState::CommonPrefix { node, pos } => (node, pos),
            SearchState::Predicting | SearchState::Exhausted => {
                agent.exhaust();
                return false;
            }
        };

        if node >= self.num_nodes() || pos > agent.query.len() {
            agent.exhaust();
            return false;
        }

        while pos < agent.query.len() {
            let Some(child) = self.find_child(node, agent.query[pos]) else {
                break;
            };
            let tail = self.tail_of(child);
            if !agent.query[pos + 1..].starts_with(tail) {
                break;
            }
            pos += 1 + tail.len();
            node = child;

            if self.terminals.get(node) {
                agent.state = SearchState::CommonPrefix { node, pos };
                agent.key.clear();
                agent.key.extend_from_slice(&agent.query[..pos]);
                agent.set_match(self.key_id(node));
                return true;
            }
        }

        agent.exhaust();
        false
    }

    /// Restore the key whose id was set with [`Agent::set_query_id`].
    ///
    /// Returns `Ok(false)` when no id is set or the id is out of range.
    pub fn reverse_lookup(&self, agent: &mut Agent) -> Result<bool> {
        let ids = self
            .ids
            .as_ref()
            .ok_or(TrieError::FeatureUnavailable(NO_KEY_IDS))?;

        agent.state = SearchState::NotStarted;
        agent.stack.clear();
        agent.key.clear();
        agent.clear_match();

        let Some(id) = agent
            .query_id
            .filter(|&id| (id as usize) < self.num_keys())
        else {
            return Ok(false);
        };

        let terminal = ids.terminal_of.get(id as usize) as usize;
        let node = self.terminals.select1(terminal);
        self.restore_into(node, &mut agent.key);
        agent.set_match(Some(id));
        Ok(true)
    }

    /// Key with the given id, if any.
    pub fn restore(&self, id: u32) -> Result<Option<Vec<u8>>> {
        let mut agent = Agent::new();
        agent.set_query_id(id);
        Ok(self
            .reverse_lookup(&mut agent)?
            .then(|| agent.key().to_vec()))
    }

    /// Lazy iterator over keys with the given prefix, in ascending order.
    pub fn predictive_iter(&self, prefix: impl AsRef<[u8]>) -> Matches<'_> {
        Matches::new(self, prefix.as_ref(), TrieIndex::predictive_search)
    }

    /// Lazy iterator over keys that are prefixes of `query`, shortest first.
    pub fn common_prefix_iter(&self, query: impl AsRef<[u8]>) -> Matches<'_> {
        Matches::new(self, query.as_ref(), TrieIndex::common_prefix_search)
    }

    /// All keys in ascending order.
    pub fn iter(&self) -> Matches<'_> {
        self.predictive_iter(b"")
    }
}

impl fmt::Debug for TrieIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrieIndex")
            .field("num_keys", &self.num_keys())
            .field("num_nodes", &self.num_nodes())
            .field("key_ids", &self.has_key_ids())
            .field("path_compression", &self.path_compression)
            .finish()
    }
}

/// Iterator over search results: `(key, id)` pairs, `id` present when the
/// index was built with key ids.
pub struct Matches<'a> {
    trie: &'a TrieIndex,
    agent: Agent,
    step: fn(&TrieIndex, &mut Agent) -> bool,
}

impl<'a> Matches<'a> {
    fn new(trie: &'a TrieIndex, query: &[u8], step: fn(&TrieIndex, &mut Agent) -> bool) -> Self {
        let mut agent = Agent::new();
        agent.set_query(query);
        Self { trie, agent, step }
    }
}

impl Iterator for Matches<'_> {
    type Item = (Vec<u8>, Option<u32>);

    fn next(&mut self) -> Option<Self::Item> {
        if (self.step)(self.trie, &mut self.agent) {
            Some((self.agent.key().to_vec(), self.agent.id().ok()))
        } else {
            None
        }
    }
}
