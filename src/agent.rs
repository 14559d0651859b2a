//! Reusable per-query scratch state.

use smallvec::SmallVec;

use crate::error::{Result, TrieError};

/// One pending sibling run during predictive search.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Frame {
    /// Next child node id to visit.
    pub(crate) next: u32,
    /// One past the last child node id.
    pub(crate) end: u32,
    /// Key length at the parent node.
    pub(crate) key_len: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SearchState {
    NotStarted,
    Predicting,
    /// Last matched node and the query bytes consumed to reach it.
    CommonPrefix { node: usize, pos: usize },
    Exhausted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Matched {
    Nothing,
    Key { id: Option<u32> },
}

/// Query context for a [`TrieIndex`](crate::TrieIndex).
///
/// Holds the query, the traversal state of an in-progress search and the
/// most recently matched key. Agents are owned by the caller and can be
/// reused across queries and across indexes, one query at a time. Calling
/// [`set_query`](Agent::set_query) always starts over.
///
/// ```rust
/// use succinct_trie::{Agent, TrieIndex};
///
/// let trie = TrieIndex::build(["apple", "apricot", "banana"]).unwrap();
/// let mut agent = Agent::new();
/// agent.set_query(b"ap");
///
/// let mut found = Vec::new();
/// while trie.predictive_search(&mut agent) {
///     found.push(agent.key().to_vec());
/// }
/// assert_eq!(found, vec![b"apple".to_vec(), b"apricot".to_vec()]);
/// ```
#[derive(Clone, Debug)]
pub struct Agent {
    pub(crate) query: Vec<u8>,
    pub(crate) query_id: Option<u32>,
    pub(crate) state: SearchState,
    pub(crate) stack: SmallVec<[Frame; 16]>,
    pub(crate) key: Vec<u8>,
    pub(crate) matched: Matched,
}

impl Agent {
    pub fn new() -> Self {
        Self {
            query: Vec::new(),
            query_id: None,
            state: SearchState::NotStarted,
            stack: SmallVec::new(),
            key: Vec::new(),
            matched: Matched::Nothing,
        }
    }

    /// Set the query bytes and reset any in-progress search.
    pub fn set_query(&mut self, query: impl AsRef<[u8]>) {
        self.query.clear();
        self.query.extend_from_slice(query.as_ref());
        self.query_id = None;
        self.reset();
    }

    /// Set a key id for [`TrieIndex::reverse_lookup`](crate::TrieIndex::reverse_lookup).
    pub fn set_query_id(&mut self, id: u32) {
        self.query.clear();
        self.query_id = Some(id);
        self.reset();
    }

    pub fn query(&self) -> &[u8] {
        &self.query
    }

    /// The last matched key, or an empty slice if the last call did not match.
    pub fn key(&self) -> &[u8] {
        match self.matched {
            Matched::Key { .. } => &self.key,
            Matched::Nothing => &[],
        }
    }

    /// Dense lexicographic id of the last matched key.
    pub fn id(&self) -> Result<u32> {
        match self.matched {
            Matched::Key { id: Some(id) } => Ok(id),
            Matched::Key { id: None } => Err(TrieError::FeatureUnavailable(
                "key ids were disabled at build time",
            )),
            Matched::Nothing => Err(TrieError::NoMatch),
        }
    }

    /// Whether the last search call produced a match.
    pub fn has_match(&self) -> bool {
        matches!(self.matched, Matched::Key { .. })
    }

    /// Drop the query and all scratch state, keeping allocations.
    pub fn clear(&mut self) {
        self.query.clear();
        self.query_id = None;
        self.reset();
    }

    fn reset(&mut self) {
        self.state = SearchState::NotStarted;
        self.stack.clear();
        self.key.clear();
        self.matched = Matched::Nothing;
    }

    #[inline]
    pub(crate) fn set_match(&mut self, id: Option<u32>) {
        self.matched = Matched::Key { id };
    }

    #[inline]
    pub(crate) fn clear_match(&mut self) {
        self.matched = Matched::Nothing;
    }

    /// End the current search; later calls return `false` until `set_query`.
    pub(crate) fn exhaust(&mut self) {
        self.state = SearchState::Exhausted;
        self.stack.clear();
        self.key.clear();
        self.matched = Matched::Nothing;
    }
}

impl Default for Agent {
    fn default() -> Self {
        Self::new()
    }
}
