//! # succinct-trie
//!
//! A static, memory-compact set of byte-string keys stored as a LOUDS trie.
//!
//! Keys are staged in a [`Keyset`], compiled once by a [`Builder`] into an
//! immutable [`TrieIndex`], and queried through a caller-owned [`Agent`].
//! Every key gets a dense id equal to its rank in byte order. Supported
//! queries are exact lookup, predictive (prefix) search, common-prefix search
//! and reverse lookup by id. Indexes can be saved to and loaded from a
//! compact binary format.
//!
//! ## Example
//!
//! ```rust
//! use succinct_trie::{Agent, Builder, Config, Keyset};
//!
//! let mut keyset = Keyset::new();
//! keyset.push("apple");
//! keyset.push("orange");
//! keyset.push("apricot");
//!
//! let trie = Builder::new(Config::default()).build(&keyset).unwrap();
//! let mut agent = Agent::new();
//!
//! agent.set_query("apricot");
//! assert!(trie.lookup(&mut agent));
//! assert_eq!(agent.id().unwrap(), 1);
//!
//! agent.set_query("ap");
//! let mut found = Vec::new();
//! while trie.predictive_search(&mut agent) {
//!     found.push(String::from_utf8(agent.key().to_vec()).unwrap());
//! }
//! assert_eq!(found, ["apple", "apricot"]);
//! ```
//!
//! The succinct building blocks (rank/select bit vectors, bit-packed arrays)
//! are internal to the crate.
//!
//! ```compile_fail
//! use succinct_trie::BitVector;
//! ```

#![deny(unsafe_op_in_unsafe_fn)]

mod agent;
mod bits;
mod builder;
mod codec;
mod config;
mod error;
mod keyset;
mod packed;
mod trie;

pub use agent::Agent;
pub use builder::Builder;
pub use config::{Config, MAX_NUM_KEYS};
pub use error::{Result, TrieError};
pub use keyset::Keyset;
pub use trie::{Matches, TrieIndex};

#[cfg(test)]
mod proptests;
