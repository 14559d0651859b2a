//! Binary persisted format.
//!
//! All integers little-endian:
//!
//! ```text
//! magic      "STRI" (4B)
//! version    u32
//! num_keys   u64
//! flags      u32   bit0: key ids, bit1: path compression
//! sections   len: u64, payload: [u8; len]
//!   louds          bits
//!   terminals      bits
//!   labels         raw bytes
//!   links          bits
//!   tail           raw bytes
//!   tail_starts    packed
//!   tail_lens      packed
//!   ids            packed (only with bit0)
//!
//! bits   = num_bits: u64, words: [u64; ceil(num_bits / 64)]
//! packed = width: u8, len: u64, words: [u64; ceil(len * width / 64)]
//! ```
//!
//! Rank/select indexes are rebuilt on load. Loading validates the header,
//! every length, and the structural invariants the query code relies on, so
//! a blob that loads can be queried without panicking.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use memmap2::Mmap;

use crate::bits::BitVector;
use crate::builder::MAX_NUM_NODES;
use crate::config::{FLAG_KEY_IDS, FLAG_MASK, FLAG_PATH_COMPRESSION, MAX_NUM_KEYS};
use crate::error::{corrupt, Result};
use crate::packed::PackedVec;
use crate::trie::TrieIndex;

const MAGIC: [u8; 4] = *b"STRI";
const VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 8 + 4;
const SECTION_HEADER_LEN: usize = 8;

// ============================================================================
// Encoding
// ============================================================================

fn put_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}

/// Write a length-prefixed section whose payload is produced by `f`.
fn put_section(out: &mut Vec<u8>, f: impl FnOnce(&mut Vec<u8>)) {
    let at = out.len();
    put_u64(out, 0);
    f(out);
    let len = (out.len() - at - SECTION_HEADER_LEN) as u64;
    out[at..at + SECTION_HEADER_LEN].copy_from_slice(&len.to_le_bytes());
}

fn put_bits(out: &mut Vec<u8>, bv: &BitVector) {
    put_section(out, |out| {
        put_u64(out, bv.len() as u64);
        for w in bv.words() {
            put_u64(out, *w);
        }
    });
}

fn put_packed(out: &mut Vec<u8>, p: &PackedVec) {
    put_section(out, |out| {
        out.push(p.width());
        put_u64(out, p.len() as u64);
        for w in p.words() {
            put_u64(out, *w);
        }
    });
}

fn put_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    put_section(out, |out| out.extend_from_slice(bytes));
}

fn bits_size(bv: &BitVector) -> usize {
    SECTION_HEADER_LEN + 8 + bv.words().len() * 8
}

fn packed_size(p: &PackedVec) -> usize {
    SECTION_HEADER_LEN + 1 + 8 + p.words().len() * 8
}

// ============================================================================
// Decoding
// ============================================================================

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        let remaining = self.buf.len() - self.pos;
        if n > remaining {
            return Err(corrupt(format!(
                "{what} truncated: need {n} bytes, {remaining} left"
            )));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.take(1, what)?[0])
    }

    fn u32(&mut self, what: &str) -> Result<u32> {
        let mut b = [0u8; 4];
        b.copy_from_slice(self.take(4, what)?);
        Ok(u32::from_le_bytes(b))
    }

    fn u64(&mut self, what: &str) -> Result<u64> {
        let mut b = [0u8; 8];
        b.copy_from_slice(self.take(8, what)?);
        Ok(u64::from_le_bytes(b))
    }

    fn usize(&mut self, what: &str) -> Result<usize> {
        let v = self.u64(what)?;
        usize::try_from(v).map_err(|_| corrupt(format!("{what} out of range: {v}")))
    }

    fn words(&mut self, n: usize, what: &str) -> Result<Vec<u64>> {
        let len = n
            .checked_mul(8)
            .ok_or_else(|| corrupt(format!("{what} too large")))?;
        let raw = self.take(len, what)?;
        Ok(raw
            .chunks_exact(8)
            .map(|c| {
                let mut b = [0u8; 8];
                b.copy_from_slice(c);
                u64::from_le_bytes(b)
            })
            .collect())
    }

    /// Split off the next length-prefixed section.
    fn section(&mut self, what: &str) -> Result<Cursor<'a>> {
        let len = self.usize(what)?;
        Ok(Cursor::new(self.take(len, what)?))
    }

    fn finish(&self, what: &str) -> Result<()> {
        if self.pos != self.buf.len() {
            return Err(corrupt(format!(
                "{} trailing bytes after {what}",
                self.buf.len() - self.pos
            )));
        }
        Ok(())
    }
}

fn read_bits(c: &mut Cursor<'_>, what: &str) -> Result<BitVector> {
    let mut s = c.section(what)?;
    let num_bits = s.usize(what)?;
    let words = s.words(num_bits.div_ceil(64), what)?;
    s.finish(what)?;
    BitVector::from_words(words, num_bits).ok_or_else(|| corrupt(format!("{what}: bad padding")))
}

fn read_packed(c: &mut Cursor<'_>, what: &str) -> Result<PackedVec> {
    let mut s = c.section(what)?;
    let width = s.u8(what)?;
    if width > 64 {
        return Err(corrupt(format!("{what}: width {width} > 64")));
    }
    let len = s.usize(what)?;
    let num_words = len
        .checked_mul(width as usize)
        .ok_or_else(|| corrupt(format!("{what} too large")))?
        .div_ceil(64);
    let words = s.words(num_words, what)?;
    s.finish(what)?;
    PackedVec::from_raw(width, len, words).ok_or_else(|| corrupt(format!("{what}: bad size")))
}

fn read_bytes(c: &mut Cursor<'_>, what: &str) -> Result<Vec<u8>> {
    let s = c.section(what)?;
    Ok(s.buf.to_vec())
}

// ============================================================================
// Validation
// ============================================================================

/// LOUDS must describe a breadth-first tree: every child id is larger than
/// its parent id, and sibling labels strictly increase.
fn check_louds(louds: &BitVector, labels: &[u8]) -> Result<()> {
    let num_nodes = labels.len();
    if num_nodes == 0 || num_nodes > MAX_NUM_NODES {
        return Err(corrupt(format!("invalid node count {num_nodes}")));
    }
    if louds.len() != 2 * num_nodes + 1 || louds.num_ones() != num_nodes {
        return Err(corrupt(format!(
            "louds has {} bits / {} ones for {} nodes",
            louds.len(),
            louds.num_ones(),
            num_nodes
        )));
    }
    if !louds.get(0) || louds.get(1) {
        return Err(corrupt("louds missing super-root"));
    }

    let mut ones = 1usize;
    let mut zeros = 1usize;
    let mut prev_was_one = false;
    for pos in 2..louds.len() {
        if louds.get(pos) {
            let child = ones;
            let parent = zeros - 1;
            if child <= parent {
                return Err(corrupt(format!("louds: node {child} under node {parent}")));
            }
            if prev_was_one && labels[child - 1] >= labels[child] {
                return Err(corrupt(format!("louds: unsorted siblings at node {child}")));
            }
            ones += 1;
            prev_was_one = true;
        } else {
            zeros += 1;
            prev_was_one = false;
        }
    }
    Ok(())
}

/// Every linked node needs a non-empty byte range inside `tail`. Ranges may
/// overlap where labels share a suffix.
fn check_tail(
    links: &BitVector,
    tail: &[u8],
    starts: &PackedVec,
    lens: &PackedVec,
    path_compression: bool,
) -> Result<()> {
    if links.get(0) {
        return Err(corrupt("root carries a label"));
    }
    if !path_compression && links.num_ones() != 0 {
        return Err(corrupt("multi-byte labels without path compression"));
    }
    if starts.len() != links.num_ones() || lens.len() != links.num_ones() {
        return Err(corrupt(format!(
            "{} tail starts / {} tail lengths for {} links",
            starts.len(),
            lens.len(),
            links.num_ones()
        )));
    }
    for (i, (start, len)) in starts.iter().zip(lens.iter()).enumerate() {
        let in_bounds = start
            .checked_add(len)
            .is_some_and(|end| end <= tail.len() as u64);
        if len == 0 || !in_bounds {
            return Err(corrupt(format!(
                "tail range {i} ({start}+{len}) outside {} bytes",
                tail.len()
            )));
        }
    }
    Ok(())
}

fn check_ids(ids: &PackedVec, num_keys: usize) -> Result<()> {
    if ids.len() != num_keys {
        return Err(corrupt(format!("{} ids for {num_keys} keys", ids.len())));
    }
    let mut seen = vec![false; num_keys];
    for id in ids.iter() {
        let slot = usize::try_from(id)
            .ok()
            .and_then(|i| seen.get_mut(i))
            .ok_or_else(|| corrupt(format!("key id {id} out of range")))?;
        if *slot {
            return Err(corrupt(format!("duplicate key id {id}")));
        }
        *slot = true;
    }
    Ok(())
}

fn decode(data: &[u8]) -> Result<TrieIndex> {
    let mut c = Cursor::new(data);
    if c.take(MAGIC.len(), "header")? != &MAGIC[..] {
        return Err(corrupt("invalid magic"));
    }
    let version = c.u32("header")?;
    if version != VERSION {
        return Err(corrupt(format!("unsupported version {version}")));
    }
    let num_keys = c.usize("header")?;
    let flags = c.u32("header")?;
    if flags & !FLAG_MASK != 0 {
        return Err(corrupt(format!("unknown flags {flags:#x}")));
    }
    if num_keys > MAX_NUM_KEYS {
        return Err(corrupt(format!("{num_keys} keys exceed id space")));
    }
    let path_compression = flags & FLAG_PATH_COMPRESSION != 0;

    let louds = read_bits(&mut c, "louds")?;
    let terminals = read_bits(&mut c, "terminals")?;
    let labels = read_bytes(&mut c, "labels")?;
    let links = read_bits(&mut c, "links")?;
    let tail = read_bytes(&mut c, "tail")?;
    let tail_starts = read_packed(&mut c, "tail starts")?;
    let tail_lens = read_packed(&mut c, "tail lengths")?;
    let ids = if flags & FLAG_KEY_IDS != 0 {
        Some(read_packed(&mut c, "ids")?)
    } else {
        None
    };
    c.finish("ids")?;

    check_louds(&louds, &labels)?;
    let num_nodes = labels.len();
    if terminals.len() != num_nodes || terminals.num_ones() != num_keys {
        return Err(corrupt(format!(
            "terminals: {} bits / {} ones, expected {num_nodes} / {num_keys}",
            terminals.len(),
            terminals.num_ones()
        )));
    }
    if links.len() != num_nodes {
        return Err(corrupt(format!(
            "links: {} bits for {num_nodes} nodes",
            links.len()
        )));
    }
    check_tail(&links, &tail, &tail_starts, &tail_lens, path_compression)?;
    if let Some(ids) = &ids {
        check_ids(ids, num_keys)?;
    }

    Ok(TrieIndex::from_parts(
        louds,
        terminals,
        labels,
        links,
        tail,
        tail_starts,
        tail_lens,
        ids,
        path_compression,
    ))
}

// ============================================================================
// Public API
// ============================================================================

impl TrieIndex {
    /// Serialize into a fresh buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.io_size());
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&VERSION.to_le_bytes());
        put_u64(&mut out, self.num_keys() as u64);
        let mut flags = 0u32;
        if self.ids.is_some() {
            flags |= FLAG_KEY_IDS;
        }
        if self.path_compression {
            flags |= FLAG_PATH_COMPRESSION;
        }
        out.extend_from_slice(&flags.to_le_bytes());

        put_bits(&mut out, &self.louds);
        put_bits(&mut out, &self.terminals);
        put_bytes(&mut out, &self.labels);
        put_bits(&mut out, &self.links);
        put_bytes(&mut out, &self.tail);
        put_packed(&mut out, &self.tail_starts);
        put_packed(&mut out, &self.tail_lens);
        if let Some(ids) = &self.ids {
            put_packed(&mut out, &ids.by_terminal);
        }
        debug_assert_eq!(out.len(), self.io_size());
        out
    }

    /// Size in bytes of the serialized form.
    pub fn io_size(&self) -> usize {
        HEADER_LEN
            + bits_size(&self.louds)
            + bits_size(&self.terminals)
            + SECTION_HEADER_LEN
            + self.labels.len()
            + bits_size(&self.links)
            + SECTION_HEADER_LEN
            + self.tail.len()
            + packed_size(&self.tail_starts)
            + packed_size(&self.tail_lens)
            + self.ids.as_ref().map_or(0, |ids| packed_size(&ids.by_terminal))
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&self.to_bytes())?;
        Ok(())
    }

    /// Parse and validate a serialized index.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        match decode(data) {
            Ok(trie) => {
                tracing::debug!(
                    num_keys = trie.num_keys(),
                    num_nodes = trie.num_nodes(),
                    bytes = data.len(),
                    "trie loaded"
                );
                Ok(trie)
            }
            Err(e) => {
                tracing::warn!(error = %e, bytes = data.len(), "rejected serialized trie");
                Err(e)
            }
        }
    }

    /// Read a serialized index to the end of `reader`.
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes(&data)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_bytes(&std::fs::read(path)?)
    }

    /// Like [`load`](Self::load), but parses straight from a memory map
    /// instead of reading the file into a buffer first.
    pub fn load_mapped(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        // SAFETY: the map is only read while parsing, and everything is copied
        // into owned vectors before it is dropped. The file must not be
        // truncated concurrently.
        let map = unsafe { Mmap::map(&file)? };
        Self::from_bytes(&map)
    }
}
