//! Path interning.
//!
//! A path is an ordered sequence of link IDs that visits no link twice.
//! Paths are used as keys everywhere flow is disaggregated — per-link
//! cumulative counts, path-flow tables, travel-time tables — so equal
//! sequences must share identity.  `PathSet` interns each distinct sequence
//! once and hands out a small integer [`PathId`]; per-path dictionaries then
//! become arrays or `FxHashMap`s keyed by the handle.

use rustc_hash::FxHashMap;

use crate::{LinkId, PathId};

/// Interner mapping link sequences ↔ [`PathId`] handles.
///
/// Handles are dense and issued in first-interned order, so `Vec`s indexed by
/// `PathId` stay compact and iteration by ascending handle is deterministic.
#[derive(Default)]
pub struct PathSet {
    seqs:   Vec<Vec<LinkId>>,
    lookup: FxHashMap<Vec<LinkId>, PathId>,
}

impl PathSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `links`, returning the existing handle if the sequence is known.
    pub fn intern(&mut self, links: &[LinkId]) -> PathId {
        if let Some(&id) = self.lookup.get(links) {
            return id;
        }
        let id = PathId(self.seqs.len() as u32);
        self.seqs.push(links.to_vec());
        self.lookup.insert(links.to_vec(), id);
        id
    }

    /// The link sequence behind `path`.
    #[inline]
    pub fn links(&self, path: PathId) -> &[LinkId] {
        &self.seqs[path.index()]
    }

    /// Does `path` traverse `link`?
    ///
    /// Paths are short (the corridor's longest is under a dozen links), so a
    /// linear scan beats any index structure here.
    #[inline]
    pub fn contains(&self, path: PathId, link: LinkId) -> bool {
        self.seqs[path.index()].contains(&link)
    }

    /// First link of `path` — where trips on this path are injected.
    #[inline]
    pub fn first_link(&self, path: PathId) -> LinkId {
        self.seqs[path.index()][0]
    }

    /// Number of interned paths.  Valid handles are `0..len`.
    #[inline]
    pub fn len(&self) -> usize {
        self.seqs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.seqs.is_empty()
    }

    /// Iterate handles in ascending (deterministic) order.
    pub fn ids(&self) -> impl Iterator<Item = PathId> + '_ {
        (0..self.seqs.len()).map(|i| PathId(i as u32))
    }

    /// Drop all interned paths.  Handles issued earlier become invalid.
    pub fn clear(&mut self) {
        self.seqs.clear();
        self.lookup.clear();
    }
}
