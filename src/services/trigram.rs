//! In-memory trigram posting index.
//!
//! Each trigram maps to a bitmap of the file IDs containing it. A
//! [`TrigramQuery`] is evaluated by intersecting (AND) and unioning (OR)
//! those bitmaps.

use crate::error::{IndexError, IndexResult};
use crate::services::query::TrigramQuery;
use crate::types::{FileId, Trigram};
use ahash::AHashMap;
use roaring::RoaringBitmap;

/// Trigram posting lists backed by `RoaringBitmap`s.
#[derive(Default)]
pub struct TrigramIndex {
    /// Trigram -> FileIds containing this trigram
    index: AHashMap<Trigram, RoaringBitmap>,
    /// Every indexed file, the answer to `TrigramQuery::All`
    files: RoaringBitmap,
}

impl TrigramIndex {
    /// Creates an empty trigram index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file's content to the index.
    pub fn add_file(&mut self, file_id: FileId, content: &[u8]) {
        self.files.insert(file_id.as_u32());
        for trigram in Trigram::from_bytes(content) {
            self.index
                .entry(trigram)
                .or_default()
                .insert(file_id.as_u32());
        }
    }

    /// Adds a file whose distinct trigrams were already extracted.
    pub fn add_trigrams(&mut self, file_id: FileId, trigrams: impl IntoIterator<Item = Trigram>) {
        self.files.insert(file_id.as_u32());
        for trigram in trigrams {
            self.index
                .entry(trigram)
                .or_default()
                .insert(file_id.as_u32());
        }
    }

    /// Removes a set of files in one pass over the posting lists.
    pub fn remove_files(&mut self, stale: &RoaringBitmap) {
        if stale.is_empty() {
            return;
        }
        self.files -= stale;
        for bitmap in self.index.values_mut() {
            *bitmap -= stale;
        }
        self.index.retain(|_, bitmap| !bitmap.is_empty());
    }

    /// Evaluates a posting query. Results iterate in ascending file-id order.
    #[must_use]
    pub fn posting_query(&self, query: &TrigramQuery) -> RoaringBitmap {
        match query {
            TrigramQuery::All => self.files.clone(),
            TrigramQuery::None => RoaringBitmap::new(),
            TrigramQuery::Trigram(t) => self.index.get(t).cloned().unwrap_or_default(),
            TrigramQuery::And(subs) => {
                let mut iter = subs.iter();
                let Some(first) = iter.next() else {
                    return self.files.clone();
                };
                let mut result = self.posting_query(first);
                for sub in iter {
                    if result.is_empty() {
                        break;
                    }
                    result &= self.posting_query(sub);
                }
                result
            }
            TrigramQuery::Or(subs) => {
                let mut result = RoaringBitmap::new();
                for sub in subs {
                    result |= self.posting_query(sub);
                }
                result
            }
        }
    }

    /// Number of indexed files.
    #[must_use]
    pub fn file_count(&self) -> u64 {
        self.files.len()
    }

    /// Returns the number of unique trigrams indexed.
    #[must_use]
    pub fn trigram_count(&self) -> usize {
        self.index.len()
    }

    /// Returns total file references across all trigrams.
    #[must_use]
    pub fn total_refs(&self) -> u64 {
        self.index.values().map(RoaringBitmap::len).sum()
    }

    /// Serializes a bitmap to bytes for database storage.
    ///
    /// # Panics
    ///
    /// Never in practice: serializing into a `Vec<u8>` cannot fail.
    #[must_use]
    pub fn bitmap_to_bytes(bitmap: &RoaringBitmap) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(bitmap.serialized_size());
        bitmap
            .serialize_into(&mut bytes)
            .expect("RoaringBitmap serialization to Vec<u8> is infallible");
        bytes
    }

    /// Deserializes a bitmap from bytes.
    #[must_use]
    pub fn bitmap_from_bytes(bytes: &[u8]) -> Option<RoaringBitmap> {
        RoaringBitmap::deserialize_from(bytes).ok()
    }

    /// Rebuilds an index from persisted `(trigram, bitmap)` rows and file ids.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::Corruption` if a row holds a malformed trigram or bitmap.
    pub fn from_db_entries(
        entries: Vec<(Vec<u8>, Vec<u8>)>,
        file_ids: impl IntoIterator<Item = FileId>,
    ) -> IndexResult<Self> {
        let mut index = AHashMap::with_capacity(entries.len());
        for (key, blob) in entries {
            let trigram = Trigram::from_slice(&key).ok_or_else(|| {
                IndexError::Corruption(format!("trigram key of {} bytes", key.len()))
            })?;
            let bitmap = Self::bitmap_from_bytes(&blob).ok_or_else(|| {
                IndexError::Corruption(format!("undecodable posting list for {trigram}"))
            })?;
            index.insert(trigram, bitmap);
        }
        let files = file_ids.into_iter().map(FileId::as_u32).collect();
        Ok(Self { index, files })
    }

    /// Serializes every posting list as `(trigram, bitmap)` rows.
    #[must_use]
    pub fn to_db_entries(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.index
            .iter()
            .map(|(t, bitmap)| (t.as_bytes().to_vec(), Self::bitmap_to_bytes(bitmap)))
            .collect()
    }
}

impl std::fmt::Debug for TrigramIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrigramIndex")
            .field("file_count", &self.file_count())
            .field("trigram_count", &self.trigram_count())
            .field("total_refs", &self.total_refs())
            .finish()
    }
}
