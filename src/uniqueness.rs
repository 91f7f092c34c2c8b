//! Duplicate detection for free-text activity responses within a batch.
//!
//! Two responses collide when their trimmed, case-folded texts are equal and
//! at least `min_len` characters long. Shorter texts never collide.

use std::collections::{BTreeSet, HashMap};

use crate::models::ResponseKey;

/// Default minimum length, in characters after trimming.
pub const MIN_UNIQUE_RESPONSE_LEN: usize = 20;

/// Normalized comparison form, or `None` when the text is exempt.
pub fn normalize(text: &str, min_len: usize) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.chars().count() < min_len {
        return None;
    }
    Some(trimmed.to_lowercase())
}

/// Every key whose response collides with at least one other key.
pub fn validate_uniqueness(batch: &HashMap<ResponseKey, String>, min_len: usize) -> BTreeSet<ResponseKey> {
    let mut by_text: HashMap<String, Vec<ResponseKey>> = HashMap::new();
    for (key, text) in batch {
        if let Some(norm) = normalize(text, min_len) {
            by_text.entry(norm).or_default().push(*key);
        }
    }
    by_text
        .into_values()
        .filter(|keys| keys.len() > 1)
        .flatten()
        .collect()
}

/// Live view over a batch being edited.
///
/// Keeps the current text per key, an index from normalized text to the keys
/// using it, and the set of keys currently in collision.
#[derive(Debug, Clone)]
pub struct ResponseRegistry {
    min_len: usize,
    values: HashMap<ResponseKey, String>,
    index: HashMap<String, BTreeSet<ResponseKey>>,
    duplicates: BTreeSet<ResponseKey>,
}

impl Default for ResponseRegistry {
    fn default() -> Self {
        Self::new(MIN_UNIQUE_RESPONSE_LEN)
    }
}

impl ResponseRegistry {
    pub fn new(min_len: usize) -> Self {
        Self {
            min_len,
            values: HashMap::new(),
            index: HashMap::new(),
            duplicates: BTreeSet::new(),
        }
    }

    pub fn from_batch(batch: impl IntoIterator<Item = (ResponseKey, String)>, min_len: usize) -> Self {
        let mut registry = Self::new(min_len);
        for (key, text) in batch {
            registry.set_response(key, text);
        }
        registry
    }

    /// Records an edit and returns the keys now in collision with `key`'s text.
    pub fn set_response(&mut self, key: ResponseKey, text: impl Into<String>) -> BTreeSet<ResponseKey> {
        let text = text.into();
        self.detach(&key);

        let norm = normalize(&text, self.min_len);
        self.values.insert(key, text);

        let Some(norm) = norm else {
            return BTreeSet::new();
        };
        let keys = self.index.entry(norm).or_default();
        keys.insert(key);
        if keys.len() > 1 {
            self.duplicates.extend(keys.iter().copied());
            keys.iter().copied().filter(|k| *k != key).collect()
        } else {
            BTreeSet::new()
        }
    }

    pub fn remove(&mut self, key: &ResponseKey) {
        self.detach(key);
        self.values.remove(key);
    }

    fn detach(&mut self, key: &ResponseKey) {
        let Some(previous) = self.values.get(key) else {
            return;
        };
        let Some(norm) = normalize(previous, self.min_len) else {
            return;
        };
        self.duplicates.remove(key);
        if let Some(keys) = self.index.get_mut(&norm) {
            keys.remove(key);
            match keys.len() {
                0 => {
                    self.index.remove(&norm);
                }
                1 => {
                    // The remaining key no longer collides with anything
                    if let Some(last) = keys.iter().next() {
                        self.duplicates.remove(last);
                    }
                }
                _ => {}
            }
        }
    }

    pub fn get(&self, key: &ResponseKey) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn duplicates(&self) -> &BTreeSet<ResponseKey> {
        &self.duplicates
    }

    pub fn is_clean(&self) -> bool {
        self.duplicates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
