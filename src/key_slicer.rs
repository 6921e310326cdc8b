//! Id-space partitioning over an ordered key alphabet
//!
//! The key space is a tree whose nodes are alphabet-symbol sequences ("key
//! paths"); each node stands for the filter `prefix*`. The slicer walks the
//! tree with an explicit work stack, descending into a node's children when
//! its count exceeds the size ceiling. Alphabets are shallow but wide
//! (base64url has a branching factor of 64), so the stack lives on the heap
//! rather than the call stack.

use crate::config::{KeyType, SlicerConfig};
use crate::error::{Result, SlicerError};
use crate::events::{SlicerEvent, SlicerObserver};
use crate::models::Slice;
use crate::probe::{CountProbe, ProbeQuery};
use crate::retry::{RetryPolicy, RetryingProbe};
use std::sync::Arc;
use tracing::debug;

/// Ordered symbol set for prefix partitioning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAlphabet {
    symbols: Vec<char>,
}

impl KeyAlphabet {
    /// The full alphabet for a key type
    pub fn for_type(key_type: KeyType) -> Self {
        let symbols = match key_type {
            KeyType::Hexadecimal => "0123456789abcdef".chars().collect(),
            KeyType::Base64url => ('a'..='z')
                .chain('A'..='Z')
                .chain('0'..='9')
                .chain(['-', '_'])
                .collect(),
        };
        KeyAlphabet { symbols }
    }

    /// The effective top-level symbols: an explicit `key_range` wins over the
    /// full alphabet
    pub fn top_level(key_type: KeyType, key_range: Option<&[char]>) -> Vec<char> {
        match key_range {
            Some(range) => range.to_vec(),
            None => KeyAlphabet::for_type(key_type).symbols,
        }
    }

    pub fn symbols(&self) -> &[char] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Cursor over a slice of the identifier space
///
/// Produces one bounded slice per leaf prefix; exhausted once the last
/// sibling of its top-level allotment has been visited.
pub struct KeySpaceSlicer {
    probe: RetryingProbe,
    observer: Arc<dyn SlicerObserver>,
    key_field: String,
    alphabet: KeyAlphabet,
    size: u64,
    starting_depth: usize,
    base_query: Option<String>,
    /// Pending key paths, popped LIFO; children are pushed in reverse
    /// alphabet order so siblings emerge in alphabet order
    stack: Vec<String>,
    exhausted: bool,
}

impl std::fmt::Debug for KeySpaceSlicer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySpaceSlicer")
            .field("key_field", &self.key_field)
            .field("alphabet", &self.alphabet)
            .field("size", &self.size)
            .field("starting_depth", &self.starting_depth)
            .field("base_query", &self.base_query)
            .field("stack", &self.stack)
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}

impl KeySpaceSlicer {
    /// Create a cursor over `top_level` symbols of the configured alphabet
    ///
    /// # Arguments
    /// * `probe` - count capability
    /// * `observer` - event sink
    /// * `config` - validated configuration; `key_field` must be set
    /// * `top_level` - this cursor's contiguous share of the alphabet or
    ///   `key_range`
    /// * `last_key` - checkpoint key expression from a prior run
    ///   (e.g. `events-#a6*`); the cursor resumes at the next sibling
    pub fn new(
        probe: Arc<dyn CountProbe>,
        observer: Arc<dyn SlicerObserver>,
        config: &SlicerConfig,
        top_level: Vec<char>,
        last_key: Option<&str>,
    ) -> Result<Self> {
        let key_field = config.key_field.clone().ok_or_else(|| {
            SlicerError::ConfigError(
                "id-space slicing requires the key field parameter of the documents to be set"
                    .to_string(),
            )
        })?;
        if top_level.is_empty() {
            return Err(SlicerError::ConfigError(
                "key slicer created with an empty top-level symbol set".to_string(),
            ));
        }

        let alphabet = KeyAlphabet::for_type(config.key_type);
        let stack = match last_key {
            Some(key) => {
                let path = parse_checkpoint_key(key, &key_field)?;
                resume_stack(&path, &top_level, &alphabet)?
            }
            None => top_level.iter().rev().map(char::to_string).collect(),
        };

        Ok(KeySpaceSlicer {
            probe: RetryingProbe::new(probe, RetryPolicy::new(config.max_retries)),
            observer,
            key_field,
            alphabet,
            size: config.size,
            starting_depth: config.starting_key_depth,
            base_query: config.query.clone(),
            stack,
            exhausted: false,
        })
    }

    /// The key expression for a path, e.g. `events-#a6*`
    fn key_expression(&self, path: &str) -> String {
        format!("{}#{}*", self.key_field, path)
    }

    fn descend(&mut self, path: &str) {
        for sym in self.alphabet.symbols().iter().rev() {
            self.stack.push(format!("{path}{sym}"));
        }
    }

    async fn count(&self, key: String) -> Result<u64> {
        let query = ProbeQuery::keyed(key, self.base_query.as_deref());
        self.probe.count(&query).await
    }

    /// Produce the next bounded slice, or `None` once the alphabet slice is
    /// exhausted
    pub async fn next_slice(&mut self) -> Result<Option<Slice>> {
        if self.exhausted {
            return Ok(None);
        }

        while let Some(path) = self.stack.pop() {
            if path.chars().count() < self.starting_depth {
                self.descend(&path);
                continue;
            }

            let key = self.key_expression(&path);
            let count = self.count(key.clone()).await?;

            if count > self.size {
                debug!(key = %key, count, size = self.size, "key prefix over ceiling, descending");
                self.observer.on_event(&SlicerEvent::Recursion);
                self.descend(&path);
                continue;
            }

            if count == 0 {
                // nothing to read under this prefix
                continue;
            }

            return Ok(Some(Slice::keyed(count, key)));
        }

        self.exhausted = true;
        Ok(None)
    }
}

/// Extract the key path from a checkpoint expression like `events-#a6*`
fn parse_checkpoint_key(key: &str, key_field: &str) -> Result<String> {
    let prefix = format!("{key_field}#");
    let path = key
        .strip_prefix(&prefix)
        .and_then(|rest| rest.strip_suffix('*'))
        .ok_or_else(|| {
            SlicerError::CheckpointError(format!(
                "checkpoint key {key:?} does not match \"{key_field}#<path>*\""
            ))
        })?;

    if path.is_empty() {
        return Err(SlicerError::CheckpointError(format!(
            "checkpoint key {key:?} has an empty key path"
        )));
    }
    Ok(path.to_string())
}

/// Rebuild the work stack so the cursor continues at the sibling after the
/// checkpointed path at every level
///
/// Shallower levels go deeper in the stack: the remaining siblings of the
/// deepest level are visited first, then the walk pops back up.
fn resume_stack(
    path: &str,
    top_level: &[char],
    alphabet: &KeyAlphabet,
) -> Result<Vec<String>> {
    let mut stack = Vec::new();
    let mut prefix = String::new();

    for (level, symbol) in path.chars().enumerate() {
        let siblings: &[char] = if level == 0 {
            top_level
        } else {
            alphabet.symbols()
        };
        let pos = siblings.iter().position(|&s| s == symbol).ok_or_else(|| {
            SlicerError::CheckpointError(format!(
                "checkpoint symbol {symbol:?} is not in the key alphabet"
            ))
        })?;

        for sibling in siblings[pos + 1..].iter().rev() {
            stack.push(format!("{prefix}{sibling}"));
        }
        prefix.push(symbol);
    }

    Ok(stack)
}
