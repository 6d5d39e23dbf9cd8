//! Side table for query state that cannot live in the serializable grid state.
//!
//! Each grid instance owns one [`FrameCacheEntry`] keyed by its instance id. The
//! entry holds the live LazyFrame, its schema and the memoized dropdown choices.
//! Re-initialising an instance replaces its entry wholesale.

use crate::columns::{infer_one_column_on_demand, is_text_like};
use crate::model::ColumnDef;
use crate::query::resolve_field_name;
use polars::prelude::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

pub struct FrameCacheEntry {
    pub lf: LazyFrame,
    pub schema: SchemaRef,
    pub descriptions: HashMap<String, String>,
    pub columns: Vec<ColumnDef>,
    /// Filtered row count from the last recount.
    pub total_rows: usize,
    pub max_unique: usize,
    /// Memoized choices per column; `None` means "too many / not eligible".
    value_options: HashMap<String, Option<Vec<String>>>,
    value_option_scans: usize,
}

impl FrameCacheEntry {
    pub fn new(
        lf: LazyFrame,
        schema: SchemaRef,
        descriptions: HashMap<String, String>,
        columns: Vec<ColumnDef>,
        max_unique: usize,
    ) -> Self {
        Self {
            lf,
            schema,
            descriptions,
            columns,
            total_rows: 0,
            max_unique,
            value_options: HashMap::new(),
            value_option_scans: 0,
        }
    }

    pub fn has_value_options(&self, field: &str) -> bool {
        self.value_options.contains_key(field)
    }

    /// Number of distinct-value queries executed so far.
    pub fn value_option_scans(&self) -> usize {
        self.value_option_scans
    }

    /// Dropdown choices for a column, computed on first request and memoized
    /// (including a `None` result). Unknown fields return None without caching.
    pub fn value_options(&mut self, field: &str, use_streaming: bool) -> PolarsResult<Option<Vec<String>>> {
        let Some(name) = resolve_field_name(field, &self.schema) else {
            return Ok(None);
        };
        if let Some(cached) = self.value_options.get(&name) {
            return Ok(cached.clone());
        }
        let eligible = self.schema.get(&name).is_some_and(is_text_like);
        let options = if eligible {
            let start = Instant::now();
            self.value_option_scans += 1;
            let options = infer_one_column_on_demand(
                &self.lf,
                &self.schema,
                &name,
                self.max_unique,
                use_streaming,
            )?;
            tracing::debug!(
                field = %name,
                values = options.as_ref().map_or(0, Vec::len),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "value options computed"
            );
            options
        } else {
            None
        };
        self.value_options.insert(name, options.clone());
        Ok(options)
    }

    /// Record choices computed elsewhere (the eager small-dataset path).
    pub fn remember_value_options(&mut self, field: &str, options: Option<Vec<String>>) {
        self.value_options.insert(field.to_string(), options);
    }

    /// Upgrade a column to `singleSelect` with `choices`. Returns false when the
    /// column is unknown or already carries these choices.
    pub fn apply_choices(&mut self, field: &str, choices: Vec<String>) -> bool {
        match self.columns.iter_mut().find(|c| c.field == field) {
            Some(def) if def.value_options.as_ref() != Some(&choices) => {
                def.set_choices(choices);
                true
            }
            _ => false,
        }
    }

    /// Names of columns that could get a dropdown.
    pub fn text_like_columns(&self) -> Vec<String> {
        self.schema
            .iter()
            .filter(|(_, dtype)| is_text_like(dtype))
            .map(|(name, _)| name.to_string())
            .collect()
    }
}

pub type SharedEntry = Arc<Mutex<FrameCacheEntry>>;

/// Lock an entry, recovering the data if a previous holder panicked.
pub fn lock_entry(entry: &SharedEntry) -> MutexGuard<'_, FrameCacheEntry> {
    entry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Registry of cache entries keyed by grid instance id. Cloning shares the registry.
#[derive(Clone, Default)]
pub struct FrameRegistry {
    entries: Arc<Mutex<HashMap<String, SharedEntry>>>,
}

impl FrameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> MutexGuard<'_, HashMap<String, SharedEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store a fresh entry for `key`, discarding any previous one.
    pub fn insert(&self, key: &str, entry: FrameCacheEntry) -> SharedEntry {
        let shared = Arc::new(Mutex::new(entry));
        if self.map().insert(key.to_string(), shared.clone()).is_some() {
            tracing::debug!(instance = key, "replaced cached frame");
        }
        shared
    }

    pub fn get(&self, key: &str) -> Option<SharedEntry> {
        self.map().get(key).cloned()
    }

    pub fn remove(&self, key: &str) -> bool {
        self.map().remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
