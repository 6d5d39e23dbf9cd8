//! Per-instance grid session: accumulated filter and sort, the pagination
//! window and the serializable state snapshot handed to the renderer.
//!
//! Every expensive operation is split in two phases. The first phase flips
//! `loading` on and returns a follow-up event; the caller publishes the state
//! and dispatches the follow-up, which runs the query and clears `loading`.
//! The live LazyFrame stays in the [`FrameRegistry`] under the session's id.

use crate::cache::{lock_entry, FrameCacheEntry, FrameRegistry, SharedEntry};
use crate::codegen::{generate_code, generate_sql};
use crate::columns::{infer_from_sample, infer_from_schema};
use crate::config::AppConfig;
use crate::error::{user_message_from_polars, PresetError};
use crate::merge::merge_filter_model;
use crate::model::{ColumnDef, FilterModel, PaginationModel, Preset, SortModel};
use crate::query::{
    apply_filter_model, apply_sort_model, collect_page, count_rows, resolve_field_name, JsonRow,
    ROW_ID_FIELD,
};
use lazygrid_cli::Args;
use polars::prelude::*;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Instant;

/// Tunables for one session.
#[derive(Debug, Clone)]
pub struct GridOptions {
    pub chunk_size: usize,
    pub value_options_max_unique: usize,
    pub eager_row_limit: usize,
    pub show_id_field: bool,
    pub table_name: String,
    pub polars_streaming: bool,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl GridOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            chunk_size: config.grid.chunk_size,
            value_options_max_unique: config.grid.value_options_max_unique,
            eager_row_limit: config.grid.eager_row_limit,
            show_id_field: config.grid.show_id_field,
            table_name: config.grid.table_name.clone(),
            polars_streaming: config.performance.polars_streaming,
        }
    }

    /// CLI args take precedence over config.
    pub fn from_args_and_config(args: &Args, config: &AppConfig) -> Self {
        let base = Self::from_config(config);
        Self {
            chunk_size: args.chunk_size.unwrap_or(base.chunk_size),
            value_options_max_unique: args
                .value_options_max_unique
                .unwrap_or(base.value_options_max_unique),
            eager_row_limit: args.eager_row_limit.unwrap_or(base.eager_row_limit),
            show_id_field: args.show_id_field || base.show_id_field,
            table_name: args.table_name.clone().unwrap_or(base.table_name),
            polars_streaming: args.polars_streaming.unwrap_or(base.polars_streaming),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_eager_row_limit(mut self, eager_row_limit: usize) -> Self {
        self.eager_row_limit = eager_row_limit;
        self
    }
}

/// Serializable snapshot published to the renderer after every phase.
#[derive(Debug, Clone, Serialize)]
pub struct GridState {
    pub instance_id: String,
    pub rows: Vec<JsonRow>,
    pub columns: Vec<ColumnDef>,
    pub row_count: usize,
    pub loading: bool,
    pub ready: bool,
    pub stats: String,
    pub selected_info: String,
    /// What the widget displays; not necessarily what is applied.
    pub filter_model: FilterModel,
    pub sort_model: SortModel,
    pub active_filter_fields: Vec<String>,
    pub pagination: PaginationModel,
    pub generated_code: String,
    pub generated_sql: String,
    pub query_plan: String,
    pub filter_preset_json: String,
    pub filter_debug: String,
    pub error: Option<String>,
}

impl GridState {
    fn new(instance_id: &str, chunk_size: usize) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            rows: Vec::new(),
            columns: Vec::new(),
            row_count: 0,
            loading: false,
            ready: false,
            stats: String::new(),
            selected_info: String::new(),
            filter_model: FilterModel::default(),
            sort_model: SortModel::new(),
            active_filter_fields: Vec::new(),
            pagination: PaginationModel::first(chunk_size),
            generated_code: String::new(),
            generated_sql: String::new(),
            query_plan: String::new(),
            filter_preset_json: String::new(),
            filter_debug: "No active filters or sorts.".to_string(),
            error: None,
        }
    }
}

pub enum GridEvent {
    Initialize(LazyFrame, HashMap<String, String>),
    DoInitialize(LazyFrame, HashMap<String, String>), // runs the queries after the loading state is published
    Filter(FilterModel),
    DoFilter(FilterModel),
    Sort(SortModel),
    DoSort(SortModel),
    ScrollEnd,
    DoScrollEnd,
    ClearFilters,
    DoClearFilters,
    UploadPreset(String),
    DoUploadPreset(Preset),
    RowClick(JsonRow),
    ValueOptions(String),
}

pub struct GridSession {
    id: String,
    registry: FrameRegistry,
    options: GridOptions,
    accumulated_filter: FilterModel,
    sort_model: SortModel,
    state: GridState,
}

impl GridSession {
    pub fn new(id: impl Into<String>, registry: FrameRegistry, options: GridOptions) -> Self {
        let id = id.into();
        let state = GridState::new(&id, options.chunk_size);
        Self {
            id,
            registry,
            options,
            accumulated_filter: FilterModel::default(),
            sort_model: SortModel::new(),
            state,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> &GridState {
        &self.state
    }

    pub fn options(&self) -> &GridOptions {
        &self.options
    }

    /// Server-side filter actually applied to queries.
    pub fn accumulated_filter(&self) -> &FilterModel {
        &self.accumulated_filter
    }

    pub fn sort_model(&self) -> &SortModel {
        &self.sort_model
    }

    fn entry(&self) -> Option<SharedEntry> {
        self.registry.get(&self.id)
    }

    /// Drop this instance's cached frame.
    pub fn close(&self) -> bool {
        self.registry.remove(&self.id)
    }

    /// Handle one event. Returns the follow-up event for two-phase operations;
    /// the caller should publish [`GridSession::state`] before dispatching it.
    pub fn event(&mut self, event: &GridEvent) -> Option<GridEvent> {
        match event {
            GridEvent::Initialize(lf, descriptions) => {
                self.state.loading = true;
                self.state.ready = false;
                self.state.error = None;
                self.state.selected_info = "Preparing data...".to_string();
                Some(GridEvent::DoInitialize(lf.clone(), descriptions.clone()))
            }
            GridEvent::DoInitialize(lf, descriptions) => {
                let result = self.do_initialize(lf.clone(), descriptions.clone());
                self.finish(result);
                None
            }
            GridEvent::Filter(model) => {
                self.begin("Filtering...");
                self.state.filter_model = model.clone();
                Some(GridEvent::DoFilter(model.clone()))
            }
            GridEvent::DoFilter(model) => {
                let result = self.do_filter(model);
                self.finish(result);
                None
            }
            GridEvent::Sort(sort) => {
                self.begin("Sorting...");
                Some(GridEvent::DoSort(sort.clone()))
            }
            GridEvent::DoSort(sort) => {
                let result = self.do_sort(sort);
                self.finish(result);
                None
            }
            GridEvent::ScrollEnd => {
                if self.state.loading {
                    tracing::debug!(instance = %self.id, "scroll ignored: load in flight");
                    return None;
                }
                let next_offset = (self.state.pagination.page + 1) * self.state.pagination.page_size;
                if next_offset >= self.state.row_count {
                    tracing::debug!(instance = %self.id, next_offset, "scroll ignored: end of data");
                    return None;
                }
                self.begin(&format!("Loading rows {}...", next_offset));
                Some(GridEvent::DoScrollEnd)
            }
            GridEvent::DoScrollEnd => {
                self.state.pagination.page += 1;
                let result = self.refresh_page(true, false);
                self.finish(result);
                None
            }
            GridEvent::ClearFilters => {
                self.begin("Clearing filters...");
                Some(GridEvent::DoClearFilters)
            }
            GridEvent::DoClearFilters => {
                let result = self.do_clear_filters();
                self.finish(result);
                None
            }
            GridEvent::UploadPreset(text) => match Preset::from_json(text) {
                Ok(preset) => {
                    self.begin("Applying preset...");
                    Some(GridEvent::DoUploadPreset(preset))
                }
                Err(e) => {
                    self.preset_failed(&e);
                    None
                }
            },
            GridEvent::DoUploadPreset(preset) => {
                let result = self.do_apply_preset(preset);
                self.finish(result);
                None
            }
            GridEvent::RowClick(row) => {
                self.handle_row_click(row);
                None
            }
            GridEvent::ValueOptions(field) => {
                self.request_value_options(field);
                None
            }
        }
    }

    /// Run an event and its follow-ups, calling `observer` with the state after each phase.
    pub fn run_event<F>(&mut self, event: GridEvent, mut observer: F)
    where
        F: FnMut(&GridState),
    {
        let mut next = Some(event);
        while let Some(event) = next {
            next = self.event(&event);
            observer(&self.state);
        }
    }

    pub fn initialize(&mut self, lf: LazyFrame, descriptions: HashMap<String, String>) {
        self.run_event(GridEvent::Initialize(lf, descriptions), |_| {});
    }

    pub fn handle_filter_change(&mut self, model: FilterModel) {
        self.run_event(GridEvent::Filter(model), |_| {});
    }

    pub fn handle_sort_change(&mut self, sort: SortModel) {
        self.run_event(GridEvent::Sort(sort), |_| {});
    }

    pub fn handle_scroll_near_end(&mut self) {
        self.run_event(GridEvent::ScrollEnd, |_| {});
    }

    pub fn clear_filters(&mut self) {
        self.run_event(GridEvent::ClearFilters, |_| {});
    }

    pub fn upload_preset(&mut self, text: &str) {
        self.run_event(GridEvent::UploadPreset(text.to_string()), |_| {});
    }

    /// Current filter and sort as preset JSON, bookkeeping keys stripped.
    pub fn download_preset(&self) -> String {
        self.current_preset().to_json_pretty()
    }

    fn current_preset(&self) -> Preset {
        Preset {
            filter_model: self.accumulated_filter.clone(),
            sort_model: self.sort_model.clone(),
        }
    }

    fn begin(&mut self, label: &str) {
        self.state.loading = true;
        self.state.error = None;
        self.state.stats = label.to_string();
    }

    /// Clear `loading` and surface any error.
    fn finish(&mut self, result: PolarsResult<()>) {
        self.state.loading = false;
        if let Err(e) = result {
            let msg = user_message_from_polars(&e);
            tracing::warn!(instance = %self.id, error = %e, "grid query failed");
            self.state.stats = format!("Error: {}", msg);
            self.state.error = Some(msg);
        }
    }

    fn preset_failed(&mut self, err: &PresetError) {
        let msg = err.to_string();
        tracing::warn!(instance = %self.id, error = %msg, "preset rejected");
        self.state.loading = false;
        self.state.selected_info = format!("Could not apply preset: {}", msg);
        self.state.error = Some(msg);
    }

    fn require_entry(&self) -> PolarsResult<SharedEntry> {
        self.entry()
            .ok_or_else(|| PolarsError::ComputeError("grid has not been initialized".into()))
    }

    fn do_initialize(
        &mut self,
        mut lf: LazyFrame,
        descriptions: HashMap<String, String>,
    ) -> PolarsResult<()> {
        let start = Instant::now();
        let schema = lf.collect_schema()?;
        let columns = infer_from_schema(
            &schema,
            &descriptions,
            Some(ROW_ID_FIELD),
            self.options.show_id_field,
        );
        let entry = FrameCacheEntry::new(
            lf,
            schema,
            descriptions,
            columns.clone(),
            self.options.value_options_max_unique,
        );
        let shared = self.registry.insert(&self.id, entry);

        self.accumulated_filter = FilterModel::default();
        self.sort_model = SortModel::new();
        self.state.filter_model = FilterModel::default();
        self.state.sort_model = SortModel::new();
        self.state.columns = columns;
        self.state.rows.clear();
        self.state.pagination = PaginationModel::first(self.options.chunk_size);

        self.refresh_page(false, true)?;

        if self.state.row_count <= self.options.eager_row_limit {
            self.eager_value_options(&shared);
        }

        self.regenerate();
        self.state.ready = true;
        self.state.selected_info = format!(
            "Ready: {} rows. Scroll down to load more.",
            with_thousands(self.state.row_count)
        );
        tracing::info!(
            instance = %self.id,
            rows = self.state.row_count,
            columns = self.state.columns.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "grid initialized"
        );
        Ok(())
    }

    /// Small-dataset path: choices for every text-like column up front.
    fn eager_value_options(&mut self, shared: &SharedEntry) {
        let start = Instant::now();
        let mut entry = lock_entry(shared);
        let inferred = match infer_from_sample(
            &entry.lf,
            &entry.schema,
            &entry.descriptions,
            entry.max_unique,
            self.options.polars_streaming,
        ) {
            Ok(defs) => defs,
            Err(e) => {
                tracing::warn!(instance = %self.id, error = %e, "eager value options failed");
                return;
            }
        };
        let text_like = entry.text_like_columns();
        for def in inferred {
            if !text_like.contains(&def.field) {
                continue;
            }
            let choices = def.value_options.filter(|c| !c.is_empty());
            entry.remember_value_options(&def.field, choices.clone());
            if let Some(choices) = choices {
                entry.apply_choices(&def.field, choices);
            }
        }
        self.state.columns = entry.columns.clone();
        tracing::debug!(
            instance = %self.id,
            columns = text_like.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "eager value options computed"
        );
    }

    /// Compute (or reuse) choices for the fields of `model` and push upgraded
    /// column definitions to the state.
    fn ensure_value_options(&mut self, model: &FilterModel) -> PolarsResult<()> {
        let shared = self.require_entry()?;
        let mut entry = lock_entry(&shared);
        let mut changed = false;
        for item in &model.items {
            let Some(name) = resolve_field_name(&item.field, &entry.schema) else {
                continue;
            };
            if entry.has_value_options(&name) {
                continue;
            }
            match entry.value_options(&name, self.options.polars_streaming) {
                Ok(Some(choices)) => changed |= entry.apply_choices(&name, choices),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(field = %name, error = %e, "value options query failed")
                }
            }
        }
        if changed {
            self.state.columns = entry.columns.clone();
        }
        Ok(())
    }

    fn do_filter(&mut self, model: &FilterModel) -> PolarsResult<()> {
        self.ensure_value_options(model)?;
        self.accumulated_filter = merge_filter_model(&self.accumulated_filter, model);
        self.state.pagination = PaginationModel::first(self.options.chunk_size);
        self.refresh_page(false, true)?;
        self.regenerate();
        Ok(())
    }

    fn do_sort(&mut self, sort: &SortModel) -> PolarsResult<()> {
        self.require_entry()?;
        self.sort_model = sort.clone();
        self.state.sort_model = sort.clone();
        self.state.pagination = PaginationModel::first(self.options.chunk_size);
        self.refresh_page(false, true)?;
        self.regenerate();
        Ok(())
    }

    fn do_clear_filters(&mut self) -> PolarsResult<()> {
        self.require_entry()?;
        self.accumulated_filter = FilterModel::default();
        self.state.filter_model = FilterModel::default();
        self.state.pagination = PaginationModel::first(self.options.chunk_size);
        self.refresh_page(false, true)?;
        self.regenerate();
        Ok(())
    }

    fn do_apply_preset(&mut self, preset: &Preset) -> PolarsResult<()> {
        self.ensure_value_options(&preset.filter_model)?;
        self.accumulated_filter = preset.filter_model.clone();
        self.sort_model = preset.sort_model.clone();

        // The widget shows one criterion at a time: mirror the last one.
        let mut ui_filter = FilterModel::default();
        if let Some(last) = preset.filter_model.items.last() {
            ui_filter.items.push(last.clone());
            ui_filter.logic_operator = preset.filter_model.logic_operator;
        }
        self.state.filter_model = ui_filter;
        self.state.sort_model = preset.sort_model.clone();
        self.state.pagination = PaginationModel::first(self.options.chunk_size);

        self.refresh_page(false, true)?;
        self.regenerate();
        self.state.selected_info = format!(
            "Preset applied: {} filter(s), {} sort(s). {} rows match.",
            preset.filter_model.items.len(),
            preset.sort_model.len(),
            with_thousands(self.state.row_count)
        );
        Ok(())
    }

    /// Filter, optionally recount, sort, slice the current page and store it.
    pub fn refresh_page(&mut self, append: bool, refresh_row_count: bool) -> PolarsResult<()> {
        let shared = self.require_entry()?;
        let mut entry = lock_entry(&shared);
        let start = Instant::now();
        let schema = entry.schema.clone();
        let streaming = self.options.polars_streaming;

        let mut lf = entry.lf.clone();
        if !self.accumulated_filter.is_empty() {
            lf = apply_filter_model(lf, &self.accumulated_filter, &schema);
        }
        if refresh_row_count {
            let count_start = Instant::now();
            entry.total_rows = count_rows(&lf, streaming)?;
            self.state.row_count = entry.total_rows;
            tracing::debug!(
                instance = %self.id,
                rows = entry.total_rows,
                elapsed_ms = count_start.elapsed().as_millis() as u64,
                "row count"
            );
        }
        if !self.sort_model.is_empty() {
            lf = apply_sort_model(lf, &self.sort_model, &schema);
        }

        let offset = self.state.pagination.offset();
        let page_size = self.state.pagination.page_size;
        let rows = collect_page(lf, &schema, offset, page_size, streaming)?;
        let fetched = rows.len();
        if append {
            self.state.rows.extend(rows);
        } else {
            self.state.rows = rows;
        }

        let elapsed_ms = start.elapsed().as_millis();
        let mode = if append { "append" } else { "replace" };
        self.state.stats = format!(
            "offset={}  +{} rows  loaded={} / {}  {}ms  ({})",
            with_thousands(offset),
            fetched,
            with_thousands(self.state.rows.len()),
            with_thousands(self.state.row_count),
            elapsed_ms,
            mode
        );
        tracing::debug!(
            instance = %self.id,
            offset,
            fetched,
            loaded = self.state.rows.len(),
            elapsed_ms = elapsed_ms as u64,
            mode,
            "page refreshed"
        );
        Ok(())
    }

    /// Regenerate code, SQL, plan, preset JSON and the debug summary.
    fn regenerate(&mut self) {
        let Some(shared) = self.entry() else {
            return;
        };
        let entry = lock_entry(&shared);
        let schema = entry.schema.clone();
        self.state.generated_code = generate_code(&self.accumulated_filter, &self.sort_model, &schema);
        self.state.generated_sql = generate_sql(
            &self.accumulated_filter,
            &self.sort_model,
            &schema,
            &self.options.table_name,
        );

        let mut lf = entry.lf.clone();
        drop(entry);
        if !self.accumulated_filter.is_empty() {
            lf = apply_filter_model(lf, &self.accumulated_filter, &schema);
        }
        if !self.sort_model.is_empty() {
            lf = apply_sort_model(lf, &self.sort_model, &schema);
        }
        self.state.query_plan = lf
            .explain(true)
            .unwrap_or_else(|e| format!("Could not explain query: {}", user_message_from_polars(&e)));

        let preset = self.current_preset();
        self.state.filter_preset_json = if preset.has_content() {
            preset.to_json_pretty()
        } else {
            String::new()
        };
        self.state.active_filter_fields = self
            .accumulated_filter
            .items
            .iter()
            .map(|item| item.field.clone())
            .collect();
        self.state.filter_debug = filter_debug(&self.accumulated_filter, &self.sort_model);
    }

    /// Describe a clicked row in `selected_info`, one `field: value` line per
    /// column with its description appended.
    pub fn handle_row_click(&mut self, row: &JsonRow) {
        let mut lines = Vec::new();
        for def in &self.state.columns {
            if def.field == ROW_ID_FIELD {
                continue;
            }
            let Some(value) = row.get(&def.field) else {
                continue;
            };
            let mut line = format!("{}: {}", def.field, display_value(value));
            if let Some(desc) = &def.description {
                line.push_str(&format!("  ({})", desc));
            }
            lines.push(line);
        }
        self.state.selected_info = lines.join("\n");
    }

    /// Choices for one field, computing them on first request. Upgrades the
    /// column to `singleSelect` when choices exist.
    pub fn request_value_options(&mut self, field: &str) -> Option<Vec<String>> {
        let shared = self.entry()?;
        let mut entry = lock_entry(&shared);
        let name = resolve_field_name(field, &entry.schema)?;
        match entry.value_options(&name, self.options.polars_streaming) {
            Ok(Some(choices)) => {
                if entry.apply_choices(&name, choices.clone()) {
                    self.state.columns = entry.columns.clone();
                }
                Some(choices)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(field = %name, error = %e, "value options query failed");
                None
            }
        }
    }
}

/// Multi-line summary of the applied filters and sorts.
pub fn filter_debug(filter: &FilterModel, sort: &SortModel) -> String {
    let mut lines = Vec::new();
    if filter.items.is_empty() {
        lines.push("FILTERS: none".to_string());
    } else {
        lines.push(format!(
            "FILTERS ({}):",
            filter.logic_operator.as_str().to_uppercase()
        ));
        for (i, item) in filter.items.iter().enumerate() {
            let value = match &item.value {
                None | Some(Value::Null) => "(empty)".to_string(),
                Some(v) => repr_value(v),
            };
            lines.push(format!("  {}. {} {} {}", i + 1, item.field, item.operator, value));
        }
    }
    if sort.is_empty() {
        lines.push("SORTS: none".to_string());
    } else {
        lines.push("SORTS:".to_string());
        for (i, item) in sort.iter().enumerate() {
            lines.push(format!("  {}. {} {}", i + 1, item.field, item.direction().as_str()));
        }
    }
    lines.join("\n")
}

/// Quoted strings, bare numbers and booleans.
fn repr_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Array(items) => format!(
            "[{}]",
            items.iter().map(repr_value).collect::<Vec<_>>().join(", ")
        ),
        other => other.to_string(),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "(empty)".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `1234567` -> `1,234,567`
pub fn with_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FilterItem, LogicOperator, SortDirection, SortItem};
    use serde_json::json;

    fn session(chunk_size: usize) -> GridSession {
        let lf = df!(
            "id" => (0..12i64).collect::<Vec<_>>(),
            "team" => ["red", "blue", "green"].repeat(4)
        )
        .unwrap()
        .lazy();
        let options = GridOptions::default().with_chunk_size(chunk_size);
        let mut session = GridSession::new("grid", FrameRegistry::new(), options);
        session.initialize(lf, HashMap::new());
        session
    }

    #[test]
    fn test_with_thousands() {
        assert_eq!(with_thousands(0), "0");
        assert_eq!(with_thousands(999), "999");
        assert_eq!(with_thousands(1000), "1,000");
        assert_eq!(with_thousands(1234567), "1,234,567");
    }

    #[test]
    fn test_two_phase_initialize_publishes_loading_first() {
        let lf = df!("a" => &[1i32, 2, 3]).unwrap().lazy();
        let mut session = GridSession::new("g", FrameRegistry::new(), GridOptions::default());
        let mut snapshots = Vec::new();
        session.run_event(GridEvent::Initialize(lf, HashMap::new()), |s| {
            snapshots.push((s.loading, s.ready, s.selected_info.clone()))
        });
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0], (true, false, "Preparing data...".to_string()));
        assert_eq!(
            snapshots[1],
            (false, true, "Ready: 3 rows. Scroll down to load more.".to_string())
        );
    }

    #[test]
    fn test_scroll_ignored_while_loading() {
        let mut session = session(4);
        assert!(session.event(&GridEvent::ScrollEnd).is_some());
        assert!(session.state().loading);
        assert_eq!(session.state().stats, "Loading rows 4...");
        // A second trigger before the chunk lands collapses into the first.
        assert!(session.event(&GridEvent::ScrollEnd).is_none());
        session.event(&GridEvent::DoScrollEnd);
        assert!(!session.state().loading);
        assert_eq!(session.state().rows.len(), 8);
        assert_eq!(session.state().pagination.page, 1);
    }

    #[test]
    fn test_stats_format() {
        let mut session = session(5);
        assert!(session
            .state()
            .stats
            .starts_with("offset=0  +5 rows  loaded=5 / 12  "));
        assert!(session.state().stats.ends_with("(replace)"));
        session.handle_scroll_near_end();
        assert!(session
            .state()
            .stats
            .starts_with("offset=5  +5 rows  loaded=10 / 12  "));
        assert!(session.state().stats.ends_with("(append)"));
    }

    #[test]
    fn test_stats_group_thousands() {
        let lf = df!("id" => (0..2500i64).collect::<Vec<_>>()).unwrap().lazy();
        let options = GridOptions::default().with_chunk_size(1200);
        let mut session = GridSession::new("big", FrameRegistry::new(), options);
        session.initialize(lf, HashMap::new());
        session.handle_scroll_near_end();
        assert!(session
            .state()
            .stats
            .starts_with("offset=1,200  +1200 rows  loaded=2,400 / 2,500  "));
        assert_eq!(
            session.state().selected_info,
            "Ready: 2,500 rows. Scroll down to load more."
        );
    }

    #[test]
    fn test_filter_debug_and_preset_json() {
        let mut session = session(5);
        assert_eq!(session.state().filter_debug, "FILTERS: none\nSORTS: none");
        assert_eq!(session.state().filter_preset_json, "");

        session.handle_filter_change(FilterModel::new(
            vec![FilterItem::new("team", "is", Some(json!("red")))],
            LogicOperator::And,
        ));
        session.handle_sort_change(vec![SortItem::new("id", SortDirection::Desc)]);
        assert_eq!(
            session.state().filter_debug,
            "FILTERS (AND):\n  1. team is 'red'\nSORTS:\n  1. id desc"
        );
        assert_eq!(session.state().active_filter_fields, ["team"]);
        let preset: serde_json::Value =
            serde_json::from_str(&session.state().filter_preset_json).unwrap();
        assert_eq!(preset["sort_model"][0]["sort"], "desc");
        assert_eq!(session.state().filter_preset_json, session.download_preset());
        assert!(session.state().generated_code.contains("pl.col(\"team\")"));
        assert!(session.state().generated_sql.contains("ORDER BY \"id\" DESC"));
        assert!(!session.state().query_plan.is_empty());
    }

    #[test]
    fn test_filter_debug_null_value() {
        let filter = FilterModel::new(
            vec![
                FilterItem::new("a", "isEmpty", None),
                FilterItem::new("b", ">", Some(json!(3))),
            ],
            LogicOperator::Or,
        );
        assert_eq!(
            filter_debug(&filter, &Vec::new()),
            "FILTERS (OR):\n  1. a isEmpty (empty)\n  2. b > 3\nSORTS: none"
        );
    }

    #[test]
    fn test_row_click_lists_fields_with_descriptions() {
        let lf = df!("chrom" => &["chr1"], "qual" => &[30i64]).unwrap().lazy();
        let mut descriptions = HashMap::new();
        descriptions.insert("chrom".to_string(), "Chromosome".to_string());
        let mut session = GridSession::new("g", FrameRegistry::new(), GridOptions::default());
        session.initialize(lf, descriptions);
        let row = session.state().rows[0].clone();
        session.event(&GridEvent::RowClick(row));
        assert_eq!(
            session.state().selected_info,
            "chrom: chr1  (Chromosome)\nqual: 30"
        );
    }

    #[test]
    fn test_bad_preset_surfaces_error_and_keeps_state() {
        let mut session = session(5);
        session.upload_preset("{not json");
        assert!(!session.state().loading);
        assert!(session.state().error.is_some());
        assert!(session.state().selected_info.starts_with("Could not apply preset"));
        assert_eq!(session.state().row_count, 12);
    }

    #[test]
    fn test_uninitialized_session_clears_loading() {
        let mut session = GridSession::new("g", FrameRegistry::new(), GridOptions::default());
        session.handle_sort_change(vec![SortItem::new("id", SortDirection::Asc)]);
        assert!(!session.state().loading);
        assert!(session.state().error.is_some());
    }

    #[test]
    fn test_request_value_options_upgrades_column() {
        let lf = df!("team" => ["red", "blue"].repeat(5)).unwrap().lazy();
        let options = GridOptions::default().with_eager_row_limit(0);
        let mut session = GridSession::new("g", FrameRegistry::new(), options);
        session.initialize(lf, HashMap::new());
        assert!(session.state().columns[0].value_options.is_none());

        let choices = session.request_value_options("TEAM");
        assert_eq!(choices, Some(vec!["blue".to_string(), "red".to_string()]));
        assert_eq!(
            session.state().columns[0].grid_type,
            crate::model::GridType::SingleSelect
        );
    }
}
