//! Grid-widget data model: filter / sort / column / pagination / preset types.
//!
//! Field spellings follow the browser grid's JSON (`logicOperator`, `headerName`,
//! `valueOptions`, `pageSize`) so payloads can be passed through unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Operators that take no value. A criterion using one of these is complete
/// even when `value` is null.
pub const VALUELESS_OPERATORS: &[&str] = &["isEmpty", "isNotEmpty"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicOperator {
    #[default]
    And,
    Or,
}

impl LogicOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

/// One filter criterion as sent by the grid widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterItem {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub operator: String,
    #[serde(default)]
    pub value: Option<Value>,
    /// Widget bookkeeping keys (`id`, `fromInput`, ...). Kept so the UI mirror
    /// round-trips, stripped on preset export.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FilterItem {
    pub fn new(field: impl Into<String>, operator: impl Into<String>, value: Option<Value>) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value,
            extra: Map::new(),
        }
    }

    /// True when the criterion can be applied: it carries a value or uses a
    /// valueless operator.
    pub fn has_value(&self) -> bool {
        self.value.as_ref().is_some_and(|v| !v.is_null())
            || VALUELESS_OPERATORS.contains(&self.operator.as_str())
    }

    /// Copy without widget bookkeeping keys.
    pub fn stripped(&self) -> Self {
        Self::new(self.field.clone(), self.operator.clone(), self.value.clone())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterModel {
    #[serde(default)]
    pub items: Vec<FilterItem>,
    #[serde(default, rename = "logicOperator")]
    pub logic_operator: LogicOperator,
}

impl FilterModel {
    pub fn new(items: Vec<FilterItem>, logic_operator: LogicOperator) -> Self {
        Self {
            items,
            logic_operator,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn stripped(&self) -> Self {
        Self {
            items: self.items.iter().map(FilterItem::stripped).collect(),
            logic_operator: self.logic_operator,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    pub fn is_descending(&self) -> bool {
        matches!(self, Self::Desc)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortItem {
    pub field: String,
    /// The widget sends `null` while a column cycles back to unsorted; treated as ascending.
    #[serde(default)]
    pub sort: Option<SortDirection>,
}

impl SortItem {
    pub fn new(field: impl Into<String>, sort: SortDirection) -> Self {
        Self {
            field: field.into(),
            sort: Some(sort),
        }
    }

    pub fn direction(&self) -> SortDirection {
        self.sort.unwrap_or_default()
    }
}

/// Ordered sort keys; earlier entries take precedence.
pub type SortModel = Vec<SortItem>;

/// Column display types understood by the grid widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GridType {
    String,
    Number,
    Boolean,
    Date,
    DateTime,
    SingleSelect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDef {
    pub field: String,
    pub header_name: String,
    #[serde(rename = "type")]
    pub grid_type: GridType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_options: Option<Vec<String>>,
}

impl ColumnDef {
    pub fn new(field: impl Into<String>, header_name: impl Into<String>, grid_type: GridType) -> Self {
        Self {
            field: field.into(),
            header_name: header_name.into(),
            grid_type,
            description: None,
            value_options: None,
        }
    }

    /// Upgrade to a dropdown column. `singleSelect` always carries a choice list.
    pub fn set_choices(&mut self, choices: Vec<String>) {
        self.grid_type = GridType::SingleSelect;
        self.value_options = Some(choices);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationModel {
    pub page: usize,
    pub page_size: usize,
}

impl PaginationModel {
    pub fn first(page_size: usize) -> Self {
        Self { page: 0, page_size }
    }

    pub fn offset(&self) -> usize {
        self.page * self.page_size
    }
}

#[derive(Error, Debug)]
pub enum PresetError {
    #[error("Preset is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Preset must be a JSON object with filter_model and sort_model keys")]
    NotAnObject,
}

/// Saved filter + sort state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    #[serde(default)]
    pub filter_model: FilterModel,
    #[serde(default)]
    pub sort_model: SortModel,
}

impl Preset {
    /// Parse an uploaded preset. Missing or malformed `filter_model` /
    /// `sort_model` entries default to empty; only an unparseable payload errors.
    pub fn from_json(text: &str) -> Result<Self, PresetError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(mut obj) = value else {
            return Err(PresetError::NotAnObject);
        };
        let filter_model = obj
            .remove("filter_model")
            .and_then(|v| {
                serde_json::from_value::<FilterModel>(v)
                    .inspect_err(|e| tracing::debug!("ignoring malformed preset filter_model: {e}"))
                    .ok()
            })
            .unwrap_or_default();
        let sort_model = obj
            .remove("sort_model")
            .and_then(|v| {
                serde_json::from_value::<SortModel>(v)
                    .inspect_err(|e| tracing::debug!("ignoring malformed preset sort_model: {e}"))
                    .ok()
            })
            .unwrap_or_default();
        Ok(Self {
            filter_model,
            sort_model,
        })
    }

    pub fn has_content(&self) -> bool {
        !self.filter_model.is_empty() || !self.sort_model.is_empty()
    }

    /// Pretty JSON with widget bookkeeping keys removed.
    pub fn to_json_pretty(&self) -> String {
        let export = Preset {
            filter_model: self.filter_model.stripped(),
            sort_model: self.sort_model.clone(),
        };
        serde_json::to_string_pretty(&export).unwrap_or_default()
    }
}
