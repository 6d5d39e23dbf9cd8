//! Translation of grid filter / sort models into lazy polars queries, plus page
//! materialisation.
//!
//! Translation never fails as a whole: a criterion whose field does not resolve,
//! whose value cannot be coerced or whose operator is unknown for the column
//! type is dropped and the rest of the model still applies.

use crate::model::{FilterItem, FilterModel, LogicOperator, SortModel};
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde_json::{Map, Number, Value};

/// Stable per-row identifier: the row's offset within the filtered + sorted result.
pub const ROW_ID_FIELD: &str = "__row_id__";

/// Separator used when rendering list columns as text.
pub const LIST_SEPARATOR: &str = ",";

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

pub type JsonRow = Map<String, Value>;

/// Collect a LazyFrame, optionally with the streaming engine.
pub fn collect_lazy(lf: LazyFrame, use_streaming: bool) -> PolarsResult<DataFrame> {
    #[cfg(feature = "streaming")]
    {
        if use_streaming {
            lf.with_new_streaming(true).collect()
        } else {
            lf.collect()
        }
    }
    #[cfg(not(feature = "streaming"))]
    {
        let _ = use_streaming; // ignored when streaming feature is disabled
        lf.collect()
    }
}

/// Resolve a widget field name against the schema: exact match first, then
/// case-insensitive.
pub fn resolve_field_name(field: &str, schema: &Schema) -> Option<String> {
    if schema.get(field).is_some() {
        return Some(field.to_string());
    }
    let wanted = field.to_lowercase();
    schema
        .iter_names()
        .find(|name| name.to_lowercase() == wanted)
        .map(|name| name.to_string())
}

/// Coarse column kind used for operator dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Boolean,
    Numeric,
    Date,
    Datetime,
    /// String, categorical, list, struct and everything else; filtered through a text rendering.
    Text,
}

impl ColumnKind {
    pub fn of(dtype: &DataType) -> Self {
        match dtype {
            DataType::Boolean => Self::Boolean,
            DataType::Date => Self::Date,
            DataType::Datetime(_, _) => Self::Datetime,
            d if d.is_numeric() => Self::Numeric,
            _ => Self::Text,
        }
    }
}

/// A coerced filter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Date(NaiveDate),
    Datetime(NaiveDateTime),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compare {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Compare {
    fn from_symbol(op: &str) -> Option<Self> {
        match op {
            "=" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Ge),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Le),
            _ => None,
        }
    }

    fn from_temporal(op: &str) -> Option<Self> {
        match op {
            "is" => Some(Self::Eq),
            "not" => Some(Self::Ne),
            "after" => Some(Self::Gt),
            "onOrAfter" => Some(Self::Ge),
            "before" => Some(Self::Lt),
            "onOrBefore" => Some(Self::Le),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
        }
    }
}

/// Case-insensitive text matching modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMode {
    Contains,
    Equals,
    StartsWith,
    EndsWith,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare(Compare, Scalar),
    /// `needle` is already lower-cased.
    Text {
        mode: TextMode,
        needle: String,
        negate: bool,
    },
    AnyOf(Vec<Scalar>),
    IsEmpty,
    IsNotEmpty,
}

/// One resolved, coerced filter criterion.
#[derive(Debug, Clone, PartialEq)]
pub struct Criterion {
    pub column: String,
    pub dtype: DataType,
    pub kind: ColumnKind,
    pub predicate: Predicate,
}

impl Criterion {
    /// Whether the predicate applies to the column's text rendering rather than
    /// its native values.
    pub fn on_text(&self) -> bool {
        self.kind == ColumnKind::Text || matches!(self.predicate, Predicate::Text { .. })
    }
}

/// Parse a number from a native JSON number or a numeric string (integer first, then float).
pub fn coerce_number(value: &Value) -> Option<Scalar> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(Scalar::Int)
            .or_else(|| n.as_f64().map(Scalar::Float)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .map(Scalar::Int)
                .or_else(|_| s.parse::<f64>().map(Scalar::Float))
                .ok()
        }
        _ => None,
    }
}

/// Parse a boolean from a native JSON bool or "true"/"false" in any case.
pub fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Parse a date or date-time from the widget's ISO strings (`2024-01-31`,
/// `2024-01-31T10:30`, `2024-01-31T10:30:00.000Z`).
pub fn coerce_temporal(value: &Value, kind: ColumnKind) -> Option<Scalar> {
    let s = value.as_str()?.trim();
    let s = s.strip_suffix('Z').unwrap_or(s);
    match kind {
        ColumnKind::Date => {
            let date_part = s.get(..10).unwrap_or(s);
            NaiveDate::parse_from_str(date_part, DATE_FORMAT)
                .ok()
                .map(Scalar::Date)
        }
        ColumnKind::Datetime => {
            const FORMATS: &[&str] = &[
                "%Y-%m-%dT%H:%M:%S%.f",
                "%Y-%m-%dT%H:%M",
                "%Y-%m-%d %H:%M:%S%.f",
                "%Y-%m-%d %H:%M",
            ];
            FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
                .or_else(|| {
                    NaiveDate::parse_from_str(s, DATE_FORMAT)
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                })
                .map(Scalar::Datetime)
        }
        _ => None,
    }
}

/// Text form of a filter value; None for null, arrays and objects.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn text_predicate(op: &str, value: Option<&Value>) -> Option<Predicate> {
    let (mode, negate) = match op {
        "contains" => (TextMode::Contains, false),
        "doesNotContain" => (TextMode::Contains, true),
        "equals" => (TextMode::Equals, false),
        "doesNotEqual" => (TextMode::Equals, true),
        "startsWith" => (TextMode::StartsWith, false),
        "endsWith" => (TextMode::EndsWith, false),
        _ => return None,
    };
    let needle = value_text(value?)?.to_lowercase();
    Some(Predicate::Text {
        mode,
        needle,
        negate,
    })
}

/// Exact-match value for `is` / `not`; the widget sends "" for "any".
fn exact_text(value: Option<&Value>) -> Option<Scalar> {
    value_text(value?)
        .filter(|s| !s.is_empty())
        .map(Scalar::Str)
}

fn any_of<F>(value: Option<&Value>, coerce: F) -> Option<Predicate>
where
    F: Fn(&Value) -> Option<Scalar>,
{
    let values: Vec<Scalar> = match value? {
        Value::Array(items) => items.iter().filter_map(coerce).collect(),
        single => coerce(single).into_iter().collect(),
    };
    (!values.is_empty()).then_some(Predicate::AnyOf(values))
}

/// Dispatch on (column kind, operator) and coerce the value.
fn plan_predicate(kind: ColumnKind, op: &str, value: Option<&Value>) -> Option<Predicate> {
    match (kind, op) {
        (_, "isEmpty") => Some(Predicate::IsEmpty),
        (_, "isNotEmpty") => Some(Predicate::IsNotEmpty),
        (ColumnKind::Numeric, "isAnyOf") => any_of(value, coerce_number),
        (ColumnKind::Numeric, op) => match Compare::from_symbol(op) {
            Some(cmp) => coerce_number(value?).map(|v| Predicate::Compare(cmp, v)),
            None => text_predicate(op, value),
        },
        (ColumnKind::Boolean, "is") => {
            coerce_bool(value?).map(|b| Predicate::Compare(Compare::Eq, Scalar::Bool(b)))
        }
        (ColumnKind::Boolean, "not") => {
            coerce_bool(value?).map(|b| Predicate::Compare(Compare::Ne, Scalar::Bool(b)))
        }
        (ColumnKind::Date | ColumnKind::Datetime, op) => match Compare::from_temporal(op) {
            Some(cmp) => coerce_temporal(value?, kind).map(|v| Predicate::Compare(cmp, v)),
            None => text_predicate(op, value),
        },
        (_, "is") => exact_text(value).map(|v| Predicate::Compare(Compare::Eq, v)),
        (_, "not") => exact_text(value).map(|v| Predicate::Compare(Compare::Ne, v)),
        (_, "isAnyOf") => any_of(value, |v| value_text(v).map(Scalar::Str)),
        (_, op) => text_predicate(op, value),
    }
}

/// Resolve and coerce one filter item. None drops the criterion.
pub fn plan_criterion(item: &FilterItem, schema: &Schema) -> Option<Criterion> {
    let Some(column) = resolve_field_name(&item.field, schema) else {
        tracing::debug!(field = %item.field, "dropping filter on unknown field");
        return None;
    };
    let dtype = schema.get(&column)?.clone();
    let kind = ColumnKind::of(&dtype);
    let Some(predicate) = plan_predicate(kind, &item.operator, item.value.as_ref()) else {
        tracing::debug!(
            field = %column,
            operator = %item.operator,
            value = ?item.value,
            "dropping filter criterion that does not apply to {kind:?} column"
        );
        return None;
    };
    Some(Criterion {
        column,
        dtype,
        kind,
        predicate,
    })
}

/// Resolve every criterion of a filter model, dropping the ones that do not apply.
pub fn plan_filter(model: &FilterModel, schema: &Schema) -> Vec<Criterion> {
    model
        .items
        .iter()
        .filter_map(|item| plan_criterion(item, schema))
        .collect()
}

/// Resolve sort keys to `(column, descending)` pairs, preserving order.
pub fn plan_sort(sort: &SortModel, schema: &Schema) -> Vec<(String, bool)> {
    sort.iter()
        .filter_map(|s| match resolve_field_name(&s.field, schema) {
            Some(name) => Some((name, s.direction().is_descending())),
            None => {
                tracing::debug!(field = %s.field, "dropping sort on unknown field");
                None
            }
        })
        .collect()
}

/// Text rendering of a column: strings as-is, lists joined with a comma,
/// structs as JSON, everything else cast to string.
pub fn text_expr(name: &str, dtype: &DataType) -> Expr {
    match dtype {
        DataType::String => col(name),
        DataType::List(_) => col(name)
            .cast(DataType::List(Box::new(DataType::String)))
            .list()
            .join(lit(LIST_SEPARATOR), true),
        DataType::Struct(_) => col(name).struct_().json_encode(),
        _ => col(name).cast(DataType::String),
    }
}

fn scalar_lit(value: &Scalar, dtype: &DataType) -> Expr {
    match value {
        Scalar::Int(i) => lit(*i),
        Scalar::Float(f) => lit(*f),
        Scalar::Bool(b) => lit(*b),
        Scalar::Str(s) => lit(s.as_str()),
        Scalar::Date(d) => {
            let opts = StrptimeOptions {
                format: Some(DATE_FORMAT.into()),
                ..Default::default()
            };
            lit(d.format(DATE_FORMAT).to_string()).str().to_date(opts)
        }
        Scalar::Datetime(dt) => {
            // The widget sends wall-clock time; read it in the column's zone.
            let (unit, time_zone) = match dtype {
                DataType::Datetime(unit, tz) => (*unit, tz.clone()),
                _ => (TimeUnit::Microseconds, None),
            };
            let opts = StrptimeOptions {
                format: Some("%Y-%m-%dT%H:%M:%S%.f".into()),
                ..Default::default()
            };
            lit(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
                .str()
                .to_datetime(Some(unit), time_zone, opts, lit("raise"))
        }
    }
}

fn compare_expr(target: Expr, cmp: Compare, value: Expr) -> Expr {
    match cmp {
        Compare::Eq => target.eq(value),
        Compare::Ne => target.neq(value),
        Compare::Gt => target.gt(value),
        Compare::Ge => target.gt_eq(value),
        Compare::Lt => target.lt(value),
        Compare::Le => target.lt_eq(value),
    }
}

/// Build the polars predicate for one criterion.
pub fn criterion_expr(c: &Criterion) -> Expr {
    let target = if c.on_text() {
        text_expr(&c.column, &c.dtype)
    } else {
        col(c.column.as_str())
    };
    match &c.predicate {
        Predicate::Compare(cmp, value) => compare_expr(target, *cmp, scalar_lit(value, &c.dtype)),
        Predicate::Text {
            mode,
            needle,
            negate,
        } => {
            let lowered = target.str().to_lowercase();
            let needle = lit(needle.as_str());
            let matched = match mode {
                TextMode::Contains => lowered.str().contains_literal(needle),
                TextMode::Equals => lowered.eq(needle),
                TextMode::StartsWith => lowered.str().starts_with(needle),
                TextMode::EndsWith => lowered.str().ends_with(needle),
            };
            if *negate {
                matched.not()
            } else {
                matched
            }
        }
        Predicate::AnyOf(values) => values
            .iter()
            .map(|v| target.clone().eq(scalar_lit(v, &c.dtype)))
            .reduce(|acc, e| acc.or(e))
            .unwrap_or_else(|| lit(false)),
        Predicate::IsEmpty if c.kind == ColumnKind::Text => {
            target.clone().is_null().or(target.eq(lit("")))
        }
        Predicate::IsNotEmpty if c.kind == ColumnKind::Text => {
            target.clone().is_not_null().and(target.neq(lit("")))
        }
        Predicate::IsEmpty => target.is_null(),
        Predicate::IsNotEmpty => target.is_not_null(),
    }
}

/// Combined predicate for a filter model, or None when nothing resolves.
pub fn build_filter_expr(model: &FilterModel, schema: &Schema) -> Option<Expr> {
    let logic = model.logic_operator;
    plan_filter(model, schema)
        .iter()
        .map(criterion_expr)
        .reduce(|acc, e| match logic {
            LogicOperator::And => acc.and(e),
            LogicOperator::Or => acc.or(e),
        })
}

/// Apply a filter model. Returns `lf` unchanged when no criterion resolves.
pub fn apply_filter_model(lf: LazyFrame, model: &FilterModel, schema: &Schema) -> LazyFrame {
    match build_filter_expr(model, schema) {
        Some(predicate) => lf.filter(predicate),
        None => lf,
    }
}

/// Apply a stable multi-key sort. Returns `lf` unchanged when no key resolves.
pub fn apply_sort_model(lf: LazyFrame, sort: &SortModel, schema: &Schema) -> LazyFrame {
    let keys = plan_sort(sort, schema);
    if keys.is_empty() {
        return lf;
    }
    let options = SortMultipleOptions {
        descending: keys.iter().map(|(_, desc)| *desc).collect(),
        maintain_order: true,
        ..Default::default()
    };
    lf.sort_by_exprs(
        keys.iter().map(|(name, _)| col(name.as_str())).collect::<Vec<_>>(),
        options,
    )
}

/// Row count of a LazyFrame via `select(len())`, without materialising rows.
pub fn count_rows(lf: &LazyFrame, use_streaming: bool) -> PolarsResult<usize> {
    let df = collect_lazy(lf.clone().select([len()]), use_streaming)?;
    let count = match df.get(0).as_ref().and_then(|row| row.first()) {
        Some(AnyValue::UInt32(n)) => *n as usize,
        Some(AnyValue::UInt64(n)) => *n as usize,
        Some(other) => other.extract::<usize>().unwrap_or(0),
        None => 0,
    };
    Ok(count)
}

/// Projection that renders non-JSON-safe columns as strings: temporal values
/// as ISO-8601, lists comma-joined, structs as JSON.
fn json_safe_projection(schema: &Schema) -> Vec<Expr> {
    schema
        .iter()
        .map(|(name, dtype)| {
            let name = name.as_str();
            match dtype {
                DataType::Date => col(name).dt().to_string(DATE_FORMAT).alias(name),
                DataType::Datetime(_, _) => col(name).dt().to_string(DATETIME_FORMAT).alias(name),
                DataType::List(_) | DataType::Struct(_) => text_expr(name, dtype).alias(name),
                _ => col(name),
            }
        })
        .collect()
}

/// Materialise `[offset, offset + len)` of `lf` as JSON rows, each carrying
/// `__row_id__` = its offset within `lf`.
pub fn collect_page(
    lf: LazyFrame,
    schema: &Schema,
    offset: usize,
    len: usize,
    use_streaming: bool,
) -> PolarsResult<Vec<JsonRow>> {
    let page = lf
        .slice(offset as i64, len as IdxSize)
        .select(json_safe_projection(schema))
        .with_row_index(ROW_ID_FIELD, Some(offset as IdxSize));
    let df = collect_lazy(page, use_streaming)?;
    Ok(dataframe_to_rows(&df))
}

/// Convert a (JSON-safe) DataFrame into field → value maps.
pub fn dataframe_to_rows(df: &DataFrame) -> Vec<JsonRow> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();
    (0..df.height())
        .filter_map(|i| df.get(i))
        .map(|values| {
            names
                .iter()
                .cloned()
                .zip(values.iter().map(any_value_to_json))
                .collect()
        })
        .collect()
}

pub fn any_value_to_json(value: &AnyValue) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(*b),
        AnyValue::String(s) => Value::String(s.to_string()),
        AnyValue::StringOwned(s) => Value::String(s.to_string()),
        AnyValue::Int8(_)
        | AnyValue::Int16(_)
        | AnyValue::Int32(_)
        | AnyValue::Int64(_)
        | AnyValue::UInt8(_)
        | AnyValue::UInt16(_)
        | AnyValue::UInt32(_) => value
            .extract::<i64>()
            .map(|n| Value::Number(n.into()))
            .unwrap_or(Value::Null),
        AnyValue::UInt64(n) => Value::Number((*n).into()),
        AnyValue::Float32(_) | AnyValue::Float64(_) => value
            .extract::<f64>()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        other => Value::String(other.str_value().to_string()),
    }
}
