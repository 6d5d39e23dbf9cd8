//! Column definitions for the grid: display type, header label, description and
//! dropdown choices.
//!
//! Choices come from a single-column distinct query with projection so no other
//! column is scanned, capped at `max_unique + 1` values.

use crate::model::{ColumnDef, GridType};
use crate::query::collect_lazy;
use polars::prelude::*;
use std::collections::HashMap;

/// Map a polars dtype to the grid's column type.
pub fn grid_type(dtype: &DataType) -> GridType {
    match dtype {
        DataType::Boolean => GridType::Boolean,
        DataType::Date => GridType::Date,
        DataType::Datetime(_, _) => GridType::DateTime,
        d if d.is_numeric() => GridType::Number,
        _ => GridType::String,
    }
}

pub fn is_categorical(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Categorical(..) | DataType::Enum(..))
}

/// Columns eligible for a dropdown.
pub fn is_text_like(dtype: &DataType) -> bool {
    matches!(dtype, DataType::String) || is_categorical(dtype)
}

/// `first_name` -> `First Name`, `__row_id__` -> `Row Id`.
pub fn humanize_field_name(field: &str) -> String {
    let spaced = field.trim_matches('_').replace('_', " ");
    let mut out = String::with_capacity(spaced.len());
    let mut prev_alpha = false;
    for ch in spaced.chars() {
        if ch.is_alphabetic() {
            if prev_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }
    out
}

/// Column definitions from the schema alone (no data scan). Categorical columns
/// are `singleSelect` straight away with an empty choice list until choices are known.
pub fn infer_from_schema(
    schema: &Schema,
    descriptions: &HashMap<String, String>,
    id_field: Option<&str>,
    show_id: bool,
) -> Vec<ColumnDef> {
    let mut defs = Vec::with_capacity(schema.len() + 1);
    if let Some(id) = id_field {
        if show_id && schema.get(id).is_none() {
            defs.push(ColumnDef::new(id, humanize_field_name(id), GridType::Number));
        }
    }
    for (name, dtype) in schema.iter() {
        let name = name.as_str();
        if !show_id && id_field == Some(name) {
            continue;
        }
        let mut def = ColumnDef::new(name, humanize_field_name(name), grid_type(dtype));
        if is_categorical(dtype) {
            def.set_choices(Vec::new());
        }
        def.description = descriptions.get(name).cloned();
        defs.push(def);
    }
    defs
}

/// Distinct values of one text-like column, or None when it has more than
/// `max_unique` of them (or none at all) or is not text-like.
pub fn infer_one_column_on_demand(
    lf: &LazyFrame,
    schema: &Schema,
    field: &str,
    max_unique: usize,
    use_streaming: bool,
) -> PolarsResult<Option<Vec<String>>> {
    match schema.get(field) {
        Some(dtype) if is_text_like(dtype) => {}
        _ => return Ok(None),
    }
    let distinct = lf.clone().select([col(field)
        .cast(DataType::String)
        .drop_nulls()
        .unique()
        .head(Some(max_unique + 1))]);
    let df = collect_lazy(distinct, use_streaming)?;
    let mut values: Vec<String> = df
        .column(field)?
        .str()?
        .into_iter()
        .flatten()
        .map(str::to_string)
        .collect();
    if values.is_empty() || values.len() > max_unique {
        return Ok(None);
    }
    values.sort();
    Ok(Some(values))
}

/// Eager path for small datasets: schema-derived definitions with every
/// qualifying text-like column upgraded to `singleSelect`.
pub fn infer_from_sample(
    lf: &LazyFrame,
    schema: &Schema,
    descriptions: &HashMap<String, String>,
    max_unique: usize,
    use_streaming: bool,
) -> PolarsResult<Vec<ColumnDef>> {
    let mut defs = infer_from_schema(schema, descriptions, None, true);
    for def in defs.iter_mut() {
        if let Some(choices) =
            infer_one_column_on_demand(lf, schema, &def.field, max_unique, use_streaming)?
        {
            def.set_choices(choices);
        }
    }
    Ok(defs)
}
