//! Human-readable reproductions of the active filter and sort: a Python polars
//! snippet and an equivalent SQL query.
//!
//! Both render the same resolved criteria the query translator applies, so
//! dropped criteria are absent here too.

use crate::model::{FilterModel, LogicOperator, SortModel};
use crate::query::{plan_filter, plan_sort, Compare, Criterion, Predicate, Scalar, TextMode, LIST_SEPARATOR};
use chrono::Timelike;
use polars::prelude::{DataType, Schema};

fn py_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
}

fn py_scalar(value: &Scalar) -> String {
    match value {
        Scalar::Int(i) => i.to_string(),
        Scalar::Float(f) => format!("{:?}", f),
        Scalar::Bool(true) => "True".to_string(),
        Scalar::Bool(false) => "False".to_string(),
        Scalar::Str(s) => py_str(s),
        Scalar::Date(d) => d.format("pl.date(%Y, %-m, %-d)").to_string(),
        Scalar::Datetime(dt) => {
            let micros = dt.nanosecond() / 1_000;
            if micros > 0 {
                format!("{}, {})", dt.format("pl.datetime(%Y, %-m, %-d, %-H, %-M, %-S"), micros)
            } else {
                dt.format("pl.datetime(%Y, %-m, %-d, %-H, %-M, %-S)").to_string()
            }
        }
    }
}

fn py_target(c: &Criterion) -> String {
    let base = format!("pl.col({})", py_str(&c.column));
    if !c.on_text() {
        return base;
    }
    match &c.dtype {
        DataType::String => base,
        DataType::List(_) => format!(
            "{base}.cast(pl.List(pl.String)).list.join({})",
            py_str(LIST_SEPARATOR)
        ),
        DataType::Struct(_) => format!("{base}.struct.json_encode()"),
        _ => format!("{base}.cast(pl.String)"),
    }
}

fn py_criterion(c: &Criterion) -> String {
    let target = py_target(c);
    match &c.predicate {
        Predicate::Compare(cmp, value) => {
            format!("({} {} {})", target, cmp.symbol(), py_scalar(value))
        }
        Predicate::Text {
            mode,
            needle,
            negate,
        } => {
            let lowered = format!("{target}.str.to_lowercase()");
            let needle = py_str(needle);
            let expr = match mode {
                TextMode::Contains => format!("{lowered}.str.contains({needle}, literal=True)"),
                TextMode::Equals => format!("({lowered} == {needle})"),
                TextMode::StartsWith => format!("{lowered}.str.starts_with({needle})"),
                TextMode::EndsWith => format!("{lowered}.str.ends_with({needle})"),
            };
            if *negate {
                format!("~{expr}")
            } else {
                expr
            }
        }
        Predicate::AnyOf(values) => {
            let values: Vec<String> = values.iter().map(py_scalar).collect();
            format!("{target}.is_in([{}])", values.join(", "))
        }
        Predicate::IsEmpty if c.on_text() => {
            format!("({target}.is_null() | ({target} == \"\"))")
        }
        Predicate::IsNotEmpty if c.on_text() => {
            format!("({target}.is_not_null() & ({target} != \"\"))")
        }
        Predicate::IsEmpty => format!("{target}.is_null()"),
        Predicate::IsNotEmpty => format!("{target}.is_not_null()"),
    }
}

/// Python polars snippet reproducing the filter and sort. Empty when neither is active.
pub fn generate_code(filter: &FilterModel, sort: &SortModel, schema: &Schema) -> String {
    let criteria = plan_filter(filter, schema);
    let keys = plan_sort(sort, schema);
    if criteria.is_empty() && keys.is_empty() {
        return String::new();
    }

    let mut lines = vec!["import polars as pl".to_string(), String::new()];
    if !criteria.is_empty() {
        let joiner = match filter.logic_operator {
            LogicOperator::And => "&",
            LogicOperator::Or => "|",
        };
        lines.push("lf = lf.filter(".to_string());
        for (i, c) in criteria.iter().enumerate() {
            if i == 0 {
                lines.push(format!("    {}", py_criterion(c)));
            } else {
                lines.push(format!("    {} {}", joiner, py_criterion(c)));
            }
        }
        lines.push(")".to_string());
    }
    if !keys.is_empty() {
        let names: Vec<String> = keys.iter().map(|(n, _)| py_str(n)).collect();
        let desc: Vec<&str> = keys
            .iter()
            .map(|(_, d)| if *d { "True" } else { "False" })
            .collect();
        lines.push(format!(
            "lf = lf.sort([{}], descending=[{}], maintain_order=True)",
            names.join(", "),
            desc.join(", ")
        ));
    }
    lines.push("df = lf.collect()".to_string());
    lines.join("\n")
}

fn sql_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn sql_str(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn sql_scalar(value: &Scalar) -> String {
    match value {
        Scalar::Int(i) => i.to_string(),
        Scalar::Float(f) => format!("{:?}", f),
        Scalar::Bool(true) => "TRUE".to_string(),
        Scalar::Bool(false) => "FALSE".to_string(),
        Scalar::Str(s) => sql_str(s),
        Scalar::Date(d) => format!("CAST({} AS DATE)", sql_str(&d.format("%Y-%m-%d").to_string())),
        Scalar::Datetime(dt) => format!(
            "CAST({} AS TIMESTAMP)",
            sql_str(&dt.format("%Y-%m-%d %H:%M:%S%.f").to_string())
        ),
    }
}

fn sql_op(cmp: Compare) -> &'static str {
    match cmp {
        Compare::Eq => "=",
        Compare::Ne => "<>",
        Compare::Gt => ">",
        Compare::Ge => ">=",
        Compare::Lt => "<",
        Compare::Le => "<=",
    }
}

/// SQL rendering of the column a criterion reads. None for struct columns:
/// polars-sql has no JSON encoding to match the text the grid filters on.
fn sql_target(c: &Criterion) -> Option<String> {
    let ident = sql_ident(&c.column);
    if !c.on_text() {
        return Some(ident);
    }
    match &c.dtype {
        DataType::String => Some(ident),
        DataType::List(_) => Some(format!(
            "ARRAY_TO_STRING({ident}, {})",
            sql_str(LIST_SEPARATOR)
        )),
        DataType::Struct(_) => None,
        _ => Some(format!("CAST({ident} AS VARCHAR)")),
    }
}

fn sql_criterion(c: &Criterion) -> Option<String> {
    let target = sql_target(c)?;
    let clause = match &c.predicate {
        Predicate::Compare(cmp, value) => {
            format!("{} {} {}", target, sql_op(*cmp), sql_scalar(value))
        }
        Predicate::Text {
            mode,
            needle,
            negate,
        } => {
            // `%` and `_` in the needle are literal.
            let lowered = format!("LOWER({target})");
            let needle = sql_str(needle);
            let expr = match mode {
                TextMode::Contains => format!("STRPOS({lowered}, {needle}) > 0"),
                TextMode::Equals => format!("{lowered} = {needle}"),
                TextMode::StartsWith => format!("STARTS_WITH({lowered}, {needle})"),
                TextMode::EndsWith => format!("ENDS_WITH({lowered}, {needle})"),
            };
            // STRPOS yields 0 for null input; nulls never match a negated text filter.
            if *negate {
                format!("{target} IS NOT NULL AND NOT ({expr})")
            } else {
                expr
            }
        }
        Predicate::AnyOf(values) => {
            let values: Vec<String> = values.iter().map(sql_scalar).collect();
            format!("{target} IN ({})", values.join(", "))
        }
        Predicate::IsEmpty if c.on_text() => format!("{target} IS NULL OR {target} = ''"),
        Predicate::IsNotEmpty if c.on_text() => format!("{target} IS NOT NULL AND {target} <> ''"),
        Predicate::IsEmpty => format!("{target} IS NULL"),
        Predicate::IsNotEmpty => format!("{target} IS NOT NULL"),
    };
    Some(clause)
}

/// `SELECT * FROM table WHERE ... ORDER BY ...`. Empty when neither filter nor sort is active.
pub fn generate_sql(filter: &FilterModel, sort: &SortModel, schema: &Schema, table_name: &str) -> String {
    let criteria = plan_filter(filter, schema);
    let keys = plan_sort(sort, schema);
    if criteria.is_empty() && keys.is_empty() {
        return String::new();
    }

    let mut sql = String::new();
    let mut clauses = Vec::with_capacity(criteria.len());
    for c in &criteria {
        match sql_criterion(c) {
            Some(clause) => clauses.push(format!("({})", clause)),
            None => sql.push_str(&format!(
                "-- filter on struct column {} has no SQL equivalent and is omitted\n",
                sql_ident(&c.column)
            )),
        }
    }
    sql.push_str(&format!("SELECT *\nFROM {}", sql_ident(table_name)));
    if !clauses.is_empty() {
        let joiner = match filter.logic_operator {
            LogicOperator::And => "\n  AND ",
            LogicOperator::Or => "\n  OR ",
        };
        sql.push_str("\nWHERE ");
        sql.push_str(&clauses.join(joiner));
    }
    if !keys.is_empty() {
        let order: Vec<String> = keys
            .iter()
            .map(|(name, desc)| format!("{} {}", sql_ident(name), if *desc { "DESC" } else { "ASC" }))
            .collect();
        sql.push_str("\nORDER BY ");
        sql.push_str(&order.join(", "));
    }
    sql
}
