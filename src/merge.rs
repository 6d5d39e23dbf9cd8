//! Accumulates single-criterion filter updates into a multi-column filter.
//!
//! The grid widget shows and transmits one active criterion at a time, while the
//! server keeps one criterion per field across updates.

use crate::model::{FilterItem, FilterModel};

/// Merge `incoming` into `accumulated`.
///
/// * empty `incoming.items` clears everything
/// * a criterion with a value (or a valueless operator) replaces or adds the one for its field
/// * a criterion without a value only patches the operator of an existing criterion
/// * a criterion without a value for a new field is ignored
///
/// Field order follows first insertion. The result takes `incoming`'s combinator.
pub fn merge_filter_model(accumulated: &FilterModel, incoming: &FilterModel) -> FilterModel {
    if incoming.items.is_empty() {
        return FilterModel::default();
    }

    let mut by_field: Vec<FilterItem> = Vec::with_capacity(accumulated.items.len() + 1);
    for item in &accumulated.items {
        if item.field.is_empty() {
            continue;
        }
        upsert(&mut by_field, item.clone());
    }

    for item in &incoming.items {
        if item.field.is_empty() {
            continue;
        }
        if item.has_value() {
            upsert(&mut by_field, item.clone());
        } else if let Some(existing) = by_field.iter_mut().find(|e| e.field == item.field) {
            if !item.operator.is_empty() && item.operator != existing.operator {
                existing.operator = item.operator.clone();
            }
        }
    }

    if by_field.is_empty() {
        return FilterModel::default();
    }
    FilterModel::new(by_field, incoming.logic_operator)
}

fn upsert(items: &mut Vec<FilterItem>, item: FilterItem) {
    match items.iter_mut().find(|e| e.field == item.field) {
        Some(slot) => *slot = item,
        None => items.push(item),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LogicOperator;
    use serde_json::json;

    fn item(field: &str, op: &str, value: Option<serde_json::Value>) -> FilterItem {
        FilterItem::new(field, op, value)
    }

    fn model(items: Vec<FilterItem>) -> FilterModel {
        FilterModel::new(items, LogicOperator::And)
    }

    #[test]
    fn test_empty_incoming_clears() {
        assert_eq!(
            merge_filter_model(&FilterModel::default(), &FilterModel::default()),
            FilterModel::default()
        );
        let existing = model(vec![item("a", "contains", Some(json!("x")))]);
        assert!(merge_filter_model(&existing, &FilterModel::default()).is_empty());
    }

    #[test]
    fn test_opening_panel_keeps_existing_filter() {
        let existing = model(vec![item("a", "contains", Some(json!("x")))]);
        let incoming = model(vec![item("a", "contains", None)]);
        let merged = merge_filter_model(&existing, &incoming);
        assert_eq!(merged.items, existing.items);
    }

    #[test]
    fn test_operator_change_keeps_value() {
        let existing = model(vec![item("a", "=", Some(json!(5)))]);
        let incoming = model(vec![item("a", ">", None)]);
        let merged = merge_filter_model(&existing, &incoming);
        assert_eq!(merged.items.len(), 1);
        assert_eq!(merged.items[0].operator, ">");
        assert_eq!(merged.items[0].value, Some(json!(5)));
    }

    #[test]
    fn test_upsert_replaces_and_accumulates() {
        let existing = model(vec![
            item("dept", "is", Some(json!("Engineering"))),
            item("name", "contains", Some(json!("a"))),
        ]);
        let merged = merge_filter_model(&existing, &model(vec![item("age", ">", Some(json!(30)))]));
        let fields: Vec<_> = merged.items.iter().map(|i| i.field.as_str()).collect();
        assert_eq!(fields, ["dept", "name", "age"]);

        let merged = merge_filter_model(&merged, &model(vec![item("dept", "is", Some(json!("Sales")))]));
        assert_eq!(merged.items.len(), 3);
        assert_eq!(merged.items[0].value, Some(json!("Sales")));
    }

    #[test]
    fn test_valueless_new_field_ignored() {
        let merged = merge_filter_model(&FilterModel::default(), &model(vec![item("a", "contains", None)]));
        assert!(merged.is_empty());
    }

    #[test]
    fn test_valueless_operator_counts_as_value() {
        let merged = merge_filter_model(&FilterModel::default(), &model(vec![item("a", "isEmpty", None)]));
        assert_eq!(merged.items.len(), 1);
        assert_eq!(merged.items[0].operator, "isEmpty");
    }

    #[test]
    fn test_takes_incoming_combinator() {
        let existing = model(vec![item("a", "contains", Some(json!("x")))]);
        let incoming = FilterModel::new(vec![item("b", "=", Some(json!(1)))], LogicOperator::Or);
        assert_eq!(merge_filter_model(&existing, &incoming).logic_operator, LogicOperator::Or);
    }

    #[test]
    fn test_items_without_field_skipped() {
        let incoming = model(vec![item("", "contains", Some(json!("x")))]);
        assert!(merge_filter_model(&FilterModel::default(), &incoming).is_empty());
    }
}
