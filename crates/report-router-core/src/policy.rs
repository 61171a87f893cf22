//! Guardrails shared by every handler's renderers.

use std::borrow::Cow;

use report_router_client::Row;

/// Most rows ever rendered into one table.
pub const SAFE_MAX_ROWS: usize = 200;
/// Longest rendered cell, in characters, including the ellipsis.
pub const CELL_CHAR_BUDGET: usize = 120;
pub const ELLIPSIS: char = '…';

const ID_LIKE_KEYS: [&str; 3] = ["id", "_id", "uuid"];

/// Shortens `value` to at most `budget` characters, ending in [`ELLIPSIS`].
///
/// Counts `char`s, so multi-byte characters are never split.
#[must_use]
pub fn truncate_cell(value: &str, budget: usize) -> Cow<'_, str> {
    if value.chars().count() <= budget {
        return Cow::Borrowed(value);
    }
    if budget == 0 {
        return Cow::Owned(String::new());
    }
    let mut truncated: String = value.chars().take(budget - 1).collect();
    truncated.push(ELLIPSIS);
    Cow::Owned(truncated)
}

#[must_use]
pub fn is_id_like(key: &str) -> bool {
    ID_LIKE_KEYS
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(key))
}

#[must_use]
pub fn cap_rows(rows: &[Row], max_rows: usize) -> &[Row] {
    &rows[..rows.len().min(max_rows)]
}

/// Column order for a table over `rows`.
///
/// With a preference, preferred fields that occur in the rows come first and
/// every other field follows in first-seen order. Without one, first-seen
/// order is used with id-like fields moved to the end.
#[must_use]
pub fn column_order(rows: &[Row], preferred: &[String]) -> Vec<String> {
    let mut seen: Vec<&str> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !seen.contains(&key) {
                seen.push(key);
            }
        }
    }

    if preferred.is_empty() {
        let (ids, rest): (Vec<&str>, Vec<&str>) = seen.into_iter().partition(|key| is_id_like(key));
        return rest.into_iter().chain(ids).map(str::to_string).collect();
    }

    let mut columns: Vec<String> = Vec::with_capacity(seen.len());
    for field in preferred {
        if seen.contains(&field.as_str()) && !columns.contains(field) {
            columns.push(field.clone());
        }
    }
    for key in seen {
        if !columns.iter().any(|column| column == key) {
            columns.push(key.to_string());
        }
    }
    columns
}

#[must_use]
pub fn no_records_sentence(noun: &str) -> String {
    format!("No {noun} records were found in the system.")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fields: &[(&str, &str)]) -> Row {
        fields.iter().map(|(key, value)| (*key, *value)).collect()
    }

    #[test]
    fn long_ascii_cell_hits_budget_exactly() {
        let value = "a".repeat(500);
        let first = truncate_cell(&value, CELL_CHAR_BUDGET).into_owned();
        assert_eq!(first.chars().count(), CELL_CHAR_BUDGET);
        assert!(first.ends_with(ELLIPSIS));
        assert_eq!(truncate_cell(&value, CELL_CHAR_BUDGET), first);
    }

    #[test]
    fn truncation_respects_multibyte_characters() {
        let value = "é".repeat(10) + &"日本".repeat(100);
        let truncated = truncate_cell(&value, 15);
        assert_eq!(truncated.chars().count(), 15);
        assert!(truncated.starts_with("éééééééééé日本日本"));
    }

    #[test]
    fn short_cells_are_borrowed() {
        assert!(matches!(truncate_cell("short", 10), Cow::Borrowed("short")));
    }

    #[test]
    fn natural_order_moves_ids_last() {
        let rows = vec![
            row(&[("id", "1"), ("name", "Ada"), ("grade", "3")]),
            row(&[("uuid", "x"), ("name", "Grace"), ("campus", "north")]),
        ];
        assert_eq!(
            column_order(&rows, &[]),
            vec!["name", "grade", "campus", "id", "uuid"]
        );
    }

    #[test]
    fn preferred_fields_lead_and_unseen_follow() {
        let rows = vec![row(&[("id", "1"), ("notes", "n"), ("title", "t"), ("kind", "k")])];
        let preferred = vec!["title".to_string(), "missing".to_string(), "kind".to_string()];
        assert_eq!(
            column_order(&rows, &preferred),
            vec!["title", "kind", "id", "notes"]
        );
    }

    #[test]
    fn column_order_is_stable() {
        let rows = vec![row(&[("b", "1"), ("a", "2"), ("ID", "3")])];
        let first = column_order(&rows, &[]);
        assert_eq!(first, vec!["b", "a", "ID"]);
        assert_eq!(column_order(&rows, &[]), first);
    }

    #[test]
    fn cap_rows_never_exceeds_limit() {
        let rows = vec![Row::new(); 5];
        assert_eq!(cap_rows(&rows, 3).len(), 3);
        assert_eq!(cap_rows(&rows, 10).len(), 5);
    }
}
