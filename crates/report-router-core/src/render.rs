//! Markdown and CSV tables built under the shared formatting policy.

use report_router_client::Row;

use crate::{
    error::RenderError,
    policy::{self, CELL_CHAR_BUDGET, ELLIPSIS},
};

/// Renders `rows` as a markdown table, or the no-records sentence for `noun`.
pub fn markdown_table(rows: &[Row], preferred: &[String], noun: &str) -> Result<String, RenderError> {
    if rows.is_empty() {
        return Ok(policy::no_records_sentence(noun));
    }
    let columns = columns_for(rows, preferred)?;

    let mut lines = Vec::with_capacity(rows.len() + 2);
    let header: Vec<String> = columns.iter().map(|column| markdown_cell(column)).collect();
    lines.push(markdown_line(header.iter().map(String::as_str)));
    lines.push(markdown_line(columns.iter().map(|_| "---")));
    for row in rows {
        let cells: Vec<String> = columns
            .iter()
            .map(|column| markdown_cell(&cell_text(row, column)))
            .collect();
        lines.push(markdown_line(cells.iter().map(String::as_str)));
    }
    Ok(lines.join("\n"))
}

/// Renders `rows` as CSV with a header record; empty input yields an empty string.
pub fn csv_table(rows: &[Row], preferred: &[String]) -> Result<String, RenderError> {
    if rows.is_empty() {
        return Ok(String::new());
    }
    let columns = columns_for(rows, preferred)?;

    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(&columns).map_err(csv_error)?;
    for row in rows {
        let record = columns.iter().map(|column| {
            policy::truncate_cell(&cell_text(row, column), CELL_CHAR_BUDGET).into_owned()
        });
        writer.write_record(record).map_err(csv_error)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|error| RenderError::new(error.to_string()))?;
    String::from_utf8(bytes).map_err(|error| RenderError::new(error.to_string()))
}

fn columns_for(rows: &[Row], preferred: &[String]) -> Result<Vec<String>, RenderError> {
    let columns = policy::column_order(rows, preferred);
    if columns.is_empty() {
        return Err(RenderError::new(format!(
            "{} record(s) carry no fields to tabulate",
            rows.len()
        )));
    }
    Ok(columns)
}

/// Missing fields render as empty cells.
fn cell_text(row: &Row, column: &str) -> String {
    row.get(column).map(ToString::to_string).unwrap_or_default()
}

/// Flattens line breaks, escapes `|`, then fits the escaped text in the cell budget.
///
/// An escape pair is kept or dropped whole, so no lone `\` precedes the ellipsis.
fn markdown_cell(raw: &str) -> String {
    let flattened = raw.replace("\r\n", " ").replace(['\n', '\r'], " ");
    let escaped = flattened.replace('|', "\\|");
    if escaped.chars().count() <= CELL_CHAR_BUDGET {
        return escaped;
    }

    let room = CELL_CHAR_BUDGET.saturating_sub(1);
    let mut cell = String::with_capacity(room + ELLIPSIS.len_utf8());
    let mut used = 0;
    for ch in flattened.chars() {
        let width = if ch == '|' { 2 } else { 1 };
        if used + width > room {
            break;
        }
        if ch == '|' {
            cell.push('\\');
        }
        cell.push(ch);
        used += width;
    }
    cell.push(ELLIPSIS);
    cell
}

fn markdown_line<'a>(cells: impl Iterator<Item = &'a str>) -> String {
    let mut line = String::from("|");
    for cell in cells {
        line.push(' ');
        line.push_str(cell);
        line.push_str(" |");
    }
    line
}

fn csv_error(error: csv::Error) -> RenderError {
    RenderError::new(error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use report_router_client::CellValue;

    fn staff_rows() -> Vec<Row> {
        vec![
            [
                ("id", CellValue::Integer(2)),
                ("name", CellValue::from("Grace Hopper")),
                ("room", CellValue::Null),
            ]
            .into_iter()
            .collect(),
            [
                ("id", CellValue::Integer(1)),
                ("name", CellValue::from("Ada | Lovelace")),
            ]
            .into_iter()
            .collect(),
        ]
    }

    #[test]
    fn markdown_snapshot() {
        let rendered = markdown_table(&staff_rows(), &[], "staff").expect("renders");
        insta::assert_snapshot!(rendered, @r###"
        | name | room | id |
        | --- | --- | --- |
        | Grace Hopper |  | 2 |
        | Ada \| Lovelace |  | 1 |
        "###);
    }

    #[test]
    fn csv_snapshot() {
        let rendered = csv_table(&staff_rows(), &["id".to_string()]).expect("renders");
        insta::assert_snapshot!(rendered, @r###"
        id,name,room
        2,Grace Hopper,
        1,Ada | Lovelace,
        "###);
    }

    #[test]
    fn empty_rows_use_the_no_records_sentence() {
        assert_eq!(
            markdown_table(&[], &[], "tags").expect("renders"),
            "No tags records were found in the system."
        );
        assert_eq!(csv_table(&[], &[]).expect("renders"), "");
    }

    #[test]
    fn rows_without_fields_cannot_render() {
        let error = markdown_table(&[Row::new()], &[], "tags").expect_err("no columns");
        assert!(error.message.contains("no fields"));
    }

    #[test]
    fn newlines_and_long_values_are_contained() {
        let rows: Vec<Row> = vec![[("note", "line one\nline two".to_string() + &"x".repeat(300))]
            .into_iter()
            .collect()];
        let rendered = markdown_table(&rows, &[], "notes").expect("renders");
        let data_line = rendered.lines().nth(2).expect("data row");
        assert!(data_line.starts_with("| line one line two"));
        assert_eq!(rendered.lines().count(), 3);
        let cell = data_line.trim_start_matches("| ").trim_end_matches(" |");
        assert_eq!(cell.chars().count(), CELL_CHAR_BUDGET);
    }

    fn unescaped_pipes(line: &str) -> usize {
        line.matches('|').count() - line.matches("\\|").count()
    }

    #[test]
    fn pipe_heavy_cells_stay_within_budget() {
        let rows: Vec<Row> = vec![[("bars", "|".repeat(500))].into_iter().collect()];
        let rendered = markdown_table(&rows, &[], "bars").expect("renders");
        let data_line = rendered.lines().nth(2).expect("data row");
        let cell = data_line
            .strip_prefix("| ")
            .and_then(|rest| rest.strip_suffix(" |"))
            .expect("single cell");

        assert!(cell.chars().count() <= CELL_CHAR_BUDGET);
        assert!(cell.ends_with(ELLIPSIS));
        assert!(!cell.contains("\\…"));
        assert_eq!(unescaped_pipes(data_line), 2);
    }

    #[test]
    fn escapes_near_the_budget_are_not_split() {
        let value = "x".repeat(CELL_CHAR_BUDGET - 2) + "|tail";
        let rows: Vec<Row> = vec![[("note", value)].into_iter().collect()];
        let rendered = markdown_table(&rows, &[], "notes").expect("renders");
        let data_line = rendered.lines().nth(2).expect("data row");
        let cell = data_line.trim_start_matches("| ").trim_end_matches(" |");
        assert_eq!(cell, "x".repeat(CELL_CHAR_BUDGET - 2) + "…");
    }

    #[test]
    fn header_cells_are_escaped_like_data_cells() {
        let row: Row = [
            ("a|b", CellValue::Integer(1)),
            ("line\nbreak", CellValue::Integer(2)),
        ]
        .into_iter()
        .collect();
        let rows = vec![row];
        let rendered = markdown_table(&rows, &[], "pairs").expect("renders");
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "| a\\|b | line break |");
        assert!(lines.iter().all(|line| unescaped_pipes(line) == 3));
    }

    #[test]
    fn csv_quotes_embedded_delimiters() {
        let rows: Vec<Row> = vec![[("title", "Algebra, Part 1")].into_iter().collect()];
        let rendered = csv_table(&rows, &[]).expect("renders");
        assert_eq!(rendered, "title\n\"Algebra, Part 1\"\n");
    }
}
