//! Plain-text rendering of result tables and simulation steps.
//!
//! Tables are drawn as ASCII boxes. Annotated tables get a leading label
//! column, and with colour enabled each labelled line is tinted.

use colorful::{Color, Colorful};

use crate::models::{AnnotatedTable, ResultTable, RowLabel, Step, TableSnapshot};

const GAP: &str = "   ";

/// A rendered line and the label it should be tinted with.
type Line = (String, Option<RowLabel>);

pub fn label_text(label: RowLabel) -> String {
    match label {
        RowLabel::Kept => "kept".to_string(),
        RowLabel::Rejected => "rejected".to_string(),
        RowLabel::Group(id) => format!("g{}", id),
        RowLabel::Source(idx) => format!("#{}", idx),
    }
}

fn label_color(label: RowLabel) -> Color {
    match label {
        RowLabel::Kept => Color::Green,
        RowLabel::Rejected => Color::Red,
        RowLabel::Group(id) => match id % 5 {
            0 => Color::Cyan,
            1 => Color::Yellow,
            2 => Color::Magenta,
            3 => Color::Blue,
            _ => Color::Green,
        },
        // banded per source row
        RowLabel::Source(idx) if idx % 2 == 0 => Color::Cyan,
        RowLabel::Source(_) => Color::Blue,
    }
}

fn paint(text: &str, label: Option<RowLabel>, color: bool) -> String {
    match label {
        Some(l) if color => text.to_string().color(label_color(l)).to_string(),
        _ => text.to_string(),
    }
}

fn width(s: &str) -> usize {
    s.chars().count()
}

fn pad(s: &str, w: usize) -> String {
    format!("{}{}", s, " ".repeat(w.saturating_sub(width(s))))
}

/// Box-drawn lines of a header row plus body rows, all of equal width.
fn boxed(columns: &[String], rows: &[Vec<String>]) -> Vec<String> {
    let mut widths: Vec<usize> = columns.iter().map(|c| width(c)).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(width(cell));
        }
    }
    let rule = format!("+{}+", widths.iter().map(|w| "-".repeat(w + 2)).collect::<Vec<_>>().join("+"));
    let line = |cells: &[String]| {
        format!(
            "|{}|",
            cells
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!(" {} ", pad(c, *w)))
                .collect::<Vec<_>>()
                .join("|")
        )
    };

    let mut out = vec![rule.clone(), line(columns), rule.clone()];
    out.extend(rows.iter().map(|r| line(r)));
    out.push(rule);
    out
}

fn annotated_lines(table: &AnnotatedTable) -> Vec<Line> {
    let snapshot = &table.snapshot;
    let labelled = table.row_labels.is_some();
    let mut columns = snapshot.columns().to_vec();
    let mut rows: Vec<Vec<String>> = snapshot
        .rows()
        .iter()
        .map(|r| r.iter().map(|v| v.to_string()).collect())
        .collect();
    if labelled {
        columns.insert(0, String::new());
        for (idx, row) in rows.iter_mut().enumerate() {
            row.insert(0, table.label_for_row(idx).map(label_text).unwrap_or_default());
        }
    }

    let body = boxed(&columns, &rows);
    let mut lines: Vec<Line> = Vec::with_capacity(body.len() + 1);
    if let Some(label) = table.table_label {
        lines.push((format!("[{}]", label_text(label)), Some(label)));
    }
    let row_count = rows.len();
    for (i, text) in body.into_iter().enumerate() {
        // 3 header lines precede the body rows
        let label = match i.checked_sub(3) {
            Some(r) if r < row_count => table.label_for_row(r),
            _ => table.table_label,
        };
        lines.push((text, label));
    }
    lines
}

/// Lay tables out next to each other, tops aligned.
fn side_by_side(blocks: Vec<Vec<Line>>, color: bool) -> String {
    let widths: Vec<usize> = blocks
        .iter()
        .map(|b| b.iter().map(|(t, _)| width(t)).max().unwrap_or(0))
        .collect();
    let height = blocks.iter().map(Vec::len).max().unwrap_or(0);
    let mut out = Vec::with_capacity(height);
    for i in 0..height {
        let line = blocks
            .iter()
            .zip(&widths)
            .map(|(block, w)| match block.get(i) {
                Some((text, label)) => paint(&pad(text, *w), *label, color),
                None => " ".repeat(*w),
            })
            .collect::<Vec<_>>()
            .join(GAP);
        out.push(line.trim_end().to_string());
    }
    out.join("\n")
}

pub fn render_snapshot(table: &TableSnapshot) -> String {
    render_annotated(&AnnotatedTable::plain(table.clone()), false)
}

pub fn render_annotated(table: &AnnotatedTable, color: bool) -> String {
    side_by_side(vec![annotated_lines(table)], color)
}

pub fn render_result(table: &ResultTable) -> String {
    let rows: Vec<Vec<String>> = table.rows.iter().map(|r| r.iter().map(|v| v.to_string()).collect()).collect();
    let mut out = boxed(&table.columns, &rows).join("\n");
    out.push_str(&format!("\n({} row{})", rows.len(), if rows.len() == 1 { "" } else { "s" }));
    out
}

/// Heading plus the step's tables side by side. `index` is zero based.
pub fn render_step(step: &Step, index: usize, total: usize, color: bool) -> String {
    let heading = format!("Step {}/{}: {}", index + 1, total, step.title());
    let heading = if color { heading.bold().to_string() } else { heading };
    if step.tables.is_empty() {
        return format!("{}\n(no tables)", heading);
    }
    let body = side_by_side(step.tables.iter().map(annotated_lines).collect(), color);
    format!("{}\n{}", heading, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{StepKind, Value};

    fn snapshot() -> TableSnapshot {
        TableSnapshot::new(
            vec!["d.name".into(), "d.age".into()],
            vec![vec![Value::from("rex"), Value::Integer(3)], vec![Value::from("fido"), Value::Null]],
        )
        .unwrap()
    }

    #[test]
    fn snapshot_is_boxed() {
        let out = render_snapshot(&snapshot());
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "+--------+-------+");
        assert_eq!(lines[1], "| d.name | d.age |");
        assert_eq!(lines[3], "| rex    | 3     |");
        assert_eq!(lines[4], "| fido   | NULL  |");
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn row_labels_become_a_leading_column() {
        let t = AnnotatedTable::with_row_labels(snapshot(), vec![RowLabel::Kept, RowLabel::Rejected]);
        let out = render_annotated(&t, false);
        assert!(out.contains("| kept     | rex"), "{}", out);
        assert!(out.contains("| rejected | fido"), "{}", out);
    }

    #[test]
    fn tables_sit_side_by_side() {
        let step = Step::side_by_side(
            StepKind::Grouped,
            vec![
                AnnotatedTable::with_table_label(snapshot(), RowLabel::Group(0)),
                AnnotatedTable::with_table_label(snapshot(), RowLabel::Group(1)),
            ],
        );
        let out = render_step(&step, 1, 4, false);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "Step 2/4: GROUP BY: groups");
        assert!(lines[1].starts_with("[g0]"));
        assert!(lines[1].contains("[g1]"));
        assert_eq!(lines[2].matches("+--------+-------+").count(), 2);
    }

    #[test]
    fn no_escape_codes_without_colour() {
        let t = AnnotatedTable::with_row_labels(snapshot(), vec![RowLabel::Kept, RowLabel::Rejected]);
        assert!(!render_annotated(&t, false).contains('\u{1b}'));
    }

    #[test]
    fn result_counts_rows() {
        let t = ResultTable { columns: vec!["n".into()], rows: vec![vec![Value::Integer(1)]] };
        assert!(render_result(&t).ends_with("(1 row)"));
    }
}
