use std::io::Write;

use colored::Colorize;
use crossterm::{
    cursor::MoveToPreviousLine,
    queue,
    terminal::{Clear, ClearType},
};
use serde_json::Value;

use agent_loop::PresentationSink;

const MISSING: &str = "…";
const DESCRIPTION_WIDTH: usize = 60;

struct Column {
    title: &'static str,
    right: bool,
}

const COLUMNS: [Column; 6] = [
    Column { title: "ID", right: true },
    Column { title: "Name", right: false },
    Column { title: "Avg. Length (m)", right: true },
    Column { title: "Avg. Weight (kg)", right: true },
    Column { title: "Ocean", right: false },
    Column { title: "Description", right: true },
];

fn text_cell(item: &Value, key: &str) -> String {
    match item.get(key).and_then(Value::as_str) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => MISSING.to_string(),
    }
}

fn number_cell(item: &Value, key: &str) -> String {
    match item.get(key).and_then(Value::as_f64) {
        Some(number) if number != 0.0 => format!("{number:.0}"),
        _ => MISSING.to_string(),
    }
}

fn truncate(text: String, width: usize) -> String {
    if text.chars().count() <= width {
        return text;
    }
    let mut short: String = text.chars().take(width.saturating_sub(1)).collect();
    short.push_str(MISSING);
    short
}

/// One row of cells per whale in the current view.
pub fn whale_rows(view: &Value) -> Vec<[String; 6]> {
    view.as_array()
        .map(|items| {
            items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    [
                        (index + 1).to_string(),
                        text_cell(item, "name"),
                        number_cell(item, "length"),
                        number_cell(item, "weight"),
                        text_cell(item, "ocean"),
                        truncate(text_cell(item, "description"), DESCRIPTION_WIDTH),
                    ]
                })
                .collect()
        })
        .unwrap_or_default()
}

fn pad(text: &str, width: usize, right: bool) -> String {
    let fill = " ".repeat(width.saturating_sub(text.chars().count()));
    if right {
        format!("{fill}{text}")
    } else {
        format!("{text}{fill}")
    }
}

/// Plain-text table lines (header, rule, rows) for a whale list view.
pub fn whale_table(view: &Value) -> Vec<String> {
    let rows = whale_rows(view);

    let mut widths: Vec<usize> = COLUMNS.iter().map(|column| column.title.chars().count()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(COLUMNS.iter().zip(&widths))
            .map(|(cell, (column, width))| pad(cell, *width, column.right))
            .collect::<Vec<_>>()
            .join(" │ ")
    };

    let mut lines = vec![
        line(COLUMNS.iter().map(|column| column.title).collect()),
        widths
            .iter()
            .map(|width| "─".repeat(*width))
            .collect::<Vec<_>>()
            .join("─┼─"),
    ];
    lines.extend(rows.iter().map(|row| line(row.iter().map(String::as_str).collect())));
    lines
}

/// Live table that redraws itself in place on every update.
pub struct WhaleTable<W: Write + Send> {
    out: W,
    drawn: usize,
}

impl WhaleTable<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> WhaleTable<W> {
    pub fn new(out: W) -> Self {
        Self { out, drawn: 0 }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn draw(&mut self, view: &Value, is_final: bool) -> std::io::Result<()> {
        if self.drawn > 0 {
            let rows = u16::try_from(self.drawn).unwrap_or(u16::MAX);
            queue!(
                self.out,
                MoveToPreviousLine(rows),
                Clear(ClearType::FromCursorDown)
            )?;
        }

        let caption = if is_final {
            "Streaming Structured responses (complete)"
        } else {
            "Streaming Structured responses"
        };
        let mut lines = vec![format!("{}", "Species of Whale".bold())];
        lines.extend(whale_table(view));
        lines.push(format!("{}", caption.dimmed()));

        for line in &lines {
            writeln!(self.out, "{line}")?;
        }
        self.out.flush()?;
        self.drawn = lines.len();
        Ok(())
    }
}

impl<W: Write + Send> PresentationSink for WhaleTable<W> {
    fn render(&mut self, view: &Value, is_final: bool) {
        if let Err(error) = self.draw(view, is_final) {
            log::warn!("Failed to draw whale table: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn missing_cells_show_an_ellipsis() {
        let view = json!([
            {"name": "Blue whale", "length": 25.4, "weight": 136000.0, "ocean": "Pacific", "description": "Largest animal."},
            {"name": "Fin wh"}
        ]);

        let rows = whale_rows(&view);

        assert_eq!(rows[0][2], "25");
        assert_eq!(rows[0][3], "136000");
        assert_eq!(rows[1], ["2", "Fin wh", "…", "…", "…", "…"].map(String::from));
    }

    #[test]
    fn table_aligns_columns() {
        let view = json!([{"name": "Orca", "length": 7}]);

        let lines = whale_table(&view);

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("ID │ Name │ Avg. Length (m)"));
        assert!(lines[2].starts_with(" 1 │ Orca │               7"));
        let widths: Vec<usize> = lines.iter().map(|line| line.chars().count()).collect();
        assert!(widths.iter().all(|width| *width == widths[0]));
    }

    #[test]
    fn long_descriptions_are_truncated() {
        let long = "a".repeat(100);
        let rows = whale_rows(&json!([{"name": "Beluga", "length": 4.5, "description": long}]));

        assert_eq!(rows[0][5].chars().count(), DESCRIPTION_WIDTH);
        assert!(rows[0][5].ends_with('…'));
    }

    #[test]
    fn redraw_moves_cursor_over_previous_frame() {
        colored::control::set_override(false);
        let mut table = WhaleTable::new(Vec::new());

        table.render(&json!([{"name": "Orca"}]), false);
        table.render(&json!([{"name": "Orca", "length": 7}]), true);

        let output = String::from_utf8(table.into_inner()).unwrap();
        // MoveToPreviousLine(5) then Clear(FromCursorDown), once.
        assert_eq!(output.matches("\x1b[5F\x1b[J").count(), 1);
        let (first, second) = output.split_once("\x1b[5F\x1b[J").unwrap();
        assert_eq!(first.lines().count(), 5);
        assert!(second.starts_with("Species of Whale\n"));
        assert!(output.ends_with("Streaming Structured responses (complete)\n"));
    }
}
