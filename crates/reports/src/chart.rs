//! SVG table chart.
//!
//! Draws the report tables as a styled grid: header band, zebra striping,
//! right-aligned sums. Sections mode stacks one table per category, capped at
//! [`MAX_CHART_SECTIONS`] to bound the image size. Text is sanitized to the
//! Basic Multilingual Plane first so missing glyphs never reach the artifact.

use engine::TransactionKind;
use engine::report::{MAX_CHART_SECTIONS, ReportSummary, Table};
use svg::Document;
use svg::node::element::{Rectangle, Text as TextElement};

const CHAR_W: f32 = 8.5;
const ROW_H: f32 = 22.0;
const PAD: f32 = 6.0;
const MARGIN: f32 = 20.0;
const TITLE_H: f32 = 28.0;
const SECTION_GAP: f32 = 18.0;
const WRAP_WIDTH: usize = 18;

const HEADER_BG: &str = "#f0f4ff";
const ODD_BG: &str = "#fafafa";
const BORDER: &str = "#cccccc";
const INK: &str = "#222222";
const FONT: &str = "DejaVu Sans, sans-serif";

/// Strips characters outside the Basic Multilingual Plane.
pub fn sanitize_bmp(text: &str) -> String {
    text.chars().filter(|c| (*c as u32) <= 0xFFFF).collect()
}

/// Wraps a cell at a fixed column width, breaking on characters.
fn wrap(text: &str, width: usize) -> Vec<String> {
    if text.is_empty() {
        return vec![String::new()];
    }
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(width)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

fn right_aligned(column: &str) -> bool {
    column == "Сумма" || column == "Значение" || column == "Количество"
}

struct Layout {
    column_widths: Vec<f32>,
    /// Wrapped lines per cell, one entry per row.
    rows: Vec<Vec<Vec<String>>>,
    headers: Vec<String>,
}

impl Layout {
    fn of(table: &Table) -> Self {
        let headers: Vec<String> = table.columns.iter().map(|c| sanitize_bmp(c)).collect();
        let rows: Vec<Vec<Vec<String>>> = table
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| wrap(&sanitize_bmp(cell), WRAP_WIDTH))
                    .collect()
            })
            .collect();

        let column_widths = headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let mut chars = header.chars().count();
                for row in &rows {
                    if let Some(cell) = row.get(i) {
                        for line in cell {
                            chars = chars.max(line.chars().count());
                        }
                    }
                }
                chars.clamp(6, WRAP_WIDTH + 2) as f32 * CHAR_W + 2.0 * PAD
            })
            .collect();

        Self {
            column_widths,
            rows,
            headers,
        }
    }

    fn width(&self) -> f32 {
        self.column_widths.iter().sum()
    }

    fn row_height(&self, row: usize) -> f32 {
        let lines = self.rows[row]
            .iter()
            .map(|cell| cell.len())
            .max()
            .unwrap_or(1);
        lines as f32 * ROW_H
    }

    fn height(&self) -> f32 {
        ROW_H + (0..self.rows.len()).map(|r| self.row_height(r)).sum::<f32>()
    }
}

fn text_at(x: f32, y: f32, content: &str) -> TextElement {
    TextElement::new(content)
        .set("x", x)
        .set("y", y)
        .set("font-family", FONT)
        .set("font-size", 13)
        .set("fill", INK)
}

fn cell_rect(x: f32, y: f32, width: f32, height: f32, fill: &str) -> Rectangle {
    Rectangle::new()
        .set("x", x)
        .set("y", y)
        .set("width", width)
        .set("height", height)
        .set("fill", fill)
        .set("stroke", BORDER)
        .set("stroke-width", 0.6)
}

/// Draws one table at the given offset, returning the document and the y
/// coordinate below the table.
fn draw_table(mut document: Document, layout: &Layout, x0: f32, mut y: f32) -> (Document, f32) {
    // Header band.
    let mut x = x0;
    for (i, header) in layout.headers.iter().enumerate() {
        let width = layout.column_widths[i];
        document = document.add(cell_rect(x, y, width, ROW_H, HEADER_BG));
        document = document.add(
            text_at(x + width / 2.0, y + ROW_H - PAD, header)
                .set("text-anchor", "middle")
                .set("font-weight", "bold"),
        );
        x += width;
    }
    y += ROW_H;

    for (row_index, row) in layout.rows.iter().enumerate() {
        let height = layout.row_height(row_index);
        let fill = if row_index % 2 == 0 { "white" } else { ODD_BG };
        let mut x = x0;
        for (col_index, cell) in row.iter().enumerate() {
            let width = layout.column_widths[col_index];
            document = document.add(cell_rect(x, y, width, height, fill));
            for (line_index, line) in cell.iter().enumerate() {
                let line_y = y + (line_index + 1) as f32 * ROW_H - PAD;
                let text = if right_aligned(&layout.headers[col_index]) {
                    text_at(x + width - PAD, line_y, line).set("text-anchor", "end")
                } else {
                    text_at(x + PAD, line_y, line)
                };
                document = document.add(text);
            }
            x += width;
        }
        y += height;
    }

    (document, y)
}

fn main_title(summary: &ReportSummary, empty: bool) -> String {
    let kind = match summary.kind {
        TransactionKind::Expense => "Траты",
        TransactionKind::Income => "Продажи",
    };
    if empty {
        format!("Отчёт: {kind} — нет данных")
    } else {
        format!(
            "Отчёт: {kind} — сумма {}, операций {}",
            summary.total, summary.count
        )
    }
}

/// Renders the chart document for the given tables.
pub(crate) fn draw(tables: &[(String, Table)], summary: &ReportSummary) -> Document {
    let drawn: Vec<(&String, Layout)> = tables
        .iter()
        .take(MAX_CHART_SECTIONS)
        .map(|(name, table)| (name, Layout::of(table)))
        .collect();
    let empty = drawn.iter().all(|(_, layout)| layout.rows.is_empty());

    if empty {
        let width: f32 = 600.0;
        let height: f32 = 80.0;
        return Document::new()
            .set("width", width)
            .set("height", height)
            .set("viewBox", (0.0, 0.0, width, height))
            .add(
                text_at(width / 2.0, height / 2.0, &sanitize_bmp(&main_title(summary, true)))
                    .set("text-anchor", "middle")
                    .set("font-size", 16),
            );
    }

    let content_width = drawn
        .iter()
        .map(|(_, layout)| layout.width())
        .fold(0.0_f32, f32::max);
    let width = content_width + 2.0 * MARGIN;

    let mut height = MARGIN + TITLE_H;
    for (name, layout) in &drawn {
        if !name.is_empty() {
            height += TITLE_H;
        }
        height += layout.height() + SECTION_GAP;
    }
    height += MARGIN - SECTION_GAP;

    let mut document = Document::new()
        .set("width", width)
        .set("height", height)
        .set("viewBox", (0.0, 0.0, width, height))
        .add(
            Rectangle::new()
                .set("x", 0)
                .set("y", 0)
                .set("width", width)
                .set("height", height)
                .set("fill", "white"),
        );

    let mut y = MARGIN;
    document = document.add(
        text_at(width / 2.0, y + 16.0, &sanitize_bmp(&main_title(summary, false)))
            .set("text-anchor", "middle")
            .set("font-size", 16)
            .set("font-weight", "bold"),
    );
    y += TITLE_H;

    for (name, layout) in &drawn {
        if !name.is_empty() {
            document = document.add(
                text_at(MARGIN, y + 14.0, &sanitize_bmp(name)).set("font-size", 14),
            );
            y += TITLE_H;
        }
        let (updated, next_y) = draw_table(document, layout, MARGIN, y);
        document = updated;
        y = next_y + SECTION_GAP;
    }

    document
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_astral_plane_characters() {
        assert_eq!(sanitize_bmp("мёд 🍯 соты"), "мёд  соты");
        assert_eq!(sanitize_bmp("обычный текст"), "обычный текст");
    }

    #[test]
    fn wrap_breaks_long_cells() {
        let lines = wrap("очень длинный комментарий к операции", WRAP_WIDTH);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| l.chars().count() <= WRAP_WIDTH));
    }

    #[test]
    fn wrap_keeps_short_cells_single_line() {
        assert_eq!(wrap("мёд", WRAP_WIDTH), vec!["мёд".to_string()]);
        assert_eq!(wrap("", WRAP_WIDTH), vec![String::new()]);
    }

    #[test]
    fn layout_accounts_for_wrapped_rows() {
        let table = Table {
            columns: vec!["Комментарий".to_string(), "Сумма".to_string()],
            rows: vec![vec![
                "очень длинный комментарий к операции".to_string(),
                "10.00".to_string(),
            ]],
        };
        let layout = Layout::of(&table);
        assert!(layout.row_height(0) > ROW_H);
        assert!(layout.height() > 2.0 * ROW_H);
    }
}
