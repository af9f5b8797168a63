//! Report aggregation.
//!
//! A report is built from the filtered transaction set in two steps: the rows
//! are resolved to display form ([`ReportRow`]), then grouped under one of the
//! [`Aggregation`] modes into normalized [`Table`]s. Grouping is pure and
//! independent of the database, so every mode is testable on slices.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{EngineError, MoneyCents, TransactionKind};

/// Longest date range a report may cover.
pub const MAX_REPORT_DAYS: i64 = 365;

/// Hard cap on the number of rows fetched for one report.
pub const MAX_REPORT_ROWS: u64 = 10_000;

/// Most per-category tables drawn on one chart.
pub const MAX_CHART_SECTIONS: usize = 12;

/// Placeholder for an absent subcategory or comment.
pub const EMPTY_CELL: &str = "-";

/// How the filtered transaction set is grouped for presentation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Aggregation {
    /// Raw rows, chronological ascending.
    Detail,
    /// (category, count, sum), sorted by sum descending.
    ByCategory,
    /// (category, subcategory, sum), sorted by sum descending.
    BySubcategory,
    /// Two rows: total sum and total count.
    Overall,
    /// One sub-table per category, grouping its rows by subcategory.
    /// Expense reports only.
    ByCategorySections,
}

impl Aggregation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Detail => "detail",
            Self::ByCategory => "by_category",
            Self::BySubcategory => "by_subcategory",
            Self::Overall => "overall",
            Self::ByCategorySections => "by_category_sections",
        }
    }

    /// Human label used in artifact titles.
    pub fn title(self) -> &'static str {
        match self {
            Self::Detail => "детально",
            Self::ByCategory => "по категориям",
            Self::BySubcategory => "по подкатегориям",
            Self::Overall => "итого",
            Self::ByCategorySections => "по категориям и подкатегориям",
        }
    }
}

impl TryFrom<&str> for Aggregation {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "detail" => Ok(Self::Detail),
            "by_category" => Ok(Self::ByCategory),
            "by_subcategory" => Ok(Self::BySubcategory),
            "overall" => Ok(Self::Overall),
            "by_category_sections" => Ok(Self::ByCategorySections),
            other => Err(EngineError::InvalidRequest(format!(
                "invalid aggregation: {other}"
            ))),
        }
    }
}

/// One transaction resolved to display form (category ids replaced by names).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportRow {
    pub effective_at: DateTime<Utc>,
    pub category: String,
    pub subcategory: Option<String>,
    pub amount: MoneyCents,
    pub currency: String,
    pub comment: Option<String>,
}

/// Totals over the *unaggregated* filtered set, independent of the mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReportSummary {
    pub kind: TransactionKind,
    pub total: MoneyCents,
    pub count: usize,
}

/// A normalized tabular projection; never persisted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The full output of one report request.
#[derive(Clone, Debug)]
pub struct Report {
    pub summary: ReportSummary,
    pub aggregation: Aggregation,
    /// Raw rows, always present regardless of the mode.
    pub data: Table,
    /// Aggregated table(s); empty for `Detail`.
    pub aggregates: Vec<(String, Table)>,
    /// Tables drawn on the chart: the aggregate for grouped modes, the raw
    /// data for `Detail`, one table per category for sections.
    pub chart: Vec<(String, Table)>,
    pub generated_at: DateTime<Utc>,
}

impl Report {
    /// Workbook sheets in order: raw data, summary, meta, then aggregates.
    pub fn sheets(&self) -> Vec<(String, Table)> {
        let mut summary = Table::new(&["metric", "value"]);
        summary.rows.push(vec![
            "kind".to_string(),
            self.summary.kind.as_str().to_string(),
        ]);
        summary
            .rows
            .push(vec!["total".to_string(), self.summary.total.to_string()]);
        summary
            .rows
            .push(vec!["count".to_string(), self.summary.count.to_string()]);

        let mut meta = Table::new(&["generated_at", "type"]);
        meta.rows.push(vec![
            self.generated_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
            self.summary.kind.as_str().to_string(),
        ]);

        let mut sheets = vec![
            ("data".to_string(), self.data.clone()),
            ("summary".to_string(), summary),
            ("meta".to_string(), meta),
        ];
        sheets.extend(self.aggregates.iter().cloned());
        sheets
    }
}

/// Builds the report body for a mode from resolved rows.
pub fn build_tables(kind: TransactionKind, rows: &[ReportRow], mode: Aggregation) -> Report {
    let data = detail_table(rows);
    let summary = summarize(kind, rows);

    let (aggregates, chart): (Vec<(String, Table)>, Vec<(String, Table)>) = match mode {
        Aggregation::Detail => (Vec::new(), vec![(String::new(), data.clone())]),
        Aggregation::ByCategory => {
            let table = by_category_table(rows);
            (
                vec![("aggregate_по категориям".to_string(), table.clone())],
                vec![(mode.title().to_string(), table)],
            )
        }
        Aggregation::BySubcategory => {
            let table = by_subcategory_table(rows);
            (
                vec![("aggregate_по подкатегориям".to_string(), table.clone())],
                vec![(mode.title().to_string(), table)],
            )
        }
        Aggregation::Overall => {
            let table = overall_table(rows);
            (
                vec![("aggregate_итого".to_string(), table.clone())],
                vec![(mode.title().to_string(), table)],
            )
        }
        Aggregation::ByCategorySections => {
            let sections = category_sections(rows);
            (sections.clone(), sections)
        }
    };

    Report {
        summary,
        aggregation: mode,
        data,
        aggregates,
        chart,
        generated_at: Utc::now(),
    }
}

/// Totals over the unaggregated set.
pub fn summarize(kind: TransactionKind, rows: &[ReportRow]) -> ReportSummary {
    let mut total = MoneyCents::ZERO;
    for row in rows {
        total += row.amount;
    }
    ReportSummary {
        kind,
        total,
        count: rows.len(),
    }
}

fn detail_table(rows: &[ReportRow]) -> Table {
    let mut table = Table::new(&[
        "Дата",
        "Категория",
        "Подкатегория",
        "Сумма",
        "Валюта",
        "Комментарий",
    ]);
    for row in rows {
        table.rows.push(vec![
            row.effective_at.format("%Y-%m-%d %H:%M").to_string(),
            row.category.clone(),
            row.subcategory.clone().unwrap_or_else(|| EMPTY_CELL.to_string()),
            row.amount.to_string(),
            row.currency.clone(),
            row.comment.clone().unwrap_or_default(),
        ]);
    }
    table
}

fn group_by_category(rows: &[ReportRow]) -> Vec<(String, usize, MoneyCents)> {
    let mut groups: Vec<(String, usize, MoneyCents)> = Vec::new();
    for row in rows {
        match groups.iter_mut().find(|(name, _, _)| *name == row.category) {
            Some((_, count, sum)) => {
                *count += 1;
                *sum += row.amount;
            }
            None => groups.push((row.category.clone(), 1, row.amount)),
        }
    }
    groups.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.0.cmp(&b.0)));
    groups
}

fn by_category_table(rows: &[ReportRow]) -> Table {
    let mut table = Table::new(&["Категория", "Количество", "Сумма"]);
    for (name, count, sum) in group_by_category(rows) {
        table
            .rows
            .push(vec![name, count.to_string(), sum.to_string()]);
    }
    table
}

fn group_by_subcategory(rows: &[ReportRow]) -> Vec<(String, String, MoneyCents)> {
    let mut groups: Vec<(String, String, MoneyCents)> = Vec::new();
    for row in rows {
        let sub = row
            .subcategory
            .clone()
            .unwrap_or_else(|| EMPTY_CELL.to_string());
        match groups
            .iter_mut()
            .find(|(cat, s, _)| *cat == row.category && *s == sub)
        {
            Some((_, _, sum)) => *sum += row.amount,
            None => groups.push((row.category.clone(), sub, row.amount)),
        }
    }
    groups.sort_by(|a, b| {
        b.2.cmp(&a.2)
            .then_with(|| a.0.cmp(&b.0))
            .then_with(|| a.1.cmp(&b.1))
    });
    groups
}

fn by_subcategory_table(rows: &[ReportRow]) -> Table {
    let mut table = Table::new(&["Категория", "Подкатегория", "Сумма"]);
    for (category, subcategory, sum) in group_by_subcategory(rows) {
        table.rows.push(vec![category, subcategory, sum.to_string()]);
    }
    table
}

fn overall_table(rows: &[ReportRow]) -> Table {
    let mut total = MoneyCents::ZERO;
    for row in rows {
        total += row.amount;
    }
    let mut table = Table::new(&["Показатель", "Значение"]);
    table
        .rows
        .push(vec!["Сумма".to_string(), total.to_string()]);
    table
        .rows
        .push(vec!["Число операций".to_string(), rows.len().to_string()]);
    table
}

/// One table per category (sorted by category total descending), each
/// grouping that category's rows by subcategory with descending sums.
fn category_sections(rows: &[ReportRow]) -> Vec<(String, Table)> {
    let mut sections = Vec::new();
    for (category, _, _) in group_by_category(rows) {
        let in_category: Vec<ReportRow> = rows
            .iter()
            .filter(|row| row.category == category)
            .cloned()
            .collect();

        let mut table = Table::new(&["Подкатегория", "Сумма"]);
        for (_, subcategory, sum) in group_by_subcategory(&in_category) {
            table.rows.push(vec![subcategory, sum.to_string()]);
        }
        sections.push((category, table));
    }
    sections
}

/// Report artifact generation failure.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("render failed: {0}")]
    Failed(String),
}

/// Artifact generation contract consumed by the conversation.
///
/// Implementations produce whole files or nothing; a partial artifact must
/// not be left behind on error.
pub trait Renderer: Send + Sync {
    /// Writes a spreadsheet workbook from named sheets, returning its path.
    fn render_workbook(&self, sheets: &[(String, Table)]) -> Result<PathBuf, RenderError>;

    /// Draws the given tables as a single chart image, returning its path.
    fn render_chart(
        &self,
        tables: &[(String, Table)],
        summary: &ReportSummary,
    ) -> Result<PathBuf, RenderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(category: &str, subcategory: Option<&str>, cents: i64) -> ReportRow {
        ReportRow {
            effective_at: Utc.with_ymd_and_hms(2026, 7, 1, 12, 0, 0).unwrap(),
            category: category.to_string(),
            subcategory: subcategory.map(str::to_string),
            amount: MoneyCents::new(cents),
            currency: "RUB".to_string(),
            comment: None,
        }
    }

    fn sample() -> Vec<ReportRow> {
        vec![
            row("Продукты", None, 10_00),
            row("Пчеловодство", Some("Сахар"), 50_00),
            row("Продукты", None, 25_00),
            row("Пчеловодство", Some("Инвентарь"), 5_00),
        ]
    }

    #[test]
    fn by_category_sums_match_summary() {
        let rows = sample();
        let summary = summarize(TransactionKind::Expense, &rows);
        let groups = group_by_category(&rows);

        let mut total = MoneyCents::ZERO;
        let mut count = 0;
        for (_, c, sum) in &groups {
            total += *sum;
            count += c;
        }
        assert_eq!(total, summary.total);
        assert_eq!(count, summary.count);
    }

    #[test]
    fn by_category_sorted_by_sum_descending() {
        let groups = group_by_category(&sample());
        assert_eq!(groups[0].0, "Пчеловодство");
        assert_eq!(groups[0].2, MoneyCents::new(55_00));
        assert_eq!(groups[1].0, "Продукты");
        assert_eq!(groups[1].2, MoneyCents::new(35_00));
    }

    #[test]
    fn by_subcategory_groups_pairs() {
        let groups = group_by_subcategory(&sample());
        assert_eq!(
            groups[0],
            (
                "Пчеловодство".to_string(),
                "Сахар".to_string(),
                MoneyCents::new(50_00)
            )
        );
        // Missing subcategories fold into the placeholder bucket.
        assert!(groups.iter().any(|(cat, sub, sum)| {
            cat == "Продукты" && sub == EMPTY_CELL && *sum == MoneyCents::new(35_00)
        }));
    }

    #[test]
    fn overall_always_two_rows() {
        assert_eq!(overall_table(&sample()).rows.len(), 2);
        let empty = overall_table(&[]);
        assert_eq!(empty.rows.len(), 2);
        assert_eq!(empty.rows[0][1], "0.00");
        assert_eq!(empty.rows[1][1], "0");
    }

    #[test]
    fn sections_one_table_per_category_descending() {
        let sections = category_sections(&sample());
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].0, "Пчеловодство");
        let bees = &sections[0].1;
        assert_eq!(bees.rows[0], vec!["Сахар".to_string(), "50.00".to_string()]);
        assert_eq!(
            bees.rows[1],
            vec!["Инвентарь".to_string(), "5.00".to_string()]
        );
    }

    #[test]
    fn empty_input_builds_well_formed_tables() {
        let report = build_tables(TransactionKind::Expense, &[], Aggregation::ByCategory);
        assert!(report.data.is_empty());
        assert_eq!(report.summary.total, MoneyCents::ZERO);
        assert_eq!(report.summary.count, 0);
        let (_, table) = &report.aggregates[0];
        assert_eq!(table.columns.len(), 3);
        assert!(table.is_empty());

        let sections = build_tables(TransactionKind::Expense, &[], Aggregation::ByCategorySections);
        assert!(sections.chart.is_empty());
    }

    #[test]
    fn sheets_order_is_stable() {
        let report = build_tables(TransactionKind::Income, &sample(), Aggregation::Overall);
        let names: Vec<String> = report.sheets().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names[..3], ["data", "summary", "meta"]);
        assert_eq!(names[3], "aggregate_итого");
    }
}
