//! Report artifact rendering.
//!
//! Implements the engine's [`Renderer`] contract with two backends: a CSV
//! workbook ([`workbook`]) and an SVG table chart ([`chart`]). Artifacts are
//! written whole into the export directory; a failed render leaves no partial
//! file behind.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use engine::report::{RenderError, Renderer, ReportSummary, Table};

mod chart;
mod workbook;

pub use chart::sanitize_bmp;

/// File-producing renderer writing under a fixed export directory.
pub struct ArtifactRenderer {
    export_dir: PathBuf,
    seq: AtomicU64,
}

impl ArtifactRenderer {
    pub fn new(export_dir: impl Into<PathBuf>) -> Result<Self, RenderError> {
        let export_dir = export_dir.into();
        fs::create_dir_all(&export_dir)?;
        Ok(Self {
            export_dir,
            seq: AtomicU64::new(0),
        })
    }

    /// Collision-free artifact path: timestamp plus a process-local sequence.
    fn artifact_path(&self, extension: &str) -> PathBuf {
        let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        self.export_dir
            .join(format!("report_{stamp}_{seq}.{extension}"))
    }
}

impl Renderer for ArtifactRenderer {
    fn render_workbook(&self, sheets: &[(String, Table)]) -> Result<PathBuf, RenderError> {
        let path = self.artifact_path("csv");
        let data = workbook::write_workbook(sheets)?;
        write_whole(&path, &data)?;
        tracing::info!(path = %path.display(), "wrote workbook");
        Ok(path)
    }

    fn render_chart(
        &self,
        tables: &[(String, Table)],
        summary: &ReportSummary,
    ) -> Result<PathBuf, RenderError> {
        let path = self.artifact_path("svg");
        let document = chart::draw(tables, summary);
        svg::save(&path, &document)?;
        tracing::info!(path = %path.display(), "wrote chart");
        Ok(path)
    }
}

/// Write-then-rename so a crash mid-write cannot leave a partial artifact.
fn write_whole(path: &Path, data: &[u8]) -> Result<(), RenderError> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, data)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::{MoneyCents, TransactionKind};

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../../target/test_exports")
            .join(name);
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn table(rows: &[(&str, &str)]) -> Table {
        Table {
            columns: vec!["Подкатегория".to_string(), "Сумма".to_string()],
            rows: rows
                .iter()
                .map(|(a, b)| vec![a.to_string(), b.to_string()])
                .collect(),
        }
    }

    fn summary(count: usize) -> ReportSummary {
        ReportSummary {
            kind: TransactionKind::Expense,
            total: MoneyCents::new(55_00),
            count,
        }
    }

    #[test]
    fn workbook_artifact_contains_sheets_in_order() {
        let renderer = ArtifactRenderer::new(scratch_dir("workbook")).unwrap();
        let sheets = vec![
            ("data".to_string(), table(&[("Сахар", "50.00")])),
            ("summary".to_string(), table(&[])),
            (
                "очень длинное имя листа которое придётся обрезать".to_string(),
                table(&[("Инвентарь", "5.00")]),
            ),
        ];
        let path = renderer.render_workbook(&sheets).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let data_pos = content.find("== data ==").unwrap();
        let summary_pos = content.find("== summary ==").unwrap();
        assert!(data_pos < summary_pos);
        assert!(content.contains("Сахар"));
        // Long sheet names are truncated to the 31-character sheet limit.
        let truncated = workbook::truncate_sheet_name(
            "очень длинное имя листа которое придётся обрезать",
        );
        assert!(truncated.chars().count() <= 31);
        assert!(content.contains(&truncated));
    }

    #[test]
    fn chart_artifact_is_svg_with_title() {
        let renderer = ArtifactRenderer::new(scratch_dir("chart")).unwrap();
        let tables = vec![("по категориям".to_string(), table(&[("Сахар", "50.00")]))];
        let path = renderer.render_chart(&tables, &summary(2)).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("<svg"));
        assert!(content.contains("Траты"));
        assert!(content.contains("Сахар"));
    }

    #[test]
    fn empty_chart_renders_the_empty_state() {
        let renderer = ArtifactRenderer::new(scratch_dir("chart_empty")).unwrap();
        let path = renderer.render_chart(&[], &summary(0)).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("нет данных"));
    }

    #[test]
    fn chart_caps_the_number_of_sections() {
        let renderer = ArtifactRenderer::new(scratch_dir("chart_cap")).unwrap();
        let tables: Vec<(String, Table)> = (0..20)
            .map(|i| (format!("Категория{i}"), table(&[("x", "1.00")])))
            .collect();
        let path = renderer.render_chart(&tables, &summary(20)).unwrap();
        let content = fs::read_to_string(&path).unwrap();

        let drawn = (0..20)
            .filter(|i| content.contains(&format!("Категория{i}")))
            .count();
        assert_eq!(drawn, engine::report::MAX_CHART_SECTIONS);
    }

    #[test]
    fn artifact_paths_do_not_collide() {
        let renderer = ArtifactRenderer::new(scratch_dir("collide")).unwrap();
        let a = renderer.render_chart(&[], &summary(0)).unwrap();
        let b = renderer.render_chart(&[], &summary(0)).unwrap();
        assert_ne!(a, b);
    }
}
