//! CSV workbook writer.
//!
//! One artifact file holds every sheet: a marker record with the sheet name
//! opens each section, followed by the header and data records, with a blank
//! record between sheets. Sheet names are truncated to the conventional
//! 31-character spreadsheet limit.

use csv::WriterBuilder;
use engine::report::{RenderError, Table};

const SHEET_NAME_LIMIT: usize = 31;

/// Truncates a sheet name to the spreadsheet limit, marking the cut.
pub(crate) fn truncate_sheet_name(name: &str) -> String {
    if name.chars().count() <= SHEET_NAME_LIMIT {
        return name.to_string();
    }
    let head: String = name.chars().take(SHEET_NAME_LIMIT - 3).collect();
    format!("{head}...")
}

/// Serializes the sheets into CSV bytes.
pub(crate) fn write_workbook(sheets: &[(String, Table)]) -> Result<Vec<u8>, RenderError> {
    // Records vary in width (marker rows, blank separators), so the writer
    // must not enforce a uniform field count.
    let mut writer = WriterBuilder::new().flexible(true).from_writer(vec![]);

    for (index, (name, table)) in sheets.iter().enumerate() {
        if index > 0 {
            writer
                .write_record(std::iter::empty::<&str>())
                .map_err(|err| RenderError::Failed(err.to_string()))?;
        }
        writer
            .write_record([format!("== {} ==", truncate_sheet_name(name))])
            .map_err(|err| RenderError::Failed(err.to_string()))?;
        writer
            .write_record(&table.columns)
            .map_err(|err| RenderError::Failed(err.to_string()))?;
        for row in &table.rows {
            writer
                .write_record(row)
                .map_err(|err| RenderError::Failed(err.to_string()))?;
        }
    }

    writer
        .into_inner()
        .map_err(|err| RenderError::Failed(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_names_pass_through() {
        assert_eq!(truncate_sheet_name("data"), "data");
    }

    #[test]
    fn long_names_are_cut_with_ellipsis() {
        let name = "a".repeat(40);
        let truncated = truncate_sheet_name(&name);
        assert_eq!(truncated.chars().count(), SHEET_NAME_LIMIT);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn sheets_are_separated_by_blank_records() {
        let sheet = Table {
            columns: vec!["a".to_string(), "b".to_string()],
            rows: vec![vec!["1".to_string(), "2".to_string()]],
        };
        let bytes = write_workbook(&[
            ("first".to_string(), sheet.clone()),
            ("second".to_string(), sheet),
        ])
        .unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("== first ==\na,b\n1,2\n\n== second =="));
    }
}
