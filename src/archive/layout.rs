use crate::state::ArtifactKind;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

/// Marker inside the names of in-flight temporary files
pub const TEMP_MARKER: &str = ".tmp";

/// `<root>/<kind dir>/<YYYY-MM-DD><suffix>`
pub fn artifact_path(root: &Path, kind: ArtifactKind, date: NaiveDate) -> PathBuf {
    root.join(kind.dir_name()).join(kind.file_name(date))
}

/// Subdirectory of the analytics directory holding monthly rollups
pub const MONTHLY_DIR: &str = "monthly";

/// `<root>/analytics/monthly/<YYYY-MM>-analytics.md` for the month containing `month`
pub fn rollup_path(root: &Path, month: NaiveDate) -> PathBuf {
    root.join(ArtifactKind::Analytics.dir_name())
        .join(MONTHLY_DIR)
        .join(format!("{}-analytics.md", month.format("%Y-%m")))
}

/// Prefix given to the temporary file that will become `kind`'s artifact for `date`
pub fn temp_prefix(kind: ArtifactKind, date: NaiveDate) -> String {
    format!(".{}{}", kind.file_name(date), TEMP_MARKER)
}

/// Prefix given to the temporary file that will become the rollup for `month`
pub fn rollup_temp_prefix(month: NaiveDate) -> String {
    format!(".{}-analytics.md{}", month.format("%Y-%m"), TEMP_MARKER)
}

/// Returns true for leftovers of an interrupted write (`.<name>.tmp*`)
pub fn is_temp_file_name(name: &str) -> bool {
    name.starts_with('.') && name.contains(TEMP_MARKER)
}

/// Checks the content rules for a complete artifact
///
/// Non-empty, valid UTF-8, and for structured content a JSON array.
pub fn check_well_formed(kind: ArtifactKind, bytes: &[u8]) -> Result<(), String> {
    if bytes.is_empty() {
        return Err("file is empty".to_string());
    }

    let text = std::str::from_utf8(bytes).map_err(|e| format!("not valid UTF-8: {}", e))?;

    if text.trim().is_empty() {
        return Err("file contains only whitespace".to_string());
    }

    if kind == ArtifactKind::StructuredContent {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| format!("not valid JSON: {}", e))?;
        if !value.is_array() {
            return Err("expected a JSON array".to_string());
        }
    }

    Ok(())
}
