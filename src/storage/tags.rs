//! Tag table storage and loading

use std::path::Path;
use tracing::{info, warn};

use crate::analysis::tags::TagTable;
use crate::error::{Result, ScanError};

/// Load a tag table from a JSON file: `[{"id": ..., "keywords": [...]}, ...]`
pub fn load_tag_table(path: &Path) -> Result<TagTable> {
    let content = std::fs::read_to_string(path)?;
    let table: TagTable = serde_json::from_str(&content)?;
    if table.is_empty() {
        return Err(ScanError::InvalidInput(format!(
            "tag table {} has no categories",
            path.display()
        )));
    }
    info!("Loaded {} tag categories from {}", table.len(), path.display());
    Ok(table)
}

/// Load a tag table, falling back to the built-in table if the file is missing or unreadable
pub fn load_tag_table_or_builtin(path: &Path) -> TagTable {
    if !path.exists() {
        return TagTable::builtin();
    }
    match load_tag_table(path) {
        Ok(table) => table,
        Err(e) => {
            warn!("Using built-in tag table, {} could not be loaded: {}", path.display(), e);
            TagTable::builtin()
        }
    }
}

/// Save a tag table to a JSON file
pub fn save_tag_table(table: &TagTable, path: &Path) -> Result<()> {
    let content = serde_json::to_string_pretty(table)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::tags::TagConfig;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_save_and_load_builtin_table() {
        let temp_file = NamedTempFile::new().unwrap();
        save_tag_table(&TagTable::builtin(), temp_file.path()).unwrap();
        let loaded = load_tag_table(temp_file.path()).unwrap();
        assert_eq!(loaded, TagTable::builtin());
    }

    #[test]
    fn test_load_hand_written_table() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"[{{"id": "invoice", "keywords": ["发票", "Invoice"]}}, {{"id": "misc"}}]"#
        )
        .unwrap();

        let table = load_tag_table(temp_file.path()).unwrap();
        assert_eq!(table.all_tag_ids(), vec!["invoice".to_string(), "misc".to_string()]);
        assert_eq!(table.get("invoice"), Some(&TagConfig::new("invoice", &["发票", "Invoice"])));
        assert!(table.get("misc").unwrap().keywords.is_empty());
    }

    #[test]
    fn test_load_errors() {
        assert!(matches!(
            load_tag_table(Path::new("/nonexistent/path/tags.json")),
            Err(ScanError::Io(_))
        ));

        let mut invalid = NamedTempFile::new().unwrap();
        writeln!(invalid, "not json").unwrap();
        assert!(matches!(load_tag_table(invalid.path()), Err(ScanError::Json(_))));

        let mut empty = NamedTempFile::new().unwrap();
        writeln!(empty, "[]").unwrap();
        assert!(matches!(load_tag_table(empty.path()), Err(ScanError::InvalidInput(_))));
    }

    #[test]
    fn test_fallback_to_builtin() {
        assert_eq!(
            load_tag_table_or_builtin(Path::new("/nonexistent/path/tags.json")),
            TagTable::builtin()
        );

        let mut invalid = NamedTempFile::new().unwrap();
        writeln!(invalid, "{{").unwrap();
        assert_eq!(load_tag_table_or_builtin(invalid.path()), TagTable::builtin());
    }
}
