// JSON export

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

/// Pretty-print any serializable value to `path`, creating parent folders.
pub fn export<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| format!("{}: {e}", parent.display()))?;
    }
    let file = File::create(path).map_err(|e| format!("{}: {e}", path.display()))?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut writer, value).map_err(|e| e.to_string())?;
    writer.write_all(b"\n").map_err(|e| e.to_string())?;
    writer.flush().map_err(|e| e.to_string())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_json_export() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gold").join("_manifest.json");

        let mut manifest = BTreeMap::new();
        manifest.insert("pull_date", "2025-01-31");
        manifest.insert("name", "Driver\u{2019}s License");

        export(&manifest, &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.ends_with("}\n"));
        let parsed: BTreeMap<String, String> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed["pull_date"], "2025-01-31");
        assert_eq!(parsed["name"], "Driver\u{2019}s License");
    }
}
