use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::{DirEntry, WalkDir};

const EXPORT_EXTENSION: &str = "xml";

/// Export files under `root`, recursively, in a stable (name sorted) order.
/// Entries that cannot be read are logged and skipped.
pub fn xml_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        match entry {
            Ok(entry) if is_export_file(&entry) => files.push(entry.into_path()),
            Ok(_) => {}
            Err(err) => warn!(error = %err, "skipping unreadable directory entry"),
        }
    }
    files
}

fn is_export_file(entry: &DirEntry) -> bool {
    entry.file_type().is_file()
        && entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case(EXPORT_EXTENSION))
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn finds_xml_files_recursively_in_name_order() {
        let tmp = tempdir().expect("temp");
        let nested = tmp.path().join("2021").join("march");
        fs::create_dir_all(&nested).expect("dirs");
        fs::write(tmp.path().join("b.xml"), "<smses/>").expect("b");
        fs::write(tmp.path().join("a.XML"), "<smses/>").expect("a");
        fs::write(tmp.path().join("notes.txt"), "x").expect("txt");
        fs::write(nested.join("c.xml"), "<smses/>").expect("c");
        fs::create_dir_all(tmp.path().join("dir.xml")).expect("dir named like a file");

        let files = xml_files(tmp.path());
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(tmp.path()).expect("prefix").to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("2021/march/c.xml"),
                PathBuf::from("a.XML"),
                PathBuf::from("b.xml"),
            ]
        );
    }

    #[test]
    fn missing_root_yields_nothing() {
        let tmp = tempdir().expect("temp");
        assert!(xml_files(&tmp.path().join("nope")).is_empty());
    }
}
