//! One module per reference table, each an instance of the same
//! load → validate → pivot pattern over one XML schema.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

pub mod book_orders;
pub mod books_codes;
pub mod books_names;
pub mod iso_languages;
pub mod organisational;
pub mod punctuation;
pub mod references_links;
pub mod usfm_markers;
pub mod versification;

/// Flat row-oriented rendition of a pivoted table, consumed by the
/// literal-source exporters (Python dicts, C arrays). `None` cells mean
/// the field was absent in the source, as opposed to present-but-empty.
#[derive(Clone, Debug)]
pub struct FlatTable {
    pub name: &'static str,
    pub fields: Vec<&'static str>,
    pub rows: Vec<Vec<Option<String>>>,
}

/// Implemented by every table's pivoted data so the exporters can treat
/// them uniformly.
pub trait TableExport: Serialize {
    const NAME: &'static str;

    /// Row-oriented view for the Python and C exporters.
    fn flat(&self) -> FlatTable;
}

/// Enumerate the member files of a folder-of-systems table
/// (`<prefix>_<system>.xml`), sorted by system name so that pivoting
/// and export order are deterministic.
pub fn system_files(folder: &Path, prefix: &str) -> Result<Vec<(String, PathBuf)>> {
    let mut found = Vec::new();
    let entries =
        fs::read_dir(folder).with_context(|| format!("reading folder {}", folder.display()))?;
    for entry in entries {
        let path = entry?.path();
        let Some(file_name) = path.file_name().and_then(OsStr::to_str) else {
            continue;
        };
        let system = file_name
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('_'))
            .and_then(|rest| rest.strip_suffix(".xml"));
        if let Some(system) = system {
            found.push((system.to_string(), path));
        }
    }
    found.sort();
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn system_files_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "BibleBookOrder_KJV.xml",
            "BibleBookOrder_Catholic.xml",
            "BibleBookOrder_draft.xml.bak",
            "notes.txt",
        ] {
            File::create(dir.path().join(name)).unwrap();
        }
        let found = system_files(dir.path(), "BibleBookOrder").unwrap();
        let names: Vec<&str> = found.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["Catholic", "KJV"]);
    }
}
