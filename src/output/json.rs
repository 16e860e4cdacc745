//! JSON mirror of the pivoted mappings.
//!
//! A pretty-printed interchange file for non-Rust consumers, with a
//! small metadata head carrying the source work's title/version/date and
//! the generation timestamp.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::json;

use crate::tables::TableExport;
use crate::xml::XmlHeader;

pub fn json_path(out_dir: &Path, table: &str) -> PathBuf {
    out_dir.join(format!("{table}.json"))
}

pub fn write<T: TableExport>(data: &T, header: Option<&XmlHeader>, out_dir: &Path) -> Result<()> {
    let path = json_path(out_dir, T::NAME);
    let document = json!({
        "meta": {
            "table": T::NAME,
            "title": header.and_then(|h| h.title.clone()),
            "version": header.and_then(|h| h.version.clone()),
            "date": header.and_then(|h| h.date.clone()),
            "generated": Utc::now().to_rfc3339(),
        },
        "data": data,
    });
    let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &document)
        .with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::FlatTable;
    use serde::Serialize;
    use std::collections::HashMap;

    #[derive(Serialize)]
    struct Pair {
        map: HashMap<String, u16>,
    }

    impl TableExport for Pair {
        const NAME: &'static str = "Pair";

        fn flat(&self) -> FlatTable {
            FlatTable {
                name: Self::NAME,
                fields: vec![],
                rows: vec![],
            }
        }
    }

    #[test]
    fn round_trips_keys_and_values() {
        let dir = tempfile::tempdir().unwrap();
        let mut map = HashMap::new();
        map.insert("GEN".to_string(), 1u16);
        map.insert("EXO".to_string(), 2u16);
        let header = XmlHeader {
            title: Some("Codes".into()),
            version: Some("0.9".into()),
            date: None,
        };
        write(&Pair { map: map.clone() }, Some(&header), dir.path()).unwrap();

        let text = std::fs::read_to_string(json_path(dir.path(), "Pair")).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["meta"]["title"], "Codes");
        assert!(parsed["meta"]["generated"].is_string());
        let reread: HashMap<String, u16> =
            serde_json::from_value(parsed["data"]["map"].clone()).unwrap();
        assert_eq!(reread, map);
    }
}
