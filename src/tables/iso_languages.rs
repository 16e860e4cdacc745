//! ISO 639-3 language registry.
//!
//! Unlike the Bible tables this one is attribute-shaped: one
//! `iso_639_3_entry` element per language with everything in attributes.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use xmltree::Element;

use crate::constants::ISO639_PATTERN;
use crate::diagnostics::Diagnostics;
use crate::schema::{validate_records, ElementSpec};
use crate::tables::{FlatTable, TableExport};
use crate::xml::{load_table, XmlHeader, XmlSource};

pub const TABLE: &str = "ISO_639_3_Languages";
const ROOT_TAG: &str = "iso_639_3";
const RECORD_TAG: &str = "iso_639_3_entry";

const SPEC: ElementSpec = ElementSpec {
    tag: RECORD_TAG,
    compulsory_attributes: &["id", "name", "scope", "type"],
    optional_attributes: &["part1_code", "part2_code"],
    compulsory_elements: &[],
    optional_elements: &[],
    unique_attributes: &["id"],
    unique_elements: &[],
};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LanguageRow {
    pub id: String,
    pub name: String,
    pub scope: String,
    pub language_type: String,
    pub part1_code: Option<String>,
    pub part2_code: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Languages {
    pub rows: Vec<LanguageRow>,
    by_id: HashMap<String, usize>,
    // Uppercased name → id.
    by_name: HashMap<String, String>,
}

impl Languages {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn is_valid_code(&self, code: &str) -> bool {
        self.by_id.contains_key(code)
    }

    pub fn row(&self, code: &str) -> Option<&LanguageRow> {
        self.by_id.get(code).map(|&i| &self.rows[i])
    }

    pub fn name_for_code(&self, code: &str) -> Option<&str> {
        self.row(code).map(|r| r.name.as_str())
    }

    pub fn code_for_name(&self, name: &str) -> Option<&str> {
        self.by_name.get(&name.to_uppercase()).map(String::as_str)
    }
}

impl TableExport for Languages {
    const NAME: &'static str = TABLE;

    fn flat(&self) -> FlatTable {
        FlatTable {
            name: Self::NAME,
            fields: vec!["id", "name", "scope", "type", "part1_code", "part2_code"],
            rows: self
                .rows
                .iter()
                .map(|r| {
                    vec![
                        Some(r.id.clone()),
                        Some(r.name.clone()),
                        Some(r.scope.clone()),
                        Some(r.language_type.clone()),
                        r.part1_code.clone(),
                        r.part2_code.clone(),
                    ]
                })
                .collect(),
        }
    }
}

pub struct LanguagesConverter {
    source: XmlSource,
    data: Option<Languages>,
}

impl LanguagesConverter {
    pub fn load(path: &Path, diags: &mut Diagnostics) -> Result<Self> {
        let path = if path.is_dir() {
            // The upstream registry file keeps its own (lowercase) name.
            path.join("iso_639_3.xml")
        } else {
            path.to_path_buf()
        };
        let source = load_table(&path, ROOT_TAG, diags)?;
        validate_records(TABLE, &source.records(RECORD_TAG), &SPEC, diags);
        Ok(Self { source, data: None })
    }

    pub fn header(&self) -> Option<&XmlHeader> {
        self.source.header.as_ref()
    }

    pub fn import(&mut self, diags: &mut Diagnostics) -> &Languages {
        if self.data.is_none() {
            let mut data = Languages::default();
            for record in self.source.records(RECORD_TAG) {
                if let Some(row) = extract_row(record, diags) {
                    insert_row(&mut data, row, diags);
                }
            }
            self.data = Some(data);
        }
        self.data.as_ref().expect("just imported")
    }

    pub fn data(&self) -> &Languages {
        self.data
            .as_ref()
            .expect("LanguagesConverter: import() must run before data()")
    }

    pub fn into_data(self) -> Languages {
        self.data
            .expect("LanguagesConverter: import() must run before into_data()")
    }

    pub fn summary(&self) -> String {
        match &self.data {
            Some(data) => format!("{TABLE}: {} languages", data.len()),
            None => format!("{TABLE}: not yet imported"),
        }
    }
}

fn extract_row(record: &Element, diags: &mut Diagnostics) -> Option<LanguageRow> {
    let attr = |name: &str| record.attributes.get(name).map(|v| v.trim().to_string());
    let Some(id) = attr("id").filter(|v| !v.is_empty()) else {
        diags.error(TABLE, "entry without an id attribute skipped");
        return None;
    };
    if !ISO639_PATTERN.is_match(&id) {
        diags.error(TABLE, format!("'{id}' is not a well-formed ISO 639-3 id"));
    }
    Some(LanguageRow {
        name: attr("name").unwrap_or_default(),
        scope: attr("scope").unwrap_or_default(),
        language_type: attr("type").unwrap_or_default(),
        part1_code: attr("part1_code"),
        part2_code: attr("part2_code"),
        id,
    })
}

fn insert_row(data: &mut Languages, row: LanguageRow, diags: &mut Diagnostics) {
    if data.by_id.contains_key(&row.id) {
        diags.error(TABLE, format!("duplicate language id '{}' ignored", row.id));
        return;
    }
    let index = data.rows.len();
    data.by_id.insert(row.id.clone(), index);
    data.by_name
        .entry(row.name.to_uppercase())
        .or_insert_with(|| row.id.clone());
    data.rows.push(row);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FIXTURE: &str = r#"<iso_639_3>
  <header><work><version>1</version></work></header>
  <iso_639_3_entry id="eng" name="English" scope="I" type="L" part1_code="en" part2_code="eng"/>
  <iso_639_3_entry id="hbo" name="Ancient Hebrew" scope="I" type="H"/>
</iso_639_3>
"#;

    fn load(xml: &str) -> (LanguagesConverter, Diagnostics) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("iso_639_3.xml");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(xml.as_bytes())
            .unwrap();
        let mut diags = Diagnostics::new();
        let converter = LanguagesConverter::load(&path, &mut diags).unwrap();
        (converter, diags)
    }

    #[test]
    fn pivots_by_id_and_name() {
        let (mut converter, mut diags) = load(FIXTURE);
        let data = converter.import(&mut diags);
        assert!(data.is_valid_code("eng"));
        assert!(!data.is_valid_code("xxq"));
        assert_eq!(data.name_for_code("hbo"), Some("Ancient Hebrew"));
        assert_eq!(data.code_for_name("english"), Some("eng"));
        assert_eq!(data.row("eng").unwrap().part1_code.as_deref(), Some("en"));
        assert_eq!(data.row("hbo").unwrap().part1_code, None);
        assert!(diags.is_empty());
    }

    #[test]
    fn malformed_id_is_reported() {
        let (mut converter, mut diags) = load(&FIXTURE.replace("\"hbo\"", "\"HBO1\""));
        let data = converter.import(&mut diags);
        assert!(diags.any_contains("not a well-formed ISO 639-3 id"));
        // Still pivoted; the pipeline is best-effort.
        assert_eq!(data.len(), 2);
    }
}
