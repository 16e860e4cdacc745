//! Punctuation systems.
//!
//! One `BiblePunctuationSystem_<system>.xml` per tradition: a flat set
//! of key elements (`chapterVerseSeparator`, `bookChapterSeparator`, …)
//! whose text is the punctuation value. The root itself is the single
//! "record", so the generic validator checks the key set directly.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostics;
use crate::schema::{validate_records, ElementSpec};
use crate::tables::{system_files, FlatTable, TableExport};
use crate::xml::{child_elements, element_text, load_table};

pub const TABLE: &str = "BiblePunctuationSystems";
const FILE_PREFIX: &str = "BiblePunctuationSystem";
const ROOT_TAG: &str = "BiblePunctuationSystem";

const SPEC: ElementSpec = ElementSpec {
    tag: ROOT_TAG,
    compulsory_attributes: &[],
    optional_attributes: &[],
    compulsory_elements: &[
        "sentenceCapitalisation",
        "properNounCapitalisation",
        "statementTerminator",
        "questionTerminator",
        "exclamationTerminator",
        "chapterVerseSeparator",
        "bookChapterSeparator",
    ],
    optional_elements: &[
        "commaPauseCharacter",
        "spaceAllowedAfterBCS",
        "chapterBridgeCharacter",
        "verseBridgeCharacter",
        "bookBridgeCharacter",
        "punctuationAfterBookAbbreviation",
        "allowedVerseSuffixes",
        "verseSeparator",
        "bookSeparator",
        "chapterSeparator",
    ],
    unique_attributes: &[],
    unique_elements: &[],
};

/// One system's punctuation values, insertion-ordered.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PunctuationSystem {
    pub entries: Vec<(String, String)>,
    values: HashMap<String, String>,
}

impl PunctuationSystem {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|(k, _)| k.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PunctuationSystems {
    pub systems: HashMap<String, PunctuationSystem>,
    pub names: Vec<String>,
}

impl PunctuationSystems {
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    pub fn contains_system(&self, name: &str) -> bool {
        self.systems.contains_key(name)
    }

    pub fn system(&self, name: &str) -> Option<&PunctuationSystem> {
        self.systems.get(name)
    }

    pub fn system_names(&self) -> &[String] {
        &self.names
    }

    pub fn value(&self, system: &str, key: &str) -> Option<&str> {
        self.systems.get(system)?.get(key)
    }
}

impl TableExport for PunctuationSystems {
    const NAME: &'static str = TABLE;

    fn flat(&self) -> FlatTable {
        FlatTable {
            name: Self::NAME,
            fields: vec!["system", "key", "value"],
            rows: self
                .names
                .iter()
                .flat_map(|name| {
                    self.systems[name].entries.iter().map(|(k, v)| {
                        vec![Some(name.clone()), Some(k.clone()), Some(v.clone())]
                    })
                })
                .collect(),
        }
    }
}

pub struct PunctuationSystemsConverter {
    raw: Vec<(String, PunctuationSystem)>,
    data: Option<PunctuationSystems>,
}

impl PunctuationSystemsConverter {
    pub fn load(folder: &Path, diags: &mut Diagnostics) -> Result<Self> {
        let mut raw = Vec::new();
        for (system, path) in system_files(folder, FILE_PREFIX)? {
            let source = match load_table(&path, ROOT_TAG, diags) {
                Ok(source) => source,
                Err(err) => {
                    diags.error(TABLE, format!("system '{system}' unusable: {err:#}"));
                    continue;
                }
            };
            let table = format!("{TABLE}/{system}");
            validate_records(&table, &[&source.root], &SPEC, diags);
            let mut parsed = PunctuationSystem::default();
            for child in child_elements(&source.root) {
                let value = element_text(child);
                if parsed.values.contains_key(&child.name) {
                    diags.error(&table, format!("key '{}' given twice", child.name));
                    continue;
                }
                parsed.entries.push((child.name.clone(), value.clone()));
                parsed.values.insert(child.name.clone(), value);
            }
            raw.push((system, parsed));
        }
        Ok(Self { raw, data: None })
    }

    pub fn import(&mut self, diags: &mut Diagnostics) -> &PunctuationSystems {
        if self.data.is_none() {
            let mut data = PunctuationSystems::default();
            for (system, parsed) in &self.raw {
                data.names.push(system.clone());
                data.systems.insert(system.clone(), parsed.clone());
            }
            data.names.sort();
            for (a, b) in data.names.iter().tuple_combinations() {
                if data.systems[a] == data.systems[b] {
                    diags.warn(TABLE, format!("systems '{a}' and '{b}' are identical"));
                }
            }
            self.data = Some(data);
        }
        self.data.as_ref().expect("just imported")
    }

    pub fn data(&self) -> &PunctuationSystems {
        self.data
            .as_ref()
            .expect("PunctuationSystemsConverter: import() must run before data()")
    }

    pub fn summary(&self) -> String {
        match &self.data {
            Some(data) => format!(
                "{TABLE}: {} systems ({})",
                data.len(),
                data.names.iter().join(", ")
            ),
            None => format!("{TABLE}: {} systems loaded, not yet imported", self.raw.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const BODY: &str = "<sentenceCapitalisation>Y</sentenceCapitalisation>\
        <properNounCapitalisation>Y</properNounCapitalisation>\
        <statementTerminator>.</statementTerminator>\
        <questionTerminator>?</questionTerminator>\
        <exclamationTerminator>!</exclamationTerminator>\
        <chapterVerseSeparator>:</chapterVerseSeparator>\
        <bookChapterSeparator>.</bookChapterSeparator>";

    fn write_system(dir: &Path, system: &str, body: &str) {
        let xml = format!(
            "<BiblePunctuationSystem>\
             <header><work><version>1</version></work></header>{body}\
             </BiblePunctuationSystem>"
        );
        std::fs::File::create(dir.join(format!("BiblePunctuationSystem_{system}.xml")))
            .unwrap()
            .write_all(xml.as_bytes())
            .unwrap();
    }

    #[test]
    fn pivots_keys_in_order() {
        let dir = tempfile::tempdir().unwrap();
        write_system(dir.path(), "English", BODY);
        let mut diags = Diagnostics::new();
        let mut converter = PunctuationSystemsConverter::load(dir.path(), &mut diags).unwrap();
        let data = converter.import(&mut diags);
        assert_eq!(data.value("English", "chapterVerseSeparator"), Some(":"));
        assert_eq!(data.value("English", "questionTerminator"), Some("?"));
        assert_eq!(data.value("English", "noSuchKey"), None);
        let keys = data.system("English").unwrap().keys();
        assert_eq!(keys[0], "sentenceCapitalisation");
        assert!(diags.is_empty());
    }

    #[test]
    fn missing_compulsory_key_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let body = BODY.replace("<questionTerminator>?</questionTerminator>", "");
        write_system(dir.path(), "Partial", &body);
        let mut diags = Diagnostics::new();
        let mut converter = PunctuationSystemsConverter::load(dir.path(), &mut diags).unwrap();
        converter.import(&mut diags);
        assert!(diags.any_contains("'questionTerminator' missing"));
    }

    #[test]
    fn identical_systems_warn() {
        let dir = tempfile::tempdir().unwrap();
        write_system(dir.path(), "A", BODY);
        write_system(dir.path(), "B", BODY);
        let mut diags = Diagnostics::new();
        let mut converter = PunctuationSystemsConverter::load(dir.path(), &mut diags).unwrap();
        converter.import(&mut diags);
        assert!(diags.any_contains("'A' and 'B' are identical"));
    }
}
