//! Versification systems.
//!
//! One `BibleVersificationSystem_<system>.xml` per tradition: for each
//! book, the chapter count and per-chapter verse counts, with optional
//! omitted/combined/reordered verse annotations. Systems are checked
//! against the book-codes registry and against the reference system
//! (`BibMaxRef`) which carries the maximal chapter set.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use xmltree::Element;

use crate::constants::REFERENCE_VERSIFICATION_SYSTEM;
use crate::diagnostics::Diagnostics;
use crate::schema::{validate_records, ElementSpec};
use crate::tables::{system_files, FlatTable, TableExport};
use crate::xml::{child_elements, child_text, element_text, load_table};

use super::books_codes::BooksCodes;

pub const TABLE: &str = "BibleVersificationSystems";
const FILE_PREFIX: &str = "BibleVersificationSystem";
const ROOT_TAG: &str = "BibleVersificationSystem";
const RECORD_TAG: &str = "BibleBookVersification";

const SPEC: ElementSpec = ElementSpec {
    tag: RECORD_TAG,
    compulsory_attributes: &[],
    optional_attributes: &[],
    compulsory_elements: &["nameEnglish", "referenceAbbreviation", "numChapters"],
    optional_elements: &["numVerses"],
    unique_attributes: &[],
    unique_elements: &["referenceAbbreviation"],
};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterInfo {
    pub verse_count: u16,
    pub omitted_verses: Vec<u16>,
    pub combined_verses: Vec<String>,
    pub reordered_verses: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookVersification {
    pub name_english: String,
    pub num_chapters: u16,
    pub chapters: HashMap<u16, ChapterInfo>,
}

/// One system: BBB → per-book chapter/verse structure.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versification {
    pub books: HashMap<String, BookVersification>,
    /// BBBs in document order.
    pub order: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct VersificationSystems {
    pub systems: HashMap<String, Versification>,
    pub names: Vec<String>,
}

impl VersificationSystems {
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    pub fn contains_system(&self, name: &str) -> bool {
        self.systems.contains_key(name)
    }

    pub fn system(&self, name: &str) -> Option<&Versification> {
        self.systems.get(name)
    }

    pub fn system_names(&self) -> &[String] {
        &self.names
    }

    pub fn chapter_count(&self, system: &str, bbb: &str) -> Option<u16> {
        Some(self.systems.get(system)?.books.get(bbb)?.num_chapters)
    }

    pub fn verse_count(&self, system: &str, bbb: &str, chapter: u16) -> Option<u16> {
        Some(
            self.systems
                .get(system)?
                .books
                .get(bbb)?
                .chapters
                .get(&chapter)?
                .verse_count,
        )
    }

    pub fn omitted_verses(&self, system: &str, bbb: &str, chapter: u16) -> &[u16] {
        self.systems
            .get(system)
            .and_then(|s| s.books.get(bbb))
            .and_then(|b| b.chapters.get(&chapter))
            .map(|c| c.omitted_verses.as_slice())
            .unwrap_or(&[])
    }
}

impl TableExport for VersificationSystems {
    const NAME: &'static str = TABLE;

    fn flat(&self) -> FlatTable {
        let mut rows = Vec::new();
        for name in &self.names {
            let system = &self.systems[name];
            for bbb in &system.order {
                let book = &system.books[bbb];
                for chapter in book.chapters.keys().sorted() {
                    let info = &book.chapters[chapter];
                    rows.push(vec![
                        Some(name.clone()),
                        Some(bbb.clone()),
                        Some(chapter.to_string()),
                        Some(info.verse_count.to_string()),
                        if info.omitted_verses.is_empty() {
                            None
                        } else {
                            Some(info.omitted_verses.iter().join(","))
                        },
                    ]);
                }
            }
        }
        FlatTable {
            name: Self::NAME,
            fields: vec![
                "system",
                "referenceAbbreviation",
                "chapter",
                "numVerses",
                "omittedVerses",
            ],
            rows,
        }
    }
}

pub struct VersificationSystemsConverter {
    raw: Vec<(String, Versification)>,
    data: Option<VersificationSystems>,
}

impl VersificationSystemsConverter {
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
            let records = source.records(RECORD_TAG);
            validate_records(&format!("{TABLE}/{system}"), &records, &SPEC, diags);
            raw.push((system.clone(), parse_system(&system, &records, diags)));
        }
        Ok(Self { raw, data: None })
    }

    /// Memoized pivot plus registry/reference-system cross-checks.
    pub fn import(
        &mut self,
        registry: &BooksCodes,
        diags: &mut Diagnostics,
    ) -> &VersificationSystems {
        if self.data.is_none() {
            let mut data = VersificationSystems::default();
            for (system, versification) in &self.raw {
                data.names.push(system.clone());
                data.systems.insert(system.clone(), versification.clone());
            }
            data.names.sort();
            cross_check(&data, registry, diags);
            self.data = Some(data);
        }
        self.data.as_ref().expect("just imported")
    }

    pub fn data(&self) -> &VersificationSystems {
        self.data
            .as_ref()
            .expect("VersificationSystemsConverter: import() must run before data()")
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

fn parse_system(system: &str, records: &[&Element], diags: &mut Diagnostics) -> Versification {
    let table = format!("{TABLE}/{system}");
    let mut versification = Versification::default();
    for record in records {
        let Some(bbb) = child_text(record, "referenceAbbreviation").filter(|v| !v.is_empty())
        else {
            diags.error(&table, "book record without referenceAbbreviation skipped");
            continue;
        };
        let num_chapters = child_text(record, "numChapters")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| {
                diags.error(&table, format!("'{bbb}': numChapters missing or invalid"));
                0
            });
        let mut book = BookVersification {
            name_english: child_text(record, "nameEnglish").unwrap_or_default(),
            num_chapters,
            chapters: HashMap::new(),
        };
        for verses in child_elements(record).filter(|e| e.name == "numVerses") {
            let Some(chapter) = verses
                .attributes
                .get("chapter")
                .and_then(|v| v.parse::<u16>().ok())
            else {
                diags.error(
                    &table,
                    format!("'{bbb}': numVerses without a usable chapter attribute"),
                );
                continue;
            };
            let Some(verse_count) = element_text(verses).parse::<u16>().ok() else {
                diags.error(
                    &table,
                    format!("'{bbb}' chapter {chapter}: verse count is not an integer"),
                );
                continue;
            };
            if chapter == 0 || (num_chapters > 0 && chapter > num_chapters) {
                diags.warn(
                    &table,
                    format!("'{bbb}': chapter {chapter} outside 1..={num_chapters}"),
                );
            }
            let info = ChapterInfo {
                verse_count,
                omitted_verses: parse_verse_list(verses.attributes.get("omittedVerses")),
                combined_verses: parse_string_list(verses.attributes.get("combinedVerses")),
                reordered_verses: parse_string_list(verses.attributes.get("reorderedVerses")),
            };
            if book.chapters.insert(chapter, info).is_some() {
                diags.error(&table, format!("'{bbb}': chapter {chapter} given twice"));
            }
        }
        if versification.books.contains_key(&bbb) {
            diags.error(&table, format!("duplicate book '{bbb}' ignored"));
            continue;
        }
        versification.order.push(bbb.clone());
        versification.books.insert(bbb, book);
    }
    versification
}

fn parse_verse_list(raw: Option<&String>) -> Vec<u16> {
    raw.map(|v| {
        v.split(',')
            .filter_map(|part| part.trim().parse().ok())
            .collect()
    })
    .unwrap_or_default()
}

fn parse_string_list(raw: Option<&String>) -> Vec<String> {
    raw.map(|v| v.split(',').map(|part| part.trim().to_string()).collect())
        .unwrap_or_default()
}

fn cross_check(data: &VersificationSystems, registry: &BooksCodes, diags: &mut Diagnostics) {
    for name in &data.names {
        let system = &data.systems[name];
        for bbb in &system.order {
            if !registry.contains(bbb) {
                diags.error(
                    TABLE,
                    format!("'{name}': unknown book code '{bbb}' is not in the registry"),
                );
            }
        }
    }
    // Chapters the reference system has but this one lacks.
    if let Some(reference) = data.systems.get(REFERENCE_VERSIFICATION_SYSTEM) {
        for name in data.names.iter().filter(|n| *n != REFERENCE_VERSIFICATION_SYSTEM) {
            let system = &data.systems[name];
            for bbb in &system.order {
                let Some(reference_book) = reference.books.get(bbb) else {
                    continue;
                };
                let book = &system.books[bbb];
                for chapter in reference_book.chapters.keys().sorted() {
                    if *chapter <= book.num_chapters && !book.chapters.contains_key(chapter) {
                        diags.warn(
                            TABLE,
                            format!(
                                "'{name}': '{bbb}' chapter {chapter} missing (present in {REFERENCE_VERSIFICATION_SYSTEM})"
                            ),
                        );
                    }
                }
            }
        }
    }
    // Wholesale duplicate systems.
    for (a, b) in data.names.iter().tuple_combinations() {
        if data.systems[a] == data.systems[b] {
            diags.warn(TABLE, format!("systems '{a}' and '{b}' are identical"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::books_codes::BooksCodesConverter;
    use std::io::Write;
    use std::path::PathBuf;

    fn registry(dir: &Path) -> BooksCodes {
        let mut xml =
            String::from("<BibleBooksCodes><header><work><version>1</version></work></header>");
        for (i, bbb) in ["GEN", "EXO"].iter().enumerate() {
            xml.push_str(&format!(
                "<BibleBookCodes>\
                 <referenceAbbreviation>{bbb}</referenceAbbreviation>\
                 <referenceNumber>{}</referenceNumber>\
                 <bookName>n</bookName><bookNameEnglish>n</bookNameEnglish>\
                 </BibleBookCodes>",
                i + 1
            ));
        }
        xml.push_str("</BibleBooksCodes>");
        let path = dir.join("BibleBooksCodes.xml");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(xml.as_bytes())
            .unwrap();
        let mut diags = Diagnostics::new();
        let mut converter = BooksCodesConverter::load(&path, &mut diags).unwrap();
        converter.import(&mut diags);
        converter.into_data()
    }

    fn write_system(dir: &Path, system: &str, body: &str) -> PathBuf {
        let xml = format!(
            "<BibleVersificationSystem>\
             <header><work><version>1</version></work></header>{body}\
             </BibleVersificationSystem>"
        );
        let path = dir.join(format!("BibleVersificationSystem_{system}.xml"));
        std::fs::File::create(&path)
            .unwrap()
            .write_all(xml.as_bytes())
            .unwrap();
        path
    }

    const GEN_THREE_CHAPTERS: &str = "<BibleBookVersification>\
        <nameEnglish>Genesis</nameEnglish>\
        <referenceAbbreviation>GEN</referenceAbbreviation>\
        <numChapters>3</numChapters>\
        <numVerses chapter=\"1\">31</numVerses>\
        <numVerses chapter=\"2\" omittedVerses=\"11,14\">25</numVerses>\
        <numVerses chapter=\"3\">24</numVerses>\
        </BibleBookVersification>";

    #[test]
    fn pivots_counts_and_annotations() {
        let dir = tempfile::tempdir().unwrap();
        write_system(dir.path(), "Test", GEN_THREE_CHAPTERS);
        let registry = registry(dir.path());
        let mut diags = Diagnostics::new();
        let mut converter = VersificationSystemsConverter::load(dir.path(), &mut diags).unwrap();
        let data = converter.import(&registry, &mut diags);
        assert_eq!(data.verse_count("Test", "GEN", 2), Some(25));
        assert_eq!(data.chapter_count("Test", "GEN"), Some(3));
        assert_eq!(data.omitted_verses("Test", "GEN", 2), &[11, 14]);
        assert_eq!(data.verse_count("Test", "GEN", 9), None);
        assert!(diags.is_empty());
    }

    #[test]
    fn chapter_missing_relative_to_reference_system_warns() {
        let dir = tempfile::tempdir().unwrap();
        write_system(dir.path(), REFERENCE_VERSIFICATION_SYSTEM, GEN_THREE_CHAPTERS);
        // Same book, chapter 3 count absent.
        let partial = GEN_THREE_CHAPTERS.replace("<numVerses chapter=\"3\">24</numVerses>", "");
        write_system(dir.path(), "Partial", &partial);
        let registry = registry(dir.path());
        let mut diags = Diagnostics::new();
        let mut converter = VersificationSystemsConverter::load(dir.path(), &mut diags).unwrap();
        converter.import(&registry, &mut diags);
        assert!(diags.any_contains("'GEN' chapter 3 missing"));
        assert_eq!(diags.error_count(), 0);
    }

    #[test]
    fn unknown_book_code_is_an_error_not_a_crash() {
        let dir = tempfile::tempdir().unwrap();
        let odd = GEN_THREE_CHAPTERS.replace("GEN", "ZZZ");
        write_system(dir.path(), "Odd", &odd);
        let registry = registry(dir.path());
        let mut diags = Diagnostics::new();
        let mut converter = VersificationSystemsConverter::load(dir.path(), &mut diags).unwrap();
        let data = converter.import(&registry, &mut diags);
        assert!(diags.any_contains("unknown book code 'ZZZ'"));
        assert_eq!(data.chapter_count("Odd", "ZZZ"), Some(3));
    }

    #[test]
    fn identical_systems_warn() {
        let dir = tempfile::tempdir().unwrap();
        write_system(dir.path(), "A", GEN_THREE_CHAPTERS);
        write_system(dir.path(), "B", GEN_THREE_CHAPTERS);
        let registry = registry(dir.path());
        let mut diags = Diagnostics::new();
        let mut converter = VersificationSystemsConverter::load(dir.path(), &mut diags).unwrap();
        converter.import(&registry, &mut diags);
        assert!(diags.any_contains("'A' and 'B' are identical"));
    }
}
