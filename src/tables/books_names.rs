//! Book name systems.
//!
//! One `BibleBooksNames_<lang>.xml` per language: division names
//! ("Old Testament"), bookname leaders ("1" → "I", "First"), and
//! per-book default names/abbreviations with extra input abbreviations.
//! Pivoting expands every name into the set of unambiguous uppercased
//! prefixes a user might type, so lookup can accept truncated input.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::Result;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use xmltree::Element;

use crate::constants::ISO639_PATTERN;
use crate::diagnostics::Diagnostics;
use crate::schema::{validate_records, ElementSpec};
use crate::tables::{system_files, FlatTable, TableExport};
use crate::xml::{child_elements, child_text, element_text, load_table};

use super::books_codes::BooksCodes;

pub const TABLE: &str = "BibleBooksNames";
const FILE_PREFIX: &str = "BibleBooksNames";
const ROOT_TAG: &str = "BibleBooksNames";

const DIVISION_TAG: &str = "BibleDivisionNames";
const LEADER_TAG: &str = "BibleBooknameLeaders";
const BOOK_TAG: &str = "BibleBookNames";

/// Shortest prefix the expanded input lookup will admit.
const MIN_INPUT_PREFIX: usize = 3;

const DIVISION_SPEC: ElementSpec = ElementSpec {
    tag: DIVISION_TAG,
    compulsory_attributes: &[],
    optional_attributes: &[],
    compulsory_elements: &["defaultName", "defaultAbbreviation"],
    optional_elements: &["inputAbbreviation", "includesBook"],
    unique_attributes: &[],
    unique_elements: &["defaultName", "defaultAbbreviation"],
};

const LEADER_SPEC: ElementSpec = ElementSpec {
    tag: LEADER_TAG,
    compulsory_attributes: &["standardLeader"],
    optional_attributes: &[],
    compulsory_elements: &[],
    optional_elements: &["inputAbbreviation"],
    unique_attributes: &["standardLeader"],
    unique_elements: &[],
};

const BOOK_SPEC: ElementSpec = ElementSpec {
    tag: BOOK_TAG,
    compulsory_attributes: &["referenceAbbreviation"],
    optional_attributes: &[],
    compulsory_elements: &["defaultName", "defaultAbbreviation"],
    optional_elements: &["inputAbbreviation"],
    unique_attributes: &["referenceAbbreviation"],
    unique_elements: &["defaultName"],
};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DivisionNames {
    pub default_name: String,
    pub default_abbreviation: String,
    pub input_abbreviations: Vec<String>,
    pub includes_books: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BooknameLeader {
    pub standard_leader: String,
    pub input_abbreviations: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BookNames {
    pub default_name: String,
    pub default_abbreviation: String,
    pub input_abbreviations: Vec<String>,
}

/// Where an expanded input abbreviation points.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NameTarget {
    /// A BBB.
    Book(String),
    /// Index into `divisions`.
    Division(usize),
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BooksNamesSystem {
    pub divisions: Vec<DivisionNames>,
    pub leaders: Vec<BooknameLeader>,
    pub books: HashMap<String, BookNames>,
    pub order: Vec<String>,
    /// Uppercased unambiguous input form → target.
    input_lookup: HashMap<String, NameTarget>,
}

impl BooksNamesSystem {
    pub fn book_name(&self, bbb: &str) -> Option<&str> {
        self.books.get(bbb).map(|b| b.default_name.as_str())
    }

    pub fn book_abbreviation(&self, bbb: &str) -> Option<&str> {
        self.books.get(bbb).map(|b| b.default_abbreviation.as_str())
    }

    /// Resolve user input (any case, possibly truncated) to a target.
    pub fn from_input(&self, input: &str) -> Option<&NameTarget> {
        self.input_lookup.get(&normalize(input))
    }

    pub fn bbb_from_input(&self, input: &str) -> Option<&str> {
        match self.from_input(input)? {
            NameTarget::Book(bbb) => Some(bbb),
            NameTarget::Division(_) => None,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BooksNamesSystems {
    pub systems: HashMap<String, BooksNamesSystem>,
    pub names: Vec<String>,
}

impl BooksNamesSystems {
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    pub fn contains_system(&self, language: &str) -> bool {
        self.systems.contains_key(language)
    }

    pub fn system(&self, language: &str) -> Option<&BooksNamesSystem> {
        self.systems.get(language)
    }

    pub fn system_names(&self) -> &[String] {
        &self.names
    }
}

impl TableExport for BooksNamesSystems {
    const NAME: &'static str = TABLE;

    fn flat(&self) -> FlatTable {
        FlatTable {
            name: Self::NAME,
            fields: vec![
                "language",
                "referenceAbbreviation",
                "defaultName",
                "defaultAbbreviation",
            ],
            rows: self
                .names
                .iter()
                .flat_map(|language| {
                    let system = &self.systems[language];
                    system.order.iter().map(|bbb| {
                        let book = &system.books[bbb];
                        vec![
                            Some(language.clone()),
                            Some(bbb.clone()),
                            Some(book.default_name.clone()),
                            Some(book.default_abbreviation.clone()),
                        ]
                    })
                })
                .collect(),
        }
    }
}

struct RawSystem {
    language: String,
    divisions: Vec<DivisionNames>,
    leaders: Vec<BooknameLeader>,
    books: Vec<(String, BookNames)>,
}

pub struct BooksNamesConverter {
    raw: Vec<RawSystem>,
    data: Option<BooksNamesSystems>,
}

impl BooksNamesConverter {
    pub fn load(folder: &Path, diags: &mut Diagnostics) -> Result<Self> {
        let mut raw = Vec::new();
        for (language, path) in system_files(folder, FILE_PREFIX)? {
            let source = match load_table(&path, ROOT_TAG, diags) {
                Ok(source) => source,
                Err(err) => {
                    diags.error(TABLE, format!("'{language}' unusable: {err:#}"));
                    continue;
                }
            };
            let table = format!("{TABLE}/{language}");
            if !ISO639_PATTERN.is_match(&language) {
                diags.warn(
                    &table,
                    format!("'{language}' is not an ISO 639-3 language code"),
                );
            }
            let divisions = source.records(DIVISION_TAG);
            let leaders = source.records(LEADER_TAG);
            let books = source.records(BOOK_TAG);
            if !divisions.is_empty() {
                validate_records(&table, &divisions, &DIVISION_SPEC, diags);
            }
            if !leaders.is_empty() {
                validate_records(&table, &leaders, &LEADER_SPEC, diags);
            }
            validate_records(&table, &books, &BOOK_SPEC, diags);
            raw.push(RawSystem {
                language,
                divisions: divisions.iter().map(|e| parse_division(e)).collect(),
                leaders: leaders.iter().map(|e| parse_leader(e)).collect(),
                books: books.iter().filter_map(|e| parse_book(e, &table, diags)).collect(),
            });
        }
        Ok(Self { raw, data: None })
    }

    pub fn import(
        &mut self,
        registry: &BooksCodes,
        diags: &mut Diagnostics,
    ) -> &BooksNamesSystems {
        if self.data.is_none() {
            let mut data = BooksNamesSystems::default();
            for raw in &self.raw {
                let system = pivot_system(raw, registry, diags);
                data.names.push(raw.language.clone());
                data.systems.insert(raw.language.clone(), system);
            }
            data.names.sort();
            self.data = Some(data);
        }
        self.data.as_ref().expect("just imported")
    }

    pub fn data(&self) -> &BooksNamesSystems {
        self.data
            .as_ref()
            .expect("BooksNamesConverter: import() must run before data()")
    }

    pub fn summary(&self) -> String {
        match &self.data {
            Some(data) => format!(
                "{TABLE}: {} language systems ({})",
                data.len(),
                data.names.iter().join(", ")
            ),
            None => format!(
                "{TABLE}: {} language systems loaded, not yet imported",
                self.raw.len()
            ),
        }
    }
}

fn parse_division(record: &Element) -> DivisionNames {
    DivisionNames {
        default_name: child_text(record, "defaultName").unwrap_or_default(),
        default_abbreviation: child_text(record, "defaultAbbreviation").unwrap_or_default(),
        input_abbreviations: repeated_texts(record, "inputAbbreviation"),
        includes_books: repeated_texts(record, "includesBook"),
    }
}

fn parse_leader(record: &Element) -> BooknameLeader {
    BooknameLeader {
        standard_leader: record
            .attributes
            .get("standardLeader")
            .cloned()
            .unwrap_or_default(),
        input_abbreviations: repeated_texts(record, "inputAbbreviation"),
    }
}

fn parse_book(record: &Element, table: &str, diags: &mut Diagnostics) -> Option<(String, BookNames)> {
    let Some(bbb) = record.attributes.get("referenceAbbreviation").cloned() else {
        diags.error(table, "book names record without referenceAbbreviation skipped");
        return None;
    };
    Some((
        bbb,
        BookNames {
            default_name: child_text(record, "defaultName").unwrap_or_default(),
            default_abbreviation: child_text(record, "defaultAbbreviation").unwrap_or_default(),
            input_abbreviations: repeated_texts(record, "inputAbbreviation"),
        },
    ))
}

fn repeated_texts(record: &Element, name: &str) -> Vec<String> {
    child_elements(record)
        .filter(|e| e.name == name)
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect()
}

fn pivot_system(raw: &RawSystem, registry: &BooksCodes, diags: &mut Diagnostics) -> BooksNamesSystem {
    let table = format!("{TABLE}/{}", raw.language);
    let mut system = BooksNamesSystem {
        divisions: raw.divisions.clone(),
        leaders: raw.leaders.clone(),
        ..Default::default()
    };
    for division in &raw.divisions {
        for bbb in &division.includes_books {
            if !registry.contains(bbb) {
                diags.error(
                    &table,
                    format!(
                        "division '{}' includes unknown book code '{bbb}'",
                        division.default_name
                    ),
                );
            }
        }
    }
    for (bbb, book) in &raw.books {
        if !registry.contains(bbb) {
            diags.error(&table, format!("unknown book code '{bbb}' is not in the registry"));
        }
        if system.books.contains_key(bbb) {
            diags.error(&table, format!("duplicate book names record for '{bbb}' ignored"));
            continue;
        }
        system.order.push(bbb.clone());
        system.books.insert(bbb.clone(), book.clone());
    }
    system.input_lookup = expand_input_forms(&system, &table, diags);
    system
}

/// Build the uppercased input-form map: every declared name and
/// abbreviation, plus all truncated prefixes that stay unambiguous.
/// A collision between two *declared* forms is data drift and gets a
/// diagnostic; a collision between mere truncations silently removes
/// the prefix.
fn expand_input_forms(
    system: &BooksNamesSystem,
    table: &str,
    diags: &mut Diagnostics,
) -> HashMap<String, NameTarget> {
    let mut declared: Vec<(String, NameTarget)> = Vec::new();
    for (index, division) in system.divisions.iter().enumerate() {
        let target = NameTarget::Division(index);
        for form in [&division.default_name, &division.default_abbreviation]
            .into_iter()
            .chain(&division.input_abbreviations)
        {
            declared.push((normalize(form), target.clone()));
        }
    }
    for bbb in &system.order {
        let book = &system.books[bbb];
        let target = NameTarget::Book(bbb.clone());
        for form in [&book.default_name, &book.default_abbreviation]
            .into_iter()
            .chain(&book.input_abbreviations)
        {
            declared.push((normalize(form), target.clone()));
        }
    }

    let mut lookup: HashMap<String, NameTarget> = HashMap::new();
    for (form, target) in &declared {
        if form.is_empty() {
            continue;
        }
        match lookup.get(form) {
            Some(existing) if existing != target => diags.warn(
                table,
                format!("input abbreviation \"{form}\" is ambiguous, kept for the first target"),
            ),
            _ => {
                lookup.insert(form.clone(), target.clone());
            }
        }
    }

    // Truncations: count targets per prefix, keep only unambiguous ones
    // that don't shadow a declared form.
    let mut prefix_targets: HashMap<String, HashSet<NameTarget>> = HashMap::new();
    for (form, target) in &declared {
        let chars: Vec<char> = form.chars().collect();
        for len in MIN_INPUT_PREFIX..chars.len() {
            let prefix: String = chars[..len].iter().collect();
            prefix_targets.entry(prefix).or_default().insert(target.clone());
        }
    }
    for (prefix, targets) in prefix_targets {
        if targets.len() == 1 && !lookup.contains_key(&prefix) {
            lookup.insert(prefix, targets.into_iter().next().expect("one target"));
        }
    }
    lookup
}

fn normalize(input: &str) -> String {
    // The match is effectively case-insensitive; uppercasing both sides
    // keeps the serialized map plain strings.
    input.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::books_codes::BooksCodesConverter;
    use std::io::Write;

    fn registry(dir: &Path) -> BooksCodes {
        let mut xml =
            String::from("<BibleBooksCodes><header><work><version>1</version></work></header>");
        for (i, bbb) in ["GEN", "EXO", "JDG"].iter().enumerate() {
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

    fn write_names(dir: &Path, language: &str, body: &str) {
        let xml = format!(
            "<BibleBooksNames>\
             <header><work><version>1</version></work></header>{body}\
             </BibleBooksNames>"
        );
        std::fs::File::create(dir.join(format!("BibleBooksNames_{language}.xml")))
            .unwrap()
            .write_all(xml.as_bytes())
            .unwrap();
    }

    const ENG: &str = "<BibleDivisionNames>\
          <defaultName>Old Testament</defaultName>\
          <defaultAbbreviation>OT</defaultAbbreviation>\
          <includesBook>GEN</includesBook>\
          <includesBook>EXO</includesBook>\
        </BibleDivisionNames>\
        <BibleBooknameLeaders standardLeader=\"1\">\
          <inputAbbreviation>I</inputAbbreviation>\
          <inputAbbreviation>First</inputAbbreviation>\
        </BibleBooknameLeaders>\
        <BibleBookNames referenceAbbreviation=\"GEN\">\
          <defaultName>Genesis</defaultName>\
          <defaultAbbreviation>Gen</defaultAbbreviation>\
          <inputAbbreviation>Gnss</inputAbbreviation>\
        </BibleBookNames>\
        <BibleBookNames referenceAbbreviation=\"JDG\">\
          <defaultName>Judges</defaultName>\
          <defaultAbbreviation>Jdg</defaultAbbreviation>\
        </BibleBookNames>";

    #[test]
    fn pivots_names_and_expands_input_forms() {
        let dir = tempfile::tempdir().unwrap();
        write_names(dir.path(), "eng", ENG);
        let registry = registry(dir.path());
        let mut diags = Diagnostics::new();
        let mut converter = BooksNamesConverter::load(dir.path(), &mut diags).unwrap();
        let data = converter.import(&registry, &mut diags);
        let eng = data.system("eng").unwrap();
        assert_eq!(eng.book_name("GEN"), Some("Genesis"));
        assert_eq!(eng.book_abbreviation("JDG"), Some("Jdg"));
        // Full forms, any case.
        assert_eq!(eng.bbb_from_input("genesis"), Some("GEN"));
        assert_eq!(eng.bbb_from_input("GNSS"), Some("GEN"));
        // Unambiguous truncation.
        assert_eq!(eng.bbb_from_input("Genes"), Some("GEN"));
        // Division resolves but is not a book.
        assert!(matches!(
            eng.from_input("Old Testament"),
            Some(NameTarget::Division(0))
        ));
        assert_eq!(eng.bbb_from_input("Old Testament"), None);
        assert!(diags.is_empty());
    }

    #[test]
    fn ambiguous_truncations_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        // "Judges" and "Judith"-like clash: add a second J book name.
        let body = ENG.replace(
            "<defaultName>Genesis</defaultName>",
            "<defaultName>Judgment</defaultName>",
        );
        write_names(dir.path(), "eng", &body);
        let registry = registry(dir.path());
        let mut diags = Diagnostics::new();
        let mut converter = BooksNamesConverter::load(dir.path(), &mut diags).unwrap();
        let data = converter.import(&registry, &mut diags);
        let eng = data.system("eng").unwrap();
        // "JUDG" prefixes both "JUDGMENT" (GEN record) and "JUDGES".
        assert_eq!(eng.from_input("Judg"), None);
        assert_eq!(eng.bbb_from_input("Judgm"), Some("GEN"));
        assert_eq!(eng.bbb_from_input("Judge"), Some("JDG"));
    }

    #[test]
    fn unknown_book_in_division_errors() {
        let dir = tempfile::tempdir().unwrap();
        let body = ENG.replace("<includesBook>EXO</includesBook>", "<includesBook>ZZZ</includesBook>");
        write_names(dir.path(), "eng", &body);
        let registry = registry(dir.path());
        let mut diags = Diagnostics::new();
        let mut converter = BooksNamesConverter::load(dir.path(), &mut diags).unwrap();
        converter.import(&registry, &mut diags);
        assert!(diags.any_contains("includes unknown book code 'ZZZ'"));
    }

    #[test]
    fn non_iso_language_code_warns() {
        let dir = tempfile::tempdir().unwrap();
        write_names(dir.path(), "english", ENG);
        let registry = registry(dir.path());
        let mut diags = Diagnostics::new();
        let mut converter = BooksNamesConverter::load(dir.path(), &mut diags).unwrap();
        converter.import(&registry, &mut diags);
        assert!(diags.any_contains("not an ISO 639-3 language code"));
    }
}
