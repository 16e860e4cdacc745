//! The Bible book codes registry.
//!
//! Every other table validates its book references against this one.
//! Each record carries the canonical 3-character reference abbreviation
//! (BBB), a unique reference number, and the corresponding codes in the
//! third-party abbreviation schemes (OSIS, USFM, SBL, Sword).

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use xmltree::Element;

use crate::constants::{BBB_PATTERN, REFERENCE_NUMBER_RANGE};
use crate::diagnostics::Diagnostics;
use crate::schema::{validate_records, ElementSpec};
use crate::tables::{FlatTable, TableExport};
use crate::xml::{child_text, load_table, XmlHeader, XmlSource};

pub const TABLE: &str = "BibleBooksCodes";
const RECORD_TAG: &str = "BibleBookCodes";

const SPEC: ElementSpec = ElementSpec {
    tag: RECORD_TAG,
    compulsory_attributes: &[],
    optional_attributes: &[],
    compulsory_elements: &[
        "referenceAbbreviation",
        "referenceNumber",
        "bookName",
        "bookNameEnglish",
    ],
    optional_elements: &[
        "originalLanguageCode",
        "OSISAbbreviation",
        "SBLAbbreviation",
        "SwordAbbreviation",
        "USFMAbbreviation",
        "USFMNumber",
        "CCELNumber",
        "typicalSection",
        "expectedChapters",
        "possibleAlternativeBooks",
    ],
    unique_attributes: &[],
    unique_elements: &["referenceAbbreviation", "referenceNumber"],
};

/// One book record, fixed shape. `None` means the source element was
/// absent, never coerced from an empty string.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BookCodeRow {
    pub reference_abbreviation: String,
    pub reference_number: u16,
    pub book_name: String,
    pub book_name_english: String,
    pub original_language_code: Option<String>,
    pub osis_abbreviation: Option<String>,
    pub sbl_abbreviation: Option<String>,
    pub sword_abbreviation: Option<String>,
    pub usfm_abbreviation: Option<String>,
    pub usfm_number: Option<String>,
    pub ccel_number: Option<String>,
    pub typical_section: Option<String>,
    pub expected_chapters: Option<String>,
    pub possible_alternative_books: Option<String>,
}

/// The pivoted registry: records in document order plus the lookup maps
/// keyed every way the rest of the toolkit asks for them.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BooksCodes {
    pub rows: Vec<BookCodeRow>,
    by_reference_abbreviation: HashMap<String, usize>,
    by_reference_number: HashMap<u16, usize>,
    // Alternate-scheme maps are keyed by the uppercased abbreviation.
    by_osis: HashMap<String, String>,
    by_usfm: HashMap<String, String>,
    by_sbl: HashMap<String, String>,
    by_sword: HashMap<String, String>,
    by_usfm_number: HashMap<String, String>,
    all_abbreviations: HashMap<String, String>,
}

impl BooksCodes {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, bbb: &str) -> bool {
        self.by_reference_abbreviation.contains_key(bbb)
    }

    pub fn row(&self, bbb: &str) -> Option<&BookCodeRow> {
        self.by_reference_abbreviation
            .get(bbb)
            .map(|&i| &self.rows[i])
    }

    pub fn row_by_number(&self, number: u16) -> Option<&BookCodeRow> {
        self.by_reference_number.get(&number).map(|&i| &self.rows[i])
    }

    pub fn reference_number(&self, bbb: &str) -> Option<u16> {
        self.row(bbb).map(|r| r.reference_number)
    }

    pub fn osis_abbreviation(&self, bbb: &str) -> Option<&str> {
        self.row(bbb)?.osis_abbreviation.as_deref()
    }

    pub fn usfm_abbreviation(&self, bbb: &str) -> Option<&str> {
        self.row(bbb)?.usfm_abbreviation.as_deref()
    }

    pub fn sbl_abbreviation(&self, bbb: &str) -> Option<&str> {
        self.row(bbb)?.sbl_abbreviation.as_deref()
    }

    pub fn english_name(&self, bbb: &str) -> Option<&str> {
        self.row(bbb).map(|r| r.book_name_english.as_str())
    }

    pub fn expected_chapters(&self, bbb: &str) -> Option<&str> {
        self.row(bbb)?.expected_chapters.as_deref()
    }

    pub fn bbb_from_osis(&self, osis: &str) -> Option<&str> {
        self.by_osis.get(&osis.to_uppercase()).map(String::as_str)
    }

    pub fn bbb_from_usfm(&self, usfm: &str) -> Option<&str> {
        self.by_usfm.get(&usfm.to_uppercase()).map(String::as_str)
    }

    /// Resolve any known abbreviation (BBB or third-party scheme) to a BBB.
    pub fn bbb_from_any(&self, abbreviation: &str) -> Option<&str> {
        let key = abbreviation.to_uppercase();
        if self.by_reference_abbreviation.contains_key(&key) {
            return self
                .by_reference_abbreviation
                .get_key_value(&key)
                .map(|(k, _)| k.as_str());
        }
        self.all_abbreviations.get(&key).map(String::as_str)
    }

    /// All BBBs in the original document order.
    pub fn all_reference_abbreviations(&self) -> Vec<&str> {
        self.rows
            .iter()
            .map(|r| r.reference_abbreviation.as_str())
            .collect()
    }
}

impl TableExport for BooksCodes {
    const NAME: &'static str = TABLE;

    fn flat(&self) -> FlatTable {
        FlatTable {
            name: Self::NAME,
            fields: vec![
                "referenceAbbreviation",
                "referenceNumber",
                "bookName",
                "bookNameEnglish",
                "OSISAbbreviation",
                "USFMAbbreviation",
                "USFMNumber",
                "SBLAbbreviation",
                "SwordAbbreviation",
                "expectedChapters",
            ],
            rows: self
                .rows
                .iter()
                .map(|r| {
                    vec![
                        Some(r.reference_abbreviation.clone()),
                        Some(r.reference_number.to_string()),
                        Some(r.book_name.clone()),
                        Some(r.book_name_english.clone()),
                        r.osis_abbreviation.clone(),
                        r.usfm_abbreviation.clone(),
                        r.usfm_number.clone(),
                        r.sbl_abbreviation.clone(),
                        r.sword_abbreviation.clone(),
                        r.expected_chapters.clone(),
                    ]
                })
                .collect(),
        }
    }
}

/// Loads and pivots the book codes table.
pub struct BooksCodesConverter {
    source: XmlSource,
    data: Option<BooksCodes>,
}

impl BooksCodesConverter {
    /// Parse and validate the table. `path` is the XML file or a folder
    /// holding `BibleBooksCodes.xml`.
    pub fn load(path: &Path, diags: &mut Diagnostics) -> Result<Self> {
        let source = load_table(path, TABLE, diags)?;
        validate_records(TABLE, &source.records(RECORD_TAG), &SPEC, diags);
        Ok(Self { source, data: None })
    }

    pub fn header(&self) -> Option<&XmlHeader> {
        self.source.header.as_ref()
    }

    /// Pivot the tree into the lookup maps. Memoized: a second call
    /// returns the already-computed registry untouched.
    pub fn import(&mut self, diags: &mut Diagnostics) -> &BooksCodes {
        if self.data.is_none() {
            self.data = Some(pivot(&self.source, diags));
        }
        self.data.as_ref().expect("just imported")
    }

    /// The pivoted registry; `import` must have run first.
    pub fn data(&self) -> &BooksCodes {
        self.data
            .as_ref()
            .expect("BooksCodesConverter: import() must run before data()")
    }

    /// Give up the converter and keep only the pivoted registry, for
    /// callers that hand it on to dependent converters.
    pub fn into_data(self) -> BooksCodes {
        self.data
            .expect("BooksCodesConverter: import() must run before into_data()")
    }

    pub fn summary(&self) -> String {
        let version = self
            .source
            .header
            .as_ref()
            .and_then(|h| h.version.clone())
            .unwrap_or_else(|| "?".to_string());
        match &self.data {
            Some(data) => format!("{TABLE} v{version}: {} book codes", data.len()),
            None => format!("{TABLE} v{version}: not yet imported"),
        }
    }
}

fn pivot(source: &XmlSource, diags: &mut Diagnostics) -> BooksCodes {
    let mut data = BooksCodes::default();
    for record in source.records(RECORD_TAG) {
        let Some(row) = extract_row(record, diags) else {
            continue;
        };
        cross_check_row(&row, diags);
        insert_row(&mut data, row, diags);
    }
    data
}

fn extract_row(record: &Element, diags: &mut Diagnostics) -> Option<BookCodeRow> {
    let bbb = match child_text(record, "referenceAbbreviation") {
        Some(v) if !v.is_empty() => v,
        _ => {
            diags.error(TABLE, "record without referenceAbbreviation skipped");
            return None;
        }
    };
    let reference_number = match child_text(record, "referenceNumber").and_then(|v| v.parse().ok())
    {
        Some(n) => n,
        None => {
            diags.error(
                TABLE,
                format!("'{bbb}': referenceNumber missing or not an integer, record skipped"),
            );
            return None;
        }
    };
    Some(BookCodeRow {
        reference_abbreviation: bbb,
        reference_number,
        book_name: child_text(record, "bookName").unwrap_or_default(),
        book_name_english: child_text(record, "bookNameEnglish").unwrap_or_default(),
        original_language_code: child_text(record, "originalLanguageCode"),
        osis_abbreviation: child_text(record, "OSISAbbreviation"),
        sbl_abbreviation: child_text(record, "SBLAbbreviation"),
        sword_abbreviation: child_text(record, "SwordAbbreviation"),
        usfm_abbreviation: child_text(record, "USFMAbbreviation"),
        usfm_number: child_text(record, "USFMNumber"),
        ccel_number: child_text(record, "CCELNumber"),
        typical_section: child_text(record, "typicalSection"),
        expected_chapters: child_text(record, "expectedChapters"),
        possible_alternative_books: child_text(record, "possibleAlternativeBooks"),
    })
}

fn cross_check_row(row: &BookCodeRow, diags: &mut Diagnostics) {
    let bbb = &row.reference_abbreviation;
    if !BBB_PATTERN.is_match(bbb) {
        diags.error(
            TABLE,
            format!("reference abbreviation '{bbb}' does not match the BBB pattern"),
        );
    }
    if !REFERENCE_NUMBER_RANGE.contains(&row.reference_number) {
        diags.error(
            TABLE,
            format!(
                "'{bbb}': reference number {} outside {}..={}",
                row.reference_number,
                REFERENCE_NUMBER_RANGE.start(),
                REFERENCE_NUMBER_RANGE.end()
            ),
        );
    }
}

fn insert_row(data: &mut BooksCodes, row: BookCodeRow, diags: &mut Diagnostics) {
    let bbb = row.reference_abbreviation.clone();
    if data.by_reference_abbreviation.contains_key(&bbb) {
        // First occurrence wins, matching the validator's duplicate report.
        diags.error(TABLE, format!("duplicate book code '{bbb}' ignored"));
        return;
    }
    if let Some(&prior) = data.by_reference_number.get(&row.reference_number) {
        diags.error(
            TABLE,
            format!(
                "'{bbb}': reference number {} already used by '{}'",
                row.reference_number, data.rows[prior].reference_abbreviation
            ),
        );
    }
    let index = data.rows.len();
    data.by_reference_abbreviation.insert(bbb.clone(), index);
    data.by_reference_number
        .entry(row.reference_number)
        .or_insert(index);

    let schemes = [
        (&row.osis_abbreviation, &mut data.by_osis),
        (&row.usfm_abbreviation, &mut data.by_usfm),
        (&row.sbl_abbreviation, &mut data.by_sbl),
        (&row.sword_abbreviation, &mut data.by_sword),
        (&row.usfm_number, &mut data.by_usfm_number),
    ];
    for (value, map) in schemes {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            let key = value.to_uppercase();
            if let Some(prior) = map.insert(key.clone(), bbb.clone()) {
                diags.warn(
                    TABLE,
                    format!("abbreviation '{value}' maps to both '{prior}' and '{bbb}'"),
                );
                map.insert(key.clone(), prior);
            }
            data.all_abbreviations.entry(key).or_insert_with(|| bbb.clone());
        }
    }
    data.rows.push(row);
}
