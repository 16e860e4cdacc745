//! Organisational systems.
//!
//! Ties the other tables together: one record per published Bible
//! (edition, revision, translation or original), naming which book
//! order, versification, punctuation and book-name systems it uses.
//! The dependency converters are passed in explicitly at import time;
//! this module never loads them itself.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use xmltree::Element;

use crate::constants::ORGANISATIONAL_SYSTEM_TYPES;
use crate::diagnostics::Diagnostics;
use crate::schema::{validate_records, ElementSpec};
use crate::tables::{FlatTable, TableExport};
use crate::xml::{child_elements, child_text, element_text, load_table, XmlHeader, XmlSource};

use super::book_orders::BookOrders;
use super::books_names::BooksNamesSystems;
use super::punctuation::PunctuationSystems;
use super::versification::VersificationSystems;

pub const TABLE: &str = "BibleOrganisationalSystems";
const RECORD_TAG: &str = "BibleOrganisationalSystem";

const SPEC: ElementSpec = ElementSpec {
    tag: RECORD_TAG,
    compulsory_attributes: &[],
    optional_attributes: &[],
    compulsory_elements: &["referenceAbbreviation", "type", "name"],
    optional_elements: &[
        "publicationDate",
        "versificationSystem",
        "punctuationSystem",
        "bookOrderSystem",
        "booksNamesSystem",
        "derivedFrom",
        "usesText",
    ],
    unique_attributes: &[],
    unique_elements: &[],
};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrgSystem {
    pub reference_abbreviation: String,
    pub system_type: String,
    /// First entry is the primary name.
    pub names: Vec<String>,
    pub publication_date: Option<String>,
    pub versification_system: Option<String>,
    pub punctuation_system: Option<String>,
    pub book_order_system: Option<String>,
    pub books_names_system: Option<String>,
    pub derived_from: Vec<String>,
    pub uses_texts: Vec<String>,
}

impl OrgSystem {
    /// The composite key the table is pivoted on, e.g. "KJV-1611_edition".
    pub fn key(&self) -> String {
        format!("{}_{}", self.reference_abbreviation, self.system_type)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct OrgSystems {
    pub systems: HashMap<String, OrgSystem>,
    /// Composite keys in document order.
    pub keys: Vec<String>,
    /// Plain abbreviation → all composite keys carrying it.
    aliases: HashMap<String, Vec<String>>,
}

impl OrgSystems {
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// Look a system up by composite key, or by plain abbreviation when
    /// that is unambiguous, or by "name(type)" disambiguation when the
    /// plain form alone matches several records.
    pub fn system(&self, name: &str) -> Option<&OrgSystem> {
        if let Some(system) = self.systems.get(name) {
            return Some(system);
        }
        let candidates = self.aliases.get(name)?;
        if candidates.len() == 1 {
            return self.systems.get(&candidates[0]);
        }
        // Several types share the plain name; only a typed suffix can
        // pick one, and we already know `name` carries none.
        None
    }

    /// Resolve a possibly-untyped pointer the way `system` does, but
    /// also accept a pointer whose type suffix narrows several
    /// candidates down to exactly one.
    fn resolve_pointer(&self, pointer: &str) -> Resolution<'_> {
        if self.systems.contains_key(pointer) {
            return Resolution::Exact;
        }
        match self.aliases.get(pointer) {
            Some(candidates) if candidates.len() == 1 => Resolution::Exact,
            Some(candidates) => Resolution::Ambiguous(candidates),
            None => Resolution::Unknown,
        }
    }

    pub fn system_keys(&self) -> &[String] {
        &self.keys
    }
}

enum Resolution<'a> {
    Exact,
    Ambiguous(&'a [String]),
    Unknown,
}

impl TableExport for OrgSystems {
    const NAME: &'static str = TABLE;

    fn flat(&self) -> FlatTable {
        FlatTable {
            name: Self::NAME,
            fields: vec![
                "key",
                "name",
                "type",
                "bookOrderSystem",
                "versificationSystem",
                "punctuationSystem",
                "booksNamesSystem",
            ],
            rows: self
                .keys
                .iter()
                .map(|key| {
                    let s = &self.systems[key];
                    vec![
                        Some(key.clone()),
                        s.names.first().cloned(),
                        Some(s.system_type.clone()),
                        s.book_order_system.clone(),
                        s.versification_system.clone(),
                        s.punctuation_system.clone(),
                        s.books_names_system.clone(),
                    ]
                })
                .collect(),
        }
    }
}

/// The four dependency tables an organisational system refers into.
pub struct ComponentTables<'a> {
    pub book_orders: &'a BookOrders,
    pub versifications: &'a VersificationSystems,
    pub punctuations: &'a PunctuationSystems,
    pub books_names: &'a BooksNamesSystems,
}

pub struct OrgSystemsConverter {
    source: XmlSource,
    data: Option<OrgSystems>,
}

impl OrgSystemsConverter {
    pub fn load(path: &Path, diags: &mut Diagnostics) -> Result<Self> {
        let source = load_table(path, TABLE, diags)?;
        validate_records(TABLE, &source.records(RECORD_TAG), &SPEC, diags);
        Ok(Self { source, data: None })
    }

    pub fn header(&self) -> Option<&XmlHeader> {
        self.source.header.as_ref()
    }

    /// Pivot and cross-validate against the injected component tables.
    pub fn import(&mut self, components: &ComponentTables<'_>, diags: &mut Diagnostics) -> &OrgSystems {
        if self.data.is_none() {
            let mut data = OrgSystems::default();
            for record in self.source.records(RECORD_TAG) {
                if let Some(system) = extract_system(record, diags) {
                    insert_system(&mut data, system, diags);
                }
            }
            cross_check(&data, components, diags);
            self.data = Some(data);
        }
        self.data.as_ref().expect("just imported")
    }

    pub fn data(&self) -> &OrgSystems {
        self.data
            .as_ref()
            .expect("OrgSystemsConverter: import() must run before data()")
    }

    pub fn summary(&self) -> String {
        match &self.data {
            Some(data) => format!(
                "{TABLE}: {} systems ({})",
                data.len(),
                data.keys.iter().join(", ")
            ),
            None => format!("{TABLE}: not yet imported"),
        }
    }
}

fn extract_system(record: &Element, diags: &mut Diagnostics) -> Option<OrgSystem> {
    let Some(abbreviation) =
        child_text(record, "referenceAbbreviation").filter(|v| !v.is_empty())
    else {
        diags.error(TABLE, "record without referenceAbbreviation skipped");
        return None;
    };
    let system_type = child_text(record, "type").unwrap_or_default();
    if !ORGANISATIONAL_SYSTEM_TYPES.contains(system_type.as_str()) {
        diags.error(
            TABLE,
            format!("'{abbreviation}': unknown system type '{system_type}'"),
        );
    }
    let names: Vec<String> = child_elements(record)
        .filter(|e| e.name == "name")
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect();
    if names.is_empty() {
        diags.error(TABLE, format!("'{abbreviation}': no usable name"));
    }
    let repeated = |tag: &str| -> Vec<String> {
        child_elements(record)
            .filter(|e| e.name == tag)
            .map(element_text)
            .filter(|t| !t.is_empty())
            .collect()
    };
    Some(OrgSystem {
        reference_abbreviation: abbreviation,
        system_type,
        names,
        publication_date: child_text(record, "publicationDate"),
        versification_system: child_text(record, "versificationSystem"),
        punctuation_system: child_text(record, "punctuationSystem"),
        book_order_system: child_text(record, "bookOrderSystem"),
        books_names_system: child_text(record, "booksNamesSystem"),
        derived_from: repeated("derivedFrom"),
        uses_texts: repeated("usesText"),
    })
}

fn insert_system(data: &mut OrgSystems, system: OrgSystem, diags: &mut Diagnostics) {
    let key = system.key();
    if data.systems.contains_key(&key) {
        diags.error(TABLE, format!("duplicate organisational system '{key}' ignored"));
        return;
    }
    data.aliases
        .entry(system.reference_abbreviation.clone())
        .or_default()
        .push(key.clone());
    data.keys.push(key.clone());
    data.systems.insert(key, system);
}

fn cross_check(data: &OrgSystems, components: &ComponentTables<'_>, diags: &mut Diagnostics) {
    for key in &data.keys {
        let system = &data.systems[key];
        if let Some(name) = system.book_order_system.as_deref() {
            if !components.book_orders.contains_system(name) {
                diags.error(TABLE, format!("'{key}': unknown book order system '{name}'"));
            }
        }
        if let Some(name) = system.versification_system.as_deref() {
            if !components.versifications.contains_system(name) {
                diags.error(
                    TABLE,
                    format!("'{key}': unknown versification system '{name}'"),
                );
            }
        }
        if let Some(name) = system.punctuation_system.as_deref() {
            if !components.punctuations.contains_system(name) {
                diags.error(TABLE, format!("'{key}': unknown punctuation system '{name}'"));
            }
        }
        if let Some(name) = system.books_names_system.as_deref() {
            if !components.books_names.contains_system(name) {
                diags.error(TABLE, format!("'{key}': unknown books names system '{name}'"));
            }
        }
        for (field, pointers) in [
            ("usesText", &system.uses_texts),
            ("derivedFrom", &system.derived_from),
        ] {
            for pointer in pointers {
                check_pointer(data, key, field, pointer, diags);
            }
        }
    }
}

/// `usesText`/`derivedFrom` pointers may be untyped; an ambiguous one
/// is accepted iff exactly one typed candidate exists, else reported.
fn check_pointer(
    data: &OrgSystems,
    key: &str,
    field: &str,
    pointer: &str,
    diags: &mut Diagnostics,
) {
    match data.resolve_pointer(pointer) {
        Resolution::Exact => {}
        Resolution::Ambiguous(candidates) => diags.warn(
            TABLE,
            format!(
                "'{key}': {field} pointer '{pointer}' is ambiguous between {}",
                candidates.iter().join(", ")
            ),
        ),
        Resolution::Unknown => diags.error(
            TABLE,
            format!("'{key}': {field} pointer '{pointer}' matches no known system"),
        ),
    }
}
