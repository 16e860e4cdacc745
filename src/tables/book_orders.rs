//! Book order systems.
//!
//! One `BibleBookOrder_<system>.xml` file per tradition, each an ordered
//! list of `book` elements: an `id` position attribute and a BBB as
//! text. Pivoted into position maps per system, then the systems are
//! compared pairwise for identical or subset book lists.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostics;
use crate::schema::{validate_records, ElementSpec};
use crate::tables::{system_files, FlatTable, TableExport};
use crate::xml::{element_text, load_table};

use super::books_codes::BooksCodes;

pub const TABLE: &str = "BibleBookOrderSystems";
const FILE_PREFIX: &str = "BibleBookOrder";
const ROOT_TAG: &str = "BibleBookOrderSystem";
const RECORD_TAG: &str = "book";

const SPEC: ElementSpec = ElementSpec {
    tag: RECORD_TAG,
    compulsory_attributes: &["id"],
    optional_attributes: &[],
    compulsory_elements: &[],
    optional_elements: &[],
    unique_attributes: &["id"],
    unique_elements: &[],
};

/// One system's ordered book list plus its position lookups.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BookOrder {
    /// BBBs in canonical order, index 0 = position 1.
    pub books: Vec<String>,
    position_of: HashMap<String, u16>,
}

impl BookOrder {
    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// 1-based canonical position of a book within this system.
    pub fn position(&self, bbb: &str) -> Option<u16> {
        self.position_of.get(bbb).copied()
    }

    pub fn book_at(&self, position: u16) -> Option<&str> {
        if position == 0 {
            return None;
        }
        self.books.get(position as usize - 1).map(String::as_str)
    }

    pub fn contains(&self, bbb: &str) -> bool {
        self.position_of.contains_key(bbb)
    }

    /// Books strictly before `bbb` in this system's order.
    pub fn books_before<'a>(&'a self, bbb: &str) -> &'a [String] {
        match self.position(bbb) {
            Some(p) => &self.books[..p as usize - 1],
            None => &[],
        }
    }

    /// Books strictly after `bbb` in this system's order.
    pub fn books_after<'a>(&'a self, bbb: &str) -> &'a [String] {
        match self.position(bbb) {
            Some(p) => &self.books[p as usize..],
            None => &[],
        }
    }
}

/// All book-order systems, keyed by system name.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BookOrders {
    pub systems: HashMap<String, BookOrder>,
    /// System names sorted, so iteration and export are deterministic.
    pub names: Vec<String>,
}

impl BookOrders {
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    pub fn contains_system(&self, name: &str) -> bool {
        self.systems.contains_key(name)
    }

    pub fn system(&self, name: &str) -> Option<&BookOrder> {
        self.systems.get(name)
    }

    pub fn system_names(&self) -> &[String] {
        &self.names
    }
}

impl TableExport for BookOrders {
    const NAME: &'static str = TABLE;

    fn flat(&self) -> FlatTable {
        FlatTable {
            name: Self::NAME,
            fields: vec!["system", "position", "referenceAbbreviation"],
            rows: self
                .names
                .iter()
                .flat_map(|name| {
                    self.systems[name].books.iter().enumerate().map(|(i, bbb)| {
                        vec![
                            Some(name.clone()),
                            Some((i + 1).to_string()),
                            Some(bbb.clone()),
                        ]
                    })
                })
                .collect(),
        }
    }
}

/// Loads the folder of book-order system files and pivots them.
pub struct BookOrdersConverter {
    raw: Vec<(String, Vec<(Option<u16>, String)>)>,
    data: Option<BookOrders>,
}

impl BookOrdersConverter {
    /// `folder` holds the `BibleBookOrder_<system>.xml` member files.
    pub fn load(folder: &Path, diags: &mut Diagnostics) -> Result<Self> {
        let mut raw = Vec::new();
        for (system, path) in system_files(folder, FILE_PREFIX)? {
            let source = match load_table(&path, ROOT_TAG, diags) {
                Ok(source) => source,
                Err(err) => {
                    // One unreadable member must not sink the whole set.
                    diags.error(TABLE, format!("system '{system}' unusable: {err:#}"));
                    continue;
                }
            };
            let records = source.records(RECORD_TAG);
            validate_records(&format!("{TABLE}/{system}"), &records, &SPEC, diags);
            let rows = records
                .iter()
                .map(|r| {
                    let id = r.attributes.get("id").and_then(|v| v.parse().ok());
                    (id, element_text(r))
                })
                .collect();
            raw.push((system, rows));
        }
        Ok(Self { raw, data: None })
    }

    /// Pivot all systems and run the pairwise cross-checks. Memoized —
    /// the O(n²) system comparisons only ever run once.
    pub fn import(&mut self, registry: &BooksCodes, diags: &mut Diagnostics) -> &BookOrders {
        if self.data.is_none() {
            let data = pivot(&self.raw, registry, diags);
            cross_check_systems(&data, diags);
            self.data = Some(data);
        }
        self.data.as_ref().expect("just imported")
    }

    pub fn data(&self) -> &BookOrders {
        self.data
            .as_ref()
            .expect("BookOrdersConverter: import() must run before data()")
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

fn pivot(
    raw: &[(String, Vec<(Option<u16>, String)>)],
    registry: &BooksCodes,
    diags: &mut Diagnostics,
) -> BookOrders {
    let mut data = BookOrders::default();
    for (system, rows) in raw {
        let mut order = BookOrder::default();
        let mut expected_id: u16 = 1;
        for (id, bbb) in rows {
            if bbb.is_empty() {
                diags.error(TABLE, format!("'{system}': book element without a BBB"));
                continue;
            }
            if !registry.contains(bbb) {
                diags.error(
                    TABLE,
                    format!("'{system}': unknown book code '{bbb}' is not in the registry"),
                );
            }
            match id {
                Some(id) if *id == expected_id => {}
                Some(id) => diags.warn(
                    TABLE,
                    format!("'{system}': book '{bbb}' has id {id}, expected {expected_id}"),
                ),
                None => diags.error(
                    TABLE,
                    format!("'{system}': book '{bbb}' has a missing or non-numeric id"),
                ),
            }
            if order.position_of.contains_key(bbb) {
                diags.error(TABLE, format!("'{system}': book '{bbb}' listed twice"));
            } else {
                let position = order.books.len() as u16 + 1;
                order.books.push(bbb.clone());
                order.position_of.insert(bbb.clone(), position);
            }
            expected_id += 1;
        }
        data.names.push(system.clone());
        data.systems.insert(system.clone(), order);
    }
    data.names.sort();
    data
}

/// Pairwise identical- and subset-system detection.
fn cross_check_systems(data: &BookOrders, diags: &mut Diagnostics) {
    for (a, b) in data.names.iter().tuple_combinations() {
        let list_a = &data.systems[a].books;
        let list_b = &data.systems[b].books;
        if list_a == list_b {
            diags.warn(
                TABLE,
                format!("systems '{a}' and '{b}' have identical book lists"),
            );
        } else if is_ordered_subset(list_a, list_b) {
            diags.warn(TABLE, format!("system '{a}' is an ordered subset of '{b}'"));
        } else if is_ordered_subset(list_b, list_a) {
            diags.warn(TABLE, format!("system '{b}' is an ordered subset of '{a}'"));
        }
    }
}

/// True when `small` appears within `large` in the same relative order.
fn is_ordered_subset(small: &[String], large: &[String]) -> bool {
    if small.is_empty() || small.len() >= large.len() {
        return false;
    }
    let mut remaining = large.iter();
    small
        .iter()
        .all(|wanted| remaining.any(|candidate| candidate == wanted))
}
