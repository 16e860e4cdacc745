//! USFM marker table.
//!
//! One record per marker: whether it is compulsory, nestable,
//! deprecated, where it occurs, whether and how it closes, and whether
//! it carries content. Numberable markers ("s", "q", …) additionally
//! admit the numbered forms "s1".."s4" used by real USFM files.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::Result;
use core::fmt;
use serde::{Deserialize, Serialize};
use xmltree::Element;

use crate::constants::{USFM_CLOSED_VALUES, USFM_CONTENT_VALUES, USFM_MARKER_PATTERN};
use crate::diagnostics::Diagnostics;
use crate::schema::{validate_records, ElementSpec};
use crate::tables::{FlatTable, TableExport};
use crate::xml::{child_text, load_table, XmlHeader, XmlSource};

pub const TABLE: &str = "USFM2Markers";
const RECORD_TAG: &str = "USFMMarker";

/// Highest numbered variant generated for numberable markers.
const MAX_NUMBERED_LEVEL: u8 = 4;

const SPEC: ElementSpec = ElementSpec {
    tag: RECORD_TAG,
    compulsory_attributes: &[],
    optional_attributes: &[],
    compulsory_elements: &[
        "nameEnglish",
        "marker",
        "compulsory",
        "numberable",
        "nests",
        "hasContent",
        "printed",
        "closed",
        "occursIn",
        "deprecated",
    ],
    optional_elements: &["level", "description"],
    unique_attributes: &[],
    unique_elements: &["marker"],
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Closure {
    No,
    Always,
    Optional,
}

impl fmt::Display for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::No => f.write_str("No"),
            Self::Always => f.write_str("Always"),
            Self::Optional => f.write_str("Optional"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Content {
    Always,
    Sometimes,
    Never,
}

impl fmt::Display for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => f.write_str("Always"),
            Self::Sometimes => f.write_str("Sometimes"),
            Self::Never => f.write_str("Never"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MarkerRow {
    pub marker: String,
    pub name_english: String,
    pub compulsory: bool,
    pub numberable: bool,
    pub nests: bool,
    pub has_content: Content,
    pub printed: bool,
    pub closed: Closure,
    pub occurs_in: String,
    pub deprecated: bool,
    pub level: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UsfmMarkers {
    pub rows: Vec<MarkerRow>,
    by_marker: HashMap<String, usize>,
    /// Base markers plus generated numbered forms.
    all_markers: HashSet<String>,
}

impl UsfmMarkers {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Accepts base markers and the numbered forms of numberable ones.
    pub fn is_valid_marker(&self, marker: &str) -> bool {
        self.all_markers.contains(marker)
    }

    pub fn row(&self, marker: &str) -> Option<&MarkerRow> {
        self.by_marker
            .get(base_form(marker))
            .map(|&i| &self.rows[i])
    }

    pub fn is_compulsory(&self, marker: &str) -> bool {
        self.row(marker).map(|r| r.compulsory).unwrap_or(false)
    }

    pub fn is_deprecated(&self, marker: &str) -> bool {
        self.row(marker).map(|r| r.deprecated).unwrap_or(false)
    }

    pub fn marker_occurs_in(&self, marker: &str) -> Option<&str> {
        self.row(marker).map(|r| r.occurs_in.as_str())
    }

    pub fn marker_has_content(&self, marker: &str) -> Option<Content> {
        self.row(marker).map(|r| r.has_content)
    }

    pub fn marker_closure_type(&self, marker: &str) -> Option<Closure> {
        self.row(marker).map(|r| r.closed)
    }

    pub fn compulsory_markers(&self) -> Vec<&str> {
        self.rows
            .iter()
            .filter(|r| r.compulsory)
            .map(|r| r.marker.as_str())
            .collect()
    }

    pub fn deprecated_markers(&self) -> Vec<&str> {
        self.rows
            .iter()
            .filter(|r| r.deprecated)
            .map(|r| r.marker.as_str())
            .collect()
    }
}

/// "q2" → "q" for numbered variants; everything else unchanged.
fn base_form(marker: &str) -> &str {
    marker.trim_end_matches(|c: char| c.is_ascii_digit())
}

impl TableExport for UsfmMarkers {
    const NAME: &'static str = TABLE;

    fn flat(&self) -> FlatTable {
        FlatTable {
            name: Self::NAME,
            fields: vec![
                "marker",
                "nameEnglish",
                "compulsory",
                "numberable",
                "hasContent",
                "closed",
                "occursIn",
                "deprecated",
            ],
            rows: self
                .rows
                .iter()
                .map(|r| {
                    vec![
                        Some(r.marker.clone()),
                        Some(r.name_english.clone()),
                        Some(yes_no(r.compulsory)),
                        Some(yes_no(r.numberable)),
                        Some(r.has_content.to_string()),
                        Some(r.closed.to_string()),
                        Some(r.occurs_in.clone()),
                        Some(yes_no(r.deprecated)),
                    ]
                })
                .collect(),
        }
    }
}

fn yes_no(flag: bool) -> String {
    if flag { "Yes" } else { "No" }.to_string()
}

pub struct UsfmMarkersConverter {
    source: XmlSource,
    data: Option<UsfmMarkers>,
}

impl UsfmMarkersConverter {
    pub fn load(path: &Path, diags: &mut Diagnostics) -> Result<Self> {
        let path = if path.is_dir() {
            path.join("USFM2Markers.xml")
        } else {
            path.to_path_buf()
        };
        let source = load_table(&path, TABLE, diags)?;
        validate_records(TABLE, &source.records(RECORD_TAG), &SPEC, diags);
        Ok(Self { source, data: None })
    }

    pub fn header(&self) -> Option<&XmlHeader> {
        self.source.header.as_ref()
    }

    pub fn import(&mut self, diags: &mut Diagnostics) -> &UsfmMarkers {
        if self.data.is_none() {
            let mut data = UsfmMarkers::default();
            for record in self.source.records(RECORD_TAG) {
                if let Some(row) = extract_row(record, diags) {
                    insert_row(&mut data, row, diags);
                }
            }
            self.data = Some(data);
        }
        self.data.as_ref().expect("just imported")
    }

    pub fn data(&self) -> &UsfmMarkers {
        self.data
            .as_ref()
            .expect("UsfmMarkersConverter: import() must run before data()")
    }

    pub fn summary(&self) -> String {
        match &self.data {
            Some(data) => format!("{TABLE}: {} markers", data.len()),
            None => format!("{TABLE}: not yet imported"),
        }
    }
}

fn extract_row(record: &Element, diags: &mut Diagnostics) -> Option<MarkerRow> {
    let Some(marker) = child_text(record, "marker").filter(|v| !v.is_empty()) else {
        diags.error(TABLE, "record without a marker skipped");
        return None;
    };
    if !USFM_MARKER_PATTERN.is_match(&marker) {
        diags.error(TABLE, format!("'{marker}' is not a well-formed marker"));
    }
    let has_content = match child_text(record, "hasContent").as_deref() {
        Some(v) if USFM_CONTENT_VALUES.contains(v) => match v {
            "Always" => Content::Always,
            "Never" => Content::Never,
            _ => Content::Sometimes,
        },
        other => {
            diags.error(
                TABLE,
                format!("'{marker}': hasContent value {other:?} unrecognized"),
            );
            Content::Sometimes
        }
    };
    let closed = match child_text(record, "closed").as_deref() {
        Some(v) if USFM_CLOSED_VALUES.contains(v) => match v {
            "Always" => Closure::Always,
            "Optional" => Closure::Optional,
            _ => Closure::No,
        },
        other => {
            diags.error(TABLE, format!("'{marker}': closed value {other:?} unrecognized"));
            Closure::No
        }
    };
    Some(MarkerRow {
        name_english: child_text(record, "nameEnglish").unwrap_or_default(),
        compulsory: parse_flag(record, "compulsory", &marker, diags),
        numberable: parse_flag(record, "numberable", &marker, diags),
        nests: parse_flag(record, "nests", &marker, diags),
        has_content,
        printed: parse_flag(record, "printed", &marker, diags),
        closed,
        occurs_in: child_text(record, "occursIn").unwrap_or_default(),
        deprecated: parse_flag(record, "deprecated", &marker, diags),
        level: child_text(record, "level"),
        description: child_text(record, "description"),
        marker,
    })
}

fn parse_flag(record: &Element, name: &str, marker: &str, diags: &mut Diagnostics) -> bool {
    match child_text(record, name).as_deref() {
        Some("Yes") => true,
        Some("No") => false,
        other => {
            diags.error(
                TABLE,
                format!("'{marker}': {name} value {other:?} is not Yes/No"),
            );
            false
        }
    }
}

fn insert_row(data: &mut UsfmMarkers, row: MarkerRow, diags: &mut Diagnostics) {
    if data.by_marker.contains_key(&row.marker) {
        diags.error(TABLE, format!("duplicate marker '{}' ignored", row.marker));
        return;
    }
    let index = data.rows.len();
    data.by_marker.insert(row.marker.clone(), index);
    data.all_markers.insert(row.marker.clone());
    if row.numberable {
        for level in 1..=MAX_NUMBERED_LEVEL {
            data.all_markers.insert(format!("{}{level}", row.marker));
        }
    }
    data.rows.push(row);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn marker_record(marker: &str, numberable: &str, deprecated: &str) -> String {
        format!(
            "<USFMMarker>\
             <nameEnglish>Marker {marker}</nameEnglish>\
             <marker>{marker}</marker>\
             <compulsory>{}</compulsory>\
             <numberable>{numberable}</numberable>\
             <nests>No</nests>\
             <hasContent>Always</hasContent>\
             <printed>Yes</printed>\
             <closed>No</closed>\
             <occursIn>Text</occursIn>\
             <deprecated>{deprecated}</deprecated>\
             </USFMMarker>",
            if marker == "id" { "Yes" } else { "No" }
        )
    }

    fn load(records: &str) -> (UsfmMarkersConverter, Diagnostics) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("USFM2Markers.xml");
        let xml = format!(
            "<USFM2Markers><header><work><version>1</version></work></header>{records}</USFM2Markers>"
        );
        std::fs::File::create(&path)
            .unwrap()
            .write_all(xml.as_bytes())
            .unwrap();
        let mut diags = Diagnostics::new();
        let converter = UsfmMarkersConverter::load(&path, &mut diags).unwrap();
        (converter, diags)
    }

    #[test]
    fn pivots_and_expands_numberable_markers() {
        let records = [
            marker_record("id", "No", "No"),
            marker_record("s", "Yes", "No"),
            marker_record("fig", "No", "Yes"),
        ]
        .concat();
        let (mut converter, mut diags) = load(&records);
        let data = converter.import(&mut diags);
        assert!(diags.is_empty());
        assert!(data.is_valid_marker("s") && data.is_valid_marker("s2"));
        assert!(!data.is_valid_marker("id3"));
        assert!(data.is_compulsory("id"));
        assert!(data.is_deprecated("fig"));
        assert_eq!(data.marker_occurs_in("s1"), Some("Text"));
        assert_eq!(data.marker_has_content("s"), Some(Content::Always));
        assert_eq!(data.marker_closure_type("s"), Some(Closure::No));
        assert_eq!(data.compulsory_markers(), ["id"]);
    }

    #[test]
    fn bad_flag_values_are_reported_and_defaulted() {
        let broken = marker_record("p", "No", "No").replace(
            "<printed>Yes</printed>",
            "<printed>Maybe</printed>",
        );
        let (mut converter, mut diags) = load(&broken);
        let data = converter.import(&mut diags);
        assert!(diags.any_contains("printed value"));
        assert!(!data.row("p").unwrap().printed);
    }
}
