//! Cross-reference links, and the cached read path.
//!
//! The converter side is the usual load → validate → pivot pass over
//! `BibleReferencesLinks.xml`. The `ReferencesLinks` accessor is the
//! reader-side counterpart the rest of a toolkit would use at run time:
//! it prefers a binary cache artifact newer than the XML source and only
//! falls back to the full pipeline when the cache is stale or absent.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use xmltree::Element;

use crate::constants::LINK_TYPES;
use crate::diagnostics::Diagnostics;
use crate::output::{cache, ensure_out_dir};
use crate::schema::{validate_records, ElementSpec};
use crate::tables::{FlatTable, TableExport};
use crate::xml::{child_elements, child_text, load_table, XmlSource};

pub const TABLE: &str = "BibleReferencesLinks";
const RECORD_TAG: &str = "BibleReferenceLinksEntry";
const LINK_TAG: &str = "BibleReferenceLink";

const ENTRY_SPEC: ElementSpec = ElementSpec {
    tag: RECORD_TAG,
    compulsory_attributes: &[],
    optional_attributes: &[],
    compulsory_elements: &["sourceReference", "sourceComponent", "parsedSourceReference"],
    optional_elements: &[LINK_TAG],
    unique_attributes: &[],
    unique_elements: &[],
};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReferenceLink {
    pub target_reference: String,
    pub target_component: String,
    pub parsed_target_reference: String,
    pub link_type: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LinkEntry {
    pub source_reference: String,
    pub source_component: String,
    pub parsed_source_reference: String,
    pub links: Vec<ReferenceLink>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ReferencesLinksData {
    pub entries: Vec<LinkEntry>,
    by_source: HashMap<String, usize>,
}

impl ReferencesLinksData {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, source_reference: &str) -> bool {
        self.by_source.contains_key(source_reference)
    }

    pub fn entry(&self, source_reference: &str) -> Option<&LinkEntry> {
        self.by_source
            .get(source_reference)
            .map(|&i| &self.entries[i])
    }

    pub fn links_for_reference(&self, source_reference: &str) -> Option<&[ReferenceLink]> {
        self.entry(source_reference).map(|e| e.links.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = &LinkEntry> {
        self.entries.iter()
    }

    /// Flattened (source, target, type) triples across all entries.
    pub fn flattened(&self) -> Vec<(&str, &str, &str)> {
        self.entries
            .iter()
            .flat_map(|entry| {
                entry.links.iter().map(|link| {
                    (
                        entry.source_reference.as_str(),
                        link.target_reference.as_str(),
                        link.link_type.as_str(),
                    )
                })
            })
            .collect()
    }
}

impl TableExport for ReferencesLinksData {
    const NAME: &'static str = TABLE;

    fn flat(&self) -> FlatTable {
        FlatTable {
            name: Self::NAME,
            fields: vec!["sourceReference", "targetReference", "linkType"],
            rows: self
                .flattened()
                .into_iter()
                .map(|(source, target, link_type)| {
                    vec![
                        Some(source.to_string()),
                        Some(target.to_string()),
                        Some(link_type.to_string()),
                    ]
                })
                .collect(),
        }
    }
}

pub struct ReferencesLinksConverter {
    source: XmlSource,
    data: Option<ReferencesLinksData>,
}

impl ReferencesLinksConverter {
    pub fn load(path: &Path, diags: &mut Diagnostics) -> Result<Self> {
        let source = load_table(path, TABLE, diags)?;
        validate_records(TABLE, &source.records(RECORD_TAG), &ENTRY_SPEC, diags);
        Ok(Self { source, data: None })
    }

    pub fn import(&mut self, diags: &mut Diagnostics) -> &ReferencesLinksData {
        if self.data.is_none() {
            let mut data = ReferencesLinksData::default();
            for record in self.source.records(RECORD_TAG) {
                if let Some(entry) = extract_entry(record, diags) {
                    insert_entry(&mut data, entry, diags);
                }
            }
            self.data = Some(data);
        }
        self.data.as_ref().expect("just imported")
    }

    pub fn data(&self) -> &ReferencesLinksData {
        self.data
            .as_ref()
            .expect("ReferencesLinksConverter: import() must run before data()")
    }

    pub fn into_parts(self) -> (XmlSource, ReferencesLinksData) {
        let data = self
            .data
            .expect("ReferencesLinksConverter: import() must run before into_parts()");
        (self.source, data)
    }

    pub fn source(&self) -> &XmlSource {
        &self.source
    }

    pub fn summary(&self) -> String {
        match &self.data {
            Some(data) => format!(
                "{TABLE}: {} source references, {} links",
                data.len(),
                data.flattened().len()
            ),
            None => format!("{TABLE}: not yet imported"),
        }
    }
}

fn extract_entry(record: &Element, diags: &mut Diagnostics) -> Option<LinkEntry> {
    let Some(source_reference) = child_text(record, "sourceReference").filter(|v| !v.is_empty())
    else {
        diags.error(TABLE, "entry without sourceReference skipped");
        return None;
    };
    let links = child_elements(record)
        .filter(|e| e.name == LINK_TAG)
        .filter_map(|link| extract_link(&source_reference, link, diags))
        .collect();
    Some(LinkEntry {
        source_component: child_text(record, "sourceComponent").unwrap_or_default(),
        parsed_source_reference: child_text(record, "parsedSourceReference").unwrap_or_default(),
        source_reference,
        links,
    })
}

fn extract_link(source: &str, link: &Element, diags: &mut Diagnostics) -> Option<ReferenceLink> {
    let Some(target_reference) = child_text(link, "targetReference").filter(|v| !v.is_empty())
    else {
        diags.error(TABLE, format!("'{source}': link without targetReference skipped"));
        return None;
    };
    let link_type = child_text(link, "linkType").unwrap_or_default();
    if !LINK_TYPES.contains(link_type.as_str()) {
        diags.error(
            TABLE,
            format!("'{source}' -> '{target_reference}': unknown link type '{link_type}'"),
        );
    }
    Some(ReferenceLink {
        target_component: child_text(link, "targetComponent").unwrap_or_default(),
        parsed_target_reference: child_text(link, "parsedTargetReference").unwrap_or_default(),
        target_reference,
        link_type,
    })
}

fn insert_entry(data: &mut ReferencesLinksData, entry: LinkEntry, diags: &mut Diagnostics) {
    if data.by_source.contains_key(&entry.source_reference) {
        diags.error(
            TABLE,
            format!("duplicate source reference '{}' ignored", entry.source_reference),
        );
        return;
    }
    data.by_source
        .insert(entry.source_reference.clone(), data.entries.len());
    data.entries.push(entry);
}

/// Where the accessor's data came from, mostly of interest to tests and
/// the demo summary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOrigin {
    Cache,
    Source,
}

/// The run-time read path. Prefers the binary cache when it is at least
/// as new as the XML source; otherwise runs the full pipeline and
/// refreshes the cache. `load` is a no-op once loaded. Queries before
/// `load` panic, as they would on any unloaded map.
pub struct ReferencesLinks {
    xml_path: PathBuf,
    cache_dir: PathBuf,
    loaded: Option<(ReferencesLinksData, LoadOrigin)>,
}

impl ReferencesLinks {
    pub fn new(data_dir: &Path, cache_dir: &Path) -> Self {
        Self {
            xml_path: data_dir.join(format!("{TABLE}.xml")),
            cache_dir: cache_dir.to_path_buf(),
            loaded: None,
        }
    }

    pub fn load(&mut self, diags: &mut Diagnostics) -> Result<()> {
        if self.loaded.is_some() {
            debug!("{TABLE}: already loaded");
            return Ok(());
        }
        let cache_path = cache::cache_path(&self.cache_dir, TABLE);
        let source_modified = std::fs::metadata(&self.xml_path)
            .ok()
            .and_then(|m| m.modified().ok());
        if cache::is_fresh(&cache_path, source_modified) {
            if let Ok(data) = cache::read::<ReferencesLinksData>(&cache_path) {
                info!("{TABLE}: loaded {} entries from cache", data.len());
                self.loaded = Some((data, LoadOrigin::Cache));
                return Ok(());
            }
            // Unreadable cache falls through to the source path.
        }
        let mut converter = ReferencesLinksConverter::load(&self.xml_path, diags)?;
        converter.import(diags);
        let (_, data) = converter.into_parts();
        ensure_out_dir(&self.cache_dir)?;
        cache::write(&data, &self.cache_dir)?;
        info!("{TABLE}: loaded {} entries from source", data.len());
        self.loaded = Some((data, LoadOrigin::Source));
        Ok(())
    }

    pub fn origin(&self) -> LoadOrigin {
        self.state().1
    }

    pub fn data(&self) -> &ReferencesLinksData {
        &self.state().0
    }

    pub fn contains(&self, source_reference: &str) -> bool {
        self.data().contains(source_reference)
    }

    pub fn links_for_reference(&self, source_reference: &str) -> Option<&[ReferenceLink]> {
        self.data().links_for_reference(source_reference)
    }

    pub fn len(&self) -> usize {
        self.data().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data().is_empty()
    }

    fn state(&self) -> &(ReferencesLinksData, LoadOrigin) {
        self.loaded
            .as_ref()
            .expect("ReferencesLinks: load() must run before queries")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FIXTURE: &str = r#"<BibleReferencesLinks>
  <header><work><version>1</version></work></header>
  <BibleReferenceLinksEntry>
    <sourceReference>GEN_1:1</sourceReference>
    <sourceComponent>Verse</sourceComponent>
    <parsedSourceReference>GEN 1:1</parsedSourceReference>
    <BibleReferenceLink>
      <targetReference>JHN_1:1</targetReference>
      <targetComponent>Verse</targetComponent>
      <parsedTargetReference>JHN 1:1</parsedTargetReference>
      <linkType>QuotedOTReference</linkType>
    </BibleReferenceLink>
    <BibleReferenceLink>
      <targetReference>HEB_11:3</targetReference>
      <targetComponent>Verse</targetComponent>
      <parsedTargetReference>HEB 11:3</parsedTargetReference>
      <linkType>AlludedOTReference</linkType>
    </BibleReferenceLink>
  </BibleReferenceLinksEntry>
  <BibleReferenceLinksEntry>
    <sourceReference>GEN_1:3</sourceReference>
    <sourceComponent>Verse</sourceComponent>
    <parsedSourceReference>GEN 1:3</parsedSourceReference>
  </BibleReferenceLinksEntry>
</BibleReferencesLinks>
"#;

    fn write_fixture(dir: &Path) -> PathBuf {
        let path = dir.join("BibleReferencesLinks.xml");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(FIXTURE.as_bytes())
            .unwrap();
        path
    }

    #[test]
    fn pivots_links_by_source_reference() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path());
        let mut diags = Diagnostics::new();
        let mut converter = ReferencesLinksConverter::load(&path, &mut diags).unwrap();
        let data = converter.import(&mut diags);
        assert!(diags.is_empty());
        assert_eq!(data.len(), 2);
        assert_eq!(data.links_for_reference("GEN_1:1").unwrap().len(), 2);
        assert!(data.links_for_reference("GEN_1:3").unwrap().is_empty());
        assert!(data.links_for_reference("EXO_1:1").is_none());
        let triples = data.flattened();
        assert!(triples.contains(&("GEN_1:1", "HEB_11:3", "AlludedOTReference")));
    }

    #[test]
    fn unknown_link_type_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("BibleReferencesLinks.xml");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(
                FIXTURE
                    .replace("QuotedOTReference", "MadeUpLink")
                    .as_bytes(),
            )
            .unwrap();
        let mut diags = Diagnostics::new();
        let mut converter = ReferencesLinksConverter::load(&path, &mut diags).unwrap();
        converter.import(&mut diags);
        assert!(diags.any_contains("unknown link type 'MadeUpLink'"));
    }

    #[test]
    fn accessor_parses_source_then_prefers_cache() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        let cache_dir = dir.path().join("cache");
        let mut diags = Diagnostics::new();

        let mut first = ReferencesLinks::new(dir.path(), &cache_dir);
        first.load(&mut diags).unwrap();
        assert_eq!(first.origin(), LoadOrigin::Source);
        assert!(first.contains("GEN_1:1"));

        // The cache was just written, so a second accessor never parses.
        let mut second = ReferencesLinks::new(dir.path(), &cache_dir);
        second.load(&mut diags).unwrap();
        assert_eq!(second.origin(), LoadOrigin::Cache);
        assert_eq!(second.len(), first.len());
        assert_eq!(
            second.links_for_reference("GEN_1:1").unwrap().len(),
            2
        );
    }

    #[test]
    fn second_load_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        let cache_dir = dir.path().join("cache");
        let mut diags = Diagnostics::new();
        let mut accessor = ReferencesLinks::new(dir.path(), &cache_dir);
        accessor.load(&mut diags).unwrap();
        let origin = accessor.origin();
        accessor.load(&mut diags).unwrap();
        assert_eq!(accessor.origin(), origin);
    }

    #[test]
    #[should_panic(expected = "load() must run before queries")]
    fn queries_before_load_panic() {
        let dir = tempfile::tempdir().unwrap();
        let accessor = ReferencesLinks::new(dir.path(), dir.path());
        accessor.len();
    }
}
