//! XML table loading.
//!
//! Every reference table is one hand-maintained XML file: a fixed root
//! tag, an optional leading `header` sub-tree carrying work metadata,
//! then a flat sequence of sibling record elements. The loader parses
//! the file into an owned tree, strips the header out, and remembers the
//! source path and modification time for the cache-freshness check.

use std::borrow::Cow;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{bail, Context, Result};
use xmltree::Element;

use crate::diagnostics::Diagnostics;

/// Work metadata from the leading `header` sub-tree.
#[derive(Clone, Debug, Default)]
pub struct XmlHeader {
    pub title: Option<String>,
    pub version: Option<String>,
    pub date: Option<String>,
}

/// One parsed table: the root element (header already removed) plus
/// provenance needed later by the exporters and the runtime accessor.
#[derive(Debug)]
pub struct XmlSource {
    pub root: Element,
    pub header: Option<XmlHeader>,
    pub path: PathBuf,
    pub modified: Option<SystemTime>,
}

impl XmlSource {
    /// Direct child record elements carrying the given tag, in document order.
    pub fn records<'a>(&'a self, tag: &str) -> Vec<&'a Element> {
        child_elements(&self.root)
            .filter(|e| e.name == tag)
            .collect()
    }
}

/// Load one table. `path` may be the XML file itself or a folder
/// containing `<expected_root>.xml`. A wrong root tag is fatal; a
/// missing header is only reported.
pub fn load_table(path: &Path, expected_root: &str, diags: &mut Diagnostics) -> Result<XmlSource> {
    let path = resolve(path, expected_root);
    let file = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
    let mut root = Element::parse(BufReader::new(file))
        .with_context(|| format!("parsing {}", path.display()))?;
    if root.name != expected_root {
        bail!(
            "{}: expected root element '{expected_root}' but found '{}'",
            path.display(),
            root.name
        );
    }
    let header = match root.take_child("header") {
        Some(header) => Some(parse_header(&header)),
        None => {
            diags.error(
                expected_root,
                format!("{}: missing 'header' element", path.display()),
            );
            None
        }
    };
    let modified = std::fs::metadata(&path).ok().and_then(|m| m.modified().ok());
    Ok(XmlSource {
        root,
        header,
        path,
        modified,
    })
}

fn resolve(path: &Path, expected_root: &str) -> PathBuf {
    if path.is_dir() {
        path.join(format!("{expected_root}.xml"))
    } else {
        path.to_path_buf()
    }
}

fn parse_header(header: &Element) -> XmlHeader {
    // Metadata usually sits under a 'work' sub-element but some older
    // tables put it directly under 'header'.
    let work = header.get_child("work").unwrap_or(header);
    XmlHeader {
        title: child_text(work, "title"),
        version: child_text(work, "version"),
        date: child_text(work, "date"),
    }
}

/// Direct child elements (text and comment nodes skipped).
pub fn child_elements(el: &Element) -> impl Iterator<Item = &Element> {
    el.children.iter().filter_map(|n| n.as_element())
}

/// Trimmed text of a named child. `None` means the child is absent;
/// `Some("")` means it is present but empty — callers must keep the two
/// apart.
pub fn child_text(el: &Element, name: &str) -> Option<String> {
    el.get_child(name).map(element_text)
}

/// Trimmed text content of an element itself, empty string if none.
pub fn element_text(el: &Element) -> String {
    el.get_text()
        .unwrap_or(Cow::Borrowed(""))
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_xml(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    const SMALL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Things>
  <header>
    <work>
      <version>0.5</version>
      <date>2010-11-01</date>
      <title>Tiny table</title>
    </work>
  </header>
  <Thing><name>alpha</name></Thing>
  <Thing><name>beta</name><note/></Thing>
</Things>
"#;

    #[test]
    fn loads_and_strips_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_xml(dir.path(), "Things.xml", SMALL);
        let mut diags = Diagnostics::new();
        let source = load_table(&path, "Things", &mut diags).unwrap();
        assert!(diags.is_empty());
        let header = source.header.as_ref().unwrap();
        assert_eq!(header.version.as_deref(), Some("0.5"));
        assert_eq!(header.title.as_deref(), Some("Tiny table"));
        assert_eq!(source.records("Thing").len(), 2);
        // Header must not survive as a record sibling.
        assert!(source.root.get_child("header").is_none());
    }

    #[test]
    fn resolves_folder_to_root_named_file() {
        let dir = tempfile::tempdir().unwrap();
        write_xml(dir.path(), "Things.xml", SMALL);
        let mut diags = Diagnostics::new();
        let source = load_table(dir.path(), "Things", &mut diags).unwrap();
        assert_eq!(source.records("Thing").len(), 2);
    }

    #[test]
    fn wrong_root_tag_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_xml(dir.path(), "bad.xml", "<Wrong/>");
        let mut diags = Diagnostics::new();
        assert!(load_table(&path, "Things", &mut diags).is_err());
    }

    #[test]
    fn missing_header_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_xml(dir.path(), "h.xml", "<Things><Thing/></Things>");
        let mut diags = Diagnostics::new();
        let source = load_table(&path, "Things", &mut diags).unwrap();
        assert!(source.header.is_none());
        assert_eq!(diags.error_count(), 1);
    }

    #[test]
    fn absent_and_empty_children_are_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_xml(dir.path(), "Things.xml", SMALL);
        let mut diags = Diagnostics::new();
        let source = load_table(&path, "Things", &mut diags).unwrap();
        let beta = source.records("Thing")[1];
        assert_eq!(child_text(beta, "note").as_deref(), Some(""));
        assert_eq!(child_text(beta, "absent"), None);
    }
}
