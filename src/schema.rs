//! The generic record-shape validator.
//!
//! Each table declares one `ElementSpec` per record element type:
//! which attributes and child elements are compulsory, which are merely
//! allowed, and which must hold values unique across the whole table.
//! Validation is diagnostic only — the source files are hand-edited and
//! one bad record must not block use of the rest of the table.

use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use log::debug;
use unicase::UniCase;
use xmltree::Element;

use crate::diagnostics::Diagnostics;
use crate::xml::{child_elements, element_text};

/// Static shape description for one record element type. Built once at
/// converter construction, immutable thereafter.
#[derive(Clone, Copy, Debug)]
pub struct ElementSpec {
    pub tag: &'static str,
    pub compulsory_attributes: &'static [&'static str],
    pub optional_attributes: &'static [&'static str],
    pub compulsory_elements: &'static [&'static str],
    pub optional_elements: &'static [&'static str],
    /// Uniqueness is scoped per attribute name, never cross-field.
    pub unique_attributes: &'static [&'static str],
    /// Uniqueness is scoped per element name, never cross-field.
    pub unique_elements: &'static [&'static str],
}

impl ElementSpec {
    fn attribute_declared(&self, name: &str) -> bool {
        self.compulsory_attributes.contains(&name) || self.optional_attributes.contains(&name)
    }

    fn element_declared(&self, name: &str) -> bool {
        self.compulsory_elements.contains(&name) || self.optional_elements.contains(&name)
    }
}

/// Tracks already-seen values per field so duplicates can be reported.
/// Comparison is case-insensitive, matching how the downstream lookup
/// maps treat abbreviations.
#[derive(Default)]
struct SeenValues {
    by_field: HashMap<&'static str, HashSet<UniCase<String>>>,
}

impl SeenValues {
    /// Returns false (and reports nothing) the first time a value shows
    /// up in a field, true on every repeat.
    fn already_seen(&mut self, field: &'static str, value: &str) -> bool {
        !self
            .by_field
            .entry(field)
            .or_default()
            .insert(UniCase::new(value.to_string()))
    }
}

/// Check every record element against `spec`, reporting all violations
/// through `diags`. Never aborts; the caller pivots the tree afterwards
/// regardless of what was found here.
///
/// An empty record set means the table is unusable, which is a
/// programmer/packaging error rather than data drift.
pub fn validate_records(
    table: &str,
    records: &[&Element],
    spec: &ElementSpec,
    diags: &mut Diagnostics,
) {
    assert!(
        !records.is_empty(),
        "{table}: no '{}' record elements to validate",
        spec.tag
    );
    debug!(
        "{table}: validating {} records against {}",
        records.len(),
        describe_spec(spec)
    );
    let mut seen = SeenValues::default();
    for (index, record) in records.iter().enumerate() {
        let at = format!("{} record {}", spec.tag, index + 1);
        if record.name != spec.tag {
            diags.warn(
                table,
                format!("unexpected element '{}' at {at}", record.name),
            );
            continue;
        }
        check_attributes(table, record, spec, &at, &mut seen, diags);
        check_child_elements(table, record, spec, &at, &mut seen, diags);
    }
}

fn check_attributes(
    table: &str,
    record: &Element,
    spec: &ElementSpec,
    at: &str,
    seen: &mut SeenValues,
    diags: &mut Diagnostics,
) {
    for &name in spec.compulsory_attributes {
        match record.attributes.get(name) {
            None => diags.error(table, format!("compulsory attribute '{name}' missing in {at}")),
            Some(value) if value.trim().is_empty() => {
                diags.error(table, format!("compulsory attribute '{name}' is blank in {at}"))
            }
            Some(_) => {}
        }
    }
    for (name, value) in &record.attributes {
        if !spec.attribute_declared(name) {
            diags.warn(
                table,
                format!("additional attribute '{name}' (=\"{value}\") in {at}"),
            );
        }
    }
    for &name in spec.unique_attributes {
        if let Some(value) = record.attributes.get(name) {
            if !value.trim().is_empty() && seen.already_seen(name, value.trim()) {
                diags.error(
                    table,
                    format!("duplicate value \"{}\" for unique attribute '{name}' in {at}", value.trim()),
                );
            }
        }
    }
}

fn check_child_elements(
    table: &str,
    record: &Element,
    spec: &ElementSpec,
    at: &str,
    seen: &mut SeenValues,
    diags: &mut Diagnostics,
) {
    for &name in spec.compulsory_elements {
        match record.get_child(name) {
            None => diags.error(table, format!("compulsory element '{name}' missing in {at}")),
            Some(child) if element_text(child).is_empty() => {
                diags.error(table, format!("compulsory element '{name}' is blank in {at}"))
            }
            Some(_) => {}
        }
    }
    for child in child_elements(record) {
        if !spec.element_declared(&child.name) {
            diags.warn(
                table,
                format!("additional element '{}' in {at}", child.name),
            );
        }
    }
    for &name in spec.unique_elements {
        // Optional elements may repeat within one record; every
        // occurrence takes part in the cross-record uniqueness scope.
        for child in child_elements(record).filter(|c| c.name == name) {
            let value = element_text(child);
            if !value.is_empty() && seen.already_seen(name, &value) {
                diags.error(
                    table,
                    format!("duplicate value \"{value}\" for unique element '{name}' in {at}"),
                );
            }
        }
    }
}

/// One-line shape summary of a record spec.
pub fn describe_spec(spec: &ElementSpec) -> String {
    format!(
        "<{}> attrs [{}] + [{}], elements [{}] + [{}]",
        spec.tag,
        spec.compulsory_attributes.iter().join(", "),
        spec.optional_attributes.iter().join(", "),
        spec.compulsory_elements.iter().join(", "),
        spec.optional_elements.iter().join(", "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::child_elements;

    const SPEC: ElementSpec = ElementSpec {
        tag: "Book",
        compulsory_attributes: &["id"],
        optional_attributes: &["note"],
        compulsory_elements: &["code"],
        optional_elements: &["alias"],
        unique_attributes: &["id"],
        unique_elements: &["code"],
    };

    fn records(xml: &str) -> Element {
        Element::parse(xml.as_bytes()).unwrap()
    }

    fn validate(root: &Element) -> Diagnostics {
        let mut diags = Diagnostics::new();
        let recs: Vec<&Element> = child_elements(root).collect();
        validate_records("Books", &recs, &SPEC, &mut diags);
        diags
    }

    #[test]
    fn clean_records_produce_no_diagnostics() {
        let root = records(
            r#"<Books>
                 <Book id="1"><code>GEN</code><alias>Gn</alias></Book>
                 <Book id="2" note="x"><code>EXO</code></Book>
               </Books>"#,
        );
        assert!(validate(&root).is_empty());
    }

    #[test]
    fn missing_and_blank_compulsory_fields_are_errors() {
        let root = records(
            r#"<Books>
                 <Book><code> </code></Book>
               </Books>"#,
        );
        let diags = validate(&root);
        assert_eq!(diags.error_count(), 2);
        assert!(diags.any_contains("'id' missing"));
        assert!(diags.any_contains("'code' is blank"));
    }

    #[test]
    fn undeclared_fields_warn_but_do_not_error() {
        let root = records(
            r#"<Books>
                 <Book id="1" extra="y"><code>GEN</code><surprise/></Book>
               </Books>"#,
        );
        let diags = validate(&root);
        assert_eq!(diags.error_count(), 0);
        assert_eq!(diags.warning_count(), 2);
        assert!(diags.any_contains("additional attribute 'extra'"));
        assert!(diags.any_contains("additional element 'surprise'"));
    }

    #[test]
    fn duplicate_unique_values_are_errors_case_insensitively() {
        let root = records(
            r#"<Books>
                 <Book id="1"><code>GEN</code></Book>
                 <Book id="2"><code>gen</code></Book>
                 <Book id="1"><code>EXO</code></Book>
               </Books>"#,
        );
        let diags = validate(&root);
        assert!(diags.any_contains("duplicate value \"gen\" for unique element 'code'"));
        assert!(diags.any_contains("duplicate value \"1\" for unique attribute 'id'"));
    }

    #[test]
    fn uniqueness_is_not_cross_field() {
        // "1" as an id and "1" as a code must not collide.
        let root = records(
            r#"<Books>
                 <Book id="1"><code>1</code></Book>
               </Books>"#,
        );
        assert_eq!(validate(&root).error_count(), 0);
    }

    #[test]
    fn spec_summary_names_every_declared_field() {
        let summary = describe_spec(&SPEC);
        assert_eq!(summary, "<Book> attrs [id] + [note], elements [code] + [alias]");
    }

    #[test]
    #[should_panic]
    fn empty_record_set_is_a_programmer_error() {
        let mut diags = Diagnostics::new();
        validate_records("Books", &[], &SPEC, &mut diags);
    }
}
