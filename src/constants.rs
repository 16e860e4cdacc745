use lazy_regex::{regex, Lazy, Regex};
use phf::{phf_set, Set};

/// Shape of a canonical 3-character book reference abbreviation (BBB).
pub static BBB_PATTERN: &Lazy<Regex> = regex!(r"^[A-PR-XZ][A-EG-VX-Z1][A-WYZ1-6]$");

/// ISO 639-3 identifiers are exactly three lowercase ASCII letters.
pub static ISO639_PATTERN: &Lazy<Regex> = regex!(r"^[a-z]{3}$");

/// USFM markers: a lowercase letter then up to seven more letters/digits.
pub static USFM_MARKER_PATTERN: &Lazy<Regex> = regex!(r"^[a-z][a-z0-9]{0,7}$");

/// Lowest and highest legal book reference numbers.
pub const REFERENCE_NUMBER_RANGE: std::ops::RangeInclusive<u16> = 1..=999;

/// The versification system every other system's chapters are checked against.
pub const REFERENCE_VERSIFICATION_SYSTEM: &str = "BibMaxRef";

/// Legal values for the `linkType` attribute of a scripture cross-reference.
pub static LINK_TYPES: Set<&'static str> = phf_set! {
    "TSK",
    "QuotedOTReference",
    "AlludedOTReference",
    "PossibleOTReference",
};

/// Legal values for the `type` attribute of an organisational system.
pub static ORGANISATIONAL_SYSTEM_TYPES: Set<&'static str> = phf_set! {
    "edition",
    "revision",
    "translation",
    "original",
};

/// Legal values for the `closed` element of a USFM marker record.
pub static USFM_CLOSED_VALUES: Set<&'static str> = phf_set! {
    "No",
    "Always",
    "Optional",
};

/// Legal values for the `hasContent` element of a USFM marker record.
pub static USFM_CONTENT_VALUES: Set<&'static str> = phf_set! {
    "Always",
    "Sometimes",
    "Never",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbb_pattern_accepts_canonical_codes() {
        for code in ["GEN", "MAT", "CO1", "JDE", "REV"] {
            assert!(BBB_PATTERN.is_match(code), "{code} should be a legal BBB");
        }
    }

    #[test]
    fn bbb_pattern_rejects_malformed_codes() {
        for code in ["QQQ", "gen", "GE", "GENX", "G7N"] {
            assert!(!BBB_PATTERN.is_match(code), "{code} should be rejected");
        }
    }

    #[test]
    fn link_types_cover_the_wire_values() {
        assert!(LINK_TYPES.contains("TSK"));
        assert!(!LINK_TYPES.contains("tsk"));
    }
}
