use core::fmt;

pub mod constants;
pub mod diagnostics;
pub mod output;
pub mod schema;
pub mod tables;
pub mod xml;

/// Which reference table a CLI invocation works on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataTable {
    BooksCodes,
    BookOrders,
    Versification,
    Punctuation,
    BooksNames,
    IsoLanguages,
    UsfmMarkers,
    Organisational,
    ReferencesLinks,
    All,
}

impl Default for DataTable {
    fn default() -> Self {
        Self::All
    }
}

impl fmt::Display for DataTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BooksCodes => f.write_str("books-codes"),
            Self::BookOrders => f.write_str("book-orders"),
            Self::Versification => f.write_str("versification"),
            Self::Punctuation => f.write_str("punctuation"),
            Self::BooksNames => f.write_str("books-names"),
            Self::IsoLanguages => f.write_str("iso-languages"),
            Self::UsfmMarkers => f.write_str("usfm-markers"),
            Self::Organisational => f.write_str("organisational"),
            Self::ReferencesLinks => f.write_str("references-links"),
            Self::All => f.write_str("all"),
        }
    }
}

impl core::str::FromStr for DataTable {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "books-codes" => Ok(Self::BooksCodes),
            "book-orders" => Ok(Self::BookOrders),
            "versification" => Ok(Self::Versification),
            "punctuation" => Ok(Self::Punctuation),
            "books-names" => Ok(Self::BooksNames),
            "iso-languages" => Ok(Self::IsoLanguages),
            "usfm-markers" => Ok(Self::UsfmMarkers),
            "organisational" => Ok(Self::Organisational),
            "references-links" => Ok(Self::ReferencesLinks),
            "all" => Ok(Self::All),
            _ => Err(anyhow::anyhow!("Unknown table name '{s}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_round_trip() {
        for table in [
            DataTable::BooksCodes,
            DataTable::UsfmMarkers,
            DataTable::ReferencesLinks,
            DataTable::All,
        ] {
            assert_eq!(table.to_string().parse::<DataTable>().unwrap(), table);
        }
        assert!("no-such-table".parse::<DataTable>().is_err());
    }
}
