//! Exporters over the pivoted tables.
//!
//! Each exporter is independent and idempotent: the same pivoted data
//! produces byte-identical output, apart from the generation timestamp
//! the JSON mirror embeds. Exporters run after the pivot stage only;
//! the converters' `data()` accessors enforce that with a panic.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::error;

use crate::tables::TableExport;
use crate::xml::XmlHeader;

pub mod c_header;
pub mod cache;
pub mod json;
pub mod py_source;

/// Create the destination folder if absent.
pub fn ensure_out_dir(out_dir: &Path) -> Result<()> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output folder {}", out_dir.display()))
}

/// Run every exporter for one table. A failing exporter is reported and
/// the rest still run; the first error is returned at the end so the
/// caller's exit status reflects it.
pub fn export_all<T: TableExport>(
    data: &T,
    header: Option<&XmlHeader>,
    out_dir: &Path,
) -> Result<()> {
    ensure_out_dir(out_dir)?;
    let mut first_failure = None;
    let attempts: [(&str, Result<()>); 4] = [
        ("cache", cache::write(data, out_dir)),
        ("json", json::write(data, header, out_dir)),
        ("python", py_source::write(data, out_dir)),
        ("c", c_header::write(data, out_dir)),
    ];
    for (kind, result) in attempts {
        if let Err(err) = result {
            error!("{}: {kind} export failed: {err:#}", T::NAME);
            first_failure.get_or_insert(err);
        }
    }
    match first_failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
