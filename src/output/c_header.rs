//! C header/source pair exporter.
//!
//! Emits a `typedef struct` matching the flat row view plus a constant
//! array of records, for inclusion in a native-code project that keeps
//! its own copy of the tables. Absent fields come out as `NULL`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::tables::{FlatTable, TableExport};

pub fn header_path(out_dir: &Path, table: &str) -> PathBuf {
    out_dir.join(format!("{table}_Tables.h"))
}

pub fn source_path(out_dir: &Path, table: &str) -> PathBuf {
    out_dir.join(format!("{table}_Tables.c"))
}

pub fn write<T: TableExport>(data: &T, out_dir: &Path) -> Result<()> {
    let flat = data.flat();
    let path = header_path(out_dir, T::NAME);
    let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    render_header(&flat, &mut BufWriter::new(file))
        .with_context(|| format!("writing {}", path.display()))?;

    let path = source_path(out_dir, T::NAME);
    let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    render_source(&flat, &mut BufWriter::new(file))
        .with_context(|| format!("writing {}", path.display()))
}

fn render_header(flat: &FlatTable, out: &mut impl Write) -> std::io::Result<()> {
    let name = &flat.name;
    let guard = format!("{}_TABLES_H", name.to_uppercase());
    writeln!(out, "/* {name} table data, generated file - do not edit. */")?;
    writeln!(out, "#ifndef {guard}")?;
    writeln!(out, "#define {guard}")?;
    writeln!(out)?;
    writeln!(out, "typedef struct {name}Entry_s {{")?;
    for field in &flat.fields {
        writeln!(out, "    const char *{};", c_identifier(field))?;
    }
    writeln!(out, "}} {name}Entry;")?;
    writeln!(out)?;
    writeln!(out, "#define {}_ENTRY_COUNT {}", name.to_uppercase(), flat.rows.len())?;
    writeln!(out, "extern const {name}Entry {name}Table[];")?;
    writeln!(out)?;
    writeln!(out, "#endif /* {guard} */")
}

fn render_source(flat: &FlatTable, out: &mut impl Write) -> std::io::Result<()> {
    let name = &flat.name;
    writeln!(out, "/* {name} table data, generated file - do not edit. */")?;
    writeln!(out, "#include \"{name}_Tables.h\"")?;
    writeln!(out)?;
    writeln!(out, "const {name}Entry {name}Table[] = {{")?;
    for row in &flat.rows {
        write!(out, "    {{")?;
        for (index, cell) in row.iter().enumerate() {
            if index > 0 {
                write!(out, ", ")?;
            }
            match cell {
                Some(value) => write!(out, "{}", c_str(value))?,
                None => write!(out, "NULL")?,
            }
        }
        writeln!(out, "}},")?;
    }
    writeln!(out, "}};")
}

/// XML field names may carry characters C identifiers cannot.
fn c_identifier(field: &str) -> String {
    field
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn c_str(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('"');
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(c),
        }
    }
    escaped.push('"');
    escaped
}
