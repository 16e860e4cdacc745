//! Python-source exporter.
//!
//! Emits the flat row view as literal list-of-dict declarations, so a
//! Python consumer can import the table without any XML machinery.
//! Absent fields come out as `None`, never as empty strings.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::tables::{FlatTable, TableExport};

pub fn py_path(out_dir: &Path, table: &str) -> PathBuf {
    out_dir.join(format!("{table}_Tables.py"))
}

pub fn write<T: TableExport>(data: &T, out_dir: &Path) -> Result<()> {
    let path = py_path(out_dir, T::NAME);
    let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(file);
    render(&data.flat(), &mut out).with_context(|| format!("writing {}", path.display()))
}

fn render(flat: &FlatTable, out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "# -*- coding: utf-8 -*-")?;
    writeln!(out, "# {} table data, generated file - do not edit.", flat.name)?;
    writeln!(out)?;
    writeln!(out, "{} = [", flat.name)?;
    for row in &flat.rows {
        write!(out, "    {{")?;
        for (index, (field, cell)) in flat.fields.iter().zip(row).enumerate() {
            if index > 0 {
                write!(out, ", ")?;
            }
            match cell {
                Some(value) => write!(out, "{}: {}", py_str(field), py_str(value))?,
                None => write!(out, "{}: None", py_str(field))?,
            }
        }
        writeln!(out, "}},")?;
    }
    writeln!(out, "]")
}

fn py_str(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('\'');
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\'"),
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(c),
        }
    }
    escaped.push('\'');
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_dicts_with_none_for_absent_cells() {
        let flat = FlatTable {
            name: "Codes",
            fields: vec!["bbb", "osis"],
            rows: vec![
                vec![Some("GEN".into()), Some("Gen".into())],
                vec![Some("JOB".into()), None],
            ],
        };
        let mut buffer = Vec::new();
        render(&flat, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("Codes = ["));
        assert!(text.contains("{'bbb': 'GEN', 'osis': 'Gen'},"));
        assert!(text.contains("{'bbb': 'JOB', 'osis': None},"));
    }

    #[test]
    fn quotes_and_backslashes_are_escaped() {
        assert_eq!(py_str("it's"), "'it\\'s'");
        assert_eq!(py_str("a\\b"), "'a\\\\b'");
    }
}
