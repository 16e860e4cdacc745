//! Binary cache artifact.
//!
//! `bincode`-serialized pivoted data, written by the exporters and read
//! back by the runtime accessor when it is newer than the XML source.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use crate::tables::TableExport;

pub fn cache_path(out_dir: &Path, table: &str) -> PathBuf {
    out_dir.join(format!("{table}.bin"))
}

pub fn write<T: TableExport>(data: &T, out_dir: &Path) -> Result<()> {
    let path = cache_path(out_dir, T::NAME);
    let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    bincode::serialize_into(BufWriter::new(file), data)
        .with_context(|| format!("writing cache {}", path.display()))
}

pub fn read<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("opening cache {}", path.display()))?;
    bincode::deserialize_from(BufReader::new(file))
        .with_context(|| format!("reading cache {}", path.display()))
}

/// True when the cache at `cache` exists and is at least as new as the
/// source's modification time. An unreadable mtime on either side means
/// the cache is treated as stale.
pub fn is_fresh(cache: &Path, source_modified: Option<SystemTime>) -> bool {
    let Some(source_modified) = source_modified else {
        return false;
    };
    match std::fs::metadata(cache).and_then(|m| m.modified()) {
        Ok(cache_modified) => cache_modified >= source_modified,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn stale_and_fresh_caches_are_told_apart() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("table.bin");
        let early = SystemTime::UNIX_EPOCH;
        // No cache file yet.
        assert!(!is_fresh(&cache, Some(early)));
        File::create(&cache).unwrap().write_all(b"x").unwrap();
        // Any real file postdates the epoch.
        assert!(is_fresh(&cache, Some(early)));
        // Unknown source mtime always re-parses.
        assert!(!is_fresh(&cache, None));
        let future = SystemTime::now() + std::time::Duration::from_secs(3600);
        assert!(!is_fresh(&cache, Some(future)));
    }
}
