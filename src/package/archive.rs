// src/package/archive.rs

//! Gzip-compressed tar with a single entry.
//!
//! Headers are normalised (mtime 0, mode 0755, no owner names) so the same
//! binary always yields the same archive bytes.

use std::io::Read;

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

/// Build a `.tar.gz` holding `contents` as `entry_name` at the archive root.
pub fn single_file_tar_gz(entry_name: &str, contents: &[u8]) -> Result<Vec<u8>> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Regular);
    header.set_size(contents.len() as u64);
    header.set_mode(0o755);
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);

    builder
        .append_data(&mut header, entry_name, contents)
        .with_context(|| format!("appending '{entry_name}' to archive"))?;

    let encoder = builder.into_inner().context("finishing tar stream")?;
    encoder.finish().context("finishing gzip stream")
}

/// Entries of a `.tar.gz` as (path, contents), in archive order.
pub fn read_entries(bytes: &[u8]) -> Result<Vec<(String, Vec<u8>)>> {
    let mut archive = tar::Archive::new(GzDecoder::new(bytes));
    let mut entries = Vec::new();

    for entry in archive.entries().context("reading tar entries")? {
        let mut entry = entry.context("reading tar entry")?;
        let path = entry
            .path()
            .context("decoding entry path")?
            .to_string_lossy()
            .into_owned();
        let mut contents = Vec::new();
        entry
            .read_to_end(&mut contents)
            .with_context(|| format!("reading entry '{path}'"))?;
        entries.push((path, contents));
    }

    Ok(entries)
}
