use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result};
use memmap2::{Mmap, MmapOptions};

use crate::format::file::{Decoded, W3dFile};

/// Opens a memory mapped file.
pub fn map_file<P: AsRef<Path>>(path: P) -> Result<Mmap> {
    let file = File::open(&path)
        .with_context(|| format!("Failed to open file '{}'", path.as_ref().display()))?;
    let map = unsafe { MmapOptions::new().map(&file) }
        .with_context(|| format!("Failed to mmap file: '{}'", path.as_ref().display()))?;
    Ok(map)
}

/// Maps and decodes a W3D file.
pub fn read_w3d_file<P: AsRef<Path>>(path: P) -> Result<Decoded> {
    let map = map_file(&path)?;
    W3dFile::read(&map).with_context(|| format!("Failed to decode '{}'", path.as_ref().display()))
}

/// Creates `path` and writes `data` through a buffered writer.
pub fn write_file<P: AsRef<Path>>(path: P, data: &[u8]) -> Result<()> {
    let file = File::create(&path)
        .with_context(|| format!("Failed to create file '{}'", path.as_ref().display()))?;
    let mut w = BufWriter::new(file);
    w.write_all(data)?;
    w.flush()?;
    Ok(())
}
