//! Pure-format fallback extractor.
//!
//! Strategy 3 reads the zip container directly — end-of-central-directory
//! record, central directory, then each local entry — without going through
//! an archive library. It exists for archives that trip the `zip` crate's
//! parser but are still structurally recoverable. Only stored and deflate
//! entries are supported, which covers everything the hosting API produces.

use std::fs;
use std::io::Read;
use std::path::Path;

use flate2::read::DeflateDecoder;

use super::{sanitize_entry_path, ExtractionStrategy};
use crate::errors::{InstallError, InstallResult};

const EOCD_SIGNATURE: [u8; 4] = [0x50, 0x4B, 0x05, 0x06];
const CENTRAL_SIGNATURE: [u8; 4] = [0x50, 0x4B, 0x01, 0x02];
const LOCAL_SIGNATURE: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// Fixed portion of the end-of-central-directory record.
const EOCD_LEN: usize = 22;
/// Fixed portion of a central directory header.
const CENTRAL_LEN: usize = 46;
/// Fixed portion of a local file header.
const LOCAL_LEN: usize = 30;

const METHOD_STORED: u16 = 0;
const METHOD_DEFLATED: u16 = 8;

pub struct RawFormatExtractor;

struct CentralEntry {
    name: String,
    method: u16,
    compressed_size: usize,
    uncompressed_size: usize,
    local_offset: usize,
}

impl ExtractionStrategy for RawFormatExtractor {
    fn name(&self) -> &'static str {
        "raw-format"
    }

    fn extract(&self, archive: &Path, dest: &Path) -> InstallResult<()> {
        let data = fs::read(archive)?;
        let eocd = find_eocd(&data).ok_or_else(|| {
            InstallError::Validation("end of central directory record not found".to_string())
        })?;

        let entry_count = u16_at(&data, eocd + 10) as usize;
        let cd_offset = u32_at(&data, eocd + 16) as usize;
        if entry_count == 0xFFFF || cd_offset == 0xFFFF_FFFF {
            return Err(InstallError::Validation(
                "zip64 archives are not supported by the raw reader".to_string(),
            ));
        }

        let mut offset = cd_offset;
        for _ in 0..entry_count {
            let (entry, next) = parse_central_entry(&data, offset)?;
            extract_entry(&data, &entry, dest)?;
            offset = next;
        }
        Ok(())
    }
}

/// Locate the EOCD record by scanning backwards through the trailing
/// comment space (comments are bounded at 64 KiB).
fn find_eocd(data: &[u8]) -> Option<usize> {
    if data.len() < EOCD_LEN {
        return None;
    }
    let floor = data.len().saturating_sub(EOCD_LEN + u16::MAX as usize);
    (floor..=data.len() - EOCD_LEN)
        .rev()
        .find(|&pos| data[pos..pos + 4] == EOCD_SIGNATURE)
}

fn parse_central_entry(data: &[u8], offset: usize) -> InstallResult<(CentralEntry, usize)> {
    if data.len() < offset + CENTRAL_LEN {
        return Err(InstallError::Validation(
            "central directory truncated".to_string(),
        ));
    }
    if data[offset..offset + 4] != CENTRAL_SIGNATURE {
        return Err(InstallError::Validation(
            "central directory header signature mismatch".to_string(),
        ));
    }

    let method = u16_at(data, offset + 10);
    let compressed_size = u32_at(data, offset + 20) as usize;
    let uncompressed_size = u32_at(data, offset + 24) as usize;
    let name_len = u16_at(data, offset + 28) as usize;
    let extra_len = u16_at(data, offset + 30) as usize;
    let comment_len = u16_at(data, offset + 32) as usize;
    let local_offset = u32_at(data, offset + 42) as usize;

    let name_start = offset + CENTRAL_LEN;
    let next = name_start + name_len + extra_len + comment_len;
    if data.len() < next {
        return Err(InstallError::Validation(
            "central directory entry overruns the archive".to_string(),
        ));
    }
    let name = String::from_utf8_lossy(&data[name_start..name_start + name_len]).into_owned();

    Ok((
        CentralEntry {
            name,
            method,
            compressed_size,
            uncompressed_size,
            local_offset,
        },
        next,
    ))
}

fn extract_entry(data: &[u8], entry: &CentralEntry, dest: &Path) -> InstallResult<()> {
    let rel = sanitize_entry_path(&entry.name)?;
    let out_path = dest.join(&rel);

    if entry.name.ends_with('/') {
        fs::create_dir_all(&out_path)?;
        return Ok(());
    }

    let header = entry.local_offset;
    if data.len() < header + LOCAL_LEN {
        return Err(InstallError::Validation(format!(
            "local header for '{}' lies outside the archive",
            entry.name
        )));
    }
    if data[header..header + 4] != LOCAL_SIGNATURE {
        return Err(InstallError::Validation(format!(
            "local header signature mismatch for '{}'",
            entry.name
        )));
    }

    // Sizes come from the central directory, which stays correct even when
    // the local header deferred them to a data descriptor.
    let name_len = u16_at(data, header + 26) as usize;
    let extra_len = u16_at(data, header + 28) as usize;
    let start = header + LOCAL_LEN + name_len + extra_len;
    let end = start + entry.compressed_size;
    if data.len() < end {
        return Err(InstallError::Validation(format!(
            "entry data for '{}' overruns the archive",
            entry.name
        )));
    }
    let compressed = &data[start..end];

    let contents = match entry.method {
        METHOD_STORED => compressed.to_vec(),
        METHOD_DEFLATED => {
            let mut decoded = Vec::with_capacity(entry.uncompressed_size);
            DeflateDecoder::new(compressed)
                .read_to_end(&mut decoded)
                .map_err(|e| {
                    InstallError::Validation(format!(
                        "deflate stream for '{}' is corrupt: {}",
                        entry.name, e
                    ))
                })?;
            decoded
        }
        other => {
            return Err(InstallError::Validation(format!(
                "unsupported compression method {} for '{}'",
                other, entry.name
            )));
        }
    };

    if contents.len() != entry.uncompressed_size {
        return Err(InstallError::Validation(format!(
            "entry '{}' decompressed to {} bytes, expected {}",
            entry.name,
            contents.len(),
            entry.uncompressed_size
        )));
    }

    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&out_path, contents)?;
    Ok(())
}

fn u16_at(data: &[u8], pos: usize) -> u16 {
    u16::from_le_bytes([data[pos], data[pos + 1]])
}

fn u32_at(data: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
}
