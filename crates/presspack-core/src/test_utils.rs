//! Shared helpers for unit and integration tests.

use std::io::Write;
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

/// Build a zip archive in memory from `(entry name, contents)` pairs.
///
/// Entry names ending in `/` become directory entries. Uses deflate unless
/// `stored` is requested.
pub fn build_zip(entries: &[(&str, &[u8])], stored: bool) -> Vec<u8> {
    let method = if stored {
        CompressionMethod::Stored
    } else {
        CompressionMethod::Deflated
    };
    let options = SimpleFileOptions::default().compression_method(method);

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        for (name, contents) in entries {
            if name.ends_with('/') {
                writer.add_directory(name.trim_end_matches('/'), options).unwrap();
            } else {
                writer.start_file(*name, options).unwrap();
                writer.write_all(contents).unwrap();
            }
        }
        writer.finish().unwrap();
    }
    cursor.into_inner()
}

/// Write a deflate-compressed zip archive to `path`.
pub fn write_zip_file(path: &Path, entries: &[(&str, &[u8])]) {
    std::fs::write(path, build_zip(entries, false)).unwrap();
}

/// A plugin source file carrying the standard comment header.
pub fn plugin_source(name: &str) -> String {
    format!(
        "<?php\n/**\n * Plugin Name: {}\n * Version: 1.0.0\n * Description: Test fixture.\n */\n",
        name
    )
}
