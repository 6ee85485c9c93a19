//! Manifest wire format: a `FileMap` compressed with raw DEFLATE (no
//! zlib/gzip header), one `<tag>=<path>` line per entry.
//!
//! `tag` is `1` for a directory or the 32-hex MD5 digest for a file.
//! Decoding is tolerant: a missing, empty, or malformed manifest decodes
//! to an empty `FileMap` with a warning logged, never a hard error — the
//! deployer treats "no manifest" as "first deploy".

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use htdeploy_core::types::{Fingerprint, FileMap, DIR_TAG};
use std::io::{Read, Write};

pub fn encode(map: &FileMap) -> anyhow::Result<Vec<u8>> {
    let mut plain = String::new();
    for (path, fp) in map {
        plain.push_str(&fp.wire_tag());
        plain.push('=');
        plain.push_str(path);
        plain.push('\n');
    }

    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(plain.as_bytes())?;
    Ok(encoder.finish()?)
}

pub fn decode(bytes: &[u8]) -> FileMap {
    let mut map = FileMap::new();
    if bytes.is_empty() {
        return map;
    }

    let mut plain = String::new();
    let mut decoder = DeflateDecoder::new(bytes);
    if let Err(e) = decoder.read_to_string(&mut plain) {
        tracing::warn!(error = %e, "manifest: failed to inflate, treating as empty");
        return map;
    }

    for (lineno, line) in plain.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        let Some((tag, path)) = line.split_once('=') else {
            tracing::warn!(lineno, line, "manifest: malformed line, skipping");
            continue;
        };
        let fp = if tag == DIR_TAG {
            Fingerprint::Dir
        } else if is_valid_md5(tag) {
            Fingerprint::File(tag.to_ascii_lowercase())
        } else {
            tracing::warn!(lineno, tag, "manifest: unrecognized tag, skipping");
            continue;
        };
        map.insert(path.to_string(), fp);
    }

    map
}

fn is_valid_md5(tag: &str) -> bool {
    tag.len() == 32 && tag.chars().all(|c| c.is_ascii_hexdigit())
}
