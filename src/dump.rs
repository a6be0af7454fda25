//! SQL dump codec.
//!
//! A dump travels as base64 text wrapping a gzip stream; the decompressed
//! content is a JSON array of SQL statements in execution order.

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::io::{Read, Write};

/// Decode a fetched dump payload into its statements.
///
/// An empty (or whitespace-only) payload means "no dump available" and
/// decodes to an empty list.
///
/// # Errors
/// Returns an error if the payload is not base64, not gzip, or not a JSON
/// array of strings.
pub fn decompress_sql_dump(payload: &str) -> Result<Vec<String>> {
    let payload = payload.trim();
    if payload.is_empty() {
        return Ok(Vec::new());
    }

    let bytes = STANDARD
        .decode(payload)
        .context("dump payload is not valid base64")?;
    let mut text = String::new();
    GzDecoder::new(bytes.as_slice())
        .read_to_string(&mut text)
        .context("failed to decompress dump")?;
    let statements: Vec<String> =
        serde_json::from_str(&text).context("dump is not a JSON array of statements")?;
    Ok(statements)
}

/// Encode statements into the payload format read by [`decompress_sql_dump`].
pub fn compress_sql_dump<S: AsRef<str>>(statements: &[S]) -> Result<String> {
    let list: Vec<&str> = statements.iter().map(AsRef::as_ref).collect();
    let json = serde_json::to_vec(&list)?;
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(&json)?;
    let gz = enc.finish().context("failed to compress dump")?;
    Ok(STANDARD.encode(gz))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_is_empty_dump() {
        assert!(decompress_sql_dump("").unwrap().is_empty());
        assert!(decompress_sql_dump("  \n").unwrap().is_empty());
    }

    #[test]
    fn decodes_compressed_statements_in_order() {
        let stmts = [
            "CREATE TABLE t(v TEXT)",
            "INSERT INTO t VALUES('a:b')",
        ];
        let payload = compress_sql_dump(&stmts).unwrap();
        assert_eq!(decompress_sql_dump(&payload).unwrap(), stmts);
    }

    #[test]
    fn garbage_payload_is_an_error() {
        assert!(decompress_sql_dump("not base64 !!").is_err());
        // valid base64, not gzip
        assert!(decompress_sql_dump("aGVsbG8=").is_err());
    }

    #[test]
    fn non_array_json_is_an_error() {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(br#"{"sql":"x"}"#).unwrap();
        let payload = STANDARD.encode(enc.finish().unwrap());
        let err = decompress_sql_dump(&payload).unwrap_err();
        assert!(err.to_string().contains("JSON array"));
    }
}
