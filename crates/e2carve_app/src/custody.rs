use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use e2carve_core::RecoveryOutcome;

/// Forensic record written next to every recovered file.
#[derive(Debug, Serialize)]
pub struct ChainOfCustody {
    pub filename: String,
    pub source_device: String,
    pub start_block: u32,
    pub source_offset: String,
    pub source_offset_decimal: u64,
    pub indirect_block: Option<u32>,
    pub double_indirect_block: Option<u32>,
    pub declared_length: u64,
    pub file_size: u64,
    pub complete: bool,
    pub sha256_hash: String,
    pub recovery_timestamp: String,
}

impl ChainOfCustody {
    pub fn new(
        output: &Path,
        device: &Path,
        source_offset: u64,
        outcome: &RecoveryOutcome,
        sha256_hash: String,
    ) -> Self {
        let filename = output
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        Self {
            filename,
            source_device: device.display().to_string(),
            start_block: outcome.start_block,
            source_offset: format!("0x{:016X}", source_offset),
            source_offset_decimal: source_offset,
            indirect_block: outcome.indirect_block,
            double_indirect_block: outcome.double_indirect_block,
            declared_length: outcome.declared_length,
            file_size: outcome.bytes_written,
            complete: outcome.complete,
            sha256_hash,
            recovery_timestamp: Utc::now().to_rfc3339(),
        }
    }

    /// Writes the record as pretty JSON and returns the sidecar path.
    pub fn write(&self, output: &Path) -> anyhow::Result<PathBuf> {
        let path = sidecar_path(output);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)?;
        Ok(path)
    }
}

/// `recovered.webp` -> `recovered.webp.custody.json`
pub fn sidecar_path(output: &Path) -> PathBuf {
    output.with_extension(format!(
        "{}custody.json",
        output
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!("{e}."))
            .unwrap_or_default()
    ))
}

/// Hashes everything that passes through on its way to `inner`.
pub struct HashingWriter<W> {
    inner: W,
    hasher: Sha256,
}

impl<W: Write> HashingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    /// Flushes `inner` and returns it with the lowercase hex digest.
    pub fn finish(mut self) -> io::Result<(W, String)> {
        self.inner.flush()?;
        Ok((self.inner, format!("{:x}", self.hasher.finalize())))
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn outcome() -> RecoveryOutcome {
        RecoveryOutcome {
            start_block: 20,
            declared_length: 2500,
            bytes_written: 2500,
            blocks_written: 3,
            indirect_block: None,
            double_indirect_block: None,
            complete: true,
        }
    }

    #[test]
    fn test_sidecar_path() {
        assert_eq!(
            sidecar_path(Path::new("out/recovered.webp")),
            PathBuf::from("out/recovered.webp.custody.json")
        );
        assert_eq!(
            sidecar_path(Path::new("carved")),
            PathBuf::from("carved.custody.json")
        );
    }

    #[test]
    fn test_hashing_writer_matches_sha256() {
        let mut writer = HashingWriter::new(Vec::new());
        writer.write_all(b"RIFF").unwrap();
        writer.write_all(b"abc").unwrap();
        let (bytes, digest) = writer.finish().unwrap();

        assert_eq!(bytes, b"RIFFabc");
        let mut hasher = Sha256::new();
        hasher.update(b"RIFFabc");
        assert_eq!(digest, format!("{:x}", hasher.finalize()));
    }

    #[test]
    fn test_empty_digest() {
        let (_, digest) = HashingWriter::new(io::sink()).finish().unwrap();
        assert_eq!(
            digest,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_custody_json_fields() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("recovered.webp");
        let custody = ChainOfCustody::new(
            &output,
            Path::new("/dev/sdb"),
            24_576,
            &outcome(),
            "00ff".to_string(),
        );

        let path = custody.write(&output).unwrap();
        assert_eq!(path, dir.path().join("recovered.webp.custody.json"));

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["filename"], "recovered.webp");
        assert_eq!(json["source_device"], "/dev/sdb");
        assert_eq!(json["start_block"], 20);
        assert_eq!(json["source_offset"], "0x0000000000006000");
        assert_eq!(json["source_offset_decimal"], 24_576);
        assert_eq!(json["file_size"], 2500);
        assert_eq!(json["complete"], true);
        assert!(json["indirect_block"].is_null());
        assert_eq!(json["sha256_hash"], "00ff");
        assert!(json["recovery_timestamp"].as_str().unwrap().contains('T'));
    }
}
