// src/package/wire.rs

//! Package wire format
//!
//! Layout (all integers in producer endianness, strings and blobs length
//! prefixed with a `u32`):
//!
//! ```text
//! header:  endian:u8  version:u32  "SDV_IPCK"  created:u64  header_len:u32
//!          manifest:str  zero-pad  checksum:u32
//! record:  type:u32  prior_chain_checksum:u32  record_len:u32  payload
//!          zero-pad  checksum:u32
//! footer:  final_checksum:u32
//! ```
//!
//! Header and records are padded to 8-byte multiples. Checksums are
//! CRC-32C. The header checksum covers the header bytes before it and,
//! once folded into the running value, seeds the first record; every
//! record checksum covers the record bytes before it seeded with the
//! running value at record start; the footer repeats the running value
//! after the final record. Length fields are validated against hard caps
//! before anything is allocated.

use crate::error::{Error, Result};
use crate::manifest::INTERFACE_VERSION;
use std::io::{Read, Write};

/// Signature bytes at the fixed header offset.
pub const PACKAGE_SIGNATURE: [u8; 8] = *b"SDV_IPCK";

/// Hard cap on the total header length.
pub const MAX_HEADER_LEN: u32 = 32 * 1024;

/// Hard cap on a single record length; bounds the largest packagable file.
pub const MAX_RECORD_LEN: u32 = 24 * 1024 * 1024;

/// Fixed header bytes: endian, version, signature, created, header_len,
/// manifest length prefix, trailing checksum.
const HEADER_FIXED_LEN: u32 = 1 + 4 + 8 + 8 + 4 + 4 + 4;

/// Fixed record bytes: type, prior checksum, length, trailing checksum.
const RECORD_FIXED_LEN: u32 = 4 + 4 + 4 + 4;

/// Fixed binary-file payload bytes besides path and content: two length
/// prefixes, two flags, two timestamps.
const FILE_PAYLOAD_FIXED_LEN: u32 = 4 + 1 + 1 + 8 + 8 + 4;

const RECORD_TYPE_BINARY_FILE: u32 = 1;
const RECORD_TYPE_FINAL: u32 = 2;

const ENDIAN_LITTLE: u8 = 0;
const ENDIAN_BIG: u8 = 1;

#[cfg(target_endian = "little")]
const PLATFORM_ENDIAN: u8 = ENDIAN_LITTLE;
#[cfg(target_endian = "big")]
const PLATFORM_ENDIAN: u8 = ENDIAN_BIG;

fn padded(len: u32) -> u32 {
    len.div_ceil(8) * 8
}

/// Deserialized package header
#[derive(Debug, Clone)]
pub struct PackageHeader {
    /// Package creation time, microseconds since the Unix epoch
    pub created_micros: u64,
    /// The embedded installation manifest TOML
    pub manifest_text: String,
}

/// Deserialized package record
#[derive(Debug)]
pub(crate) enum Record {
    BinaryFile(FileRecord),
    Final,
    /// Unrecognized record type; checksummed and skipped
    Unknown,
}

/// One packaged file
#[derive(Debug)]
pub(crate) struct FileRecord {
    pub rel_path: String,
    pub readonly: bool,
    pub executable: bool,
    pub created_micros: u64,
    pub modified_micros: u64,
    pub content: Vec<u8>,
}

/// Writer threading a CRC-32C value through every byte it emits.
pub(crate) struct ChainWriter<W: Write> {
    inner: W,
    crc: u32,
}

impl<W: Write> ChainWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, crc: 0 }
    }

    /// The running checksum over everything written so far.
    pub fn checksum(&self) -> u32 {
        self.crc
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner
            .write_all(bytes)
            .map_err(|e| Error::FileCorrupt(format!("write failed: {}", e)))?;
        self.crc = crc32c::crc32c_append(self.crc, bytes);
        Ok(())
    }

    fn put_u8(&mut self, value: u8) -> Result<()> {
        self.put(&[value])
    }

    fn put_u32(&mut self, value: u32) -> Result<()> {
        self.put(&value.to_ne_bytes())
    }

    fn put_u64(&mut self, value: u64) -> Result<()> {
        self.put(&value.to_ne_bytes())
    }

    fn put_bool(&mut self, value: bool) -> Result<()> {
        self.put_u8(u8::from(value))
    }

    fn put_blob(&mut self, bytes: &[u8]) -> Result<()> {
        self.put_u32(bytes.len() as u32)?;
        self.put(bytes)
    }

    fn put_padding(&mut self, count: u32) -> Result<()> {
        const ZEROES: [u8; 8] = [0; 8];
        self.put(&ZEROES[..count as usize])
    }
}

/// Serialize the package header. The writer's running checksum then
/// seeds the first record.
pub(crate) fn write_header<W: Write>(
    w: &mut ChainWriter<W>,
    manifest_text: &str,
    created_micros: u64,
) -> Result<()> {
    let unpadded = HEADER_FIXED_LEN
        .checked_add(manifest_text.len() as u32)
        .ok_or_else(|| Error::IncompatiblePackage("manifest too large".into()))?;
    let header_len = padded(unpadded);
    if header_len > MAX_HEADER_LEN {
        return Err(Error::IncompatiblePackage(format!(
            "header length {} exceeds the {} byte cap",
            header_len, MAX_HEADER_LEN
        )));
    }

    w.put_u8(PLATFORM_ENDIAN)?;
    w.put_u32(INTERFACE_VERSION)?;
    w.put(&PACKAGE_SIGNATURE)?;
    w.put_u64(created_micros)?;
    w.put_u32(header_len)?;
    w.put_blob(manifest_text.as_bytes())?;
    w.put_padding(header_len - unpadded)?;
    let checksum = w.checksum();
    w.put_u32(checksum)
}

/// Serialize one binary-file record.
pub(crate) fn write_file_record<W: Write>(
    w: &mut ChainWriter<W>,
    rel_path: &str,
    readonly: bool,
    executable: bool,
    created_micros: u64,
    modified_micros: u64,
    content: &[u8],
) -> Result<()> {
    let unpadded = RECORD_FIXED_LEN
        .checked_add(FILE_PAYLOAD_FIXED_LEN)
        .and_then(|n| n.checked_add(rel_path.len() as u32))
        .and_then(|n| n.checked_add(u32::try_from(content.len()).ok()?))
        .ok_or_else(|| Error::IncompatiblePackage(format!("record for {} too large", rel_path)))?;
    let record_len = padded(unpadded);
    if record_len > MAX_RECORD_LEN {
        return Err(Error::IncompatiblePackage(format!(
            "record for {} ({} bytes) exceeds the {} byte cap",
            rel_path, record_len, MAX_RECORD_LEN
        )));
    }

    let prior = w.checksum();
    w.put_u32(RECORD_TYPE_BINARY_FILE)?;
    w.put_u32(prior)?;
    w.put_u32(record_len)?;
    w.put_blob(rel_path.as_bytes())?;
    w.put_bool(readonly)?;
    w.put_bool(executable)?;
    w.put_u64(created_micros)?;
    w.put_u64(modified_micros)?;
    w.put_blob(content)?;
    w.put_padding(record_len - unpadded)?;
    let checksum = w.checksum();
    w.put_u32(checksum)
}

/// Serialize the final marker record.
pub(crate) fn write_final_record<W: Write>(w: &mut ChainWriter<W>) -> Result<()> {
    let record_len = padded(RECORD_FIXED_LEN);
    let prior = w.checksum();
    w.put_u32(RECORD_TYPE_FINAL)?;
    w.put_u32(prior)?;
    w.put_u32(record_len)?;
    w.put_padding(record_len - RECORD_FIXED_LEN)?;
    let checksum = w.checksum();
    w.put_u32(checksum)
}

/// Serialize the footer: the running checksum after the final record.
pub(crate) fn write_footer<W: Write>(w: &mut ChainWriter<W>) -> Result<()> {
    let checksum = w.checksum();
    w.put_u32(checksum)
}

/// Reader mirroring [`ChainWriter`]: every byte consumed folds into the
/// running CRC-32C value.
pub(crate) struct ChainReader<R: Read> {
    inner: R,
    crc: u32,
}

impl<R: Read> ChainReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, crc: 0 }
    }

    pub fn checksum(&self) -> u32 {
        self.crc
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(Error::BufferTooSmall {
                        needed: buf.len() as u64,
                        available: filled as u64,
                    })
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(Error::FileCorrupt(format!("read failed: {}", e))),
            }
        }
        self.crc = crc32c::crc32c_append(self.crc, buf);
        Ok(())
    }

    fn get_u8(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.fill(&mut buf)?;
        Ok(buf[0])
    }

    fn get_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.fill(&mut buf)?;
        Ok(u32::from_ne_bytes(buf))
    }

    fn get_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.fill(&mut buf)?;
        Ok(u64::from_ne_bytes(buf))
    }

    fn get_bool(&mut self) -> Result<bool> {
        Ok(self.get_u8()? != 0)
    }

    /// Length-prefixed byte blob, bounded by `max` before allocation.
    fn get_blob(&mut self, max: u32) -> Result<Vec<u8>> {
        let len = self.get_u32()?;
        if len > max {
            return Err(Error::IncompatiblePackage(format!(
                "length field {} exceeds bound {}",
                len, max
            )));
        }
        let mut buf = vec![0u8; len as usize];
        self.fill(&mut buf)?;
        Ok(buf)
    }

    fn skip(&mut self, mut count: u32) -> Result<()> {
        let mut buf = [0u8; 64];
        while count > 0 {
            let chunk = count.min(buf.len() as u32);
            self.fill(&mut buf[..chunk as usize])?;
            count -= chunk;
        }
        Ok(())
    }

    /// Read the trailing checksum and compare it against the running
    /// value captured just before it.
    fn expect_checksum(&mut self) -> Result<()> {
        let expected = self.crc;
        let actual = self.get_u32()?;
        if actual != expected {
            return Err(Error::IncorrectCrc { expected, actual });
        }
        Ok(())
    }
}

/// Deserialize and validate the package header.
///
/// Rejects a foreign endianness, a wrong interface version, a missing
/// signature and out-of-range lengths before the manifest is allocated.
pub(crate) fn read_header<R: Read>(r: &mut ChainReader<R>) -> Result<PackageHeader> {
    let endian = r.get_u8()?;
    if endian != ENDIAN_LITTLE && endian != ENDIAN_BIG {
        return Err(Error::IncompatiblePackage(format!(
            "unknown endianness tag {}",
            endian
        )));
    }
    if endian != PLATFORM_ENDIAN {
        return Err(Error::IncompatiblePackage(
            "package produced on a platform of opposite endianness".into(),
        ));
    }
    let version = r.get_u32()?;
    if version != INTERFACE_VERSION {
        return Err(Error::IncompatiblePackage(format!(
            "package interface version {} does not match {}",
            version, INTERFACE_VERSION
        )));
    }
    let mut signature = [0u8; 8];
    r.fill(&mut signature)?;
    if signature != PACKAGE_SIGNATURE {
        return Err(Error::IncompatiblePackage("signature missing".into()));
    }

    let created_micros = r.get_u64()?;
    let header_len = r.get_u32()?;
    if header_len > MAX_HEADER_LEN || header_len < padded(HEADER_FIXED_LEN) {
        return Err(Error::IncompatiblePackage(format!(
            "header length {} out of range",
            header_len
        )));
    }

    let manifest = r.get_blob(header_len - HEADER_FIXED_LEN)?;
    let manifest_text = String::from_utf8(manifest)
        .map_err(|_| Error::IncompatiblePackage("manifest is not UTF-8".into()))?;

    let body_len = HEADER_FIXED_LEN - 4 + manifest_text.len() as u32;
    r.skip(header_len - 4 - body_len)?;
    r.expect_checksum()?;

    Ok(PackageHeader {
        created_micros,
        manifest_text,
    })
}

/// Deserialize the next record, verifying its chain seed and checksum.
pub(crate) fn read_record<R: Read>(r: &mut ChainReader<R>) -> Result<Record> {
    let seed = r.checksum();
    let record_type = r.get_u32()?;
    let prior = r.get_u32()?;
    if prior != seed {
        return Err(Error::IncorrectCrc {
            expected: seed,
            actual: prior,
        });
    }
    let record_len = r.get_u32()?;
    if record_len > MAX_RECORD_LEN || record_len < padded(RECORD_FIXED_LEN) {
        return Err(Error::IncompatiblePackage(format!(
            "record length {} out of range",
            record_len
        )));
    }
    let payload_len = record_len - RECORD_FIXED_LEN;

    let record = match record_type {
        RECORD_TYPE_BINARY_FILE => {
            let path = r.get_blob(payload_len)?;
            let rel_path = String::from_utf8(path)
                .map_err(|_| Error::IncompatiblePackage("record path is not UTF-8".into()))?;
            let readonly = r.get_bool()?;
            let executable = r.get_bool()?;
            let created_micros = r.get_u64()?;
            let modified_micros = r.get_u64()?;
            let content = r.get_blob(payload_len)?;

            let body_len =
                FILE_PAYLOAD_FIXED_LEN + rel_path.len() as u32 + content.len() as u32;
            let padding = payload_len.checked_sub(body_len).ok_or_else(|| {
                Error::IncompatiblePackage("record length inconsistent with payload".into())
            })?;
            r.skip(padding)?;

            Record::BinaryFile(FileRecord {
                rel_path,
                readonly,
                executable,
                created_micros,
                modified_micros,
                content,
            })
        }
        RECORD_TYPE_FINAL => {
            r.skip(payload_len)?;
            Record::Final
        }
        _ => {
            r.skip(payload_len)?;
            Record::Unknown
        }
    };

    r.expect_checksum()?;
    Ok(record)
}

/// Verify the footer against the running checksum.
pub(crate) fn read_footer<R: Read>(r: &mut ChainReader<R>) -> Result<()> {
    let expected = r.checksum();
    let actual = r.get_u32()?;
    if actual != expected {
        return Err(Error::IncorrectCrc { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_package() -> Vec<u8> {
        let mut w = ChainWriter::new(Vec::new());
        write_header(&mut w, "[Installation]\nName = \"X\"\n", 1_700_000_000_000_000).unwrap();
        write_file_record(
            &mut w,
            "bin/tool.sdv",
            false,
            true,
            0,
            1_650_000_000_000_000,
            b"module bytes",
        )
        .unwrap();
        write_final_record(&mut w).unwrap();
        write_footer(&mut w).unwrap();
        w.into_inner()
    }

    #[test]
    fn test_header_roundtrip() {
        let bytes = sample_package();
        let mut r = ChainReader::new(Cursor::new(&bytes));
        let header = read_header(&mut r).unwrap();
        assert_eq!(header.created_micros, 1_700_000_000_000_000);
        assert_eq!(header.manifest_text, "[Installation]\nName = \"X\"\n");
    }

    #[test]
    fn test_full_stream_roundtrip() {
        let bytes = sample_package();
        assert_eq!(bytes.len() % 4, 0);

        let mut r = ChainReader::new(Cursor::new(&bytes));
        read_header(&mut r).unwrap();

        let Record::BinaryFile(file) = read_record(&mut r).unwrap() else {
            panic!("expected a file record");
        };
        assert_eq!(file.rel_path, "bin/tool.sdv");
        assert!(!file.readonly);
        assert!(file.executable);
        assert_eq!(file.modified_micros, 1_650_000_000_000_000);
        assert_eq!(file.content, b"module bytes");

        assert!(matches!(read_record(&mut r).unwrap(), Record::Final));
        read_footer(&mut r).unwrap();
    }

    #[test]
    fn test_records_are_padded_to_eight() {
        let bytes = sample_package();
        // Total = header + records + 4-byte footer, all 8-aligned
        assert_eq!((bytes.len() - 4) % 8, 0);
    }

    #[test]
    fn test_bad_signature_rejected() {
        let mut bytes = sample_package();
        bytes[6] = b'x'; // inside the signature
        let mut r = ChainReader::new(Cursor::new(&bytes));
        assert!(matches!(
            read_header(&mut r),
            Err(Error::IncompatiblePackage(_))
        ));
    }

    #[test]
    fn test_corrupt_content_fails_record_checksum() {
        let mut bytes = sample_package();
        let n = bytes.len();
        bytes[n - 30] ^= 0xff; // somewhere inside the file record
        let mut r = ChainReader::new(Cursor::new(&bytes));
        read_header(&mut r).unwrap();
        let mut failed = false;
        loop {
            match read_record(&mut r) {
                Err(Error::IncorrectCrc { .. }) => {
                    failed = true;
                    break;
                }
                Ok(Record::Final) => break,
                Ok(_) => {}
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert!(failed);
    }

    #[test]
    fn test_truncated_stream_reports_buffer_too_small() {
        let bytes = sample_package();
        let mut r = ChainReader::new(Cursor::new(&bytes[..20]));
        assert!(matches!(
            read_header(&mut r),
            Err(Error::BufferTooSmall { .. })
        ));
    }

    #[test]
    fn test_header_cap_enforced_on_write() {
        let mut w = ChainWriter::new(Vec::new());
        let huge = "x".repeat(MAX_HEADER_LEN as usize);
        assert!(matches!(
            write_header(&mut w, &huge, 0),
            Err(Error::IncompatiblePackage(_))
        ));
    }

    #[test]
    fn test_record_cap_enforced_on_read() {
        // Hand-craft a record claiming an oversized length
        let mut w = ChainWriter::new(Vec::new());
        write_header(&mut w, "m", 0).unwrap();
        let seed = w.checksum();
        let mut bytes = w.into_inner();
        bytes.extend_from_slice(&RECORD_TYPE_BINARY_FILE.to_ne_bytes());
        bytes.extend_from_slice(&seed.to_ne_bytes());
        bytes.extend_from_slice(&(MAX_RECORD_LEN + 8).to_ne_bytes());

        let mut r = ChainReader::new(Cursor::new(&bytes));
        read_header(&mut r).unwrap();
        assert!(matches!(
            read_record(&mut r),
            Err(Error::IncompatiblePackage(_))
        ));
    }

    #[test]
    fn test_wrong_chain_seed_detected() {
        let mut w = ChainWriter::new(Vec::new());
        write_header(&mut w, "m", 0).unwrap();
        let mut bytes = w.into_inner();
        bytes.extend_from_slice(&RECORD_TYPE_FINAL.to_ne_bytes());
        bytes.extend_from_slice(&0xdead_beefu32.to_ne_bytes()); // bogus seed
        bytes.extend_from_slice(&16u32.to_ne_bytes());

        let mut r = ChainReader::new(Cursor::new(&bytes));
        read_header(&mut r).unwrap();
        assert!(matches!(
            read_record(&mut r),
            Err(Error::IncorrectCrc { .. })
        ));
    }
}
