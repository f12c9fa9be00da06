//! Binary serialization infrastructure for key blocks
//!
//! Key blocks are fixed-layout byte structures with no length prefixes or
//! multi-byte integers: every field is a run of raw bytes at a known offset.
//! These helpers read and write such runs with bounds checking supplied by
//! `Read::read_exact`.

use std::io::{self, Read, Write};

/// Trait for types that can be read from binary format
pub trait BinaryRead: Sized {
    /// Read this type from a binary reader
    fn read_from<R: Read>(reader: &mut R) -> io::Result<Self>;
}

/// Trait for types that can be written to binary format
pub trait BinaryWrite {
    /// Write this type to a binary writer
    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()>;

    /// Get the size in bytes when serialized
    fn serialized_size(&self) -> usize;

    /// Serialize into a freshly allocated buffer
    fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.serialized_size());
        self.write_to(&mut buf)?;
        Ok(buf)
    }
}

/// Read exactly `N` bytes into an array
pub fn read_array<R: Read, const N: usize>(reader: &mut R) -> io::Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

/// Write bytes to a writer
pub fn write_bytes<W: Write>(writer: &mut W, bytes: &[u8]) -> io::Result<()> {
    writer.write_all(bytes)
}

/// Write a string that must occupy exactly `len` bytes
pub fn write_fixed_str<W: Write>(writer: &mut W, s: &str, len: usize) -> io::Result<()> {
    if s.len() != len {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("expected {} bytes, got {} for '{}'", len, s.len(), s),
        ));
    }
    writer.write_all(s.as_bytes())
}
