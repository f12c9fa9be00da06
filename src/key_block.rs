//! Fixed-layout KDM key blocks
//!
//! Each content key travels inside an RSA-encrypted block whose layout is
//! fixed by the packaging standard:
//!
//! ```text
//! offset  SMPTE (138 bytes)           Interop (134 bytes)
//! 0       structure id       [16]     structure id       [16]
//! 16      signer thumbprint  [20]     signer thumbprint  [20]
//! 36      CPL id             [16]     CPL id             [16]
//! 52      key type           [4]      key id             [16]
//! 56      key id             [16]     not valid before   [25]
//! 72      not valid before   [25]     not valid after    [25]
//! 97      not valid after    [25]     key                [16]
//! 122     key                [16]
//! ```
//!
//! The structure id is the magic value from SMPTE S430-1 and is only
//! checked when decoding SMPTE blocks.

use crate::binary::{read_array, write_bytes, write_fixed_str, BinaryRead, BinaryWrite};
use crate::kdm::KeyRecord;
use crate::key::{KeyError, KeyMaterial, KeyType, Standard, KEY_LENGTH};
use crate::local_time::{LocalTime, TimeError, TIMESTAMP_LENGTH};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::io::{self, Cursor, Read, Write};
use thiserror::Error;
use uuid::Uuid;

/// Magic value specified by SMPTE S430-1
pub const SMPTE_STRUCTURE_ID: [u8; 16] = [
    0xf1, 0xdc, 0x12, 0x44, 0x60, 0x16, 0x9a, 0x0e, 0x85, 0xbc, 0x30, 0x06, 0x42, 0xf8, 0x66, 0xab,
];

/// Length of a SHA-1 certificate thumbprint
pub const THUMBPRINT_LENGTH: usize = 20;

pub const INTEROP_BLOCK_LEN: usize = 134;
pub const SMPTE_BLOCK_LEN: usize = 138;

#[derive(Debug, Error)]
pub enum KeyBlockError {
    #[error("Key block is {0} bytes; expected 134 (Interop) or 138 (SMPTE)")]
    InvalidLength(usize),

    #[error("SMPTE key block structure id mismatch: found {found:02x?}")]
    StructureIdMismatch { found: [u8; 16] },

    #[error("Invalid timestamp in key block: {0}")]
    InvalidTimestamp(#[from] TimeError),

    #[error("Invalid key type in key block: {0}")]
    InvalidKeyType(#[from] KeyError),

    #[error("Invalid UUID '{0}': expected 36-character hyphenated form")]
    InvalidUuid(String),

    #[error("Invalid signer thumbprint: {0}")]
    InvalidThumbprint(String),

    #[error("SMPTE key block for key {key_id} requires a key type")]
    MissingKeyType { key_id: Uuid },

    #[error("I/O error while packing key block: {0}")]
    Io(io::Error),
}

impl From<io::Error> for KeyBlockError {
    fn from(e: io::Error) -> Self {
        // Field decoders report typed errors through io::Error; recover them here
        if e.get_ref().is_some_and(|inner| inner.is::<KeyBlockError>()) {
            if let Some(Ok(typed)) = e.into_inner().map(|inner| inner.downcast::<KeyBlockError>()) {
                return *typed;
            }
            return KeyBlockError::Io(io::Error::from(io::ErrorKind::InvalidData));
        }
        KeyBlockError::Io(e)
    }
}

fn invalid_data(e: KeyBlockError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e)
}

/// Parse a 36-character hyphenated UUID (8-4-4-4-12) into its 16 raw bytes
pub fn parse_uuid(s: &str) -> Result<[u8; 16], KeyBlockError> {
    if s.len() != 36 {
        return Err(KeyBlockError::InvalidUuid(s.to_string()));
    }
    // With the length pinned to 36, only the hyphenated form parses
    Uuid::try_parse(s)
        .map(|u| *u.as_bytes())
        .map_err(|_| KeyBlockError::InvalidUuid(s.to_string()))
}

/// Format 16 raw bytes as a lowercase hyphenated UUID
pub fn format_uuid(bytes: [u8; 16]) -> String {
    Uuid::from_bytes(bytes).hyphenated().to_string()
}

fn read_uuid<R: Read>(reader: &mut R) -> io::Result<Uuid> {
    Ok(Uuid::from_bytes(read_array(reader)?))
}

fn read_timestamp<R: Read>(reader: &mut R) -> io::Result<LocalTime> {
    let raw: [u8; TIMESTAMP_LENGTH] = read_array(reader)?;
    let text = std::str::from_utf8(&raw).map_err(|_| {
        invalid_data(KeyBlockError::InvalidTimestamp(TimeError::InvalidFormat {
            value: String::from_utf8_lossy(&raw).into_owned(),
            reason: "not ASCII".to_string(),
        }))
    })?;
    LocalTime::parse(text).map_err(|e| invalid_data(e.into()))
}

fn read_key<R: Read>(reader: &mut R) -> io::Result<KeyMaterial> {
    let raw: [u8; KEY_LENGTH] = read_array(reader)?;
    Ok(KeyMaterial::from(raw))
}

fn write_timestamp<W: Write>(writer: &mut W, t: &LocalTime) -> io::Result<()> {
    write_fixed_str(writer, &t.as_string(), TIMESTAMP_LENGTH)
}

/// SMPTE S430-1 key block (138 bytes)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmpteKeyBlock {
    pub signer_thumbprint: [u8; THUMBPRINT_LENGTH],
    pub cpl_id: Uuid,
    pub key_type: KeyType,
    pub key_id: Uuid,
    pub not_valid_before: LocalTime,
    pub not_valid_after: LocalTime,
    pub key: KeyMaterial,
}

impl BinaryRead for SmpteKeyBlock {
    fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let structure_id: [u8; 16] = read_array(reader)?;
        if structure_id != SMPTE_STRUCTURE_ID {
            return Err(invalid_data(KeyBlockError::StructureIdMismatch {
                found: structure_id,
            }));
        }
        let signer_thumbprint = read_array(reader)?;
        let cpl_id = read_uuid(reader)?;
        let key_type =
            KeyType::from_bytes(read_array(reader)?).map_err(|e| invalid_data(e.into()))?;
        let key_id = read_uuid(reader)?;
        let not_valid_before = read_timestamp(reader)?;
        let not_valid_after = read_timestamp(reader)?;
        let key = read_key(reader)?;

        Ok(SmpteKeyBlock {
            signer_thumbprint,
            cpl_id,
            key_type,
            key_id,
            not_valid_before,
            not_valid_after,
            key,
        })
    }
}

impl BinaryWrite for SmpteKeyBlock {
    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write_bytes(writer, &SMPTE_STRUCTURE_ID)?;
        write_bytes(writer, &self.signer_thumbprint)?;
        write_bytes(writer, self.cpl_id.as_bytes())?;
        write_bytes(writer, self.key_type.as_bytes())?;
        write_bytes(writer, self.key_id.as_bytes())?;
        write_timestamp(writer, &self.not_valid_before)?;
        write_timestamp(writer, &self.not_valid_after)?;
        write_bytes(writer, self.key.as_bytes())
    }

    fn serialized_size(&self) -> usize {
        SMPTE_BLOCK_LEN
    }
}

/// Interop key block (134 bytes): no key type, structure id not enforced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteropKeyBlock {
    pub structure_id: [u8; 16],
    pub signer_thumbprint: [u8; THUMBPRINT_LENGTH],
    pub cpl_id: Uuid,
    pub key_id: Uuid,
    pub not_valid_before: LocalTime,
    pub not_valid_after: LocalTime,
    pub key: KeyMaterial,
}

impl BinaryRead for InteropKeyBlock {
    fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        Ok(InteropKeyBlock {
            structure_id: read_array(reader)?,
            signer_thumbprint: read_array(reader)?,
            cpl_id: read_uuid(reader)?,
            key_id: read_uuid(reader)?,
            not_valid_before: read_timestamp(reader)?,
            not_valid_after: read_timestamp(reader)?,
            key: read_key(reader)?,
        })
    }
}

impl BinaryWrite for InteropKeyBlock {
    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write_bytes(writer, &self.structure_id)?;
        write_bytes(writer, &self.signer_thumbprint)?;
        write_bytes(writer, self.cpl_id.as_bytes())?;
        write_bytes(writer, self.key_id.as_bytes())?;
        write_timestamp(writer, &self.not_valid_before)?;
        write_timestamp(writer, &self.not_valid_after)?;
        write_bytes(writer, self.key.as_bytes())
    }

    fn serialized_size(&self) -> usize {
        INTEROP_BLOCK_LEN
    }
}

/// A decoded key block of either layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinaryKeyBlock {
    Interop(InteropKeyBlock),
    Smpte(SmpteKeyBlock),
}

impl BinaryKeyBlock {
    /// Build the block for one key record
    pub fn from_record(
        record: &KeyRecord,
        signer_thumbprint: [u8; THUMBPRINT_LENGTH],
        not_valid_before: LocalTime,
        not_valid_after: LocalTime,
    ) -> Result<Self, KeyBlockError> {
        match record.standard() {
            Standard::Smpte => {
                let key_type = record.key_type().ok_or(KeyBlockError::MissingKeyType {
                    key_id: record.key_id(),
                })?;
                Ok(BinaryKeyBlock::Smpte(SmpteKeyBlock {
                    signer_thumbprint,
                    cpl_id: record.cpl_id(),
                    key_type,
                    key_id: record.key_id(),
                    not_valid_before,
                    not_valid_after,
                    key: record.key().clone(),
                }))
            }
            Standard::Interop => Ok(BinaryKeyBlock::Interop(InteropKeyBlock {
                structure_id: SMPTE_STRUCTURE_ID,
                signer_thumbprint,
                cpl_id: record.cpl_id(),
                key_id: record.key_id(),
                not_valid_before,
                not_valid_after,
                key: record.key().clone(),
            })),
        }
    }

    pub fn standard(&self) -> Standard {
        match self {
            BinaryKeyBlock::Interop(_) => Standard::Interop,
            BinaryKeyBlock::Smpte(_) => Standard::Smpte,
        }
    }

    pub fn cpl_id(&self) -> Uuid {
        match self {
            BinaryKeyBlock::Interop(b) => b.cpl_id,
            BinaryKeyBlock::Smpte(b) => b.cpl_id,
        }
    }

    pub fn key_id(&self) -> Uuid {
        match self {
            BinaryKeyBlock::Interop(b) => b.key_id,
            BinaryKeyBlock::Smpte(b) => b.key_id,
        }
    }

    pub fn key_type(&self) -> Option<KeyType> {
        match self {
            BinaryKeyBlock::Interop(_) => None,
            BinaryKeyBlock::Smpte(b) => Some(b.key_type),
        }
    }

    pub fn not_valid_before(&self) -> LocalTime {
        match self {
            BinaryKeyBlock::Interop(b) => b.not_valid_before,
            BinaryKeyBlock::Smpte(b) => b.not_valid_before,
        }
    }

    pub fn not_valid_after(&self) -> LocalTime {
        match self {
            BinaryKeyBlock::Interop(b) => b.not_valid_after,
            BinaryKeyBlock::Smpte(b) => b.not_valid_after,
        }
    }

    pub fn key(&self) -> &KeyMaterial {
        match self {
            BinaryKeyBlock::Interop(b) => &b.key,
            BinaryKeyBlock::Smpte(b) => &b.key,
        }
    }

    /// Signer thumbprint re-encoded as base64, as certificates present it
    pub fn signer_thumbprint(&self) -> String {
        match self {
            BinaryKeyBlock::Interop(b) => BASE64.encode(b.signer_thumbprint),
            BinaryKeyBlock::Smpte(b) => BASE64.encode(b.signer_thumbprint),
        }
    }

    /// The key record this block delivers
    pub fn to_record(&self) -> KeyRecord {
        KeyRecord::from_parts(
            self.key_type(),
            self.key_id(),
            self.key().clone(),
            self.cpl_id(),
            self.standard(),
        )
    }

    /// Serialize to exactly 134 (Interop) or 138 (SMPTE) bytes
    pub fn pack(&self) -> Result<Vec<u8>, KeyBlockError> {
        let bytes = match self {
            BinaryKeyBlock::Interop(b) => b.to_bytes()?,
            BinaryKeyBlock::Smpte(b) => b.to_bytes()?,
        };
        debug_assert_eq!(bytes.len(), self.serialized_len());
        Ok(bytes)
    }

    pub fn serialized_len(&self) -> usize {
        match self {
            BinaryKeyBlock::Interop(_) => INTEROP_BLOCK_LEN,
            BinaryKeyBlock::Smpte(_) => SMPTE_BLOCK_LEN,
        }
    }
}

/// Decode a base64 certificate thumbprint into its 20 raw bytes
pub fn decode_thumbprint(thumbprint: &str) -> Result<[u8; THUMBPRINT_LENGTH], KeyBlockError> {
    let raw = BASE64
        .decode(thumbprint.trim())
        .map_err(|e| KeyBlockError::InvalidThumbprint(e.to_string()))?;
    raw.as_slice().try_into().map_err(|_| {
        KeyBlockError::InvalidThumbprint(format!(
            "expected {} bytes, got {}",
            THUMBPRINT_LENGTH,
            raw.len()
        ))
    })
}

/// Pack one key record with its transport metadata
pub fn pack(
    record: &KeyRecord,
    signer_thumbprint: &str,
    not_valid_before: LocalTime,
    not_valid_after: LocalTime,
) -> Result<Vec<u8>, KeyBlockError> {
    let thumbprint = decode_thumbprint(signer_thumbprint)?;
    BinaryKeyBlock::from_record(record, thumbprint, not_valid_before, not_valid_after)?.pack()
}

/// Decode a key block, choosing the layout from its length
pub fn unpack(bytes: &[u8]) -> Result<BinaryKeyBlock, KeyBlockError> {
    let mut cursor = Cursor::new(bytes);
    match bytes.len() {
        INTEROP_BLOCK_LEN => Ok(BinaryKeyBlock::Interop(InteropKeyBlock::read_from(
            &mut cursor,
        )?)),
        SMPTE_BLOCK_LEN => Ok(BinaryKeyBlock::Smpte(SmpteKeyBlock::read_from(
            &mut cursor,
        )?)),
        n => Err(KeyBlockError::InvalidLength(n)),
    }
}
