// title/tmd.rs from rustwl (c) 2025 NinjaCheetah & Contributors
// https://github.com/NinjaCheetah/rustwl
//
// Implements the structures and methods required for TMD parsing and editing.

use std::fmt;
use std::io::{Cursor, Read, Write};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

// Size of the fixed TMD header, up to the start of the content records.
const TMD_HEADER_SIZE: usize = 0x1E4;
// Size of one content record.
const CONTENT_RECORD_SIZE: usize = 36;

#[derive(Debug, Error)]
pub enum TMDError {
    #[error("declared content count {declared} does not fit in the TMD data ({available} bytes available after the header)")]
    ContentCountMismatch { declared: u16, available: usize },
    #[error("TMD data contains content record with invalid type `{0}`")]
    InvalidContentType(u16),
    #[error("TMD data is not in a valid format")]
    IO(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Normal = 1,
    Development = 2,
    HashTree = 3,
    DLC = 16385,
    Shared = 32769,
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ContentType::Normal => write!(f, "Normal"),
            ContentType::Development => write!(f, "Development/Unknown"),
            ContentType::HashTree => write!(f, "Hash Tree"),
            ContentType::DLC => write!(f, "DLC"),
            ContentType::Shared => write!(f, "Shared"),
        }
    }
}

impl TryFrom<u16> for ContentType {
    type Error = TMDError;
    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ContentType::Normal),
            2 => Ok(ContentType::Development),
            3 => Ok(ContentType::HashTree),
            16385 => Ok(ContentType::DLC),
            32769 => Ok(ContentType::Shared),
            other => Err(TMDError::InvalidContentType(other)),
        }
    }
}

/// A structure that represents the metadata of a content file in a digital DSi title.
#[derive(Debug, Clone)]
pub struct ContentRecord {
    pub content_id: u32,
    pub index: u16,
    pub content_type: ContentType,
    pub content_size: u64,
    pub content_hash: [u8; 20],
}

/// A structure that represents a DSi TMD (Title Metadata) file.
#[derive(Debug, Clone)]
pub struct TMD {
    pub signature_type: u32,
    pub signature: [u8; 256],
    pub padding1: [u8; 60],
    pub signature_issuer: [u8; 64],
    pub tmd_version: u8,
    pub ca_crl_version: u8,
    pub signer_crl_version: u8,
    pub reserved1: u8,
    pub system_version: [u8; 8],
    pub title_id: [u8; 8],
    pub title_type: [u8; 4],
    pub group_id: u16,
    pub reserved2: [u8; 62],
    pub access_rights: u32,
    pub title_version: u16,
    pub num_contents: u16,
    pub boot_index: u16,
    pub minor_version: u16, // Normally unused.
    pub content_records: Vec<ContentRecord>,
}

impl TMD {
    /// Creates a new TMD instance from the binary data of a TMD file.
    pub fn from_bytes(data: &[u8]) -> Result<Self, TMDError> {
        let mut buf = Cursor::new(data);
        let signature_type = buf.read_u32::<BigEndian>()?;
        let mut signature = [0u8; 256];
        buf.read_exact(&mut signature)?;
        let mut padding1 = [0u8; 60];
        buf.read_exact(&mut padding1)?;
        let mut signature_issuer = [0u8; 64];
        buf.read_exact(&mut signature_issuer)?;
        let tmd_version = buf.read_u8()?;
        let ca_crl_version = buf.read_u8()?;
        let signer_crl_version = buf.read_u8()?;
        let reserved1 = buf.read_u8()?;
        let mut system_version = [0u8; 8];
        buf.read_exact(&mut system_version)?;
        let mut title_id = [0u8; 8];
        buf.read_exact(&mut title_id)?;
        let mut title_type = [0u8; 4];
        buf.read_exact(&mut title_type)?;
        let group_id = buf.read_u16::<BigEndian>()?;
        let mut reserved2 = [0u8; 62];
        buf.read_exact(&mut reserved2)?;
        let access_rights = buf.read_u32::<BigEndian>()?;
        let title_version = buf.read_u16::<BigEndian>()?;
        let num_contents = buf.read_u16::<BigEndian>()?;
        let boot_index = buf.read_u16::<BigEndian>()?;
        let minor_version = buf.read_u16::<BigEndian>()?;
        // Make sure the declared number of content records actually fits in
        // the remaining data before trying to read them.
        let available = data.len().saturating_sub(TMD_HEADER_SIZE);
        if available < num_contents as usize * CONTENT_RECORD_SIZE {
            return Err(TMDError::ContentCountMismatch { declared: num_contents, available });
        }
        // Build content records by iterating over the rest of the data num_contents times.
        let mut content_records = Vec::with_capacity(num_contents as usize);
        for _ in 0..num_contents {
            let content_id = buf.read_u32::<BigEndian>()?;
            let index = buf.read_u16::<BigEndian>()?;
            let type_int = buf.read_u16::<BigEndian>()?;
            let content_type = ContentType::try_from(type_int)?;
            let content_size = buf.read_u64::<BigEndian>()?;
            let mut content_hash = [0u8; 20];
            buf.read_exact(&mut content_hash)?;
            content_records.push(ContentRecord {
                content_id,
                index,
                content_type,
                content_size,
                content_hash,
            });
        }
        Ok(TMD {
            signature_type,
            signature,
            padding1,
            signature_issuer,
            tmd_version,
            ca_crl_version,
            signer_crl_version,
            reserved1,
            system_version,
            title_id,
            title_type,
            group_id,
            reserved2,
            access_rights,
            title_version,
            num_contents,
            boot_index,
            minor_version,
            content_records,
        })
    }

    /// Dumps the data in a TMD instance back into binary data that can be written to a file.
    pub fn to_bytes(&self) -> Result<Vec<u8>, std::io::Error> {
        let mut buf = Vec::new();
        buf.write_u32::<BigEndian>(self.signature_type)?;
        buf.write_all(&self.signature)?;
        buf.write_all(&self.padding1)?;
        buf.write_all(&self.signature_issuer)?;
        buf.write_u8(self.tmd_version)?;
        buf.write_u8(self.ca_crl_version)?;
        buf.write_u8(self.signer_crl_version)?;
        buf.write_u8(self.reserved1)?;
        buf.write_all(&self.system_version)?;
        buf.write_all(&self.title_id)?;
        buf.write_all(&self.title_type)?;
        buf.write_u16::<BigEndian>(self.group_id)?;
        buf.write_all(&self.reserved2)?;
        buf.write_u32::<BigEndian>(self.access_rights)?;
        buf.write_u16::<BigEndian>(self.title_version)?;
        // The content count is always recomputed from the actual records, so
        // that edits to the record list can't go out of sync with the header.
        buf.write_u16::<BigEndian>(self.content_records.len() as u16)?;
        buf.write_u16::<BigEndian>(self.boot_index)?;
        buf.write_u16::<BigEndian>(self.minor_version)?;
        // Iterate over content records and write out content record data.
        for content in &self.content_records {
            buf.write_u32::<BigEndian>(content.content_id)?;
            buf.write_u16::<BigEndian>(content.index)?;
            buf.write_u16::<BigEndian>(content.content_type as u16)?;
            buf.write_u64::<BigEndian>(content.content_size)?;
            buf.write_all(&content.content_hash)?;
        }
        Ok(buf)
    }

    pub fn title_version(&self) -> u16 {
        self.title_version
    }

    pub fn content_records(&self) -> &Vec<ContentRecord> {
        &self.content_records
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    // Builds a one-content TMD that can be shared with the TAD-level tests.
    pub(crate) fn test_tmd(title_id: [u8; 8], content_size: u64, content_hash: [u8; 20]) -> TMD {
        TMD {
            signature_type: 0x10001,
            signature: [0xAA; 256],
            padding1: [0u8; 60],
            signature_issuer: [0u8; 64],
            tmd_version: 0,
            ca_crl_version: 0,
            signer_crl_version: 0,
            reserved1: 0,
            system_version: [0u8; 8],
            title_id,
            title_type: [0, 0, 0, 1],
            group_id: 0,
            reserved2: [0u8; 62],
            access_rights: 0,
            title_version: 0x0500,
            num_contents: 1,
            boot_index: 0,
            minor_version: 0,
            content_records: vec![ContentRecord {
                content_id: 0x000000E6,
                index: 0,
                content_type: ContentType::Normal,
                content_size,
                content_hash,
            }],
        }
    }

    #[test]
    fn test_tmd_round_trip() {
        let tmd = test_tmd([0x00, 0x03, 0x00, 0x15, 0xDE, 0xAD, 0xBE, 0xEF], 10, [0x11; 20]);
        let data = tmd.to_bytes().unwrap();
        assert_eq!(data.len(), 0x1E4 + 36);
        let parsed = TMD::from_bytes(&data).unwrap();
        assert_eq!(parsed.title_id, tmd.title_id);
        assert_eq!(parsed.title_version(), 0x0500);
        assert_eq!(parsed.content_records.len(), 1);
        assert_eq!(parsed.content_records[0].content_size, 10);
        assert_eq!(parsed.to_bytes().unwrap(), data);
    }

    #[test]
    fn test_content_count_recomputed() {
        let mut tmd = test_tmd([0u8; 8], 16, [0u8; 20]);
        tmd.content_records.push(ContentRecord {
            content_id: 0x000000E7,
            index: 1,
            content_type: ContentType::Normal,
            content_size: 32,
            content_hash: [0x22; 20],
        });
        // num_contents still says 1, but serialization must write 2.
        let parsed = TMD::from_bytes(&tmd.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed.num_contents, 2);
        assert_eq!(parsed.content_records.len(), 2);
    }

    #[test]
    fn test_bad_content_count() {
        let mut data = test_tmd([0u8; 8], 10, [0u8; 20]).to_bytes().unwrap();
        // Inflate the declared content count past the available data.
        data[0x1DE] = 0x00;
        data[0x1DF] = 0x08;
        match TMD::from_bytes(&data) {
            Err(TMDError::ContentCountMismatch { declared, available }) => {
                assert_eq!(declared, 8);
                assert_eq!(available, 36);
            },
            other => panic!("expected ContentCountMismatch, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_truncated_tmd() {
        let data = test_tmd([0u8; 8], 10, [0u8; 20]).to_bytes().unwrap();
        assert!(TMD::from_bytes(&data[..0x100]).is_err());
    }
}
