// title/ticket.rs from rustwl (c) 2025 NinjaCheetah & Contributors
// https://github.com/NinjaCheetah/rustwl
//
// Implements the structures and methods required for Ticket parsing and editing.

use std::io::{Cursor, Read, Write};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;
use crate::title::commonkeys::CommonKeyStore;
use crate::title::crypto::{CryptoError, decrypt_title_key, encrypt_title_key};

// Size of a v0 Ticket. Everything before this offset is required.
const TICKET_SIZE: usize = 0x2A4;

#[derive(Debug, Error)]
pub enum TicketError {
    #[error("Ticket data is too short (was {0} bytes, must be at least {TICKET_SIZE})")]
    TooShort(usize),
    #[error("Ticket data is not in a valid format")]
    IO(#[from] std::io::Error),
}

#[derive(Debug, Copy, Clone)]
pub struct TitleLimit {
    // The type of limit being applied (time, launch count, etc.)
    pub limit_type: u32,
    // The maximum value for that limit (seconds, max launches, etc.)
    pub limit_max: u32,
}

/// A structure that represents a DSi Ticket file.
#[derive(Debug, Clone)]
pub struct Ticket {
    pub signature_type: u32,
    pub signature: [u8; 256],
    pub padding1: [u8; 60],
    pub signature_issuer: [u8; 64],
    pub ecdh_data: [u8; 60],
    pub ticket_version: u8,
    pub reserved1: [u8; 2],
    pub title_key: [u8; 16],
    pub unknown1: [u8; 1],
    pub ticket_id: [u8; 8],
    pub console_id: [u8; 4],
    pub title_id: [u8; 8],
    pub unknown2: [u8; 2],
    pub title_version: u16,
    pub permitted_titles_mask: [u8; 4],
    pub permit_mask: [u8; 4],
    pub title_export_allowed: u8,
    pub common_key_index: u8,
    pub unknown3: [u8; 48],
    pub content_access_permission: [u8; 64],
    pub padding2: [u8; 2],
    pub title_limits: [TitleLimit; 8],
}

impl Ticket {
    /// Creates a new Ticket instance from the binary data of a Ticket file.
    pub fn from_bytes(data: &[u8]) -> Result<Self, TicketError> {
        if data.len() < TICKET_SIZE {
            return Err(TicketError::TooShort(data.len()));
        }
        let mut buf = Cursor::new(data);
        let signature_type = buf.read_u32::<BigEndian>()?;
        let mut signature = [0u8; 256];
        buf.read_exact(&mut signature)?;
        let mut padding1 = [0u8; 60];
        buf.read_exact(&mut padding1)?;
        let mut signature_issuer = [0u8; 64];
        buf.read_exact(&mut signature_issuer)?;
        let mut ecdh_data = [0u8; 60];
        buf.read_exact(&mut ecdh_data)?;
        let ticket_version = buf.read_u8()?;
        let mut reserved1 = [0u8; 2];
        buf.read_exact(&mut reserved1)?;
        let mut title_key = [0u8; 16];
        buf.read_exact(&mut title_key)?;
        let mut unknown1 = [0u8; 1];
        buf.read_exact(&mut unknown1)?;
        let mut ticket_id = [0u8; 8];
        buf.read_exact(&mut ticket_id)?;
        let mut console_id = [0u8; 4];
        buf.read_exact(&mut console_id)?;
        let mut title_id = [0u8; 8];
        buf.read_exact(&mut title_id)?;
        let mut unknown2 = [0u8; 2];
        buf.read_exact(&mut unknown2)?;
        let title_version = buf.read_u16::<BigEndian>()?;
        let mut permitted_titles_mask = [0u8; 4];
        buf.read_exact(&mut permitted_titles_mask)?;
        let mut permit_mask = [0u8; 4];
        buf.read_exact(&mut permit_mask)?;
        let title_export_allowed = buf.read_u8()?;
        let common_key_index = buf.read_u8()?;
        let mut unknown3 = [0u8; 48];
        buf.read_exact(&mut unknown3)?;
        let mut content_access_permission = [0u8; 64];
        buf.read_exact(&mut content_access_permission)?;
        let mut padding2 = [0u8; 2];
        buf.read_exact(&mut padding2)?;
        // Build the array of title limits.
        let mut title_limits = [TitleLimit { limit_type: 0, limit_max: 0 }; 8];
        for limit in &mut title_limits {
            limit.limit_type = buf.read_u32::<BigEndian>()?;
            limit.limit_max = buf.read_u32::<BigEndian>()?;
        }
        Ok(Ticket {
            signature_type,
            signature,
            padding1,
            signature_issuer,
            ecdh_data,
            ticket_version,
            reserved1,
            title_key,
            unknown1,
            ticket_id,
            console_id,
            title_id,
            unknown2,
            title_version,
            permitted_titles_mask,
            permit_mask,
            title_export_allowed,
            common_key_index,
            unknown3,
            content_access_permission,
            padding2,
            title_limits,
        })
    }

    /// Dumps the data in a Ticket instance back into binary data that can be written to a file.
    pub fn to_bytes(&self) -> Result<Vec<u8>, std::io::Error> {
        let mut buf = Vec::new();
        buf.write_u32::<BigEndian>(self.signature_type)?;
        buf.write_all(&self.signature)?;
        buf.write_all(&self.padding1)?;
        buf.write_all(&self.signature_issuer)?;
        buf.write_all(&self.ecdh_data)?;
        buf.write_u8(self.ticket_version)?;
        buf.write_all(&self.reserved1)?;
        buf.write_all(&self.title_key)?;
        buf.write_all(&self.unknown1)?;
        buf.write_all(&self.ticket_id)?;
        buf.write_all(&self.console_id)?;
        buf.write_all(&self.title_id)?;
        buf.write_all(&self.unknown2)?;
        buf.write_u16::<BigEndian>(self.title_version)?;
        buf.write_all(&self.permitted_titles_mask)?;
        buf.write_all(&self.permit_mask)?;
        buf.write_u8(self.title_export_allowed)?;
        buf.write_u8(self.common_key_index)?;
        buf.write_all(&self.unknown3)?;
        buf.write_all(&self.content_access_permission)?;
        buf.write_all(&self.padding2)?;
        // Iterate over title limits and write out their data.
        for limit in &self.title_limits {
            buf.write_u32::<BigEndian>(limit.limit_type)?;
            buf.write_u32::<BigEndian>(limit.limit_max)?;
        }
        Ok(buf)
    }

    /// Gets the Title Key stored in a Ticket, decrypted with the common key
    /// the Ticket's common key index selects from the provided store.
    pub fn dec_title_key(&self, store: &CommonKeyStore) -> Result<[u8; 16], CryptoError> {
        decrypt_title_key(self.title_key, self.common_key_index, self.title_id, store)
    }

    /// Replaces the encrypted Title Key in a Ticket with a new key, encrypting
    /// it with the common key the Ticket's common key index selects.
    pub fn set_title_key(&mut self, title_key_dec: [u8; 16], store: &CommonKeyStore) -> Result<(), CryptoError> {
        self.title_key = encrypt_title_key(title_key_dec, self.common_key_index, self.title_id, store)?;
        Ok(())
    }

    /// Whether this Ticket was signed for development consoles or not.
    pub fn is_dev(&self) -> bool {
        self.common_key_index != 0
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    // Builds a Ticket carrying the provided Title Key in encrypted form, for
    // use here and in the TAD-level tests.
    pub(crate) fn test_ticket(title_id: [u8; 8], title_key_dec: [u8; 16], common_key_index: u8) -> Ticket {
        let mut ticket = Ticket {
            signature_type: 0x10001,
            signature: [0xBB; 256],
            padding1: [0u8; 60],
            signature_issuer: [0u8; 64],
            ecdh_data: [0u8; 60],
            ticket_version: 0,
            reserved1: [0u8; 2],
            title_key: [0u8; 16],
            unknown1: [0u8; 1],
            ticket_id: [0u8; 8],
            console_id: [0u8; 4],
            title_id,
            unknown2: [0u8; 2],
            title_version: 0x0500,
            permitted_titles_mask: [0u8; 4],
            permit_mask: [0u8; 4],
            title_export_allowed: 0,
            common_key_index,
            unknown3: [0u8; 48],
            content_access_permission: [0u8; 64],
            padding2: [0u8; 2],
            title_limits: [TitleLimit { limit_type: 0, limit_max: 0 }; 8],
        };
        ticket.set_title_key(title_key_dec, &CommonKeyStore::twl()).unwrap();
        ticket
    }

    #[test]
    fn test_ticket_round_trip() {
        let ticket = test_ticket([0x00, 0x03, 0x00, 0x15, 0xDE, 0xAD, 0xBE, 0xEF], [0x42; 16], 0);
        let data = ticket.to_bytes().unwrap();
        assert_eq!(data.len(), 0x2A4);
        let parsed = Ticket::from_bytes(&data).unwrap();
        assert_eq!(parsed.title_id, ticket.title_id);
        assert_eq!(parsed.common_key_index, 0);
        assert_eq!(parsed.to_bytes().unwrap(), data);
    }

    #[test]
    fn test_title_key_set_and_decrypt() {
        let store = CommonKeyStore::twl();
        let ticket = test_ticket([0u8; 8], [0x42; 16], 0);
        assert_ne!(ticket.title_key, [0x42; 16]);
        assert_eq!(ticket.dec_title_key(&store).unwrap(), [0x42; 16]);
    }

    #[test]
    fn test_ticket_too_short() {
        let data = vec![0u8; 0x200];
        assert!(matches!(Ticket::from_bytes(&data), Err(TicketError::TooShort(0x200))));
    }

    #[test]
    fn test_unknown_common_key_index() {
        let mut ticket = test_ticket([0u8; 8], [0x42; 16], 0);
        ticket.common_key_index = 255;
        assert!(ticket.dec_title_key(&CommonKeyStore::twl()).is_err());
    }
}
