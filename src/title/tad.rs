// title/tad.rs from rustwl (c) 2025 NinjaCheetah & Contributors
// https://github.com/NinjaCheetah/rustwl
//
// Implements the structures and methods required for TAD parsing and editing.
// TADs are structurally the DSi's equivalent of the Wii's WAD format, so
// WiiBrew's WAD documentation is the best reference for them.

use std::io::{Cursor, Read, Write};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;
use crate::title::{content, ticket, tmd};
use crate::title::content::ContentError;
use crate::title::ticket::TicketError;
use crate::title::tmd::TMDError;

// The fixed leading fields of a TAD header: the header size (always 0x20)
// and the region type "Is".
const TAD_HEADER_SIZE: u32 = 0x20;
const TAD_TYPE: [u8; 2] = *b"Is";

#[derive(Debug, Error)]
pub enum TADError {
    #[error("this does not appear to be a valid TAD file (expected header size 0x20 and type \"Is\", found {0:#010X} and {1:02X?})")]
    BadMagic(u32, [u8; 2]),
    #[error("{region} region (offset {offset:#X}, size {size:#X}) runs past the end of the data ({len:#X} bytes)")]
    RegionOutOfBounds { region: &'static str, offset: u64, size: u64, len: u64 },
    #[error("an error occurred while processing TMD data")]
    TMD(#[from] TMDError),
    #[error("an error occurred while processing Ticket data")]
    Ticket(#[from] TicketError),
    #[error("an error occurred while processing content data")]
    Content(#[from] ContentError),
    #[error("the provided TAD data was invalid")]
    IO(#[from] std::io::Error),
}

/// A non-fatal condition found while parsing or decrypting a TAD. Warnings
/// are collected and handed back next to the successful result, so that one
/// suspect title doesn't abort batch processing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TadWarning {
    #[error("non-zero bytes in the padding ending at offset {0:#X}")]
    UnalignedPadding(u64),
    #[error("content at index {index} hash mismatch (was {actual}, expected {expected})")]
    ContentHashMismatch { index: u16, expected: String, actual: String },
}

#[derive(Debug, Clone)]
pub struct TADHeader {
    pub tad_version: u16,
    cert_chain_size: u32,
    crl_size: u32,
    tmd_size: u32,
    ticket_size: u32,
}

#[derive(Debug, Clone)]
pub struct TADBody {
    cert_chain: Vec<u8>,
    crl: Vec<u8>,
    tmd: Vec<u8>,
    ticket: Vec<u8>,
    content: Vec<u8>,
}

/// A structure that represents a raw TAD file, split into its regions. The
/// content region is kept encrypted; parse the TMD and Ticket out of the body
/// (or use the higher-level Title) to work with it.
#[derive(Debug, Clone)]
pub struct TAD {
    pub header: TADHeader,
    pub body: TADBody,
}

// Rounds an offset up to the next multiple of 64, the alignment of every
// region in a TAD.
fn align(offset: u64) -> u64 {
    (offset + 63) & !63
}

// Slices one region out of the TAD data, after checking it actually fits.
fn read_region(data: &[u8], offset: u64, size: u64, region: &'static str) -> Result<Vec<u8>, TADError> {
    if offset + size > data.len() as u64 {
        return Err(TADError::RegionOutOfBounds { region, offset, size, len: data.len() as u64 });
    }
    Ok(data[offset as usize..(offset + size) as usize].to_vec())
}

// The bytes between the end of one region and the aligned start of the next
// should all be zero. Files where they aren't are tolerated but flagged.
fn check_padding(data: &[u8], start: u64, end: u64, warnings: &mut Vec<TadWarning>) {
    if start < end && data[start as usize..end as usize].iter().any(|&b| b != 0) {
        warnings.push(TadWarning::UnalignedPadding(end));
    }
}

impl TADHeader {
    /// Generates a new TADHeader from a populated TADBody object.
    pub fn from_body(body: &TADBody) -> TADHeader {
        TADHeader {
            tad_version: 0, // This is always officially a zero.
            cert_chain_size: body.cert_chain.len() as u32,
            crl_size: body.crl.len() as u32,
            tmd_size: body.tmd.len() as u32,
            ticket_size: body.ticket.len() as u32,
        }
    }
}

impl TADBody {
    /// Builds a TADBody from the individual components of a title. The
    /// content region must already be encrypted and its records must already
    /// be reflected in the provided TMD.
    pub fn from_parts(cert_chain: &[u8], crl: &[u8], tmd: &tmd::TMD, ticket: &ticket::Ticket,
                      content: &content::ContentRegion) -> Result<TADBody, TADError> {
        let body = TADBody {
            cert_chain: cert_chain.to_vec(),
            crl: crl.to_vec(),
            tmd: tmd.to_bytes().map_err(TMDError::IO)?,
            ticket: ticket.to_bytes().map_err(TicketError::IO)?,
            content: content.to_bytes().map_err(ContentError::IO)?,
        };
        Ok(body)
    }
}

impl TAD {
    /// Creates a new TAD instance from the binary data of a TAD file. Regions
    /// with non-zero bytes in the padding before them are still parsed, since
    /// such files exist in the wild, but each offending boundary is reported
    /// in the returned warnings.
    pub fn from_bytes(data: &[u8]) -> Result<(TAD, Vec<TadWarning>), TADError> {
        let mut buf = Cursor::new(data);
        let header_size = buf.read_u32::<BigEndian>()?;
        let mut tad_type = [0u8; 2];
        buf.read_exact(&mut tad_type)?;
        if header_size != TAD_HEADER_SIZE || tad_type != TAD_TYPE {
            return Err(TADError::BadMagic(header_size, tad_type));
        }
        let tad_version = buf.read_u16::<BigEndian>()?;
        let cert_chain_size = buf.read_u32::<BigEndian>()?;
        let crl_size = buf.read_u32::<BigEndian>()?;
        let tmd_size = buf.read_u32::<BigEndian>()?;
        let ticket_size = buf.read_u32::<BigEndian>()?;
        let header_end = buf.position();
        let header = TADHeader {
            tad_version,
            cert_chain_size,
            crl_size,
            tmd_size,
            ticket_size,
        };
        // Find the aligned offset of each region. The header is padded out to
        // 64 bytes, and every region starts on the next 64 byte boundary
        // after the previous one ends.
        let cert_chain_offset = align(TAD_HEADER_SIZE as u64);
        let crl_offset = align(cert_chain_offset + header.cert_chain_size as u64);
        let tmd_offset = align(crl_offset + header.crl_size as u64);
        let ticket_offset = align(tmd_offset + header.tmd_size as u64);
        let content_offset = align(ticket_offset + header.ticket_size as u64);
        let mut warnings: Vec<TadWarning> = Vec::new();
        let cert_chain = read_region(data, cert_chain_offset, header.cert_chain_size as u64, "certificate chain")?;
        check_padding(data, header_end, cert_chain_offset, &mut warnings);
        let crl = read_region(data, crl_offset, header.crl_size as u64, "CRL")?;
        check_padding(data, cert_chain_offset + header.cert_chain_size as u64, crl_offset, &mut warnings);
        let tmd = read_region(data, tmd_offset, header.tmd_size as u64, "TMD")?;
        check_padding(data, crl_offset + header.crl_size as u64, tmd_offset, &mut warnings);
        let ticket = read_region(data, ticket_offset, header.ticket_size as u64, "Ticket")?;
        check_padding(data, tmd_offset + header.tmd_size as u64, ticket_offset, &mut warnings);
        // The header carries no size for the content region, so it runs from
        // its aligned start to the end of the file. Its internal layout is
        // dictated by the TMD's content records.
        if content_offset > data.len() as u64 {
            return Err(TADError::RegionOutOfBounds { region: "content", offset: content_offset, size: 0, len: data.len() as u64 });
        }
        check_padding(data, ticket_offset + header.ticket_size as u64, content_offset, &mut warnings);
        let content = data[content_offset as usize..].to_vec();
        // A file that doesn't end on a 64 byte boundary lost some trailing
        // padding. It still parses, but repacking it pads the tail back out,
        // so the result won't be byte-identical.
        if data.len() as u64 % 64 != 0 {
            warnings.push(TadWarning::UnalignedPadding(data.len() as u64));
        }
        let body = TADBody {
            cert_chain,
            crl,
            tmd,
            ticket,
            content,
        };
        Ok((TAD { header, body }, warnings))
    }

    /// Creates a new TAD from the individual components of a title, sizing
    /// the header from the serialized parts.
    pub fn from_parts(cert_chain: &[u8], crl: &[u8], tmd: &tmd::TMD, ticket: &ticket::Ticket,
                      content: &content::ContentRegion) -> Result<TAD, TADError> {
        let body = TADBody::from_parts(cert_chain, crl, tmd, ticket, content)?;
        let header = TADHeader::from_body(&body);
        Ok(TAD { header, body })
    }

    /// Dumps the data in a TAD instance back into binary data that can be
    /// written to a file. Serialization is deterministic: dumping an
    /// unmodified TAD twice yields identical bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TADError> {
        let mut buf = Vec::new();
        buf.write_u32::<BigEndian>(TAD_HEADER_SIZE)?;
        buf.write_all(&TAD_TYPE)?;
        buf.write_u16::<BigEndian>(self.header.tad_version)?;
        buf.write_u32::<BigEndian>(self.header.cert_chain_size)?;
        buf.write_u32::<BigEndian>(self.header.crl_size)?;
        buf.write_u32::<BigEndian>(self.header.tmd_size)?;
        buf.write_u32::<BigEndian>(self.header.ticket_size)?;
        // Pad up to the nearest multiple of 64. This also needs to happen
        // after each region of data.
        buf.resize(align(buf.len() as u64) as usize, 0);
        buf.write_all(&self.body.cert_chain)?;
        buf.resize(align(buf.len() as u64) as usize, 0);
        buf.write_all(&self.body.crl)?;
        buf.resize(align(buf.len() as u64) as usize, 0);
        buf.write_all(&self.body.tmd)?;
        buf.resize(align(buf.len() as u64) as usize, 0);
        buf.write_all(&self.body.ticket)?;
        buf.resize(align(buf.len() as u64) as usize, 0);
        buf.write_all(&self.body.content)?;
        buf.resize(align(buf.len() as u64) as usize, 0);
        Ok(buf)
    }

    pub fn cert_chain_size(&self) -> u32 { self.header.cert_chain_size }

    pub fn cert_chain(&self) -> Vec<u8> {
        self.body.cert_chain.clone()
    }

    pub fn set_cert_chain(&mut self, cert_chain: &[u8]) {
        self.body.cert_chain = cert_chain.to_vec();
        self.header.cert_chain_size = cert_chain.len() as u32;
    }

    pub fn crl_size(&self) -> u32 { self.header.crl_size }

    pub fn crl(&self) -> Vec<u8> {
        self.body.crl.clone()
    }

    pub fn set_crl(&mut self, crl: &[u8]) {
        self.body.crl = crl.to_vec();
        self.header.crl_size = crl.len() as u32;
    }

    pub fn tmd_size(&self) -> u32 { self.header.tmd_size }

    pub fn tmd(&self) -> Vec<u8> {
        self.body.tmd.clone()
    }

    pub fn set_tmd(&mut self, tmd: &[u8]) {
        self.body.tmd = tmd.to_vec();
        self.header.tmd_size = tmd.len() as u32;
    }

    pub fn ticket_size(&self) -> u32 { self.header.ticket_size }

    pub fn ticket(&self) -> Vec<u8> {
        self.body.ticket.clone()
    }

    pub fn set_ticket(&mut self, ticket: &[u8]) {
        self.body.ticket = ticket.to_vec();
        self.header.ticket_size = ticket.len() as u32;
    }

    pub fn content(&self) -> Vec<u8> {
        self.body.content.clone()
    }

    pub fn set_content(&mut self, content: &[u8]) {
        self.body.content = content.to_vec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A do-nothing TAD: empty cert chain, CRL, TMD, Ticket, and content.
    fn empty_tad_bytes() -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&0x20u32.to_be_bytes());
        data.extend_from_slice(b"Is");
        data.extend_from_slice(&[0u8; 2]); // version
        data.extend_from_slice(&[0u8; 16]); // four zero region sizes
        data.resize(64, 0);
        data
    }

    #[test]
    fn test_empty_tad_round_trip() {
        let data = empty_tad_bytes();
        let (tad, warnings) = TAD::from_bytes(&data).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(tad.cert_chain_size(), 0);
        assert_eq!(tad.to_bytes().unwrap(), data);
    }

    #[test]
    fn test_bad_magic() {
        let mut data = empty_tad_bytes();
        data[4] = b'X';
        assert!(matches!(TAD::from_bytes(&data), Err(TADError::BadMagic(0x20, _))));
    }

    #[test]
    fn test_region_out_of_bounds() {
        let mut data = empty_tad_bytes();
        // Claim a 4 KiB certificate chain that isn't actually there.
        data[8..12].copy_from_slice(&0x1000u32.to_be_bytes());
        match TAD::from_bytes(&data) {
            Err(TADError::RegionOutOfBounds { region, offset, size, len }) => {
                assert_eq!(region, "certificate chain");
                assert_eq!(offset, 64);
                assert_eq!(size, 0x1000);
                assert_eq!(len, 64);
            },
            other => panic!("expected RegionOutOfBounds, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_nonzero_header_padding_warns() {
        let mut data = empty_tad_bytes();
        // Non-zero byte in the padding between the header fields and the
        // first region boundary.
        data[40] = 0x01;
        let (_, warnings) = TAD::from_bytes(&data).unwrap();
        assert_eq!(warnings, vec![TadWarning::UnalignedPadding(64)]);
    }

    #[test]
    fn test_truncated_trailing_padding_warns() {
        let mut data = empty_tad_bytes();
        // A 16 byte content tail, missing the padding out to 64 bytes.
        data.extend_from_slice(&[0x55u8; 16]);
        let (tad, warnings) = TAD::from_bytes(&data).unwrap();
        assert_eq!(warnings, vec![TadWarning::UnalignedPadding(80)]);
        // Repacking restores the trailing padding, so the result is longer
        // than the input. Byte identity only holds for warning-free parses.
        assert_eq!(tad.to_bytes().unwrap().len(), 128);
    }

    #[test]
    fn test_region_slicing() {
        let mut data = empty_tad_bytes();
        data[8..12].copy_from_slice(&10u32.to_be_bytes()); // cert chain size
        data.extend_from_slice(&[0xCCu8; 10]);
        data.resize(128, 0);
        let (tad, warnings) = TAD::from_bytes(&data).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(tad.cert_chain(), vec![0xCCu8; 10]);
        assert_eq!(tad.to_bytes().unwrap(), data);
    }
}
