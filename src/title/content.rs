// title/content.rs from rustwl (c) 2025 NinjaCheetah & Contributors
// https://github.com/NinjaCheetah/rustwl
//
// Implements content parsing and editing.

use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use sha1::{Sha1, Digest};
use thiserror::Error;
use crate::title::tad::TadWarning;
use crate::title::tmd::ContentRecord;
use crate::title::crypto;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("requested index {index} is out of range (must not exceed {max})")]
    IndexOutOfRange { index: usize, max: usize },
    #[error("content with requested Content ID {0} could not be found")]
    CIDNotFound(u32),
    #[error("content region is too small for its records (was {actual} bytes, records require {required})")]
    RegionTooSmall { required: u64, actual: u64 },
    #[error("provided content does not match the size in its record (was {actual} bytes, record says {expected})")]
    SizeMismatch { expected: u64, actual: u64 },
    #[error("content data is not in a valid format")]
    IO(#[from] std::io::Error),
}

// Encrypted size of a content: its record size rounded up to the AES block size.
fn enc_size(content_size: u64) -> u64 {
    (content_size + 15) & !15
}

// On-disk footprint of a content: its encrypted size padded to a 64 byte boundary.
fn padded_size(content_size: u64) -> u64 {
    (content_size + 63) & !63
}

/// A structure that represents the block of data containing the contents of a
/// digital DSi title. Contents are stored encrypted and are only decrypted
/// when they are requested.
#[derive(Debug, Clone)]
pub struct ContentRegion {
    pub content_records: Vec<ContentRecord>,
    pub content_region_size: u32,
    pub num_contents: u16,
    pub content_start_offsets: Vec<u64>,
    pub contents: Vec<Vec<u8>>,
}

impl ContentRegion {
    /// Creates a ContentRegion instance from the content area of a TAD and the
    /// ContentRecords from its TMD. Non-zero padding between contents is not
    /// fatal and is reported through the returned warnings instead.
    pub fn from_bytes(data: &[u8], content_records: Vec<ContentRecord>) -> Result<(Self, Vec<TadWarning>), ContentError> {
        let num_contents = content_records.len() as u16;
        // Calculate the starting offsets of each content. Every content
        // starts on a 64 byte boundary.
        let content_start_offsets: Vec<u64> = std::iter::once(0)
            .chain(content_records.iter().scan(0, |offset, record| {
                *offset += padded_size(record.content_size);
                Some(*offset)
            })).take(content_records.len()).collect(); // Trims the extra final entry.
        let content_region_size: u64 = content_records.iter().map(|x| padded_size(x.content_size)).sum();
        // The final content only strictly needs to be present up to its
        // encrypted size, since the 64 byte padding after it may be cut off.
        let required = match (content_start_offsets.last(), content_records.last()) {
            (Some(offset), Some(record)) => offset + enc_size(record.content_size),
            _ => 0,
        };
        if (data.len() as u64) < required {
            return Err(ContentError::RegionTooSmall { required, actual: data.len() as u64 });
        }
        let mut warnings: Vec<TadWarning> = Vec::new();
        let mut contents: Vec<Vec<u8>> = Vec::with_capacity(num_contents as usize);
        let mut buf = Cursor::new(data);
        for i in 0..num_contents as usize {
            buf.seek(SeekFrom::Start(content_start_offsets[i]))?;
            let mut content = vec![0u8; enc_size(content_records[i].content_size) as usize];
            buf.read_exact(&mut content)?;
            contents.push(content);
            // The bytes between this content and the start of the next one
            // (or the end of the region) should all be zero padding.
            let pad_start = content_start_offsets[i] + enc_size(content_records[i].content_size);
            let pad_end = if i + 1 < num_contents as usize {
                content_start_offsets[i + 1]
            } else {
                data.len() as u64
            };
            let pad_end = pad_end.min(data.len() as u64);
            if pad_start < pad_end && data[pad_start as usize..pad_end as usize].iter().any(|&b| b != 0) {
                warnings.push(TadWarning::UnalignedPadding(pad_start));
            }
        }
        // A region that doesn't match its computed size is tolerated, but
        // repacking it will not reproduce the original bytes, so flag it.
        if data.len() as u64 != content_region_size {
            warnings.push(TadWarning::UnalignedPadding(data.len() as u64));
        }
        let region = ContentRegion {
            content_records,
            content_region_size: content_region_size as u32,
            num_contents,
            content_start_offsets,
            contents,
        };
        Ok((region, warnings))
    }

    /// Creates a ContentRegion instance from the ContentRecords of a TMD that
    /// contains no actual content yet. Content can then be loaded into it.
    pub fn new(content_records: Vec<ContentRecord>) -> Self {
        let content_region_size: u64 = content_records.iter().map(|x| padded_size(x.content_size)).sum();
        let num_contents = content_records.len() as u16;
        let content_start_offsets: Vec<u64> = std::iter::once(0)
            .chain(content_records.iter().scan(0, |offset, record| {
                *offset += padded_size(record.content_size);
                Some(*offset)
            })).take(content_records.len()).collect();
        let contents: Vec<Vec<u8>> = vec![Vec::new(); num_contents as usize];
        ContentRegion {
            content_records,
            content_region_size: content_region_size as u32,
            num_contents,
            content_start_offsets,
            contents,
        }
    }

    /// Dumps the entire ContentRegion back into binary data that can be
    /// packed into a TAD. Every content is padded to a 64 byte boundary.
    pub fn to_bytes(&self) -> Result<Vec<u8>, std::io::Error> {
        let mut buf: Vec<u8> = Vec::new();
        for content in &self.contents {
            let mut content = content.clone();
            content.resize((content.len() + 63) & !63, 0);
            buf.write_all(&content)?;
        }
        Ok(buf)
    }

    /// Gets the encrypted content file from the ContentRegion at the specified index.
    pub fn get_enc_content_by_index(&self, index: usize) -> Result<Vec<u8>, ContentError> {
        let content = self.contents.get(index).ok_or(ContentError::IndexOutOfRange { index, max: self.content_records.len().saturating_sub(1) })?;
        Ok(content.clone())
    }

    /// Gets the decrypted content file from the ContentRegion at the specified
    /// index. The content's hash is verified against its record; a mismatch is
    /// returned as a warning alongside the (possibly garbage) decrypted bytes,
    /// so that the caller can decide whether to keep them.
    pub fn get_content_by_index(&self, index: usize, title_key: [u8; 16]) -> Result<(Vec<u8>, Option<TadWarning>), ContentError> {
        let content = self.get_enc_content_by_index(index)?;
        let record = &self.content_records[index];
        let mut content_dec = crypto::decrypt_content(&content, title_key, record.index);
        // Trim the zero padding added before encryption, it is not content.
        content_dec.truncate(record.content_size as usize);
        let mut hasher = Sha1::new();
        hasher.update(&content_dec);
        let result = hasher.finalize();
        let warning = if result[..] != record.content_hash {
            Some(TadWarning::ContentHashMismatch {
                index: record.index,
                expected: hex::encode(record.content_hash),
                actual: hex::encode(result),
            })
        } else {
            None
        };
        Ok((content_dec, warning))
    }

    /// Gets the encrypted content file from the ContentRegion with the specified Content ID.
    pub fn get_enc_content_by_cid(&self, cid: u32) -> Result<Vec<u8>, ContentError> {
        let index = self.content_records.iter().position(|x| x.content_id == cid)
            .ok_or(ContentError::CIDNotFound(cid))?;
        self.get_enc_content_by_index(index)
    }

    /// Gets the decrypted content file from the ContentRegion with the specified Content ID.
    pub fn get_content_by_cid(&self, cid: u32, title_key: [u8; 16]) -> Result<(Vec<u8>, Option<TadWarning>), ContentError> {
        let index = self.content_records.iter().position(|x| x.content_id == cid)
            .ok_or(ContentError::CIDNotFound(cid))?;
        self.get_content_by_index(index, title_key)
    }

    /// Loads existing encrypted content into the specified index. The data
    /// must match the encrypted size implied by the record at that index.
    pub fn load_enc_content(&mut self, enc_content: &[u8], index: usize) -> Result<(), ContentError> {
        if index >= self.content_records.len() {
            return Err(ContentError::IndexOutOfRange { index, max: self.content_records.len().saturating_sub(1) });
        }
        let expected = enc_size(self.content_records[index].content_size);
        if enc_content.len() as u64 != expected {
            return Err(ContentError::SizeMismatch { expected, actual: enc_content.len() as u64 });
        }
        self.contents[index] = enc_content.to_vec();
        Ok(())
    }

    /// Replaces the content at the specified index with new decrypted content.
    /// The content is encrypted with the provided Title Key, and the size and
    /// hash in its record are updated to match the new data.
    pub fn set_content(&mut self, dec_content: &[u8], index: usize, title_key: [u8; 16]) -> Result<(), ContentError> {
        if index >= self.content_records.len() {
            return Err(ContentError::IndexOutOfRange { index, max: self.content_records.len().saturating_sub(1) });
        }
        let mut hasher = Sha1::new();
        hasher.update(dec_content);
        let result = hasher.finalize();
        self.content_records[index].content_size = dec_content.len() as u64;
        self.content_records[index].content_hash = result.into();
        self.contents[index] = crypto::encrypt_content(dec_content, title_key, self.content_records[index].index);
        // The region layout may have shifted, so redo the offset math.
        self.content_start_offsets = std::iter::once(0)
            .chain(self.content_records.iter().scan(0, |offset, record| {
                *offset += padded_size(record.content_size);
                Some(*offset)
            })).take(self.content_records.len()).collect();
        self.content_region_size = self.content_records.iter().map(|x| padded_size(x.content_size)).sum::<u64>() as u32;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::title::tmd::ContentType;

    fn test_records(sizes: &[u64]) -> Vec<ContentRecord> {
        sizes.iter().enumerate().map(|(i, &size)| {
            let mut hasher = Sha1::new();
            hasher.update(vec![i as u8; size as usize]);
            ContentRecord {
                content_id: i as u32,
                index: i as u16,
                content_type: ContentType::Normal,
                content_size: size,
                content_hash: hasher.finalize().into(),
            }
        }).collect()
    }

    fn test_region(sizes: &[u64], title_key: [u8; 16]) -> ContentRegion {
        let mut region = ContentRegion::new(test_records(sizes));
        for (i, &size) in sizes.iter().enumerate() {
            region.set_content(&vec![i as u8; size as usize], i, title_key).unwrap();
        }
        region
    }

    #[test]
    fn test_padded_blob_size() {
        // 17 bytes -> 32 encrypted bytes -> 64 on disk.
        let region = test_region(&[17], [0u8; 16]);
        assert_eq!(region.contents[0].len(), 32);
        assert_eq!(region.to_bytes().unwrap().len(), 64);
    }

    #[test]
    fn test_region_round_trip() {
        let title_key = [0x13; 16];
        let region = test_region(&[17, 100, 64], title_key);
        assert_eq!(region.content_start_offsets, vec![0, 64, 192]);
        let data = region.to_bytes().unwrap();
        assert_eq!(data.len(), 64 + 128 + 64);
        let (parsed, warnings) = ContentRegion::from_bytes(&data, region.content_records.clone()).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(parsed.to_bytes().unwrap(), data);
        for i in 0..3 {
            let (content, warning) = parsed.get_content_by_index(i, title_key).unwrap();
            assert!(warning.is_none());
            assert_eq!(content, region.get_content_by_index(i, title_key).unwrap().0);
        }
    }

    #[test]
    fn test_hash_mismatch_is_surfaced() {
        let title_key = [0x13; 16];
        let region = test_region(&[100], title_key);
        let mut data = region.to_bytes().unwrap();
        data[50] ^= 0xFF;
        let (parsed, _) = ContentRegion::from_bytes(&data, region.content_records.clone()).unwrap();
        let (content, warning) = parsed.get_content_by_index(0, title_key).unwrap();
        // The corrupted bytes still come back, along with the warning.
        assert_eq!(content.len(), 100);
        match warning {
            Some(TadWarning::ContentHashMismatch { index, expected, actual }) => {
                assert_eq!(index, 0);
                assert_ne!(expected, actual);
            },
            other => panic!("expected a hash mismatch warning, got {other:?}"),
        }
    }

    #[test]
    fn test_nonzero_padding_warns() {
        let region = test_region(&[17, 32], [0u8; 16]);
        let mut data = region.to_bytes().unwrap();
        // Scribble into the padding between the two contents.
        data[40] = 0xAB;
        let (_, warnings) = ContentRegion::from_bytes(&data, region.content_records.clone()).unwrap();
        assert_eq!(warnings, vec![TadWarning::UnalignedPadding(32)]);
    }

    #[test]
    fn test_region_too_small() {
        let records = test_records(&[100]);
        let result = ContentRegion::from_bytes(&[0u8; 50], records);
        assert!(matches!(result, Err(ContentError::RegionTooSmall { required: 112, actual: 50 })));
    }

    #[test]
    fn test_recordless_region_with_trailing_bytes_warns() {
        // No records means the region should be empty; stray bytes would be
        // silently dropped by a repack, so they must be flagged.
        let (region, warnings) = ContentRegion::from_bytes(&[0u8; 16], Vec::new()).unwrap();
        assert_eq!(warnings, vec![TadWarning::UnalignedPadding(16)]);
        assert!(region.to_bytes().unwrap().is_empty());
        let (_, warnings) = ContentRegion::from_bytes(&[], Vec::new()).unwrap();
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_cid_lookup() {
        let region = test_region(&[16, 16], [0u8; 16]);
        assert!(region.get_enc_content_by_cid(1).is_ok());
        assert!(matches!(region.get_enc_content_by_cid(42), Err(ContentError::CIDNotFound(42))));
    }
}
