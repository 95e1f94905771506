// title/mod.rs from rustwl (c) 2025 NinjaCheetah & Contributors
// https://github.com/NinjaCheetah/rustwl
//
// Root for all title-related modules and implementation of the high-level Title object.

pub mod commonkeys;
pub mod content;
pub mod crypto;
pub mod nus;
pub mod tad;
pub mod ticket;
pub mod tmd;

use thiserror::Error;
use crate::title::commonkeys::CommonKeyStore;
use crate::title::content::ContentError;
use crate::title::crypto::CryptoError;
use crate::title::tad::{TADError, TadWarning};
use crate::title::ticket::TicketError;
use crate::title::tmd::TMDError;

#[derive(Debug, Error)]
pub enum TitleError {
    #[error("the Title IDs of the TMD ({tmd}) and Ticket ({ticket}) in this TAD do not match")]
    TitleIDMismatch { tmd: String, ticket: String },
    #[error("an error occurred while processing TMD data")]
    TMD(#[from] TMDError),
    #[error("an error occurred while processing Ticket data")]
    Ticket(#[from] TicketError),
    #[error("an error occurred while processing content data")]
    Content(#[from] ContentError),
    #[error("a TAD could not be processed from the provided data")]
    TAD(#[from] TADError),
    #[error("the Title Key for this title could not be derived")]
    Crypto(#[from] CryptoError),
    #[error("the provided Title data was invalid")]
    IO(#[from] std::io::Error),
}

/// A structure representing all the components of a digital DSi title: its
/// certificate chain, CRL, Ticket, TMD, and contents. Provides higher-level
/// access than the individual component objects and keeps data that's shared
/// between them in sync.
#[derive(Debug, Clone)]
pub struct Title {
    cert_chain: Vec<u8>,
    crl: Vec<u8>,
    pub ticket: ticket::Ticket,
    pub tmd: tmd::TMD,
    pub content: content::ContentRegion,
}

impl Title {
    /// Creates a new Title from a parsed TAD, parsing the TMD, Ticket, and
    /// content region out of it. Non-fatal conditions found while splitting
    /// the content region are appended to the returned warnings.
    pub fn from_tad(tad: &tad::TAD) -> Result<(Title, Vec<TadWarning>), TitleError> {
        let tmd = tmd::TMD::from_bytes(&tad.tmd())?;
        let ticket = ticket::Ticket::from_bytes(&tad.ticket())?;
        // The Ticket duplicates the TMD's Title ID, and content decryption is
        // keyed on it, so a mismatch means the TAD can't be trusted at all.
        if tmd.title_id != ticket.title_id {
            return Err(TitleError::TitleIDMismatch {
                tmd: hex::encode(tmd.title_id),
                ticket: hex::encode(ticket.title_id),
            });
        }
        let (content, warnings) = content::ContentRegion::from_bytes(&tad.content(), tmd.content_records.clone())?;
        let title = Title {
            cert_chain: tad.cert_chain(),
            crl: tad.crl(),
            ticket,
            tmd,
            content,
        };
        Ok((title, warnings))
    }

    /// Creates a new Title directly from the binary data of a TAD file,
    /// returning it together with any warnings raised while parsing.
    pub fn from_bytes(bytes: &[u8]) -> Result<(Title, Vec<TadWarning>), TitleError> {
        let (tad, mut warnings) = tad::TAD::from_bytes(bytes)?;
        let (title, content_warnings) = Title::from_tad(&tad)?;
        warnings.extend(content_warnings);
        Ok((title, warnings))
    }

    /// Creates a new Title from its individual components. The TMD and Ticket
    /// must agree on the Title ID.
    pub fn from_parts(tmd: tmd::TMD, ticket: ticket::Ticket, cert_chain: &[u8], crl: &[u8],
                      content: content::ContentRegion) -> Result<Title, TitleError> {
        if tmd.title_id != ticket.title_id {
            return Err(TitleError::TitleIDMismatch {
                tmd: hex::encode(tmd.title_id),
                ticket: hex::encode(ticket.title_id),
            });
        }
        Ok(Title {
            cert_chain: cert_chain.to_vec(),
            crl: crl.to_vec(),
            ticket,
            tmd,
            content,
        })
    }

    /// Rebuilds a TAD from the data in the Title, recomputing all region
    /// sizes in its header.
    pub fn to_tad(&self) -> Result<tad::TAD, TitleError> {
        let tad = tad::TAD::from_parts(
            &self.cert_chain,
            &self.crl,
            &self.tmd,
            &self.ticket,
            &self.content,
        )?;
        Ok(tad)
    }

    /// Rebuilds the binary data of a TAD file from the data in the Title.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TitleError> {
        Ok(self.to_tad()?.to_bytes()?)
    }

    /// Gets the decrypted content at the specified index, deriving the Title
    /// Key from the Ticket with a common key from the provided store. A hash
    /// mismatch is returned as a warning next to the bytes rather than an
    /// error, so the caller chooses whether to reject the content.
    pub fn get_content_by_index(&self, index: usize, store: &CommonKeyStore) -> Result<(Vec<u8>, Option<TadWarning>), TitleError> {
        let title_key = self.ticket.dec_title_key(store)?;
        Ok(self.content.get_content_by_index(index, title_key)?)
    }

    /// Gets the decrypted content with the specified Content ID.
    pub fn get_content_by_cid(&self, cid: u32, store: &CommonKeyStore) -> Result<(Vec<u8>, Option<TadWarning>), TitleError> {
        let title_key = self.ticket.dec_title_key(store)?;
        Ok(self.content.get_content_by_cid(cid, title_key)?)
    }

    /// Replaces the content at the specified index with new decrypted data,
    /// re-encrypting it with the title's own key and updating the size and
    /// hash in the TMD's matching record.
    pub fn set_content(&mut self, dec_content: &[u8], index: usize, store: &CommonKeyStore) -> Result<(), TitleError> {
        let title_key = self.ticket.dec_title_key(store)?;
        self.content.set_content(dec_content, index, title_key)?;
        // The region owns its copy of the records, so mirror the update into
        // the TMD to keep the two from drifting apart.
        self.tmd.content_records = self.content.content_records.clone();
        Ok(())
    }

    pub fn title_id(&self) -> [u8; 8] {
        self.tmd.title_id
    }

    pub fn cert_chain(&self) -> Vec<u8> {
        self.cert_chain.clone()
    }

    pub fn set_cert_chain(&mut self, cert_chain: &[u8]) {
        self.cert_chain = cert_chain.to_vec();
    }

    pub fn crl(&self) -> Vec<u8> {
        self.crl.clone()
    }

    pub fn set_crl(&mut self, crl: &[u8]) {
        self.crl = crl.to_vec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::title::tad::TadWarning;

    const TITLE_ID: [u8; 8] = [0x00, 0x03, 0x00, 0x15, 0xDE, 0xAD, 0xBE, 0xEF];
    const TITLE_KEY: [u8; 16] = *b"0123456789abcdef";

    // Assembles a complete synthetic title with a single content.
    fn test_title(plaintext: &[u8]) -> Title {
        let store = CommonKeyStore::twl();
        let tmd = tmd::tests::test_tmd(TITLE_ID, plaintext.len() as u64, [0u8; 20]);
        let ticket = ticket::tests::test_ticket(TITLE_ID, TITLE_KEY, 0);
        let content = content::ContentRegion::new(tmd.content_records.clone());
        let mut title = Title::from_parts(tmd, ticket, &[0x77; 10], &[], content).unwrap();
        title.set_content(plaintext, 0, &store).unwrap();
        title
    }

    #[test]
    fn test_parse_and_decrypt() {
        let store = CommonKeyStore::twl();
        let data = test_title(b"0123456789").to_bytes().unwrap();
        let (title, warnings) = Title::from_bytes(&data).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(title.title_id(), TITLE_ID);
        let (content, warning) = title.get_content_by_index(0, &store).unwrap();
        assert!(warning.is_none());
        assert_eq!(content, b"0123456789");
        // An unmodified title must dump back to identical bytes.
        assert_eq!(title.to_bytes().unwrap(), data);
    }

    #[test]
    fn test_corrupt_content_still_returned() {
        let store = CommonKeyStore::twl();
        let mut data = test_title(b"0123456789").to_bytes().unwrap();
        // Flip one byte inside the content region, which starts in the last
        // 64 byte block of the file.
        let content_offset = data.len() - 64;
        data[content_offset] ^= 0xFF;
        let (title, warnings) = Title::from_bytes(&data).unwrap();
        assert!(warnings.is_empty());
        let (content, warning) = title.get_content_by_index(0, &store).unwrap();
        assert_eq!(content.len(), 10);
        assert!(matches!(warning, Some(TadWarning::ContentHashMismatch { index: 0, .. })));
    }

    #[test]
    fn test_title_id_mismatch() {
        let mut title = test_title(b"0123456789");
        title.ticket.title_id = [0u8; 8];
        let data = title.to_bytes().unwrap();
        assert!(matches!(Title::from_bytes(&data), Err(TitleError::TitleIDMismatch { .. })));
    }

    #[test]
    fn test_replace_content() {
        let store = CommonKeyStore::twl();
        let mut title = test_title(b"0123456789");
        let replacement = b"some completely different, longer content";
        title.set_content(replacement, 0, &store).unwrap();
        assert_eq!(title.tmd.content_records[0].content_size, replacement.len() as u64);
        assert_eq!(title.tmd.content_records[0].content_hash, title.content.content_records[0].content_hash);
        let data = title.to_bytes().unwrap();
        let (reparsed, warnings) = Title::from_bytes(&data).unwrap();
        assert!(warnings.is_empty());
        let (content, warning) = reparsed.get_content_by_index(0, &store).unwrap();
        assert!(warning.is_none());
        assert_eq!(content, replacement);
    }

    #[test]
    fn test_unknown_key_blocks_decryption_not_parsing() {
        let store = CommonKeyStore::twl();
        let mut title = test_title(b"0123456789");
        title.ticket.common_key_index = 9;
        let data = title.to_bytes().unwrap();
        // Parsing succeeds, only key derivation fails.
        let (title, _) = Title::from_bytes(&data).unwrap();
        assert!(matches!(title.get_content_by_index(0, &store), Err(TitleError::Crypto(_))));
    }
}
