// title/crypto.rs from rustwl (c) 2025 NinjaCheetah & Contributors
// https://github.com/NinjaCheetah/rustwl
//
// Implements the common crypto functions required to handle DSi content encryption.

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::cipher::block_padding::NoPadding;
use thiserror::Error;
use crate::title::commonkeys::{CommonKeyError, CommonKeyStore};

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("no common key is available for this Ticket")]
    CommonKey(#[from] CommonKeyError),
}

// Convert a Title ID into the format required for use as the Title Key decryption IV.
// The high 8 bytes are the Title ID and the low 8 bytes are zero.
fn title_id_to_iv(title_id: [u8; 8]) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[..8].copy_from_slice(&title_id);
    iv
}

// Convert a content index into the IV used for that content's encryption. The
// index occupies the first 2 bytes, big-endian, and the remaining 14 are zero.
fn content_index_to_iv(index: u16) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[..2].copy_from_slice(&index.to_be_bytes());
    iv
}

/// Decrypts a Title Key using the common key selected by the provided index.
pub fn decrypt_title_key(title_key_enc: [u8; 16], common_key_index: u8, title_id: [u8; 8], store: &CommonKeyStore) -> Result<[u8; 16], CryptoError> {
    let common_key = store.key_for(common_key_index)?;
    let iv = title_id_to_iv(title_id);
    let decryptor = Aes128CbcDec::new(&common_key.into(), &iv.into());
    let mut title_key = title_key_enc;
    decryptor.decrypt_padded_mut::<NoPadding>(&mut title_key).unwrap();
    Ok(title_key)
}

/// Encrypts a Title Key using the common key selected by the provided index.
pub fn encrypt_title_key(title_key_dec: [u8; 16], common_key_index: u8, title_id: [u8; 8], store: &CommonKeyStore) -> Result<[u8; 16], CryptoError> {
    let common_key = store.key_for(common_key_index)?;
    let iv = title_id_to_iv(title_id);
    let encryptor = Aes128CbcEnc::new(&common_key.into(), &iv.into());
    let mut title_key = title_key_dec;
    encryptor.encrypt_padded_mut::<NoPadding>(&mut title_key, 16).unwrap();
    Ok(title_key)
}

/// Decrypts content using the provided Title Key and the index of that content
/// in its title. The result includes any zero padding added before encryption,
/// so the caller must truncate it to the size in the matching content record.
pub fn decrypt_content(content_enc: &[u8], title_key: [u8; 16], index: u16) -> Vec<u8> {
    let iv = content_index_to_iv(index);
    let mut content = content_enc.to_vec();
    // Align the data to the next multiple of 16 so that it can be decrypted.
    content.resize((content.len() + 15) & !15, 0);
    let decryptor = Aes128CbcDec::new(&title_key.into(), &iv.into());
    decryptor.decrypt_padded_mut::<NoPadding>(&mut content).unwrap();
    content
}

/// Encrypts content using the provided Title Key and the index of that content
/// in its title. The data is zero padded to the next multiple of 16 first, so
/// the result may be slightly larger than the original content.
pub fn encrypt_content(content_dec: &[u8], title_key: [u8; 16], index: u16) -> Vec<u8> {
    let iv = content_index_to_iv(index);
    let mut content = content_dec.to_vec();
    let padded_len = (content.len() + 15) & !15;
    content.resize(padded_len, 0);
    let encryptor = Aes128CbcEnc::new(&title_key.into(), &iv.into());
    encryptor.encrypt_padded_mut::<NoPadding>(&mut content, padded_len).unwrap();
    content
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_key_round_trip() {
        let store = CommonKeyStore::twl();
        let title_id: [u8; 8] = [0x00, 0x03, 0x00, 0x15, 0xDE, 0xAD, 0xBE, 0xEF];
        let title_key: [u8; 16] = *b"an AES-128 key!!";
        let title_key_enc = encrypt_title_key(title_key, 0, title_id, &store).unwrap();
        assert_ne!(title_key_enc, title_key);
        let title_key_dec = decrypt_title_key(title_key_enc, 0, title_id, &store).unwrap();
        assert_eq!(title_key_dec, title_key);
    }

    #[test]
    fn test_unknown_key_index() {
        let store = CommonKeyStore::twl();
        let result = decrypt_title_key([0u8; 16], 255, [0u8; 8], &store);
        assert!(matches!(result, Err(CryptoError::CommonKey(CommonKeyError::UnknownKeyIndex(255)))));
    }

    #[test]
    fn test_content_round_trip() {
        let title_key: [u8; 16] = [0x5A; 16];
        let content = b"some content data that is not block aligned";
        let content_enc = encrypt_content(content, title_key, 3);
        assert_eq!(content_enc.len() % 16, 0);
        let mut content_dec = decrypt_content(&content_enc, title_key, 3);
        content_dec.truncate(content.len());
        assert_eq!(content_dec, content);
    }

    #[test]
    fn test_content_padding_size() {
        // A 17 byte content must pad out to two AES blocks.
        let content_enc = encrypt_content(&[0xFFu8; 17], [0u8; 16], 0);
        assert_eq!(content_enc.len(), 32);
    }

    #[test]
    fn test_content_iv_depends_on_index() {
        let title_key: [u8; 16] = [0xA5; 16];
        let content = [0x42u8; 32];
        let enc_0 = encrypt_content(&content, title_key, 0);
        let enc_1 = encrypt_content(&content, title_key, 1);
        assert_ne!(enc_0, enc_1);
    }
}
