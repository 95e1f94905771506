// title/commonkeys.rs from rustwl (c) 2025 NinjaCheetah & Contributors
// https://github.com/NinjaCheetah/rustwl
//
// Implements the table of DSi common keys used to decrypt Title Keys.

use thiserror::Error;

const PROD_KEY: [u8; 16] = [
    0xAF, 0x1B, 0xF5, 0x16, 0xA8, 0x07, 0xD2, 0x1A, 0xEA, 0x45, 0x98, 0x4F, 0x04, 0x74, 0x28, 0x61,
];
const DEV_KEY: [u8; 16] = [
    0xA1, 0x60, 0x4A, 0x6A, 0x71, 0x23, 0xB5, 0x29, 0xAE, 0x8B, 0xEC, 0x32, 0xC8, 0x16, 0xFC, 0xAA,
];
const DEBUG_KEY: [u8; 16] = [
    0xA2, 0xFD, 0xDD, 0xF2, 0xE4, 0x23, 0x57, 0x4A, 0xE7, 0xED, 0x86, 0x57, 0xB5, 0xAB, 0x19, 0xD3,
];

#[derive(Debug, Error)]
pub enum CommonKeyError {
    #[error("the common key index provided, {0}, does not exist")]
    UnknownKeyIndex(u8),
}

/// A read-only table mapping a Ticket's common key index to a 16-byte AES key.
///
/// The table is built once and never mutated afterwards, so a single instance
/// can be shared freely between threads. Tickets select a key with their
/// common key index field.
#[derive(Debug, Clone)]
pub struct CommonKeyStore {
    keys: Vec<[u8; 16]>,
}

impl CommonKeyStore {
    /// Creates a CommonKeyStore containing the standard DSi common keys, with
    /// index 0 mapping to the production key, 1 to the development key, and 2
    /// to the debugger key.
    pub fn twl() -> Self {
        CommonKeyStore { keys: vec![PROD_KEY, DEV_KEY, DEBUG_KEY] }
    }

    /// Creates a CommonKeyStore from an arbitrary ordered list of keys. Index
    /// n resolves to the nth key supplied.
    pub fn from_keys(keys: Vec<[u8; 16]>) -> Self {
        CommonKeyStore { keys }
    }

    /// Gets the common key for the provided index.
    pub fn key_for(&self, index: u8) -> Result<[u8; 16], CommonKeyError> {
        self.keys.get(index as usize).copied().ok_or(CommonKeyError::UnknownKeyIndex(index))
    }
}

impl Default for CommonKeyStore {
    fn default() -> Self {
        CommonKeyStore::twl()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_indices() {
        let store = CommonKeyStore::twl();
        assert_eq!(store.key_for(0).unwrap(), PROD_KEY);
        assert_eq!(store.key_for(1).unwrap(), DEV_KEY);
        assert_eq!(store.key_for(2).unwrap(), DEBUG_KEY);
    }

    #[test]
    fn test_unknown_index() {
        let store = CommonKeyStore::twl();
        assert!(matches!(store.key_for(255), Err(CommonKeyError::UnknownKeyIndex(255))));
    }

    #[test]
    fn test_custom_table() {
        let store = CommonKeyStore::from_keys(vec![[0x11; 16]]);
        assert_eq!(store.key_for(0).unwrap(), [0x11; 16]);
        assert!(store.key_for(1).is_err());
    }
}
