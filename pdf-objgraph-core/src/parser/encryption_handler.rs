//! Encryption detection and the security handler seam
//!
//! The parser recognizes an `/Encrypt` entry in the trailer, reads the
//! encryption dictionary and hands it to a caller-supplied
//! [`SecurityHandlerFactory`]. Key derivation and ciphers live behind the
//! [`SecurityHandler`] trait (ISO 32000-1 Section 7.6).

use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, Reference, Variant};

/// Encryption information extracted from the encryption dictionary
#[derive(Debug, Clone)]
pub struct EncryptionInfo {
    /// Filter name, usually "Standard"
    pub filter: String,
    pub sub_filter: Option<String>,
    /// V entry (algorithm version)
    pub v: i64,
    /// R entry (revision), absent for non-standard handlers
    pub r: Option<i64>,
    /// Key length in bits
    pub length: Option<i64>,
    /// O entry (owner password hash)
    pub o: Vec<u8>,
    /// U entry (user password hash)
    pub u: Vec<u8>,
    /// P entry (permissions)
    pub p: Option<i64>,
    pub encrypt_metadata: bool,
    /// The full dictionary, for handlers needing more keys
    pub dictionary: Dictionary,
}

impl EncryptionInfo {
    pub fn from_dict(dict: &Dictionary) -> Result<Self> {
        let filter = dict
            .get_name("Filter")
            .and_then(|name| name.as_str())
            .ok_or_else(|| {
                PdfError::InvalidEncryptionDict("missing /Filter in encryption dictionary".to_string())
            })?
            .to_string();

        let string_entry = |key: &str| {
            dict.get(key)
                .and_then(|v| v.as_string())
                .map(|s| s.as_bytes().to_vec())
                .unwrap_or_default()
        };

        Ok(Self {
            filter,
            sub_filter: dict
                .get_name("SubFilter")
                .and_then(|n| n.as_str())
                .map(str::to_string),
            v: dict.get_number_or("V", 0),
            r: dict.get("R").and_then(Variant::as_number),
            length: dict.get("Length").and_then(Variant::as_number),
            o: string_entry("O"),
            u: string_entry("U"),
            p: dict.get("P").and_then(Variant::as_number),
            encrypt_metadata: dict
                .get("EncryptMetadata")
                .and_then(Variant::as_bool)
                .unwrap_or(true),
            dictionary: dict.clone(),
        })
    }

    /// Check if a trailer announces encryption
    pub fn detect_encryption(trailer: &Dictionary) -> bool {
        trailer.contains_key("Encrypt")
    }
}

/// Decrypts strings and streams of an encrypted document.
pub trait SecurityHandler {
    /// Try `password` (the empty string first); `document_id` is the first
    /// element of the trailer `/ID`. Returns whether it unlocked the document.
    fn authenticate(&mut self, password: &str, document_id: &[u8]) -> bool;

    /// Decrypt a string that belongs to the object `reference`.
    fn decrypt_string(&self, reference: Reference, data: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt the stream payload of the object `reference`.
    fn decrypt_stream(&self, reference: Reference, data: &[u8]) -> Result<Vec<u8>> {
        self.decrypt_string(reference, data)
    }

    /// Whether metadata streams are encrypted too.
    fn encrypts_metadata(&self) -> bool {
        true
    }
}

/// Builds a security handler for an encryption dictionary.
pub trait SecurityHandlerFactory {
    fn create(&self, info: &EncryptionInfo) -> Result<Box<dyn SecurityHandler>>;
}

impl<F> SecurityHandlerFactory for F
where
    F: Fn(&EncryptionInfo) -> Result<Box<dyn SecurityHandler>>,
{
    fn create(&self, info: &EncryptionInfo) -> Result<Box<dyn SecurityHandler>> {
        self(info)
    }
}

/// A handler bound to the object whose strings are being read.
#[derive(Clone, Copy)]
pub(crate) struct Decryptor<'a> {
    handler: &'a dyn SecurityHandler,
    reference: Reference,
}

impl<'a> Decryptor<'a> {
    pub(crate) fn new(handler: &'a dyn SecurityHandler, reference: Reference) -> Self {
        Self { handler, reference }
    }

    pub(crate) fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.handler.decrypt_string(self.reference, data)
    }
}

#[cfg(test)]
pub(crate) mod test_handler {
    use super::*;

    /// XORs every byte with a password-derived key mixed with the object
    /// number. Only `password` unlocks it.
    pub struct XorHandler {
        pub password: String,
        pub key: Option<u8>,
        pub encrypt_metadata: bool,
    }

    impl XorHandler {
        pub fn key_for(password: &str) -> u8 {
            password.bytes().fold(0x5A, |acc, b| acc ^ b)
        }

        pub fn apply(key: u8, reference: Reference, data: &[u8]) -> Vec<u8> {
            let k = key ^ (reference.object_number() as u8);
            data.iter().map(|b| b ^ k).collect()
        }
    }

    impl SecurityHandler for XorHandler {
        fn authenticate(&mut self, password: &str, _document_id: &[u8]) -> bool {
            if password == self.password {
                self.key = Some(Self::key_for(password));
                true
            } else {
                false
            }
        }

        fn decrypt_string(&self, reference: Reference, data: &[u8]) -> Result<Vec<u8>> {
            let key = self
                .key
                .ok_or_else(|| PdfError::InvalidPassword("not authenticated".to_string()))?;
            Ok(Self::apply(key, reference, data))
        }

        fn encrypts_metadata(&self) -> bool {
            self.encrypt_metadata
        }
    }
}
