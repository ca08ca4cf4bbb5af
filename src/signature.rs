//! Byte signatures for native functions
//!
//! Signatures use the common IDA text form: hex bytes separated by spaces,
//! `?` or `??` for wildcards, e.g. `"48 89 5C 24 ?? 57 48 83 EC 20"`.

use crate::platform::Platform;
use crate::{Error, Result};

/// Signatures of the functions this crate hooks
pub mod sigs {
    /// `MaterialResourceHandle::LoadTextures`
    pub const LOAD_MTRL_TEX: &str = "4C 8B DC 49 89 5B ?? 49 89 73 ?? 55 57 41 55 49 8D AB";
}

/// A parsed signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pattern: Vec<u8>,
    mask: String,
}

impl Signature {
    /// Parse a signature from its text form
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidSignature {
            signature: text.to_string(),
            reason,
        };

        let mut pattern = Vec::new();
        let mut mask = String::new();

        for token in text.split_whitespace() {
            if token == "?" || token == "??" {
                pattern.push(0);
                mask.push('?');
                continue;
            }

            if token.len() != 2 {
                return Err(invalid(format!("token \"{}\" is not a byte", token)));
            }
            let byte = u8::from_str_radix(token, 16)
                .map_err(|_| invalid(format!("token \"{}\" is not hex", token)))?;
            pattern.push(byte);
            mask.push('x');
        }

        if pattern.is_empty() {
            return Err(invalid("empty signature".to_string()));
        }
        if !mask.contains('x') {
            return Err(invalid("signature is all wildcards".to_string()));
        }

        Ok(Self { pattern, mask })
    }

    /// The byte pattern; wildcard positions are zero
    pub fn pattern(&self) -> &[u8] {
        &self.pattern
    }

    /// The mask, `x` for fixed bytes and `?` for wildcards
    pub fn mask(&self) -> &str {
        &self.mask
    }

    /// Find the address of the first match inside the game's main module
    pub fn resolve<P: Platform>(&self, platform: &P, name: &str) -> Result<usize> {
        let module = platform.main_module()?;

        match platform.scan_module(&module, &self.pattern, &self.mask)? {
            Some(found) => {
                tracing::debug!(
                    "Resolved {} at {}+0x{:X}",
                    name,
                    module.name,
                    found.offset
                );
                Ok(found.address)
            }
            None => Err(Error::SignatureNotFound {
                name: name.to_string(),
                module: module.name,
            }),
        }
    }
}

impl std::str::FromStr for Signature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
