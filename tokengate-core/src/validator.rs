//! Token comparison and the masked-token scheme.
//!
//! A masked token is `base64url(mask || (mask XOR raw))`, where `raw` is the
//! decoded stored token and `mask` is a fresh random string of the same
//! length. Every response therefore carries a different byte string for the
//! same underlying token, which defeats compression side channels.

use crate::token::{PresentedToken, TokenEntry, random_bytes};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use subtle::ConstantTimeEq;

/// Compares presented tokens against stored entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenValidator {
    masking: bool,
}

impl TokenValidator {
    pub fn new(masking: bool) -> Self {
        Self { masking }
    }

    pub fn masking(&self) -> bool {
        self.masking
    }

    /// Check a presented token against the expected entry.
    ///
    /// Malformed presented values (bad encoding, wrong length) yield `false`.
    pub fn validate(&self, expected: &TokenEntry, presented: &PresentedToken) -> bool {
        if self.masking {
            match unmask(&presented.value) {
                Some(raw) => decode(&expected.value)
                    .map(|expected_raw| constant_time_eq(&raw, &expected_raw))
                    .unwrap_or(false),
                None => false,
            }
        } else {
            constant_time_eq(expected.value.as_bytes(), presented.value.as_bytes())
        }
    }

    /// Render an entry for embedding in a response, masked when masking is on.
    pub fn render(&self, entry: &TokenEntry) -> String {
        if self.masking {
            mask(&entry.value).unwrap_or_else(|| entry.value.clone())
        } else {
            entry.value.clone()
        }
    }
}

/// Mask an encoded token with a fresh random mask.
pub fn mask(value: &str) -> Option<String> {
    let raw = decode(value)?;
    let pad = random_bytes(raw.len());

    let mut combined = Vec::with_capacity(raw.len() * 2);
    combined.extend_from_slice(&pad);
    combined.extend(pad.iter().zip(&raw).map(|(m, r)| m ^ r));

    Some(URL_SAFE_NO_PAD.encode(combined))
}

/// Recover the raw token bytes from a masked value.
pub fn unmask(masked: &str) -> Option<Vec<u8>> {
    let combined = decode(masked)?;
    if combined.is_empty() || combined.len() % 2 != 0 {
        return None;
    }

    let (pad, hidden) = combined.split_at(combined.len() / 2);
    Some(pad.iter().zip(hidden).map(|(m, c)| m ^ c).collect())
}

fn decode(value: &str) -> Option<Vec<u8>> {
    URL_SAFE_NO_PAD.decode(value).ok()
}

/// Constant-time byte comparison. Length differences return early; the
/// length of a token is not secret.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{ActionKey, DEFAULT_TOKEN_LENGTH, TokenLocation};

    fn entry() -> TokenEntry {
        TokenEntry::generate(ActionKey::Session, DEFAULT_TOKEN_LENGTH)
    }

    fn flip_bit(value: &str, byte: usize, bit: u8) -> String {
        let mut bytes = value.as_bytes().to_vec();
        bytes[byte] ^= 1 << bit;
        String::from_utf8_lossy(&bytes).into_owned()
    }

    #[test]
    fn test_plain_token_accepted() {
        let validator = TokenValidator::new(false);
        let expected = entry();
        let presented = PresentedToken::new(expected.value.clone(), TokenLocation::Header);
        assert!(validator.validate(&expected, &presented));
    }

    #[test]
    fn test_plain_token_single_bit_flip_rejected() {
        let validator = TokenValidator::new(false);
        let expected = entry();

        for byte in [0, 7, expected.value.len() - 1] {
            for bit in 0..8 {
                let presented =
                    PresentedToken::new(flip_bit(&expected.value, byte, bit), TokenLocation::Header);
                assert!(!validator.validate(&expected, &presented));
            }
        }
    }

    #[test]
    fn test_wrong_length_rejected() {
        let validator = TokenValidator::new(false);
        let expected = entry();

        let truncated = &expected.value[..expected.value.len() - 1];
        let presented = PresentedToken::new(truncated, TokenLocation::Parameter);
        assert!(!validator.validate(&expected, &presented));

        let presented = PresentedToken::new("", TokenLocation::Parameter);
        assert!(!validator.validate(&expected, &presented));
    }

    #[test]
    fn test_masked_token_round_trip() {
        let validator = TokenValidator::new(true);
        let expected = entry();

        let masked = validator.render(&expected);
        assert_ne!(masked, expected.value);

        let presented = PresentedToken::new(masked, TokenLocation::Header);
        assert!(validator.validate(&expected, &presented));
    }

    #[test]
    fn test_masked_renditions_differ() {
        let validator = TokenValidator::new(true);
        let expected = entry();
        assert_ne!(validator.render(&expected), validator.render(&expected));
    }

    #[test]
    fn test_masked_single_bit_flip_rejected() {
        let validator = TokenValidator::new(true);
        let expected = entry();
        let masked = validator.render(&expected);

        let mut raw = URL_SAFE_NO_PAD.decode(&masked).unwrap();
        for index in [0, DEFAULT_TOKEN_LENGTH, raw.len() - 1] {
            raw[index] ^= 0x01;
            let tampered = PresentedToken::new(URL_SAFE_NO_PAD.encode(&raw), TokenLocation::Header);
            assert!(!validator.validate(&expected, &tampered));
            raw[index] ^= 0x01;
        }
    }

    #[test]
    fn test_masking_requires_masked_form() {
        let validator = TokenValidator::new(true);
        let expected = entry();

        // The bare token decodes to half the expected length.
        let presented = PresentedToken::new(expected.value.clone(), TokenLocation::Header);
        assert!(!validator.validate(&expected, &presented));
    }

    #[test]
    fn test_malformed_masked_token_rejected() {
        let validator = TokenValidator::new(true);
        let expected = entry();

        for garbage in ["!!not-base64!!", "", "YQ"] {
            let presented = PresentedToken::new(garbage, TokenLocation::Parameter);
            assert!(!validator.validate(&expected, &presented));
        }
    }

    #[test]
    fn test_unmask_recovers_raw() {
        let expected = entry();
        let masked = mask(&expected.value).unwrap();
        let raw = unmask(&masked).unwrap();
        assert_eq!(URL_SAFE_NO_PAD.encode(raw), expected.value);
    }
}
