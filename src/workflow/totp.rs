//! RFC 6238 time-based one-time passwords, used to complete the shift
//! site's login challenge.

use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

const CODE_DIGITS: u32 = 6;
const STEP_SECONDS: u64 = 30;

/// Generate the current 6-digit TOTP code for a base32-encoded shared
/// secret, per RFC 6238 with the standard 30-second step and SHA-1 MAC.
pub fn generate(secret_base32: &str, unix_time: u64) -> Result<String, TotpError> {
    let secret = base32::decode(base32::Alphabet::Rfc4648 { padding: false }, secret_base32)
        .ok_or(TotpError::InvalidSecret)?;

    let counter = unix_time / STEP_SECONDS;
    let counter_bytes = counter.to_be_bytes();

    let mut mac = HmacSha1::new_from_slice(&secret).map_err(|_| TotpError::InvalidSecret)?;
    mac.update(&counter_bytes);
    let hash = mac.finalize().into_bytes();

    let offset = (hash[hash.len() - 1] & 0x0f) as usize;
    let truncated = ((u32::from(hash[offset]) & 0x7f) << 24)
        | (u32::from(hash[offset + 1]) << 16)
        | (u32::from(hash[offset + 2]) << 8)
        | u32::from(hash[offset + 3]);

    let code = truncated % 10u32.pow(CODE_DIGITS);
    Ok(format!("{code:0width$}", width = CODE_DIGITS as usize))
}

#[derive(Debug, thiserror::Error)]
pub enum TotpError {
    #[error("invalid base32 TOTP secret")]
    InvalidSecret,
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 6238 Appendix B test vector (SHA-1, 8-char secret "12345678901234567890"
    // base32-encoded), truncated to 6 digits as this implementation does.
    #[test]
    fn matches_rfc6238_reference_vector() {
        let secret = base32::encode(
            base32::Alphabet::Rfc4648 { padding: false },
            b"12345678901234567890",
        );
        let code = generate(&secret, 59).unwrap();
        assert_eq!(code, "287082");
    }

    #[test]
    fn code_is_always_six_digits() {
        let secret = base32::encode(base32::Alphabet::Rfc4648 { padding: false }, b"shortsecret");
        let code = generate(&secret, 0).unwrap();
        assert_eq!(code.len(), 6);
    }

    #[test]
    fn rejects_invalid_base32() {
        assert!(generate("not-valid-base32!!", 0).is_err());
    }
}
