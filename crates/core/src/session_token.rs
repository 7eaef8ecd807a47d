//! Session token generation.
//!
//! A session token is the bearer secret carried in the session cookie. It is
//! distinct from the session's row id and is never logged.

use rand::Rng;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Number of random bytes in a session token (256 bits of entropy).
pub const TOKEN_BYTES: usize = 32;

/// Length of the hex-encoded token string.
pub const TOKEN_LENGTH: usize = TOKEN_BYTES * 2;

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Generate a new session token.
///
/// Draws [`TOKEN_BYTES`] from the thread-local CSPRNG (ChaCha, seeded and
/// periodically reseeded from the OS) and returns them as lowercase hex.
/// Uniqueness is a property of the entropy width; no lookup is performed.
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill(&mut bytes[..]);
    hex::encode(bytes)
}

mod hex {
    /// Encode bytes as a lowercase hex string.
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn token_has_fixed_hex_length() {
        let token = generate_session_token();
        assert_eq!(token.len(), TOKEN_LENGTH);
        assert!(
            token.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()),
            "token should be lowercase hex"
        );
    }

    #[test]
    fn tokens_do_not_repeat() {
        let tokens: HashSet<String> = (0..1_000).map(|_| generate_session_token()).collect();
        assert_eq!(tokens.len(), 1_000);
    }

    #[test]
    fn hex_encoding_pads_each_byte() {
        assert_eq!(hex::encode([0x00, 0x0f, 0xa0, 0xff]), "000fa0ff");
    }
}
