//! Component C: NTLM/NTLMv2 challenge-response authentication primitives.

pub mod blob;
pub mod des;
pub mod hash;
pub mod response;

use rand::RngCore;

/// Generates a fresh 8-byte server challenge from a cryptographic RNG.
/// Call this once per connection; reusing a challenge across connections
/// would let an attacker replay a captured response.
pub fn generate_server_challenge() -> [u8; 8] {
    let mut challenge = [0u8; 8];
    rand::rngs::OsRng.fill_bytes(&mut challenge);
    challenge
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenges_are_not_trivially_constant() {
        let a = generate_server_challenge();
        let b = generate_server_challenge();
        // Not a strict crypto guarantee, but a zero/constant RNG would fail
        // this essentially always.
        assert_ne!(a, b);
    }
}
