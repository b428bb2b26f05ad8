//! DES key expansion and ECB encryption used by the LM/NTLM response
//! functions.

use des::cipher::{BlockEncrypt, KeyInit};
use des::Des;

use crate::error::{SMBError, SMBResult};

/// Expands a 7-byte (56-bit) key into the 8-byte key DES expects, spreading
/// the bitstream across the output bytes and leaving the low bit of each
/// byte as the (unchecked) parity slot. Bit-for-bit match to the MS-NLMP /
/// jCIFS reference algorithm; do not "simplify" this without new test
/// vectors.
pub fn expand_key(key7: &[u8; 7]) -> [u8; 8] {
    let mut out = [0u8; 8];
    out[0] = key7[0] >> 1;
    out[1] = ((key7[0] & 0x01) << 6) | (key7[1] >> 2);
    out[2] = ((key7[1] & 0x03) << 5) | (key7[2] >> 3);
    out[3] = ((key7[2] & 0x07) << 4) | (key7[3] >> 4);
    out[4] = ((key7[3] & 0x0F) << 3) | (key7[4] >> 5);
    out[5] = ((key7[4] & 0x1F) << 2) | (key7[5] >> 6);
    out[6] = ((key7[5] & 0x3F) << 1) | (key7[6] >> 7);
    out[7] = key7[6] & 0x7F;
    for byte in &mut out {
        *byte <<= 1;
    }
    out
}

/// Encrypts a single 8-byte block with a 7-byte key expanded to 8 bytes.
pub fn des_encrypt_block(key7: &[u8; 7], plaintext: &[u8; 8]) -> SMBResult<[u8; 8]> {
    let key = expand_key(key7);
    let cipher = Des::new_from_slice(&key).map_err(|_| SMBError::crypto_error("invalid DES key length"))?;
    let mut block = [0u8; 8];
    cipher.encrypt_block_b2b(plaintext.into(), (&mut block).into());
    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kgs_constant_with_zero_key_is_deterministic() {
        let key = [0u8; 7];
        let ct = des_encrypt_block(&key, b"KGS!@#$%").unwrap();
        // Just assert determinism; the real LM-hash vector is exercised in
        // ntlm::hash's known-vector test.
        let ct2 = des_encrypt_block(&key, b"KGS!@#$%").unwrap();
        assert_eq!(ct, ct2);
    }
}
