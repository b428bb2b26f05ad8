//! LM / NTLM / NTLMv2 hash construction.

use digest::Digest;
use hmac::{Hmac, Mac};
use md4::Md4;
use md5::Md5;

use crate::error::{SMBError, SMBResult};
use crate::message::bytes::encode_utf16le;
use crate::ntlm::des::des_encrypt_block;

const LM_MAGIC: &[u8; 8] = b"KGS!@#$%";

/// LM hash: uppercase the ASCII password, pad/truncate to 14 bytes, split
/// into two 7-byte DES keys, each encrypts the constant `KGS!@#$%`.
pub fn lm_hash(password: &str) -> SMBResult<[u8; 16]> {
    let mut padded = [0u8; 14];
    let upper = password.to_uppercase();
    let bytes = upper.as_bytes();
    let n = bytes.len().min(14);
    padded[..n].copy_from_slice(&bytes[..n]);

    let mut half1 = [0u8; 7];
    let mut half2 = [0u8; 7];
    half1.copy_from_slice(&padded[0..7]);
    half2.copy_from_slice(&padded[7..14]);

    let c1 = des_encrypt_block(&half1, LM_MAGIC)?;
    let c2 = des_encrypt_block(&half2, LM_MAGIC)?;

    let mut out = [0u8; 16];
    out[0..8].copy_from_slice(&c1);
    out[8..16].copy_from_slice(&c2);
    Ok(out)
}

/// NTLM hash: MD4 over the UTF-16LE encoding of the password.
pub fn ntlm_hash(password: &str) -> [u8; 16] {
    let utf16 = encode_utf16le(password);
    let digest = Md4::digest(&utf16);
    let mut out = [0u8; 16];
    out.copy_from_slice(&digest);
    out
}

/// NTLMv2 hash: HMAC-MD5(key=NTLM-hash, UPPER(user) || UPPER(domain)) both
/// encoded UTF-16LE.
pub fn ntlm_v2_hash(ntlm_hash: &[u8; 16], user: &str, domain: &str) -> SMBResult<[u8; 16]> {
    let mut mac = <Hmac<Md5>>::new_from_slice(ntlm_hash)
        .map_err(|_| SMBError::crypto_error("invalid HMAC-MD5 key length"))?;
    let identity = encode_utf16le(&(user.to_uppercase() + domain));
    mac.update(&identity);
    let result = mac.finalize().into_bytes();
    let mut out = [0u8; 16];
    out.copy_from_slice(&result);
    Ok(out)
}
