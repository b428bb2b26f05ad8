//! LM/NTLM and LMv2/NTLMv2 response calculation and validation.

use hmac::{Hmac, Mac};
use md5::Md5;

use crate::error::{SMBError, SMBResult};
use crate::ntlm::blob::NtlmV2Blob;
use crate::ntlm::des::des_encrypt_block;

/// Pads a 16-byte hash to 21 bytes and DES-encrypts the 8-byte challenge
/// with each of the three derived 7-byte keys, producing the 24-byte
/// LM/NTLM response.
pub fn lm_or_ntlm_response(hash: &[u8; 16], challenge: &[u8; 8]) -> SMBResult<[u8; 24]> {
    let mut padded = [0u8; 21];
    padded[0..16].copy_from_slice(hash);

    let mut out = [0u8; 24];
    for (i, chunk_start) in (0..21).step_by(7).enumerate() {
        let mut key = [0u8; 7];
        key.copy_from_slice(&padded[chunk_start..chunk_start + 7]);
        let cipher = des_encrypt_block(&key, challenge)?;
        out[i * 8..i * 8 + 8].copy_from_slice(&cipher);
    }
    Ok(out)
}

fn hmac_md5(key: &[u8], parts: &[&[u8]]) -> SMBResult<[u8; 16]> {
    let mut mac = <Hmac<Md5>>::new_from_slice(key)
        .map_err(|_| SMBError::crypto_error("invalid HMAC-MD5 key length"))?;
    for part in parts {
        mac.update(part);
    }
    let result = mac.finalize().into_bytes();
    let mut out = [0u8; 16];
    out.copy_from_slice(&result);
    Ok(out)
}

/// LMv2 response: `HMAC-MD5(ntlmv2_hash, serverChallenge || clientChallenge) || clientChallenge`.
pub fn lm_v2_response(
    ntlmv2_hash: &[u8; 16],
    server_challenge: &[u8; 8],
    client_challenge: &[u8; 8],
) -> SMBResult<Vec<u8>> {
    let mac = hmac_md5(ntlmv2_hash, &[server_challenge, client_challenge])?;
    Ok([&mac[..], client_challenge].concat())
}

/// NTLMv2 response: `HMAC-MD5(ntlmv2_hash, serverChallenge || blob) || blob`.
pub fn ntlm_v2_response(ntlmv2_hash: &[u8; 16], server_challenge: &[u8; 8], blob: &[u8]) -> SMBResult<Vec<u8>> {
    let mac = hmac_md5(ntlmv2_hash, &[server_challenge, blob])?;
    Ok([&mac[..], blob].concat())
}

/// Builds a full NTLMv2 response (HMAC || blob) from scratch, for tests and
/// for constructing a challenge to offer a client during negotiation.
pub fn calculate_ntlm_v2_response(
    ntlmv2_hash: &[u8; 16],
    server_challenge: &[u8; 8],
    client_nonce: [u8; 8],
    timestamp: u64,
    target_info: Vec<crate::ntlm::blob::TargetInfoItem>,
) -> SMBResult<Vec<u8>> {
    let blob = NtlmV2Blob {
        timestamp,
        client_nonce,
        target_info,
        trailing: vec![],
    };
    ntlm_v2_response(ntlmv2_hash, server_challenge, &blob.to_bytes())
}

/// Constant-time byte comparison; used by every `validate*` below so a
/// timing side-channel can't leak how many leading bytes matched.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

pub fn validate_lm_response(hash: &[u8; 16], challenge: &[u8; 8], response: &[u8]) -> bool {
    if response.len() != 24 {
        return false;
    }
    match lm_or_ntlm_response(hash, challenge) {
        Ok(expected) => constant_time_eq(&expected, response),
        Err(_) => false,
    }
}

pub fn validate_ntlm_response(hash: &[u8; 16], challenge: &[u8; 8], response: &[u8]) -> bool {
    validate_lm_response(hash, challenge, response)
}

pub fn validate_lm_v2_response(
    ntlmv2_hash: &[u8; 16],
    server_challenge: &[u8; 8],
    response: &[u8],
) -> bool {
    if response.len() != 24 {
        return false;
    }
    let mut client_challenge = [0u8; 8];
    client_challenge.copy_from_slice(&response[16..24]);
    match lm_v2_response(ntlmv2_hash, server_challenge, &client_challenge) {
        Ok(expected) => constant_time_eq(&expected, response),
        Err(_) => false,
    }
}

pub fn validate_ntlm_v2_response(
    ntlmv2_hash: &[u8; 16],
    server_challenge: &[u8; 8],
    response: &[u8],
) -> bool {
    if response.len() < 16 + 36 {
        return false;
    }
    let blob = &response[16..];
    match ntlm_v2_response(ntlmv2_hash, server_challenge, blob) {
        Ok(expected) => constant_time_eq(&expected, response),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ntlm::blob::TargetInfoItem;
    use crate::ntlm::hash::{ntlm_hash, ntlm_v2_hash};

    #[test]
    fn lm_and_ntlm_response_are_24_bytes() {
        let hash = [0u8; 16];
        let challenge = [1u8; 8];
        assert_eq!(lm_or_ntlm_response(&hash, &challenge).unwrap().len(), 24);
    }

    #[test]
    fn lmv2_response_is_hmac_plus_client_challenge() {
        let ntlmv2 = [7u8; 16];
        let server_challenge = [1u8; 8];
        let client_challenge = [2u8; 8];
        let resp = lm_v2_response(&ntlmv2, &server_challenge, &client_challenge).unwrap();
        assert_eq!(resp.len(), 24);
        assert_eq!(&resp[16..24], &client_challenge);
    }

    #[test]
    fn ntlmv2_challenge_round_trip_and_bit_flip_fails() {
        let user = "User";
        let domain = "Domain";
        let password = "Password";
        let server_challenge: [u8; 8] = [0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF];
        let client_challenge: [u8; 8] = [0xFF, 0xFF, 0xFF, 0x00, 0x11, 0x22, 0x33, 0x44];

        let nt_hash = ntlm_hash(password);
        let ntlmv2 = ntlm_v2_hash(&nt_hash, user, domain).unwrap();

        let target_info = vec![TargetInfoItem {
            item_type: 2,
            value: crate::message::bytes::encode_utf16le(domain),
        }];

        let response =
            calculate_ntlm_v2_response(&ntlmv2, &server_challenge, client_challenge, 0, target_info)
                .unwrap();

        assert!(validate_ntlm_v2_response(&ntlmv2, &server_challenge, &response));

        let mut tampered = response.clone();
        tampered[0] ^= 0x01;
        assert!(!validate_ntlm_v2_response(&ntlmv2, &server_challenge, &tampered));
    }

    #[test]
    fn wrong_length_response_rejected_without_hashing() {
        let hash = [0u8; 16];
        let challenge = [0u8; 8];
        assert!(!validate_lm_response(&hash, &challenge, &[0u8; 10]));
        assert!(!validate_ntlm_v2_response(&hash, &challenge, &[0u8; 4]));
    }
}
