//! Binary codec utilities (component A): little-endian integer readers,
//! UTF-16LE string extraction, 2-byte alignment padding, and SMB-time
//! conversion.

/// 100ns ticks between the SMB epoch (1601-01-01) and the Unix epoch
/// (1970-01-01).
const SMB_EPOCH_OFFSET_100NS: i64 = 116_444_736_000_000_000;

pub fn read_u16_le(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

pub fn read_u32_le(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

pub fn read_u64_le(buf: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

pub fn write_u16_le(value: u16) -> [u8; 2] {
    value.to_le_bytes()
}

pub fn write_u32_le(value: u32) -> [u8; 4] {
    value.to_le_bytes()
}

pub fn write_u64_le(value: u64) -> [u8; 8] {
    value.to_le_bytes()
}

/// Reads a null-terminated UTF-16LE string starting at `offset`, returning
/// the raw bytes (excluding the two-byte terminator) and the number of
/// bytes consumed including the terminator.
pub fn extract_unicode_string(buf: &[u8], offset: usize) -> (Vec<u8>, usize) {
    let mut end = offset;
    while end + 1 < buf.len() && !(buf[end] == 0 && buf[end + 1] == 0) {
        end += 2;
    }
    (buf[offset..end].to_vec(), (end - offset) + 2)
}

pub fn decode_utf16le(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

pub fn encode_utf16le(s: &str) -> Vec<u8> {
    s.encode_utf16()
        .flat_map(|unit| unit.to_le_bytes())
        .collect()
}

/// Bytes needed to advance `absolute_offset` to the next `alignment`
/// boundary.
pub fn pad_to_align(absolute_offset: usize, alignment: usize) -> usize {
    let rem = absolute_offset % alignment;
    if rem == 0 {
        0
    } else {
        alignment - rem
    }
}

/// Converts epoch milliseconds to SMB time: 100ns ticks since 1601-01-01 UTC.
pub fn system_to_smb_time(epoch_ms: i64) -> u64 {
    let ticks_100ns = epoch_ms * 10_000;
    (ticks_100ns + SMB_EPOCH_OFFSET_100NS) as u64
}

/// Converts SMB time (100ns ticks since 1601-01-01 UTC) to epoch milliseconds.
pub fn smb_to_system_time(smb_ticks: u64) -> i64 {
    (smb_ticks as i64 - SMB_EPOCH_OFFSET_100NS) / 10_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smb_time_round_trips_for_any_ms() {
        for ms in [0_i64, 1, -1, 1_690_000_000_000, i64::from(i32::MAX)] {
            let ticks = system_to_smb_time(ms);
            assert_eq!(smb_to_system_time(ticks), ms, "round-trip failed for {ms}");
        }
    }

    #[test]
    fn extracts_unicode_string_up_to_terminator() {
        let bytes = encode_utf16le("hi");
        let mut buf = bytes.clone();
        buf.extend_from_slice(&[0, 0]);
        buf.extend_from_slice(b"junk");
        let (extracted, consumed) = extract_unicode_string(&buf, 0);
        assert_eq!(extracted, bytes);
        assert_eq!(consumed, bytes.len() + 2);
        assert_eq!(decode_utf16le(&extracted), "hi");
    }

    #[test]
    fn pad_to_align_returns_distance_to_boundary() {
        assert_eq!(pad_to_align(4, 2), 0);
        assert_eq!(pad_to_align(5, 2), 1);
        assert_eq!(pad_to_align(0, 2), 0);
    }

    #[test]
    fn le_readers_and_writers_round_trip() {
        let buf = write_u32_le(0xDEAD_BEEF);
        assert_eq!(read_u32_le(&buf, 0), 0xDEAD_BEEF);
        let buf = write_u16_le(0xBEEF);
        assert_eq!(read_u16_le(&buf, 0), 0xBEEF);
        let buf = write_u64_le(0x0123_4567_89AB_CDEF);
        assert_eq!(read_u64_le(&buf, 0), 0x0123_4567_89AB_CDEF);
    }
}
