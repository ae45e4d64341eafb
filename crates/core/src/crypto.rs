//! CompCryptor: the keyed CRC16 / stream cipher / compression pipeline.
//!
//! Every function here is pure and stateless — no shared state, so all of it
//! is safe to call concurrently from the receive loop and from tests without
//! synchronization.

/// Table for the CRC16 used as the two-byte datagram trailer.
///
/// Standard CRC-16/CCITT-FALSE (poly `0x1021`), computed once at first use.
fn crc16_table() -> &'static [u16; 256] {
    static TABLE: std::sync::OnceLock<[u16; 256]> = std::sync::OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0u16; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = (i as u16) << 8;
            let mut bit = 0;
            while bit < 8 {
                crc = if crc & 0x8000 != 0 {
                    (crc << 1) ^ 0x1021
                } else {
                    crc << 1
                };
                bit += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    })
}

/// Compute the keyed CRC16 trailer over `buf`.
///
/// The session's 32-bit `encryptKey` folds into the initial register value
/// so that two peers with different keys never accept each other's
/// datagrams even if the plaintext happens to collide.
pub fn crc16(buf: &[u8], key: u32) -> u16 {
    let table = crc16_table();
    let mut crc: u16 = ((key ^ (key >> 16)) as u16) ^ 0xFFFF;
    for &byte in buf {
        let idx = ((crc >> 8) as u8 ^ byte) as usize;
        crc = (crc << 8) ^ table[idx];
    }
    crc
}

/// Check a two-byte trailer against the CRC of the preceding bytes.
///
/// `trailer` is `[high, low]` as laid out on the wire (spec.md §4.G): the
/// high byte of the CRC first, then the low byte.
pub fn crc16_matches(buf: &[u8], key: u32, trailer: [u8; 2]) -> bool {
    let crc = crc16(buf, key);
    trailer[1] == (crc & 0xff) as u8 && trailer[0] == ((crc >> 8) & 0xff) as u8
}

/// XOR-style stream cipher keyed by the session's `encryptKey`.
///
/// Self-inverse: calling this twice with the same key restores the
/// original bytes, so `encrypt_in_place` and `decrypt_in_place` are the
/// same operation under two names for readability at call sites.
pub fn decrypt_in_place(buf: &mut [u8], key: u32) {
    xor_stream(buf, key)
}

/// See [`decrypt_in_place`] — identical operation, named for the encode path.
pub fn encrypt_in_place(buf: &mut [u8], key: u32) {
    xor_stream(buf, key)
}

fn xor_stream(buf: &mut [u8], key: u32) {
    let key_bytes = key.to_be_bytes();
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte ^= key_bytes[i % 4] ^ (i as u8);
    }
}

/// Attempt to decompress `src` into `dst`.
///
/// Returns the decompressed length on success. Returns `0` if `src` is not
/// valid compressed input, or if the decompressed size would overflow
/// `dst`'s capacity — both are treated identically by callers: fall back
/// to delivering the original, undecompressed payload.
pub fn decompress(src: &[u8], dst: &mut [u8]) -> usize {
    use std::io::Read;

    let mut decoder = flate2::read::ZlibDecoder::new(src);
    let mut out = Vec::with_capacity(dst.len());
    match decoder.read_to_end(&mut out) {
        Ok(_) if out.len() <= dst.len() && !out.is_empty() => {
            dst[..out.len()].copy_from_slice(&out);
            out.len()
        }
        _ => 0,
    }
}

/// Compress `src`, used by tests (and by any future send-side collaborator)
/// to exercise the round-trip law against [`decompress`].
pub fn compress(src: &[u8]) -> Vec<u8> {
    use std::io::Write;

    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(src).expect("in-memory writer never fails");
    encoder.finish().expect("in-memory writer never fails")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decrypt_undoes_encrypt() {
        let original = b"SWG session payload".to_vec();
        let mut buf = original.clone();
        encrypt_in_place(&mut buf, 0xDEADBEEF);
        assert_ne!(buf, original);
        decrypt_in_place(&mut buf, 0xDEADBEEF);
        assert_eq!(buf, original);
    }

    #[test]
    fn crc_is_deterministic_and_key_sensitive() {
        let buf = b"some ciphertext bytes";
        let crc_a = crc16(buf, 1);
        let crc_b = crc16(buf, 1);
        let crc_c = crc16(buf, 2);
        assert_eq!(crc_a, crc_b);
        assert_ne!(crc_a, crc_c);
    }

    #[test]
    fn crc16_matches_round_trip() {
        let buf = b"payload-bytes";
        let key = 0x1234_5678;
        let crc = crc16(buf, key);
        let trailer = [((crc >> 8) & 0xff) as u8, (crc & 0xff) as u8];
        assert!(crc16_matches(buf, key, trailer));
        assert!(!crc16_matches(buf, key, [trailer[0], trailer[1] ^ 0x01]));
    }

    #[test]
    fn decompress_round_trips_through_compress() {
        let original = b"the quick brown fox jumps over the lazy dog".repeat(4);
        let compressed = compress(&original);
        let mut dst = vec![0u8; original.len()];
        let n = decompress(&compressed, &mut dst);
        assert_eq!(n, original.len());
        assert_eq!(&dst[..n], &original[..]);
    }

    #[test]
    fn decompress_signals_zero_on_garbage_input() {
        let mut dst = vec![0u8; 64];
        assert_eq!(decompress(b"not compressed data", &mut dst), 0);
    }

    #[test]
    fn decompress_signals_zero_on_overflow() {
        let original = b"x".repeat(100);
        let compressed = compress(&original);
        let mut dst = vec![0u8; 10];
        assert_eq!(decompress(&compressed, &mut dst), 0);
    }
}
