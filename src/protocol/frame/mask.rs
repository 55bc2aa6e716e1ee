//! Frame payload masking, per [RFC 6455 §5.3](https://tools.ietf.org/html/rfc6455#section-5.3).

/// Generate a random frame mask.
#[inline]
pub fn generate_mask() -> [u8; 4] {
    rand::random()
}

/// XOR `data` in place with `mask`, cycling the 4-byte key. Masking is its own inverse, so
/// this same function both masks and unmasks a payload.
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    apply_mask_fast32(data, mask)
}

/// A safe unoptimized mask application, used as the tail handler for `apply_mask_fast32` and
/// directly for short payloads.
#[inline]
fn apply_mask_fallback(data: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= mask[i & 3];
    }
}

/// Faster version of `apply_mask()` which operates on 4-byte blocks. Both the unaligned prefix
/// and suffix are handled a byte at a time with the mask rotated to the correct phase.
#[inline]
fn apply_mask_fast32(data: &mut [u8], mask: [u8; 4]) {
    let mask_u32 = u32::from_ne_bytes(mask);
    let (prefix, words, suffix) = unsafe { data.align_to_mut::<u32>() };
    apply_mask_fallback(prefix, mask);
    let head = prefix.len() & 3;
    let mask_u32 = if head > 0 {
        if cfg!(target_endian = "big") {
            mask_u32.rotate_left(8 * head as u32)
        } else {
            mask_u32.rotate_right(8 * head as u32)
        }
    } else {
        mask_u32
    };
    for word in words.iter_mut() {
        *word ^= mask_u32;
    }
    apply_mask_fallback(suffix, mask_u32.to_ne_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masking_is_self_inverse() {
        let mask = [0x6d, 0xb6, 0xb2, 0x80];
        let original = vec![
            0xf3, 0x00, 0x01, 0x02, 0x03, 0x80, 0x81, 0x82, 0xff, 0xfe, 0x00, 0x17, 0x74, 0xf9,
            0x12, 0x03,
        ];

        for len in 0..=original.len() {
            let mut data = original[..len].to_vec();
            apply_mask(&mut data, mask);
            apply_mask(&mut data, mask);
            assert_eq!(data, original[..len]);
        }
    }

    #[test]
    fn fast_and_fallback_paths_agree_at_every_alignment() {
        let mask = [0x11, 0x22, 0x33, 0x44];
        let original: Vec<u8> = (0u8..40).collect();

        for offset in 0..=3 {
            let slice = &original[offset..];
            let mut fast = slice.to_vec();
            apply_mask_fast32(&mut fast, mask);

            let mut fallback = slice.to_vec();
            apply_mask_fallback(&mut fallback, mask);

            assert_eq!(fast, fallback, "mismatch at offset {offset}");
        }
    }
}
