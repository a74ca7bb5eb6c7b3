//! Register value decoding.

/// Decode a 32-bit float spread over two registers.
///
/// The meter sends the most significant word first. The words are swapped
/// and the pair is then assembled low word first, which restores the
/// big-endian IEEE 754 image. Returns `None` unless exactly two words are
/// given.
pub fn decode_float(words: &[u16]) -> Option<f32> {
    let [high, low] = words else {
        return None;
    };
    let swapped = [*low, *high];
    let bits = u32::from(swapped[0]) | (u32::from(swapped[1]) << 16);
    Some(f32::from_bits(bits))
}

/// A BCD number spread over several registers, most significant register
/// first, four digits per register.
///
/// Returns `None` when the number does not fit in a `u64`.
pub fn bcd_to_num(words: &[u16]) -> Option<u64> {
    words.iter().try_fold(0u64, |acc, word| {
        (0..4).rev().try_fold(acc, |acc, nibble| {
            acc.checked_mul(10)?
                .checked_add(u64::from((word >> (nibble * 4)) & 0x0F))
        })
    })
}
