//! Alignment helpers.
//!
//! Both chunk formats pad to power-of-two boundaries: the decoder skips to
//! the next 16-byte boundary after every chunk, the encoder pads to 128.

/// Round `value` up to the next multiple of `alignment`.
///
/// `alignment` must be a power of two.
///
/// ```
/// use kunai_common::align::align_up;
///
/// assert_eq!(align_up(0, 16), 0);
/// assert_eq!(align_up(1, 16), 16);
/// assert_eq!(align_up(132, 16), 144);
/// assert_eq!(align_up(128, 128), 128);
/// ```
#[inline]
pub const fn align_up(value: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

/// Zero-pad `buffer` until its length is a multiple of `alignment`.
pub fn pad_to(buffer: &mut Vec<u8>, alignment: usize) {
    let target = align_up(buffer.len(), alignment);
    buffer.resize(target, 0);
}
