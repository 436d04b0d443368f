/*!
Bit layout of a descriptor.

Bit `i` lives in word `i / 64` at bit position `i % 64`, counted from the least significant bit.
Read as little endian bytes this puts bit `i` in byte `i / 8` at position `i % 8`.
*/

pub const DESCRIPTOR_BITS: usize = 512;
pub const DESCRIPTOR_WORDS: usize = DESCRIPTOR_BITS / 64;

pub type Descriptor = [u64; DESCRIPTOR_WORDS];

#[inline]
pub fn set_bit(descriptor: &mut Descriptor, index: usize, value: bool) {
    let mask = 1u64 << (index % 64);
    if value {
        descriptor[index / 64] |= mask;
    } else {
        descriptor[index / 64] &= !mask;
    }
}

#[inline]
pub fn bit(descriptor: &Descriptor, index: usize) -> bool {
    descriptor[index / 64] & (1u64 << (index % 64)) != 0
}

/// Packs bit outcomes in order, anything past the last outcome stays zero.
///
/// Panics if more than [`DESCRIPTOR_BITS`] outcomes are given.
pub fn pack<I: IntoIterator<Item = bool>>(bits: I) -> Descriptor {
    let mut descriptor = [0u64; DESCRIPTOR_WORDS];
    for (i, b) in bits.into_iter().enumerate() {
        assert!(i < DESCRIPTOR_BITS, "more than {DESCRIPTOR_BITS} bits");
        set_bit(&mut descriptor, i, b);
    }
    descriptor
}

/// ORs in `lanes` outcomes from a movemask, lane `j` becoming bit `first_bit + j`.
///
/// `first_bit` must be a multiple of `lanes`, and `lanes` must divide 64, so the group never
/// straddles two words.
#[inline]
pub fn merge_lanes(descriptor: &mut Descriptor, first_bit: usize, mask: u32, lanes: u32) {
    debug_assert!(64 % lanes == 0 && first_bit % lanes as usize == 0);
    let mask = mask as u64 & ((1u64 << lanes) - 1);
    descriptor[first_bit / 64] |= mask << (first_bit % 64);
}
