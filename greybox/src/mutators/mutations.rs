//! The single-byte mutations the havoc stage stacks on top of each other.

use crate::{inputs::BytesInput, mutators::MutationResult, rands::Rand, Error};

/// Byte values worth trying: the boundaries, and the letters of the crash pattern.
pub const INTERESTING_BYTES: [u8; 8] = [0, 1, 255, b'c', b'r', b'a', b's', b'h'];

/// Smallest byte inserted by [`bytes_insert_delete_mutation`]
pub const PRINTABLE_MIN: u8 = 32;
/// Largest byte inserted by [`bytes_insert_delete_mutation`]
pub const PRINTABLE_MAX: u8 = 126;

/// The generic function type that identifies mutations
pub type MutationFunction<R> = fn(&mut R, &mut BytesInput, usize) -> Result<MutationResult, Error>;

/// Flips one random bit of one random byte
pub fn bit_flip_mutation<R>(
    rand: &mut R,
    input: &mut BytesInput,
    _max_size: usize,
) -> Result<MutationResult, Error>
where
    R: Rand,
{
    if input.is_empty() {
        return Ok(MutationResult::Skipped);
    }
    let idx = rand.index(input.len());
    let bit = rand.index(8) as u8;
    input.bytes_mut()[idx] ^= 1 << bit;
    Ok(MutationResult::Mutated)
}

/// Adds or subtracts one, wrapping, on one random byte
pub fn byte_arith_mutation<R>(
    rand: &mut R,
    input: &mut BytesInput,
    _max_size: usize,
) -> Result<MutationResult, Error>
where
    R: Rand,
{
    if input.is_empty() {
        return Ok(MutationResult::Skipped);
    }
    let idx = rand.index(input.len());
    let byte = &mut input.bytes_mut()[idx];
    *byte = if rand.chance(0.5) {
        byte.wrapping_add(1)
    } else {
        byte.wrapping_sub(1)
    };
    Ok(MutationResult::Mutated)
}

/// Inserts a printable byte at a random position, or deletes the byte there.
///
/// Deleting never empties the input, and inserting never grows it past `max_size`.
pub fn bytes_insert_delete_mutation<R>(
    rand: &mut R,
    input: &mut BytesInput,
    max_size: usize,
) -> Result<MutationResult, Error>
where
    R: Rand,
{
    if input.is_empty() {
        return Ok(MutationResult::Skipped);
    }
    let idx = rand.index(input.len());
    if rand.chance(0.5) {
        if input.len() >= max_size {
            return Ok(MutationResult::Skipped);
        }
        let byte = rand.in_range(u64::from(PRINTABLE_MIN)..=u64::from(PRINTABLE_MAX)) as u8;
        input.bytes_mut().insert(idx, byte);
        Ok(MutationResult::Mutated)
    } else if input.len() > 1 {
        input.bytes_mut().remove(idx);
        Ok(MutationResult::Mutated)
    } else {
        Ok(MutationResult::Skipped)
    }
}

/// Overwrites one random byte with one of the [`INTERESTING_BYTES`]
pub fn byte_interesting_mutation<R>(
    rand: &mut R,
    input: &mut BytesInput,
    _max_size: usize,
) -> Result<MutationResult, Error>
where
    R: Rand,
{
    if input.is_empty() {
        return Ok(MutationResult::Skipped);
    }
    let idx = rand.index(input.len());
    input.bytes_mut()[idx] = INTERESTING_BYTES[rand.index(INTERESTING_BYTES.len())];
    Ok(MutationResult::Mutated)
}
