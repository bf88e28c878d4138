//! Mutators mutate input during fuzzing.

pub mod havoc;
pub use havoc::*;
pub mod mutations;
pub use mutations::*;
pub mod token_mutations;
pub use token_mutations::*;

use crate::{inputs::BytesInput, rands::Rand, Error};

/// The result of a mutation.
/// If the mutation got skipped, the fuzzer does not run the target with the input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MutationResult {
    /// The [`Mutator`] mutated this input.
    Mutated,
    /// The [`Mutator`] did not mutate this input. It was `Skipped`.
    Skipped,
}

/// A mutator takes input, and mutates it.
pub trait Mutator<R>
where
    R: Rand,
{
    /// Mutate a given input
    fn mutate(&mut self, rand: &mut R, input: &mut BytesInput) -> Result<MutationResult, Error>;
}
