//! The havoc mutator stacks a random number of weighted mutations.

use crate::{
    inputs::BytesInput,
    mutators::{
        bit_flip_mutation, byte_arith_mutation, byte_interesting_mutation,
        bytes_insert_delete_mutation, token_insert_mutation, token_replace_mutation,
        MutationResult, Mutator, Tokens,
    },
    rands::Rand,
    Error,
};

/// Default for the most mutations stacked onto one input
pub const DEFAULT_MAX_STACK: u64 = 8;

/// Default upper bound of the input length
pub const DEFAULT_MAX_SIZE: usize = 1024;

/// What an empty input is replaced with before it gets mutated
pub const EMPTY_REPLACEMENT: &[u8] = b"a";

/// The kinds of mutations the [`HavocMutator`] picks from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MutationType {
    /// [`bit_flip_mutation`]
    BitFlip,
    /// [`byte_arith_mutation`]
    ByteArith,
    /// [`bytes_insert_delete_mutation`]
    InsertDelete,
    /// [`byte_interesting_mutation`]
    ByteInteresting,
    /// [`token_insert_mutation`] or [`token_replace_mutation`]
    Token,
}

/// Picks a [`MutationType`] by weight: bit flip 0.3, arithmetic 0.3, insert/delete 0.2 and
/// interesting values 0.2. With a dictionary, half of the interesting slot goes to tokens.
#[must_use]
pub fn pick_mutation(choice: f64, has_tokens: bool) -> MutationType {
    if choice < 0.3 {
        MutationType::BitFlip
    } else if choice < 0.6 {
        MutationType::ByteArith
    } else if choice < 0.8 {
        MutationType::InsertDelete
    } else if has_tokens && choice >= 0.9 {
        MutationType::Token
    } else {
        MutationType::ByteInteresting
    }
}

/// Applies between 1 and `max_stack` mutations to an input
#[derive(Debug, Clone)]
pub struct HavocMutator {
    tokens: Tokens,
    max_stack: u64,
    max_size: usize,
}

impl Default for HavocMutator {
    fn default() -> Self {
        Self::new(Tokens::default())
    }
}

impl HavocMutator {
    /// Creates a new [`HavocMutator`] using the given dictionary
    #[must_use]
    pub fn new(tokens: Tokens) -> Self {
        Self {
            tokens,
            max_stack: DEFAULT_MAX_STACK,
            max_size: DEFAULT_MAX_SIZE,
        }
    }

    /// Sets the upper bound of stacked mutations
    #[must_use]
    pub fn with_max_stack(mut self, max_stack: u64) -> Self {
        self.max_stack = max_stack.max(1);
        self
    }

    /// Sets the maximum input length
    #[must_use]
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size.max(1);
        self
    }

    /// The dictionary in use
    #[must_use]
    pub fn tokens(&self) -> &Tokens {
        &self.tokens
    }

    fn apply<R>(
        &self,
        kind: MutationType,
        rand: &mut R,
        input: &mut BytesInput,
    ) -> Result<MutationResult, Error>
    where
        R: Rand,
    {
        match kind {
            MutationType::BitFlip => bit_flip_mutation(rand, input, self.max_size),
            MutationType::ByteArith => byte_arith_mutation(rand, input, self.max_size),
            MutationType::InsertDelete => bytes_insert_delete_mutation(rand, input, self.max_size),
            MutationType::ByteInteresting => byte_interesting_mutation(rand, input, self.max_size),
            MutationType::Token => {
                if rand.chance(0.5) {
                    token_insert_mutation(rand, input, &self.tokens, self.max_size)
                } else {
                    token_replace_mutation(rand, input, &self.tokens)
                }
            }
        }
    }
}

impl<R> Mutator<R> for HavocMutator
where
    R: Rand,
{
    fn mutate(&mut self, rand: &mut R, input: &mut BytesInput) -> Result<MutationResult, Error> {
        let mut result = MutationResult::Skipped;
        if input.is_empty() {
            *input.bytes_mut() = EMPTY_REPLACEMENT.to_vec();
            result = MutationResult::Mutated;
        }

        let stack = rand.in_range(1..=self.max_stack);
        for _ in 0..stack {
            let kind = pick_mutation(rand.unit(), !self.tokens.is_empty());
            if self.apply(kind, rand, input)? == MutationResult::Mutated {
                result = MutationResult::Mutated;
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        inputs::BytesInput,
        mutators::{pick_mutation, HavocMutator, MutationResult, MutationType, Mutator, Tokens},
        rands::StdRand,
    };

    #[test]
    fn test_pick_mutation_weights() {
        assert_eq!(pick_mutation(0.0, false), MutationType::BitFlip);
        assert_eq!(pick_mutation(0.29, false), MutationType::BitFlip);
        assert_eq!(pick_mutation(0.3, false), MutationType::ByteArith);
        assert_eq!(pick_mutation(0.6, false), MutationType::InsertDelete);
        assert_eq!(pick_mutation(0.8, false), MutationType::ByteInteresting);
        assert_eq!(pick_mutation(0.95, false), MutationType::ByteInteresting);
        assert_eq!(pick_mutation(0.85, true), MutationType::ByteInteresting);
        assert_eq!(pick_mutation(0.95, true), MutationType::Token);
    }

    #[test]
    fn test_empty_input_is_replaced() {
        let mut rand = StdRand::with_seed(42);
        let mut mutator = HavocMutator::default();
        let mut input = BytesInput::default();
        assert_eq!(
            mutator.mutate(&mut rand, &mut input).unwrap(),
            MutationResult::Mutated
        );
        assert!(!input.is_empty());
    }

    #[test]
    fn test_havoc_respects_max_size() {
        let mut rand = StdRand::with_seed(1337);
        let mut mutator = HavocMutator::new(Tokens::new(vec![b"crash".to_vec()])).with_max_size(16);
        let mut input = BytesInput::new(b"seed".to_vec());
        for _ in 0..1000 {
            mutator.mutate(&mut rand, &mut input).unwrap();
            assert!(!input.is_empty());
            assert!(input.len() <= 16);
        }
    }

    #[test]
    fn test_havoc_mutates() {
        let mut rand = StdRand::with_seed(7);
        let mut mutator = HavocMutator::default();
        let seed = BytesInput::new(b"hello".to_vec());
        let changed = (0..100)
            .filter(|_| {
                let mut input = seed.clone();
                mutator.mutate(&mut rand, &mut input).unwrap();
                input != seed
            })
            .count();
        assert!(changed > 50);
    }
}
