//! Tokens are what AFL calls extras or dictionaries.
//! They may be inserted or written over the input during fuzzing.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use crate::{inputs::BytesInput, mutators::MutationResult, rands::Rand, Error};

/// A dictionary of byte strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tokens {
    token_vec: Vec<Vec<u8>>,
}

impl Tokens {
    /// Creates a new token list from the given tokens
    #[must_use]
    pub fn new(tokens: Vec<Vec<u8>>) -> Self {
        let mut ret = Self::default();
        for token in &tokens {
            ret.add_token(token);
        }
        ret
    }

    /// Reads a tokens file and creates a new token list
    pub fn from_file<P>(file: P) -> Result<Self, Error>
    where
        P: AsRef<Path>,
    {
        let mut ret = Self::default();
        ret.add_from_file(file)?;
        Ok(ret)
    }

    /// Adds a token, skipping empty ones and duplicates.
    /// Returns `false` if the token did not get added.
    pub fn add_token(&mut self, token: &[u8]) -> bool {
        if token.is_empty() || self.token_vec.iter().any(|t| t == token) {
            return false;
        }
        self.token_vec.push(token.to_vec());
        true
    }

    /// Reads an AFL-style dictionary file, returning the count of new entries read.
    ///
    /// Each non-empty, non-comment line holds one `"quoted"` token, optionally prefixed by
    /// `name=`. Escapes `\\`, `\"` and `\xNN` are decoded.
    pub fn add_from_file<P>(&mut self, file: P) -> Result<usize, Error>
    where
        P: AsRef<Path>,
    {
        let mut entries = 0;
        let reader = BufReader::new(File::open(file)?);

        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some(pos_quote) = line.find('"') else {
                return Err(Error::config(format!("Illegal line: {line}")));
            };
            if !line.ends_with('"') || pos_quote == line.len() - 1 {
                return Err(Error::config(format!("Illegal line: {line}")));
            }
            let item = &line[pos_quote + 1..line.len() - 1];
            let token = str_decode(item).map_err(|_| {
                Error::config(format!("Illegal line (hex decoding): {line}"))
            })?;
            if self.add_token(&token) {
                entries += 1;
            }
        }

        Ok(entries)
    }

    /// The tokens
    #[must_use]
    pub fn tokens(&self) -> &[Vec<u8>] {
        &self.token_vec
    }

    /// Number of tokens
    #[must_use]
    pub fn len(&self) -> usize {
        self.token_vec.len()
    }

    /// `true` if there are no tokens
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.token_vec.is_empty()
    }
}

// Converts a hex u8 to its u8 value: 'A' -> 10 etc.
fn from_hex(hex: u8) -> Result<u8, Error> {
    match hex {
        b'0'..=b'9' => Ok(hex - b'0'),
        b'A'..=b'F' => Ok(hex - b'A' + 10),
        b'a'..=b'f' => Ok(hex - b'a' + 10),
        _ => Err(Error::config(format!(
            "Invalid hex character: {}",
            hex.escape_ascii()
        ))),
    }
}

/// Decodes a dictionary token: 'foo\x41\\and\"bar' -> 'fooA\and"bar'
pub fn str_decode(item: &str) -> Result<Vec<u8>, Error> {
    let mut token = Vec::with_capacity(item.len());
    let mut bytes = item.bytes();

    while let Some(c) = bytes.next() {
        if c != b'\\' {
            token.push(c);
            continue;
        }
        match bytes.next() {
            Some(b'x' | b'X') => {
                let (Some(hi), Some(lo)) = (bytes.next(), bytes.next()) else {
                    return Err(Error::config("Truncated \\x escape"));
                };
                token.push((from_hex(hi)? << 4) | from_hex(lo)?);
            }
            Some(other) => token.push(other),
            None => return Err(Error::config("Dangling backslash")),
        }
    }

    Ok(token)
}

/// Inserts a random token at a random position, as long as the result fits `max_size`
pub fn token_insert_mutation<R>(
    rand: &mut R,
    input: &mut BytesInput,
    tokens: &Tokens,
    max_size: usize,
) -> Result<MutationResult, Error>
where
    R: Rand,
{
    if tokens.is_empty() {
        return Ok(MutationResult::Skipped);
    }
    let token = &tokens.tokens()[rand.index(tokens.len())];
    if input.len() + token.len() > max_size {
        return Ok(MutationResult::Skipped);
    }
    let off = rand.index(input.len() + 1);
    input.bytes_mut().splice(off..off, token.iter().copied());
    Ok(MutationResult::Mutated)
}

/// Overwrites the input at a random position with a random token, cut at the input's end
pub fn token_replace_mutation<R>(
    rand: &mut R,
    input: &mut BytesInput,
    tokens: &Tokens,
) -> Result<MutationResult, Error>
where
    R: Rand,
{
    if tokens.is_empty() || input.is_empty() {
        return Ok(MutationResult::Skipped);
    }
    let token = &tokens.tokens()[rand.index(tokens.len())];
    let off = rand.index(input.len());
    let len = token.len().min(input.len() - off);
    input.bytes_mut()[off..off + len].copy_from_slice(&token[..len]);
    Ok(MutationResult::Mutated)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use crate::{
        current_nanos,
        inputs::BytesInput,
        mutators::{
            str_decode, token_insert_mutation, token_replace_mutation, MutationResult, Tokens,
        },
        rands::StdRand,
    };

    #[test]
    fn test_str_decode() {
        assert_eq!(str_decode(r#"foo\x41\\and\"bar"#).unwrap(), b"fooA\\and\"bar");
        assert!(str_decode(r"\x4").is_err());
        assert!(str_decode(r"\xzz").is_err());
    }

    #[test]
    fn test_read_tokens() {
        let path = std::env::temp_dir().join(format!("greybox_tokens_{}", current_nanos()));
        let data = r#"
# comment
token1@123="AAA"
token1="A\x41A"
"crash"
"#;
        fs::write(&path, data).unwrap();
        let tokens = Tokens::from_file(&path).unwrap();
        assert_eq!(tokens.tokens(), [b"AAA".to_vec(), b"crash".to_vec()]);
        fs::write(&path, "no quotes here").unwrap();
        assert!(Tokens::from_file(&path).is_err());
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_token_insert() {
        let mut rand = StdRand::with_seed(9);
        let tokens = Tokens::new(vec![b"crash".to_vec()]);
        let mut input = BytesInput::new(b"a".to_vec());
        assert_eq!(
            token_insert_mutation(&mut rand, &mut input, &tokens, 64).unwrap(),
            MutationResult::Mutated
        );
        assert!(input.bytes() == b"crasha" || input.bytes() == b"acrash");
        let mut full = BytesInput::new(vec![b'x'; 62]);
        assert_eq!(
            token_insert_mutation(&mut rand, &mut full, &tokens, 64).unwrap(),
            MutationResult::Skipped
        );
    }

    #[test]
    fn test_token_replace_stays_in_bounds() {
        let mut rand = StdRand::with_seed(10);
        let tokens = Tokens::new(vec![b"crash".to_vec()]);
        for _ in 0..50 {
            let mut input = BytesInput::new(b"xyz".to_vec());
            token_replace_mutation(&mut rand, &mut input, &tokens).unwrap();
            assert_eq!(input.len(), 3);
        }
        let mut empty = BytesInput::default();
        assert_eq!(
            token_replace_mutation(&mut rand, &mut empty, &tokens).unwrap(),
            MutationResult::Skipped
        );
    }
}
