//! The byte input fed to the target's stdin.

use std::{fs, path::Path};

use crate::Error;

/// How many bytes [`BytesInput::preview`] shows.
pub const PREVIEW_LEN: usize = 20;

/// A plain byte vector input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BytesInput {
    bytes: Vec<u8>,
}

impl From<Vec<u8>> for BytesInput {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for BytesInput {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes.to_vec())
    }
}

impl BytesInput {
    /// Creates a new bytes input using the given bytes
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Loads an input from a file
    pub fn from_file<P>(path: P) -> Result<Self, Error>
    where
        P: AsRef<Path>,
    {
        Ok(Self::new(fs::read(path)?))
    }

    /// Writes this input to a file, replacing it if it exists
    pub fn to_file<P>(&self, path: P) -> Result<(), Error>
    where
        P: AsRef<Path>,
    {
        fs::write(path, &self.bytes)?;
        Ok(())
    }

    /// The bytes
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The bytes, mutable
    pub fn bytes_mut(&mut self) -> &mut Vec<u8> {
        &mut self.bytes
    }

    /// Number of bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// `true` if there are no bytes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The first [`PREVIEW_LEN`] bytes, escaped, for log lines
    #[must_use]
    pub fn preview(&self) -> String {
        let end = self.bytes.len().min(PREVIEW_LEN);
        let mut preview = self.bytes[..end].escape_ascii().to_string();
        if self.bytes.len() > PREVIEW_LEN {
            preview.push_str("...");
        }
        preview
    }
}

#[cfg(test)]
mod tests {
    use crate::{current_nanos, inputs::BytesInput};

    #[test]
    fn test_preview() {
        assert_eq!(BytesInput::from(&b"cr\x00sh"[..]).preview(), "cr\\x00sh");
        let long = BytesInput::new(vec![b'a'; 30]);
        assert_eq!(long.preview(), format!("{}...", "a".repeat(20)));
    }

    #[test]
    fn test_file_roundtrip() {
        let path = std::env::temp_dir().join(format!("greybox_input_{}", current_nanos()));
        let input = BytesInput::new(b"crash".to_vec());
        input.to_file(&path).unwrap();
        assert_eq!(BytesInput::from_file(&path).unwrap(), input);
        std::fs::remove_file(&path).unwrap();
    }
}
