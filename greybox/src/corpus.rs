//! Corpus of interesting inputs, and the directories they are persisted to.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use crate::{inputs::BytesInput, rands::Rand, Error};

/// The seed used when the seed directory holds no files
pub const DEFAULT_SEED: &[u8] = b"a";

/// An entry in the corpus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Testcase {
    input: BytesInput,
    filename: Option<String>,
}

impl From<BytesInput> for Testcase {
    fn from(input: BytesInput) -> Self {
        Self::new(input)
    }
}

impl Testcase {
    /// Creates a testcase that has not been stored anywhere
    #[must_use]
    pub fn new(input: BytesInput) -> Self {
        Self {
            input,
            filename: None,
        }
    }

    /// Creates a testcase that is backed by the given file name
    #[must_use]
    pub fn with_filename(input: BytesInput, filename: String) -> Self {
        Self {
            input,
            filename: Some(filename),
        }
    }

    /// The input
    #[must_use]
    pub fn input(&self) -> &BytesInput {
        &self.input
    }

    /// The file name this testcase is stored under, if any
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }
}

/// A corpus kept in memory, in insertion order
#[derive(Debug, Clone, Default)]
pub struct InMemoryCorpus {
    entries: Vec<Testcase>,
}

impl InMemoryCorpus {
    /// Creates an empty corpus
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a testcase and returns its index
    pub fn add(&mut self, testcase: Testcase) -> usize {
        self.entries.push(testcase);
        self.entries.len() - 1
    }

    /// Gets a testcase by index
    pub fn get(&self, idx: usize) -> Result<&Testcase, Error> {
        self.entries
            .get(idx)
            .ok_or_else(|| Error::illegal_state(format!("No corpus entry with index {idx}")))
    }

    /// Picks a testcase uniformly at random
    pub fn random<R>(&self, rand: &mut R) -> Result<&Testcase, Error>
    where
        R: Rand,
    {
        if self.entries.is_empty() {
            return Err(Error::empty("InMemoryCorpus"));
        }
        Ok(&self.entries[rand.index(self.entries.len())])
    }

    /// Number of entries
    #[must_use]
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// `true` if the corpus is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Creates `path` and its parents, failing if it exists as a file
pub fn create_dir_if_not_exists(path: &Path) -> io::Result<()> {
    if path.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} expected to be a directory, but is a file", path.display()),
        ));
    }
    fs::create_dir_all(path)
}

/// Loads every regular file in `dir` into a new corpus.
///
/// The directory is created if it is missing. When it has no files, the corpus gets the
/// single [`DEFAULT_SEED`]. Files are loaded in name order so runs are reproducible.
pub fn load_initial_inputs(dir: &Path) -> Result<InMemoryCorpus, Error> {
    create_dir_if_not_exists(dir)?;

    let mut paths = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    paths.sort();

    let mut corpus = InMemoryCorpus::new();
    for path in paths.into_iter().filter(|p| p.is_file()) {
        let input = BytesInput::from_file(&path)?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        log::debug!("loaded seed {} ({} bytes)", path.display(), input.len());
        corpus.add(Testcase {
            input,
            filename,
        });
    }

    if corpus.is_empty() {
        log::info!("no seeds in {}, starting from the default seed", dir.display());
        corpus.add(Testcase::new(BytesInput::new(DEFAULT_SEED.to_vec())));
    }
    Ok(corpus)
}

/// Writes inputs as files into one directory.
#[derive(Debug, Clone)]
pub struct OnDiskStore {
    dir_path: PathBuf,
}

impl OnDiskStore {
    /// Creates a store for `dir_path`. The directory is created on the first write.
    #[must_use]
    pub fn new<P>(dir_path: P) -> Self
    where
        P: Into<PathBuf>,
    {
        Self {
            dir_path: dir_path.into(),
        }
    }

    /// The directory backing this store
    #[must_use]
    pub fn dir_path(&self) -> &Path {
        &self.dir_path
    }

    /// Stores `input` as `filename`, replacing an existing file
    pub fn save(&self, filename: &str, input: &BytesInput) -> Result<PathBuf, Error> {
        create_dir_if_not_exists(&self.dir_path)?;
        let path = self.dir_path.join(filename);
        input.to_file(&path)?;
        Ok(path)
    }

    /// Stores `input` as `{stem}.{ext}`, or `{stem}_{n}.{ext}` with the first free `n`
    /// if that name is taken.
    pub fn save_unique(&self, stem: &str, ext: &str, input: &BytesInput) -> Result<PathBuf, Error> {
        create_dir_if_not_exists(&self.dir_path)?;
        let mut path = self.dir_path.join(format!("{stem}.{ext}"));
        let mut n = 1;
        while path.exists() {
            path = self.dir_path.join(format!("{stem}_{n}.{ext}"));
            n += 1;
        }
        input.to_file(&path)?;
        Ok(path)
    }
}

/// The file name of the corpus entry that brought the corpus to `corpus_size` entries
#[must_use]
pub fn queue_filename(corpus_size: usize) -> String {
    format!("id_{corpus_size:06}")
}

#[cfg(test)]
mod tests {
    use std::fs;

    use crate::{
        corpus::{
            create_dir_if_not_exists, load_initial_inputs, queue_filename, InMemoryCorpus,
            OnDiskStore, Testcase, DEFAULT_SEED,
        },
        current_nanos,
        inputs::BytesInput,
        rands::StdRand,
    };

    fn temp_dir(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("greybox_{name}_{}", current_nanos()))
    }

    #[test]
    fn test_queue_filename() {
        assert_eq!(queue_filename(7), "id_000007");
        assert_eq!(queue_filename(1_234_567), "id_1234567");
    }

    #[test]
    fn test_empty_seed_dir_gets_default() {
        let dir = temp_dir("seeds_empty");
        let corpus = load_initial_inputs(&dir).unwrap();
        assert!(dir.is_dir());
        assert_eq!(corpus.count(), 1);
        assert_eq!(corpus.get(0).unwrap().input().bytes(), DEFAULT_SEED);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_seeds_skips_dirs() {
        let dir = temp_dir("seeds");
        fs::create_dir_all(dir.join("nested")).unwrap();
        fs::write(dir.join("b"), b"second").unwrap();
        fs::write(dir.join("a"), b"first").unwrap();
        let corpus = load_initial_inputs(&dir).unwrap();
        assert_eq!(corpus.count(), 2);
        assert_eq!(corpus.get(0).unwrap().input().bytes(), b"first");
        assert_eq!(corpus.get(0).unwrap().filename(), Some("a"));
        assert_eq!(corpus.get(1).unwrap().input().bytes(), b"second");
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_dir_that_is_a_file() {
        let path = temp_dir("not_a_dir");
        fs::write(&path, b"x").unwrap();
        assert!(create_dir_if_not_exists(&path).is_err());
        assert!(load_initial_inputs(&path).is_err());
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_save_unique() {
        let dir = temp_dir("store");
        let store = OnDiskStore::new(&dir);
        let input = BytesInput::new(b"crash".to_vec());
        let first = store.save_unique("crash_1", "txt", &input).unwrap();
        let second = store.save_unique("crash_1", "txt", &input).unwrap();
        assert_eq!(first.file_name().unwrap(), "crash_1.txt");
        assert_eq!(second.file_name().unwrap(), "crash_1_1.txt");
        assert_eq!(fs::read(&second).unwrap(), b"crash");
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_random_pick() {
        let mut rand = StdRand::with_seed(0);
        let mut corpus = InMemoryCorpus::new();
        assert!(corpus.random(&mut rand).is_err());
        corpus.add(Testcase::from(BytesInput::new(b"x".to_vec())));
        assert_eq!(corpus.random(&mut rand).unwrap().input().bytes(), b"x");
    }
}
