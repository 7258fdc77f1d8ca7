// error.rs - Error taxonomy for typing operations

use std::path::PathBuf;
use thiserror::Error;

/// Violations of the storage contract. These abort the current sample.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("no {collection} record matches {filter}")]
    NotFound {
        collection: &'static str,
        filter: String,
    },

    #[error("{count} {collection} records match {filter}, expected exactly one")]
    NotUnique {
        collection: &'static str,
        filter: String,
        count: usize,
    },
}

#[derive(Error, Debug)]
pub enum TypingError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed alignment hit: {0}")]
    MalformedHit(String),

    #[error("invalid FASTA record in {}: {message}", .path.display())]
    Fasta { path: PathBuf, message: String },

    #[error("gene '{0}' not found in resistance lexicon, lexicon needs updating")]
    UnresolvedGene(String),

    #[error("no profile table loaded for organism '{0}'")]
    MissingProfile(String),

    #[error("invalid profile table {}: {message}", .path.display())]
    ProfileFormat { path: PathBuf, message: String },

    #[error("invalid lexicon line {line}: {message}")]
    Lexicon { line: usize, message: String },

    #[error("contig '{0}' not present in assembly")]
    ContigNotFound(String),

    #[error("coordinates {start}..{end} outside contig '{contig}' of length {length}")]
    ContigRange {
        contig: String,
        start: u64,
        end: u64,
        length: usize,
    },

    #[error("allele catalog error: {0}")]
    Catalog(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TypingError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TypingError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = TypingError> = std::result::Result<T, E>;
