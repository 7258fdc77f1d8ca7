// reference.rs - Reference feature lengths loaded from FASTA catalogs

use bio::io::fasta;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::TypingError;

const REFERENCE_EXTENSIONS: [&str; 4] = ["tfa", "fsa", "fasta", "fa"];

/// Sequence lengths of reference features, organized by source file.
///
/// A source is the path of a FASTA file relative to the reference root,
/// without extension: `staphylococcus_aureus/arcC` for an MLST locus file,
/// `beta-lactam` for a resistance database.
#[derive(Debug, Clone, Default)]
pub struct ReferenceCatalog {
    sources: HashMap<String, HashMap<String, usize>>,
    pub total_features: usize,
}

impl ReferenceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one feature length under `header`
    pub fn add_feature(&mut self, source: &str, header: &str, length: usize) {
        self.add_record(source, header, None, length);
    }

    /// Register one FASTA record. Both the record id and the full header
    /// (id plus description) resolve to its length; it counts as one feature.
    pub fn add_record(&mut self, source: &str, id: &str, desc: Option<&str>, length: usize) {
        let headers = self.sources.entry(source.to_string()).or_default();
        headers.insert(id.to_string(), length);
        if let Some(desc) = desc {
            headers.insert(format!("{} {}", id, desc), length);
        }
        self.total_features += 1;
    }

    /// Length of `header` in `source`, if both are known
    pub fn feature_length(&self, source: &str, header: &str) -> Option<usize> {
        self.sources.get(source)?.get(header).copied()
    }

    pub fn has_source(&self, source: &str) -> bool {
        self.sources.contains_key(source)
    }

    /// Number of sources and features
    pub fn get_stats(&self) -> (usize, usize) {
        (self.sources.len(), self.total_features)
    }

    /// Load every FASTA file below `root`. Files are parsed in parallel.
    pub fn from_directory(root: &Path) -> Result<Self, TypingError> {
        if !root.is_dir() {
            return Err(TypingError::Config(format!(
                "Reference directory does not exist: {}",
                root.display()
            )));
        }

        let mut files = Vec::new();
        collect_fasta_files(root, &mut files)?;

        let loaded: Vec<(String, Vec<FeatureRecord>)> = files
            .par_iter()
            .map(|path| {
                let source = source_name(root, path);
                read_feature_lengths(path).map(|features| (source, features))
            })
            .collect::<Result<Vec<_>, TypingError>>()?;

        let mut catalog = Self::new();
        for (source, features) in loaded {
            debug!("{}: {} reference features", source, features.len());
            for feature in features {
                catalog.add_record(&source, &feature.id, feature.desc.as_deref(), feature.length);
            }
        }

        let (sources, features) = catalog.get_stats();
        info!(
            "Reference catalog loaded from {}: {} sources, {} features",
            root.display(),
            sources,
            features
        );
        Ok(catalog)
    }
}

fn collect_fasta_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), TypingError> {
    let entries = std::fs::read_dir(dir).map_err(|e| TypingError::io(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| TypingError::io(dir, e))?.path();
        if path.is_dir() {
            collect_fasta_files(&path, files)?;
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| REFERENCE_EXTENSIONS.contains(&e))
            .unwrap_or(false)
        {
            files.push(path);
        }
    }
    Ok(())
}

fn source_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path).with_extension("");
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

struct FeatureRecord {
    id: String,
    desc: Option<String>,
    length: usize,
}

/// Read the id, description and sequence length of every record in a FASTA file
fn read_feature_lengths(path: &Path) -> Result<Vec<FeatureRecord>, TypingError> {
    let file = File::open(path).map_err(|e| TypingError::io(path, e))?;
    let reader = fasta::Reader::new(BufReader::new(file));

    let mut features = Vec::new();
    for record_result in reader.records() {
        let record = record_result.map_err(|e| TypingError::Fasta {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        features.push(FeatureRecord {
            id: record.id().to_string(),
            desc: record.desc().map(String::from),
            length: record.seq().len(),
        });
    }
    Ok(features)
}
