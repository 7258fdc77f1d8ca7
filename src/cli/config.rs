// config.rs - Configuration file support

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    // Folders
    pub references: Option<String>,
    pub profiles: Option<String>,
    pub lexicon: Option<String>,
    pub catalog: Option<String>,
    pub output: Option<String>,

    // Thresholds
    pub min_identity: Option<f64>,
    pub max_evalue: Option<f64>,
    pub catalog_min_span: Option<f64>,

    // Policies
    pub same_gene_conflicts: Option<bool>,
    pub abort_on_unresolved: Option<bool>,

    // Input selection
    pub include_files: Option<String>,

    // Performance
    pub threads: Option<usize>,

    // Flags
    pub dry_run: Option<bool>,
}

impl Config {
    /// Create a new empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?;

        println!("📄 Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), String> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        fs::write(path, content)
            .map_err(|e| format!("Failed to write config file '{}': {}", path.display(), e))?;

        println!("📄 Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Generate a sample configuration file with comments
    pub fn generate_sample() -> String {
        r#"# sttyper.toml - Configuration file for sttyper
# Command line arguments will override these settings

# =============================================================================
# FOLDERS
# =============================================================================

# Reference FASTA directory (<organism>/<locus>.tfa, <organism>/cgmlst.fasta,
# <resistance database>.fsa)
references = "/path/to/references"

# MLST profile tables, one tab-separated file per organism
profiles = "/path/to/profiles"

# Resistance lexicon, one gene:description per line
lexicon = "/path/to/resistance_lexicon.txt"

# cgMLST allele catalog (created on first use)
catalog = "/path/to/allele_catalog.json"

# Output file
# output = "results.tsv"

# =============================================================================
# THRESHOLDS
# =============================================================================

# High-confidence MLST hits: identity >= min_identity and e-value <= max_evalue
min_identity = 99.9
max_evalue = 0.0

# Minimum shorter/longer length ratio for two sequences to be one cgMLST allele
catalog_min_span = 0.9

# =============================================================================
# POLICIES
# =============================================================================

# Treat two hits of the same gene on one contig as conflicting even when
# their coordinates are disjoint (single-copy assumption)
same_gene_conflicts = true

# Fail instead of skipping hits whose gene is missing from the lexicon
abort_on_unresolved = false

# =============================================================================
# INPUT SELECTION
# =============================================================================

# Include only hit files whose name matches regex pattern
# include_files = "^loci_query_.*"

# =============================================================================
# PERFORMANCE
# =============================================================================

# Number of threads (omit for auto-detection)
# threads = 8

# =============================================================================
# FLAGS
# =============================================================================

# Validate inputs without computation (dry run)
dry_run = false
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_config_parses() {
        let config: Config = toml::from_str(&Config::generate_sample()).unwrap();
        assert_eq!(config.min_identity, Some(99.9));
        assert_eq!(config.max_evalue, Some(0.0));
        assert_eq!(config.catalog_min_span, Some(0.9));
        assert_eq!(config.same_gene_conflicts, Some(true));
        assert_eq!(config.abort_on_unresolved, Some(false));
        assert!(config.output.is_none());
    }

    #[test]
    fn test_config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sttyper.toml");
        let config = Config {
            profiles: Some("/data/profiles".into()),
            min_identity: Some(99.5),
            same_gene_conflicts: Some(false),
            ..Config::default()
        };
        config.to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.profiles.as_deref(), Some("/data/profiles"));
        assert_eq!(loaded.min_identity, Some(99.5));
        assert_eq!(loaded.same_gene_conflicts, Some(false));
    }
}
