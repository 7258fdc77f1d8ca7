// merge.rs - Merge configuration file with CLI arguments

use crate::cli::{Args, Config};

impl Args {
    /// Merge with configuration from file
    /// CLI arguments take precedence over config file values
    pub fn merge_with_config(mut self, config: Config) -> Self {
        // Folders
        if self.references.is_none() {
            self.references = config.references;
        }
        if self.profiles.is_none() {
            self.profiles = config.profiles;
        }
        if self.lexicon.is_none() {
            self.lexicon = config.lexicon;
        }
        if self.catalog.is_none() {
            self.catalog = config.catalog;
        }
        if self.output.is_none() {
            self.output = config.output;
        }

        // Thresholds (only override defaults, not explicit CLI values)
        if let Some(min_identity) = config.min_identity {
            if self.min_identity == 99.9 {
                self.min_identity = min_identity;
            }
        }
        if let Some(max_evalue) = config.max_evalue {
            if self.max_evalue == 0.0 {
                self.max_evalue = max_evalue;
            }
        }
        if let Some(min_span) = config.catalog_min_span {
            if self.catalog_min_span == 0.9 {
                self.catalog_min_span = min_span;
            }
        }

        // Policies (CLI flags take precedence, config only sets if not explicitly set)
        if !self.allow_gene_copies && config.same_gene_conflicts == Some(false) {
            self.allow_gene_copies = true;
        }
        if !self.abort_on_unresolved && config.abort_on_unresolved.unwrap_or(false) {
            self.abort_on_unresolved = true;
        }

        // Input selection
        if self.include_files.is_none() {
            self.include_files = config.include_files;
        }

        // Performance
        if self.threads.is_none() {
            self.threads = config.threads;
        }

        // Flags
        if !self.dry_run && config.dry_run.unwrap_or(false) {
            self.dry_run = true;
        }

        self
    }

    /// Load configuration and merge with CLI args
    pub fn with_config_file(self, config_path: &str) -> Result<Self, String> {
        let config = Config::from_file(config_path)?;
        Ok(self.merge_with_config(config))
    }
}
