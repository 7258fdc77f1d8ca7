// lexicon.rs - Gene symbol to drug class lexicon

use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use crate::error::TypingError;

const RESISTANCE_SUFFIX: &str = " resistance";

/// A lexicon hit: the symbol that matched and its drug class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneClass {
    pub canonical_gene: String,
    pub resistance_class: String,
}

/// Static `gene:description` lexicon
#[derive(Debug, Clone, Default)]
pub struct ResistanceLexicon {
    classes: HashMap<String, String>,
}

impl ResistanceLexicon {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, gene: impl Into<String>, class: impl Into<String>) {
        self.classes.insert(gene.into(), class.into());
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Parse lexicon text. Blank lines and `#` comments are skipped; the
    /// description's trailing " resistance" is dropped to form the class.
    pub fn parse(text: &str) -> Result<Self, TypingError> {
        let mut lexicon = Self::new();
        for (line_num, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (gene, description) = line.split_once(':').ok_or_else(|| TypingError::Lexicon {
                line: line_num + 1,
                message: "expected gene:description".to_string(),
            })?;
            let gene = gene.trim();
            if gene.is_empty() {
                return Err(TypingError::Lexicon {
                    line: line_num + 1,
                    message: "empty gene symbol".to_string(),
                });
            }
            let description = description.trim();
            let class = description
                .strip_suffix(RESISTANCE_SUFFIX)
                .unwrap_or(description);
            lexicon.insert(gene, class);
        }
        Ok(lexicon)
    }

    pub fn from_file(path: &Path) -> Result<Self, TypingError> {
        let text = std::fs::read_to_string(path).map_err(|e| TypingError::io(path, e))?;
        let lexicon = Self::parse(&text)?;
        info!("Resistance lexicon {}: {} genes", path.display(), lexicon.len());
        Ok(lexicon)
    }

    /// Resolve a symbol, stripping trailing characters one at a time until a
    /// lexicon entry matches.
    pub fn resolve(&self, gene: &str) -> Result<GeneClass, TypingError> {
        let mut candidate = gene;
        while !candidate.is_empty() {
            if let Some(class) = self.classes.get(candidate) {
                if candidate.len() != gene.len() {
                    debug!("Gene {} resolved as {}", gene, candidate);
                }
                return Ok(GeneClass {
                    canonical_gene: candidate.to_string(),
                    resistance_class: class.clone(),
                });
            }
            let mut chars = candidate.chars();
            chars.next_back();
            candidate = chars.as_str();
        }
        Err(TypingError::UnresolvedGene(gene.to_string()))
    }
}
