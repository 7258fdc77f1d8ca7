// hit.rs - Alignment hit records and locus identifiers

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;
use std::sync::OnceLock;

use crate::error::TypingError;

/// Analysis track a hit file belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Track {
    /// Fixed-scheme MLST: `locus_allele`
    Mlst,
    /// Resistance genes: `gene_allele_reference`
    Resistance,
    /// Core-genome loci, identified by protein id
    Cgmlst,
}

impl FromStr for Track {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mlst" | "typing" => Ok(Track::Mlst),
            "resistance" | "resistances" => Ok(Track::Resistance),
            "cgmlst" => Ok(Track::Cgmlst),
            _ => Err(format!(
                "Invalid track: {}. Use: mlst, resistance, cgmlst",
                s
            )),
        }
    }
}

impl Track {
    pub fn description(&self) -> &str {
        match self {
            Track::Mlst => "MLST sequence typing",
            Track::Resistance => "Resistance gene detection",
            Track::Cgmlst => "cgMLST allele calling",
        }
    }
}

/// Orientation of the hit on the contig before coordinate normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strand {
    Forward,
    Reverse,
}

fn identifier_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<name>.+?)_(?P<allele>[0-9]{1,2})(?:_(?P<variant>.+))?$")
            .expect("identifier pattern is valid")
    })
}

/// Decomposed composite identifier: `name_allele[_variant]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocusIdentifier {
    pub name: String,
    pub allele: Option<u32>,
    /// Digits the allele was written with, so `abc_01` re-composes as `abc_01`
    pub allele_width: usize,
    pub variant: Option<String>,
}

impl LocusIdentifier {
    /// Split a composite identifier. Rejects anything the pattern does not accept.
    pub fn decompose(field: &str) -> Result<Self, TypingError> {
        let caps = identifier_regex().captures(field).ok_or_else(|| {
            TypingError::MalformedHit(format!(
                "identifier '{}' is not of the form name_allele[_variant]",
                field
            ))
        })?;

        let allele_text = &caps["allele"];
        let allele = allele_text
            .parse::<u32>()
            .map_err(|e| TypingError::MalformedHit(format!("allele '{}': {}", allele_text, e)))?;

        Ok(Self {
            name: caps["name"].to_string(),
            allele: Some(allele),
            allele_width: allele_text.len(),
            variant: caps.name("variant").map(|m| m.as_str().to_string()),
        })
    }

    /// Identifier with no allele component (cgMLST protein ids)
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            allele: None,
            allele_width: 0,
            variant: None,
        }
    }

    /// `name_allele` without the variant tag, as used in MLST reference headers
    pub fn locus_allele(&self) -> String {
        match self.allele {
            Some(allele) => format!("{}_{:0width$}", self.name, allele, width = self.allele_width),
            None => self.name.clone(),
        }
    }
}

impl Display for LocusIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.locus_allele())?;
        if let Some(variant) = &self.variant {
            write!(f, "_{}", variant)?;
        }
        Ok(())
    }
}

/// One parsed alignment record. Immutable once built by the hit parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentHit {
    pub sample_id: String,
    pub track: Track,
    pub identifier: LocusIdentifier,
    pub identity: f64,
    pub e_value: f64,
    pub bitscore: f64,
    /// Full assembly header, e.g. `NODE_1_length_5000_cov_20.1`
    pub contig_id: String,
    /// Short contig name, e.g. `NODE_1`
    pub contig_name: String,
    pub contig_start: u64,
    pub contig_end: u64,
    pub strand: Strand,
    pub contig_length: u64,
    pub contig_coverage: f64,
    pub subject_length: u64,
    pub reference_length: usize,
    pub reference_resolved: bool,
    pub span: f64,
    /// Resistance database the hit came from
    pub instance: Option<String>,
}

impl AlignmentHit {
    pub fn locus(&self) -> &str {
        &self.identifier.name
    }

    pub fn allele(&self) -> Option<u32> {
        self.identifier.allele
    }

    /// Key identifying a stored per-locus hit
    pub fn key(&self) -> HitKey {
        HitKey {
            sample_id: self.sample_id.clone(),
            locus: self.identifier.name.clone(),
            allele: self.identifier.allele,
            contig_name: self.contig_name.clone(),
        }
    }

    /// Whether the contig ranges of two hits share at least one base
    pub fn overlaps(&self, other: &AlignmentHit) -> bool {
        self.contig_start <= other.contig_end && other.contig_start <= self.contig_end
    }

    /// Evidence order used to pick a locus's best hit: identity desc,
    /// e-value asc, contig coverage desc. `Greater` means `self` is better.
    pub fn evidence_cmp(&self, other: &AlignmentHit) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        self.identity
            .partial_cmp(&other.identity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                other
                    .e_value
                    .partial_cmp(&self.e_value)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| {
                self.contig_coverage
                    .partial_cmp(&other.contig_coverage)
                    .unwrap_or(Ordering::Equal)
            })
    }
}

/// Unique address of a per-locus hit within a sample
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HitKey {
    pub sample_id: String,
    pub locus: String,
    pub allele: Option<u32>,
    pub contig_name: String,
}

impl Display for HitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.allele {
            Some(allele) => write!(f, "{}:{}_{}@{}", self.sample_id, self.locus, allele, self.contig_name),
            None => write!(f, "{}:{}@{}", self.sample_id, self.locus, self.contig_name),
        }
    }
}
