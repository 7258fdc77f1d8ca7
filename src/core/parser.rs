// parser.rs - Tabular alignment hit parser

use regex::Regex;
use std::str::FromStr;
use std::sync::OnceLock;
use tracing::warn;

use crate::data::hit::{AlignmentHit, LocusIdentifier, Strand, Track};
use crate::data::reference::ReferenceCatalog;
use crate::error::TypingError;

/// Marker for "no hit" in the hit and identifier columns
pub const NO_HIT: &str = "N/A";

const MIN_COLUMNS: usize = 12;

// 0-based columns of the hit table
const COL_HIT: usize = 1;
const COL_CONTIG: usize = 2;
const COL_IDENTIFIER: usize = 3;
const COL_IDENTITY: usize = 4;
const COL_EVALUE: usize = 5;
const COL_BITSCORE: usize = 6;
const COL_START: usize = 7;
const COL_END: usize = 8;
const COL_SUBJECT_LENGTH: usize = 11;

fn protein_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:_prot_|\[protein_id=)(?P<id>[A-Za-z]+_[0-9]+(?:\.[0-9]+)?)")
            .expect("protein id pattern is valid")
    })
}

/// Per-file context the parser needs besides the line itself
#[derive(Debug, Clone)]
pub struct HitContext {
    pub sample_id: String,
    pub track: Track,
    /// Reference organism, required for MLST and cgMLST span lookup
    pub organism: Option<String>,
    /// Resistance database name (hit file stem)
    pub instance: Option<String>,
}

impl HitContext {
    pub fn new(sample_id: impl Into<String>, track: Track) -> Self {
        Self {
            sample_id: sample_id.into(),
            track,
            organism: None,
            instance: None,
        }
    }

    pub fn with_organism(mut self, organism: impl Into<String>) -> Self {
        self.organism = Some(organism.into());
        self
    }

    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    /// Reference source and header that hold the feature length of `id`
    fn reference_lookup(&self, id: &LocusIdentifier, field: &str) -> (String, String) {
        let organism = self.organism.as_deref().unwrap_or_default();
        match self.track {
            Track::Mlst => (format!("{}/{}", organism, id.name), id.locus_allele()),
            Track::Resistance => (
                self.instance.clone().unwrap_or_default(),
                field.to_string(),
            ),
            Track::Cgmlst => (format!("{}/cgmlst", organism), field.to_string()),
        }
    }
}

/// Protein id from cgMLST header metadata, or the whole field when absent
pub fn extract_protein_id(field: &str) -> String {
    protein_id_regex()
        .captures(field)
        .map(|caps| caps["id"].to_string())
        .unwrap_or_else(|| field.to_string())
}

fn parse_column<T: FromStr>(columns: &[&str], index: usize, name: &str) -> Result<T, TypingError> {
    let raw = columns[index].trim();
    raw.parse::<T>()
        .map_err(|_| TypingError::MalformedHit(format!("{} '{}' is not a number", name, raw)))
}

/// SPAdes contig header `NODE_<n>_length_<len>_cov_<cov>` into
/// (short name, length, coverage)
fn parse_contig_header(header: &str) -> Result<(String, u64, f64), TypingError> {
    let parts: Vec<&str> = header.split('_').collect();
    if parts.len() < 6 {
        return Err(TypingError::MalformedHit(format!(
            "contig '{}' is not a NODE_n_length_l_cov_c header",
            header
        )));
    }
    let length = parts[3].parse::<u64>().map_err(|_| {
        TypingError::MalformedHit(format!("contig '{}' has no numeric length", header))
    })?;
    let coverage = parts[5].parse::<f64>().map_err(|_| {
        TypingError::MalformedHit(format!("contig '{}' has no numeric coverage", header))
    })?;
    Ok((format!("{}_{}", parts[0], parts[1]), length, coverage))
}

/// Parse one line of alignment output.
///
/// Returns `Ok(None)` for comments, blank lines and `N/A` rows. A reference
/// feature missing from `references` degrades the span to
/// `subject_length / 1` with a warning instead of failing.
pub fn parse_line(
    line: &str,
    ctx: &HitContext,
    references: &ReferenceCatalog,
) -> Result<Option<AlignmentHit>, TypingError> {
    let line = line.trim_end_matches(['\n', '\r']);
    if line.trim().is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let columns: Vec<&str> = line.split('\t').collect();
    if columns.len() > COL_HIT && columns[COL_HIT] == NO_HIT {
        return Ok(None);
    }
    if columns.len() < MIN_COLUMNS {
        return Err(TypingError::MalformedHit(format!(
            "expected at least {} columns, found {}",
            MIN_COLUMNS,
            columns.len()
        )));
    }

    let field = columns[COL_IDENTIFIER].trim();
    if field == NO_HIT {
        return Ok(None);
    }

    let identifier = match ctx.track {
        Track::Mlst | Track::Resistance => LocusIdentifier::decompose(field)?,
        Track::Cgmlst => LocusIdentifier::bare(extract_protein_id(field)),
    };

    let identity: f64 = parse_column(&columns, COL_IDENTITY, "identity")?;
    let e_value: f64 = parse_column(&columns, COL_EVALUE, "e-value")?;
    let bitscore: f64 = parse_column(&columns, COL_BITSCORE, "bitscore")?;
    let raw_start: u64 = parse_column(&columns, COL_START, "contig start")?;
    let raw_end: u64 = parse_column(&columns, COL_END, "contig end")?;
    let subject_length: u64 = parse_column(&columns, COL_SUBJECT_LENGTH, "subject length")?;

    if !(0.0..=100.0).contains(&identity) {
        return Err(TypingError::MalformedHit(format!(
            "identity {} outside 0-100",
            identity
        )));
    }
    if e_value < 0.0 {
        return Err(TypingError::MalformedHit(format!("negative e-value {}", e_value)));
    }

    let contig_id = columns[COL_CONTIG].trim().to_string();
    let (contig_name, contig_length, contig_coverage) = parse_contig_header(&contig_id)?;

    let (contig_start, contig_end, strand) = if raw_start <= raw_end {
        (raw_start, raw_end, Strand::Forward)
    } else {
        (raw_end, raw_start, Strand::Reverse)
    };

    let (source, header) = ctx.reference_lookup(&identifier, field);
    let (reference_length, reference_resolved) = match references.feature_length(&source, &header) {
        Some(length) if length > 0 => (length, true),
        _ => {
            warn!(
                "Reference feature {} not found in {}, span of sample {} computed against length 1",
                header, source, ctx.sample_id
            );
            (1, false)
        }
    };

    Ok(Some(AlignmentHit {
        sample_id: ctx.sample_id.clone(),
        track: ctx.track,
        identifier,
        identity,
        e_value,
        bitscore,
        contig_id,
        contig_name,
        contig_start,
        contig_end,
        strand,
        contig_length,
        contig_coverage,
        subject_length,
        reference_length,
        reference_resolved,
        span: subject_length as f64 / reference_length as f64,
        instance: match ctx.track {
            Track::Resistance => ctx.instance.clone(),
            _ => None,
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(identifier: &str, start: u64, end: u64) -> String {
        format!(
            "q1\thit\tNODE_3_length_5000_cov_21.5\t{}\t99.5\t0.0\t850\t{}\t{}\t1\t456\t450",
            identifier, start, end
        )
    }

    fn references() -> ReferenceCatalog {
        let mut refs = ReferenceCatalog::new();
        refs.add_feature("saureus/arcC", "arcC_1", 450);
        refs.add_feature("beta-lactam", "blaTEM-1B_1_AY458016", 900);
        refs
    }

    #[test]
    fn test_parse_mlst_hit() {
        let ctx = HitContext::new("S1", Track::Mlst).with_organism("saureus");
        let hit = parse_line(&line("arcC_1", 100, 549), &ctx, &references())
            .unwrap()
            .unwrap();

        assert_eq!(hit.locus(), "arcC");
        assert_eq!(hit.allele(), Some(1));
        assert_eq!(hit.contig_name, "NODE_3");
        assert_eq!(hit.contig_id, "NODE_3_length_5000_cov_21.5");
        assert_eq!(hit.contig_length, 5000);
        assert_eq!(hit.contig_coverage, 21.5);
        assert_eq!(hit.identity, 99.5);
        assert_eq!(hit.subject_length, 450);
        assert!(hit.reference_resolved);
        assert!((hit.span - 1.0).abs() < 1e-12);
        assert_eq!(hit.instance, None);
    }

    #[test]
    fn test_parse_resistance_hit() {
        let ctx = HitContext::new("S1", Track::Resistance).with_instance("beta-lactam");
        let hit = parse_line(&line("blaTEM-1B_1_AY458016", 10, 909), &ctx, &references())
            .unwrap()
            .unwrap();

        assert_eq!(hit.locus(), "blaTEM-1B");
        assert_eq!(hit.identifier.variant.as_deref(), Some("AY458016"));
        assert_eq!(hit.instance.as_deref(), Some("beta-lactam"));
        assert!((hit.span - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_coordinates_are_normalized() {
        let ctx = HitContext::new("S1", Track::Mlst).with_organism("saureus");
        let hit = parse_line(&line("arcC_1", 900, 451), &ctx, &references())
            .unwrap()
            .unwrap();
        assert_eq!(hit.contig_start, 451);
        assert_eq!(hit.contig_end, 900);
        assert_eq!(hit.strand, Strand::Reverse);
        assert!(hit.contig_start <= hit.contig_end);
    }

    #[test]
    fn test_missing_reference_degrades_span() {
        let ctx = HitContext::new("S1", Track::Mlst).with_organism("saureus");
        let hit = parse_line(&line("arcC_7", 1, 450), &ctx, &references())
            .unwrap()
            .unwrap();
        assert!(!hit.reference_resolved);
        assert_eq!(hit.reference_length, 1);
        assert_eq!(hit.span, 450.0);
    }

    #[test]
    fn test_comments_and_no_hits() {
        let ctx = HitContext::new("S1", Track::Mlst).with_organism("saureus");
        let refs = references();
        assert!(parse_line("# BLASTN 2.9.0", &ctx, &refs).unwrap().is_none());
        assert!(parse_line("", &ctx, &refs).unwrap().is_none());
        assert!(parse_line("q1\tN/A", &ctx, &refs).unwrap().is_none());
        assert!(parse_line(&line("N/A", 1, 2), &ctx, &refs).unwrap().is_none());
    }

    #[test]
    fn test_malformed_lines_are_rejected() {
        let ctx = HitContext::new("S1", Track::Mlst).with_organism("saureus");
        let refs = references();
        assert!(matches!(
            parse_line(&line("arcC", 1, 2), &ctx, &refs),
            Err(TypingError::MalformedHit(_))
        ));
        assert!(parse_line("q1\thit\tNODE_1", &ctx, &refs).is_err());
        let bad_contig = line("arcC_1", 1, 2).replace("NODE_3_length_5000_cov_21.5", "contig7");
        assert!(parse_line(&bad_contig, &ctx, &refs).is_err());
    }

    #[test]
    fn test_cgmlst_protein_id() {
        assert_eq!(
            extract_protein_id("lcl|NC_003197.2_prot_NP_459006.1_1"),
            "NP_459006.1"
        );
        assert_eq!(
            extract_protein_id("locus1 [protein_id=WP_000123456.1]"),
            "WP_000123456.1"
        );
        assert_eq!(extract_protein_id("plain_locus"), "plain_locus");

        let ctx = HitContext::new("S1", Track::Cgmlst).with_organism("senterica");
        let hit = parse_line(&line("lcl|NC_003197.2_prot_NP_459006.1_1", 1, 30), &ctx, &references())
            .unwrap()
            .unwrap();
        assert_eq!(hit.locus(), "NP_459006.1");
        assert_eq!(hit.allele(), None);
    }
}
