// contigs.rs - Assembled contigs for allele extraction

use bio::alphabets::dna;
use bio::io::fasta;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;

use crate::data::hit::{AlignmentHit, Strand};
use crate::error::TypingError;

/// Contig sequences of one assembly, keyed by full header id
#[derive(Debug, Clone, Default)]
pub struct ContigSet {
    contigs: HashMap<String, Vec<u8>>,
}

impl ContigSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, sequence: impl Into<Vec<u8>>) {
        self.contigs.insert(id.into(), sequence.into());
    }

    pub fn len(&self) -> usize {
        self.contigs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contigs.is_empty()
    }

    pub fn from_fasta(path: &Path) -> Result<Self, TypingError> {
        let file = File::open(path).map_err(|e| TypingError::io(path, e))?;
        let reader = fasta::Reader::new(BufReader::new(file));

        let mut set = Self::new();
        for record_result in reader.records() {
            let record = record_result.map_err(|e| TypingError::Fasta {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
            set.insert(record.id(), record.seq().to_vec());
        }
        info!("Assembly {}: {} contigs", path.display(), set.len());
        Ok(set)
    }

    /// Called allele sequence of a hit: 1-based inclusive coordinates,
    /// reverse-complemented for reverse-strand hits, uppercased.
    pub fn extract(&self, hit: &AlignmentHit) -> Result<String, TypingError> {
        let contig = self
            .contigs
            .get(&hit.contig_id)
            .ok_or_else(|| TypingError::ContigNotFound(hit.contig_id.clone()))?;

        let (start, end) = (hit.contig_start, hit.contig_end);
        if start == 0 || end as usize > contig.len() {
            return Err(TypingError::ContigRange {
                contig: hit.contig_id.clone(),
                start,
                end,
                length: contig.len(),
            });
        }

        let slice = &contig[(start - 1) as usize..end as usize];
        let called = match hit.strand {
            Strand::Forward => slice.to_vec(),
            Strand::Reverse => dna::revcomp(slice),
        };
        Ok(String::from_utf8_lossy(&called).to_ascii_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::hit::{LocusIdentifier, Track};
    use std::fs;

    fn hit(contig_id: &str, start: u64, end: u64, strand: Strand) -> AlignmentHit {
        AlignmentHit {
            sample_id: "S1".into(),
            track: Track::Cgmlst,
            identifier: LocusIdentifier::bare("NP_1.1"),
            identity: 100.0,
            e_value: 0.0,
            bitscore: 50.0,
            contig_id: contig_id.into(),
            contig_name: "NODE_1".into(),
            contig_start: start,
            contig_end: end,
            strand,
            contig_length: 12,
            contig_coverage: 5.0,
            subject_length: end - start + 1,
            reference_length: 1,
            reference_resolved: false,
            span: 1.0,
            instance: None,
        }
    }

    #[test]
    fn test_extract_coordinates_and_strand() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assembly.fasta");
        fs::write(&path, ">NODE_1_length_12_cov_5.0\nAACCggtt\nACGT\n").unwrap();
        let contigs = ContigSet::from_fasta(&path).unwrap();
        assert_eq!(contigs.len(), 1);

        let id = "NODE_1_length_12_cov_5.0";
        assert_eq!(contigs.extract(&hit(id, 1, 4, Strand::Forward)).unwrap(), "AACC");
        assert_eq!(contigs.extract(&hit(id, 5, 8, Strand::Forward)).unwrap(), "GGTT");
        assert_eq!(contigs.extract(&hit(id, 9, 12, Strand::Reverse)).unwrap(), "ACGT");
        assert_eq!(contigs.extract(&hit(id, 1, 3, Strand::Reverse)).unwrap(), "GTT");
    }

    #[test]
    fn test_extract_errors() {
        let mut contigs = ContigSet::new();
        contigs.insert("NODE_1_length_4_cov_1.0", b"ACGT".to_vec());

        assert!(matches!(
            contigs.extract(&hit("NODE_9_length_4_cov_1.0", 1, 2, Strand::Forward)),
            Err(TypingError::ContigNotFound(_))
        ));
        assert!(matches!(
            contigs.extract(&hit("NODE_1_length_4_cov_1.0", 2, 5, Strand::Forward)),
            Err(TypingError::ContigRange { length: 4, .. })
        ));
        assert!(matches!(
            contigs.extract(&hit("NODE_1_length_4_cov_1.0", 0, 2, Strand::Forward)),
            Err(TypingError::ContigRange { .. })
        ));
    }
}
