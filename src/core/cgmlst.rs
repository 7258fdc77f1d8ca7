// cgmlst.rs - cgMLST allele calling against the shared allele catalog

use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::data::contigs::ContigSet;
use crate::data::hit::AlignmentHit;
use crate::store::catalog::{AlleleCatalog, AlleleList, CatalogKey};

/// Minimum shorter/longer length ratio for two sequences to be one allele
pub const DEFAULT_MIN_SPAN: f64 = 0.9;

/// Ordered `(protein_id, allele_number)` calls of one sample
pub type Fingerprint = Vec<(String, u32)>;

/// How a sample sequence relates to a catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Containment {
    /// The catalog entry contains the sample sequence
    CatalogLonger,
    /// The sample sequence contains the catalog entry
    SampleLonger,
}

#[derive(Debug, Clone, Copy)]
pub struct CatalogMatcher {
    /// `min_span` in thousandths, so ratio checks stay in integers
    min_span_permille: u64,
}

impl Default for CatalogMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SPAN)
    }
}

impl CatalogMatcher {
    pub fn new(min_span: f64) -> Self {
        Self {
            min_span_permille: (min_span.clamp(0.0, 1.0) * 1000.0).round() as u64,
        }
    }

    pub fn min_span(&self) -> f64 {
        self.min_span_permille as f64 / 1000.0
    }

    fn containment(&self, catalog: &str, sample: &str) -> Option<Containment> {
        let (shorter, longer, relation) = if catalog.len() >= sample.len() {
            (sample, catalog, Containment::CatalogLonger)
        } else {
            (catalog, sample, Containment::SampleLonger)
        };
        let spans = shorter.len() as u64 * 1000 >= longer.len() as u64 * self.min_span_permille;
        (spans && longer.contains(shorter)).then_some(relation)
    }

    /// Find-or-create the allele of `sequence` within one key's allele list.
    /// An empty sequence is never called.
    fn call_in(&self, alleles: &mut AlleleList, sequence: &str) -> Option<(u32, bool)> {
        if sequence.is_empty() {
            return None;
        }
        let matched = alleles
            .entries()
            .iter()
            .enumerate()
            .find_map(|(index, entry)| {
                self.containment(&entry.sequence, sequence)
                    .map(|relation| (index, entry.allele_number, relation))
            });

        let call = match matched {
            Some((index, allele_number, Containment::SampleLonger)) => {
                debug!(
                    "Extending allele {} to {} bp",
                    allele_number,
                    sequence.len()
                );
                alleles.extend(index, sequence.to_string());
                (allele_number, false)
            }
            Some((_, allele_number, Containment::CatalogLonger)) => (allele_number, false),
            None => (alleles.append(sequence.to_string()), true),
        };
        Some(call)
    }

    /// Allele number of `sequence` at `(organism, protein_id)`, creating or
    /// extending a catalog entry as needed. Runs under the key's lock.
    pub fn assign_allele(
        &self,
        catalog: &AlleleCatalog,
        organism: &str,
        protein_id: &str,
        sequence: &str,
    ) -> Option<u32> {
        let key = CatalogKey::new(organism, protein_id);
        catalog
            .with_alleles(&key, |alleles| self.call_in(alleles, sequence))
            .map(|(allele, _)| allele)
    }

    /// Call every cgMLST locus of a sample. Loci whose sequence cannot be
    /// extracted, or is empty, are skipped with a warning.
    pub fn fingerprint_sample(
        &self,
        hits: &[AlignmentHit],
        contigs: &ContigSet,
        catalog: &AlleleCatalog,
        organism: &str,
    ) -> Fingerprint {
        let loci = best_hit_per_locus(hits);
        let mut fingerprint = Fingerprint::with_capacity(loci.len());
        let mut novel = 0usize;

        for hit in loci {
            let sequence = match contigs.extract(hit) {
                Ok(sequence) => sequence,
                Err(e) => {
                    warn!("Sample {}: skipping {}: {}", hit.sample_id, hit.locus(), e);
                    continue;
                }
            };
            let key = CatalogKey::new(organism, hit.locus());
            let Some((allele, created)) =
                catalog.with_alleles(&key, |alleles| self.call_in(alleles, &sequence))
            else {
                warn!("Sample {}: skipping {}: empty sequence", hit.sample_id, hit.locus());
                continue;
            };
            if created {
                novel += 1;
            }
            fingerprint.push((hit.locus().to_string(), allele));
        }

        if let Some(sample_id) = hits.first().map(|h| h.sample_id.as_str()) {
            info!(
                "Sample {}: {} cgMLST loci called, {} new alleles",
                sample_id,
                fingerprint.len(),
                novel
            );
        }
        fingerprint
    }
}

/// Best hit per protein id by evidence, in first-seen order
fn best_hit_per_locus(hits: &[AlignmentHit]) -> Vec<&AlignmentHit> {
    let mut order: Vec<&AlignmentHit> = Vec::new();
    let mut position: HashMap<&str, usize> = HashMap::new();
    for hit in hits {
        match position.get(hit.locus()) {
            Some(&i) => {
                if hit.evidence_cmp(order[i]) == std::cmp::Ordering::Greater {
                    order[i] = hit;
                }
            }
            None => {
                position.insert(hit.locus(), order.len());
                order.push(hit);
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::hit::{LocusIdentifier, Strand, Track};

    const ORG: &str = "senterica";
    const PROT: &str = "NP_459006.1";

    fn cg_hit(protein_id: &str, contig: &str, start: u64, end: u64, strand: Strand, identity: f64) -> AlignmentHit {
        AlignmentHit {
            sample_id: "S1".into(),
            track: Track::Cgmlst,
            identifier: LocusIdentifier::bare(protein_id),
            identity,
            e_value: 0.0,
            bitscore: 100.0,
            contig_id: format!("{}_length_40_cov_10.0", contig),
            contig_name: contig.into(),
            contig_start: start,
            contig_end: end,
            strand,
            contig_length: 40,
            contig_coverage: 10.0,
            subject_length: end - start + 1,
            reference_length: end as usize - start as usize + 1,
            reference_resolved: true,
            span: 1.0,
            instance: None,
        }
    }

    #[test]
    fn test_empty_catalog_starts_at_one() {
        let catalog = AlleleCatalog::new();
        let matcher = CatalogMatcher::default();
        assert_eq!(matcher.assign_allele(&catalog, ORG, PROT, "ACGTACGTAC"), Some(1));
        assert_eq!(catalog.entries(&CatalogKey::new(ORG, PROT)).len(), 1);
    }

    #[test]
    fn test_resubmission_is_stable() {
        let catalog = AlleleCatalog::new();
        let matcher = CatalogMatcher::default();
        let first = matcher.assign_allele(&catalog, ORG, PROT, "ACGTACGTAC");
        let second = matcher.assign_allele(&catalog, ORG, PROT, "ACGTACGTAC");
        assert_eq!(first, second);
        assert_eq!(catalog.get_stats(), (1, 1));
    }

    #[test]
    fn test_longer_sample_extends_entry() {
        let catalog = AlleleCatalog::new();
        let matcher = CatalogMatcher::default();
        let key = CatalogKey::new(ORG, PROT);
        matcher.assign_allele(&catalog, ORG, PROT, "ACGTACGTAC");

        assert_eq!(matcher.assign_allele(&catalog, ORG, PROT, "ACGTACGTACG"), Some(1));
        assert_eq!(catalog.entries(&key)[0].sequence, "ACGTACGTACG");

        // A shorter read of the same allele leaves the entry alone
        assert_eq!(matcher.assign_allele(&catalog, ORG, PROT, "CGTACGTACG"), Some(1));
        assert_eq!(catalog.entries(&key)[0].sequence, "ACGTACGTACG");
        assert_eq!(catalog.entries(&key).len(), 1);
    }

    #[test]
    fn test_novel_sequences_get_max_plus_one() {
        let catalog = AlleleCatalog::new();
        let matcher = CatalogMatcher::default();
        assert_eq!(matcher.assign_allele(&catalog, ORG, PROT, "ACGTACGTAC"), Some(1));
        assert_eq!(matcher.assign_allele(&catalog, ORG, PROT, "TTTTTTTTTT"), Some(2));
        assert_eq!(matcher.assign_allele(&catalog, ORG, PROT, "GGGGGGGGGG"), Some(3));
        // Other keys number independently
        assert_eq!(matcher.assign_allele(&catalog, ORG, "NP_459007.1", "TTTTTTTTTT"), Some(1));
    }

    #[test]
    fn test_containment_below_min_span_is_novel() {
        let catalog = AlleleCatalog::new();
        let matcher = CatalogMatcher::default();
        matcher.assign_allele(&catalog, ORG, PROT, "ACGTACGTAC");
        // 10 of 13 bases: contained but under 90%
        assert_eq!(matcher.assign_allele(&catalog, ORG, PROT, "ACGTACGTACGTA"), Some(2));

        // Exactly 90% still matches
        let loose = AlleleCatalog::new();
        matcher.assign_allele(&loose, ORG, PROT, "ACGTACGTA");
        assert_eq!(matcher.assign_allele(&loose, ORG, PROT, "ACGTACGTAC"), Some(1));
    }

    #[test]
    fn test_empty_sequence_is_not_called() {
        let catalog = AlleleCatalog::new();
        let matcher = CatalogMatcher::new(0.0);
        assert_eq!(matcher.min_span(), 0.0);

        assert_eq!(matcher.assign_allele(&catalog, ORG, PROT, "ACGTACGTAC"), Some(1));
        assert_eq!(matcher.assign_allele(&catalog, ORG, PROT, ""), None);
        assert_eq!(catalog.get_stats(), (1, 1));
        assert_eq!(catalog.entries(&CatalogKey::new(ORG, PROT))[0].sequence, "ACGTACGTAC");
    }

    #[test]
    fn test_fingerprint_sample() {
        let mut contigs = ContigSet::new();
        contigs.insert(
            "NODE_1_length_40_cov_10.0",
            b"aaaaaCCCCCGGGGGTTTTTacgtacgtacgtacgtacgt".to_vec(),
        );

        let hits = vec![
            cg_hit("NP_1.1", "NODE_1", 6, 15, Strand::Forward, 99.0),
            cg_hit("NP_2.1", "NODE_1", 11, 20, Strand::Reverse, 100.0),
            cg_hit("NP_1.1", "NODE_1", 1, 10, Strand::Forward, 100.0),
            cg_hit("NP_3.1", "NODE_9", 1, 10, Strand::Forward, 100.0),
            cg_hit("NP_4.1", "NODE_1", 35, 50, Strand::Forward, 100.0),
        ];

        let catalog = AlleleCatalog::new();
        let matcher = CatalogMatcher::default();
        let fingerprint = matcher.fingerprint_sample(&hits, &contigs, &catalog, ORG);

        assert_eq!(
            fingerprint,
            vec![("NP_1.1".to_string(), 1), ("NP_2.1".to_string(), 1)]
        );
        // Best NP_1.1 hit is the 100% one at 1..10
        assert_eq!(
            catalog.entries(&CatalogKey::new(ORG, "NP_1.1"))[0].sequence,
            "AAAAACCCCC"
        );
        // Reverse strand is reverse-complemented
        assert_eq!(
            catalog.entries(&CatalogKey::new(ORG, "NP_2.1"))[0].sequence,
            "AAAAACCCCC"
        );

        // Same sample again yields the same fingerprint
        let again = matcher.fingerprint_sample(&hits, &contigs, &catalog, ORG);
        assert_eq!(again, fingerprint);
        assert_eq!(catalog.get_stats(), (2, 2));
    }
}
