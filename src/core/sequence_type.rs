// sequence_type.rs - Sequence type resolution from MLST allele hits

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::{self, Display};
use tracing::{debug, info, warn};

use crate::data::hit::{AlignmentHit, HitKey};
use crate::data::profile::{ProfileRegistry, ProfileRow, ProfileTable};
use crate::error::{StoreError, TypingError};
use crate::store::{
    HitFilter, Record, RecordStore, SampleFilter, SampleRecord, SeqTypeRecord, TypingStore,
};

/// Outcome of ST resolution. Indeterminate outcomes are data, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StCall {
    Assigned(u32),
    /// Sample has no organism, typically a control
    NoOrganism,
    /// Alleles were called but no profile row matches them
    NovelCombination,
    /// Fewer loci called than the scheme requires, even without thresholds
    InsufficientLoci,
}

impl StCall {
    /// Integer stored in the sample record: the ST, or -1/-2/-3
    pub fn code(&self) -> i64 {
        match self {
            StCall::Assigned(st) => *st as i64,
            StCall::NoOrganism => -1,
            StCall::NovelCombination => -2,
            StCall::InsufficientLoci => -3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            -1 => Some(StCall::NoOrganism),
            -2 => Some(StCall::NovelCombination),
            -3 => Some(StCall::InsufficientLoci),
            st if st > 0 => u32::try_from(st).ok().map(StCall::Assigned),
            _ => None,
        }
    }

    pub fn is_assigned(&self) -> bool {
        matches!(self, StCall::Assigned(_))
    }
}

impl Display for StCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Per-sample result of ST resolution
#[derive(Debug, Clone, PartialEq)]
pub struct SampleGenotype {
    pub sample_id: String,
    pub st: StCall,
    /// Loci called minus loci the scheme expects
    pub aux_alleles: i64,
    /// More than one profile row matched
    pub aux_st: bool,
    /// Hits flagged as authoritative for the call
    pub predictors: Vec<HitKey>,
    pub clonal_complex: Option<String>,
}

impl SampleGenotype {
    fn new(sample_id: &str, st: StCall) -> Self {
        Self {
            sample_id: sample_id.to_string(),
            st,
            aux_alleles: 0,
            aux_st: false,
            predictors: Vec::new(),
            clonal_complex: None,
        }
    }
}

/// Confidence thresholds for the first allele collection pass
#[derive(Debug, Clone, Copy)]
pub struct StConfig {
    pub min_identity: f64,
    pub max_evalue: f64,
}

impl Default for StConfig {
    fn default() -> Self {
        Self {
            min_identity: 99.9,
            max_evalue: 0.0,
        }
    }
}

/// Evidence totals of one candidate row
#[derive(Debug)]
struct StScore<'a> {
    row: &'a ProfileRow,
    id_sum: f64,
    eval_sum: f64,
    cc_sum: f64,
    predictors: Vec<HitKey>,
}

impl StScore<'_> {
    /// Identity sum desc, then e-value sum asc, then coverage sum desc
    fn cmp_evidence(&self, other: &Self) -> Ordering {
        self.id_sum
            .partial_cmp(&other.id_sum)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                other
                    .eval_sum
                    .partial_cmp(&self.eval_sum)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| {
                self.cc_sum
                    .partial_cmp(&other.cc_sum)
                    .unwrap_or(Ordering::Equal)
            })
    }
}

pub struct SequenceTypeResolver<'a> {
    profiles: &'a ProfileRegistry,
    config: StConfig,
}

impl<'a> SequenceTypeResolver<'a> {
    pub fn new(profiles: &'a ProfileRegistry, config: StConfig) -> Self {
        Self { profiles, config }
    }

    /// Resolve the ST of one sample, flag its predictor hits and write the
    /// result to the sample record
    pub fn resolve_sample<S: TypingStore>(
        &self,
        store: &mut S,
        sample_id: &str,
    ) -> Result<SampleGenotype, TypingError> {
        let record = store.samples().find_one(&SampleFilter::id(sample_id))?;
        let organism = match record.as_ref().and_then(|r| r.organism.clone()) {
            Some(organism) => organism,
            None => {
                warn!(
                    "No organism set for {}, most likely a control sample. Setting ST to -1",
                    sample_id
                );
                let genotype = SampleGenotype::new(sample_id, StCall::NoOrganism);
                if record.is_some() {
                    write_sample(store, &genotype, false)?;
                }
                return Ok(genotype);
            }
        };

        let table = self
            .profiles
            .get(&organism)
            .ok_or_else(|| TypingError::MissingProfile(organism.clone()))?;

        let strict = HitFilter::sample(sample_id)
            .with_confidence(self.config.min_identity, self.config.max_evalue);
        let mut alleles = collect_alleles(&store.seq_types().find_many(&strict)?);
        let mut overabundance = allele_overabundance(&alleles, table);
        let mut relaxed = false;

        if overabundance < 0 {
            debug!(
                "Sample {}: {} loci above thresholds, retrying with all hits",
                sample_id,
                alleles.len()
            );
            relaxed = true;
            alleles = collect_alleles(&store.seq_types().find_many(&HitFilter::sample(sample_id))?);
            overabundance = allele_overabundance(&alleles, table);
            if overabundance < 0 {
                warn!(
                    "Insufficient allele hits to establish ST for sample {} ({}), even without thresholds. Setting ST to -3",
                    sample_id, organism
                );
                let mut genotype = SampleGenotype::new(sample_id, StCall::InsufficientLoci);
                genotype.aux_alleles = overabundance;
                genotype.predictors = flag_all(store, sample_id)?;
                write_sample(store, &genotype, false)?;
                return Ok(genotype);
            }
        }

        let mut genotype = SampleGenotype::new(sample_id, StCall::NovelCombination);
        genotype.aux_alleles = overabundance;

        let candidates = table.matching_rows(&alleles);
        let hits = store.seq_types().find_many(&HitFilter::sample(sample_id))?;
        let Some(best) = best_st(table, &candidates, &hits) else {
            warn!(
                "Sample {} on {} has a single allele set but no matching ST. \
                 Either incorrectly called allele, or novel ST has been found. Setting ST to -2",
                sample_id, organism
            );
            genotype.predictors = flag_all(store, sample_id)?;
            write_sample(store, &genotype, true)?;
            return Ok(genotype);
        };

        if candidates.len() > 1 {
            genotype.aux_st = true;
            let sts: Vec<String> = candidates.iter().map(|r| r.st.to_string()).collect();
            if !relaxed {
                warn!(
                    "Multiple ST within threshold found for sample {}, list: [{}]. Established ST{} as best hit",
                    sample_id,
                    sts.join(", "),
                    best.row.st
                );
            }
        }

        genotype.st = StCall::Assigned(best.row.st);
        genotype.clonal_complex = best.row.clonal_complex.clone();
        set_predictors(store, sample_id, &best.predictors)?;
        genotype.predictors = best.predictors;
        write_sample(store, &genotype, true)?;

        info!(
            "Sample {} ({}): ST{}{}",
            sample_id,
            organism,
            genotype.st,
            if genotype.aux_st { " (ambiguous)" } else { "" }
        );
        Ok(genotype)
    }
}

/// Store MLST hits, skipping ones already present. Returns the number inserted.
pub fn store_hits<S: TypingStore>(
    store: &mut S,
    hits: Vec<AlignmentHit>,
) -> Result<usize, StoreError> {
    let mut inserted = 0;
    for hit in hits {
        if store.seq_types_mut().insert_if_absent(SeqTypeRecord::new(hit))? {
            inserted += 1;
        }
    }
    Ok(inserted)
}

/// Distinct allele numbers per locus, in first-seen order
fn collect_alleles(records: &[SeqTypeRecord]) -> BTreeMap<String, Vec<u32>> {
    let mut alleles: BTreeMap<String, Vec<u32>> = BTreeMap::new();
    for record in records {
        let Some(allele) = record.hit.allele() else {
            continue;
        };
        let seen = alleles.entry(record.hit.locus().to_string()).or_default();
        if !seen.contains(&allele) {
            seen.push(allele);
        }
    }
    alleles
}

fn allele_overabundance(alleles: &BTreeMap<String, Vec<u32>>, table: &ProfileTable) -> i64 {
    alleles.len() as i64 - table.scheme_size() as i64
}

/// Score every candidate row and return the best, or `None` when no row
/// matched. A full tie keeps the earlier row.
fn best_st<'a>(
    table: &ProfileTable,
    candidates: &[&'a ProfileRow],
    hits: &[SeqTypeRecord],
) -> Option<StScore<'a>> {
    candidates
        .iter()
        .map(|row| score_row(table, row, hits))
        .reduce(|best, score| {
            if score.cmp_evidence(&best) == Ordering::Greater {
                score
            } else {
                best
            }
        })
}

/// Sum the evidence of the best hit at each scheme locus for the row's allele
fn score_row<'a>(table: &ProfileTable, row: &'a ProfileRow, hits: &[SeqTypeRecord]) -> StScore<'a> {
    let mut score = StScore {
        row,
        id_sum: 0.0,
        eval_sum: 0.0,
        cc_sum: 0.0,
        predictors: Vec::new(),
    };

    for (locus, allele) in table.loci.iter().zip(&row.alleles) {
        let best = hits
            .iter()
            .map(|r| &r.hit)
            .filter(|h| h.locus() == locus.as_str() && h.allele() == Some(*allele))
            .reduce(|best, h| {
                if h.evidence_cmp(best) == Ordering::Greater {
                    h
                } else {
                    best
                }
            });

        if let Some(hit) = best {
            score.id_sum += hit.identity;
            score.eval_sum += hit.e_value;
            score.cc_sum += hit.contig_coverage;
            score.predictors.push(hit.key());
        }
    }
    score
}

/// Clear every predictor flag of the sample, then flag exactly `keys`
fn set_predictors<S: TypingStore>(
    store: &mut S,
    sample_id: &str,
    keys: &[HitKey],
) -> Result<(), StoreError> {
    store
        .seq_types_mut()
        .update_matching(&HitFilter::sample(sample_id), &mut |r| r.st_predictor = false)?;
    for key in keys {
        store
            .seq_types_mut()
            .update_matching(&HitFilter::key(key.clone()), &mut |r| r.st_predictor = true)?;
    }
    Ok(())
}

/// Flag every hit of the sample, so reports show all evidence
fn flag_all<S: TypingStore>(store: &mut S, sample_id: &str) -> Result<Vec<HitKey>, StoreError> {
    let filter = HitFilter::sample(sample_id);
    store
        .seq_types_mut()
        .update_matching(&filter, &mut |r| r.st_predictor = true)?;
    Ok(store
        .seq_types()
        .find_many(&filter)?
        .into_iter()
        .map(|r| r.key())
        .collect())
}

fn write_sample<S: TypingStore>(
    store: &mut S,
    genotype: &SampleGenotype,
    with_aux_alleles: bool,
) -> Result<(), StoreError> {
    let st = genotype.st.code();
    let aux_alleles = with_aux_alleles.then_some(genotype.aux_alleles);
    let aux_st = genotype.aux_st;
    let clonal_complex = genotype.clonal_complex.clone();
    store.samples_mut().update_one(
        &SampleFilter::id(genotype.sample_id.as_str()),
        &mut |r: &mut SampleRecord| {
            r.st = Some(st);
            if aux_alleles.is_some() {
                r.aux_alleles = aux_alleles;
            }
            r.aux_st = aux_st;
            r.clonal_complex = clonal_complex.clone();
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::hit::{LocusIdentifier, Strand, Track};
    use crate::store::MemoryStore;

    fn mlst_hit(
        identifier: &str,
        contig: &str,
        identity: f64,
        e_value: f64,
        coverage: f64,
    ) -> AlignmentHit {
        AlignmentHit {
            sample_id: "S1".into(),
            track: Track::Mlst,
            identifier: LocusIdentifier::decompose(identifier).unwrap(),
            identity,
            e_value,
            bitscore: 800.0,
            contig_id: format!("{}_length_50000_cov_{}", contig, coverage),
            contig_name: contig.into(),
            contig_start: 1,
            contig_end: 450,
            strand: Strand::Forward,
            contig_length: 50000,
            contig_coverage: coverage,
            subject_length: 450,
            reference_length: 450,
            reference_resolved: true,
            span: 1.0,
            instance: None,
        }
    }

    fn three_locus_scheme() -> ProfileRegistry {
        let mut table = ProfileTable::new(
            "ecoli",
            vec!["adk".into(), "fumC".into(), "gyrB".into()],
            true,
        );
        for (st, alleles) in [(1, [1, 1, 1]), (2, [1, 2, 1]), (3, [2, 2, 1])] {
            table.push_row(ProfileRow {
                st,
                alleles: alleles.to_vec(),
                clonal_complex: Some(format!("CC{}", st)),
            });
        }
        let mut registry = ProfileRegistry::new();
        registry.register(table);
        registry
    }

    fn store_with(organism: Option<&str>, hits: Vec<AlignmentHit>) -> MemoryStore {
        let mut store = MemoryStore::new();
        store
            .samples
            .insert_if_absent(SampleRecord::new("S1", organism.map(String::from)))
            .unwrap();
        store_hits(&mut store, hits).unwrap();
        store
    }

    fn predictors(store: &MemoryStore) -> Vec<String> {
        store
            .seq_types
            .iter()
            .filter(|r| r.st_predictor)
            .map(|r| format!("{}@{}", r.hit.identifier, r.hit.contig_name))
            .collect()
    }

    fn sample(store: &MemoryStore) -> SampleRecord {
        store.samples.find_one(&SampleFilter::id("S1")).unwrap().unwrap()
    }

    #[test]
    fn test_st_code_round_trip() {
        for call in [
            StCall::Assigned(131),
            StCall::NoOrganism,
            StCall::NovelCombination,
            StCall::InsufficientLoci,
        ] {
            assert_eq!(StCall::from_code(call.code()), Some(call));
        }
        assert_eq!(StCall::from_code(0), None);
        assert_eq!(StCall::from_code(-4), None);
    }

    /// One locus `abc` where allele 1 is ST5 and allele 2 is ST9
    fn two_st_scheme() -> ProfileRegistry {
        let mut table = ProfileTable::new("ecoli", vec!["abc".into()], false);
        table.push_row(ProfileRow { st: 5, alleles: vec![1], clonal_complex: None });
        table.push_row(ProfileRow { st: 9, alleles: vec![2], clonal_complex: None });
        let mut registry = ProfileRegistry::new();
        registry.register(table);
        registry
    }

    #[test]
    fn test_scorer_prefers_higher_identity() {
        let registry = two_st_scheme();

        let mut store = store_with(
            Some("ecoli"),
            vec![
                mlst_hit("abc_1", "NODE_1", 100.0, 0.0, 50.0),
                mlst_hit("abc_2", "NODE_2", 99.9, 0.0, 40.0),
            ],
        );

        let resolver = SequenceTypeResolver::new(&registry, StConfig::default());
        let genotype = resolver.resolve_sample(&mut store, "S1").unwrap();

        assert_eq!(genotype.st, StCall::Assigned(5));
        assert!(genotype.aux_st);
        assert_eq!(genotype.aux_alleles, 0);
        assert_eq!(predictors(&store), vec!["abc_1@NODE_1"]);

        let record = sample(&store);
        assert_eq!(record.st, Some(5));
        assert!(record.aux_st);
    }

    #[test]
    fn test_scorer_identity_tie_prefers_lower_evalue() {
        let registry = two_st_scheme();
        let mut store = store_with(
            Some("ecoli"),
            vec![
                mlst_hit("abc_1", "NODE_1", 100.0, 1e-20, 80.0),
                mlst_hit("abc_2", "NODE_2", 100.0, 1e-50, 10.0),
            ],
        );

        let config = StConfig {
            min_identity: 99.9,
            max_evalue: 1.0,
        };
        let resolver = SequenceTypeResolver::new(&registry, config);
        let genotype = resolver.resolve_sample(&mut store, "S1").unwrap();

        assert_eq!(genotype.st, StCall::Assigned(9));
        assert!(genotype.st.is_assigned());
        assert!(genotype.aux_st);
        assert_eq!(predictors(&store), vec!["abc_2@NODE_2"]);
    }

    #[test]
    fn test_scorer_identity_and_evalue_tie_prefers_coverage() {
        let registry = two_st_scheme();
        let mut store = store_with(
            Some("ecoli"),
            vec![
                mlst_hit("abc_1", "NODE_1", 100.0, 0.0, 30.0),
                mlst_hit("abc_2", "NODE_2", 100.0, 0.0, 50.0),
            ],
        );

        let resolver = SequenceTypeResolver::new(&registry, StConfig::default());
        let genotype = resolver.resolve_sample(&mut store, "S1").unwrap();

        assert_eq!(genotype.st, StCall::Assigned(9));
        assert!(genotype.aux_st);
        assert_eq!(predictors(&store), vec!["abc_2@NODE_2"]);
        assert_eq!(sample(&store).st, Some(9));
    }

    #[test]
    fn test_unique_profile_match() {
        let registry = three_locus_scheme();
        let mut store = store_with(
            Some("ecoli"),
            vec![
                mlst_hit("adk_1", "NODE_1", 100.0, 0.0, 30.0),
                mlst_hit("fumC_2", "NODE_4", 100.0, 0.0, 30.0),
                mlst_hit("gyrB_1", "NODE_9", 100.0, 0.0, 30.0),
            ],
        );

        let resolver = SequenceTypeResolver::new(&registry, StConfig::default());
        let genotype = resolver.resolve_sample(&mut store, "S1").unwrap();

        assert_eq!(genotype.st, StCall::Assigned(2));
        assert!(!genotype.aux_st);
        assert_eq!(genotype.clonal_complex.as_deref(), Some("CC2"));
        assert_eq!(genotype.predictors.len(), 3);
        assert_eq!(predictors(&store).len(), 3);

        let record = sample(&store);
        assert_eq!(record.st, Some(2));
        assert_eq!(record.aux_alleles, Some(0));
        assert_eq!(record.clonal_complex.as_deref(), Some("CC2"));
    }

    #[test]
    fn test_no_organism() {
        let registry = three_locus_scheme();
        let resolver = SequenceTypeResolver::new(&registry, StConfig::default());

        let mut store = store_with(None, vec![mlst_hit("adk_1", "NODE_1", 100.0, 0.0, 30.0)]);
        let genotype = resolver.resolve_sample(&mut store, "S1").unwrap();
        assert_eq!(genotype.st, StCall::NoOrganism);
        assert!(!genotype.st.is_assigned());
        assert_eq!(sample(&store).st, Some(-1));

        // No sample record at all
        let mut empty = MemoryStore::new();
        let genotype = resolver.resolve_sample(&mut empty, "S7").unwrap();
        assert_eq!(genotype.st.code(), -1);
    }

    #[test]
    fn test_novel_combination_flags_all_hits() {
        let registry = three_locus_scheme();
        let mut store = store_with(
            Some("ecoli"),
            vec![
                mlst_hit("adk_2", "NODE_1", 100.0, 0.0, 30.0),
                mlst_hit("fumC_1", "NODE_2", 100.0, 0.0, 30.0),
                mlst_hit("gyrB_1", "NODE_3", 100.0, 0.0, 30.0),
            ],
        );

        let resolver = SequenceTypeResolver::new(&registry, StConfig::default());
        let genotype = resolver.resolve_sample(&mut store, "S1").unwrap();

        assert_eq!(genotype.st.code(), -2);
        assert_eq!(predictors(&store).len(), 3);
        assert_eq!(sample(&store).st, Some(-2));
    }

    #[test]
    fn test_insufficient_loci() {
        let registry = three_locus_scheme();
        let mut store = store_with(
            Some("ecoli"),
            vec![
                mlst_hit("adk_1", "NODE_1", 100.0, 0.0, 30.0),
                mlst_hit("fumC_1", "NODE_2", 100.0, 0.0, 30.0),
            ],
        );

        let resolver = SequenceTypeResolver::new(&registry, StConfig::default());
        let genotype = resolver.resolve_sample(&mut store, "S1").unwrap();

        assert_eq!(genotype.st, StCall::InsufficientLoci);
        assert_eq!(genotype.aux_alleles, -1);
        assert_eq!(predictors(&store).len(), 2);

        let record = sample(&store);
        assert_eq!(record.st, Some(-3));
        assert_eq!(record.aux_alleles, None);
    }

    #[test]
    fn test_relaxed_pass_uses_low_confidence_hits() {
        let registry = three_locus_scheme();
        let mut store = store_with(
            Some("ecoli"),
            vec![
                mlst_hit("adk_1", "NODE_1", 100.0, 0.0, 30.0),
                mlst_hit("fumC_1", "NODE_2", 100.0, 0.0, 30.0),
                mlst_hit("gyrB_1", "NODE_3", 97.5, 1e-30, 30.0),
            ],
        );

        let resolver = SequenceTypeResolver::new(&registry, StConfig::default());
        let genotype = resolver.resolve_sample(&mut store, "S1").unwrap();
        assert_eq!(genotype.st, StCall::Assigned(1));
        assert_eq!(genotype.predictors.len(), 3);
    }

    #[test]
    fn test_missing_profile_is_an_error() {
        let registry = three_locus_scheme();
        let mut store = store_with(Some("saureus"), vec![]);
        let resolver = SequenceTypeResolver::new(&registry, StConfig::default());
        assert!(matches!(
            resolver.resolve_sample(&mut store, "S1"),
            Err(TypingError::MissingProfile(o)) if o == "saureus"
        ));
    }

    #[test]
    fn test_one_predictor_per_locus_and_reset() {
        let registry = three_locus_scheme();
        let mut store = store_with(
            Some("ecoli"),
            vec![
                mlst_hit("adk_1", "NODE_1", 100.0, 0.0, 12.0),
                mlst_hit("adk_1", "NODE_5", 100.0, 0.0, 45.0),
                mlst_hit("fumC_1", "NODE_2", 100.0, 0.0, 30.0),
                mlst_hit("gyrB_1", "NODE_3", 100.0, 0.0, 30.0),
            ],
        );
        // Stale flag from an earlier run
        store
            .seq_types
            .update_matching(&HitFilter::sample("S1"), &mut |r| r.st_predictor = true)
            .unwrap();

        let resolver = SequenceTypeResolver::new(&registry, StConfig::default());
        let genotype = resolver.resolve_sample(&mut store, "S1").unwrap();
        assert_eq!(genotype.st, StCall::Assigned(1));

        let flagged = predictors(&store);
        assert_eq!(flagged.len(), 3);
        assert!(flagged.contains(&"adk_1@NODE_5".to_string()));
        assert!(!flagged.contains(&"adk_1@NODE_1".to_string()));

        let keys: Vec<HitKey> = store
            .seq_types
            .iter()
            .filter(|r| r.st_predictor)
            .map(|r| r.key())
            .collect();
        assert_eq!(keys, genotype.predictors);
    }
}
