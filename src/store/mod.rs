// mod.rs - Storage contract for typing results

//! Typed storage interface the typing core writes through.
//!
//! The core never builds query strings: every collection has a typed filter
//! struct and a store exposes four operations per record type
//! (`find_one`, `find_many`, `update_matching`, `insert_if_absent`).
//! `update_one` is derived from them and enforces the unique-record
//! invariant; a violation is a hard [`StoreError`].

pub mod catalog;
pub mod memory;

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;

use crate::core::resistance::ResistanceCall;
use crate::data::hit::{AlignmentHit, HitKey};
use crate::error::StoreError;

pub use catalog::{AlleleCatalog, AlleleCatalogEntry, CatalogKey};
pub use memory::{MemoryStore, Table};

/// A stored record with a unique key and a typed filter
pub trait Record: Clone {
    type Key: Eq + Hash + Clone + Debug;
    type Filter: RecordFilter<Self> + Debug;

    const COLLECTION: &'static str;

    fn key(&self) -> Self::Key;
}

pub trait RecordFilter<R> {
    fn matches(&self, record: &R) -> bool;
}

/// Operations the typing core requires of a storage engine
pub trait RecordStore<R: Record> {
    /// The single matching record. More than one match is a contract violation.
    fn find_one(&self, filter: &R::Filter) -> Result<Option<R>, StoreError>;

    fn find_many(&self, filter: &R::Filter) -> Result<Vec<R>, StoreError>;

    /// Apply `apply` to every matching record, returning how many changed
    fn update_matching(
        &mut self,
        filter: &R::Filter,
        apply: &mut dyn FnMut(&mut R),
    ) -> Result<usize, StoreError>;

    /// Insert unless a record with the same key exists. Returns whether it was inserted.
    fn insert_if_absent(&mut self, record: R) -> Result<bool, StoreError>;

    /// Update exactly one record
    fn update_one(
        &mut self,
        filter: &R::Filter,
        apply: &mut dyn FnMut(&mut R),
    ) -> Result<(), StoreError> {
        match self.find_many(filter)?.len() {
            1 => {
                self.update_matching(filter, apply)?;
                Ok(())
            }
            0 => Err(StoreError::NotFound {
                collection: R::COLLECTION,
                filter: format!("{:?}", filter),
            }),
            count => Err(StoreError::NotUnique {
                collection: R::COLLECTION,
                filter: format!("{:?}", filter),
                count,
            }),
        }
    }
}

/// The three collections a typing run reads and writes
pub trait TypingStore {
    type Samples: RecordStore<SampleRecord>;
    type SeqTypes: RecordStore<SeqTypeRecord>;
    type Resistances: RecordStore<ResistanceCall>;

    fn samples(&self) -> &Self::Samples;
    fn samples_mut(&mut self) -> &mut Self::Samples;
    fn seq_types(&self) -> &Self::SeqTypes;
    fn seq_types_mut(&mut self) -> &mut Self::SeqTypes;
    fn resistances(&self) -> &Self::Resistances;
    fn resistances_mut(&mut self) -> &mut Self::Resistances;
}

// ============================================================================
// SAMPLES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub sample_id: String,
    pub organism: Option<String>,
    /// ST or sentinel code (-1, -2, -3)
    pub st: Option<i64>,
    pub aux_alleles: Option<i64>,
    pub aux_st: bool,
    pub clonal_complex: Option<String>,
}

impl SampleRecord {
    pub fn new(sample_id: impl Into<String>, organism: Option<String>) -> Self {
        Self {
            sample_id: sample_id.into(),
            organism,
            st: None,
            aux_alleles: None,
            aux_st: false,
            clonal_complex: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SampleFilter {
    pub sample_id: Option<String>,
    pub organism: Option<String>,
}

impl SampleFilter {
    pub fn id(sample_id: impl Into<String>) -> Self {
        Self {
            sample_id: Some(sample_id.into()),
            ..Self::default()
        }
    }

    pub fn organism(organism: impl Into<String>) -> Self {
        Self {
            organism: Some(organism.into()),
            ..Self::default()
        }
    }
}

impl RecordFilter<SampleRecord> for SampleFilter {
    fn matches(&self, record: &SampleRecord) -> bool {
        self.sample_id
            .as_ref()
            .map_or(true, |id| &record.sample_id == id)
            && self
                .organism
                .as_ref()
                .map_or(true, |o| record.organism.as_ref() == Some(o))
    }
}

impl Record for SampleRecord {
    type Key = String;
    type Filter = SampleFilter;

    const COLLECTION: &'static str = "samples";

    fn key(&self) -> String {
        self.sample_id.clone()
    }
}

// ============================================================================
// SEQUENCE TYPE HITS
// ============================================================================

/// A stored MLST hit and whether it is authoritative for the sample's ST
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeqTypeRecord {
    pub hit: AlignmentHit,
    pub st_predictor: bool,
}

impl SeqTypeRecord {
    pub fn new(hit: AlignmentHit) -> Self {
        Self {
            hit,
            st_predictor: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HitFilter {
    pub key: Option<HitKey>,
    pub sample_id: Option<String>,
    pub min_identity: Option<f64>,
    pub max_evalue: Option<f64>,
    pub predictor: Option<bool>,
}

impl HitFilter {
    pub fn sample(sample_id: impl Into<String>) -> Self {
        Self {
            sample_id: Some(sample_id.into()),
            ..Self::default()
        }
    }

    pub fn key(key: HitKey) -> Self {
        Self {
            key: Some(key),
            ..Self::default()
        }
    }

    /// Keep hits with identity >= `min_identity` and e-value <= `max_evalue`
    pub fn with_confidence(mut self, min_identity: f64, max_evalue: f64) -> Self {
        self.min_identity = Some(min_identity);
        self.max_evalue = Some(max_evalue);
        self
    }

    pub fn with_predictor(mut self, predictor: bool) -> Self {
        self.predictor = Some(predictor);
        self
    }
}

impl RecordFilter<SeqTypeRecord> for HitFilter {
    fn matches(&self, record: &SeqTypeRecord) -> bool {
        let hit = &record.hit;
        self.key.as_ref().map_or(true, |k| &hit.key() == k)
            && self.sample_id.as_ref().map_or(true, |s| &hit.sample_id == s)
            && self.min_identity.map_or(true, |m| hit.identity >= m)
            && self.max_evalue.map_or(true, |m| hit.e_value <= m)
            && self.predictor.map_or(true, |p| record.st_predictor == p)
    }
}

impl Record for SeqTypeRecord {
    type Key = HitKey;
    type Filter = HitFilter;

    const COLLECTION: &'static str = "seq_types";

    fn key(&self) -> HitKey {
        self.hit.key()
    }
}

// ============================================================================
// RESISTANCES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResistanceKey {
    pub sample_id: String,
    pub gene: String,
    pub instance: Option<String>,
    pub contig_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct ResistanceFilter {
    pub sample_id: Option<String>,
    pub resistance_class: Option<String>,
}

impl ResistanceFilter {
    pub fn sample(sample_id: impl Into<String>) -> Self {
        Self {
            sample_id: Some(sample_id.into()),
            ..Self::default()
        }
    }
}

impl RecordFilter<ResistanceCall> for ResistanceFilter {
    fn matches(&self, record: &ResistanceCall) -> bool {
        self.sample_id
            .as_ref()
            .map_or(true, |s| &record.hit.sample_id == s)
            && self
                .resistance_class
                .as_ref()
                .map_or(true, |c| &record.resistance_class == c)
    }
}

impl Record for ResistanceCall {
    type Key = ResistanceKey;
    type Filter = ResistanceFilter;

    const COLLECTION: &'static str = "resistances";

    fn key(&self) -> ResistanceKey {
        ResistanceKey {
            sample_id: self.hit.sample_id.clone(),
            gene: self.hit.locus().to_string(),
            instance: self.hit.instance.clone(),
            contig_name: self.hit.contig_name.clone(),
        }
    }
}
