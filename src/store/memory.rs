// memory.rs - In-memory implementation of the storage contract

use std::collections::HashMap;
use tracing::debug;

use super::{Record, RecordFilter, RecordStore, SampleRecord, SeqTypeRecord, TypingStore};
use crate::core::resistance::ResistanceCall;
use crate::error::StoreError;

/// Insertion-ordered records with a key index
#[derive(Debug, Clone)]
pub struct Table<R: Record> {
    records: Vec<R>,
    index: HashMap<R::Key, usize>,
}

impl<R: Record> Default for Table<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<R: Record> Table<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.records.iter()
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.key(), i))
            .collect();
    }
}

impl<R: Record> RecordStore<R> for Table<R> {
    fn find_one(&self, filter: &R::Filter) -> Result<Option<R>, StoreError> {
        let mut found = self.records.iter().filter(|r| filter.matches(r));
        let first = found.next().cloned();
        let extra = found.count();
        if extra > 0 {
            return Err(StoreError::NotUnique {
                collection: R::COLLECTION,
                filter: format!("{:?}", filter),
                count: extra + 1,
            });
        }
        Ok(first)
    }

    fn find_many(&self, filter: &R::Filter) -> Result<Vec<R>, StoreError> {
        Ok(self
            .records
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    fn update_matching(
        &mut self,
        filter: &R::Filter,
        apply: &mut dyn FnMut(&mut R),
    ) -> Result<usize, StoreError> {
        let mut originals: Vec<(usize, R)> = Vec::new();
        let mut rekeyed = false;
        for (i, record) in self.records.iter_mut().enumerate() {
            if !filter.matches(record) {
                continue;
            }
            let before = record.clone();
            apply(record);
            rekeyed |= record.key() != before.key();
            originals.push((i, before));
        }
        if rekeyed {
            self.rebuild_index();
            if self.index.len() != self.records.len() {
                let count = self.records.len() - self.index.len() + 1;
                // A key collision leaves the table as it was
                for (i, before) in originals {
                    self.records[i] = before;
                }
                self.rebuild_index();
                return Err(StoreError::NotUnique {
                    collection: R::COLLECTION,
                    filter: format!("{:?}", filter),
                    count,
                });
            }
        }
        Ok(originals.len())
    }

    fn insert_if_absent(&mut self, record: R) -> Result<bool, StoreError> {
        let key = record.key();
        if self.index.contains_key(&key) {
            debug!("Duplicate {} record {:?} not inserted", R::COLLECTION, key);
            return Ok(false);
        }
        self.index.insert(key, self.records.len());
        self.records.push(record);
        Ok(true)
    }
}

/// All typing collections held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub samples: Table<SampleRecord>,
    pub seq_types: Table<SeqTypeRecord>,
    pub resistances: Table<ResistanceCall>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TypingStore for MemoryStore {
    type Samples = Table<SampleRecord>;
    type SeqTypes = Table<SeqTypeRecord>;
    type Resistances = Table<ResistanceCall>;

    fn samples(&self) -> &Self::Samples {
        &self.samples
    }

    fn samples_mut(&mut self) -> &mut Self::Samples {
        &mut self.samples
    }

    fn seq_types(&self) -> &Self::SeqTypes {
        &self.seq_types
    }

    fn seq_types_mut(&mut self) -> &mut Self::SeqTypes {
        &mut self.seq_types
    }

    fn resistances(&self) -> &Self::Resistances {
        &self.resistances
    }

    fn resistances_mut(&mut self) -> &mut Self::Resistances {
        &mut self.resistances
    }
}
