// catalog.rs - Per-organism cgMLST allele catalog

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::error::TypingError;

pub const CATALOG_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CatalogKey {
    pub organism: String,
    pub protein_id: String,
}

impl CatalogKey {
    pub fn new(organism: impl Into<String>, protein_id: impl Into<String>) -> Self {
        Self {
            organism: organism.into(),
            protein_id: protein_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlleleCatalogEntry {
    pub allele_number: u32,
    pub sequence: String,
    pub created: String,
    pub updated: String,
}

/// Alleles of one catalog key, ordered by allele number.
///
/// Numbers are assigned only by [`AlleleList::append`], so they are unique and
/// strictly increasing; entries are never removed.
#[derive(Debug, Clone, Default)]
pub struct AlleleList {
    entries: Vec<AlleleCatalogEntry>,
}

impl AlleleList {
    pub fn entries(&self) -> &[AlleleCatalogEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn max_allele(&self) -> u32 {
        self.entries.last().map(|e| e.allele_number).unwrap_or(0)
    }

    /// Add `sequence` under the next allele number and return it
    pub fn append(&mut self, sequence: String) -> u32 {
        let allele_number = self.max_allele() + 1;
        let now = chrono::Utc::now().to_rfc3339();
        self.entries.push(AlleleCatalogEntry {
            allele_number,
            sequence,
            created: now.clone(),
            updated: now,
        });
        allele_number
    }

    /// Replace the stored sequence of the entry at `index`
    pub fn extend(&mut self, index: usize, sequence: String) {
        let entry = &mut self.entries[index];
        entry.sequence = sequence;
        entry.updated = chrono::Utc::now().to_rfc3339();
    }

    fn from_entries(entries: Vec<AlleleCatalogEntry>) -> Result<Self, String> {
        let increasing = entries
            .windows(2)
            .all(|w| w[0].allele_number < w[1].allele_number);
        if !increasing || entries.first().map_or(false, |e| e.allele_number == 0) {
            return Err("allele numbers must start at 1 and strictly increase".to_string());
        }
        Ok(Self { entries })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogMetadata {
    pub version: String,
    pub created: String,
    pub last_modified: String,
    pub total_alleles: usize,
    pub unique_loci: usize,
    pub format_version: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogLocus {
    organism: String,
    protein_id: String,
    alleles: Vec<AlleleCatalogEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CatalogFile {
    metadata: CatalogMetadata,
    loci: Vec<CatalogLocus>,
}

type Slot = Arc<Mutex<AlleleList>>;

/// Shared, append-only allele catalog keyed by `(organism, protein_id)`.
///
/// Each key has its own lock: a find-or-create on one protein id holds that
/// key's mutex for the whole read-modify-append, while other keys proceed.
#[derive(Debug, Default)]
pub struct AlleleCatalog {
    slots: RwLock<HashMap<CatalogKey, Slot>>,
    created: Option<String>,
}

impl AlleleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &CatalogKey) -> Slot {
        if let Some(slot) = self.slots.read().get(key) {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write();
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    /// Run `f` with exclusive access to the alleles of `key`
    pub fn with_alleles<T>(&self, key: &CatalogKey, f: impl FnOnce(&mut AlleleList) -> T) -> T {
        let slot = self.slot(key);
        let mut alleles = slot.lock();
        f(&mut alleles)
    }

    /// Snapshot of the entries of `key`
    pub fn entries(&self, key: &CatalogKey) -> Vec<AlleleCatalogEntry> {
        match self.slots.read().get(key) {
            Some(slot) => slot.lock().entries().to_vec(),
            None => Vec::new(),
        }
    }

    /// Number of non-empty keys and total alleles
    pub fn get_stats(&self) -> (usize, usize) {
        let slots = self.slots.read();
        slots.values().fold((0, 0), |(loci, alleles), slot| {
            let n = slot.lock().len();
            if n > 0 {
                (loci + 1, alleles + n)
            } else {
                (loci, alleles)
            }
        })
    }

    /// Load a catalog saved with [`AlleleCatalog::save`]. A missing file
    /// yields an empty catalog.
    pub fn load(path: &Path) -> Result<Self, TypingError> {
        if !path.exists() {
            info!("No allele catalog at {}, starting empty", path.display());
            return Ok(Self::new());
        }
        let content = fs::read_to_string(path).map_err(|e| TypingError::io(path, e))?;
        let file: CatalogFile = serde_json::from_str(&content)
            .map_err(|e| TypingError::Catalog(format!("{}: {}", path.display(), e)))?;

        if file.metadata.format_version != CATALOG_FORMAT_VERSION {
            return Err(TypingError::Catalog(format!(
                "{}: unsupported format version {}",
                path.display(),
                file.metadata.format_version
            )));
        }

        let mut slots = HashMap::new();
        for locus in file.loci {
            let list = AlleleList::from_entries(locus.alleles).map_err(|e| {
                TypingError::Catalog(format!("{} {}: {}", locus.organism, locus.protein_id, e))
            })?;
            slots.insert(
                CatalogKey::new(locus.organism, locus.protein_id),
                Arc::new(Mutex::new(list)),
            );
        }

        let catalog = Self {
            slots: RwLock::new(slots),
            created: Some(file.metadata.created),
        };
        let (loci, alleles) = catalog.get_stats();
        info!(
            "Allele catalog loaded from {}: {} loci, {} alleles",
            path.display(),
            loci,
            alleles
        );
        Ok(catalog)
    }

    /// Write the catalog as JSON, replacing `path` atomically
    pub fn save(&self, path: &Path) -> Result<(), TypingError> {
        let mut loci: Vec<CatalogLocus> = {
            let slots = self.slots.read();
            slots
                .iter()
                .map(|(key, slot)| CatalogLocus {
                    organism: key.organism.clone(),
                    protein_id: key.protein_id.clone(),
                    alleles: slot.lock().entries().to_vec(),
                })
                .filter(|locus| !locus.alleles.is_empty())
                .collect()
        };
        loci.sort_by(|a, b| {
            (a.organism.as_str(), a.protein_id.as_str())
                .cmp(&(b.organism.as_str(), b.protein_id.as_str()))
        });

        let now = chrono::Utc::now().to_rfc3339();
        let metadata = CatalogMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            created: self.created.clone().unwrap_or_else(|| now.clone()),
            last_modified: now,
            total_alleles: loci.iter().map(|l| l.alleles.len()).sum(),
            unique_loci: loci.len(),
            format_version: CATALOG_FORMAT_VERSION,
        };

        let json = serde_json::to_string_pretty(&CatalogFile { metadata, loci })
            .map_err(|e| TypingError::Catalog(e.to_string()))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| TypingError::io(parent, e))?;
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json).map_err(|e| TypingError::io(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| TypingError::io(path, e))?;
        Ok(())
    }
}
