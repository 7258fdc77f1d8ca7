// lib.rs - sttyper library root

//! # sttyper - Isolate typing from alignment evidence
//!
//! This library turns tabular nucleotide alignment hits of an assembled
//! bacterial isolate into typing results:
//!
//! - **MLST**: allele calls per scheme locus resolved to a Sequence Type,
//!   with sentinel outcomes for control samples (-1), novel allele
//!   combinations (-2) and too few called loci (-3)
//! - **Resistance**: lexicon-canonicalized resistance genes with overlapping
//!   hits on the same contig reduced to the best one
//! - **cgMLST**: per-locus allele numbers from a shared, append-only allele
//!   catalog, emitted as a sample fingerprint
//!
//! Results are written through a typed storage contract ([`store`]); an
//! in-memory store is provided.
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use sttyper::prelude::*;
//! use std::path::Path;
//!
//! let references = ReferenceCatalog::from_directory(Path::new("references"))?;
//! let profiles = ProfileRegistry::from_directory(Path::new("profiles"))?;
//!
//! let ctx = HitContext::new("S1", Track::Mlst).with_organism("escherichia_coli");
//! let hits = read_hits(Path::new("S1/blast/loci_query_tab"), &ctx, &references)?;
//!
//! let mut store = MemoryStore::new();
//! store
//!     .samples
//!     .insert_if_absent(SampleRecord::new("S1", Some("escherichia_coli".into())))?;
//! store_hits(&mut store, hits)?;
//!
//! let resolver = SequenceTypeResolver::new(&profiles, StConfig::default());
//! let genotype = resolver.resolve_sample(&mut store, "S1")?;
//! println!("ST{}", genotype.st);
//! # Ok::<(), sttyper::TypingError>(())
//! ```

pub mod cli;
pub mod core;
pub mod data;
pub mod error;
pub mod output;
pub mod store;

// Convenience prelude for common imports
pub mod prelude {
    pub use crate::cli::{validate_args, Args, ValidationResult};
    pub use crate::core::{
        store_calls, store_hits, CatalogMatcher, Fingerprint, HitContext, ResistanceCallSet,
        ResistanceResolver, ResolverPolicy, SampleGenotype, SequenceTypeResolver, StCall,
        StConfig, UnresolvedPolicy,
    };
    pub use crate::data::loaders::{collect_hit_files, read_hits, resistance_context};
    pub use crate::data::{
        AlignmentHit, ContigSet, ProfileRegistry, ReferenceCatalog, ResistanceLexicon, Track,
    };
    pub use crate::error::{StoreError, TypingError};
    pub use crate::output::{write_fingerprint, write_resistance_calls, write_st_summary};
    pub use crate::store::{
        AlleleCatalog, MemoryStore, RecordStore, SampleRecord, TypingStore,
    };
}

// Re-export main types at the root level for convenience
pub use cli::{Args, ValidationResult};
pub use core::{SampleGenotype, StCall};
pub use data::{AlignmentHit, Track};
pub use error::{StoreError, TypingError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library information
pub fn get_info() -> String {
    format!(
        "sttyper v{} - MLST, resistance and cgMLST typing from alignment hits",
        VERSION
    )
}
