// mod.rs - Core typing logic module

pub mod cgmlst;
pub mod parser;
pub mod resistance;
pub mod sequence_type;

// Re-export main types for convenience
pub use cgmlst::{CatalogMatcher, Fingerprint, DEFAULT_MIN_SPAN};
pub use parser::{extract_protein_id, parse_line, HitContext, NO_HIT};
pub use resistance::{
    store_calls, ResistanceCall, ResistanceCallSet, ResistanceResolver, ResolverPolicy,
    UnresolvedPolicy,
};
pub use sequence_type::{store_hits, SampleGenotype, SequenceTypeResolver, StCall, StConfig};
