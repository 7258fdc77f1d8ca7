// mod.rs - Data structures module

pub mod contigs;
pub mod hit;
pub mod lexicon;
pub mod loaders;
pub mod profile;
pub mod reference;

// Re-export main types for convenience
pub use contigs::ContigSet;
pub use hit::{AlignmentHit, HitKey, LocusIdentifier, Strand, Track};
pub use lexicon::{GeneClass, ResistanceLexicon};
pub use profile::{ProfileRegistry, ProfileRow, ProfileTable};
pub use reference::ReferenceCatalog;
