// mod.rs - File loaders

pub mod blast;
pub mod profile_tsv;

pub use blast::{collect_hit_files, read_hits, resistance_context};
