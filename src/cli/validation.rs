// validation.rs - Input validation utilities

use regex::Regex;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::cli::args::Args;
use crate::core::cgmlst::CatalogMatcher;
use crate::core::resistance::{ResolverPolicy, UnresolvedPolicy};
use crate::core::sequence_type::StConfig;
use crate::data::hit::Track;

/// Validated, typed view of the command line
pub struct ValidationResult {
    pub track: Track,
    pub hits: PathBuf,
    pub sample_id: String,
    pub st_config: StConfig,
    pub resolver_policy: ResolverPolicy,
    pub matcher: CatalogMatcher,
    pub include_files_regex: Option<Regex>,
}

fn require<'a>(value: &'a Option<String>, flag: &str, track: Track) -> Result<&'a str, String> {
    value
        .as_deref()
        .ok_or_else(|| format!("--{} is required for the {} track", flag, track_name(track)))
}

fn track_name(track: Track) -> &'static str {
    match track {
        Track::Mlst => "mlst",
        Track::Resistance => "resistance",
        Track::Cgmlst => "cgmlst",
    }
}

fn existing(path: &str, what: &str) -> Result<(), String> {
    if Path::new(path).exists() {
        Ok(())
    } else {
        Err(format!("{} does not exist: {}", what, path))
    }
}

/// Validate all command line arguments
pub fn validate_args(args: &Args) -> Result<ValidationResult, String> {
    let track = Track::from_str(&args.track)?;

    let hits = args
        .hits
        .as_deref()
        .ok_or_else(|| "--hits is required".to_string())?;
    existing(hits, "Hits path")?;
    let hits = PathBuf::from(hits);

    // Track-specific inputs
    match track {
        Track::Mlst => {
            require(&args.organism, "organism", track)?;
            existing(require(&args.profiles, "profiles", track)?, "Profile directory")?;
        }
        Track::Resistance => {
            existing(require(&args.lexicon, "lexicon", track)?, "Lexicon file")?;
        }
        Track::Cgmlst => {
            require(&args.organism, "organism", track)?;
            require(&args.catalog, "catalog", track)?;
            existing(require(&args.assembly, "assembly", track)?, "Assembly file")?;
        }
    }
    if let Some(references) = &args.references {
        existing(references, "Reference directory")?;
    }

    // Validate thresholds
    if !(0.0..=100.0).contains(&args.min_identity) {
        return Err("Minimum identity must be between 0.0 and 100.0".to_string());
    }
    if args.max_evalue < 0.0 {
        return Err("Maximum e-value must not be negative".to_string());
    }
    if !(0.0..=1.0).contains(&args.catalog_min_span) || args.catalog_min_span == 0.0 {
        return Err("Catalog minimum span must be in (0.0, 1.0]".to_string());
    }

    let sample_id = match &args.sample {
        Some(sample) => sample.clone(),
        None => hits
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| format!("Cannot derive a sample name from {}", hits.display()))?,
    };

    // Compile regex patterns
    let include_files_regex = if let Some(pattern) = &args.include_files {
        Some(Regex::new(pattern).map_err(|e| format!("Invalid include_files regex: {}", e))?)
    } else {
        None
    };

    Ok(ValidationResult {
        track,
        hits,
        sample_id,
        st_config: StConfig {
            min_identity: args.min_identity,
            max_evalue: args.max_evalue,
        },
        resolver_policy: ResolverPolicy {
            same_gene_conflicts: !args.allow_gene_copies,
            unresolved: if args.abort_on_unresolved {
                UnresolvedPolicy::Abort
            } else {
                UnresolvedPolicy::Skip
            },
        },
        matcher: CatalogMatcher::new(args.catalog_min_span),
        include_files_regex,
    })
}
