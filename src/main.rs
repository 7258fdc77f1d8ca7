// main.rs - CLI entry point

use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use sttyper::cli::Config;
use sttyper::prelude::*;

fn main() {
    if let Err(e) = run_main() {
        eprintln!("❌ ERROR: {}", e);
        std::process::exit(1);
    }
}

fn run_main() -> Result<(), String> {
    let mut args: Args = argh::from_env();
    let command_line = std::env::args().collect::<Vec<String>>().join(" ");

    // Handle generate config first
    if args.generate_config {
        let sample_config = Config::generate_sample();
        println!("{}", sample_config);
        println!("\n💡 Save this content to a .toml file and use --config /path/to/config.toml");
        return Ok(());
    }

    // Load configuration file if specified
    if let Some(config_path) = args.config.clone() {
        args = args.with_config_file(&config_path)?;
    }

    let filter = if args.verbose {
        EnvFilter::new("sttyper=debug,info")
    } else {
        EnvFilter::new("sttyper=warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    // Validate all arguments
    let validation = validate_args(&args)?;

    println!("🚀 {}", sttyper::get_info());
    println!("🧬 Track: {}", validation.track.description());
    println!("🔬 Sample: {}", validation.sample_id);

    // Configure thread pool
    if let Some(n) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .map_err(|e| format!("Failed to configure thread pool: {}", e))?;
        println!("🧵 Threads: {}", n);
    } else {
        println!("🧵 Threads: {} (auto-detected)", rayon::current_num_threads());
    }

    let hit_files = collect_hit_files(&validation.hits, validation.include_files_regex.as_ref())
        .map_err(|e| e.to_string())?;
    if hit_files.is_empty() {
        return Err(format!("No hit files found in {}", validation.hits.display()));
    }
    println!("📂 Hit files: {}", hit_files.len());

    let total_start = Instant::now();

    let references = match &args.references {
        Some(dir) => {
            let catalog = ReferenceCatalog::from_directory(Path::new(dir)).map_err(|e| e.to_string())?;
            let (sources, features) = catalog.get_stats();
            println!("📚 References: {} sources, {} features", sources, features);
            catalog
        }
        None => {
            println!("⚠️  No reference directory given, spans computed against length 1");
            ReferenceCatalog::new()
        }
    };

    if args.dry_run {
        println!("✅ Dry run completed successfully");
        return Ok(());
    }

    match validation.track {
        Track::Mlst => run_mlst(&args, &validation, &hit_files, &references, &command_line)?,
        Track::Resistance => {
            run_resistance(&args, &validation, &hit_files, &references, &command_line)?
        }
        Track::Cgmlst => run_cgmlst(&args, &validation, &hit_files, &references)?,
    }

    println!("⏱️  Total time: {:.2}s", total_start.elapsed().as_secs_f64());
    Ok(())
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::with_template(
        "[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
    ) {
        pb.set_style(style);
    }
    pb
}

/// Read every hit file, building the context of each with `context`
fn load_hits(
    files: &[PathBuf],
    references: &ReferenceCatalog,
    context: impl Fn(&Path) -> HitContext,
) -> Result<Vec<AlignmentHit>, String> {
    let pb = progress_bar(files.len());
    let mut hits = Vec::new();
    for path in files {
        pb.set_message(
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );
        let ctx = context(path);
        hits.extend(read_hits(path, &ctx, references).map_err(|e| e.to_string())?);
        pb.inc(1);
    }
    pb.finish_and_clear();
    println!("🎯 Hits loaded: {}", hits.len());
    Ok(hits)
}

fn organism(args: &Args) -> Result<&str, String> {
    args.organism
        .as_deref()
        .ok_or_else(|| "--organism is required".to_string())
}

fn run_mlst(
    args: &Args,
    validation: &ValidationResult,
    files: &[PathBuf],
    references: &ReferenceCatalog,
    command_line: &str,
) -> Result<(), String> {
    let organism = organism(args)?;
    let profiles_dir = args
        .profiles
        .as_deref()
        .ok_or_else(|| "--profiles is required".to_string())?;
    let profiles = ProfileRegistry::from_directory(Path::new(profiles_dir)).map_err(|e| e.to_string())?;
    println!("📋 Profile tables: {}", profiles.organisms().join(", "));

    let sample_id = validation.sample_id.as_str();
    let hits = load_hits(files, references, |_| {
        HitContext::new(sample_id, Track::Mlst).with_organism(organism)
    })?;

    let mut store = MemoryStore::new();
    store
        .samples
        .insert_if_absent(SampleRecord::new(sample_id, Some(organism.to_string())))
        .map_err(|e| e.to_string())?;
    store_hits(&mut store, hits).map_err(|e| e.to_string())?;

    let resolver = SequenceTypeResolver::new(&profiles, validation.st_config);
    let genotype = resolver
        .resolve_sample(&mut store, sample_id)
        .map_err(|e| e.to_string())?;

    match genotype.st {
        StCall::Assigned(st) => println!(
            "✅ ST{}{}{}",
            st,
            genotype
                .clonal_complex
                .as_deref()
                .map(|cc| format!(" ({})", cc))
                .unwrap_or_default(),
            if genotype.aux_st { " - ambiguous, best hit chosen" } else { "" }
        ),
        StCall::NoOrganism => println!("⚠️  No organism: ST {}", genotype.st),
        StCall::NovelCombination => println!("⚠️  Novel allele combination: ST {}", genotype.st),
        StCall::InsufficientLoci => println!("⚠️  Insufficient loci: ST {}", genotype.st),
    }
    println!("📊 Predictor hits: {}", genotype.predictors.len());

    if let Some(output) = &args.output {
        write_st_summary(output, std::slice::from_ref(&genotype), command_line)?;
    }
    Ok(())
}

fn run_resistance(
    args: &Args,
    validation: &ValidationResult,
    files: &[PathBuf],
    references: &ReferenceCatalog,
    command_line: &str,
) -> Result<(), String> {
    let lexicon_path = args
        .lexicon
        .as_deref()
        .ok_or_else(|| "--lexicon is required".to_string())?;
    let lexicon = ResistanceLexicon::from_file(Path::new(lexicon_path)).map_err(|e| e.to_string())?;
    println!("📖 Lexicon: {} genes", lexicon.len());

    let sample_id = validation.sample_id.as_str();
    let hits = load_hits(files, references, |path| resistance_context(sample_id, path))?;

    let resolver = ResistanceResolver::new(lexicon, validation.resolver_policy);
    let set = resolver.resolve(hits).map_err(|e| e.to_string())?;

    let mut store = MemoryStore::new();
    store_calls(&mut store, &set).map_err(|e| e.to_string())?;

    println!("✅ Resistance genes: {}", set.len());
    for call in &set.calls {
        println!(
            "   {} ({}) on {} [{:.1}%]",
            call.hit.identifier, call.resistance_class, call.hit.contig_name, call.hit.identity
        );
    }

    if let Some(output) = &args.output {
        write_resistance_calls(output, &set, command_line)?;
    }
    Ok(())
}

fn run_cgmlst(
    args: &Args,
    validation: &ValidationResult,
    files: &[PathBuf],
    references: &ReferenceCatalog,
) -> Result<(), String> {
    let organism = organism(args)?;
    let assembly = args
        .assembly
        .as_deref()
        .ok_or_else(|| "--assembly is required".to_string())?;
    let catalog_path = args
        .catalog
        .as_deref()
        .ok_or_else(|| "--catalog is required".to_string())?;

    let contigs = ContigSet::from_fasta(Path::new(assembly)).map_err(|e| e.to_string())?;
    println!("🧩 Contigs: {}", contigs.len());

    let catalog = AlleleCatalog::load(Path::new(catalog_path)).map_err(|e| e.to_string())?;
    let (loci, alleles) = catalog.get_stats();
    println!("🗂️  Allele catalog: {} loci, {} alleles", loci, alleles);
    println!("📏 Minimum span: {:.3}", validation.matcher.min_span());

    let sample_id = validation.sample_id.as_str();
    let hits = load_hits(files, references, |_| {
        HitContext::new(sample_id, Track::Cgmlst).with_organism(organism)
    })?;

    let fingerprint = validation
        .matcher
        .fingerprint_sample(&hits, &contigs, &catalog, organism);
    catalog.save(Path::new(catalog_path)).map_err(|e| e.to_string())?;

    let (loci_after, alleles_after) = catalog.get_stats();
    println!(
        "✅ Loci called: {} ({} new alleles, catalog now {} loci)",
        fingerprint.len(),
        alleles_after - alleles,
        loci_after
    );

    match &args.output {
        Some(output) => write_fingerprint(output, &fingerprint)?,
        None => {
            for (protein_id, allele) in &fingerprint {
                println!("{}:{}", protein_id, allele);
            }
        }
    }
    Ok(())
}
