// args.rs - Command line arguments definition

use argh::FromArgs;

#[derive(FromArgs)]
/// sttyper - Sequence typing, resistance calling and cgMLST allele calling from alignment hits
pub struct Args {
    /// analysis track: mlst, resistance, cgmlst (default: mlst)
    #[argh(option, default = "String::from(\"mlst\")")]
    pub track: String,

    /// sample identifier (default: name of the hits path)
    #[argh(option)]
    pub sample: Option<String>,

    /// organism of the sample, as named in the reference and profile folders
    #[argh(option)]
    pub organism: Option<String>,

    /// alignment hit file, or directory of hit files
    #[argh(option)]
    pub hits: Option<String>,

    /// assembled contigs FASTA (required for cgmlst)
    #[argh(option)]
    pub assembly: Option<String>,

    /// reference FASTA directory used for span computation
    #[argh(option)]
    pub references: Option<String>,

    /// directory of MLST profile tables, one file per organism
    #[argh(option)]
    pub profiles: Option<String>,

    /// resistance lexicon file (gene:description per line)
    #[argh(option)]
    pub lexicon: Option<String>,

    /// cgMLST allele catalog JSON file (created if missing)
    #[argh(option)]
    pub catalog: Option<String>,

    /// output file (ST summary, resistance calls or fingerprint, by track)
    #[argh(option)]
    pub output: Option<String>,

    /// minimum identity of high-confidence MLST hits (default: 99.9)
    #[argh(option, default = "99.9")]
    pub min_identity: f64,

    /// maximum e-value of high-confidence MLST hits (default: 0.0)
    #[argh(option, default = "0.0")]
    pub max_evalue: f64,

    /// minimum shorter/longer length ratio for a catalog match (0.0-1.0, default: 0.9)
    #[argh(option, default = "0.9")]
    pub catalog_min_span: f64,

    /// keep disjoint hits of the same gene on one contig (default: treat them as conflicting)
    #[argh(switch)]
    pub allow_gene_copies: bool,

    /// fail when a resistance gene is missing from the lexicon instead of skipping the hit
    #[argh(switch)]
    pub abort_on_unresolved: bool,

    /// include only hit files whose name matches regex pattern
    #[argh(option)]
    pub include_files: Option<String>,

    /// number of threads (default: auto-detect)
    #[argh(option)]
    pub threads: Option<usize>,

    /// validate inputs without computation (dry run)
    #[argh(switch)]
    pub dry_run: bool,

    /// verbose logging (debug level)
    #[argh(switch, short = 'v')]
    pub verbose: bool,

    /// path to TOML configuration file
    #[argh(option)]
    pub config: Option<String>,

    /// generate sample configuration file and exit
    #[argh(switch)]
    pub generate_config: bool,
}
