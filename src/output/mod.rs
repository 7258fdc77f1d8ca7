// mod.rs - Output formatters module

use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::core::cgmlst::Fingerprint;
use crate::core::resistance::ResistanceCallSet;
use crate::core::sequence_type::SampleGenotype;
use crate::data::hit::Strand;

/// Ensure parent directory exists before creating file
fn ensure_parent_dir(file_path: &str) -> Result<(), String> {
    if let Some(parent) = Path::new(file_path).parent() {
        create_dir_all(parent)
            .map_err(|e| format!("Failed to create parent directory '{}': {}", parent.display(), e))?;
    }
    Ok(())
}

fn create(file_path: &str) -> Result<BufWriter<File>, String> {
    ensure_parent_dir(file_path)?;
    let file = File::create(file_path)
        .map_err(|e| format!("Failed to create output file '{}': {}", file_path, e))?;
    Ok(BufWriter::new(file))
}

fn write_err(e: std::io::Error) -> String {
    format!("Write error: {}", e)
}

fn write_header<W: Write>(writer: &mut W, command_line: &str) -> Result<(), String> {
    writeln!(writer, "# Command: {}", command_line).map_err(write_err)?;
    writeln!(
        writer,
        "# Generated: {}",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    )
    .map_err(write_err)?;
    writeln!(writer, "# sttyper v{}", env!("CARGO_PKG_VERSION")).map_err(write_err)?;
    Ok(())
}

/// Write one `protein_id:allele_number` line per called locus
pub fn write_fingerprint(file_path: &str, fingerprint: &Fingerprint) -> Result<(), String> {
    let mut writer = create(file_path)?;
    for (protein_id, allele) in fingerprint {
        writeln!(writer, "{}:{}", protein_id, allele).map_err(write_err)?;
    }
    writer.flush().map_err(|e| format!("Flush error: {}", e))?;
    println!("✅ Fingerprint ({} loci) written to: {}", fingerprint.len(), file_path);
    Ok(())
}

/// Write resistance calls in TSV format
pub fn write_resistance_calls(
    file_path: &str,
    set: &ResistanceCallSet,
    command_line: &str,
) -> Result<(), String> {
    let mut writer = create(file_path)?;
    write_header(&mut writer, command_line)?;
    writeln!(
        writer,
        "Sample\tGene\tCanonical_gene\tClass\tDatabase\tContig\tStart\tEnd\tStrand\tIdentity\tSpan\tQuality\tReference_resolved"
    )
    .map_err(write_err)?;

    for call in &set.calls {
        let hit = &call.hit;
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.2}\t{:.3}\t{:.2}\t{}",
            hit.sample_id,
            hit.identifier,
            call.canonical_gene,
            call.resistance_class,
            hit.instance.as_deref().unwrap_or("NA"),
            hit.contig_name,
            hit.contig_start,
            hit.contig_end,
            match hit.strand {
                Strand::Forward => "+",
                Strand::Reverse => "-",
            },
            hit.identity,
            hit.span,
            call.quality(),
            hit.reference_resolved,
        )
        .map_err(write_err)?;
    }

    writer.flush().map_err(|e| format!("Flush error: {}", e))?;
    println!("✅ Resistance calls ({}) written to: {}", set.len(), file_path);
    Ok(())
}

/// Write ST results in TSV format, one line per sample
pub fn write_st_summary(
    file_path: &str,
    genotypes: &[SampleGenotype],
    command_line: &str,
) -> Result<(), String> {
    let mut writer = create(file_path)?;
    write_header(&mut writer, command_line)?;
    writeln!(writer, "Sample\tST\tClonal_complex\tAux_alleles\tAux_ST\tPredictors").map_err(write_err)?;

    for genotype in genotypes {
        let predictors: Vec<String> = genotype
            .predictors
            .iter()
            .map(|key| match key.allele {
                Some(allele) => format!("{}_{}@{}", key.locus, allele, key.contig_name),
                None => format!("{}@{}", key.locus, key.contig_name),
            })
            .collect();
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}",
            genotype.sample_id,
            genotype.st,
            genotype.clonal_complex.as_deref().unwrap_or("NA"),
            genotype.aux_alleles,
            genotype.aux_st,
            predictors.join(","),
        )
        .map_err(write_err)?;
    }

    writer.flush().map_err(|e| format!("Flush error: {}", e))?;
    println!("✅ ST summary written to: {}", file_path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sequence_type::StCall;
    use crate::data::hit::HitKey;
    use std::fs;

    #[test]
    fn test_write_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("S1.fingerprint");
        let path = path.to_str().unwrap();
        let fingerprint = vec![("NP_459006.1".to_string(), 3), ("NP_459007.1".to_string(), 1)];

        write_fingerprint(path, &fingerprint).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "NP_459006.1:3\nNP_459007.1:1\n");
    }

    #[test]
    fn test_write_st_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("st.tsv");
        let path = path.to_str().unwrap();
        let genotypes = vec![
            SampleGenotype {
                sample_id: "S1".into(),
                st: StCall::Assigned(131),
                aux_alleles: 0,
                aux_st: false,
                predictors: vec![HitKey {
                    sample_id: "S1".into(),
                    locus: "adk".into(),
                    allele: Some(36),
                    contig_name: "NODE_4".into(),
                }],
                clonal_complex: Some("ST131 Cplx".into()),
            },
            SampleGenotype {
                sample_id: "S2".into(),
                st: StCall::InsufficientLoci,
                aux_alleles: -2,
                aux_st: false,
                predictors: vec![],
                clonal_complex: None,
            },
        ];

        write_st_summary(path, &genotypes, "sttyper --track mlst").unwrap();
        let content = fs::read_to_string(path).unwrap();
        let rows: Vec<&str> = content.lines().filter(|l| !l.starts_with('#')).collect();
        assert_eq!(rows[0], "Sample\tST\tClonal_complex\tAux_alleles\tAux_ST\tPredictors");
        assert_eq!(rows[1], "S1\t131\tST131 Cplx\t0\tfalse\tadk_36@NODE_4");
        assert_eq!(rows[2], "S2\t-3\tNA\t-2\tfalse\t");
    }
}
