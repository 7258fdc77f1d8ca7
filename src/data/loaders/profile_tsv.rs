// profile_tsv.rs - TSV loader for scheme profile tables

use std::path::Path;
use tracing::{info, warn};

use crate::data::profile::{ProfileRegistry, ProfileRow, ProfileTable};
use crate::error::TypingError;

const ST_COLUMN: &str = "ST";
const CLONAL_COMPLEX_COLUMN: &str = "clonal_complex";

fn format_error(path: &Path, message: String) -> TypingError {
    TypingError::ProfileFormat {
        path: path.to_path_buf(),
        message,
    }
}

impl ProfileTable {
    /// Load a profile table: `ST<TAB>locus...[<TAB>clonal_complex]`
    pub fn from_tsv(path: &Path, organism: &str) -> Result<Self, TypingError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .from_path(path)
            .map_err(|e| format_error(path, e.to_string()))?;

        let headers = reader
            .headers()
            .map_err(|e| format_error(path, e.to_string()))?
            .clone();

        let st_idx = headers
            .iter()
            .position(|h| h == ST_COLUMN)
            .ok_or_else(|| format_error(path, "missing ST column".to_string()))?;
        let cc_idx = headers.iter().position(|h| h == CLONAL_COMPLEX_COLUMN);

        let locus_columns: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != st_idx && Some(*i) != cc_idx)
            .map(|(i, h)| (i, h.to_string()))
            .collect();
        if locus_columns.is_empty() {
            return Err(format_error(path, "no locus columns".to_string()));
        }

        let mut table = ProfileTable::new(
            organism,
            locus_columns.iter().map(|(_, name)| name.clone()).collect(),
            cc_idx.is_some(),
        );

        for (line_num, result) in reader.records().enumerate() {
            let record = result.map_err(|e| format_error(path, e.to_string()))?;
            let line = line_num + 2;

            let st = record
                .get(st_idx)
                .and_then(|s| s.trim().parse::<u32>().ok())
                .ok_or_else(|| format_error(path, format!("line {}: invalid ST", line)))?;

            let alleles = locus_columns
                .iter()
                .map(|(i, name)| {
                    record
                        .get(*i)
                        .and_then(|s| s.trim().parse::<u32>().ok())
                        .ok_or_else(|| {
                            format_error(path, format!("line {}: invalid allele for {}", line, name))
                        })
                })
                .collect::<Result<Vec<u32>, TypingError>>()?;

            let clonal_complex = cc_idx
                .and_then(|i| record.get(i))
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string());

            table.push_row(ProfileRow {
                st,
                alleles,
                clonal_complex,
            });
        }

        info!(
            "Profile table {}: {} loci, {} STs",
            organism,
            table.loci.len(),
            table.rows.len()
        );
        Ok(table)
    }
}

impl ProfileRegistry {
    /// Load every file in `dir` as a profile table named after the file stem
    pub fn from_directory(dir: &Path) -> Result<Self, TypingError> {
        let entries = std::fs::read_dir(dir).map_err(|e| TypingError::io(dir, e))?;

        let mut registry = Self::new();
        for entry in entries {
            let path = entry.map_err(|e| TypingError::io(dir, e))?.path();
            if !path.is_file() {
                continue;
            }
            let Some(organism) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            match ProfileTable::from_tsv(&path, &organism) {
                Ok(table) => registry.register(table),
                Err(e) => warn!("Skipping profile file {}: {}", path.display(), e),
            }
        }
        Ok(registry)
    }
}
