// blast.rs - Hit file loader for tabular alignment output

use regex::Regex;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::core::parser::{parse_line, HitContext};
use crate::data::hit::AlignmentHit;
use crate::data::reference::ReferenceCatalog;
use crate::error::TypingError;

/// Read all hits of one file. Malformed lines are logged and dropped.
pub fn read_hits(
    path: &Path,
    ctx: &HitContext,
    references: &ReferenceCatalog,
) -> Result<Vec<AlignmentHit>, TypingError> {
    let file = File::open(path).map_err(|e| TypingError::io(path, e))?;
    let reader = BufReader::new(file);

    let mut hits = Vec::new();
    let mut dropped = 0usize;
    for (line_num, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| TypingError::io(path, e))?;
        match parse_line(&line, ctx, references) {
            Ok(Some(hit)) => hits.push(hit),
            Ok(None) => {}
            Err(e) => {
                dropped += 1;
                warn!("{}:{}: dropped hit: {}", path.display(), line_num + 1, e);
            }
        }
    }

    debug!(
        "{}: {} hits ({} dropped)",
        path.display(),
        hits.len(),
        dropped
    );
    Ok(hits)
}

/// Hit files under `path`: the file itself, or the regular files of a
/// directory whose name matches `include`, sorted by name
pub fn collect_hit_files(path: &Path, include: Option<&Regex>) -> Result<Vec<PathBuf>, TypingError> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files: Vec<PathBuf> = fs::read_dir(path)
        .map_err(|e| TypingError::io(path, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| {
            let name = p.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
            !name.starts_with('.') && include.map_or(true, |re| re.is_match(&name))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Hit context for a resistance file: the database name is the file stem
pub fn resistance_context(sample_id: &str, path: &Path) -> HitContext {
    let instance = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    HitContext::new(sample_id, crate::data::hit::Track::Resistance).with_instance(instance)
}
