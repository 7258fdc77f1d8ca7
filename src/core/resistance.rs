// resistance.rs - Resistance gene canonicalization and overlap removal

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::data::hit::AlignmentHit;
use crate::data::lexicon::ResistanceLexicon;
use crate::error::{StoreError, TypingError};
use crate::store::{RecordStore, TypingStore};

/// A resistance hit with its lexicon resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResistanceCall {
    pub hit: AlignmentHit,
    pub canonical_gene: String,
    pub resistance_class: String,
}

impl ResistanceCall {
    /// `identity * (1 - |1 - span|)`: penalizes low identity and spans far
    /// from 1.0 in either direction
    pub fn quality(&self) -> f64 {
        self.hit.identity * (1.0 - (1.0 - self.hit.span).abs())
    }
}

/// What to do with a hit whose gene is missing from the lexicon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnresolvedPolicy {
    /// Log and drop the hit, keep the batch
    Skip,
    /// Fail the whole batch
    Abort,
}

impl FromStr for UnresolvedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "skip" => Ok(UnresolvedPolicy::Skip),
            "abort" => Ok(UnresolvedPolicy::Abort),
            _ => Err(format!("Invalid unresolved gene policy: {}. Use: skip, abort", s)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ResolverPolicy {
    /// Treat two hits on one contig as conflicting when they resolve to the
    /// same canonical gene, even with disjoint coordinates (single-copy
    /// assumption). Kept on by default pending a product decision.
    pub same_gene_conflicts: bool,
    pub unresolved: UnresolvedPolicy,
}

impl Default for ResolverPolicy {
    fn default() -> Self {
        Self {
            same_gene_conflicts: true,
            unresolved: UnresolvedPolicy::Skip,
        }
    }
}

/// Deduplicated, class-labeled calls of one sample, in input order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResistanceCallSet {
    pub calls: Vec<ResistanceCall>,
}

impl ResistanceCallSet {
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Distinct resistance classes, sorted
    pub fn classes(&self) -> Vec<&str> {
        let mut classes: Vec<&str> = self
            .calls
            .iter()
            .map(|c| c.resistance_class.as_str())
            .collect();
        classes.sort_unstable();
        classes.dedup();
        classes
    }
}

pub struct ResistanceResolver {
    lexicon: ResistanceLexicon,
    policy: ResolverPolicy,
}

impl ResistanceResolver {
    pub fn new(lexicon: ResistanceLexicon, policy: ResolverPolicy) -> Self {
        Self { lexicon, policy }
    }

    /// Attach the canonical gene and drug class to a hit
    pub fn canonicalize(&self, hit: AlignmentHit) -> Result<ResistanceCall, TypingError> {
        let resolved = self.lexicon.resolve(hit.locus())?;
        Ok(ResistanceCall {
            hit,
            canonical_gene: resolved.canonical_gene,
            resistance_class: resolved.resistance_class,
        })
    }

    fn conflicts(&self, a: &ResistanceCall, b: &ResistanceCall) -> bool {
        a.hit.contig_name == b.hit.contig_name
            && (a.hit.overlaps(&b.hit)
                || (self.policy.same_gene_conflicts && a.canonical_gene == b.canonical_gene))
    }

    /// Remove conflicting calls, keeping the higher-quality one of each pair.
    ///
    /// Equivalent to the all-pairs sweep that deletes in place and rewinds:
    /// a left-hand call that loses stops comparing, and the next survivor
    /// becomes the left-hand call. Survivors are pairwise conflict-free, so
    /// the pass is idempotent. On equal quality the later call is dropped.
    pub fn deduplicate(&self, calls: Vec<ResistanceCall>) -> ResistanceCallSet {
        let n = calls.len();
        let mut keep = vec![true; n];

        for i in 0..n {
            if !keep[i] {
                continue;
            }
            for j in (i + 1)..n {
                if !keep[j] || !self.conflicts(&calls[i], &calls[j]) {
                    continue;
                }
                if calls[i].quality() < calls[j].quality() {
                    debug!(
                        "Dropping {} on {} in favour of {}",
                        calls[i].hit.identifier, calls[i].hit.contig_name, calls[j].hit.identifier
                    );
                    keep[i] = false;
                    break;
                }
                debug!(
                    "Dropping {} on {} in favour of {}",
                    calls[j].hit.identifier, calls[j].hit.contig_name, calls[i].hit.identifier
                );
                keep[j] = false;
            }
        }

        ResistanceCallSet {
            calls: calls
                .into_iter()
                .zip(keep)
                .filter_map(|(call, kept)| kept.then_some(call))
                .collect(),
        }
    }

    /// Canonicalize and deduplicate the resistance hits of one sample
    pub fn resolve(&self, hits: Vec<AlignmentHit>) -> Result<ResistanceCallSet, TypingError> {
        let total = hits.len();
        let mut calls = Vec::with_capacity(total);
        for hit in hits {
            let sample_id = hit.sample_id.clone();
            match self.canonicalize(hit) {
                Ok(call) => calls.push(call),
                Err(e @ TypingError::UnresolvedGene(_)) => match self.policy.unresolved {
                    UnresolvedPolicy::Abort => return Err(e),
                    UnresolvedPolicy::Skip => warn!("Sample {}: {}", sample_id, e),
                },
                Err(e) => return Err(e),
            }
        }

        let set = self.deduplicate(calls);
        info!(
            "Resistance calls: {} of {} hits kept, classes: {}",
            set.len(),
            total,
            set.classes().join(", ")
        );
        Ok(set)
    }
}

/// Persist a call set, skipping calls already stored. Returns the number inserted.
pub fn store_calls<S: TypingStore>(
    store: &mut S,
    set: &ResistanceCallSet,
) -> Result<usize, StoreError> {
    let mut inserted = 0;
    for call in &set.calls {
        if store.resistances_mut().insert_if_absent(call.clone())? {
            inserted += 1;
        }
    }
    Ok(inserted)
}
