// profile.rs - MLST scheme profile tables

use std::collections::{BTreeMap, HashMap};

/// One scheme row: an allelic profile and the sequence type it defines
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileRow {
    pub st: u32,
    /// Allele numbers in the order of `ProfileTable::loci`
    pub alleles: Vec<u32>,
    pub clonal_complex: Option<String>,
}

/// Scheme profile table of one organism. Read-only once loaded.
#[derive(Debug, Clone)]
pub struct ProfileTable {
    pub organism: String,
    pub loci: Vec<String>,
    pub rows: Vec<ProfileRow>,
    pub has_clonal_complex: bool,
}

impl ProfileTable {
    pub fn new(organism: impl Into<String>, loci: Vec<String>, has_clonal_complex: bool) -> Self {
        Self {
            organism: organism.into(),
            loci,
            rows: Vec::new(),
            has_clonal_complex,
        }
    }

    pub fn push_row(&mut self, row: ProfileRow) {
        debug_assert_eq!(row.alleles.len(), self.loci.len());
        self.rows.push(row);
    }

    /// Columns that are not loci: `ST`, plus `clonal_complex` when present
    pub fn non_allele_columns(&self) -> usize {
        if self.has_clonal_complex {
            2
        } else {
            1
        }
    }

    /// Number of loci the scheme expects a call for
    pub fn scheme_size(&self) -> usize {
        self.loci.len()
    }

    pub fn locus_index(&self, locus: &str) -> Option<usize> {
        self.loci.iter().position(|l| l == locus)
    }

    pub fn row_for_st(&self, st: u32) -> Option<&ProfileRow> {
        self.rows.iter().find(|row| row.st == st)
    }

    /// Rows compatible with the observed alleles: for every observed scheme
    /// locus the row's allele must be one of the observed ones. Loci the
    /// scheme does not know are ignored.
    pub fn matching_rows(&self, observed: &BTreeMap<String, Vec<u32>>) -> Vec<&ProfileRow> {
        let constraints: Vec<(usize, &Vec<u32>)> = observed
            .iter()
            .filter_map(|(locus, alleles)| self.locus_index(locus).map(|idx| (idx, alleles)))
            .collect();

        self.rows
            .iter()
            .filter(|row| {
                constraints
                    .iter()
                    .all(|(idx, alleles)| alleles.contains(&row.alleles[*idx]))
            })
            .collect()
    }
}

/// Profile tables of every configured organism
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    tables: HashMap<String, ProfileTable>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, table: ProfileTable) {
        self.tables.insert(table.organism.clone(), table);
    }

    pub fn get(&self, organism: &str) -> Option<&ProfileTable> {
        self.tables.get(organism)
    }

    pub fn organisms(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}
