// Copyright 2024 Somatic Tensor Core Contributors.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Traits for the external collaborators the core treats as out of scope:
//! region/BED lookups, the VCF reader, and reference FASTA extraction.
//! Production wiring of BAM pileup subprocesses, BED interval trees and VCF
//! parsing lives outside this crate; these traits are the seam, and the
//! `fakes` submodule provides the in-memory substitutes tests use.

use std::collections::HashMap;

use crate::errors::Error;

/// `contains(contig, a, b) -> bool` on half-open `[a, b)`.
pub trait RegionFilter {
    fn contains(&self, contig: &str, start: i64, end: i64) -> bool;
}

/// A heterozygous or homozygous single-base-or-indel VCF record, as read by
/// the external VCF reader collaborator. `genotype` is kept as the 2-tuple
/// the VCF actually encodes -- see the open question in DESIGN.md about the
/// `genotype2 = genotype1` typo in the source this was distilled from, which
/// we deliberately do not replicate.
#[derive(Debug, Clone, PartialEq)]
pub struct VcfRecord {
    pub pos: i64,
    pub reference: String,
    pub alt: String,
    pub genotype: (u8, u8),
    pub qual: f64,
    pub raw_row: String,
}

impl VcfRecord {
    pub fn is_heterozygous_snv(&self) -> bool {
        self.reference.len() == 1
            && self.alt.len() == 1
            && matches!(self.genotype, (0, 1) | (1, 0))
    }
}

/// `variants(contig) -> map<pos, Record>`.
pub trait KnownVariants {
    fn variants(&self, contig: &str) -> &HashMap<i64, VcfRecord>;
}

/// `fetch(contig, start, end) -> bytes`, 1-based inclusive, uppercase on
/// return.
pub trait ReferenceSource {
    fn fetch(&self, contig: &str, start: i64, end: i64) -> Result<Vec<u8>, Error>;
}

pub mod fakes {
    use super::*;

    /// A [`RegionFilter`] backed by an explicit list of half-open intervals,
    /// for tests and for small ad hoc BED sets.
    #[derive(Clone)]
    pub struct IntervalListFilter {
        intervals: HashMap<String, Vec<(i64, i64)>>,
    }

    impl IntervalListFilter {
        pub fn new() -> Self {
            IntervalListFilter {
                intervals: HashMap::new(),
            }
        }

        pub fn push(&mut self, contig: &str, start: i64, end: i64) {
            self.intervals
                .entry(contig.to_owned())
                .or_insert_with(Vec::new)
                .push((start, end));
        }
    }

    impl Default for IntervalListFilter {
        fn default() -> Self {
            Self::new()
        }
    }

    impl RegionFilter for IntervalListFilter {
        fn contains(&self, contig: &str, start: i64, end: i64) -> bool {
            match self.intervals.get(contig) {
                None => false,
                Some(ivs) => ivs.iter().any(|&(a, b)| start < b && end > a),
            }
        }
    }

    /// A [`RegionFilter`] that always matches -- the "no BED given" case.
    pub struct AllowAll;

    impl RegionFilter for AllowAll {
        fn contains(&self, _contig: &str, _start: i64, _end: i64) -> bool {
            true
        }
    }

    /// A [`KnownVariants`] backed by an in-memory map, for tests and for a
    /// known-sites VCF already loaded by the caller.
    #[derive(Clone)]
    pub struct InMemoryKnownVariants {
        by_contig: HashMap<String, HashMap<i64, VcfRecord>>,
        empty: HashMap<i64, VcfRecord>,
    }

    impl InMemoryKnownVariants {
        pub fn new() -> Self {
            InMemoryKnownVariants {
                by_contig: HashMap::new(),
                empty: HashMap::new(),
            }
        }

        pub fn insert(&mut self, contig: &str, record: VcfRecord) {
            self.by_contig
                .entry(contig.to_owned())
                .or_insert_with(HashMap::new)
                .insert(record.pos, record);
        }
    }

    impl Default for InMemoryKnownVariants {
        fn default() -> Self {
            Self::new()
        }
    }

    impl KnownVariants for InMemoryKnownVariants {
        fn variants(&self, contig: &str) -> &HashMap<i64, VcfRecord> {
            self.by_contig.get(contig).unwrap_or(&self.empty)
        }
    }

    /// A [`ReferenceSource`] backed by a single in-memory contig sequence,
    /// 1-based inclusive fetch semantics, matching the real collaborator.
    pub struct InMemoryReference {
        contig: String,
        sequence: Vec<u8>,
    }

    impl InMemoryReference {
        pub fn new(contig: &str, sequence: &[u8]) -> Self {
            InMemoryReference {
                contig: contig.to_owned(),
                sequence: sequence.to_ascii_uppercase(),
            }
        }
    }

    impl ReferenceSource for InMemoryReference {
        fn fetch(&self, contig: &str, start: i64, end: i64) -> Result<Vec<u8>, Error> {
            if contig != self.contig || start < 1 || end < start {
                return Err(Error::ReferenceUnavailable {
                    contig: contig.to_owned(),
                    pos: start,
                });
            }
            let lo = (start - 1) as usize;
            let hi = end.min(self.sequence.len() as i64) as usize;
            if lo >= self.sequence.len() || lo > hi {
                return Err(Error::ReferenceUnavailable {
                    contig: contig.to_owned(),
                    pos: start,
                });
            }
            Ok(self.sequence[lo..hi].to_vec())
        }
    }
}
