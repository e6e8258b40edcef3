// Copyright 2024 Somatic Tensor Core Contributors.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Component E: read ordering. For a center position, gathers the union of
//! read names in the flanking window, deterministically subsamples down to
//! the per-sample max depth, and stably sorts by (haplotype, first
//! appearance).

use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;

use crate::candidates::PositionWindow;

/// Fixed subsample seed. Determinism (P5) requires byte-identical output
/// across runs for identical inputs, so this is a constant, not derived from
/// wall-clock time or thread-local entropy.
const SUBSAMPLE_SEED: u64 = 0x736f_6d61_7469_63u64;

/// Per-sample `read_name -> haplotype` map populated from the pileup HP
/// column. Absent entries default to haplotype `0` (untagged).
#[derive(Debug, Clone, Default)]
pub struct HaplotypeMap {
    hap: HashMap<String, u8>,
}

impl HaplotypeMap {
    pub fn new() -> Self {
        HaplotypeMap { hap: HashMap::new() }
    }

    pub fn observe(&mut self, read_name: &str, hp: u8) {
        if hp == 0 {
            return;
        }
        let entry = self.hap.entry(read_name.to_owned()).or_insert(0);
        if hp > *entry {
            *entry = hp;
        }
    }

    pub fn get(&self, read_name: &str) -> u8 {
        self.hap.get(read_name).copied().unwrap_or(0)
    }
}

/// One read, ordered for tensor materialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedRead {
    pub name: String,
    pub haplotype: u8,
}

/// Gather the union of read names covering `[center - f, center + f]`
/// (insertion-ordered, first appearance wins), subsample deterministically
/// to `max_depth` if oversized, annotate haplotype as
/// `max(global_hap, sample_hp)`, and stable-sort by `(haplotype,
/// first_appearance_index)`.
pub fn order_reads(
    window: &PositionWindow,
    center: i64,
    f: i64,
    global_hap: &HaplotypeMap,
    max_depth: usize,
) -> Vec<OrderedRead> {
    let mut union: Vec<String> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut sample_hp: HashMap<String, u8> = HashMap::new();

    for offset in -f..=f {
        let pos = center + offset;
        if let Some(position) = window.get(&pos) {
            for read in &position.reads {
                if seen.insert(read.read_name.as_str()) {
                    union.push(read.read_name.clone());
                }
                if read.hp > 0 {
                    let entry = sample_hp.entry(read.read_name.clone()).or_insert(0);
                    if read.hp > *entry {
                        *entry = read.hp;
                    }
                }
            }
        }
    }
    drop(seen);

    let picked_indices: Vec<usize> = if union.len() > max_depth {
        let mut rng = StdRng::seed_from_u64(SUBSAMPLE_SEED);
        let mut idx: Vec<usize> = sample(&mut rng, union.len(), max_depth).into_vec();
        idx.sort_unstable();
        idx
    } else {
        (0..union.len()).collect()
    };

    picked_indices
        .into_iter()
        .enumerate()
        .map(|(appearance_index, original_index)| {
            let name = union[original_index].clone();
            let hap = global_hap
                .get(&name)
                .max(sample_hp.get(&name).copied().unwrap_or(0));
            (appearance_index, OrderedRead { name, haplotype: hap })
        })
        .sorted_by_key(|(appearance_index, r)| (r.haplotype, *appearance_index))
        .map(|(_, r)| r)
        .collect()
}
