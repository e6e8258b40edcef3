// Copyright 2024 Somatic Tensor Core Contributors.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Component G: the het-SNP phasing selector. Intersects normal/tumor
//! heterozygous-SNP calls, drops the lowest `var_pct_full` fraction of each
//! quality distribution, and emits the surviving tumor records.

use std::collections::{HashMap, HashSet};

use log::info;
use ordered_float::OrderedFloat;

use crate::interfaces::VcfRecord;

/// Tunables for [`select_hetero_snps`], matching the `SelectHeteroSnps`
/// subcommand's flags.
#[derive(Debug, Clone, Copy)]
pub struct PhasingParams {
    pub var_pct_full: f64,
    pub min_qual: f64,
}

/// Counters surfaced alongside the passing records, mirroring the
/// diagnostic line the original tool prints.
#[derive(Debug, Default, Clone, Copy)]
pub struct PhasingStats {
    pub total_normal: usize,
    pub total_tumor: usize,
    pub not_found_in_tumor: usize,
    pub not_matched_in_tumor: usize,
    pub low_qual_dropped: usize,
    pub passed: usize,
}

fn low_qual_set(qual: &HashMap<i64, f64>, var_pct_full: f64) -> HashSet<i64> {
    let mut by_qual: Vec<(i64, f64)> = qual.iter().map(|(&p, &q)| (p, q)).collect();
    by_qual.sort_by_key(|&(_, q)| OrderedFloat(q));
    let cutoff = (var_pct_full * qual.len() as f64) as usize;
    by_qual.into_iter().take(cutoff).map(|(p, _)| p).collect()
}

/// Select passing heterozygous SNPs for phasing (spec §4.7). `normal` and
/// `tumor` need not be pre-filtered: single-base REF/ALT heterozygous
/// (`0/1`/`1/0`) filtering happens here.
pub fn select_hetero_snps(
    normal: &[VcfRecord],
    tumor: &[VcfRecord],
    params: &PhasingParams,
) -> (Vec<VcfRecord>, PhasingStats) {
    let mut stats = PhasingStats::default();

    let mut normal_qual: HashMap<i64, f64> = HashMap::new();
    let mut variant_dict: HashMap<i64, &VcfRecord> = HashMap::new();
    for rec in normal.iter().filter(|r| r.is_heterozygous_snv()) {
        stats.total_normal += 1;
        normal_qual.insert(rec.pos, rec.qual);
        variant_dict.insert(rec.pos, rec);
    }

    let mut tumor_qual: HashMap<i64, f64> = HashMap::new();
    let mut tumor_variant_dict: HashMap<i64, &VcfRecord> = HashMap::new();
    let mut intersect: HashSet<i64> = HashSet::new();

    for rec in tumor.iter().filter(|r| r.is_heterozygous_snv()) {
        stats.total_tumor += 1;
        tumor_qual.insert(rec.pos, rec.qual);

        match variant_dict.get(&rec.pos) {
            None => {
                if rec.qual < params.min_qual {
                    stats.not_found_in_tumor += 1;
                    continue;
                }
            }
            Some(normal_rec) => {
                if normal_rec.reference != rec.reference || normal_rec.alt != rec.alt {
                    stats.not_matched_in_tumor += 1;
                    continue;
                }
            }
        }

        tumor_variant_dict.insert(rec.pos, rec);
        intersect.insert(rec.pos);
    }

    let normal_low_qual = low_qual_set(&normal_qual, params.var_pct_full);
    let tumor_low_qual = low_qual_set(&tumor_qual, params.var_pct_full);

    let mut passing: Vec<(i64, VcfRecord)> = Vec::new();
    for pos in intersect {
        if normal_low_qual.contains(&pos) || tumor_low_qual.contains(&pos) {
            stats.low_qual_dropped += 1;
            continue;
        }
        if let Some(rec) = tumor_variant_dict.get(&pos) {
            passing.push((pos, (*rec).clone()));
        }
    }
    passing.sort_by_key(|(pos, _)| *pos);
    stats.passed = passing.len();

    info!(
        "het-SNP phasing: selected {} (not_found={}, not_matched={}, low_qual={}, total_normal={}, total_tumor={})",
        stats.passed,
        stats.not_found_in_tumor,
        stats.not_matched_in_tumor,
        stats.low_qual_dropped,
        stats.total_normal,
        stats.total_tumor,
    );

    (passing.into_iter().map(|(_, rec)| rec).collect(), stats)
}
