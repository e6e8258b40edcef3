// Copyright 2024 Somatic Tensor Core Contributors.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Component B: the per-coordinate `Position` record and its allele-
//! frequency gate.

use counter::Counter;

use crate::pileup::{BaseCall, PileupRow};
use crate::platform::PlatformProfile;

/// One read's contribution to a [`Position`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReadObservation {
    pub base_call: BaseCall,
    pub raw_bq: u8,
    pub raw_mq: u8,
    pub read_name: String,
    /// `0` denotes untagged.
    pub hp: u8,
}

/// A per-coordinate record: the reference base and equal-length arrays of
/// per-read evidence. See spec §3 for the invariant that all arrays share
/// `depth` length.
#[derive(Debug, Clone)]
pub struct Position {
    pub pos: i64,
    pub ref_base: u8,
    pub depth: u32,
    pub af: f32,
    pub reads: Vec<ReadObservation>,
}

/// Result of folding a parsed row into a `Position` and running the AF gate.
pub struct DecodedPosition {
    pub position: Position,
    pub passes_af_gate: bool,
}

impl Position {
    /// Find this position's observation for a given read name, if the read
    /// covers this column.
    pub fn read(&self, read_name: &str) -> Option<&ReadObservation> {
        self.reads.iter().find(|r| r.read_name == read_name)
    }
}

/// Fold one parsed pileup row into a [`Position`] and evaluate the AF gate
/// (spec §4.2): `depth` counts reads whose base is `ACGT` or a gap marker
/// (`#`/`*`); `snv_af`/`indel_af` are the largest alternative-allele count in
/// each category divided by `depth`; the gate passes when either exceeds its
/// threshold.
pub fn decode_position(row: &PileupRow, profile: &PlatformProfile) -> DecodedPosition {
    let ref_base = row.ref_base;
    let mut reads = Vec::with_capacity(row.tokens.len());
    let mut snv_tally: Counter<u8, u32> = Counter::new();
    let mut insertion_count: u32 = 0;
    let mut deletion_count: u32 = 0;
    let mut depth: u32 = 0;

    for (i, token) in row.tokens.iter().enumerate() {
        let base_call = token.decode(ref_base);
        match &base_call {
            BaseCall::Match { base, .. } => {
                depth += 1;
                if *base != ref_base {
                    *snv_tally.entry(*base).or_insert(0) += 1;
                }
            }
            BaseCall::Insertion { .. } => {
                depth += 1;
                insertion_count += 1;
            }
            BaseCall::Deletion { .. } => {
                depth += 1;
                deletion_count += 1;
            }
            BaseCall::Gap { .. } => depth += 1,
            BaseCall::RefSkip => {}
        }

        reads.push(ReadObservation {
            base_call,
            raw_bq: row.bq[i],
            raw_mq: row.mq[i],
            read_name: row.names[i].clone(),
            hp: row.hp.as_ref().map(|hp| hp[i]).unwrap_or(0),
        });
    }

    let denominator = if depth > 0 { depth as f32 } else { 1.0 };
    let max_snv_count = snv_tally.values().copied().max().unwrap_or(0);
    let snv_af = max_snv_count as f32 / denominator;
    let indel_af = insertion_count.max(deletion_count) as f32 / denominator;

    let pass_snv_af = depth > 0 && snv_af >= profile.snv_min_af;
    let pass_indel_af = depth > 0 && indel_af >= profile.indel_min_af;
    let passes_af_gate = pass_snv_af || pass_indel_af;
    let af = if depth > 0 { snv_af.max(indel_af) } else { 0.0 };

    DecodedPosition {
        position: Position {
            pos: row.pos,
            ref_base,
            depth,
            af,
            reads,
        },
        passes_af_gate,
    }
}
