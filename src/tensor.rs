// Copyright 2024 Somatic Tensor Core Contributors.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Component F: the tensor builder. Materializes one `(depth, window,
//! channel)` tensor per ordered read set and an accompanying [`AltInfo`]
//! summary of the center-position alt spectrum.

use std::collections::BTreeMap;
use std::fmt;

use itertools::Itertools;
use lazy_static::lazy_static;
use ndarray::Array3;

use crate::candidates::PositionWindow;
use crate::interfaces::RegionFilter;
use crate::pileup::{BaseCall, Strand};
use crate::reads::OrderedRead;

lazy_static! {
    /// `{A,C,G,T} -> {1,2,3,4}` channel-0/1 code table, built once rather
    /// than matched on every cell.
    static ref ACGT_CODE: BTreeMap<u8, i32> = {
        let mut m = BTreeMap::new();
        m.insert(b'A', 1);
        m.insert(b'C', 2);
        m.insert(b'G', 3);
        m.insert(b'T', 4);
        m
    };
}

/// `{A,C,G,T} -> {1,2,3,4}`, `0` for anything else (N, ambiguity codes).
fn acgt_code(base: u8) -> i32 {
    ACGT_CODE.get(&base.to_ascii_uppercase()).copied().unwrap_or(0)
}

/// Sentinel alt-channel code for a read inside a previously reported
/// deletion (`*`/`#`), distinct from the `1..=4` ACGT range.
const GAP_CODE: i32 = 5;

/// Haplotype-tag palette (channel 5). The tumor palette is offset from the
/// normal one so a downstream classifier can tell which sample a row came
/// from purely from the tensor, without a side channel.
const NORMAL_HAP_CODE: [i32; 3] = [60, 30, 90];
const TUMOR_HAP_CODE: [i32; 3] = [120, 90, 150];

fn hap_code(hap: u8, is_tumor: bool) -> i32 {
    let idx = (hap as usize).min(2);
    if is_tumor {
        TUMOR_HAP_CODE[idx]
    } else {
        NORMAL_HAP_CODE[idx]
    }
}

/// Normalize a Phred+33 base-quality byte to a bounded channel value.
fn normalize_bq(raw_phred33: u8) -> i32 {
    let raw = raw_phred33.saturating_sub(33);
    raw.min(40) as i32
}

/// Normalize a Phred+33 mapping-quality byte to a bounded channel value.
fn normalize_mq(raw_phred33: u8) -> i32 {
    let raw = raw_phred33.saturating_sub(33);
    raw.min(60) as i32
}

/// Configuration for one call to [`build_tensor`].
pub struct TensorParams {
    pub center: i64,
    pub flanking_base_num: i64,
    pub max_depth: usize,
    pub channel_size: usize,
    pub is_tumor: bool,
    pub mask_low_bq: bool,
}

/// One alt-spectrum entry: a token (`X<base>`, `I<seq>`, `D<len>`) and the
/// number of reads exhibiting it at the center position.
#[derive(Debug, Clone, PartialEq)]
pub struct AltEntry {
    pub token: String,
    pub count: u32,
}

/// `"{depth}-{alt tokens and counts}-{af list}"`, the compact textual
/// summary of the center-position alt spectrum (spec data model §3).
#[derive(Debug, Clone, PartialEq)]
pub struct AltInfo {
    pub depth: u32,
    pub entries: Vec<AltEntry>,
}

impl AltInfo {
    pub fn af_list(&self) -> Vec<f32> {
        let denom = if self.depth > 0 { self.depth as f32 } else { 1.0 };
        self.entries.iter().map(|e| e.count as f32 / denom).collect()
    }
}

impl fmt::Display for AltInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let spectrum = self
            .entries
            .iter()
            .map(|e| format!("{} {}", e.token, e.count))
            .collect::<Vec<_>>()
            .join(" ");
        let af_list = self
            .af_list()
            .iter()
            .map(|af| format!("{:.3}", af))
            .collect::<Vec<_>>()
            .join(",");
        write!(f, "{}-{}-{}", self.depth, spectrum, af_list)
    }
}

/// Parse an `AltInfo` produced by [`AltInfo::fmt`] back into its
/// `(depth, alt -> count)` multiset (P7, round-trip).
pub fn parse_alt_info(s: &str) -> Option<AltInfo> {
    let mut parts = s.splitn(3, '-');
    let depth: u32 = parts.next()?.parse().ok()?;
    let spectrum = parts.next()?;
    let _af_list = parts.next()?;

    let tokens: Vec<&str> = spectrum.split_whitespace().collect();
    if tokens.len() % 2 != 0 {
        return None;
    }
    let mut entries = Vec::new();
    for pair in tokens.chunks(2) {
        let token = pair[0].to_owned();
        let count: u32 = pair[1].parse().ok()?;
        entries.push(AltEntry { token, count });
    }
    Some(AltInfo { depth, entries })
}

/// Build the alt spectrum for the center position from its window entry,
/// counting reads by `X<base>` (mismatch), `I<seq>` (insertion), `D<len>`
/// (deletion).
pub fn build_alt_info(window: &PositionWindow, center: i64) -> AltInfo {
    let position = match window.get(&center) {
        Some(p) => p,
        None => return AltInfo { depth: 0, entries: Vec::new() },
    };

    let mut tally: BTreeMap<String, u32> = BTreeMap::new();
    let mut depth = 0u32;

    for read in &position.reads {
        match &read.base_call {
            BaseCall::Gap { .. } => {
                depth += 1;
            }
            BaseCall::Match { base, .. } => {
                depth += 1;
                if *base != position.ref_base {
                    *tally.entry(format!("X{}", *base as char)).or_insert(0) += 1;
                }
            }
            BaseCall::Insertion { inserted_sequence, .. } => {
                depth += 1;
                let seq: String = inserted_sequence.iter().map(|&b| b as char).collect();
                *tally.entry(format!("I{}", seq)).or_insert(0) += 1;
            }
            BaseCall::Deletion { length, .. } => {
                depth += 1;
                *tally.entry(format!("D{}", length)).or_insert(0) += 1;
            }
            BaseCall::RefSkip => {}
        }
    }

    let entries: Vec<AltEntry> = tally
        .into_iter()
        .map(|(token, count)| AltEntry { token, count })
        .sorted_by(|a, b| b.count.cmp(&a.count).then(a.token.cmp(&b.token)))
        .collect();

    AltInfo { depth, entries }
}

/// Encode one read's channels at one window column, given the reference
/// base for that column.
fn encode_cell(base_call: &BaseCall, raw_bq: u8, raw_mq: u8, ref_base: u8, hap: u8, params: &TensorParams) -> [i32; 6] {
    let ref_code = acgt_code(ref_base);
    match base_call {
        // Scenario 3 (deletion spanning the center) pins this down precisely:
        // ch0 stays the reference base and BQ/MQ/strand/haplotype stay
        // populated from the read, only ch1 is replaced by the gap sentinel.
        BaseCall::Gap { strand } => {
            let strand_code = match strand {
                Strand::Forward => 0,
                Strand::Reverse => 1,
            };
            [
                ref_code,
                GAP_CODE,
                strand_code,
                normalize_bq(raw_bq),
                normalize_mq(raw_mq),
                hap_code(hap, params.is_tumor),
            ]
        }
        BaseCall::RefSkip => [0, 0, 0, 0, 0, 0],
        BaseCall::Match { base, strand } => {
            let strand_code = match strand {
                Strand::Forward => 0,
                Strand::Reverse => 1,
            };
            let mut bq = normalize_bq(raw_bq);
            let mut alt_code = if *base != ref_base { acgt_code(*base) } else { 0 };
            // `bq` is already the decoded (post Phred+33) quality, so this
            // compares against the real quality floor rather than the raw
            // ASCII byte, which is always >= 33 and would never trip.
            if params.mask_low_bq && bq < 33 && alt_code != 0 {
                alt_code = 0;
                bq = 0;
            }
            [
                ref_code,
                alt_code,
                strand_code,
                bq,
                normalize_mq(raw_mq),
                hap_code(hap, params.is_tumor),
            ]
        }
        BaseCall::Insertion { anchor, strand, .. } => {
            let strand_code = match strand {
                Strand::Forward => 0,
                Strand::Reverse => 1,
            };
            [
                ref_code,
                acgt_code(*anchor),
                strand_code,
                normalize_bq(raw_bq),
                normalize_mq(raw_mq),
                hap_code(hap, params.is_tumor),
            ]
        }
        BaseCall::Deletion { anchor, strand, .. } => {
            let strand_code = match strand {
                Strand::Forward => 0,
                Strand::Reverse => 1,
            };
            [
                ref_code,
                acgt_code(*anchor),
                strand_code,
                normalize_bq(raw_bq),
                normalize_mq(raw_mq),
                hap_code(hap, params.is_tumor),
            ]
        }
    }
}

/// Build the dense `(D, W, C)` tensor for one sample around `center`.
/// `ordered_reads` fixes row order (component E); rows beyond
/// `ordered_reads.len()` stay all-zero (P4). Channel 6 carries the
/// insertion spill: inserted bases beyond the anchor column spill into
/// `[o+1, ...]` of the same row.
pub fn build_tensor(
    window: &PositionWindow,
    ordered_reads: &[OrderedRead],
    params: &TensorParams,
) -> Array3<i32> {
    let w = (2 * params.flanking_base_num + 1) as usize;
    let mut tensor = Array3::<i32>::zeros((params.max_depth, w, params.channel_size));

    for (row_idx, read) in ordered_reads.iter().enumerate().take(params.max_depth) {
        for offset in 0..w {
            let pos = params.center - params.flanking_base_num + offset as i64;
            let position = match window.get(&pos) {
                Some(p) => p,
                None => continue,
            };
            let observation = match position.read(&read.name) {
                Some(r) => r,
                None => continue,
            };

            let cells = encode_cell(
                &observation.base_call,
                observation.raw_bq,
                observation.raw_mq,
                position.ref_base,
                read.haplotype,
                params,
            );
            for (c, value) in cells.iter().enumerate() {
                tensor[[row_idx, offset, c]] = *value;
            }

            if let BaseCall::Insertion { inserted_sequence, .. } = &observation.base_call {
                for (k, &b) in inserted_sequence.iter().enumerate() {
                    let spill_offset = offset + 1 + k;
                    if spill_offset >= w || params.channel_size <= 6 {
                        break;
                    }
                    tensor[[row_idx, spill_offset, 6]] = acgt_code(b);
                }
            }
        }
    }

    tensor
}

/// `true` when the confident-region BED is absent (no gating) or the
/// window around `center` intersects it.
pub fn passes_confident_region<R: RegionFilter>(
    region_filter: Option<&R>,
    contig: &str,
    center: i64,
    flanking_base_num: i64,
) -> bool {
    match region_filter {
        None => true,
        Some(filter) => filter.contains(contig, center - flanking_base_num, center + flanking_base_num + 1),
    }
}
