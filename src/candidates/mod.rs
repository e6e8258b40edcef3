// Copyright 2024 Somatic Tensor Core Contributors.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Component C: the per-stream candidate generator. Drives a single pileup
//! line iterator, maintains the retention window, and yields `(pos,
//! is_tumor)` pairs once their flanking window is complete.

use std::collections::{BTreeMap, HashMap, VecDeque};

use derive_builder::Builder;
use log::{debug, log_enabled, Level};

use crate::errors::Error;
use crate::interfaces::{KnownVariants, RegionFilter};
use crate::pileup::parse_line;
use crate::platform::PlatformProfile;
use crate::position::{decode_position, Position};

/// The sliding cache of not-yet-retired positions, keyed by coordinate.
pub type PositionWindow = BTreeMap<i64, Position>;

/// One emitted candidate: its coordinate and which sample stream produced
/// it. Normal-stream candidates are retention signals only (component D).
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
#[builder(setter(into))]
pub struct Candidate {
    pub pos: i64,
    pub is_tumor: bool,
    #[builder(default = "\"unknown\".to_owned()")]
    pub variant_type: String,
}

/// Bookkeeping for rows skipped or rejected while driving a stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeneratorStats {
    pub malformed_rows: u64,
    pub rows_seen: u64,
    pub candidates_emitted: u64,
}

/// Drives one pileup stream (normal or tumor) against an optional BED
/// override, an optional known-variant set, and the AF gate, yielding
/// `(pos, is_tumor)` candidates once their window is provably complete.
pub struct CandidateGenerator<I, B, K> {
    lines: I,
    is_tumor: bool,
    contig: String,
    ctg_start: i64,
    ctg_end: i64,
    profile: PlatformProfile,
    candidate_bed: Option<B>,
    known_variants: Option<K>,
    extend_bed: Option<B>,
    /// Optional `pos -> variant_type` override carried alongside the
    /// candidate BED (e.g. `homo_somatic`), used verbatim on the output
    /// record when present.
    candidate_types: Option<HashMap<i64, String>>,
    window: PositionWindow,
    candidates: VecDeque<i64>,
    emit_cursor: usize,
    current_pos: i64,
    exhausted: bool,
    pub stats: GeneratorStats,
}

impl<I, B, K> CandidateGenerator<I, B, K>
where
    I: Iterator<Item = String>,
    B: RegionFilter,
    K: KnownVariants,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        lines: I,
        is_tumor: bool,
        contig: String,
        ctg_start: i64,
        ctg_end: i64,
        profile: PlatformProfile,
        candidate_bed: Option<B>,
        known_variants: Option<K>,
        extend_bed: Option<B>,
    ) -> Self {
        CandidateGenerator {
            lines,
            is_tumor,
            contig,
            ctg_start,
            ctg_end,
            profile,
            candidate_bed,
            known_variants,
            extend_bed,
            candidate_types: None,
            window: PositionWindow::new(),
            candidates: VecDeque::new(),
            emit_cursor: 0,
            current_pos: ctg_start,
            exhausted: false,
            stats: GeneratorStats::default(),
        }
    }

    pub fn window(&self) -> &PositionWindow {
        &self.window
    }

    pub fn with_candidate_types(mut self, types: HashMap<i64, String>) -> Self {
        self.candidate_types = Some(types);
        self
    }

    fn variant_type_for(&self, pos: i64) -> String {
        self.candidate_types
            .as_ref()
            .and_then(|types| types.get(&pos))
            .cloned()
            .unwrap_or_else(|| "unknown".to_owned())
    }

    fn completion_distance(&self) -> i64 {
        self.profile.completion_distance()
    }

    fn is_ref_base_acgt(ref_base: u8) -> bool {
        matches!(ref_base, b'A' | b'C' | b'G' | b'T')
    }

    fn in_contig_range(&self, pos: i64) -> bool {
        pos >= self.ctg_start && pos <= self.ctg_end
    }

    fn in_extend_bed(&self, pos: i64) -> bool {
        match &self.extend_bed {
            None => true,
            Some(bed) => bed.contains(&self.contig, pos - 1, pos),
        }
    }

    /// Pull and process one more input line, pushing any newly qualifying
    /// position onto the candidate queue. Returns `false` at EOF.
    fn advance_input(&mut self) -> Result<bool, Error> {
        let line = match self.lines.next() {
            Some(l) => l,
            None => return Ok(false),
        };
        self.stats.rows_seen += 1;

        let row = match parse_line(&line) {
            Ok(row) => row,
            Err(e) => {
                self.stats.malformed_rows += 1;
                if log_enabled!(Level::Debug) {
                    debug!("skipping malformed pileup row: {}", e);
                }
                return Ok(true);
            }
        };

        self.current_pos = row.pos;

        if !Self::is_ref_base_acgt(row.ref_base) {
            return Ok(true);
        }
        if !self.in_contig_range(row.pos) || !self.in_extend_bed(row.pos) {
            return Ok(true);
        }

        let decoded = decode_position(&row, &self.profile);
        let position = decoded.position;
        let pos = position.pos;

        // The normal stream never proposes its own candidates from AF
        // evidence -- it only confirms that a tumor-proposed position was
        // covered. Mirrors `decode_pileup_bases`'s `not is_tumor` bypass in
        // the original source: the gate there degenerates to "depth alone"
        // for the normal sample regardless of allele fraction.
        let accept = if self.is_tumor {
            let af_gate_accept = self.candidate_bed.is_none()
                && decoded.passes_af_gate
                && position.depth >= self.profile.min_coverage;
            let known_variant_accept = self
                .known_variants
                .as_ref()
                .map(|known| known.variants(&self.contig).contains_key(&pos))
                .unwrap_or(false);
            let bed_accept = self
                .candidate_bed
                .as_ref()
                .map(|bed| bed.contains(&self.contig, pos - 1, pos))
                .unwrap_or(false);
            af_gate_accept || known_variant_accept || bed_accept
        } else {
            position.depth >= self.profile.min_coverage
        };

        self.window.insert(pos, position);
        if accept {
            self.candidates.push_back(pos);
        }

        Ok(true)
    }

    fn trim_window(&mut self, threshold: i64) {
        let drop_below = threshold - self.completion_distance();
        let stale: Vec<i64> = self
            .window
            .range(..drop_below)
            .map(|(&k, _)| k)
            .collect();
        for k in stale {
            self.window.remove(&k);
        }
    }

    /// Produce the next `(pos, is_tumor)` candidate, driving the underlying
    /// line iterator as far as necessary. Returns `None` once every buffered
    /// candidate has been flushed and the stream is exhausted.
    pub fn next_candidate(&mut self) -> Result<Option<Candidate>, Error> {
        loop {
            if let Some(&pos) = self.candidates.get(self.emit_cursor) {
                let ready = self.exhausted || self.current_pos - pos > self.completion_distance();
                if ready {
                    self.trim_window(pos);
                    self.emit_cursor += 1;
                    self.stats.candidates_emitted += 1;
                    let variant_type = self.variant_type_for(pos);
                    let candidate = CandidateBuilder::default()
                        .pos(pos)
                        .is_tumor(self.is_tumor)
                        .variant_type(variant_type)
                        .build()
                        .expect("pos and is_tumor are always set above");
                    return Ok(Some(candidate));
                }
            } else if self.exhausted {
                return Ok(None);
            }

            if !self.exhausted {
                let more = self.advance_input()?;
                if !more {
                    self.exhausted = true;
                }
            } else {
                return Ok(None);
            }
        }
    }
}

impl<I, B, K> Iterator for CandidateGenerator<I, B, K>
where
    I: Iterator<Item = String>,
    B: RegionFilter,
    K: KnownVariants,
{
    type Item = Result<Candidate, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_candidate().transpose()
    }
}
