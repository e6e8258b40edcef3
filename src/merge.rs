// Copyright 2024 Somatic Tensor Core Contributors.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Component D: the paired merge. Sort-merges the normal and tumor
//! candidate generators by coordinate and yields only tumor positions with
//! matching normal-stream evidence.

use std::collections::{HashMap, HashSet};

use crate::candidates::{CandidateGenerator, Candidate, PositionWindow};
use crate::errors::Error;
use crate::interfaces::{KnownVariants, RegionFilter};

/// A candidate stream that can report a snapshot of its current retention
/// window. Implemented by [`CandidateGenerator`] in production, and by the
/// plain iterator types this module's own tests drive `PairedMerge` with.
pub trait WindowSource {
    fn current_window(&self) -> PositionWindow;
}

impl<I, B, K> WindowSource for CandidateGenerator<I, B, K>
where
    I: Iterator<Item = String>,
    B: RegionFilter,
    K: KnownVariants,
{
    fn current_window(&self) -> PositionWindow {
        self.window().clone()
    }
}

/// Sort-merges two `(pos, is_tumor)` candidate streams by coordinate (ties
/// broken normal-before-tumor) and yields a tumor `pos` only once it has
/// been seen, one-shot, in the normal stream -- unless `skip_if_normal_empty`
/// is false, in which case every tumor candidate is yielded unconditionally.
///
/// The sibling stream keeps advancing past the position just emitted (to
/// look ahead for pairing), which can trim its retention window past what
/// that position needs. So each stream's window is snapshotted the moment
/// its candidate is consumed, and [`PairedMerge::normal_window`]/
/// [`PairedMerge::tumor_window`] serve that snapshot rather than reaching
/// into the live, possibly-advanced generator.
pub struct PairedMerge<N, T>
where
    N: Iterator<Item = Result<Candidate, Error>> + WindowSource,
    T: Iterator<Item = Result<Candidate, Error>> + WindowSource,
{
    normal: N,
    tumor: T,
    normal_peek: Option<Result<Candidate, Error>>,
    tumor_peek: Option<Result<Candidate, Error>>,
    normal_seen: HashSet<i64>,
    normal_window_snapshots: HashMap<i64, PositionWindow>,
    last_normal_window: PositionWindow,
    last_tumor_window: PositionWindow,
    skip_if_normal_empty: bool,
    last_emitted: Option<i64>,
    last_variant_type: String,
}

impl<N, T> PairedMerge<N, T>
where
    N: Iterator<Item = Result<Candidate, Error>> + WindowSource,
    T: Iterator<Item = Result<Candidate, Error>> + WindowSource,
{
    pub fn new(normal: N, tumor: T, skip_if_normal_empty: bool) -> Self {
        PairedMerge {
            normal,
            tumor,
            normal_peek: None,
            tumor_peek: None,
            normal_seen: HashSet::new(),
            normal_window_snapshots: HashMap::new(),
            last_normal_window: PositionWindow::new(),
            last_tumor_window: PositionWindow::new(),
            skip_if_normal_empty,
            last_emitted: None,
            last_variant_type: "unknown".to_owned(),
        }
    }

    /// The `variant_type` of the candidate most recently returned by
    /// `next_merged`/`next`.
    pub fn last_variant_type(&self) -> &str {
        &self.last_variant_type
    }

    /// The normal generator's retention window as snapshotted when its
    /// candidate paired with the last position returned by `next_merged`.
    pub fn normal_window(&self) -> &PositionWindow {
        &self.last_normal_window
    }

    /// The tumor generator's retention window as of the last position
    /// returned by `next_merged`.
    pub fn tumor_window(&self) -> &PositionWindow {
        &self.last_tumor_window
    }

    fn peek_normal(&mut self) -> Option<i64> {
        if self.normal_peek.is_none() {
            self.normal_peek = self.normal.next();
        }
        self.normal_peek.as_ref().and_then(|r| r.as_ref().ok()).map(|c| c.pos)
    }

    fn peek_tumor(&mut self) -> Option<i64> {
        if self.tumor_peek.is_none() {
            self.tumor_peek = self.tumor.next();
        }
        self.tumor_peek.as_ref().and_then(|r| r.as_ref().ok()).map(|c| c.pos)
    }

    /// Produce the next merged tumor position passing the pairing rule, or
    /// `None` once both streams are drained.
    pub fn next_merged(&mut self) -> Result<Option<i64>, Error> {
        loop {
            let normal_pos = self.peek_normal();
            let tumor_pos = self.peek_tumor();

            match (normal_pos, tumor_pos) {
                (None, None) => return Ok(None),
                (Some(_), None) => {
                    self.consume_normal()?;
                }
                (None, Some(_)) => {
                    if let Some(pos) = self.consume_tumor()? {
                        return Ok(Some(pos));
                    }
                }
                (Some(np), Some(tp)) => {
                    if np <= tp {
                        self.consume_normal()?;
                    } else if let Some(pos) = self.consume_tumor()? {
                        return Ok(Some(pos));
                    }
                }
            }
        }
    }

    fn consume_normal(&mut self) -> Result<(), Error> {
        match self.normal_peek.take().or_else(|| self.normal.next()) {
            Some(Ok(c)) => {
                self.normal_seen.insert(c.pos);
                // Snapshot the window now, before any further advance (driven
                // by a later peek) has a chance to trim this position out.
                self.normal_window_snapshots.insert(c.pos, self.normal.current_window());
                Ok(())
            }
            Some(Err(e)) => Err(e),
            None => Ok(()),
        }
    }

    fn consume_tumor(&mut self) -> Result<Option<i64>, Error> {
        let candidate = match self.tumor_peek.take().or_else(|| self.tumor.next()) {
            Some(Ok(c)) => c,
            Some(Err(e)) => return Err(e),
            None => return Ok(None),
        };

        if self.last_emitted == Some(candidate.pos) {
            return Ok(None);
        }

        let paired = self.normal_seen.remove(&candidate.pos);
        if paired || !self.skip_if_normal_empty {
            self.last_emitted = Some(candidate.pos);
            self.last_variant_type = candidate.variant_type;
            self.last_normal_window = self
                .normal_window_snapshots
                .remove(&candidate.pos)
                .unwrap_or_default();
            self.last_tumor_window = self.tumor.current_window();
            Ok(Some(candidate.pos))
        } else {
            Ok(None)
        }
    }
}

impl<N, T> Iterator for PairedMerge<N, T>
where
    N: Iterator<Item = Result<Candidate, Error>> + WindowSource,
    T: Iterator<Item = Result<Candidate, Error>> + WindowSource,
{
    type Item = Result<i64, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_merged().transpose()
    }
}
