// Copyright 2024 Somatic Tensor Core Contributors.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Candidate-enumeration and feature-extraction core for a paired-sample
//! (normal/tumor) somatic small-variant caller: decodes pileup text, drives
//! paired candidate discovery across the two streams, and materializes
//! fixed-shape read-evidence tensors for a downstream classifier.

pub mod candidates;
pub mod cli;
pub mod errors;
pub mod interfaces;
pub mod merge;
pub mod phasing;
pub mod pileup;
pub mod platform;
pub mod position;
pub mod reads;
pub mod tensor;

pub use candidates::{Candidate, CandidateGenerator, PositionWindow};
pub use errors::Error;
pub use interfaces::{KnownVariants, ReferenceSource, RegionFilter, VcfRecord};
pub use merge::PairedMerge;
pub use phasing::{select_hetero_snps, PhasingParams, PhasingStats};
pub use pileup::{parse_line, BaseCall, PileupRow};
pub use platform::{Platform, PlatformProfile};
pub use position::{decode_position, Position, ReadObservation};
pub use reads::{order_reads, HaplotypeMap, OrderedRead};
pub use tensor::{build_alt_info, build_tensor, parse_alt_info, passes_confident_region, AltInfo, TensorParams};
