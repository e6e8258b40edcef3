// Copyright 2024 Somatic Tensor Core Contributors.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Platform-dependent constants, threaded explicitly through the generator
//! and tensor builder instead of living behind process-wide statics.

use std::str::FromStr;

use getset::Getters;
use serde_derive::{Deserialize, Serialize};

/// Sequencing platform, selecting a [`PlatformProfile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ont,
    Hifi,
    Ilmn,
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ont" => Ok(Platform::Ont),
            "hifi" => Ok(Platform::Hifi),
            "ilmn" => Ok(Platform::Ilmn),
            other => Err(format!("unknown platform: {}", other)),
        }
    }
}

/// The full set of platform-dependent constants named in the configuration
/// section: flanking window half-width, channel count, per-sample depth
/// caps, AF/coverage/quality thresholds and BED extension.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlatformProfile {
    /// Half-width of the candidate window (`F`).
    pub flanking_base_num: i64,
    /// Fixed channel count per tensor cell.
    pub channel_size: usize,
    pub tumor_matrix_depth: usize,
    pub normal_matrix_depth: usize,
    pub snv_min_af: f32,
    pub indel_min_af: f32,
    pub min_coverage: u32,
    pub min_mq: u8,
    pub min_bq: u8,
    /// Extra bp the retention window is held open for, beyond `F`.
    pub extend_bp: i64,
    pub expand_reference_region: i64,
    pub samtools_view_filter_flag: u32,
}

impl PlatformProfile {
    /// Tensor width `W = 2F + 1`.
    pub fn no_of_positions(&self) -> i64 {
        2 * self.flanking_base_num + 1
    }

    /// The distance beyond which a candidate's window is known to be
    /// complete: `F + extend_bp`.
    pub fn completion_distance(&self) -> i64 {
        self.flanking_base_num + self.extend_bp
    }

    pub fn ont() -> Self {
        PlatformProfile {
            flanking_base_num: 16,
            channel_size: 8,
            tumor_matrix_depth: 300,
            normal_matrix_depth: 300,
            snv_min_af: 0.05,
            indel_min_af: 0.15,
            min_coverage: 4,
            min_mq: 20,
            min_bq: 0,
            extend_bp: 16,
            expand_reference_region: 100,
            samtools_view_filter_flag: 2316,
        }
    }

    pub fn hifi() -> Self {
        PlatformProfile {
            flanking_base_num: 16,
            channel_size: 8,
            tumor_matrix_depth: 300,
            normal_matrix_depth: 300,
            snv_min_af: 0.08,
            indel_min_af: 0.15,
            min_coverage: 4,
            min_mq: 20,
            min_bq: 0,
            extend_bp: 16,
            expand_reference_region: 100,
            samtools_view_filter_flag: 2316,
        }
    }

    pub fn ilmn() -> Self {
        PlatformProfile {
            flanking_base_num: 16,
            channel_size: 8,
            tumor_matrix_depth: 200,
            normal_matrix_depth: 200,
            snv_min_af: 0.05,
            indel_min_af: 0.15,
            min_coverage: 4,
            min_mq: 20,
            min_bq: 0,
            extend_bp: 16,
            expand_reference_region: 100,
            samtools_view_filter_flag: 2316,
        }
    }

    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::Ont => Self::ont(),
            Platform::Hifi => Self::hifi(),
            Platform::Ilmn => Self::ilmn(),
        }
    }

    /// Apply a sparse set of user overrides on top of this profile, keeping
    /// the platform default for every field the override file left unset.
    pub fn apply_overrides(mut self, overrides: &ProfileOverrides) -> Self {
        if let Some(v) = overrides.min_coverage() {
            self.min_coverage = *v;
        }
        if let Some(v) = overrides.min_mq() {
            self.min_mq = *v;
        }
        if let Some(v) = overrides.min_bq() {
            self.min_bq = *v;
        }
        if let Some(v) = overrides.snv_min_af() {
            self.snv_min_af = *v;
        }
        if let Some(v) = overrides.indel_min_af() {
            self.indel_min_af = *v;
        }
        self
    }
}

/// Partial, user-supplied overrides for a [`PlatformProfile`], loaded from a
/// YAML sidecar file via `--profile-config`. Every field is optional; an
/// absent field keeps the platform default.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Getters)]
#[getset(get = "pub")]
pub struct ProfileOverrides {
    #[serde(default)]
    min_coverage: Option<u32>,
    #[serde(default)]
    min_mq: Option<u8>,
    #[serde(default)]
    min_bq: Option<u8>,
    #[serde(default)]
    snv_min_af: Option<f32>,
    #[serde(default)]
    indel_min_af: Option<f32>,
}

impl ProfileOverrides {
    /// Parse a YAML document of overrides.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }
}
