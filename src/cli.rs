// Copyright 2024 Somatic Tensor Core Contributors.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::path::PathBuf;

use structopt::StructOpt;

use crate::platform::Platform;

/// Top-level CLI surface, mirroring the two independent entry points the
/// surrounding pipeline drives: tensor generation from a pair of pileup
/// streams, and het-SNP selection for phasing.
#[derive(Debug, StructOpt)]
#[structopt(
    name = "somatic-tensor-core",
    about = "Candidate enumeration and tensor extraction for a paired-sample somatic small-variant caller.",
    setting = structopt::clap::AppSettings::ColoredHelp,
)]
pub enum Opt {
    #[structopt(
        name = "create-tensor",
        about = "Enumerate somatic candidates and emit paired tensors.",
        setting = structopt::clap::AppSettings::ColoredHelp,
    )]
    CreateTensor(CreateTensorOpt),

    #[structopt(
        name = "select-hetero-snps",
        about = "Select heterozygous SNPs shared between normal and tumor for phasing.",
        setting = structopt::clap::AppSettings::ColoredHelp,
    )]
    SelectHeteroSnps(SelectHeteroSnpsOpt),
}

#[derive(Debug, StructOpt)]
pub struct CreateTensorOpt {
    #[structopt(long = "normal-bam-fn", parse(from_os_str))]
    pub normal_bam_fn: PathBuf,

    #[structopt(long = "tumor-bam-fn", parse(from_os_str))]
    pub tumor_bam_fn: PathBuf,

    #[structopt(long = "ref-fn", parse(from_os_str))]
    pub ref_fn: PathBuf,

    #[structopt(long = "ctg-name")]
    pub ctg_name: String,

    #[structopt(long = "ctg-start")]
    pub ctg_start: i64,

    #[structopt(long = "ctg-end")]
    pub ctg_end: i64,

    #[structopt(long = "chunk-id", default_value = "1")]
    pub chunk_id: u32,

    #[structopt(long = "chunk-num", default_value = "1")]
    pub chunk_num: u32,

    #[structopt(long = "bed-fn", parse(from_os_str))]
    pub bed_fn: Option<PathBuf>,

    #[structopt(long = "extend-bed", parse(from_os_str))]
    pub extend_bed: Option<PathBuf>,

    #[structopt(long = "candidates-bed-regions", parse(from_os_str))]
    pub candidates_bed_regions: Option<PathBuf>,

    #[structopt(long = "vcf-fn", parse(from_os_str))]
    pub vcf_fn: Option<PathBuf>,

    #[structopt(long = "snv-min-af")]
    pub snv_min_af: Option<f32>,

    #[structopt(long = "indel-min-af")]
    pub indel_min_af: Option<f32>,

    #[structopt(long = "min-coverage")]
    pub min_coverage: Option<u32>,

    #[structopt(long = "min-mq")]
    pub min_mq: Option<u8>,

    #[structopt(long = "min-bq")]
    pub min_bq: Option<u8>,

    #[structopt(long = "max-depth")]
    pub max_depth: Option<usize>,

    #[structopt(long = "phase-normal")]
    pub phase_normal: Option<PathBuf>,

    #[structopt(long = "phase-tumor")]
    pub phase_tumor: Option<PathBuf>,

    #[structopt(long = "tensor-can-fn", parse(from_os_str))]
    pub tensor_can_fn: PathBuf,

    #[structopt(long = "platform", default_value = "ont")]
    pub platform: Platform,

    /// YAML file of sparse [`crate::platform::ProfileOverrides`], applied on
    /// top of the platform default after the individual `--min-*`/`--*-af`
    /// flags.
    #[structopt(long = "profile-config", parse(from_os_str))]
    pub profile_config: Option<PathBuf>,

    #[structopt(long, short, parse(from_occurrences))]
    pub verbose: u8,
}

#[derive(Debug, StructOpt)]
pub struct SelectHeteroSnpsOpt {
    #[structopt(long = "tumor-vcf-fn", parse(from_os_str))]
    pub tumor_vcf_fn: PathBuf,

    #[structopt(long = "normal-vcf-fn", parse(from_os_str))]
    pub normal_vcf_fn: PathBuf,

    #[structopt(long = "var-pct-full", default_value = "0.0")]
    pub var_pct_full: f64,

    #[structopt(long = "ctg-name")]
    pub ctg_name: Option<String>,

    #[structopt(long = "min-qual", default_value = "5.0")]
    pub min_qual: f64,

    #[structopt(long = "output-folder", parse(from_os_str))]
    pub output_folder: PathBuf,

    #[structopt(long, short, parse(from_occurrences))]
    pub verbose: u8,
}
