// Copyright 2024 Somatic Tensor Core Contributors.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::process::exit;

use anyhow::{Context, Result};
use log::info;
use structopt::StructOpt;

use somatic_tensor_core::cli::{CreateTensorOpt, Opt, SelectHeteroSnpsOpt};
use somatic_tensor_core::errors::Error;
use somatic_tensor_core::interfaces::fakes::{InMemoryKnownVariants, IntervalListFilter};
use somatic_tensor_core::interfaces::{ReferenceSource, VcfRecord};
use somatic_tensor_core::platform::{PlatformProfile, ProfileOverrides};
use somatic_tensor_core::reads::HaplotypeMap;
use somatic_tensor_core::tensor::{build_alt_info, build_tensor, passes_confident_region, TensorParams};
use somatic_tensor_core::{candidates::CandidateGenerator, merge::PairedMerge, reads::order_reads};

fn setup_logger(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("[{}] {}", record.level(), message))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()
        .ok();
}

/// A single-contig plain-FASTA reference. Real FASTA indexing is an
/// external collaborator; this is the minimal in-process substitute the
/// CLI needs to be runnable standalone.
struct FastaReference {
    contig: String,
    sequence: Vec<u8>,
}

impl FastaReference {
    fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("opening reference {:?}", path))?;
        let mut contig = String::new();
        let mut sequence = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if let Some(header) = line.strip_prefix('>') {
                contig = header.split_whitespace().next().unwrap_or("").to_owned();
            } else {
                sequence.extend(line.trim().as_bytes().to_ascii_uppercase());
            }
        }
        Ok(FastaReference { contig, sequence })
    }
}

impl ReferenceSource for FastaReference {
    fn fetch(&self, contig: &str, start: i64, end: i64) -> std::result::Result<Vec<u8>, Error> {
        if contig != self.contig || start < 1 || end < start {
            return Err(Error::ReferenceUnavailable { contig: contig.to_owned(), pos: start });
        }
        let lo = (start - 1) as usize;
        let hi = end.min(self.sequence.len() as i64) as usize;
        if lo >= self.sequence.len() || lo > hi {
            return Err(Error::ReferenceUnavailable { contig: contig.to_owned(), pos: start });
        }
        Ok(self.sequence[lo..hi].to_vec())
    }
}

fn open_lines(path: &Path) -> Result<impl Iterator<Item = String>> {
    let file = File::open(path).with_context(|| format!("opening pileup stream {:?}", path))?;
    Ok(BufReader::new(file)
        .lines()
        .map(|l| l.expect("upstream pileup stream closed unexpectedly")))
}

fn load_bed(path: Option<&std::path::PathBuf>) -> Result<Option<IntervalListFilter>> {
    let path = match path {
        Some(p) => p,
        None => return Ok(None),
    };
    let file = File::open(path).with_context(|| format!("opening BED {:?}", path))?;
    let mut filter = IntervalListFilter::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 {
            continue;
        }
        let start: i64 = fields[1].parse().unwrap_or(0);
        let end: i64 = fields[2].parse().unwrap_or(0);
        filter.push(fields[0], start, end);
    }
    Ok(Some(filter))
}

/// Extract the optional 4th-column `variant_type` override (Scenario 5,
/// e.g. `homo_somatic`) from a candidate BED, keyed by the BED row's end
/// coordinate (the 1-based position the row designates).
fn load_bed_variant_types(path: Option<&std::path::PathBuf>) -> Result<HashMap<i64, String>> {
    let mut types = HashMap::new();
    let path = match path {
        Some(p) => p,
        None => return Ok(types),
    };
    let file = File::open(path).with_context(|| format!("opening BED {:?}", path))?;
    for line in BufReader::new(file).lines() {
        let line = line?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 {
            continue;
        }
        if let Ok(end) = fields[2].parse::<i64>() {
            types.insert(end, fields[3].to_owned());
        }
    }
    Ok(types)
}

fn load_known_variants(path: Option<&std::path::PathBuf>) -> Result<Option<InMemoryKnownVariants>> {
    let path = match path {
        Some(p) => p,
        None => return Ok(None),
    };
    let file = File::open(path).with_context(|| format!("opening known-variants VCF {:?}", path))?;
    let mut known = InMemoryKnownVariants::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.starts_with('#') {
            continue;
        }
        if let Some(rec) = parse_vcf_line(&line) {
            let contig = line.split('\t').next().unwrap_or("").to_owned();
            known.insert(&contig, rec);
        }
    }
    Ok(Some(known))
}

fn parse_vcf_line(line: &str) -> Option<VcfRecord> {
    let columns: Vec<&str> = line.split('\t').collect();
    if columns.len() < 10 {
        return None;
    }
    let pos: i64 = columns[1].parse().ok()?;
    let reference = columns[3].to_owned();
    let alt = columns[4].to_owned();
    let qual: f64 = columns[5].parse().unwrap_or(0.0);
    let gt_field = columns[9].split(':').next().unwrap_or("0/0").replace('|', "/");
    let mut gt_parts = gt_field.split('/');
    let g0: u8 = gt_parts.next()?.parse().unwrap_or(0);
    let g1: u8 = gt_parts.next()?.parse().unwrap_or(0);
    Some(VcfRecord {
        pos,
        reference,
        alt,
        genotype: (g0, g1),
        qual,
        raw_row: line.to_owned(),
    })
}

fn load_profile_overrides(path: Option<&std::path::PathBuf>) -> Result<Option<ProfileOverrides>> {
    let path = match path {
        Some(p) => p,
        None => return Ok(None),
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("opening profile config {:?}", path))?;
    let overrides = ProfileOverrides::from_yaml(&text)
        .with_context(|| format!("parsing profile config {:?}", path))?;
    Ok(Some(overrides))
}

fn load_haplotype_map(path: Option<&std::path::PathBuf>) -> Result<HaplotypeMap> {
    let mut map = HaplotypeMap::new();
    let path = match path {
        Some(p) => p,
        None => return Ok(map),
    };
    let file = File::open(path).with_context(|| format!("opening phasing map {:?}", path))?;
    for line in BufReader::new(file).lines() {
        let line = line?;
        let mut cols = line.split_whitespace();
        if let (Some(name), Some(hp)) = (cols.next(), cols.next()) {
            if let Ok(hp) = hp.parse::<u8>() {
                map.observe(name, hp);
            }
        }
    }
    Ok(map)
}

fn flatten_tensor(tensor: &ndarray::Array3<i32>) -> String {
    let shape = tensor.shape();
    let (d, w) = (shape[0], shape[1]);
    let mut rows = Vec::with_capacity(d);
    for i in 0..d {
        let mut cells = Vec::with_capacity(w);
        for j in 0..w {
            for c in 0..shape[2] {
                cells.push(tensor[[i, j, c]].to_string());
            }
        }
        rows.push(cells.join(" "));
    }
    rows.join(" ")
}

fn run_create_tensor(opt: CreateTensorOpt) -> Result<()> {
    let mut profile = PlatformProfile::for_platform(opt.platform);
    if let Some(v) = opt.snv_min_af {
        profile.snv_min_af = v;
    }
    if let Some(v) = opt.indel_min_af {
        profile.indel_min_af = v;
    }
    if let Some(v) = opt.min_coverage {
        profile.min_coverage = v;
    }
    if let Some(v) = opt.min_mq {
        profile.min_mq = v;
    }
    if let Some(v) = opt.min_bq {
        profile.min_bq = v;
    }
    if let Some(v) = opt.max_depth {
        profile.tumor_matrix_depth = v;
        profile.normal_matrix_depth = v;
    }
    if let Some(overrides) = load_profile_overrides(opt.profile_config.as_ref())? {
        profile = profile.apply_overrides(&overrides);
    }

    let reference = FastaReference::load(&opt.ref_fn)?;
    let candidate_bed = load_bed(opt.candidates_bed_regions.as_ref())?;
    let extend_bed = load_bed(opt.extend_bed.as_ref())?;
    let confident_bed = load_bed(opt.bed_fn.as_ref())?;
    let known_variants = load_known_variants(opt.vcf_fn.as_ref())?;

    let normal_lines = open_lines(&opt.normal_bam_fn)?;
    let tumor_lines = open_lines(&opt.tumor_bam_fn)?;

    let normal_gen = CandidateGenerator::new(
        normal_lines,
        false,
        opt.ctg_name.clone(),
        opt.ctg_start,
        opt.ctg_end,
        profile,
        candidate_bed.clone(),
        known_variants.clone(),
        extend_bed.clone(),
    );
    let candidate_types = load_bed_variant_types(opt.candidates_bed_regions.as_ref())?;
    let tumor_gen = CandidateGenerator::new(
        tumor_lines,
        true,
        opt.ctg_name.clone(),
        opt.ctg_start,
        opt.ctg_end,
        profile,
        candidate_bed,
        known_variants,
        extend_bed,
    )
    .with_candidate_types(candidate_types);

    let global_hap_normal = load_haplotype_map(opt.phase_normal.as_ref())?;
    let global_hap_tumor = load_haplotype_map(opt.phase_tumor.as_ref())?;

    let output = File::create(&opt.tensor_can_fn)
        .with_context(|| format!("creating output {:?}", opt.tensor_can_fn))?;
    let mut writer = BufWriter::new(output);

    let mut emitted = 0u64;
    let mut merge = PairedMerge::new(normal_gen, tumor_gen, opt.vcf_fn.is_none());
    while let Some(pos) = merge.next_merged()? {
        if !passes_confident_region(confident_bed.as_ref(), &opt.ctg_name, pos, profile.flanking_base_num) {
            continue;
        }

        let ref_window = reference
            .fetch(&opt.ctg_name, pos - profile.flanking_base_num, pos + profile.flanking_base_num)
            .unwrap_or_default();
        let ref_window_str: String = ref_window.iter().map(|&b| b as char).collect();

        let normal_window = merge.normal_window();
        let tumor_window = merge.tumor_window();

        let normal_ordered = order_reads(
            normal_window,
            pos,
            profile.flanking_base_num,
            &global_hap_normal,
            profile.normal_matrix_depth,
        );
        let tumor_ordered = order_reads(
            tumor_window,
            pos,
            profile.flanking_base_num,
            &global_hap_tumor,
            profile.tumor_matrix_depth,
        );

        let normal_params = TensorParams {
            center: pos,
            flanking_base_num: profile.flanking_base_num,
            max_depth: profile.normal_matrix_depth,
            channel_size: profile.channel_size,
            is_tumor: false,
            mask_low_bq: true,
        };
        let tumor_params = TensorParams {
            center: pos,
            flanking_base_num: profile.flanking_base_num,
            max_depth: profile.tumor_matrix_depth,
            channel_size: profile.channel_size,
            is_tumor: true,
            mask_low_bq: true,
        };

        let normal_tensor = build_tensor(normal_window, &normal_ordered, &normal_params);
        let tumor_tensor = build_tensor(tumor_window, &tumor_ordered, &tumor_params);
        let normal_alt_info = build_alt_info(normal_window, pos);
        let tumor_alt_info = build_alt_info(tumor_window, pos);
        let variant_type = merge.last_variant_type().to_owned();

        emitted += 1;
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            opt.ctg_name,
            pos,
            ref_window_str,
            flatten_tensor(&normal_tensor),
            normal_alt_info,
            flatten_tensor(&tumor_tensor),
            tumor_alt_info,
            variant_type,
        )?;
    }

    info!("emitted {} candidate records for {}:{}-{}", emitted, opt.ctg_name, opt.ctg_start, opt.ctg_end);
    Ok(())
}

fn run_select_hetero_snps(opt: SelectHeteroSnpsOpt) -> Result<()> {
    let normal_file = File::open(&opt.normal_vcf_fn)
        .with_context(|| format!("opening {:?}", opt.normal_vcf_fn))?;
    let tumor_file = File::open(&opt.tumor_vcf_fn)
        .with_context(|| format!("opening {:?}", opt.tumor_vcf_fn))?;

    let mut header = Vec::new();
    let mut normal_records = Vec::new();
    for line in BufReader::new(normal_file).lines() {
        let line = line?;
        if line.starts_with('#') {
            header.push(line);
            continue;
        }
        if let Some(ctg) = opt.ctg_name.as_ref() {
            if !line.starts_with(ctg.as_str()) {
                continue;
            }
        }
        if let Some(rec) = parse_vcf_line(&line) {
            normal_records.push(rec);
        }
    }

    let mut tumor_records = Vec::new();
    for line in BufReader::new(tumor_file).lines() {
        let line = line?;
        if line.starts_with('#') {
            continue;
        }
        if let Some(ctg) = opt.ctg_name.as_ref() {
            if !line.starts_with(ctg.as_str()) {
                continue;
            }
        }
        if let Some(rec) = parse_vcf_line(&line) {
            tumor_records.push(rec);
        }
    }

    let params = somatic_tensor_core::phasing::PhasingParams {
        var_pct_full: opt.var_pct_full,
        min_qual: opt.min_qual,
    };
    let (passing, stats) = somatic_tensor_core::select_hetero_snps(&normal_records, &tumor_records, &params);

    std::fs::create_dir_all(&opt.output_folder)?;
    let out_name = opt.ctg_name.clone().unwrap_or_else(|| "all".to_owned());
    let out_path = opt.output_folder.join(format!("{}.vcf", out_name));
    let output = File::create(&out_path).with_context(|| format!("creating {:?}", out_path))?;
    let mut writer = BufWriter::new(output);
    for line in &header {
        writeln!(writer, "{}", line)?;
    }
    for rec in &passing {
        writeln!(writer, "{}", rec.raw_row)?;
    }

    info!(
        "het-SNP phasing selected {} records (not_found={}, not_matched={}, low_qual={})",
        stats.passed, stats.not_found_in_tumor, stats.not_matched_in_tumor, stats.low_qual_dropped
    );
    Ok(())
}

fn main() {
    let opt = Opt::from_args();

    let verbose = match &opt {
        Opt::CreateTensor(o) => o.verbose,
        Opt::SelectHeteroSnps(o) => o.verbose,
    };
    setup_logger(verbose);

    let result = match opt {
        Opt::CreateTensor(o) => run_create_tensor(o),
        Opt::SelectHeteroSnps(o) => run_select_hetero_snps(o),
    };

    exit(match result {
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
        Ok(()) => 0,
    })
}
