// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use structopt::StructOpt;

use crate::calling::emit::VariantSelector;
use crate::calling::joint::{CohortSample, SampleRole};
use crate::calling::policy::Preset;
use crate::calling::regions::{exclude, partition, shard, Region};
use crate::calling::scan::{InMemoryCounts, ScannerBuilder};
use crate::config::Config;
use crate::variants::evidence::AlleleCountSummary;

#[derive(Debug, StructOpt, Clone)]
#[structopt(
    name = "triocall",
    about = "Joint candidate variant calling for a child and its parents from per-position allele counts.",
    setting = structopt::clap::AppSettings::ColoredHelp
)]
pub enum Triocall {
    #[structopt(
        name = "call",
        about = "Call candidate variants jointly over the given samples.",
        usage = "triocall call --child child.jsonl --parent1 mother.jsonl --parent2 father.jsonl > candidates.jsonl",
        setting = structopt::clap::AppSettings::ColoredHelp
    )]
    Call {
        #[structopt(
            long,
            parse(from_os_str),
            help = "Allele count summaries of the child (JSON lines)."
        )]
        child: PathBuf,
        #[structopt(
            long,
            parse(from_os_str),
            help = "Allele count summaries of the first parent (JSON lines)."
        )]
        parent1: Option<PathBuf>,
        #[structopt(
            long,
            parse(from_os_str),
            help = "Allele count summaries of the second parent (JSON lines)."
        )]
        parent2: Option<PathBuf>,
        #[structopt(
            long,
            parse(from_os_str),
            help = "YAML file with thresholds, model parameters and sample names."
        )]
        config: Option<PathBuf>,
        #[structopt(
            long,
            possible_values = &["default", "very-sensitive"],
            help = "Threshold preset (overrides the preset of the configuration)."
        )]
        preset: Option<Preset>,
        #[structopt(
            long,
            help = "Regions to call, given as CHROM or CHROM:START-END (1-based, inclusive). \
                    If omitted, all contigs with data are called."
        )]
        regions: Vec<Region>,
        #[structopt(
            long,
            help = "Regions to leave out, given like --regions. Exclusion is applied \
                    after --regions, so --regions chr20 --exclude-regions chr20:100-100 \
                    calls chr20 except position 100."
        )]
        exclude_regions: Vec<Region>,
        #[structopt(long, default_value = "0", help = "Index of this task when sharding.")]
        task: usize,
        #[structopt(long, default_value = "1", help = "Total number of shards.")]
        num_shards: usize,
        #[structopt(long, default_value = "1", help = "Number of worker threads.")]
        threads: usize,
        #[structopt(long, help = "Size of the pieces regions are split into (bp).")]
        partition_size: Option<u64>,
        #[structopt(
            long,
            possible_values = &["snps", "indels", "insertions", "deletions", "multi-allelics", "all"],
            help = "Only report variants of the given types."
        )]
        select_variant_types: Vec<VariantSelector>,
        #[structopt(
            long,
            short,
            parse(from_os_str),
            help = "File to write records to as JSON lines (if omitted, write to STDOUT)."
        )]
        output: Option<PathBuf>,
        #[structopt(long, short, help = "Print debug information.")]
        verbose: bool,
    },
}

impl Triocall {
    pub fn verbose(&self) -> bool {
        match self {
            Triocall::Call { verbose, .. } => *verbose,
        }
    }
}

pub fn run(opt: Triocall) -> Result<()> {
    match opt {
        Triocall::Call {
            ref child,
            ref parent1,
            ref parent2,
            ref config,
            preset,
            ref regions,
            ref exclude_regions,
            task,
            num_shards,
            threads,
            partition_size,
            ref select_variant_types,
            ref output,
            ..
        } => {
            let mut config = match config {
                Some(path) => Config::from_path(path)?,
                None => Config::default(),
            };
            if let Some(preset) = preset {
                config.set_preset(preset);
            }
            if let Some(partition_size) = partition_size {
                config.set_partition_size(partition_size);
            }
            if !select_variant_types.is_empty() {
                config.set_select_variant_types(select_variant_types.clone());
            }

            let inputs: Vec<(SampleRole, &PathBuf)> = vec![
                (SampleRole::Child, Some(child)),
                (SampleRole::Parent1, parent1.as_ref()),
                (SampleRole::Parent2, parent2.as_ref()),
            ]
            .into_iter()
            .filter_map(|(role, path)| path.map(|path| (role, path)))
            .collect();

            if config.samples().is_empty() {
                config.set_samples(
                    inputs
                        .iter()
                        .map(|(role, path)| CohortSample::new(sample_name(path, *role), *role))
                        .collect(),
                );
            }
            config.validate()?;
            let caller = config.joint_caller()?;

            let mut counts = InMemoryCounts::new(caller.cohort().len());
            for (i, sample) in caller.cohort().samples().iter().enumerate() {
                let path = match inputs.iter().find(|(role, _)| *role == sample.role()) {
                    Some((_, path)) => path,
                    None => bail!(
                        "No allele counts given for sample {} ({}).",
                        sample.name(),
                        sample.role()
                    ),
                };
                let n = read_summaries(path, |summary| counts.insert(i, summary))?;
                info!("Read {} allele count summaries of sample {}.", n, sample.name());
            }

            let regions = if regions.is_empty() {
                counts.contigs()
            } else {
                regions.iter().map(|region| counts.bounded(region)).collect()
            };
            let regions = exclude(regions, exclude_regions);
            let regions = shard(
                partition(&regions, config.partition_size()),
                task,
                num_shards,
            )?;

            let scanner = ScannerBuilder::default()
                .caller(caller)
                .threads(threads)
                .selectors(config.select_variant_types().clone())
                .log_each_position(config.log_each_position())
                .build()?;

            let mut writer: Box<dyn Write> = match output {
                Some(path) => Box::new(BufWriter::new(File::create(path).with_context(
                    || format!("Unable to create output file {}.", path.display()),
                )?)),
                None => Box::new(BufWriter::new(io::stdout())),
            };
            let summary = scanner.scan(&counts, &regions, |record| {
                serde_json::to_writer(&mut writer, &record)?;
                writer.write_all(b"\n")?;
                Ok(())
            })?;
            writer.flush()?;

            info!(
                "Processed {} positions, reported {} candidates, skipped {} positions.",
                summary.positions(),
                summary.records(),
                summary.skipped().len()
            );
        }
    }
    Ok(())
}

fn sample_name(path: &Path, role: SampleRole) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map_or_else(|| role.to_string(), |stem| stem.to_owned())
}

/// Read JSON lines of allele count summaries. Empty lines are ignored.
fn read_summaries<F>(path: &Path, mut consume: F) -> Result<usize>
where
    F: FnMut(AlleleCountSummary),
{
    let reader = BufReader::new(
        File::open(path)
            .with_context(|| format!("Unable to open allele counts {}.", path.display()))?,
    );
    let mut n = 0;
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let summary: AlleleCountSummary = serde_json::from_str(&line).with_context(|| {
            format!(
                "Invalid allele count summary in line {} of {}.",
                i + 1,
                path.display()
            )
        })?;
        consume(summary);
        n += 1;
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_parse_args() {
        let opt = Triocall::from_iter(&[
            "triocall",
            "call",
            "--child",
            "child.jsonl",
            "--preset",
            "very-sensitive",
            "--regions",
            "chr1:1-100",
            "chr2",
            "--exclude-regions",
            "chr2:5-10",
            "--select-variant-types",
            "insertions",
            "deletions",
            "--verbose",
        ]);
        assert!(opt.verbose());
        match opt {
            Triocall::Call {
                preset,
                regions,
                exclude_regions,
                select_variant_types,
                ..
            } => {
                assert_eq!(preset, Some(Preset::VerySensitive));
                assert_eq!(regions.len(), 2);
                assert_eq!(
                    exclude_regions,
                    vec![Region::new("chr2".to_owned(), 4, Some(10))]
                );
                assert_eq!(
                    select_variant_types,
                    vec![VariantSelector::Insertions, VariantSelector::Deletions]
                );
            }
        }
    }

    #[test]
    fn test_run_trio() {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, lines: &[&str]| {
            let path = dir.path().join(name);
            fs::write(&path, lines.join("\n")).unwrap();
            path
        };
        let child = write(
            "child.jsonl",
            &[
                r#"{"contig": "chr1", "pos": 10, "ref_base": "A", "depth": 20, "alleles": [{"allele": "=", "count": 12}, {"allele": "G", "count": 8}]}"#,
                r#"{"contig": "chr1", "pos": 11, "ref_base": "C", "depth": 20, "alleles": [{"allele": "=", "count": 20}]}"#,
            ],
        );
        let mother = write(
            "mother.jsonl",
            &[
                r#"{"contig": "chr1", "pos": 10, "ref_base": "A", "depth": 20, "alleles": [{"allele": "=", "count": 19}, {"allele": "G", "count": 1}]}"#,
            ],
        );
        let output = dir.path().join("out.jsonl");
        let call = |exclude_regions: Vec<Region>| {
            run(Triocall::Call {
                child: child.clone(),
                parent1: Some(mother.clone()),
                parent2: None,
                config: None,
                preset: None,
                regions: vec![],
                exclude_regions,
                task: 0,
                num_shards: 1,
                threads: 2,
                partition_size: None,
                select_variant_types: vec![],
                output: Some(output.clone()),
                verbose: false,
            })
        };

        call(vec!["chr1:11-11".parse().unwrap()]).unwrap();
        assert!(fs::read_to_string(&output).unwrap().is_empty());

        call(vec![]).unwrap();

        let records = fs::read_to_string(&output).unwrap();
        let records: Vec<serde_json::Value> = records
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["pos"], 10);
        assert_eq!(records[0]["alternates"][0], "G");
        assert_eq!(records[0]["samples"][0]["sample"], "child");
        assert_eq!(records[0]["samples"][1]["sample"], "mother");
        assert_eq!(records[0]["samples"][1]["promoted"], true);
    }
}
