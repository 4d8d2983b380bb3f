use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossbeam::channel::{Receiver, Sender};
use derive_builder::Builder;
use progress_logger::ProgressLogger;

use crate::calling::emit::{emit, is_selected, VariantRecord, VariantSelector};
use crate::calling::joint::JointCaller;
use crate::calling::regions::Region;
use crate::utils::worker_pool::{worker_pool, Orderable};
use crate::variants::evidence::AlleleCountSummary;

/// Provider of per-position allele count summaries, e.g. a pileup collector.
pub trait AlleleCountSource: Sync {
    /// Summaries of all cohort samples (in cohort order) for every position
    /// with data in the region, in position order.
    fn fetch(&self, region: &Region) -> Result<Vec<Vec<Option<AlleleCountSummary>>>>;
}

/// Summaries held in memory, indexed by contig and position.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCounts {
    n_samples: usize,
    positions: BTreeMap<(String, u64), Vec<Option<AlleleCountSummary>>>,
}

impl InMemoryCounts {
    pub fn new(n_samples: usize) -> Self {
        InMemoryCounts {
            n_samples,
            positions: BTreeMap::new(),
        }
    }

    /// Register the summary of the given sample (index in cohort order).
    pub fn insert(&mut self, sample: usize, summary: AlleleCountSummary) {
        assert!(sample < self.n_samples, "bug: sample index out of range");
        let n_samples = self.n_samples;
        let entry = self
            .positions
            .entry((summary.contig().clone(), *summary.pos()))
            .or_insert_with(|| vec![None; n_samples]);
        entry[sample] = Some(summary);
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// One region per stored contig, from its start to the last position with data.
    pub fn contigs(&self) -> Vec<Region> {
        let mut regions: Vec<Region> = Vec::new();
        for (contig, pos) in self.positions.keys() {
            if regions.last().map_or(false, |region| region.contig() == contig) {
                regions.pop();
            }
            regions.push(Region::new(contig.clone(), 0, Some(pos + 1)));
        }
        regions
    }

    /// End an unbounded region after the last position with data on its contig.
    pub fn bounded(&self, region: &Region) -> Region {
        if region.end().is_some() {
            return region.clone();
        }
        let end = self
            .positions
            .range((region.contig().clone(), region.start())..)
            .take_while(|((contig, _), _)| contig == region.contig())
            .last()
            .map_or(region.start(), |((_, pos), _)| pos + 1);
        Region::new(region.contig().clone(), region.start(), Some(end))
    }
}

impl AlleleCountSource for InMemoryCounts {
    fn fetch(&self, region: &Region) -> Result<Vec<Vec<Option<AlleleCountSummary>>>> {
        let start = (region.contig().clone(), region.start());
        Ok(self
            .positions
            .range(start..)
            .take_while(|((contig, pos), _)| region.contains(contig, *pos))
            .map(|(_, summaries)| summaries.clone())
            .collect())
    }
}

/// Cooperative stop signal for a running scan.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(new, Getters, CopyGetters, Debug, Clone, PartialEq, Serialize)]
pub struct SkippedPosition {
    #[getset(get = "pub")]
    contig: String,
    #[getset(get_copy = "pub")]
    pos: u64,
    #[getset(get = "pub")]
    msg: String,
}

#[derive(Getters, CopyGetters, Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanSummary {
    #[getset(get_copy = "pub")]
    positions: usize,
    #[getset(get_copy = "pub")]
    records: usize,
    #[getset(get = "pub")]
    skipped: Vec<SkippedPosition>,
    #[getset(get_copy = "pub")]
    cancelled: bool,
}

struct RegionResult {
    index: usize,
    positions: usize,
    records: Vec<VariantRecord>,
    skipped: Vec<SkippedPosition>,
    cancelled: bool,
}

impl Orderable for RegionResult {
    fn index(&self) -> usize {
        self.index
    }
}

/// Runs the joint caller over regions in parallel and hands the emitted
/// records to a sink in genomic order.
#[derive(Builder)]
#[builder(pattern = "owned")]
pub struct Scanner {
    caller: JointCaller,
    #[builder(default = "1")]
    threads: usize,
    #[builder(default)]
    selectors: Vec<VariantSelector>,
    #[builder(default)]
    cancellation: CancellationToken,
    #[builder(default)]
    log_each_position: bool,
}

impl Scanner {
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Scan the regions. Positions with malformed input are skipped and reported
    /// in the summary, any other error aborts the scan.
    ///
    /// After cancellation, no record of a region following an interrupted
    /// region reaches the sink.
    pub fn scan<S, F>(&self, source: &S, regions: &[Region], mut sink: F) -> Result<ScanSummary>
    where
        S: AlleleCountSource,
        F: FnMut(VariantRecord) -> Result<()>,
    {
        let mut summary = ScanSummary::default();
        let mut progress_logger = ProgressLogger::builder()
            .with_items_name("positions")
            .with_frequency(Duration::from_secs(20))
            .start();

        let preprocessor = |sender: Sender<usize>| -> Result<()> {
            for index in 0..regions.len() {
                if self.cancellation.is_cancelled() {
                    break;
                }
                sender.send(index)?;
            }
            Ok(())
        };

        let workers = (0..self.threads.max(1)).map(move |_| {
            move |receiver: Receiver<usize>, sender: Sender<RegionResult>| -> Result<()> {
                for index in receiver {
                    sender.send(self.process_region(source, index, &regions[index])?)?;
                }
                Ok(())
            }
        });

        let postprocessor = |result: RegionResult| -> Result<()> {
            if summary.cancelled {
                return Ok(());
            }
            summary.positions += result.positions;
            progress_logger.update(result.positions as u64);
            for record in result.records {
                summary.records += 1;
                sink(record)?;
            }
            summary.skipped.extend(result.skipped);
            summary.cancelled = result.cancelled;
            Ok(())
        };

        worker_pool(
            preprocessor,
            workers,
            postprocessor,
            self.threads.max(1) * 2,
            self.threads.max(1) * 2,
        )?;
        progress_logger.stop();

        // regions that were never dispatched
        if self.cancellation.is_cancelled() {
            summary.cancelled = true;
        }
        if summary.cancelled {
            info!("Scan cancelled after {} positions.", summary.positions);
        }
        if !summary.skipped.is_empty() {
            warn!(
                "Skipped {} positions with invalid input.",
                summary.skipped.len()
            );
        }

        Ok(summary)
    }

    fn process_region<S: AlleleCountSource>(
        &self,
        source: &S,
        index: usize,
        region: &Region,
    ) -> Result<RegionResult> {
        let mut result = RegionResult {
            index,
            positions: 0,
            records: Vec::new(),
            skipped: Vec::new(),
            cancelled: false,
        };
        debug!("Processing region {}.", region);

        for summaries in source.fetch(region)? {
            if self.cancellation.is_cancelled() {
                result.cancelled = true;
                break;
            }
            result.positions += 1;
            match self.caller.call_position(&summaries) {
                Ok(candidate) => {
                    if self.log_each_position {
                        info!(
                            "Called {}:{} (reportable: {}).",
                            candidate.contig(),
                            candidate.pos(),
                            candidate.reportable()
                        );
                    }
                    if candidate.reportable() {
                        let record = emit(&candidate);
                        if is_selected(&self.selectors, &record) {
                            result.records.push(record);
                        }
                    }
                }
                Err(e) if e.is_invalid_input() => {
                    let (contig, pos) = summaries
                        .iter()
                        .flatten()
                        .next()
                        .map_or((region.contig().clone(), region.start()), |summary| {
                            (summary.contig().clone(), *summary.pos())
                        });
                    warn!("Skipping {}:{}: {}", contig, pos, e);
                    result
                        .skipped
                        .push(SkippedPosition::new(contig, pos, e.to_string()));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(result)
    }
}
