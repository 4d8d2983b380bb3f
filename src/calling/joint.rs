// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::collections::{BTreeMap, HashSet};

use derive_builder::Builder;
use rayon::prelude::*;

use crate::calling::policy::SensitivityPolicy;
use crate::errors::{invalid_configuration, invalid_input, Error};
use crate::variants::evidence::AlleleCountSummary;
use crate::variants::model::likelihood::GenotypeLikelihoodModel;
use crate::variants::model::{Genotype, SiteLikelihoods};
use crate::variants::Allele;

/// Role of a sample within a pedigree.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SampleRole {
    #[strum(serialize = "child")]
    Child,
    #[strum(serialize = "parent1")]
    Parent1,
    #[strum(serialize = "parent2")]
    Parent2,
}

#[derive(new, Getters, CopyGetters, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortSample {
    #[getset(get = "pub")]
    name: String,
    #[getset(get_copy = "pub")]
    role: SampleRole,
}

/// Ordered set of one to three related samples. The order given here is the
/// order of summaries handed to the caller and of the emitted sample calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cohort {
    samples: Vec<CohortSample>,
}

impl Cohort {
    pub fn new(samples: Vec<CohortSample>) -> Result<Self, Error> {
        if samples.is_empty() || samples.len() > 3 {
            return Err(invalid_configuration(format!(
                "a cohort consists of one to three samples, got {}",
                samples.len()
            )));
        }
        let mut roles = HashSet::new();
        let mut names = HashSet::new();
        for sample in &samples {
            if !roles.insert(sample.role) {
                return Err(invalid_configuration(format!(
                    "sample role {} given more than once",
                    sample.role
                )));
            }
            if !names.insert(sample.name.as_str()) {
                return Err(invalid_configuration(format!(
                    "sample name {} given more than once",
                    sample.name
                )));
            }
        }
        Ok(Cohort { samples })
    }

    /// Child and both parents, in this order.
    pub fn trio(child: &str, parent1: &str, parent2: &str) -> Self {
        Cohort {
            samples: vec![
                CohortSample::new(child.to_owned(), SampleRole::Child),
                CohortSample::new(parent1.to_owned(), SampleRole::Parent1),
                CohortSample::new(parent2.to_owned(), SampleRole::Parent2),
            ],
        }
    }

    pub fn samples(&self) -> &[CohortSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Decided genotype of one sample at one position.
///
/// Depths and weights are given per allele of the position's vocabulary,
/// reference first.
#[derive(Debug, Clone, PartialEq, Getters, CopyGetters, Serialize)]
pub struct SampleCall {
    #[getset(get = "pub")]
    sample: String,
    #[getset(get_copy = "pub")]
    role: SampleRole,
    /// `None` for a no-call (sample missing or without coverage).
    #[getset(get_copy = "pub")]
    genotype: Option<Genotype>,
    #[getset(get = "pub")]
    allele_depths: Vec<u64>,
    #[getset(get = "pub")]
    allele_weights: Vec<f64>,
    #[getset(get_copy = "pub")]
    quality: f64,
    /// Whether the genotype carries an allele that only passed the policy in a relative.
    #[getset(get_copy = "pub")]
    promoted: bool,
}

impl SampleCall {
    fn no_call(sample: &CohortSample, allele_depths: Vec<u64>) -> Self {
        let n_alleles = allele_depths.len();
        SampleCall {
            sample: sample.name.clone(),
            role: sample.role,
            genotype: None,
            allele_depths,
            allele_weights: vec![1.0; n_alleles],
            quality: 0.0,
            promoted: false,
        }
    }

    pub fn is_no_call(&self) -> bool {
        self.genotype.is_none()
    }

    pub fn has_nonref(&self) -> bool {
        self.genotype.map_or(false, |genotype| !genotype.is_hom_ref())
    }
}

/// Joint result for all cohort samples at one position.
#[derive(Debug, Clone, PartialEq, Getters, CopyGetters, Serialize)]
pub struct JointCandidate {
    #[getset(get = "pub")]
    contig: String,
    #[getset(get_copy = "pub")]
    pos: u64,
    #[getset(get_copy = "pub")]
    ref_base: char,
    /// Allele vocabulary shared by all samples, reference first.
    #[getset(get = "pub")]
    alleles: Vec<Allele>,
    #[getset(get = "pub")]
    sample_calls: Vec<SampleCall>,
    #[getset(get_copy = "pub")]
    reportable: bool,
}

impl JointCandidate {
    pub fn alternates(&self) -> &[Allele] {
        &self.alleles[1..]
    }

    /// Not reportable, i.e. no sample carries a non-reference allele.
    pub fn is_no_call(&self) -> bool {
        !self.reportable
    }
}

/// Calls all cohort samples jointly, one position at a time.
///
/// Configuration is fixed at construction, so a caller can be shared between threads.
#[derive(Builder, Getters, CopyGetters, Debug, Clone)]
#[builder(pattern = "owned", build_fn(validate = "Self::validate"))]
pub struct JointCaller {
    #[getset(get = "pub")]
    cohort: Cohort,
    #[builder(default)]
    #[getset(get = "pub")]
    policy: SensitivityPolicy,
    #[builder(default)]
    #[getset(get = "pub")]
    model: GenotypeLikelihoodModel,
    /// Evidentiary weight of reads supporting an allele that is promoted by corroboration.
    #[builder(default = "0.5")]
    #[getset(get_copy = "pub")]
    corroboration_weight: f64,
}

impl JointCallerBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(policy) = self.policy.as_ref() {
            policy.validate().map_err(|e| e.to_string())?;
        }
        if let Some(weight) = self.corroboration_weight {
            if !(weight > 0.0 && weight <= 1.0) {
                return Err(format!(
                    "corroboration weight must be in (0, 1], got {}",
                    weight
                ));
            }
        }
        Ok(())
    }
}

impl JointCaller {
    /// Jointly call one position.
    ///
    /// `summaries` holds one entry per cohort sample, in cohort order. Samples
    /// without a summary get a no-call and the remaining samples are called
    /// as a smaller cohort.
    pub fn call_position(
        &self,
        summaries: &[Option<AlleleCountSummary>],
    ) -> Result<JointCandidate, Error> {
        if summaries.len() != self.cohort.len() {
            return Err(Error::CohortSizeMismatch {
                expected: self.cohort.len(),
                found: summaries.len(),
            });
        }
        let present: Vec<&AlleleCountSummary> = summaries.iter().flatten().collect();
        let site = *present.first().ok_or(Error::EmptyPosition)?;
        for summary in &present {
            summary.validate()?;
            if !summary.is_same_site(site) {
                return Err(invalid_input(
                    site.contig(),
                    *site.pos(),
                    &format!(
                        "summaries disagree on the site ({}:{} with reference {})",
                        summary.contig(),
                        summary.pos(),
                        summary.ref_base()
                    ),
                ));
            }
        }

        // Each sample on its own.
        let mut reportable = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let alleles = match summary {
                Some(summary) => self.reportable_alleles(summary)?,
                None => Vec::new(),
            };
            reportable.push(alleles);
        }

        // Shared vocabulary, strongest total support first.
        let mut total_support = BTreeMap::new();
        for allele in reportable.iter().flatten() {
            total_support.entry(allele.clone()).or_insert_with(|| {
                present
                    .iter()
                    .map(|summary| summary.count(allele))
                    .sum::<u64>()
            });
        }
        let universe = self.policy.retain_top(total_support);

        let sample_calls = self
            .cohort
            .samples()
            .iter()
            .zip(summaries)
            .zip(&reportable)
            .map(|((sample, summary), own)| match summary {
                Some(summary) => self.call_sample(sample, summary, &universe, own),
                None => Ok(SampleCall::no_call(sample, vec![0; universe.len() + 1])),
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let is_reportable = sample_calls.iter().any(SampleCall::has_nonref);
        if is_reportable {
            debug!(
                "{}:{}: candidate alleles {}",
                site.contig(),
                site.pos(),
                universe.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(",")
            );
        }

        Ok(JointCandidate {
            contig: site.contig().clone(),
            pos: *site.pos(),
            ref_base: site.ref_base().to_ascii_uppercase(),
            alleles: Some(Allele::Reference).into_iter().chain(universe).collect(),
            sample_calls,
            reportable: is_reportable,
        })
    }

    /// Call many positions in parallel, keeping their order.
    pub fn call_batch(
        &self,
        positions: &[Vec<Option<AlleleCountSummary>>],
    ) -> Vec<Result<JointCandidate, Error>> {
        positions
            .par_iter()
            .map(|summaries| self.call_position(summaries))
            .collect()
    }

    /// Alleles passing the policy in the given sample on its own.
    fn reportable_alleles(&self, summary: &AlleleCountSummary) -> Result<Vec<Allele>, Error> {
        let candidates = self.policy.candidates(summary);
        if candidates.is_empty() {
            return Ok(candidates);
        }
        let likelihoods = self.model.compute_likelihoods(summary)?;
        Ok(candidates
            .into_iter()
            .filter(|allele| self.policy.is_reportable(allele, summary, &likelihoods))
            .collect())
    }

    fn call_sample(
        &self,
        sample: &CohortSample,
        summary: &AlleleCountSummary,
        universe: &[Allele],
        own: &[Allele],
    ) -> Result<SampleCall, Error> {
        let allele_depths: Vec<u64> = Some(summary.count(&Allele::Reference))
            .into_iter()
            .chain(universe.iter().map(|allele| summary.count(allele)))
            .collect();

        // Alleles of the vocabulary carried by this sample (vocabulary indices),
        // and which of them are promoted.
        let mut carried = HashSet::new();
        let mut promoted = HashSet::new();
        let weights: Vec<f64> = universe
            .iter()
            .enumerate()
            .map(|(i, allele)| {
                if own.contains(allele) {
                    carried.insert(i + 1);
                    1.0
                } else if summary.count(allele) > 0 {
                    // observed below threshold here, but passing in a relative
                    carried.insert(i + 1);
                    promoted.insert(i + 1);
                    self.corroboration_weight
                } else {
                    1.0
                }
            })
            .collect();

        let likelihoods = match self.model.compute_weighted(summary, universe, &weights)? {
            SiteLikelihoods::NoCall => return Ok(SampleCall::no_call(sample, allele_depths)),
            SiteLikelihoods::Computed(likelihoods) => likelihoods,
        };

        // Best genotype made of carried alleles. Alleles passing the policy here
        // must keep their presence quality under the shared vocabulary, promoted
        // alleles only need more reads than sequencing errors would produce.
        let is_carried = |genotype: &Genotype| {
            genotype.n_nonref() > 0
                && genotype
                    .nonref_alleles()
                    .all(|allele| carried.contains(&allele))
        };
        let carrier_call = likelihoods.best_among(is_carried).and_then(|genotype| {
            let presence = likelihoods.presence_quality(&genotype);
            let only_promoted = genotype
                .nonref_alleles()
                .all(|allele| promoted.contains(&allele));
            let passes = if only_promoted {
                presence > 0.0
            } else {
                presence >= self.policy.min_quality()
            };
            if passes {
                Some((genotype, likelihoods.carrier_quality(&genotype, is_carried)))
            } else {
                None
            }
        });
        let (genotype, quality) = carrier_call
            .unwrap_or_else(|| (Genotype::hom_ref(), likelihoods.reference_confidence()));

        let is_promoted = genotype
            .nonref_alleles()
            .any(|allele| promoted.contains(&allele));
        if is_promoted {
            debug!(
                "{}:{}: genotype {} of sample {} carries corroborated alleles",
                summary.contig(),
                summary.pos(),
                genotype,
                sample.name
            );
        }

        Ok(SampleCall {
            sample: sample.name.clone(),
            role: sample.role,
            genotype: Some(genotype),
            allele_depths,
            allele_weights: Some(1.0).into_iter().chain(weights).collect(),
            quality,
            promoted: is_promoted,
        })
    }
}
