// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use bio::stats::bayesian::model::{Likelihood, Prior};
use bio::stats::{LogProb, Prob};

use crate::errors::{invalid_configuration, invalid_input, Error};
use crate::utils::{ln_pow, PROB_05};
use crate::variants::evidence::AlleleCountSummary;
use crate::variants::model::prior::GenotypePrior;
use crate::variants::model::{Genotype, GenotypeEntry, GenotypeLikelihoods, SiteLikelihoods};
use crate::variants::Allele;

/// Weighted read counts over an allele vocabulary, reference first.
#[derive(new, Debug, Clone, PartialEq)]
pub struct AlleleObservations {
    counts: Vec<f64>,
}

impl AlleleObservations {
    pub fn n_alleles(&self) -> usize {
        self.counts.len()
    }

    pub fn counts(&self) -> &[f64] {
        &self.counts
    }
}

/// Diploid genotype likelihood model with a symmetric per-read error rate.
///
/// A read shows its haplotype's allele with probability `1 - error_rate` and
/// any other allele of the vocabulary with probability `error_rate / (k - 1)`.
/// Reads supporting alleles outside the vocabulary are the same for every
/// genotype and do not contribute.
#[derive(Debug, Clone, Copy, PartialEq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct GenotypeLikelihoodModel {
    error_rate: f64,
    prior_nonref_freq: Option<f64>,
    max_quality: f64,
    #[getset(skip)]
    prior: GenotypePrior,
}

impl Default for GenotypeLikelihoodModel {
    fn default() -> Self {
        GenotypeLikelihoodModel {
            error_rate: 0.001,
            prior_nonref_freq: Some(0.001),
            max_quality: 50.0,
            prior: GenotypePrior::new(Some(0.001)),
        }
    }
}

impl GenotypeLikelihoodModel {
    pub fn new(
        error_rate: f64,
        prior_nonref_freq: Option<f64>,
        max_quality: f64,
    ) -> Result<Self, Error> {
        if !(error_rate > 0.0 && error_rate < 1.0) {
            return Err(invalid_configuration(format!(
                "error rate must be in (0, 1), got {}",
                error_rate
            )));
        }
        if let Some(freq) = prior_nonref_freq {
            if !(freq > 0.0 && freq < 1.0) {
                return Err(invalid_configuration(format!(
                    "prior non-reference frequency must be in (0, 1), got {}",
                    freq
                )));
            }
        }
        if !(max_quality.is_finite() && max_quality > 0.0) {
            return Err(invalid_configuration(format!(
                "maximum quality must be positive, got {}",
                max_quality
            )));
        }
        Ok(GenotypeLikelihoodModel {
            error_rate,
            prior_nonref_freq,
            max_quality,
            prior: GenotypePrior::new(prior_nonref_freq),
        })
    }

    /// Genotype likelihoods over the reference and every allele with nonzero support.
    pub fn compute_likelihoods(&self, summary: &AlleleCountSummary) -> Result<SiteLikelihoods, Error> {
        summary.validate()?;
        let mut alleles: Vec<Allele> = summary.non_reference_alleles().cloned().collect();
        alleles.sort();
        let weights = vec![1.0; alleles.len()];
        self.compute_weighted(summary, &alleles, &weights)
    }

    /// Genotype likelihoods over the reference and the given non-reference alleles,
    /// scaling the reads of each allele by the corresponding weight.
    ///
    /// Reference reads always have weight 1.
    pub fn compute_weighted(
        &self,
        summary: &AlleleCountSummary,
        alleles: &[Allele],
        weights: &[f64],
    ) -> Result<SiteLikelihoods, Error> {
        if alleles.len() != weights.len() {
            return Err(invalid_configuration(format!(
                "expected one weight per allele, got {} weights for {} alleles",
                weights.len(),
                alleles.len()
            )));
        }
        summary.validate()?;
        if summary.is_empty() {
            return Ok(SiteLikelihoods::NoCall);
        }

        let vocabulary: Vec<Allele> = Some(Allele::Reference)
            .into_iter()
            .chain(alleles.iter().filter(|a| !a.is_reference()).cloned())
            .collect();
        let mut counts = vec![summary.count(&Allele::Reference) as f64];
        counts.extend(
            alleles
                .iter()
                .zip(weights)
                .filter(|(allele, _)| !allele.is_reference())
                .map(|(allele, weight)| summary.count(allele) as f64 * weight),
        );
        let observations = AlleleObservations { counts };

        let entries = Genotype::enumerate(vocabulary.len())
            .into_iter()
            .map(|genotype| {
                GenotypeEntry::new(
                    genotype,
                    self.compute(&genotype, &observations, &mut ()),
                    self.prior.compute(&genotype),
                )
            })
            .collect();

        GenotypeLikelihoods::new(
            vocabulary,
            entries,
            observations,
            self.error_rate,
            self.max_quality,
        )
            .map(SiteLikelihoods::Computed)
            .map_err(|_| {
                invalid_input(
                    summary.contig(),
                    *summary.pos(),
                    "genotype likelihood is NaN",
                )
            })
    }

    /// Probability that a read from a haplotype carrying allele `haplotype` shows `allele`.
    fn prob_read(&self, allele: usize, haplotype: usize, n_alleles: usize) -> LogProb {
        if n_alleles == 1 {
            LogProb::ln_one()
        } else if allele == haplotype {
            LogProb::from(Prob(1.0 - self.error_rate))
        } else {
            LogProb::from(Prob(self.error_rate / (n_alleles - 1) as f64))
        }
    }
}

impl Likelihood for GenotypeLikelihoodModel {
    type Event = Genotype;
    type Data = AlleleObservations;

    fn compute(&self, genotype: &Genotype, data: &AlleleObservations, _: &mut ()) -> LogProb {
        let n_alleles = data.n_alleles();
        data.counts
            .iter()
            .enumerate()
            .map(|(allele, count)| {
                let first = self.prob_read(allele, genotype.first(), n_alleles);
                let prob = if genotype.is_het() {
                    let second = self.prob_read(allele, genotype.second(), n_alleles);
                    (*PROB_05 + first).ln_add_exp(*PROB_05 + second)
                } else {
                    first
                };
                ln_pow(prob, *count)
            })
            .fold(LogProb::ln_one(), |sum, prob| sum + prob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variants::evidence::AlleleSupport;
    use approx::assert_relative_eq;

    fn summary(depth: i64, alleles: Vec<(&str, i64)>) -> AlleleCountSummary {
        AlleleCountSummary::new(
            "chr1".to_owned(),
            1000,
            'A',
            depth,
            alleles
                .into_iter()
                .map(|(allele, count)| AlleleSupport::new(allele.parse().unwrap(), count))
                .collect(),
        )
    }

    #[test]
    fn test_no_call_at_zero_depth() {
        let model = GenotypeLikelihoodModel::default();
        assert!(model
            .compute_likelihoods(&summary(0, vec![]))
            .unwrap()
            .is_no_call());
    }

    #[test]
    fn test_invalid_input() {
        let model = GenotypeLikelihoodModel::default();
        assert!(model
            .compute_likelihoods(&summary(10, vec![("T", 12)]))
            .unwrap_err()
            .is_invalid_input());
    }

    #[test]
    fn test_het_call() {
        let model = GenotypeLikelihoodModel::default();
        let site = model
            .compute_likelihoods(&summary(30, vec![("=", 28), ("T", 2)]))
            .unwrap();
        let likelihoods = site.likelihoods().unwrap();
        assert_eq!(
            likelihoods.alleles(),
            &vec![Allele::Reference, Allele::Substitution(b'T')]
        );
        // 28 * ln(0.999) + 2 * ln(0.001) vs 30 * ln(0.5)
        let hom_ref = 28.0 * 0.999f64.ln() + 2.0 * 0.001f64.ln();
        let het = 30.0 * 0.5f64.ln();
        assert_relative_eq!(
            *likelihoods.likelihood(&Genotype::hom_ref()).unwrap(),
            hom_ref,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            *likelihoods.likelihood(&Genotype::new(0, 1)).unwrap(),
            het,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            *likelihoods.entry(&Genotype::new(0, 1)).unwrap().score(),
            het + (2.0 * 0.999 * 0.001f64).ln(),
            epsilon = 1e-9
        );
        // hom-ref explains the two T reads better than a heterozygous genotype
        let (genotype, qual) = likelihoods.call();
        assert_eq!(genotype, Genotype::hom_ref());
        assert_relative_eq!(qual, 30.19, epsilon = 0.01);
        // but they are still more than sequencing errors
        assert_relative_eq!(
            likelihoods.presence_quality(&Genotype::new(0, 1)),
            28.21,
            epsilon = 0.01
        );
        assert_eq!(likelihoods.best(), Genotype::hom_ref());
    }

    #[test]
    fn test_hom_alt_call() {
        let model = GenotypeLikelihoodModel::default();
        let site = model
            .compute_likelihoods(&summary(20, vec![("=", 0), ("-2", 20)]))
            .unwrap();
        let (genotype, qual) = site.likelihoods().unwrap().call();
        assert_eq!(genotype, Genotype::new(1, 1));
        // 20 * (ln(0.999) - ln(0.5)) nats against 0/1
        assert_relative_eq!(qual, 50.0);
    }

    #[test]
    fn test_multiallelic_vocabulary_order() {
        let model = GenotypeLikelihoodModel::default();
        let site = model
            .compute_likelihoods(&summary(20, vec![("-1", 8), ("G", 8), ("C", 0), ("=", 4)]))
            .unwrap();
        let likelihoods = site.likelihoods().unwrap();
        assert_eq!(
            likelihoods.alleles(),
            &vec![Allele::Reference, Allele::Substitution(b'G'), Allele::Deletion(1)]
        );
        assert_eq!(likelihoods.entries().len(), 6);
        assert_eq!(likelihoods.best(), Genotype::new(1, 2));
    }

    #[test]
    fn test_weights_scale_evidence() {
        let model = GenotypeLikelihoodModel::new(0.001, None, 50.0).unwrap();
        let summary = summary(20, vec![("=", 16), ("G", 4)]);
        let alleles = [Allele::Substitution(b'G')];
        let full = model.compute_weighted(&summary, &alleles, &[1.0]).unwrap();
        let half = model.compute_weighted(&summary, &alleles, &[0.5]).unwrap();
        let het = Genotype::new(0, 1);
        let full = full.likelihoods().unwrap().likelihood(&het).unwrap();
        let half = half.likelihoods().unwrap().likelihood(&het).unwrap();
        assert_relative_eq!(*full, 20.0 * 0.5f64.ln(), epsilon = 1e-9);
        assert_relative_eq!(*half, 18.0 * 0.5f64.ln(), epsilon = 1e-9);
    }

    #[test]
    fn test_weights_must_match_alleles() {
        let model = GenotypeLikelihoodModel::default();
        let summary = summary(20, vec![("=", 16), ("G", 4)]);
        match model.compute_weighted(&summary, &[Allele::Substitution(b'G')], &[1.0, 0.5]) {
            Err(Error::InvalidConfiguration { .. }) => (),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_uninformative_error_rate_ties() {
        let model = GenotypeLikelihoodModel::new(0.5, None, 50.0).unwrap();
        let site = model
            .compute_likelihoods(&summary(10, vec![("=", 5), ("T", 5)]))
            .unwrap();
        // all genotypes explain the reads equally well
        let (_, qual) = site.likelihoods().unwrap().call();
        assert!(qual < 1e-6);
    }

    #[test]
    fn test_invalid_model() {
        assert!(GenotypeLikelihoodModel::new(0.0, None, 50.0).is_err());
        assert!(GenotypeLikelihoodModel::new(0.01, Some(1.0), 50.0).is_err());
        assert!(GenotypeLikelihoodModel::new(0.01, None, f64::NAN).is_err());
    }
}
