// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::fmt;

use bio::stats::LogProb;
use ordered_float::{FloatIsNan, NotNan};

use crate::utils::{ln_pow, phred_ratio, PROB_05};
use crate::variants::model::likelihood::AlleleObservations;
use crate::variants::Allele;

pub mod likelihood;
pub(crate) mod prior;

/// Unordered diploid genotype over an allele vocabulary.
///
/// Alleles are indices into the vocabulary, 0 being the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Genotype {
    first: usize,
    second: usize,
}

impl Genotype {
    pub fn new(a: usize, b: usize) -> Self {
        Genotype {
            first: a.min(b),
            second: a.max(b),
        }
    }

    pub fn hom_ref() -> Self {
        Genotype::new(0, 0)
    }

    /// All genotypes over `n_alleles` alleles, in VCF order
    /// (0/0, 0/1, 1/1, 0/2, 1/2, 2/2, ...).
    pub fn enumerate(n_alleles: usize) -> Vec<Genotype> {
        let mut genotypes = Vec::with_capacity(n_alleles * (n_alleles + 1) / 2);
        for j in 0..n_alleles {
            for i in 0..=j {
                genotypes.push(Genotype::new(i, j));
            }
        }
        genotypes
    }

    pub fn first(&self) -> usize {
        self.first
    }

    pub fn second(&self) -> usize {
        self.second
    }

    pub fn alleles(&self) -> [usize; 2] {
        [self.first, self.second]
    }

    /// Position of this genotype in VCF order.
    pub fn vcf_index(&self) -> usize {
        self.second * (self.second + 1) / 2 + self.first
    }

    pub fn n_nonref(&self) -> usize {
        (self.first > 0) as usize + (self.second > 0) as usize
    }

    pub fn is_hom_ref(&self) -> bool {
        self.second == 0
    }

    pub fn is_het(&self) -> bool {
        self.first != self.second
    }

    pub fn contains(&self, allele: usize) -> bool {
        self.first == allele || self.second == allele
    }

    /// Distinct non-reference allele indices of this genotype.
    pub fn nonref_alleles(&self) -> impl Iterator<Item = usize> {
        let first = if self.first > 0 && self.first != self.second {
            Some(self.first)
        } else {
            None
        };
        let second = if self.second > 0 {
            Some(self.second)
        } else {
            None
        };
        first.into_iter().chain(second)
    }
}

impl fmt::Display for Genotype {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.first, self.second)
    }
}

/// A genotype with its data log-likelihood and its log prior.
#[derive(new, Debug, Clone, Copy, PartialEq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct GenotypeEntry {
    genotype: Genotype,
    likelihood: LogProb,
    prior: LogProb,
}

impl GenotypeEntry {
    /// Unnormalized log posterior, used for ranking.
    pub fn score(&self) -> LogProb {
        self.likelihood + self.prior
    }
}

/// Genotype likelihoods of one sample at one site.
///
/// Genotypes are ranked by posterior score. Qualities are PHRED scaled ratios of
/// data likelihoods, so the prior decides between genotypes but never adds confidence.
#[derive(Debug, Clone, PartialEq, Getters)]
#[getset(get = "pub")]
pub struct GenotypeLikelihoods {
    /// Allele vocabulary, reference first.
    alleles: Vec<Allele>,
    /// Genotypes in VCF order.
    entries: Vec<GenotypeEntry>,
    /// Weighted read counts the likelihoods were computed from.
    observations: AlleleObservations,
    error_rate: f64,
    max_quality: f64,
    #[getset(skip)]
    ranking: Vec<usize>,
}

impl GenotypeLikelihoods {
    /// Fails if any score is NaN.
    pub fn new(
        alleles: Vec<Allele>,
        entries: Vec<GenotypeEntry>,
        observations: AlleleObservations,
        error_rate: f64,
        max_quality: f64,
    ) -> Result<Self, FloatIsNan> {
        let scores = entries
            .iter()
            .map(|entry| NotNan::new(*entry.score()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut ranking: Vec<usize> = (0..entries.len()).collect();
        // score descending, then parsimony, then VCF order
        ranking.sort_by(|&a, &b| {
            let (ga, gb) = (entries[a].genotype, entries[b].genotype);
            scores[b]
                .cmp(&scores[a])
                .then_with(|| ga.n_nonref().cmp(&gb.n_nonref()))
                .then_with(|| ga.vcf_index().cmp(&gb.vcf_index()))
        });

        Ok(GenotypeLikelihoods {
            alleles,
            entries,
            observations,
            error_rate,
            max_quality,
            ranking,
        })
    }

    pub fn allele_index(&self, allele: &Allele) -> Option<usize> {
        self.alleles.iter().position(|a| a == allele)
    }

    pub fn entry(&self, genotype: &Genotype) -> Option<&GenotypeEntry> {
        self.entries.iter().find(|entry| entry.genotype == *genotype)
    }

    /// Data log-likelihood of the genotype, without prior.
    pub fn likelihood(&self, genotype: &Genotype) -> Option<LogProb> {
        self.entry(genotype).map(GenotypeEntry::likelihood)
    }

    /// Genotypes from most to least probable, ties broken deterministically.
    pub fn ranked(&self) -> impl Iterator<Item = &GenotypeEntry> {
        self.ranking.iter().map(move |&i| &self.entries[i])
    }

    pub fn best(&self) -> Genotype {
        self.best_among(|_| true).unwrap_or_else(Genotype::hom_ref)
    }

    /// Best ranked genotype among those matching `filter`.
    pub fn best_among<F>(&self, filter: F) -> Option<Genotype>
    where
        F: Fn(&Genotype) -> bool,
    {
        self.ranked()
            .map(GenotypeEntry::genotype)
            .find(|genotype| filter(genotype))
    }

    /// Best genotype, with its likelihood ratio against the most likely other genotype.
    pub fn call(&self) -> (Genotype, f64) {
        let best = self.best();
        (best, self.genotype_quality(&best, |_| true))
    }

    /// PHRED scaled likelihood ratio of `genotype` against the most likely other
    /// genotype matching `filter`. Without any competitor, the maximum quality is returned.
    pub fn genotype_quality<F>(&self, genotype: &Genotype, filter: F) -> f64
    where
        F: Fn(&Genotype) -> bool,
    {
        let likelihood = match self.likelihood(genotype) {
            Some(likelihood) => likelihood,
            None => return 0.0,
        };
        let best_other = self
            .entries
            .iter()
            .filter(|entry| entry.genotype != *genotype && filter(&entry.genotype))
            .map(|entry| *entry.likelihood)
            .fold(None, |best: Option<f64>, other| {
                Some(best.map_or(other, |best| best.max(other)))
            });
        match best_other {
            Some(other) => phred_ratio(likelihood, LogProb(other), self.max_quality),
            None => self.max_quality,
        }
    }

    /// Evidence that the non-reference alleles of `genotype` are real.
    ///
    /// PHRED scaled ratio of the likelihood of their reads at the observed fraction
    /// against the likelihood of the same reads being sequencing errors of a
    /// homozygous reference sample. Zero if the observed fraction does not exceed
    /// the error rate.
    pub fn presence_quality(&self, genotype: &Genotype) -> f64 {
        let counts = self.observations.counts();
        let n_alleles = counts.len();
        let n_carried = genotype.nonref_alleles().count();
        if n_carried == 0 || n_alleles < 2 {
            return 0.0;
        }
        let total: f64 = counts.iter().sum();
        let carried: f64 = genotype
            .nonref_alleles()
            .map(|allele| counts.get(allele).copied().unwrap_or(0.0))
            .sum();
        // error mass a homozygous reference sample puts on the carried alleles
        let error = self.error_rate * n_carried as f64 / (n_alleles - 1) as f64;
        if total <= 0.0 || carried / total <= error {
            return 0.0;
        }
        let fraction = carried / total;
        let observed = ln_pow(LogProb(fraction.ln()), carried)
            + ln_pow(LogProb((1.0 - fraction).ln()), total - carried);
        let errors = ln_pow(LogProb(error.ln()), carried)
            + ln_pow(LogProb((1.0 - error).ln()), total - carried);
        phred_ratio(observed, errors, self.max_quality)
    }

    /// Quality of a non-reference genotype: the lesser of the evidence for its
    /// alleles against homozygous reference and its likelihood ratio against the
    /// most likely other genotype matching `filter`.
    pub fn carrier_quality<F>(&self, genotype: &Genotype, filter: F) -> f64
    where
        F: Fn(&Genotype) -> bool,
    {
        self.presence_quality(genotype)
            .min(self.genotype_quality(genotype, filter))
    }

    /// Confidence that the sample is homozygous reference.
    ///
    /// Compared against the most likely genotype carrying a vocabulary allele, or,
    /// if the vocabulary holds the reference only, against a heterozygous genotype
    /// with an unobserved allele.
    pub fn reference_confidence(&self) -> f64 {
        let hom_ref = Genotype::hom_ref();
        if self.entries.len() > 1 {
            return self.genotype_quality(&hom_ref, |_| true);
        }
        let ref_reads = self.observations.counts().first().copied().unwrap_or(0.0);
        phred_ratio(
            ln_pow(LogProb((1.0 - self.error_rate).ln()), ref_reads),
            ln_pow(*PROB_05, ref_reads),
            self.max_quality,
        )
    }
}

/// Outcome of genotyping one sample at one site.
#[derive(Debug, Clone, PartialEq)]
pub enum SiteLikelihoods {
    /// Zero depth, nothing to genotype.
    NoCall,
    Computed(GenotypeLikelihoods),
}

impl SiteLikelihoods {
    pub fn is_no_call(&self) -> bool {
        matches!(self, SiteLikelihoods::NoCall)
    }

    pub fn likelihoods(&self) -> Option<&GenotypeLikelihoods> {
        match self {
            SiteLikelihoods::NoCall => None,
            SiteLikelihoods::Computed(likelihoods) => Some(likelihoods),
        }
    }
}
