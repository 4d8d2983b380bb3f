use std::cmp::Reverse;

use itertools::Itertools;

use crate::errors::{invalid_configuration, Error};
use crate::variants::evidence::AlleleCountSummary;
use crate::variants::model::{Genotype, SiteLikelihoods};
use crate::variants::Allele;

/// Named threshold sets. Both share the same decision logic.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    #[strum(serialize = "default")]
    Default,
    /// Relaxed thresholds, maximizing recall for downstream re-scoring.
    #[strum(serialize = "very-sensitive")]
    VerySensitive,
}

impl Default for Preset {
    fn default() -> Self {
        Preset::Default
    }
}

/// Decides which alleles of a sample are candidates and which are reportable.
///
/// Substitutions are judged by `min_allele_fraction` and `min_supporting_reads`,
/// insertions and deletions by `min_indel_fraction` and `min_indel_supporting_reads`.
#[derive(Debug, Clone, Copy, PartialEq, CopyGetters, Serialize)]
#[getset(get_copy = "pub")]
pub struct SensitivityPolicy {
    min_allele_fraction: f64,
    min_indel_fraction: f64,
    min_supporting_reads: u64,
    min_indel_supporting_reads: u64,
    min_base_quality: Option<f64>,
    min_quality: f64,
    max_alleles_per_site: usize,
}

/// Per-field replacements for a preset's thresholds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyOverrides {
    pub min_allele_fraction: Option<f64>,
    pub min_indel_fraction: Option<f64>,
    pub min_supporting_reads: Option<u64>,
    pub min_indel_supporting_reads: Option<u64>,
    pub min_base_quality: Option<f64>,
    pub min_quality: Option<f64>,
    pub max_alleles_per_site: Option<usize>,
}

impl Default for SensitivityPolicy {
    fn default() -> Self {
        SensitivityPolicy::preset(Preset::Default)
    }
}

impl SensitivityPolicy {
    pub fn preset(preset: Preset) -> Self {
        match preset {
            Preset::Default => SensitivityPolicy {
                min_allele_fraction: 0.12,
                min_indel_fraction: 0.06,
                min_supporting_reads: 2,
                min_indel_supporting_reads: 2,
                min_base_quality: Some(10.0),
                min_quality: 10.0,
                max_alleles_per_site: 5,
            },
            Preset::VerySensitive => SensitivityPolicy {
                min_allele_fraction: 0.05,
                min_indel_fraction: 0.03,
                min_supporting_reads: 1,
                min_indel_supporting_reads: 1,
                min_base_quality: Some(10.0),
                min_quality: 5.0,
                max_alleles_per_site: 5,
            },
        }
    }

    /// Apply the given overrides and validate the result.
    pub fn with_overrides(mut self, overrides: &PolicyOverrides) -> Result<Self, Error> {
        if let Some(value) = overrides.min_allele_fraction {
            self.min_allele_fraction = value;
        }
        if let Some(value) = overrides.min_indel_fraction {
            self.min_indel_fraction = value;
        }
        if let Some(value) = overrides.min_supporting_reads {
            self.min_supporting_reads = value;
        }
        if let Some(value) = overrides.min_indel_supporting_reads {
            self.min_indel_supporting_reads = value;
        }
        if let Some(value) = overrides.min_base_quality {
            self.min_base_quality = Some(value);
        }
        if let Some(value) = overrides.min_quality {
            self.min_quality = value;
        }
        if let Some(value) = overrides.max_alleles_per_site {
            self.max_alleles_per_site = value;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), Error> {
        let check_fraction = |name: &str, value: f64| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(invalid_configuration(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )))
            }
        };
        check_fraction("min_allele_fraction", self.min_allele_fraction)?;
        check_fraction("min_indel_fraction", self.min_indel_fraction)?;

        if !(self.min_quality.is_finite() && self.min_quality >= 0.0) {
            return Err(invalid_configuration(format!(
                "min_quality must be a non-negative number, got {}",
                self.min_quality
            )));
        }
        if let Some(qual) = self.min_base_quality {
            if !(qual.is_finite() && qual >= 0.0) {
                return Err(invalid_configuration(format!(
                    "min_base_quality must be a non-negative number, got {}",
                    qual
                )));
            }
        }
        if self.max_alleles_per_site == 0 {
            return Err(invalid_configuration(
                "max_alleles_per_site must be at least 1",
            ));
        }
        Ok(())
    }

    fn thresholds(&self, allele: &Allele) -> (f64, u64) {
        if allele.is_indel() {
            (self.min_indel_fraction, self.min_indel_supporting_reads)
        } else {
            (self.min_allele_fraction, self.min_supporting_reads)
        }
    }

    /// Whether the allele has enough support in the summary to be considered.
    ///
    /// The reference and unobserved alleles are never candidates.
    pub fn is_candidate(&self, allele: &Allele, summary: &AlleleCountSummary) -> bool {
        if allele.is_reference() {
            return false;
        }
        let count = summary.count(allele);
        if count == 0 {
            return false;
        }
        let (min_fraction, min_reads) = self.thresholds(allele);
        if count < min_reads || summary.fraction(allele) < min_fraction {
            return false;
        }
        match (self.min_base_quality, summary.mean_quality(allele)) {
            (Some(min_qual), Some(qual)) => qual >= min_qual,
            _ => true,
        }
    }

    /// Candidate alleles of the summary, strongest first, capped at `max_alleles_per_site`.
    pub fn candidates(&self, summary: &AlleleCountSummary) -> Vec<Allele> {
        self.retain_top(
            summary
                .non_reference_alleles()
                .filter(|allele| self.is_candidate(allele, summary))
                .map(|allele| (allele.clone(), summary.count(allele))),
        )
    }

    /// The `max_alleles_per_site` alleles with most support, ties broken by the
    /// lexicographic order of their textual form.
    pub fn retain_top<I>(&self, alleles: I) -> Vec<Allele>
    where
        I: IntoIterator<Item = (Allele, u64)>,
    {
        alleles
            .into_iter()
            .sorted_by_key(|(allele, count)| (Reverse(*count), allele.to_string()))
            .take(self.max_alleles_per_site)
            .map(|(allele, _)| allele)
            .collect()
    }

    /// Whether the allele is a candidate and its reads are evidence enough, against
    /// homozygous reference, that it is present in the sample.
    pub fn is_reportable(
        &self,
        allele: &Allele,
        summary: &AlleleCountSummary,
        likelihoods: &SiteLikelihoods,
    ) -> bool {
        if !self.is_candidate(allele, summary) {
            return false;
        }
        likelihoods
            .likelihoods()
            .and_then(|likelihoods| {
                let index = likelihoods.allele_index(allele)?;
                Some(likelihoods.presence_quality(&Genotype::new(0, index)))
            })
            .map_or(false, |qual| qual >= self.min_quality)
    }
}
