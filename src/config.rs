use std::convert::TryFrom;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::calling::emit::VariantSelector;
use crate::calling::joint::{Cohort, CohortSample, JointCaller, JointCallerBuilder};
use crate::calling::policy::{PolicyOverrides, Preset, SensitivityPolicy};
use crate::errors::{invalid_configuration, Error};
use crate::variants::model::likelihood::GenotypeLikelihoodModel;

fn default_error_rate() -> f64 {
    0.001
}

fn default_prior_nonref_freq() -> Option<f64> {
    Some(0.001)
}

fn default_max_quality() -> f64 {
    50.0
}

fn default_corroboration_weight() -> f64 {
    0.5
}

fn default_partition_size() -> u64 {
    1000
}

/// Parameters of the genotype likelihood model and of the joint caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, CopyGetters)]
#[serde(deny_unknown_fields)]
#[getset(get_copy = "pub")]
pub struct ModelConfig {
    #[serde(default = "default_error_rate")]
    error_rate: f64,
    /// `null` gives flat genotype priors.
    #[serde(default = "default_prior_nonref_freq")]
    prior_nonref_freq: Option<f64>,
    #[serde(default = "default_max_quality")]
    max_quality: f64,
    #[serde(default = "default_corroboration_weight")]
    corroboration_weight: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            error_rate: default_error_rate(),
            prior_nonref_freq: default_prior_nonref_freq(),
            max_quality: default_max_quality(),
            corroboration_weight: default_corroboration_weight(),
        }
    }
}

/// Run configuration, read once at startup and immutable afterwards.
///
/// ```yaml
/// preset: very-sensitive
/// policy:
///   min_quality: 8
/// model:
///   error_rate: 0.001
/// samples:
///   - name: NA12878
///     role: child
/// partition_size: 1000
/// select_variant_types: [snps, indels]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, CopyGetters)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    #[getset(get_copy = "pub")]
    preset: Preset,
    #[serde(default, rename = "policy")]
    #[getset(get = "pub")]
    policy_overrides: PolicyOverrides,
    #[serde(default)]
    #[getset(get = "pub")]
    model: ModelConfig,
    #[serde(default)]
    #[getset(get = "pub")]
    samples: Vec<CohortSample>,
    #[serde(default = "default_partition_size")]
    #[getset(get_copy = "pub")]
    partition_size: u64,
    #[serde(default)]
    #[getset(get = "pub")]
    select_variant_types: Vec<VariantSelector>,
    #[serde(default)]
    #[getset(get_copy = "pub")]
    log_each_position: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            preset: Preset::default(),
            policy_overrides: PolicyOverrides::default(),
            model: ModelConfig::default(),
            samples: Vec::new(),
            partition_size: default_partition_size(),
            select_variant_types: Vec::new(),
            log_each_position: false,
        }
    }
}

impl<'a> TryFrom<&'a str> for Config {
    type Error = serde_yaml::Error;

    fn try_from(yaml: &str) -> Result<Self, Self::Error> {
        serde_yaml::from_str(yaml)
    }
}

impl Config {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = fs::read_to_string(path)
            .with_context(|| format!("Unable to read configuration {}.", path.display()))?;
        let config = Config::try_from(yaml.as_str())
            .with_context(|| format!("Invalid YAML in configuration {}.", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn set_preset(&mut self, preset: Preset) {
        self.preset = preset;
    }

    pub fn set_samples(&mut self, samples: Vec<CohortSample>) {
        self.samples = samples;
    }

    pub fn set_partition_size(&mut self, partition_size: u64) {
        self.partition_size = partition_size;
    }

    pub fn set_select_variant_types(&mut self, selectors: Vec<VariantSelector>) {
        self.select_variant_types = selectors;
    }

    /// Preset thresholds with the configured overrides applied.
    pub fn policy(&self) -> Result<SensitivityPolicy, Error> {
        SensitivityPolicy::preset(self.preset).with_overrides(&self.policy_overrides)
    }

    pub fn likelihood_model(&self) -> Result<GenotypeLikelihoodModel, Error> {
        GenotypeLikelihoodModel::new(
            self.model.error_rate,
            self.model.prior_nonref_freq,
            self.model.max_quality,
        )
    }

    pub fn cohort(&self) -> Result<Cohort, Error> {
        Cohort::new(self.samples.clone())
    }

    pub fn joint_caller(&self) -> Result<JointCaller, Error> {
        JointCallerBuilder::default()
            .cohort(self.cohort()?)
            .policy(self.policy()?)
            .model(self.likelihood_model()?)
            .corroboration_weight(self.model.corroboration_weight)
            .build()
            .map_err(|e| invalid_configuration(e.to_string()))
    }

    /// Check everything except the cohort, which may still be given on the command line.
    pub fn validate(&self) -> Result<(), Error> {
        self.policy()?;
        self.likelihood_model()?;
        let weight = self.model.corroboration_weight;
        if !(weight > 0.0 && weight <= 1.0) {
            return Err(invalid_configuration(format!(
                "corroboration weight must be in (0, 1], got {}",
                weight
            )));
        }
        if self.partition_size == 0 {
            return Err(invalid_configuration("partition size must be positive"));
        }
        Ok(())
    }
}
