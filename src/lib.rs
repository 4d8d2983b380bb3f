// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Joint candidate variant calling for small pedigrees (child and up to two parents).
//!
//! Per-position allele count summaries are turned into genotype likelihoods,
//! filtered by a sensitivity policy, reconciled across the related samples and
//! finally emitted as logical variant records for downstream re-genotyping.

#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate derive_new;
#[macro_use]
extern crate getset;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate strum_macros;

pub mod calling;
pub mod cli;
pub mod config;
pub mod errors;
pub mod utils;
pub mod variants;

pub use crate::calling::emit::{emit, VariantRecord, VariantSelector};
pub use crate::calling::joint::{
    Cohort, CohortSample, JointCaller, JointCallerBuilder, JointCandidate, SampleCall, SampleRole,
};
pub use crate::calling::policy::{Preset, SensitivityPolicy};
pub use crate::config::Config;
pub use crate::errors::Error;
pub use crate::variants::evidence::{AlleleCountSummary, AlleleSupport};
pub use crate::variants::model::likelihood::GenotypeLikelihoodModel;
pub use crate::variants::model::{Genotype, GenotypeEntry, GenotypeLikelihoods, SiteLikelihoods};
pub use crate::variants::Allele;
