// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use bio::stats::{LogProb, PHREDProb, Prob};

pub(crate) mod worker_pool;

lazy_static! {
    pub(crate) static ref PROB_05: LogProb = LogProb::from(Prob(0.5f64));
    pub(crate) static ref PROB_2: LogProb = LogProb(2.0f64.ln());
}

/// PHRED scaled likelihood ratio between two log-scale values, capped at `max`.
///
/// `better` is expected to be at least as large as `worse`; a negative ratio is floored to 0.
pub(crate) fn phred_ratio(better: LogProb, worse: LogProb, max: f64) -> f64 {
    if *worse == f64::NEG_INFINITY {
        return max;
    }
    let diff = *better - *worse;
    if diff <= 0.0 {
        return 0.0;
    }
    // PHRED of the inverse ratio: -10 * log10(exp(-diff))
    let qual = *PHREDProb::from(LogProb(-diff));
    qual.min(max)
}

/// Log-space product of a per-read probability and a (possibly fractional) read count.
pub(crate) fn ln_pow(prob: LogProb, count: f64) -> LogProb {
    if count == 0.0 {
        LogProb::ln_one()
    } else {
        LogProb(*prob * count)
    }
}
