use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("invalid allele counts at {contig}:{pos}: {msg}")]
    InvalidInput {
        contig: String,
        pos: u64,
        msg: String,
    },
    #[error("invalid configuration: {msg}")]
    InvalidConfiguration { msg: String },
    #[error("expected allele count summaries for {expected} samples (one per cohort member), got {found}")]
    CohortSizeMismatch { expected: usize, found: usize },
    #[error("no allele count summary given for any sample at this position")]
    EmptyPosition,
    #[error("invalid allele {spec}: use '=' for the reference, a single base for substitutions, '+SEQ' for insertions or '-LEN' for deletions")]
    InvalidAllele { spec: String },
    #[error("invalid region {spec}: use CHROM or CHROM:START-END (1-based, inclusive)")]
    InvalidRegion { spec: String },
    #[error("invalid sharding: task {task} must be smaller than the number of shards ({shards})")]
    InvalidSharding { task: usize, shards: usize },
}

impl Error {
    /// Whether the error only concerns the single position being processed.
    /// Such errors are skipped by a scan instead of aborting it.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Error::InvalidInput { .. } | Error::EmptyPosition)
    }
}

pub(crate) fn invalid_input(contig: &str, pos: u64, msg: &str) -> Error {
    Error::InvalidInput {
        contig: contig.to_owned(),
        pos,
        msg: msg.to_owned(),
    }
}

pub(crate) fn invalid_configuration(msg: impl Into<String>) -> Error {
    Error::InvalidConfiguration { msg: msg.into() }
}
