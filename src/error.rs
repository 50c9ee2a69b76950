#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when the plan size is zero.
    #[error("invalid plan size: plan_size must be at least 1")]
    InvalidPlanSize,

    /// Returned when the measurement batch size is zero.
    #[error("invalid batch size: batch_size must be at least 1")]
    InvalidBatchSize,

    /// Returned when an explicit thread count of zero is requested.
    #[error("invalid thread count: num_threads must be at least 1")]
    InvalidThreadCount,

    /// Returned when the diversity filter ratio is not greater than one.
    #[error("invalid diversity filter ratio: {0} must be greater than 1.0")]
    InvalidDiversityRatio(f64),

    /// Returned when the epsilon-greedy fraction lies outside `[0, 1]`.
    #[error("invalid epsilon: {0} must be in [0.0, 1.0]")]
    InvalidEpsilon(f64),

    /// Returned when the uncertainty schedule half-life is zero.
    #[error("invalid uncertainty half-life: must be at least 1")]
    InvalidHalfLife,

    /// Returned when an optimizer name is not in the built-in registry.
    #[error("unknown optimizer '{0}': expected \"sa\" or a custom optimizer object")]
    UnknownOptimizer(String),

    /// Returned when a feature kind name is not recognized.
    #[error(
        "unknown feature type '{0}': expected one of structural, flattened, sampled-relation"
    )]
    UnknownFeatureKind(String),

    /// Returned when a configuration space has no points.
    #[error("configuration space is empty")]
    EmptySpace,

    /// Returned when a knob space has more points than fit in `usize`.
    #[error("configuration space is too large to index")]
    SpaceTooLarge,

    /// Returned when a knob choice vector has the wrong number of entries.
    #[error("knob dimension mismatch: expected {expected} knobs but got {got}")]
    KnobDimensionMismatch {
        /// The number of knobs in the space.
        expected: usize,
        /// The number of choice indices provided.
        got: usize,
    },

    /// Returned when a knob choice index exceeds the knob's number of choices.
    #[error("choice {choice} is out of range for knob {knob} with {n_choices} choices")]
    ChoiceOutOfRange {
        /// Position of the knob in the space.
        knob: usize,
        /// The offending choice index.
        choice: usize,
        /// Number of choices the knob has.
        n_choices: usize,
    },

    /// Returned when the worker pool cannot be constructed.
    #[error("failed to build worker pool: {0}")]
    PoolBuild(String),

    /// Returned when fitting or feature extraction is requested after the
    /// worker pool has been released.
    #[error("worker pool has been closed; no further fitting or extraction is allowed")]
    PoolClosed,

    /// Returned when worker threads do not exit within the shutdown window.
    #[error("worker pool shutdown timed out with {remaining} thread(s) still alive")]
    PoolShutdownTimeout {
        /// Number of worker threads that had not exited.
        remaining: usize,
    },

    /// Returned when the measurer does not return one result per candidate.
    #[error("measurer returned {got} results for a batch of {expected} candidates")]
    MeasurementCountMismatch {
        /// The batch size handed to the measurer.
        expected: usize,
        /// The number of results returned.
        got: usize,
    },

    /// Returned when a storage operation fails.
    #[cfg(feature = "journal")]
    #[error("storage error: {0}")]
    Storage(String),
}

pub type Result<T> = core::result::Result<T, Error>;
