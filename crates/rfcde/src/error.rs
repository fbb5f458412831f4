use std::collections::TryReserveError;

/// Errors from RFCDE training and prediction.
#[derive(Debug, thiserror::Error)]
pub enum RfcdeError {
    /// Returned when n_trees is zero.
    #[error("n_trees must be at least 1, got {n_trees}")]
    InvalidTreeCount {
        /// The invalid n_trees value provided.
        n_trees: usize,
    },

    /// Returned when mtry resolves to 0 or exceeds the number of covariates.
    #[error("mtry resolved to {mtry}, but must be in [1, {n_var}]")]
    InvalidMtry {
        /// The resolved mtry value.
        mtry: usize,
        /// The number of raw covariates.
        n_var: usize,
    },

    /// Returned when node_size is zero.
    #[error("node_size must be at least 1, got {node_size}")]
    InvalidNodeSize {
        /// The invalid node_size value provided.
        node_size: usize,
    },

    /// Returned when min_loss_delta is NaN.
    #[error("min_loss_delta must not be NaN")]
    InvalidMinLossDelta,

    /// Returned when the functional grouping rate is not a positive finite number.
    #[error("lambda must be positive and finite, got {lambda}")]
    InvalidLambda {
        /// The invalid rate provided.
        lambda: f64,
    },

    /// Returned when a functional block has zero length.
    #[error("block {block} has zero length")]
    ZeroBlockLength {
        /// The zero-based index of the offending block.
        block: usize,
    },

    /// Returned when the block lengths do not cover the covariates exactly.
    #[error("block lengths sum to {sum}, expected n_var = {n_var}")]
    BlockLengthMismatch {
        /// Sum of the provided block lengths.
        sum: usize,
        /// The number of raw covariates.
        n_var: usize,
    },

    /// Returned when a flat buffer does not match the declared matrix shape.
    #[error("buffer of length {len} cannot hold a {n_rows} x {n_cols} matrix with stride {stride}")]
    ShapeMismatch {
        /// Length of the flat buffer.
        len: usize,
        /// Declared number of rows.
        n_rows: usize,
        /// Declared number of columns.
        n_cols: usize,
        /// Declared column stride.
        stride: usize,
    },

    /// Returned when the training dataset has zero observations.
    #[error("training dataset has zero observations")]
    EmptyDataset,

    /// Returned when the covariate matrix has zero columns.
    #[error("covariate matrix has zero columns")]
    ZeroCovariates,

    /// Returned when the basis matrix has zero columns.
    #[error("basis matrix has zero columns")]
    ZeroBasis,

    /// Returned when covariates and basis evaluations disagree on n_train.
    #[error("covariates have {covariate_rows} rows but basis has {basis_rows}")]
    RowCountMismatch {
        /// Rows in the covariate matrix.
        covariate_rows: usize,
        /// Rows in the basis matrix.
        basis_rows: usize,
    },

    /// Returned when the bootstrap weight vector length differs from n_train.
    #[error("weight vector has length {got}, expected n_train = {expected}")]
    WeightCountMismatch {
        /// The number of training observations.
        expected: usize,
        /// The length of the provided weight vector.
        got: usize,
    },

    /// Returned when a training value is NaN or infinite.
    #[error("non-finite {matrix} value at row {row}, column {column}")]
    NonFiniteValue {
        /// Which input matrix holds the value.
        matrix: &'static str,
        /// The zero-based observation index.
        row: usize,
        /// The zero-based column index.
        column: usize,
    },

    /// Returned when a query point has the wrong number of covariates.
    #[error("query point has {got} covariates, expected {expected}")]
    PointDimensionMismatch {
        /// The number of covariates the forest was trained on.
        expected: usize,
        /// The number of covariates in the query point.
        got: usize,
    },

    /// Returned when an output buffer has the wrong length.
    #[error("{buffer} buffer has length {got}, expected {expected}")]
    BufferLengthMismatch {
        /// Which output buffer was wrong.
        buffer: &'static str,
        /// The required length.
        expected: usize,
        /// The provided length.
        got: usize,
    },

    /// Returned when OOB weights are requested from a forest fitted without OOB mode.
    #[error("forest was not fitted with out-of-bag observations")]
    OobNotFitted,

    /// Returned when a quantile lies outside [0, 1].
    #[error("quantile must be in [0, 1], got {quantile}")]
    InvalidQuantile {
        /// The invalid quantile requested.
        quantile: f64,
    },

    /// Returned when a query point receives zero total weight.
    #[error("query point received zero total weight")]
    ZeroTotalWeight,

    /// Returned when a response column is constant and cannot be boxed to [0, 1].
    #[error("response column {column} is constant")]
    DegenerateResponse {
        /// The zero-based response column.
        column: usize,
    },

    /// Returned when zero basis functions are requested for a response dimension.
    #[error("basis size for response dimension {dimension} must be at least 1")]
    InvalidBasisSize {
        /// The zero-based response dimension.
        dimension: usize,
    },

    /// Returned when a per-dimension basis size list has the wrong length.
    #[error("got {got} basis sizes for {expected} response dimensions")]
    BasisDimensionMismatch {
        /// Number of response dimensions.
        expected: usize,
        /// Number of basis sizes provided.
        got: usize,
    },

    /// Returned when an index buffer or node arena cannot be allocated.
    #[error("failed to allocate {what}")]
    ResourceExhausted {
        /// What was being allocated.
        what: &'static str,
        /// The underlying allocation error.
        #[source]
        source: TryReserveError,
    },
}
