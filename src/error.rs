//! Error types for the analysis engine.

use thiserror::Error;

/// Errors surfaced to the embedding host.
///
/// Failures raised by untrusted sandbox code never appear here: the
/// executor folds them into the `error` field of its result envelope
/// instead of returning `Err`. These variants cover programming and
/// configuration mistakes made by the host itself.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid composition request (empty chart list, bad placement)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Chart kind not present in the render registry
    #[error("unknown chart type '{0}'")]
    UnsupportedChartType(String),

    /// Chart data that cannot be coerced into a tabular frame
    #[error("invalid chart data: {0}")]
    InvalidChartData(String),

    /// Explicit dataset lookup miss
    #[error("no metadata available for dataset '{dataset}'")]
    DatasetNotFound { dataset: String },

    /// Explicit table lookup miss
    #[error("no metadata available for table '{table}' in dataset '{dataset}'")]
    TableNotFound { dataset: String, table: String },

    /// Figure rasterization fault
    #[error("failed to render figure: {0}")]
    Render(String),

    /// Descriptor source could not be scanned
    #[error("metadata source error: {0}")]
    Metadata(#[from] std::io::Error),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for Box<rhai::EvalAltResult> {
    /// Host errors raised inside sandbox bindings become script runtime
    /// errors, so they land in the same captured channel as any other
    /// script fault.
    fn from(err: Error) -> Self {
        rhai::EvalAltResult::ErrorRuntime(err.to_string().into(), rhai::Position::NONE).into()
    }
}
