//! Error types for unidbc.
//!
//! This module defines domain-specific error types organized by functional
//! area, plus the process-wide diagnostic record that mirrors the last
//! failing native call.

use std::fmt;
use std::sync::Mutex;

use once_cell::sync::Lazy;
use thiserror::Error;

/// Top-level error type encompassing all possible errors.
#[derive(Error, Debug)]
pub enum DbError {
    /// Caller misuse: bad handle state, bad position, unrepresentable value
    #[error(transparent)]
    Misuse(#[from] MisuseError),

    /// A native client-library call failed
    #[error(transparent)]
    Native(#[from] NativeError),

    /// Buffer sizing or allocation problems
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// The driver contradicted its own prior description, or an operation
    /// is missing from the dispatch contract
    #[error(transparent)]
    Internal(#[from] InternalError),
}

/// Errors caused by incorrect use of the public API.
#[derive(Error, Debug)]
pub enum MisuseError {
    /// The owning connection has been closed
    #[error("Connection is closed")]
    ConnectionClosed,

    /// Parameter position outside 1..=count
    #[error("Parameter position {position} out of range (statement has {count} parameters)")]
    ParameterOutOfRange { position: usize, count: usize },

    /// Column index outside 1..=count
    #[error("Column {column} out of range (result has {count} columns)")]
    ColumnOutOfRange { column: usize, count: usize },

    /// Execute was attempted with at least one unbound parameter
    #[error("Parameter {position} is not bound")]
    UnboundParameter { position: usize },

    /// A column accessor was called without a fetched row
    #[error("No row has been fetched")]
    NoFetchedRow,

    /// Fetch or column access before a successful execute
    #[error("Execute was not successful")]
    ExecuteNotSuccessful,

    /// The value cannot be represented in the parameter's native type
    #[error("Value for parameter {position} does not fit native type {native_type}: {detail}")]
    ValueOutOfRange {
        position: usize,
        native_type: &'static str,
        detail: String,
    },

    /// A column's native representation cannot convert to the requested kind
    #[error("Column {column} of native type {native_type} cannot be read as {requested}")]
    ColumnTypeMismatch {
        column: usize,
        native_type: &'static str,
        requested: &'static str,
    },

    /// Malformed text where a decimal, interval or timestamp was expected
    #[error("Cannot parse {what} from {text:?}")]
    ParseFailed { what: &'static str, text: String },

    /// A numeric value does not fit the native encoding
    #[error("Numeric value does not fit the native encoding: {detail}")]
    NumericOverflow { detail: String },

    /// One native interval value cannot carry both calendar and clock fields
    #[error("Interval cannot combine year/month with day/time components")]
    MixedIntervalFields,

    /// A duration component is outside the range a native interval accepts
    #[error("Duration component out of range: {detail}")]
    DurationOutOfRange { detail: String },

    /// The driver would not report the total size of a large object
    #[error("Driver cannot report the total length of the large object in column {column}")]
    LobSizeUnknown { column: usize },

    /// The driver reported a type code this runtime does not understand
    #[error("Column {column} has unsupported native type code {code}")]
    UnsupportedNativeType { column: usize, code: i16 },

    /// Statement text exceeds what the native layer accepts
    #[error("Statement text too long ({length} characters)")]
    StatementTooLong { length: usize },
}

/// A failing call into the native client library.
#[derive(Error, Debug)]
#[error("{function}: {native_function} failed: {message} (native error {error_code})")]
pub struct NativeError {
    /// The engine function that issued the call
    pub function: &'static str,
    /// The native entry point that failed
    pub native_function: &'static str,
    /// Driver-reported native error code
    pub error_code: i32,
    /// Formatted driver message (may include the SQLSTATE)
    pub message: String,
}

/// Buffer sizing and allocation errors.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// The driver reported a column size no buffer can be allocated for
    #[error("Column {column} reports an implausible size of {size} bytes")]
    ColumnSizeTooLarge { column: usize, size: u64 },

    /// A large-object retrieval reported a length beyond addressable memory
    #[error("Large object in column {column} reports {length} bytes")]
    LobTooLarge { column: usize, length: u64 },
}

/// Driver or engine bugs: data inconsistent with the driver's own
/// description, or a hole in the dispatch contract.
#[derive(Error, Debug)]
pub enum InternalError {
    /// The back-end left a contract operation unimplemented
    #[error("No implementation for operation {operation}")]
    MissingOperation { operation: &'static str },

    /// The driver returned data contradicting its prior description
    #[error("{function}: {native_function} returned inconsistent data: {detail}")]
    Inconsistent {
        function: &'static str,
        native_function: &'static str,
        detail: String,
    },
}

/// Convenience constructor for the "unset function pointer" analogue.
pub(crate) fn missing_operation(operation: &'static str) -> DbError {
    DbError::Internal(InternalError::MissingOperation { operation })
}

/// One record describing the most recent failing native call.
///
/// This is a diagnostic side channel with process lifetime. It is rewritten
/// on every failing native call and never cleared automatically; the primary
/// error channel is the `Result` returned by each operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticRecord {
    /// Engine function that issued the failing call
    pub function: &'static str,
    /// Native entry point that failed
    pub native_function: &'static str,
    /// Driver-reported native error code
    pub error_code: i32,
    /// Formatted driver message
    pub message: String,
}

impl fmt::Display for DiagnosticRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} failed with native error {}: {}",
            self.function, self.native_function, self.error_code, self.message
        )
    }
}

static LAST_DIAGNOSTIC: Lazy<Mutex<Option<DiagnosticRecord>>> = Lazy::new(|| Mutex::new(None));

/// Read the most recent failing-native-call record, if any.
pub fn last_diagnostic() -> Option<DiagnosticRecord> {
    LAST_DIAGNOSTIC.lock().expect("diagnostic lock").clone()
}

/// Record a failing native call in the process-wide diagnostic record.
pub(crate) fn record_diagnostic(record: DiagnosticRecord) {
    *LAST_DIAGNOSTIC.lock().expect("diagnostic lock") = Some(record);
}

impl NativeError {
    /// Build the error and mirror it into the process-wide record.
    pub(crate) fn recorded(
        function: &'static str,
        native_function: &'static str,
        error_code: i32,
        message: String,
    ) -> Self {
        record_diagnostic(DiagnosticRecord {
            function,
            native_function,
            error_code,
            message: message.clone(),
        });
        NativeError {
            function,
            native_function,
            error_code,
            message,
        }
    }
}

impl InternalError {
    /// Build an inconsistency error, log it distinctly, and mirror it into
    /// the process-wide record. Inconsistencies indicate a driver or engine
    /// bug rather than a user or data error.
    pub(crate) fn inconsistent(
        function: &'static str,
        native_function: &'static str,
        detail: String,
    ) -> Self {
        tracing::error!(function, native_function, %detail, "driver inconsistency");
        record_diagnostic(DiagnosticRecord {
            function,
            native_function,
            error_code: 0,
            message: format!("driver inconsistency: {detail}"),
        });
        InternalError::Inconsistent {
            function,
            native_function,
            detail,
        }
    }
}
