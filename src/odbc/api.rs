//! The downward native call surface.
//!
//! [`CliApi`] is the set of operations the marshaling engine needs from a
//! call-level-interface client library. The production implementation
//! resolves them from a runtime-loaded shared library; tests script them.
//! Keeping the engine generic over this trait is what lets one engine serve
//! every back-end that speaks the protocol.

use super::sys::CType;

/// Opaque environment handle token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvHandle(pub usize);

/// Opaque connection handle token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbcHandle(pub usize);

/// Opaque statement handle token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StmtHandle(pub usize);

/// A failing native call: the entry point, the driver's diagnostic code and
/// its formatted message (SQLSTATE included when available).
#[derive(Debug, Clone)]
pub struct CliFailure {
    pub native_function: &'static str,
    pub error_code: i32,
    pub message: String,
}

impl CliFailure {
    pub fn new(native_function: &'static str, error_code: i32, message: impl Into<String>) -> Self {
        CliFailure {
            native_function,
            error_code,
            message: message.into(),
        }
    }
}

pub type CliResult<T> = Result<T, CliFailure>;

/// Length-or-null state of one transferred value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    /// The value is NULL
    Null,
    /// The driver cannot tell the total length
    NoTotal,
    /// Byte length of the transferred data
    Len(usize),
    /// The driver reported a length value outside the protocol, e.g. a
    /// negative count that is not one of the defined sentinels
    Invalid(i64),
}

impl Indicator {
    pub fn is_null(&self) -> bool {
        matches!(self, Indicator::Null)
    }
}

/// Driver description of one statement parameter.
#[derive(Debug, Clone, Copy)]
pub struct ParamDescription {
    pub data_type: i16,
    pub size: usize,
    pub decimal_digits: i16,
    pub nullable: bool,
}

/// Driver description of one result column.
#[derive(Debug, Clone)]
pub struct ColDescription {
    pub name: String,
    pub data_type: i16,
    pub size: usize,
    pub decimal_digits: i16,
    pub nullable: bool,
}

/// One bound-column target for a fetch: the driver writes the row's value
/// into `buffer` and its length-or-null state into `indicator` when the
/// cursor advances.
pub struct FetchTarget<'a> {
    pub column: u16,
    pub c_type: CType,
    pub buffer: &'a mut [u8],
    pub indicator: &'a mut Indicator,
}

/// The native call surface of a call-level-interface client library.
///
/// All calls are synchronous and blocking. Implementations detect failure,
/// collect the driver diagnostic, and return it as [`CliFailure`]; the
/// engine owns turning that into an error value and the process-wide
/// diagnostic record.
pub trait CliApi: Send + Sync {
    fn alloc_env(&self) -> CliResult<EnvHandle>;
    fn free_env(&self, env: EnvHandle);

    fn alloc_connection(&self, env: EnvHandle) -> CliResult<DbcHandle>;
    fn free_connection(&self, dbc: DbcHandle);
    fn connect(&self, dbc: DbcHandle, dsn: &str, user: &str, password: &str) -> CliResult<()>;
    fn disconnect(&self, dbc: DbcHandle) -> CliResult<()>;

    fn alloc_statement(&self, dbc: DbcHandle) -> CliResult<StmtHandle>;
    fn free_statement(&self, stmt: StmtHandle);
    /// Close the cursor, discarding pending results. Closing an already
    /// closed cursor is not an error.
    fn close_cursor(&self, stmt: StmtHandle) -> CliResult<()>;

    fn prepare(&self, stmt: StmtHandle, statement_text: &str) -> CliResult<()>;
    fn num_params(&self, stmt: StmtHandle) -> CliResult<i16>;
    /// Describe one parameter; `Ok(None)` when the driver cannot describe
    /// parameters at all.
    fn describe_param(&self, stmt: StmtHandle, number: u16) -> CliResult<Option<ParamDescription>>;
    fn num_result_cols(&self, stmt: StmtHandle) -> CliResult<i16>;
    fn describe_col(&self, stmt: StmtHandle, number: u16) -> CliResult<ColDescription>;
    /// Current name of a result column, via the descriptor field lookup.
    fn column_name(&self, stmt: StmtHandle, number: u16) -> CliResult<String>;

    /// Register one input parameter's value. `None` data binds NULL.
    #[allow(clippy::too_many_arguments)]
    fn bind_parameter(
        &self,
        stmt: StmtHandle,
        number: u16,
        c_type: CType,
        sql_type: i16,
        column_size: usize,
        decimal_digits: i16,
        data: Option<&[u8]>,
    ) -> CliResult<()>;

    /// Execute the prepared statement. A driver report of "no data" (e.g.
    /// a DELETE that matched nothing) counts as success.
    fn execute(&self, stmt: StmtHandle) -> CliResult<()>;

    /// Advance the cursor one row, transferring every target's value.
    /// Returns `false` once the result set is exhausted.
    fn fetch(&self, stmt: StmtHandle, targets: &mut [FetchTarget<'_>]) -> CliResult<bool>;

    /// Retrieve one column's data after a fetch. An empty `buffer` is the
    /// zero-length size probe: the returned indicator carries the total
    /// remaining length. Columns must be visited in ascending order.
    fn get_data(
        &self,
        stmt: StmtHandle,
        column: u16,
        c_type: CType,
        buffer: &mut [u8],
    ) -> CliResult<Indicator>;

    fn end_transaction(&self, dbc: DbcHandle, commit: bool) -> CliResult<()>;
    fn auto_commit(&self, dbc: DbcHandle) -> CliResult<bool>;
    fn set_auto_commit(&self, dbc: DbcHandle, on: bool) -> CliResult<()>;

    /// Maximum number of concurrently active statements; zero = unlimited.
    fn max_concurrent_statements(&self, dbc: DbcHandle) -> CliResult<u16>;
    /// Whether the driver knows the given SQL data type at all.
    fn has_data_type(&self, dbc: DbcHandle, sql_type: i16) -> CliResult<bool>;
    /// The UNSIGNED_ATTRIBUTE of the given type; `Ok(None)` when the type
    /// is not used by the data source.
    fn data_type_is_unsigned(&self, dbc: DbcHandle, sql_type: i16) -> CliResult<Option<bool>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indicator_null() {
        assert!(Indicator::Null.is_null());
        assert!(!Indicator::Len(0).is_null());
        assert!(!Indicator::NoTotal.is_null());
    }

    #[test]
    fn test_cli_failure_carries_context() {
        let failure = CliFailure::new("SQLExecute", -104, "syntax error");
        assert_eq!(failure.native_function, "SQLExecute");
        assert_eq!(failure.error_code, -104);
        assert!(failure.message.contains("syntax"));
    }
}
