//! Prepared statement handles.
//!
//! A [`Statement`] shares ownership of its connection record, so the
//! connection outlives every statement prepared on it. Every operation
//! checks, in order: the owning connection is open, then the back-end
//! operation resolves (an unimplemented operation is an internal error),
//! then delegates and returns the back-end result unchanged.

use std::sync::{Arc, Mutex};

use num_bigint::BigInt;
use num_rational::BigRational;

use crate::api::connection::ConnectionInner;
use crate::driver::DriverStatement;
use crate::error::{DbError, MisuseError};
use crate::value::{Duration, Timestamp};

struct StatementInner {
    connection: Arc<ConnectionInner>,
    driver: Mutex<Box<dyn DriverStatement>>,
}

/// A prepared statement handle with shared ownership.
pub struct Statement {
    inner: Arc<StatementInner>,
}

impl Clone for Statement {
    fn clone(&self) -> Self {
        Statement {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Statement {
    pub(crate) fn new(
        connection: Arc<ConnectionInner>,
        driver: Box<dyn DriverStatement>,
    ) -> Statement {
        Statement {
            inner: Arc::new(StatementInner {
                connection,
                driver: Mutex::new(driver),
            }),
        }
    }

    /// The shared liveness-then-delegate sequence of every operation.
    fn with_driver<R>(
        &self,
        operation: impl FnOnce(&mut dyn DriverStatement) -> Result<R, DbError>,
    ) -> Result<R, DbError> {
        {
            let connection = self
                .inner
                .connection
                .driver
                .lock()
                .expect("connection lock");
            if !connection.is_open() {
                return Err(DbError::Misuse(MisuseError::ConnectionClosed));
            }
        }
        let mut driver = self.inner.driver.lock().expect("statement lock");
        operation(driver.as_mut())
    }

    /// Bind an arbitrary-precision integer to a 1-based parameter position.
    pub fn bind_big_int(&self, position: usize, value: &BigInt) -> Result<(), DbError> {
        self.with_driver(|statement| statement.bind_big_int(position, value))
    }

    /// Bind an arbitrary-precision rational.
    pub fn bind_big_rational(&self, position: usize, value: &BigRational) -> Result<(), DbError> {
        self.with_driver(|statement| statement.bind_big_rational(position, value))
    }

    /// Bind a boolean.
    pub fn bind_bool(&self, position: usize, value: bool) -> Result<(), DbError> {
        self.with_driver(|statement| statement.bind_bool(position, value))
    }

    /// Bind a byte string.
    pub fn bind_bytes(&self, position: usize, value: &[u8]) -> Result<(), DbError> {
        self.with_driver(|statement| statement.bind_bytes(position, value))
    }

    /// Bind a duration.
    pub fn bind_duration(&self, position: usize, value: &Duration) -> Result<(), DbError> {
        self.with_driver(|statement| statement.bind_duration(position, value))
    }

    /// Bind a float.
    pub fn bind_float(&self, position: usize, value: f64) -> Result<(), DbError> {
        self.with_driver(|statement| statement.bind_float(position, value))
    }

    /// Bind an integer.
    pub fn bind_int(&self, position: usize, value: i64) -> Result<(), DbError> {
        self.with_driver(|statement| statement.bind_int(position, value))
    }

    /// Bind NULL.
    pub fn bind_null(&self, position: usize) -> Result<(), DbError> {
        self.with_driver(|statement| statement.bind_null(position))
    }

    /// Bind a string.
    pub fn bind_string(&self, position: usize, value: &str) -> Result<(), DbError> {
        self.with_driver(|statement| statement.bind_string(position, value))
    }

    /// Bind a date/time value.
    pub fn bind_time(&self, position: usize, value: &Timestamp) -> Result<(), DbError> {
        self.with_driver(|statement| statement.bind_time(position, value))
    }

    /// Execute the statement. Every parameter must be bound.
    pub fn execute(&self) -> Result<(), DbError> {
        self.with_driver(|statement| statement.execute())
    }

    /// Advance to the next row. Returns `false` once the result set is
    /// exhausted (or the statement produced none).
    pub fn fetch(&self) -> Result<bool, DbError> {
        self.with_driver(|statement| statement.fetch())
    }

    /// Read a column as arbitrary-precision integer. NULL reads as 0.
    pub fn column_big_int(&self, column: usize) -> Result<BigInt, DbError> {
        self.with_driver(|statement| statement.column_big_int(column))
    }

    /// Read a column as arbitrary-precision rational. NULL reads as 0.
    pub fn column_big_rational(&self, column: usize) -> Result<BigRational, DbError> {
        self.with_driver(|statement| statement.column_big_rational(column))
    }

    /// Read a column as boolean. NULL reads as `false`.
    pub fn column_bool(&self, column: usize) -> Result<bool, DbError> {
        self.with_driver(|statement| statement.column_bool(column))
    }

    /// Read a column as byte string. NULL reads as empty.
    pub fn column_bytes(&self, column: usize) -> Result<Vec<u8>, DbError> {
        self.with_driver(|statement| statement.column_bytes(column))
    }

    /// Read a column as duration. NULL reads as the zero duration.
    pub fn column_duration(&self, column: usize) -> Result<Duration, DbError> {
        self.with_driver(|statement| statement.column_duration(column))
    }

    /// Read a column as float. NULL reads as 0.0.
    pub fn column_float(&self, column: usize) -> Result<f64, DbError> {
        self.with_driver(|statement| statement.column_float(column))
    }

    /// Read a column as integer. NULL reads as 0.
    pub fn column_int(&self, column: usize) -> Result<i64, DbError> {
        self.with_driver(|statement| statement.column_int(column))
    }

    /// Read a column as string. NULL reads as the empty string.
    pub fn column_string(&self, column: usize) -> Result<String, DbError> {
        self.with_driver(|statement| statement.column_string(column))
    }

    /// Read a column as date/time. NULL reads as the epoch placeholder.
    pub fn column_time(&self, column: usize) -> Result<Timestamp, DbError> {
        self.with_driver(|statement| statement.column_time(column))
    }

    /// Whether the column of the current row is NULL. This is the only way
    /// to tell a true zero value from the NULL default.
    pub fn is_null(&self, column: usize) -> Result<bool, DbError> {
        self.with_driver(|statement| statement.is_null(column))
    }

    /// Number of result columns.
    pub fn column_count(&self) -> Result<usize, DbError> {
        self.with_driver(|statement| statement.column_count())
    }

    /// Name of a 1-based result column.
    pub fn column_name(&self, column: usize) -> Result<String, DbError> {
        self.with_driver(|statement| statement.column_name(column))
    }
}

impl std::fmt::Debug for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{Capabilities, DriverConnection};
    use mockall::mock;
    use std::sync::Mutex;

    mock! {
        pub Conn {}

        impl DriverConnection for Conn {
            fn capabilities(&self) -> Capabilities;
            fn is_open(&self) -> bool;
            fn prepare(&mut self, statement_text: &str) -> Result<Box<dyn DriverStatement>, DbError>;
            fn commit(&mut self) -> Result<(), DbError>;
            fn rollback(&mut self) -> Result<(), DbError>;
            fn auto_commit(&mut self) -> Result<bool, DbError>;
            fn set_auto_commit(&mut self, auto_commit: bool) -> Result<(), DbError>;
            fn close(&mut self) -> Result<(), DbError>;
        }
    }

    mock! {
        pub Stmt {}

        impl DriverStatement for Stmt {
            fn bind_int(&mut self, position: usize, value: i64) -> Result<(), DbError>;
            fn execute(&mut self) -> Result<(), DbError>;
            fn fetch(&mut self) -> Result<bool, DbError>;
            fn column_int(&mut self, column: usize) -> Result<i64, DbError>;
            fn is_null(&self, column: usize) -> Result<bool, DbError>;
            fn column_count(&self) -> Result<usize, DbError>;
        }
    }

    fn statement_over(connection_open: bool, mock: MockStmt) -> Statement {
        let mut connection = MockConn::new();
        connection.expect_is_open().return_const(connection_open);
        Statement::new(
            Arc::new(ConnectionInner {
                driver: Mutex::new(Box::new(connection)),
                capabilities: Capabilities::default(),
            }),
            Box::new(mock),
        )
    }

    #[test]
    fn test_statement_on_closed_connection_fails_first() {
        // The driver mock would panic if any statement operation reached it.
        let statement = statement_over(false, MockStmt::new());
        assert!(matches!(
            statement.execute().unwrap_err(),
            DbError::Misuse(MisuseError::ConnectionClosed)
        ));
        assert!(matches!(
            statement.column_int(1).unwrap_err(),
            DbError::Misuse(MisuseError::ConnectionClosed)
        ));
    }

    #[test]
    fn test_delegation_returns_native_result_unchanged() {
        let mut mock = MockStmt::new();
        mock.expect_bind_int().times(1).returning(|_, _| Ok(()));
        mock.expect_execute().times(1).returning(|| Ok(()));
        mock.expect_fetch().times(1).returning(|| Ok(true));
        mock.expect_column_int().times(1).returning(|_| Ok(41));
        let statement = statement_over(true, mock);

        statement.bind_int(1, 41).unwrap();
        statement.execute().unwrap();
        assert!(statement.fetch().unwrap());
        assert_eq!(statement.column_int(1).unwrap(), 41);
    }

    #[test]
    fn test_unimplemented_operation_surfaces_internal_error() {
        // The mock only implements a subset; the trait defaults stand in
        // for the rest, like unset function pointers.
        let statement = statement_over(true, MockStmt::new());
        let err = statement.column_duration(1).unwrap_err();
        assert!(matches!(err, DbError::Internal(_)));
    }

    #[test]
    fn test_clone_shares_the_statement() {
        let mut mock = MockStmt::new();
        mock.expect_fetch().times(2).returning(|| Ok(false));
        let statement = statement_over(true, mock);
        let second = statement.clone();

        assert!(!statement.fetch().unwrap());
        assert!(!second.fetch().unwrap());
    }
}
