//! The per-driver dispatch contract.
//!
//! One back-end category participates in the runtime by implementing three
//! traits: [`Driver`] opens connections, [`DriverConnection`] owns a live
//! native connection, and [`DriverStatement`] owns a prepared statement.
//! The facade never calls a native API directly; it always dispatches
//! through these trait objects, so adding a back-end means implementing the
//! contract once.
//!
//! Every statement operation has a default body that reports a missing
//! operation as an internal-consistency error. A back-end that leaves an
//! operation unimplemented therefore fails loudly instead of crashing, the
//! same way an unset function pointer would have been caught.

pub mod registry;

use num_bigint::BigInt;
use num_rational::BigRational;

use crate::error::{missing_operation, DbError};
use crate::value::{Duration, Timestamp};

/// Parameters handed to a back-end's open routine.
///
/// Connection-string assembly beyond these five fields is the back-end's
/// business; the runtime passes them through untouched.
#[derive(Clone, Default)]
pub struct ConnectParams {
    pub host: String,
    pub port: u16,
    pub db_name: String,
    pub user: String,
    password: String,
}

impl ConnectParams {
    pub fn new(host: &str, port: u16, db_name: &str, user: &str, password: &str) -> Self {
        ConnectParams {
            host: host.to_string(),
            port,
            db_name: db_name.to_string(),
            user: user.to_string(),
            password: password.to_string(),
        }
    }

    /// The password, kept out of `Debug` output and logs.
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("db_name", &self.db_name)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// Driver-detected properties of an open connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// The client transports text as wide characters
    pub wide_chars: bool,
    /// The driver's tiny integer type is unsigned
    pub tinyint_unsigned: bool,
    /// Maximum number of concurrently active statements per connection;
    /// zero means unlimited
    pub max_concurrent_statements: u16,
}

/// A back-end category: a factory for connections.
pub trait Driver: Send + Sync {
    /// Short name of the category, e.g. `"odbc"`.
    fn name(&self) -> &str;

    /// Open a native connection.
    fn open(&self, params: &ConnectParams) -> Result<Box<dyn DriverConnection>, DbError>;
}

/// A live native connection owned by one back-end.
pub trait DriverConnection: Send {
    /// Capabilities detected at open time.
    fn capabilities(&self) -> Capabilities;

    /// True until `close` has been called.
    fn is_open(&self) -> bool;

    /// Prepare a statement on this connection.
    fn prepare(&mut self, statement_text: &str) -> Result<Box<dyn DriverStatement>, DbError>;

    /// Commit the current transaction.
    fn commit(&mut self) -> Result<(), DbError>;

    /// Roll back the current transaction.
    fn rollback(&mut self) -> Result<(), DbError>;

    /// Read the autocommit flag.
    fn auto_commit(&mut self) -> Result<bool, DbError>;

    /// Set the autocommit flag.
    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<(), DbError>;

    /// Release the native connection now, ahead of the last handle drop.
    /// Statements prepared on this connection keep their handles but fail
    /// their next native call.
    fn close(&mut self) -> Result<(), DbError>;
}

/// A prepared statement owned by one back-end.
///
/// Positions and columns are 1-based throughout, matching the native
/// protocols underneath.
#[allow(unused_variables)]
pub trait DriverStatement: Send {
    fn bind_big_int(&mut self, position: usize, value: &BigInt) -> Result<(), DbError> {
        Err(missing_operation("bind_big_int"))
    }

    fn bind_big_rational(&mut self, position: usize, value: &BigRational) -> Result<(), DbError> {
        Err(missing_operation("bind_big_rational"))
    }

    fn bind_bool(&mut self, position: usize, value: bool) -> Result<(), DbError> {
        Err(missing_operation("bind_bool"))
    }

    fn bind_bytes(&mut self, position: usize, value: &[u8]) -> Result<(), DbError> {
        Err(missing_operation("bind_bytes"))
    }

    fn bind_duration(&mut self, position: usize, value: &Duration) -> Result<(), DbError> {
        Err(missing_operation("bind_duration"))
    }

    fn bind_float(&mut self, position: usize, value: f64) -> Result<(), DbError> {
        Err(missing_operation("bind_float"))
    }

    fn bind_int(&mut self, position: usize, value: i64) -> Result<(), DbError> {
        Err(missing_operation("bind_int"))
    }

    fn bind_null(&mut self, position: usize) -> Result<(), DbError> {
        Err(missing_operation("bind_null"))
    }

    fn bind_string(&mut self, position: usize, value: &str) -> Result<(), DbError> {
        Err(missing_operation("bind_string"))
    }

    fn bind_time(&mut self, position: usize, value: &Timestamp) -> Result<(), DbError> {
        Err(missing_operation("bind_time"))
    }

    fn execute(&mut self) -> Result<(), DbError> {
        Err(missing_operation("execute"))
    }

    fn fetch(&mut self) -> Result<bool, DbError> {
        Err(missing_operation("fetch"))
    }

    fn column_big_int(&mut self, column: usize) -> Result<BigInt, DbError> {
        Err(missing_operation("column_big_int"))
    }

    fn column_big_rational(&mut self, column: usize) -> Result<BigRational, DbError> {
        Err(missing_operation("column_big_rational"))
    }

    fn column_bool(&mut self, column: usize) -> Result<bool, DbError> {
        Err(missing_operation("column_bool"))
    }

    fn column_bytes(&mut self, column: usize) -> Result<Vec<u8>, DbError> {
        Err(missing_operation("column_bytes"))
    }

    fn column_duration(&mut self, column: usize) -> Result<Duration, DbError> {
        Err(missing_operation("column_duration"))
    }

    fn column_float(&mut self, column: usize) -> Result<f64, DbError> {
        Err(missing_operation("column_float"))
    }

    fn column_int(&mut self, column: usize) -> Result<i64, DbError> {
        Err(missing_operation("column_int"))
    }

    fn column_string(&mut self, column: usize) -> Result<String, DbError> {
        Err(missing_operation("column_string"))
    }

    fn column_time(&mut self, column: usize) -> Result<Timestamp, DbError> {
        Err(missing_operation("column_time"))
    }

    fn is_null(&self, column: usize) -> Result<bool, DbError> {
        Err(missing_operation("is_null"))
    }

    fn column_count(&self) -> Result<usize, DbError> {
        Err(missing_operation("column_count"))
    }

    fn column_name(&mut self, column: usize) -> Result<String, DbError> {
        Err(missing_operation("column_name"))
    }
}
