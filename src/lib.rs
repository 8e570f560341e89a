//! # unidbc
//!
//! Uniform database-access runtime: one typed facade over pluggable native
//! SQL client back-ends.
//!
//! The runtime marshals managed values — strings, byte-strings,
//! arbitrary-precision integers and rationals, booleans, dates/times,
//! durations — to and from the ABI buffers of native client libraries,
//! through a prepared-statement lifecycle with shared-ownership handles.
//! The built-in back-end drives a driver-manager (call-level-interface)
//! client resolved at runtime; further back-ends register into the same
//! dispatch contract.
//!
//! ## Example
//!
//! ```no_run
//! use unidbc::{open, ConnectParams};
//!
//! # fn example() -> Result<(), unidbc::DbError> {
//! let params = ConnectParams::new("db-host", 0, "sales_dsn", "reporter", "secret");
//! let connection = open("odbc", &params)?;
//!
//! let statement = connection.prepare("SELECT id, name FROM customers WHERE id = ?")?;
//! statement.bind_int(1, 42)?;
//! statement.execute()?;
//!
//! while statement.fetch()? {
//!     let id = statement.column_int(1)?;
//!     let name = statement.column_string(2)?;
//!     println!("{id}: {name}");
//! }
//!
//! connection.close()?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod codec;
pub mod driver;
pub mod error;
pub mod odbc;
pub mod preprocess;
pub mod value;

// Re-export the public surface
pub use api::{open, Connection, Statement};
pub use driver::{registry, Capabilities, ConnectParams, Driver, DriverConnection, DriverStatement};
pub use error::{last_diagnostic, DbError, DiagnosticRecord, InternalError, MisuseError, NativeError, ResourceError};
pub use value::{Duration, LocalZone, TimeZoneService, Timestamp};

// Re-export the numeric value types callers exchange with the runtime
pub use num_bigint::BigInt;
pub use num_rational::BigRational;
