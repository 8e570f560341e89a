//! Connection handles.
//!
//! A [`Connection`] is a shared-ownership handle: cloning increments the
//! reference count, dropping the last clone releases the native connection.
//! `close` releases the native connection early; statements that still hold
//! the connection record keep working API-wise but fail their liveness
//! check.

use std::sync::{Arc, Mutex};

use crate::api::statement::Statement;
use crate::driver::{registry, Capabilities, ConnectParams, DriverConnection};
use crate::error::{DbError, MisuseError};

/// Open a connection through a registered back-end category.
///
/// # Example
///
/// ```no_run
/// use unidbc::{open, ConnectParams};
///
/// # fn example() -> Result<(), unidbc::DbError> {
/// let params = ConnectParams::new("db-host", 0, "sales_dsn", "reporter", "secret");
/// let connection = open("odbc", &params)?;
/// let statement = connection.prepare("SELECT COUNT(*) FROM orders")?;
/// # Ok(())
/// # }
/// ```
pub fn open(backend: &str, params: &ConnectParams) -> Result<Connection, DbError> {
    let driver = registry::driver_for(backend)?;
    let driver_connection = driver.open(params)?;
    let capabilities = driver_connection.capabilities();
    Ok(Connection {
        inner: Arc::new(ConnectionInner {
            driver: Mutex::new(driver_connection),
            capabilities,
        }),
    })
}

pub(crate) struct ConnectionInner {
    pub(crate) driver: Mutex<Box<dyn DriverConnection>>,
    pub(crate) capabilities: Capabilities,
}

impl ConnectionInner {
    /// Run an operation against the open connection, or fail the liveness
    /// check.
    pub(crate) fn with_open<R>(
        &self,
        operation: impl FnOnce(&mut dyn DriverConnection) -> Result<R, DbError>,
    ) -> Result<R, DbError> {
        let mut guard = self.driver.lock().expect("connection lock");
        if !guard.is_open() {
            return Err(DbError::Misuse(MisuseError::ConnectionClosed));
        }
        operation(guard.as_mut())
    }
}

/// A database connection handle with shared ownership.
pub struct Connection {
    pub(crate) inner: Arc<ConnectionInner>,
}

impl Clone for Connection {
    fn clone(&self) -> Self {
        Connection {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Connection {
    /// Prepare a statement. The statement holds a reference to this
    /// connection, so the connection record outlives it.
    pub fn prepare(&self, statement_text: &str) -> Result<Statement, DbError> {
        let driver_statement = self
            .inner
            .with_open(|connection| connection.prepare(statement_text))?;
        Ok(Statement::new(Arc::clone(&self.inner), driver_statement))
    }

    /// Commit the current transaction.
    pub fn commit(&self) -> Result<(), DbError> {
        self.inner.with_open(|connection| connection.commit())
    }

    /// Roll back the current transaction.
    pub fn rollback(&self) -> Result<(), DbError> {
        self.inner.with_open(|connection| connection.rollback())
    }

    /// Read the autocommit flag.
    pub fn auto_commit(&self) -> Result<bool, DbError> {
        self.inner.with_open(|connection| connection.auto_commit())
    }

    /// Set the autocommit flag.
    pub fn set_auto_commit(&self, auto_commit: bool) -> Result<(), DbError> {
        self.inner
            .with_open(|connection| connection.set_auto_commit(auto_commit))
    }

    /// Release the native connection now, ahead of the last handle drop.
    /// Closing an already closed connection is a no-op.
    pub fn close(&self) -> Result<(), DbError> {
        let mut guard = self.inner.driver.lock().expect("connection lock");
        if guard.is_open() {
            guard.close()?;
        }
        Ok(())
    }

    /// True until `close` has been called.
    pub fn is_open(&self) -> bool {
        self.inner.driver.lock().expect("connection lock").is_open()
    }

    /// Capabilities the driver reported at open time.
    pub fn capabilities(&self) -> Capabilities {
        self.inner.capabilities
    }

    /// Number of live handles sharing this connection record, statements
    /// included. Diagnostic only.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("open", &self.is_open())
            .field("capabilities", &self.inner.capabilities)
            .finish()
    }
}
