//! Driver-manager back-end: connection setup and transaction control.
//!
//! A connection owns a native environment and connection handle pair plus
//! the capabilities probed at open time. The native pair is shared with
//! every statement prepared on the connection (statements keep the record
//! alive), released exactly once, either at explicit close or when the last
//! holder drops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::api::{CliApi, CliFailure, DbcHandle, EnvHandle};
use super::statement::OdbcStatement;
use super::sys;
use crate::driver::{Capabilities, ConnectParams, Driver, DriverConnection, DriverStatement};
use crate::error::{DbError, MisuseError, NativeError};
use crate::value::{LocalZone, TimeZoneService};

/// How exact numerics travel between the engine and the driver.
///
/// Text is the default: some drivers mishandle the packed structure and
/// some databases exceed its 38-digit capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumericEncoding {
    #[default]
    Text,
    Packed,
}

/// Back-end configuration resolved before the first connection opens.
#[derive(Clone)]
pub struct DriverConfig {
    pub numeric: NumericEncoding,
    pub time_zone: Arc<dyn TimeZoneService>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            numeric: NumericEncoding::Text,
            time_zone: Arc::new(LocalZone),
        }
    }
}

/// The driver-manager back-end category.
pub struct OdbcDriver {
    api: Arc<dyn CliApi>,
    config: DriverConfig,
}

impl OdbcDriver {
    /// Load the client library from the environment and build the driver.
    pub fn from_environment() -> Result<OdbcDriver, DbError> {
        let library = super::library::OdbcLibrary::load_default()?;
        Ok(OdbcDriver::with_api(
            Arc::new(library),
            DriverConfig::default(),
        ))
    }

    /// Build the driver over an explicit native call surface. This is how
    /// vendor back-ends that speak the protocol, and tests, plug in.
    pub fn with_api(api: Arc<dyn CliApi>, config: DriverConfig) -> OdbcDriver {
        OdbcDriver { api, config }
    }
}

pub(crate) fn native_err(function: &'static str, failure: CliFailure) -> DbError {
    DbError::Native(NativeError::recorded(
        function,
        failure.native_function,
        failure.error_code,
        failure.message,
    ))
}

/// The native handle pair shared between a connection and its statements.
pub(crate) struct ConnCore {
    pub(crate) api: Arc<dyn CliApi>,
    env: EnvHandle,
    dbc: DbcHandle,
    closed: AtomicBool,
}

impl ConnCore {
    /// The native connection handle, or the closed-connection error.
    pub(crate) fn dbc(&self) -> Result<DbcHandle, DbError> {
        if self.closed.load(Ordering::Acquire) {
            Err(DbError::Misuse(MisuseError::ConnectionClosed))
        } else {
            Ok(self.dbc)
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Disconnect and free the native pair. Only the first call acts;
    /// statements still holding this record fail their next native call.
    fn release(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(failure) = self.api.disconnect(self.dbc) {
            tracing::warn!(
                native_function = failure.native_function,
                message = %failure.message,
                "disconnect failed"
            );
        }
        self.api.free_connection(self.dbc);
        self.api.free_env(self.env);
    }
}

impl Drop for ConnCore {
    fn drop(&mut self) {
        self.release();
    }
}

/// Probe the driver-detected capabilities of a fresh connection.
fn detect_capabilities(api: &dyn CliApi, dbc: DbcHandle) -> Result<Capabilities, DbError> {
    let max_concurrent_statements = api
        .max_concurrent_statements(dbc)
        .map_err(|failure| native_err("open", failure))?;
    let wide_chars = api
        .has_data_type(dbc, sys::SQL_WCHAR)
        .map_err(|failure| native_err("open", failure))?;
    let tinyint_unsigned = api
        .data_type_is_unsigned(dbc, sys::SQL_TINYINT)
        .map_err(|failure| native_err("open", failure))?
        .unwrap_or(false);
    let capabilities = Capabilities {
        wide_chars,
        tinyint_unsigned,
        max_concurrent_statements,
    };
    tracing::debug!(?capabilities, "detected connection capabilities");
    Ok(capabilities)
}

impl Driver for OdbcDriver {
    fn name(&self) -> &str {
        "odbc"
    }

    fn open(&self, params: &ConnectParams) -> Result<Box<dyn DriverConnection>, DbError> {
        let api = Arc::clone(&self.api);
        let env = api
            .alloc_env()
            .map_err(|failure| native_err("open", failure))?;
        let dbc = match api.alloc_connection(env) {
            Ok(dbc) => dbc,
            Err(failure) => {
                api.free_env(env);
                return Err(native_err("open", failure));
            }
        };
        if let Err(failure) = api.connect(dbc, &params.db_name, &params.user, params.password()) {
            api.free_connection(dbc);
            api.free_env(env);
            return Err(native_err("open", failure));
        }
        let capabilities = match detect_capabilities(api.as_ref(), dbc) {
            Ok(capabilities) => capabilities,
            Err(err) => {
                let _ = api.disconnect(dbc);
                api.free_connection(dbc);
                api.free_env(env);
                return Err(err);
            }
        };
        Ok(Box::new(OdbcConnection {
            core: Arc::new(ConnCore {
                api,
                env,
                dbc,
                closed: AtomicBool::new(false),
            }),
            capabilities,
            config: self.config.clone(),
        }))
    }
}

/// A live driver-manager connection.
pub struct OdbcConnection {
    pub(crate) core: Arc<ConnCore>,
    capabilities: Capabilities,
    config: DriverConfig,
}

impl DriverConnection for OdbcConnection {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn is_open(&self) -> bool {
        !self.core.is_closed()
    }

    fn prepare(&mut self, statement_text: &str) -> Result<Box<dyn DriverStatement>, DbError> {
        let statement = OdbcStatement::prepare(
            Arc::clone(&self.core),
            self.capabilities,
            self.config.clone(),
            statement_text,
        )?;
        Ok(Box::new(statement))
    }

    fn commit(&mut self) -> Result<(), DbError> {
        let dbc = self.core.dbc()?;
        self.core
            .api
            .end_transaction(dbc, true)
            .map_err(|failure| native_err("commit", failure))
    }

    fn rollback(&mut self) -> Result<(), DbError> {
        let dbc = self.core.dbc()?;
        self.core
            .api
            .end_transaction(dbc, false)
            .map_err(|failure| native_err("rollback", failure))
    }

    fn auto_commit(&mut self) -> Result<bool, DbError> {
        let dbc = self.core.dbc()?;
        self.core
            .api
            .auto_commit(dbc)
            .map_err(|failure| native_err("auto_commit", failure))
    }

    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<(), DbError> {
        let dbc = self.core.dbc()?;
        self.core
            .api
            .set_auto_commit(dbc, auto_commit)
            .map_err(|failure| native_err("set_auto_commit", failure))
    }

    fn close(&mut self) -> Result<(), DbError> {
        self.core.release();
        Ok(())
    }
}
