//! Runtime-loaded client library.
//!
//! The driver manager is an optional back-end: nothing links against it at
//! build time. Its entry points are resolved once from a dynamically
//! discovered shared library and kept as a function table; a missing
//! library or symbol surfaces as a clear open-time error.
//!
//! Wide-character entry points are used throughout. `SQLWCHAR` is assumed
//! to be 16 bits, which holds for the driver managers on the default search
//! list; a manager built with 32-bit wide characters is not supported.

use std::collections::HashMap;
use std::ffi::c_void;
use std::sync::Mutex;

use libloading::Library;
use widestring::U16String;

use super::api::{
    CliApi, CliFailure, CliResult, ColDescription, DbcHandle, EnvHandle, FetchTarget, Indicator,
    ParamDescription, StmtHandle,
};
use super::sys;
use super::sys::CType;
use crate::error::{DbError, NativeError};

/// Environment variable naming the client library to load.
pub const LIBRARY_ENV_VAR: &str = "UNIDBC_ODBC_LIBRARY";

/// Library names probed in order when the environment does not name one.
pub const DEFAULT_LIBRARIES: &[&str] = &[
    "libodbc.so.2",
    "libodbc.so.1",
    "libodbc.so",
    "odbc32.dll",
];

type SqlReturn = i16;
type Handle = *mut c_void;
type SqlLen = isize;
type SqlULen = usize;

type AllocHandleFn = unsafe extern "system" fn(i16, Handle, *mut Handle) -> SqlReturn;
type FreeHandleFn = unsafe extern "system" fn(i16, Handle) -> SqlReturn;
type SetEnvAttrFn = unsafe extern "system" fn(Handle, i32, *mut c_void, i32) -> SqlReturn;
type ConnectWFn = unsafe extern "system" fn(
    Handle,
    *const u16,
    i16,
    *const u16,
    i16,
    *const u16,
    i16,
) -> SqlReturn;
type DisconnectFn = unsafe extern "system" fn(Handle) -> SqlReturn;
type PrepareWFn = unsafe extern "system" fn(Handle, *const u16, i32) -> SqlReturn;
type NumParamsFn = unsafe extern "system" fn(Handle, *mut i16) -> SqlReturn;
type DescribeParamFn =
    unsafe extern "system" fn(Handle, u16, *mut i16, *mut SqlULen, *mut i16, *mut i16) -> SqlReturn;
type NumResultColsFn = unsafe extern "system" fn(Handle, *mut i16) -> SqlReturn;
type DescribeColWFn = unsafe extern "system" fn(
    Handle,
    u16,
    *mut u16,
    i16,
    *mut i16,
    *mut i16,
    *mut SqlULen,
    *mut i16,
    *mut i16,
) -> SqlReturn;
type ColAttributeWFn = unsafe extern "system" fn(
    Handle,
    u16,
    u16,
    *mut c_void,
    i16,
    *mut i16,
    *mut SqlLen,
) -> SqlReturn;
type BindParameterFn = unsafe extern "system" fn(
    Handle,
    u16,
    i16,
    i16,
    i16,
    SqlULen,
    i16,
    *mut c_void,
    SqlLen,
    *mut SqlLen,
) -> SqlReturn;
type ExecuteFn = unsafe extern "system" fn(Handle) -> SqlReturn;
type BindColFn =
    unsafe extern "system" fn(Handle, u16, i16, *mut c_void, SqlLen, *mut SqlLen) -> SqlReturn;
type FetchFn = unsafe extern "system" fn(Handle) -> SqlReturn;
type FreeStmtFn = unsafe extern "system" fn(Handle, u16) -> SqlReturn;
type GetDataFn =
    unsafe extern "system" fn(Handle, u16, i16, *mut c_void, SqlLen, *mut SqlLen) -> SqlReturn;
type EndTranFn = unsafe extern "system" fn(i16, Handle, i16) -> SqlReturn;
type GetConnectAttrWFn =
    unsafe extern "system" fn(Handle, i32, *mut c_void, i32, *mut i32) -> SqlReturn;
type SetConnectAttrWFn = unsafe extern "system" fn(Handle, i32, *mut c_void, i32) -> SqlReturn;
type GetInfoWFn = unsafe extern "system" fn(Handle, u16, *mut c_void, i16, *mut i16) -> SqlReturn;
type GetTypeInfoWFn = unsafe extern "system" fn(Handle, i16) -> SqlReturn;
type GetDiagRecWFn = unsafe extern "system" fn(
    i16,
    Handle,
    i16,
    *mut u16,
    *mut i32,
    *mut u16,
    i16,
    *mut i16,
) -> SqlReturn;

struct Symbols {
    alloc_handle: AllocHandleFn,
    free_handle: FreeHandleFn,
    set_env_attr: SetEnvAttrFn,
    connect: ConnectWFn,
    disconnect: DisconnectFn,
    prepare: PrepareWFn,
    num_params: NumParamsFn,
    describe_param: Option<DescribeParamFn>,
    num_result_cols: NumResultColsFn,
    describe_col: DescribeColWFn,
    col_attribute: ColAttributeWFn,
    bind_parameter: BindParameterFn,
    execute: ExecuteFn,
    bind_col: BindColFn,
    fetch: FetchFn,
    free_stmt: FreeStmtFn,
    get_data: GetDataFn,
    end_tran: EndTranFn,
    get_connect_attr: GetConnectAttrWFn,
    set_connect_attr: SetConnectAttrWFn,
    get_info: GetInfoWFn,
    get_type_info: GetTypeInfoWFn,
    get_diag_rec: GetDiagRecWFn,
}

/// Parameter storage registered with the driver. The driver reads the data
/// and indicator pointers at execute time, so both live here until the
/// parameter is rebound or the statement is freed.
struct ParamStorage {
    data: Box<[u8]>,
    indicator: Box<SqlLen>,
}

/// A loaded client library implementing [`CliApi`].
pub struct OdbcLibrary {
    _library: Library,
    symbols: Symbols,
    params: Mutex<HashMap<(usize, u16), ParamStorage>>,
}

fn load_error(message: String) -> DbError {
    DbError::Native(NativeError::recorded("open", "dlopen", 0, message))
}

macro_rules! symbol {
    ($library:expr, $name:expr, $ty:ty) => {
        match unsafe { $library.get::<$ty>($name) } {
            Ok(symbol) => *symbol,
            Err(err) => {
                return Err(load_error(format!(
                    "required symbol {} missing: {err}",
                    String::from_utf8_lossy(&$name[..$name.len() - 1])
                )))
            }
        }
    };
}

impl OdbcLibrary {
    /// Load the client library named by the environment, or the first
    /// loadable name from the default list.
    pub fn load_default() -> Result<OdbcLibrary, DbError> {
        let mut tried = Vec::new();
        let candidates: Vec<String> = match std::env::var(LIBRARY_ENV_VAR) {
            Ok(name) if !name.is_empty() => vec![name],
            _ => DEFAULT_LIBRARIES.iter().map(|s| s.to_string()).collect(),
        };
        for name in &candidates {
            match unsafe { Library::new(name) } {
                Ok(library) => {
                    tracing::debug!(library = %name, "loaded client library");
                    return OdbcLibrary::from_library(library);
                }
                Err(err) => tried.push(format!("{name}: {err}")),
            }
        }
        Err(load_error(format!(
            "no client library could be loaded ({})",
            tried.join("; ")
        )))
    }

    /// Resolve the call surface from an already loaded library.
    pub fn from_library(library: Library) -> Result<OdbcLibrary, DbError> {
        let symbols = Symbols {
            alloc_handle: symbol!(library, b"SQLAllocHandle\0", AllocHandleFn),
            free_handle: symbol!(library, b"SQLFreeHandle\0", FreeHandleFn),
            set_env_attr: symbol!(library, b"SQLSetEnvAttr\0", SetEnvAttrFn),
            connect: symbol!(library, b"SQLConnectW\0", ConnectWFn),
            disconnect: symbol!(library, b"SQLDisconnect\0", DisconnectFn),
            prepare: symbol!(library, b"SQLPrepareW\0", PrepareWFn),
            num_params: symbol!(library, b"SQLNumParams\0", NumParamsFn),
            describe_param: unsafe { library.get::<DescribeParamFn>(b"SQLDescribeParam\0") }
                .ok()
                .map(|s| *s),
            num_result_cols: symbol!(library, b"SQLNumResultCols\0", NumResultColsFn),
            describe_col: symbol!(library, b"SQLDescribeColW\0", DescribeColWFn),
            col_attribute: symbol!(library, b"SQLColAttributeW\0", ColAttributeWFn),
            bind_parameter: symbol!(library, b"SQLBindParameter\0", BindParameterFn),
            execute: symbol!(library, b"SQLExecute\0", ExecuteFn),
            bind_col: symbol!(library, b"SQLBindCol\0", BindColFn),
            fetch: symbol!(library, b"SQLFetch\0", FetchFn),
            free_stmt: symbol!(library, b"SQLFreeStmt\0", FreeStmtFn),
            get_data: symbol!(library, b"SQLGetData\0", GetDataFn),
            end_tran: symbol!(library, b"SQLEndTran\0", EndTranFn),
            get_connect_attr: symbol!(library, b"SQLGetConnectAttrW\0", GetConnectAttrWFn),
            set_connect_attr: symbol!(library, b"SQLSetConnectAttrW\0", SetConnectAttrWFn),
            get_info: symbol!(library, b"SQLGetInfoW\0", GetInfoWFn),
            get_type_info: symbol!(library, b"SQLGetTypeInfoW\0", GetTypeInfoWFn),
            get_diag_rec: symbol!(library, b"SQLGetDiagRecW\0", GetDiagRecWFn),
        };
        Ok(OdbcLibrary {
            _library: library,
            symbols,
            params: Mutex::new(HashMap::new()),
        })
    }

    fn succeeded(code: SqlReturn) -> bool {
        code == sys::SQL_SUCCESS || code == sys::SQL_SUCCESS_WITH_INFO
    }

    /// Collect the first diagnostic record for a handle.
    fn diagnostics(&self, handle_type: i16, handle: Handle) -> (i32, String) {
        let mut state = [0u16; 6];
        let mut message = [0u16; 1024];
        let mut native_error: i32 = 0;
        let mut length: i16 = 0;
        let code = unsafe {
            (self.symbols.get_diag_rec)(
                handle_type,
                handle,
                1,
                state.as_mut_ptr(),
                &mut native_error,
                message.as_mut_ptr(),
                message.len() as i16,
                &mut length,
            )
        };
        if !Self::succeeded(code) {
            return (0, format!("no diagnostic available (code {code})"));
        }
        let text_len = (length.max(0) as usize).min(message.len());
        let text = U16String::from_vec(message[..text_len].to_vec()).to_string_lossy();
        let state_len = state.iter().position(|&c| c == 0).unwrap_or(5);
        let state = U16String::from_vec(state[..state_len].to_vec()).to_string_lossy();
        (native_error, format!("{text}\nSQLState: {state}"))
    }

    fn check(
        &self,
        code: SqlReturn,
        native_function: &'static str,
        handle_type: i16,
        handle: Handle,
    ) -> CliResult<()> {
        if Self::succeeded(code) {
            Ok(())
        } else {
            let (native_error, message) = self.diagnostics(handle_type, handle);
            Err(CliFailure::new(native_function, native_error, message))
        }
    }

    fn indicator_from(len: SqlLen) -> Indicator {
        match len {
            sys::SQL_NULL_DATA => Indicator::Null,
            sys::SQL_NO_TOTAL => Indicator::NoTotal,
            len if len >= 0 => Indicator::Len(len as usize),
            other => Indicator::Invalid(other as i64),
        }
    }
}

impl CliApi for OdbcLibrary {
    fn alloc_env(&self) -> CliResult<EnvHandle> {
        let mut handle: Handle = std::ptr::null_mut();
        let code = unsafe {
            (self.symbols.alloc_handle)(sys::SQL_HANDLE_ENV, std::ptr::null_mut(), &mut handle)
        };
        if !Self::succeeded(code) {
            return Err(CliFailure::new(
                "SQLAllocHandle",
                0,
                "environment allocation failed",
            ));
        }
        let code = unsafe {
            (self.symbols.set_env_attr)(
                handle,
                sys::SQL_ATTR_ODBC_VERSION,
                sys::SQL_OV_ODBC3 as *mut c_void,
                0,
            )
        };
        if let Err(failure) = self.check(code, "SQLSetEnvAttr", sys::SQL_HANDLE_ENV, handle) {
            unsafe {
                (self.symbols.free_handle)(sys::SQL_HANDLE_ENV, handle);
            }
            return Err(failure);
        }
        Ok(EnvHandle(handle as usize))
    }

    fn free_env(&self, env: EnvHandle) {
        unsafe {
            (self.symbols.free_handle)(sys::SQL_HANDLE_ENV, env.0 as Handle);
        }
    }

    fn alloc_connection(&self, env: EnvHandle) -> CliResult<DbcHandle> {
        let mut handle: Handle = std::ptr::null_mut();
        let code = unsafe {
            (self.symbols.alloc_handle)(sys::SQL_HANDLE_DBC, env.0 as Handle, &mut handle)
        };
        self.check(code, "SQLAllocHandle", sys::SQL_HANDLE_ENV, env.0 as Handle)?;
        Ok(DbcHandle(handle as usize))
    }

    fn free_connection(&self, dbc: DbcHandle) {
        unsafe {
            (self.symbols.free_handle)(sys::SQL_HANDLE_DBC, dbc.0 as Handle);
        }
    }

    fn connect(&self, dbc: DbcHandle, dsn: &str, user: &str, password: &str) -> CliResult<()> {
        let dsn = U16String::from_str(dsn);
        let user = U16String::from_str(user);
        let password = U16String::from_str(password);
        let code = unsafe {
            (self.symbols.connect)(
                dbc.0 as Handle,
                dsn.as_ptr(),
                dsn.len() as i16,
                user.as_ptr(),
                user.len() as i16,
                password.as_ptr(),
                password.len() as i16,
            )
        };
        self.check(code, "SQLConnectW", sys::SQL_HANDLE_DBC, dbc.0 as Handle)
    }

    fn disconnect(&self, dbc: DbcHandle) -> CliResult<()> {
        let code = unsafe { (self.symbols.disconnect)(dbc.0 as Handle) };
        self.check(code, "SQLDisconnect", sys::SQL_HANDLE_DBC, dbc.0 as Handle)
    }

    fn alloc_statement(&self, dbc: DbcHandle) -> CliResult<StmtHandle> {
        let mut handle: Handle = std::ptr::null_mut();
        let code = unsafe {
            (self.symbols.alloc_handle)(sys::SQL_HANDLE_STMT, dbc.0 as Handle, &mut handle)
        };
        self.check(code, "SQLAllocHandle", sys::SQL_HANDLE_DBC, dbc.0 as Handle)?;
        Ok(StmtHandle(handle as usize))
    }

    fn free_statement(&self, stmt: StmtHandle) {
        self.params
            .lock()
            .expect("parameter storage lock")
            .retain(|(handle, _), _| *handle != stmt.0);
        unsafe {
            (self.symbols.free_handle)(sys::SQL_HANDLE_STMT, stmt.0 as Handle);
        }
    }

    fn close_cursor(&self, stmt: StmtHandle) -> CliResult<()> {
        let code = unsafe { (self.symbols.free_stmt)(stmt.0 as Handle, sys::SQL_CLOSE) };
        self.check(code, "SQLFreeStmt", sys::SQL_HANDLE_STMT, stmt.0 as Handle)
    }

    fn prepare(&self, stmt: StmtHandle, statement_text: &str) -> CliResult<()> {
        let text = U16String::from_str(statement_text);
        let code = unsafe {
            (self.symbols.prepare)(stmt.0 as Handle, text.as_ptr(), text.len() as i32)
        };
        self.check(code, "SQLPrepareW", sys::SQL_HANDLE_STMT, stmt.0 as Handle)
    }

    fn num_params(&self, stmt: StmtHandle) -> CliResult<i16> {
        let mut count: i16 = 0;
        let code = unsafe { (self.symbols.num_params)(stmt.0 as Handle, &mut count) };
        self.check(code, "SQLNumParams", sys::SQL_HANDLE_STMT, stmt.0 as Handle)?;
        Ok(count)
    }

    fn describe_param(&self, stmt: StmtHandle, number: u16) -> CliResult<Option<ParamDescription>> {
        let Some(describe) = self.symbols.describe_param else {
            return Ok(None);
        };
        let mut data_type: i16 = 0;
        let mut size: SqlULen = 0;
        let mut decimal_digits: i16 = 0;
        let mut nullable: i16 = 0;
        let code = unsafe {
            describe(
                stmt.0 as Handle,
                number,
                &mut data_type,
                &mut size,
                &mut decimal_digits,
                &mut nullable,
            )
        };
        if !Self::succeeded(code) {
            // Several drivers implement the symbol but fail the call; the
            // engine falls back to generic defaults either way.
            return Ok(None);
        }
        Ok(Some(ParamDescription {
            data_type,
            size,
            decimal_digits,
            nullable: nullable != 0,
        }))
    }

    fn num_result_cols(&self, stmt: StmtHandle) -> CliResult<i16> {
        let mut count: i16 = 0;
        let code = unsafe { (self.symbols.num_result_cols)(stmt.0 as Handle, &mut count) };
        self.check(
            code,
            "SQLNumResultCols",
            sys::SQL_HANDLE_STMT,
            stmt.0 as Handle,
        )?;
        Ok(count)
    }

    fn describe_col(&self, stmt: StmtHandle, number: u16) -> CliResult<ColDescription> {
        let mut name = [0u16; 256];
        let mut name_length: i16 = 0;
        let mut data_type: i16 = 0;
        let mut size: SqlULen = 0;
        let mut decimal_digits: i16 = 0;
        let mut nullable: i16 = 0;
        let code = unsafe {
            (self.symbols.describe_col)(
                stmt.0 as Handle,
                number,
                name.as_mut_ptr(),
                name.len() as i16,
                &mut name_length,
                &mut data_type,
                &mut size,
                &mut decimal_digits,
                &mut nullable,
            )
        };
        self.check(
            code,
            "SQLDescribeColW",
            sys::SQL_HANDLE_STMT,
            stmt.0 as Handle,
        )?;
        let name_len = (name_length.max(0) as usize).min(name.len());
        Ok(ColDescription {
            name: U16String::from_vec(name[..name_len].to_vec()).to_string_lossy(),
            data_type,
            size,
            decimal_digits,
            nullable: nullable != 0,
        })
    }

    fn column_name(&self, stmt: StmtHandle, number: u16) -> CliResult<String> {
        let mut name = [0u16; 256];
        let mut length: i16 = 0;
        let code = unsafe {
            (self.symbols.col_attribute)(
                stmt.0 as Handle,
                number,
                sys::SQL_DESC_NAME,
                name.as_mut_ptr() as *mut c_void,
                (name.len() * 2) as i16,
                &mut length,
                std::ptr::null_mut(),
            )
        };
        self.check(
            code,
            "SQLColAttributeW",
            sys::SQL_HANDLE_STMT,
            stmt.0 as Handle,
        )?;
        let chars = (length.max(0) as usize / 2).min(name.len());
        Ok(U16String::from_vec(name[..chars].to_vec()).to_string_lossy())
    }

    fn bind_parameter(
        &self,
        stmt: StmtHandle,
        number: u16,
        c_type: CType,
        sql_type: i16,
        column_size: usize,
        decimal_digits: i16,
        data: Option<&[u8]>,
    ) -> CliResult<()> {
        let mut storage = ParamStorage {
            data: data.unwrap_or(&[]).to_vec().into_boxed_slice(),
            indicator: Box::new(match data {
                Some(bytes) => bytes.len() as SqlLen,
                None => sys::SQL_NULL_DATA,
            }),
        };
        let data_ptr = if storage.data.is_empty() {
            std::ptr::null_mut()
        } else {
            storage.data.as_mut_ptr() as *mut c_void
        };
        let data_len = storage.data.len() as SqlLen;
        let indicator_ptr: *mut SqlLen = &mut *storage.indicator;
        // The driver dereferences both pointers at execute time, so the
        // storage is kept until rebind or statement free.
        self.params
            .lock()
            .expect("parameter storage lock")
            .insert((stmt.0, number), storage);
        let code = unsafe {
            (self.symbols.bind_parameter)(
                stmt.0 as Handle,
                number,
                sys::SQL_PARAM_INPUT,
                c_type.code(),
                sql_type,
                column_size,
                decimal_digits,
                data_ptr,
                data_len,
                indicator_ptr,
            )
        };
        self.check(
            code,
            "SQLBindParameter",
            sys::SQL_HANDLE_STMT,
            stmt.0 as Handle,
        )
    }

    fn execute(&self, stmt: StmtHandle) -> CliResult<()> {
        let code = unsafe { (self.symbols.execute)(stmt.0 as Handle) };
        if code == sys::SQL_NO_DATA {
            return Ok(());
        }
        self.check(code, "SQLExecute", sys::SQL_HANDLE_STMT, stmt.0 as Handle)
    }

    fn fetch(&self, stmt: StmtHandle, targets: &mut [FetchTarget<'_>]) -> CliResult<bool> {
        let mut indicators: Vec<SqlLen> = vec![0; targets.len()];
        let outcome = (|| {
            for (target, indicator) in targets.iter_mut().zip(indicators.iter_mut()) {
                let code = unsafe {
                    (self.symbols.bind_col)(
                        stmt.0 as Handle,
                        target.column,
                        target.c_type.code(),
                        target.buffer.as_mut_ptr() as *mut c_void,
                        target.buffer.len() as SqlLen,
                        indicator,
                    )
                };
                self.check(code, "SQLBindCol", sys::SQL_HANDLE_STMT, stmt.0 as Handle)?;
            }
            let code = unsafe { (self.symbols.fetch)(stmt.0 as Handle) };
            if code == sys::SQL_NO_DATA {
                Ok(false)
            } else {
                self.check(code, "SQLFetch", sys::SQL_HANDLE_STMT, stmt.0 as Handle)
                    .map(|_| true)
            }
        })();
        // The targets borrow buffers owned by the caller; nothing may stay
        // registered past this call.
        unsafe {
            (self.symbols.free_stmt)(stmt.0 as Handle, sys::SQL_UNBIND);
        }
        let row_available = outcome?;
        if row_available {
            for (target, indicator) in targets.iter_mut().zip(indicators.iter()) {
                *target.indicator = Self::indicator_from(*indicator);
            }
        }
        Ok(row_available)
    }

    fn get_data(
        &self,
        stmt: StmtHandle,
        column: u16,
        c_type: CType,
        buffer: &mut [u8],
    ) -> CliResult<Indicator> {
        let mut probe_byte: u8 = 0;
        let (pointer, length) = if buffer.is_empty() {
            (&mut probe_byte as *mut u8 as *mut c_void, 0)
        } else {
            (buffer.as_mut_ptr() as *mut c_void, buffer.len() as SqlLen)
        };
        let mut indicator: SqlLen = 0;
        let code = unsafe {
            (self.symbols.get_data)(
                stmt.0 as Handle,
                column,
                c_type.code(),
                pointer,
                length,
                &mut indicator,
            )
        };
        self.check(code, "SQLGetData", sys::SQL_HANDLE_STMT, stmt.0 as Handle)?;
        Ok(Self::indicator_from(indicator))
    }

    fn end_transaction(&self, dbc: DbcHandle, commit: bool) -> CliResult<()> {
        let completion = if commit {
            sys::SQL_COMMIT
        } else {
            sys::SQL_ROLLBACK
        };
        let code = unsafe {
            (self.symbols.end_tran)(sys::SQL_HANDLE_DBC, dbc.0 as Handle, completion)
        };
        self.check(code, "SQLEndTran", sys::SQL_HANDLE_DBC, dbc.0 as Handle)
    }

    fn auto_commit(&self, dbc: DbcHandle) -> CliResult<bool> {
        let mut state: u32 = 0;
        let code = unsafe {
            (self.symbols.get_connect_attr)(
                dbc.0 as Handle,
                sys::SQL_ATTR_AUTOCOMMIT,
                &mut state as *mut u32 as *mut c_void,
                0,
                std::ptr::null_mut(),
            )
        };
        self.check(
            code,
            "SQLGetConnectAttrW",
            sys::SQL_HANDLE_DBC,
            dbc.0 as Handle,
        )?;
        Ok(state as usize == sys::SQL_AUTOCOMMIT_ON)
    }

    fn set_auto_commit(&self, dbc: DbcHandle, on: bool) -> CliResult<()> {
        let state = if on {
            sys::SQL_AUTOCOMMIT_ON
        } else {
            sys::SQL_AUTOCOMMIT_OFF
        };
        let code = unsafe {
            (self.symbols.set_connect_attr)(
                dbc.0 as Handle,
                sys::SQL_ATTR_AUTOCOMMIT,
                state as *mut c_void,
                0,
            )
        };
        self.check(
            code,
            "SQLSetConnectAttrW",
            sys::SQL_HANDLE_DBC,
            dbc.0 as Handle,
        )
    }

    fn max_concurrent_statements(&self, dbc: DbcHandle) -> CliResult<u16> {
        let mut value: u16 = 0;
        let code = unsafe {
            (self.symbols.get_info)(
                dbc.0 as Handle,
                sys::SQL_MAX_CONCURRENT_ACTIVITIES,
                &mut value as *mut u16 as *mut c_void,
                std::mem::size_of::<u16>() as i16,
                std::ptr::null_mut(),
            )
        };
        self.check(code, "SQLGetInfoW", sys::SQL_HANDLE_DBC, dbc.0 as Handle)?;
        Ok(value)
    }

    fn has_data_type(&self, dbc: DbcHandle, sql_type: i16) -> CliResult<bool> {
        let stmt = self.alloc_statement(dbc)?;
        let code = unsafe { (self.symbols.get_type_info)(stmt.0 as Handle, sql_type) };
        let mut found = false;
        if Self::succeeded(code) {
            let fetch_code = unsafe { (self.symbols.fetch)(stmt.0 as Handle) };
            found = fetch_code == sys::SQL_SUCCESS;
        }
        self.free_statement(stmt);
        Ok(found)
    }

    fn data_type_is_unsigned(&self, dbc: DbcHandle, sql_type: i16) -> CliResult<Option<bool>> {
        let stmt = self.alloc_statement(dbc)?;
        let result = (|| {
            let code = unsafe { (self.symbols.get_type_info)(stmt.0 as Handle, sql_type) };
            self.check(
                code,
                "SQLGetTypeInfoW",
                sys::SQL_HANDLE_STMT,
                stmt.0 as Handle,
            )?;
            let mut unsigned_attribute: i16 = 0;
            let mut indicator: SqlLen = 0;
            // Column 10 of the type-info result set is UNSIGNED_ATTRIBUTE.
            let code = unsafe {
                (self.symbols.bind_col)(
                    stmt.0 as Handle,
                    10,
                    sys::SQL_C_SSHORT,
                    &mut unsigned_attribute as *mut i16 as *mut c_void,
                    std::mem::size_of::<i16>() as SqlLen,
                    &mut indicator,
                )
            };
            self.check(code, "SQLBindCol", sys::SQL_HANDLE_STMT, stmt.0 as Handle)?;
            let fetch_code = unsafe { (self.symbols.fetch)(stmt.0 as Handle) };
            let outcome = if fetch_code == sys::SQL_NO_DATA {
                // The data source does not use this type; callers assume
                // the signed interpretation.
                Ok(None)
            } else {
                self.check(fetch_code, "SQLFetch", sys::SQL_HANDLE_STMT, stmt.0 as Handle)?;
                if indicator == sys::SQL_NULL_DATA {
                    Ok(None)
                } else {
                    Ok(Some(unsigned_attribute != 0))
                }
            };
            unsafe {
                (self.symbols.free_stmt)(stmt.0 as Handle, sys::SQL_UNBIND);
            }
            outcome
        })();
        self.free_statement(stmt);
        result
    }
}
