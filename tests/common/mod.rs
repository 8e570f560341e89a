//! Common test utilities: a scripted in-memory implementation of the native
//! call surface.
//!
//! `FakeCli` stands in for a driver-manager client library. Tests script
//! the parameter/column descriptions and the raw cell bytes of each row,
//! then assert on the engine's behavior and on the exact native calls it
//! issued (the call log records binds, fetches and get-data retrievals).
//!
//! No real database or client library is required anywhere in this suite.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use unidbc::odbc::api::{
    CliApi, CliFailure, CliResult, ColDescription, DbcHandle, EnvHandle, FetchTarget, Indicator,
    ParamDescription, StmtHandle,
};
use unidbc::odbc::sys::CType;

/// One scripted result column.
#[derive(Clone)]
pub struct FakeColumn {
    pub name: String,
    pub data_type: i16,
    pub size: usize,
    pub decimal_digits: i16,
    pub nullable: bool,
}

impl FakeColumn {
    pub fn new(name: &str, data_type: i16, size: usize) -> FakeColumn {
        FakeColumn {
            name: name.to_string(),
            data_type,
            size,
            decimal_digits: 0,
            nullable: true,
        }
    }

    pub fn digits(mut self, decimal_digits: i16) -> FakeColumn {
        self.decimal_digits = decimal_digits;
        self
    }
}

/// A scripted cell: raw native bytes, or NULL.
pub type FakeCell = Option<Vec<u8>>;

/// The data source script: what the fake driver describes and returns.
#[derive(Clone, Default)]
pub struct FakeScript {
    pub params: Vec<ParamDescription>,
    /// `false` simulates a driver without parameter description support.
    pub describe_params: bool,
    pub columns: Vec<FakeColumn>,
    pub rows: Vec<Vec<FakeCell>>,
    pub max_concurrent_statements: u16,
    pub wide_chars: bool,
    pub tinyint_unsigned: bool,
    /// Execute failure to inject, if any.
    pub fail_execute: Option<(i32, String)>,
}

impl FakeScript {
    pub fn with_param(mut self, data_type: i16, size: usize, decimal_digits: i16) -> FakeScript {
        self.describe_params = true;
        self.params.push(ParamDescription {
            data_type,
            size,
            decimal_digits,
            nullable: true,
        });
        self
    }

    pub fn with_column(mut self, column: FakeColumn) -> FakeScript {
        self.columns.push(column);
        self
    }

    pub fn with_row(mut self, row: Vec<FakeCell>) -> FakeScript {
        self.rows.push(row);
        self
    }
}

/// One recorded bind: enough to assert on the negotiated encoding.
#[derive(Clone, Debug)]
pub struct BoundParam {
    pub c_type_code: i16,
    pub sql_type: i16,
    pub data: Option<Vec<u8>>,
}

#[derive(Default)]
struct FakeState {
    /// Cursor position per statement handle; the stored value is the number
    /// of rows already delivered.
    cursor: HashMap<usize, usize>,
    /// Next column allowed for get-data, per statement (ascending order).
    get_data_floor: HashMap<usize, u16>,
    open_statements: usize,
}

/// The scripted native call surface.
pub struct FakeCli {
    script: FakeScript,
    state: Mutex<FakeState>,
    next_handle: AtomicUsize,
    /// Chronological log of the interesting native calls.
    pub calls: Mutex<Vec<String>>,
    /// Last registered value per parameter number.
    pub bound_params: Mutex<HashMap<u16, BoundParam>>,
}

impl FakeCli {
    pub fn new(script: FakeScript) -> FakeCli {
        FakeCli {
            script,
            state: Mutex::new(FakeState::default()),
            next_handle: AtomicUsize::new(1),
            calls: Mutex::new(Vec::new()),
            bound_params: Mutex::new(HashMap::new()),
        }
    }

    fn handle(&self) -> usize {
        self.next_handle.fetch_add(1, Ordering::SeqCst)
    }

    fn log(&self, entry: String) {
        self.calls.lock().unwrap().push(entry);
    }

    pub fn log_snapshot(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.starts_with(prefix))
            .count()
    }

    pub fn bound_param(&self, number: u16) -> BoundParam {
        self.bound_params
            .lock()
            .unwrap()
            .get(&number)
            .expect("parameter was bound")
            .clone()
    }

    fn cell(&self, row: usize, column: u16) -> FakeCell {
        self.script.rows[row][(column - 1) as usize].clone()
    }
}

impl CliApi for FakeCli {
    fn alloc_env(&self) -> CliResult<EnvHandle> {
        Ok(EnvHandle(self.handle()))
    }

    fn free_env(&self, _env: EnvHandle) {}

    fn alloc_connection(&self, _env: EnvHandle) -> CliResult<DbcHandle> {
        Ok(DbcHandle(self.handle()))
    }

    fn free_connection(&self, _dbc: DbcHandle) {}

    fn connect(&self, _dbc: DbcHandle, dsn: &str, _user: &str, _password: &str) -> CliResult<()> {
        self.log(format!("connect {dsn}"));
        Ok(())
    }

    fn disconnect(&self, _dbc: DbcHandle) -> CliResult<()> {
        self.log("disconnect".to_string());
        Ok(())
    }

    fn alloc_statement(&self, _dbc: DbcHandle) -> CliResult<StmtHandle> {
        let mut state = self.state.lock().unwrap();
        state.open_statements += 1;
        Ok(StmtHandle(self.handle()))
    }

    fn free_statement(&self, stmt: StmtHandle) {
        let mut state = self.state.lock().unwrap();
        state.open_statements = state.open_statements.saturating_sub(1);
        state.cursor.remove(&stmt.0);
        state.get_data_floor.remove(&stmt.0);
        self.log("free_statement".to_string());
    }

    fn close_cursor(&self, stmt: StmtHandle) -> CliResult<()> {
        let mut state = self.state.lock().unwrap();
        state.cursor.remove(&stmt.0);
        state.get_data_floor.remove(&stmt.0);
        self.log("close_cursor".to_string());
        Ok(())
    }

    fn prepare(&self, _stmt: StmtHandle, statement_text: &str) -> CliResult<()> {
        self.log(format!("prepare {statement_text}"));
        Ok(())
    }

    fn num_params(&self, _stmt: StmtHandle) -> CliResult<i16> {
        Ok(self.script.params.len() as i16)
    }

    fn describe_param(
        &self,
        _stmt: StmtHandle,
        number: u16,
    ) -> CliResult<Option<ParamDescription>> {
        if !self.script.describe_params {
            return Ok(None);
        }
        Ok(self.script.params.get((number - 1) as usize).copied())
    }

    fn num_result_cols(&self, _stmt: StmtHandle) -> CliResult<i16> {
        Ok(self.script.columns.len() as i16)
    }

    fn describe_col(&self, _stmt: StmtHandle, number: u16) -> CliResult<ColDescription> {
        let column = &self.script.columns[(number - 1) as usize];
        Ok(ColDescription {
            name: column.name.clone(),
            data_type: column.data_type,
            size: column.size,
            decimal_digits: column.decimal_digits,
            nullable: column.nullable,
        })
    }

    fn column_name(&self, _stmt: StmtHandle, number: u16) -> CliResult<String> {
        Ok(self.script.columns[(number - 1) as usize].name.clone())
    }

    fn bind_parameter(
        &self,
        _stmt: StmtHandle,
        number: u16,
        c_type: CType,
        sql_type: i16,
        _column_size: usize,
        _decimal_digits: i16,
        data: Option<&[u8]>,
    ) -> CliResult<()> {
        self.log(format!("bind_parameter {number}"));
        self.bound_params.lock().unwrap().insert(
            number,
            BoundParam {
                c_type_code: c_type.code(),
                sql_type,
                data: data.map(|bytes| bytes.to_vec()),
            },
        );
        Ok(())
    }

    fn execute(&self, stmt: StmtHandle) -> CliResult<()> {
        self.log("execute".to_string());
        if let Some((code, message)) = &self.script.fail_execute {
            return Err(CliFailure::new("SQLExecute", *code, message.clone()));
        }
        let mut state = self.state.lock().unwrap();
        state.cursor.insert(stmt.0, 0);
        state.get_data_floor.insert(stmt.0, 0);
        Ok(())
    }

    fn fetch(&self, stmt: StmtHandle, targets: &mut [FetchTarget<'_>]) -> CliResult<bool> {
        let row = {
            let mut state = self.state.lock().unwrap();
            let position = state.cursor.entry(stmt.0).or_insert(0);
            if *position >= self.script.rows.len() {
                self.log(format!("fetch cols={} -> no_data", targets.len()));
                return Ok(false);
            }
            let row = *position;
            *position += 1;
            state.get_data_floor.insert(stmt.0, 0);
            row
        };
        self.log(format!("fetch cols={}", targets.len()));
        for target in targets.iter_mut() {
            match self.cell(row, target.column) {
                None => *target.indicator = Indicator::Null,
                Some(bytes) => {
                    let copied = bytes.len().min(target.buffer.len());
                    target.buffer[..copied].copy_from_slice(&bytes[..copied]);
                    *target.indicator = Indicator::Len(bytes.len());
                }
            }
        }
        Ok(true)
    }

    fn get_data(
        &self,
        stmt: StmtHandle,
        column: u16,
        _c_type: CType,
        buffer: &mut [u8],
    ) -> CliResult<Indicator> {
        let row = {
            let mut state = self.state.lock().unwrap();
            let Some(position) = state.cursor.get(&stmt.0).copied() else {
                return Err(CliFailure::new("SQLGetData", 0, "no cursor"));
            };
            if position == 0 {
                return Err(CliFailure::new("SQLGetData", 0, "no fetched row"));
            }
            // The native layer only supports ascending retrieval.
            let floor = state.get_data_floor.entry(stmt.0).or_insert(0);
            if column < *floor {
                return Err(CliFailure::new(
                    "SQLGetData",
                    0,
                    format!("column {column} below the retrieval floor {floor}"),
                ));
            }
            *floor = column;
            position - 1
        };
        self.log(format!("get_data col={} len={}", column, buffer.len()));
        match self.cell(row, column) {
            None => Ok(Indicator::Null),
            Some(bytes) => {
                if buffer.is_empty() {
                    // Size probe: report the total without transferring.
                    Ok(Indicator::Len(bytes.len()))
                } else {
                    let copied = bytes.len().min(buffer.len());
                    buffer[..copied].copy_from_slice(&bytes[..copied]);
                    Ok(Indicator::Len(copied))
                }
            }
        }
    }

    fn end_transaction(&self, _dbc: DbcHandle, commit: bool) -> CliResult<()> {
        self.log(format!(
            "end_transaction {}",
            if commit { "commit" } else { "rollback" }
        ));
        Ok(())
    }

    fn auto_commit(&self, _dbc: DbcHandle) -> CliResult<bool> {
        Ok(true)
    }

    fn set_auto_commit(&self, _dbc: DbcHandle, on: bool) -> CliResult<()> {
        self.log(format!("set_auto_commit {on}"));
        Ok(())
    }

    fn max_concurrent_statements(&self, _dbc: DbcHandle) -> CliResult<u16> {
        Ok(self.script.max_concurrent_statements)
    }

    fn has_data_type(&self, _dbc: DbcHandle, _sql_type: i16) -> CliResult<bool> {
        Ok(self.script.wide_chars)
    }

    fn data_type_is_unsigned(&self, _dbc: DbcHandle, _sql_type: i16) -> CliResult<Option<bool>> {
        Ok(Some(self.script.tinyint_unsigned))
    }
}

// Cell constructors for scripted rows

pub fn cell_null() -> FakeCell {
    None
}

pub fn cell_i16(value: i16) -> FakeCell {
    Some(value.to_ne_bytes().to_vec())
}

pub fn cell_i32(value: i32) -> FakeCell {
    Some(value.to_ne_bytes().to_vec())
}

pub fn cell_i64(value: i64) -> FakeCell {
    Some(value.to_ne_bytes().to_vec())
}

pub fn cell_f64(value: f64) -> FakeCell {
    Some(value.to_ne_bytes().to_vec())
}

pub fn cell_text(value: &str) -> FakeCell {
    Some(value.as_bytes().to_vec())
}

pub fn cell_wide_text(value: &str) -> FakeCell {
    Some(
        value
            .encode_utf16()
            .flat_map(|unit| unit.to_ne_bytes())
            .collect(),
    )
}

pub fn cell_bytes(value: &[u8]) -> FakeCell {
    Some(value.to_vec())
}
