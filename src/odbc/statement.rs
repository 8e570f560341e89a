//! The generic marshaling engine: statement preparation, type negotiation
//! and parameter binding.
//!
//! A statement moves through prepare → bind → execute → fetch. Preparation
//! discovers and describes parameters and result columns, negotiates a
//! client buffer type per column, and allocates every bound buffer once;
//! result and parameter counts never change afterwards. Binding after a
//! successful execute first rewinds the cursor, forcing a fresh execute.
//! The fetch half of the engine lives in `fetch.rs`.

use std::collections::VecDeque;
use std::sync::Arc;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::ToPrimitive;

use super::api::{Indicator, ParamDescription, StmtHandle};
use super::connection::{native_err, ConnCore, DriverConfig, NumericEncoding};
use super::sys::{CType, SqlDataType};
use crate::codec::datetime::{self, SqlDate, SqlTime, SqlTimestamp};
use crate::codec::decimal::{self, SqlNumeric, DEFAULT_DECIMAL_SCALE};
use crate::codec::interval;
use crate::driver::{Capabilities, DriverStatement};
use crate::error::{DbError, InternalError, MisuseError, ResourceError};
use crate::preprocess;
use crate::value::{Duration, Timestamp};

/// Upper bound on any single negotiated column buffer.
pub(super) const MAX_COLUMN_BUFFER: usize = 1 << 28;

/// Text buffers for numerics transported as decimal strings are clamped
/// into this precision window, plus room for sign, point and terminator.
const MIN_NUMERIC_TEXT_PRECISION: usize = 100;
const MAX_NUMERIC_TEXT_PRECISION: usize = 1000;

/// One input parameter slot.
pub(super) struct ParamSlot {
    pub(super) data_type: SqlDataType,
    pub(super) size: usize,
    pub(super) decimal_digits: i16,
    pub(super) c_type: CType,
    pub(super) buffer: Vec<u8>,
    pub(super) null: bool,
    pub(super) bound: bool,
}

/// One negotiated result column. The described size, digits and
/// nullability are kept alongside the negotiated buffer shape; not every
/// accessor needs all of them.
#[allow(dead_code)]
pub(super) struct ColumnDescr {
    pub(super) data_type: SqlDataType,
    pub(super) size: usize,
    pub(super) decimal_digits: i16,
    pub(super) nullable: bool,
    pub(super) c_type: CType,
    pub(super) buffer_length: usize,
    pub(super) via_get_data: bool,
}

/// One column's slice of a fetched row.
#[derive(Clone)]
pub(super) struct ColumnData {
    pub(super) buffer: Vec<u8>,
    pub(super) indicator: Indicator,
}

/// A prepared statement on the driver-manager back-end.
pub struct OdbcStatement {
    pub(super) core: Arc<ConnCore>,
    pub(super) capabilities: Capabilities,
    pub(super) config: DriverConfig,
    pub(super) stmt: StmtHandle,
    pub(super) params: Vec<ParamSlot>,
    pub(super) columns: Vec<ColumnDescr>,
    /// Buffers the driver fills on each cursor advance. Large-object
    /// columns and everything after the first of them stay unbound.
    pub(super) bound_row: Vec<ColumnData>,
    /// Number of leading columns transferred via the bound protocol.
    pub(super) bind_limit: usize,
    pub(super) prefetched: Option<VecDeque<Vec<ColumnData>>>,
    pub(super) current: Option<Vec<ColumnData>>,
    pub(super) execute_successful: bool,
    pub(super) fetch_okay: bool,
    pub(super) fetch_finished: bool,
}

fn describe_fallback() -> ParamDescription {
    // Reasonable defaults when the driver cannot describe parameters,
    // matching what common driver managers report themselves.
    ParamDescription {
        data_type: super::sys::SQL_VARCHAR,
        size: 255,
        decimal_digits: 0,
        nullable: true,
    }
}

impl OdbcStatement {
    /// Prepare a statement: preprocess the text, open a native statement,
    /// and set up parameter and result descriptions. Any failure releases
    /// all partial native state.
    pub(super) fn prepare(
        core: Arc<ConnCore>,
        capabilities: Capabilities,
        config: DriverConfig,
        statement_text: &str,
    ) -> Result<OdbcStatement, DbError> {
        let dbc = core.dbc()?;
        let processed = preprocess::process_statement(statement_text);
        if processed.chars().count() > i32::MAX as usize {
            return Err(DbError::Misuse(MisuseError::StatementTooLong {
                length: processed.chars().count(),
            }));
        }
        let stmt = core
            .api
            .alloc_statement(dbc)
            .map_err(|failure| native_err("prepare", failure))?;
        match Self::setup(&core, capabilities, &config, stmt, &processed) {
            Ok((params, columns)) => {
                let bind_limit = columns
                    .iter()
                    .position(|column| column.via_get_data)
                    .unwrap_or(columns.len());
                let bound_row = columns
                    .iter()
                    .map(|column| ColumnData {
                        buffer: if column.via_get_data {
                            Vec::new()
                        } else {
                            vec![0; column.buffer_length]
                        },
                        indicator: Indicator::Len(0),
                    })
                    .collect();
                Ok(OdbcStatement {
                    core,
                    capabilities,
                    config,
                    stmt,
                    params,
                    columns,
                    bound_row,
                    bind_limit,
                    prefetched: None,
                    current: None,
                    execute_successful: false,
                    fetch_okay: false,
                    fetch_finished: true,
                })
            }
            Err(err) => {
                core.api.free_statement(stmt);
                Err(err)
            }
        }
    }

    fn setup(
        core: &ConnCore,
        capabilities: Capabilities,
        config: &DriverConfig,
        stmt: StmtHandle,
        processed: &str,
    ) -> Result<(Vec<ParamSlot>, Vec<ColumnDescr>), DbError> {
        core.api
            .prepare(stmt, processed)
            .map_err(|failure| native_err("prepare", failure))?;
        let params = Self::setup_parameters(core, stmt)?;
        let columns = Self::setup_result(core, capabilities, config, stmt)?;
        Ok((params, columns))
    }

    fn setup_parameters(core: &ConnCore, stmt: StmtHandle) -> Result<Vec<ParamSlot>, DbError> {
        let count = core
            .api
            .num_params(stmt)
            .map_err(|failure| native_err("prepare", failure))?;
        if count < 0 {
            return Err(DbError::Internal(InternalError::inconsistent(
                "prepare",
                "SQLNumParams",
                format!("negative parameter count {count}"),
            )));
        }
        let mut params = Vec::with_capacity(count as usize);
        for number in 1..=count as u16 {
            let described = core
                .api
                .describe_param(stmt, number)
                .map_err(|failure| native_err("prepare", failure))?
                .unwrap_or_else(describe_fallback);
            let data_type = SqlDataType::from_code(described.data_type)
                // An exotic parameter type still accepts the generic
                // variable-length text transport.
                .unwrap_or(SqlDataType::Varchar);
            let buffer = match data_type {
                SqlDataType::Bit => vec![0; 1],
                SqlDataType::TinyInt => vec![0; 1],
                SqlDataType::SmallInt => vec![0; 2],
                SqlDataType::Integer => vec![0; 4],
                SqlDataType::BigInt => vec![0; 8],
                SqlDataType::Real => vec![0; 4],
                SqlDataType::Float | SqlDataType::Double => vec![0; 8],
                SqlDataType::Date => vec![0; SqlDate::WIRE_LEN],
                SqlDataType::Time => vec![0; SqlTime::WIRE_LEN],
                SqlDataType::DateTime | SqlDataType::Timestamp => {
                    vec![0; SqlTimestamp::WIRE_LEN]
                }
                // Variable-length kinds allocate at bind time.
                _ => Vec::new(),
            };
            params.push(ParamSlot {
                data_type,
                size: described.size,
                decimal_digits: described.decimal_digits,
                c_type: CType::Char,
                buffer,
                null: false,
                bound: false,
            });
        }
        Ok(params)
    }

    fn setup_result(
        core: &ConnCore,
        capabilities: Capabilities,
        config: &DriverConfig,
        stmt: StmtHandle,
    ) -> Result<Vec<ColumnDescr>, DbError> {
        let count = core
            .api
            .num_result_cols(stmt)
            .map_err(|failure| native_err("prepare", failure))?;
        if count < 0 {
            return Err(DbError::Internal(InternalError::inconsistent(
                "prepare",
                "SQLNumResultCols",
                format!("negative column count {count}"),
            )));
        }
        let mut columns = Vec::with_capacity(count as usize);
        for number in 1..=count as u16 {
            let described = core
                .api
                .describe_col(stmt, number)
                .map_err(|failure| native_err("prepare", failure))?;
            columns.push(Self::negotiate_column(
                capabilities,
                config,
                number as usize,
                described.data_type,
                described.size,
                described.decimal_digits,
                described.nullable,
            )?);
        }
        Ok(columns)
    }

    /// Pick the client buffer type and length for one described column.
    fn negotiate_column(
        capabilities: Capabilities,
        config: &DriverConfig,
        column: usize,
        type_code: i16,
        size: usize,
        decimal_digits: i16,
        nullable: bool,
    ) -> Result<ColumnDescr, DbError> {
        use SqlDataType::*;
        let data_type = SqlDataType::from_code(type_code).ok_or(DbError::Misuse(
            MisuseError::UnsupportedNativeType {
                column,
                code: type_code,
            },
        ))?;
        let narrow_or_wide = if capabilities.wide_chars {
            CType::WChar
        } else {
            CType::Char
        };
        let guard = |length: usize| -> Result<usize, DbError> {
            if length > MAX_COLUMN_BUFFER {
                Err(DbError::Resource(ResourceError::ColumnSizeTooLarge {
                    column,
                    size: length as u64,
                }))
            } else {
                Ok(length)
            }
        };
        let char_buffer = size
            .checked_add(1)
            .and_then(|chars| chars.checked_mul(2))
            .unwrap_or(usize::MAX);
        let (c_type, buffer_length, via_get_data) = match data_type {
            Char | Varchar => (narrow_or_wide, guard(char_buffer)?, false),
            WChar | WVarchar => (CType::WChar, guard(char_buffer)?, false),
            Binary | Varbinary => (CType::Binary, guard(size)?, false),
            LongVarchar => (narrow_or_wide, 0, true),
            WLongVarchar => (CType::WChar, 0, true),
            LongVarbinary => (CType::Binary, 0, true),
            Bit => (CType::Bit, 1, false),
            // The tiny integer type can be signed or unsigned depending on
            // the data source; a short buffer is safe either way.
            TinyInt | SmallInt => (CType::SShort, 2, false),
            Integer => (CType::SLong, 4, false),
            SqlDataType::BigInt => (CType::SBigInt, 8, false),
            Real => (CType::Float, 4, false),
            Float | Double => (CType::Double, 8, false),
            Decimal => {
                // Room for point, sign, a stray leading or trailing zero
                // and the driver's terminator.
                (
                    CType::Char,
                    guard(size.checked_add(4).unwrap_or(usize::MAX))?,
                    false,
                )
            }
            Numeric => match config.numeric {
                NumericEncoding::Packed => (CType::Numeric, SqlNumeric::WIRE_LEN, false),
                NumericEncoding::Text => {
                    let clamped = size
                        .max(MIN_NUMERIC_TEXT_PRECISION)
                        .min(MAX_NUMERIC_TEXT_PRECISION);
                    (CType::Char, clamped + 3, false)
                }
            },
            Date => (CType::Date, SqlDate::WIRE_LEN, false),
            Time => (CType::Time, SqlTime::WIRE_LEN, false),
            DateTime | SqlDataType::Timestamp => (CType::Timestamp, SqlTimestamp::WIRE_LEN, false),
            Interval(kind) => (
                CType::Interval(kind),
                crate::codec::interval::SqlInterval::WIRE_LEN,
                false,
            ),
            Time2 => (
                CType::Binary,
                crate::codec::datetime::SqlTime2::WIRE_LEN,
                false,
            ),
        };
        tracing::debug!(
            column,
            data_type = data_type.name(),
            c_type = c_type.name(),
            buffer_length,
            via_get_data,
            "negotiated result column"
        );
        Ok(ColumnDescr {
            data_type,
            size,
            decimal_digits,
            nullable,
            c_type,
            buffer_length,
            via_get_data,
        })
    }

    /// 1-based position to slot index.
    fn param_index(&self, position: usize) -> Result<usize, DbError> {
        if position < 1 || position > self.params.len() {
            Err(DbError::Misuse(MisuseError::ParameterOutOfRange {
                position,
                count: self.params.len(),
            }))
        } else {
            Ok(position - 1)
        }
    }

    /// A bind after a successful execute reverses that execute: the cursor
    /// closes and any prefetched rows are dropped, forcing a fresh
    /// execute/fetch cycle.
    pub(super) fn invalidate_execution(&mut self, function: &'static str) -> Result<(), DbError> {
        if self.execute_successful {
            self.core.dbc()?;
            self.core
                .api
                .close_cursor(self.stmt)
                .map_err(|failure| native_err(function, failure))?;
            self.execute_successful = false;
            self.prefetched = None;
            self.current = None;
        }
        Ok(())
    }

    /// Re-register one parameter with the native layer from its slot.
    fn register_param(&mut self, index: usize, function: &'static str) -> Result<(), DbError> {
        self.core.dbc()?;
        let slot = &self.params[index];
        let data = if slot.null {
            None
        } else {
            Some(slot.buffer.as_slice())
        };
        self.core
            .api
            .bind_parameter(
                self.stmt,
                (index + 1) as u16,
                slot.c_type,
                slot.data_type.code(),
                slot.size,
                slot.decimal_digits,
                data,
            )
            .map_err(|failure| native_err(function, failure))?;
        self.fetch_okay = false;
        self.params[index].bound = true;
        Ok(())
    }

    fn value_error(
        position: usize,
        data_type: SqlDataType,
        detail: impl Into<String>,
    ) -> DbError {
        DbError::Misuse(MisuseError::ValueOutOfRange {
            position,
            native_type: data_type.name(),
            detail: detail.into(),
        })
    }

    /// Write an integer already reduced to `i64` into a slot buffer.
    fn store_integer(
        slot: &mut ParamSlot,
        position: usize,
        value: i64,
        tinyint_unsigned: bool,
    ) -> Result<(), DbError> {
        use num_bigint::BigInt;
        use SqlDataType::*;
        match slot.data_type {
            Bit => {
                if !(0..=1).contains(&value) {
                    return Err(Self::value_error(
                        position,
                        slot.data_type,
                        format!("{value} does not fit into a bit"),
                    ));
                }
                slot.c_type = CType::Bit;
                slot.buffer = vec![value as u8];
            }
            TinyInt => {
                if tinyint_unsigned {
                    let value = u8::try_from(value).map_err(|_| {
                        Self::value_error(
                            position,
                            slot.data_type,
                            format!("{value} does not fit into an 8-bit unsigned integer"),
                        )
                    })?;
                    slot.c_type = CType::UTinyInt;
                    slot.buffer = vec![value];
                } else {
                    let value = i8::try_from(value).map_err(|_| {
                        Self::value_error(
                            position,
                            slot.data_type,
                            format!("{value} does not fit into an 8-bit signed integer"),
                        )
                    })?;
                    slot.c_type = CType::STinyInt;
                    slot.buffer = vec![value as u8];
                }
            }
            SmallInt => {
                let value = i16::try_from(value).map_err(|_| {
                    Self::value_error(
                        position,
                        slot.data_type,
                        format!("{value} does not fit into a 16-bit integer"),
                    )
                })?;
                slot.c_type = CType::SShort;
                slot.buffer = value.to_ne_bytes().to_vec();
            }
            Integer => {
                let value = i32::try_from(value).map_err(|_| {
                    Self::value_error(
                        position,
                        slot.data_type,
                        format!("{value} does not fit into a 32-bit integer"),
                    )
                })?;
                slot.c_type = CType::SLong;
                slot.buffer = value.to_ne_bytes().to_vec();
            }
            SqlDataType::BigInt => {
                slot.c_type = CType::SBigInt;
                slot.buffer = value.to_ne_bytes().to_vec();
            }
            Real => {
                slot.c_type = CType::Float;
                slot.buffer = (value as f32).to_ne_bytes().to_vec();
            }
            Float | Double => {
                slot.c_type = CType::Double;
                slot.buffer = (value as f64).to_ne_bytes().to_vec();
            }
            Decimal | Numeric | Char | Varchar | LongVarchar => {
                slot.c_type = CType::Char;
                slot.buffer = decimal::encode_big_int(&BigInt::from(value));
            }
            other => {
                return Err(Self::value_error(
                    position,
                    other,
                    "type does not accept an integer value",
                ))
            }
        }
        slot.null = false;
        Ok(())
    }
}

impl DriverStatement for OdbcStatement {
    fn bind_big_int(&mut self, position: usize, value: &BigInt) -> Result<(), DbError> {
        use SqlDataType::*;
        let index = self.param_index(position)?;
        self.invalidate_execution("bind_big_int")?;
        let tinyint_unsigned = self.capabilities.tinyint_unsigned;
        let numeric = self.config.numeric;
        let slot = &mut self.params[index];
        match slot.data_type {
            Decimal | Numeric | Char | Varchar | LongVarchar
                if numeric == NumericEncoding::Packed
                    && matches!(slot.data_type, Decimal | Numeric) =>
            {
                let packed = decimal::encode_numeric_big_int(value)
                    .map_err(DbError::Misuse)?;
                slot.c_type = CType::Numeric;
                slot.buffer = packed.to_bytes().to_vec();
                slot.null = false;
            }
            Decimal | Numeric | Char | Varchar | LongVarchar => {
                slot.c_type = CType::Char;
                slot.buffer = decimal::encode_big_int(value);
                slot.null = false;
            }
            Real => {
                let value = value.to_f64().unwrap_or(f64::INFINITY);
                slot.c_type = CType::Float;
                slot.buffer = (value as f32).to_ne_bytes().to_vec();
                slot.null = false;
            }
            Float | Double => {
                let value = value.to_f64().unwrap_or(f64::INFINITY);
                slot.c_type = CType::Double;
                slot.buffer = value.to_ne_bytes().to_vec();
                slot.null = false;
            }
            _ => {
                let reduced = value.to_i64().ok_or_else(|| {
                    Self::value_error(
                        position,
                        slot.data_type,
                        format!("{value} does not fit into 64 bits"),
                    )
                })?;
                Self::store_integer(slot, position, reduced, tinyint_unsigned)?;
            }
        }
        self.register_param(index, "bind_big_int")
    }

    fn bind_big_rational(&mut self, position: usize, value: &BigRational) -> Result<(), DbError> {
        use num_bigint::BigInt;
        use SqlDataType::*;
        let index = self.param_index(position)?;
        self.invalidate_execution("bind_big_rational")?;
        let numeric = self.config.numeric;
        let slot = &mut self.params[index];
        match slot.data_type {
            Decimal | Numeric | Varchar | LongVarchar => {
                if numeric == NumericEncoding::Packed
                    && matches!(slot.data_type, Decimal | Numeric)
                {
                    let packed = decimal::encode_numeric_big_rational(
                        value.numer(),
                        value.denom(),
                        slot.decimal_digits as i8,
                    )
                    .map_err(DbError::Misuse)?;
                    slot.c_type = CType::Numeric;
                    slot.buffer = packed.to_bytes().to_vec();
                } else if value.denom() == &BigInt::from(1) {
                    slot.c_type = CType::Char;
                    slot.buffer = decimal::encode_big_int(value.numer());
                } else {
                    slot.c_type = CType::Char;
                    slot.buffer = decimal::encode_big_rational(
                        value.numer(),
                        value.denom(),
                        DEFAULT_DECIMAL_SCALE,
                    )
                    .map_err(DbError::Misuse)?;
                }
            }
            Real => {
                let value = value.to_f64().unwrap_or(f64::NAN);
                slot.c_type = CType::Float;
                slot.buffer = (value as f32).to_ne_bytes().to_vec();
            }
            Float | Double => {
                let value = value.to_f64().unwrap_or(f64::NAN);
                slot.c_type = CType::Double;
                slot.buffer = value.to_ne_bytes().to_vec();
            }
            other => {
                return Err(Self::value_error(
                    position,
                    other,
                    "type does not accept a rational value",
                ))
            }
        }
        slot.null = false;
        self.register_param(index, "bind_big_rational")
    }

    fn bind_bool(&mut self, position: usize, value: bool) -> Result<(), DbError> {
        use SqlDataType::*;
        let index = self.param_index(position)?;
        self.invalidate_execution("bind_bool")?;
        let tinyint_unsigned = self.capabilities.tinyint_unsigned;
        let slot = &mut self.params[index];
        match slot.data_type {
            // Character-ish targets take the numeric rendering.
            Decimal | Numeric | Char | Varchar | LongVarchar => {
                slot.c_type = CType::SLong;
                slot.buffer = (value as i32).to_ne_bytes().to_vec();
                slot.null = false;
            }
            _ => Self::store_integer(slot, position, value as i64, tinyint_unsigned)?,
        }
        self.register_param(index, "bind_bool")
    }

    fn bind_bytes(&mut self, position: usize, value: &[u8]) -> Result<(), DbError> {
        use SqlDataType::*;
        let index = self.param_index(position)?;
        self.invalidate_execution("bind_bytes")?;
        let slot = &mut self.params[index];
        match slot.data_type {
            Binary | Varbinary | LongVarbinary => {
                tracing::trace!(
                    position,
                    len = value.len(),
                    preview = %hex::encode(&value[..value.len().min(16)]),
                    "binding byte string"
                );
                slot.c_type = CType::Binary;
                slot.buffer = value.to_vec();
                slot.null = false;
            }
            other => {
                return Err(Self::value_error(
                    position,
                    other,
                    format!("type does not accept a byte string ({} bytes)", value.len()),
                ))
            }
        }
        self.register_param(index, "bind_bytes")
    }

    fn bind_duration(&mut self, position: usize, value: &Duration) -> Result<(), DbError> {
        use SqlDataType::*;
        let index = self.param_index(position)?;
        interval::check_bind_range(value).map_err(DbError::Misuse)?;
        self.invalidate_execution("bind_duration")?;
        let slot = &mut self.params[index];
        match slot.data_type {
            Varchar | LongVarchar | Interval(_) => {
                let encoded = interval::encode(value).map_err(DbError::Misuse)?;
                slot.c_type = CType::Interval(encoded.kind);
                slot.buffer = encoded.to_bytes().to_vec();
                slot.null = false;
            }
            other => {
                return Err(Self::value_error(
                    position,
                    other,
                    "type does not accept a duration",
                ))
            }
        }
        self.register_param(index, "bind_duration")
    }

    fn bind_float(&mut self, position: usize, value: f64) -> Result<(), DbError> {
        use SqlDataType::*;
        let index = self.param_index(position)?;
        self.invalidate_execution("bind_float")?;
        let slot = &mut self.params[index];
        match slot.data_type {
            Real => {
                slot.c_type = CType::Float;
                slot.buffer = (value as f32).to_ne_bytes().to_vec();
            }
            Float | Double => {
                slot.c_type = CType::Double;
                slot.buffer = value.to_ne_bytes().to_vec();
            }
            other => {
                return Err(Self::value_error(
                    position,
                    other,
                    "type does not accept a float value",
                ))
            }
        }
        slot.null = false;
        self.register_param(index, "bind_float")
    }

    fn bind_int(&mut self, position: usize, value: i64) -> Result<(), DbError> {
        let index = self.param_index(position)?;
        self.invalidate_execution("bind_int")?;
        let tinyint_unsigned = self.capabilities.tinyint_unsigned;
        let slot = &mut self.params[index];
        Self::store_integer(slot, position, value, tinyint_unsigned)?;
        self.register_param(index, "bind_int")
    }

    fn bind_null(&mut self, position: usize) -> Result<(), DbError> {
        let index = self.param_index(position)?;
        self.invalidate_execution("bind_null")?;
        let slot = &mut self.params[index];
        slot.null = true;
        slot.buffer.clear();
        self.register_param(index, "bind_null")
    }

    fn bind_string(&mut self, position: usize, value: &str) -> Result<(), DbError> {
        use SqlDataType::*;
        let index = self.param_index(position)?;
        self.invalidate_execution("bind_string")?;
        let wide = self.capabilities.wide_chars;
        let slot = &mut self.params[index];
        match slot.data_type {
            Char | Varchar | LongVarchar | WChar | WVarchar | WLongVarchar => {
                if wide {
                    slot.c_type = CType::WChar;
                    slot.buffer = value
                        .encode_utf16()
                        .flat_map(|unit| unit.to_ne_bytes())
                        .collect();
                } else {
                    slot.c_type = CType::Char;
                    slot.buffer = value.as_bytes().to_vec();
                }
                slot.null = false;
            }
            other => {
                return Err(Self::value_error(
                    position,
                    other,
                    "type does not accept a string",
                ))
            }
        }
        self.register_param(index, "bind_string")
    }

    fn bind_time(&mut self, position: usize, value: &Timestamp) -> Result<(), DbError> {
        use SqlDataType::*;
        let index = self.param_index(position)?;
        if value.year < i16::MIN as i32 || value.year > i16::MAX as i32 || !value.is_valid() {
            return Err(DbError::Misuse(MisuseError::ValueOutOfRange {
                position,
                native_type: "date/time",
                detail: format!(
                    "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:06} not in the allowed range",
                    value.year, value.month, value.day, value.hour, value.minute, value.second,
                    value.micro_second
                ),
            }));
        }
        self.invalidate_execution("bind_time")?;
        let slot = &mut self.params[index];
        match slot.data_type {
            Date => {
                let date = SqlDate {
                    year: value.year as i16,
                    month: value.month as u16,
                    day: value.day as u16,
                };
                slot.c_type = CType::Date;
                slot.buffer = date.to_bytes().to_vec();
            }
            Time => {
                let time = SqlTime {
                    hour: value.hour as u16,
                    minute: value.minute as u16,
                    second: value.second as u16,
                };
                slot.c_type = CType::Time;
                slot.buffer = time.to_bytes().to_vec();
            }
            DateTime | SqlDataType::Timestamp => {
                let timestamp = SqlTimestamp {
                    year: value.year as i16,
                    month: value.month as u16,
                    day: value.day as u16,
                    hour: value.hour as u16,
                    minute: value.minute as u16,
                    second: value.second as u16,
                    fraction: datetime::fraction_from_micros(
                        value.micro_second,
                        slot.decimal_digits,
                    ),
                };
                slot.c_type = CType::Timestamp;
                slot.buffer = timestamp.to_bytes().to_vec();
            }
            Varchar | WVarchar | LongVarchar => {
                let text = datetime::format_datetime2(value, slot.size).map_err(DbError::Misuse)?;
                slot.c_type = CType::Char;
                slot.buffer = text.into_bytes();
            }
            other => {
                return Err(Self::value_error(
                    position,
                    other,
                    "type does not accept a date/time value",
                ))
            }
        }
        slot.null = false;
        self.register_param(index, "bind_time")
    }

    fn execute(&mut self) -> Result<(), DbError> {
        for (index, slot) in self.params.iter().enumerate() {
            if !slot.bound {
                return Err(DbError::Misuse(MisuseError::UnboundParameter {
                    position: index + 1,
                }));
            }
        }
        self.invalidate_execution("execute")?;
        self.fetch_okay = false;
        self.core.dbc()?;
        if let Err(failure) = self.core.api.execute(self.stmt) {
            self.execute_successful = false;
            return Err(native_err("execute", failure));
        }
        if self.capabilities.max_concurrent_statements != 0 && !self.columns.is_empty() {
            // The driver limits concurrently active statements, so a second
            // statement on this connection could fail while rows of this
            // one are pending. Buffer the whole result set now.
            if let Err(err) = self.prefetch_all() {
                self.execute_successful = false;
                return Err(err);
            }
        }
        self.execute_successful = true;
        self.fetch_finished = false;
        Ok(())
    }

    fn fetch(&mut self) -> Result<bool, DbError> {
        self.advance_row()
    }

    fn column_big_int(&mut self, column: usize) -> Result<BigInt, DbError> {
        self.read_big_int(column)
    }

    fn column_big_rational(&mut self, column: usize) -> Result<BigRational, DbError> {
        self.read_big_rational(column)
    }

    fn column_bool(&mut self, column: usize) -> Result<bool, DbError> {
        self.read_bool(column)
    }

    fn column_bytes(&mut self, column: usize) -> Result<Vec<u8>, DbError> {
        self.read_bytes(column)
    }

    fn column_duration(&mut self, column: usize) -> Result<Duration, DbError> {
        self.read_duration(column)
    }

    fn column_float(&mut self, column: usize) -> Result<f64, DbError> {
        self.read_float(column)
    }

    fn column_int(&mut self, column: usize) -> Result<i64, DbError> {
        self.read_int(column)
    }

    fn column_string(&mut self, column: usize) -> Result<String, DbError> {
        self.read_string(column)
    }

    fn column_time(&mut self, column: usize) -> Result<Timestamp, DbError> {
        self.read_time(column)
    }

    fn is_null(&self, column: usize) -> Result<bool, DbError> {
        self.read_is_null(column)
    }

    fn column_count(&self) -> Result<usize, DbError> {
        Ok(self.columns.len())
    }

    fn column_name(&mut self, column: usize) -> Result<String, DbError> {
        if column < 1 || column > self.columns.len() {
            return Err(DbError::Misuse(MisuseError::ColumnOutOfRange {
                column,
                count: self.columns.len(),
            }));
        }
        self.core.dbc()?;
        self.core
            .api
            .column_name(self.stmt, column as u16)
            .map_err(|failure| native_err("column_name", failure))
    }
}

impl Drop for OdbcStatement {
    fn drop(&mut self) {
        // After an explicit connection close the native statement handle is
        // already gone with its connection.
        if !self.core.is_closed() {
            self.core.api.free_statement(self.stmt);
        }
    }
}
