//! The fetch half of the marshaling engine: row advance, the large-object
//! retrieval protocol, the prefetch queue, and the typed column readers.
//!
//! Large objects cannot be pre-allocated and bound, and the native layer
//! only supports unbound retrieval in ascending column order, so binding
//! stops at the first large-object column. Everything from that ordinal on
//! is read after each cursor advance: large objects with a zero-length size
//! probe followed by one exactly-sized retrieval, the rest with a single
//! retrieval into their pre-sized buffers. This two-call sequence is the
//! protocol, not a retry.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{ToPrimitive, Zero};
use widestring::U16Str;

use super::api::Indicator;
use super::connection::native_err;
use super::statement::{ColumnData, ColumnDescr, OdbcStatement, MAX_COLUMN_BUFFER};
use super::sys::{CType, SqlDataType};
use crate::codec::datetime::{self, SqlDate, SqlTime, SqlTime2, SqlTimestamp};
use crate::codec::decimal::{self, SqlNumeric};
use crate::codec::interval::{self, SqlInterval};
use crate::error::{DbError, InternalError, MisuseError, ResourceError};
use crate::odbc::connection::NumericEncoding;
use crate::value::{time_of_day, Duration, Timestamp};

fn inconsistent(
    function: &'static str,
    native_function: &'static str,
    detail: String,
) -> DbError {
    DbError::Internal(InternalError::inconsistent(
        function,
        native_function,
        detail,
    ))
}

impl OdbcStatement {
    /// One native cursor advance into the bound buffers, followed by the
    /// unbound tail. Returns the harvested row, or `None` at the end of the
    /// result set.
    pub(super) fn native_fetch_row(
        &mut self,
        function: &'static str,
    ) -> Result<Option<Vec<ColumnData>>, DbError> {
        self.core.dbc()?;
        let mut targets = Vec::with_capacity(self.bind_limit);
        for (index, data) in self.bound_row.iter_mut().take(self.bind_limit).enumerate() {
            targets.push(super::api::FetchTarget {
                column: (index + 1) as u16,
                c_type: self.columns[index].c_type,
                buffer: &mut data.buffer,
                indicator: &mut data.indicator,
            });
        }
        let row_available = self
            .core
            .api
            .fetch(self.stmt, &mut targets)
            .map_err(|failure| native_err(function, failure))?;
        drop(targets);
        if !row_available {
            return Ok(None);
        }
        self.fetch_unbound_tail(function)?;
        Ok(Some(self.harvest_row()))
    }

    /// Retrieve every column at or after the first large object, in
    /// ascending ordinal order.
    fn fetch_unbound_tail(&mut self, function: &'static str) -> Result<(), DbError> {
        for index in self.bind_limit..self.columns.len() {
            let c_type = self.columns[index].c_type;
            if self.columns[index].via_get_data {
                self.fetch_large_object(function, index, c_type)?;
            } else {
                let buffer_length = self.columns[index].buffer_length;
                let mut buffer = std::mem::take(&mut self.bound_row[index].buffer);
                buffer.resize(buffer_length, 0);
                let indicator = self
                    .core
                    .api
                    .get_data(self.stmt, (index + 1) as u16, c_type, &mut buffer)
                    .map_err(|failure| native_err(function, failure))?;
                self.bound_row[index].buffer = buffer;
                self.bound_row[index].indicator = indicator;
            }
        }
        Ok(())
    }

    /// The large-object protocol: a zero-length probe learns the total
    /// size, then a single exactly-sized retrieval follows.
    fn fetch_large_object(
        &mut self,
        function: &'static str,
        index: usize,
        c_type: CType,
    ) -> Result<(), DbError> {
        let column = index + 1;
        self.bound_row[index].buffer = Vec::new();
        let probe = self
            .core
            .api
            .get_data(self.stmt, column as u16, c_type, &mut [])
            .map_err(|failure| native_err(function, failure))?;
        match probe {
            Indicator::Null => {
                self.bound_row[index].indicator = Indicator::Null;
            }
            Indicator::Len(0) => {
                self.bound_row[index].indicator = Indicator::Len(0);
            }
            Indicator::NoTotal => {
                return Err(DbError::Misuse(MisuseError::LobSizeUnknown { column }));
            }
            Indicator::Invalid(length) => {
                return Err(inconsistent(
                    function,
                    "SQLGetData",
                    format!("column {column}: negative total length {length}"),
                ));
            }
            Indicator::Len(total) => {
                if total > MAX_COLUMN_BUFFER {
                    return Err(DbError::Resource(ResourceError::LobTooLarge {
                        column,
                        length: total as u64,
                    }));
                }
                let mut buffer = vec![0u8; total];
                let indicator = self
                    .core
                    .api
                    .get_data(self.stmt, column as u16, c_type, &mut buffer)
                    .map_err(|failure| native_err(function, failure))?;
                match indicator {
                    Indicator::Invalid(length) => {
                        return Err(inconsistent(
                            function,
                            "SQLGetData",
                            format!("column {column}: negative length {length} after probe"),
                        ));
                    }
                    indicator => {
                        self.bound_row[index].buffer = buffer;
                        self.bound_row[index].indicator = indicator;
                    }
                }
            }
        }
        Ok(())
    }

    /// Detach the fetched row: large-object buffers move out, bound buffers
    /// are copied so the driver can keep writing into them.
    fn harvest_row(&mut self) -> Vec<ColumnData> {
        self.columns
            .iter()
            .zip(self.bound_row.iter_mut())
            .map(|(descr, data)| {
                if descr.via_get_data {
                    ColumnData {
                        buffer: std::mem::take(&mut data.buffer),
                        indicator: data.indicator,
                    }
                } else {
                    data.clone()
                }
            })
            .collect()
    }

    /// Fetch and queue the entire result set.
    pub(super) fn prefetch_all(&mut self) -> Result<(), DbError> {
        let mut queue = std::collections::VecDeque::new();
        while let Some(row) = self.native_fetch_row("execute")? {
            queue.push_back(row);
        }
        tracing::debug!(rows = queue.len(), "prefetched result set");
        self.prefetched = Some(queue);
        Ok(())
    }

    /// The public fetch: pop a prefetched row when the queue is active,
    /// else advance the native cursor once.
    pub(super) fn advance_row(&mut self) -> Result<bool, DbError> {
        if !self.execute_successful {
            return Err(DbError::Misuse(MisuseError::ExecuteNotSuccessful));
        }
        if self.columns.is_empty() {
            // No result set; fetch is a no-op that reports no row.
            self.fetch_okay = false;
            return Ok(false);
        }
        if self.fetch_finished {
            self.fetch_okay = false;
            return Ok(false);
        }
        if let Some(queue) = &mut self.prefetched {
            match queue.pop_front() {
                Some(row) => {
                    self.current = Some(row);
                    self.fetch_okay = true;
                    Ok(true)
                }
                None => {
                    self.fetch_okay = false;
                    self.fetch_finished = true;
                    Ok(false)
                }
            }
        } else {
            match self.native_fetch_row("fetch") {
                Ok(Some(row)) => {
                    self.current = Some(row);
                    self.fetch_okay = true;
                    Ok(true)
                }
                Ok(None) => {
                    self.fetch_okay = false;
                    self.fetch_finished = true;
                    Ok(false)
                }
                Err(err) => {
                    self.fetch_okay = false;
                    self.fetch_finished = true;
                    Err(err)
                }
            }
        }
    }

    /// Locate a column's descriptor and current data, enforcing the
    /// row/range preconditions and the driver-consistency checks.
    fn cell(&self, column: usize) -> Result<(&ColumnDescr, &ColumnData), DbError> {
        if !self.fetch_okay {
            return Err(DbError::Misuse(MisuseError::NoFetchedRow));
        }
        if column < 1 || column > self.columns.len() {
            return Err(DbError::Misuse(MisuseError::ColumnOutOfRange {
                column,
                count: self.columns.len(),
            }));
        }
        let descr = &self.columns[column - 1];
        let row = self
            .current
            .as_ref()
            .ok_or(DbError::Misuse(MisuseError::NoFetchedRow))?;
        let data = &row[column - 1];
        match data.indicator {
            Indicator::Invalid(length) => Err(inconsistent(
                "column",
                "SQLBindCol",
                format!("column {column}: negative length {length}"),
            )),
            Indicator::NoTotal => Err(inconsistent(
                "column",
                "SQLBindCol",
                format!("column {column}: driver reported no total length"),
            )),
            Indicator::Len(length) if !descr.via_get_data && length > descr.buffer_length => {
                Err(inconsistent(
                    "column",
                    "SQLBindCol",
                    format!(
                        "column {column}: length {length} greater than buffer length {}",
                        descr.buffer_length
                    ),
                ))
            }
            _ => Ok((descr, data)),
        }
    }

    fn mismatch(column: usize, descr: &ColumnDescr, requested: &'static str) -> DbError {
        DbError::Misuse(MisuseError::ColumnTypeMismatch {
            column,
            native_type: descr.data_type.name(),
            requested,
        })
    }

    fn data_slice(data: &ColumnData) -> &[u8] {
        match data.indicator {
            Indicator::Len(length) => &data.buffer[..length.min(data.buffer.len())],
            _ => &[],
        }
    }

    fn wide_units(bytes: &[u8]) -> Vec<u16> {
        bytes
            .chunks_exact(2)
            .map(|pair| u16::from_ne_bytes([pair[0], pair[1]]))
            .collect()
    }

    fn text_from(
        column: usize,
        descr: &ColumnDescr,
        data: &ColumnData,
    ) -> Result<String, DbError> {
        let bytes = Self::data_slice(data);
        match descr.c_type {
            CType::Char => String::from_utf8(bytes.to_vec()).map_err(|_| {
                DbError::Misuse(MisuseError::ParseFailed {
                    what: "character data",
                    text: String::from_utf8_lossy(bytes).into_owned(),
                })
            }),
            CType::WChar => {
                let units = Self::wide_units(bytes);
                U16Str::from_slice(&units).to_string().map_err(|_| {
                    DbError::Misuse(MisuseError::ParseFailed {
                        what: "wide character data",
                        text: String::from_utf16_lossy(&units),
                    })
                })
            }
            _ => Err(Self::mismatch(column, descr, "text")),
        }
    }

    fn read_i16(bytes: &[u8]) -> i16 {
        let mut raw = [0u8; 2];
        raw.copy_from_slice(&bytes[..2]);
        i16::from_ne_bytes(raw)
    }

    fn read_i32(bytes: &[u8]) -> i32 {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&bytes[..4]);
        i32::from_ne_bytes(raw)
    }

    fn read_i64(bytes: &[u8]) -> i64 {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes[..8]);
        i64::from_ne_bytes(raw)
    }

    fn read_f32(bytes: &[u8]) -> f32 {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&bytes[..4]);
        f32::from_ne_bytes(raw)
    }

    fn read_f64(bytes: &[u8]) -> f64 {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes[..8]);
        f64::from_ne_bytes(raw)
    }

    fn packed_numeric(
        column: usize,
        data: &ColumnData,
    ) -> Result<SqlNumeric, DbError> {
        SqlNumeric::from_bytes(&data.buffer).ok_or_else(|| {
            inconsistent(
                "column",
                "SQLGetData",
                format!("column {column}: truncated numeric structure"),
            )
        })
    }

    /// Whole-number read shared by the integer accessors.
    fn integer_value(&self, column: usize) -> Result<Option<i64>, DbError> {
        use SqlDataType::*;
        let (descr, data) = self.cell(column)?;
        if data.indicator.is_null() {
            return Ok(None);
        }
        let bytes = Self::data_slice(data);
        // Fixed-width values read from the full bound buffer; its size was
        // fixed at prepare time, so a short driver length cannot underflow.
        let value = match descr.data_type {
            Bit => (data.buffer.first().copied().unwrap_or(0) != 0) as i64,
            TinyInt | SmallInt => Self::read_i16(&data.buffer) as i64,
            Integer => Self::read_i32(&data.buffer) as i64,
            SqlDataType::BigInt => Self::read_i64(&data.buffer),
            Decimal => decimal::decode_int(bytes).map_err(DbError::Misuse)?,
            Numeric => match self.config.numeric {
                NumericEncoding::Text => decimal::decode_int(bytes).map_err(DbError::Misuse)?,
                NumericEncoding::Packed => {
                    decimal::decode_numeric_int(&Self::packed_numeric(column, data)?)
                        .map_err(DbError::Misuse)?
                }
            },
            _ => return Err(Self::mismatch(column, descr, "integer")),
        };
        Ok(Some(value))
    }

    pub(super) fn read_int(&self, column: usize) -> Result<i64, DbError> {
        // NULL reads as the domain zero; is_null tells the difference.
        Ok(self.integer_value(column)?.unwrap_or(0))
    }

    pub(super) fn read_big_int(&self, column: usize) -> Result<BigInt, DbError> {
        use num_bigint::BigInt;
        use SqlDataType::*;
        let (descr, data) = self.cell(column)?;
        if data.indicator.is_null() {
            return Ok(BigInt::zero());
        }
        let bytes = Self::data_slice(data);
        match descr.data_type {
            Bit => Ok(BigInt::from(
                (data.buffer.first().copied().unwrap_or(0) != 0) as i64,
            )),
            TinyInt | SmallInt => Ok(BigInt::from(Self::read_i16(&data.buffer))),
            Integer => Ok(BigInt::from(Self::read_i32(&data.buffer))),
            SqlDataType::BigInt => Ok(BigInt::from(Self::read_i64(&data.buffer))),
            Decimal => decimal::decode_big_int(bytes).map_err(DbError::Misuse),
            Numeric => match self.config.numeric {
                NumericEncoding::Text => decimal::decode_big_int(bytes).map_err(DbError::Misuse),
                NumericEncoding::Packed => {
                    decimal::decode_numeric_big_int(&Self::packed_numeric(column, data)?)
                        .map_err(DbError::Misuse)
                }
            },
            _ => Err(Self::mismatch(column, descr, "big integer")),
        }
    }

    pub(super) fn read_big_rational(&self, column: usize) -> Result<BigRational, DbError> {
        use num_bigint::BigInt;
        use SqlDataType::*;
        let (descr, data) = self.cell(column)?;
        if data.indicator.is_null() {
            return Ok(BigRational::from(BigInt::zero()));
        }
        let bytes = Self::data_slice(data);
        let (numerator, denominator) = match descr.data_type {
            Bit => (
                BigInt::from((data.buffer.first().copied().unwrap_or(0) != 0) as i64),
                BigInt::from(1),
            ),
            TinyInt | SmallInt => (BigInt::from(Self::read_i16(&data.buffer)), BigInt::from(1)),
            Integer => (BigInt::from(Self::read_i32(&data.buffer)), BigInt::from(1)),
            SqlDataType::BigInt => (BigInt::from(Self::read_i64(&data.buffer)), BigInt::from(1)),
            Real => Self::rational_from_float(column, Self::read_f32(&data.buffer) as f64)?,
            Float | Double => Self::rational_from_float(column, Self::read_f64(&data.buffer))?,
            Decimal => decimal::decode_big_rational(bytes).map_err(DbError::Misuse)?,
            Numeric => match self.config.numeric {
                NumericEncoding::Text => {
                    decimal::decode_big_rational(bytes).map_err(DbError::Misuse)?
                }
                NumericEncoding::Packed => {
                    decimal::decode_numeric_big_rational(&Self::packed_numeric(column, data)?)
                }
            },
            _ => return Err(Self::mismatch(column, descr, "rational")),
        };
        Ok(BigRational::new(numerator, denominator))
    }

    /// A float column becomes the rational its decimal rendering denotes,
    /// so 0.1 reads as 1/10 rather than the underlying binary fraction.
    fn rational_from_float(column: usize, value: f64) -> Result<(BigInt, BigInt), DbError> {
        if !value.is_finite() {
            return Err(DbError::Misuse(MisuseError::ParseFailed {
                what: "finite float column value",
                text: value.to_string(),
            }));
        }
        let rendered = value.to_string();
        decimal::decode_big_rational(rendered.as_bytes()).map_err(|_| {
            DbError::Misuse(MisuseError::ParseFailed {
                what: "float column value",
                text: format!("column {column}: {rendered}"),
            })
        })
    }

    pub(super) fn read_bool(&self, column: usize) -> Result<bool, DbError> {
        use SqlDataType::*;
        let (descr, data) = self.cell(column)?;
        if data.indicator.is_null() {
            return Ok(false);
        }
        let bytes = Self::data_slice(data);
        let value: i64 = match descr.data_type {
            Char | Varchar | LongVarchar | WChar | WVarchar | WLongVarchar => {
                match descr.c_type {
                    CType::Char if bytes.len() == 1 => (bytes[0] as i64) - ('0' as i64),
                    CType::WChar if bytes.len() == 2 => {
                        (Self::wide_units(bytes)[0] as i64) - ('0' as i64)
                    }
                    _ => {
                        return Err(DbError::Misuse(MisuseError::ParseFailed {
                            what: "single-character boolean",
                            text: String::from_utf8_lossy(bytes).into_owned(),
                        }))
                    }
                }
            }
            _ => self.integer_value(column)?.unwrap_or(0),
        };
        if !(0..=1).contains(&value) {
            return Err(DbError::Misuse(MisuseError::ParseFailed {
                what: "boolean column value",
                text: value.to_string(),
            }));
        }
        Ok(value != 0)
    }

    pub(super) fn read_bytes(&self, column: usize) -> Result<Vec<u8>, DbError> {
        use SqlDataType::*;
        let (descr, data) = self.cell(column)?;
        if data.indicator.is_null() {
            return Ok(Vec::new());
        }
        match descr.data_type {
            Binary | Varbinary | LongVarbinary => Ok(Self::data_slice(data).to_vec()),
            _ => Err(Self::mismatch(column, descr, "byte string")),
        }
    }

    pub(super) fn read_float(&self, column: usize) -> Result<f64, DbError> {
        use SqlDataType::*;
        let (descr, data) = self.cell(column)?;
        if data.indicator.is_null() {
            return Ok(0.0);
        }
        let bytes = Self::data_slice(data);
        match descr.data_type {
            Real => Ok(Self::read_f32(&data.buffer) as f64),
            Float | Double => Ok(Self::read_f64(&data.buffer)),
            Decimal => decimal::decode_float(bytes).map_err(DbError::Misuse),
            Numeric => match self.config.numeric {
                NumericEncoding::Text => decimal::decode_float(bytes).map_err(DbError::Misuse),
                NumericEncoding::Packed => {
                    let numeric = Self::packed_numeric(column, data)?;
                    let (numerator, denominator) =
                        decimal::decode_numeric_big_rational(&numeric);
                    Ok(BigRational::new(numerator, denominator)
                        .to_f64()
                        .unwrap_or(0.0))
                }
            },
            _ => Err(Self::mismatch(column, descr, "float")),
        }
    }

    pub(super) fn read_string(&self, column: usize) -> Result<String, DbError> {
        use SqlDataType::*;
        let (descr, data) = self.cell(column)?;
        if data.indicator.is_null() {
            return Ok(String::new());
        }
        match descr.data_type {
            Char | Varchar | LongVarchar | WChar | WVarchar | WLongVarchar => {
                Self::text_from(column, descr, data)
            }
            _ => Err(Self::mismatch(column, descr, "string")),
        }
    }

    pub(super) fn read_duration(&self, column: usize) -> Result<Duration, DbError> {
        use SqlDataType::*;
        let (descr, data) = self.cell(column)?;
        if data.indicator.is_null() {
            return Ok(Duration::zero());
        }
        match descr.data_type {
            Interval(_) => {
                let structure = SqlInterval::from_bytes(&data.buffer).ok_or_else(|| {
                    inconsistent(
                        "column_duration",
                        "SQLBindCol",
                        format!("column {column}: truncated interval structure"),
                    )
                })?;
                Ok(interval::decode(&structure))
            }
            Char | Varchar | LongVarchar | WChar | WVarchar | WLongVarchar => {
                let text = Self::text_from(column, descr, data)?;
                interval::parse_text(text.trim()).ok_or_else(|| {
                    DbError::Misuse(MisuseError::ParseFailed {
                        what: "interval text",
                        text,
                    })
                })
            }
            _ => Err(Self::mismatch(column, descr, "duration")),
        }
    }

    pub(super) fn read_time(&self, column: usize) -> Result<Timestamp, DbError> {
        use crate::value::Timestamp;
        use SqlDataType::*;
        let (descr, data) = self.cell(column)?;
        if data.indicator.is_null() {
            return Ok(Timestamp::epoch());
        }
        let zone = self.config.time_zone.as_ref();
        let truncated = |what: &'static str| {
            inconsistent(
                "column_time",
                "SQLBindCol",
                format!("column {column}: truncated {what} structure"),
            )
        };
        match descr.data_type {
            Date => {
                let date = SqlDate::from_bytes(&data.buffer).ok_or_else(|| truncated("date"))?;
                Ok(Timestamp {
                    year: date.year as i32,
                    month: date.month as u32,
                    day: date.day as u32,
                    ..Timestamp::default()
                }
                .with_zone(zone))
            }
            Time => {
                let time = SqlTime::from_bytes(&data.buffer).ok_or_else(|| truncated("time"))?;
                Ok(time_of_day(
                    time.hour as u32,
                    time.minute as u32,
                    time.second as u32,
                    0,
                    zone,
                ))
            }
            DateTime | SqlDataType::Timestamp => {
                let stamp =
                    SqlTimestamp::from_bytes(&data.buffer).ok_or_else(|| truncated("timestamp"))?;
                Ok(Timestamp {
                    year: stamp.year as i32,
                    month: stamp.month as u32,
                    day: stamp.day as u32,
                    hour: stamp.hour as u32,
                    minute: stamp.minute as u32,
                    second: stamp.second as u32,
                    micro_second: datetime::micros_from_fraction(stamp.fraction),
                    ..crate::value::Timestamp::default()
                }
                .with_zone(zone))
            }
            Time2 => {
                let time =
                    SqlTime2::from_bytes(&data.buffer).ok_or_else(|| truncated("time"))?;
                Ok(time_of_day(
                    time.hour as u32,
                    time.minute as u32,
                    time.second as u32,
                    datetime::micros_from_fraction(time.fraction),
                    zone,
                ))
            }
            Varchar | WVarchar | LongVarchar => {
                let text = Self::text_from(column, descr, data)?;
                let parsed = datetime::parse_text(&text).map_err(DbError::Misuse)?;
                if parsed.time_only {
                    Ok(time_of_day(
                        parsed.hour,
                        parsed.minute,
                        parsed.second,
                        parsed.micro_second,
                        zone,
                    ))
                } else {
                    Ok(Timestamp {
                        year: parsed.year,
                        month: parsed.month,
                        day: parsed.day,
                        hour: parsed.hour,
                        minute: parsed.minute,
                        second: parsed.second,
                        micro_second: parsed.micro_second,
                        ..crate::value::Timestamp::default()
                    }
                    .with_zone(zone))
                }
            }
            _ => Err(Self::mismatch(column, descr, "date/time")),
        }
    }

    pub(super) fn read_is_null(&self, column: usize) -> Result<bool, DbError> {
        if !self.fetch_okay {
            return Err(DbError::Misuse(MisuseError::NoFetchedRow));
        }
        if column < 1 || column > self.columns.len() {
            return Err(DbError::Misuse(MisuseError::ColumnOutOfRange {
                column,
                count: self.columns.len(),
            }));
        }
        let row = self
            .current
            .as_ref()
            .ok_or(DbError::Misuse(MisuseError::NoFetchedRow))?;
        Ok(row[column - 1].indicator.is_null())
    }
}
