//! ABI vocabulary of the call-level interface.
//!
//! Raw type codes, return codes and attribute identifiers as the native
//! client library defines them, plus the typed views (`SqlDataType`,
//! `CType`) the engine works with. Struct byte layouts live with their
//! codecs in `crate::codec`.

use crate::codec::datetime::{SqlDate, SqlTime, SqlTime2, SqlTimestamp};
use crate::codec::decimal::SqlNumeric;
use crate::codec::interval::{IntervalKind, SqlInterval};

// Return codes
pub const SQL_SUCCESS: i16 = 0;
pub const SQL_SUCCESS_WITH_INFO: i16 = 1;
pub const SQL_NO_DATA: i16 = 100;
pub const SQL_ERROR: i16 = -1;
pub const SQL_INVALID_HANDLE: i16 = -2;

// Handle types
pub const SQL_HANDLE_ENV: i16 = 1;
pub const SQL_HANDLE_DBC: i16 = 2;
pub const SQL_HANDLE_STMT: i16 = 3;

// Length / indicator sentinels
pub const SQL_NULL_DATA: isize = -1;
pub const SQL_NO_TOTAL: isize = -4;
pub const SQL_NTS: isize = -3;

// Environment and connection attributes
pub const SQL_ATTR_ODBC_VERSION: i32 = 200;
pub const SQL_OV_ODBC3: isize = 3;
pub const SQL_ATTR_AUTOCOMMIT: i32 = 102;
pub const SQL_AUTOCOMMIT_OFF: usize = 0;
pub const SQL_AUTOCOMMIT_ON: usize = 1;

// Info and descriptor identifiers
pub const SQL_MAX_CONCURRENT_ACTIVITIES: u16 = 1;
pub const SQL_DESC_NAME: u16 = 1011;

// Transaction completion
pub const SQL_COMMIT: i16 = 0;
pub const SQL_ROLLBACK: i16 = 1;

// SQLFreeStmt options
pub const SQL_CLOSE: u16 = 0;
pub const SQL_UNBIND: u16 = 2;

// Parameter direction
pub const SQL_PARAM_INPUT: i16 = 1;

// SQL data type codes
pub const SQL_CHAR: i16 = 1;
pub const SQL_NUMERIC: i16 = 2;
pub const SQL_DECIMAL: i16 = 3;
pub const SQL_INTEGER: i16 = 4;
pub const SQL_SMALLINT: i16 = 5;
pub const SQL_FLOAT: i16 = 6;
pub const SQL_REAL: i16 = 7;
pub const SQL_DOUBLE: i16 = 8;
pub const SQL_DATETIME: i16 = 9;
pub const SQL_VARCHAR: i16 = 12;
pub const SQL_TYPE_DATE: i16 = 91;
pub const SQL_TYPE_TIME: i16 = 92;
pub const SQL_TYPE_TIMESTAMP: i16 = 93;
pub const SQL_LONGVARCHAR: i16 = -1;
pub const SQL_BINARY: i16 = -2;
pub const SQL_VARBINARY: i16 = -3;
pub const SQL_LONGVARBINARY: i16 = -4;
pub const SQL_BIGINT: i16 = -5;
pub const SQL_TINYINT: i16 = -6;
pub const SQL_BIT: i16 = -7;
pub const SQL_WCHAR: i16 = -8;
pub const SQL_WVARCHAR: i16 = -9;
pub const SQL_WLONGVARCHAR: i16 = -10;
pub const SQL_INTERVAL_YEAR: i16 = 101;
pub const SQL_INTERVAL_MONTH: i16 = 102;
pub const SQL_INTERVAL_DAY: i16 = 103;
pub const SQL_INTERVAL_HOUR: i16 = 104;
pub const SQL_INTERVAL_MINUTE: i16 = 105;
pub const SQL_INTERVAL_SECOND: i16 = 106;
pub const SQL_INTERVAL_YEAR_TO_MONTH: i16 = 107;
pub const SQL_INTERVAL_DAY_TO_HOUR: i16 = 108;
pub const SQL_INTERVAL_DAY_TO_MINUTE: i16 = 109;
pub const SQL_INTERVAL_DAY_TO_SECOND: i16 = 110;
pub const SQL_INTERVAL_HOUR_TO_MINUTE: i16 = 111;
pub const SQL_INTERVAL_HOUR_TO_SECOND: i16 = 112;
pub const SQL_INTERVAL_MINUTE_TO_SECOND: i16 = 113;

// Vendor extension codes folded into the standard set
pub const SQL_BLOB: i16 = -98;
pub const SQL_CLOB: i16 = -99;
pub const SQL_INFX_UDT_VARYING: i16 = -101;
pub const SQL_SS_TIME2: i16 = -154;
pub const SQL_XML: i16 = -370;

// C buffer type codes
pub const SQL_C_CHAR: i16 = 1;
pub const SQL_C_NUMERIC: i16 = 2;
pub const SQL_C_FLOAT: i16 = 7;
pub const SQL_C_DOUBLE: i16 = 8;
pub const SQL_C_BINARY: i16 = -2;
pub const SQL_C_BIT: i16 = -7;
pub const SQL_C_WCHAR: i16 = -8;
pub const SQL_C_SSHORT: i16 = -15;
pub const SQL_C_SLONG: i16 = -16;
pub const SQL_C_SBIGINT: i16 = -25;
pub const SQL_C_STINYINT: i16 = -26;
pub const SQL_C_UTINYINT: i16 = -28;
pub const SQL_C_TYPE_DATE: i16 = 91;
pub const SQL_C_TYPE_TIME: i16 = 92;
pub const SQL_C_TYPE_TIMESTAMP: i16 = 93;

/// Driver-reported column/parameter types the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDataType {
    Char,
    Varchar,
    LongVarchar,
    WChar,
    WVarchar,
    WLongVarchar,
    Binary,
    Varbinary,
    LongVarbinary,
    Bit,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Float,
    Double,
    Decimal,
    Numeric,
    Date,
    Time,
    DateTime,
    Timestamp,
    Interval(IntervalKind),
    /// Vendor time-of-day with fractional seconds
    Time2,
}

impl SqlDataType {
    /// Map a driver-reported type code, folding vendor extensions onto the
    /// standard long types the way their data is actually transported.
    pub fn from_code(code: i16) -> Option<SqlDataType> {
        use SqlDataType::*;
        Some(match code {
            SQL_CHAR => Char,
            SQL_VARCHAR => Varchar,
            SQL_LONGVARCHAR | SQL_CLOB | SQL_XML => LongVarchar,
            SQL_WCHAR => WChar,
            SQL_WVARCHAR => WVarchar,
            SQL_WLONGVARCHAR => WLongVarchar,
            SQL_BINARY => Binary,
            SQL_VARBINARY => Varbinary,
            SQL_LONGVARBINARY | SQL_BLOB | SQL_INFX_UDT_VARYING => LongVarbinary,
            SQL_BIT => Bit,
            SQL_TINYINT => TinyInt,
            SQL_SMALLINT => SmallInt,
            SQL_INTEGER => Integer,
            SQL_BIGINT => BigInt,
            SQL_REAL => Real,
            SQL_FLOAT => Float,
            SQL_DOUBLE => Double,
            SQL_DECIMAL => Decimal,
            SQL_NUMERIC => Numeric,
            SQL_TYPE_DATE => Date,
            SQL_TYPE_TIME => Time,
            SQL_DATETIME => DateTime,
            SQL_TYPE_TIMESTAMP => Timestamp,
            SQL_SS_TIME2 => Time2,
            code @ SQL_INTERVAL_YEAR..=SQL_INTERVAL_MINUTE_TO_SECOND => {
                Interval(IntervalKind::from_code((code - 100) as i32)?)
            }
            _ => return None,
        })
    }

    /// The standard code the engine reports back to the native layer.
    pub fn code(&self) -> i16 {
        use SqlDataType::*;
        match self {
            Char => SQL_CHAR,
            Varchar => SQL_VARCHAR,
            LongVarchar => SQL_LONGVARCHAR,
            WChar => SQL_WCHAR,
            WVarchar => SQL_WVARCHAR,
            WLongVarchar => SQL_WLONGVARCHAR,
            Binary => SQL_BINARY,
            Varbinary => SQL_VARBINARY,
            LongVarbinary => SQL_LONGVARBINARY,
            Bit => SQL_BIT,
            TinyInt => SQL_TINYINT,
            SmallInt => SQL_SMALLINT,
            Integer => SQL_INTEGER,
            BigInt => SQL_BIGINT,
            Real => SQL_REAL,
            Float => SQL_FLOAT,
            Double => SQL_DOUBLE,
            Decimal => SQL_DECIMAL,
            Numeric => SQL_NUMERIC,
            Date => SQL_TYPE_DATE,
            Time => SQL_TYPE_TIME,
            DateTime => SQL_DATETIME,
            Timestamp => SQL_TYPE_TIMESTAMP,
            Interval(kind) => 100 + kind.code() as i16,
            Time2 => SQL_SS_TIME2,
        }
    }

    /// Diagnostic name.
    pub fn name(&self) -> &'static str {
        use SqlDataType::*;
        match self {
            Char => "SQL_CHAR",
            Varchar => "SQL_VARCHAR",
            LongVarchar => "SQL_LONGVARCHAR",
            WChar => "SQL_WCHAR",
            WVarchar => "SQL_WVARCHAR",
            WLongVarchar => "SQL_WLONGVARCHAR",
            Binary => "SQL_BINARY",
            Varbinary => "SQL_VARBINARY",
            LongVarbinary => "SQL_LONGVARBINARY",
            Bit => "SQL_BIT",
            TinyInt => "SQL_TINYINT",
            SmallInt => "SQL_SMALLINT",
            Integer => "SQL_INTEGER",
            BigInt => "SQL_BIGINT",
            Real => "SQL_REAL",
            Float => "SQL_FLOAT",
            Double => "SQL_DOUBLE",
            Decimal => "SQL_DECIMAL",
            Numeric => "SQL_NUMERIC",
            Date => "SQL_TYPE_DATE",
            Time => "SQL_TYPE_TIME",
            DateTime => "SQL_DATETIME",
            Timestamp => "SQL_TYPE_TIMESTAMP",
            Interval(_) => "SQL_INTERVAL",
            Time2 => "SQL_SS_TIME2",
        }
    }

    /// True for the character family (narrow and wide).
    pub fn is_character(&self) -> bool {
        use SqlDataType::*;
        matches!(
            self,
            Char | Varchar | LongVarchar | WChar | WVarchar | WLongVarchar
        )
    }
}

/// Client-side buffer types the engine binds and reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CType {
    Bit,
    STinyInt,
    UTinyInt,
    SShort,
    SLong,
    SBigInt,
    Float,
    Double,
    Char,
    WChar,
    Binary,
    Date,
    Time,
    Timestamp,
    Numeric,
    Interval(IntervalKind),
}

impl CType {
    /// The native C type code.
    pub fn code(&self) -> i16 {
        use CType::*;
        match self {
            Bit => SQL_C_BIT,
            STinyInt => SQL_C_STINYINT,
            UTinyInt => SQL_C_UTINYINT,
            SShort => SQL_C_SSHORT,
            SLong => SQL_C_SLONG,
            SBigInt => SQL_C_SBIGINT,
            Float => SQL_C_FLOAT,
            Double => SQL_C_DOUBLE,
            Char => SQL_C_CHAR,
            WChar => SQL_C_WCHAR,
            Binary => SQL_C_BINARY,
            Date => SQL_C_TYPE_DATE,
            Time => SQL_C_TYPE_TIME,
            Timestamp => SQL_C_TYPE_TIMESTAMP,
            Numeric => SQL_C_NUMERIC,
            Interval(kind) => 100 + kind.code() as i16,
        }
    }

    /// Buffer length of the fixed-size types; `None` for the variable ones.
    pub fn fixed_len(&self) -> Option<usize> {
        use CType::*;
        Some(match self {
            Bit | STinyInt | UTinyInt => 1,
            SShort => 2,
            SLong | Float => 4,
            SBigInt | Double => 8,
            Date => SqlDate::WIRE_LEN,
            Time => SqlTime::WIRE_LEN,
            Timestamp => SqlTimestamp::WIRE_LEN,
            Numeric => SqlNumeric::WIRE_LEN,
            Interval(_) => SqlInterval::WIRE_LEN,
            Char | WChar | Binary => return None,
        })
    }

    /// Diagnostic name.
    pub fn name(&self) -> &'static str {
        use CType::*;
        match self {
            Bit => "SQL_C_BIT",
            STinyInt => "SQL_C_STINYINT",
            UTinyInt => "SQL_C_UTINYINT",
            SShort => "SQL_C_SSHORT",
            SLong => "SQL_C_SLONG",
            SBigInt => "SQL_C_SBIGINT",
            Float => "SQL_C_FLOAT",
            Double => "SQL_C_DOUBLE",
            Char => "SQL_C_CHAR",
            WChar => "SQL_C_WCHAR",
            Binary => "SQL_C_BINARY",
            Date => "SQL_C_TYPE_DATE",
            Time => "SQL_C_TYPE_TIME",
            Timestamp => "SQL_C_TYPE_TIMESTAMP",
            Numeric => "SQL_C_NUMERIC",
            Interval(_) => "SQL_C_INTERVAL",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_code_round_trip() {
        for code in [
            SQL_CHAR,
            SQL_VARCHAR,
            SQL_WVARCHAR,
            SQL_BINARY,
            SQL_BIT,
            SQL_TINYINT,
            SQL_SMALLINT,
            SQL_INTEGER,
            SQL_BIGINT,
            SQL_REAL,
            SQL_DOUBLE,
            SQL_DECIMAL,
            SQL_NUMERIC,
            SQL_TYPE_DATE,
            SQL_TYPE_TIME,
            SQL_TYPE_TIMESTAMP,
            SQL_INTERVAL_YEAR,
            SQL_INTERVAL_DAY_TO_SECOND,
        ] {
            let data_type = SqlDataType::from_code(code).unwrap();
            assert_eq!(data_type.code(), code, "{}", data_type.name());
        }
    }

    #[test]
    fn test_vendor_codes_fold_onto_long_types() {
        assert_eq!(
            SqlDataType::from_code(SQL_BLOB),
            Some(SqlDataType::LongVarbinary)
        );
        assert_eq!(
            SqlDataType::from_code(SQL_CLOB),
            Some(SqlDataType::LongVarchar)
        );
        assert_eq!(
            SqlDataType::from_code(SQL_XML),
            Some(SqlDataType::LongVarchar)
        );
        assert_eq!(SqlDataType::from_code(SQL_SS_TIME2), Some(SqlDataType::Time2));
    }

    #[test]
    fn test_unknown_code_rejected() {
        assert_eq!(SqlDataType::from_code(9999), None);
        assert_eq!(SqlDataType::from_code(-9999), None);
    }

    #[test]
    fn test_interval_c_type_codes() {
        use crate::codec::interval::IntervalKind;
        assert_eq!(CType::Interval(IntervalKind::Year).code(), 101);
        assert_eq!(CType::Interval(IntervalKind::MinuteToSecond).code(), 113);
    }

    #[test]
    fn test_fixed_lengths() {
        assert_eq!(CType::SShort.fixed_len(), Some(2));
        assert_eq!(CType::SBigInt.fixed_len(), Some(8));
        assert_eq!(CType::Timestamp.fixed_len(), Some(16));
        assert_eq!(CType::Char.fixed_len(), None);
        assert_eq!(CType::Binary.fixed_len(), None);
    }
}
