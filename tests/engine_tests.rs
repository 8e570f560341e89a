//! Engine behavior against the scripted native layer: type negotiation,
//! the bound/unbound fetch split, the large-object protocol, prefetch, and
//! the typed column decoders.

mod common;

use std::sync::Arc;

use common::*;
use unidbc::codec::datetime::SqlTimestamp;
use unidbc::codec::decimal;
use unidbc::codec::interval;
use unidbc::odbc::api::CliApi;
use unidbc::odbc::sys;
use unidbc::odbc::{DriverConfig, NumericEncoding, OdbcDriver};
use unidbc::{
    BigInt, BigRational, ConnectParams, DbError, Driver, DriverConnection, DriverStatement,
    Duration, MisuseError,
};

fn open_with_config(
    script: FakeScript,
    config: DriverConfig,
) -> (Arc<FakeCli>, Box<dyn DriverConnection>) {
    let fake = Arc::new(FakeCli::new(script));
    let driver = OdbcDriver::with_api(Arc::clone(&fake) as Arc<dyn CliApi>, config);
    let connection = driver
        .open(&ConnectParams::new("localhost", 0, "testdb", "tester", "pw"))
        .expect("open");
    (fake, connection)
}

fn open_fake(script: FakeScript) -> (Arc<FakeCli>, Box<dyn DriverConnection>) {
    open_with_config(script, DriverConfig::default())
}

#[test]
fn test_select_one_scenario() {
    let script = FakeScript::default()
        .with_column(FakeColumn::new("one", sys::SQL_INTEGER, 10))
        .with_row(vec![cell_i32(1)]);
    let (_fake, mut connection) = open_fake(script);

    let mut statement = connection.prepare("SELECT 1").unwrap();
    statement.execute().unwrap();
    assert!(statement.fetch().unwrap());
    assert_eq!(statement.column_int(1).unwrap(), 1);
    assert!(!statement.fetch().unwrap());
    // Fetching past the end stays finished.
    assert!(!statement.fetch().unwrap());
}

#[test]
fn test_insert_scenario_binds_and_executes() {
    let script = FakeScript::default()
        .with_param(sys::SQL_INTEGER, 10, 0)
        .with_param(sys::SQL_VARCHAR, 50, 0);
    let (fake, mut connection) = open_fake(script);

    let mut statement = connection.prepare("INSERT INTO t VALUES (?, ?)").unwrap();
    statement.bind_int(1, 42).unwrap();
    statement.bind_string(2, "hi").unwrap();
    statement.execute().unwrap();

    let first = fake.bound_param(1);
    assert_eq!(first.sql_type, sys::SQL_INTEGER);
    assert_eq!(first.data.unwrap(), 42i32.to_ne_bytes().to_vec());

    let second = fake.bound_param(2);
    assert_eq!(second.c_type_code, sys::SQL_C_CHAR);
    assert_eq!(second.data.unwrap(), b"hi".to_vec());

    // No result set: fetch reports no row without touching the cursor.
    assert!(!statement.fetch().unwrap());
}

#[test]
fn test_unbound_parameter_rejected_at_execute() {
    let script = FakeScript::default()
        .with_param(sys::SQL_INTEGER, 10, 0)
        .with_param(sys::SQL_VARCHAR, 50, 0);
    let (_fake, mut connection) = open_fake(script);

    let mut statement = connection.prepare("INSERT INTO t VALUES (?, ?)").unwrap();
    statement.bind_int(1, 1).unwrap();
    let err = statement.execute().unwrap_err();
    assert!(matches!(
        err,
        DbError::Misuse(MisuseError::UnboundParameter { position: 2 })
    ));
}

#[test]
fn test_bind_position_out_of_range() {
    let script = FakeScript::default().with_param(sys::SQL_INTEGER, 10, 0);
    let (_fake, mut connection) = open_fake(script);

    let mut statement = connection.prepare("INSERT INTO t VALUES (?)").unwrap();
    let err = statement.bind_int(2, 5).unwrap_err();
    assert!(matches!(
        err,
        DbError::Misuse(MisuseError::ParameterOutOfRange { position: 2, count: 1 })
    ));
    let err = statement.bind_int(0, 5).unwrap_err();
    assert!(matches!(
        err,
        DbError::Misuse(MisuseError::ParameterOutOfRange { position: 0, .. })
    ));
}

#[test]
fn test_value_out_of_native_range_rejected() {
    let script = FakeScript::default().with_param(sys::SQL_SMALLINT, 5, 0);
    let (_fake, mut connection) = open_fake(script);

    let mut statement = connection.prepare("INSERT INTO t VALUES (?)").unwrap();
    let err = statement.bind_int(1, 100_000).unwrap_err();
    assert!(matches!(
        err,
        DbError::Misuse(MisuseError::ValueOutOfRange { position: 1, .. })
    ));
}

#[test]
fn test_describe_fallback_binds_as_text() {
    let mut script = FakeScript::default();
    // One parameter, but the driver cannot describe parameters.
    script.params.push(unidbc::odbc::api::ParamDescription {
        data_type: sys::SQL_INTEGER,
        size: 10,
        decimal_digits: 0,
        nullable: true,
    });
    script.describe_params = false;
    let (fake, mut connection) = open_fake(script);

    let mut statement = connection.prepare("INSERT INTO t VALUES (?)").unwrap();
    statement.bind_int(1, 42).unwrap();

    let bound = fake.bound_param(1);
    assert_eq!(bound.sql_type, sys::SQL_VARCHAR);
    assert_eq!(bound.c_type_code, sys::SQL_C_CHAR);
    assert_eq!(bound.data.unwrap(), b"42".to_vec());
}

#[test]
fn test_decimal_rational_param_encoding() {
    let script = FakeScript::default().with_param(sys::SQL_DECIMAL, 10, 2);
    let (fake, mut connection) = open_fake(script);

    let mut statement = connection.prepare("INSERT INTO t VALUES (?)").unwrap();
    let value = BigRational::new(BigInt::from(1), BigInt::from(4));
    statement.bind_big_rational(1, &value).unwrap();

    let bound = fake.bound_param(1);
    assert_eq!(bound.c_type_code, sys::SQL_C_CHAR);
    assert_eq!(bound.data.unwrap(), b"0.25".to_vec());
}

#[test]
fn test_decimal_column_decoding() {
    let script = FakeScript::default()
        .with_column(FakeColumn::new("amount", sys::SQL_DECIMAL, 20).digits(2))
        .with_row(vec![cell_text("123.45")])
        .with_row(vec![cell_text("-7")]);
    let (_fake, mut connection) = open_fake(script);

    let mut statement = connection.prepare("SELECT amount FROM t").unwrap();
    statement.execute().unwrap();

    assert!(statement.fetch().unwrap());
    let value = statement.column_big_rational(1).unwrap();
    assert_eq!(value, BigRational::new(BigInt::from(12345), BigInt::from(100)));

    assert!(statement.fetch().unwrap());
    assert_eq!(statement.column_big_int(1).unwrap(), BigInt::from(-7));
}

#[test]
fn test_blob_after_bound_column_uses_two_call_protocol() {
    let payload = [1u8, 2, 3, 4, 5];
    let script = FakeScript::default()
        .with_column(FakeColumn::new("id", sys::SQL_INTEGER, 10))
        .with_column(FakeColumn::new("payload", sys::SQL_LONGVARBINARY, 0))
        .with_row(vec![cell_i32(7), cell_bytes(&payload)]);
    let (fake, mut connection) = open_fake(script);

    let mut statement = connection.prepare("SELECT id, payload FROM t").unwrap();
    statement.execute().unwrap();
    assert!(statement.fetch().unwrap());

    // Column 1 travels bound: exactly one fetch with one target, and no
    // get-data call for it.
    assert_eq!(fake.count_calls("fetch cols=1"), 1);
    assert_eq!(fake.count_calls("get_data col=1"), 0);

    // Column 2 is retrievable only via the probe-then-read pair.
    assert_eq!(fake.count_calls("get_data col=2 len=0"), 1);
    assert_eq!(
        fake.count_calls(&format!("get_data col=2 len={}", payload.len())),
        1
    );

    assert_eq!(statement.column_int(1).unwrap(), 7);
    assert_eq!(statement.column_bytes(2).unwrap(), payload.to_vec());
}

#[test]
fn test_columns_after_blob_are_fetched_unbound_in_order() {
    let script = FakeScript::default()
        .with_column(FakeColumn::new("payload", sys::SQL_LONGVARBINARY, 0))
        .with_column(FakeColumn::new("id", sys::SQL_INTEGER, 10))
        .with_row(vec![cell_bytes(&[9, 9]), cell_i32(3)]);
    let (fake, mut connection) = open_fake(script);

    let mut statement = connection.prepare("SELECT payload, id FROM t").unwrap();
    statement.execute().unwrap();
    assert!(statement.fetch().unwrap());

    // Nothing is bound once the first column is a large object.
    assert_eq!(fake.count_calls("fetch cols=0"), 1);
    // The trailing integer is read with a single sized retrieval, never a
    // zero-length probe.
    assert_eq!(fake.count_calls("get_data col=2 len=0"), 0);
    assert_eq!(fake.count_calls("get_data col=2"), 1);

    assert_eq!(statement.column_bytes(1).unwrap(), vec![9, 9]);
    assert_eq!(statement.column_int(2).unwrap(), 3);
}

#[test]
fn test_limited_concurrency_prefetches_whole_result_set() {
    let mut script = FakeScript::default()
        .with_column(FakeColumn::new("n", sys::SQL_INTEGER, 10))
        .with_row(vec![cell_i32(1)])
        .with_row(vec![cell_i32(2)])
        .with_row(vec![cell_i32(3)]);
    script.max_concurrent_statements = 1;
    let (fake, mut connection) = open_fake(script);

    let mut statement = connection.prepare("SELECT n FROM t").unwrap();
    statement.execute().unwrap();

    // All rows (plus the exhausted probe) were fetched during execute.
    assert_eq!(fake.count_calls("fetch cols="), 4);

    let mut seen = Vec::new();
    while statement.fetch().unwrap() {
        seen.push(statement.column_int(1).unwrap());
    }
    assert_eq!(seen, vec![1, 2, 3]);
    // No further native fetch was needed.
    assert_eq!(fake.count_calls("fetch cols="), 4);
}

#[test]
fn test_null_columns_read_domain_defaults() {
    let script = FakeScript::default()
        .with_column(FakeColumn::new("i", sys::SQL_INTEGER, 10))
        .with_column(FakeColumn::new("s", sys::SQL_VARCHAR, 20))
        .with_column(FakeColumn::new("b", sys::SQL_BIT, 1))
        .with_column(FakeColumn::new("by", sys::SQL_VARBINARY, 16))
        .with_column(FakeColumn::new("f", sys::SQL_DOUBLE, 15))
        .with_row(vec![
            cell_null(),
            cell_null(),
            cell_null(),
            cell_null(),
            cell_null(),
        ]);
    let (_fake, mut connection) = open_fake(script);

    let mut statement = connection.prepare("SELECT * FROM t").unwrap();
    statement.execute().unwrap();
    assert!(statement.fetch().unwrap());

    assert_eq!(statement.column_int(1).unwrap(), 0);
    assert_eq!(statement.column_string(2).unwrap(), "");
    assert!(!statement.column_bool(3).unwrap());
    assert_eq!(statement.column_bytes(4).unwrap(), Vec::<u8>::new());
    assert_eq!(statement.column_float(5).unwrap(), 0.0);
    for column in 1..=5 {
        assert!(statement.is_null(column).unwrap(), "column {column}");
    }
}

#[test]
fn test_wide_character_column_decodes() {
    let mut script = FakeScript::default()
        .with_column(FakeColumn::new("name", sys::SQL_VARCHAR, 30))
        .with_row(vec![cell_wide_text("héllo wörld")]);
    script.wide_chars = true;
    let (_fake, mut connection) = open_fake(script);

    let mut statement = connection.prepare("SELECT name FROM t").unwrap();
    statement.execute().unwrap();
    assert!(statement.fetch().unwrap());
    assert_eq!(statement.column_string(1).unwrap(), "héllo wörld");
}

#[test]
fn test_rebind_after_execute_restarts_cycle() {
    let script = FakeScript::default()
        .with_param(sys::SQL_INTEGER, 10, 0)
        .with_column(FakeColumn::new("n", sys::SQL_INTEGER, 10))
        .with_row(vec![cell_i32(11)])
        .with_row(vec![cell_i32(22)]);
    let (fake, mut connection) = open_fake(script);

    let mut statement = connection.prepare("SELECT n FROM t WHERE k = ?").unwrap();
    statement.bind_int(1, 1).unwrap();
    statement.execute().unwrap();
    assert!(statement.fetch().unwrap());
    assert_eq!(statement.column_int(1).unwrap(), 11);

    // Rebinding releases the cursor; the fresh execute starts over.
    statement.bind_int(1, 2).unwrap();
    assert!(fake.count_calls("close_cursor") >= 1);
    statement.execute().unwrap();
    assert!(statement.fetch().unwrap());
    assert_eq!(statement.column_int(1).unwrap(), 11);
}

#[test]
fn test_fetch_before_execute_rejected() {
    let script = FakeScript::default().with_column(FakeColumn::new("n", sys::SQL_INTEGER, 10));
    let (_fake, mut connection) = open_fake(script);

    let mut statement = connection.prepare("SELECT n FROM t").unwrap();
    let err = statement.fetch().unwrap_err();
    assert!(matches!(
        err,
        DbError::Misuse(MisuseError::ExecuteNotSuccessful)
    ));
}

#[test]
fn test_column_access_without_row_rejected() {
    let script = FakeScript::default()
        .with_column(FakeColumn::new("n", sys::SQL_INTEGER, 10))
        .with_row(vec![cell_i32(5)]);
    let (_fake, mut connection) = open_fake(script);

    let mut statement = connection.prepare("SELECT n FROM t").unwrap();
    statement.execute().unwrap();
    let err = statement.column_int(1).unwrap_err();
    assert!(matches!(err, DbError::Misuse(MisuseError::NoFetchedRow)));

    assert!(statement.fetch().unwrap());
    let err = statement.column_int(2).unwrap_err();
    assert!(matches!(
        err,
        DbError::Misuse(MisuseError::ColumnOutOfRange { column: 2, count: 1 })
    ));
}

#[test]
fn test_execute_failure_surfaces_and_records_diagnostic() {
    let mut script = FakeScript::default().with_column(FakeColumn::new("n", sys::SQL_INTEGER, 10));
    script.fail_execute = Some((-104, "Dynamic SQL Error".to_string()));
    let (_fake, mut connection) = open_fake(script);

    let mut statement = connection.prepare("SELECT broken").unwrap();
    let err = statement.execute().unwrap_err();
    match err {
        DbError::Native(native) => {
            assert_eq!(native.function, "execute");
            assert_eq!(native.native_function, "SQLExecute");
            assert_eq!(native.error_code, -104);
        }
        other => panic!("unexpected error {other:?}"),
    }
    // The process-wide record is shared between concurrently running
    // tests, so only its presence is asserted here; facade_tests pins the
    // exact contents.
    assert!(unidbc::last_diagnostic().is_some());
}

#[test]
fn test_mixed_interval_bind_rejected() {
    let script = FakeScript::default().with_param(sys::SQL_VARCHAR, 50, 0);
    let (_fake, mut connection) = open_fake(script);

    let mut statement = connection.prepare("INSERT INTO t VALUES (?)").unwrap();
    // P1Y2M3DT4H5M6.000007S: year/month and day/time cannot share one
    // native interval value.
    let duration = Duration::new(1, 2, 3, 4, 5, 6, 7);
    let err = statement.bind_duration(1, &duration).unwrap_err();
    assert!(matches!(
        err,
        DbError::Misuse(MisuseError::MixedIntervalFields)
    ));
}

#[test]
fn test_duration_bind_selects_interval_c_type() {
    let script = FakeScript::default().with_param(sys::SQL_VARCHAR, 50, 0);
    let (fake, mut connection) = open_fake(script);

    let mut statement = connection.prepare("INSERT INTO t VALUES (?)").unwrap();
    let duration = Duration::new(2, 3, 0, 0, 0, 0, 0);
    statement.bind_duration(1, &duration).unwrap();

    let bound = fake.bound_param(1);
    // YEAR TO MONTH is code 107 on the client side.
    assert_eq!(bound.c_type_code, 107);
}

#[test]
fn test_interval_column_decodes_struct() {
    let duration = Duration::new(0, 0, 2, 3, 0, 0, 0);
    let encoded = interval::encode(&duration).unwrap();
    let script = FakeScript::default()
        .with_column(FakeColumn::new(
            "span",
            sys::SQL_INTERVAL_DAY_TO_HOUR,
            0,
        ))
        .with_row(vec![Some(encoded.to_bytes().to_vec())]);
    let (_fake, mut connection) = open_fake(script);

    let mut statement = connection.prepare("SELECT span FROM t").unwrap();
    statement.execute().unwrap();
    assert!(statement.fetch().unwrap());
    assert_eq!(statement.column_duration(1).unwrap(), duration);
}

#[test]
fn test_interval_column_decodes_text() {
    let script = FakeScript::default()
        .with_column(FakeColumn::new("span", sys::SQL_VARCHAR, 60))
        .with_row(vec![cell_text("INTERVAL +'2 05:00:00' DAY TO SECOND")]);
    let (_fake, mut connection) = open_fake(script);

    let mut statement = connection.prepare("SELECT span FROM t").unwrap();
    statement.execute().unwrap();
    assert!(statement.fetch().unwrap());
    assert_eq!(
        statement.column_duration(1).unwrap(),
        Duration::new(0, 0, 2, 5, 0, 0, 0)
    );
}

#[test]
fn test_timestamp_column_decodes() {
    let stamp = SqlTimestamp {
        year: 2024,
        month: 6,
        day: 1,
        hour: 12,
        minute: 30,
        second: 15,
        fraction: 123_456_000,
    };
    let script = FakeScript::default()
        .with_column(FakeColumn::new("at", sys::SQL_TYPE_TIMESTAMP, 27).digits(6))
        .with_row(vec![Some(stamp.to_bytes().to_vec())]);
    let (_fake, mut connection) = open_fake(script);

    let mut statement = connection.prepare("SELECT at FROM t").unwrap();
    statement.execute().unwrap();
    assert!(statement.fetch().unwrap());

    let value = statement.column_time(1).unwrap();
    assert_eq!(value.year, 2024);
    assert_eq!(value.month, 6);
    assert_eq!(value.day, 1);
    assert_eq!(value.hour, 12);
    assert_eq!(value.minute, 30);
    assert_eq!(value.second, 15);
    assert_eq!(value.micro_second, 123_456);
}

#[test]
fn test_packed_numeric_round_trip_through_engine() {
    let numeric = decimal::encode_numeric_big_int(&BigInt::from(255)).unwrap();
    let script = FakeScript::default()
        .with_param(sys::SQL_NUMERIC, 18, 0)
        .with_column(FakeColumn::new("n", sys::SQL_NUMERIC, 18))
        .with_row(vec![Some(numeric.to_bytes().to_vec())]);
    let config = DriverConfig {
        numeric: NumericEncoding::Packed,
        ..DriverConfig::default()
    };
    let (fake, mut connection) = open_with_config(script, config);

    let mut statement = connection.prepare("SELECT n FROM t WHERE n = ?").unwrap();
    statement.bind_big_int(1, &BigInt::from(255)).unwrap();
    assert_eq!(fake.bound_param(1).c_type_code, sys::SQL_C_NUMERIC);

    statement.execute().unwrap();
    assert!(statement.fetch().unwrap());
    assert_eq!(statement.column_big_int(1).unwrap(), BigInt::from(255));
}

#[test]
fn test_overlong_bound_data_is_an_inconsistency() {
    // The driver promised a 4-byte integer and then reported 10 bytes.
    let script = FakeScript::default()
        .with_column(FakeColumn::new("n", sys::SQL_INTEGER, 10))
        .with_row(vec![cell_bytes(&[0; 10])]);
    let (_fake, mut connection) = open_fake(script);

    let mut statement = connection.prepare("SELECT n FROM t").unwrap();
    statement.execute().unwrap();
    assert!(statement.fetch().unwrap());
    let err = statement.column_int(1).unwrap_err();
    assert!(matches!(err, DbError::Internal(_)));
}

#[test]
fn test_comment_stripping_reaches_native_prepare() {
    let script = FakeScript::default();
    let (fake, mut connection) = open_fake(script);

    let _ = connection
        .prepare("SELECT 1 /* don't */ -- trailing\n")
        .unwrap();
    let log = fake.log_snapshot();
    let prepared = log
        .iter()
        .find(|entry| entry.starts_with("prepare"))
        .expect("prepare logged");
    assert_eq!(prepared, "prepare SELECT 1   \n");
}

#[test]
fn test_column_name_lookup() {
    let script = FakeScript::default()
        .with_column(FakeColumn::new("customer_id", sys::SQL_INTEGER, 10));
    let (_fake, mut connection) = open_fake(script);

    let mut statement = connection.prepare("SELECT customer_id FROM t").unwrap();
    assert_eq!(statement.column_count().unwrap(), 1);
    assert_eq!(statement.column_name(1).unwrap(), "customer_id");
    assert!(statement.column_name(2).is_err());
}
