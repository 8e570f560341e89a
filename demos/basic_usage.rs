//! Basic usage example for the unidbc runtime.
//!
//! Requires a driver-manager client library on the host (see
//! `UNIDBC_ODBC_LIBRARY`) and a configured data source. Adjust the
//! constants below to match your environment.

use std::error::Error;

use unidbc::{open, ConnectParams, Connection};

const HOST: &str = "localhost";
const PORT: u16 = 0;
const DATA_SOURCE: &str = "example";
const USER: &str = "tester";
const PASSWORD: &str = "tester";

/// Establishes a connection through the driver-manager back-end.
fn example_connection() -> Result<Connection, Box<dyn Error>> {
    let params = ConnectParams::new(HOST, PORT, DATA_SOURCE, USER, PASSWORD);
    let connection = open("odbc", &params)?;
    Ok(connection)
}

/// Executes a simple arithmetic query and returns the result.
fn example_simple_select(connection: &Connection) -> Result<i64, Box<dyn Error>> {
    let statement = connection.prepare("SELECT 1+1")?;
    statement.execute()?;
    statement.fetch()?;
    Ok(statement.column_int(1)?)
}

/// Demonstrates a full cycle: create table, insert with parameters, commit,
/// select, cleanup.
fn example_transaction(connection: &Connection) -> Result<usize, Box<dyn Error>> {
    let create = connection.prepare("CREATE TABLE test_example (id INT, name VARCHAR(100))")?;
    create.execute()?;

    connection.set_auto_commit(false)?;
    let insert = connection.prepare("INSERT INTO test_example VALUES (?, ?)")?;
    for (id, name) in [(1, "Alice"), (2, "Bob"), (3, "Charlie")] {
        insert.bind_int(1, id)?;
        insert.bind_string(2, name)?;
        insert.execute()?;
    }
    connection.commit()?;

    let select = connection.prepare("SELECT id, name FROM test_example ORDER BY id")?;
    select.execute()?;
    let mut rows = 0;
    while select.fetch()? {
        let id = select.column_int(1)?;
        let name = select.column_string(2)?;
        println!("  {id}: {name}");
        rows += 1;
    }

    let drop_table = connection.prepare("DROP TABLE test_example")?;
    drop_table.execute()?;
    connection.commit()?;
    Ok(rows)
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let connection = example_connection()?;
    println!("Connected: {connection:?}");

    let value = example_simple_select(&connection)?;
    println!("Simple select: 1+1 = {value}");

    let rows = example_transaction(&connection)?;
    println!("Transaction: {rows} row(s)");

    connection.close()?;
    println!("Done");

    Ok(())
}
