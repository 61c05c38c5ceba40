#![cfg(feature = "sqlite")]

use std::sync::Arc;
use std::time::Duration;

use sql_facade::prelude::*;
use tempfile::tempdir;

fn unique_db_path(prefix: &str) -> String {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join(format!("{prefix}.db"));
    // Leak the tempdir so the file persists for the duration of the test binary.
    std::mem::forget(dir);
    path.to_string_lossy().into_owned()
}

fn sqlite_client(prefix: &str) -> Result<DbClient, SqlClientError> {
    DbClient::new(
        Arc::new(SqliteProviderFactory),
        format!("Data Source={}", unique_db_path(prefix)),
        true,
    )
}

fn seed(client: &mut DbClient) -> Result<(), SqlClientError> {
    client.execute(&Command::text(
        "CREATE TABLE people (id INTEGER PRIMARY KEY, name TEXT NOT NULL, score REAL);
         INSERT INTO people (id, name, score) VALUES (1, 'alice', 1.5), (2, 'bob', NULL), (3, 'carol', 3.0);",
    ))?;
    Ok(())
}

fn count_people(client: &mut DbClient) -> Result<i64, SqlClientError> {
    let mut reader = client.execute_reader(
        &Command::text("SELECT COUNT(*) AS cnt FROM people"),
        CommandBehavior::SINGLE_ROW,
    )?;
    let mut rs = reader
        .next_result_set()?
        .ok_or_else(|| SqlClientError::ExecutionError("missing result".into()))?;
    let row = rs
        .next_row()?
        .ok_or_else(|| SqlClientError::ExecutionError("missing row".into()))?;
    Ok(*row.get("cnt").and_then(RowValues::as_int).unwrap_or(&-1))
}

#[test]
fn opens_lazily_and_reports_rows_affected() -> Result<(), Box<dyn std::error::Error>> {
    let mut client = sqlite_client("rows_affected")?;
    assert_eq!(client.connection_state()?, ConnectionState::Closed);

    seed(&mut client)?;
    assert_eq!(client.connection_state()?, ConnectionState::Open);

    let updated = client.execute(
        &Command::text("UPDATE people SET score = :score WHERE id >= :min_id")
            .with_parameter(Parameter::input(":score", 9.5))
            .with_parameter(Parameter::input("min_id", 2)),
    )?;
    assert_eq!(updated.code(), 2);
    assert!(updated.output_parameters().is_empty());

    let selected = client.execute(&Command::text("SELECT * FROM people"))?;
    assert_eq!(selected.code(), -1);

    client.dispose()?;
    assert!(matches!(
        client.connection_state(),
        Err(SqlClientError::ObjectDisposed(_))
    ));
    Ok(())
}

#[test]
fn reader_walks_multiple_result_sets() -> Result<(), Box<dyn std::error::Error>> {
    let mut client = sqlite_client("multi_result")?;
    seed(&mut client)?;

    let mut reader = client.execute_reader(
        &Command::text(
            "SELECT id, name FROM people ORDER BY id;
             SELECT 'x' AS a, 'y' AS a;",
        ),
        CommandBehavior::DEFAULT,
    )?;

    {
        let mut first = reader.next_result_set()?.expect("first result set");
        assert_eq!(first.column_names(), ["id", "name"]);
        let declared: Vec<_> = first
            .fields()
            .iter()
            .map(|f| (f.ordinal, f.declared_type.as_deref()))
            .collect();
        assert_eq!(declared, [(0, Some("INTEGER")), (1, Some("TEXT"))]);
        let rows = first.collect_rows()?;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get("NAME"), Some(&RowValues::Text("alice".into())));
        assert_eq!(rows[2].get_by_index(0), Some(&RowValues::Int(3)));
        assert_eq!(first.next_row()?, None);
    }
    {
        let mut second = reader.next_result_set()?.expect("second result set");
        assert_eq!(second.column_names(), ["a", "a_1"]);
        assert!(second.fields().iter().all(|f| f.declared_type.is_none()));
        let row = second.next_row()?.expect("row");
        assert_eq!(row.get("a_1"), Some(&RowValues::Text("y".into())));
    }
    assert!(reader.next_result_set()?.is_none());
    assert!(reader.next_result_set()?.is_none());
    reader.close()?;
    Ok(())
}

#[test]
fn single_result_stops_the_batch() -> Result<(), Box<dyn std::error::Error>> {
    let mut client = sqlite_client("single_result")?;
    seed(&mut client)?;

    {
        let mut reader = client.execute_reader(
            &Command::text("SELECT name FROM people WHERE id = 1; DELETE FROM people;"),
            CommandBehavior::SINGLE_RESULT,
        )?;
        let rows = reader.next_result_set()?.expect("result").collect_rows()?;
        assert_eq!(rows.len(), 1);
        assert!(reader.next_result_set()?.is_none());
    }
    assert_eq!(count_people(&mut client)?, 3);
    Ok(())
}

#[test]
fn positional_parameters_fill_question_marks() -> Result<(), Box<dyn std::error::Error>> {
    let mut client = sqlite_client("positional")?;
    seed(&mut client)?;

    let inserted = client.execute(
        &Command::text("INSERT INTO people (id, name, score) VALUES (?, ?, ?)")
            .with_parameters([
                Parameter::positional(4),
                Parameter::positional("dave"),
                Parameter::positional(RowValues::Null),
            ]),
    )?;
    assert_eq!(inserted.code(), 1);

    let mut reader = client.execute_reader(
        &Command::text("SELECT name, score FROM people WHERE id = ?1").with_parameter(Parameter::positional(4)),
        CommandBehavior::DEFAULT,
    )?;
    let row = reader
        .next_result_set()?
        .and_then(|mut rs| rs.next_row().transpose())
        .transpose()?
        .expect("row");
    assert_eq!(row.get("name").and_then(RowValues::as_text), Some("dave"));
    assert!(row.get("score").is_some_and(RowValues::is_null));
    Ok(())
}

#[test]
fn missing_parameter_value_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let mut client = sqlite_client("missing_param")?;
    seed(&mut client)?;

    let err = client
        .execute(&Command::text("DELETE FROM people WHERE id = :id"))
        .unwrap_err();
    assert!(matches!(err, SqlClientError::ParameterError(ref msg) if msg.contains(":id")));

    let err = client
        .execute(
            &Command::text("DELETE FROM people WHERE id = :id")
                .with_parameter(Parameter::input(":id", 1))
                .with_parameter(Parameter::output("@total", "int")),
        )
        .unwrap_err();
    assert!(matches!(err, SqlClientError::ParameterError(_)));
    assert_eq!(count_people(&mut client)?, 3);
    Ok(())
}

#[test]
fn stored_procedures_are_not_supported() -> Result<(), Box<dyn std::error::Error>> {
    let mut client = sqlite_client("procedures")?;
    let command = client.stored_procedure_command("main", "do_work", [Parameter::input("@a", 1)]);
    assert_eq!(command.command_text(), "\"main\".\"do_work\"");
    assert_eq!(command.kind(), CommandKind::StoredProcedure);

    let err = client
        .execute_stored_procedure("main", "do_work", Vec::new())
        .unwrap_err();
    assert!(matches!(err, SqlClientError::Unimplemented(_)));
    Ok(())
}

#[test]
fn table_direct_and_enumerate_read_whole_tables() -> Result<(), Box<dyn std::error::Error>> {
    let mut client = sqlite_client("table_direct")?;
    seed(&mut client)?;

    let mut reader =
        client.execute_reader(&Command::table_direct("people"), CommandBehavior::DEFAULT)?;
    let rows = reader.next_result_set()?.expect("result").collect_rows()?;
    assert_eq!(rows.len(), 3);
    drop(reader);

    let table = client.enumerate_table_or_view("main", "people")?;
    assert_eq!(table.column_names(), ["id", "name", "score"]);
    let names: Vec<String> = table
        .map(|row| row.map(|r| r.get("name").and_then(RowValues::as_text).unwrap_or_default().to_string()))
        .collect::<Result<_, _>>()?;
    assert_eq!(names, ["alice", "bob", "carol"]);
    Ok(())
}

#[test]
fn transactions_commit_and_roll_back() -> Result<(), Box<dyn std::error::Error>> {
    let mut client = sqlite_client("transactions")?;
    seed(&mut client)?;

    let mut tx = client.begin_transaction(IsolationLevel::ReadCommitted)?;
    assert_eq!(tx.isolation_level(), IsolationLevel::ReadCommitted);
    tx.execute(&Command::text("DELETE FROM people WHERE id = 1"))?;
    tx.rollback()?;
    assert_eq!(count_people(&mut client)?, 3);

    let mut tx = client.begin_transaction(IsolationLevel::Serializable)?;
    let deleted = tx.execute(&Command::text("DELETE FROM people WHERE id = 1"))?;
    assert_eq!(deleted.code(), 1);
    tx.commit()?;
    assert_eq!(count_people(&mut client)?, 2);

    let mut tx = client.begin_transaction(IsolationLevel::ReadUncommitted)?;
    tx.execute(&Command::text("DELETE FROM people"))?;
    tx.commit()?;
    assert_eq!(count_people(&mut client)?, 0);

    let err = client
        .begin_transaction(IsolationLevel::Snapshot)
        .unwrap_err();
    assert!(matches!(err, SqlClientError::Unimplemented(_)));
    Ok(())
}

#[test]
fn failed_statement_keeps_earlier_batch_work() -> Result<(), Box<dyn std::error::Error>> {
    let mut client = sqlite_client("batch_failure")?;
    seed(&mut client)?;

    let err = client
        .execute(&Command::text(
            "INSERT INTO people (id, name) VALUES (10, 'eve'); INSERT INTO people (id, name) VALUES (10, 'dup');",
        ))
        .unwrap_err();
    assert!(matches!(err, SqlClientError::SqliteError(_)));
    assert_eq!(count_people(&mut client)?, 4);
    assert_eq!(client.connection_state()?, ConnectionState::Open);
    Ok(())
}

#[test]
fn bad_connection_strings_fail_at_construction() {
    let err = DbClient::new(Arc::new(SqliteProviderFactory), "Mode=ReadWrite", true).unwrap_err();
    assert!(matches!(err, SqlClientError::ConfigError(_)));

    let err = DbClient::new(
        Arc::new(SqliteProviderFactory),
        "Data Source=x.db;Password=secret",
        true,
    )
    .unwrap_err();
    assert!(matches!(err, SqlClientError::ConfigError(_)));
}

#[tokio::test]
async fn async_forms_match_sync_behavior() -> Result<(), Box<dyn std::error::Error>> {
    let cancel = CancellationToken::new();
    let mut client = sqlite_client("async_forms")?;

    client.open_connection_async(&cancel).await?;
    assert_eq!(client.connection_state()?, ConnectionState::Open);

    client
        .execute_async(
            &Command::text("CREATE TABLE kv (k TEXT PRIMARY KEY, v INTEGER)"),
            &cancel,
        )
        .await?;
    let inserted = client
        .execute_async(
            &Command::text("INSERT INTO kv (k, v) VALUES (@k, @v)")
                .with_timeout(Duration::from_secs(2))
                .with_parameter(Parameter::input("@k", "a"))
                .with_parameter(Parameter::input("@v", 1)),
            &cancel,
        )
        .await?;
    assert_eq!(inserted.code(), 1);

    let mut tx = client
        .begin_transaction_async(IsolationLevel::Unspecified, &cancel)
        .await?;
    tx.execute_async(&Command::text("INSERT INTO kv (k, v) VALUES ('b', 2)"), &cancel)
        .await?;
    tx.commit_async(&cancel).await?;

    let mut reader = client
        .execute_reader_async(
            &Command::text("SELECT k, v FROM kv ORDER BY k"),
            CommandBehavior::DEFAULT,
            &cancel,
        )
        .await?;
    let mut rs = reader
        .next_result_set_async(&cancel)
        .await?
        .expect("result set");
    let rows = rs.collect_rows_async(&cancel).await?;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].get("v"), Some(&RowValues::Int(2)));
    drop(reader);

    let mut table = client
        .enumerate_table_or_view_async("", "kv", &cancel)
        .await?;
    let mut count = 0;
    while table.next_row_async(&cancel).await?.is_some() {
        count += 1;
    }
    assert_eq!(count, 2);
    Ok(())
}

#[tokio::test]
async fn cancelled_token_stops_async_calls() -> Result<(), Box<dyn std::error::Error>> {
    let mut client = sqlite_client("cancelled")?;
    client.open_connection()?;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = client
        .execute_async(&Command::text("CREATE TABLE t (a INTEGER)"), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, SqlClientError::Cancelled));

    let live = CancellationToken::new();
    let result = client
        .execute_async(&Command::text("CREATE TABLE t (a INTEGER)"), &live)
        .await?;
    assert_eq!(result.code(), 0);
    Ok(())
}

#[tokio::test]
async fn cancellation_interrupts_a_running_statement() -> Result<(), Box<dyn std::error::Error>> {
    let mut client = sqlite_client("interrupt")?;
    client.open_connection()?;

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let endless = Command::text(
        "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c) SELECT count(*) FROM c",
    );
    let outcome = tokio::time::timeout(
        Duration::from_secs(10),
        client.execute_async(&endless, &cancel),
    )
    .await?;
    assert!(matches!(outcome, Err(SqlClientError::Cancelled)));
    assert_eq!(client.connection_state()?, ConnectionState::Open);

    let live = CancellationToken::new();
    let result = client
        .execute_async(&Command::text("CREATE TABLE after_interrupt (a INTEGER)"), &live)
        .await?;
    assert_eq!(result.code(), 0);
    Ok(())
}

#[tokio::test]
async fn abandoned_async_open_leaves_client_usable() -> Result<(), Box<dyn std::error::Error>> {
    let mut client = sqlite_client("abandoned_open")?;
    let cancel = CancellationToken::new();
    tokio::select! {
        biased;
        _ = client.open_connection_async(&cancel) => {}
        () = std::future::ready(()) => {}
    }
    assert_ne!(client.connection_state()?, ConnectionState::Connecting);

    let result = client.execute(&Command::text("CREATE TABLE t (a INTEGER)"))?;
    assert_eq!(result.code(), 0);
    assert_eq!(client.connection_state()?, ConnectionState::Open);
    Ok(())
}
