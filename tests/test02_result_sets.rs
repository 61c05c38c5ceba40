use std::sync::Arc;

use sql_facade::prelude::*;
use sql_facade::provider::{DbCursor, FieldInfo};
use sql_facade::results::BufferedCursor;
use sql_facade::test_utils::{ScriptedProvider, create_test_row, result_set};

fn scripted_client(provider: &ScriptedProvider) -> Result<DbClient, SqlClientError> {
    DbClient::new(Arc::new(provider.clone()), "Server=scripted", true)
}

fn three_result_sets() -> Vec<sql_facade::results::BufferedResult> {
    vec![
        result_set(
            &["id", "name"],
            vec![
                vec![RowValues::Int(1), RowValues::Text("one".into())],
                vec![RowValues::Int(2), RowValues::Text("two".into())],
            ],
        ),
        result_set(&["total"], vec![vec![RowValues::Int(2)]]),
        result_set(&["empty"], Vec::new()),
    ]
}

#[test]
fn result_sets_arrive_in_order() -> Result<(), Box<dyn std::error::Error>> {
    let provider = ScriptedProvider::new();
    provider.push_reader(three_result_sets());
    let mut client = scripted_client(&provider)?;

    let mut reader =
        client.execute_reader(&Command::text("batch of three"), CommandBehavior::DEFAULT)?;
    let mut seen = Vec::new();
    while let Some(mut rs) = reader.next_result_set()? {
        let names = rs.column_names().to_vec();
        let rows = rs.collect_rows()?;
        seen.push((names, rows.len()));
    }
    assert_eq!(
        seen,
        vec![
            (vec!["id".to_string(), "name".to_string()], 2),
            (vec!["total".to_string()], 1),
            (vec!["empty".to_string()], 0),
        ]
    );
    assert!(reader.next_result_set()?.is_none());
    Ok(())
}

#[test]
fn skipping_a_result_set_discards_its_rows() -> Result<(), Box<dyn std::error::Error>> {
    let provider = ScriptedProvider::new();
    provider.push_reader(three_result_sets());
    let mut client = scripted_client(&provider)?;

    let mut reader =
        client.execute_reader(&Command::text("batch of three"), CommandBehavior::DEFAULT)?;
    let first_row = reader
        .next_result_set()?
        .expect("first")
        .next_row()?
        .expect("row");
    assert_eq!(first_row.get("id"), Some(&RowValues::Int(1)));

    let mut second = reader.next_result_set()?.expect("second");
    assert_eq!(second.ordinal("TOTAL"), Some(0));
    assert_eq!(second.next_row()?.and_then(|r| r.get("total").cloned()), Some(RowValues::Int(2)));

    // Rows already yielded stay readable after the cursor moved on.
    assert_eq!(first_row.get("name"), Some(&RowValues::Text("one".into())));
    Ok(())
}

#[test]
fn duplicate_column_names_are_suffixed() -> Result<(), Box<dyn std::error::Error>> {
    let provider = ScriptedProvider::new();
    provider.push_reader(vec![result_set(
        &["A", "a", "B"],
        vec![vec![
            RowValues::Int(1),
            RowValues::Int(2),
            RowValues::Int(3),
        ]],
    )]);
    let mut client = scripted_client(&provider)?;

    let mut reader = client.execute_reader(&Command::text("dupes"), CommandBehavior::DEFAULT)?;
    let mut rs = reader.next_result_set()?.expect("result");
    assert_eq!(rs.column_names(), ["A", "a_1", "B"]);
    let row = rs.next_row()?.expect("row");
    assert_eq!(row.get("a"), Some(&RowValues::Int(1)));
    assert_eq!(row.get("A_1"), Some(&RowValues::Int(2)));
    assert_eq!(row.get("b"), Some(&RowValues::Int(3)));
    assert_eq!(row.column_names(), ["A", "a_1", "B"]);
    Ok(())
}

#[test]
fn empty_reader_has_no_result_sets() -> Result<(), Box<dyn std::error::Error>> {
    let provider = ScriptedProvider::new();
    let mut client = scripted_client(&provider)?;

    let mut reader = client.execute_reader(&Command::text("nothing"), CommandBehavior::DEFAULT)?;
    assert!(reader.next_result_set()?.is_none());
    assert!(reader.next_result_set()?.is_none());
    Ok(())
}

#[test]
fn single_row_behavior_truncates() -> Result<(), Box<dyn std::error::Error>> {
    let provider = ScriptedProvider::new();
    provider.push_reader(three_result_sets());
    let mut client = scripted_client(&provider)?;

    let mut reader =
        client.execute_reader(&Command::text("batch of three"), CommandBehavior::SINGLE_ROW)?;
    let rows = reader.next_result_set()?.expect("first").collect_rows()?;
    assert_eq!(rows.len(), 1);
    assert!(reader.next_result_set()?.is_none());
    assert_eq!(provider.log().behaviors, vec![CommandBehavior::SINGLE_ROW]);
    Ok(())
}

#[test]
fn result_set_iterates_rows() -> Result<(), Box<dyn std::error::Error>> {
    let provider = ScriptedProvider::new();
    provider.push_reader(three_result_sets());
    let mut client = scripted_client(&provider)?;

    let mut reader =
        client.execute_reader(&Command::text("batch of three"), CommandBehavior::DEFAULT)?;
    let ids: Vec<i64> = reader
        .next_result_set()?
        .expect("first")
        .map(|row| row.map(|r| *r.get("id").and_then(RowValues::as_int).unwrap_or(&0)))
        .collect::<Result<_, _>>()?;
    assert_eq!(ids, [1, 2]);
    Ok(())
}

#[test]
fn closed_cursor_reports_cursor_closed() -> Result<(), Box<dyn std::error::Error>> {
    let mut cursor = BufferedCursor::new(three_result_sets(), CommandBehavior::DEFAULT);
    cursor.close()?;
    let mut reader = ResultSetReader::from_cursor(Box::new(cursor));
    assert!(matches!(
        reader.next_result_set(),
        Err(SqlClientError::CursorClosed)
    ));
    Ok(())
}

#[test]
fn mismatched_row_width_is_an_error() -> Result<(), Box<dyn std::error::Error>> {
    let cursor = BufferedCursor::new(
        vec![sql_facade::results::BufferedResult::new(
            FieldInfo::from_names(&["a", "b"]),
            vec![vec![RowValues::Int(1)]],
        )],
        CommandBehavior::DEFAULT,
    );
    let mut reader = ResultSetReader::from_cursor(Box::new(cursor));
    let mut rs = reader.next_result_set()?.expect("result");
    assert!(matches!(rs.next_row(), Err(SqlClientError::ExecutionError(_))));
    Ok(())
}

#[tokio::test]
async fn async_reader_matches_sync_reader() -> Result<(), Box<dyn std::error::Error>> {
    let cancel = CancellationToken::new();
    let provider = ScriptedProvider::new();
    provider.push_reader(three_result_sets());
    let mut client = scripted_client(&provider)?;

    let mut reader = client
        .execute_reader_async(&Command::text("batch of three"), CommandBehavior::DEFAULT, &cancel)
        .await?;
    let mut counts = Vec::new();
    while let Some(mut rs) = reader.next_result_set_async(&cancel).await? {
        counts.push(rs.collect_rows_async(&cancel).await?.len());
    }
    assert_eq!(counts, [2, 1, 0]);
    Ok(())
}

#[test]
fn test_helper_rows_look_up_by_name() {
    let row = create_test_row(
        &["id", "label"],
        vec![RowValues::Int(7), RowValues::Text("seven".into())],
    );
    assert_eq!(row.get_column_index("LABEL"), Some(1));
    assert_eq!(row.get("label").and_then(RowValues::as_text), Some("seven"));
    assert_eq!(row.len(), 2);
}
