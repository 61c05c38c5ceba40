use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use sql_facade::prelude::*;
use sql_facade::test_utils::ScriptedProvider;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriter;

#[derive(Clone, Default)]
struct CaptureWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl CaptureWriter {
    fn contents(&self) -> String {
        let buf = self.buf.lock().expect("capture lock");
        String::from_utf8_lossy(&buf).into_owned()
    }
}

struct CaptureGuard {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl<'a> MakeWriter<'a> for CaptureWriter {
    type Writer = CaptureGuard;

    fn make_writer(&'a self) -> Self::Writer {
        CaptureGuard {
            buf: Arc::clone(&self.buf),
        }
    }
}

impl Write for CaptureGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.lock().expect("capture lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn capture<F: FnOnce()>(level: Level, func: F) -> String {
    let writer = CaptureWriter::default();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(false)
        .with_writer(writer.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, func);
    writer.contents()
}

const SECRET_CONNECTION: &str =
    "Server=db.local;User ID=app_user;Password=hunter2;Persist Security Info=True";

#[test]
fn open_log_never_contains_credentials() {
    let provider = ScriptedProvider::new();
    let logs = capture(Level::DEBUG, || {
        let mut client =
            DbClient::new(Arc::new(provider.clone()), SECRET_CONNECTION, true).expect("client");
        client.open_connection().expect("open");
    });

    assert!(logs.contains("opening scripted connection: Server=db.local;Persist Security Info=False"));
    assert!(!logs.contains("hunter2"));
    assert!(!logs.contains("app_user"));
    assert_eq!(provider.log().connection_strings, [SECRET_CONNECTION]);
}

#[test]
fn commands_and_transactions_are_logged() {
    let provider = ScriptedProvider::new();
    let logs = capture(Level::DEBUG, || {
        let mut client =
            DbClient::new(Arc::new(provider.clone()), "Server=db", true).expect("client");
        let tx = client
            .begin_transaction(IsolationLevel::Snapshot)
            .expect("transaction");
        tx.commit().expect("commit");
        client
            .execute(&Command::stored_procedure("\"dbo\".\"cleanup\""))
            .expect("execute");
    });

    assert!(logs.contains("beginning transaction with isolation level Snapshot"));
    assert!(logs.contains("executing command: \"dbo\".\"cleanup\""));
    assert!(logs.contains("StoredProcedure"));
}

#[test]
fn nothing_is_logged_below_the_enabled_level() {
    let provider = ScriptedProvider::new();
    let logs = capture(Level::INFO, || {
        let mut client =
            DbClient::new(Arc::new(provider.clone()), SECRET_CONNECTION, true).expect("client");
        client.execute(&Command::text("select 1")).expect("execute");
    });
    assert!(logs.is_empty());
}

#[test]
fn close_failure_on_drop_is_a_warning() {
    let provider = ScriptedProvider::new();
    provider.fail_close(true);
    let logs = capture(Level::WARN, || {
        let client = DbClient::new(Arc::new(provider.clone()), "Server=db", true).expect("client");
        drop(client);
    });
    assert!(logs.contains("WARN"));
    assert!(logs.contains("failed to close connection while dropping client"));
}

#[test]
fn settings_debug_output_is_redacted() {
    let settings = ClientSettings::new(Arc::new(ScriptedProvider::new()), SECRET_CONNECTION);
    let rendered = format!("{settings:?}");
    assert!(!rendered.contains("hunter2"));
    assert!(rendered.contains("Persist Security Info=False"));

    let unparseable = ClientSettings::new(Arc::new(ScriptedProvider::new()), "Server='unterminated");
    let rendered = format!("{unparseable:?}");
    assert!(!rendered.contains("unterminated"));
}
