//! In-memory provider for exercising the client without a database.

mod scripted;
mod test_helpers;

pub use scripted::{ScriptLog, ScriptedConnection, ScriptedProvider};
pub use test_helpers::{create_test_row, result_set};
