//! Outcomes of command execution: the non-query [`ExecuteResult`], and the
//! lazy [`ResultSet`] / [`CustomDbRow`] view over a provider cursor.

mod buffered;
mod execute_result;
mod result_set;
mod row;

pub use buffered::{BufferedCursor, BufferedResult};
pub use execute_result::ExecuteResult;
pub use result_set::{ResultSet, ResultSetReader, TableRows};
pub use row::{ColumnIndex, CustomDbRow};
