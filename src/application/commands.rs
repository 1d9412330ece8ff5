use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::domain::condition::{CommentStatus, Condition};
use crate::infrastructure::database::ConnectionSettings;
use crate::infrastructure::statement::OperationMode;

#[derive(Debug)]
pub struct SelectFilesCommand {
    pub settings: ConnectionSettings,
    pub conditions: Vec<Condition>,
    pub comment_status: CommentStatus,
    pub file_hints: String,
    pub print_level: i32,
    pub output_path: Option<PathBuf>,
    pub suppress_stdout: bool,
}

/// Where the mutation records come from.
#[derive(Debug)]
pub enum RecordSource {
    JsonFile(PathBuf),
    DirectInput,
    ColumnOptions(BTreeMap<String, String>),
}

#[derive(Debug)]
pub struct OperateCatalogCommand {
    pub settings: ConnectionSettings,
    pub mode: OperationMode,
    pub multi_tables: bool,
    pub source: RecordSource,
}
