use std::collections::HashMap;
use std::fmt::{self, Display};

use crate::domain::schema::TableSchema;

/// Destination table for observation data files.
pub const DATA_2A_TBL: &str = "data_2a_tbl";
/// Destination table for simulation files.
pub const MC_SIMU_TBL: &str = "mc_simu_tbl";
/// Destination table for reconstruction files.
pub const MC_RECO_TBL: &str = "mc_reco_tbl";

const TEST_TABLE_PREFIX: &str = "test_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationMode {
    Insert,
    Update,
    Delete,
}

impl OperationMode {
    pub fn from_index(index: i32) -> Option<Self> {
        match index {
            1 => Some(OperationMode::Insert),
            2 => Some(OperationMode::Update),
            3 => Some(OperationMode::Delete),
            _ => None,
        }
    }

    /// The SQL keyword every statement of this mode must start with.
    pub fn verb(self) -> &'static str {
        match self {
            OperationMode::Insert => "insert",
            OperationMode::Update => "update",
            OperationMode::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementError {
    InvalidTable(String),
    MissingLfnColumn,
    EmptyRecord,
    UnroutableRecord(String),
    TableMismatch { configured: String, routed: String },
    WidthMismatch { expected: usize, actual: usize },
}

impl Display for StatementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementError::InvalidTable(table) => {
                write!(f, "Invalid table name `{table}`")
            }
            StatementError::MissingLfnColumn => {
                f.write_str("No LFN column among the active columns")
            }
            StatementError::EmptyRecord => f.write_str("Nothing from the record source"),
            StatementError::UnroutableRecord(lfn) => {
                write!(f, "No destination table recognized from LFN `{lfn}`")
            }
            StatementError::TableMismatch { configured, routed } => {
                write!(
                    f,
                    "Configured table `{configured}` and routed table `{routed}` do not match"
                )
            }
            StatementError::WidthMismatch { expected, actual } => {
                write!(
                    f,
                    "Record width does not match: {actual} from the record, {expected} internally"
                )
            }
        }
    }
}

impl std::error::Error for StatementError {}

/// Classify an LFN into its destination table by the fixed substrings the
/// production chain embeds in file names.
pub fn route_table(lfn: &str) -> Option<&'static str> {
    if lfn.contains("DAMPE_2A_OBS") {
        Some(DATA_2A_TBL)
    } else if lfn.contains(".mc.root") {
        Some(MC_SIMU_TBL)
    } else if lfn.contains(".reco.root") {
        Some(MC_RECO_TBL)
    } else {
        None
    }
}

fn is_canonical_table(name: &str) -> bool {
    let bare = name.strip_prefix(TEST_TABLE_PREFIX).unwrap_or(name);
    if bare != name && [DATA_2A_TBL, MC_SIMU_TBL, MC_RECO_TBL].contains(&bare) {
        tracing::info!(table = %name, "test table used");
        return true;
    }
    [DATA_2A_TBL, MC_SIMU_TBL, MC_RECO_TBL].contains(&name)
}

/// Per-batch context shared by every statement of one run: the configured
/// table, the LFN position, and the columns that actually carry values.
#[derive(Debug, Clone)]
pub struct MutationContext {
    table: String,
    multi_table: bool,
    lfn_index: Option<usize>,
    active_columns: Vec<String>,
    positions: HashMap<String, usize>,
    full_width: usize,
}

impl MutationContext {
    /// `active` holds the schema positions of the columns that are
    /// non-empty across the whole batch, in schema order.
    pub fn new(schema: &TableSchema, active: &[usize], table: &str, multi_table: bool) -> Self {
        let mut lfn_index = None;
        let mut active_columns = Vec::with_capacity(active.len());
        for &position in active {
            let Some(column) = schema.columns().get(position) else {
                tracing::warn!(position, "active position outside the schema, skipping it");
                continue;
            };
            if column.name == "lfn" {
                if lfn_index.is_some() {
                    tracing::warn!(position, "multiple LFN columns detected, keeping the first");
                } else {
                    lfn_index = Some(position);
                }
            }
            active_columns.push(column.name.clone());
        }

        let positions = schema
            .columns()
            .iter()
            .enumerate()
            .map(|(position, column)| (column.name.clone(), position))
            .collect();

        Self {
            table: table.to_string(),
            multi_table,
            lfn_index,
            active_columns,
            positions,
            full_width: schema.len(),
        }
    }

    fn has_skipped_columns(&self) -> bool {
        self.active_columns.len() < self.full_width
    }
}

/// Turns one record into one mutation statement. The invariant leading
/// clause is built once; each record then only fills in its values.
#[derive(Debug, Clone)]
pub struct MutationTemplate {
    mode: OperationMode,
    context: MutationContext,
    leading: String,
}

impl MutationTemplate {
    /// Validate the context for `mode` and build the leading clause.
    pub fn prepare(
        mode: OperationMode,
        context: MutationContext,
    ) -> Result<Self, StatementError> {
        if context.table.is_empty() || !is_canonical_table(&context.table) {
            return Err(StatementError::InvalidTable(context.table.clone()));
        }
        if mode != OperationMode::Delete && context.lfn_index.is_none() {
            return Err(StatementError::MissingLfnColumn);
        }

        let leading = match mode {
            OperationMode::Insert => format!(
                "insert into {} ({}) values ('",
                context.table,
                context.active_columns.join(", ")
            ),
            OperationMode::Update => format!("update {} set ", context.table),
            OperationMode::Delete => format!("delete from {} where ", context.table),
        };

        Ok(Self {
            mode,
            context,
            leading,
        })
    }

    pub fn mode(&self) -> OperationMode {
        self.mode
    }

    /// Synthesize the statement for one record.
    pub fn statement_for(&self, record: &[String]) -> Result<String, StatementError> {
        if record.is_empty() {
            return Err(StatementError::EmptyRecord);
        }

        let routed = self.route(record)?;
        let mut statement = self.leading.clone();
        if routed != self.context.table {
            if !self.context.multi_table {
                return Err(StatementError::TableMismatch {
                    configured: self.context.table.clone(),
                    routed: routed.to_string(),
                });
            }
            tracing::warn!(
                configured = %self.context.table,
                routed,
                "tables do not match, rewriting for this record"
            );
            statement = statement.replacen(&self.context.table, routed, 1);
        }

        let statement = match self.mode {
            OperationMode::Insert => self.fill_insert(statement, record),
            OperationMode::Update => self.fill_update(statement, record)?,
            OperationMode::Delete => self.fill_delete(statement, record)?,
        };

        Ok(self.finalize(statement))
    }

    fn route(&self, record: &[String]) -> Result<&'static str, StatementError> {
        let lfn = self
            .context
            .lfn_index
            .and_then(|index| record.get(index))
            .ok_or(StatementError::MissingLfnColumn)?;
        route_table(lfn).ok_or_else(|| StatementError::UnroutableRecord(lfn.clone()))
    }

    fn fill_insert(&self, mut statement: String, record: &[String]) -> String {
        statement.push_str(&record.join("', '"));
        statement.push_str("')");
        statement
    }

    fn fill_update(
        &self,
        mut statement: String,
        record: &[String],
    ) -> Result<String, StatementError> {
        if record.len() != self.context.full_width {
            return Err(StatementError::WidthMismatch {
                expected: self.context.full_width,
                actual: record.len(),
            });
        }
        let lfn_index = self
            .context
            .lfn_index
            .ok_or(StatementError::MissingLfnColumn)?;

        for column in &self.context.active_columns {
            let Some(&position) = self.context.positions.get(column) else {
                continue;
            };
            if position == lfn_index {
                continue;
            }
            statement.push_str(column);
            if record[position].is_empty() {
                statement.push_str(" is NULL, ");
            } else {
                statement.push_str(" = '");
                statement.push_str(&record[position]);
                statement.push_str("', ");
            }
        }
        trim_trailing(&mut statement, ", ");

        statement.push_str(" where lfn = '");
        statement.push_str(&record[lfn_index]);
        statement.push('\'');
        Ok(statement)
    }

    fn fill_delete(
        &self,
        mut statement: String,
        record: &[String],
    ) -> Result<String, StatementError> {
        if record.len() != self.context.full_width {
            return Err(StatementError::WidthMismatch {
                expected: self.context.full_width,
                actual: record.len(),
            });
        }

        for column in &self.context.active_columns {
            let Some(&position) = self.context.positions.get(column) else {
                continue;
            };
            statement.push_str(column);
            if record[position].is_empty() {
                statement.push_str(" is NULL and ");
            } else {
                statement.push_str(" = '");
                statement.push_str(&record[position]);
                statement.push_str("' and ");
            }
        }
        trim_trailing(&mut statement, " and ");
        Ok(statement)
    }

    /// Fixed two-stage rewrite: the common pass, then the mode-specific one.
    fn finalize(&self, statement: String) -> String {
        let statement = rewrite_boolean_literals(statement);
        match self.mode {
            OperationMode::Insert if self.context.has_skipped_columns() => {
                collapse_empty_values(statement)
            }
            _ => statement,
        }
    }
}

fn rewrite_boolean_literals(statement: String) -> String {
    statement.replace("'true'", "'1'").replace("'false'", "'0'")
}

/// Values of columns skipped for the whole batch leave `''` artifacts in the
/// values tuple; collapse them so no empty positional value remains.
fn collapse_empty_values(mut statement: String) -> String {
    while statement.contains(", ,") {
        statement = statement.replace(", ,", ",");
    }
    statement = statement.replace(", ) values", ") values");
    statement = statement.replace(", ''", "");
    statement.replace("'', ", "")
}

fn trim_trailing(statement: &mut String, separator: &str) {
    if statement.ends_with(separator) {
        statement.truncate(statement.len() - separator.len());
    }
}
