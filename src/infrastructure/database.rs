use std::collections::HashMap;
use std::fmt::{self, Display};

use mysql::prelude::Queryable;

use crate::domain::schema::{ColumnInfo, TableSchema};

/// Read-only account every user may query with.
pub const DEFAULT_ACCOUNT: &str = "anonymous";
/// Password of the read-only account.
pub const DEFAULT_PASSWORD: &str = "testing";

#[derive(Debug)]
pub enum DatabaseError {
    Connection(String),
    EmptyStatement,
    Query { statement: String, message: String },
    Schema(String),
}

impl Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseError::Connection(message) => write!(f, "Connection failed: {message}"),
            DatabaseError::EmptyStatement => f.write_str("No command to query"),
            DatabaseError::Query { statement, message } => {
                write!(f, "Query `{statement}` failed: {message}")
            }
            DatabaseError::Schema(message) => write!(f, "Cannot load the columns: {message}"),
        }
    }
}

impl std::error::Error for DatabaseError {}

/// Everything needed to open one catalog connection.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub server: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub table: String,
    pub port: u16,
}

impl ConnectionSettings {
    /// The same endpoint on the read-only account, used to look up the
    /// table structure before the real session opens.
    pub fn schema_probe(&self) -> Self {
        Self {
            user: DEFAULT_ACCOUNT.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            ..self.clone()
        }
    }
}

/// The seam between the batch machinery and the backing store. Production
/// code talks to MySQL; tests substitute an in-memory fake.
pub trait DatabaseSession {
    fn execute(&mut self, statement: &str) -> Result<u64, DatabaseError>;
    fn query(&mut self, statement: &str) -> Result<Vec<Vec<String>>, DatabaseError>;
}

/// True when the first word of `statement` (leading semicolons ignored)
/// matches `expected` case-insensitively.
pub fn statement_matches(statement: &str, expected: &str) -> bool {
    let trimmed = statement.trim_start_matches(';').trim_start();
    match trimmed.split_whitespace().next() {
        Some(word) => word.eq_ignore_ascii_case(expected),
        None => false,
    }
}

pub struct MySqlSession {
    connection: mysql::Conn,
}

impl MySqlSession {
    pub fn connect(settings: &ConnectionSettings) -> Result<Self, DatabaseError> {
        let opts = mysql::OptsBuilder::new()
            .ip_or_hostname(Some(settings.server.clone()))
            .tcp_port(settings.port)
            .user(Some(settings.user.clone()))
            .pass(Some(settings.password.clone()))
            .db_name(Some(settings.database.clone()));
        let connection =
            mysql::Conn::new(opts).map_err(|error| DatabaseError::Connection(error.to_string()))?;
        Ok(Self { connection })
    }
}

impl DatabaseSession for MySqlSession {
    fn execute(&mut self, statement: &str) -> Result<u64, DatabaseError> {
        if statement.is_empty() {
            return Err(DatabaseError::EmptyStatement);
        }
        self.connection
            .query_drop(statement)
            .map_err(|error| DatabaseError::Query {
                statement: statement.to_string(),
                message: error.to_string(),
            })?;
        Ok(self.connection.affected_rows())
    }

    fn query(&mut self, statement: &str) -> Result<Vec<Vec<String>>, DatabaseError> {
        if statement.is_empty() {
            return Err(DatabaseError::EmptyStatement);
        }
        let rows: Vec<mysql::Row> =
            self.connection
                .query(statement)
                .map_err(|error| DatabaseError::Query {
                    statement: statement.to_string(),
                    message: error.to_string(),
                })?;

        let mut data = Vec::with_capacity(rows.len());
        for row in rows {
            let mut line = Vec::with_capacity(row.len());
            for index in 0..row.len() {
                match row.as_ref(index) {
                    None | Some(mysql::Value::NULL) => line.push(String::new()),
                    Some(value) => line.push(value_to_text(value)),
                }
            }
            data.push(line);
        }
        Ok(data)
    }
}

fn value_to_text(value: &mysql::Value) -> String {
    match value {
        mysql::Value::NULL => String::new(),
        mysql::Value::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        mysql::Value::Int(v) => v.to_string(),
        mysql::Value::UInt(v) => v.to_string(),
        mysql::Value::Float(v) => v.to_string(),
        mysql::Value::Double(v) => v.to_string(),
        mysql::Value::Date(year, month, day, hour, minute, second, _) => format!(
            "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}"
        ),
        mysql::Value::Time(negative, days, hours, minutes, seconds, _) => {
            let total_hours = u32::from(*hours) + days * 24;
            format!(
                "{}{total_hours:02}:{minutes:02}:{seconds:02}",
                if *negative { "-" } else { "" }
            )
        }
    }
}

/// Load the column layout of `table`: names from `describe`, printing
/// levels from the `PL<n>` markers kept in the column comments.
pub fn acquire_schema(
    session: &mut dyn DatabaseSession,
    database: &str,
    table: &str,
) -> Result<TableSchema, DatabaseError> {
    if table.is_empty() {
        return Err(DatabaseError::Schema("no table named".to_string()));
    }

    let described = session.query(&format!("describe {table}"))?;
    if described.is_empty() {
        return Err(DatabaseError::Schema(format!(
            "nothing available for the table {table}"
        )));
    }

    let commented = session.query(&format!(
        "select column_name Name, column_comment comment from information_schema.columns \
         where table_name = '{table}' and table_schema = '{database}'"
    ))?;
    let mut levels: HashMap<&str, i32> = HashMap::new();
    for row in &commented {
        let (Some(name), Some(comment)) = (row.first(), row.get(1)) else {
            continue;
        };
        if let Some(level) = parse_print_level(comment) {
            levels.insert(name.as_str(), level);
        }
    }

    let mut columns = Vec::with_capacity(described.len());
    for row in &described {
        let Some(name) = row.first() else { continue };
        if name.is_empty() {
            continue;
        }
        let print_level = match levels.get(name.as_str()) {
            Some(level) => *level,
            None => {
                tracing::warn!(column = %name, "no printing level in the column comment, assuming 0");
                0
            }
        };
        columns.push(ColumnInfo {
            name: name.clone(),
            print_level,
        });
    }
    Ok(TableSchema::new(columns))
}

/// Column comments hold several `|`-separated properties; the printing
/// level is the one tagged `PrintingLevel` or `PL`.
fn parse_print_level(comment: &str) -> Option<i32> {
    let mut found: Option<&str> = None;
    for part in comment.split('|') {
        if !part.contains("PL") && !part.contains("PrintingLevel") {
            continue;
        }
        if found.is_some() {
            tracing::warn!(comment, "multiple printing levels detected, keeping the last");
        }
        found = Some(part);
    }

    let part = found?;
    let digits = if let Some(index) = part.find("PrintingLevel") {
        &part[index + "PrintingLevel".len()..]
    } else {
        let index = part.find("PL")?;
        &part[index + 2..]
    };
    digits.trim().parse::<i32>().ok()
}
