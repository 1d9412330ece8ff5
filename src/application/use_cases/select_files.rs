use anyhow::{Result, anyhow};
use console::style;

use crate::application::commands::SelectFilesCommand;
use crate::domain::condition::{AndState, CommentStatus, Condition, comment_predicate};
use crate::domain::record_store::RecordStore;
use crate::infrastructure::database::{DatabaseSession, MySqlSession, acquire_schema};
use crate::interfaces::output;

/// Fetch the catalog rows matching the parsed conditions and show them.
#[derive(Debug, Default)]
pub struct SelectFilesUseCase;

impl SelectFilesUseCase {
    pub fn execute(&self, command: SelectFilesCommand) -> Result<usize> {
        let settings = &command.settings;

        // The table structure is public, so it is looked up on the
        // read-only account before the real session opens.
        let schema = {
            let mut probe = MySqlSession::connect(&settings.schema_probe())?;
            acquire_schema(&mut probe, &settings.database, &settings.table)?
        };
        if schema.is_empty() {
            return Err(anyhow!("No columns available for {}", settings.table));
        }

        let shown_columns = if command.print_level == -1 {
            schema.names()
        } else {
            schema.names_above(command.print_level)
        };
        if shown_columns.is_empty() {
            return Err(anyhow!(
                "Printing level {} hides every column of {}",
                command.print_level,
                settings.table
            ));
        }

        let mut statement = if command.print_level == -1 {
            format!("select * from {}", settings.table)
        } else {
            format!("select {} from {}", shown_columns.join(", "), settings.table)
        };
        let clause = build_where_clause(
            &command.conditions,
            command.comment_status,
            &command.file_hints,
        );
        if clause.is_empty() {
            println!(
                "{}",
                style("Warning... No conditions detected: printing all").yellow()
            );
        } else {
            statement.push_str(&clause);
        }

        let mut session = MySqlSession::connect(settings)?;
        let rows = session.query(&statement)?;

        let mut store = RecordStore::new(shown_columns);
        for mut row in rows {
            for value in &mut row {
                if value.is_empty() {
                    *value = "NULL".to_string();
                }
            }
            store.insert(row);
        }

        if store.is_empty() {
            println!("No records detected...");
            return Ok(0);
        }

        match &command.output_path {
            Some(path) => {
                if !command.suppress_stdout {
                    output::print_records(&store);
                }
                output::write_records(&store, path)?;
            }
            None => output::print_records(&store),
        }

        Ok(store.len())
    }
}

/// Assemble the full `where` clause from the ready conditions, the fixed
/// comment predicate, and the filename hints. Empty when nothing filters.
pub fn build_where_clause(
    conditions: &[Condition],
    comment_status: CommentStatus,
    file_hints: &str,
) -> String {
    let ready: Vec<&Condition> = conditions
        .iter()
        .filter(|condition| condition.is_ready())
        .collect();

    if ready.is_empty() && comment_status == CommentStatus::Unlimited && file_hints.is_empty() {
        tracing::info!("empty condition");
        return String::new();
    }

    let common = comment_predicate(comment_status);
    if ready.is_empty() {
        let mut clause = String::new();
        if !common.is_empty() {
            clause.push_str(" where ");
            clause.push_str(&common);
        }
        add_file_hint(&mut clause, file_hints);
        return clause;
    }

    let mut clause = String::from(" where ");
    let last = ready.len() - 1;
    for condition in &ready[..last] {
        clause.push_str(&condition.render(AndState::OnlyTail));
    }
    clause.push_str(&ready[last].render(AndState::Neither));

    if !common.is_empty() {
        clause.push_str(" and ");
        clause.push_str(&common);
    }
    add_file_hint(&mut clause, file_hints);
    clause
}

/// Filename hints go right after `where`, ahead of the other terms.
fn add_file_hint(clause: &mut String, file_hints: &str) {
    if file_hints.is_empty() {
        return;
    }

    if clause.is_empty() {
        clause.push_str(" where ");
        clause.push_str(file_hints);
    } else if !clause.contains("where ") {
        clause.push_str(" where ");
        clause.push_str(file_hints);
        clause.push_str(" and ");
    } else {
        *clause = clause.replacen("where ", &format!("where {file_hints} and "), 1);
    }
}
