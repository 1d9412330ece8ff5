use anyhow::{Result, anyhow};

use crate::application::commands::{OperateCatalogCommand, RecordSource};
use crate::domain::record_store::RecordStore;
use crate::domain::schema::TableSchema;
use crate::infrastructure::batch::{BatchDecision, BatchExecutor, BatchOutcome};
use crate::infrastructure::database::{MySqlSession, acquire_schema};
use crate::infrastructure::statement::{MutationContext, MutationTemplate};
use crate::interfaces::ingest::{self, RecordAssembler};

#[derive(Debug)]
pub struct OperateCatalogResult {
    pub outcome: BatchOutcome,
    pub decision: BatchDecision,
}

/// Ingest records, synthesize one mutation per record, and run the whole
/// stream as a single transactional batch.
#[derive(Debug, Default)]
pub struct OperateCatalogUseCase;

impl OperateCatalogUseCase {
    pub fn execute(&self, command: OperateCatalogCommand) -> Result<OperateCatalogResult> {
        let settings = &command.settings;

        let schema = {
            let mut probe = MySqlSession::connect(&settings.schema_probe())?;
            acquire_schema(&mut probe, &settings.database, &settings.table)?
        };
        if schema.is_empty() {
            return Err(anyhow!("No columns available for {}", settings.table));
        }

        let mut store = RecordStore::new(schema.names());
        let assembler = RecordAssembler::new(&schema);
        match &command.source {
            RecordSource::JsonFile(path) => {
                ingest::read_json_file(path, &assembler, &mut store)?;
            }
            RecordSource::DirectInput => {
                let stdin = std::io::stdin();
                ingest::read_direct_input(stdin.lock(), &assembler, &mut store)?;
            }
            RecordSource::ColumnOptions(pairs) => assembler.insert_pairs(pairs, &mut store),
        }
        if store.is_empty() {
            return Err(anyhow!("No records acquired"));
        }

        let active = active_positions(&schema, &store);
        if active.is_empty() {
            println!("All columns are trivial. Nothing to do.");
            return Ok(OperateCatalogResult {
                outcome: BatchOutcome::default(),
                decision: BatchDecision::NothingDone,
            });
        }
        if active.len() != schema.len() {
            tracing::info!(
                skipped = schema.len() - active.len(),
                "trivial columns skipped for this batch"
            );
        }

        let context = MutationContext::new(
            &schema,
            &active,
            &settings.table,
            command.multi_tables,
        );
        let template = MutationTemplate::prepare(command.mode, context)?;

        let session = MySqlSession::connect(settings)?;
        let mut executor = BatchExecutor::new(session, template);
        executor.begin();
        for record in store.records() {
            executor.process(record);
        }
        executor.accept(true);
        let (outcome, decision) = executor.finish();

        Ok(OperateCatalogResult { outcome, decision })
    }
}

/// Positions of the columns carrying a value in every buffered record;
/// only those participate in statement synthesis for this batch.
fn active_positions(schema: &TableSchema, store: &RecordStore) -> Vec<usize> {
    (0..schema.len())
        .filter(|&position| {
            store.records().iter().all(|record| {
                record
                    .get(position)
                    .map(|value| !value.is_empty())
                    .unwrap_or(false)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::active_positions;
    use crate::domain::record_store::RecordStore;
    use crate::domain::schema::{ColumnInfo, TableSchema};

    #[test]
    fn a_column_empty_in_any_record_is_inactive() {
        let schema = TableSchema::new(
            ["lfn", "size", "comment"]
                .iter()
                .map(|name| ColumnInfo {
                    name: (*name).to_string(),
                    print_level: 0,
                })
                .collect(),
        );
        let mut store = RecordStore::new(schema.names());
        store.insert(vec!["a.mc.root".into(), "5".into(), "checked".into()]);
        store.insert(vec!["b.mc.root".into(), "6".into(), "".into()]);

        assert_eq!(active_positions(&schema, &store), vec![0, 1]);
    }
}
