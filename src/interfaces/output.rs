use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{Cell, ContentArrangement, Row, Table, presets::UTF8_BORDERS_ONLY};

use crate::domain::record_store::RecordStore;

/// Render the buffered records the way the interactive client would show
/// them: a bordered table plus the row count footer.
pub fn render_table(store: &RecordStore) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_BORDERS_ONLY)
        .set_content_arrangement(ContentArrangement::Dynamic);

    if !store.columns().is_empty() {
        table.set_header(Row::from(
            store.columns().iter().map(Cell::new).collect::<Vec<_>>(),
        ));
    }

    for record in store.records() {
        table.add_row(Row::from(
            record
                .iter()
                .map(|value| Cell::new(if value.is_empty() { "NULL" } else { value.as_str() }))
                .collect::<Vec<_>>(),
        ));
    }

    let count = store.len();
    format!(
        "{table}\n{count} row{} in set.",
        if count == 1 { "" } else { "s" }
    )
}

pub fn print_records(store: &RecordStore) {
    println!("{}", render_table(store));
}

pub fn write_records(store: &RecordStore, path: &Path) -> Result<()> {
    fs::write(path, render_table(store))
        .with_context(|| format!("Unable to write records to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::render_table;
    use crate::domain::record_store::RecordStore;

    #[test]
    fn rendered_table_carries_headers_nulls_and_the_footer() {
        let mut store = RecordStore::new(vec!["lfn".to_string(), "comment".to_string()]);
        store.insert(vec!["a.mc.root".to_string(), String::new()]);

        let rendered = render_table(&store);

        assert!(rendered.contains("lfn"));
        assert!(rendered.contains("a.mc.root"));
        assert!(rendered.contains("NULL"));
        assert!(rendered.ends_with("1 row in set."));
    }
}
