use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde_json::Value;

use crate::domain::record_store::RecordStore;
use crate::domain::schema::TableSchema;

/// Places key/value input into full-width records, column by column, and
/// buffers them in a `RecordStore`.
pub struct RecordAssembler<'a> {
    schema: &'a TableSchema,
}

impl<'a> RecordAssembler<'a> {
    pub fn new(schema: &'a TableSchema) -> Self {
        Self { schema }
    }

    /// Build one record from key/value pairs. Unknown keys are skipped, a
    /// record without an LFN is dropped, and the trailing flag column is
    /// derived from whether the LFN points at mass storage.
    pub fn insert_pairs(&self, pairs: &BTreeMap<String, String>, store: &mut RecordStore) {
        if pairs.is_empty() {
            return;
        }

        let mut record = vec![String::new(); self.schema.len()];
        let mut lfn_position = None;
        for (key, value) in pairs {
            let Some(position) = self.schema.position_of(key) else {
                continue;
            };
            if value.is_empty() {
                continue;
            }
            record[position] = value.clone();
            if key == "lfn" {
                lfn_position = Some(position);
                if position + 1 != self.schema.len() {
                    if let Some(flag) = record.last_mut() {
                        *flag = if value.to_ascii_lowercase().starts_with("root://") {
                            "1".to_string()
                        } else {
                            "0".to_string()
                        };
                    }
                }
            }
        }

        match lfn_position {
            Some(position) => store.insert_keyed(record, Some(position)),
            None => tracing::warn!("record without an LFN, dropping it"),
        }
    }

    /// Parse one line of JSON — a single object or a list of objects —
    /// into records. Python-flavored payloads (`True`, `False`, single
    /// quotes) are normalized first.
    pub fn insert_json_line(&self, line: &str, store: &mut RecordStore) {
        if line.is_empty() {
            return;
        }

        let mut normalized = line.to_string();
        if normalized.contains("True") {
            normalized = normalized.replace("True", "true");
        }
        if normalized.contains("False") {
            normalized = normalized.replace("False", "false");
        }
        if normalized.contains('\'') {
            normalized = normalized.replace('\'', "\"");
        }

        let parsed: Value = match serde_json::from_str(&normalized) {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(%error, line, "error parsing this record line");
                return;
            }
        };

        match parsed {
            Value::Array(items) => {
                for item in items {
                    self.insert_json_value(item, store);
                }
            }
            other => self.insert_json_value(other, store),
        }
    }

    fn insert_json_value(&self, value: Value, store: &mut RecordStore) {
        let Value::Object(map) = value else {
            tracing::warn!("record entry is not an object, dropping it");
            return;
        };
        let mut pairs = BTreeMap::new();
        for (key, value) in map {
            pairs.insert(key, json_scalar_to_text(&value));
        }
        self.insert_pairs(&pairs, store);
    }
}

fn json_scalar_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(v) => v.to_string(),
        Value::Number(v) => v.to_string(),
        Value::String(v) => v.clone(),
        other => other.to_string(),
    }
}

/// One record line after another; a short line terminates the stream.
pub fn read_json_file(
    path: &Path,
    assembler: &RecordAssembler,
    store: &mut RecordStore,
) -> Result<()> {
    let file = File::open(path)
        .with_context(|| format!("Unable to open JSON file {}", path.display()))?;
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.len() < 3 {
            break;
        }
        assembler.insert_json_line(&line, store);
    }
    Ok(())
}

/// Interactive (or piped) input: `key=value` pairs, `;`/`,`-separated,
/// spread over any number of lines; a blank line terminates. All pairs
/// together form one record.
pub fn read_direct_input(
    reader: impl BufRead,
    assembler: &RecordAssembler,
    store: &mut RecordStore,
) -> Result<()> {
    let mut pairs = BTreeMap::new();
    for line in reader.lines() {
        let line = line?;
        if line.len() < 2 {
            break;
        }
        if line.contains(';') || line.contains(',') {
            for piece in line.split(|c| c == ';' || c == ',') {
                insert_pair(piece, &mut pairs);
            }
        } else {
            insert_pair(&line, &mut pairs);
        }
    }

    if !pairs.contains_key("lfn") {
        return Err(anyhow!("No LFN found in the terminal input"));
    }
    assembler.insert_pairs(&pairs, store);
    Ok(())
}

const PAIR_SEPARATORS: [&str; 6] = ["=", "\": \"", "\":\"", "\" :\"", "\" : \"", "\": "];

fn insert_pair(content: &str, target: &mut BTreeMap<String, String>) {
    if content.is_empty() {
        return;
    }

    let mut line = content.to_string();
    if line.contains('\'') {
        line = line.replace('\'', "\"");
    }

    let mut found: Option<usize> = None;
    for (index, separator) in PAIR_SEPARATORS.iter().enumerate() {
        if line.contains(separator) {
            if found == Some(0) && index != 4 {
                tracing::warn!(line = %line, "multiple separators found");
            }
            found = Some(index);
        }
    }
    let Some(found) = found else {
        tracing::warn!(line = %content, "no column specified");
        return;
    };

    let separator = PAIR_SEPARATORS[found];
    let Some(split_at) = line.find(separator) else {
        return;
    };
    let mut first = line[..split_at].to_string();
    let mut second = line[split_at + separator.len()..].to_string();
    if second.is_empty() {
        tracing::warn!(column = %first, "empty data for this column");
        return;
    }

    if found != 0 {
        first = first.replace('"', "");
        second = second.replace('"', "");
    }
    let first = first.trim().to_string();
    let second = second.trim().to_string();

    if let Some(previous) = target.insert(first.clone(), second.clone()) {
        tracing::warn!(column = %first, previous = %previous, new = %second, "overwriting this column");
    }
}
