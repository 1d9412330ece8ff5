/// Ordered buffer of records, either fetched from the catalog for display
/// or assembled from input for a mutation batch.
///
/// Repeated inserts of the same file are dropped: each record is keyed by
/// its LFN value, or by the first two columns when no LFN column exists.
#[derive(Debug, Default)]
pub struct RecordStore {
    records: Vec<Vec<String>>,
    tokens: Vec<String>,
    columns: Vec<String>,
}

impl RecordStore {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            records: Vec::new(),
            tokens: Vec::new(),
            columns,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[Vec<String>] {
        &self.records
    }

    pub fn record(&self, location: usize) -> Option<&[String]> {
        self.records.get(location).map(Vec::as_slice)
    }

    /// Insert one record, locating the LFN column by name.
    pub fn insert(&mut self, record: Vec<String>) {
        let lfn_position = self.columns.iter().position(|name| name == "lfn");
        self.insert_keyed(record, lfn_position);
    }

    /// Insert one record whose LFN position the caller already knows.
    pub fn insert_keyed(&mut self, record: Vec<String>, lfn_position: Option<usize>) {
        if record.is_empty() {
            tracing::warn!("refusing to buffer an empty record");
            return;
        }

        let token = match lfn_position {
            Some(position) => match record.get(position) {
                Some(value) => value.clone(),
                None => {
                    tracing::warn!(
                        position,
                        width = record.len(),
                        "LFN position outside the record, dropping it"
                    );
                    return;
                }
            },
            None => {
                let mut token = record[0].clone();
                if let Some(second) = record.get(1) {
                    token.push('|');
                    token.push_str(second);
                }
                token
            }
        };

        if self.tokens.iter().any(|seen| *seen == token) {
            tracing::warn!(token = %token, "record already buffered, dropping the repeat");
            return;
        }

        self.records.push(record);
        self.tokens.push(token);
    }
}
