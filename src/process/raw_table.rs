use std::io::Read;

use csv::ReaderBuilder;

/// One untyped tabular batch as it came out of a source sheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBatch {
    /// Origin identifier (sheet name). Used as the tier when the batch has no `tier` column.
    pub tag: String,
    /// Column names exactly as the sheet claims them; matching happens later.
    pub headers: Vec<String>,
    /// Data rows, one `String` per field. Rows may be shorter than `headers`;
    /// a missing cell reads as absent.
    pub rows: Vec<Vec<String>>,
}

impl RawBatch {
    pub fn new(tag: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            tag: tag.into(),
            headers,
            rows,
        }
    }

    /// Parse CSV text (header row first) into a batch.
    pub fn from_csv_reader<R: Read>(tag: impl Into<String>, reader: R) -> Result<Self, csv::Error> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // sheet exports drop trailing empty cells
            .from_reader(reader);

        let headers = rdr.headers()?.iter().map(|h| h.to_string()).collect();
        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            rows.push(record.iter().map(|s| s.to_string()).collect());
        }

        Ok(Self::new(tag, headers, rows))
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_headers_and_ragged_rows() {
        let text = "Data,MktChannel,Investimento\n01/02/2025,Meta,100\n02/02/2025,Google\n";
        let batch = RawBatch::from_csv_reader("T2", text.as_bytes()).unwrap();

        assert_eq!(batch.tag, "T2");
        assert_eq!(batch.headers, vec!["Data", "MktChannel", "Investimento"]);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.rows[1], vec!["02/02/2025", "Google"]);
    }

    #[test]
    fn header_only_is_empty() {
        let batch = RawBatch::from_csv_reader("T3", "data,leads\n".as_bytes()).unwrap();
        assert!(batch.is_empty());
        assert_eq!(batch.headers.len(), 2);
    }
}
