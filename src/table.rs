//! The unit of extraction output.

use serde::{Deserialize, Deserializer, Serialize};

/// One table read from a document.
///
/// Rows are not required to have as many cells as there are headers. The
/// model occasionally merges or splits cells; every consumer in this crate
/// passes ragged rows through unchanged instead of rejecting them.
///
/// The serialised form matches the schema sent to the model:
/// `{"tableTitle": "...", "headers": [...], "rows": [[...]]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedTable {
    /// Descriptive title, possibly empty.
    #[serde(rename = "tableTitle", default, deserialize_with = "null_as_empty")]
    pub title: String,
    /// Column headers in document order.
    pub headers: Vec<String>,
    /// Data rows in document order; every cell is kept as text.
    pub rows: Vec<Vec<String>>,
}

/// `"tableTitle": null` reads as an empty title.
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl ExtractedTable {
    pub fn new(
        title: impl Into<String>,
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    ) -> Self {
        Self {
            title: title.into(),
            headers,
            rows,
        }
    }

    /// Widest row, headers included.
    pub fn column_count(&self) -> usize {
        self.rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_defaults_to_empty() {
        let t: ExtractedTable =
            serde_json::from_str(r#"{"headers":["A"],"rows":[["1"]]}"#).unwrap();
        assert_eq!(t.title, "");
    }

    #[test]
    fn null_title_reads_as_empty() {
        let t: ExtractedTable =
            serde_json::from_str(r#"{"tableTitle":null,"headers":["A"],"rows":[]}"#).unwrap();
        assert_eq!(t.title, "");
    }

    #[test]
    fn serialises_with_wire_names() {
        let t = ExtractedTable::new("Parts", vec!["A".into()], vec![]);
        let json = serde_json::to_string(&t).unwrap();
        assert!(json.contains("\"tableTitle\":\"Parts\""), "got: {json}");
    }

    #[test]
    fn column_count_covers_ragged_rows() {
        let t = ExtractedTable::new(
            "",
            vec!["A".into(), "B".into()],
            vec![vec!["1".into()], vec!["1".into(), "2".into(), "3".into()]],
        );
        assert_eq!(t.column_count(), 3);
    }
}
