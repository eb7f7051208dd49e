//! Strict decoding of the model's answer into typed tables.
//!
//! The answer must be a JSON array of objects with `headers` and `rows`
//! (string arrays) and an optional `tableTitle`. Anything else is an
//! [`ExtractionError`]; the shape is never trusted without validation.
//!
//! Providers without a native JSON mode sometimes wrap the array in a
//! ```` ```json ```` fence despite the prompt, so a single outer fence is
//! stripped before parsing.

use crate::error::ExtractionError;
use crate::table::ExtractedTable;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json|JSON)?[ \t]*\r?\n(.*?)\r?\n?```$").unwrap());

/// Decode the raw text answer of the model.
pub fn decode_tables(raw: &str) -> Result<Vec<ExtractedTable>, ExtractionError> {
    let text = strip_json_fences(raw.trim());
    if text.trim().is_empty() {
        return Err(ExtractionError::EmptyResponse);
    }

    let tables: Vec<ExtractedTable> =
        serde_json::from_str(text).map_err(|source| ExtractionError::Malformed { source })?;
    debug!("Decoded {} table(s)", tables.len());
    Ok(tables)
}

fn strip_json_fences(input: &str) -> &str {
    match RE_OUTER_FENCES.captures(input) {
        Some(caps) => caps.get(1).map_or(input, |m| m.as_str()),
        None => input,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_array_of_tables() {
        let raw = r#"[
            {"tableTitle": "Page 1 - Invoice", "headers": ["Item", "Qty"], "rows": [["Bolt", "007"]]},
            {"headers": ["A"], "rows": []}
        ]"#;
        let tables = decode_tables(raw).unwrap();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].title, "Page 1 - Invoice");
        assert_eq!(tables[0].rows[0][1], "007");
        assert_eq!(tables[1].title, "");
    }

    #[test]
    fn empty_answer_is_empty_response() {
        assert!(matches!(decode_tables(""), Err(ExtractionError::EmptyResponse)));
        assert!(matches!(decode_tables("  \n"), Err(ExtractionError::EmptyResponse)));
    }

    #[test]
    fn empty_array_is_zero_tables() {
        assert!(decode_tables("[]").unwrap().is_empty());
    }

    #[test]
    fn strips_json_fence() {
        let raw = "```json\n[{\"headers\":[\"A\"],\"rows\":[[\"1\"]]}]\n```";
        let tables = decode_tables(raw).unwrap();
        assert_eq!(tables[0].headers, vec!["A"]);
    }

    #[test]
    fn missing_headers_is_malformed() {
        let err = decode_tables(r#"[{"tableTitle":"x","rows":[]}]"#).unwrap_err();
        assert!(matches!(err, ExtractionError::Malformed { .. }));
    }

    #[test]
    fn numeric_cells_are_rejected() {
        let err = decode_tables(r#"[{"headers":["A"],"rows":[[1]]}]"#).unwrap_err();
        assert!(matches!(err, ExtractionError::Malformed { .. }));
    }

    #[test]
    fn object_instead_of_array_is_malformed() {
        let err = decode_tables(r#"{"headers":[],"rows":[]}"#).unwrap_err();
        assert!(matches!(err, ExtractionError::Malformed { .. }));
    }

    #[test]
    fn ragged_rows_pass_through() {
        let tables =
            decode_tables(r#"[{"headers":["A","B"],"rows":[["1"],["1","2","3"]]}]"#).unwrap();
        assert_eq!(tables[0].rows[0].len(), 1);
        assert_eq!(tables[0].rows[1].len(), 3);
    }
}
