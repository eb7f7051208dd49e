//! Extraction instructions sent to the model.
//!
//! Prompts live here so they can be inspected by tests and overridden via
//! [`crate::config::ExtractionConfig::system_prompt`] without touching the
//! request code in [`crate::pipeline::llm`].

/// JSON schema every answer must follow.
pub const TABLE_SCHEMA: &str = r#"{
  "type": "array",
  "items": {
    "type": "object",
    "properties": {
      "tableTitle": { "type": "string", "description": "A short descriptive title for the extracted table" },
      "headers":    { "type": "array", "items": { "type": "string" }, "description": "The column headers of the table" },
      "rows":       { "type": "array", "items": { "type": "array", "items": { "type": "string" } }, "description": "The data rows" }
    },
    "required": ["headers", "rows"]
  }
}"#;

/// Default system prompt for extracting tables from a document.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an expert at reading tables out of scanned and digital documents. The attached document may contain multiple pages with separate tables.

Task: extract the tabular data from the document.

Rules:
1. Treat each page or distinct section as a separate table. DO NOT MERGE tables from different pages unless they are clearly one continuous table (for example page 1 ends with no bottom border and page 2 starts with no repeated headers).
2. If the document has multiple pages with independent tables (separate invoices, separate part lists), return them as separate items in the list.
3. For each table, extract the column headers and every data row.
4. Capture all values exactly as strings. Keep leading zeros, thousands separators, units and formatting. Never convert a value to a number.
5. Give each table a descriptive title (for example "Page 1 - Invoice", "Page 2 - Parts List").

Output format:
- Return ONLY a JSON array of table objects matching the schema below
- Do NOT wrap the JSON in markdown fences
- Do NOT add commentary or explanations"#;

/// Text of the user turn that carries the document attachment.
pub const USER_INSTRUCTION: &str = "Analyze this document and return a JSON ARRAY of table objects.";

/// Full system message: instructions followed by the schema.
pub fn system_message(instructions: &str) -> String {
    format!("{instructions}\n\nSchema:\n{TABLE_SCHEMA}")
}
