//! Prompt templates for receipt and invoice extraction.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Target shape of the extracted content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Markdown,
    Json,
}

impl OutputFormat {
    /// File extension of the written output.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Json => "json",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub const MARKDOWN_INSTRUCTION: &str = r#"You are extracting information from a receipt or invoice that may span multiple pages. Preserve reading order across pages. Do not hallucinate missing fields. Return ONLY markdown without code fences.
Use this layout:

# {document_name}
- Document type: receipt or invoice; if unsure say unknown
- Vendor: name and address in one line
- Date: ISO-8601 if possible, else as seen
- Receipt/Invoice #: value if present, else blank
- Currency: 3-letter code if possible
## Totals
- Subtotal: numeric or blank
- Tax: numeric or blank
- Shipping/Freight: numeric or blank; treat shipping and freight as the same charge
- Tip: numeric or blank
- Total: numeric or blank
- Payment method: card/cash/etc. if present
## Line items
| Description | Qty | Unit price | Amount |
|---|---:|---:|---:|
| ... |
## Notes
Additional notes or disclaimers; if none, leave blank."#;

pub const JSON_INSTRUCTION: &str = r#"Extract structured data from a receipt or invoice that may span multiple pages. Preserve reading order across pages. Do not hallucinate missing fields; use nulls for missing data. Treat shipping and freight as the same charge under the "shipping" field. Return ONLY a valid JSON object, no markdown, no backticks.
Schema:
{
  "document_name": string,
  "document_type": "receipt"|"invoice"|"unknown",
  "vendor": {
    "name": string|null,
    "address": string|null,
    "phone": string|null,
    "tax_id": string|null
  },
  "invoice_or_receipt_number": string|null,
  "date": string|null,
  "currency": string|null,
  "subtotal": number|null,
  "tax": number|null,
  "shipping": number|null,
  "tip": number|null,
  "total": number|null,
  "payment_method": string|null,
  "line_items": [{
    "description": string,
    "quantity": number|null,
    "unit_price": number|null,
    "amount": number|null
  }],
  "notes": string|null,
  "confidence": {
    "overall": number,
    "fields": {
      "vendor.name": number,
      "date": number,
      "total": number
    }
  }
}"#;

/// Issued once when a JSON response fails to parse; the malformed response
/// is appended as context.
pub const JSON_REPAIR_PROMPT: &str = "The previous response was not valid JSON. \
Return ONLY valid JSON that conforms to the requested schema. \
Do not include explanations or markdown.";

/// Compose the instruction sent with a document's pages. Pure and
/// deterministic: template by format, then the guidance clause carrying the
/// literal document name.
pub fn build_prompt(document_name: &str, format: OutputFormat) -> String {
    let base = match format {
        OutputFormat::Markdown => MARKDOWN_INSTRUCTION,
        OutputFormat::Json => JSON_INSTRUCTION,
    };
    format!(
        "{base}\n\nThis is ONE receipt/invoice spanning multiple pages; \
         preserve reading order; do not hallucinate; if a field is missing, \
         use null or leave blank appropriately. \
         Document name: {document_name}."
    )
}
