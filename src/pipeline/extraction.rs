//! Per-document extraction protocol.
//!
//! One combined vision request carries the prompt plus every page of the
//! document in reading order, never one request per page, so the model can
//! preserve cross-page order and deduplicate repeated headers. Malformed
//! JSON gets exactly one repair round-trip, without the images; whatever
//! comes back is returned, with [`RepairStatus`] recording how it went.

use std::path::Path;

use base64::Engine as _;
use thiserror::Error;

use super::discovery::ReceiptGroup;
use super::prompt::{self, OutputFormat, JSON_REPAIR_PROMPT};
use crate::llama::{ChatClient, LlamaError};

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("could not read page {path}: {source}")]
    PageRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("model error: {0}")]
    Model(#[from] LlamaError),
}

/// How the structured-output repair round-trip went.
///
/// `RepairFailed` means the repair's text is still malformed; it is passed
/// through regardless, and the caller decides what to do with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairStatus {
    NotNeeded,
    Repaired,
    RepairFailed,
}

/// Raw content produced for one document, keyed by the caller to
/// (document name, output format).
#[derive(Debug, Clone)]
pub struct Extraction {
    pub content: String,
    pub repair: RepairStatus,
}

/// Encode a PNG page as a data URI for the vision endpoint.
fn encode_page(path: &Path) -> Result<String, ExtractError> {
    let bytes = std::fs::read(path).map_err(|source| ExtractError::PageRead {
        path: path.display().to_string(),
        source,
    })?;
    let b64 = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(format!("data:image/png;base64,{b64}"))
}

/// Run the extraction protocol for one receipt group.
pub fn extract_document(
    client: &dyn ChatClient,
    group: &ReceiptGroup,
    format: OutputFormat,
) -> Result<Extraction, ExtractError> {
    let _span = tracing::info_span!(
        "extract_document",
        receipt = %group.name,
        pages = group.page_count(),
        format = %format,
    )
    .entered();

    let images = group
        .pages
        .iter()
        .map(|page| encode_page(page))
        .collect::<Result<Vec<_>, _>>()?;
    let prompt_text = prompt::build_prompt(&group.name, format);

    match format {
        OutputFormat::Markdown => {
            let content = client.chat(&prompt_text, &images, false)?;
            Ok(Extraction {
                content,
                repair: RepairStatus::NotNeeded,
            })
        }
        OutputFormat::Json => {
            let response = client.chat(&prompt_text, &images, true)?;
            if serde_json::from_str::<serde_json::Value>(&response).is_ok() {
                return Ok(Extraction {
                    content: response,
                    repair: RepairStatus::NotNeeded,
                });
            }

            tracing::warn!(receipt = %group.name, "Malformed JSON response, requesting repair");
            // One repair round-trip: the malformed response as context, no
            // images re-attached. No second repair, no re-invocation.
            let repaired =
                client.chat(&format!("{JSON_REPAIR_PROMPT}\n\n{response}"), &[], true)?;
            let repair = if serde_json::from_str::<serde_json::Value>(&repaired).is_ok() {
                RepairStatus::Repaired
            } else {
                tracing::warn!(receipt = %group.name, "Repair response is still malformed");
                RepairStatus::RepairFailed
            };
            Ok(Extraction {
                content: repaired,
                repair,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llama::MockChatClient;

    fn group_with_pages(dir: &Path, count: usize) -> ReceiptGroup {
        let pages = (1..=count)
            .map(|i| {
                let path = dir.join(format!("page_{i}.png"));
                std::fs::write(&path, format!("png-bytes-{i}")).unwrap();
                path
            })
            .collect();
        ReceiptGroup {
            name: "r1".to_string(),
            pages,
        }
    }

    #[test]
    fn encode_page_produces_png_data_uri() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.png");
        std::fs::write(&path, b"abc").unwrap();

        let uri = encode_page(&path).unwrap();
        assert_eq!(uri, "data:image/png;base64,YWJj");
    }

    #[test]
    fn missing_page_is_page_read_error() {
        let err = encode_page(Path::new("/no/such/page.png")).unwrap_err();
        assert!(matches!(err, ExtractError::PageRead { .. }));
    }

    #[test]
    fn markdown_sends_one_request_with_all_pages() {
        let dir = tempfile::tempdir().unwrap();
        let group = group_with_pages(dir.path(), 3);
        let mock = MockChatClient::new("# r1\n- Document type: receipt");

        let extraction =
            extract_document(&mock, &group, OutputFormat::Markdown).unwrap();
        assert_eq!(extraction.content, "# r1\n- Document type: receipt");
        assert_eq!(extraction.repair, RepairStatus::NotNeeded);

        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].image_count, 3);
        assert!(!calls[0].json_mode);
        assert!(calls[0].prompt.contains("Document name: r1."));
    }

    #[test]
    fn well_formed_json_skips_repair() {
        let dir = tempfile::tempdir().unwrap();
        let group = group_with_pages(dir.path(), 2);
        let mock = MockChatClient::new(r#"{"document_name": "r1", "total": 12.5}"#);

        let extraction = extract_document(&mock, &group, OutputFormat::Json).unwrap();
        assert_eq!(extraction.content, r#"{"document_name": "r1", "total": 12.5}"#);
        assert_eq!(extraction.repair, RepairStatus::NotNeeded);
        assert_eq!(mock.calls().len(), 1);
        assert!(mock.calls()[0].json_mode);
    }

    #[test]
    fn malformed_json_triggers_one_repair_without_images() {
        let dir = tempfile::tempdir().unwrap();
        let group = group_with_pages(dir.path(), 2);
        let mock = MockChatClient::with_responses(vec![
            "not json {".to_string(),
            r#"{"document_name": "r1"}"#.to_string(),
        ]);

        let extraction = extract_document(&mock, &group, OutputFormat::Json).unwrap();
        assert_eq!(extraction.content, r#"{"document_name": "r1"}"#);
        assert_eq!(extraction.repair, RepairStatus::Repaired);

        let calls = mock.calls();
        assert_eq!(calls.len(), 2);
        // First call carries the pages, the repair call none.
        assert_eq!(calls[0].image_count, 2);
        assert_eq!(calls[1].image_count, 0);
        assert!(calls[1].json_mode);
        assert!(calls[1].prompt.starts_with(JSON_REPAIR_PROMPT));
        // The malformed response rides along as context.
        assert!(calls[1].prompt.contains("not json {"));
    }

    #[test]
    fn failed_repair_is_passed_through_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let group = group_with_pages(dir.path(), 1);
        let mock = MockChatClient::with_responses(vec![
            "still not json".to_string(),
            "nope, still broken".to_string(),
        ]);

        let extraction = extract_document(&mock, &group, OutputFormat::Json).unwrap();
        assert_eq!(extraction.content, "nope, still broken");
        assert_eq!(extraction.repair, RepairStatus::RepairFailed);
        // Exactly one repair attempt, never a second.
        assert_eq!(mock.calls().len(), 2);
    }

    #[test]
    fn pages_are_attached_in_page_order() {
        let dir = tempfile::tempdir().unwrap();
        let group = group_with_pages(dir.path(), 2);

        struct CapturingClient {
            images: std::sync::Mutex<Vec<String>>,
        }
        impl ChatClient for CapturingClient {
            fn chat(
                &self,
                _prompt: &str,
                images: &[String],
                _json_mode: bool,
            ) -> Result<String, LlamaError> {
                *self.images.lock().unwrap() = images.to_vec();
                Ok("# ok".to_string())
            }
        }

        let client = CapturingClient {
            images: std::sync::Mutex::new(Vec::new()),
        };
        extract_document(&client, &group, OutputFormat::Markdown).unwrap();

        let images = client.images.lock().unwrap();
        let expected_first = format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode("png-bytes-1")
        );
        assert_eq!(images[0], expected_first);
        assert_eq!(images.len(), 2);
    }
}
