//! Persisting extracted content to the shared output directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::prompt::OutputFormat;

/// Replace path separators so a receipt name is a safe single filename
/// component, and trim surrounding whitespace.
pub fn sanitize_filename(name: &str) -> String {
    name.replace(['/', '\\'], "_").trim().to_string()
}

/// Write `content` to `<sanitized name>.<ext>` inside `out_dir`, creating
/// the directory if needed. Last write wins; no versioning.
pub fn write_output(
    name: &str,
    content: &str,
    format: OutputFormat,
    out_dir: &Path,
) -> io::Result<PathBuf> {
    fs::create_dir_all(out_dir)?;
    let filename = format!("{}.{}", sanitize_filename(name), format.extension());
    let path = out_dir.join(filename);
    fs::write(&path, content)?;

    tracing::debug!(
        path = %path.display(),
        bytes = content.len(),
        "Output written"
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_both_separators() {
        assert_eq!(sanitize_filename("A/B\\C"), "A_B_C");
    }

    #[test]
    fn sanitize_trims_whitespace() {
        assert_eq!(sanitize_filename("  receipt 01  "), "receipt 01");
    }

    #[test]
    fn sanitize_keeps_ordinary_names() {
        assert_eq!(sanitize_filename("2024-03 groceries"), "2024-03 groceries");
    }

    #[test]
    fn write_creates_directory_and_extension() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("outputs");

        let path = write_output("r1", "# content", OutputFormat::Markdown, &out_dir).unwrap();
        assert_eq!(path, out_dir.join("r1.md"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "# content");

        let path = write_output("r1", "{}", OutputFormat::Json, &out_dir).unwrap();
        assert_eq!(path, out_dir.join("r1.json"));
    }

    #[test]
    fn second_write_overwrites_first() {
        let dir = tempfile::tempdir().unwrap();

        write_output("r1", "first", OutputFormat::Markdown, dir.path()).unwrap();
        let path = write_output("r1", "second", OutputFormat::Markdown, dir.path()).unwrap();

        assert_eq!(fs::read_to_string(path).unwrap(), "second");
    }

    #[test]
    fn traversal_name_stays_inside_out_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_output(
            "../escape",
            "content",
            OutputFormat::Markdown,
            dir.path(),
        )
        .unwrap();
        assert_eq!(path, dir.path().join(".._escape.md"));
        assert!(path.starts_with(dir.path()));
    }
}
