//! Receipt-group discovery and deterministic page ordering.
//!
//! A receipt group is one immediate subdirectory of the working directory
//! holding that document's PNG pages. Filesystems return entries in no
//! useful order, so pages are sorted by an explicit ordering key instead.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

/// Explicit "page N" marker in a file stem, e.g. `scan_page2` or `Page-10`.
static PAGE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)page[_-]?(\d+)").unwrap());

static DIGIT_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// Sort slot for files with no discoverable page hint: after every
/// numbered page.
const NO_PAGE_HINT: u64 = u64::MAX;

/// One logical multi-page document: a folder name and its ordered pages.
///
/// Immutable snapshot of the working directory at discovery time; discarded
/// with the working directory.
#[derive(Debug, Clone)]
pub struct ReceiptGroup {
    pub name: String,
    pub pages: Vec<PathBuf>,
}

impl ReceiptGroup {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Ordering key for a page file: page number when one can be found, then
/// the full filename as a deterministic tiebreak.
fn page_sort_key(path: &Path) -> (u64, String) {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if let Some(caps) = PAGE_NUMBER.captures(stem) {
        if let Ok(number) = caps[1].parse() {
            return (number, filename);
        }
    }

    // No "page" keyword: the last digit run in the stem wins, so
    // `2024-01_receipt_3` orders by 3, not 2024.
    if let Some(run) = DIGIT_RUN.find_iter(stem).last() {
        if let Ok(number) = run.as_str().parse() {
            return (number, filename);
        }
    }

    (NO_PAGE_HINT, filename)
}

fn is_png(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("png"))
}

/// Scan the immediate subdirectories of `root` for receipt groups,
/// ordered by directory name ascending (case-sensitive).
///
/// Directories with no qualifying pages are excluded and unreadable
/// subdirectories are silently skipped; both are intentional filters,
/// not failures.
pub fn discover(root: &Path) -> std::io::Result<Vec<ReceiptGroup>> {
    let mut dirs: Vec<PathBuf> = std::fs::read_dir(root)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|entry| entry.path())
        .collect();
    dirs.sort();

    let mut groups = Vec::new();
    for dir in dirs {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        let mut pages: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|entry| entry.path())
            .filter(|path| is_png(path))
            .collect();
        if pages.is_empty() {
            continue;
        }
        pages.sort_by_key(|path| page_sort_key(path));

        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        tracing::debug!(receipt = %name, pages = pages.len(), "Discovered receipt group");
        groups.push(ReceiptGroup { name, pages });
    }

    Ok(groups)
}

/// Summary rows `(name, page_count)` for display surfaces.
pub fn receipt_table(groups: &[ReceiptGroup]) -> Vec<(String, usize)> {
    groups
        .iter()
        .map(|group| (group.name.clone(), group.page_count()))
        .collect()
}
