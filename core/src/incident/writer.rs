use super::model::RenderedReport;
use crate::determinism::run_id::sha256_hex;
use crate::error::CoreResult;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const MAX_SLUG_CHARS: usize = 60;
const FALLBACK_SLUG: &str = "incident";
const UNDATED: &str = "undated";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenReport {
    pub html_path: PathBuf,
    pub markdown_path: PathBuf,
    pub html_sha256: String,
    pub markdown_sha256: String,
}

/// ASCII alphanumerics kept, every other run collapsed to one `_`.
pub fn slugify_title(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_separator = false;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('_');
            }
            pending_separator = false;
            slug.push(ch);
        } else {
            pending_separator = true;
        }
    }

    let capped: String = slug.chars().take(MAX_SLUG_CHARS).collect();
    let capped = capped.trim_matches('_');
    if capped.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        capped.to_string()
    }
}

/// `<date>_<slug>`, safe to use as a file name on any platform.
pub fn report_file_stem(incident_date: &str, title: &str) -> String {
    let date: String = incident_date
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-')
        .collect();
    let date = if date.is_empty() { UNDATED } else { date.as_str() };
    format!("{}_{}", date, slugify_title(title))
}

/// Write `<stem>.html` and `<stem>.md` into `dir`. Both land or neither does.
pub fn write_report(dir: &Path, stem: &str, rendered: &RenderedReport) -> CoreResult<WrittenReport> {
    fs::create_dir_all(dir)?;

    let html_path = dir.join(format!("{}.html", stem));
    let markdown_path = dir.join(format!("{}.md", stem));
    let html_tmp = dir.join(format!(".{}.html.tmp", stem));
    let markdown_tmp = dir.join(format!(".{}.md.tmp", stem));

    let staged = write_temp(&html_tmp, &rendered.html)
        .and_then(|_| write_temp(&markdown_tmp, &rendered.markdown));
    if let Err(e) = staged {
        discard(&html_tmp);
        discard(&markdown_tmp);
        return Err(e.into());
    }

    if let Err(e) = fs::rename(&html_tmp, &html_path) {
        discard(&html_tmp);
        discard(&markdown_tmp);
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&markdown_tmp, &markdown_path) {
        discard(&markdown_tmp);
        discard(&html_path);
        return Err(e.into());
    }

    debug!(html = %html_path.display(), markdown = %markdown_path.display(), "report files written");
    Ok(WrittenReport {
        html_path,
        markdown_path,
        html_sha256: sha256_hex(rendered.html.as_bytes()),
        markdown_sha256: sha256_hex(rendered.markdown.as_bytes()),
    })
}

fn write_temp(path: &Path, contents: &str) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()
}

fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "could not remove partial report file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered() -> RenderedReport {
        RenderedReport {
            html: "<html></html>\n".to_string(),
            markdown: "# Report\n".to_string(),
        }
    }

    #[test]
    fn test_stem_from_title_and_date() {
        assert_eq!(
            report_file_stem("2025-01-22", "Storage Issue!!"),
            "2025-01-22_Storage_Issue"
        );
    }

    #[test]
    fn test_slug_edge_cases() {
        assert_eq!(slugify_title("  --Disk / CPU -- spike  "), "Disk_CPU_spike");
        assert_eq!(slugify_title("!!!"), "incident");
        assert_eq!(slugify_title("Überlastung"), "berlastung");
        let long = "a".repeat(100);
        assert_eq!(slugify_title(&long).len(), 60);
        // cap falling right after a separator leaves no trailing underscore
        let title = format!("{} b", "a".repeat(59));
        assert_eq!(slugify_title(&title), "a".repeat(59));
    }

    #[test]
    fn test_date_sanitized() {
        assert_eq!(report_file_stem("2025/01/22", "x"), "20250122_x");
        assert_eq!(report_file_stem("", "x"), "undated_x");
    }

    #[test]
    fn test_write_report_creates_dir_and_both_files() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("reports");
        let written = write_report(&dir, "2025-01-22_Storage_Issue", &rendered()).unwrap();

        assert_eq!(written.html_path, dir.join("2025-01-22_Storage_Issue.html"));
        assert_eq!(written.markdown_path, dir.join("2025-01-22_Storage_Issue.md"));
        assert_eq!(fs::read_to_string(&written.html_path).unwrap(), "<html></html>\n");
        assert_eq!(fs::read_to_string(&written.markdown_path).unwrap(), "# Report\n");
        assert_eq!(written.markdown_sha256, sha256_hex(b"# Report\n"));

        let leftovers: Vec<_> = fs::read_dir(&dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_write_report_overwrites_existing() {
        let tmp = tempfile::tempdir().unwrap();
        write_report(tmp.path(), "r", &rendered()).unwrap();
        let mut second = rendered();
        second.markdown = "# Second\n".to_string();
        let written = write_report(tmp.path(), "r", &second).unwrap();
        assert_eq!(fs::read_to_string(written.markdown_path).unwrap(), "# Second\n");
    }

    #[test]
    fn test_write_failure_leaves_no_files() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("blocked");
        fs::write(&blocker, "not a directory").unwrap();
        assert!(write_report(&blocker, "r", &rendered()).is_err());
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1);
    }
}
