//! Content emitter: one markdown document per issue, front matter first.
//!
//! The output directory is replaced wholesale on every call; nothing is
//! updated incrementally. Owner and repository reach the comment widget
//! through [`RepoRef`], never through module state.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::SecondsFormat;
use tracing::{debug, error, info};

use crate::config::ContentStyle;
use crate::model::{Issue, RepoRef};

#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    #[error("failed to reset content directory {path}: {source}")]
    ResetDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write content file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Replaces `output_dir` with one document per issue and returns the written
/// paths in issue order.
pub fn generate_content(
    issues: &[Issue],
    output_dir: &Path,
    site: &RepoRef,
    style: &ContentStyle,
) -> Result<Vec<PathBuf>, EmitError> {
    if output_dir.exists() {
        fs::remove_dir_all(output_dir).map_err(|source| {
            error!(error = ?source, path = %output_dir.display(), "Failed to remove content directory");
            EmitError::ResetDir {
                path: output_dir.to_path_buf(),
                source,
            }
        })?;
        debug!(path = %output_dir.display(), "Removed existing content directory");
    }
    fs::create_dir_all(output_dir).map_err(|source| EmitError::ResetDir {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::with_capacity(issues.len());
    for issue in issues {
        let path = output_dir.join(content_file_name(issue));
        fs::write(&path, render_document(issue, site, style)).map_err(|source| {
            error!(error = ?source, path = %path.display(), "Failed to write content file");
            EmitError::Write {
                path: path.clone(),
                source,
            }
        })?;
        debug!(issue = issue.number, path = %path.display(), "Wrote content file");
        written.push(path);
    }

    info!(
        count = written.len(),
        path = %output_dir.display(),
        "Generated content files"
    );
    Ok(written)
}

/// `<number>_<normalized title>.md`
pub fn content_file_name(issue: &Issue) -> String {
    format!("{}_{}.md", issue.number, normalize_title(&issue.title))
}

/// Replaces path separators with `_`, then trims whitespace, `.` and `,`
/// from both ends.
pub fn normalize_title(title: &str) -> String {
    title
        .replace(['/', '\\'], "_")
        .trim_matches(|c: char| c.is_whitespace() || c == '.' || c == ',')
        .to_string()
}

/// Renders the full document: front matter, body, separator, comment widget.
pub fn render_document(issue: &Issue, site: &RepoRef, style: &ContentStyle) -> String {
    let mut doc = render_front_matter(issue, style);
    doc.push_str(&issue.body);
    doc.push_str("\n\n------\n\n");
    doc.push_str(&render_comment_widget(issue, site, style));
    doc
}

fn render_front_matter(issue: &Issue, style: &ContentStyle) -> String {
    let date = issue
        .created_at
        .with_timezone(&style.offset)
        .to_rfc3339_opts(SecondsFormat::Secs, false);

    let mut out = String::from("---\n");
    let _ = writeln!(out, "title: \"{}\"", escape_quoted(&issue.title));
    let _ = writeln!(out, "date: {date}");
    let _ = writeln!(out, "slug: \"{}\"", issue.number);
    if !issue.labels.is_empty() {
        out.push_str("tags: [\n");
        for label in &issue.labels {
            let _ = writeln!(out, "    \"{}\",", escape_quoted(&label.name));
        }
        out.push_str("]\n");
    }
    out.push_str("---\n\n");
    out
}

fn render_comment_widget(issue: &Issue, site: &RepoRef, style: &ContentStyle) -> String {
    format!(
        concat!(
            "<script src=\"https://utteranc.es/client.js\"\n",
            "        repo=\"{repo}\"\n",
            "        issue-number=\"{number}\"\n",
            "        theme=\"{theme}\"\n",
            "        crossorigin=\"anonymous\"\n",
            "        async>\n",
            "</script>\n",
        ),
        repo = site.slug(),
        number = issue.number,
        theme = style.widget_theme,
    )
}

/// Escapes a value for a double-quoted front matter string.
fn escape_quoted(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Author, Comment, Label};
    use chrono::{TimeZone, Utc};

    fn issue(number: u64, title: &str, labels: &[&str]) -> Issue {
        Issue {
            number,
            title: title.to_string(),
            created_at: Utc.with_ymd_and_hms(2021, 3, 4, 20, 15, 0).unwrap(),
            body: "Hello *world*".to_string(),
            url: format!("https://github.com/jdoe/blog/issues/{number}"),
            labels: labels
                .iter()
                .map(|name| Label {
                    name: name.to_string(),
                })
                .collect(),
            comments: vec![],
        }
    }

    fn site() -> RepoRef {
        RepoRef::new("jdoe", "jdoe.github.io")
    }

    #[test]
    fn normalize_replaces_separators_and_trims() {
        assert_eq!(normalize_title("a/b\\c"), "a_b_c");
        assert_eq!(normalize_title("  .,Hello, world.,  "), "Hello, world");
        assert_eq!(normalize_title("..."), "");
    }

    #[test]
    fn file_name_is_number_prefixed() {
        assert_eq!(
            content_file_name(&issue(7, " TCP/IP notes. ", &[])),
            "7_TCP_IP notes.md"
        );
    }

    #[test]
    fn front_matter_has_fixed_fields_and_no_tags_without_labels() {
        let doc = render_document(&issue(3, "Plain", &[]), &site(), &ContentStyle::default());
        let expected_head = "---\ntitle: \"Plain\"\ndate: 2021-03-05T04:15:00+08:00\nslug: \"3\"\n---\n\nHello *world*\n\n------\n\n";
        assert!(doc.starts_with(expected_head), "got:\n{doc}");
        assert!(!doc.contains("tags:"));
    }

    #[test]
    fn tags_follow_label_order() {
        let doc = render_document(
            &issue(4, "Tagged", &["rust", "blog", "notes"]),
            &site(),
            &ContentStyle::default(),
        );
        assert!(doc.contains("tags: [\n    \"rust\",\n    \"blog\",\n    \"notes\",\n]\n---\n"));
    }

    #[test]
    fn quotes_in_title_are_escaped() {
        let doc = render_document(
            &issue(5, "Say \"hi\" \\ bye", &[]),
            &site(),
            &ContentStyle::default(),
        );
        assert!(doc.contains("title: \"Say \\\"hi\\\" \\\\ bye\"\n"), "got:\n{doc}");
    }

    #[test]
    fn widget_embeds_repo_and_issue_number() {
        let style = ContentStyle {
            widget_theme: "github-dark".to_string(),
            ..ContentStyle::default()
        };
        let doc = render_document(&issue(42, "W", &[]), &site(), &style);
        assert!(doc.contains("repo=\"jdoe/jdoe.github.io\""));
        assert!(doc.contains("issue-number=\"42\""));
        assert!(doc.contains("theme=\"github-dark\""));
        assert!(doc.trim_end().ends_with("</script>"));
    }

    #[test]
    fn comments_are_left_to_the_widget() {
        let mut commented = issue(8, "Discussed", &[]);
        commented.comments.push(Comment {
            author: Author {
                login: "octocat".to_string(),
                avatar_url: "https://avatars.example/octocat".to_string(),
            },
            created_at: Utc.with_ymd_and_hms(2021, 3, 5, 0, 0, 0).unwrap(),
            body: "Great write-up, thanks!".to_string(),
        });

        let doc = render_document(&commented, &site(), &ContentStyle::default());
        assert!(!doc.contains("Great write-up"), "got:\n{doc}");
        assert!(!doc.contains("octocat"));
        assert!(!doc.contains("avatars.example"));
        assert_eq!(
            doc,
            render_document(&issue(8, "Discussed", &[]), &site(), &ContentStyle::default())
        );
    }

    #[test]
    fn date_uses_configured_offset() {
        let style = ContentStyle {
            offset: chrono::FixedOffset::west_opt(5 * 3600).unwrap(),
            ..ContentStyle::default()
        };
        let doc = render_document(&issue(1, "T", &[]), &site(), &style);
        assert!(doc.contains("date: 2021-03-04T15:15:00-05:00\n"));
    }

    #[test]
    fn generate_replaces_directory_contents() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("content").join("post");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("stale.md"), "old").unwrap();

        let issues = vec![issue(1, "First", &[]), issue(2, "Second/Part", &["x"])];
        let written = generate_content(&issues, &out, &site(), &ContentStyle::default()).unwrap();

        assert_eq!(
            written,
            vec![out.join("1_First.md"), out.join("2_Second_Part.md")]
        );
        assert!(!out.join("stale.md").exists());
        let mut names: Vec<_> = fs::read_dir(&out)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert_eq!(names, vec!["1_First.md", "2_Second_Part.md"]);
    }
}
