//! Markdown report assembly.
//!
//! [`ReportWriter`] collects titles and response bodies in memory, numbers
//! every title on a counter stack for the table of content, and harvests
//! numeric finding rows out of the markdown tables the model returns. On
//! close it ranks all scopes by total penalty and writes the final file in
//! one ordered pass: title, TOC, body, then the "Most important findings"
//! summary.
//!
//! ## Crash Safety
//!
//! Every appended line is also written synchronously to a sibling
//! `{out}.temporary` file. A run that dies mid-review leaves that file
//! behind with everything collected so far; a clean close writes the real
//! report and deletes it.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::error::ReviewError;

/// Reserved name of the per-scope aggregate row. A model finding with this
/// exact name gets `_` appended so the aggregate stays unambiguous.
pub const TOTAL_FINDINGS: &str = "All findings";

/// How many findings each scope shows in the summary.
const MAX_FINDINGS_PER_SCOPE: usize = 10;

/// One `| name | count | weight |` row; trailing cell text after the
/// integers (e.g. units) is tolerated and ignored.
static RE_FINDING_ROW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\|\s*(?P<name>[^|]*?)\s*\|\s*(?P<count>\d+)\b[^|]*\|\s*(?P<weight>\d+)\b[^|]*\|\s*$")
        .unwrap()
});

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static RE_ANCHOR_STRIP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[.?()\[\]/!"$&:;,<>|]"#).unwrap());

static RE_LEADING_HASHES: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#+").unwrap());

/// One scored issue parsed from a response table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub name: String,
    pub count: u64,
    pub weight: u64,
}

/// Collects the review output and writes the final markdown file.
pub struct ReportWriter {
    out_path: PathBuf,
    temp_path: PathBuf,
    temp_file: File,
    /// `# {title}` line, written first on flush and never part of the body.
    title_line: String,
    body: Vec<String>,
    toc: Vec<String>,
    /// Per-rank title counters; the stack length is the rank of the last
    /// title and drives heading demotion in [`ReportWriter::document`].
    counters: Vec<u64>,
    /// Findings per scope, in first-seen scope order.
    findings: Vec<(String, Vec<Finding>)>,
    max_important_findings: usize,
}

impl ReportWriter {
    /// Create the writer and its temporary sibling file, and open the
    /// report with an `Introduction` section holding `description`.
    pub fn new(
        out_path: impl Into<PathBuf>,
        title: &str,
        description: &str,
        max_important_findings: usize,
    ) -> Result<Self, ReviewError> {
        let out_path = out_path.into();
        let temp_path = PathBuf::from(format!("{}.temporary", out_path.display()));
        let temp_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&temp_path)
            .map_err(|e| report_error(&temp_path, e))?;

        let mut writer = ReportWriter {
            out_path,
            temp_path,
            temp_file,
            title_line: format!("# {title}"),
            body: Vec::new(),
            toc: Vec::new(),
            counters: Vec::new(),
            findings: Vec::new(),
            max_important_findings,
        };
        writer.add_title(1, "Introduction")?;
        writer.document(description)?;
        Ok(writer)
    }

    pub fn out_path(&self) -> &Path {
        &self.out_path
    }

    /// Number of scopes that produced at least one finding so far.
    pub fn scopes_with_findings(&self) -> usize {
        self.findings.len()
    }

    pub fn findings_for(&self, scope: &str) -> Option<&[Finding]> {
        self.findings
            .iter()
            .find(|(s, _)| s == scope)
            .map(|(_, rows)| rows.as_slice())
    }

    /// Add a numbered title at `rank` (1 = `#`).
    pub fn add_title(&mut self, rank: usize, name: &str) -> Result<(), ReviewError> {
        let rank = rank.max(1);
        let line = format!("{} {}", "#".repeat(rank), name);
        self.append(&line)?;
        self.push_toc_entry(rank, name);
        Ok(())
    }

    /// Append free text to the report body and return the stored form.
    ///
    /// Literal `\n` escape sequences split into real lines, and leading
    /// `#` runs are demoted to the current section depth so a response
    /// cannot escape its place in the hierarchy.
    pub fn document(&mut self, line: &str) -> Result<String, ReviewError> {
        let hashes = "#".repeat(self.counters.len());
        let text = line
            .split("\\n")
            .map(|piece| RE_LEADING_HASHES.replace(piece, hashes.as_str()).into_owned())
            .collect::<Vec<_>>()
            .join("\n");
        self.append(&text)?;
        Ok(text)
    }

    /// Append a model response and harvest its finding-table rows into
    /// `scope`'s findings.
    ///
    /// Rows merge on `(name, weight)` by summing counts. Each non-empty
    /// scope ends with a rebuilt [`TOTAL_FINDINGS`] row whose weight is the
    /// sum of count x weight over the scope's other rows.
    pub fn document_response(&mut self, scope: &str, content: &str) -> Result<(), ReviewError> {
        let text = self.document(content)?;

        let slot = self.findings.iter().position(|(s, _)| s == scope);
        let mut rows: Vec<Finding> = match slot {
            Some(index) => std::mem::take(&mut self.findings[index].1),
            None => Vec::new(),
        };

        for line in text.split('\n') {
            let Some(caps) = RE_FINDING_ROW.captures(line) else {
                continue;
            };
            let Ok(count) = caps["count"].parse::<u64>() else {
                continue;
            };
            let Ok(weight) = caps["weight"].parse::<u64>() else {
                continue;
            };
            let mut name = caps["name"].trim().to_string();
            if name == TOTAL_FINDINGS {
                name.push('_');
            }
            debug!("finding for {scope}: {name} x{count}, weight {weight}");
            match rows
                .iter_mut()
                .find(|f| f.name == name && f.weight == weight)
            {
                Some(existing) => existing.count += count,
                None => rows.push(Finding {
                    name,
                    count,
                    weight,
                }),
            }
        }

        let mut kept: Vec<Finding> = rows
            .into_iter()
            .filter(|f| f.name != TOTAL_FINDINGS)
            .collect();
        if !kept.is_empty() {
            let total = kept.iter().map(|f| f.count * f.weight).sum();
            kept.push(Finding {
                name: TOTAL_FINDINGS.to_string(),
                count: 1,
                weight: total,
            });
        }
        match slot {
            Some(index) => self.findings[index].1 = kept,
            None if !kept.is_empty() => self.findings.push((scope.to_string(), kept)),
            None => {}
        }
        Ok(())
    }

    /// Write the final report in order and delete the temporary file.
    pub fn flush_and_close(mut self) -> Result<(), ReviewError> {
        let path = self.out_path.clone();
        let werr = |e: std::io::Error| report_error(&path, e);

        let mut file = File::create(&path).map_err(werr)?;
        writeln!(file, "{}", self.title_line).map_err(werr)?;
        writeln!(file, "## Table of content").map_err(werr)?;

        // The summary appends its own TOC entries, so it is built before
        // the TOC is written even though it lands at the end of the file.
        let summary = self.most_important_findings();

        for entry in &self.toc {
            write!(file, "{entry}\n\n").map_err(werr)?;
        }
        for line in &self.body {
            write!(file, "\n{line}\n").map_err(werr)?;
        }
        if !summary.is_empty() {
            writeln!(file, "{summary}").map_err(werr)?;
        }

        drop(self.temp_file);
        let _ = std::fs::remove_file(&self.temp_path);
        Ok(())
    }

    /// Rank scopes by their aggregate penalty and render the top scopes
    /// with their top findings.
    fn most_important_findings(&mut self) -> String {
        if self.findings.is_empty() {
            return String::new();
        }

        let mut ranked: Vec<(String, Vec<Finding>, u64)> = self
            .findings
            .iter()
            .map(|(scope, rows)| {
                let total = rows
                    .iter()
                    .find(|f| f.name == TOTAL_FINDINGS)
                    .map(|f| f.weight)
                    .unwrap_or(0);
                let mut rows = rows.clone();
                rows.sort_by(|a, b| (b.count * b.weight).cmp(&(a.count * a.weight)));
                (scope.clone(), rows, total)
            })
            .collect();
        ranked.sort_by(|a, b| b.2.cmp(&a.2));

        let mut out = String::new();
        self.push_toc_entry(1, "Most important findings");
        out.push_str("## Most important findings\n\n");
        for (scope, rows, _) in ranked.iter().take(self.max_important_findings) {
            self.push_toc_entry(2, scope);
            out.push_str(&format!("### {scope}\n\n"));
            out.push_str("| Finding type | Number findings | Weight | Total penalties |\n");
            out.push_str("| --- | --- | --- | --- |\n");
            for finding in rows.iter().take(MAX_FINDINGS_PER_SCOPE) {
                out.push_str(&format!(
                    "| {} | {} | {} | {} |\n",
                    finding.name,
                    finding.count,
                    finding.weight,
                    finding.count * finding.weight
                ));
            }
            out.push('\n');
        }
        out
    }

    fn append(&mut self, data: &str) -> Result<(), ReviewError> {
        self.body.push(data.to_string());
        writeln!(self.temp_file, "{data}").map_err(|e| report_error(&self.temp_path, e))
    }

    /// Number a title on the counter stack and record its TOC line.
    fn push_toc_entry(&mut self, rank: usize, name: &str) {
        self.counters.resize(rank, 0);
        self.counters[rank - 1] += 1;
        let dotted = self
            .counters
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(".");
        let indent = "    ".repeat(rank - 1);
        self.toc
            .push(format!("{indent}{dotted}. [{name}](#{})", slug(name)));
    }
}

/// Anchor slug: lowercase, whitespace runs become `-`, punctuation dropped.
fn slug(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let dashed = RE_WHITESPACE.replace_all(&lowered, "-");
    RE_ANCHOR_STRIP.replace_all(&dashed, "").into_owned()
}

fn report_error(path: &Path, source: std::io::Error) -> ReviewError {
    ReviewError::ReportWrite {
        path: path.to_path_buf(),
        source,
    }
}
