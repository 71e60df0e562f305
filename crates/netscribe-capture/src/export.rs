//! Plain-text report rendering and the download sink.
//!
//! Two reports: a numbered network report built from page-side records (or
//! the observer buffer when there are none) and a console report with one
//! block per captured line. Network reports can be read back with
//! [`read_network_report`].

use std::fs;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::types::{CapturedLogLine, CapturedRequest, HeaderMap, NetworkLogEntry, QueryMap};
use netscribe_core::{Error, Result};

const HEAVY_RULE: &str =
    "================================================================================";
const LIGHT_RULE: &str =
    "--------------------------------------------------------------------------------";

/// One text file ready to be handed to a download sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportFile {
    pub filename: String,
    pub content: String,
}

/// The files produced by one export; either may be absent when empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportBundle {
    pub network: Option<ReportFile>,
    pub console: Option<ReportFile>,
}

impl ExportBundle {
    pub fn is_empty(&self) -> bool {
        self.network.is_none() && self.console.is_none()
    }

    pub fn files(&self) -> impl Iterator<Item = &ReportFile> {
        self.network.iter().chain(self.console.iter())
    }
}

/// Where exported files end up.
pub trait Downloads: Send + Sync {
    /// Store one file; returns where it was written.
    fn save(&self, file: &ReportFile) -> Result<PathBuf>;
}

/// Writes exported files into a directory.
#[derive(Debug, Clone)]
pub struct DirectoryDownloads {
    dir: PathBuf,
}

impl DirectoryDownloads {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl Downloads for DirectoryDownloads {
    fn save(&self, file: &ReportFile) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(&file.filename);
        fs::write(&path, &file.content)?;
        info!("Wrote {} ({} bytes)", path.display(), file.content.len());
        Ok(path)
    }
}

/// Filename-safe form of an ISO timestamp: `:` and `.` become `-`.
pub fn report_timestamp(iso: &str) -> String {
    iso.replace([':', '.'], "-")
}

/// Build the export for one download.
///
/// Page-side records win over the observer buffer when there are any.
pub fn build_export(
    page_entries: &[NetworkLogEntry],
    observed: &[CapturedRequest],
    console: &[CapturedLogLine],
    now_iso: &str,
) -> ExportBundle {
    let stamp = report_timestamp(now_iso);

    let network_entries: Vec<NetworkLogEntry> = if page_entries.is_empty() {
        observed.iter().map(NetworkLogEntry::from).collect()
    } else {
        page_entries.to_vec()
    };

    let network = (!network_entries.is_empty()).then(|| ReportFile {
        filename: format!("network-log-{}.txt", stamp),
        content: render_network_report(&network_entries),
    });
    let console = (!console.is_empty()).then(|| ReportFile {
        filename: format!("console-log-{}.txt", stamp),
        content: render_console_report(console),
    });

    ExportBundle { network, console }
}

// ---------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------

pub fn render_network_report(entries: &[NetworkLogEntry]) -> String {
    let mut out = String::new();
    for (index, entry) in entries.iter().enumerate() {
        push_line(&mut out, HEAVY_RULE);
        push_line(&mut out, &format!("REQUEST #{}", index + 1));
        push_line(&mut out, HEAVY_RULE);
        push_line(&mut out, &format!("TIMESTAMP: {}", entry.timestamp));
        push_line(&mut out, &format!("METHOD: {}", entry.method));
        push_line(&mut out, &format!("URL: {}", entry.url));

        if !entry.query_string.is_empty() {
            push_line(&mut out, "QUERY PARAMETERS:");
            push_pairs(&mut out, &entry.query_string);
        }

        push_line(&mut out, &format!("DURATION: {}ms", entry.duration.unwrap_or(0)));
        let status = entry
            .status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "pending".into());
        push_line(&mut out, &format!("STATUS: {}", status));
        if let Some(text) = entry.status_text.as_deref().filter(|t| !t.is_empty()) {
            push_line(&mut out, &format!("STATUS TEXT: {}", text));
        }
        push_line(&mut out, LIGHT_RULE);

        if !entry.request_headers.is_empty() {
            push_line(&mut out, "REQUEST HEADERS:");
            push_pairs(&mut out, &entry.request_headers);
            push_line(&mut out, LIGHT_RULE);
        }

        if let Some(body) = non_empty(&entry.request_body) {
            push_line(&mut out, "REQUEST BODY:");
            push_line(&mut out, &pretty_body(body));
            push_line(&mut out, LIGHT_RULE);
        }

        if !entry.response_headers.is_empty() {
            push_line(&mut out, "RESPONSE HEADERS:");
            push_pairs(&mut out, &entry.response_headers);
            push_line(&mut out, LIGHT_RULE);
        }

        if let Some(body) = non_empty(&entry.response_body) {
            push_line(&mut out, "RESPONSE BODY:");
            push_line(&mut out, &pretty_body(body));
        }

        if let Some(error) = non_empty(&entry.error) {
            push_line(&mut out, &format!("ERROR: {}", error));
        }

        push_line(&mut out, HEAVY_RULE);
        out.push('\n');
    }
    out
}

pub fn render_console_report(lines: &[CapturedLogLine]) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(&format!(
            "[{}] [{}] {}\nURL: {}\n\n",
            line.timestamp, line.level, line.message, line.url
        ));
    }
    out
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push('\n');
}

fn push_pairs(out: &mut String, pairs: &HeaderMap) {
    for (key, value) in pairs {
        push_line(out, &format!("  {}: {}", key, value));
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// JSON bodies pretty-printed with 2-space indent, anything else verbatim.
fn pretty_body(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| serde_json::to_string_pretty(&v).ok())
        .unwrap_or_else(|| body.to_string())
}

// ---------------------------------------------------------------
// Reading reports back
// ---------------------------------------------------------------

/// A body as found in a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReportBody {
    Json(Value),
    Text(String),
}

impl ReportBody {
    fn parse(text: String) -> Self {
        match serde_json::from_str(&text) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Text(text),
        }
    }
}

/// One request block of a network report.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEntry {
    pub number: usize,
    pub timestamp: String,
    pub method: String,
    pub url: String,
    pub query_string: QueryMap,
    pub duration: u64,
    /// `None` when the report says `pending`.
    pub status: Option<u16>,
    pub status_text: Option<String>,
    pub request_headers: HeaderMap,
    pub request_body: Option<ReportBody>,
    pub response_headers: HeaderMap,
    pub response_body: Option<ReportBody>,
    pub error: Option<String>,
}

enum Section {
    Fields,
    Query,
    RequestHeaders,
    ResponseHeaders,
    RequestBody(Vec<String>),
    ResponseBody(Vec<String>),
}

/// Parse a network report produced by [`render_network_report`].
///
/// Separator lines are not escaped inside bodies, so block and body
/// boundaries are recognised by what follows them: a block ends at the heavy
/// rule that precedes the next request header (or the end of the report), a
/// request body at the light rule that precedes a response section, an error
/// line or the end of the block. A response body whose last line starts with
/// `ERROR: ` is read as a body followed by the error line.
pub fn read_network_report(text: &str) -> Result<Vec<ReportEntry>> {
    let lines: Vec<&str> = text.lines().collect();
    let mut entries = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if lines[i].is_empty() {
            i += 1;
            continue;
        }
        let number = request_number(&lines, i)
            .ok_or_else(|| Error::Export(format!("line {}: expected request header", i + 1)))?;

        let start = i + 3;
        let end = block_end(&lines, start, number + 1)
            .ok_or_else(|| Error::Export(format!("request #{} is not terminated", number)))?;

        let mut entry = parse_block(&lines[start..end])?;
        entry.number = number;
        entries.push(entry);
        i = end + 1;
    }

    Ok(entries)
}

/// The request number when `lines[at..]` opens a request block.
fn request_number(lines: &[&str], at: usize) -> Option<usize> {
    if lines.get(at) != Some(&HEAVY_RULE) || lines.get(at + 2) != Some(&HEAVY_RULE) {
        return None;
    }
    lines.get(at + 1)?.strip_prefix("REQUEST #")?.parse().ok()
}

/// Index of the heavy rule closing the block that starts at `start`.
fn block_end(lines: &[&str], start: usize, next_number: usize) -> Option<usize> {
    (start..lines.len()).find(|&p| {
        if lines[p] != HEAVY_RULE {
            return false;
        }
        let rest = &lines[p + 1..];
        match rest.iter().position(|l| !l.is_empty()) {
            None => true,
            Some(skip) => request_number(lines, p + 1 + skip) == Some(next_number),
        }
    })
}

/// Whether a light rule at `at` closes a request body.
fn ends_request_body(lines: &[&str], at: usize) -> bool {
    match lines.get(at + 1) {
        None => true,
        Some(&next) => {
            next == "RESPONSE HEADERS:" || next == "RESPONSE BODY:" || next.starts_with("ERROR: ")
        }
    }
}

fn parse_block(lines: &[&str]) -> Result<ReportEntry> {
    let mut entry = ReportEntry::default();
    let mut section = Section::Fields;

    for (at, &line) in lines.iter().enumerate() {
        section = match section {
            Section::RequestBody(mut body) => {
                if line == LIGHT_RULE && ends_request_body(lines, at) {
                    entry.request_body = Some(ReportBody::parse(body.join("\n")));
                    Section::Fields
                } else {
                    body.push(line.to_string());
                    Section::RequestBody(body)
                }
            }
            Section::ResponseBody(mut body) => {
                body.push(line.to_string());
                Section::ResponseBody(body)
            }
            Section::Query | Section::RequestHeaders | Section::ResponseHeaders
                if line.starts_with("  ") =>
            {
                let (key, value) = line[2..]
                    .split_once(": ")
                    .ok_or_else(|| Error::Export(format!("bad pair line: {}", line)))?;
                let target = match section {
                    Section::Query => &mut entry.query_string,
                    Section::RequestHeaders => &mut entry.request_headers,
                    _ => &mut entry.response_headers,
                };
                target.insert(key.to_string(), value.to_string());
                section
            }
            _ => parse_field(&mut entry, line)?,
        };
    }

    match section {
        Section::ResponseBody(mut body) => {
            if let Some(error) = body.last().and_then(|l| l.strip_prefix("ERROR: ")) {
                entry.error = Some(error.to_string());
                body.pop();
            }
            entry.response_body = Some(ReportBody::parse(body.join("\n")));
        }
        Section::RequestBody(_) => {
            return Err(Error::Export("request body is not terminated".into()));
        }
        _ => {}
    }

    Ok(entry)
}

fn parse_field(entry: &mut ReportEntry, line: &str) -> Result<Section> {
    let section = match line {
        LIGHT_RULE => Section::Fields,
        "QUERY PARAMETERS:" => Section::Query,
        "REQUEST HEADERS:" => Section::RequestHeaders,
        "RESPONSE HEADERS:" => Section::ResponseHeaders,
        "REQUEST BODY:" => Section::RequestBody(Vec::new()),
        "RESPONSE BODY:" => Section::ResponseBody(Vec::new()),
        _ => {
            let (name, value) = line
                .split_once(": ")
                .ok_or_else(|| Error::Export(format!("unrecognized line: {}", line)))?;
            match name {
                "TIMESTAMP" => entry.timestamp = value.to_string(),
                "METHOD" => entry.method = value.to_string(),
                "URL" => entry.url = value.to_string(),
                "DURATION" => {
                    entry.duration = value
                        .strip_suffix("ms")
                        .and_then(|d| d.parse().ok())
                        .ok_or_else(|| Error::Export(format!("bad duration: {}", value)))?;
                }
                "STATUS" if value == "pending" => entry.status = None,
                "STATUS" => {
                    entry.status = Some(
                        value
                            .parse()
                            .map_err(|_| Error::Export(format!("bad status: {}", value)))?,
                    );
                }
                "STATUS TEXT" => entry.status_text = Some(value.to_string()),
                "ERROR" => entry.error = Some(value.to_string()),
                other => return Err(Error::Export(format!("unknown field: {}", other))),
            }
            Section::Fields
        }
    };
    Ok(section)
}
