//! Recovery of structured transition records from raw model output.
//!
//! The backend is asked for strict JSON, but what comes back can be wrapped
//! in Markdown fences, preceded by prose, carry comments, miss separators
//! between sibling objects, or stop mid-record at the output ceiling. The
//! repair pass below is a pure text transform; only the final step parses.
//!
//! Repairs never invent content. A truncated response is cut back to the last
//! complete record and closed; a record that was cut off is dropped.

use slidesync_models::{RawTransitionRecord, TransitionEnvelope};

/// Which repairs were needed to make the text parseable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub stripped_fences: bool,
    pub stripped_comments: bool,
    pub discarded_prefix: bool,
    /// The payload was a bare record array and got the envelope key added
    pub wrapped_array: bool,
    pub inserted_separators: usize,
    pub removed_trailing_commas: usize,
    pub discarded_suffix: bool,
    pub truncated: bool,
}

impl RepairReport {
    /// True when the input was already well-formed.
    pub fn is_clean(&self) -> bool {
        *self == RepairReport::default()
    }

    /// Short names of the repairs applied, for logs and metrics.
    pub fn applied(&self) -> Vec<&'static str> {
        let mut applied = Vec::new();
        if self.stripped_fences {
            applied.push("fences");
        }
        if self.stripped_comments {
            applied.push("comments");
        }
        if self.discarded_prefix {
            applied.push("prefix");
        }
        if self.wrapped_array {
            applied.push("array_root");
        }
        if self.inserted_separators > 0 {
            applied.push("separators");
        }
        if self.removed_trailing_commas > 0 {
            applied.push("trailing_commas");
        }
        if self.discarded_suffix {
            applied.push("suffix");
        }
        if self.truncated {
            applied.push("truncation");
        }
        applied
    }
}

/// Result of the text repair pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairedText {
    /// Parseable text, or `None` when the response was cut off before the
    /// first complete record
    pub text: Option<String>,
    pub report: RepairReport,
}

/// Records recovered from a response plus the repairs that were needed.
#[derive(Debug, Clone, PartialEq)]
pub struct Recovery {
    pub records: Vec<RawTransitionRecord>,
    pub report: RepairReport,
}

/// The response could not be turned into records even after repair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryError {
    pub message: String,
    /// The unmodified response, kept for diagnostics
    pub raw_text: String,
}

impl std::fmt::Display for RecoveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RecoveryError {}

/// Repair and parse `raw` into transition records.
pub fn recover_transitions(raw: &str) -> Result<Vec<RawTransitionRecord>, RecoveryError> {
    recover_with_report(raw).map(|r| r.records)
}

/// Like [`recover_transitions`], also reporting which repairs were applied.
pub fn recover_with_report(raw: &str) -> Result<Recovery, RecoveryError> {
    let repaired = repair_response_text(raw).map_err(|message| RecoveryError {
        message,
        raw_text: raw.to_string(),
    })?;

    let Some(text) = repaired.text else {
        return Ok(Recovery {
            records: Vec::new(),
            report: repaired.report,
        });
    };

    let envelope: TransitionEnvelope = serde_json::from_str(&text).map_err(|e| RecoveryError {
        message: format!("Response is not a valid transition list after repair: {}", e),
        raw_text: raw.to_string(),
    })?;

    Ok(Recovery {
        records: envelope.transitions,
        report: repaired.report,
    })
}

/// Repair `raw` into text that should parse as the response envelope.
///
/// Well-formed input comes back unchanged apart from surrounding whitespace.
/// A bare array of records is wrapped in the envelope. Fails only when the
/// text contains no object at all.
pub fn repair_response_text(raw: &str) -> Result<RepairedText, String> {
    let mut report = RepairReport::default();

    let (text, stripped) = strip_fences(raw.trim());
    report.stripped_fences = stripped;

    let payload =
        find_payload(&text).ok_or_else(|| "Response contains no JSON object".to_string())?;
    report.discarded_prefix = !text[..payload.start].trim().is_empty();

    // String state is only meaningful from the payload on; quotes in the
    // prose before it must not leak in.
    let (text, stripped) = strip_comments(&text[payload.start..]);
    report.stripped_comments = stripped;

    let text = if payload.array_root {
        report.wrapped_array = true;
        format!("{}{}", ARRAY_ENVELOPE_OPEN, text)
    } else {
        text
    };

    let (text, inserted, removed) = fix_separators(&text);
    report.inserted_separators = inserted;
    report.removed_trailing_commas = removed;

    let scan = scan_structure(&text, payload.array_root);
    let text = match scan.root_end {
        Some(end) => {
            report.discarded_suffix = !text[end..].trim().is_empty();
            let mut kept = text[..end].to_string();
            if payload.array_root {
                kept.push('}');
            }
            Some(kept)
        }
        None => {
            report.truncated = true;
            scan.last_boundary.map(|boundary| {
                let mut kept = text[..boundary.end].to_string();
                kept.extend(boundary.open.iter().rev().map(|&open| closer_for(open)));
                kept
            })
        }
    };

    Ok(RepairedText { text, report })
}

/// Opening of the envelope put in front of a bare record array.
const ARRAY_ENVELOPE_OPEN: &str = "{\"transitions\":";

/// Where the JSON payload starts in the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Payload {
    start: usize,
    /// The payload is `[...]` rather than the envelope object
    array_root: bool,
}

/// Find the first `{`, or an earlier `[` that opens a record array, skipping
/// comments in the prose before it.
fn find_payload(text: &str) -> Option<Payload> {
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match (c, chars.peek().map(|&(_, next)| next)) {
            ('{', _) => {
                return Some(Payload {
                    start: i,
                    array_root: false,
                })
            }
            ('[', _) if text[i + 1..].trim_start().starts_with(|n: char| n == '{' || n == ']') => {
                return Some(Payload {
                    start: i,
                    array_root: true,
                })
            }
            ('/', Some('/')) => {
                while chars.next_if(|&(_, next)| next != '\n').is_some() {}
            }
            ('/', Some('*')) => {
                chars.next();
                let mut previous = '\0';
                for (_, next) in chars.by_ref() {
                    if previous == '*' && next == '/' {
                        break;
                    }
                    previous = next;
                }
            }
            _ => {}
        }
    }
    None
}

/// Drop Markdown code fence lines (and fence markers glued to content).
fn strip_fences(text: &str) -> (String, bool) {
    if !text.contains("```") {
        return (text.to_string(), false);
    }

    let mut changed = false;
    let mut lines = Vec::new();
    for line in text.lines() {
        let mut line = line;
        if let Some(rest) = line.trim_start().strip_prefix("```") {
            changed = true;
            // Drop the info string, e.g. "json".
            line = rest
                .trim_start_matches('`')
                .trim_start_matches(|c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        }
        let tail = line.trim_end();
        if tail.ends_with("```") {
            changed = true;
            line = tail.trim_end_matches('`');
        }
        lines.push(line);
    }

    if !changed {
        return (text.to_string(), false);
    }
    (lines.join("\n").trim().to_string(), true)
}

/// Remove `// line` and `/* block */` comments outside string literals.
fn strip_comments(text: &str) -> (String, bool) {
    if !text.contains("//") && !text.contains("/*") {
        return (text.to_string(), false);
    }

    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;
    let mut changed = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match (c, chars.peek().copied()) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                changed = true;
                // Keep the newline so line structure survives.
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            ('/', Some('*')) => {
                changed = true;
                chars.next();
                let mut previous = '\0';
                for next in chars.by_ref() {
                    if previous == '*' && next == '/' {
                        break;
                    }
                    previous = next;
                }
            }
            _ => out.push(c),
        }
    }

    (out, changed)
}

/// Insert the missing comma in `}{` adjacency and drop commas directly
/// before a closing delimiter. Returns (text, inserted, removed).
fn fix_separators(text: &str) -> (String, usize, usize) {
    let mut out = String::with_capacity(text.len() + 8);
    let mut in_string = false;
    let mut escaped = false;
    let mut inserted = 0;
    let mut removed = 0;
    // Last significant character outside strings and where it sits in `out`.
    let mut last_sig: Option<(char, usize)> = None;

    for c in text.chars() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
                last_sig = Some(('"', out.len() - 1));
            }
            continue;
        }

        match c {
            '{' if matches!(last_sig, Some(('}', _))) => {
                if let Some((_, at)) = last_sig {
                    out.insert(at + 1, ',');
                    inserted += 1;
                }
            }
            '}' | ']' => {
                if let Some((',', at)) = last_sig {
                    out.remove(at);
                    removed += 1;
                }
            }
            _ => {}
        }

        out.push(c);
        if c == '"' {
            in_string = true;
        } else if !c.is_whitespace() {
            last_sig = Some((c, out.len() - c.len_utf8()));
        }
    }

    (out, inserted, removed)
}

/// A position where the text could be cut and closed without leaving a
/// partial record behind.
#[derive(Debug, Clone)]
struct Boundary {
    /// Byte offset just past the closing delimiter
    end: usize,
    /// Delimiters still open at that point, outermost first
    open: Vec<char>,
}

#[derive(Debug, Default)]
struct Scan {
    /// Byte offset just past the delimiter that closes the root object
    root_end: Option<usize>,
    last_boundary: Option<Boundary>,
}

/// Walk the structure outside string literals, looking for the end of the
/// root object and the last complete element of the top-level array.
///
/// With `array_root` the text starts with the envelope opening that was put in
/// front of a bare array, and closing that array ends the root.
fn scan_structure(text: &str, array_root: bool) -> Scan {
    let mut scan = Scan::default();
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    // Boundary seen but not yet confirmed by what follows it.
    let mut pending: Option<Boundary> = None;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if c.is_whitespace() {
            continue;
        }

        if let Some(boundary) = pending.take() {
            if matches!(c, ',' | ']' | '}') {
                scan.last_boundary = Some(boundary);
            }
        }

        match c {
            '"' => in_string = true,
            '{' | '[' => stack.push(c),
            '}' | ']' => {
                stack.pop();
                if stack.is_empty() || (array_root && c == ']' && stack.len() == 1) {
                    scan.root_end = Some(i + c.len_utf8());
                    return scan;
                }
                // A record closed inside the top-level array, or the array
                // itself closed inside the root object.
                let is_record = c == '}' && stack.len() == 2 && stack[1] == '[';
                let is_array = c == ']' && stack.len() == 1;
                if is_record || is_array {
                    pending = Some(Boundary {
                        end: i + c.len_utf8(),
                        open: stack.clone(),
                    });
                }
            }
            _ => {}
        }
    }

    // Text ran out right after a complete element.
    if let Some(boundary) = pending {
        scan.last_boundary = Some(boundary);
    }
    scan
}

fn closer_for(open: char) -> char {
    if open == '[' {
        ']'
    } else {
        '}'
    }
}
