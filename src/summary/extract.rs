//! Locating the last complete JSON object in captured output
//!
//! The tool prints one JSON object per progress update, interleaved with
//! plain log lines, and only the last object is the final job summary.

use crate::common::{Error, Result};

/// Byte range of one balanced `{...}` in the scanned text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start: usize,
    end: usize,
}

/// Whether the `{` just before `rest` can open a JSON object
///
/// An object's first token is a key or its closing brace, which keeps
/// braces in ordinary log text (`unexpected { in path`) from opening one.
fn opens_object(rest: &[u8]) -> bool {
    rest.iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_none_or(|&b| b == b'"' || b == b'}')
}

/// Every balanced object in `text`, in the order they close
///
/// One pass with a stack of open brackets. Quotes are tracked everywhere but
/// a raw newline ends any string, since JSON strings cannot contain one; an
/// odd quote in a log line therefore only affects that line. A bracket that
/// never closes stays on the stack and hides nothing: objects after it still
/// close and are recorded. Closers that do not match the innermost opener
/// are ignored.
fn balanced_objects(text: &str) -> Vec<Span> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut open: Vec<(usize, u8)> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (index, &b) in bytes.iter().enumerate() {
        if in_string {
            if b == b'\n' {
                in_string = false;
                escaped = false;
            } else if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' if opens_object(&bytes[index + 1..]) => open.push((index, b'{')),
            b'[' => open.push((index, b'[')),
            b'}' | b']' => {
                let expected = if b == b'}' { b'{' } else { b'[' };
                if let Some(&(start, opener)) = open.last() {
                    if opener == expected {
                        open.pop();
                        if opener == b'{' {
                            spans.push(Span {
                                start,
                                end: index + 1,
                            });
                        }
                    }
                }
            }
            _ => {}
        }
    }

    spans
}

/// Text of the last complete JSON object in `output`
///
/// The last object to close is never nested in another complete object,
/// so it is the final top-level one. An object still open at the end of
/// the stream is ignored. The text is not validated here; see
/// [`final_summary_text`].
pub fn extract_final_object(output: &str) -> Option<&str> {
    balanced_objects(output)
        .last()
        .map(|span| &output[span.start..span.end])
}

/// Line-oriented extraction for pretty-printed output
///
/// Requires opening and closing braces of top-level objects to sit alone
/// on their own lines. Lines are walked from the end: a `}` line raises the
/// depth, a `{` line lowers it, and accumulation stops once it is back to
/// zero. Blank lines and anything after the last `}` line are skipped.
pub fn extract_final_object_by_lines(output: &str) -> Option<String> {
    let mut depth: i64 = 0;
    let mut collected: Vec<&str> = Vec::new();

    for line in output.lines().rev() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if collected.is_empty() && trimmed != "}" {
            continue;
        }

        if trimmed == "}" {
            depth += 1;
        } else if trimmed == "{" {
            depth -= 1;
        }

        collected.push(line.trim_end_matches('\r'));

        if depth == 0 {
            collected.reverse();
            return Some(collected.join("\n"));
        }
    }

    None
}

/// Final summary text, trying the tokenizer before the line heuristic
///
/// The last object must itself be valid JSON. A corrupted final object is
/// reported as [`Error::MalformedOutput`] rather than replaced by an
/// earlier, stale one.
pub fn final_summary_text(output: &str) -> Result<String> {
    let candidate = match extract_final_object(output) {
        Some(object) => object.to_string(),
        None => {
            let object = extract_final_object_by_lines(output)
                .ok_or(Error::MalformedOutput(output.len()))?;
            tracing::debug!("summary found by line-oriented fallback");
            object
        }
    };

    match serde_json::from_str::<serde_json::Value>(&candidate) {
        Ok(value) if value.is_object() => Ok(candidate),
        Ok(_) => Err(Error::MalformedOutput(output.len())),
        Err(e) => {
            tracing::debug!(error = %e, "final object is not valid JSON");
            Err(Error::MalformedOutput(output.len()))
        }
    }
}
