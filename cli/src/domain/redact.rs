//! Redaction and truncation of command text and captured output.
//!
//! Everything a step event carries passes through here before it leaves the
//! executor, so secrets embedded in heredocs never reach a terminal or log.

/// Replacement for every redacted secret.
pub const MASK: &str = "********";

/// Maximum display length of a command label, in characters.
pub const LABEL_MAX_CHARS: usize = 160;

/// Default number of trailing output bytes kept per step.
pub const DEFAULT_OUTPUT_TAIL_BYTES: usize = 4096;

/// Number of trailing output lines quoted in a failure message.
pub const ERROR_EXCERPT_LINES: usize = 3;

/// Replaces known secret values with [`MASK`].
#[derive(Debug, Clone, Default)]
pub struct Redactor {
    secrets: Vec<String>,
}

impl Redactor {
    #[must_use]
    pub fn new(secrets: impl IntoIterator<Item = String>) -> Self {
        let mut secrets: Vec<String> = secrets.into_iter().filter(|s| !s.is_empty()).collect();
        // Longest first so a secret that contains another is masked whole.
        secrets.sort_by_key(|s| std::cmp::Reverse(s.len()));
        secrets.dedup();
        Self { secrets }
    }

    #[must_use]
    pub fn redact(&self, text: &str) -> String {
        let mut out = text.to_string();
        for secret in &self.secrets {
            if out.contains(secret.as_str()) {
                out = out.replace(secret.as_str(), MASK);
            }
        }
        out
    }

    /// Display label for a command: first line only, redacted, then
    /// truncated to [`LABEL_MAX_CHARS`].
    #[must_use]
    pub fn label(&self, command: &str) -> String {
        let first = command.lines().next().unwrap_or_default().trim();
        let redacted = self.redact(first);
        let multiline = command.trim_end().contains('\n');
        truncate_chars(&redacted, LABEL_MAX_CHARS, multiline)
    }

    /// Tail of captured output, decoded lossily and redacted.
    ///
    /// Redaction runs on the full text before truncation so a secret that
    /// straddles the cut point is still masked.
    #[must_use]
    pub fn output_tail(&self, output: &[u8], max_bytes: usize) -> String {
        let text = String::from_utf8_lossy(output);
        let redacted = self.redact(&text);
        tail(&redacted, max_bytes)
    }
}

/// Last `max_bytes` of `text`, on a char boundary, with a marker when cut.
#[must_use]
pub fn tail(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut start = text.len() - max_bytes;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("[... {start} bytes truncated]\n{}", &text[start..])
}

/// Last few non-empty lines of output, joined with `; ` for one-line messages.
#[must_use]
pub fn error_excerpt(output: &str) -> String {
    let lines: Vec<&str> = output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("[... "))
        .collect();
    let from = lines.len().saturating_sub(ERROR_EXCERPT_LINES);
    lines[from..].join("; ")
}

/// Failure message for a command that exited non-zero.
#[must_use]
pub fn exit_failure_message(code: i32, output: &str) -> String {
    let excerpt = error_excerpt(output);
    if excerpt.is_empty() {
        format!("exit status {code}")
    } else {
        format!("exit status {code}: {excerpt}")
    }
}

fn truncate_chars(text: &str, max: usize, force_ellipsis: bool) -> String {
    let count = text.chars().count();
    if count <= max && !force_ellipsis {
        return text.to_string();
    }
    let keep = max.saturating_sub(1).min(count);
    let mut out: String = text.chars().take(keep).collect();
    out.push('…');
    out
}
