//! Line scanning helpers for the `.conf` parser.

/// A physical line of input, terminator included.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawLine<'a> {
    /// 1-based line number.
    pub number: usize,
    /// Untrimmed text including the trailing `\n` (or `\r\n`) if present.
    pub text: &'a str,
}

impl<'a> RawLine<'a> {
    /// Text with surrounding blanks and line terminators removed.
    pub fn trimmed(&self) -> &'a str {
        trim_line(self.text)
    }

    /// Blank or `#` comment line.
    pub fn is_blank_or_comment(&self) -> bool {
        let trimmed = self.trimmed();
        trimmed.is_empty() || trimmed.starts_with('#')
    }

    /// Raw text with one two-space content indent removed.
    pub fn without_content_indent(&self) -> &'a str {
        self.text.strip_prefix("  ").unwrap_or(self.text)
    }
}

/// Splits input into physical lines, keeping terminators.
pub(crate) fn raw_lines(input: &str) -> impl Iterator<Item = RawLine<'_>> {
    input
        .split_inclusive('\n')
        .enumerate()
        .map(|(idx, text)| RawLine {
            number: idx + 1,
            text,
        })
}

/// Returns `true` if the line starts with a content indent (space or tab).
pub(crate) fn is_indented(raw: &str) -> bool {
    raw.starts_with([' ', '\t'])
}

/// Strips spaces, tabs and line terminators from both ends.
pub(crate) fn trim_line(line: &str) -> &str {
    line.trim_matches([' ', '\t', '\r', '\n'])
}

/// Returns the name between `[` and the first `]`, or `None` when the
/// header is not closed.
pub(crate) fn section_name(trimmed: &str) -> Option<&str> {
    let rest = trimmed.strip_prefix('[')?;
    let end = rest.find(']')?;
    Some(&rest[..end])
}

/// Splits `key = value` on the first `=`, trimming both sides.
pub(crate) fn split_key_value(trimmed: &str) -> Option<(&str, &str)> {
    let (key, value) = trimmed.split_once('=')?;
    let key = trim_line(key);
    if key.is_empty() {
        return None;
    }
    Some((key, trim_line(value)))
}

/// Returns `true` for values naming a script file relative to the config.
pub(crate) fn is_file_reference(value: &str) -> bool {
    value.starts_with("./") || value.starts_with("../")
}
