//! Heuristics for spotting file names in TeX's `(file ... )` trace.
//!
//! TeX prints `(` followed by the name of every file it opens and `)` when it
//! closes it, interleaved with arbitrary text that may contain parentheses of
//! its own. Nothing in the log marks which is which, so the scanner guesses.
//! The guesses are deliberately the same loose ones the rest of the build
//! core depends on: they can desynchronise on unusual logs, and callers treat
//! the result as best effort.

/// One structural event found on a log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TraceToken {
    /// `(name`: TeX opened a file.
    Open(String),
    /// `(` that does not start a file name but is closed later on the line.
    Group,
    /// `)`: the innermost open file or group was closed.
    Close,
    /// `<name>`: a graphics or font file was read.
    Graphic(String),
}

#[derive(Debug, Default)]
pub(crate) struct LineScan {
    pub tokens: Vec<TraceToken>,
    /// Byte offset where a diagnostic starts in the middle of the line.
    pub diagnostic_at: Option<usize>,
}

/// Longest extension still accepted as one.
const MAX_EXTENSION_LEN: usize = 9;

/// Scans one logical line for file traces.
///
/// `starts_diagnostic` is asked at every word boundary whether the remaining
/// text is a diagnostic. When it is, scanning stops there and the offset is
/// returned so the caller can handle the rest of the line as a message.
pub(crate) fn scan_line(line: &str, starts_diagnostic: impl Fn(&str) -> bool) -> LineScan {
    let bytes = line.as_bytes();
    let mut scan = LineScan::default();
    let mut i = 0;

    while i < bytes.len() {
        if i > 0 && bytes[i - 1].is_ascii_whitespace() && starts_diagnostic(&line[i..]) {
            scan.diagnostic_at = Some(i);
            break;
        }

        match bytes[i] {
            b'(' => {
                let rest = &line[i + 1..];
                if let Some((name, consumed)) = read_file_name(rest) {
                    scan.tokens.push(TraceToken::Open(name));
                    i += 1 + consumed;
                    continue;
                }
                if closes_on_line(rest) {
                    scan.tokens.push(TraceToken::Group);
                }
            }
            b')' => scan.tokens.push(TraceToken::Close),
            b'<' => {
                let rest = &line[i + 1..];
                if let Some(end) = rest.find('>') {
                    if let Some(name) = graphic_name(&rest[..end]) {
                        scan.tokens.push(TraceToken::Graphic(name));
                        i += end + 2;
                        continue;
                    }
                }
            }
            _ => {}
        }
        i += 1;
    }
    scan
}

/// Reads a file name right after an opening parenthesis.
///
/// Returns the name and the number of bytes it occupied.
fn read_file_name(rest: &str) -> Option<(String, usize)> {
    if let Some(quoted) = rest.strip_prefix('"') {
        let end = quoted.find('"')?;
        let name = &quoted[..end];
        return looks_like_file(name).then(|| (name.to_string(), end + 2));
    }

    let token_end = rest
        .find(|c: char| c.is_whitespace())
        .unwrap_or(rest.len());
    let token = &rest[..token_end];

    let dir_end = token.rfind(['/', '\\']).map_or(0, |p| p + 1);
    // `a.tex)(./b.tex`: the separator belongs to a later name.
    if let Some(p) = token[..dir_end].find(")(") {
        let name = &token[..p];
        return looks_like_file(name).then(|| (name.to_string(), p));
    }

    let tail = &token[dir_end..];
    let cut = tail
        .find(['(', ')', '<', '>', '[', ']', '{', '}', '"'])
        .unwrap_or(tail.len());
    let name = &token[..dir_end + cut];
    looks_like_file(name).then(|| (name.to_string(), name.len()))
}

/// `<file.png>`, `<use file.pdf>`, `<file.pdf, id=1, 20pt x 10pt>`.
fn graphic_name(inner: &str) -> Option<String> {
    let inner = inner.trim();
    let inner = inner.strip_prefix("use ").unwrap_or(inner);
    let name = inner.split(',').next()?.trim();
    looks_like_file(name).then(|| name.to_string())
}

/// True when a `)` closes the parenthesis that was just opened.
fn closes_on_line(rest: &str) -> bool {
    let mut depth = 0usize;
    for c in rest.chars() {
        match c {
            '(' => depth += 1,
            ')' if depth == 0 => return true,
            ')' => depth -= 1,
            _ => {}
        }
    }
    false
}

/// Decides whether `name` plausibly names a file.
///
/// The first character must be path-like, the last component needs an
/// extension of 1 to 9 alphanumeric characters, and the name may not contain
/// characters that no file system accepts. Parentheses are fine in directory
/// names but not in the last component.
pub(crate) fn looks_like_file(name: &str) -> bool {
    let Some(first) = name.chars().next() else {
        return false;
    };
    if !(first.is_alphanumeric() || matches!(first, '.' | '/' | '\\' | '~' | '_')) {
        return false;
    }
    if name
        .chars()
        .any(|c| c.is_control() || matches!(c, '*' | '?' | '|' | '<' | '>' | '"' | '{' | '}'))
    {
        return false;
    }

    let component_start = name.rfind(['/', '\\']).map_or(0, |p| p + 1);
    let component = &name[component_start..];
    if component.contains(['(', ')']) {
        return false;
    }
    let Some(dot) = component.rfind('.') else {
        return false;
    };
    let (stem, extension) = (&component[..dot], &component[dot + 1..]);
    if extension.is_empty()
        || extension.len() > MAX_EXTENSION_LEN
        || !extension.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return false;
    }
    // `(1.5` is a number, not a file.
    let has_directory = component_start > 0;
    has_directory || stem.chars().any(|c| !c.is_ascii_digit() && c != '.')
}

/// Normalises a traced name for display: strips quotes and a leading `./`.
pub(crate) fn clean_name(name: &str) -> String {
    let name = name.trim_matches('"');
    name.strip_prefix("./")
        .or_else(|| name.strip_prefix(".\\"))
        .unwrap_or(name)
        .to_string()
}
