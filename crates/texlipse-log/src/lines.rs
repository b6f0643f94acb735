//! Undoing TeX's hard line wrapping.
//!
//! TeX breaks every line of its terminal and log output after a fixed number
//! of bytes (`max_print_line`, 79 by default). A physical line that fills the
//! width exactly was almost certainly broken, so it is glued to the line that
//! follows it before anything tries to match a pattern.

/// Column at which TeX wraps its log lines.
pub const WRAP_WIDTH: usize = 79;

/// Joins wrapped physical lines into logical lines.
///
/// A physical line whose byte length is a non-zero multiple of `width` and
/// that does not end with `...` continues on the next physical line. Runs of
/// spaces in the joined result collapse to a single space.
pub fn logical_lines(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pending = String::new();

    for physical in text.lines() {
        let physical = physical.strip_suffix('\r').unwrap_or(physical);
        pending.push_str(physical);

        let len = physical.len();
        if width > 0 && len > 0 && len % width == 0 && !physical.ends_with("...") {
            continue;
        }
        lines.push(collapse_spaces(&pending));
        pending.clear();
    }

    if !pending.is_empty() {
        lines.push(collapse_spaces(&pending));
    }
    lines
}

fn collapse_spaces(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut previous_space = false;
    for c in line.chars() {
        if c == ' ' {
            if !previous_space {
                out.push(c);
            }
            previous_space = true;
        } else {
            out.push(c);
            previous_space = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_lines_pass_through() {
        let lines = logical_lines("a\nb\n", WRAP_WIDTH);
        assert_eq!(lines, vec!["a", "b"]);
    }

    #[test]
    fn full_width_line_joins_next() {
        let head = "x".repeat(WRAP_WIDTH);
        let text = format!("{head}\ntail\nnext");
        let lines = logical_lines(&text, WRAP_WIDTH);
        assert_eq!(lines, vec![format!("{head}tail"), "next".to_string()]);
    }

    #[test]
    fn ellipsis_stops_joining() {
        let head = format!("{}...", "y".repeat(WRAP_WIDTH - 3));
        let text = format!("{head}\nnext");
        let lines = logical_lines(&text, WRAP_WIDTH);
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn spaces_collapse() {
        let lines = logical_lines("Type  H <return>   for help.", WRAP_WIDTH);
        assert_eq!(lines, vec!["Type H <return> for help."]);
    }

    #[test]
    fn trailing_wrapped_line_is_flushed() {
        let head = "z".repeat(WRAP_WIDTH * 2);
        let lines = logical_lines(&head, WRAP_WIDTH);
        assert_eq!(lines, vec![head]);
    }
}
