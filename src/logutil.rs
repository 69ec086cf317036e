//! Sanitizing player-typed strings so every log record stays on one line.

/// Escape a string for single-line logging:
/// - `\n` => `\\n`
/// - `\r` => `\\r`
/// - `\t` => `\\t`
/// - backslash => `\\\\`
/// - other control characters => `\xNN`
///
/// Longer input is cut at [`MAX_PREVIEW`] characters with an ellipsis.
pub fn escape_log(s: &str) -> String {
    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= MAX_PREVIEW {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                use std::fmt::Write;
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

pub const MAX_PREVIEW: usize = 200;

/// Render command arguments for a log record, hiding the ones flagged
/// `no_log`.
pub fn redact_args<'a, I>(args: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str, bool)>,
{
    args.into_iter()
        .map(|(name, value, hidden)| {
            if hidden {
                format!("{}=<redacted>", name)
            } else {
                format!("{}=\"{}\"", name, escape_log(value))
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_newlines_and_control_chars() {
        assert_eq!(escape_log("say hi\n/login x"), "say hi\\n/login x");
        assert_eq!(escape_log("a\u{7}b"), "a\\x07b");
    }

    #[test]
    fn truncates_long_input() {
        let long = "x".repeat(MAX_PREVIEW + 10);
        let esc = escape_log(&long);
        assert!(esc.ends_with('…'));
        assert_eq!(esc.chars().count(), MAX_PREVIEW + 1);
    }

    #[test]
    fn redacted_args_never_show_the_value() {
        let line = redact_args([("character", "Alice", false), ("password", "hunter22", true)]);
        assert_eq!(line, "character=\"Alice\" password=<redacted>");
        assert!(!line.contains("hunter22"));
    }
}
