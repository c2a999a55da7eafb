//! Character-escape insertion
//!
//! The Wi-Fi module takes string arguments inside double quotes, so quotes
//! and commas inside a payload have to be prefixed with a backslash before
//! the payload goes out in an `AT+MQTTPUB` command.

use alloc::string::String;
use thiserror_no_std::Error;

/// Escape prefix understood by the AT firmware.
pub const AT_ESCAPE: char = '\\';

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapeError {
    #[error("escaped text needs {needed} bytes, buffer holds {capacity}")]
    Capacity { needed: usize, capacity: usize },
}

/// Count occurrences of `target` in `text`.
pub fn count_matches(text: &str, target: char) -> usize {
    text.chars().filter(|&c| c == target).count()
}

/// Return a copy of `text` where every `target` is preceded by `prefix`.
///
/// The scan runs left to right and never revisits an inserted prefix, so
/// adjacent targets each get their own prefix. Text that already contains
/// escape sequences is escaped again.
pub fn escape(text: &str, target: char, prefix: char) -> String {
    let matches = count_matches(text, target);
    if matches == 0 {
        return String::from(text);
    }

    let mut escaped = String::with_capacity(text.len() + matches * prefix.len_utf8());
    for c in text.chars() {
        if c == target {
            escaped.push(prefix);
        }
        escaped.push(c);
    }
    escaped
}

/// Bounded variant of [`escape`] for callers without a heap budget.
pub fn escape_into<const N: usize>(
    text: &str,
    target: char,
    prefix: char,
) -> Result<heapless::String<N>, EscapeError> {
    let needed = text.len() + count_matches(text, target) * prefix.len_utf8();
    if needed > N {
        return Err(EscapeError::Capacity {
            needed,
            capacity: N,
        });
    }

    let mut escaped = heapless::String::<N>::new();
    for c in text.chars() {
        if c == target {
            escaped.push(prefix).map_err(|_| EscapeError::Capacity {
                needed,
                capacity: N,
            })?;
        }
        escaped.push(c).map_err(|_| EscapeError::Capacity {
            needed,
            capacity: N,
        })?;
    }
    Ok(escaped)
}

/// The two passes applied to a JSON payload before it is published:
/// quotes first, then commas.
pub fn escape_at_payload(text: &str) -> String {
    let quoted = escape(text, '"', AT_ESCAPE);
    escape(&quoted, ',', AT_ESCAPE)
}

/// Escape a plain string argument (SSID, password, topic) for an AT command.
///
/// Backslashes go first so the prefixes added afterwards stay single.
pub fn escape_at_argument(text: &str) -> String {
    let backslashed = escape(text, AT_ESCAPE, AT_ESCAPE);
    escape_at_payload(&backslashed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_target_leaves_text_unchanged() {
        assert_eq!(escape("temperature", '"', '\\'), "temperature");
        assert_eq!(escape("1;2;3", ',', '\\'), "1;2;3");
    }

    #[test]
    fn quotes_each_get_one_backslash() {
        assert_eq!(escape("ab\"cd\"", '"', '\\'), "ab\\\"cd\\\"");
    }

    #[test]
    fn length_grows_by_match_count() {
        let input = "{\"a\":1,\"b\":2}";
        let k = count_matches(input, '"');
        assert_eq!(k, 4);
        assert_eq!(escape(input, '"', '\\').len(), input.len() + k);
    }

    #[test]
    fn commas_are_escaped() {
        assert_eq!(escape("1,2,3", ',', '\\'), "1\\,2\\,3");
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert_eq!(escape("", '"', '\\'), "");
    }

    #[test]
    fn adjacent_targets_are_escaped_individually() {
        assert_eq!(escape("\"\"", '"', '\\'), "\\\"\\\"");
    }

    #[test]
    fn target_at_both_ends() {
        assert_eq!(escape(",x,", ',', '#'), "#,x#,");
    }

    #[test]
    fn running_twice_double_escapes() {
        let once = escape("a\"b", '"', '\\');
        let twice = escape(&once, '"', '\\');
        assert_eq!(once, "a\\\"b");
        assert_eq!(twice, "a\\\\\"b");
        assert_eq!(twice.len(), once.len() + 1);
    }

    #[test]
    fn payload_escaping_covers_quotes_and_commas() {
        let json = "{\"Device\":\"AB\",\"Humidity\":60.5}";
        assert_eq!(
            escape_at_payload(json),
            "{\\\"Device\\\":\\\"AB\\\"\\,\\\"Humidity\\\":60.5}"
        );
    }

    #[test]
    fn argument_escaping_handles_backslashes_first() {
        assert_eq!(escape_at_argument("a\\b"), "a\\\\b");
        assert_eq!(escape_at_argument("my \"net\",x"), "my \\\"net\\\"\\,x");
    }

    #[test]
    fn bounded_escape_fits() {
        let escaped = escape_into::<16>("1,2,3", ',', '\\').unwrap();
        assert_eq!(escaped.as_str(), "1\\,2\\,3");
    }

    #[test]
    fn bounded_escape_reports_capacity() {
        let err = escape_into::<6>("1,2,3", ',', '\\').unwrap_err();
        assert_eq!(
            err,
            EscapeError::Capacity {
                needed: 7,
                capacity: 6
            }
        );
    }
}
