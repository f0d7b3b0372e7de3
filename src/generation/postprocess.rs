//! Cleanup of raw completions before they reach the user

/// Prompt fragments a model sometimes echoes; everything from the first one on is dropped
pub const LEAK_MARKERS: &[&str] = &["User:", "CONTEXT", "===", "[Document"];

/// Lowercase openers the instruction forbids
pub const DISALLOWED_PREAMBLES: &[&str] = &[
    "according to",
    "based on",
    "from the context",
    "the context says",
    "as per",
    "in the context",
];

/// Truncate at leak markers, collapse blank-line runs, trim, strip a preamble
pub fn clean_response(raw: &str) -> String {
    let normalized = raw.replace("\r\n", "\n");
    let truncated = truncate_at_markers(&normalized);
    let collapsed = collapse_newlines(truncated);
    strip_preamble(collapsed.trim()).trim().to_string()
}

fn truncate_at_markers(text: &str) -> &str {
    let cut = LEAK_MARKERS
        .iter()
        .filter_map(|marker| text.find(marker))
        .min()
        .unwrap_or(text.len());
    &text[..cut]
}

/// Three or more consecutive newlines become two
fn collapse_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run = 0usize;
    for ch in text.chars() {
        if ch == '\n' {
            run += 1;
            if run <= 2 {
                out.push(ch);
            }
        } else {
            run = 0;
            out.push(ch);
        }
    }
    out
}

fn strip_preamble(text: &str) -> String {
    let has_preamble = DISALLOWED_PREAMBLES.iter().any(|preamble| {
        text.get(..preamble.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(preamble))
    });
    if !has_preamble {
        return text.to_string();
    }

    // A colon before whitespace, a letter or the end closes the preamble;
    // "8:00" and "https://" do not
    let colon = text.char_indices().find(|&(idx, ch)| {
        ch == ':'
            && text[idx + 1..]
                .chars()
                .next()
                .map_or(true, |next| next.is_whitespace() || next.is_alphabetic())
    });

    match colon {
        Some((idx, _)) => capitalize_first(text[idx + 1..].trim_start()),
        None => text.to_string(),
    }
}

fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncates_at_earliest_marker() {
        let raw = "The library opens at 8 AM.\n[Document 2] Hostels\nUser: thanks";
        assert_eq!(clean_response(raw), "The library opens at 8 AM.");

        assert_eq!(clean_response("Apply online.\n===\nCONTEXT"), "Apply online.");
    }

    #[test]
    fn test_collapses_blank_lines() {
        let raw = "First point.\n\n\n\n\nSecond point.\n\nThird.";
        assert_eq!(clean_response(raw), "First point.\n\nSecond point.\n\nThird.");
    }

    #[test]
    fn test_strips_preamble_and_recapitalizes() {
        assert_eq!(
            clean_response("  According to the context: hostel fees are due in July."),
            "Hostel fees are due in July."
        );
        assert_eq!(
            clean_response("Based on the documents:\nthe library opens at 8."),
            "The library opens at 8."
        );
    }

    #[test]
    fn test_preamble_colon_without_space() {
        assert_eq!(
            clean_response("Based on the context:apply online before 30 June."),
            "Apply online before 30 June."
        );
        let raw = "According to https://campus.example the office opens at 9.";
        assert_eq!(clean_response(raw), raw);
    }

    #[test]
    fn test_preamble_without_colon_kept() {
        let raw = "Based on last year, fees rose.";
        assert_eq!(clean_response(raw), raw);
    }

    #[test]
    fn test_time_colon_is_not_a_preamble_end() {
        let raw = "According to the timetable the office opens at 8:30.";
        assert_eq!(clean_response(raw), raw);
    }

    #[test]
    fn test_leading_marker_yields_empty() {
        assert_eq!(clean_response("User: what about hostels?"), "");
        assert_eq!(clean_response("   \n\n  "), "");
    }

    #[test]
    fn test_plain_answer_untouched() {
        let raw = "You can apply through the admissions portal.";
        assert_eq!(clean_response(raw), raw);
    }
}
