use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Shorten `s` to at most `max` display columns, marking the cut with `...`.
///
/// Cuts on character boundaries, so wide and multi-byte characters never
/// get split.
pub fn truncate_to_width(s: &str, max: usize) -> String {
    if display_width(s) <= max {
        return s.to_string();
    }
    let mut out = String::new();
    let mut width = 0;
    for ch in s.chars() {
        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        if width + w > max {
            break;
        }
        out.push(ch);
        width += w;
    }
    out.push_str("...");
    out
}

/// First line of `s`, trimmed and shortened for use in a message.
pub fn excerpt(s: &str, max: usize) -> String {
    let first = s.lines().next().unwrap_or("").trim();
    truncate_to_width(first, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_unchanged() {
        assert_eq!(truncate_to_width("x = 1", 40), "x = 1");
    }

    #[test]
    fn long_text_is_cut() {
        assert_eq!(truncate_to_width("abcdefgh", 4), "abcd...");
    }

    #[test]
    fn wide_characters_count_double() {
        assert_eq!(display_width("日本"), 4);
        assert_eq!(truncate_to_width("日本語", 5), "日本...");
    }

    #[test]
    fn cut_never_splits_multibyte_characters() {
        assert_eq!(truncate_to_width("ééééé", 2), "éé...");
    }

    #[test]
    fn excerpt_takes_first_line() {
        assert_eq!(excerpt("  foo(1,\n  2)", 40), "foo(1,");
    }
}
