const BOOLEAN_KEYWORDS: &[&str] = &["and", "or", "not"];

/// Escape `text` for use as a struktex box argument.
///
/// LaTeX specials are escaped, relational operators become math symbols,
/// quotes become straight double quotes and the boolean keywords outside
/// string literals are set with `\pKey`.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut quote: Option<char> = None;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '\'' | '"' => {
                quote = match quote {
                    None => Some(c),
                    Some(q) if q == c => None,
                    open => open,
                };
                out.push_str(r"\textquotedbl ");
            }
            '\\' => {
                out.push_str(r"\textbackslash{}");
                // An escaped quote inside a literal does not close it.
                if quote.is_some() && chars.next_if(|&(_, next)| matches!(next, '\'' | '"')).is_some() {
                    out.push_str(r"\textquotedbl ");
                }
            }
            '%' | '{' | '}' | '_' | '&' | '$' | '#' => {
                out.push('\\');
                out.push(c);
            }
            '^' => out.push_str(r"\^{}"),
            '~' => out.push_str(r"\~{}"),
            '<' | '>' => {
                let or_equal = chars.next_if(|&(_, next)| next == '=').is_some();
                out.push_str(match (c, or_equal) {
                    ('<', true) => r"$\leq$",
                    ('>', true) => r"$\geq$",
                    ('<', false) => r"\textless\ ",
                    _ => r"\textgreater\ ",
                });
            }
            c if c.is_alphabetic() => {
                let len = text[i..]
                    .find(|ch: char| !(ch.is_alphanumeric() || ch == '_'))
                    .unwrap_or(text.len() - i);
                let word = &text[i..i + len];
                while chars.next_if(|&(j, _)| j < i + len).is_some() {}

                if quote.is_none() && BOOLEAN_KEYWORDS.contains(&word) {
                    out.push_str(r"\pKey{");
                    out.push_str(word);
                    out.push('}');
                } else {
                    for ch in word.chars() {
                        if ch == '_' {
                            out.push_str(r"\_");
                        } else {
                            out.push(ch);
                        }
                    }
                }
            }
            _ => out.push(c),
        }
    }

    out
}
