/// Assemble the file contents. Ends with a newline.
pub fn compose(source: &str, markup: &str, annotation: &str) -> String {
    let mut out = String::new();
    for line in source.trim_end().lines() {
        if line.is_empty() {
            out.push_str("%\n");
        } else {
            out.push_str("% ");
            out.push_str(line.trim_end());
            out.push('\n');
        }
    }
    out.push('\n');
    out.push_str(markup);
    out.push_str("\n\n");
    out.push_str(annotation);
    out.push('\n');
    out
}

/// `structogram_<function>.tex`, unless `requested` already names a `.tex`
/// file.
pub fn output_name(function: &str, requested: Option<&str>) -> String {
    match requested {
        Some(name) if name.ends_with(".tex") => name.to_string(),
        _ => format!("structogram_{function}.tex"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sections_are_separated_by_blank_lines() {
        let out = compose(
            "def f():\n\n    pass   \n",
            "% Structogram f",
            "% Output of structogram f (0 lines)",
        );
        assert_eq!(
            out,
            "\
% def f():
%
%     pass

% Structogram f

% Output of structogram f (0 lines)
"
        );
    }

    #[test]
    fn explicit_name_needs_tex_suffix() {
        assert_eq!(output_name("fn1", None), "structogram_fn1.tex");
        assert_eq!(output_name("fn1", Some("out.tex")), "out.tex");
        assert_eq!(output_name("fn1", Some("out.txt")), "structogram_fn1.tex");
    }
}
