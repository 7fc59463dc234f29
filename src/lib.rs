use std::io::BufRead;

use log::{Level, debug, info, log};

pub mod ast;
pub mod builder;
pub mod classify;
pub mod diagram;
pub mod display_width;
pub mod document;
pub mod error;
pub mod interpreter;
pub mod latex;
pub mod parser;
pub mod recognize;
pub mod renderer;
pub mod trace;
pub mod value;

pub use diagram::DiagramNode;
pub use error::Error;

use interpreter::{DEFAULT_MAX_STEPS, Interpreter};
use trace::{DISABLED_ANNOTATION, Trace, run_traced};

const RULE_WIDTH: usize = 60;

#[derive(Debug, Clone)]
pub struct Options {
    /// Run the function and record what it prints.
    pub dry_run: bool,
    /// Report construction steps at info level instead of debug.
    pub verbose: bool,
    pub max_steps: u64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            dry_run: true,
            verbose: false,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl Options {
    fn diagnostic_level(&self) -> Level {
        if self.verbose { Level::Info } else { Level::Debug }
    }
}

/// Everything produced for one function.
#[derive(Debug)]
pub struct Structogram {
    pub function: String,
    pub diagram: DiagramNode,
    pub markup: String,
    /// `None` when the dry run was switched off.
    pub trace: Option<Trace>,
    /// Contents of the `.tex` file.
    pub document: String,
}

impl Structogram {
    pub fn annotation(&self) -> String {
        self.trace
            .as_ref()
            .map_or_else(|| DISABLED_ANNOTATION.to_string(), Trace::annotation)
    }

    /// Markup and dry-run output between rules, for the terminal.
    pub fn report(&self) -> String {
        let rule = "-".repeat(RULE_WIDTH);
        let mut out = vec![rule.clone(), self.markup.clone(), rule.clone()];
        match &self.trace {
            Some(trace) => {
                out.push(format!(
                    "Output of function/structogram {} ({} lines)",
                    trace.function,
                    trace.lines.len()
                ));
                out.extend(trace.lines.iter().cloned());
                if let Some(failure) = &trace.failure {
                    out.push(format!("Execution did not complete: {}", failure.source));
                }
            }
            None => out.push("No structogram output generated (dry run disabled)".to_string()),
        }
        out.push(rule);
        out.join("\n")
    }
}

/// Build the structogram of `function` (or the first function) in `source`.
///
/// `input` answers the `input()` calls of the dry run. Unsupported
/// statements fail the whole generation; a dry run that fails only shortens
/// the annotation.
pub fn generate(
    source: &str,
    function: Option<&str>,
    options: &Options,
    input: Box<dyn BufRead + '_>,
) -> Result<Structogram, Error> {
    let parsed = match (parser::parse_function(source, function)?, function) {
        (Some(parsed), _) => parsed,
        (None, Some(name)) => return Err(Error::FunctionNotFound(name.to_string())),
        (None, None) => return Err(Error::NoFunction),
    };
    info!(function = parsed.name.as_str(), line = parsed.line; "generating structogram");

    let diagram = builder::build(&parsed.body)?;
    let level = options.diagnostic_level();
    log!(level, actions = diagram.action_count(); "diagram built");
    let markup = renderer::render(&parsed.name, &diagram);
    log!(level, lines = markup.lines().count(); "markup rendered");

    let trace = if options.dry_run {
        let mut interpreter = Interpreter::new(&parsed, input).with_max_steps(options.max_steps);
        Some(run_traced(&mut interpreter))
    } else {
        debug!("dry run disabled");
        None
    };

    let annotation = trace
        .as_ref()
        .map_or_else(|| DISABLED_ANNOTATION.to_string(), Trace::annotation);
    let document = document::compose(&parsed.source, &markup, &annotation);

    Ok(Structogram {
        function: parsed.name,
        diagram,
        markup,
        trace,
        document,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::{Cursor, empty};

    fn generate_default(source: &str) -> Result<Structogram, Error> {
        generate(source, None, &Options::default(), Box::new(Cursor::new("")))
    }

    #[test]
    fn first_function_is_used_by_default() {
        let source = "def one():\n    print(1)\n\ndef two():\n    print(2)\n";
        let structogram = generate_default(source).unwrap();
        assert_eq!(structogram.function, "one");
        assert_eq!(structogram.trace.unwrap().lines, vec!["1"]);
    }

    #[test]
    fn named_function() {
        let source = "def one():\n    print(1)\n\ndef two():\n    print(2)\n";
        let structogram =
            generate(source, Some("two"), &Options::default(), Box::new(empty())).unwrap();
        assert_eq!(structogram.function, "two");
        assert!(structogram.markup.contains(r"\assign[6]{Output(2)}"));
    }

    #[test]
    fn missing_function() {
        let err = generate("def one():\n    pass\n", Some("two"), &Options::default(), Box::new(empty()))
            .unwrap_err();
        assert_eq!(err.to_string(), "no function named `two` found");
        let err = generate_default("x = 1\n").unwrap_err();
        assert!(matches!(err, Error::NoFunction));
    }

    #[test]
    fn unsupported_statement_is_fatal() {
        let err = generate_default("def f():\n    x = 1\n    for i in x:\n        pass\n")
            .unwrap_err();
        assert_eq!(err.to_string(), "line 3: unsupported construct: for loop");
    }

    #[test]
    fn failed_dry_run_keeps_the_diagram() {
        let structogram = generate_default("def f():\n    print('a')\n    x = 1 / 0\n").unwrap();
        assert!(structogram.markup.contains(r"\assign[6]{x = 1 / 0}"));
        assert_eq!(
            structogram.annotation(),
            "\
% Output of structogram f (1 lines)
% [01] a
% Execution did not complete: line 3: ZeroDivisionError: division by zero"
        );
    }

    #[test]
    fn verbose_only_changes_diagnostics() {
        let source = "def f():\n    x = 1\n    print(x)\n";
        let verbose = Options {
            verbose: true,
            ..Options::default()
        };
        assert_eq!(verbose.diagnostic_level(), Level::Info);
        assert_eq!(Options::default().diagnostic_level(), Level::Debug);

        let quiet = generate_default(source).unwrap();
        let loud = generate(source, None, &verbose, Box::new(empty())).unwrap();
        assert_eq!(quiet.document, loud.document);
    }

    #[test]
    fn disabled_dry_run() {
        let options = Options {
            dry_run: false,
            ..Options::default()
        };
        let structogram =
            generate("def f():\n    x = input()\n", None, &options, Box::new(empty())).unwrap();
        assert!(structogram.trace.is_none());
        assert!(structogram.document.ends_with(&format!("{DISABLED_ANNOTATION}\n")));
        assert!(structogram.report().contains("No structogram output generated"));
    }
}
