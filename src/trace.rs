use std::io::{self, Write};
use std::mem;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};

use crate::error::{ExecutionError, TracedExecutionFailed};

/// Annotation written when the dry run is switched off.
pub const DISABLED_ANNOTATION: &str = "% No structogram output generated (dry run disabled)";

/// A parameterless function that can be run while its output is captured.
pub trait TracedCallable {
    fn name(&self) -> &str;

    /// Run once, writing everything the function prints to `out`.
    fn call(&mut self, out: &mut dyn Write) -> Result<(), ExecutionError>;
}

/// Only one capture window may be open per process.
static CAPTURE: Mutex<()> = Mutex::new(());

/// An open capture window. Holds the process-wide capture lock until it is
/// finished or dropped, whichever way the traced call ends.
pub struct CaptureSession {
    _lock: MutexGuard<'static, ()>,
    buffer: Vec<u8>,
}

impl CaptureSession {
    /// Open a capture window, waiting for any other one to close.
    pub fn begin() -> Self {
        // A panic in another session leaves nothing to repair behind the lock.
        let lock = CAPTURE.lock().unwrap_or_else(PoisonError::into_inner);
        debug!("capture session opened");
        Self {
            _lock: lock,
            buffer: Vec::new(),
        }
    }

    /// Close the window and return what was captured.
    pub fn finish(mut self) -> String {
        let bytes = mem::take(&mut self.buffer);
        debug!(bytes = bytes.len(); "capture session closed");
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for CaptureSession {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Output lines of one dry run.
#[derive(Debug)]
pub struct Trace {
    pub function: String,
    pub lines: Vec<String>,
    /// Set when the run stopped early; `lines` then holds what came before.
    pub failure: Option<TracedExecutionFailed>,
}

impl Trace {
    /// The comment block recording the output, numbered from 1.
    pub fn annotation(&self) -> String {
        let mut out = vec![format!(
            "% Output of structogram {} ({} lines)",
            self.function,
            self.lines.len()
        )];
        out.extend(
            self.lines
                .iter()
                .enumerate()
                .map(|(i, line)| format!("% [{:02}] {line}", i + 1)),
        );
        if let Some(failure) = &self.failure {
            out.push(format!(
                "% Execution did not complete: {}",
                failure.source
            ));
        }
        out.join("\n")
    }

    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// Run `callable` inside a capture session and collect its output lines.
///
/// A failing run is not an error here: the trace keeps the lines printed
/// before the failure and records the cause.
pub fn run_traced(callable: &mut dyn TracedCallable) -> Trace {
    let mut session = CaptureSession::begin();
    let result = callable.call(&mut session);
    let output = session.finish();

    let function = callable.name().to_string();
    let lines: Vec<String> = output.lines().map(str::to_string).collect();
    let failure = match result {
        Ok(()) => None,
        Err(source) => {
            warn!(function = function.as_str(); "dry run did not complete: {source}");
            Some(TracedExecutionFailed { source })
        }
    };
    let trace = Trace {
        function,
        lines,
        failure,
    };
    info!(
        function = trace.function.as_str(),
        lines = trace.lines.len(),
        complete = trace.is_complete();
        "dry run captured output"
    );
    trace
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::thread;

    struct Script {
        name: &'static str,
        output: Vec<&'static str>,
        fail_after: Option<usize>,
    }

    impl TracedCallable for Script {
        fn name(&self) -> &str {
            self.name
        }

        fn call(&mut self, out: &mut dyn Write) -> Result<(), ExecutionError> {
            for (i, chunk) in self.output.iter().enumerate() {
                if self.fail_after == Some(i) {
                    return Err(ExecutionError::Runtime {
                        line: 7,
                        kind: "ZeroDivisionError",
                        message: "division by zero".to_string(),
                    });
                }
                out.write_all(chunk.as_bytes())?;
            }
            Ok(())
        }
    }

    fn script(output: Vec<&'static str>) -> Script {
        Script {
            name: "fn42",
            output,
            fail_after: None,
        }
    }

    #[test]
    fn two_printed_lines() {
        let trace = run_traced(&mut script(vec![" a = -18  c = 1\n", "done\n"]));
        assert!(trace.is_complete());
        assert_eq!(
            trace.annotation(),
            "\
% Output of structogram fn42 (2 lines)
% [01]  a = -18  c = 1
% [02] done"
        );
    }

    #[test]
    fn no_output() {
        let trace = run_traced(&mut script(vec![]));
        assert_eq!(trace.annotation(), "% Output of structogram fn42 (0 lines)");
    }

    #[test]
    fn trailing_partial_line_is_kept() {
        let trace = run_traced(&mut script(vec!["a\n", "b"]));
        assert_eq!(trace.lines, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn failure_keeps_earlier_output() {
        let mut failing = script(vec!["1\n", "2\n", "3\n"]);
        failing.fail_after = Some(2);
        let trace = run_traced(&mut failing);
        assert!(!trace.is_complete());
        assert_eq!(
            trace.annotation(),
            "\
% Output of structogram fn42 (2 lines)
% [01] 1
% [02] 2
% Execution did not complete: line 7: ZeroDivisionError: division by zero"
        );
    }

    #[test]
    fn lock_is_released_after_a_failed_run() {
        let mut failing = script(vec!["x\n"]);
        failing.fail_after = Some(0);
        run_traced(&mut failing);
        let trace = run_traced(&mut script(vec!["y\n"]));
        assert_eq!(trace.lines, vec!["y".to_string()]);
    }

    #[test]
    fn concurrent_runs_do_not_mix_output() {
        let handles: Vec<_> = (0..4)
            .map(|_| thread::spawn(|| run_traced(&mut script(vec!["one\n", "two\n", "three\n"]))))
            .collect();
        for handle in handles {
            let trace = handle.join().unwrap();
            assert_eq!(trace.lines, vec!["one", "two", "three"]);
        }
    }
}
