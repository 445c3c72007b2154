/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 *
 * Unless you explicitly state otherwise, any contribution intentionally
 * submitted for inclusion in the work by you, as defined in the Apache-2.0
 * license, shall be dual licensed as above, without any additional terms or
 * conditions.
 */

//! Per-instance diagnostic sinks.
//!
//! Every message goes to the `log` facade. A caller may additionally hook
//! plain functions for warnings, errors and debug text; each jitter buffer
//! carries its own set so several buffers can report to different places.

use std::fmt;

/// Sink receiving one formatted diagnostic line
pub type OutputFn = fn(&str);

#[derive(Debug, Clone, Copy, Default)]
pub struct Output {
    warn: Option<OutputFn>,
    err: Option<OutputFn>,
    debug: Option<OutputFn>,
}

impl Output {
    pub fn new(warn: Option<OutputFn>, err: Option<OutputFn>, debug: Option<OutputFn>) -> Self {
        Self { warn, err, debug }
    }

    pub fn warn(&self, args: fmt::Arguments<'_>) {
        log::warn!("{args}");
        if let Some(sink) = self.warn {
            sink(&fmt::format(args));
        }
    }

    pub fn err(&self, args: fmt::Arguments<'_>) {
        log::error!("{args}");
        if let Some(sink) = self.err {
            sink(&fmt::format(args));
        }
    }

    pub fn debug(&self, args: fmt::Arguments<'_>) {
        log::debug!("{args}");
        if let Some(sink) = self.debug {
            sink(&fmt::format(args));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static WARNINGS: Mutex<Vec<String>> = Mutex::new(Vec::new());

    fn collect_warning(line: &str) {
        WARNINGS.lock().unwrap().push(line.to_string());
    }

    #[test]
    fn test_sink_receives_formatted_message() {
        let output = Output::new(Some(collect_warning), None, None);
        output.warn(format_args!("late frame ts={}", 42));
        output.err(format_args!("dropped"));
        output.debug(format_args!("ignored"));

        let lines = WARNINGS.lock().unwrap();
        assert_eq!(lines.as_slice(), ["late frame ts=42"]);
    }

    #[test]
    fn test_default_output_is_silent() {
        let output = Output::default();
        output.warn(format_args!("nobody listens"));
        output.err(format_args!("nobody listens"));
    }
}
