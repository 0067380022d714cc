//! Prompt-driven state tracking for interactive device shells.
//!
//! The SSH session feeds every line it receives from the device into a
//! [`DeviceHandler`]. The handler classifies the line against the template's
//! regexes and keeps track of the mode the device is in (`login`, `enable`,
//! `config`, ...), whether the last line was an error, and whether the device
//! is waiting for input such as an enable password or a pager keypress.

use std::collections::HashMap;
use std::ops::Range;

use log::trace;
use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};

use crate::error::DeviceError;

const OUTPUT: usize = 0;
const MORE: usize = 1;
const ERROR: usize = 2;

/// States every handler has, in index order.
const BUILTIN_STATES: [&str; 3] = ["output", "more", "error"];

/// Text to send when the device waits for input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Sent as-is.
    Literal(String),
    /// Looked up in [`DeviceHandler::params`] by key; nothing is sent when the key is missing.
    Param(String),
}

/// A device question and the answer to send.
#[derive(Debug, Clone)]
pub struct InputRule {
    /// State name used while the question is on screen.
    pub state: &'static str,
    pub input: Input,
    /// Whether the question line stays in the captured output.
    pub keep_in_output: bool,
    pub patterns: Vec<&'static str>,
}

/// Regexes describing one platform's shell.
#[derive(Debug, Clone, Default)]
pub struct Patterns {
    /// `(state, patterns)` per prompt; earlier entries win when several match.
    pub prompts: Vec<(&'static str, Vec<&'static str>)>,
    pub inputs: Vec<InputRule>,
    /// Pager prompts, answered with a space.
    pub pager: Vec<&'static str>,
    pub errors: Vec<&'static str>,
    /// Lines that look like errors but are not.
    pub ignored_errors: Vec<&'static str>,
}

pub struct DeviceHandler {
    states: Vec<String>,
    matcher: RegexSet,
    /// State index for every pattern in `matcher`.
    pattern_state: Vec<usize>,
    prompt_states: Range<usize>,
    inputs: HashMap<usize, (Input, bool)>,
    ignored_errors: Option<RegexSet>,
    /// Values for [`Input::Param`] answers.
    pub params: HashMap<String, String>,
    current: usize,
    last_prompt: Option<String>,
}

impl DeviceHandler {
    pub fn new(patterns: Patterns) -> Result<DeviceHandler, DeviceError> {
        let Patterns {
            prompts,
            inputs,
            pager,
            errors,
            ignored_errors,
        } = patterns;

        let mut states: Vec<String> = BUILTIN_STATES.iter().map(|s| s.to_string()).collect();
        let mut regexes: Vec<String> = Vec::new();
        let mut pattern_state = Vec::new();

        let mut add = |regexes: &mut Vec<String>, state: usize, pattern: String| {
            regexes.push(pattern);
            pattern_state.push(state);
        };

        for pattern in pager {
            add(&mut regexes, MORE, pattern.to_string());
        }
        for pattern in errors {
            add(&mut regexes, ERROR, pattern.to_string());
        }

        let first_prompt = states.len();
        for (state, state_patterns) in prompts {
            let index = states.len();
            states.push(state.to_ascii_lowercase());
            for pattern in state_patterns {
                // Prompts may be preceded by NULs and a lone carriage return.
                let anchored = format!(r"^\x00*\r?{}", pattern.trim_start_matches('^'));
                add(&mut regexes, index, anchored);
            }
        }
        let prompt_states = first_prompt..states.len();

        let mut input_map = HashMap::from([(MORE, (Input::Literal(" ".to_string()), false))]);
        for rule in inputs {
            let index = states.len();
            states.push(rule.state.to_ascii_lowercase());
            for pattern in rule.patterns {
                add(&mut regexes, index, pattern.to_string());
            }
            input_map.insert(index, (rule.input, rule.keep_in_output));
        }

        let matcher = RegexSet::new(&regexes)
            .map_err(|err| DeviceError::Other(format!("invalid template regex set: {err}")))?;
        let ignored_errors = if ignored_errors.is_empty() {
            None
        } else {
            Some(RegexSet::new(&ignored_errors).map_err(|err| {
                DeviceError::Other(format!("invalid ignored error regex set: {err}"))
            })?)
        };

        Ok(Self {
            states,
            matcher,
            pattern_state,
            prompt_states,
            inputs: input_map,
            ignored_errors,
            params: HashMap::new(),
            current: OUTPUT,
            last_prompt: None,
        })
    }

    /// State index of a line; lines matching nothing are plain output.
    fn classify(&self, line: &str) -> usize {
        self.matcher
            .matches(line)
            .into_iter()
            .next()
            .and_then(|pattern| self.pattern_state.get(pattern).copied())
            .unwrap_or(OUTPUT)
    }

    /// Reads one line of device output and updates the current state.
    pub fn read(&mut self, line: &str) {
        let state = self.classify(line);
        trace!("{:?} -> {}", line, self.states[state]);
        if self
            .ignored_errors
            .as_ref()
            .is_some_and(|set| set.is_match(line))
        {
            self.current = OUTPUT;
            return;
        }
        if self.prompt_states.contains(&state) {
            self.last_prompt = Some(line.to_string());
        }
        self.current = state;
    }

    /// True if `line` is a prompt, i.e. the device is ready for the next command.
    pub fn is_prompt(&self, line: &str) -> bool {
        self.prompt_states.contains(&self.classify(line))
    }

    /// The answer to send if `line` is a question, with its keep-in-output flag.
    pub fn input_for(&self, line: &str) -> Option<(String, bool)> {
        let (input, keep) = self.inputs.get(&self.classify(line))?;
        let text = match input {
            Input::Literal(text) => text.clone(),
            Input::Param(key) => self.params.get(key)?.clone(),
        };
        Some((text, *keep))
    }

    pub fn current_state(&self) -> &str {
        &self.states[self.current]
    }

    /// Returns true when the current state is `state` (case-insensitive).
    pub fn in_state(&self, state: &str) -> bool {
        self.current_state().eq_ignore_ascii_case(state)
    }

    /// Last line recognised as a prompt.
    pub fn last_prompt(&self) -> Option<&str> {
        self.last_prompt.as_deref()
    }

    pub fn states(&self) -> &[String] {
        &self.states
    }

    /// True if the last line read was an error line.
    pub fn error(&self) -> bool {
        self.current == ERROR
    }
}

/// Carriage returns and backspaces at the start of a line.
///
/// Terminals redraw lines with these, which would otherwise defeat the
/// anchored prompt patterns.
pub static IGNORE_START_LINE: Lazy<Regex> =
    Lazy::new(
        || match Regex::new(r"^(\r+(\s+\r+)*)|(\u{8}+(\s+\u{8}+)*)") {
            Ok(re) => re,
            Err(err) => panic!("invalid IGNORE_START_LINE regex: {err}"),
        },
    );

#[cfg(test)]
mod tests {
    use super::{DeviceHandler, IGNORE_START_LINE, Input, InputRule, Patterns};
    use crate::error::DeviceError;

    fn build_test_handler() -> DeviceHandler {
        let mut handler = DeviceHandler::new(Patterns {
            prompts: vec![
                ("Config", vec![r"^dev\(cfg\)#\s*$"]),
                ("Enable", vec![r"^dev#\s*$"]),
                ("Login", vec![r"^dev>\s*$"]),
            ],
            inputs: vec![
                InputRule {
                    state: "EnablePassword",
                    input: Input::Param("EnablePassword".to_string()),
                    keep_in_output: true,
                    patterns: vec![r"^Password:\s*$"],
                },
                InputRule {
                    state: "Confirm",
                    input: Input::Literal("y".to_string()),
                    keep_in_output: false,
                    patterns: vec![r"^\[y\/n\]\?\s*$"],
                },
            ],
            pager: vec![r"^--More--$"],
            errors: vec![r"^ERROR: .+$"],
            ignored_errors: vec![r"^ERROR: benign$"],
        })
        .expect("test handler config should be valid");
        handler
            .params
            .insert("EnablePassword".to_string(), "secret\n".to_string());
        handler
    }

    #[test]
    fn prompt_lines_move_the_state() {
        let mut handler = build_test_handler();

        handler.read("dev>");
        assert!(handler.in_state("login"));
        handler.read("dev#");
        assert!(handler.in_state("Enable"));
        handler.read("dev(cfg)#");
        assert!(handler.in_state("config"));
    }

    #[test]
    fn error_lines_set_the_error_state() {
        let mut handler = build_test_handler();

        assert!(!handler.error());
        handler.read("ERROR: invalid command");
        assert!(handler.error());
        handler.read("ERROR: benign");
        assert_eq!(handler.current_state(), "output");
    }

    #[test]
    fn last_prompt_survives_output_lines() {
        let mut handler = build_test_handler();
        assert_eq!(handler.last_prompt(), None);

        handler.read("dev#");
        handler.read("some output");
        assert_eq!(handler.last_prompt(), Some("dev#"));
    }

    #[test]
    fn prompt_may_be_prefixed_by_carriage_return() {
        let handler = build_test_handler();
        assert!(handler.is_prompt("\rdev#"));
        assert!(!handler.is_prompt("dev#show version"));
    }

    #[test]
    fn questions_get_their_answers() {
        let handler = build_test_handler();

        assert_eq!(
            handler.input_for("Password:"),
            Some(("secret\n".to_string(), true))
        );
        assert_eq!(handler.input_for("[y/n]?"), Some(("y".to_string(), false)));
        assert_eq!(handler.input_for("--More--"), Some((" ".to_string(), false)));
        assert_eq!(handler.input_for("no input"), None);
    }

    #[test]
    fn missing_parameter_sends_nothing() {
        let mut handler = build_test_handler();
        handler.params.clear();
        assert_eq!(handler.input_for("Password:"), None);
    }

    #[test]
    fn invalid_regex_is_rejected() {
        let result = DeviceHandler::new(Patterns {
            prompts: vec![("Login", vec![r"["])],
            ..Patterns::default()
        });
        match result {
            Err(DeviceError::Other(msg)) => assert!(msg.contains("invalid template regex set")),
            Err(other) => panic!("unexpected error type: {other}"),
            Ok(_) => panic!("invalid regex should fail handler construction"),
        }
    }

    #[test]
    fn leading_redraw_characters_are_stripped() {
        assert_eq!(IGNORE_START_LINE.replace("\r\rdev#", ""), "dev#");
        assert_eq!(IGNORE_START_LINE.replace("\u{8}\u{8}dev#", ""), "dev#");
    }
}
