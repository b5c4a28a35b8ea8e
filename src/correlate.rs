// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Attach the words flagged by hunspell to their file and line.

use crate::catalog::ProjectedLine;
use crate::error::{Error, Result};
use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, OnceLock};

/// A misspelled word found in a catalog.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct MisspellingRecord {
    pub path: Arc<Path>,
    pub lineno: usize,
    pub word: String,
}

impl fmt::Display for MisspellingRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.path.display(), self.lineno, self.word)
    }
}

/// Any Unicode decimal digit (`Nd`), like `3` or `٣`.
fn decimal_digit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\p{Nd}").unwrap())
}

/// Whether a word flagged by hunspell looks like a real misspelling.
///
/// Words with digits, hyphens or two distinct uppercase letters are
/// mostly identifiers, acronyms and product names.
pub fn is_plausible_word(word: &str) -> bool {
    if word.is_empty() || word.contains('-') || decimal_digit_re().is_match(word) {
        return false;
    }
    let uppercase = word
        .chars()
        .filter(|c| c.is_uppercase())
        .collect::<HashSet<_>>();
    uppercase.len() < 2
}

#[derive(Debug, Clone, Copy)]
enum State<'a> {
    /// Nothing was read yet for this line.
    AwaitingLineResult(&'a ProjectedLine),
    /// Result lines were read for this line, its terminator was not.
    ConsumingSuggestions(&'a ProjectedLine),
    /// The current run of lines is exhausted.
    AdvancingFile,
    Done,
}

/// Walks the projected lines in the order they were sent to hunspell.
struct Cursor<'a> {
    segments: &'a [&'a [ProjectedLine]],
    segment: usize,
    line: usize,
}

impl<'a> Cursor<'a> {
    fn new(segments: &'a [&'a [ProjectedLine]]) -> Self {
        Cursor {
            segments,
            segment: 0,
            line: 0,
        }
    }

    /// State for the line under the cursor.
    fn state(&self) -> State<'a> {
        match self.segments.get(self.segment) {
            None => State::Done,
            Some(segment) => match segment.get(self.line) {
                Some(line) => State::AwaitingLineResult(line),
                None => State::AdvancingFile,
            },
        }
    }

    fn next_line(&mut self) -> State<'a> {
        self.line += 1;
        self.settle()
    }

    /// Skip exhausted runs of lines.
    fn settle(&mut self) -> State<'a> {
        loop {
            match self.state() {
                State::AdvancingFile => {
                    self.segment += 1;
                    self.line = 0;
                }
                state => return state,
            }
        }
    }
}

fn misspelled_word(result: &str) -> Option<&str> {
    result.get(1..)?.split_whitespace().next()
}

/// Match the output of `hunspell -a` against the lines it was given.
///
/// `segments` must be the runs of lines passed to
/// [`pipe_input`](crate::hunspell::pipe_input), in the same order.
pub fn correlate(segments: &[&[ProjectedLine]], output: &str) -> Result<Vec<MisspellingRecord>> {
    let mut cursor = Cursor::new(segments);
    let mut state = cursor.settle();
    let mut records = Vec::new();

    // The first line is the hunspell banner.
    for result in output.lines().skip(1) {
        let line = match state {
            State::AwaitingLineResult(line) | State::ConsumingSuggestions(line) => line,
            State::AdvancingFile | State::Done => {
                return Err(Error::Protocol(format!(
                    "unexpected output {result:?} after the last line"
                )));
            }
        };

        match result.chars().next() {
            None => {
                state = cursor.next_line();
                continue;
            }
            Some('&' | '?' | '#') => {
                if line.text.is_empty() {
                    return Err(Error::Protocol(format!(
                        "{}:{}: output {result:?} for an empty line",
                        line.path.display(),
                        line.lineno
                    )));
                }
                match misspelled_word(result) {
                    Some(word) if is_plausible_word(word) => records.push(MisspellingRecord {
                        path: Arc::clone(&line.path),
                        lineno: line.lineno,
                        word: String::from(word),
                    }),
                    Some(word) => log::debug!("Ignoring {word:?}, not a word"),
                    None => log::debug!("Ignoring empty result {result:?}"),
                }
            }
            Some('*' | '+' | '-') => {}
            Some(_) => log::debug!("Ignoring unknown hunspell output {result:?}"),
        }
        state = State::ConsumingSuggestions(line);
    }

    match state {
        State::Done => Ok(records),
        State::AwaitingLineResult(line) | State::ConsumingSuggestions(line) => {
            Err(Error::Protocol(format!(
                "output ended before {}:{}",
                line.path.display(),
                line.lineno
            )))
        }
        State::AdvancingFile => unreachable!("the cursor skips exhausted files"),
    }
}
