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

//! Talk to hunspell in pipe mode (`hunspell -a`).

use crate::catalog::ProjectedLine;
use crate::error::CheckerError;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread;

/// Prefix of every line sent in pipe mode.
///
/// It stops hunspell from reading a leading `*`, `&`, `@` or `#` of
/// the text as a command.
pub const SENTINEL: char = '^';

/// Something which checks text in hunspell pipe mode.
///
/// Implementations receive the full pipe-mode input and return the
/// raw output: one banner line, then one block per input line, each
/// block terminated by an empty line.
pub trait SpellChecker: Sync {
    fn check(&self, input: &str) -> Result<String, CheckerError>;
}

/// Build the pipe-mode input for consecutive runs of projected lines.
///
/// Each projected line becomes exactly one input line.
pub fn pipe_input(segments: &[&[ProjectedLine]]) -> String {
    let mut input = String::new();
    for line in segments.iter().flat_map(|segment| segment.iter()) {
        input.push(SENTINEL);
        input.push_str(&line.text);
        input.push('\n');
    }
    input
}

/// The hunspell executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunspell {
    pub language: String,
    pub personal_dict: Option<PathBuf>,
}

impl Hunspell {
    const PROGRAM: &'static str = "hunspell";

    pub fn new(language: &str) -> Self {
        Hunspell {
            language: String::from(language),
            personal_dict: None,
        }
    }

    pub fn with_personal_dict(mut self, path: &Path) -> Self {
        self.personal_dict = Some(path.to_path_buf());
        self
    }

    /// The arguments passed to hunspell.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![String::from("-d"), self.language.clone()];
        if let Some(dict) = &self.personal_dict {
            args.push(String::from("-p"));
            args.push(dict.display().to_string());
        }
        args.push(String::from("-a"));
        args
    }

    /// Whether hunspell lists a dictionary for our language.
    ///
    /// Returns `false` as well when hunspell cannot be run at all.
    pub fn dictionary_installed(&self) -> bool {
        let output = Command::new(Self::PROGRAM)
            .arg("-D")
            .stdin(Stdio::null())
            .output();
        match output {
            Ok(output) => {
                // hunspell prints the listing on stderr.
                let listing = format!(
                    "{}{}",
                    String::from_utf8_lossy(&output.stdout),
                    String::from_utf8_lossy(&output.stderr)
                );
                lists_dictionary(&listing, &self.language)
            }
            Err(err) => {
                log::debug!("Could not run {} -D: {err}", Self::PROGRAM);
                false
            }
        }
    }
}

impl SpellChecker for Hunspell {
    fn check(&self, input: &str) -> Result<String, CheckerError> {
        let program = String::from(Self::PROGRAM);
        let args = self.args();
        log::debug!("Running {program} {}", args.join(" "));

        let mut child = Command::new(Self::PROGRAM)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| CheckerError::Spawn {
                program: program.clone(),
                source,
            })?;

        let mut stdin = child.stdin.take().ok_or_else(|| CheckerError::Io {
            program: program.clone(),
            source: std::io::Error::other("stdin is not piped"),
        })?;

        // Feed stdin from another thread, hunspell would block on a full
        // stdout pipe otherwise.
        let (written, output) = thread::scope(|scope| {
            let writer = scope.spawn(move || stdin.write_all(input.as_bytes()));
            let output = child.wait_with_output();
            let written = writer
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
            (written, output)
        });

        checker_output(&program, written, output)
    }
}

/// Turn what was observed of a checker run into its output.
///
/// A non-zero exit wins over a failed write: the write most likely
/// failed on a broken pipe, and stderr tells why the checker stopped.
fn checker_output(
    program: &str,
    written: std::io::Result<()>,
    output: std::io::Result<Output>,
) -> Result<String, CheckerError> {
    let io_error = |source| CheckerError::Io {
        program: String::from(program),
        source,
    };
    let output = output.map_err(io_error)?;
    if !output.status.success() {
        return Err(CheckerError::Exit {
            program: String::from(program),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    written.map_err(io_error)?;
    String::from_utf8(output.stdout)
        .map_err(|err| io_error(std::io::Error::new(std::io::ErrorKind::InvalidData, err)))
}

/// Whether `listing`, as printed by `hunspell -D`, has a dictionary
/// named `language`.
pub fn lists_dictionary(listing: &str, language: &str) -> bool {
    listing
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('/'))
        .filter_map(|line| Path::new(line).file_name())
        .any(|name| name == language)
}

/// A hint telling how to install the dictionary for `language`.
pub fn install_hint(language: &str) -> String {
    let package = language.to_lowercase().replace('_', "-");
    format!(
        "The hunspell dictionary for {language:?} is not installed. \
         On Debian or Ubuntu, try: apt install hunspell-{package}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn lines(path: &str, texts: &[&str]) -> Vec<ProjectedLine> {
        let path: Arc<Path> = Arc::from(Path::new(path));
        texts
            .iter()
            .enumerate()
            .map(|(idx, text)| ProjectedLine {
                path: Arc::clone(&path),
                lineno: idx + 1,
                text: String::from(*text),
            })
            .collect()
    }

    #[test]
    fn pipe_input_prefixes_every_line() {
        let first = lines("a.po", &["", "*Bonjour"]);
        let second = lines("b.po", &["Monde"]);
        assert_eq!(
            pipe_input(&[&first, &second]),
            "^\n^*Bonjour\n^Monde\n"
        );
    }

    #[test]
    fn pipe_input_empty() {
        assert_eq!(pipe_input(&[]), "");
        assert_eq!(pipe_input(&[&[]]), "");
    }

    #[test]
    fn args() {
        assert_eq!(Hunspell::new("fr").args(), vec!["-d", "fr", "-a"]);
        assert_eq!(
            Hunspell::new("fr_FR")
                .with_personal_dict(Path::new("dict.txt"))
                .args(),
            vec!["-d", "fr_FR", "-p", "dict.txt", "-a"]
        );
    }

    #[cfg(unix)]
    fn output(code: i32, stdout: &str, stderr: &str) -> Output {
        use std::os::unix::process::ExitStatusExt;
        Output {
            // Wait statuses hold the exit code in the second byte.
            status: std::process::ExitStatus::from_raw(code << 8),
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    #[cfg(unix)]
    #[test]
    fn exit_status_wins_over_broken_pipe() {
        let broken_pipe = Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe));
        let missing = output(
            1,
            "",
            "Can't open affix or dictionary files for dictionary named \"xx\".\n",
        );
        match checker_output("hunspell", broken_pipe, Ok(missing)) {
            Err(CheckerError::Exit { status, stderr, .. }) => {
                assert_eq!(status.code(), Some(1));
                assert_eq!(
                    stderr,
                    "Can't open affix or dictionary files for dictionary named \"xx\"."
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn failed_write_after_success_is_an_error() {
        let broken_pipe = Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe));
        assert!(matches!(
            checker_output("hunspell", broken_pipe, Ok(output(0, "@(#)\n", ""))),
            Err(CheckerError::Io { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn successful_run() {
        assert_eq!(
            checker_output("hunspell", Ok(()), Ok(output(0, "@(#)\n*\n\n", ""))).ok(),
            Some(String::from("@(#)\n*\n\n"))
        );
    }

    #[test]
    fn listing() {
        let listing = "SEARCH PATH:\n\
                       .:/usr/share/hunspell\n\
                       AVAILABLE DICTIONARIES (path is not mandatory for -d option):\n\
                       /usr/share/hunspell/en_US\n\
                       /usr/share/hunspell/fr_FR\n\
                       /usr/share/hunspell/fr\n";
        assert!(lists_dictionary(listing, "fr"));
        assert!(lists_dictionary(listing, "fr_FR"));
        assert!(!lists_dictionary(listing, "de_DE"));
        assert!(!lists_dictionary("", "fr"));
    }

    #[test]
    fn hint() {
        assert_eq!(
            install_hint("de_DE"),
            "The hunspell dictionary for \"de_DE\" is not installed. \
             On Debian or Ubuntu, try: apt install hunspell-de-de"
        );
    }
}
