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

//! Spell check gettext PO files holding reStructuredText.
//!
//! Each catalog is projected to plain text where every line of the PO
//! file has a line of text: the cleaned translation on the line of its
//! `msgid`, nothing elsewhere. The projections are sent to hunspell in
//! pipe mode and the words it flags are mapped back to their file and
//! line.
//!
//! See [`spell_check`] for the whole pipeline.

pub mod catalog;
pub mod clean;
pub mod correlate;
mod error;
pub mod hunspell;
pub mod rst;

pub use error::{CheckerError, Error, Result};

use crate::catalog::ProjectedLine;
use crate::correlate::{correlate, MisspellingRecord};
use crate::hunspell::{pipe_input, SpellChecker};
use std::path::PathBuf;
use std::thread;

/// How to check a set of catalogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Drop capitalized words found mid-sentence.
    pub drop_capitalized: bool,
    /// Number of catalogs projected, and hunspell processes run, at once.
    pub jobs: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            drop_capitalized: false,
            jobs: 1,
        }
    }
}

/// Run `f` on every item on up to `jobs` threads, keeping the order.
fn parallel_map<T, U, F>(items: &[T], jobs: usize, f: F) -> Vec<U>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> U + Sync,
{
    if jobs <= 1 || items.len() <= 1 {
        return items.iter().map(&f).collect();
    }
    let batch_size = items.len().div_ceil(jobs);
    let f = &f;
    thread::scope(|scope| {
        let handles = items
            .chunks(batch_size)
            .map(|batch| scope.spawn(move || batch.iter().map(f).collect::<Vec<_>>()))
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .flat_map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
            })
            .collect()
    })
}

/// Project all catalogs in `paths`, in order.
pub fn project_all(
    paths: &[PathBuf],
    drop_capitalized: bool,
    jobs: usize,
) -> Result<Vec<Vec<ProjectedLine>>> {
    parallel_map(paths, jobs, |path| catalog::project(path, drop_capitalized))
        .into_iter()
        .collect()
}

/// Split the projections in at most `chunks` runs of lines of similar
/// size, each run being a list of consecutive lines of one catalog.
///
/// There is always at least one chunk, possibly empty.
fn chunk_lines(projections: &[Vec<ProjectedLine>], chunks: usize) -> Vec<Vec<&[ProjectedLine]>> {
    let total = projections.iter().map(Vec::len).sum::<usize>();
    let chunk_size = total.div_ceil(chunks.max(1)).max(1);

    let mut result = Vec::new();
    let mut current = Vec::new();
    let mut room = chunk_size;
    for projection in projections {
        let mut lines = projection.as_slice();
        while !lines.is_empty() {
            let (head, tail) = lines.split_at(room.min(lines.len()));
            current.push(head);
            room -= head.len();
            lines = tail;
            if room == 0 {
                result.push(std::mem::take(&mut current));
                room = chunk_size;
            }
        }
    }
    if !current.is_empty() || result.is_empty() {
        result.push(current);
    }
    result
}

/// Check projected catalogs with `checker`.
///
/// The records are sorted by file and line.
pub fn check_projections(
    projections: &[Vec<ProjectedLine>],
    checker: &dyn SpellChecker,
    jobs: usize,
) -> Result<Vec<MisspellingRecord>> {
    let chunks = chunk_lines(projections, jobs);
    log::debug!("Checking {} catalogs in {} chunks", projections.len(), chunks.len());

    let mut records = Vec::new();
    for chunk_records in parallel_map(&chunks, jobs, |segments| -> Result<_> {
        let output = checker.check(&pipe_input(segments))?;
        correlate(segments, &output)
    }) {
        records.extend(chunk_records?);
    }
    records.sort_by(|a, b| (&a.path, a.lineno).cmp(&(&b.path, b.lineno)));
    Ok(records)
}

/// Spell check the PO files in `paths`.
pub fn spell_check(
    paths: &[PathBuf],
    options: &Options,
    checker: &dyn SpellChecker,
) -> Result<Vec<MisspellingRecord>> {
    let projections = project_all(paths, options.drop_capitalized, options.jobs)?;
    check_projections(&projections, checker, options.jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::{write_catalog, HEADER_LINES};
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use std::sync::Arc;

    /// Behaves like `hunspell -a` with a dictionary missing the words
    /// in `unknown`.
    struct StubChecker {
        unknown: &'static [&'static str],
    }

    impl SpellChecker for StubChecker {
        fn check(&self, input: &str) -> std::result::Result<String, CheckerError> {
            let mut output = String::from("@(#) International Ispell Version 3.2.06 (stub)\n");
            for line in input.lines() {
                let line = line.strip_prefix(hunspell::SENTINEL).unwrap_or(line);
                for word in line.split(|c: char| !c.is_alphanumeric()) {
                    if word.is_empty() {
                        continue;
                    }
                    if self.unknown.contains(&word) {
                        output.push_str(&format!("# {word} 0\n"));
                    } else {
                        output.push_str("*\n");
                    }
                }
                output.push('\n');
            }
            Ok(output)
        }
    }

    const PYHTON: StubChecker = StubChecker {
        unknown: &["Pyhton"],
    };

    struct FailingChecker;

    impl SpellChecker for FailingChecker {
        fn check(&self, _input: &str) -> std::result::Result<String, CheckerError> {
            Err(CheckerError::Spawn {
                program: String::from("hunspell"),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
        }
    }

    fn lines(path: &str, count: usize) -> Vec<ProjectedLine> {
        let path: Arc<Path> = Arc::from(Path::new(path));
        (1..=count)
            .map(|lineno| ProjectedLine {
                path: Arc::clone(&path),
                lineno,
                text: format!("ligne {lineno}"),
            })
            .collect()
    }

    #[test]
    fn misspelled_translation() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_catalog(
            &dir,
            "fr.po",
            "msgid \"Python FTW!\"\n\
             msgstr \"Gloire à Pyhton !\"\n",
        )?;
        let records = spell_check(&[path.clone()], &Options::default(), &PYHTON)?;
        assert_eq!(
            records
                .iter()
                .map(|record| (record.path.to_path_buf(), record.lineno, record.word.as_str()))
                .collect::<Vec<_>>(),
            vec![(path, HEADER_LINES + 1, "Pyhton")]
        );
        Ok(())
    }

    #[test]
    fn corrected_translation() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_catalog(
            &dir,
            "fr.po",
            "msgid \"Python FTW!\"\n\
             msgstr \"Gloire à Python !\"\n",
        )?;
        assert_eq!(spell_check(&[path], &Options::default(), &PYHTON)?, vec![]);
        Ok(())
    }

    #[test]
    fn untranslated_entry() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_catalog(
            &dir,
            "fr.po",
            "msgid \"Pyhton is misspelled\"\n\
             msgstr \"Pyhton is misspelled\"\n\
             \n\
             msgid \"Pyhton again\"\n\
             msgstr \"\"\n",
        )?;
        assert_eq!(spell_check(&[path], &Options::default(), &PYHTON)?, vec![]);
        Ok(())
    }

    #[test]
    fn malformed_catalog() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("broken.po");
        std::fs::write(&path, "msgid \"Unterminated\nmsgstr \"Pyhton\"\n")?;
        assert!(matches!(
            spell_check(&[path], &Options::default(), &PYHTON),
            Err(Error::CatalogRead { .. })
        ));
        Ok(())
    }

    #[test]
    fn checker_failure_is_not_success() {
        let projections = vec![lines("fr.po", 2)];
        assert!(matches!(
            check_projections(&projections, &FailingChecker, 1),
            Err(Error::Checker(CheckerError::Spawn { .. }))
        ));
    }

    #[test]
    fn checker_runs_without_lines() {
        assert!(matches!(
            check_projections(&[], &FailingChecker, 4),
            Err(Error::Checker(_))
        ));
    }

    #[test]
    fn chunks_split_at_line_boundaries() {
        let projections = vec![lines("a.po", 3), lines("b.po", 4)];
        let chunks = chunk_lines(&projections, 2);
        assert_eq!(
            chunks
                .iter()
                .map(|chunk| chunk.iter().map(|run| run.len()).collect::<Vec<_>>())
                .collect::<Vec<_>>(),
            vec![vec![3, 1], vec![3]]
        );
        assert_eq!(chunks[1][0][0].lineno, 2);
        assert_eq!(&*chunks[1][0][0].path, Path::new("b.po"));
    }

    #[test]
    fn chunks_without_lines() {
        let projections = [Vec::new(), Vec::new()];
        let chunks = chunk_lines(&projections, 3);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_empty());
    }

    #[test]
    fn parallel_check_is_sorted() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut paths = Vec::new();
        for name in ["c.po", "a.po", "b.po"] {
            paths.push(write_catalog(
                &dir,
                name,
                "msgid \"First\"\n\
                 msgstr \"Pyhton un\"\n\
                 \n\
                 msgid \"Second\"\n\
                 msgstr \"Pyhton deux\"\n",
            )?);
        }
        let options = Options {
            drop_capitalized: false,
            jobs: 4,
        };
        let records = spell_check(&paths, &options, &PYHTON)?;
        let mut expected = Vec::new();
        for name in ["a.po", "b.po", "c.po"] {
            for lineno in [HEADER_LINES + 1, HEADER_LINES + 4] {
                expected.push(format!("{}:{lineno}:Pyhton", dir.path().join(name).display()));
            }
        }
        assert_eq!(
            records.iter().map(ToString::to_string).collect::<Vec<_>>(),
            expected
        );
        Ok(())
    }
}
