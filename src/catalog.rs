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

//! Read PO files and project them to line-aligned plain text.
//!
//! The projection of a catalog has one line per line of the PO file,
//! up to the last translated entry. The cleaned translation of an
//! entry sits on the line of its `msgid` keyword, every other line is
//! empty. A line number reported by hunspell is thus directly a line
//! number in the PO file.

use crate::clean::clean;
use crate::error::{Error, Result};
use crate::rst::MarkupStripper;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// One message of a catalog, as far as spell checking is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationEntry {
    pub msgid: String,
    /// The translation. Plural forms are joined with a space.
    pub msgstr: String,
    /// 1-based line of the `msgid` keyword.
    pub lineno: usize,
}

impl TranslationEntry {
    /// Untranslated entries have nothing to check.
    pub fn is_translated(&self) -> bool {
        !self.msgstr.is_empty() && self.msgstr != self.msgid
    }
}

/// One line of a projected catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectedLine {
    pub path: Arc<Path>,
    /// 1-based line number in the PO file.
    pub lineno: usize,
    /// Cleaned text, empty for filler lines.
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Msgctxt,
    Msgid,
    MsgidPlural,
    Msgstr(usize),
}

#[derive(Debug, Default)]
struct EntryBuilder {
    lineno: usize,
    msgid: Option<String>,
    msgstr: Vec<String>,
    field: Option<Field>,
}

impl EntryBuilder {
    fn append(&mut self, value: &str) -> std::result::Result<(), String> {
        match self.field {
            None => Err(String::from("string without a keyword")),
            Some(Field::Msgctxt | Field::MsgidPlural) => Ok(()),
            Some(Field::Msgid) => {
                self.msgid.get_or_insert_with(String::new).push_str(value);
                Ok(())
            }
            Some(Field::Msgstr(idx)) => {
                self.msgstr[idx].push_str(value);
                Ok(())
            }
        }
    }

    fn set_msgstr(&mut self, idx: usize, value: String) {
        if self.msgstr.len() <= idx {
            self.msgstr.resize(idx + 1, String::new());
        }
        self.msgstr[idx] = value;
        self.field = Some(Field::Msgstr(idx));
    }

    /// Emit the entry being built, skipping the header.
    fn finish(&mut self, entries: &mut Vec<TranslationEntry>) {
        let builder = std::mem::take(self);
        let Some(msgid) = builder.msgid else {
            return;
        };
        if msgid.is_empty() {
            return;
        }
        let msgstr = builder
            .msgstr
            .iter()
            .filter(|form| !form.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        entries.push(TranslationEntry {
            msgid,
            msgstr,
            lineno: builder.lineno,
        });
    }
}

/// Remove the quotes around a PO string and resolve its escapes.
fn unquote(text: &str) -> std::result::Result<String, String> {
    let inner = text
        .strip_prefix('"')
        .and_then(|text| text.strip_suffix('"'))
        .ok_or_else(|| format!("expected a quoted string, found {text:?}"))?;
    let mut unquoted = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            unquoted.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => unquoted.push('\n'),
            Some('t') => unquoted.push('\t'),
            Some('r') => unquoted.push('\r'),
            Some(escaped @ ('"' | '\\')) => unquoted.push(escaped),
            Some(other) => {
                unquoted.push('\\');
                unquoted.push(other);
            }
            None => return Err(format!("unterminated string {text:?}")),
        }
    }
    Ok(unquoted)
}

/// Extract the entries of a PO file, with their line numbers.
///
/// Comments, obsolete entries and the header are skipped. Errors are
/// reported with the line number they occur on.
pub fn scan_entries(content: &str) -> std::result::Result<Vec<TranslationEntry>, String> {
    let mut entries = Vec::new();
    let mut builder = EntryBuilder::default();
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    for (idx, line) in content.lines().enumerate() {
        let lineno = idx + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let at_line = |err: String| format!("line {lineno}: {err}");

        if line.starts_with('"') {
            let value = unquote(line).map_err(at_line)?;
            builder.append(&value).map_err(at_line)?;
            continue;
        }

        let (keyword, rest) = line
            .split_once(char::is_whitespace)
            .ok_or_else(|| at_line(format!("unexpected {line:?}")))?;
        if !matches!(keyword, "msgctxt" | "msgid" | "msgid_plural" | "msgstr")
            && !keyword.starts_with("msgstr[")
        {
            return Err(at_line(format!("unexpected keyword {keyword:?}")));
        }
        let value = unquote(rest.trim_start()).map_err(at_line)?;
        let has_msgid = builder.msgid.is_some();
        match keyword {
            "msgctxt" => {
                builder.finish(&mut entries);
                builder.field = Some(Field::Msgctxt);
            }
            "msgid" => {
                if has_msgid {
                    builder.finish(&mut entries);
                }
                builder.lineno = lineno;
                builder.msgid = Some(value);
                builder.field = Some(Field::Msgid);
            }
            "msgid_plural" if has_msgid => builder.field = Some(Field::MsgidPlural),
            "msgstr" if has_msgid => builder.set_msgstr(0, value),
            _ if has_msgid && keyword.starts_with("msgstr[") => {
                let idx = keyword
                    .strip_prefix("msgstr[")
                    .and_then(|idx| idx.strip_suffix(']'))
                    .and_then(|idx| idx.parse().ok())
                    .ok_or_else(|| at_line(format!("invalid keyword {keyword:?}")))?;
                builder.set_msgstr(idx, value);
            }
            _ => return Err(at_line(format!("unexpected keyword {keyword:?}"))),
        }
    }
    builder.finish(&mut entries);

    Ok(entries)
}

/// Read the entries of the PO file at `path`.
pub fn read_entries(path: &Path) -> Result<Vec<TranslationEntry>> {
    let read_error = |message: String| Error::CatalogRead {
        path: path.to_path_buf(),
        message,
    };
    let content = fs::read_to_string(path).map_err(|err| read_error(err.to_string()))?;
    scan_entries(&content).map_err(read_error)
}

/// Project `entries` read from `path`.
///
/// Untranslated entries are skipped, the lines before each translated
/// entry are filled with empty lines.
pub fn project_entries(
    path: &Arc<Path>,
    entries: &[TranslationEntry],
    drop_capitalized: bool,
) -> Vec<ProjectedLine> {
    let label = path.display().to_string();
    let mut stripper = MarkupStripper::new();
    let mut lines = Vec::new();

    for entry in entries.iter().filter(|entry| entry.is_translated()) {
        debug_assert!(
            entry.lineno > lines.len(),
            "entries must be sorted by line number"
        );
        while lines.len() + 1 < entry.lineno {
            lines.push(ProjectedLine {
                path: Arc::clone(path),
                lineno: lines.len() + 1,
                text: String::new(),
            });
        }
        let text = clean(&stripper.strip(&entry.msgstr), drop_capitalized, &label);
        lines.push(ProjectedLine {
            path: Arc::clone(path),
            lineno: lines.len() + 1,
            text,
        });
    }

    lines
}

/// Read and project the PO file at `path`.
pub fn project(path: &Path, drop_capitalized: bool) -> Result<Vec<ProjectedLine>> {
    let entries = read_entries(path)?;
    log::info!("Read {} messages from {}", entries.len(), path.display());
    Ok(project_entries(&Arc::from(path), &entries, drop_capitalized))
}

/// Render a projection as text, one line per PO file line.
pub fn render(lines: &[ProjectedLine]) -> String {
    lines
        .iter()
        .map(|line| line.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}
