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

//! Drop the parts of a line which are not prose.
//!
//! Once markup is gone, a line can still hold placeholders, version
//! numbers, acronyms or (in some languages) proper nouns that hunspell
//! would flag. They are replaced by spaces here.

use regex::{Captures, Regex};
use std::sync::OnceLock;

/// Patterns whose matches are always replaced by a space.
const DROP_PATTERNS: &[&str] = &[
    // Leftover HTML links.
    r#"<a href="[^"]*?">"#,
    // Acronyms and words with several capitals, like "HTTP".
    r"\b[\w-]*\p{Uppercase}{2,}[0-9.\w-]*\b",
    // Sphinx and str.format variables.
    r"\{[a-z_]*?\}",
    r"%\([a-z_]+?\)[diouxXeEfFgGcrsa%]",
    // Single characters quoted as examples, like « x ».
    r"«\s?\w\s?»",
    // Version numbers.
    r"\b[0-9]+(?:\.[0-9]+)+\w*\b",
    // Numbers glued to a unit, like 10h or 64bit.
    r"\b[0-9]+\p{Alphabetic}+\b",
    // Dashes used as punctuation.
    r"---?",
    r"\s-\s",
];

/// Capitalized words, with an optional elided article (like "l'").
///
/// Only dropped when not at the start of a sentence, see
/// [`is_sentence_start`].
const CAPITALIZED_PATTERN: &str = r"\b(?:\p{Alphabetic}['’])?\p{Uppercase}\p{Letter}[\w.-]+\b";

/// Whether capitalized words are dropped by default, per language.
const DEFAULT_DROP_CAPITALIZED: &[(&str, bool)] = &[("de", false), ("fr", true)];

/// Default capitalized-word policy for `language`.
///
/// The full code (`fr_FR`) is looked up first, then its primary
/// subtag (`fr`). Unknown languages keep capitalized words.
pub fn default_drop_capitalized(language: &str) -> bool {
    let lookup = |code: &str| {
        DEFAULT_DROP_CAPITALIZED
            .iter()
            .find(|(known, _)| *known == code)
            .map(|(_, drop)| *drop)
    };
    lookup(language)
        .or_else(|| language.split(['_', '-']).next().and_then(lookup))
        .unwrap_or(false)
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

fn alternation(drop_capitalized: bool) -> String {
    let mut alternatives = DROP_PATTERNS
        .iter()
        .map(|pattern| format!("(?:{pattern})"))
        .collect::<Vec<_>>();
    if drop_capitalized {
        alternatives.push(format!("(?P<capitalized>{CAPITALIZED_PATTERN})"));
    }
    alternatives.join("|")
}

fn combined_re(drop_capitalized: bool) -> &'static Regex {
    static WITH_CAPITALIZED: OnceLock<Regex> = OnceLock::new();
    static WITHOUT_CAPITALIZED: OnceLock<Regex> = OnceLock::new();
    let cell = if drop_capitalized {
        &WITH_CAPITALIZED
    } else {
        &WITHOUT_CAPITALIZED
    };
    cell.get_or_init(|| Regex::new(&alternation(drop_capitalized)).unwrap())
}

/// Every pattern compiled on its own, used to log what gets dropped.
fn each_pattern_re() -> &'static [(&'static str, Regex)] {
    static RE: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    RE.get_or_init(|| {
        DROP_PATTERNS
            .iter()
            .chain(std::iter::once(&CAPITALIZED_PATTERN))
            .map(|pattern| (*pattern, Regex::new(pattern).unwrap()))
            .collect()
    })
}

/// A capitalized word is kept at the start of the text, after ". ",
/// or after a hyphen.
fn is_sentence_start(line: &str, offset: usize) -> bool {
    let before = &line[..offset];
    before.is_empty() || before.ends_with(". ") || before.ends_with('-')
}

/// The set of patterns used to clean a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropPatterns {
    drop_capitalized: bool,
}

impl DropPatterns {
    pub fn new(drop_capitalized: bool) -> Self {
        DropPatterns { drop_capitalized }
    }

    /// The active patterns, in the order they are tried.
    pub fn patterns(&self) -> Vec<&'static str> {
        DROP_PATTERNS
            .iter()
            .copied()
            .chain(self.drop_capitalized.then_some(CAPITALIZED_PATTERN))
            .collect()
    }

    /// Replace every match of the active patterns in `line` by a space.
    ///
    /// `source` only labels the debug log lines.
    pub fn apply(&self, line: &str, source: &str) -> String {
        if log::log_enabled!(log::Level::Debug) {
            self.log_matches(line, source);
        }
        combined_re(self.drop_capitalized)
            .replace_all(line, |caps: &Captures| match caps.name("capitalized") {
                Some(m) if is_sentence_start(line, m.start()) => String::from(m.as_str()),
                _ => String::from(" "),
            })
            .into_owned()
    }

    fn log_matches(&self, line: &str, source: &str) {
        for (pattern, regex) in each_pattern_re() {
            let capitalized = *pattern == CAPITALIZED_PATTERN;
            if capitalized && !self.drop_capitalized {
                continue;
            }
            for m in regex.find_iter(line) {
                if capitalized && is_sentence_start(line, m.start()) {
                    continue;
                }
                log::debug!("{source}: dropping {:?} via {pattern:?}", m.as_str());
            }
        }
    }
}

/// Clean `text` before it is sent to hunspell.
///
/// Whitespace runs are collapsed and soft hyphens removed, then all
/// the [`DropPatterns`] matches are replaced by spaces in one pass.
///
/// ```
/// use pospell::clean::clean;
///
/// assert!(!clean("HTTP is great.", false, "").contains("HTTP"));
/// assert!(clean("Great is Unicode.", false, "").contains("Unicode"));
/// assert!(!clean("Great is Unicode.", true, "").contains("Unicode"));
/// ```
pub fn clean(text: &str, drop_capitalized: bool, source: &str) -> String {
    let text = text.replace('\u{ad}', "");
    let text = whitespace_re().replace_all(&text, " ");
    DropPatterns::new(drop_capitalized).apply(&text, source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn words(text: &str) -> Vec<&str> {
        text.split_whitespace().collect()
    }

    #[test]
    fn sentence_initial_capital_is_kept() {
        assert!(clean("Sport is great.", true, "").contains("Sport"));
    }

    #[test]
    fn capital_after_full_stop_is_kept() {
        assert_eq!(
            words(&clean("Il pleut. Demain aussi.", true, "")),
            vec!["Il", "pleut.", "Demain", "aussi."]
        );
    }

    #[test]
    fn mid_sentence_capital_depends_on_policy() {
        assert!(!clean("Great is Unicode.", true, "").contains("Unicode"));
        assert!(clean("Great is Unicode.", false, "").contains("Unicode"));
    }

    #[test]
    fn elided_article_is_dropped_with_the_word() {
        let cleaned = clean("Je vis dans l'Europe du nord.", true, "");
        assert_eq!(words(&cleaned), vec!["Je", "vis", "dans", "du", "nord."]);
    }

    #[test]
    fn acronyms_are_always_dropped() {
        assert!(!clean("HTTP is great.", false, "").contains("HTTP"));
        assert!(!clean("HTTP is great.", true, "").contains("HTTP"));
        assert_eq!(
            words(&clean("du code non-HTTP ici", false, "")),
            vec!["du", "code", "ici"]
        );
    }

    #[test]
    fn whitespace_runs_do_not_matter() {
        for drop_capitalized in [false, true] {
            assert_eq!(
                clean("Test.  Two spaces", drop_capitalized, ""),
                clean("Test. Two spaces", drop_capitalized, "")
            );
        }
        assert_eq!(clean("un\n  mot", false, ""), "un mot");
    }

    #[test]
    fn clean_is_deterministic() {
        let text = "Le module « re » de Python 3.12 et {name} sur HTTP.";
        assert_eq!(clean(text, true, ""), clean(text, true, ""));
    }

    #[test]
    fn soft_hyphens_are_removed() {
        assert_eq!(clean("para\u{ad}graphe", false, ""), "paragraphe");
    }

    #[test]
    fn placeholders_are_dropped() {
        let cleaned = clean("Bonjour {name}, vous avez %(count)d messages", false, "");
        assert_eq!(words(&cleaned), vec!["Bonjour", ",", "vous", "avez", "messages"]);
    }

    #[test]
    fn quoted_single_characters_are_dropped() {
        assert_eq!(
            words(&clean("le caractère « x » est", false, "")),
            vec!["le", "caractère", "est"]
        );
    }

    #[test]
    fn versions_and_units_are_dropped() {
        assert_eq!(
            words(&clean("Python 3.8 prend 10h", false, "")),
            vec!["Python", "prend"]
        );
    }

    #[test]
    fn html_anchors_are_dropped() {
        assert!(!clean(r#"un <a href="https://x.org">lien</a>"#, false, "").contains("href"));
    }

    #[test]
    fn dashes_are_dropped() {
        assert_eq!(
            words(&clean("oui -- non --- peut-être - bof", false, "")),
            vec!["oui", "non", "peut-être", "bof"]
        );
    }

    #[test]
    fn capitalized_pattern_is_optional() {
        assert_eq!(DropPatterns::new(false).patterns().len(), DROP_PATTERNS.len());
        assert_eq!(
            DropPatterns::new(true).patterns().last(),
            Some(&CAPITALIZED_PATTERN)
        );
    }

    #[test]
    fn language_defaults() {
        assert!(default_drop_capitalized("fr"));
        assert!(default_drop_capitalized("fr_FR"));
        assert!(!default_drop_capitalized("de"));
        assert!(!default_drop_capitalized("de_DE"));
        assert!(!default_drop_capitalized("en_US"));
    }
}
