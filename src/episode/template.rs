// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Placeholder substitution for filename patterns and filter match strings.
//!
//! A pattern is scanned left to right. Every `%` starts a two-character
//! directive:
//!
//! | directive | replaced with |
//! |---|---|
//! | `%%` | a literal `%` |
//! | `%P` | title of the feed |
//! | `%C` | description of the feed |
//! | `%T` | title of the episode |
//! | `%D` | description of the episode |
//! | `%Y %y %m %b %B %W %j %d %e %a %A %w %u %H %I %M %S %p` | the matching field of the publication date, as `strftime` renders it |
//!
//! A `%` at the very end of the pattern stays a `%`. Any other `%X` is kept
//! as is, both characters included.

use std::fmt::Write;

use super::model::Episode;

/// One resolved unit of a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Literal(char),
    Percent,
    FeedTitle,
    FeedDescription,
    EpisodeTitle,
    EpisodeDescription,
    Date(&'static str),
    Unknown(char),
}

/// Iterator turning the characters of a pattern into tokens
struct Tokens<I> {
    chars: I,
}

impl<I: Iterator<Item = char>> Iterator for Tokens<I> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        let c = self.chars.next()?;
        if c != '%' {
            return Some(Token::Literal(c));
        }

        let token = match self.chars.next() {
            None | Some('%') => Token::Percent,
            Some('P') => Token::FeedTitle,
            Some('C') => Token::FeedDescription,
            Some('T') => Token::EpisodeTitle,
            Some('D') => Token::EpisodeDescription,
            Some(other) => date_directive(other).map_or(Token::Unknown(other), Token::Date),
        };
        Some(token)
    }
}

fn tokenize(pattern: &str) -> Tokens<std::str::Chars<'_>> {
    Tokens {
        chars: pattern.chars(),
    }
}

/// Map a directive letter to its date format item
fn date_directive(c: char) -> Option<&'static str> {
    let directive = match c {
        'Y' => "%Y",
        'y' => "%y",
        'm' => "%m",
        'b' => "%b",
        'B' => "%B",
        'W' => "%W",
        'j' => "%j",
        'd' => "%d",
        'e' => "%e",
        'a' => "%a",
        'A' => "%A",
        'w' => "%w",
        'u' => "%u",
        'H' => "%H",
        'I' => "%I",
        'M' => "%M",
        'S' => "%S",
        'p' => "%p",
        _ => return None,
    };
    Some(directive)
}

/// Replace every placeholder in `pattern` with the episode's metadata
pub fn fill_placeholders(pattern: &str, episode: &Episode) -> String {
    let mut result = String::with_capacity(pattern.len());

    for token in tokenize(pattern) {
        match token {
            Token::Literal(c) => result.push(c),
            Token::Percent => result.push('%'),
            Token::FeedTitle => result.push_str(episode.feed_title()),
            Token::FeedDescription => result.push_str(episode.feed_description()),
            Token::EpisodeTitle => result.push_str(episode.title()),
            Token::EpisodeDescription => result.push_str(episode.description()),
            Token::Date(directive) => {
                // Writing to a String cannot fail and every directive is a valid item
                let _ = write!(result, "{}", episode.pub_date().format(directive));
            }
            Token::Unknown(c) => {
                result.push('%');
                result.push(c);
            }
        }
    }

    result
}
