// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use thiserror::Error;

use crate::episode::Episode;

/// What a filter does when its regular expression matches (or not)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    /// Exclude the episode if the regular expression matches
    ExcludeIfMatch,
    /// Exclude the episode if the regular expression doesn't match
    ExcludeIfNotMatch,
    /// Include the episode if the regular expression matches
    IncludeIfMatch,
    /// Include the episode if the regular expression doesn't match
    IncludeIfNotMatch,
}

impl FilterType {
    /// Name used in the configuration file
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExcludeIfMatch => "exclude-if-match",
            Self::ExcludeIfNotMatch => "exclude-if-not-match",
            Self::IncludeIfMatch => "include-if-match",
            Self::IncludeIfNotMatch => "include-if-not-match",
        }
    }
}

impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error(
    "Attribute type must be one of \"include-if-match\", \"include-if-not-match\", \"exclude-if-match\", \"exclude-if-not-match\", got \"{0}\"."
)]
pub struct UnknownFilterType(pub String);

impl FromStr for FilterType {
    type Err = UnknownFilterType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exclude-if-match" => Ok(Self::ExcludeIfMatch),
            "exclude-if-not-match" => Ok(Self::ExcludeIfNotMatch),
            "include-if-match" => Ok(Self::IncludeIfMatch),
            "include-if-not-match" => Ok(Self::IncludeIfNotMatch),
            other => Err(UnknownFilterType(other.to_string())),
        }
    }
}

/// Decision of a single filter about a single episode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterResult {
    /// Keep the episode, ignore remaining filters
    Include,
    /// Drop the episode, ignore remaining filters
    Exclude,
    /// Let the next filter decide
    Inconclusive,
}

/// A rule matching a regular expression against a templated string
///
/// The match template is rendered through [`Episode::fill_placeholders`]
/// and the expression has to match the whole result, not a substring.
#[derive(Debug, Clone)]
pub struct Filter {
    filter_type: FilterType,
    pattern: String,
    regex: Regex,
    match_template: String,
}

impl Filter {
    /// Compile a filter
    ///
    /// The expression is anchored at both ends before compiling.
    pub fn new(
        filter_type: FilterType,
        pattern: &str,
        match_template: impl Into<String>,
    ) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{pattern})$"))?;

        Ok(Self {
            filter_type,
            pattern: pattern.to_string(),
            regex,
            match_template: match_template.into(),
        })
    }

    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    /// The expression as written in the configuration
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn match_template(&self) -> &str {
        &self.match_template
    }

    /// Apply the filter to an episode
    pub fn apply(&self, episode: &Episode) -> FilterResult {
        let text = episode.fill_placeholders(&self.match_template);
        let matched = self.regex.is_match(&text);

        match (self.filter_type, matched) {
            (FilterType::ExcludeIfMatch, true) | (FilterType::ExcludeIfNotMatch, false) => {
                FilterResult::Exclude
            }
            (FilterType::IncludeIfMatch, true) | (FilterType::IncludeIfNotMatch, false) => {
                FilterResult::Include
            }
            _ => FilterResult::Inconclusive,
        }
    }
}

/// Run a filter chain in order; the first conclusive result wins
pub fn evaluate_chain(filters: &[Filter], episode: &Episode) -> FilterResult {
    filters
        .iter()
        .map(|filter| filter.apply(episode))
        .find(|result| *result != FilterResult::Inconclusive)
        .unwrap_or(FilterResult::Inconclusive)
}

/// Whether an episode passes the chain; episodes are included by default
pub fn is_included(filters: &[Filter], episode: &Episode) -> bool {
    evaluate_chain(filters, episode) != FilterResult::Exclude
}
