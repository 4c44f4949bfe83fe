// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use chrono::{NaiveDateTime, Weekday};

use crate::error::EpisodeError;
use crate::feed::RawItem;

use super::template::fill_placeholders;

/// Format of an RSS `<pubDate>`, without the trailing zone
const PUB_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S";

/// Same as [`PUB_DATE_FORMAT`] after the weekday prefix has been dropped
const PUB_DATE_FORMAT_NO_WEEKDAY: &str = "%d %b %Y %H:%M:%S";

/// Feed-level metadata an episode needs for `%P` and `%C`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedInfo {
    pub title: String,
    pub description: String,
}

/// A single downloadable item of a feed
///
/// Episodes are immutable. They only hold a shared handle to the feed's
/// title and description, never to the feed itself.
#[derive(Debug, Clone)]
pub struct Episode {
    title: String,
    description: String,
    uri: String,
    pub_date: NaiveDateTime,
    feed: Arc<FeedInfo>,
}

impl Episode {
    /// Create an episode from its parts
    pub fn new(
        feed: Arc<FeedInfo>,
        title: impl Into<String>,
        description: impl Into<String>,
        uri: impl Into<String>,
        pub_date: NaiveDateTime,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            uri: uri.into(),
            pub_date,
            feed,
        }
    }

    /// Build an episode from a raw feed item
    ///
    /// Fails if the item has no enclosure URL or if its publication date
    /// cannot be parsed. Such items carry nothing to download and are meant
    /// to be skipped by the caller.
    pub fn from_item(feed: Arc<FeedInfo>, item: &RawItem) -> Result<Self, EpisodeError> {
        let uri = item
            .enclosure_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| EpisodeError::MissingEnclosure {
                title: item.title.clone(),
            })?;

        let date_str = item
            .pub_date
            .as_deref()
            .ok_or_else(|| EpisodeError::MissingDate {
                title: item.title.clone(),
            })?;

        let pub_date = parse_pub_date(date_str).ok_or_else(|| EpisodeError::InvalidDate {
            title: item.title.clone(),
            date_str: date_str.to_string(),
        })?;

        Ok(Self::new(
            feed,
            item.title.as_str(),
            item.description.as_str(),
            uri,
            pub_date,
        ))
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// The enclosure URL, never empty
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn pub_date(&self) -> NaiveDateTime {
        self.pub_date
    }

    pub fn feed_title(&self) -> &str {
        &self.feed.title
    }

    pub fn feed_description(&self) -> &str {
        &self.feed.description
    }

    /// Render a placeholder pattern against this episode
    ///
    /// See [`fill_placeholders`] for the supported directives.
    pub fn fill_placeholders(&self, pattern: &str) -> String {
        fill_placeholders(pattern, self)
    }
}

/// Parse an RFC-822-like publication date, ignoring any trailing zone
///
/// The prefix before the comma has to name a weekday, but it is not
/// cross-checked against the date.
pub fn parse_pub_date(date_str: &str) -> Option<NaiveDateTime> {
    let date_str = date_str.trim();

    if let Ok((dt, _)) = NaiveDateTime::parse_and_remainder(date_str, PUB_DATE_FORMAT) {
        return Some(dt);
    }

    let (weekday, without_weekday) = date_str.split_once(',')?;
    weekday.trim().parse::<Weekday>().ok()?;
    NaiveDateTime::parse_and_remainder(without_weekday.trim_start(), PUB_DATE_FORMAT_NO_WEEKDAY)
        .ok()
        .map(|(dt, _)| dt)
}
