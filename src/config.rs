// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Loading feed definitions from the XML configuration file.
//!
//! ```xml
//! <podlist>
//!   <feed uid="tech" uri="https://example.com/rss" basedir="Podcasts/tech" filename="%Y-%m-%d_%T">
//!     <filter type="exclude-if-match" regex="^Bonus.*$" match="%T"/>
//!   </feed>
//! </podlist>
//! ```
//!
//! `basedir` is resolved relative to the user's home directory. Any
//! problem anywhere in the file fails the whole load.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::ConfigError;
use crate::filter::{Filter, FilterType};
use crate::sync::{DEFAULT_FILENAME_PATTERN, Feed};

/// Name of the configuration file inside the home directory
pub const CONFIG_FILE_NAME: &str = ".jpodconf";

/// A `<feed>` element as written in the configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedDefinition {
    pub uid: String,
    pub uri: String,
    pub base_dir: String,
    pub filename_pattern: String,
    pub filters: Vec<FilterDefinition>,
}

/// A `<filter>` element as written in the configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterDefinition {
    pub filter_type: FilterType,
    pub regex: String,
    pub match_template: String,
}

impl FeedDefinition {
    /// Compile the filters and set up the feed's base path below `home`
    pub fn into_feed(self, home: &Path) -> Result<Feed, ConfigError> {
        let filters = self
            .filters
            .iter()
            .map(|def| {
                Filter::new(def.filter_type, &def.regex, def.match_template.as_str()).map_err(
                    |e| ConfigError::InvalidRegex {
                        uid: self.uid.clone(),
                        source: e,
                    },
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let uid = self.uid;
        Feed::new(
            uid.as_str(),
            self.uri,
            home.join(&self.base_dir),
            self.filename_pattern,
            filters,
        )
        .map_err(|e| ConfigError::Feed { uid, source: e })
    }
}

/// Location of the configuration file of the current user
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    home_dir().map(|home| home.join(CONFIG_FILE_NAME))
}

fn home_dir() -> Result<PathBuf, ConfigError> {
    home::home_dir().ok_or(ConfigError::NoHomeDirectory)
}

/// Load all feeds from a configuration file
///
/// Base directories are resolved relative to the current user's home.
pub fn load_config(path: &Path) -> Result<Vec<Feed>, ConfigError> {
    load_config_with_home(path, &home_dir()?)
}

/// Load all feeds from a configuration file, resolving base directories
/// relative to `home`
pub fn load_config_with_home(path: &Path, home: &Path) -> Result<Vec<Feed>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_config(&content)?
        .into_iter()
        .map(|def| def.into_feed(home))
        .collect()
}

/// Parse and validate the configuration document
pub fn parse_config(content: &str) -> Result<Vec<FeedDefinition>, ConfigError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut feeds: Vec<FeedDefinition> = Vec::new();
    let mut current: Option<FeedDefinition> = None;
    let mut seen_root = false;
    let mut depth: usize = 0;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                open_element(&e, &reader, depth, &mut seen_root, &mut current)?;
                depth += 1;
            }
            Event::Empty(e) => {
                open_element(&e, &reader, depth, &mut seen_root, &mut current)?;
                // A self-closing <feed/> has no filters and is complete right away
                if depth == 1
                    && let Some(feed) = current.take()
                {
                    feeds.push(feed);
                }
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if depth == 1
                    && let Some(feed) = current.take()
                {
                    feeds.push(feed);
                }
            }
            Event::Text(_) | Event::CData(_) => match depth {
                0 => {
                    return Err(ConfigError::Invalid(
                        "Root node is not <podlist>...</podlist>".to_string(),
                    ));
                }
                1 => return Err(podlist_content_error()),
                2 => return Err(feed_content_error()),
                _ => {}
            },
            Event::Eof => break,
            // Comments, declarations, processing instructions and doctypes
            _ => {}
        }
    }

    if !seen_root {
        return Err(ConfigError::Invalid(
            "Root node is not <podlist>...</podlist>".to_string(),
        ));
    }

    check_unique_uids(&feeds)?;
    Ok(feeds)
}

/// Validate an opening (or self-closing) element at the given depth
///
/// A `<feed>` becomes the current feed, a `<filter>` is appended to it.
fn open_element(
    e: &BytesStart<'_>,
    reader: &Reader<&[u8]>,
    depth: usize,
    seen_root: &mut bool,
    current: &mut Option<FeedDefinition>,
) -> Result<(), ConfigError> {
    let name = e.name();
    match depth {
        0 => {
            if *seen_root {
                return Err(ConfigError::Invalid(
                    "Config file contains more than one root element".to_string(),
                ));
            }
            if name.as_ref() != b"podlist" {
                return Err(ConfigError::Invalid(
                    "Root node is not <podlist>...</podlist>".to_string(),
                ));
            }
            *seen_root = true;
        }
        1 => {
            if name.as_ref() != b"feed" {
                return Err(podlist_content_error());
            }
            *current = Some(parse_feed_element(e, reader)?);
        }
        2 => {
            if name.as_ref() != b"filter" {
                return Err(feed_content_error());
            }
            if let Some(feed) = current.as_mut() {
                let filter = parse_filter_element(e, reader, &feed.uid)?;
                feed.filters.push(filter);
            }
        }
        _ => {
            return Err(ConfigError::Invalid(
                "<filter ... /> must not contain other elements".to_string(),
            ));
        }
    }
    Ok(())
}

fn podlist_content_error() -> ConfigError {
    ConfigError::Invalid("Podlist contains something other than <feed>...</feed>".to_string())
}

fn feed_content_error() -> ConfigError {
    ConfigError::Invalid(
        "<feed>...</feed> contains something other than <filter ... />".to_string(),
    )
}

fn attributes(
    e: &BytesStart<'_>,
    reader: &Reader<&[u8]>,
) -> Result<HashMap<String, String>, ConfigError> {
    let decoder = reader.decoder();
    let mut attrs = HashMap::new();

    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.decode_and_unescape_value(decoder)?.into_owned();
        attrs.insert(key, value);
    }

    Ok(attrs)
}

fn parse_feed_element(
    e: &BytesStart<'_>,
    reader: &Reader<&[u8]>,
) -> Result<FeedDefinition, ConfigError> {
    let mut attrs = attributes(e, reader)?;

    let uid = attrs
        .remove("uid")
        .ok_or_else(|| ConfigError::InvalidFeed("Attribute uid is missing.".to_string()))?;
    if uid.is_empty() || uid.chars().any(char::is_whitespace) {
        return Err(ConfigError::InvalidFeed(
            "Attribute uid must not be empty or contain whitespaces.".to_string(),
        ));
    }

    let uri = attrs.remove("uri").ok_or_else(|| {
        ConfigError::InvalidFeed(format!(
            "Attribute uri is missing in the feed with uid \"{uid}\"."
        ))
    })?;
    if uri.is_empty() {
        return Err(ConfigError::InvalidFeed(format!(
            "Attribute uri is empty in the feed with uid \"{uid}\"."
        )));
    }

    let base_dir = attrs.remove("basedir").ok_or_else(|| {
        ConfigError::InvalidFeed(format!(
            "Attribute basedir is missing in the feed with uid \"{uid}\"."
        ))
    })?;

    let filename_pattern = match attrs.remove("filename") {
        None => DEFAULT_FILENAME_PATTERN.to_string(),
        Some(pattern) if pattern.is_empty() => {
            return Err(ConfigError::InvalidFeed(format!(
                "Attribute filename is invalid in the feed with uid \"{uid}\"."
            )));
        }
        Some(pattern) => pattern,
    };

    Ok(FeedDefinition {
        uid,
        uri,
        base_dir,
        filename_pattern,
        filters: Vec::new(),
    })
}

fn parse_filter_element(
    e: &BytesStart<'_>,
    reader: &Reader<&[u8]>,
    uid: &str,
) -> Result<FilterDefinition, ConfigError> {
    let mut attrs = attributes(e, reader)?;
    let invalid = |reason: String| ConfigError::InvalidFilter {
        uid: uid.to_string(),
        reason,
    };

    let filter_type = attrs
        .remove("type")
        .ok_or_else(|| invalid("Attribute type is missing.".to_string()))?
        .parse::<FilterType>()
        .map_err(|e| invalid(e.to_string()))?;

    let regex = attrs
        .remove("regex")
        .ok_or_else(|| invalid("Attribute regex is missing.".to_string()))?;

    let match_template = attrs
        .remove("match")
        .ok_or_else(|| invalid("Attribute match is missing.".to_string()))?;

    Ok(FilterDefinition {
        filter_type,
        regex,
        match_template,
    })
}

fn check_unique_uids(feeds: &[FeedDefinition]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for feed in feeds {
        if !seen.insert(feed.uid.as_str()) {
            return Err(ConfigError::DuplicateUid(feed.uid.clone()));
        }
    }
    Ok(())
}
