// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading the feed configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed XML in config file: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Invalid config file. {0}")]
    Invalid(String),

    #[error("Invalid feed in config file. {0}")]
    InvalidFeed(String),

    #[error("Invalid filter in feed with uid \"{uid}\". {reason}")]
    InvalidFilter { uid: String, reason: String },

    #[error(
        "Invalid filter in feed with uid \"{uid}\". Attribute regex is not a valid regular expression: {source}"
    )]
    InvalidRegex {
        uid: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid feed in config file. The uid \"{0}\" is used by more than one feed.")]
    DuplicateUid(String),

    #[error("Cannot determine the home directory of the current user")]
    NoHomeDirectory,

    #[error("Feed with uid \"{uid}\" could not be set up: {source}")]
    Feed {
        uid: String,
        #[source]
        source: StateError,
    },
}

/// Errors that can occur when fetching or parsing RSS feeds
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Failed to fetch feed from {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to read feed file {path}: {source}")]
    FileReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error parsing podcast RSS feed: {0}")]
    ParseFailed(#[from] rss::Error),
}

/// Reasons a feed item cannot become an episode
#[derive(Error, Debug, PartialEq, Eq)]
pub enum EpisodeError {
    #[error("Episode '{title}' has no enclosed url")]
    MissingEnclosure { title: String },

    #[error("Episode '{title}' has no publication date")]
    MissingDate { title: String },

    #[error("Episode '{title}' has invalid publication date '{date_str}'")]
    InvalidDate { title: String, date_str: String },
}

/// Errors that can occur during episode downloads
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP request failed for {url}: {source}")]
    HttpFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("The filename pattern renders to an empty name for the episode from \"{url}\"")]
    EmptyFilename { url: String },

    #[error("Unable to download the episode from \"{url}\", got response code {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to create file {path}: {source}")]
    FileCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write to file {path}: {source}")]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stream error while downloading {url}: {source}")]
    StreamFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Errors that can occur when preparing or scanning a feed's base path
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Base path for RSS feed is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Base path for RSS feed does not exist and could not be created: {path}: {source}")]
    CreateDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read directory {path}: {source}")]
    ReadDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level errors for feed update and download operations
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("State error: {0}")]
    State(#[from] StateError),
}
