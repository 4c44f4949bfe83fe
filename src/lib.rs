// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

pub mod config;
pub mod episode;
pub mod error;
pub mod feed;
pub mod filter;
pub mod http;
pub mod progress;
pub mod state;
pub mod sync;

// Re-export main types for convenience
pub use config::{
    CONFIG_FILE_NAME, FeedDefinition, FilterDefinition, default_config_path, load_config,
    load_config_with_home, parse_config,
};
pub use episode::{Episode, FeedInfo, extension_for_content_type, sanitize_filename};
pub use error::{ConfigError, DownloadError, EpisodeError, FeedError, StateError, SyncError};
pub use feed::{FeedDocument, RawItem, fetch_feed, is_url, parse_feed};
pub use filter::{Filter, FilterResult, FilterType, evaluate_chain, is_included};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use progress::{NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter};
pub use sync::{DEFAULT_FILENAME_PATTERN, Feed, SyncResult};
