// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;

/// Events emitted while updating feeds and downloading episodes
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Feed is being fetched from its source
    FetchingFeed { uid: String, uri: String },

    /// Feed has been fetched and its episode list rebuilt
    FeedUpdated {
        uid: String,
        feed_title: String,
        /// Number of items in the fetched document
        total_items: usize,
        /// Number of episodes kept after validation and filtering
        episodes: usize,
    },

    /// An episode was not downloaded because a file with its name exists
    EpisodeAlreadyPresent { episode_title: String },

    /// A download is starting
    DownloadStarting {
        episode_title: String,
        /// Index of this episode in the download queue
        episode_index: usize,
        /// Total number of episodes to download
        total_to_download: usize,
        /// Expected content length in bytes, if known
        content_length: Option<u64>,
    },

    /// Download progress update
    DownloadProgress {
        episode_title: String,
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
    },

    /// A download completed successfully
    DownloadCompleted {
        episode_title: String,
        filename: String,
        bytes_downloaded: u64,
    },

    /// A download failed; the batch continues with the next episode
    DownloadFailed {
        feed_title: String,
        episode_title: String,
        error: String,
    },

    /// Leftover partial files were removed from the base path
    PartialFilesCleanedUp { count: usize },

    /// All episodes of a feed have been processed
    SyncCompleted {
        feed_title: String,
        downloaded_count: usize,
        skipped_count: usize,
        failed_count: usize,
    },
}

/// Receiver of the events a feed emits while it updates and downloads
///
/// Feeds are processed one after another, so a reporter sees the events
/// of a single feed in order.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// Reporter that drops every event, used for quiet runs and the
/// `info`/`episodes` commands
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {}
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}
