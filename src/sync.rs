// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::episode::{
    DownloadContext, Episode, FeedInfo, download_episode, sanitize_filename,
};
use crate::error::{FeedError, StateError, SyncError};
use crate::feed::fetch_feed;
use crate::filter::{Filter, is_included};
use crate::http::HttpClient;
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::state::{prepare_base_path, scan_base_path};

/// Filename pattern used when a feed does not configure one
pub const DEFAULT_FILENAME_PATTERN: &str = "%Y-%m-%d_%T";

/// Result of downloading the episodes of a feed
#[derive(Debug, Clone, Default)]
pub struct SyncResult {
    /// Number of episodes successfully downloaded
    pub downloaded: usize,
    /// Number of episodes skipped (already present)
    pub skipped: usize,
    /// Number of episodes that failed to download
    pub failed: usize,
    /// Details of failed episodes (title, error message)
    pub failed_episodes: Vec<(String, String)>,
}

/// Data that only exists after a successful update
#[derive(Debug, Clone)]
struct FeedContents {
    info: Arc<FeedInfo>,
    episodes: Vec<Episode>,
}

/// A configured podcast feed
///
/// Nothing is fetched on construction. [`Feed::update`] loads the title,
/// description and the filtered episode list; [`Feed::download`] stores
/// every episode that is not yet present in the base path.
#[derive(Debug)]
pub struct Feed {
    uid: String,
    uri: String,
    base_path: PathBuf,
    filename_pattern: String,
    filters: Vec<Filter>,
    contents: Option<FeedContents>,
}

impl Feed {
    /// Create a feed, making sure its base path exists
    ///
    /// Fails if the base path is not a directory or cannot be created.
    pub fn new(
        uid: impl Into<String>,
        uri: impl Into<String>,
        base_path: impl Into<PathBuf>,
        filename_pattern: impl Into<String>,
        filters: Vec<Filter>,
    ) -> Result<Self, StateError> {
        let base_path = base_path.into();
        prepare_base_path(&base_path)?;

        Ok(Self {
            uid: uid.into(),
            uri: uri.into(),
            base_path,
            filename_pattern: filename_pattern.into(),
            filters,
            contents: None,
        })
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn filename_pattern(&self) -> &str {
        &self.filename_pattern
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Whether [`Feed::update`] has completed at least once
    pub fn is_updated(&self) -> bool {
        self.contents.is_some()
    }

    /// The feed's title
    ///
    /// # Panics
    ///
    /// Panics if the feed has not been updated.
    pub fn title(&self) -> &str {
        &self.updated_contents("title").info.title
    }

    /// The feed's description
    ///
    /// # Panics
    ///
    /// Panics if the feed has not been updated.
    pub fn description(&self) -> &str {
        &self.updated_contents("description").info.description
    }

    /// Episodes of the most recent update that passed the filter chain
    ///
    /// # Panics
    ///
    /// Panics if the feed has not been updated.
    pub fn episodes(&self) -> &[Episode] {
        &self.updated_contents("episode list").episodes
    }

    fn updated_contents(&self, what: &str) -> &FeedContents {
        match &self.contents {
            Some(contents) => contents,
            None => panic!(
                "feed \"{}\" must be updated before its {what} is available",
                self.uid
            ),
        }
    }

    /// Fetch the feed and rebuild the episode list
    ///
    /// Items without an enclosure or with an unparsable date are skipped.
    /// The remaining episodes run through the filter chain in order and
    /// are kept unless a filter excludes them. If fetching fails nothing
    /// about the feed changes.
    pub async fn update<C: HttpClient + ?Sized>(
        &mut self,
        client: &C,
        reporter: &SharedProgressReporter,
    ) -> Result<(), FeedError> {
        reporter.report(ProgressEvent::FetchingFeed {
            uid: self.uid.clone(),
            uri: self.uri.clone(),
        });

        let document = fetch_feed(client, &self.uri).await?;
        let total_items = document.items.len();

        let info = Arc::new(FeedInfo {
            title: document.title,
            description: document.description,
        });

        let mut episodes = Vec::new();
        for item in &document.items {
            let episode = match Episode::from_item(info.clone(), item) {
                Ok(episode) => episode,
                Err(e) => {
                    tracing::debug!(feed = %self.uid, error = %e, "Ignoring feed item");
                    continue;
                }
            };

            if is_included(&self.filters, &episode) {
                episodes.push(episode);
            } else {
                tracing::debug!(feed = %self.uid, episode = %episode.title(), "Episode filtered out");
            }
        }

        reporter.report(ProgressEvent::FeedUpdated {
            uid: self.uid.clone(),
            feed_title: info.title.clone(),
            total_items,
            episodes: episodes.len(),
        });

        self.contents = Some(FeedContents { info, episodes });
        Ok(())
    }

    /// Canonical filename stem of an episode of this feed
    pub fn episode_stem(&self, episode: &Episode) -> String {
        sanitize_filename(&episode.fill_placeholders(&self.filename_pattern))
    }

    /// Download every episode that is not yet present in the base path
    ///
    /// An episode counts as present when any regular file in the base path
    /// has its filename stem as name without extension. Failed downloads
    /// are reported and do not stop the remaining episodes.
    ///
    /// # Panics
    ///
    /// Panics if the feed has not been updated.
    pub async fn download<C: HttpClient + ?Sized>(
        &self,
        client: &C,
        reporter: &SharedProgressReporter,
    ) -> Result<SyncResult, StateError> {
        let contents = self.updated_contents("episode list");
        let feed_title = contents.info.title.as_str();

        let mut existing = scan_base_path(&self.base_path)?;
        if existing.partial_files_cleaned > 0 {
            reporter.report(ProgressEvent::PartialFilesCleanedUp {
                count: existing.partial_files_cleaned,
            });
        }

        let mut result = SyncResult::default();
        let mut pending = Vec::new();

        for episode in &contents.episodes {
            let stem = self.episode_stem(episode);
            if existing.contains(&stem) {
                tracing::debug!(feed = %self.uid, file = %stem, "Episode already present");
                reporter.report(ProgressEvent::EpisodeAlreadyPresent {
                    episode_title: episode.title().to_string(),
                });
                result.skipped += 1;
            } else {
                pending.push((episode, stem));
            }
        }

        let total_to_download = pending.len();

        for (episode_index, (episode, stem)) in pending.into_iter().enumerate() {
            // Two episodes of one batch may render to the same name
            if existing.contains(&stem) {
                reporter.report(ProgressEvent::EpisodeAlreadyPresent {
                    episode_title: episode.title().to_string(),
                });
                result.skipped += 1;
                continue;
            }

            let context = DownloadContext {
                episode_index,
                total_to_download,
            };

            match download_episode(client, episode, &self.base_path, &stem, &context, reporter)
                .await
            {
                Ok(_) => {
                    existing.insert(stem);
                    result.downloaded += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        feed = %feed_title,
                        episode = %episode.title(),
                        error = %e,
                        "Episode could not be downloaded"
                    );
                    reporter.report(ProgressEvent::DownloadFailed {
                        feed_title: feed_title.to_string(),
                        episode_title: episode.title().to_string(),
                        error: e.to_string(),
                    });
                    result.failed += 1;
                    result
                        .failed_episodes
                        .push((episode.title().to_string(), e.to_string()));
                }
            }
        }

        reporter.report(ProgressEvent::SyncCompleted {
            feed_title: feed_title.to_string(),
            downloaded_count: result.downloaded,
            skipped_count: result.skipped,
            failed_count: result.failed,
        });

        Ok(result)
    }

    /// Update the feed, then download its new episodes
    pub async fn sync<C: HttpClient + ?Sized>(
        &mut self,
        client: &C,
        reporter: &SharedProgressReporter,
    ) -> Result<SyncResult, SyncError> {
        self.update(client, reporter).await?;
        Ok(self.download(client, reporter).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::filter::FilterType;
    use crate::http::testing::MockHttpClient;
    use crate::progress::NoopReporter;
    use crate::progress::testing::RecordingReporter;
    use tempfile::{TempDir, tempdir};

    const FEED_URL: &str = "https://example.com/feed.xml";

    const SAMPLE_FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Show</title>
    <description>A test podcast</description>
    <item>
      <title>Episode 1</title>
      <pubDate>Mon, 01 Jan 2024 10:00:00 +0000</pubDate>
      <enclosure url="https://example.com/ep1.mp3" type="audio/mpeg"/>
    </item>
    <item>
      <title>Bonus Content</title>
      <pubDate>Tue, 02 Jan 2024 10:00:00 +0000</pubDate>
      <enclosure url="https://example.com/bonus.mp3" type="audio/mpeg"/>
    </item>
    <item>
      <title>Text only</title>
      <pubDate>Wed, 03 Jan 2024 10:00:00 +0000</pubDate>
    </item>
    <item>
      <title>Bad date</title>
      <pubDate>sometime</pubDate>
      <enclosure url="https://example.com/bad.mp3" type="audio/mpeg"/>
    </item>
    <item>
      <title>Episode 5</title>
      <pubDate>Fri, 05 Jan 2024 10:00:00 +0000</pubDate>
      <enclosure url="https://example.com/ep5.mp3" type="audio/mpeg"/>
    </item>
  </channel>
</rss>"#;

    fn client() -> MockHttpClient {
        MockHttpClient::new()
            .with_feed(FEED_URL, SAMPLE_FEED)
            .with_audio("https://example.com/ep1.mp3", b"episode one")
            .with_audio("https://example.com/bonus.mp3", b"bonus")
            .with_audio("https://example.com/ep5.mp3", b"episode five")
    }

    fn make_feed(dir: &TempDir, filters: Vec<Filter>) -> Feed {
        Feed::new(
            "show",
            FEED_URL,
            dir.path().join("show"),
            DEFAULT_FILENAME_PATTERN,
            filters,
        )
        .unwrap()
    }

    fn titles(feed: &Feed) -> Vec<&str> {
        feed.episodes().iter().map(|e| e.title()).collect()
    }

    fn files_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn new_creates_base_path() {
        let dir = tempdir().unwrap();
        let feed = make_feed(&dir, vec![]);

        assert!(feed.base_path().is_dir());
        assert!(!feed.is_updated());
        assert_eq!(feed.uid(), "show");
        assert_eq!(feed.uri(), FEED_URL);
        assert_eq!(feed.filename_pattern(), DEFAULT_FILENAME_PATTERN);
    }

    #[test]
    fn new_rejects_file_as_base_path() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("file");
        std::fs::write(&file, b"x").unwrap();

        let result = Feed::new("show", FEED_URL, &file, DEFAULT_FILENAME_PATTERN, vec![]);

        assert!(matches!(result, Err(StateError::NotADirectory(_))));
    }

    #[test]
    #[should_panic(expected = "must be updated before its title is available")]
    fn title_before_update_panics() {
        let dir = tempdir().unwrap();
        make_feed(&dir, vec![]).title();
    }

    #[test]
    #[should_panic(expected = "must be updated before its episode list is available")]
    fn episodes_before_update_panics() {
        let dir = tempdir().unwrap();
        make_feed(&dir, vec![]).episodes();
    }

    #[tokio::test]
    #[should_panic(expected = "must be updated")]
    async fn download_before_update_panics() {
        let dir = tempdir().unwrap();
        let feed = make_feed(&dir, vec![]);
        let _ = feed.download(&client(), &NoopReporter::shared()).await;
    }

    #[tokio::test]
    async fn update_skips_invalid_items_and_keeps_order() {
        let dir = tempdir().unwrap();
        let mut feed = make_feed(&dir, vec![]);

        feed.update(&client(), &NoopReporter::shared()).await.unwrap();

        assert!(feed.is_updated());
        assert_eq!(feed.title(), "Show");
        assert_eq!(feed.description(), "A test podcast");
        assert_eq!(titles(&feed), ["Episode 1", "Bonus Content", "Episode 5"]);
    }

    #[tokio::test]
    async fn update_applies_filters() {
        let dir = tempdir().unwrap();
        let filters =
            vec![Filter::new(FilterType::ExcludeIfMatch, "^Bonus.*$", "%T").unwrap()];
        let mut feed = make_feed(&dir, filters);

        feed.update(&client(), &NoopReporter::shared()).await.unwrap();

        assert_eq!(titles(&feed), ["Episode 1", "Episode 5"]);
    }

    #[tokio::test]
    async fn update_replaces_previous_episodes() {
        let dir = tempdir().unwrap();
        let mut feed = make_feed(&dir, vec![]);
        feed.update(&client(), &NoopReporter::shared()).await.unwrap();

        let smaller = r#"<rss version="2.0"><channel><title>Renamed</title><description>d</description>
            <item><title>Only</title><pubDate>Mon, 08 Jan 2024 10:00:00 +0000</pubDate>
            <enclosure url="https://example.com/only.mp3" type="audio/mpeg"/></item>
            </channel></rss>"#;
        let client = MockHttpClient::new().with_feed(FEED_URL, smaller);
        feed.update(&client, &NoopReporter::shared()).await.unwrap();

        assert_eq!(feed.title(), "Renamed");
        assert_eq!(titles(&feed), ["Only"]);
    }

    #[tokio::test]
    async fn failed_update_leaves_feed_untouched() {
        let dir = tempdir().unwrap();
        let mut feed = make_feed(&dir, vec![]);
        feed.update(&client(), &NoopReporter::shared()).await.unwrap();

        let broken = MockHttpClient::new();
        let result = feed.update(&broken, &NoopReporter::shared()).await;

        assert!(matches!(result, Err(FeedError::FetchFailed { .. })));
        assert_eq!(feed.title(), "Show");
        assert_eq!(feed.episodes().len(), 3);
    }

    #[tokio::test]
    async fn failed_first_update_keeps_feed_not_updated() {
        let dir = tempdir().unwrap();
        let mut feed = make_feed(&dir, vec![]);

        let result = feed
            .update(&MockHttpClient::new(), &NoopReporter::shared())
            .await;

        assert!(result.is_err());
        assert!(!feed.is_updated());
    }

    #[tokio::test]
    async fn update_reports_item_counts() {
        let dir = tempdir().unwrap();
        let mut feed = make_feed(&dir, vec![]);
        let recorder = RecordingReporter::shared();
        let reporter: SharedProgressReporter = recorder.clone();

        feed.update(&client(), &reporter).await.unwrap();

        let updated = recorder.events().into_iter().find_map(|event| match event {
            ProgressEvent::FeedUpdated {
                total_items,
                episodes,
                ..
            } => Some((total_items, episodes)),
            _ => None,
        });
        assert_eq!(updated, Some((5, 3)));
    }

    #[tokio::test]
    async fn download_writes_all_episodes() {
        let dir = tempdir().unwrap();
        let mut feed = make_feed(&dir, vec![]);
        let client = client();

        let result = feed.sync(&client, &NoopReporter::shared()).await.unwrap();

        assert_eq!(result.downloaded, 3);
        assert_eq!(result.skipped, 0);
        assert_eq!(result.failed, 0);
        assert_eq!(
            files_in(feed.base_path()),
            [
                "2024-01-01_Episode 1.mp3",
                "2024-01-02_Bonus Content.mp3",
                "2024-01-05_Episode 5.mp3",
            ]
        );
        assert_eq!(
            std::fs::read(feed.base_path().join("2024-01-05_Episode 5.mp3")).unwrap(),
            b"episode five"
        );
    }

    #[tokio::test]
    async fn second_download_writes_nothing() {
        let dir = tempdir().unwrap();
        let mut feed = make_feed(&dir, vec![]);
        let client = client();
        feed.sync(&client, &NoopReporter::shared()).await.unwrap();
        let requests_after_first = client.requests().len();

        let result = feed.download(&client, &NoopReporter::shared()).await.unwrap();

        assert_eq!(result.downloaded, 0);
        assert_eq!(result.skipped, 3);
        assert_eq!(client.requests().len(), requests_after_first);
    }

    #[tokio::test]
    async fn existing_file_blocks_download_regardless_of_extension() {
        let dir = tempdir().unwrap();
        let mut feed = make_feed(&dir, vec![]);
        std::fs::write(feed.base_path().join("2024-01-01_Episode 1.txt"), b"").unwrap();
        let client = client();

        let result = feed.sync(&client, &NoopReporter::shared()).await.unwrap();

        assert_eq!(result.downloaded, 2);
        assert_eq!(result.skipped, 1);
        assert!(!client.requests().contains(&"https://example.com/ep1.mp3".to_string()));
        assert!(!feed.base_path().join("2024-01-01_Episode 1.mp3").exists());
    }

    #[tokio::test]
    async fn download_failures_do_not_stop_the_batch() {
        let dir = tempdir().unwrap();
        let mut feed = make_feed(&dir, vec![]);
        let client = MockHttpClient::new()
            .with_feed(FEED_URL, SAMPLE_FEED)
            .with_response("https://example.com/ep1.mp3", 500, None, b"oops")
            .with_audio("https://example.com/ep5.mp3", b"episode five");
        let recorder = RecordingReporter::shared();
        let reporter: SharedProgressReporter = recorder.clone();

        let result = feed.sync(&client, &reporter).await.unwrap();

        assert_eq!(result.downloaded, 1);
        assert_eq!(result.failed, 2);
        let failed_titles: Vec<_> = result.failed_episodes.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(failed_titles, ["Episode 1", "Bonus Content"]);
        assert_eq!(files_in(feed.base_path()), ["2024-01-05_Episode 5.mp3"]);

        let failure_feeds: Vec<_> = recorder
            .events()
            .into_iter()
            .filter_map(|event| match event {
                ProgressEvent::DownloadFailed { feed_title, .. } => Some(feed_title),
                _ => None,
            })
            .collect();
        assert_eq!(failure_feeds, ["Show", "Show"]);
    }

    #[tokio::test]
    async fn failed_episodes_are_retried_next_time() {
        let dir = tempdir().unwrap();
        let mut feed = make_feed(&dir, vec![]);
        let failing = MockHttpClient::new()
            .with_feed(FEED_URL, SAMPLE_FEED)
            .with_response("https://example.com/ep1.mp3", 503, None, b"")
            .with_audio("https://example.com/bonus.mp3", b"bonus")
            .with_audio("https://example.com/ep5.mp3", b"episode five");
        feed.sync(&failing, &NoopReporter::shared()).await.unwrap();

        let result = feed.sync(&client(), &NoopReporter::shared()).await.unwrap();

        assert_eq!(result.downloaded, 1);
        assert_eq!(result.skipped, 2);
    }

    #[tokio::test]
    async fn colliding_filenames_download_once() {
        let dir = tempdir().unwrap();
        let mut feed = Feed::new(
            "show",
            FEED_URL,
            dir.path().join("show"),
            "%P",
            vec![],
        )
        .unwrap();
        let client = client();

        let result = feed.sync(&client, &NoopReporter::shared()).await.unwrap();

        assert_eq!(result.downloaded, 1);
        assert_eq!(result.skipped, 2);
        assert_eq!(files_in(feed.base_path()), ["Show.mp3"]);
    }

    #[tokio::test]
    async fn episode_stem_renders_and_sanitizes() {
        let dir = tempdir().unwrap();
        let mut feed = Feed::new(
            "show",
            FEED_URL,
            dir.path().join("show"),
            "%P/%T: %Y?",
            vec![],
        )
        .unwrap();
        feed.update(&client(), &NoopReporter::shared()).await.unwrap();

        let stem = feed.episode_stem(&feed.episodes()[0]);

        assert_eq!(stem, "ShowEpisode 1 2024");
    }

    #[tokio::test]
    async fn download_fails_when_base_path_vanished() {
        let dir = tempdir().unwrap();
        let mut feed = make_feed(&dir, vec![]);
        feed.update(&client(), &NoopReporter::shared()).await.unwrap();
        std::fs::remove_dir(feed.base_path()).unwrap();

        let result = feed.download(&client(), &NoopReporter::shared()).await;

        assert!(matches!(result, Err(StateError::ReadDirectoryFailed { .. })));
    }

    fn single_item_feed(title: &str) -> String {
        format!(
            r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Show</title>
    <description>A test podcast</description>
    <item>
      <title>{title}</title>
      <pubDate>Mon, 01 Jan 2024 10:00:00 +0000</pubDate>
      <enclosure url="https://example.com/long.mp3" type="audio/mpeg"/>
    </item>
  </channel>
</rss>"#
        )
    }

    async fn sync_single_item(dir: &TempDir, title: &str) -> (Feed, SyncResult, MockHttpClient) {
        let client = MockHttpClient::new()
            .with_feed(FEED_URL, &single_item_feed(title))
            .with_audio("https://example.com/long.mp3", b"long audio");
        let mut feed = Feed::new("show", FEED_URL, dir.path().join("show"), "%T", vec![]).unwrap();

        let result = feed.sync(&client, &NoopReporter::shared()).await.unwrap();
        (feed, result, client)
    }

    #[tokio::test]
    async fn long_titles_are_downloaded_under_a_truncated_name() {
        let dir = tempdir().unwrap();

        let (feed, result, _) = sync_single_item(&dir, &"a".repeat(300)).await;

        assert_eq!(result.downloaded, 1);
        assert_eq!(result.failed, 0);
        let expected = format!("{}.mp3", "a".repeat(250));
        assert_eq!(files_in(feed.base_path()), [expected.clone()]);
        assert_eq!(
            std::fs::read(feed.base_path().join(expected)).unwrap(),
            b"long audio"
        );
    }

    #[tokio::test]
    async fn long_multibyte_titles_are_downloaded() {
        let dir = tempdir().unwrap();

        let (feed, result, _) = sync_single_item(&dir, &"é".repeat(300)).await;

        assert_eq!(result.downloaded, 1);
        assert_eq!(files_in(feed.base_path()), [format!("{}.mp3", "é".repeat(125))]);
    }

    #[tokio::test]
    async fn long_titles_are_not_downloaded_twice() {
        let dir = tempdir().unwrap();
        let (mut feed, _, client) = sync_single_item(&dir, &"a".repeat(300)).await;

        let result = feed.sync(&client, &NoopReporter::shared()).await.unwrap();

        assert_eq!(result.downloaded, 0);
        assert_eq!(result.skipped, 1);
    }

    #[tokio::test]
    async fn empty_filenames_are_reported_as_failures() {
        let dir = tempdir().unwrap();

        let (feed, result, client) = sync_single_item(&dir, "???").await;

        assert_eq!(result.downloaded, 0);
        assert_eq!(result.failed, 1);
        assert_eq!(result.failed_episodes[0].0, "???");
        assert!(files_in(feed.base_path()).is_empty());
        assert_eq!(client.requests(), [FEED_URL]);
    }
}
