// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::error::DownloadError;
use crate::http::{ByteStream, HttpClient};
use crate::progress::{ProgressEvent, SharedProgressReporter};

use super::filename::{extension_for_content_type, filename_with_extension, partial_filename};
use super::model::Episode;

/// Position of a download within the current batch
#[derive(Debug, Clone)]
pub struct DownloadContext {
    /// Index of this episode in the download queue
    pub episode_index: usize,
    /// Total number of episodes to download
    pub total_to_download: usize,
}

/// Outcome of a successful episode download
#[derive(Debug, Clone)]
pub struct DownloadResult {
    /// Final location of the episode file
    pub path: PathBuf,
    /// Number of bytes written
    pub bytes_downloaded: u64,
}

/// Download an episode into `base_path` under the given filename stem
///
/// The extension is chosen from the response's content type. The body is
/// streamed into a temporary file (see [`partial_filename`]) which is
/// renamed into place once the download is complete, so an interrupted
/// download never leaves a file that looks finished. An empty stem is
/// rejected before anything is requested.
pub async fn download_episode<C: HttpClient + ?Sized>(
    client: &C,
    episode: &Episode,
    base_path: &Path,
    stem: &str,
    context: &DownloadContext,
    reporter: &SharedProgressReporter,
) -> Result<DownloadResult, DownloadError> {
    let url = episode.uri();

    if stem.is_empty() {
        return Err(DownloadError::EmptyFilename {
            url: url.to_string(),
        });
    }

    let response = client
        .get_stream(url)
        .await
        .map_err(|e| DownloadError::HttpFailed {
            url: url.to_string(),
            source: e,
        })?;

    if response.status != 200 {
        return Err(DownloadError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    let extension = extension_for_content_type(response.content_type.as_deref());
    let filename = filename_with_extension(stem, extension);
    let output_path = base_path.join(&filename);
    let partial_path = base_path.join(partial_filename(&filename));

    reporter.report(ProgressEvent::DownloadStarting {
        episode_title: episode.title().to_string(),
        episode_index: context.episode_index,
        total_to_download: context.total_to_download,
        content_length: response.content_length,
    });

    let written = stream_to_file(
        response.body,
        response.content_length,
        &partial_path,
        episode,
        reporter,
    )
    .await;

    let bytes_downloaded = match written {
        Ok(bytes) => bytes,
        Err(e) => {
            let _ = tokio::fs::remove_file(&partial_path).await;
            return Err(e);
        }
    };

    if let Err(e) = tokio::fs::rename(&partial_path, &output_path).await {
        let _ = tokio::fs::remove_file(&partial_path).await;
        return Err(DownloadError::FileWriteFailed {
            path: output_path,
            source: e,
        });
    }

    reporter.report(ProgressEvent::DownloadCompleted {
        episode_title: episode.title().to_string(),
        filename,
        bytes_downloaded,
    });

    Ok(DownloadResult {
        path: output_path,
        bytes_downloaded,
    })
}

async fn stream_to_file(
    mut stream: ByteStream,
    content_length: Option<u64>,
    path: &Path,
    episode: &Episode,
    reporter: &SharedProgressReporter,
) -> Result<u64, DownloadError> {
    let mut file = File::create(path)
        .await
        .map_err(|e| DownloadError::FileCreateFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    let mut bytes_downloaded: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::StreamFailed {
            url: episode.uri().to_string(),
            source: e,
        })?;

        file.write_all(&chunk)
            .await
            .map_err(|e| DownloadError::FileWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

        bytes_downloaded += chunk.len() as u64;

        reporter.report(ProgressEvent::DownloadProgress {
            episode_title: episode.title().to_string(),
            bytes_downloaded,
            total_bytes: content_length,
        });
    }

    // Ensure all data is flushed to disk
    file.flush()
        .await
        .map_err(|e| DownloadError::FileWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    Ok(bytes_downloaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::episode::FeedInfo;
    use crate::http::testing::MockHttpClient;
    use crate::progress::NoopReporter;
    use chrono::NaiveDate;
    use std::sync::Arc;
    use tempfile::tempdir;

    const EPISODE_URL: &str = "https://example.com/episode.mp3";

    fn make_episode() -> Episode {
        let pub_date = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        Episode::new(
            Arc::new(FeedInfo::default()),
            "Test Episode",
            "",
            EPISODE_URL,
            pub_date,
        )
    }

    fn context() -> DownloadContext {
        DownloadContext {
            episode_index: 0,
            total_to_download: 1,
        }
    }

    #[tokio::test]
    async fn download_writes_file_with_extension_from_content_type() {
        let dir = tempdir().unwrap();
        let client = MockHttpClient::new().with_audio(EPISODE_URL, b"test audio content");

        let result = download_episode(
            &client,
            &make_episode(),
            dir.path(),
            "episode",
            &context(),
            &NoopReporter::shared(),
        )
        .await
        .unwrap();

        assert_eq!(result.bytes_downloaded, 18);
        assert_eq!(result.path, dir.path().join("episode.mp3"));

        let content = std::fs::read(&result.path).unwrap();
        assert_eq!(content, b"test audio content");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn download_rejects_empty_stem_without_requesting() {
        let dir = tempdir().unwrap();
        let client = MockHttpClient::new().with_audio(EPISODE_URL, b"audio");

        let result = download_episode(
            &client,
            &make_episode(),
            dir.path(),
            "",
            &context(),
            &NoopReporter::shared(),
        )
        .await;

        assert!(matches!(result, Err(DownloadError::EmptyFilename { .. })));
        assert!(client.requests().is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn download_without_known_content_type_has_no_extension() {
        let dir = tempdir().unwrap();
        let client = MockHttpClient::new().with_response(
            EPISODE_URL,
            200,
            Some("application/octet-stream"),
            b"data",
        );

        let result = download_episode(
            &client,
            &make_episode(),
            dir.path(),
            "episode",
            &context(),
            &NoopReporter::shared(),
        )
        .await
        .unwrap();

        assert_eq!(result.path, dir.path().join("episode"));
    }

    #[tokio::test]
    async fn download_fails_on_http_error() {
        let dir = tempdir().unwrap();
        let client =
            MockHttpClient::new().with_response(EPISODE_URL, 404, Some("text/html"), b"Not Found");

        let result = download_episode(
            &client,
            &make_episode(),
            dir.path(),
            "episode",
            &context(),
            &NoopReporter::shared(),
        )
        .await;

        match result.unwrap_err() {
            DownloadError::HttpStatus { status, .. } => assert_eq!(status, 404),
            other => panic!("Expected HttpStatus error, got {other:?}"),
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn download_rejects_non_200_success_codes() {
        let dir = tempdir().unwrap();
        let client = MockHttpClient::new().with_response(EPISODE_URL, 204, None, b"");

        let result = download_episode(
            &client,
            &make_episode(),
            dir.path(),
            "episode",
            &context(),
            &NoopReporter::shared(),
        )
        .await;

        assert!(matches!(
            result,
            Err(DownloadError::HttpStatus { status: 204, .. })
        ));
    }

    #[tokio::test]
    async fn download_fails_on_transport_error() {
        let dir = tempdir().unwrap();
        let client = MockHttpClient::new();

        let result = download_episode(
            &client,
            &make_episode(),
            dir.path(),
            "episode",
            &context(),
            &NoopReporter::shared(),
        )
        .await;

        assert!(matches!(result, Err(DownloadError::HttpFailed { .. })));
    }

    #[tokio::test]
    async fn download_fails_when_directory_is_missing() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("gone");
        let client = MockHttpClient::new().with_audio(EPISODE_URL, b"audio");

        let result = download_episode(
            &client,
            &make_episode(),
            &missing,
            "episode",
            &context(),
            &NoopReporter::shared(),
        )
        .await;

        assert!(matches!(
            result,
            Err(DownloadError::FileCreateFailed { .. })
        ));
    }
}
