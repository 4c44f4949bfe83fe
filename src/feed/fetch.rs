// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use bytes::Bytes;

use crate::error::FeedError;
use crate::http::HttpClient;

use super::parse::{FeedDocument, parse_feed};

/// Fetch raw feed bytes from a URL (without parsing)
pub async fn fetch_feed_bytes<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
) -> Result<Bytes, FeedError> {
    client
        .get_bytes(url)
        .await
        .map_err(|e| FeedError::FetchFailed {
            url: url.to_string(),
            source: e,
        })
}

/// Read raw feed bytes from a local file (without parsing)
pub async fn read_feed_file(path: &Path) -> Result<Vec<u8>, FeedError> {
    tokio::fs::read(path)
        .await
        .map_err(|e| FeedError::FileReadFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Fetch and parse a feed from a URL or a local file path
pub async fn fetch_feed<C: HttpClient + ?Sized>(
    client: &C,
    source: &str,
) -> Result<FeedDocument, FeedError> {
    if is_url(source) {
        let bytes = fetch_feed_bytes(client, source).await?;
        parse_feed(&bytes)
    } else {
        let bytes = read_feed_file(Path::new(source)).await?;
        parse_feed(&bytes)
    }
}

/// Determine if a string is a URL or a file path
pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}
