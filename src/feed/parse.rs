// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::error::FeedError;

/// Channel-level data of a fetched RSS feed
#[derive(Debug, Clone, Default)]
pub struct FeedDocument {
    pub title: String,
    pub description: String,
    /// Items in document order
    pub items: Vec<RawItem>,
}

/// A single `<item>` as it appears in the feed, before validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawItem {
    pub title: String,
    pub description: String,
    pub enclosure_url: Option<String>,
    pub pub_date: Option<String>,
}

/// Parse RSS feed XML bytes into a FeedDocument
pub fn parse_feed(xml_bytes: &[u8]) -> Result<FeedDocument, FeedError> {
    let channel = rss::Channel::read_from(xml_bytes)?;

    let items = channel.items().iter().map(raw_item).collect();

    Ok(FeedDocument {
        title: channel.title().to_string(),
        description: channel.description().to_string(),
        items,
    })
}

fn raw_item(item: &rss::Item) -> RawItem {
    RawItem {
        title: item.title().unwrap_or_default().to_string(),
        description: item.description().unwrap_or_default().to_string(),
        enclosure_url: item
            .enclosure()
            .map(|enclosure| enclosure.url().to_string())
            .filter(|url| !url.is_empty()),
        pub_date: item.pub_date().map(String::from),
    }
}
