mod fetch;
mod parse;

pub use fetch::{fetch_feed, is_url};
pub use parse::{FeedDocument, RawItem, parse_feed};
