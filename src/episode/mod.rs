mod download;
mod filename;
mod model;
mod template;

pub use download::{DownloadContext, DownloadResult, download_episode};
pub use filename::{
    MAX_FILENAME_LENGTH, MAX_STEM_LENGTH, PARTIAL_PREFIX, PARTIAL_SUFFIX,
    extension_for_content_type, filename_with_extension, is_partial_filename, partial_filename,
    sanitize_filename,
};
pub use model::{Episode, FeedInfo, parse_pub_date};
pub use template::fill_placeholders;
