// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// Maximum length of a filename stem in bytes, leaving room for an extension
pub const MAX_STEM_LENGTH: usize = 250;

/// Longest filename most filesystems accept, in bytes
pub const MAX_FILENAME_LENGTH: usize = 255;

/// Prefix of files that are still being written
pub const PARTIAL_PREFIX: &str = ".jpod-";

/// Suffix of files that are still being written
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Characters that are stripped from rendered filenames
const FORBIDDEN_CHARS: &[char] = &[
    '!', '#', '$', '^', '&', '=', '+', '*', '{', '}', ':', ';', '"', '\'', '<', '>', '?', '|', '/',
    '\\',
];

/// Remove characters that are problematic in filenames and limit the length
///
/// The result is a filename stem: it carries no extension and is at most
/// [`MAX_STEM_LENGTH`] bytes long.
pub fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .filter(|c| !FORBIDDEN_CHARS.contains(c))
        .collect();

    truncate_to_bytes(&cleaned, MAX_STEM_LENGTH).to_string()
}

/// Longest prefix of `s` that fits into `max_bytes` without splitting a character
fn truncate_to_bytes(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }

    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Name of the temporary file an episode is written to before it is renamed
/// to `filename`
///
/// The name is shortened as needed to stay within [`MAX_FILENAME_LENGTH`].
pub fn partial_filename(filename: &str) -> String {
    let budget = MAX_FILENAME_LENGTH - PARTIAL_PREFIX.len() - PARTIAL_SUFFIX.len();
    format!(
        "{PARTIAL_PREFIX}{}{PARTIAL_SUFFIX}",
        truncate_to_bytes(filename, budget)
    )
}

/// Whether a filename has the shape of a temporary download file
pub fn is_partial_filename(filename: &str) -> bool {
    filename.starts_with(PARTIAL_PREFIX) && filename.ends_with(PARTIAL_SUFFIX)
}

/// Map a response content type to a file extension
///
/// Parameters such as `; charset=...` are ignored. Unknown types get no
/// extension at all.
pub fn extension_for_content_type(content_type: Option<&str>) -> Option<&'static str> {
    let media_type = content_type?.split(';').next()?.trim();

    match media_type {
        "audio/mpeg" => Some("mp3"),
        "audio/mp4" => Some("mp4"),
        "audio/ogg" => Some("ogg"),
        "audio/wav" => Some("wav"),
        _ => None,
    }
}

/// Build the on-disk filename from a stem and an optional extension
pub fn filename_with_extension(stem: &str, extension: Option<&str>) -> String {
    match extension {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem.to_string(),
    }
}
