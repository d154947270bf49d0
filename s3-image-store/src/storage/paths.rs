// Key helpers map host file names and directories onto object keys.
//
// The key layout in the bucket is roughly as follows:
//
//	<bucket>
//	└── <path prefix>
//	    └── <yyyy>
//	        └── <mm>
//	            ├── <name>.<ext>
//	            ├── <name>-1.<ext>
//	            └── <name>-2.<ext>
//
// Keys are always slash-joined, relative, and never start with a separator.
// The year/month level is what the default target directory produces; an
// explicit target directory replaces it.

use std::fmt;

use chrono::{Datelike, Utc};

/// A normalized object key: slash-joined, relative, no leading separator.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StorageKey(String);

impl StorageKey {
    /// Builds a key from arbitrary path fragments.
    pub fn from_parts<'a>(parts: impl IntoIterator<Item = &'a str>) -> Self {
        StorageKey(join_key(parts))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Drops one leading `/`, if present.
pub fn strip_leading_slash(s: &str) -> &str {
    s.strip_prefix('/').unwrap_or(s)
}

/// Joins fragments with `/`, collapsing empty and `.` segments and resolving
/// `..` against the segments before it. The result never starts with `/`.
pub fn join_key<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for part in parts {
        for segment in part.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                s => segments.push(s),
            }
        }
    }
    segments.join("/")
}

/// Replaces every character outside `[A-Za-z0-9_@.]` with `-`.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '@' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// The key-safe base name of an upload. Names that sanitize to nothing but
/// dots would act as path segments, so they fall back to `image` like an
/// empty name does.
pub fn upload_base_name(file_name: &str) -> String {
    let name = sanitize_file_name(file_name);
    if name.chars().all(|c| c == '.') {
        "image".to_string()
    } else {
        name
    }
}

/// Normalizes a caller-supplied relative path so it can be appended under a
/// fixed base. Segments are sanitized like file names, empty and `.`
/// segments are dropped, and `..` only pops segments of `path` itself, never
/// anything above it.
pub fn confine_relative(path: &str) -> String {
    let mut segments: Vec<String> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => {
                let s = sanitize_file_name(s);
                if !s.chars().all(|c| c == '.') {
                    segments.push(s);
                }
            }
        }
    }
    segments.join("/")
}

/// Splits `cat.tar.jpg` into (`cat.tar`, `.jpg`). Dotfiles keep their name.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}

/// `cat.jpg` with suffix 2 becomes `cat-2.jpg`.
pub fn with_suffix(name: &str, suffix: u32) -> String {
    let (stem, ext) = split_extension(name);
    format!("{stem}-{suffix}{ext}")
}

/// The default target directory: `<prefix>/<yyyy>/<mm>` for today (UTC).
pub fn dated_target_dir(prefix: &str) -> String {
    let now = Utc::now();
    let year = now.year().to_string();
    let month = format!("{:02}", now.month());
    join_key([prefix, year.as_str(), month.as_str()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_leading_slash() {
        assert_eq!(strip_leading_slash("/images"), "images");
        assert_eq!(strip_leading_slash("images"), "images");
        assert_eq!(strip_leading_slash("//images"), "/images");
        assert_eq!(strip_leading_slash(""), "");
    }

    #[test]
    fn test_join_key() {
        assert_eq!(join_key(["images", "2024/01", "cat.jpg"]), "images/2024/01/cat.jpg");
        assert_eq!(join_key(["", "/2024//01/", "cat.jpg"]), "2024/01/cat.jpg");
        assert_eq!(join_key(["/images/", "./2024", "cat.jpg"]), "images/2024/cat.jpg");
        assert_eq!(join_key(["images/2024", "../2023", "cat.jpg"]), "images/2023/cat.jpg");
        assert_eq!(join_key(["..", "cat.jpg"]), "cat.jpg");
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("my cat (1).jpg"), "my-cat--1-.jpg");
        assert_eq!(sanitize_file_name("me@home_2.png"), "me@home_2.png");
        assert_eq!(sanitize_file_name("../evil.png"), "..-evil.png");
    }

    #[test]
    fn test_upload_base_name_never_yields_a_path_segment() {
        assert_eq!(upload_base_name("cat.png"), "cat.png");
        assert_eq!(upload_base_name(".."), "image");
        assert_eq!(upload_base_name("."), "image");
        assert_eq!(upload_base_name(""), "image");
        assert_eq!(upload_base_name("..png"), "..png");
    }

    #[test]
    fn test_confine_relative() {
        assert_eq!(confine_relative("2024/01"), "2024/01");
        assert_eq!(confine_relative("/2024//01/"), "2024/01");
        assert_eq!(confine_relative("../../other"), "other");
        assert_eq!(confine_relative("a/../../b"), "b");
        assert_eq!(confine_relative("a/b/.."), "a");
        assert_eq!(confine_relative(".."), "");
        assert_eq!(confine_relative("summer trip/day 1"), "summer-trip/day-1");
        assert_eq!(confine_relative("a/.../b"), "a/b");
        // prefix joined with a confined path never climbs out of the prefix
        assert_eq!(
            join_key(["images", confine_relative("../../secret").as_str()]),
            "images/secret"
        );
    }

    #[test]
    fn test_with_suffix() {
        assert_eq!(with_suffix("cat.jpg", 1), "cat-1.jpg");
        assert_eq!(with_suffix("archive.tar.gz", 3), "archive.tar-3.gz");
        assert_eq!(with_suffix("README", 2), "README-2");
        assert_eq!(with_suffix(".hidden", 1), ".hidden-1");
    }

    #[test]
    fn test_dated_target_dir() {
        let dir = dated_target_dir("/images");
        let parts: Vec<&str> = dir.split('/').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "images");
        assert_eq!(parts[1].len(), 4);
        assert_eq!(parts[2].len(), 2);

        let bare = dated_target_dir("");
        assert!(!bare.starts_with('/'));
        assert_eq!(bare.split('/').count(), 2);
    }

    #[test]
    fn test_storage_key_from_parts() {
        let key = StorageKey::from_parts(["/images", "2024/01", "cat.jpg"]);
        assert_eq!(key.as_str(), "images/2024/01/cat.jpg");
        assert_eq!(key.to_string(), "images/2024/01/cat.jpg");
    }
}
