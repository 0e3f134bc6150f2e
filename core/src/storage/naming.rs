use std::collections::HashSet;

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::storage::gateway::FileSystem;
use crate::storage::paths::truncate_to_fit;
use crate::storage::{Result, LETTER_SUFFIX_ATTEMPTS};

// "Recording <N>" with an optional extension, any case.
static RECORDING_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^recording (\d+)(?:\.[^.\s]+)?$").expect("static regex"));

/// Splits a file name into stem and extension at the last `.`.
///
/// A leading dot does not start an extension, so `".hidden"` has none.
pub fn split_file_name(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(index) if index > 0 && index + 1 < name.len() => (&name[..index], Some(&name[index + 1..])),
        _ => (name, None),
    }
}

fn compose(stem: &str, extension: &str) -> String {
    if extension.is_empty() {
        stem.to_string()
    } else {
        format!("{stem}.{extension}")
    }
}

/// Picks the name for a new recording: `"Recording <k>.m4a"` where `k` is the
/// smallest positive number not already used by a `Recording <N>` entry.
///
/// Gaps are filled, so `{1, 2, 4}` yields 3. Matching ignores case and any
/// extension; other names are ignored.
pub fn generate_intelligent_recording_name<S: AsRef<str>>(existing_names: &[S]) -> String {
    let taken: HashSet<u64> = existing_names
        .iter()
        .filter_map(|name| RECORDING_NAME.captures(name.as_ref()))
        .filter_map(|captures| captures[1].parse::<u64>().ok())
        .filter(|&number| number > 0)
        .collect();

    let mut next = 1;
    while taken.contains(&next) {
        next += 1;
    }
    format!("Recording {next}.m4a")
}

/// Returns `"<base>.<ext>"` if free, otherwise the first free
/// `"<base> (<c>).<ext>"` for `c = 1, 2, …`.
pub fn generate_unique_file_name<S: AsRef<str>>(base_name: &str, extension: &str, existing_names: &[S]) -> String {
    let existing: HashSet<&str> = existing_names.iter().map(AsRef::as_ref).collect();

    let candidate = compose(base_name, extension);
    if !existing.contains(candidate.as_str()) {
        return candidate;
    }

    let mut counter = 1usize;
    loop {
        let candidate = compose(&format!("{base_name} ({counter})"), extension);
        if !existing.contains(candidate.as_str()) {
            return candidate;
        }
        counter += 1;
    }
}

/// Bijective base-26 letters: 0 → `a`, 25 → `z`, 26 → `aa`, 701 → `zz`, 702 → `aaa`.
pub fn generate_letter_suffix(index: usize) -> String {
    let mut letters = Vec::new();
    let mut remaining = index + 1;
    while remaining > 0 {
        remaining -= 1;
        letters.push(b'a' + (remaining % 26) as u8);
        remaining /= 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Finds a name that does not exist yet in `directory` by appending letter
/// suffixes to `base_name`: `<base>a.<ext>`, `<base>b.<ext>`, …
///
/// Gives up after [`LETTER_SUFFIX_ATTEMPTS`] candidates and returns
/// `<base>_<unix millis>.<ext>` instead. An empty `extension` means no dot.
/// A long `base_name` is shortened so every candidate stays within the name
/// limits.
pub async fn find_unique_file_name(
    fs: &dyn FileSystem,
    directory: &str,
    base_name: &str,
    extension: &str,
) -> Result<String> {
    let directory = directory.trim_end_matches('/');
    for index in 0..LETTER_SUFFIX_ATTEMPTS {
        let tail = compose(&generate_letter_suffix(index), extension);
        let candidate = format!("{}{tail}", truncate_to_fit(base_name, &tail));
        if !fs.stat(&format!("{directory}/{candidate}")).await?.exists {
            debug!("Resolved name collision with {}", candidate);
            return Ok(candidate);
        }
    }

    let tail = compose(&format!("_{}", Utc::now().timestamp_millis()), extension);
    let fallback = format!("{}{tail}", truncate_to_fit(base_name, &tail));
    warn!(
        "No free letter suffix for '{}' in {} after {} attempts, using {}",
        base_name, directory, LETTER_SUFFIX_ATTEMPTS, fallback
    );
    Ok(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryFileSystem;

    #[test]
    fn test_split_file_name() {
        assert_eq!(split_file_name("a.m4a"), ("a", Some("m4a")));
        assert_eq!(split_file_name("take.final.mp3"), ("take.final", Some("mp3")));
        assert_eq!(split_file_name("noext"), ("noext", None));
        assert_eq!(split_file_name(".hidden"), (".hidden", None));
        assert_eq!(split_file_name("trailing."), ("trailing.", None));
    }

    #[test]
    fn test_intelligent_name_empty_input() {
        assert_eq!(generate_intelligent_recording_name::<&str>(&[]), "Recording 1.m4a");
    }

    #[test]
    fn test_intelligent_name_fills_first_gap() {
        let names = [
            "Recording 1.m4a",
            "Recording 3.m4a",
            "Recording 5.m4a",
            "Recording 7.m4a",
            "Recording 10.m4a",
        ];
        assert_eq!(generate_intelligent_recording_name(&names), "Recording 2.m4a");
        assert_eq!(
            generate_intelligent_recording_name(&["Recording 1.m4a", "Recording 2.m4a", "Recording 4.m4a"]),
            "Recording 3.m4a"
        );
    }

    #[test]
    fn test_intelligent_name_matching_rules() {
        let names = [
            "recording 1.M4A", // case variants count
            "RECORDING 2",     // extension optional
            "Recording3.m4a",  // no space
            "Recording .m4a",  // no number
            "My Recording 4.m4a",
            "Recording 0.m4a",
            "Recording 5 copy.m4a",
        ];
        assert_eq!(generate_intelligent_recording_name(&names), "Recording 3.m4a");
    }

    #[test]
    fn test_intelligent_name_large_listing() {
        let names: Vec<String> = (1..=5000).filter(|n| *n != 4321).map(|n| format!("Recording {n}.m4a")).collect();
        assert_eq!(generate_intelligent_recording_name(&names[..]), "Recording 4321.m4a");

        let full: Vec<String> = (1..=3000).map(|n| format!("Recording {n}.wav")).collect();
        assert_eq!(generate_intelligent_recording_name(&full[..]), "Recording 3001.m4a");
    }

    #[test]
    fn test_unique_file_name() {
        assert_eq!(generate_unique_file_name::<&str>("file", "txt", &[]), "file.txt");
        assert_eq!(generate_unique_file_name("file", "txt", &["file.txt", "file (1).txt"]), "file (2).txt");
        assert_eq!(generate_unique_file_name("file", "txt", &["file.txt", "file (2).txt"]), "file (1).txt");
        assert_eq!(generate_unique_file_name("notes", "", &["notes"]), "notes (1)");
    }

    #[test]
    fn test_letter_suffix_sequence() {
        assert_eq!(generate_letter_suffix(0), "a");
        assert_eq!(generate_letter_suffix(1), "b");
        assert_eq!(generate_letter_suffix(25), "z");
        assert_eq!(generate_letter_suffix(26), "aa");
        assert_eq!(generate_letter_suffix(27), "ab");
        assert_eq!(generate_letter_suffix(51), "az");
        assert_eq!(generate_letter_suffix(52), "ba");
        assert_eq!(generate_letter_suffix(701), "zz");
        assert_eq!(generate_letter_suffix(702), "aaa");
    }

    #[test]
    fn test_letter_suffixes_are_distinct() {
        let suffixes: HashSet<String> = (0..2000).map(generate_letter_suffix).collect();
        assert_eq!(suffixes.len(), 2000);
    }

    #[tokio::test]
    async fn test_find_unique_file_name_skips_taken() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/trash/takea.m4a", 1);
        fs.add_file("/trash/takeb.m4a", 1);

        let name = find_unique_file_name(&fs, "/trash", "take", "m4a").await.unwrap();
        assert_eq!(name, "takec.m4a");

        let name = find_unique_file_name(&fs, "/trash/", "other", "").await.unwrap();
        assert_eq!(name, "othera");
    }

    #[tokio::test]
    async fn test_find_unique_file_name_shortens_long_stems() {
        let fs = MemoryFileSystem::new();
        let stem = "s".repeat(251);
        fs.add_file(&format!("/trash/{}a.m4a", &stem[..250]), 1);

        let name = find_unique_file_name(&fs, "/trash", &stem, "m4a").await.unwrap();
        assert_eq!(name, format!("{}b.m4a", &stem[..250]));
        assert!(crate::storage::validate_file_name(&name).is_ok());

        let name = find_unique_file_name(&fs, "/trash", &"é".repeat(200), "m4a").await.unwrap();
        assert!(crate::storage::validate_file_name(&name).is_ok(), "got {name}");
        assert!(name.ends_with("a.m4a"));
    }

    #[tokio::test]
    async fn test_find_unique_file_name_falls_back_to_timestamp() {
        let fs = MemoryFileSystem::new();
        for index in 0..LETTER_SUFFIX_ATTEMPTS {
            fs.add_file(&format!("/trash/x{}.m4a", generate_letter_suffix(index)), 1);
        }
        let name = find_unique_file_name(&fs, "/trash", "x", "m4a").await.unwrap();
        assert!(name.starts_with("x_"), "got {name}");
        assert!(name.ends_with(".m4a"));
        let millis = &name["x_".len()..name.len() - ".m4a".len()];
        assert!(millis.parse::<i64>().is_ok());
    }
}
