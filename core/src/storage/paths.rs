use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::storage::model::{BreadcrumbItem, FolderKind};
use crate::storage::{MAX_NAME_BYTES, MAX_NAME_LENGTH, RECENTLY_DELETED_DIR_NAME, RECORDINGS_DIR_NAME};

/// Characters that may not appear in a file or folder name.
pub(crate) const INVALID_NAME_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

const RESERVED_NAMES: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// Where the recordings tree and the recently-deleted area live.
///
/// Converts between absolute paths and paths relative to the recordings root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    document_root: String,
    recordings_root: String,
    recently_deleted_root: String,
}

impl Layout {
    /// Lays out `recordings/` and `recently-deleted/` under `document_root`.
    pub fn new(document_root: &str) -> Self {
        let trimmed = document_root.trim_end_matches('/');
        let document_root = if trimmed.is_empty() && document_root.starts_with('/') {
            "/".to_string()
        } else {
            trimmed.to_string()
        };
        let join = |dir: &str| match document_root.trim_end_matches('/') {
            "" if document_root.is_empty() => dir.to_string(),
            base => format!("{base}/{dir}"),
        };
        Layout {
            recordings_root: join(RECORDINGS_DIR_NAME),
            recently_deleted_root: join(RECENTLY_DELETED_DIR_NAME),
            document_root,
        }
    }

    pub fn document_root(&self) -> &str {
        &self.document_root
    }

    pub fn recordings_root(&self) -> &str {
        &self.recordings_root
    }

    pub fn recently_deleted_root(&self) -> &str {
        &self.recently_deleted_root
    }

    /// Joins the recordings root with `relative`. An empty path maps to the root.
    pub fn to_absolute(&self, relative: &str) -> String {
        let relative = join_path([relative]);
        if relative.is_empty() {
            self.recordings_root.clone()
        } else {
            format!("{}/{}", self.recordings_root, relative)
        }
    }

    /// Strips the recordings root from `absolute`.
    ///
    /// Paths outside the root are returned unchanged; use
    /// [`Layout::is_valid_recording_path`] to tell the two cases apart.
    pub fn to_relative(&self, absolute: &str) -> String {
        if absolute == self.recordings_root {
            return String::new();
        }
        match absolute.strip_prefix(&self.recordings_root) {
            Some(rest) if rest.starts_with('/') => rest.trim_matches('/').to_string(),
            _ => absolute.to_string(),
        }
    }

    /// True iff `path` is the recordings root or lies below it.
    pub fn is_valid_recording_path(&self, path: &str) -> bool {
        path == self.recordings_root
            || path
                .strip_prefix(&self.recordings_root)
                .is_some_and(|rest| rest.starts_with('/'))
    }

    /// True iff `path` is the recently-deleted root or lies below it.
    pub fn is_in_recently_deleted(&self, path: &str) -> bool {
        path == self.recently_deleted_root
            || path
                .strip_prefix(&self.recently_deleted_root)
                .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Builds the breadcrumb chain for an absolute or relative path.
    ///
    /// The root alone yields a single "Recordings" item; deeper paths start
    /// with "Home" followed by one item per folder. Absolute paths outside the
    /// recordings tree resolve to the root, and the recently-deleted folder
    /// never appears as a crumb.
    pub fn generate_breadcrumbs(&self, path: &str) -> Vec<BreadcrumbItem> {
        let relative = if self.is_valid_recording_path(path) {
            self.to_relative(path)
        } else if path.starts_with('/') {
            String::new()
        } else {
            path.to_string()
        };

        let segments: Vec<&str> = relative
            .split('/')
            .filter(|segment| !segment.is_empty())
            .filter(|segment| FolderKind::of(segment).is_visible())
            .collect();

        if segments.is_empty() {
            return vec![BreadcrumbItem {
                name: "Recordings".to_string(),
                path: String::new(),
                is_last: true,
            }];
        }

        let mut crumbs = Vec::with_capacity(segments.len() + 1);
        crumbs.push(BreadcrumbItem {
            name: "Home".to_string(),
            path: String::new(),
            is_last: false,
        });
        let mut cumulative = String::new();
        for (index, segment) in segments.iter().enumerate() {
            cumulative = join_path([cumulative.as_str(), *segment]);
            crumbs.push(BreadcrumbItem {
                name: segment.to_string(),
                path: cumulative.clone(),
                is_last: index == segments.len() - 1,
            });
        }
        crumbs
    }
}

/// Joins path segments with `/`, trimming slashes around each and dropping
/// empty ones. No segments yields `""`.
pub fn join_path<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut joined = String::new();
    for segment in segments {
        let segment = segment.as_ref().trim_matches('/');
        if segment.is_empty() {
            continue;
        }
        if !joined.is_empty() {
            joined.push('/');
        }
        joined.push_str(segment);
    }
    joined
}

/// Returns everything before the last `/`.
///
/// `"/a/b"` → `"/a"`, `"/a"` → `"/"`, `"a/b"` → `"a"`, `"a"` and `"/"` → `""`.
/// Trailing slashes are ignored.
pub fn parent_path(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => "/",
        Some(index) => &trimmed[..index],
        None => "",
    }
}

/// Returns the last segment of a path.
pub(crate) fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(index) => &trimmed[index + 1..],
        None => trimmed,
    }
}

fn is_reserved_name(name: &str) -> bool {
    RESERVED_NAMES.iter().any(|reserved| reserved.eq_ignore_ascii_case(name))
}

/// True if `name` is within [`MAX_NAME_LENGTH`] UTF-16 code units and
/// [`MAX_NAME_BYTES`] bytes.
pub(crate) fn fits_name_limits(name: &str) -> bool {
    name.len() <= MAX_NAME_BYTES && name.encode_utf16().count() <= MAX_NAME_LENGTH
}

/// Longest prefix of `value` that still fits the name limits once `reserved`
/// is appended. Cuts only at char boundaries, so surrogate pairs stay whole.
pub(crate) fn truncate_to_fit<'a>(value: &'a str, reserved: &str) -> &'a str {
    let max_units = MAX_NAME_LENGTH.saturating_sub(reserved.encode_utf16().count());
    let max_bytes = MAX_NAME_BYTES.saturating_sub(reserved.len());
    let mut units = 0;
    for (index, c) in value.char_indices() {
        units += c.len_utf16();
        if units > max_units || index + c.len_utf8() > max_bytes {
            return &value[..index];
        }
    }
    value
}

/// Turns arbitrary user input into a usable file or folder name.
///
/// Never fails: invalid characters are dropped, whitespace is collapsed, the
/// result is cut to the name limits (see [`MAX_NAME_LENGTH`] and
/// [`MAX_NAME_BYTES`]), an empty or dot-only result becomes
/// `"Untitled"` and reserved device names get a `_folder` suffix.
pub fn sanitize_file_name(raw: &str) -> String {
    let stripped: String = raw.chars().filter(|c| !INVALID_NAME_CHARS.contains(c)).collect();
    let collapsed = WHITESPACE_RUN.replace_all(&stripped, " ");
    let name = truncate_to_fit(collapsed.trim(), "").trim_end();

    if name.is_empty() || name == "." || name == ".." {
        return "Untitled".to_string();
    }
    if is_reserved_name(name) {
        return format!("{name}_folder");
    }
    name.to_string()
}

/// Reasons a name is rejected by [`validate_file_name`].
///
/// The messages are meant to be shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("Name cannot be empty")]
    Empty,

    #[error("Name is too long (maximum 255 characters)")]
    TooLong,

    #[error("Name contains invalid characters: < > : \" / \\ | ? *")]
    InvalidCharacters,

    #[error("\"{0}\" cannot be used as a name")]
    DotName(String),

    #[error("\"{0}\" is a reserved system name")]
    Reserved(String),
}

/// Checks a user-entered name without changing it.
pub fn validate_file_name(name: &str) -> Result<(), NameError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(NameError::Empty);
    }
    if !fits_name_limits(name) {
        return Err(NameError::TooLong);
    }
    if name.contains(INVALID_NAME_CHARS) {
        return Err(NameError::InvalidCharacters);
    }
    if trimmed == "." || trimmed == ".." {
        return Err(NameError::DotName(trimmed.to_string()));
    }
    if is_reserved_name(trimmed) {
        return Err(NameError::Reserved(trimmed.to_string()));
    }
    Ok(())
}
