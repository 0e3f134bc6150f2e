use thiserror::Error;

use crate::storage::paths::parent_path;

/// Why a move or rename was rejected. `Display` is the user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("{0} is already in this location")]
    SameLocation(String),

    #[error("Cannot move {0} into itself or its subdirectory")]
    IntoItself(String),
}

/// A move the user asked for, checked before anything touches the disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOperation {
    /// Absolute path of the item being moved.
    pub source_path: String,
    /// Absolute path of the folder it should end up in.
    pub destination_path: String,
    pub item_name: String,
}

impl MoveOperation {
    pub fn new(source_path: impl Into<String>, destination_path: impl Into<String>, item_name: impl Into<String>) -> Self {
        MoveOperation {
            source_path: source_path.into(),
            destination_path: destination_path.into(),
            item_name: item_name.into(),
        }
    }

    pub fn validate(&self) -> Result<(), MoveError> {
        validate_move_operation(&self.source_path, &self.destination_path, &self.item_name)
    }

    /// Where the item lands if the move goes ahead.
    pub fn target_path(&self) -> String {
        format!("{}/{}", self.destination_path.trim_end_matches('/'), self.item_name)
    }
}

fn trim_trailing_slash(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() && path.starts_with('/') { "/" } else { trimmed }
}

/// Decides whether moving `source_path` into `destination_path` makes sense.
///
/// Moving an item into the folder it already lives in is rejected first, then
/// moving it onto itself or anywhere below itself. Only the strings are
/// compared; nothing is read from disk.
pub fn validate_move_operation(source_path: &str, destination_path: &str, item_name: &str) -> Result<(), MoveError> {
    let source = trim_trailing_slash(source_path);
    let destination = trim_trailing_slash(destination_path);

    if destination == parent_path(source) {
        return Err(MoveError::SameLocation(item_name.to_string()));
    }

    let inside_source = destination
        .strip_prefix(source)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'));
    if inside_source {
        return Err(MoveError::IntoItself(item_name.to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_into_itself_is_rejected() {
        let err = validate_move_operation("/r/folder1", "/r/folder1", "folder1").unwrap_err();
        assert_eq!(err, MoveError::IntoItself("folder1".into()));
        assert_eq!(err.to_string(), "Cannot move folder1 into itself or its subdirectory");
    }

    #[test]
    fn test_move_into_descendant_is_rejected() {
        let err = validate_move_operation("/r/folder1", "/r/folder1/sub", "folder1").unwrap_err();
        assert_eq!(err, MoveError::IntoItself("folder1".into()));

        let err = validate_move_operation("/r/folder1", "/r/folder1/sub/deeper/", "folder1").unwrap_err();
        assert_eq!(err, MoveError::IntoItself("folder1".into()));
    }

    #[test]
    fn test_same_location_takes_precedence() {
        let err = validate_move_operation("/hello/test2", "/hello", "test2").unwrap_err();
        assert_eq!(err, MoveError::SameLocation("test2".into()));
        assert_eq!(err.to_string(), "test2 is already in this location");

        let err = validate_move_operation("/hello/test2/", "/hello/", "test2").unwrap_err();
        assert_eq!(err, MoveError::SameLocation("test2".into()));
    }

    #[test]
    fn test_valid_moves() {
        assert_eq!(validate_move_operation("/r/folder1/sub", "/r/folder2", "sub"), Ok(()));
        // Moving up a level.
        assert_eq!(validate_move_operation("/r/a/b/c", "/r/a", "c"), Ok(()));
        // Sibling that shares a name prefix is not a descendant.
        assert_eq!(validate_move_operation("/r/folder1", "/r/folder10", "folder1"), Ok(()));
    }

    #[test]
    fn test_move_operation_helpers() {
        let op = MoveOperation::new("/r/a/take.m4a", "/r/b/", "take.m4a");
        assert_eq!(op.validate(), Ok(()));
        assert_eq!(op.target_path(), "/r/b/take.m4a");

        let op = MoveOperation::new("/r/a/take.m4a", "/r/a", "take.m4a");
        assert_eq!(op.validate(), Err(MoveError::SameLocation("take.m4a".into())));
    }
}
