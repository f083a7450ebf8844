//! Filesystem operations behind the HTTP surface: file read/write, deletion
//! and creation, plus the path-containment guard and the directory lister.
//!
//! Every operation returns an `ApiError` the handlers map into a JSON
//! envelope; nothing panics on bad client input.

use crate::errors::{io_error_with_path, ApiError};
use std::fs;
use std::path::Path;

pub use listing::{list_directory, DirEntryData, ListOptions, Listing};
pub use paths::is_safe_path;
pub mod listing;
pub mod paths;

/// Reads a file's raw bytes.
pub fn load_file(path: &Path) -> Result<Vec<u8>, ApiError> {
    if !path.is_file() {
        return Err(ApiError::NotFound);
    }
    fs::read(path).map_err(|err| io_error_with_path(err, path))
}

/// Whole-file overwrite. No atomicity guarantee against concurrent writers;
/// this is a single-operator tool.
pub fn save_file(path: &Path, text: &str) -> Result<(), ApiError> {
    fs::write(path, text.as_bytes()).map_err(|err| io_error_with_path(err, path))
}

/// Removes a file, or a directory if (and only if) it is empty.
pub fn delete_path(path: &Path) -> Result<(), ApiError> {
    if path.is_dir() {
        fs::remove_dir(path).map_err(|err| io_error_with_path(err, path))
    } else {
        fs::remove_file(path).map_err(|err| io_error_with_path(err, path))
    }
}

/// Creates an empty file at `dir/name`.
pub fn create_file(dir: &str, name: &str) -> Result<String, ApiError> {
    let path = Path::new(dir).join(name);
    fs::write(&path, b"").map_err(|err| io_error_with_path(err, &path))?;
    Ok(path.to_string_lossy().to_string())
}

/// Creates a directory tree at `dir/name`.
pub fn create_folder(dir: &str, name: &str) -> Result<String, ApiError> {
    let path = Path::new(dir).join(name);
    fs::create_dir_all(&path).map_err(|err| io_error_with_path(err, &path))?;
    Ok(path.to_string_lossy().to_string())
}

/// True when the guessed MIME type is an image, which the file endpoint
/// serves raw instead of as text.
pub fn is_image(path: &Path) -> bool {
    mime_guess::from_path(path)
        .first()
        .map(|mime| mime.type_() == mime_guess::mime::IMAGE)
        .unwrap_or(false)
}
