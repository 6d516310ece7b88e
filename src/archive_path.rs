//! Archive path type with validation for secure path handling.

use crate::{Error, Result};
use std::fmt;

/// Maximum length for archive paths (in bytes).
///
/// This limit prevents denial-of-service attacks where a malicious archive
/// specifies extremely long paths. 32KB is well above any reasonable file
/// system path limit (e.g., Linux PATH_MAX is 4KB, Windows MAX_PATH is ~260).
const MAX_PATH_LENGTH: usize = 32768;

/// Windows reserved device names that cannot be used as filenames.
///
/// On Windows, these names refer to device drivers and cannot be used as
/// regular filenames. Creating files with these names can cause unexpected
/// behavior or denial of service. We reject them on all platforms to ensure
/// archives created on non-Windows systems can be safely extracted on Windows.
const WINDOWS_RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Checks if a filename is a Windows reserved name.
///
/// Windows reserved names are case-insensitive and also reserved
/// when followed by an extension (e.g., "CON.txt" is reserved).
fn is_windows_reserved(name: &str) -> bool {
    // Get base name without extension
    let base = match name.find('.') {
        Some(pos) => &name[..pos],
        None => name,
    };

    // Case-insensitive comparison
    WINDOWS_RESERVED_NAMES
        .iter()
        .any(|reserved| base.eq_ignore_ascii_case(reserved))
}

/// A validated archive path that ensures security against path traversal attacks.
///
/// `ArchivePath` normalizes paths to use forward slashes and validates that:
/// - No NUL bytes are present
/// - The path is not absolute (does not start with `/`)
/// - No empty segments exist (no `//` or trailing `/`)
/// - No `.` or `..` segments are present (prevents path traversal)
///
/// # Examples
///
/// ```
/// use sevenz_core::ArchivePath;
///
/// // Valid paths
/// let path = ArchivePath::new("dir/file.txt").unwrap();
/// assert_eq!(path.as_str(), "dir/file.txt");
///
/// // Invalid paths are rejected
/// assert!(ArchivePath::new("../secret").is_err());
/// assert!(ArchivePath::new("/absolute/path").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArchivePath(String);

impl ArchivePath {
    /// Creates a new `ArchivePath` from a string, validating it.
    ///
    /// # Errors
    ///
    /// Returns an error if the path:
    /// - Contains NUL bytes
    /// - Is an absolute path (starts with `/`)
    /// - Contains empty segments (e.g., `a//b`)
    /// - Contains `.` or `..` segments
    /// - Is empty
    pub fn new(s: &str) -> Result<Self> {
        Self::validate(s)?;
        Ok(Self(s.to_string()))
    }

    /// Validates an archive path string.
    fn validate(s: &str) -> Result<()> {
        // Check for NUL bytes
        if s.contains('\0') {
            return Err(Error::InvalidArchivePath("contains NUL byte".into()));
        }

        // Check for empty path
        if s.is_empty() {
            return Err(Error::InvalidArchivePath("empty path".into()));
        }

        // Check for path length limit
        if s.len() > MAX_PATH_LENGTH {
            return Err(Error::InvalidArchivePath(format!(
                "path exceeds maximum length of {} bytes",
                MAX_PATH_LENGTH
            )));
        }

        // Check for absolute path
        if s.starts_with('/') {
            return Err(Error::InvalidArchivePath(
                "absolute path not allowed".into(),
            ));
        }

        // Check for trailing slash
        if s.ends_with('/') {
            return Err(Error::InvalidArchivePath(
                "trailing slash not allowed".into(),
            ));
        }

        // Check each segment
        for segment in s.split('/') {
            if segment.is_empty() {
                return Err(Error::InvalidArchivePath(
                    "empty segment (consecutive slashes)".into(),
                ));
            }
            if segment == "." {
                return Err(Error::InvalidArchivePath("'.' segment not allowed".into()));
            }
            if segment == ".." {
                return Err(Error::InvalidArchivePath(
                    "'..' segment not allowed (path traversal)".into(),
                ));
            }

            // Check for Windows reserved names (reject on all platforms for portability)
            if is_windows_reserved(segment) {
                return Err(Error::InvalidArchivePath(format!(
                    "Windows reserved filename '{}' not allowed",
                    segment
                )));
            }
        }

        Ok(())
    }

    /// Returns the path as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Joins this path with another segment.
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting path would be invalid.
    pub fn join(&self, other: &str) -> Result<Self> {
        let joined = format!("{}/{}", self.0, other);
        Self::new(&joined)
    }

    /// Returns the parent directory of this path, if any.
    ///
    /// Returns `None` if this path has no parent (i.e., is a single segment).
    pub fn parent(&self) -> Option<Self> {
        self.0.rfind('/').map(|idx| {
            // Safety: we validated during construction, so parent is also valid
            Self(self.0[..idx].to_string())
        })
    }

    /// Returns the file name (last segment) of this path.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Returns the file extension, if any.
    ///
    /// The extension is the portion of the file name after the last `.`.
    /// Returns `None` if there is no extension, or if the file name starts
    /// with a dot (e.g., `.gitignore` has no extension).
    ///
    /// # Examples
    ///
    /// ```
    /// use sevenz_core::ArchivePath;
    ///
    /// let path = ArchivePath::new("dir/file.txt").unwrap();
    /// assert_eq!(path.extension(), Some("txt"));
    ///
    /// let path = ArchivePath::new("dir/file").unwrap();
    /// assert_eq!(path.extension(), None);
    ///
    /// let path = ArchivePath::new(".gitignore").unwrap();
    /// assert_eq!(path.extension(), None);
    /// ```
    pub fn extension(&self) -> Option<&str> {
        let file_name = self.file_name();
        // Find the last dot, but not if it's the first character
        let dot_pos = file_name.rfind('.')?;
        if dot_pos == 0 {
            // File starts with dot (e.g., .gitignore) - no extension
            None
        } else {
            Some(&file_name[dot_pos + 1..])
        }
    }

    /// Returns an iterator over the path components (segments).
    ///
    /// # Examples
    ///
    /// ```
    /// use sevenz_core::ArchivePath;
    ///
    /// let path = ArchivePath::new("a/b/c.txt").unwrap();
    /// let components: Vec<_> = path.components().collect();
    /// assert_eq!(components, vec!["a", "b", "c.txt"]);
    /// ```
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Returns true if this path starts with the given prefix.
    ///
    /// This performs a component-wise comparison, not a string prefix match.
    /// For example, `"foo/bar"` starts with `"foo"` but not `"fo"`.
    ///
    /// # Examples
    ///
    /// ```
    /// use sevenz_core::ArchivePath;
    ///
    /// let path = ArchivePath::new("dir/subdir/file.txt").unwrap();
    /// assert!(path.starts_with("dir"));
    /// assert!(path.starts_with("dir/subdir"));
    /// assert!(!path.starts_with("di")); // Not a component boundary
    /// assert!(!path.starts_with("other"));
    /// ```
    pub fn starts_with(&self, prefix: &str) -> bool {
        if prefix.is_empty() {
            return true;
        }
        // Component-wise comparison
        let self_components: Vec<_> = self.0.split('/').collect();
        let prefix_components: Vec<_> = prefix.split('/').collect();

        if prefix_components.len() > self_components.len() {
            return false;
        }

        self_components
            .iter()
            .zip(prefix_components.iter())
            .all(|(a, b)| a == b)
    }
}

impl AsRef<str> for ArchivePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArchivePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<&str> for ArchivePath {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for ArchivePath {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::validate(&s)?;
        Ok(Self(s))
    }
}
