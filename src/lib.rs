//! # sevenz-core
//!
//! A pure-Rust decoder for the 7z archive container format: LZMA/LZMA2
//! range-coded decompression, the BCJ/BCJ2 executable pre-filters, the Delta
//! filter, and the coder-chain orchestrator that wires them together per
//! archive folder.
//!
//! This crate reads and extracts `.7z` archives. It does not write or edit
//! them.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sevenz_core::{Archive, ExtractOptions, Result};
//!
//! fn main() -> Result<()> {
//!     let mut archive = Archive::open_path("archive.7z")?;
//!
//!     for entry in archive.entries() {
//!         println!("{}: {} bytes", entry.path.as_str(), entry.size);
//!     }
//!
//!     archive.extract("./output", (), &ExtractOptions::default())?;
//!     Ok(())
//! }
//! ```
//!
//! ### Extracting Password-Protected Archives
//!
//! ```rust,ignore
//! # #[cfg(feature = "aes")]
//! use sevenz_core::{Archive, ExtractOptions, Password, Result};
//!
//! # #[cfg(feature = "aes")]
//! fn main() -> Result<()> {
//!     let mut archive = Archive::open_path_with_password(
//!         "encrypted.7z",
//!         Password::new("secret"),
//!     )?;
//!     archive.extract("./output", (), &ExtractOptions::default())?;
//!     Ok(())
//! }
//! # #[cfg(not(feature = "aes"))]
//! # fn main() {}
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `lzma` | Yes | LZMA decoding |
//! | `lzma2` | Yes | LZMA2 decoding (includes `lzma`) |
//! | `aes` | Yes | AES-256 decryption for data and headers |
//!
//! ### Disabling Default Features
//!
//! ```toml
//! [dependencies]
//! sevenz-core = { version = "1.0", default-features = false, features = ["lzma2"] }
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`], which is an alias for
//! `std::result::Result<T, Error>`.
//!
//! ```rust,no_run
//! use sevenz_core::{Archive, Error};
//!
//! fn open_archive(path: &str) -> sevenz_core::Result<()> {
//!     match Archive::open_path(path) {
//!         Ok(archive) => {
//!             println!("Opened archive with {} entries", archive.len());
//!             Ok(())
//!         }
//!         Err(Error::Io(e)) => {
//!             eprintln!("I/O error: {}", e);
//!             Err(Error::Io(e))
//!         }
//!         Err(Error::InvalidFormat(msg)) => {
//!             eprintln!("Not a valid 7z file: {}", msg);
//!             Err(Error::InvalidFormat(msg))
//!         }
//!         Err(e @ Error::WrongPassword { .. }) => {
//!             eprintln!("Incorrect password");
//!             Err(e)
//!         }
//!         Err(e) => Err(e),
//!     }
//! }
//! # fn main() {}
//! ```
//!
//! ## Safety and Resource Limits
//!
//! - **Path traversal protection**: prevents extraction outside the destination.
//! - **Resource limits**: guards against decompression bombs and excessive memory usage.
//! - **CRC verification**: validates data integrity during extraction.
//!
//! ```rust,no_run
//! use sevenz_core::{ExtractOptions, read::PathSafety};
//!
//! let options = ExtractOptions::new()
//!     .path_safety(PathSafety::Strict);
//! ```
//!
//! ## Minimum Supported Rust Version (MSRV)
//!
//! This crate requires **Rust 1.85** or later.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]

/// Default buffer size for read operations (8 KiB).
pub(crate) const READ_BUFFER_SIZE: usize = 8192;

pub mod archive_path;
pub mod checksum;
pub mod codec;
pub mod error;
pub mod format;
pub mod ownership;

#[cfg(feature = "aes")]
#[cfg_attr(docsrs, doc(cfg(feature = "aes")))]
pub mod crypto;

pub mod read;
pub mod safety;
pub mod timestamp;
pub mod volume;

pub use archive_path::ArchivePath;
pub use error::{Error, PasswordDetectionMethod, Result};
pub use timestamp::Timestamp;

#[cfg(feature = "aes")]
pub use crypto::Password;

// Re-export reading API at crate root for convenience
pub use read::{Archive, Entry, ExtractOptions, ExtractResult, TestOptions, TestResult};

// Re-export safety utilities
pub use format::streams::{LimitMode, RatioLimit, ResourceLimits};
pub use safety::{LimitedReader, validate_extract_path};

// Re-export ownership API
pub use ownership::UnixOwnership;

#[allow(unused)]
mod s3fifo;
