//! Multi-volume archive support.
//!
//! This module provides support for reading multi-volume 7z archives,
//! which are archives split across multiple files (e.g., `.7z.001`, `.7z.002`, etc.).
//!
//! # Overview
//!
//! Multi-volume archives are useful for:
//! - Storing large archives on media with size limits (USB drives, DVDs)
//! - Splitting archives for easier transfer or upload
//! - Working around file system limitations
//!
//! # Reading Multi-Volume Archives
//!
//! ```rust,ignore
//! use sevenz_core::volume::MultiVolumeReader;
//! use sevenz_core::Archive;
//!
//! // Open the first volume (other volumes are discovered automatically)
//! let reader = MultiVolumeReader::open("archive.7z.001")?;
//! println!("Archive spans {} volumes", reader.volume_count());
//!
//! // Use with Archive just like a regular file
//! let archive = Archive::open(reader)?;
//! for entry in archive.entries() {
//!     println!("{}", entry.path.as_str());
//! }
//! ```
//!
//! # Volume Naming Convention
//!
//! Multi-volume archives use the following naming convention:
//! - `archive.7z.001` - First volume
//! - `archive.7z.002` - Second volume
//! - `archive.7z.003` - Third volume
//! - etc.
//!
//! The volume number is always 3 digits, padded with zeros.

mod reader;
mod unified;

pub use reader::{MultiVolumeReader, VolumeReader};
pub use unified::UnifiedReader;
