//! Utility modules for the filesystem and the clipboard.

pub mod clipboard;
pub mod fs;
