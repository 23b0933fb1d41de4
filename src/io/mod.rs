//! Finding source files and turning their bytes into records.

pub mod compression;
pub mod pattern;
pub mod sources;
pub mod text;
pub mod walk;
