pub mod reader;

/// File-system backed implementation of the file access traits.
pub struct LocalFile;
