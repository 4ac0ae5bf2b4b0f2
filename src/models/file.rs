use camino::{Utf8Path, Utf8PathBuf};

/// What kind of work a pending file represents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Video,
    Manifest,
}

/// A file found by the directory scan, named `{prefix}{original_name}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFile {
    pub path: Utf8PathBuf,
    /// File name with the pending prefix stripped
    pub original_name: String,
    pub kind: FileKind,
}

impl PendingFile {
    pub fn name_without_ext(&self) -> &str {
        split_extension(&self.original_name).0
    }

    /// Extension including the leading dot, or an empty string
    pub fn extension(&self) -> &str {
        split_extension(&self.original_name).1
    }
}

/// A file renamed to `{uploading}{original_name}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadingFile {
    pub path: Utf8PathBuf,
    pub original_name: String,
    pub kind: FileKind,
}

impl UploadingFile {
    pub fn name_without_ext(&self) -> &str {
        split_extension(&self.original_name).0
    }

    pub fn extension(&self) -> &str {
        split_extension(&self.original_name).1
    }
}

/// A file in its final location, named `{done}{templated name}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoneFile {
    pub path: Utf8PathBuf,
}

/// A file moved back to its pending name after a failed upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoredFile {
    pub path: Utf8PathBuf,
}

impl DoneFile {
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

/// Split `name` into stem and extension (with dot).
///
/// A leading dot does not start an extension, so `.hidden` has no extension.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(0) | None => (name, ""),
        Some(idx) => name.split_at(idx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("movie1.mp4"), ("movie1", ".mp4"));
        assert_eq!(split_extension("a.b.c.md"), ("a.b.c", ".md"));
        assert_eq!(split_extension("noext"), ("noext", ""));
        assert_eq!(split_extension(".hidden"), (".hidden", ""));
    }

    #[test]
    fn test_pending_name_without_ext() {
        let file = PendingFile {
            path: Utf8PathBuf::from("/watch/r_movie1.mp4"),
            original_name: "movie1.mp4".to_string(),
            kind: FileKind::Video,
        };
        assert_eq!(file.name_without_ext(), "movie1");
        assert_eq!(file.extension(), ".mp4");
    }
}
