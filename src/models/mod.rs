use serde::{Deserialize, Serialize};

/// MIME value recorded when the content could not be sniffed.
pub const MIME_UNKNOWN: &str = "unknown";

/// Identity of a stored file.
///
/// The hash is computed once from the bytes that were written and is the
/// entity's identity for reconciliation: two entities with equal hashes are
/// the same file regardless of where they are stored. Only `rename` changes
/// the path after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntity {
    pub path: String,
    pub original_filename: String,
    pub filesize: u64,
    pub mime: String,
    pub hash: String,
}

impl FileEntity {
    pub fn new(
        path: impl Into<String>,
        original_filename: impl Into<String>,
        filesize: u64,
        mime: impl Into<String>,
        hash: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            original_filename: original_filename.into(),
            filesize,
            mime: mime.into(),
            hash: hash.into(),
        }
    }

    pub fn same_content(&self, other: &FileEntity) -> bool {
        self.hash == other.hash
    }

    pub fn extension(&self) -> Option<String> {
        crate::utils::validation::file_extension(&self.original_filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_content_ignores_path() {
        let a = FileEntity::new("a/1.txt", "one.txt", 3, "text/plain", "abc");
        let b = FileEntity::new("b/2.txt", "two.txt", 3, "text/plain", "abc");
        let c = FileEntity::new("a/1.txt", "one.txt", 3, "text/plain", "def");
        assert!(a.same_content(&b));
        assert!(!a.same_content(&c));
    }

    #[test]
    fn test_entity_json_shape() {
        let entity = FileEntity::new("posts/7/cat.png", "cat.png", 42, "image/png", "ff00");
        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json["path"], "posts/7/cat.png");
        assert_eq!(json["original_filename"], "cat.png");
        assert_eq!(json["filesize"], 42);

        let back: FileEntity = serde_json::from_value(json).unwrap();
        assert_eq!(back, entity);
        assert_eq!(back.extension(), Some("png".to_string()));
    }
}
