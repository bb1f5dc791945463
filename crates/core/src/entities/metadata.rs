use std::fs;
use std::io;
use std::path::Path;

use p2p_config::METADATA_SUFFIX;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Contents of a `<file>.p2p` sidecar: the name the network knows the file
/// by, how many chunks it splits into, and the TTL the first flood carries.
pub struct FileMetadata {
    pub file_name: String,
    pub total_chunks: u32,
    pub initial_ttl: u32,
}

impl FileMetadata {
    /// Reads `<root>/<file_name>.p2p`: declared name on the first line, then
    /// total chunk count and initial TTL as whitespace-separated integers.
    /// Any failure aborts the search for that file at the caller.
    pub fn load(root: &Path, file_name: &str) -> io::Result<FileMetadata> {
        let path = root.join(format!("{file_name}{METADATA_SUFFIX}"));
        let text = fs::read_to_string(&path)?;

        let mut lines = text.lines();
        let declared = lines
            .next()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| malformed(file_name, "missing declared file name"))?;

        let mut numbers = lines.flat_map(str::split_whitespace);
        let total_chunks = parse_field(numbers.next(), file_name, "total chunk count")?;
        let initial_ttl = parse_field(numbers.next(), file_name, "initial TTL")?;

        Ok(FileMetadata {
            file_name: declared.to_string(),
            total_chunks,
            initial_ttl,
        })
    }
}

fn parse_field(token: Option<&str>, file_name: &str, what: &str) -> io::Result<u32> {
    token
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| malformed(file_name, what))
}

fn malformed(file_name: &str, what: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("metadata for '{file_name}': bad or missing {what}"),
    )
}

#[cfg(test)]
mod unit_tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_load_reads_all_three_fields() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("book.txt.p2p"), "book.txt\n3 4\n").unwrap();

        let metadata = FileMetadata::load(root.path(), "book.txt").unwrap();
        assert_eq!(
            metadata,
            FileMetadata {
                file_name: String::from("book.txt"),
                total_chunks: 3,
                initial_ttl: 4,
            }
        );
    }

    #[test]
    fn test_load_accepts_fields_on_separate_lines() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("book.txt.p2p"), "book.txt\n3\n4\n").unwrap();

        let metadata = FileMetadata::load(root.path(), "book.txt").unwrap();
        assert_eq!(metadata.total_chunks, 3);
        assert_eq!(metadata.initial_ttl, 4);
    }

    #[test]
    fn test_load_fails_when_sidecar_is_missing() {
        let root = tempfile::tempdir().unwrap();
        assert!(FileMetadata::load(root.path(), "ghost.txt").is_err());
    }

    #[test]
    fn test_load_fails_on_malformed_counts() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("book.txt.p2p"), "book.txt\nmany 4\n").unwrap();
        assert!(FileMetadata::load(root.path(), "book.txt").is_err());

        fs::write(root.path().join("half.txt.p2p"), "half.txt\n3\n").unwrap();
        assert!(FileMetadata::load(root.path(), "half.txt").is_err());
    }
}
