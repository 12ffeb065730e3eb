use bytes::Bytes;

use crate::{Result, StorageError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    pub name: String,
    pub content: Bytes,
}

impl File {
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }

    pub fn validate_name(name: &str) -> Result<()> {
        let invalid = name.is_empty()
            || name == "."
            || name == ".."
            || name.contains('/')
            || name.contains('\\')
            || name.chars().any(char::is_whitespace);

        if invalid {
            return Err(StorageError::InvalidCommand(format!(
                "invalid file name: {:?}",
                name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_is_content_length() {
        let file = File::new("report.txt", &b"0123456789"[..]);
        assert_eq!(file.size(), 10);
        assert_eq!(File::new("empty", Bytes::new()).size(), 0);
    }

    #[test]
    fn test_name_validation() {
        assert!(File::validate_name("report.txt").is_ok());
        assert!(File::validate_name(".hidden").is_ok());

        for name in ["", ".", "..", "../etc/passwd", "a/b", "a\\b", "two words"] {
            assert!(
                matches!(File::validate_name(name), Err(StorageError::InvalidCommand(_))),
                "{:?} should be rejected",
                name
            );
        }
    }
}
