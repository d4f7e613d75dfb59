use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use log::{debug, warn};

use super::{NotificationSource, SourceError};

const MESSAGE_EXTENSION: &str = "eml";

/// A directory of `*.eml` files, one message per file.
///
/// The message id is the file stem, and the received time is the file's modification time. Whatever process delivers
/// mail into the directory must therefore never rename or touch a message once it has been written.
#[derive(Debug, Clone)]
pub struct MaildirSource {
    root: PathBuf,
}

impl MaildirSource {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    fn message_path(&self, id: &str) -> Option<PathBuf> {
        let valid = !id.is_empty() && !id.contains(['/', '\\']) && id != "." && id != "..";
        valid.then(|| self.root.join(format!("{id}.{MESSAGE_EXTENSION}")))
    }
}

impl NotificationSource for MaildirSource {
    async fn search_since(&self, since: DateTime<Utc>) -> Result<Vec<String>, SourceError> {
        let unavailable = |e: std::io::Error| {
            SourceError::Unavailable(format!("Cannot read mailbox directory {}. {e}", self.root.display()))
        };
        let mut entries = tokio::fs::read_dir(&self.root).await.map_err(unavailable)?;
        let mut found = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(unavailable)? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(MESSAGE_EXTENSION) {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()).map(String::from) else {
                warn!("Skipping mailbox file with a non UTF-8 name: {}", path.display());
                continue;
            };
            let modified = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(t) => DateTime::<Utc>::from(t),
                Err(e) => {
                    warn!("Cannot read the modification time of {}. Skipping it. {e}", path.display());
                    continue;
                },
            };
            if modified >= since {
                found.push((modified, id));
            }
        }
        found.sort();
        debug!("Found {} messages in {} since {since}", found.len(), self.root.display());
        Ok(found.into_iter().map(|(_, id)| id).collect())
    }

    async fn fetch(&self, id: &str) -> Result<Vec<u8>, SourceError> {
        let path = self.message_path(id).ok_or_else(|| SourceError::MessageNotFound(id.to_string()))?;
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => SourceError::MessageNotFound(id.to_string()),
            _ => SourceError::Io(format!("Cannot read {}. {e}", path.display())),
        })
    }
}

#[cfg(test)]
mod test {
    use chrono::Duration;

    use super::*;

    fn temp_mailbox(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("zpg_maildir_{name}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn lists_and_fetches_eml_files() {
        let dir = temp_mailbox("list");
        std::fs::write(dir.join("a1.eml"), b"Subject: one\n\nbody").unwrap();
        std::fs::write(dir.join("b2.eml"), b"Subject: two\n\nbody").unwrap();
        std::fs::write(dir.join("notes.txt"), b"not a message").unwrap();
        let source = MaildirSource::new(&dir);
        let mut ids = source.search_since(Utc::now() - Duration::days(1)).await.unwrap();
        ids.sort();
        assert_eq!(ids, vec!["a1".to_string(), "b2".to_string()]);
        let bytes = source.fetch("b2").await.unwrap();
        assert_eq!(bytes, b"Subject: two\n\nbody");
        // Everything in the directory is older than "tomorrow"
        let ids = source.search_since(Utc::now() + Duration::days(1)).await.unwrap();
        assert!(ids.is_empty());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn missing_messages_and_directories() {
        let dir = temp_mailbox("missing");
        let source = MaildirSource::new(&dir);
        assert!(matches!(source.fetch("nope").await, Err(SourceError::MessageNotFound(_))));
        assert!(matches!(source.fetch("../escape").await, Err(SourceError::MessageNotFound(_))));
        std::fs::remove_dir_all(&dir).unwrap();
        let err = source.search_since(Utc::now()).await.unwrap_err();
        assert!(matches!(err, SourceError::Unavailable(_)));
    }
}
