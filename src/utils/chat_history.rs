use crate::utils::{Settings, SettingsError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

const TITLE_LIMIT: usize = 48;

/// Local record of a chat this client has talked to. The server keeps the
/// transcript; this only lets the sidebar list and reopen chats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentChat {
    pub chat_id: String,
    pub title: String,
    /// Seconds since the Unix epoch of the last turn.
    pub timestamp: u64,
}

/// Directory-backed index of [`RecentChat`] files, one `chat_<id>.json` each.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatHistory {
    dir: PathBuf,
}

impl ChatHistory {
    pub fn open_default() -> Result<Self, SettingsError> {
        Ok(Self::at(Settings::settings_dir()?.join("chats")))
    }

    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn chat_path(&self, chat_id: &str) -> PathBuf {
        let safe: String = chat_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("chat_{}.json", safe))
    }

    /// All recorded chats, most recent first. Unreadable files are skipped.
    pub fn list(&self) -> Vec<RecentChat> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };

        let mut chats: Vec<RecentChat> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension().and_then(|s| s.to_str()) == Some("json")
                    && path
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .is_some_and(|stem| stem.starts_with("chat_"))
            })
            .filter_map(|path| match Self::load_file(&path) {
                Ok(chat) => Some(chat),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable chat record");
                    None
                }
            })
            .collect();

        chats.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        chats
    }

    fn load_file(path: &Path) -> Result<RecentChat, String> {
        let contents = fs::read_to_string(path).map_err(|e| e.to_string())?;
        serde_json::from_str(&contents).map_err(|e| e.to_string())
    }

    pub fn get(&self, chat_id: &str) -> Option<RecentChat> {
        Self::load_file(&self.chat_path(chat_id)).ok()
    }

    /// Records a turn in `chat_id`. The first user input becomes the title.
    pub fn record(&self, chat_id: &str, user_input: &str) -> Result<RecentChat, SettingsError> {
        let title = self
            .get(chat_id)
            .map(|existing| existing.title)
            .unwrap_or_else(|| summarize(user_input));
        let chat = RecentChat {
            chat_id: chat_id.to_string(),
            title,
            timestamp: now_secs(),
        };
        self.save(&chat)?;
        Ok(chat)
    }

    pub fn save(&self, chat: &RecentChat) -> Result<(), SettingsError> {
        let path = self.chat_path(&chat.chat_id);
        let write_err = |source| SettingsError::Write {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(write_err)?;
        let contents = serde_json::to_string_pretty(chat)
            .map_err(|e| write_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        fs::write(&path, contents).map_err(write_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).map_err(write_err)?;
        }

        debug!(chat_id = %chat.chat_id, "chat recorded");
        Ok(())
    }

    pub fn forget(&self, chat_id: &str) -> Result<(), SettingsError> {
        let path = self.chat_path(chat_id);
        if path.exists() {
            fs::remove_file(&path).map_err(|source| SettingsError::Write { path, source })?;
        }
        Ok(())
    }
}

fn summarize(user_input: &str) -> String {
    let line = user_input.lines().next().unwrap_or("").trim();
    if line.is_empty() {
        return "Untitled chat".to_string();
    }
    if line.chars().count() <= TITLE_LIMIT {
        return line.to_string();
    }
    let cut: String = line.chars().take(TITLE_LIMIT).collect();
    format!("{}...", cut.trim_end())
}

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Format timestamp for human-readable display
pub fn format_relative(timestamp: u64, now: u64) -> String {
    let diff = now.saturating_sub(timestamp);
    if diff < 60 {
        "Just now".to_string()
    } else if diff < 3600 {
        format!("{} minutes ago", diff / 60)
    } else if diff < 86400 {
        format!("{} hours ago", diff / 3600)
    } else if diff < 86400 * 365 {
        format!("{} days ago", diff / 86400)
    } else {
        format!("{} years ago", diff / (86400 * 365))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_record_keeps_first_title_and_lists_recent_first() {
        let dir = tempfile::tempdir().unwrap();
        let history = ChatHistory::at(dir.path().join("chats"));

        history.record("c1", "Hotels in Lisbon under 100 euros").unwrap();
        history
            .save(&RecentChat {
                chat_id: "c2".to_string(),
                title: "Older".to_string(),
                timestamp: 10,
            })
            .unwrap();
        let again = history.record("c1", "what about Porto?").unwrap();
        assert_eq!(again.title, "Hotels in Lisbon under 100 euros");

        let ids: Vec<_> = history.list().into_iter().map(|c| c.chat_id).collect();
        assert_eq!(ids, vec!["c1".to_string(), "c2".to_string()]);

        history.forget("c2").unwrap();
        assert_eq!(history.list().len(), 1);
        assert!(history.get("c2").is_none());
    }

    #[test]
    fn test_list_of_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let history = ChatHistory::at(dir.path().join("absent"));
        assert!(history.list().is_empty());
        assert!(history.forget("nope").is_ok());
    }

    #[test]
    fn test_ids_are_sanitized_in_file_names() {
        let history = ChatHistory::at("/tmp/x");
        assert_eq!(
            history.chat_path("../evil"),
            PathBuf::from("/tmp/x/chat____evil.json")
        );
    }

    #[test]
    fn test_summarize_truncates_long_input() {
        let long = "a".repeat(60);
        assert_eq!(summarize(&long), format!("{}...", "a".repeat(48)));
        assert_eq!(summarize("  \n"), "Untitled chat");
    }

    #[rstest]
    #[case(1_000, 1_030, "Just now")]
    #[case(1_000, 1_000 + 5 * 60, "5 minutes ago")]
    #[case(1_000, 1_000 + 3 * 3600, "3 hours ago")]
    #[case(1_000, 1_000 + 2 * 86400, "2 days ago")]
    #[case(0, 2 * 86400 * 365, "2 years ago")]
    fn test_format_relative(#[case] timestamp: u64, #[case] now: u64, #[case] expected: &str) {
        assert_eq!(format_relative(timestamp, now), expected);
    }
}
