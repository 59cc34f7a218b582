use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

use pantry_core::models::ShoppingList;
use pantry_core::session::Session;

const SESSION_FILE: &str = "session.json";
const LIST_FILE: &str = "shopping_list.json";

/// Files kept between runs in the data directory.
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn load_session(&self) -> Result<Option<Session>> {
        read_json(&self.dir.join(SESSION_FILE))
    }

    /// The token is a credential: the file is readable by the owner only.
    pub fn save_session(&self, session: &Session) -> Result<()> {
        let path = self.dir.join(SESSION_FILE);
        write_json(&path, session)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .context("Failed to set session file permissions")?;
        }
        Ok(())
    }

    pub fn clear_session(&self) -> Result<bool> {
        remove(&self.dir.join(SESSION_FILE))
    }

    /// Last shopping list shown, used to carry checked items over.
    pub fn load_list(&self) -> Result<Option<ShoppingList>> {
        read_json(&self.dir.join(LIST_FILE))
    }

    pub fn save_list(&self, list: &ShoppingList) -> Result<()> {
        write_json(&self.dir.join(LIST_FILE), list)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value = serde_json::from_str(&raw)
        .with_context(|| format!("Corrupt state file {}; delete it to reset", path.display()))?;
    Ok(Some(value))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let raw = serde_json::to_string_pretty(value)?;
    std::fs::write(path, raw).with_context(|| format!("Failed to write {}", path.display()))
}

fn remove(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    std::fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    Ok(true)
}
