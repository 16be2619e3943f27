use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Favorites file name in the config directory
const FAVORITES_FILE: &str = "favorites.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favorites {
    /// Favorited dancer ids, in the order they were added
    #[serde(default)]
    pub dancers: Vec<u32>,
}

/// The favorited dancers, persisted as one JSON document that is always
/// read and written whole.
pub struct FavoritesStore {
    dir: PathBuf,
    pub data: Favorites,
}

impl FavoritesStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            data: Favorites::default(),
        }
    }

    /// Load favorites from disk. A missing file leaves the list empty.
    pub fn load(&mut self) -> Result<()> {
        let path = self.favorites_path();
        self.data = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .context("Failed to read favorites file")?;
            serde_json::from_str(&contents)
                .context("Failed to parse favorites file")?
        } else {
            Favorites::default()
        };
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let path = self.favorites_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&self.data)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Replace the whole list.
    pub fn update(&mut self, data: Favorites) {
        self.data = data;
    }

    /// Add or remove `id`. Returns whether it is now a favorite.
    pub fn toggle(&mut self, id: u32) -> bool {
        if let Some(pos) = self.data.dancers.iter().position(|&d| d == id) {
            self.data.dancers.remove(pos);
            false
        } else {
            self.data.dancers.push(id);
            true
        }
    }

    pub fn is_favorite(&self, id: u32) -> bool {
        self.data.dancers.contains(&id)
    }

    pub fn ids(&self) -> &[u32] {
        &self.data.dancers
    }

    /// Forget every favorite and delete the file.
    pub fn clear(&mut self) -> Result<()> {
        self.data = Favorites::default();
        let path = self.favorites_path();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    fn favorites_path(&self) -> PathBuf {
        self.dir.join(FAVORITES_FILE)
    }
}
