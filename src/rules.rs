//! Rule-module registry: per-category review rule text, lazily loaded.
//!
//! Rule text lives in a directory as `<category>.md`. Files are read on
//! first request and cached (negative results too, so a missing module is
//! only stat'ed once). A missing module for an enabled category is a soft
//! condition: warn + skip, the prompt proceeds without that section.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::config::Category;

#[derive(Debug)]
pub struct RuleRegistry {
    dir: PathBuf,
    cache: Mutex<HashMap<Category, Option<String>>>,
}

impl RuleRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the rule text for a category, or `None` if no module exists.
    pub fn get_rule(&self, category: Category) -> Option<String> {
        let mut cache = self.cache.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(hit) = cache.get(&category) {
            return hit.clone();
        }

        let path = self.dir.join(format!("{}.md", category.as_str()));
        let loaded = match std::fs::read_to_string(&path) {
            Ok(text) if !text.trim().is_empty() => {
                debug!("rules: loaded module '{}'", category.as_str());
                Some(text.trim().to_string())
            }
            Ok(_) => {
                warn!("rules: module '{}' is empty, skipping", category.as_str());
                None
            }
            Err(e) => {
                warn!(
                    "rules: no module for enabled category '{}' ({e}), skipping",
                    category.as_str()
                );
                None
            }
        };
        cache.insert(category, loaded.clone());
        loaded
    }
}
