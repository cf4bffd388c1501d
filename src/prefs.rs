use std::{
    fs,
    io::ErrorKind,
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::Error;

/// Small key-value store kept between sessions as a json file.
/// Without a path it lives in memory only.
#[derive(Clone, Default)]
pub struct Preferences {
    path: Option<PathBuf>,
    values: Arc<Mutex<Map<String, Value>>>,
}

impl Preferences {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn load(path: PathBuf) -> Result<Self, Error> {
        debug!(prefs = ?path, "load preferences");

        let values = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|error| {
                warn!(prefs = ?path, %error, "preferences are unreadable, start empty");
                Map::new()
            }),
            Err(error) if error.kind() == ErrorKind::NotFound => Map::new(),
            Err(error) => return Err(error.into()),
        };

        Ok(Self {
            path: Some(path),
            values: Arc::new(Mutex::new(values)),
        })
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<(), Error> {
        let text = {
            let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
            values.insert(key.to_owned(), value.into());
            serde_json::to_string_pretty(&*values)?
        };

        if let Some(path) = &self.path {
            debug!(prefs = ?path, key, "store preferences");
            fs::write(path, text)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn in_memory_values() {
        let prefs = Preferences::in_memory();
        assert_eq!(prefs.get("filter"), None);

        prefs.set("filter", 2).unwrap();
        assert_eq!(prefs.get("filter"), Some(json!(2)));
    }

    #[test]
    fn persisted_between_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let prefs = Preferences::load(path.clone()).unwrap();
        assert_eq!(prefs.get("filter"), None);
        prefs.set("filter", 3).unwrap();

        let prefs = Preferences::load(path).unwrap();
        assert_eq!(prefs.get("filter"), Some(json!(3)));
    }

    #[test]
    fn unreadable_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        fs::write(&path, "{ not json").unwrap();

        let prefs = Preferences::load(path).unwrap();

        assert_eq!(prefs.get("filter"), None);
    }
}
