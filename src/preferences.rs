//! Persisted user preferences in a single SQLite key/value table.
//!
//! Values that fail to parse are logged and treated as absent, so callers
//! always get a usable default back.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::chart::Theme;
use crate::market::DATE_FORMAT;

const THEME_KEY: &str = "theme";
const FONT_SIZE_KEY: &str = "font_size";
const ENABLED_PORTS_KEY: &str = "enabled_ports";
const TOGGLES_KEY: &str = "toggles";

#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("failed to create preference directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to encode preference {key}: {source}")]
    Encode {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("preference store lock poisoned")]
    LockPoisoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontSize {
    Small,
    #[default]
    Medium,
    Large,
}

impl FontSize {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "small" => Some(Self::Small),
            "medium" => Some(Self::Medium),
            "large" => Some(Self::Large),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }
}

/// Named boolean switches. Names never written are absent, not `false`.
pub type Toggles = BTreeMap<String, bool>;

pub struct PreferenceStore {
    conn: Mutex<Connection>,
}

fn memo_key(date: NaiveDate, port: &str) -> String {
    format!("memo:{}:{port}", date.format(DATE_FORMAT))
}

impl PreferenceStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PreferenceError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, PreferenceError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, PreferenceError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS preferences (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn get_raw(&self, key: &str) -> Result<Option<String>, PreferenceError> {
        let conn = self.conn.lock().map_err(|_| PreferenceError::LockPoisoned)?;
        let value = conn
            .query_row(
                "SELECT value FROM preferences WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<(), PreferenceError> {
        let conn = self.conn.lock().map_err(|_| PreferenceError::LockPoisoned)?;
        conn.execute(
            "INSERT INTO preferences (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), PreferenceError> {
        let conn = self.conn.lock().map_err(|_| PreferenceError::LockPoisoned)?;
        conn.execute("DELETE FROM preferences WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        key: &'static str,
    ) -> Result<Option<T>, PreferenceError> {
        let Some(raw) = self.get_raw(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                warn!(
                    component = "preferences",
                    event = "preferences.value.corrupt",
                    key,
                    error = %err
                );
                Ok(None)
            }
        }
    }

    fn set_json<T: Serialize>(&self, key: &'static str, value: &T) -> Result<(), PreferenceError> {
        let encoded =
            serde_json::to_string(value).map_err(|source| PreferenceError::Encode { key, source })?;
        self.set_raw(key, &encoded)
    }

    pub fn memo(&self, date: NaiveDate, port: &str) -> Result<Option<String>, PreferenceError> {
        self.get_raw(&memo_key(date, port))
    }

    /// Blank text removes the memo.
    pub fn set_memo(&self, date: NaiveDate, port: &str, text: &str) -> Result<(), PreferenceError> {
        let key = memo_key(date, port);
        if text.trim().is_empty() {
            self.delete(&key)
        } else {
            self.set_raw(&key, text)
        }
    }

    pub fn theme(&self) -> Result<Theme, PreferenceError> {
        Ok(self
            .parse_enum(THEME_KEY, Theme::parse)?
            .unwrap_or_default())
    }

    pub fn set_theme(&self, theme: Theme) -> Result<(), PreferenceError> {
        self.set_raw(THEME_KEY, theme.as_str())
    }

    pub fn font_size(&self) -> Result<FontSize, PreferenceError> {
        Ok(self
            .parse_enum(FONT_SIZE_KEY, FontSize::parse)?
            .unwrap_or_default())
    }

    pub fn set_font_size(&self, size: FontSize) -> Result<(), PreferenceError> {
        self.set_raw(FONT_SIZE_KEY, size.as_str())
    }

    /// `None` means nothing stored; the caller decides which ports are on by default.
    pub fn enabled_ports(&self) -> Result<Option<Vec<String>>, PreferenceError> {
        self.get_json(ENABLED_PORTS_KEY)
    }

    pub fn set_enabled_ports(&self, ports: &[String]) -> Result<(), PreferenceError> {
        self.set_json(ENABLED_PORTS_KEY, &ports)
    }

    pub fn toggles(&self) -> Result<Toggles, PreferenceError> {
        Ok(self.get_json(TOGGLES_KEY)?.unwrap_or_default())
    }

    pub fn set_toggle(&self, name: &str, enabled: bool) -> Result<(), PreferenceError> {
        let mut toggles = self.toggles()?;
        toggles.insert(name.to_string(), enabled);
        self.set_json(TOGGLES_KEY, &toggles)
    }

    fn parse_enum<T>(
        &self,
        key: &'static str,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Result<Option<T>, PreferenceError> {
        let Some(raw) = self.get_raw(key)? else {
            return Ok(None);
        };
        let parsed = parse(&raw);
        if parsed.is_none() {
            warn!(
                component = "preferences",
                event = "preferences.value.corrupt",
                key,
                value = %raw
            );
        }
        Ok(parsed)
    }

    #[cfg(test)]
    fn force_raw(&self, key: &str, value: &str) {
        self.set_raw(key, value).unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 2).unwrap()
    }

    #[test]
    fn defaults_when_nothing_stored() {
        let store = PreferenceStore::open_in_memory().unwrap();
        assert_eq!(store.theme().unwrap(), Theme::Dark);
        assert_eq!(store.font_size().unwrap(), FontSize::Medium);
        assert_eq!(store.enabled_ports().unwrap(), None);
        assert!(store.toggles().unwrap().is_empty());
        assert_eq!(store.memo(day(), "枕崎").unwrap(), None);
    }

    #[test]
    fn memo_is_keyed_by_date_and_port() {
        let store = PreferenceStore::open_in_memory().unwrap();
        store.set_memo(day(), "枕崎", "B1が高い").unwrap();
        store.set_memo(day(), "焼津", "静か").unwrap();

        assert_eq!(store.memo(day(), "枕崎").unwrap().as_deref(), Some("B1が高い"));
        assert_eq!(store.memo(day(), "焼津").unwrap().as_deref(), Some("静か"));
        assert_eq!(store.memo(day().succ_opt().unwrap(), "枕崎").unwrap(), None);

        store.set_memo(day(), "枕崎", "  ").unwrap();
        assert_eq!(store.memo(day(), "枕崎").unwrap(), None);
    }

    #[test]
    fn settings_overwrite_previous_values() {
        let store = PreferenceStore::open_in_memory().unwrap();
        store.set_theme(Theme::Ocean).unwrap();
        store.set_theme(Theme::Light).unwrap();
        store.set_font_size(FontSize::Large).unwrap();
        store
            .set_enabled_ports(&["焼津".to_string(), "山川".to_string()])
            .unwrap();
        store.set_toggle("show_volume", true).unwrap();
        store.set_toggle("show_ma", false).unwrap();

        assert_eq!(store.theme().unwrap(), Theme::Light);
        assert_eq!(store.font_size().unwrap(), FontSize::Large);
        assert_eq!(
            store.enabled_ports().unwrap(),
            Some(vec!["焼津".to_string(), "山川".to_string()])
        );
        let toggles = store.toggles().unwrap();
        assert_eq!(toggles.get("show_volume"), Some(&true));
        assert_eq!(toggles.get("show_ma"), Some(&false));
    }

    #[test]
    fn corrupt_values_read_as_defaults() {
        let store = PreferenceStore::open_in_memory().unwrap();
        store.force_raw(THEME_KEY, "sepia");
        store.force_raw(FONT_SIZE_KEY, "huge");
        store.force_raw(ENABLED_PORTS_KEY, "[\"焼津\",");
        store.force_raw(TOGGLES_KEY, "{\"a\": \"yes\"}");

        assert_eq!(store.theme().unwrap(), Theme::Dark);
        assert_eq!(store.font_size().unwrap(), FontSize::Medium);
        assert_eq!(store.enabled_ports().unwrap(), None);
        assert!(store.toggles().unwrap().is_empty());
    }
}
