use chrono::NaiveDate;
use katsuo::{FontSize, PreferenceStore, Theme};

fn date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
}

#[test]
fn preferences_survive_reopening_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("prefs.sqlite3");

    {
        let store = PreferenceStore::open(&path).unwrap();
        store.set_theme(Theme::Ocean).unwrap();
        store.set_font_size(FontSize::Large).unwrap();
        store
            .set_enabled_ports(&["枕崎".to_string(), "山川".to_string()])
            .unwrap();
        store.set_toggle("moving_average", false).unwrap();
        store
            .set_memo(date("2025-05-02"), "枕崎", "大型が強い")
            .unwrap();
    }

    let store = PreferenceStore::open(&path).unwrap();
    assert_eq!(store.theme().unwrap(), Theme::Ocean);
    assert_eq!(store.font_size().unwrap(), FontSize::Large);
    assert_eq!(
        store.enabled_ports().unwrap(),
        Some(vec!["枕崎".to_string(), "山川".to_string()])
    );
    assert_eq!(store.toggles().unwrap().get("moving_average"), Some(&false));
    assert_eq!(
        store.memo(date("2025-05-02"), "枕崎").unwrap().as_deref(),
        Some("大型が強い")
    );
}

#[test]
fn memos_are_keyed_by_date_and_port() {
    let store = PreferenceStore::open_in_memory().unwrap();
    store.set_memo(date("2025-05-02"), "枕崎", "a").unwrap();
    store.set_memo(date("2025-05-02"), "焼津", "b").unwrap();
    store.set_memo(date("2025-05-03"), "枕崎", "c").unwrap();

    assert_eq!(store.memo(date("2025-05-02"), "枕崎").unwrap().as_deref(), Some("a"));
    assert_eq!(store.memo(date("2025-05-02"), "焼津").unwrap().as_deref(), Some("b"));
    assert_eq!(store.memo(date("2025-05-03"), "枕崎").unwrap().as_deref(), Some("c"));
    assert_eq!(store.memo(date("2025-05-04"), "枕崎").unwrap(), None);

    store.set_memo(date("2025-05-02"), "枕崎", "   ").unwrap();
    assert_eq!(store.memo(date("2025-05-02"), "枕崎").unwrap(), None);
}

#[test]
fn fresh_store_reports_defaults() {
    let store = PreferenceStore::open_in_memory().unwrap();
    assert_eq!(store.theme().unwrap(), Theme::default());
    assert_eq!(store.font_size().unwrap(), FontSize::Medium);
    assert_eq!(store.enabled_ports().unwrap(), None);
    assert!(store.toggles().unwrap().is_empty());
}
