use std::fs;
use std::path::Path;

use katsuo::{fetcher_for_base, load_feeds, FeedPath, FeedPaths, FsFetcher, LoadOutcome};

const MARKET: &str = r#"{
    "枕崎": {"4.5kg上": [{"date": "2025/05/01", "price": 300, "volume": 10}]},
    "焼津": {"2.5kg上": "not a series"}
}"#;

const BIDS: &str = r#"[
    {"vesselName": "第一丸", "bidDate": "2025-05-03", "items": []},
    {"vesselName": "第二丸", "bidDate": "2025-05-05", "items": []}
]"#;

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn site() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("web")).unwrap();
    dir
}

#[test]
fn loads_feeds_from_site_layout() {
    let dir = site();
    write(dir.path(), "data/katsuo_market_data.json", MARKET);
    write(dir.path(), "data/katsuo_bid_schedule.json", BIDS);

    let fetcher = fetcher_for_base(dir.path().join("web").to_str().unwrap(), 1_000).unwrap();
    let outcome = load_feeds(fetcher.as_ref(), &FeedPaths::default());

    let LoadOutcome::Ready(feeds) = outcome else {
        panic!("expected ready outcome, got {outcome:?}");
    };
    assert_eq!(feeds.market.dataset.port_names().collect::<Vec<_>>(), vec!["枕崎"]);
    assert_eq!(feeds.market.issues.len(), 1);
    assert_eq!(feeds.market.issues[0].port, "焼津");
    assert_eq!(feeds.bids.len(), 2);
    assert!(feeds.news.is_empty());
}

#[test]
fn fallback_path_is_used_when_primary_is_missing() {
    let dir = site();
    write(dir.path(), "data/market.json", MARKET);

    let paths = FeedPaths {
        market: FeedPath {
            primary: "feeds/market.json".to_string(),
            fallback: "/data/market.json".to_string(),
        },
        ..FeedPaths::default()
    };
    let outcome = load_feeds(&FsFetcher::new(dir.path().join("web")), &paths);

    assert!(matches!(outcome, LoadOutcome::Ready(_)));
}

#[test]
fn missing_market_feed_fails_with_both_reasons() {
    let dir = site();
    write(dir.path(), "data/katsuo_news.json", "[]");

    let outcome = load_feeds(&FsFetcher::new(dir.path().join("web")), &FeedPaths::default());

    let LoadOutcome::Failed { reason } = &outcome else {
        panic!("expected failed outcome, got {outcome:?}");
    };
    assert!(reason.contains("market feed unavailable"));
    assert!(reason.contains("primary"));
    assert!(reason.contains("fallback"));

    let message = outcome.error_message().unwrap();
    assert!(message.contains("データの読み込みに失敗しました"));
    assert!(message.contains(reason.as_str()));
}

#[test]
fn undecodable_market_feed_fails_instead_of_rendering_empty() {
    let dir = site();
    write(dir.path(), "data/katsuo_market_data.json", "[1, 2, 3]");

    let outcome = load_feeds(&FsFetcher::new(dir.path().join("web")), &FeedPaths::default());

    let LoadOutcome::Failed { reason } = outcome else {
        panic!("expected failed outcome");
    };
    assert!(reason.contains("market feed could not be decoded"));
}

#[test]
fn corrupt_optional_feed_degrades_to_empty() {
    let dir = site();
    write(dir.path(), "data/katsuo_market_data.json", MARKET);
    write(dir.path(), "data/katsuo_news.json", "{\"oops\": true}");

    let outcome = load_feeds(&FsFetcher::new(dir.path().join("web")), &FeedPaths::default());

    let LoadOutcome::Ready(feeds) = outcome else {
        panic!("expected ready outcome");
    };
    assert!(feeds.news.is_empty());
    assert!(feeds.bids.is_empty());
}
