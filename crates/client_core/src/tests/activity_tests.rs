use super::*;
use crate::testing::ScriptedRemote;
use shared::error::{ErrorKind, TransportError};

fn activity_remote() -> ScriptedRemote {
    ScriptedRemote::new()
        .reply_any("activity_list", vec!["movie", "music", "off"])
        .reply_any("activity_current", "music")
        .reply("activity_info", &["movie"], "Watch a movie")
        .reply("activity_info", &["music"], "Listen to music")
        .reply("activity_info", &["off"], "All off")
}

#[tokio::test]
async fn catalog_keeps_server_order_and_marks_current() {
    let remote = activity_remote();

    let outcome = fetch_activities(&remote).await;

    assert!(outcome.is_complete());
    let catalog = outcome.value;
    let ids: Vec<&str> = catalog
        .activities()
        .iter()
        .map(|activity| activity.id.as_str())
        .collect();
    assert_eq!(ids, vec!["movie", "music", "off"]);
    assert_eq!(catalog.current().map(ActivityId::as_str), Some("music"));
    assert_eq!(catalog.current_index(), Some(1));
    assert_eq!(
        catalog.get("movie").map(|activity| activity.description.as_str()),
        Some("Watch a movie")
    );
}

#[tokio::test]
async fn empty_current_activity_means_none_running() {
    let remote = ScriptedRemote::new()
        .reply_any("activity_list", vec!["movie"])
        .reply_any("activity_current", "")
        .reply_any("activity_info", "Watch a movie");

    let catalog = fetch_activities(&remote).await.value;

    assert_eq!(catalog.current(), None);
    assert_eq!(catalog.current_index(), None);
}

#[tokio::test]
async fn failed_description_falls_back_to_id() {
    let remote = activity_remote().fail("activity_info", &["off"], || {
        TransportError::ConnectionRefused {
            endpoint: "stub".into(),
        }
    });

    let outcome = fetch_activities(&remote).await;

    assert_eq!(outcome.value.activities().len(), 3);
    assert_eq!(
        outcome.value.get("off").map(|activity| activity.description.as_str()),
        Some("off")
    );
    assert_eq!(
        outcome.error.map(|err| err.kind),
        Some(ErrorKind::Unreachable)
    );
}

#[tokio::test]
async fn list_failure_returns_empty_catalog() {
    let remote = ScriptedRemote::new()
        .fail_any("activity_list", || TransportError::HttpStatus { status: 404 });

    let outcome = fetch_activities(&remote).await;

    assert!(outcome.value.activities().is_empty());
    assert_eq!(
        outcome.error.map(|err| err.kind),
        Some(ErrorKind::WrongEndpoint)
    );
    assert_eq!(remote.count("activity_info").await, 0);
}

#[tokio::test]
async fn unconfigured_address_issues_no_calls() {
    let remote = ScriptedRemote::unconfigured();

    let outcome = fetch_activities(&remote).await;

    assert_eq!(
        outcome.error.map(|err| err.kind),
        Some(ErrorKind::ConfigMissing)
    );
    assert!(remote.calls().await.is_empty());
}
