mod common;

use backing_relayer::screening::{Screener, ScreeningClient};
use backing_relayer::{Address, ScreeningError};
use common::{spawn_screening, ScreeningReply, ScreeningState};
use serde_json::json;
use std::time::Duration;

const A: Address = Address::repeat_byte(0xaa);
const B: Address = Address::repeat_byte(0xbb);

fn client(url: &str, fail_open: bool) -> ScreeningClient {
    ScreeningClient::new(url, Duration::from_secs(5), fail_open).unwrap()
}

#[tokio::test]
async fn test_flagged_addresses_returned() {
    let state = ScreeningState::new(ScreeningReply::Flag(vec![format!("0x{}", "bb".repeat(20))]));
    let url = spawn_screening(state.clone()).await;

    let flagged = client(&url, false).classify(&[A, B]).await.unwrap();

    assert_eq!(flagged.len(), 1);
    assert!(flagged.contains(&B));
}

#[tokio::test]
async fn test_request_body_lists_lowercase_addresses() {
    let state = ScreeningState::new(ScreeningReply::Flag(Vec::new()));
    let url = spawn_screening(state.clone()).await;
    let mixed: Address = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        .parse()
        .unwrap();

    client(&url, false).classify(&[A, mixed]).await.unwrap();

    assert_eq!(
        state.requests(),
        vec![json!({
            "addresses": [
                format!("0x{}", "aa".repeat(20)),
                "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
            ]
        })]
    );
}

#[tokio::test]
async fn test_server_error_fail_open_treats_all_clean() {
    let state = ScreeningState::new(ScreeningReply::Status(500));
    let url = spawn_screening(state.clone()).await;

    let flagged = client(&url, true).classify(&[A, B]).await.unwrap();

    assert!(flagged.is_empty());
    assert_eq!(state.requests().len(), 1);
}

#[tokio::test]
async fn test_server_error_fail_closed_surfaces_status() {
    let state = ScreeningState::new(ScreeningReply::Status(503));
    let url = spawn_screening(state).await;

    let err = client(&url, false).classify(&[A]).await.unwrap_err();

    assert!(matches!(err, ScreeningError::Status(503)));
}

#[tokio::test]
async fn test_empty_input_makes_no_request() {
    let state = ScreeningState::new(ScreeningReply::Flag(Vec::new()));
    let url = spawn_screening(state.clone()).await;

    assert!(client(&url, false).classify(&[]).await.unwrap().is_empty());
    assert!(state.requests().is_empty());
}

#[tokio::test]
async fn test_request_verdicts_exposes_raw_classification() {
    let state = ScreeningState::new(ScreeningReply::Flag(vec![format!("0x{}", "aa".repeat(20))]));
    let url = spawn_screening(state).await;

    let response = client(&url, false).request_verdicts(&[A, B]).await.unwrap();

    assert_eq!(response.verdicts.len(), 2);
    assert!(response.verdicts[0].is_bot);
    assert_eq!(response.verdicts[0].category.as_deref(), Some("flagged"));
    assert!(!response.verdicts[1].is_flagged());
}

#[tokio::test]
async fn test_null_is_bot_does_not_hide_blocked_neighbour() {
    let state = ScreeningState::new(ScreeningReply::Raw(json!({
        "verdicts": [
            {"address": format!("0x{}", "aa".repeat(20)), "is_bot": null, "category": "clean"},
            {"address": format!("0x{}", "bb".repeat(20)), "is_bot": false, "category": "blocked"}
        ]
    })));
    let url = spawn_screening(state).await;

    let flagged = client(&url, true).classify(&[A, B]).await.unwrap();

    assert_eq!(flagged.len(), 1);
    assert!(flagged.contains(&B));
}

#[tokio::test]
async fn test_malformed_verdict_does_not_drop_others() {
    let state = ScreeningState::new(ScreeningReply::Raw(json!({
        "verdicts": [
            {"is_bot": true},
            {"address": format!("0x{}", "bb".repeat(20)), "is_bot": true}
        ]
    })));
    let url = spawn_screening(state).await;

    let flagged = client(&url, true).classify(&[A, B]).await.unwrap();

    assert_eq!(flagged.len(), 1);
    assert!(flagged.contains(&B));
}
