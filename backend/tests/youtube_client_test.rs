//! `YouTubeClient` against a local stand-in for the Data API.

use outlier_finder::models::{DurationClass, SearchOrder, SearchParams};
use outlier_finder::services::youtube::{VideoSource, YouTubeClient};
use outlier_finder::ScanError;
use rocket::config::LogLevel;
use rocket::fairing::AdHoc;
use rocket::http::Status;
use rocket::response::content::RawJson;
use rocket::{get, routes, Config, State};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::{Ipv4Addr, TcpListener};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

const API_KEY: &str = "test-key";

#[derive(Debug, Clone)]
struct Recorded {
    resource: &'static str,
    query: HashMap<String, String>,
}

#[derive(Default)]
struct Recorder {
    requests: Mutex<Vec<Recorded>>,
}

impl Recorder {
    fn record(&self, resource: &'static str, query: &HashMap<String, String>) {
        self.requests.lock().unwrap().push(Recorded {
            resource,
            query: query.clone(),
        });
    }
}

type Reply = (Status, RawJson<String>);

fn ok(body: Value) -> Reply {
    (Status::Ok, RawJson(body.to_string()))
}

fn api_error(status: Status, message: &str, reason: &str) -> Reply {
    let body = json!({
        "error": {
            "code": status.code,
            "message": message,
            "errors": [{ "reason": reason }]
        }
    });
    (status, RawJson(body.to_string()))
}

fn id_list(query: &HashMap<String, String>) -> Vec<String> {
    query
        .get("id")
        .map(|ids| ids.split(',').map(String::from).collect())
        .unwrap_or_default()
}

#[get("/videos?<query..>")]
fn videos(query: HashMap<String, String>, recorder: &State<Arc<Recorder>>) -> Reply {
    recorder.record("videos", &query);
    if query.contains_key("chart") {
        chart_page(&query)
    } else {
        video_details(&query)
    }
}

/// Three pages: `p1a,p1b` -> `p2a` -> `p3a`, then no token.
fn chart_page(query: &HashMap<String, String>) -> Reply {
    match query.get("videoCategoryId").map(String::as_str) {
        Some("404") => {
            return api_error(
                Status::NotFound,
                "The requested video chart is not supported or is not available.",
                "videoChartNotFound",
            )
        }
        Some("quota") => {
            return api_error(
                Status::Forbidden,
                "The request cannot be completed because you have exceeded your quota.",
                "quotaExceeded",
            )
        }
        _ => {}
    }

    let (ids, next) = match query.get("pageToken").map(String::as_str) {
        None => (vec!["p1a", "p1b"], Some("p2")),
        Some("p2") => (vec!["p2a"], Some("p3")),
        _ => (vec!["p3a"], None),
    };
    let items: Vec<Value> = ids.iter().map(|id| json!({ "id": id })).collect();
    ok(json!({ "items": items, "nextPageToken": next }))
}

/// Ids starting with `gone` behave like deleted videos.
fn video_details(query: &HashMap<String, String>) -> Reply {
    let items: Vec<Value> = id_list(query)
        .iter()
        .filter(|id| !id.starts_with("gone"))
        .map(|id| {
            json!({
                "id": id,
                "snippet": {
                    "title": format!("Title {id}"),
                    "channelId": format!("UC_{id}"),
                    "channelTitle": "Channel",
                    "publishedAt": "2024-05-01T08:00:00Z"
                },
                "statistics": { "viewCount": "1000" },
                "contentDetails": { "duration": "PT5M" }
            })
        })
        .collect();
    ok(json!({ "items": items }))
}

#[get("/channels?<query..>")]
fn channels(query: HashMap<String, String>, recorder: &State<Arc<Recorder>>) -> Reply {
    recorder.record("channels", &query);
    let items: Vec<Value> = id_list(&query)
        .iter()
        .map(|id| {
            if id == "UC_hidden" {
                json!({ "id": id, "statistics": { "hiddenSubscriberCount": true } })
            } else {
                json!({ "id": id, "statistics": { "subscriberCount": "1234" } })
            }
        })
        .collect();
    ok(json!({ "items": items }))
}

#[get("/search?<query..>")]
fn search(query: HashMap<String, String>, recorder: &State<Arc<Recorder>>) -> Reply {
    recorder.record("search", &query);
    let q = query.get("q").cloned().unwrap_or_default();
    ok(json!({
        "items": [
            { "id": { "kind": "youtube#video", "videoId": format!("{q}-1") } },
            { "id": { "kind": "youtube#channel", "channelId": "UC_result" } }
        ]
    }))
}

#[get("/videoCategories?<query..>")]
fn video_categories(query: HashMap<String, String>, recorder: &State<Arc<Recorder>>) -> Reply {
    recorder.record("videoCategories", &query);
    ok(json!({
        "items": [
            { "id": "10", "snippet": { "title": "Music", "assignable": true } },
            { "id": "42", "snippet": { "title": "Shorts", "assignable": false } },
            { "id": "2", "snippet": { "title": "autos & Vehicles", "assignable": true } }
        ]
    }))
}

struct StubApi {
    base_url: String,
    recorder: Arc<Recorder>,
}

impl StubApi {
    async fn start() -> Self {
        let port = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .and_then(|listener| listener.local_addr())
            .unwrap()
            .port();

        let config = Config {
            address: Ipv4Addr::LOCALHOST.into(),
            port,
            log_level: LogLevel::Off,
            ..Config::debug_default()
        };

        let recorder = Arc::new(Recorder::default());
        let (ready_tx, ready_rx) = oneshot::channel();
        let rocket = rocket::custom(config)
            .manage(recorder.clone())
            .mount(
                "/v3",
                routes![videos, channels, search, video_categories],
            )
            .attach(AdHoc::on_liftoff("Stub ready", move |_| {
                Box::pin(async move {
                    let _ = ready_tx.send(());
                })
            }));

        tokio::spawn(rocket.launch());
        ready_rx.await.unwrap();

        Self {
            base_url: format!("http://127.0.0.1:{port}/v3/"),
            recorder,
        }
    }

    fn client(&self) -> YouTubeClient {
        YouTubeClient::with_base_url(API_KEY.to_string(), self.base_url.clone())
    }

    fn requests(&self, resource: &str) -> Vec<Recorded> {
        self.recorder
            .requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.resource == resource)
            .cloned()
            .collect()
    }

    fn batch_sizes(&self, resource: &str) -> Vec<usize> {
        self.requests(resource)
            .iter()
            .map(|r| id_list(&r.query).len())
            .collect()
    }
}

fn numbered(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{prefix}{i}")).collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn chart_paging_stops_when_token_runs_out() {
    let stub = StubApi::start().await;
    let client = stub.client();

    let ids = client.list_most_popular("US", None, 50, 10).await.unwrap();

    assert_eq!(ids, vec!["p1a", "p1b", "p2a", "p3a"]);
    let requests = stub.requests("videos");
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0].query.get("chart").map(String::as_str), Some("mostPopular"));
    assert_eq!(requests[0].query.get("regionCode").map(String::as_str), Some("US"));
    assert_eq!(requests[0].query.get("key").map(String::as_str), Some(API_KEY));
    assert!(requests[0].query.get("pageToken").is_none());
    assert_eq!(requests[2].query.get("pageToken").map(String::as_str), Some("p3"));
    assert_eq!(client.quota_used(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn chart_paging_is_bounded_by_max_pages() {
    let stub = StubApi::start().await;
    let client = stub.client();

    let ids = client.list_most_popular("DE", None, 2, 2).await.unwrap();

    assert_eq!(ids, vec!["p1a", "p1b", "p2a"]);
    let requests = stub.requests("videos");
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].query.get("maxResults").map(String::as_str), Some("2"));
}

#[tokio::test(flavor = "multi_thread")]
async fn category_chart_errors_are_classified() {
    let stub = StubApi::start().await;
    let client = stub.client();

    let missing = client
        .list_most_popular("US", Some("404"), 50, 1)
        .await
        .unwrap_err();
    assert!(matches!(missing, ScanError::RemoteUnavailable(ref msg) if msg.contains("chart")));
    assert!(missing.is_recoverable());

    let quota = client
        .list_most_popular("US", Some("quota"), 50, 1)
        .await
        .unwrap_err();
    assert!(matches!(quota, ScanError::QuotaExceeded(_)));
    assert!(!quota.is_recoverable());

    let requests = stub.requests("videos");
    assert_eq!(
        requests[0].query.get("videoCategoryId").map(String::as_str),
        Some("404")
    );
    // Failed calls are still charged.
    assert_eq!(client.quota_used(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn video_details_are_batched_by_fifty() {
    let stub = StubApi::start().await;
    let client = stub.client();
    let mut ids = numbered("v", 118);
    ids.push("gone1".to_string());
    ids.push("gone2".to_string());

    let videos = client.get_video_details(&ids).await.unwrap();

    assert_eq!(stub.batch_sizes("videos"), vec![50, 50, 20]);
    assert_eq!(videos.len(), 118);
    assert_eq!(videos[0].video_id, "v0");
    assert_eq!(videos[0].channel_id, "UC_v0");
    assert_eq!(videos[0].view_count, 1000);
    assert_eq!(videos[0].duration_iso, "PT5M");
    let part = stub.requests("videos")[0].query.get("part").cloned();
    assert_eq!(part.as_deref(), Some("snippet,statistics,contentDetails"));
    assert_eq!(client.quota_used(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn channel_lookups_skip_empty_ids_and_batch() {
    let stub = StubApi::start().await;
    let client = stub.client();
    let mut ids = numbered("UC_c", 59);
    ids.insert(10, String::new());
    ids.insert(30, String::new());
    ids.push("UC_hidden".to_string());

    let subs = client.get_channel_subscriptions(&ids).await.unwrap();

    assert_eq!(stub.batch_sizes("channels"), vec![50, 10]);
    assert_eq!(subs.len(), 60);
    assert!(!subs.contains_key(""));
    assert_eq!(subs["UC_c0"], Some(1234));
    assert_eq!(subs["UC_hidden"], None);
}

#[tokio::test(flavor = "multi_thread")]
async fn search_sends_filters_and_keeps_video_results() {
    let stub = StubApi::start().await;
    let client = stub.client();
    let params = SearchParams {
        query: "retro synth",
        region: "GB",
        language: Some("en"),
        max_results: 25,
        duration_class: DurationClass::Medium,
        order: SearchOrder::ViewCount,
    };

    let ids = client.search(&params).await.unwrap();

    assert_eq!(ids, vec!["retro synth-1"]);
    let query = &stub.requests("search")[0].query;
    assert_eq!(query.get("type").map(String::as_str), Some("video"));
    assert_eq!(query.get("q").map(String::as_str), Some("retro synth"));
    assert_eq!(query.get("videoDuration").map(String::as_str), Some("medium"));
    assert_eq!(query.get("order").map(String::as_str), Some("viewCount"));
    assert_eq!(query.get("relevanceLanguage").map(String::as_str), Some("en"));
    assert_eq!(query.get("maxResults").map(String::as_str), Some("25"));
    assert_eq!(client.quota_used(), 100);
}

#[tokio::test(flavor = "multi_thread")]
async fn categories_are_assignable_and_sorted() {
    let stub = StubApi::start().await;
    let client = stub.client();

    let categories = client.list_categories("FR").await.unwrap();

    let ids: Vec<&str> = categories.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["2", "10"]);
    let query = &stub.requests("videoCategories")[0].query;
    assert_eq!(query.get("regionCode").map(String::as_str), Some("FR"));
}
