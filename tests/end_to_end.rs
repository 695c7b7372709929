use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
    routing::post,
};
use http_body_util::BodyExt;
use notify_relay::bot::{BotService, dispatch_update};
use notify_relay::notifications::models::{Chat, IncomingMessage, Update};
use notify_relay::notifications::senders::NotificationSender;
use notify_relay::notifications::senders::telegram::TelegramSender;
use notify_relay::store::{SharedUserStore, UserStore};
use notify_relay::web::{AppState, create_axum_router};
use serde_json::{Value, json};
use tempfile::tempdir;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, watch};
use tower::ServiceExt;
use uuid::Uuid;

const TOKEN: &str = "e2e-token";

type Seen = Arc<Mutex<Vec<Value>>>;

async fn spawn_http_server(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

/// Fake Bot API: records every sendMessage body, and hands out `pending`
/// updates once from getUpdates.
async fn spawn_telegram_stub(pending: Vec<Value>) -> (String, Seen, Seen) {
    let sent: Seen = Arc::default();
    let polls: Seen = Arc::default();
    let pending = Arc::new(Mutex::new(pending));

    let sent_in_handler = sent.clone();
    let send_message = move |Json(body): Json<Value>| {
        let sent = sent_in_handler.clone();
        async move {
            sent.lock().await.push(body);
            Json(json!({ "ok": true, "result": { "message_id": 1 } }))
        }
    };

    let polls_in_handler = polls.clone();
    let get_updates = move |Json(body): Json<Value>| {
        let polls = polls_in_handler.clone();
        let pending = pending.clone();
        async move {
            polls.lock().await.push(body);
            let updates: Vec<Value> = pending.lock().await.drain(..).collect();
            if updates.is_empty() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            Json(json!({ "ok": true, "result": updates }))
        }
    };

    let app = Router::new()
        .route(&format!("/bot{TOKEN}/sendMessage"), post(send_message))
        .route(&format!("/bot{TOKEN}/getUpdates"), post(get_updates));
    (spawn_http_server(app).await, sent, polls)
}

fn command(update_id: i64, chat_id: i64, text: &str) -> Update {
    Update {
        update_id,
        message: Some(IncomingMessage {
            chat: Chat { id: chat_id },
            text: Some(text.to_string()),
        }),
    }
}

async fn push(router: &Router, plugin_id: &str, message: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/send_message")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "plugin_id": plugin_id, "message": message }).to_string(),
        ))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn register_push_unsubscribe_remove() {
    let (base, sent, _) = spawn_telegram_stub(Vec::new()).await;
    let telegram = TelegramSender::new(base, TOKEN, Duration::from_secs(5)).unwrap();

    let dir = tempdir().unwrap();
    let store: SharedUserStore = Arc::new(Mutex::new(
        UserStore::load(dir.path().join("users.json")).unwrap(),
    ));
    let router = create_axum_router(AppState {
        store: store.clone(),
        sender: Arc::new(telegram.clone()) as Arc<dyn NotificationSender>,
    });

    dispatch_update(&store, &telegram, &command(1, 42, "/start")).await;
    let reply = sent.lock().await[0].clone();
    assert_eq!(reply["chat_id"], 42);
    let text = reply["text"].as_str().unwrap();
    let plugin_id = text.split('`').nth(1).unwrap().to_string();
    assert!(Uuid::parse_str(&plugin_id).is_ok());

    let (status, body) = push(&router, &plugin_id, "hi").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "status": "success", "message": format!("Message sent to {plugin_id}.") })
    );

    dispatch_update(&store, &telegram, &command(2, 42, "/stop")).await;
    let (status, body) = push(&router, &plugin_id, "hi").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        format!("User with UUID {plugin_id} is unsubscribed.")
    );

    dispatch_update(&store, &telegram, &command(3, 42, "/remove")).await;
    let (status, body) = push(&router, &plugin_id, "hi").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "User not found.");

    let deliveries: Vec<Value> = sent
        .lock()
        .await
        .iter()
        .filter(|body| body["text"] == "hi")
        .cloned()
        .collect();
    assert_eq!(
        deliveries,
        vec![json!({ "chat_id": 42, "text": "hi", "parse_mode": "HTML" })]
    );

    let persisted: Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("users.json")).unwrap())
            .unwrap();
    assert_eq!(persisted, json!({ "users": [] }));
}

#[tokio::test]
async fn bot_service_polls_and_answers() {
    let start = json!({
        "update_id": 100,
        "message": { "message_id": 5, "chat": { "id": 7, "type": "private" }, "text": "/start" }
    });
    let (base, sent, polls) = spawn_telegram_stub(vec![start]).await;
    let telegram = TelegramSender::new(base, TOKEN, Duration::from_secs(5)).unwrap();

    let dir = tempdir().unwrap();
    let store: SharedUserStore = Arc::new(Mutex::new(
        UserStore::load(dir.path().join("users.json")).unwrap(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let bot = BotService::new(telegram, store.clone(), Duration::from_secs(0));
    let task = tokio::spawn(bot.run(shutdown_rx));

    tokio::time::timeout(Duration::from_secs(5), async {
        while sent.lock().await.is_empty() || polls.lock().await.len() < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();

    let record = store.lock().await.find_by_chat_id(7).cloned().unwrap();
    assert!(record.subscribed);

    let sent = sent.lock().await;
    assert_eq!(sent[0]["chat_id"], 7);
    assert_eq!(
        sent[0]["text"],
        format!("Registration complete\\! Your UUID: `{}`", record.plugin_id)
    );

    let polls = polls.lock().await;
    assert_eq!(polls[0]["offset"], Value::Null);
    assert_eq!(polls[1]["offset"], 101);
}
