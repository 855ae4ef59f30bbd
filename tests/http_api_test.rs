use std::collections::HashMap;
use std::io::Write;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

use fhost::{ClientError, HostService, HttpHostService, UploadOptions, UploadSource, Uploader};

/// Everything the in-process server saw, for post-hoc assertions.
#[derive(Default)]
struct Received {
    begin: Option<BeginRecord>,
    chunks: Vec<ChunkRecord>,
    end_ids: Vec<String>,
    discards: Vec<String>,
    simple: Option<SimpleRecord>,
    list_pages: Vec<String>,
    list_tokens: Vec<String>,
    deleted: Vec<String>,
}

struct BeginRecord {
    token: String,
    total: u64,
    filename: String,
}

struct ChunkRecord {
    upload_id: String,
    token: String,
    offset: u64,
    field_name: String,
    data: Vec<u8>,
}

struct SimpleRecord {
    token: String,
    field_name: String,
    filename: String,
    data: Vec<u8>,
}

type Shared = Arc<Mutex<Received>>;

fn header_string(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn begin(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.lock().unwrap().begin = Some(BeginRecord {
        token: header_string(&headers, "authorization"),
        total: header_string(&headers, "content-range").parse().unwrap(),
        filename: body["filename"].as_str().unwrap().to_string(),
    });
    Json(json!({ "id": "sess-42" }))
}

async fn chunk(
    State(state): State<Shared>,
    Path(upload_id): Path<String>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> &'static str {
    let field = multipart.next_field().await.unwrap().unwrap();
    let field_name = field.name().unwrap_or_default().to_string();
    let data = field.bytes().await.unwrap().to_vec();

    state.lock().unwrap().chunks.push(ChunkRecord {
        upload_id,
        token: header_string(&headers, "authorization"),
        offset: header_string(&headers, "content-range").parse().unwrap(),
        field_name,
        data,
    });
    "OK"
}

async fn end(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    let id = body["id"].as_str().unwrap().to_string();
    state.lock().unwrap().end_ids.push(id);
    Json(json!({ "id": "stored.bin", "existed": false }))
}

async fn discard(State(state): State<Shared>, Path(upload_id): Path<String>) -> &'static str {
    state.lock().unwrap().discards.push(upload_id);
    "OK"
}

async fn simple_upload(
    State(state): State<Shared>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Json<Value> {
    let field = multipart.next_field().await.unwrap().unwrap();
    let field_name = field.name().unwrap_or_default().to_string();
    let filename = field.file_name().unwrap_or_default().to_string();
    let data = field.bytes().await.unwrap().to_vec();

    state.lock().unwrap().simple = Some(SimpleRecord {
        token: header_string(&headers, "authorization"),
        field_name,
        filename,
        data,
    });
    Json(json!({ "id": "AbC.png", "existed": true }))
}

async fn list(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let mut received = state.lock().unwrap();
    received
        .list_pages
        .push(params.get("page").cloned().unwrap_or_default());
    received
        .list_tokens
        .push(header_string(&headers, "authorization"));
    Json(json!({
        "files": [
            { "id": "AbC.png", "filename": "photo.png", "bytes": 12345 },
            { "id": "xYz.iso", "filename": "disk.iso", "bytes": 999999999u64 },
        ],
        "total": 12,
    }))
}

async fn delete_file(State(state): State<Shared>, Path(id): Path<String>) -> &'static str {
    state.lock().unwrap().deleted.push(id);
    "OK"
}

fn manage_router(state: Shared) -> Router {
    Router::new()
        .route("/manage/upload/file", post(simple_upload))
        .route("/manage/upload/begin_chunks", post(begin))
        .route("/manage/upload/chunk/:upload_id", post(chunk))
        .route("/manage/upload/end_chunks", post(end))
        .route("/manage/upload/discard/:upload_id", post(discard))
        .route("/manage/files", get(list))
        .route("/manage/files/:id", delete(delete_file))
        .with_state(state)
}

async fn spawn_server(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn client_for(addr: SocketAddr) -> HttpHostService {
    HttpHostService::new(&format!("http://{addr}")).unwrap()
}

#[tokio::test]
async fn chunked_upload_speaks_the_manage_protocol() {
    let state: Shared = Shared::default();
    let addr = spawn_server(manage_router(Arc::clone(&state))).await;

    let api = Arc::new(client_for(addr));
    let uploader = Uploader::new(
        api as Arc<dyn HostService>,
        UploadOptions {
            threshold: 64,
            chunk_size: 50,
        },
    );

    let payload: Vec<u8> = (0..130u32).map(|i| i as u8).collect();
    let source = UploadSource::from_bytes("data.bin", payload.clone());

    let percents: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&percents);
    let receipt = uploader
        .upload(&source, Some("secret-token"), move |p| {
            sink.lock().unwrap().push(p)
        })
        .await
        .unwrap();

    assert_eq!(receipt.id, "stored.bin");
    assert!(!receipt.existed);

    let received = state.lock().unwrap();

    // 1. Begin carried the raw token, the total size, and the filename.
    let begin = received.begin.as_ref().unwrap();
    assert_eq!(begin.token, "secret-token");
    assert_eq!(begin.total, 130);
    assert_eq!(begin.filename, "data.bin");

    // 2. Every chunk hit the session URL with its byte offset; the parts
    //    reassemble into the original payload.
    assert_eq!(received.chunks.len(), 3);
    let mut reassembled = vec![0u8; payload.len()];
    for chunk in &received.chunks {
        assert_eq!(chunk.upload_id, "sess-42");
        assert_eq!(chunk.token, "secret-token");
        assert_eq!(chunk.field_name, "chunk");
        let start = chunk.offset as usize;
        reassembled[start..start + chunk.data.len()].copy_from_slice(&chunk.data);
    }
    assert_eq!(reassembled, payload);

    let mut offsets: Vec<u64> = received.chunks.iter().map(|c| c.offset).collect();
    offsets.sort_unstable();
    assert_eq!(offsets, vec![0, 50, 100]);

    // 3. Exactly one finalize, no discard.
    assert_eq!(received.end_ids, vec!["sess-42"]);
    assert!(received.discards.is_empty());

    // 4. Progress ended at 100 and never went backwards.
    let percents = percents.lock().unwrap();
    assert_eq!(percents.last(), Some(&100));
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn path_backed_upload_streams_chunks_from_disk() {
    let state: Shared = Shared::default();
    let addr = spawn_server(manage_router(Arc::clone(&state))).await;

    let api = Arc::new(client_for(addr));
    let uploader = Uploader::new(
        api as Arc<dyn HostService>,
        UploadOptions {
            threshold: 64,
            chunk_size: 50,
        },
    );

    let payload: Vec<u8> = (0..130u32).map(|i| i as u8).collect();
    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    tmp.write_all(&payload).unwrap();
    let source = UploadSource::from_path(tmp.path()).await.unwrap();

    let receipt = uploader
        .upload(&source, Some("secret-token"), |_| {})
        .await
        .unwrap();
    assert_eq!(receipt.id, "stored.bin");

    // Each chunk body was read from the file at request time; the parts
    // the server saw still reassemble into the exact payload.
    let received = state.lock().unwrap();
    assert_eq!(received.chunks.len(), 3);
    let mut reassembled = vec![0u8; payload.len()];
    for chunk in &received.chunks {
        let start = chunk.offset as usize;
        reassembled[start..start + chunk.data.len()].copy_from_slice(&chunk.data);
    }
    assert_eq!(reassembled, payload);
}

#[tokio::test]
async fn simple_upload_sends_one_multipart_file_field() {
    let state: Shared = Shared::default();
    let addr = spawn_server(manage_router(Arc::clone(&state))).await;

    let api = Arc::new(client_for(addr));
    let uploader = Uploader::new(api as Arc<dyn HostService>, UploadOptions::default());

    let payload = b"tiny payload".to_vec();
    let source = UploadSource::from_bytes("photo.png", payload.clone());
    let receipt = uploader
        .upload(&source, Some("secret-token"), |_| {})
        .await
        .unwrap();

    assert_eq!(receipt.id, "AbC.png");
    assert!(receipt.existed, "server reported a deduplicated file");

    let received = state.lock().unwrap();
    let simple = received.simple.as_ref().unwrap();
    assert_eq!(simple.token, "secret-token");
    assert_eq!(simple.field_name, "file");
    assert_eq!(simple.filename, "photo.png");
    assert_eq!(simple.data, payload);
    assert!(received.begin.is_none(), "small files must not open a session");
}

#[tokio::test]
async fn server_error_body_is_the_error_message() {
    async fn forbidden() -> (StatusCode, &'static str) {
        (StatusCode::FORBIDDEN, "Forbidden")
    }
    let app = Router::new().route("/manage/upload/begin_chunks", post(forbidden));
    let addr = spawn_server(app).await;

    let api = client_for(addr);
    let err = api
        .begin_chunked_upload("bad-token", "data.bin", 1000)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Forbidden");
    match err {
        ClientError::Service { status, .. } => assert_eq!(status, 403),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn chunk_rejection_discards_the_session_over_http() {
    async fn failing_chunk(mut multipart: Multipart) -> (StatusCode, &'static str) {
        // Drain the body so the client finishes its streamed write.
        while let Some(field) = multipart.next_field().await.unwrap() {
            let _ = field.bytes().await;
        }
        (StatusCode::INTERNAL_SERVER_ERROR, "Chunk out of bounds")
    }

    let state: Shared = Shared::default();
    let app = Router::new()
        .route("/manage/upload/begin_chunks", post(begin))
        .route("/manage/upload/chunk/:upload_id", post(failing_chunk))
        .route("/manage/upload/end_chunks", post(end))
        .route("/manage/upload/discard/:upload_id", post(discard))
        .with_state(Arc::clone(&state));
    let addr = spawn_server(app).await;

    let api = Arc::new(client_for(addr));
    let uploader = Uploader::new(
        api as Arc<dyn HostService>,
        UploadOptions {
            threshold: 64,
            chunk_size: 50,
        },
    );

    let source = UploadSource::from_bytes("data.bin", vec![7u8; 130]);
    let err = uploader
        .upload(&source, Some("secret-token"), |_| {})
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Chunk out of bounds");

    let received = state.lock().unwrap();
    assert_eq!(received.discards, vec!["sess-42"]);
    assert!(received.end_ids.is_empty());
}

#[tokio::test]
async fn list_and_delete_round_trip() {
    let state: Shared = Shared::default();
    let addr = spawn_server(manage_router(Arc::clone(&state))).await;
    let api = client_for(addr);

    // Pages are 1-based: the first page goes over the wire as page=1.
    let page = api.list_files("secret-token", 1).await.unwrap();
    assert_eq!(page.total, 12);
    assert_eq!(page.page_count(), 2);
    assert_eq!(page.files.len(), 2);
    assert_eq!(page.files[0].id, "AbC.png");
    assert_eq!(page.files[1].bytes, 999999999);

    api.list_files("secret-token", 2).await.unwrap();
    api.delete_file("secret-token", "AbC.png").await.unwrap();

    let received = state.lock().unwrap();
    assert_eq!(received.list_pages, vec!["1", "2"]);
    assert_eq!(received.list_tokens, vec!["secret-token", "secret-token"]);
    assert_eq!(received.deleted, vec!["AbC.png"]);
}
