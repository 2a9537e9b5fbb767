//! Integration test: serve a mock of the dashboard REST backend on a free port and drive the
//! real HTTP client, the page-echo workaround, metrics, and login against it.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use painel::api::{ApiClient, ApiError, Backend, HttpBackend, PageQuery};
use painel::auth::{AuthService, CredentialStore, LoginCredentials};
use painel::config::{Config, PaginationConfig};
use painel::conversations::{ConversationService, PageSource};
use painel::metrics::MetricsService;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const TOKEN: &str = "tok-e2e";

struct Mock {
    conversations: Vec<Value>,
    messages: Vec<Value>,
    editals: Vec<Value>,
    /// When false, every list response claims to be page 1.
    echo_page: bool,
}

#[derive(Deserialize)]
struct ListParams {
    page: Option<u32>,
    per_page: Option<u32>,
    conversa: Option<i64>,
}

fn conversation(id: i64) -> Value {
    json!({
        "id": id,
        "session_id": null,
        "iniciada_em": format!("2024-04-{:02}T09:00:00Z", (id % 28) + 1),
        "encerrada_em": null,
        "ultima_mensagem_em": format!("2024-04-{:02}T09:10:00Z", (id % 28) + 1),
        "polymorphic_ctype": 7,
        "questionador": { "id": 500 + id, "nome": "Q", "contato": format!("q{}@example.org", id), "papel": "QUESTIONANTE", "polymorphic_ctype": 3 },
        "respondente": { "id": 1, "nome": "Bot", "contato": "", "papel": "RESPONDENTE", "polymorphic_ctype": 3 }
    })
}

fn message(id: i64, conversa: i64, papel: &str, criada_em: &str) -> Value {
    let autor_id = if papel == "RESPONDENTE" { 1 } else { 500 + conversa };
    json!({
        "id": id,
        "texto": format!("texto {}", id),
        "payload": {},
        "criada_em": criada_em,
        "conversa": { "id": conversa, "session_id": null, "iniciada_em": "", "encerrada_em": null,
                      "ultima_mensagem_em": "", "polymorphic_ctype": 7, "questionador": 500 + conversa, "respondente": 1 },
        "autor": { "id": autor_id, "nome": "x", "contato": "", "papel": papel },
        "itensdeconhecimento": []
    })
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Token {}", TOKEN))
        .unwrap_or(false)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "detail": "As credenciais de autenticação não foram fornecidas." })),
    )
        .into_response()
}

fn envelope(mock: &Mock, records: &[Value], params: &ListParams) -> Response {
    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.per_page.unwrap_or(10).clamp(1, 100);
    let start = (page as usize - 1) * per_page as usize;
    let data: Vec<Value> = records.iter().skip(start).take(per_page as usize).cloned().collect();
    let echoed = if mock.echo_page { page } else { 1 };
    Json(json!({
        "meta": {
            "current_page": echoed,
            "per_page": per_page,
            "max_per_page": 100,
            "total": records.len()
        },
        "data": data
    }))
    .into_response()
}

async fn list_conversations(
    State(mock): State<Arc<Mock>>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    envelope(&mock, &mock.conversations, &params)
}

async fn get_conversation(
    State(mock): State<Arc<Mock>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    match mock.conversations.iter().find(|c| c["id"] == json!(id)) {
        Some(c) => Json(c.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({ "detail": "Não encontrado." }))).into_response(),
    }
}

async fn list_messages(
    State(mock): State<Arc<Mock>>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let filtered: Vec<Value> = mock
        .messages
        .iter()
        .filter(|m| params.conversa.map_or(true, |id| m["conversa"]["id"] == json!(id)))
        .cloned()
        .collect();
    envelope(&mock, &filtered, &params)
}

async fn get_message(headers: HeaderMap, Path(_id): Path<i64>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    (
        StatusCode::FORBIDDEN,
        Json(json!({ "detail": "Você não tem permissão para executar essa ação." })),
    )
        .into_response()
}

async fn list_editals(
    State(mock): State<Arc<Mock>>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    envelope(&mock, &mock.editals, &params)
}

async fn obtain_token(Json(body): Json<Value>) -> Response {
    if body["username"] == "admin" && body["password"] == "admin123" {
        Json(json!({ "token": TOKEN })).into_response()
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "non_field_errors": ["Impossível fazer login com as credenciais fornecidas."] })),
        )
            .into_response()
    }
}

async fn start_mock(echo_page: bool) -> String {
    let mut messages = Vec::new();
    for c in 1..=3 {
        messages.push(message(c * 10 + 2, c, "RESPONDENTE", "2024-04-01T09:00:05Z"));
        messages.push(message(c * 10 + 1, c, "QUESTIONANTE", "2024-04-01T09:00:00Z"));
    }
    let mock = Arc::new(Mock {
        conversations: (1..=35).map(conversation).collect(),
        messages,
        editals: (1..=4)
            .map(|i| json!({ "id": i, "nome": format!("Edital {}", i), "arquivo": "e.pdf",
                             "metadata": { "link": "" }, "numero": null, "status": "ATIVO",
                             "tags": null, "setor_responsavel": { "id": 1, "nome": "TI", "telefone": "" } }))
            .collect(),
        echo_page,
    });
    let app = Router::new()
        .route("/discussao/conversa/", get(list_conversations))
        .route("/discussao/conversa/:id/", get(get_conversation))
        .route("/discussao/mensagem/", get(list_messages))
        .route("/discussao/mensagem/:id/", get(get_message))
        .route("/edital/edital/", get(list_editals))
        .route("/api-token-auth/", post(obtain_token))
        .with_state(mock);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind free port");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}", addr)
}

async fn authed_backend(base_url: String) -> Arc<HttpBackend> {
    let client = ApiClient::new(Some(base_url));
    client.set_token(Some(TOKEN.to_string())).await;
    Arc::new(HttpBackend::new(client))
}

fn no_counts() -> PaginationConfig {
    PaginationConfig {
        count_messages: false,
        ..PaginationConfig::default()
    }
}

#[tokio::test]
async fn login_then_authorized_requests() {
    let base_url = start_mock(true).await;
    let backend = Arc::new(HttpBackend::new(ApiClient::new(Some(base_url))));

    let err = backend
        .list_conversations(PageQuery::new(1, 10))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));

    let dir = std::env::temp_dir().join(format!("painel-http-test-{}", uuid::Uuid::new_v4()));
    let auth = AuthService::new(backend.clone(), CredentialStore::new(dir.join("credentials.json")));
    let bad = auth
        .login(&LoginCredentials {
            username: "admin".to_string(),
            password: "nope".to_string(),
        })
        .await;
    assert!(bad.is_err());

    let session = auth
        .login(&LoginCredentials {
            username: "admin".to_string(),
            password: "admin123".to_string(),
        })
        .await
        .expect("login");
    assert_eq!(session.tokens.access, TOKEN);
    backend.client().set_token(Some(session.tokens.access)).await;

    let page = backend
        .list_conversations(PageQuery::new(2, 10))
        .await
        .expect("authorized list");
    assert_eq!(page.meta.current_page, 2);
    assert_eq!(page.meta.total, 35);
    assert_eq!(page.data[0].id, 11);
    assert_eq!(auth.current_user().await.expect("stored user").name, "admin");
}

#[tokio::test]
async fn backend_errors_map_to_api_errors() {
    let backend = authed_backend(start_mock(true).await).await;

    let err = backend.get_conversation(999).await.unwrap_err();
    match err {
        ApiError::Api { status, detail } => {
            assert_eq!(status, 404);
            assert_eq!(detail, "Não encontrado.");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(matches!(
        backend.get_message(1).await.unwrap_err(),
        ApiError::Forbidden
    ));
}

#[tokio::test]
async fn page_echo_mismatch_is_sliced_locally() {
    let backend = authed_backend(start_mock(false).await).await;
    let svc = ConversationService::new(backend, no_counts(), Duration::from_secs(300));

    let page = svc.list_page(2, 10).await.expect("page 2");
    assert_eq!(page.source, PageSource::LocalSlice);
    assert_eq!(page.meta.total, 35);
    let ids: Vec<String> = page.sessions.iter().map(|s| s.id.clone()).collect();
    let expected: Vec<String> = (11..=20).map(|i: i64| i.to_string()).collect();
    assert_eq!(ids, expected);
    // open conversations end at their last message
    assert_eq!(page.sessions[0].end_time, "2024-04-12T09:10:00Z");
}

#[tokio::test]
async fn honored_pages_and_message_counts() {
    let backend = authed_backend(start_mock(true).await).await;
    let svc = ConversationService::new(backend, PaginationConfig::default(), Duration::from_secs(300));

    let page = svc.list_page(1, 5).await.expect("page 1");
    assert_eq!(page.source, PageSource::Backend);
    let counts: Vec<u64> = page.sessions.iter().map(|s| s.message_count).collect();
    assert_eq!(counts, [2, 2, 2, 0, 0]);

    let detail = svc.conversation_detail(2).await.expect("detail");
    let messages = detail.session.messages.expect("messages");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].id, "21");
    assert_eq!(serde_json::to_value(messages[1].role).unwrap(), json!("bot"));
}

#[tokio::test]
async fn metrics_collections_over_http() {
    let backend = authed_backend(start_mock(true).await).await;
    let mut config = Config::default();
    config.metrics.page_size = 2;
    let svc = MetricsService::from_config(backend, &config);

    let data = svc.all_data().await;
    assert_eq!(data.conversations.items.len(), 35);
    let ids: Vec<i64> = data.conversations.items.iter().map(|c| c.id).collect();
    assert_eq!(ids, (1..=35).collect::<Vec<i64>>());
    assert_eq!(data.messages.items.len(), 6);
    assert_eq!(data.editals.items.len(), 4);

    let summary = data.summary();
    assert_eq!(summary.bot_messages, 3);
    assert_eq!(summary.total_editals, 4);
    assert_eq!(svc.cache_status().await.len(), 3);
}
