//! Backend operations used by the services, and their HTTP implementation.

use async_trait::async_trait;

use crate::api::client::{ApiClient, ApiError};
use crate::api::types::{
    BackendConversation, BackendMessage, Edital, Page, PageQuery, TokenRequest, TokenResponse,
};

/// List and detail operations of the dashboard backend.
#[async_trait]
pub trait Backend: Send + Sync {
    /// GET /discussao/conversa/: one page of conversations.
    async fn list_conversations(
        &self,
        query: PageQuery,
    ) -> Result<Page<BackendConversation>, ApiError>;

    /// GET /discussao/conversa/{id}/
    async fn get_conversation(&self, id: i64) -> Result<BackendConversation, ApiError>;

    /// GET /discussao/mensagem/: one page of messages, optionally filtered by conversation.
    async fn list_messages(
        &self,
        query: PageQuery,
        conversation: Option<i64>,
    ) -> Result<Page<BackendMessage>, ApiError>;

    /// GET /discussao/mensagem/{id}/
    async fn get_message(&self, id: i64) -> Result<BackendMessage, ApiError>;

    /// GET /edital/edital/: one page of editals.
    async fn list_editals(&self, query: PageQuery) -> Result<Page<Edital>, ApiError>;

    /// POST /api-token-auth/: exchange credentials for a token.
    async fn obtain_token(&self, username: &str, password: &str) -> Result<String, ApiError>;
}

/// [`Backend`] over the REST API.
#[derive(Clone)]
pub struct HttpBackend {
    client: ApiClient,
}

impl HttpBackend {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }
}

/// Query string for a list request. Both size parameter spellings are sent; the backend
/// honors whichever one it knows.
fn list_query(query: PageQuery, conversation: Option<i64>) -> String {
    let mut s = format!(
        "?page={}&per_page={}&page_size={}",
        query.page, query.per_page, query.per_page
    );
    if let Some(id) = conversation {
        s.push_str(&format!("&conversa={}", id));
    }
    s
}

#[async_trait]
impl Backend for HttpBackend {
    async fn list_conversations(
        &self,
        query: PageQuery,
    ) -> Result<Page<BackendConversation>, ApiError> {
        let path = format!("/discussao/conversa/{}", list_query(query, None));
        let page: Page<BackendConversation> = self.client.get(&path).await?;
        log::debug!(
            "conversations page {} (echoed {}): {} records of {}",
            query.page,
            page.meta.current_page,
            page.data.len(),
            page.meta.total
        );
        Ok(page)
    }

    async fn get_conversation(&self, id: i64) -> Result<BackendConversation, ApiError> {
        self.client.get(&format!("/discussao/conversa/{}/", id)).await
    }

    async fn list_messages(
        &self,
        query: PageQuery,
        conversation: Option<i64>,
    ) -> Result<Page<BackendMessage>, ApiError> {
        let path = format!("/discussao/mensagem/{}", list_query(query, conversation));
        self.client.get(&path).await
    }

    async fn get_message(&self, id: i64) -> Result<BackendMessage, ApiError> {
        self.client.get(&format!("/discussao/mensagem/{}/", id)).await
    }

    async fn list_editals(&self, query: PageQuery) -> Result<Page<Edital>, ApiError> {
        let path = format!("/edital/edital/{}", list_query(query, None));
        self.client.get(&path).await
    }

    async fn obtain_token(&self, username: &str, password: &str) -> Result<String, ApiError> {
        let body = TokenRequest { username, password };
        let res: TokenResponse = self.client.post("/api-token-auth/", &body).await?;
        Ok(res.token)
    }
}
