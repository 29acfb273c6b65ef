//! HTTP client for the remote tree store
//!
//! JSON over bearer auth:
//! - `GET /trees`, `GET /trees/mine`
//! - `POST /trees`
//! - `DELETE /trees/{id}`

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde_json::Value;
use tracing::debug;

use super::{wire, RemoteTreeStore};
use crate::error::RemoteError;
use crate::state::{NewTree, Scope, Session, Tree, TreeId};

const USER_AGENT: &str = concat!("canopy/", env!("CARGO_PKG_VERSION"));

/// Remote tree store reached over HTTP
pub struct HttpTreeStore {
    http_client: reqwest::Client,
    base_url: String,
    session: Session,
}

impl HttpTreeStore {
    pub fn new(base_url: &str, session: Session) -> Result<Self, RemoteError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `<base>/trees/<id>` with the id escaped as a single path segment
    fn tree_url(&self, id: &TreeId) -> Result<Url, RemoteError> {
        let mut url = Url::parse(&self.url("/trees"))
            .map_err(|e| RemoteError::Network(format!("invalid base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| RemoteError::Network("base URL cannot carry a path".to_string()))?
            .push(id.as_str());
        Ok(url)
    }

    /// Attach the live token, if any. A missing token is the server's
    /// call to reject, not ours.
    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send a request and map transport and status failures
    async fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(RemoteError::Unauthorized),
            StatusCode::NOT_FOUND => Err(RemoteError::NotFound),
            _ => {
                let body = response.text().await.unwrap_or_default();
                let message = wire::error_message(&body).unwrap_or(body);
                Err(RemoteError::Network(format!("HTTP {}: {}", status.as_u16(), message)))
            }
        }
    }

    async fn json(response: Response) -> Result<Value, RemoteError> {
        response
            .json()
            .await
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl RemoteTreeStore for HttpTreeStore {
    async fn list(&self, scope: Scope) -> Result<Vec<Tree>, RemoteError> {
        let path = match scope {
            Scope::All => "/trees",
            Scope::Mine => "/trees/mine",
        };

        let response = self.send(self.http_client.get(self.url(path))).await?;
        let trees = wire::trees_from_list(&Self::json(response).await?)?;
        debug!(scope = %scope, count = trees.len(), "Listed remote trees");
        Ok(trees)
    }

    async fn create(&self, tree: &NewTree) -> Result<Tree, RemoteError> {
        let response = self
            .send(self.http_client.post(self.url("/trees")).json(tree))
            .await?;

        let created = wire::tree_from_create(&Self::json(response).await?)?;
        debug!(id = %created.id, "Created remote tree");
        Ok(created)
    }

    async fn delete(&self, id: &TreeId) -> Result<(), RemoteError> {
        // Tentative ids never existed remotely
        if id.is_tentative() {
            return Err(RemoteError::NotFound);
        }

        let url = self.tree_url(id)?;
        self.send(self.http_client.delete(url)).await?;
        debug!(id = %id, "Deleted remote tree");
        Ok(())
    }
}
