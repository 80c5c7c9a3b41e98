//! HTTP client for the Cloud Controller.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use permload_core::{ApiError, AppHandle, CloudControllerConfig, OrgHandle, SpaceHandle, UserHandle};
use permload_engine::{ApiResult, RemoteApi};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::wire::{
    status_error, CreateAppRequest, CreateOrgRequest, CreateSpaceRequest, CreateUserRequest,
    Info, TokenResponse, V2Count, V2Org, V2Resource, V2Space, V3Page, V3Resource,
};

/// Refresh the token this long before UAA says it expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(30);
const PAGE_SIZE: usize = 5000;

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Cloud Controller API client. One instance is shared by every task of a
/// run; the bearer token is cached and refreshed on expiry.
pub struct CloudController {
    http: Client,
    api_url: String,
    token_url: String,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<CachedToken>>,
}

impl CloudController {
    /// Build the HTTP client and discover the UAA token endpoint.
    pub async fn connect(config: &CloudControllerConfig) -> ApiResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(config.skip_ssl_validation)
            .build()
            .map_err(transport)?;
        let api_url = config.url.trim_end_matches('/').to_string();

        let response = http
            .get(format!("{api_url}/v2/info"))
            .send()
            .await
            .map_err(transport)?;
        let info: Info = read_json(response).await?;
        info!("Connected to Cloud Controller at {}", api_url);

        Ok(Self {
            http,
            api_url,
            token_url: format!("{}/oauth/token", info.token_endpoint.trim_end_matches('/')),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> ApiResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() + TOKEN_EXPIRY_MARGIN < token.expires_at {
                return Ok(token.access_token.clone());
            }
        }

        debug!("Fetching UAA token");
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header("Accept", "application/json")
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(transport)?;
        let token: TokenResponse = read_json(response).await?;

        let access_token = token.access_token.clone();
        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(access_token)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    /// Send an authenticated request. Non-2xx statuses come back as
    /// [`ApiError::Status`]; a 401 also drops the cached token so the next
    /// attempt re-authenticates.
    async fn send(&self, request: RequestBuilder) -> ApiResult<Response> {
        let token = self.access_token().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            self.invalidate_token().await;
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status.as_u16(), &body))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{}", self.api_url, path))
    }

    async fn get_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        read_json(self.send(request).await?).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> ApiResult<T> {
        read_json(self.send(self.request(Method::POST, path).json(body)).await?).await
    }

    async fn put(&self, path: &str) -> ApiResult<()> {
        self.send(self.request(Method::PUT, path)).await?;
        Ok(())
    }

    /// Every resource of a v3 list, following `pagination.next`.
    async fn list_all(&self, path: &str, query: &[(&str, &str)]) -> ApiResult<Vec<V3Resource>> {
        let per_page = PAGE_SIZE.to_string();
        let mut page: V3Page = self
            .get_json(
                self.request(Method::GET, path)
                    .query(query)
                    .query(&[("per_page", per_page.as_str())]),
            )
            .await?;

        let mut resources = std::mem::take(&mut page.resources);
        while let Some(next) = page.pagination.next.take() {
            page = self.get_json(self.http.get(&next.href)).await?;
            resources.append(&mut page.resources);
        }
        Ok(resources)
    }

    /// First match of a filtered v3 list.
    async fn find_one(&self, path: &str, query: &[(&str, &str)]) -> ApiResult<Option<V3Resource>> {
        let page: V3Page = self
            .get_json(self.request(Method::GET, path).query(query))
            .await?;
        Ok(page.resources.into_iter().next())
    }

    async fn v3_total(&self, path: &str) -> ApiResult<usize> {
        let page: V3Page = self
            .get_json(self.request(Method::GET, path).query(&[("per_page", "1")]))
            .await?;
        Ok(page.pagination.total_results)
    }
}

#[async_trait]
impl RemoteApi for CloudController {
    async fn create_org(&self, name: &str) -> ApiResult<OrgHandle> {
        let org: V2Resource<V2Org> = self
            .post_json("/v2/organizations", &CreateOrgRequest { name })
            .await?;
        Ok(org.into())
    }

    async fn create_space(&self, name: &str, org_id: &str) -> ApiResult<SpaceHandle> {
        let body = CreateSpaceRequest {
            name,
            organization_guid: org_id,
        };
        let space: V2Resource<V2Space> = self.post_json("/v2/spaces", &body).await?;
        Ok(space.into())
    }

    async fn create_app(&self, name: &str, space_id: &str) -> ApiResult<AppHandle> {
        let app: V3Resource = self
            .post_json("/v3/apps", &CreateAppRequest::new(name, space_id))
            .await?;
        app.into_app()
    }

    async fn create_user(&self, id: &str) -> ApiResult<UserHandle> {
        let user: V2Resource<serde_json::Value> = self
            .post_json("/v2/users", &CreateUserRequest { guid: id })
            .await?;
        Ok(UserHandle {
            id: user.metadata.guid,
        })
    }

    async fn associate_user_with_org(&self, user_id: &str, org_id: &str) -> ApiResult<()> {
        self.put(&format!("/v2/organizations/{org_id}/users/{user_id}"))
            .await
    }

    async fn assign_space_developer_role(&self, user_id: &str, space_id: &str) -> ApiResult<()> {
        self.put(&format!("/v2/spaces/{space_id}/developers/{user_id}"))
            .await
    }

    async fn find_org(&self, name: &str) -> ApiResult<Option<OrgHandle>> {
        Ok(self
            .find_one("/v3/organizations", &[("names", name)])
            .await?
            .map(V3Resource::into_org))
    }

    async fn find_space(&self, name: &str, org_id: &str) -> ApiResult<Option<SpaceHandle>> {
        self.find_one(
            "/v3/spaces",
            &[("names", name), ("organization_guids", org_id)],
        )
        .await?
        .map(V3Resource::into_space)
        .transpose()
    }

    async fn find_app(&self, name: &str, space_id: &str) -> ApiResult<Option<AppHandle>> {
        self.find_one("/v3/apps", &[("names", name), ("space_guids", space_id)])
            .await?
            .map(V3Resource::into_app)
            .transpose()
    }

    async fn list_orgs(&self) -> ApiResult<Vec<OrgHandle>> {
        let resources = self.list_all("/v3/organizations", &[]).await?;
        Ok(resources.into_iter().map(V3Resource::into_org).collect())
    }

    async fn list_spaces(&self) -> ApiResult<Vec<SpaceHandle>> {
        self.list_all("/v3/spaces", &[])
            .await?
            .into_iter()
            .map(V3Resource::into_space)
            .collect()
    }

    async fn count_orgs(&self) -> ApiResult<usize> {
        self.v3_total("/v3/organizations").await
    }

    async fn count_spaces(&self) -> ApiResult<usize> {
        self.v3_total("/v3/spaces").await
    }

    async fn count_users(&self) -> ApiResult<usize> {
        let count: V2Count = self
            .get_json(self.request(Method::GET, "/v2/users").query(&[("results-per-page", "1")]))
            .await?;
        Ok(count.total_results)
    }
}

fn transport(e: reqwest::Error) -> ApiError {
    ApiError::Transport(e.to_string())
}

/// Read a JSON body, mapping non-2xx statuses and undecodable bodies.
async fn read_json<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let status = response.status();
    let body = response.text().await.map_err(transport)?;
    if !status.is_success() {
        return Err(status_error(status.as_u16(), &body));
    }
    serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
}
