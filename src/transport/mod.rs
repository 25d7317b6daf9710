//! 后端 REST 客户端
//!
//! 统一处理基础地址拼接、鉴权头、请求 ID 以及状态码到 `SyncError` 的映射。

use std::time::Duration;

use reqwest::multipart::Form;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::config::BackendConfig;
use crate::error::{Result, SyncError};

/// 错误响应体在错误信息中保留的最大长度
const MAX_ERROR_BODY: usize = 512;

#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
    access_token: Option<String>,
}

impl BackendClient {
    pub fn new(config: &BackendConfig, access_token: Option<String>) -> Result<Self> {
        let mut builder = Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_millis(config.timeout_ms));
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        let client = builder
            .build()
            .map_err(|err| SyncError::Config(format!("failed to build http client: {}", err)))?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url)
            .map_err(|err| {
                SyncError::Config(format!("invalid backend url {}: {}", base_url, err))
            })?;

        Ok(Self {
            client,
            base_url,
            access_token,
        })
    }

    /// 拼接接口地址并附加查询参数
    pub fn endpoint(&self, path: &str, query: &[(&str, String)]) -> Result<Url> {
        let raw = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut url = Url::parse(&raw)
            .map_err(|err| SyncError::fetch(format!("invalid endpoint {}: {}", raw, err)))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = self.endpoint(path, query)?;
        let response = self.dispatch(self.client.get(url)).await?;
        decode_json(response).await
    }

    /// 发送请求，只关心成功与否
    pub async fn send_empty<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<()> {
        let url = self.endpoint(path, &[])?;
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        self.dispatch(request).await?;
        Ok(())
    }

    /// 发送 JSON 请求并解码响应
    pub async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.endpoint(path, &[])?;
        let response = self
            .dispatch(self.client.request(method, url).json(body))
            .await?;
        decode_json(response).await
    }

    /// 发送 multipart 请求并解码响应
    pub async fn send_multipart<T: DeserializeOwned>(&self, path: &str, form: Form) -> Result<T> {
        let url = self.endpoint(path, &[])?;
        let response = self
            .dispatch(self.client.post(url).multipart(form))
            .await?;
        decode_json(response).await
    }

    async fn dispatch(&self, request: RequestBuilder) -> Result<Response> {
        let request_id = Uuid::new_v4().to_string();
        let mut request = request.header("x-request-id", &request_id);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|err| {
            warn!(request_id = %request_id, error = %err, "Backend request failed");
            SyncError::from(err)
        })?;

        let status = response.status();
        debug!(
            request_id = %request_id,
            status = status.as_u16(),
            url = %response.url(),
            "Backend responded"
        );

        if status.is_success() {
            return Ok(response);
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        Err(SyncError::Fetch {
            status: Some(status.as_u16()),
            message: if body.is_empty() {
                format!("HTTP {}", status)
            } else {
                format!("HTTP {}: {}", status, body)
            },
        })
    }
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}
