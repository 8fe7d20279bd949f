use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::errors::KvError;
use crate::store::{KvStore, TtlState};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct RestKvConfig {
    pub url: String,
    pub token: String,
    pub timeout: Duration,
}

impl RestKvConfig {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Store reached over an Upstash-compatible REST endpoint: each command is a
/// JSON array POSTed to the base URL.
#[derive(Clone)]
pub struct RestKv {
    client: Client,
    url: Url,
    token: String,
}

#[derive(Deserialize)]
struct RestReply {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

impl RestKv {
    pub fn new(config: RestKvConfig) -> Result<Self, KvError> {
        let url = Url::parse(&config.url)
            .map_err(|err| KvError::config(&format!("invalid kv url: {err}")))?;
        if config.token.is_empty() {
            return Err(KvError::config("kv token is empty"));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| KvError::config(&format!("kv client build failed: {err}")))?;
        Ok(Self {
            client,
            url,
            token: config.token,
        })
    }

    async fn command(&self, args: &[&str]) -> Result<Value, KvError> {
        let name = args.first().copied().unwrap_or_default();
        let response = self
            .client
            .post(self.url.clone())
            .bearer_auth(&self.token)
            .json(args)
            .send()
            .await
            .map_err(|err| {
                tracing::warn!(target = "classgate::kv", command = name, "kv request failed: {err}");
                KvError::unavailable(&format!("{name}: {err}"))
            })?;
        let status = response.status();
        let reply: RestReply = response.json().await.map_err(|err| {
            KvError::unavailable(&format!("{name}: undecodable reply ({status}): {err}"))
        })?;
        if let Some(error) = reply.error {
            return Err(KvError::unavailable(&format!("{name} rejected: {error}")));
        }
        if !status.is_success() {
            return Err(KvError::unavailable(&format!("{name}: status {status}")));
        }
        Ok(reply.result.unwrap_or(Value::Null))
    }
}

fn as_i64(key: &str, value: &Value) -> Result<i64, KvError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| KvError::wrong_type(key, "number out of range")),
        Value::String(s) => s
            .parse::<i64>()
            .map_err(|_| KvError::wrong_type(key, "expected integer reply")),
        other => Err(KvError::wrong_type(
            key,
            &format!("expected integer reply, got {other}"),
        )),
    }
}

fn as_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl KvStore for RestKv {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        Ok(as_text(self.command(&["GET", key]).await?))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
        self.command(&["SET", key, value]).await?;
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64, KvError> {
        as_i64(key, &self.command(&["INCR", key]).await?)
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, KvError> {
        let delta = delta.to_string();
        as_i64(key, &self.command(&["INCRBY", key, &delta]).await?)
    }

    async fn expire_at(&self, key: &str, unix_seconds: i64) -> Result<bool, KvError> {
        let at = unix_seconds.to_string();
        Ok(as_i64(key, &self.command(&["EXPIREAT", key, &at]).await?)? == 1)
    }

    async fn ttl(&self, key: &str) -> Result<TtlState, KvError> {
        Ok(TtlState::from_redis(as_i64(
            key,
            &self.command(&["TTL", key]).await?,
        )?))
    }

    async fn exists(&self, key: &str) -> Result<bool, KvError> {
        Ok(as_i64(key, &self.command(&["EXISTS", key]).await?)? > 0)
    }

    async fn del(&self, key: &str) -> Result<bool, KvError> {
        Ok(as_i64(key, &self.command(&["DEL", key]).await?)? > 0)
    }

    async fn rpush(&self, key: &str, values: &[String]) -> Result<i64, KvError> {
        let mut args: Vec<&str> = Vec::with_capacity(values.len() + 2);
        args.push("RPUSH");
        args.push(key);
        args.extend(values.iter().map(String::as_str));
        as_i64(key, &self.command(&args).await?)
    }

    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<(), KvError> {
        let (start, stop) = (start.to_string(), stop.to_string());
        self.command(&["LTRIM", key, &start, &stop]).await?;
        Ok(())
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, KvError> {
        let (start, stop) = (start.to_string(), stop.to_string());
        match self.command(&["LRANGE", key, &start, &stop]).await? {
            Value::Null => Ok(Vec::new()),
            Value::Array(items) => Ok(items.into_iter().filter_map(as_text).collect()),
            other => Err(KvError::wrong_type(
                key,
                &format!("expected array reply, got {other}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use classgate_errors::prelude::codes;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer) -> RestKv {
        RestKv::new(RestKvConfig::new(server.uri(), "kv-token")).expect("rest kv")
    }

    #[tokio::test]
    async fn incr_by_posts_command_array() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer kv-token"))
            .and(body_json(json!(["INCRBY", "speaking:2024-03:u1", "30"])))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": 30})))
            .expect(1)
            .mount(&server)
            .await;

        let total = store(&server)
            .incr_by("speaking:2024-03:u1", 30)
            .await
            .expect("incrby");
        assert_eq!(total, 30);
    }

    #[tokio::test]
    async fn ttl_and_lrange_replies_are_decoded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(json!(["TTL", "k"])))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": -1})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_json(json!(["LRANGE", "h", "0", "-1"])))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"result": ["a", "b"]})),
            )
            .mount(&server)
            .await;

        let kv = store(&server);
        assert_eq!(kv.ttl("k").await.unwrap(), TtlState::Persistent);
        assert_eq!(kv.lrange("h", 0, -1).await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn error_reply_maps_to_upstream_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({"error": "ERR value is not an integer"})),
            )
            .mount(&server)
            .await;

        let err = store(&server).incr("k").await.expect_err("must fail");
        assert!(err.into_inner().is(codes::UPSTREAM_UNAVAILABLE));
    }

    #[tokio::test]
    async fn timeout_maps_to_upstream_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"result": "OK"}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let kv = RestKv::new(
            RestKvConfig::new(server.uri(), "kv-token").with_timeout(Duration::from_millis(50)),
        )
        .expect("rest kv");
        let err = kv.set("k", "v").await.expect_err("must time out");
        assert!(err.into_inner().is(codes::UPSTREAM_UNAVAILABLE));
    }

    #[test]
    fn empty_token_is_a_config_error() {
        let err = RestKv::new(RestKvConfig::new("https://kv.example", ""))
            .err()
            .expect("config error");
        assert!(err.into_inner().is(codes::CONFIG_MISSING));
    }
}
