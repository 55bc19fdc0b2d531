use std::thread::sleep;
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use reqwest::blocking::multipart::{Form, Part};
use tracing::{debug, trace};

use crate::config::ClientConfig;
use crate::error::ApiResult;

pub type Params = Vec<(String, String)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub file_name: String,
    pub content: Vec<u8>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub params: Params,
    pub file: Option<FilePart>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>, params: Params) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            params,
            file: None,
        }
    }

    pub fn post(url: impl Into<String>, params: Params) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            params,
            file: None,
        }
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Blocking request sender. Network failures come back as `ApiError::Transport`;
/// non-200 statuses are returned as-is for the caller to classify.
pub trait Transport {
    fn send(&mut self, request: HttpRequest) -> ApiResult<HttpResponse>;

    fn request_count(&self) -> usize;
}

/// Minimum spacing between consecutive requests, measured from the moment the
/// previous request completed.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last_completed_at: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_completed_at: None,
        }
    }

    pub fn wait(&mut self) -> Duration {
        let Some(last) = self.last_completed_at else {
            return Duration::ZERO;
        };
        let elapsed = last.elapsed();
        if elapsed >= self.interval {
            return Duration::ZERO;
        }
        let remaining = self.interval - elapsed;
        sleep(remaining);
        remaining
    }

    pub fn mark_completed(&mut self) {
        self.last_completed_at = Some(Instant::now());
    }
}

pub struct HttpTransport {
    client: Client,
    throttle: Throttle,
    request_count: usize,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .cookie_store(true)
            .build()?;

        Ok(Self {
            client,
            throttle: Throttle::new(config.request_interval),
            request_count: 0,
        })
    }

    fn dispatch(&self, request: HttpRequest) -> ApiResult<HttpResponse> {
        let builder = match request.method {
            Method::Get => self.client.get(&request.url).query(&request.params),
            Method::Post => match request.file {
                Some(file) => {
                    let mut form = Form::new();
                    for (key, value) in request.params {
                        form = form.text(key, value);
                    }
                    let mut part = Part::bytes(file.content).file_name(file.file_name);
                    if let Some(mime_type) = &file.mime_type {
                        part = part.mime_str(mime_type)?;
                    }
                    self.client.post(&request.url).multipart(form.part("file", part))
                }
                None => self.client.post(&request.url).form(&request.params),
            },
        };

        let response = builder.send()?;
        let status = response.status().as_u16();
        let body = response.text()?;
        Ok(HttpResponse { status, body })
    }
}

impl Transport for HttpTransport {
    fn send(&mut self, request: HttpRequest) -> ApiResult<HttpResponse> {
        let slept = self.throttle.wait();
        if !slept.is_zero() {
            trace!(slept_ms = slept.as_millis() as u64, "throttled request");
        }
        debug!(
            method = ?request.method,
            url = %request.url,
            action = request.param("action").unwrap_or(""),
            "sending request"
        );

        let result = self.dispatch(request);
        self.throttle.mark_completed();
        self.request_count = self.request_count.saturating_add(1);
        result
    }

    fn request_count(&self) -> usize {
        self.request_count
    }
}
