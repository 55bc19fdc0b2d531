use serde_json::Value;
use tracing::warn;

use crate::classify::{Classifier, ErrorShape, Operation, check_status};
use crate::config::ClientConfig;
use crate::continuation::{ContinuationDialect, Pager};
use crate::error::{ApiError, ApiResult};
use crate::token::{TokenKind, TokenManager, TokenScheme};
use crate::transport::{FilePart, HttpRequest, Method, Params, Transport};

pub struct Session<T: Transport> {
    transport: T,
    api_url: String,
    index_url: String,
    classifier: Classifier,
    dialect: ContinuationDialect,
    tokens: TokenManager,
}

#[derive(Debug, Clone)]
pub struct WriteCall {
    pub method: Method,
    pub params: Params,
    pub operation: Operation,
    pub token_kind: TokenKind,
    pub title: String,
    pub file: Option<FilePart>,
}

impl<T: Transport> Session<T> {
    pub fn new(
        transport: T,
        config: &ClientConfig,
        shape: ErrorShape,
        dialect: ContinuationDialect,
        scheme: Box<dyn TokenScheme>,
    ) -> Self {
        Self {
            transport,
            api_url: config.api_url(),
            index_url: config.index_url(),
            classifier: Classifier::new(shape),
            dialect,
            tokens: TokenManager::new(scheme),
        }
    }

    pub fn request_count(&self) -> usize {
        self.transport.request_count()
    }

    pub fn call(&mut self, method: Method, params: Params, operation: Operation) -> ApiResult<Value> {
        execute(
            &mut self.transport,
            &self.api_url,
            self.classifier,
            method,
            params,
            operation,
            None,
            false,
        )
    }

    pub fn query(&mut self, params: Params) -> ApiResult<Value> {
        self.call(Method::Get, params, Operation::Read)
    }

    /// Fetch the next page of `pager`. `None` once the server stopped returning
    /// a cursor; an error ends the sequence.
    pub fn next_batch(&mut self, pager: &mut Pager) -> Option<ApiResult<Vec<Value>>> {
        let params = pager.next_params()?;
        let operation = pager.request().operation;
        match self.call(Method::Get, params, operation) {
            Ok(body) => Some(Ok(pager.advance(body, self.dialect))),
            Err(error) => {
                pager.finish();
                Some(Err(error))
            }
        }
    }

    pub fn read_raw(&mut self, title: &str) -> ApiResult<String> {
        let response = self.transport.send(HttpRequest::get(
            self.index_url.clone(),
            vec![
                ("action".to_string(), "raw".to_string()),
                ("title".to_string(), title.to_string()),
            ],
        ))?;
        check_status(response.status)?;
        Ok(response.body)
    }

    pub fn token(&mut self, kind: TokenKind, title: &str) -> ApiResult<String> {
        let key = self.tokens.key(kind, title);
        let transport = &mut self.transport;
        let api_url = &self.api_url;
        let classifier = self.classifier;
        self.tokens.get_token(&key, |params| {
            execute(
                transport,
                api_url,
                classifier,
                Method::Get,
                params,
                Operation::Read,
                None,
                false,
            )
        })
    }

    pub fn invalidate_token(&mut self, kind: TokenKind, title: &str) {
        let key = self.tokens.key(kind, title);
        self.tokens.invalidate(&key);
    }

    pub fn clear_tokens(&mut self) {
        self.tokens.clear();
    }

    /// Send a write with its token. A `badtoken` rejection drops the cached
    /// token and retries once with a fresh one; a second rejection surfaces as
    /// `Misc`.
    pub fn write(&mut self, call: WriteCall) -> ApiResult<Value> {
        let mut retried = false;
        loop {
            let token = self.token(call.token_kind, &call.title)?;
            let mut params = call.params.clone();
            params.push(("token".to_string(), token));

            let result = execute(
                &mut self.transport,
                &self.api_url,
                self.classifier,
                call.method,
                params,
                call.operation,
                call.file.clone(),
                !retried,
            );
            match result {
                Err(ApiError::BadToken) => {
                    warn!(
                        kind = call.token_kind.as_str(),
                        title = %call.title,
                        "token rejected, refreshing and retrying once"
                    );
                    self.invalidate_token(call.token_kind, &call.title);
                    retried = true;
                }
                other => return other,
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn execute<T: Transport>(
    transport: &mut T,
    api_url: &str,
    classifier: Classifier,
    method: Method,
    params: Params,
    operation: Operation,
    file: Option<FilePart>,
    token_retryable: bool,
) -> ApiResult<Value> {
    let request = HttpRequest {
        method,
        url: api_url.to_string(),
        params,
        file,
    };
    let response = transport.send(request)?;
    check_status(response.status)?;
    let body: Value = serde_json::from_str(&response.body)
        .map_err(|error| ApiError::decode(format!("failed to decode MediaWiki API JSON response: {error}")))?;
    classifier.classify(body, operation, token_retryable)
}
