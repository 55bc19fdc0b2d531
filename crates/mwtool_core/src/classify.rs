use serde_json::Value;

use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Backlinks,
    Edit,
    Delete,
    Upload,
    Login,
}

impl Operation {
    fn may_hit_protection(self) -> bool {
        matches!(self, Self::Edit | Self::Backlinks)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorShape {
    /// 1.19: the whole `error` object is the detail, and a top-level `warning`
    /// is fatal too.
    Legacy,
    /// 1.31: the detail is `error.info`; warnings are advisory.
    Modern,
}

pub fn check_status(status: u16) -> ApiResult<()> {
    if status == 200 {
        Ok(())
    } else {
        Err(ApiError::StatusCode(status))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Classifier {
    shape: ErrorShape,
}

impl Classifier {
    pub fn new(shape: ErrorShape) -> Self {
        Self { shape }
    }

    /// `badtoken` is reported as `BadToken` only when `token_retryable` is set,
    /// i.e. a token was attached and the caller has not retried yet. Otherwise it
    /// falls through to `Misc` with the raw payload.
    pub fn classify(
        &self,
        body: Value,
        operation: Operation,
        token_retryable: bool,
    ) -> ApiResult<Value> {
        if let Some(error) = body.get("error") {
            let code = error.get("code").and_then(Value::as_str).unwrap_or("");
            match code {
                "badtoken" if token_retryable => return Err(ApiError::BadToken),
                "cantdelete" if operation == Operation::Delete => {
                    let info = error
                        .get("info")
                        .and_then(Value::as_str)
                        .unwrap_or("page cannot be deleted");
                    return Err(ApiError::CannotDelete(info.to_string()));
                }
                "protectedpage" if operation.may_hit_protection() => {
                    return Err(ApiError::PageProtected(error.clone()));
                }
                _ => {}
            }
            return Err(ApiError::Misc(self.error_detail(error)));
        }

        if self.shape == ErrorShape::Legacy
            && let Some(warning) = body.get("warning")
        {
            return Err(ApiError::Misc(warning.clone()));
        }

        Ok(body)
    }

    fn error_detail(&self, error: &Value) -> Value {
        match self.shape {
            ErrorShape::Legacy => error.clone(),
            ErrorShape::Modern => error.get("info").cloned().unwrap_or_else(|| error.clone()),
        }
    }
}
