use serde_json::Value;
use tracing::{info, warn};

use crate::classify::{ErrorShape, Operation};
use crate::config::ClientConfig;
use crate::continuation::{ContinuationDialect, Pager};
use crate::error::{ApiError, ApiResult};
use crate::session::{Session, WriteCall};
use crate::token::{SiteTokens, TokenKind};
use crate::transport::{FilePart, HttpTransport, Method, Params, Transport};

use super::{
    Credentials, ProtocolVersion, Upload, WikiClient, ensure_edit_succeeded, login_failed,
    login_result, requests,
};

/// MediaWiki 1.31: `meta=tokens`, flat `continue` cursors, bot edits and
/// multipart uploads.
pub struct ModernClient<T: Transport = HttpTransport> {
    session: Session<T>,
}

impl<T: Transport> ModernClient<T> {
    pub fn new(transport: T, config: &ClientConfig) -> Self {
        Self {
            session: Session::new(
                transport,
                config,
                ErrorShape::Modern,
                ContinuationDialect::Modern,
                Box::new(SiteTokens),
            ),
        }
    }
}

impl<T: Transport> WikiClient for ModernClient<T> {
    fn protocol(&self) -> ProtocolVersion {
        ProtocolVersion::V1_31
    }

    fn request_count(&self) -> usize {
        self.session.request_count()
    }

    fn query(&mut self, params: Params) -> ApiResult<Value> {
        self.session.query(params)
    }

    fn fetch_next_batch(&mut self, pager: &mut Pager) -> Option<ApiResult<Vec<Value>>> {
        self.session.next_batch(pager)
    }

    fn login(&mut self, credentials: &Credentials) -> ApiResult<()> {
        let token = self.session.token(TokenKind::Login, "")?;
        // Login tokens are single use.
        self.session.invalidate_token(TokenKind::Login, "");
        let body = self.session.call(
            Method::Post,
            requests::login(credentials.username(), credentials.secret(), Some(&token)),
            Operation::Login,
        )?;
        let result = login_result(&body)?;
        if result != "Success" {
            return Err(login_failed(result));
        }
        self.session.clear_tokens();
        info!(user = credentials.username(), "logged in");
        Ok(())
    }

    fn read_page(&mut self, title: &str) -> ApiResult<String> {
        self.session.read_raw(title)
    }

    fn edit_page(&mut self, title: &str, text: &str, summary: Option<&str>) -> ApiResult<()> {
        let body = self.session.write(WriteCall {
            method: Method::Post,
            params: requests::edit(title, text, summary, true),
            operation: Operation::Edit,
            token_kind: TokenKind::Csrf,
            title: title.to_string(),
            file: None,
        })?;
        ensure_edit_succeeded(&body)
    }

    fn delete_page(&mut self, title: &str, reason: Option<&str>) -> ApiResult<()> {
        self.session.write(WriteCall {
            method: Method::Post,
            params: requests::delete(title, reason),
            operation: Operation::Delete,
            token_kind: TokenKind::Csrf,
            title: title.to_string(),
            file: None,
        })?;
        Ok(())
    }

    fn upload_file(&mut self, upload: &Upload) -> ApiResult<()> {
        let body = self.session.write(WriteCall {
            method: Method::Post,
            params: requests::upload(
                &upload.file_name,
                upload.text.as_deref(),
                upload.ignore_warnings,
            ),
            operation: Operation::Upload,
            token_kind: TokenKind::Csrf,
            title: upload.file_name.clone(),
            file: Some(FilePart {
                file_name: upload.file_name.clone(),
                content: upload.content.clone(),
                mime_type: upload.mime_type.clone(),
            }),
        })?;
        let Some(result) = body.get("upload") else {
            return Ok(());
        };
        match result.get("result").and_then(Value::as_str) {
            Some("Warning") => Err(ApiError::Misc(
                result.get("warnings").cloned().unwrap_or_else(|| result.clone()),
            )),
            Some("Failure") => Err(ApiError::Misc(result.clone())),
            Some(other) if other != "Success" => {
                warn!(file = %upload.file_name, result = other, "upload not yet complete");
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
