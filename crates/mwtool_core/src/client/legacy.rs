use serde_json::Value;
use tracing::{debug, info};

use crate::classify::{ErrorShape, Operation};
use crate::config::ClientConfig;
use crate::continuation::{ContinuationDialect, Pager};
use crate::error::{ApiError, ApiResult};
use crate::session::{Session, WriteCall};
use crate::token::{PageTokens, TokenKind};
use crate::transport::{HttpTransport, Method, Params, Transport};

use super::{
    Credentials, ProtocolVersion, Upload, WikiClient, ensure_edit_succeeded, login_failed,
    login_result, requests,
};

/// MediaWiki 1.19: per-page `intoken` tokens, `query-continue` cursors and a
/// two-step login handshake. Uploads are not available.
pub struct LegacyClient<T: Transport = HttpTransport> {
    session: Session<T>,
}

impl<T: Transport> LegacyClient<T> {
    pub fn new(transport: T, config: &ClientConfig) -> Self {
        Self {
            session: Session::new(
                transport,
                config,
                ErrorShape::Legacy,
                ContinuationDialect::Legacy,
                Box::new(PageTokens),
            ),
        }
    }

    fn login_step(&mut self, credentials: &Credentials, token: Option<&str>) -> ApiResult<Value> {
        self.session.call(
            Method::Post,
            requests::login(credentials.username(), credentials.secret(), token),
            Operation::Login,
        )
    }
}

impl<T: Transport> WikiClient for LegacyClient<T> {
    fn protocol(&self) -> ProtocolVersion {
        ProtocolVersion::V1_19
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
        let first = self.login_step(credentials, None)?;
        let result = match login_result(&first)? {
            "NeedToken" => {
                let token = first
                    .get("login")
                    .and_then(|login| login.get("token"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| ApiError::decode("NeedToken response has no login.token"))?;
                debug!("login handshake requested a token");
                let second = self.login_step(credentials, Some(token))?;
                login_result(&second)?.to_string()
            }
            other => other.to_string(),
        };
        if result != "Success" {
            return Err(login_failed(&result));
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
            params: requests::edit(title, text, summary, false),
            operation: Operation::Edit,
            token_kind: TokenKind::Edit,
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
            token_kind: TokenKind::Delete,
            title: title.to_string(),
            file: None,
        })?;
        Ok(())
    }

    fn upload_file(&mut self, _upload: &Upload) -> ApiResult<()> {
        Err(ApiError::Unsupported("upload"))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::LegacyClient;
    use crate::client::{Credentials, Upload, WikiClient};
    use crate::config::ClientConfig;
    use crate::error::ApiError;
    use crate::testing::MockTransport;
    use crate::transport::Method;

    fn client(transport: &MockTransport) -> LegacyClient<MockTransport> {
        LegacyClient::new(transport.clone(), &ClientConfig::new("https://old.example.org/w"))
    }

    fn page_token(kind: &str, title: &str, token: &str) -> serde_json::Value {
        json!({"query": {"pages": {"1": {"title": title, format!("{kind}token"): token}}}})
    }

    #[test]
    fn login_answers_need_token_with_a_second_handshake() {
        let transport = MockTransport::default();
        transport.push_json(json!({"login": {"result": "NeedToken", "token": "lt1"}}));
        transport.push_json(json!({"login": {"result": "Success"}}));

        let mut client = client(&transport);
        client
            .login(&Credentials::new("Bot", "pw"))
            .expect("login");

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method, Method::Post);
        assert_eq!(requests[0].param("lgtoken"), None);
        assert_eq!(requests[1].param("lgtoken"), Some("lt1"));
        assert_eq!(requests[1].param("lgname"), Some("Bot"));
    }

    #[test]
    fn login_failure_reports_the_result() {
        let transport = MockTransport::default();
        transport.push_json(json!({"login": {"result": "NeedToken", "token": "lt1"}}));
        transport.push_json(json!({"login": {"result": "WrongPass"}}));

        let mut client = client(&transport);
        let error = client
            .login(&Credentials::new("Bot", "pw"))
            .expect_err("must fail");
        assert!(matches!(error, ApiError::Misc(ref detail) if detail == "Login result is WrongPass"));
    }

    #[test]
    fn edit_and_delete_fetch_page_bound_tokens() {
        let transport = MockTransport::default();
        transport.push_json(page_token("edit", "Foo", "e1"));
        transport.push_json(json!({"edit": {"result": "Success"}}));
        transport.push_json(page_token("delete", "Foo", "d1"));
        transport.push_json(json!({"delete": {"title": "Foo"}}));

        let mut client = client(&transport);
        client.edit_page("Foo", "text", Some("why")).expect("edit");
        client.delete_page("Foo", None).expect("delete");

        let requests = transport.requests();
        assert_eq!(requests[0].param("intoken"), Some("edit"));
        assert_eq!(requests[0].param("titles"), Some("Foo"));
        assert_eq!(requests[1].param("token"), Some("e1"));
        assert_eq!(requests[1].param("bot"), None);
        assert_eq!(requests[2].param("intoken"), Some("delete"));
        assert_eq!(requests[3].param("token"), Some("d1"));
        assert_eq!(requests[3].url, "https://old.example.org/w/api.php");
    }

    #[test]
    fn rejected_page_token_is_refetched_for_one_retry() {
        let transport = MockTransport::default();
        transport.push_json(page_token("edit", "Foo", "e1"));
        transport.push_json(json!({"error": {"code": "badtoken", "info": "Invalid token"}}));
        transport.push_json(page_token("edit", "Foo", "e2"));
        transport.push_json(json!({"error": {"code": "badtoken", "info": "Invalid token"}}));

        let mut client = client(&transport);
        let error = client.edit_page("Foo", "text", None).expect_err("must fail");
        assert!(matches!(error, ApiError::Misc(ref detail) if detail["code"] == "badtoken"));

        let requests = transport.requests();
        assert_eq!(requests.len(), 4);
        assert_eq!(requests[0].param("intoken"), Some("edit"));
        assert_eq!(requests[0].param("titles"), Some("Foo"));
        assert_eq!(requests[1].param("token"), Some("e1"));
        assert_eq!(requests[2].param("intoken"), Some("edit"));
        assert_eq!(requests[2].param("titles"), Some("Foo"));
        assert_eq!(requests[3].param("token"), Some("e2"));
    }

    #[test]
    fn delete_of_missing_page_is_cannot_delete() {
        let transport = MockTransport::default();
        transport.push_json(page_token("delete", "Gone", "d1"));
        transport.push_json(json!({"error": {"code": "cantdelete", "info": "no such page"}}));

        let mut client = client(&transport);
        let error = client.delete_page("Gone", None).expect_err("must fail");
        assert!(error.is_cannot_delete());
    }

    #[test]
    fn top_level_warning_fails_the_call() {
        let transport = MockTransport::default();
        transport.push_json(json!({"warning": {"main": {"*": "Unrecognized parameter"}}}));

        let mut client = client(&transport);
        let error = client.list_namespaces().expect_err("must fail");
        assert!(matches!(error, ApiError::Misc(_)));
    }

    #[test]
    fn upload_is_unsupported_without_a_request() {
        let transport = MockTransport::default();
        let mut client = client(&transport);
        let error = client
            .upload_file(&Upload {
                file_name: "A.png".to_string(),
                content: vec![1, 2, 3],
                mime_type: None,
                text: None,
                ignore_warnings: true,
            })
            .expect_err("must fail");
        assert!(matches!(error, ApiError::Unsupported("upload")));
        assert!(transport.requests().is_empty());
    }
}
