use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use serde_json::Value;

use crate::error::ApiResult;
use crate::transport::{HttpRequest, HttpResponse, Transport};

#[derive(Default)]
struct MockState {
    responses: VecDeque<HttpResponse>,
    requests: Vec<HttpRequest>,
}

/// Replays queued responses in order and records every request. Clones share
/// state, so a test keeps one handle while the session owns another.
#[derive(Clone, Default)]
pub(crate) struct MockTransport {
    state: Rc<RefCell<MockState>>,
}

impl MockTransport {
    pub(crate) fn push_json(&self, body: Value) {
        self.push_text(200, &body.to_string());
    }

    pub(crate) fn push_status(&self, status: u16, body: &str) {
        self.push_text(status, body);
    }

    pub(crate) fn push_text(&self, status: u16, body: &str) {
        self.state.borrow_mut().responses.push_back(HttpResponse {
            status,
            body: body.to_string(),
        });
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.state.borrow().requests.clone()
    }

    pub(crate) fn pending(&self) -> usize {
        self.state.borrow().responses.len()
    }
}

impl Transport for MockTransport {
    fn send(&mut self, request: HttpRequest) -> ApiResult<HttpResponse> {
        let mut state = self.state.borrow_mut();
        let response = state.responses.pop_front().unwrap_or_else(|| {
            panic!(
                "unexpected request: {:?} {:?}",
                request.param("action"),
                request.params
            )
        });
        state.requests.push(request);
        Ok(response)
    }

    fn request_count(&self) -> usize {
        self.state.borrow().requests.len()
    }
}
