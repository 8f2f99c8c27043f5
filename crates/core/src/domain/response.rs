use std::collections::BTreeMap;

/// Transport-neutral reply produced by the webhook handler.
///
/// Both the HTTP server and the function URL adapter copy this verbatim into
/// their own response types.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HandlerResponse {
    pub status_code: u16,
    pub body: Vec<u8>,
    pub headers: BTreeMap<String, String>,
}

impl HandlerResponse {
    pub fn empty(status_code: u16) -> Self {
        Self { status_code, ..Self::default() }
    }

    pub fn ok() -> Self {
        Self::empty(200)
    }

    pub fn bad_request(body: impl Into<Vec<u8>>) -> Self {
        Self { status_code: 400, body: body.into(), headers: BTreeMap::new() }
    }

    /// Challenge echo for the platform's URL verification handshake.
    pub fn text(body: impl Into<Vec<u8>>) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_owned(), "text".to_owned());
        Self { status_code: 200, body: body.into(), headers }
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
