use serde::Serialize;
use ureq::{
    http::{request::Builder, Method, Request},
    SendBody,
};
use urlencoding::encode;

use crate::APIResult;

mod auth;
mod context;
pub use auth::RefreshableContext;
pub use context::{Credentials, STContext};

pub(crate) fn set_headers(
    content_type: &str,
    app_key: &str,
    access_token: &str,
    request: Builder,
) -> Builder {
    let bt = format!("Bearer {access_token}");
    request
        .header("Authorization", bt)
        .header("ST-App-Key", app_key)
        .header("Content-Type", content_type)
        .header("Accept", "application/json")
}

pub(crate) fn build_request<B, S, SS>(
    method: Method,
    path: &str,
    body: Option<&B>,
    query: Option<impl IntoIterator<Item = (S, SS)>>,
    content_type: &str,
    context: &STContext,
) -> APIResult<Request<SendBody<'static>>>
where
    B: Serialize,
    S: AsRef<str>,
    SS: AsRef<str>,
{
    let url = build_url(context.api_base(), path, query);
    let mut request = Request::builder().method(method.clone()).uri(url.as_str());
    request = set_headers(
        content_type,
        &context.app_key,
        &context.access_token,
        request,
    );

    let request = match (method == Method::GET || method == Method::DELETE, body) {
        (true, _) => request.body(SendBody::none()),
        (false, Some(body)) => {
            let json_bytes = serde_json::to_vec(body)?;
            let reader = std::io::Cursor::new(json_bytes);
            request.body(SendBody::from_owned_reader(reader))
        }
        (false, None) => request.body(SendBody::none()),
    }?;

    log::debug!(
        "Built Request with params: {}-{}-{}",
        path,
        method,
        if body.is_some() {
            "With JSON Body"
        } else {
            "No JSON Body"
        },
    );

    Ok(request)
}

pub(crate) fn build_url<S, SS>(
    base: &str,
    path: &str,
    query: Option<impl IntoIterator<Item = (S, SS)>>,
) -> String
where
    S: AsRef<str>,
    SS: AsRef<str>,
{
    let mut url = base.to_string();
    url.push_str(path);
    if let Some(q) = query {
        let query_string: String = q
            .into_iter()
            .map(|(k, v)| format!("{}={}", encode(k.as_ref()), encode(v.as_ref())))
            .collect::<Vec<_>>()
            .join("&");
        if !query_string.is_empty() {
            url.push('?');
            url.push_str(&query_string);
        }
    }
    url
}
