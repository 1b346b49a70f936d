use crate::service::forwarder::{self, ForwardedResponse, Forwarder};
use actix_web::http::header;
use actix_web::HttpRequest;
use bytes::Bytes;
use model::{FunctionName, NodeName};
use std::collections::HashMap;
use tracing::trace;

/// Inbound headers carrying this prefix are relayed to the compute node,
/// stripped of the prefix.
const FORWARDED_HEADER_PREFIX: &str = "x-config-";

#[derive(thiserror::Error, Debug)]
pub enum ControllerError {
    #[error("Missing or empty `{0}` query parameter")]
    MissingTarget(&'static str),
    #[error(transparent)]
    Forward(#[from] forwarder::Error),
}

/// Validate the invocation target and relay the request body unchanged.
pub async fn proxy(
    request: &HttpRequest,
    query: Vec<(String, String)>,
    body: Bytes,
    forwarder: &Forwarder,
) -> Result<ForwardedResponse, ControllerError> {
    let params = first_values(query);
    let function = target(&params, "function")?;
    let node = target(&params, "node")?;
    trace!("Proxying {} towards {}", function, node);

    let function = FunctionName::try_new(function)
        .map_err(|_| ControllerError::MissingTarget("function"))?;
    let node = NodeName::try_new(node)
        .map_err(|_| ControllerError::MissingTarget("node"))?;

    let headers = forwarded_headers(request);
    let res = forwarder.forward(node, function, params, headers, body).await?;
    Ok(res)
}

fn target<'a>(
    params: &'a HashMap<String, String>,
    name: &'static str,
) -> Result<&'a str, ControllerError> {
    params
        .get(name)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
        .ok_or(ControllerError::MissingTarget(name))
}

/// Keep the first value of each query parameter, whatever the insertion
/// order of duplicates.
fn first_values(query: Vec<(String, String)>) -> HashMap<String, String> {
    let mut params = HashMap::with_capacity(query.len());
    for (name, value) in query {
        params.entry(name).or_insert(value);
    }
    params
}

/// Subset of the inbound headers relayed downstream: the
/// `x-config-*`-prefixed ones (prefix stripped) plus the original
/// content-type.
fn forwarded_headers(request: &HttpRequest) -> Vec<(String, String)> {
    let mut headers = Vec::new();
    for (name, value) in request.headers() {
        let Some(stripped) = name.as_str().strip_prefix(FORWARDED_HEADER_PREFIX)
        else {
            continue;
        };
        if stripped.is_empty() {
            continue;
        }
        let Ok(value) = value.to_str() else { continue };
        headers.push((stripped.to_owned(), value.to_owned()));
    }
    if let Some(content_type) = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
    {
        headers.push(("content-type".to_owned(), content_type.to_owned()));
    }
    headers
}
