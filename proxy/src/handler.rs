use crate::controller::{self, ControllerError};
use crate::service::forwarder::{self, ForwardedResponse, Forwarder};
use actix_web::http::{header, StatusCode};
use actix_web::web::{Bytes, Data, Query};
use actix_web::{HttpRequest, HttpResponse};
use tracing::{error, warn};

/// `POST /proxy` relays the invocation to the selected compute node and
/// mirrors the downstream response to the caller.
///
/// Only the status code leaks on failure, never a structured error body.
pub async fn post_proxy(
    request: HttpRequest,
    query: Query<Vec<(String, String)>>,
    body: Bytes,
    forwarder: Data<Forwarder>,
) -> HttpResponse {
    let res =
        controller::proxy(&request, query.into_inner(), body, &forwarder)
            .await;
    match res {
        Ok(forwarded) => relay(forwarded),
        Err(
            err @ (ControllerError::MissingTarget(_)
            | ControllerError::Forward(forwarder::Error::UnknownNode(_))),
        ) => {
            warn!("{}", err);
            HttpResponse::BadRequest().finish()
        }
        Err(err) => {
            error!("{:?}", err);
            HttpResponse::BadGateway().finish()
        }
    }
}

pub async fn health() -> HttpResponse { HttpResponse::Ok().finish() }

/// Byte-for-byte passthrough of the downstream status, content-type and
/// body.
fn relay(forwarded: ForwardedResponse) -> HttpResponse {
    let status = StatusCode::from_u16(forwarded.status)
        .unwrap_or(StatusCode::BAD_GATEWAY);
    let mut builder = HttpResponse::build(status);
    if let Some(content_type) = forwarded.content_type {
        builder.insert_header((header::CONTENT_TYPE, content_type));
    }
    builder.body(forwarded.body)
}
