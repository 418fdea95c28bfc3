use std::convert::Infallible;

use axum::{
    body::{Body, Bytes, HttpBody},
    response::Response,
};
use futures::{future, StreamExt};
use tracing::error;

/// Once a handler has produced its response head, nothing may replace it.
///
/// Bodies that are already fully in memory cannot fail and pass through
/// untouched. Streaming bodies are re-wrapped so an error raised mid-stream
/// is logged and ends the body where it stands; the status line and the
/// bytes already produced are the response the client gets.
pub(crate) fn seal(response: Response) -> Response {
    if response.body().size_hint().exact().is_some() {
        return response;
    }

    let (parts, body) = response.into_parts();
    let stream = body.into_data_stream().scan((), |_, chunk| {
        future::ready(match chunk {
            Ok(bytes) => Some(Ok::<Bytes, Infallible>(bytes)),
            Err(e) => {
                error!(error = %e, "Unhandled error after response started; keeping partial body");
                None
            }
        })
    });
    Response::from_parts(parts, Body::from_stream(stream))
}
