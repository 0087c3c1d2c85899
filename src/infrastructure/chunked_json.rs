// Newline-delimited JSON streaming from a channel
use axum::body::Body;
use axum::http::{header, Response, StatusCode};
use axum::response::IntoResponse;
use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::Stream;
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;

/// One message per line.
fn serialize_line<T: Serialize>(msg: &T) -> Result<Bytes, std::io::Error> {
    let json = serde_json::to_vec(msg)?;
    let mut line = BytesMut::with_capacity(json.len() + 1);
    line.put_slice(&json);
    line.put_u8(b'\n');
    Ok(line.freeze())
}

pub fn ndjson_stream<S, T>(stream: S) -> Result<Response<Body>, StatusCode>
where
    S: Stream<Item = T> + Send + 'static,
    T: Serialize + Send + 'static,
{
    let byte_stream = stream.map(|msg| serialize_line(&msg));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(byte_stream))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

pub fn stream_from_receiver<T>(mut rx: mpsc::Receiver<T>) -> impl IntoResponse
where
    T: Serialize + Send + 'static,
{
    let stream = async_stream::stream! {
        while let Some(msg) = rx.recv().await {
            yield msg;
        }
    };

    match ndjson_stream(stream) {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}
