//! Accept-driven response encoding.
//!
//! Machines ask for dense JSON, MsgPack or CSV explicitly; everyone else
//! (curl included) gets indented JSON.

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;
use hyper::Response;
use serde::Serialize;
use tracing::error;

/// Error payload shape shared by every facade failure.
#[derive(Debug, Serialize)]
pub(crate) struct ErrorRes {
    #[serde(rename = "Error")]
    pub error: String,
    #[serde(rename = "Detail", skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Format {
    Json,
    MsgPack,
    Csv,
    Pretty,
}

impl Format {
    pub(crate) fn content_type(self) -> &'static str {
        match self {
            Format::Json | Format::Pretty => "application/json",
            Format::MsgPack => "application/x-msgpack",
            Format::Csv => "text/csv",
        }
    }
}

/// Pick the response format from the `Accept` header.
pub(crate) fn pick(accept: &str) -> Format {
    if accept.contains("application/json") {
        Format::Json
    } else if accept.contains("application/x-msgpack") {
        Format::MsgPack
    } else if accept.contains("text/csv") {
        Format::Csv
    } else {
        Format::Pretty
    }
}

/// Encode a list of rows.
pub(crate) fn rows<T: Serialize>(accept: &str, rows: &[T]) -> Response<Full<Bytes>> {
    let format = pick(accept);
    match encode_rows(format, rows) {
        Ok(body) => respond(StatusCode::OK, format.content_type(), body),
        Err(e) => {
            error!(target: "iqmux::http", error = %e, "Response encoding failed");
            respond(
                StatusCode::INTERNAL_SERVER_ERROR,
                "text/plain; charset=utf-8",
                Bytes::from_static(b"encoding error\n"),
            )
        }
    }
}

/// Encode a failure as a 400 with the shared error shape.
pub(crate) fn error(accept: &str, msg: &str, detail: Option<String>) -> Response<Full<Bytes>> {
    let payload = ErrorRes {
        error: msg.to_string(),
        detail,
    };
    let format = pick(accept);
    let body = match encode_one(format, &payload) {
        Ok(body) => body,
        Err(e) => {
            error!(target: "iqmux::http", error = %e, "Error encoding failed");
            Bytes::from(format!("{{\"Error\": \"{msg}\"}}"))
        }
    };
    respond(StatusCode::BAD_REQUEST, format.content_type(), body)
}

fn encode_rows<T: Serialize>(format: Format, rows: &[T]) -> anyhow::Result<Bytes> {
    Ok(match format {
        Format::Json => Bytes::from(serde_json::to_vec(rows)?),
        Format::MsgPack => Bytes::from(rmp_serde::to_vec_named(rows)?),
        Format::Csv => {
            let mut writer = csv::Writer::from_writer(Vec::new());
            for row in rows {
                writer.serialize(row)?;
            }
            Bytes::from(writer.into_inner()?)
        }
        Format::Pretty => {
            let mut body = serde_json::to_vec_pretty(rows)?;
            body.extend_from_slice(b"\r\n");
            Bytes::from(body)
        }
    })
}

fn encode_one<T: Serialize>(format: Format, value: &T) -> anyhow::Result<Bytes> {
    Ok(match format {
        Format::Json => Bytes::from(serde_json::to_vec(value)?),
        Format::MsgPack => Bytes::from(rmp_serde::to_vec_named(value)?),
        Format::Csv => {
            let mut writer = csv::Writer::from_writer(Vec::new());
            writer.serialize(value)?;
            Bytes::from(writer.into_inner()?)
        }
        Format::Pretty => {
            let mut body = serde_json::to_vec_pretty(value)?;
            body.extend_from_slice(b"\r\n");
            Bytes::from(body)
        }
    })
}

/// Build a response, falling back to a bare 500 if the builder rejects it.
pub(crate) fn respond(
    status: StatusCode,
    content_type: &str,
    body: Bytes,
) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header(http::header::CONTENT_TYPE, content_type)
        .header(http::header::CONTENT_LENGTH, body.len().to_string())
        .body(Full::new(body))
        .unwrap_or_else(|_| {
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Full::new(Bytes::from_static(b"Internal Server Error")))
                .expect("building fallback response")
        })
}
