use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response};
use iqmux_config::IqmuxConfig;
use iqmux_proxy::{Proxy, ProxyError};
use serde::Serialize;
use tracing::{info, warn};

use crate::encode;

pub(crate) async fn dispatch(
    req: Request<Incoming>,
    cfg: Arc<IqmuxConfig>,
    proxy: Arc<Proxy>,
) -> Response<Full<Bytes>> {
    let accept = req
        .headers()
        .get(http::header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let query = req.uri().query().unwrap_or("").to_string();

    match req.uri().path() {
        "/verbose" => verbose(),
        "/ohlc" => ohlc(&accept, &query, &cfg, &proxy).await,
        "/search" => search(&accept, &query, &cfg, &proxy).await,
        // Everything else, the root included, draws the documentation.
        _ => doc(),
    }
}

/// One OHLC bar parsed from an `LH,...` line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Ohlc {
    pub datetime: String,
    pub high: String,
    pub low: String,
    pub open: String,
    pub close: String,
    pub volume: String,
}

impl Ohlc {
    /// `LH,2023-05-25,288.8400,272.8500,287.9100,280.9900,878367,0,`
    pub(crate) fn parse(line: &[u8]) -> Option<Self> {
        let fields = parser::split_fields(line, 9);
        if fields.len() < 7 {
            return None;
        }
        let text = |i: usize| String::from_utf8_lossy(fields[i]).into_owned();
        Some(Self {
            datetime: text(1),
            high: text(2),
            low: text(3),
            open: text(4),
            close: text(5),
            volume: text(6),
        })
    }
}

/// One search hit parsed from an `LS,...` line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct SearchHit {
    pub ticker: String,
    pub market_id: String,
    pub description: String,
    #[serde(rename = "Type")]
    pub kind: String,
}

impl SearchHit {
    /// `LS,TSLA,21,1,TESLA  INC.,`
    pub(crate) fn parse(line: &[u8]) -> Option<Self> {
        let fields = parser::split_fields(line, 9);
        if fields.len() < 6 {
            return None;
        }
        let text = |i: usize| String::from_utf8_lossy(fields[i]).into_owned();
        Some(Self {
            ticker: text(1),
            market_id: text(2),
            kind: text(3),
            description: text(4),
        })
    }
}

fn query_param(query: &str, key: &str) -> Option<String> {
    for pair in query.split('&') {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        if k == key {
            return Some(match urlencoding::decode(v) {
                Ok(decoded) => decoded.into_owned(),
                Err(_) => v.to_string(),
            });
        }
    }
    None
}

/// Build the lookup command for an OHLC query, or a client-visible error.
fn ohlc_command(query: &str) -> Result<String, String> {
    let asset = query_param(query, "asset").ok_or("GET[asset] missing")?;
    let range = query_param(query, "range").ok_or("GET[range] missing")?;
    let datapoints = query_param(query, "datapoints").ok_or("GET[datapoints] missing")?;
    let datapoints: i64 = datapoints
        .parse()
        .map_err(|_| "GET[datapoints] not a number")?;

    match range.as_str() {
        "DAILY" => Ok(format!("HDX,{asset},{datapoints}")),
        "WEEKLY" => Ok(format!("HWX,{asset},{datapoints}")),
        "MONTHLY" => Ok(format!("HMX,{asset},{datapoints}")),
        _ => Err("GET[range] not valid, possible=DAILY|WEEKLY|MONTHLY".into()),
    }
}

/// Build the symbol-search command, or a client-visible error.
fn search_command(query: &str) -> Result<String, String> {
    let field = query_param(query, "field").ok_or("GET[field] missing")?;
    let search = query_param(query, "search").ok_or("GET[search] missing")?;
    let kind = query_param(query, "type").ok_or("GET[type] missing")?;

    let field = match field.as_str() {
        "SYMBOL" => "s",
        "DESCRIPTION" => "d",
        _ => return Err("GET[field] invalid, can only search on SYMBOL|DESCRIPTION".into()),
    };
    let kind = match kind.as_str() {
        "EQUITY" => "1",
        _ => return Err("GET[type] invalid, can only have EQUITY".into()),
    };

    Ok(format!("SBF,{field},{search},t,{kind}"))
}

async fn ohlc(
    accept: &str,
    query: &str,
    cfg: &IqmuxConfig,
    proxy: &Proxy,
) -> Response<Full<Bytes>> {
    let cmd = match ohlc_command(query) {
        Ok(cmd) => cmd,
        Err(msg) => return encode::error(accept, &msg, None),
    };

    let mut bars: Vec<Ohlc> = Vec::new();
    let mut sink = |line: Vec<u8>| match Ohlc::parse(&line) {
        Some(bar) => {
            bars.push(bar);
            Ok(())
        }
        None => Err(ProxyError::Sink(format!(
            "failed parsing line={}",
            String::from_utf8_lossy(&line)
        ))),
    };

    if let Err(e) = proxy
        .serve(cmd.as_bytes(), cfg.http.max_datapoints, &mut sink)
        .await
    {
        warn!(target: "iqmux::http", error = %e, "OHLC lookup failed");
        return encode::error(accept, "Upstream error", Some(e.to_string()));
    }

    encode::rows(accept, &bars)
}

async fn search(
    accept: &str,
    query: &str,
    cfg: &IqmuxConfig,
    proxy: &Proxy,
) -> Response<Full<Bytes>> {
    let cmd = match search_command(query) {
        Ok(cmd) => cmd,
        Err(msg) => return encode::error(accept, &msg, None),
    };

    let mut hits: Vec<SearchHit> = Vec::new();
    let mut sink = |line: Vec<u8>| match SearchHit::parse(&line) {
        Some(hit) => {
            hits.push(hit);
            Ok(())
        }
        None => Err(ProxyError::Sink(format!(
            "failed parsing line={}",
            String::from_utf8_lossy(&line)
        ))),
    };

    if let Err(e) = proxy
        .serve(cmd.as_bytes(), cfg.http.max_datapoints, &mut sink)
        .await
    {
        warn!(target: "iqmux::http", error = %e, "Search lookup failed");
        return encode::error(accept, "Upstream error", Some(e.to_string()));
    }

    encode::rows(accept, &hits)
}

/// Toggle the wire-verbosity flag.
fn verbose() -> Response<Full<Bytes>> {
    let on = utils::toggle_wire_verbose();
    info!(target: "iqmux::http", on, "Verbosity toggled over HTTP");
    let state = if on { "ON" } else { "OFF" };
    encode::respond(
        StatusCode::OK,
        "application/json",
        Bytes::from(format!("{{\"success\": true, \"msg\": \"Set verbosity to {state}\"}}")),
    )
}

/// Self-documenting index; also the 404 fallback for unknown paths.
fn doc() -> Response<Full<Bytes>> {
    let body = concat!(
        "<html><head><title>IQ API</title></head><body>",
        "<h1>IQ API</h1><p>IQConnect HTTP abstraction</p><ul>",
        "<li><code>/</code> - this documentation</li>",
        "<li><code>/verbose</code> - toggle verbosity-mode</li>",
        "<li><code>/ohlc</code> - read OHLC ?asset=AAPL&amp;range=DAILY|WEEKLY|MONTHLY&amp;datapoints=10</li>",
        "<li><code>/search</code> - search assets ?field=SYMBOL|DESCRIPTION&amp;search=*&amp;type=EQUITY</li>",
        "</ul></body></html>",
    );
    encode::respond(
        StatusCode::NOT_FOUND,
        "text/html",
        Bytes::from_static(body.as_bytes()),
    )
}
