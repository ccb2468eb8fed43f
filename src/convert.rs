use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use opentelemetry::trace::{SpanId, TraceId};
use opentelemetry_sdk::trace::{IdGenerator as _, RandomIdGenerator};
use rand::Rng as _;

const BASE64_CHARS: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
const NEW_ID_LEN: usize = 22;

/// A new opaque 22 character id drawn from the base64 alphabet, used for user and session ids.
pub(crate) fn new_id() -> String {
    let mut rng = rand::rng();
    (0..NEW_ID_LEN)
        .map(|_| BASE64_CHARS[rng.random_range(0..BASE64_CHARS.len())] as char)
        .collect()
}

/// A new W3C trace id, used as operation id.
pub(crate) fn new_operation_id() -> String {
    let trace_id: TraceId = RandomIdGenerator::default().new_trace_id();
    trace_id.to_string()
}

/// A new W3C span id, used as telemetry id for dependencies and page views.
pub(crate) fn new_span_id() -> String {
    let span_id: SpanId = RandomIdGenerator::default().new_span_id();
    span_id.to_string()
}

pub(crate) fn ms_to_time(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

pub(crate) fn time_to_string(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// HTTP-date as used in the `expires` cookie attribute.
pub(crate) fn ms_to_http_date(ms: i64) -> String {
    ms_to_time(ms)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

/// Application Insights time span: `[d.]hh:mm:ss.fff`.
pub(crate) fn ms_to_time_span(ms: f64) -> String {
    let ms = if ms.is_finite() && ms > 0.0 {
        ms.round() as u64
    } else {
        0
    };
    let millis = ms % 1000;
    let s = ms / 1000 % 60;
    let m = ms / 1000 / 60 % 60;
    let h = ms / 1000 / 60 / 60 % 24;
    let d = ms / 1000 / 60 / 60 / 24;
    let days = if d > 0 {
        format!("{}.", d)
    } else {
        String::new()
    };
    format!("{}{:0>2}:{:0>2}:{:0>2}.{:0>3}", days, h, m, s, millis)
}
