use chrono::{DateTime, Duration, TimeZone, Utc};
use sightline_core::model::{ErrorDataRow, RawDataRow, SpanRow};
use sightline_core::payload::compress_bytes;
use sightline_store::Store;
use sightline_store::seed::{IncidentSeed, IssueSeed};

pub const CHECKOUT_ISSUE: &str = "checkout-5xx";
pub const INVENTORY_ISSUE: &str = "slow-inventory";
pub const CORRUPT_TRACE: &str = "trace-04";

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap()
}

pub fn checkout_trace(i: usize) -> String {
    format!("trace-{i:02}")
}

/// A two-span trace: the root request from the web tier and the failing
/// call it made to the payments service.
pub fn sample_trace(trace_id: &str, at: DateTime<Utc>, issues: &[&str]) -> Vec<SpanRow> {
    vec![
        SpanRow {
            trace_id: trace_id.to_string(),
            span_id: "root".to_string(),
            is_root: true,
            kind: Some("SERVER".to_string()),
            start_time: Some(at),
            latency: Some(1_800_000.0),
            source: Some("web-7d9f8c-x2x4z".to_string()),
            destination: Some("checkout-5c8d9-abcde".to_string()),
            protocol: Some("HTTP".to_string()),
            method: Some("POST".to_string()),
            route: Some("/v1/checkout".to_string()),
            path: Some("/v1/checkout".to_string()),
            scheme: Some("http".to_string()),
            status: Some(502),
            service_name: Some("checkout".to_string()),
            workload_id_list: vec!["wl-http-errors".to_string()],
            ..SpanRow::default()
        },
        SpanRow {
            trace_id: trace_id.to_string(),
            span_id: "db".to_string(),
            parent_span_id: Some("root".to_string()),
            kind: Some("CLIENT".to_string()),
            start_time: Some(at + Duration::milliseconds(300)),
            latency: Some(900_000.0),
            source: Some("checkout-5c8d9-abcde".to_string()),
            destination: Some("payments-6f7b8-zzzzz".to_string()),
            protocol: Some("HTTP".to_string()),
            method: Some("GET".to_string()),
            path: Some("/balance".to_string()),
            status: Some(500),
            service_name: Some("payments".to_string()),
            issue_hash_list: issues.iter().map(|s| s.to_string()).collect(),
            errors: Some("upstream reset".to_string()),
            ..SpanRow::default()
        },
    ]
}

/// An in-memory store holding `checkout-5xx` in seven incidents (one per
/// hour), `slow-inventory` in one incident two days later, raw payloads for
/// every checkout trace (the one for `trace-04` is not valid gzip) and two
/// stored errors.
pub fn seeded_store() -> anyhow::Result<Store> {
    let store = Store::open_in_memory()?;
    store.insert_issues(&[
        IssueSeed {
            issue_hash: CHECKOUT_ISSUE.to_string(),
            issue_title: "checkout returns 5xx".to_string(),
            scenario_id: "4".to_string(),
            scenario_version: "v2".to_string(),
        },
        IssueSeed {
            issue_hash: INVENTORY_ISSUE.to_string(),
            issue_title: "slow inventory lookups".to_string(),
            scenario_id: "9".to_string(),
            scenario_version: "v1".to_string(),
        },
    ])?;

    let mut incidents = Vec::new();
    let mut spans = Vec::new();
    for i in 0..7 {
        let trace_id = checkout_trace(i);
        let at = base_time() + Duration::hours(i as i64);
        incidents.push(IncidentSeed {
            trace_id: trace_id.clone(),
            issue_hash: CHECKOUT_ISSUE.to_string(),
            incident_collection_time: at + Duration::seconds(5),
        });
        spans.extend(sample_trace(&trace_id, at, &[CHECKOUT_ISSUE]));

        let raw = if trace_id == CORRUPT_TRACE {
            RawDataRow {
                span_id: "db".to_string(),
                resp_body: Some(b"\x1f\x8b definitely truncated".to_vec()),
                ..RawDataRow::default()
            }
        } else {
            RawDataRow {
                span_id: "db".to_string(),
                req_headers: Some(compress_bytes(b"accept: application/json")?),
                resp_headers: Some(compress_bytes(b"content-type: application/json")?),
                is_truncated: Some(false),
                req_body: Some(compress_bytes(b"{\"account\":\"a-17\"}")?),
                resp_body: Some(compress_bytes(b"{\"error\":\"connection reset\"}")?),
                ..RawDataRow::default()
            }
        };
        store.insert_raw_data(&trace_id, &[raw])?;
    }

    let late = base_time() + Duration::days(2);
    incidents.push(IncidentSeed {
        trace_id: "trace-10".to_string(),
        issue_hash: INVENTORY_ISSUE.to_string(),
        incident_collection_time: late,
    });
    let mut inventory = sample_trace("trace-10", late, &[INVENTORY_ISSUE]);
    for span in &mut inventory {
        span.destination = Some("inventory-55d4c-q1w2e".to_string());
    }
    spans.extend(inventory);

    store.insert_incidents(&incidents)?;
    store.insert_spans(&spans)?;
    store.insert_error_data(&[
        ErrorDataRow {
            id: "err-1".to_string(),
            data: Some(compress_bytes(b"java.net.SocketException: Connection reset")?),
        },
        ErrorDataRow {
            id: "err-2".to_string(),
            data: None,
        },
    ])?;
    Ok(store)
}
