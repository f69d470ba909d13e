pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS issue (
  issue_hash TEXT PRIMARY KEY,
  issue_title TEXT NOT NULL,
  scenario_id TEXT NOT NULL,
  scenario_version TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS incident (
  trace_id TEXT NOT NULL,
  issue_hash TEXT NOT NULL,
  incident_collection_time TIMESTAMP NOT NULL,
  PRIMARY KEY(trace_id, issue_hash)
);

CREATE TABLE IF NOT EXISTS span (
  trace_id TEXT NOT NULL,
  span_id TEXT NOT NULL,
  parent_span_id TEXT,
  is_root BOOLEAN NOT NULL DEFAULT FALSE,
  kind TEXT,
  start_time TIMESTAMP NOT NULL,
  latency DOUBLE,
  source TEXT,
  destination TEXT,
  workload_id_list VARCHAR[],
  protocol TEXT,
  issue_hash_list VARCHAR[],
  request_payload_size BIGINT,
  response_payload_size BIGINT,
  method TEXT,
  route TEXT,
  scheme TEXT,
  path TEXT,
  query TEXT,
  status INTEGER,
  metadata TEXT,
  username TEXT,
  source_ip TEXT,
  destination_ip TEXT,
  service_name TEXT,
  errors TEXT,
  PRIMARY KEY(trace_id, span_id)
);

CREATE TABLE IF NOT EXISTS span_raw_data (
  trace_id TEXT NOT NULL,
  span_id TEXT NOT NULL,
  req_headers BLOB,
  resp_headers BLOB,
  is_truncated BOOLEAN,
  req_body BLOB,
  resp_body BLOB,
  PRIMARY KEY(trace_id, span_id)
);

CREATE TABLE IF NOT EXISTS error_data (
  id TEXT PRIMARY KEY,
  data BLOB
);

CREATE INDEX IF NOT EXISTS idx_incident_issue ON incident(issue_hash);
CREATE INDEX IF NOT EXISTS idx_incident_time ON incident(incident_collection_time);

CREATE INDEX IF NOT EXISTS idx_span_trace ON span(trace_id);
CREATE INDEX IF NOT EXISTS idx_span_start ON span(start_time);
CREATE INDEX IF NOT EXISTS idx_span_source ON span(source);
CREATE INDEX IF NOT EXISTS idx_span_destination ON span(destination);
"#;
