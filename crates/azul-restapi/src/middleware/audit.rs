//! # Audit Middleware
//!
//! Emits one line per HTTP transaction to a dedicated audit sink, separate
//! from application logs.
//!
//! ## Lifecycle
//!
//! 1. Before routing continues, a [`RequestContext`] is inserted into the
//!    request extensions and the request-side fields are captured.
//! 2. The inner service runs. The auth guard stores the caller's identity in
//!    the context; handlers may set the security label response header.
//! 3. With the status and headers fixed but before the body is streamed, the
//!    username is appended as `X-Username`, the record is rendered and handed
//!    to the sink.
//!
//! Paths on the exclusion list skip all of the above. Sink failures are
//! logged and swallowed. Nothing from the caller's credential is ever part
//! of a record.

use std::collections::HashSet;
use std::io::Write;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, MatchedPath, Request, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::config::AuditConfig;
use crate::context::RequestContext;

/// Response header carrying the authenticated username.
pub const X_USERNAME: HeaderName = HeaderName::from_static("x-username");

pub const DEFAULT_AUDIT_FORMAT: &str = concat!(
    "full_time={time} client_ip={client_ip} client_port={client_port} ",
    "connection={connection} username={username} method={method} path={path} ",
    "generic_path={generic_path} status={status_code} user_agent=\"{user_agent}\" ",
    "referer={referer} duration_ms={duration_ms} security=\"{security}\"",
);

const ABSENT: &str = "-";

// ── Record ──────────────────────────────────────────────────────────

/// One completed HTTP transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    /// When the response started.
    pub time: DateTime<Utc>,
    pub client_ip: Option<IpAddr>,
    pub client_port: Option<u16>,
    pub connection: Option<String>,
    pub username: String,
    pub method: String,
    pub path: String,
    /// Route template with the root path prepended. `None` when no route
    /// matched.
    pub generic_path: Option<String>,
    pub status_code: u16,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    pub duration: Duration,
    pub security: String,
}

// ── Format ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Time,
    ClientIp,
    ClientPort,
    Connection,
    Username,
    Method,
    Path,
    GenericPath,
    StatusCode,
    UserAgent,
    Referer,
    DurationS,
    DurationMs,
    DurationUs,
    Security,
}

impl Field {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "time" => Self::Time,
            "client_ip" => Self::ClientIp,
            "client_port" => Self::ClientPort,
            "connection" => Self::Connection,
            "username" => Self::Username,
            "method" => Self::Method,
            "path" => Self::Path,
            "generic_path" => Self::GenericPath,
            "status_code" => Self::StatusCode,
            "user_agent" => Self::UserAgent,
            "referer" => Self::Referer,
            "duration_s" => Self::DurationS,
            "duration_ms" => Self::DurationMs,
            "duration_us" => Self::DurationUs,
            "security" => Self::Security,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(Field),
}

/// A parsed audit line template.
///
/// `{name}` placeholders are substituted; `{{` and `}}` are literal braces.
/// Unknown placeholders are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditFormat {
    segments: Vec<Segment>,
}

impl Default for AuditFormat {
    fn default() -> Self {
        Self::parse(DEFAULT_AUDIT_FORMAT)
    }
}

impl AuditFormat {
    pub fn parse(template: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = template;

        while let Some(idx) = rest.find(['{', '}']) {
            literal.push_str(&rest[..idx]);
            let tail = &rest[idx..];

            if tail.starts_with("{{") || tail.starts_with("}}") {
                literal.push_str(&tail[..1]);
                rest = &tail[2..];
                continue;
            }
            if tail.starts_with('}') {
                literal.push('}');
                rest = &tail[1..];
                continue;
            }

            match tail.find('}') {
                Some(end) => {
                    let name = &tail[1..end];
                    match Field::from_name(name) {
                        Some(field) => {
                            if !literal.is_empty() {
                                segments.push(Segment::Literal(std::mem::take(&mut literal)));
                            }
                            segments.push(Segment::Field(field));
                        }
                        None => literal.push_str(&tail[..=end]),
                    }
                    rest = &tail[end + 1..];
                }
                None => {
                    literal.push_str(tail);
                    rest = "";
                }
            }
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Self { segments }
    }

    pub fn render(&self, record: &AuditRecord) -> String {
        let mut line = String::with_capacity(256);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => line.push_str(text),
                Segment::Field(field) => push_field(&mut line, *field, record),
            }
        }
        line
    }
}

fn push_field(line: &mut String, field: Field, record: &AuditRecord) {
    use std::fmt::Write as _;

    let opt = |value: &Option<String>| value.as_deref().unwrap_or(ABSENT).to_string();
    let nanos = record.duration.as_nanos() as f64;
    // Writing into a String cannot fail.
    let _ = match field {
        Field::Time => write!(line, "{}", record.time.format("%d/%b/%Y:%H:%M:%S%.6f")),
        Field::ClientIp => match record.client_ip {
            Some(ip) => write!(line, "{ip}"),
            None => write!(line, "{ABSENT}"),
        },
        Field::ClientPort => match record.client_port {
            Some(port) => write!(line, "{port}"),
            None => write!(line, "{ABSENT}"),
        },
        Field::Connection => write!(line, "{}", opt(&record.connection)),
        Field::Username => write!(line, "{}", record.username),
        Field::Method => write!(line, "{}", record.method),
        Field::Path => write!(line, "{}", record.path),
        Field::GenericPath => write!(line, "{}", opt(&record.generic_path)),
        Field::StatusCode => write!(line, "{}", record.status_code),
        Field::UserAgent => write!(line, "{}", opt(&record.user_agent)),
        Field::Referer => write!(line, "{}", opt(&record.referer)),
        Field::DurationS => write!(line, "{:.6}", record.duration.as_secs_f64()),
        Field::DurationMs => write!(line, "{:.3}", nanos / 1_000_000.0),
        Field::DurationUs => write!(line, "{:.0}", nanos / 1_000.0),
        Field::Security => write!(line, "{}", record.security),
    };
}

// ── Sinks ───────────────────────────────────────────────────────────

/// Destination for rendered audit lines.
pub trait AuditSink: Send + Sync {
    fn write_line(&self, line: &str) -> std::io::Result<()>;
}

/// Sink over any writer, typically a `tracing_appender` non-blocking
/// handle so emission never waits on disk.
pub struct WriterSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl WriterSink {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }
}

impl AuditSink for WriterSink {
    fn write_line(&self, line: &str) -> std::io::Result<()> {
        let mut writer = self.writer.lock();
        writeln!(writer, "{line}")?;
        writer.flush()
    }
}

/// In-memory sink. Lines are kept in emission order.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

impl AuditSink for MemorySink {
    fn write_line(&self, line: &str) -> std::io::Result<()> {
        self.lines.lock().push(line.to_string());
        Ok(())
    }
}

// ── Recorder ────────────────────────────────────────────────────────

struct RecorderInner {
    format: AuditFormat,
    excluded: HashSet<String>,
    security_header: HeaderName,
    root_path: String,
    sink: Arc<dyn AuditSink>,
}

/// Shared audit settings plus the sink. Cheap to clone.
#[derive(Clone)]
pub struct AuditRecorder {
    inner: Arc<RecorderInner>,
}

impl std::fmt::Debug for AuditRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditRecorder")
            .field("excluded", &self.inner.excluded)
            .field("security_header", &self.inner.security_header)
            .field("root_path", &self.inner.root_path)
            .finish_non_exhaustive()
    }
}

impl AuditRecorder {
    pub fn new(config: &AuditConfig, root_path: &str, sink: Arc<dyn AuditSink>) -> Self {
        Self {
            inner: Arc::new(RecorderInner {
                format: AuditFormat::parse(&config.format),
                excluded: config.path_filter.iter().cloned().collect(),
                security_header: config.security_header.clone(),
                root_path: root_path.trim_end_matches('/').to_string(),
                sink,
            }),
        }
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.inner.excluded.contains(path)
    }

    pub fn security_header(&self) -> &HeaderName {
        &self.inner.security_header
    }

    /// Root path joined with the matched route template.
    pub fn generic_path(&self, matched: Option<&str>) -> Option<String> {
        matched.map(|route| format!("{}{route}", self.inner.root_path))
    }

    pub fn render(&self, record: &AuditRecord) -> String {
        self.inner.format.render(record)
    }

    /// Render and write one record. Never fails.
    pub fn emit(&self, record: &AuditRecord) {
        let line = self.render(record);
        if let Err(e) = self.inner.sink.write_line(&line) {
            tracing::warn!(error = %e, path = %record.path, "failed to write audit record");
        }
    }
}

// ── Middleware ──────────────────────────────────────────────────────

fn header_string(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Audit one request/response cycle.
///
/// Must be installed with `Router::layer` so it runs after routing and sees
/// [`MatchedPath`].
pub async fn audit_middleware(
    State(recorder): State<AuditRecorder>,
    mut request: Request,
    next: Next,
) -> Response {
    if recorder.is_excluded(request.uri().path()) {
        return next.run(request).await;
    }

    let started = Instant::now();
    let context = RequestContext::new();
    request.extensions_mut().insert(context.clone());

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let generic_path =
        recorder.generic_path(request.extensions().get::<MatchedPath>().map(MatchedPath::as_str));
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let headers = request.headers();
    let connection = header_string(headers, &header::CONNECTION);
    let user_agent = header_string(headers, &header::USER_AGENT);
    let referer = header_string(headers, &header::REFERER);

    let mut response = next.run(request).await;
    let time = Utc::now();

    let username = context.username().to_string();
    let security = response
        .headers()
        .get(recorder.security_header())
        .and_then(|v| v.to_str().ok())
        .unwrap_or(ABSENT)
        .to_string();

    match HeaderValue::from_str(&username) {
        Ok(value) => {
            response.headers_mut().append(X_USERNAME, value);
        }
        Err(_) => tracing::debug!("username is not a valid header value, X-Username omitted"),
    }

    recorder.emit(&AuditRecord {
        time,
        client_ip: peer.map(|addr| addr.ip()),
        client_port: peer.map(|addr| addr.port()),
        connection,
        username,
        method,
        path,
        generic_path,
        status_code: response.status().as_u16(),
        user_agent,
        referer,
        duration: started.elapsed(),
        security,
    });

    response
}
