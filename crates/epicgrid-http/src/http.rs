use crate::{
    GridQuery, GridQueryError, GridService, PermissionOracle, ProjectSource, ServiceError,
    StatisticsTarget,
};
use epicgrid_core::{EpicgridConfig, UserId};
use epicgrid_index::ResponseStamp;
use serde_json::{Value, json};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use thiserror::Error;

pub const USER_HEADER: &str = "x-epicgrid-user";

#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub bind: SocketAddr,
}

#[derive(Debug, Error)]
pub enum HttpServeError {
    #[error("bind failed: {0}")]
    Bind(std::io::Error),
    #[error("accept failed: {0}")]
    Accept(std::io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Value,
}

impl HttpResponse {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Healthz,
    Index,
    Grid(GridQuery),
    Statistics(StatisticsTarget),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<GridQueryError> for RouteError {
    fn from(err: GridQueryError) -> Self {
        RouteError::BadRequest(err.to_string())
    }
}

/// The parts of a request the router looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: String,
    pub target: String,
    pub user: Option<UserId>,
}

pub fn serve_grid_api<S, P>(
    config: HttpServerConfig,
    service: &GridService<S, P>,
) -> Result<(), HttpServeError>
where
    S: ProjectSource,
    P: PermissionOracle,
{
    let listener = TcpListener::bind(config.bind).map_err(HttpServeError::Bind)?;
    tracing::info!(bind = %config.bind, "grid api listening");
    serve_listener(&listener, service, None)
}

/// Serve requests one at a time; stop after `max_requests` when given.
pub fn serve_listener<S, P>(
    listener: &TcpListener,
    service: &GridService<S, P>,
    max_requests: Option<usize>,
) -> Result<(), HttpServeError>
where
    S: ProjectSource,
    P: PermissionOracle,
{
    let mut served = 0usize;

    for stream in listener.incoming() {
        match stream {
            Ok(mut stream) => {
                if let Err(err) = handle_connection(&mut stream, service) {
                    tracing::error!(%err, "connection failed");
                    let _ = write_json_response(
                        &mut stream,
                        HttpResponse::error(500, format!("internal server error: {err}")),
                    );
                }
                served += 1;
            }
            Err(err) => return Err(HttpServeError::Accept(err)),
        }

        if let Some(limit) = max_requests
            && served >= limit
        {
            break;
        }
    }

    Ok(())
}

fn handle_connection<S, P>(
    stream: &mut TcpStream,
    service: &GridService<S, P>,
) -> Result<(), std::io::Error>
where
    S: ProjectSource,
    P: PermissionOracle,
{
    let response = match read_request_head(stream) {
        Ok(head) => respond(service, &head),
        Err(err) => route_error_response(err),
    };
    write_json_response(stream, response)
}

/// Route and execute one request.
pub fn respond<S, P>(service: &GridService<S, P>, head: &RequestHead) -> HttpResponse
where
    S: ProjectSource,
    P: PermissionOracle,
{
    let response = if head.method != "GET" {
        HttpResponse::error(405, "method not allowed; use GET")
    } else {
        match parse_route_target(&head.target, service.config()) {
            Ok(route) => execute_route(service, route, head.user),
            Err(err) => route_error_response(err),
        }
    };
    tracing::info!(
        method = %head.method,
        target = %head.target,
        status = response.status,
        "request served"
    );
    response
}

fn read_request_head(stream: &mut TcpStream) -> Result<RequestHead, RouteError> {
    let mut buf = [0u8; 8192];
    let n = stream
        .read(&mut buf)
        .map_err(|e| RouteError::BadRequest(format!("failed to read request: {e}")))?;
    if n == 0 {
        return Err(RouteError::BadRequest("empty request".to_string()));
    }
    parse_request_head(&String::from_utf8_lossy(&buf[..n]))
}

pub fn parse_request_head(request: &str) -> Result<RequestHead, RouteError> {
    let mut lines = request.lines();
    let line = lines
        .next()
        .ok_or_else(|| RouteError::BadRequest("missing request line".to_string()))?;
    let mut parts = line.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| RouteError::BadRequest("missing method".to_string()))?;
    let target = parts
        .next()
        .ok_or_else(|| RouteError::BadRequest("missing target".to_string()))?;

    let mut user = None;
    for header in lines.take_while(|line| !line.is_empty()) {
        let Some((name, value)) = header.split_once(':') else {
            continue;
        };
        if name.trim().eq_ignore_ascii_case(USER_HEADER) {
            let value = value.trim();
            let id = value.parse::<UserId>().map_err(|_| {
                RouteError::BadRequest(format!("invalid {USER_HEADER} header: {value}"))
            })?;
            user = Some(id);
        }
    }

    Ok(RequestHead {
        method: method.to_string(),
        target: target.to_string(),
        user,
    })
}

pub fn parse_route_target(target: &str, config: &EpicgridConfig) -> Result<Route, RouteError> {
    let (path, query) = split_target(target);
    let params = parse_query_params(query)?;

    match path {
        "/" => Ok(Route::Index),
        "/healthz" => Ok(Route::Healthz),
        "/grid" => Ok(Route::Grid(GridQuery::from_params(&params, config)?)),
        "/statistics" => Ok(Route::Statistics(StatisticsTarget::Project)),
        "/statistics/epic" => Ok(Route::Statistics(StatisticsTarget::Epic(id_param(&params)?))),
        "/statistics/feature" => Ok(Route::Statistics(StatisticsTarget::Feature(id_param(
            &params,
        )?))),
        "/statistics/user_story" => Ok(Route::Statistics(StatisticsTarget::UserStory(
            id_param(&params)?,
        ))),
        "/statistics/version" => Ok(Route::Statistics(StatisticsTarget::Version(id_param(
            &params,
        )?))),
        _ => Err(RouteError::NotFound(format!("unknown route: {path}"))),
    }
}

fn id_param(params: &[(String, String)]) -> Result<u64, GridQueryError> {
    let value = params
        .iter()
        .find(|(name, _)| name == "id")
        .map(|(_, value)| value)
        .ok_or(GridQueryError::MissingParam("id"))?;
    value.parse().map_err(|_| GridQueryError::InvalidParam {
        param: "id".to_string(),
        value: value.clone(),
    })
}

fn split_target(target: &str) -> (&str, &str) {
    match target.split_once('?') {
        Some((path, query)) => (path, query),
        None => (target, ""),
    }
}

/// Decoded `name=value` pairs in request order; repeated names are kept.
fn parse_query_params(query: &str) -> Result<Vec<(String, String)>, RouteError> {
    let mut out = Vec::new();
    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        let key = percent_decode(k)?;
        if key.is_empty() {
            continue;
        }
        out.push((key, percent_decode(v)?));
    }
    Ok(out)
}

fn percent_decode(input: &str) -> Result<String, RouteError> {
    let spaced = input.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .map_err(|e| RouteError::BadRequest(format!("invalid percent-encoding in `{input}`: {e}")))
}

pub fn execute_route<S, P>(
    service: &GridService<S, P>,
    route: Route,
    user: Option<UserId>,
) -> HttpResponse
where
    S: ProjectSource,
    P: PermissionOracle,
{
    let stamp = ResponseStamp::now();
    match route {
        Route::Healthz => HttpResponse::ok(json!({ "ok": true })),
        Route::Index => HttpResponse::ok(json!({
            "service": "epicgrid.grid.v2",
            "routes": [
                "/healthz",
                "/grid?filters[<key>][]=<value>&include_closed=<bool>&sort_options[epic][sort_by]=<field>",
                "/statistics",
                "/statistics/epic?id=<issue_id>",
                "/statistics/feature?id=<issue_id>",
                "/statistics/user_story?id=<issue_id>",
                "/statistics/version?id=<version_id>"
            ]
        })),
        Route::Grid(query) => match service.grid(user, &query, &stamp) {
            Ok(payload) => match serde_json::to_value(&payload) {
                Ok(body) => HttpResponse::ok(body),
                Err(err) => HttpResponse::error(500, err.to_string()),
            },
            Err(err) => service_error_response(err),
        },
        Route::Statistics(target) => match service.statistics(user, target, &stamp) {
            Ok(body) => HttpResponse::ok(body),
            Err(err) => service_error_response(err),
        },
    }
}

fn route_error_response(err: RouteError) -> HttpResponse {
    match err {
        RouteError::BadRequest(msg) => HttpResponse::error(400, msg),
        RouteError::NotFound(msg) => HttpResponse::error(404, msg),
    }
}

fn service_error_response(err: ServiceError) -> HttpResponse {
    let status = match err {
        ServiceError::Forbidden { .. } => 403,
        ServiceError::NotFound { .. } => 404,
        ServiceError::Load(_) | ServiceError::Serialization(_) => 500,
    };
    HttpResponse::error(status, err.to_string())
}

fn write_json_response(stream: &mut TcpStream, response: HttpResponse) -> std::io::Result<()> {
    let body = serde_json::to_vec(&response.body)?;
    let header = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nAccess-Control-Allow-Origin: *\r\nAccess-Control-Allow-Methods: GET\r\nConnection: close\r\n\r\n",
        response.status,
        reason_phrase(response.status),
        body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(&body)?;
    stream.flush()
}

pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ProjectMembership, fixture};
    use epicgrid_core::{IssueFilter, ProjectData};

    fn service() -> GridService<ProjectData, ProjectMembership> {
        GridService::new(fixture::project(), ProjectMembership, EpicgridConfig::default())
    }

    fn get(target: &str, user: Option<UserId>) -> RequestHead {
        RequestHead {
            method: "GET".to_string(),
            target: target.to_string(),
            user,
        }
    }

    #[test]
    fn request_head_reads_user_header_case_insensitively() {
        let head = parse_request_head(
            "GET /grid HTTP/1.1\r\nHost: localhost\r\nX-EpicGrid-User: 2\r\n\r\n",
        )
        .expect("head should parse");
        assert_eq!(head.method, "GET");
        assert_eq!(head.target, "/grid");
        assert_eq!(head.user, Some(2));

        let err = parse_request_head("GET / HTTP/1.1\r\nX-Epicgrid-User: bob\r\n\r\n")
            .expect_err("non-numeric user should fail");
        assert!(matches!(err, RouteError::BadRequest(_)));
    }

    #[test]
    fn route_parsing_decodes_filter_brackets() {
        let config = EpicgridConfig::default();
        let route = parse_route_target(
            "/grid?filters%5Bsubject_cont%5D=login+page&filters[parent_id_in][]=2",
            &config,
        )
        .expect("route should parse");
        let Route::Grid(query) = route else {
            panic!("expected grid route");
        };
        let filters: Vec<&IssueFilter> = query.filters.iter().collect();
        assert_eq!(
            filters,
            vec![
                &IssueFilter::SubjectCont("login page".to_string()),
                &IssueFilter::ParentIdIn(vec![2]),
            ]
        );
    }

    #[test]
    fn route_parsing_reports_missing_and_bad_ids() {
        let config = EpicgridConfig::default();
        let err = parse_route_target("/statistics/epic", &config).expect_err("missing id");
        assert!(matches!(err, RouteError::BadRequest(_)));
        let err = parse_route_target("/statistics/version?id=v1", &config).expect_err("bad id");
        assert!(matches!(err, RouteError::BadRequest(_)));
        let err = parse_route_target("/kanban", &config).expect_err("unknown route");
        assert!(matches!(err, RouteError::NotFound(_)));
    }

    #[test]
    fn responses_map_errors_to_status_codes() {
        let service = service();
        assert_eq!(respond(&service, &get("/healthz", None)).status, 200);
        assert_eq!(respond(&service, &get("/grid", None)).status, 403);
        assert_eq!(respond(&service, &get("/grid", Some(2))).status, 200);
        assert_eq!(respond(&service, &get("/grid?filters[nope]=1", Some(2))).status, 400);
        assert_eq!(respond(&service, &get("/statistics/epic?id=99", Some(1))).status, 404);
        assert_eq!(respond(&service, &get("/missing", Some(1))).status, 404);

        let post = RequestHead {
            method: "POST".to_string(),
            ..get("/grid", Some(1))
        };
        assert_eq!(respond(&service, &post).status, 405);
    }

    #[test]
    fn grid_response_carries_the_wire_sections() {
        let response = respond(&service(), &get("/grid", Some(2)));
        assert_eq!(response.body["grid"]["version_order"], json!(["10", "none"]));
        assert_eq!(response.body["grid"]["index"]["1:2:10"], json!(["3"]));
        assert_eq!(response.body["metadata"]["api_version"], "v2");
        assert!(response.body["entities"]["epics"]["1"].is_object());
    }

    #[test]
    fn server_answers_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        let client = std::thread::spawn(move || {
            let mut stream = TcpStream::connect(addr).expect("connect");
            stream
                .write_all(b"GET /healthz HTTP/1.1\r\nHost: localhost\r\n\r\n")
                .expect("send request");
            let mut reply = String::new();
            stream.read_to_string(&mut reply).expect("read reply");
            reply
        });

        serve_listener(&listener, &service(), Some(1)).expect("serve one request");
        let reply = client.join().expect("client thread");
        assert!(reply.starts_with("HTTP/1.1 200 OK\r\n"), "{reply}");
        assert!(reply.ends_with(r#"{"ok":true}"#), "{reply}");
    }
}
