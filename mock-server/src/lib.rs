use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{
    extract::{Multipart, Path, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};
use uuid::Uuid;

pub const TOKEN: &str = "mock-ssc-token";
pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "password";
pub const ISSUE_TEMPLATE_ID: &str = "Prioritized-HighRisk-Project-Template";
pub const CLOUD_JOB_TOKEN: &str = "2f5a1e08-job";

/// Rows served by `/ssc/api/v1/bulk`; the body comes to roughly 12 MiB.
pub const BULK_ROWS: usize = 100_000;

/// Seconds the `/ssc/api/v1/slow` route waits before answering.
pub const SLOW_ROUTE_DELAY: Duration = Duration::from_secs(3);

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub issue_template_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectVersion {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub active: bool,
    pub committed: bool,
    pub issue_template_id: String,
    pub project: Project,
}

#[derive(Clone, Debug)]
pub struct Artifact {
    pub id: u64,
    pub project_version_id: u64,
    pub file_name: String,
    pub content: Vec<u8>,
}

#[derive(Debug)]
pub struct Store {
    next_id: u64,
    pub projects: Vec<Project>,
    pub versions: Vec<ProjectVersion>,
    pub attributes: HashMap<u64, Vec<Value>>,
    pub attribute_definitions: Vec<Value>,
    pub artifacts: Vec<Artifact>,
    /// Outstanding file tokens and their purpose; each is single-use.
    pub file_tokens: HashMap<String, String>,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            next_id: 100,
            projects: Vec::new(),
            versions: Vec::new(),
            attributes: HashMap::new(),
            attribute_definitions: vec![json!({
                "id": 1,
                "guid": "DevPhase",
                "name": "Development Phase",
                "category": "TECHNICAL",
                "type": "SINGLE",
                "required": true,
                "options": [
                    {"guid": "Active", "name": "Active Development", "index": 0},
                    {"guid": "Retired", "name": "Retired", "index": 1}
                ]
            })],
            artifacts: Vec::new(),
            file_tokens: HashMap::new(),
        }
    }
}

impl Store {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn take_file_token(&mut self, token: Option<&String>, purpose: &str) -> bool {
        match token {
            Some(token) if self.file_tokens.get(token).map(String::as_str) == Some(purpose) => {
                self.file_tokens.remove(token);
                true
            }
            _ => false,
        }
    }
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    Router::new()
        .route("/ssc/api/v1/projects", get(list_projects))
        .route("/ssc/api/v1/projectVersions", get(list_versions).post(create_version))
        .route("/ssc/api/v1/projectVersions/{id}", put(update_version))
        .route(
            "/ssc/api/v1/projectVersions/{id}/attributes",
            get(list_version_attributes).post(add_version_attribute),
        )
        .route(
            "/ssc/api/v1/projectVersions/{id}/attributes/",
            get(list_version_attributes),
        )
        .route("/ssc/api/v1/projectVersions/{id}/artifacts", get(list_version_artifacts))
        .route("/ssc/api/v1/artifacts/{id}/scans", get(list_artifact_scans))
        .route(
            "/ssc/api/v1/attributeDefinitions",
            get(list_attribute_definitions).post(create_attribute_definition),
        )
        .route("/ssc/api/v1/issueTemplates", get(list_issue_templates))
        .route("/ssc/api/v1/fileTokens", post(create_file_token))
        .route("/ssc/api/v1/cloudjobs", get(list_cloud_jobs))
        .route("/ssc/api/v1/cloudjobs/{token}", get(get_cloud_job))
        .route("/ssc/api/v1/auth/token", get(get_auth_token))
        .route("/ssc/api/v1/slow", get(slow))
        .route("/ssc/api/v1/bulk", get(bulk))
        .route("/ssc/upload/resultFileUpload.html", post(upload_result_file))
        .route("/ssc/download/artifactDownload.html", get(download_artifact))
        .route("/ssc/download/currentStateFprDownload.html", get(download_current_state))
        .route("/ssc/html/maintenance", get(maintenance_page))
        .layer(middleware::from_fn(require_auth))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Accept `FortifyToken <TOKEN>` or basic `USERNAME:PASSWORD`.
pub fn is_authorized(headers: &HeaderMap) -> bool {
    let Some(value) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    if let Some(token) = value.strip_prefix("FortifyToken ") {
        return token == TOKEN;
    }
    if let Some(encoded) = value.strip_prefix("Basic ") {
        let expected = STANDARD.encode(format!("{USERNAME}:{PASSWORD}"));
        return encoded == expected;
    }
    false
}

async fn require_auth(request: Request, next: Next) -> Response {
    if !is_authorized(request.headers()) {
        debug!(path = %request.uri().path(), "rejecting unauthenticated request");
        return error(StatusCode::UNAUTHORIZED, "Authentication failed");
    }
    next.run(request).await
}

fn envelope(data: Value, status: StatusCode) -> Response {
    let count = data.as_array().map(Vec::len).unwrap_or(1);
    (
        status,
        Json(json!({"data": data, "count": count, "responseCode": status.as_u16()})),
    )
        .into_response()
}

fn error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({"message": message, "responseCode": status.as_u16()})),
    )
        .into_response()
}

async fn list_projects(State(db): State<Db>) -> Response {
    let store = db.read().await;
    envelope(json!(store.projects), StatusCode::OK)
}

async fn list_versions(State(db): State<Db>) -> Response {
    let store = db.read().await;
    envelope(json!(store.versions), StatusCode::OK)
}

async fn create_version(State(db): State<Db>, Json(input): Json<Value>) -> Response {
    let template = input["issueTemplateId"].as_str().unwrap_or_default();
    if template != ISSUE_TEMPLATE_ID {
        return error(StatusCode::BAD_REQUEST, "Unknown issue template");
    }
    let Some(name) = input["name"].as_str() else {
        return error(StatusCode::BAD_REQUEST, "Version name is required");
    };

    let mut store = db.write().await;
    let project = match input["project"]["id"].as_u64() {
        Some(project_id) => match store.projects.iter().find(|p| p.id == project_id) {
            Some(project) => project.clone(),
            None => return error(StatusCode::NOT_FOUND, "Project not found"),
        },
        None => {
            let project = Project {
                id: store.next_id(),
                name: input["project"]["name"].as_str().unwrap_or_default().to_string(),
                description: input["project"]["description"].as_str().unwrap_or_default().to_string(),
                issue_template_id: template.to_string(),
            };
            store.projects.push(project.clone());
            project
        }
    };

    let version = ProjectVersion {
        id: store.next_id(),
        name: name.to_string(),
        description: input["description"].as_str().unwrap_or_default().to_string(),
        active: input["active"].as_bool().unwrap_or(true),
        committed: input["committed"].as_bool().unwrap_or(false),
        issue_template_id: template.to_string(),
        project,
    };
    info!(id = version.id, name = %version.name, "created project version");
    store.versions.push(version.clone());
    envelope(json!(version), StatusCode::CREATED)
}

async fn update_version(
    State(db): State<Db>,
    Path(id): Path<u64>,
    Json(input): Json<Value>,
) -> Response {
    let mut store = db.write().await;
    let Some(version) = store.versions.iter_mut().find(|v| v.id == id) else {
        return error(StatusCode::NOT_FOUND, "Project version not found");
    };
    if let Some(committed) = input["committed"].as_bool() {
        version.committed = committed;
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn list_version_attributes(State(db): State<Db>, Path(id): Path<u64>) -> Response {
    let store = db.read().await;
    if !store.versions.iter().any(|v| v.id == id) {
        return error(StatusCode::NOT_FOUND, "Project version not found");
    }
    let attributes = store.attributes.get(&id).cloned().unwrap_or_default();
    envelope(Value::Array(attributes), StatusCode::OK)
}

async fn add_version_attribute(
    State(db): State<Db>,
    Path(id): Path<u64>,
    Json(input): Json<Value>,
) -> Response {
    let mut store = db.write().await;
    if !store.versions.iter().any(|v| v.id == id) {
        return error(StatusCode::NOT_FOUND, "Project version not found");
    }
    let definition_id = input["attributeDefinitionId"].as_u64();
    if !store
        .attribute_definitions
        .iter()
        .any(|d| d["id"].as_u64() == definition_id && definition_id.is_some())
    {
        return error(StatusCode::BAD_REQUEST, "Unknown attribute definition");
    }
    store.attributes.entry(id).or_default().push(input.clone());
    envelope(input, StatusCode::CREATED)
}

async fn list_version_artifacts(State(db): State<Db>, Path(id): Path<u64>) -> Response {
    let store = db.read().await;
    let artifacts: Vec<Value> = store
        .artifacts
        .iter()
        .filter(|a| a.project_version_id == id)
        .map(|a| {
            json!({
                "id": a.id,
                "originalFileName": a.file_name,
                "projectVersionId": a.project_version_id,
                "status": "PROCESS_COMPLETE",
                "fileSize": a.content.len()
            })
        })
        .collect();
    envelope(Value::Array(artifacts), StatusCode::OK)
}

async fn list_artifact_scans(State(db): State<Db>, Path(id): Path<u64>) -> Response {
    let store = db.read().await;
    match store.artifacts.iter().find(|a| a.id == id) {
        Some(artifact) => envelope(
            json!([{"id": artifact.id * 10, "artifactId": artifact.id, "type": "SCA"}]),
            StatusCode::OK,
        ),
        None => error(StatusCode::NOT_FOUND, "Artifact not found"),
    }
}

/// Strip `<field>:"<value>"` down to `value`.
fn search_term<'a>(expression: &'a str, field: &str) -> Option<&'a str> {
    let value = expression.strip_prefix(field)?.strip_prefix(':')?;
    Some(value.trim_matches('"'))
}

async fn list_attribute_definitions(
    State(db): State<Db>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let store = db.read().await;
    let definitions: Vec<Value> = match params.get("q") {
        Some(q) => {
            let Some(name) = search_term(q, "name") else {
                return error(StatusCode::BAD_REQUEST, "Unsupported search expression");
            };
            store
                .attribute_definitions
                .iter()
                .filter(|d| d["name"] == name)
                .cloned()
                .collect()
        }
        None => store.attribute_definitions.clone(),
    };
    envelope(Value::Array(definitions), StatusCode::OK)
}

async fn create_attribute_definition(State(db): State<Db>, Json(mut input): Json<Value>) -> Response {
    if !input["name"].is_string() {
        return error(StatusCode::BAD_REQUEST, "Attribute name is required");
    }
    let mut store = db.write().await;
    let id = store.next_id();
    input["id"] = json!(id);
    input["guid"] = json!(Uuid::new_v4().to_string());
    store.attribute_definitions.push(input.clone());
    envelope(input, StatusCode::CREATED)
}

async fn list_issue_templates(Query(params): Query<HashMap<String, String>>) -> Response {
    let expression = params
        .get("fields")
        .and_then(|f| f.strip_prefix("q="))
        .or_else(|| params.get("q").map(String::as_str))
        .unwrap_or_default();
    let templates = match search_term(expression, "id") {
        Some(id) if id == ISSUE_TEMPLATE_ID => json!([{
            "id": id,
            "name": "Prioritized High Risk Issue Template",
            "_href": format!("https://ssc.local/ssc/api/v1/issueTemplates/{id}")
        }]),
        _ => json!([]),
    };
    envelope(templates, StatusCode::OK)
}

async fn create_file_token(State(db): State<Db>, Json(input): Json<Value>) -> Response {
    let purpose = match input["fileTokenType"].as_str() {
        Some(p @ ("UPLOAD" | "DOWNLOAD")) => p.to_string(),
        _ => return error(StatusCode::BAD_REQUEST, "Invalid fileTokenType"),
    };
    let token = Uuid::new_v4().to_string();
    db.write().await.file_tokens.insert(token.clone(), purpose.clone());
    envelope(
        json!({"token": token, "fileTokenType": purpose}),
        StatusCode::CREATED,
    )
}

fn cloud_jobs() -> Value {
    json!([{
        "jobToken": CLOUD_JOB_TOKEN,
        "jobState": "SCAN_COMPLETED",
        "pvId": 1,
        "scaVersion": "17.10.0158"
    }])
}

async fn list_cloud_jobs() -> Response {
    envelope(cloud_jobs(), StatusCode::OK)
}

async fn get_cloud_job(Path(token): Path<String>) -> Response {
    match cloud_jobs()
        .as_array()
        .and_then(|jobs| jobs.iter().find(|j| j["jobToken"] == token.as_str()).cloned())
    {
        Some(job) => envelope(job, StatusCode::OK),
        None => error(StatusCode::NOT_FOUND, "Cloud job not found"),
    }
}

async fn get_auth_token(Query(params): Query<HashMap<String, String>>) -> Response {
    let token_type = params
        .get("token")
        .cloned()
        .unwrap_or_else(|| "UnifiedLoginToken".to_string());
    let ttl: u64 = params.get("ttl").and_then(|t| t.parse().ok()).unwrap_or(86_400);
    envelope(
        json!({
            "token": TOKEN,
            "type": token_type,
            "ttl": ttl,
            "creationDate": "2024-01-01T00:00:00.000+0000",
            "terminalDate": "2024-01-02T00:00:00.000+0000"
        }),
        StatusCode::OK,
    )
}

async fn slow() -> Response {
    tokio::time::sleep(SLOW_ROUTE_DELAY).await;
    envelope(json!({"slow": true}), StatusCode::OK)
}

async fn bulk() -> Response {
    let padding = "x".repeat(100);
    let rows: Vec<Value> = (0..BULK_ROWS)
        .map(|id| json!({"id": id, "name": format!("version-{id}"), "description": padding}))
        .collect();
    envelope(Value::Array(rows), StatusCode::OK)
}

fn xml(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, "application/xml")], body).into_response()
}

async fn upload_result_file(
    State(db): State<Db>,
    Query(params): Query<HashMap<String, String>>,
    mut multipart: Multipart,
) -> Response {
    let mut store = db.write().await;
    if !store.take_file_token(params.get("mat"), "UPLOAD") {
        return xml(
            StatusCode::FORBIDDEN,
            r#"<UploadResult code="-10100" msg="Invalid file token"/>"#.to_string(),
        );
    }
    let Some(version_id) = params.get("entityId").and_then(|id| id.parse::<u64>().ok()) else {
        return xml(
            StatusCode::BAD_REQUEST,
            r#"<UploadResult code="-10200" msg="Missing entityId"/>"#.to_string(),
        );
    };
    if !store.versions.iter().any(|v| v.id == version_id) {
        return xml(
            StatusCode::NOT_FOUND,
            r#"<UploadResult code="-10201" msg="Unknown project version"/>"#.to_string(),
        );
    }

    let mut upload = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload.fpr").to_string();
        match field.bytes().await {
            Ok(content) => upload = Some((file_name, content.to_vec())),
            Err(_) => break,
        }
    }
    let Some((file_name, content)) = upload else {
        return xml(
            StatusCode::BAD_REQUEST,
            r#"<UploadResult code="-10202" msg="No file part"/>"#.to_string(),
        );
    };

    let id = store.next_id();
    info!(id, version_id, file = %file_name, size = content.len(), "stored artifact");
    store.artifacts.push(Artifact {
        id,
        project_version_id: version_id,
        file_name,
        content,
    });
    xml(
        StatusCode::OK,
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><UploadResult code="-10001" msg="Background submission succeeded." artifactId="{id}"/>"#
        ),
    )
}

fn attachment(file_name: &str, content: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        content,
    )
        .into_response()
}

fn requested_id(params: &HashMap<String, String>) -> Option<u64> {
    params.get("id").and_then(|id| id.parse().ok())
}

async fn download_artifact(
    State(db): State<Db>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mut store = db.write().await;
    if !store.take_file_token(params.get("mat"), "DOWNLOAD") {
        return error(StatusCode::FORBIDDEN, "Invalid file token");
    }
    match requested_id(&params).and_then(|id| store.artifacts.iter().find(|a| a.id == id)) {
        Some(artifact) => attachment(&artifact.file_name, artifact.content.clone()),
        None => error(StatusCode::NOT_FOUND, "Artifact not found"),
    }
}

/// Latest upload for the project version `id`, served as `<version>.fpr`.
async fn download_current_state(
    State(db): State<Db>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mut store = db.write().await;
    if !store.take_file_token(params.get("mat"), "DOWNLOAD") {
        return error(StatusCode::FORBIDDEN, "Invalid file token");
    }
    let Some(version_id) = requested_id(&params) else {
        return error(StatusCode::BAD_REQUEST, "Missing id");
    };
    match store
        .artifacts
        .iter()
        .rev()
        .find(|a| a.project_version_id == version_id)
    {
        Some(artifact) => attachment(&format!("{version_id}.fpr"), artifact.content.clone()),
        None => error(StatusCode::NOT_FOUND, "No artifacts for project version"),
    }
}

async fn maintenance_page() -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html")],
        "<html><body>SSC is down for maintenance</body></html>",
    )
        .into_response()
}
