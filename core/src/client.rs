//! Endpoint methods for the SSC REST API.
//!
//! # Design
//! Each method turns its arguments into a [`DispatchRequest`] and hands it to
//! the [`Dispatcher`]; the dispatcher owns all error handling. The only
//! logic here is payload assembly and the few composite calls that need a
//! value from an earlier response (issue template ids, file tokens). Those
//! check the earlier response before using it and report a failed
//! [`Response`] instead of issuing the dependent call.

use std::path::Path;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::config::Config;
use crate::dispatch::{DispatchRequest, Dispatcher};
use crate::error::ApiError;
use crate::http::{filename_from_content_disposition, MultipartForm};
use crate::response::Response;
use crate::tls;
use crate::transport::{Transport, UreqTransport};
use crate::types::{
    AttributeValue, CommitPayload, FileTokenPurpose, FileTokenRequest, ProjectVersionAttribute,
    ProjectVersionPayload,
};

const API: &str = "/ssc/api/v1";

const DOWNLOAD_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8";
const UPLOAD_ACCEPT: &str = "application/xml, text/xml, */*; q=0.01";

// Search expressions go out path-style: spaces as %20, `/` left alone.
const SEARCH_EXPRESSION: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

/// Blocking client for the SSC REST API.
///
/// Every method returns a [`Response`]; none of them panic or return `Err`.
#[derive(Debug)]
pub struct SscClient<T = UreqTransport> {
    dispatcher: Dispatcher<T>,
}

impl SscClient<UreqTransport> {
    /// Create a client that talks to the server over `ureq`.
    pub fn new(config: Config) -> Self {
        let transport = UreqTransport::new(&config);
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> SscClient<T> {
    /// Create a client over a custom transport.
    pub fn with_transport(config: Config, transport: T) -> Self {
        if !config.verify_ssl {
            tls::acknowledge_insecure_tls();
        }
        debug!(host = %config.host, auth = config.auth.kind(), "created SSC client");
        Self {
            dispatcher: Dispatcher::new(config, transport),
        }
    }

    pub fn config(&self) -> &Config {
        self.dispatcher.config()
    }

    /// Send an arbitrary request through the dispatcher.
    pub fn dispatch(&self, request: DispatchRequest) -> Response {
        self.dispatcher.dispatch(request)
    }

    fn dispatch_json<P: Serialize + ?Sized>(&self, request: DispatchRequest, payload: &P) -> Response {
        match request.json(payload) {
            Ok(request) => self.dispatch(request),
            Err(err) => err.into(),
        }
    }

    // ==================== Projects & Versions ====================

    #[instrument(skip(self))]
    pub fn get_projects(&self) -> Response {
        self.dispatch(all_rows(DispatchRequest::get(format!("{API}/projects"))))
    }

    #[instrument(skip(self))]
    pub fn get_project_versions(&self) -> Response {
        self.dispatch(all_rows(DispatchRequest::get(format!("{API}/projectVersions"))))
    }

    #[instrument(skip(self))]
    pub fn get_project_version_artifacts(&self, project_version_id: u64) -> Response {
        self.dispatch(all_rows(DispatchRequest::get(format!(
            "{API}/projectVersions/{project_version_id}/artifacts"
        ))))
    }

    #[instrument(skip(self))]
    pub fn get_project_version_attributes(&self, project_version_id: u64) -> Response {
        self.dispatch(all_rows(DispatchRequest::get(format!(
            "{API}/projectVersions/{project_version_id}/attributes/"
        ))))
    }

    /// Set an attribute value on a project version.
    #[instrument(skip(self))]
    pub fn add_project_version_attribute(
        &self,
        project_version_id: u64,
        attribute_definition_id: u64,
        value: Option<&str>,
        values: Vec<AttributeValue>,
        guid: Option<&str>,
    ) -> Response {
        let payload = ProjectVersionAttribute::new(attribute_definition_id, value, values, guid);
        self.dispatch_json(
            DispatchRequest::post(format!("{API}/projectVersions/{project_version_id}/attributes")),
            &payload,
        )
    }

    /// Mark a project version as committed.
    #[instrument(skip(self))]
    pub fn commit_project_version(&self, project_version_id: u64) -> Response {
        self.dispatch_json(
            DispatchRequest::put(format!("{API}/projectVersions/{project_version_id}")),
            &CommitPayload::committed(),
        )
    }

    /// Create a version under an existing project.
    ///
    /// Looks up `project_template` first; if the lookup fails or finds no
    /// template, that failure is returned and nothing is created.
    #[instrument(skip(self))]
    pub fn create_project_version(
        &self,
        project_name: &str,
        project_id: u64,
        project_template: &str,
        version_name: &str,
        description: &str,
    ) -> Response {
        let issue_template_id = match self.issue_template_id(project_template) {
            Ok(id) => id,
            Err(response) => return response,
        };
        let payload = ProjectVersionPayload::for_existing_project(
            project_name,
            project_id,
            version_name,
            &issue_template_id,
            description,
        );
        self.dispatch_json(DispatchRequest::post(format!("{API}/projectVersions")), &payload)
    }

    /// Create a new project together with its first version.
    #[instrument(skip(self))]
    pub fn create_new_project_version(
        &self,
        project_name: &str,
        project_template: &str,
        version_name: &str,
        description: &str,
    ) -> Response {
        let issue_template_id = match self.issue_template_id(project_template) {
            Ok(id) => id,
            Err(response) => return response,
        };
        let payload = ProjectVersionPayload::for_new_project(
            project_name,
            version_name,
            &issue_template_id,
            description,
        );
        self.dispatch_json(DispatchRequest::post(format!("{API}/projectVersions")), &payload)
    }

    #[instrument(skip(self))]
    pub fn get_issue_template(&self, project_template_id: &str) -> Response {
        self.dispatch(
            DispatchRequest::get(format!("{API}/issueTemplates"))
                .query("limit", 1)
                .query("fields", format!("q=id:\"{project_template_id}\"")),
        )
    }

    /// The id at the end of the first matching template's `_href`.
    fn issue_template_id(&self, project_template: &str) -> Result<String, Response> {
        let lookup = self.get_issue_template(project_template);
        if !lookup.success() {
            return Err(lookup);
        }
        let first = lookup
            .json()
            .and_then(|body| body["data"].get(0))
            .ok_or_else(|| ApiError::IssueTemplateNotFound(project_template.to_string()))?;
        let href = first["_href"]
            .as_str()
            .ok_or_else(|| ApiError::MalformedIssueTemplateLink(first["_href"].to_string()))?;
        template_id_from_href(href).map_err(Response::from)
    }

    // ==================== Artifacts ====================

    #[instrument(skip(self))]
    pub fn get_artifact_scans(&self, artifact_id: u64) -> Response {
        self.dispatch(DispatchRequest::get(format!("{API}/artifacts/{artifact_id}/scans")))
    }

    /// Upload a scan result for a project version.
    ///
    /// Fetches a fresh `UPLOAD` file token and posts `content` as the
    /// multipart field `file`.
    #[instrument(skip(self, content), fields(size = content.len()))]
    pub fn upload_artifact_scan(
        &self,
        file_name: &str,
        content: Vec<u8>,
        project_version_id: u64,
    ) -> Response {
        let token = match self.fetch_file_token(FileTokenPurpose::Upload) {
            Ok(token) => token,
            Err(response) => return response,
        };
        let request = DispatchRequest::post("/ssc/upload/resultFileUpload.html")
            .query("mat", token)
            .query("entityId", project_version_id)
            .query("clientVersion", &self.config().client_version)
            .query("Upload", "Submit Query")
            .query("Filename", file_name)
            .files(MultipartForm::new().file("file", file_name, content))
            .headers([("Accept", UPLOAD_ACCEPT)])
            .stream();
        self.dispatch(request)
    }

    /// Read `path` and upload it with [`upload_artifact_scan`](Self::upload_artifact_scan).
    pub fn upload_artifact_scan_file(&self, path: impl AsRef<Path>, project_version_id: u64) -> Response {
        let path = path.as_ref();
        let content = match std::fs::read(path) {
            Ok(content) => content,
            Err(err) => return ApiError::Io(err).into(),
        };
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.upload_artifact_scan(&file_name, content, project_version_id)
    }

    /// Download an artifact. Returns the response and the file name from
    /// `Content-Disposition` (empty when absent).
    #[instrument(skip(self))]
    pub fn download_artifact(&self, artifact_id: u64) -> (Response, String) {
        self.download("artifactDownload.html", artifact_id, false)
    }

    /// Download the current-state FPR of a project version, sources included.
    #[instrument(skip(self))]
    pub fn download_artifact_scan(&self, artifact_id: u64) -> (Response, String) {
        self.download("currentStateFprDownload.html", artifact_id, true)
    }

    fn download(&self, page: &str, artifact_id: u64, include_source: bool) -> (Response, String) {
        let token = match self.fetch_file_token(FileTokenPurpose::Download) {
            Ok(token) => token,
            Err(response) => return (response, String::new()),
        };
        let mut request = DispatchRequest::get(format!("/ssc/download/{page}"))
            .query("mat", token)
            .query("id", artifact_id)
            .query("clientVersion", &self.config().client_version);
        if include_source {
            request = request.query("includeSource", "true");
        }
        let response = self.dispatch(request.headers([("Accept", DOWNLOAD_ACCEPT)]).stream());
        let file_name = response
            .header("Content-Disposition")
            .and_then(filename_from_content_disposition)
            .unwrap_or_default();
        (response, file_name)
    }

    // ==================== Attribute definitions ====================

    #[instrument(skip(self))]
    pub fn get_attribute_definitions(&self) -> Response {
        self.dispatch(all_rows(DispatchRequest::get(format!("{API}/attributeDefinitions"))))
    }

    /// Search attribute definitions, e.g. `name:"Development Phase"`.
    ///
    /// An empty expression fails without contacting the server.
    #[instrument(skip(self))]
    pub fn get_attribute_definition(&self, search_expression: &str) -> Response {
        if search_expression.is_empty() {
            return ApiError::EmptySearchExpression.into();
        }
        let q = utf8_percent_encode(search_expression, SEARCH_EXPRESSION);
        self.dispatch(DispatchRequest::get(format!("{API}/attributeDefinitions?q={q}")))
    }

    #[instrument(skip(self, attribute_definition))]
    pub fn post_attribute_definition<P: Serialize + ?Sized>(&self, attribute_definition: &P) -> Response {
        self.dispatch_json(
            DispatchRequest::post(format!("{API}/attributeDefinitions")),
            attribute_definition,
        )
    }

    // ==================== Cloud scan ====================

    #[instrument(skip(self))]
    pub fn get_cloudscan_jobs(&self) -> Response {
        self.dispatch(all_rows(DispatchRequest::get(format!("{API}/cloudjobs"))))
    }

    #[instrument(skip(self))]
    pub fn get_cloudscan_job_status(&self, scan_id: &str) -> Response {
        self.dispatch(DispatchRequest::get(format!("{API}/cloudjobs/{scan_id}")))
    }

    // ==================== Tokens ====================

    /// Request a file token. `purpose` must be exactly `UPLOAD` or `DOWNLOAD`;
    /// anything else fails without contacting the server.
    #[instrument(skip(self))]
    pub fn get_file_token(&self, purpose: &str) -> Response {
        match purpose.parse::<FileTokenPurpose>() {
            Ok(purpose) => self.request_file_token(purpose),
            Err(err) => err.into(),
        }
    }

    fn request_file_token(&self, purpose: FileTokenPurpose) -> Response {
        self.dispatch_json(
            DispatchRequest::post(format!("{API}/fileTokens")),
            &FileTokenRequest::new(purpose),
        )
    }

    /// A fresh token string, or the response explaining why there is none.
    fn fetch_file_token(&self, purpose: FileTokenPurpose) -> Result<String, Response> {
        let response = self.request_file_token(purpose);
        if !response.success() {
            return Err(response);
        }
        response
            .json()
            .and_then(|body| body["data"]["token"].as_str())
            .map(str::to_string)
            .ok_or_else(|| ApiError::MissingFileToken(purpose).into())
    }

    /// Fetch authentication token details, optionally for a token type and ttl.
    #[instrument(skip(self))]
    pub fn get_token(&self, token_type: Option<&str>, ttl: Option<u32>) -> Response {
        let mut request = DispatchRequest::get(format!("{API}/auth/token"));
        if let Some(token_type) = token_type {
            request = request.query("token", token_type);
        }
        if let Some(ttl) = ttl {
            request = request.query("ttl", ttl);
        }
        self.dispatch(request)
    }
}

/// Ask for every row of a collection in one page.
fn all_rows(request: DispatchRequest) -> DispatchRequest {
    request.query("start", -1).query("limit", -1)
}

/// Final path segment of an issue template link.
fn template_id_from_href(href: &str) -> Result<String, ApiError> {
    match href.rsplit_once('/') {
        Some((_, id)) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(ApiError::MalformedIssueTemplateLink(href.to_string())),
    }
}
