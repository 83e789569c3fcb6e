//! Request payloads for the SSC API.
//!
//! # Design
//! Each endpoint that sends a body gets its own serializable type, built
//! through a constructor instead of filling in a loose JSON map. Field names
//! follow the SSC wire format (camelCase) via serde renames.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// What a file token authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileTokenPurpose {
    Upload,
    Download,
}

impl FileTokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileTokenPurpose::Upload => "UPLOAD",
            FileTokenPurpose::Download => "DOWNLOAD",
        }
    }
}

impl fmt::Display for FileTokenPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileTokenPurpose {
    type Err = ApiError;

    /// Exact, case-sensitive match on `UPLOAD` / `DOWNLOAD`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UPLOAD" => Ok(FileTokenPurpose::Upload),
            "DOWNLOAD" => Ok(FileTokenPurpose::Download),
            other => Err(ApiError::InvalidFileTokenPurpose(other.to_string())),
        }
    }
}

/// Body of `POST /ssc/api/v1/fileTokens`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileTokenRequest {
    pub file_token_type: FileTokenPurpose,
}

impl FileTokenRequest {
    pub fn new(purpose: FileTokenPurpose) -> Self {
        Self {
            file_token_type: purpose,
        }
    }
}

/// The project a new version belongs to.
///
/// `id` is present when attaching to an existing project and absent when
/// the server should create the project alongside the version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRef {
    pub name: String,
    pub description: String,
    pub issue_template_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

/// Body of `POST /ssc/api/v1/projectVersions`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectVersionPayload {
    pub name: String,
    pub description: String,
    pub active: bool,
    pub committed: bool,
    pub issue_template_id: String,
    pub project: ProjectRef,
}

impl ProjectVersionPayload {
    /// A version under the existing project `project_id`.
    pub fn for_existing_project(
        project_name: &str,
        project_id: u64,
        version_name: &str,
        issue_template_id: &str,
        description: &str,
    ) -> Self {
        Self::build(project_name, Some(project_id), version_name, issue_template_id, description)
    }

    /// A version whose project is created by the same request.
    pub fn for_new_project(
        project_name: &str,
        version_name: &str,
        issue_template_id: &str,
        description: &str,
    ) -> Self {
        Self::build(project_name, None, version_name, issue_template_id, description)
    }

    fn build(
        project_name: &str,
        project_id: Option<u64>,
        version_name: &str,
        issue_template_id: &str,
        description: &str,
    ) -> Self {
        Self {
            name: version_name.to_string(),
            description: description.to_string(),
            active: true,
            committed: true,
            issue_template_id: issue_template_id.to_string(),
            project: ProjectRef {
                name: project_name.to_string(),
                description: String::new(),
                issue_template_id: issue_template_id.to_string(),
                id: project_id,
            },
        }
    }
}

/// Body of `PUT /ssc/api/v1/projectVersions/{id}` when committing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommitPayload {
    pub committed: bool,
}

impl CommitPayload {
    pub fn committed() -> Self {
        Self { committed: true }
    }
}

/// A selected option of a multi-valued attribute.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttributeValue {
    pub guid: String,
}

impl AttributeValue {
    pub fn new(guid: impl Into<String>) -> Self {
        Self { guid: guid.into() }
    }
}

/// Body of `POST /ssc/api/v1/projectVersions/{id}/attributes`.
///
/// `guid` and `value` serialize as `null` when unset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectVersionAttribute {
    pub attribute_definition_id: u64,
    pub guid: Option<String>,
    pub value: Option<String>,
    pub values: Vec<AttributeValue>,
}

impl ProjectVersionAttribute {
    pub fn new(
        attribute_definition_id: u64,
        value: Option<&str>,
        values: Vec<AttributeValue>,
        guid: Option<&str>,
    ) -> Self {
        Self {
            attribute_definition_id,
            guid: guid.map(str::to_string),
            value: value.map(str::to_string),
            values,
        }
    }
}

/// One selectable option of an attribute definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AttributeOption {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub hidden: bool,
    pub index: u32,
}

/// Body of `POST /ssc/api/v1/attributeDefinitions`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// `TECHNICAL`, `BUSINESS`, `DYNAMIC_SCAN_REQUEST` or `ORGANIZATION`.
    pub category: String,
    /// `TEXT`, `SINGLE`, `MULTIPLE`, `BOOLEAN`, `INTEGER`, `DATE`, ...
    #[serde(rename = "type")]
    pub attribute_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub hidden: bool,
    pub app_entity_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<AttributeOption>,
}

impl AttributeDefinition {
    /// A project-version attribute with no options.
    pub fn new(name: &str, category: &str, attribute_type: &str) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            category: category.to_string(),
            attribute_type: attribute_type.to_string(),
            required: false,
            hidden: false,
            app_entity_type: "PROJECT_VERSION".to_string(),
            options: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Append an option; its index is its position.
    pub fn with_option(mut self, name: &str) -> Self {
        let index = self.options.len() as u32;
        self.options.push(AttributeOption {
            name: name.to_string(),
            description: String::new(),
            hidden: false,
            index,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn purpose_parses_exactly() {
        assert_eq!("UPLOAD".parse::<FileTokenPurpose>().unwrap(), FileTokenPurpose::Upload);
        assert_eq!("DOWNLOAD".parse::<FileTokenPurpose>().unwrap(), FileTokenPurpose::Download);
        assert!("upload".parse::<FileTokenPurpose>().is_err());
        assert!("".parse::<FileTokenPurpose>().is_err());
    }

    #[test]
    fn file_token_request_wire_format() {
        let body = serde_json::to_value(FileTokenRequest::new(FileTokenPurpose::Upload)).unwrap();
        assert_eq!(body, json!({"fileTokenType": "UPLOAD"}));
    }

    #[test]
    fn version_payload_for_existing_project() {
        let payload =
            ProjectVersionPayload::for_existing_project("WebGoat", 7, "1.0", "Prioritized-HighRisk", "first");
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "name": "1.0",
                "description": "first",
                "active": true,
                "committed": true,
                "issueTemplateId": "Prioritized-HighRisk",
                "project": {
                    "name": "WebGoat",
                    "description": "",
                    "issueTemplateId": "Prioritized-HighRisk",
                    "id": 7
                }
            })
        );
    }

    #[test]
    fn version_payload_for_new_project_omits_id() {
        let payload = ProjectVersionPayload::for_new_project("WebGoat", "1.0", "tmpl", "");
        let value = serde_json::to_value(&payload).unwrap();
        assert!(value["project"].get("id").is_none());
        assert_eq!(value["project"]["name"], "WebGoat");
    }

    #[test]
    fn attribute_payload_keeps_nulls() {
        let attr = ProjectVersionAttribute::new(5, None, vec![AttributeValue::new("Active")], None);
        assert_eq!(
            serde_json::to_value(&attr).unwrap(),
            json!({
                "attributeDefinitionId": 5,
                "guid": null,
                "value": null,
                "values": [{"guid": "Active"}]
            })
        );
    }

    #[test]
    fn attribute_definition_options_are_indexed() {
        let def = AttributeDefinition::new("Risk", "TECHNICAL", "SINGLE")
            .with_option("Low")
            .with_option("High");
        let value = serde_json::to_value(&def).unwrap();
        assert_eq!(value["type"], "SINGLE");
        assert_eq!(value["appEntityType"], "PROJECT_VERSION");
        assert_eq!(value["options"][1]["index"], 1);
        assert_eq!(value["options"][1]["name"], "High");
    }
}
