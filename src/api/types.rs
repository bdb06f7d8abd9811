// NativiWeb API resource types.
// Request and response bodies for the backend REST API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Native target platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
}

impl Platform {
    pub fn display(&self) -> &'static str {
        match self {
            Platform::Android => "Android",
            Platform::Ios => "iOS",
        }
    }
}

/// A web application wrapped for native platforms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub web_url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub platform: Vec<Platform>,
    #[serde(default)]
    pub features: Vec<ProjectFeature>,
    #[serde(default)]
    pub status: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A native feature enabled on a project, with its settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectFeature {
    pub id: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub config: serde_json::Value,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    pub web_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub platform: Vec<Platform>,
    #[serde(default)]
    pub features: Vec<ProjectFeature>,
}

/// Partial update; unset fields are left unchanged server-side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<Vec<Platform>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<ProjectFeature>>,
}

/// Server-side build job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl BuildStatus {
    /// Completed and failed builds never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BuildStatus::Completed | BuildStatus::Failed)
    }

    pub fn display(&self) -> &'static str {
        match self {
            BuildStatus::Pending => "Pending",
            BuildStatus::Processing => "Processing",
            BuildStatus::Completed => "Completed",
            BuildStatus::Failed => "Failed",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildType {
    #[default]
    Debug,
    Release,
}

/// A native build job. Owned and mutated by the backend only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Build {
    pub id: String,
    pub project_id: String,
    pub platform: Platform,
    pub status: BuildStatus,
    /// Percent complete, 0-100.
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub build_type: BuildType,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
}

impl Build {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBuild {
    pub project_id: String,
    pub platform: Platform,
    #[serde(default)]
    pub build_type: BuildType,
}

/// A single line of build output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildLog {
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub level: Option<String>,
    pub message: String,
}

/// API key metadata. The secret is only returned once, on creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub key_preview: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewApiKey {
    pub name: String,
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedApiKey {
    pub key: String,
    #[serde(flatten)]
    pub api_key: ApiKey,
}

/// Dashboard counters for the signed-in user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stats {
    pub total_projects: u64,
    pub total_builds: u64,
    pub successful_builds: u64,
    pub failed_builds: u64,
    pub api_keys: u64,
}

/// A native capability that can be enabled on a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub platforms: Vec<Platform>,
}

/// Toolchain availability reported by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DependencyReport {
    pub ready: bool,
    pub dependencies: Vec<DependencyCheck>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyCheck {
    pub name: String,
    #[serde(default)]
    pub installed: bool,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub required_for: Vec<Platform>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminUser {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminLog {
    pub id: String,
    pub level: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub platforms: Vec<Platform>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisitStats {
    pub total_visits: u64,
    pub unique_visitors: u64,
    pub today: u64,
}

/// Aggregate metrics; the schema is owned by the backend.
pub type Analytics = serde_json::Map<String, serde_json::Value>;

/// Everything the admin overview needs, fetched concurrently.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdminDashboard {
    pub users: Vec<AdminUser>,
    pub builds: Vec<Build>,
    pub logs: Vec<AdminLog>,
    pub analytics: Analytics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_status_terminal() {
        assert!(!BuildStatus::Pending.is_terminal());
        assert!(!BuildStatus::Processing.is_terminal());
        assert!(BuildStatus::Completed.is_terminal());
        assert!(BuildStatus::Failed.is_terminal());
    }

    #[test]
    fn test_build_deserializes_with_defaults() {
        let build: Build = serde_json::from_str(
            r#"{
                "id": "b1",
                "project_id": "p1",
                "platform": "ios",
                "status": "processing",
                "progress": 40,
                "phase": "compiling",
                "created_at": "2025-01-10T12:00:00Z"
            }"#,
        )
        .unwrap();

        assert_eq!(build.platform, Platform::Ios);
        assert_eq!(build.status, BuildStatus::Processing);
        assert_eq!(build.progress, 40);
        assert_eq!(build.phase.as_deref(), Some("compiling"));
        assert_eq!(build.build_type, BuildType::Debug);
        assert!(build.completed_at.is_none());
        assert!(!build.is_terminal());
    }

    #[test]
    fn test_project_update_skips_unset_fields() {
        let update = ProjectUpdate {
            name: Some("Renamed".to_string()),
            ..ProjectUpdate::default()
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({ "name": "Renamed" }));
    }

    #[test]
    fn test_created_api_key_flattens_metadata() {
        let created: CreatedApiKey = serde_json::from_str(
            r#"{
                "key": "nw_live_secret",
                "id": "k1",
                "name": "ci",
                "permissions": ["read", "build"],
                "created_at": "2025-01-10T12:00:00Z"
            }"#,
        )
        .unwrap();
        assert_eq!(created.key, "nw_live_secret");
        assert_eq!(created.api_key.name, "ci");
        assert_eq!(created.api_key.permissions.len(), 2);
    }
}
