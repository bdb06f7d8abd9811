// NativiWeb API endpoint groups.
// Typed, resource-scoped methods; reads go through the cache, writes invalidate it.

use serde_json::Value;

use crate::cache::keys;
use crate::error::Result;
use crate::retry::{RetryPolicy, with_retry};

use super::client::ApiClient;
use super::download::{self, DownloadProgress, DownloadedFile};
use super::types::{
    AdminDashboard, AdminLog, AdminUser, Analytics, ApiKey, Build, BuildLog, CreatedApiKey,
    DependencyReport, Feature, NewApiKey, NewBuild, NewProject, Project, ProjectUpdate, Stats,
    Template, UserUpdate, VisitStats,
};

impl ApiClient {
    pub fn projects(&self) -> Projects<'_> {
        Projects { client: self }
    }

    pub fn builds(&self) -> Builds<'_> {
        Builds { client: self }
    }

    pub fn api_keys(&self) -> ApiKeys<'_> {
        ApiKeys { client: self }
    }

    pub fn stats(&self) -> StatsApi<'_> {
        StatsApi { client: self }
    }

    pub fn features(&self) -> Features<'_> {
        Features { client: self }
    }

    pub fn system(&self) -> System<'_> {
        System { client: self }
    }

    pub fn admin(&self) -> Admin<'_> {
        Admin { client: self }
    }
}

/// `/projects`
pub struct Projects<'a> {
    client: &'a ApiClient,
}

impl Projects<'_> {
    pub async fn list(&self) -> Result<Vec<Project>> {
        let ttl = self.client.ttls().list;
        self.client
            .get_cached(&keys::all(keys::PROJECTS), "/projects", ttl)
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Project> {
        let ttl = self.client.ttls().detail;
        self.client
            .get_cached(
                &keys::detail(keys::PROJECTS, id),
                &format!("/projects/{}", id),
                ttl,
            )
            .await
    }

    pub async fn create(&self, project: &NewProject) -> Result<Project> {
        let created: Project = self.client.post_json("/projects", project).await?;
        self.client.invalidate(keys::PROJECTS, None);
        self.client.cache().invalidate_pattern(&keys::prefix(keys::STATS));
        tracing::info!(project_id = %created.id, "project created");
        Ok(created)
    }

    pub async fn update(&self, id: &str, update: &ProjectUpdate) -> Result<Project> {
        let updated = self
            .client
            .put_json(&format!("/projects/{}", id), update)
            .await?;
        self.client.invalidate(keys::PROJECTS, Some(id));
        Ok(updated)
    }

    /// Delete a project. Its builds go with it, so cached builds are dropped too.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.client.delete(&format!("/projects/{}", id)).await?;
        self.client.invalidate(keys::PROJECTS, Some(id));
        self.client.invalidate(keys::BUILDS, None);
        self.client.cache().invalidate_pattern(&keys::prefix(keys::STATS));
        tracing::info!(project_id = %id, "project deleted");
        Ok(())
    }
}

/// `/builds`
pub struct Builds<'a> {
    client: &'a ApiClient,
}

impl Builds<'_> {
    pub async fn list(&self) -> Result<Vec<Build>> {
        let ttl = self.client.ttls().list;
        self.client
            .get_cached(&keys::all(keys::BUILDS), "/builds", ttl)
            .await
    }

    pub async fn list_for_project(&self, project_id: &str) -> Result<Vec<Build>> {
        let ttl = self.client.ttls().list;
        self.client
            .get_cached_with_params(
                &keys::project_builds(project_id),
                "/builds",
                &[("project_id", project_id)],
                ttl,
            )
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Build> {
        let ttl = self.client.ttls().detail;
        self.client
            .get_cached(
                &keys::detail(keys::BUILDS, id),
                &format!("/builds/{}", id),
                ttl,
            )
            .await
    }

    /// Current server state of a build, never served from cache. Used for polling.
    pub async fn get_fresh(&self, id: &str) -> Result<Build> {
        self.client.get_json(&format!("/builds/{}", id)).await
    }

    pub async fn create(&self, build: &NewBuild) -> Result<Build> {
        let created: Build = self.client.post_json("/builds", build).await?;
        self.client.invalidate(keys::BUILDS, None);
        self.client.cache().invalidate_pattern(&keys::prefix(keys::STATS));
        tracing::info!(
            build_id = %created.id,
            project_id = %created.project_id,
            platform = created.platform.display(),
            "build started"
        );
        Ok(created)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.client.delete(&format!("/builds/{}", id)).await?;
        self.client.invalidate(keys::BUILDS, Some(id));
        Ok(())
    }

    pub async fn logs(&self, id: &str) -> Result<Vec<BuildLog>> {
        self.client.get_json(&format!("/builds/{}/logs", id)).await
    }

    /// Download the build artifact.
    pub async fn download(&self, id: &str) -> Result<DownloadedFile> {
        self.client
            .download(
                &format!("/builds/{}/download", id),
                &download::default_filename(id),
            )
            .await
    }

    /// Download the build artifact, reporting progress after every chunk.
    pub async fn download_with_progress<F>(&self, id: &str, on_progress: F) -> Result<DownloadedFile>
    where
        F: FnMut(DownloadProgress),
    {
        self.client
            .download_with_progress(
                &format!("/builds/{}/download", id),
                &download::default_filename(id),
                on_progress,
            )
            .await
    }
}

/// `/api-keys`
pub struct ApiKeys<'a> {
    client: &'a ApiClient,
}

impl ApiKeys<'_> {
    pub async fn list(&self) -> Result<Vec<ApiKey>> {
        let ttl = self.client.ttls().list;
        self.client
            .get_cached(&keys::all(keys::API_KEYS), "/api-keys", ttl)
            .await
    }

    /// Create a key. The returned secret is not retrievable later.
    pub async fn create(&self, key: &NewApiKey) -> Result<CreatedApiKey> {
        let created: CreatedApiKey = self.client.post_json("/api-keys", key).await?;
        self.client.invalidate(keys::API_KEYS, None);
        Ok(created)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.client.delete(&format!("/api-keys/{}", id)).await?;
        self.client.invalidate(keys::API_KEYS, Some(id));
        Ok(())
    }
}

/// `/stats`
pub struct StatsApi<'a> {
    client: &'a ApiClient,
}

impl StatsApi<'_> {
    pub async fn get(&self) -> Result<Stats> {
        let ttl = self.client.ttls().list;
        self.client
            .get_cached(&keys::all(keys::STATS), "/stats", ttl)
            .await
    }
}

/// `/features`
pub struct Features<'a> {
    client: &'a ApiClient,
}

impl Features<'_> {
    /// The feature catalog rarely changes, so it keeps the default TTL.
    pub async fn list(&self) -> Result<Vec<Feature>> {
        let ttl = self.client.ttls().default;
        self.client
            .get_cached(&keys::all(keys::FEATURES), "/features", ttl)
            .await
    }
}

/// `/system`
pub struct System<'a> {
    client: &'a ApiClient,
}

impl System<'_> {
    /// Ask the backend whether the Android and iOS toolchains are installed.
    pub async fn check_dependencies(&self) -> Result<DependencyReport> {
        self.client.get_json("/system/check-dependencies").await
    }
}

/// `/admin/*`. Plain pass-through; authorization is enforced by the backend.
pub struct Admin<'a> {
    client: &'a ApiClient,
}

impl Admin<'_> {
    pub async fn users(&self) -> Result<Vec<AdminUser>> {
        let ttl = self.client.ttls().list;
        self.client
            .get_cached(&keys::all(keys::ADMIN_USERS), "/admin/users", ttl)
            .await
    }

    pub async fn update_user(&self, id: &str, update: &UserUpdate) -> Result<AdminUser> {
        let user = self
            .client
            .put_json(&format!("/admin/users/{}", id), update)
            .await?;
        self.client.invalidate(keys::ADMIN_USERS, Some(id));
        Ok(user)
    }

    pub async fn projects(&self) -> Result<Vec<Project>> {
        let ttl = self.client.ttls().list;
        self.client
            .get_cached(&keys::all(keys::ADMIN_PROJECTS), "/admin/projects", ttl)
            .await
    }

    pub async fn builds(&self) -> Result<Vec<Build>> {
        let ttl = self.client.ttls().list;
        self.client
            .get_cached(&keys::all(keys::ADMIN_BUILDS), "/admin/builds", ttl)
            .await
    }

    pub async fn logs(&self) -> Result<Vec<AdminLog>> {
        self.client.get_json("/admin/logs").await
    }

    pub async fn analytics(&self) -> Result<Analytics> {
        self.client.get_json("/admin/analytics").await
    }

    pub async fn config(&self) -> Result<Value> {
        let ttl = self.client.ttls().detail;
        self.client
            .get_cached(&keys::all(keys::ADMIN_CONFIG), "/admin/config", ttl)
            .await
    }

    pub async fn update_config(&self, config: &Value) -> Result<Value> {
        let updated = self.client.put_json("/admin/config", config).await?;
        self.client.invalidate(keys::ADMIN_CONFIG, None);
        Ok(updated)
    }

    pub async fn templates(&self) -> Result<Vec<Template>> {
        let ttl = self.client.ttls().default;
        self.client
            .get_cached(&keys::all(keys::ADMIN_TEMPLATES), "/admin/templates", ttl)
            .await
    }

    pub async fn visit_stats(&self) -> Result<VisitStats> {
        self.client.get_json("/admin/visit-stats").await
    }

    /// Fetch the admin overview concurrently.
    ///
    /// Users are required and retried on timeout; builds, logs and analytics
    /// fall back to empty so one failing panel does not block the rest.
    pub async fn dashboard(&self, retry: &RetryPolicy) -> Result<AdminDashboard> {
        let (users, builds, logs, analytics) = tokio::join!(
            with_retry(retry, move || self.users()),
            self.builds(),
            self.logs(),
            self.analytics(),
        );

        Ok(AdminDashboard {
            users: users?,
            builds: or_default("builds", builds),
            logs: or_default("logs", logs),
            analytics: or_default("analytics", analytics),
        })
    }
}

fn or_default<T: Default>(panel: &str, result: Result<T>) -> T {
    result.unwrap_or_else(|e| {
        tracing::warn!(panel, error = %e, "dashboard panel failed, showing empty");
        T::default()
    })
}
