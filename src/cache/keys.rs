// Cache key construction.
// Keys are `<namespace>:<identifier>`; everything under one namespace is invalidated together.

pub const PROJECTS: &str = "projects";
pub const BUILDS: &str = "builds";
pub const API_KEYS: &str = "api-keys";
pub const STATS: &str = "stats";
pub const FEATURES: &str = "features";
pub const ADMIN_USERS: &str = "admin:users";
pub const ADMIN_PROJECTS: &str = "admin:projects";
pub const ADMIN_BUILDS: &str = "admin:builds";
pub const ADMIN_CONFIG: &str = "admin:config";
pub const ADMIN_TEMPLATES: &str = "admin:templates";

/// Key for the full list of a resource.
pub fn all(namespace: &str) -> String {
    format!("{}:all", namespace)
}

/// Key for a single resource.
pub fn detail(namespace: &str, id: &str) -> String {
    format!("{}:{}", namespace, sanitize_id(id))
}

/// Prefix shared by every key in a namespace.
pub fn prefix(namespace: &str) -> String {
    format!("{}:", namespace)
}

/// Key for the builds belonging to one project.
pub fn project_builds(project_id: &str) -> String {
    format!("{}:project:{}", BUILDS, sanitize_id(project_id))
}

/// Identifiers must not introduce extra separators into a key.
fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| match c {
            ':' | '*' | '?' | ' ' => '_',
            _ => c,
        })
        .collect()
}
