//! Connection Registry
//!
//! Named database connections, stored as JSON.
//!
//! # Locations
//! - Local: `.clientbook/config.json` (one project, shareable with a team)
//! - Global: `~/.config/clientbook/connections.json` (per user, keyed by project path)
//!
//! Both are merged when resolving; for the same project the local file wins, both for
//! individual connections and for the default pointer.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::engine::ConnectionConfig;
use crate::error::{ClientbookError, Result};

const LOCAL_DIR: &str = ".clientbook";
const APP_DIR: &str = "clientbook";

/// Connections of one project plus its default pointer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub connections: HashMap<String, StoredConnection>,

    /// Name of the default connection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// Global registry: `projects[project_path] = ProjectConfig`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConnectionRegistry {
    pub projects: HashMap<String, ProjectConfig>,
}

impl ConnectionRegistry {
    /// Fold `other` into `self`; `other` wins per connection name and default
    fn merge(&mut self, other: Self) {
        for (project_path, project) in other.projects {
            let entry = self.projects.entry(project_path).or_default();
            entry.connections.extend(project.connections);
            if project.default.is_some() {
                entry.default = project.default;
            }
        }
    }
}

/// A saved connection.
///
/// The password may be kept out of the file and read from an environment variable
/// named by `password_env` instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredConnection {
    #[serde(flatten)]
    pub config: ConnectionConfig,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,
}

impl StoredConnection {
    /// Produce a usable config, filling the password from the environment if needed
    pub fn resolve(&self) -> Result<ConnectionConfig> {
        let mut config = self.config.clone();
        if let Some(env_var) = &self.password_env {
            let password = std::env::var(env_var).map_err(|_| {
                ClientbookError::config_error(format!(
                    "Environment variable {env_var} not found for password"
                ))
            })?;
            config.password = Some(password);
        }
        Ok(config)
    }
}

/// Where `save_connection` writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLocation {
    Local,
    Global,
}

fn current_dir() -> Result<PathBuf> {
    std::env::current_dir().map_err(|e| {
        ClientbookError::config_error(format!("Could not determine current directory: {e}"))
    })
}

/// `.clientbook/config.json` under the current directory
pub fn local_config_path() -> Result<PathBuf> {
    Ok(current_dir()?.join(LOCAL_DIR).join("config.json"))
}

/// `<user config dir>/clientbook/connections.json`
pub fn global_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().ok_or_else(|| {
        ClientbookError::config_error("Could not determine user config directory")
    })?;
    Ok(config_dir.join(APP_DIR).join("connections.json"))
}

/// Canonical current directory, the registry key of the current project
pub fn get_current_project_path() -> Result<String> {
    let canonical = current_dir()?.canonicalize().map_err(|e| {
        ClientbookError::config_error(format!("Could not canonicalize current directory: {e}"))
    })?;
    path_key(&canonical)
}

fn path_key(path: &Path) -> Result<String> {
    path.to_str()
        .map(ToString::to_string)
        .ok_or_else(|| ClientbookError::config_error("Project path contains invalid UTF-8"))
}

fn is_local_config(path: &Path) -> bool {
    path.parent().and_then(Path::file_name).is_some_and(|dir| dir == LOCAL_DIR)
}

/// Project a local config file belongs to: the directory holding `.clientbook/`
fn local_project_path(path: &Path) -> Result<String> {
    let root = path
        .parent()
        .and_then(Path::parent)
        .and_then(|p| p.canonicalize().ok())
        .ok_or_else(|| {
            ClientbookError::config_error(
                "Could not determine project path from config file location",
            )
        })?;
    path_key(&root)
}

/// Load a registry file; a missing file is an empty registry.
///
/// Local files hold a single `ProjectConfig` and are keyed by their project directory.
pub fn load_registry(path: &Path) -> Result<ConnectionRegistry> {
    if !path.exists() {
        return Ok(ConnectionRegistry::default());
    }

    let contents = fs::read_to_string(path)
        .map_err(|e| ClientbookError::config_error(format!("Could not read config file: {e}")))?;

    if is_local_config(path) {
        let project = serde_json::from_str::<ProjectConfig>(&contents).map_err(|e| {
            ClientbookError::config_error(format!("Invalid local config file format: {e}"))
        })?;
        let mut registry = ConnectionRegistry::default();
        registry.projects.insert(local_project_path(path)?, project);
        Ok(registry)
    } else {
        serde_json::from_str::<ConnectionRegistry>(&contents).map_err(|e| {
            ClientbookError::config_error(format!("Invalid global config file format: {e}"))
        })
    }
}

/// Write a registry file in the format its location expects
pub fn save_registry(path: &Path, registry: &ConnectionRegistry) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            ClientbookError::config_error(format!("Could not create config directory: {e}"))
        })?;
    }

    let serialized = if is_local_config(path) {
        let project_path = local_project_path(path)?;
        let project = registry.projects.get(&project_path).ok_or_else(|| {
            ClientbookError::config_error(format!(
                "No configuration found for project '{project_path}' in registry"
            ))
        })?;
        serde_json::to_string_pretty(project)
    } else {
        serde_json::to_string_pretty(registry)
    }
    .map_err(|e| ClientbookError::config_error(format!("Could not serialize config: {e}")))?;

    fs::write(path, serialized)
        .map_err(|e| ClientbookError::config_error(format!("Could not write config file: {e}")))
}

/// Global registry with the local file merged over it
pub fn load_with_precedence() -> Result<ConnectionRegistry> {
    let mut registry = load_registry(&global_config_path()?)?;
    registry.merge(load_registry(&local_config_path()?)?);
    Ok(registry)
}

/// Find a connection for a project.
///
/// `project_path` defaults to the current directory, `name` to the project's default.
pub fn resolve_connection(
    project_path: Option<&str>,
    name: Option<&str>,
) -> Result<ConnectionConfig> {
    let path = match project_path {
        Some(p) => p.to_string(),
        None => get_current_project_path()?,
    };
    resolve_in(&load_with_precedence()?, &path, name)
}

fn resolve_in(
    registry: &ConnectionRegistry,
    path: &str,
    name: Option<&str>,
) -> Result<ConnectionConfig> {
    let project = registry.projects.get(path).ok_or_else(|| {
        ClientbookError::config_error(format!(
            "No connections found for project path '{path}'. Run 'clientbook connect' to create one."
        ))
    })?;

    let mut available: Vec<_> = project.connections.keys().map(String::as_str).collect();
    available.sort_unstable();

    let conn_name = match name.or(project.default.as_deref()) {
        Some(n) => n,
        None => {
            return Err(ClientbookError::config_error(format!(
                "No default connection set for project '{path}'. Available connections: {available:?}"
            )))
        }
    };

    let stored = project.connections.get(conn_name).ok_or_else(|| {
        ClientbookError::config_error(format!(
            "Connection '{conn_name}' not found for project '{path}'. Available connections: {available:?}"
        ))
    })?;

    debug!(connection = conn_name, project = path, "Connection resolved");
    stored.resolve()
}

/// Save a named connection (default name `default`).
///
/// The first connection of a project becomes its default.
pub fn save_connection(
    project_path: Option<String>,
    name: Option<String>,
    stored: StoredConnection,
    location: ConfigLocation,
) -> Result<()> {
    let path = match project_path {
        Some(p) => p,
        None => get_current_project_path()?,
    };
    let conn_name = name.unwrap_or_else(|| "default".to_string());

    let config_path = match location {
        ConfigLocation::Local => local_config_path()?,
        ConfigLocation::Global => global_config_path()?,
    };

    let mut registry = load_registry(&config_path)?;
    let project = registry.projects.entry(path).or_default();
    if project.connections.is_empty() {
        project.default = Some(conn_name.clone());
    }
    project.connections.insert(conn_name, stored);

    save_registry(&config_path, &registry)
}

/// Every resolvable connection as `(project_path, name, config)`, sorted
pub fn list_connections() -> Result<Vec<(String, String, ConnectionConfig)>> {
    Ok(collect_connections(load_with_precedence()?))
}

fn collect_connections(registry: ConnectionRegistry) -> Vec<(String, String, ConnectionConfig)> {
    let mut connections = Vec::new();
    for (project_path, project) in registry.projects {
        for (conn_name, stored) in project.connections {
            match stored.resolve() {
                Ok(config) => connections.push((project_path.clone(), conn_name, config)),
                // Error text may name the variable but never the secret
                Err(_) => {
                    warn!(project = %project_path, "Could not resolve connection '{conn_name}'");
                }
            }
        }
    }
    connections.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));
    connections
}
