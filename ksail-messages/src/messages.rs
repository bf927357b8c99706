//! Central registry for user-facing message templates.
//!
//! Templates use `{variable}` syntax; fill them with `msg!`.

pub struct Messages {
    // ============================================================================
    // Common
    // ============================================================================
    pub error_generic: &'static str,
    pub error_hint_docker: &'static str,
    pub config_written: &'static str,
    pub config_exists: &'static str,
    pub config_not_found_defaults: &'static str,

    // ============================================================================
    // Cluster
    // ============================================================================
    pub cluster_list_empty: &'static str,
    pub cluster_list_header: &'static str,
    pub cluster_delete_confirm: &'static str,
    pub cluster_delete_cancelled: &'static str,
    pub cluster_registries_provisioned: &'static str,
    pub cluster_registry_connected: &'static str,
    pub cluster_mirror_config_written: &'static str,
    pub cluster_user_config_hint: &'static str,

    // ============================================================================
    // Registry
    // ============================================================================
    pub registry_exists: &'static str,
    pub registry_in_use: &'static str,
    pub registry_not_found: &'static str,
    pub registry_list_empty: &'static str,
    pub registry_list_header: &'static str,
    pub registry_status_block: &'static str,
    pub registry_waiting: &'static str,
    pub registry_catalog_empty: &'static str,
    pub registry_catalog_header: &'static str,
    pub registry_rollback_warning: &'static str,
}

pub const MESSAGES: Messages = Messages {
    // Common
    error_generic: "❌ Error: {error}",
    error_hint_docker: "Check Docker with: docker ps",
    config_written: "Wrote {path}",
    config_exists: "{path} already exists (use --force to overwrite)",
    config_not_found_defaults: "No ksail.yaml found, using defaults",

    // Cluster
    cluster_list_empty: "No {distribution} clusters found",
    cluster_list_header: "{distribution} clusters:",
    cluster_delete_confirm: "Delete cluster '{name}'?",
    cluster_delete_cancelled: "Cancelled",
    cluster_registries_provisioned: "{count} registries ready",
    cluster_registry_connected: "Connected '{registry}' to network '{network}'",
    cluster_mirror_config_written: "Mirror configuration written to {path}",
    cluster_user_config_hint: "Using {path} as-is; make sure it points containerd at {mirrors_dir} to use the mirrors",

    // Registry
    registry_exists: "Registry '{name}' already exists, reusing it",
    registry_in_use: "Registry '{name}' is still used by another cluster, keeping it",
    registry_not_found: "Registry '{name}' not found",
    registry_list_empty: "No registries found",
    registry_list_header: "NAME                           STATUS            ENDPOINT",
    registry_status_block: "  Name:     {name}\n  Status:   {status}\n  Endpoint: {endpoint}\n  Volume:   {volume}\n  Upstream: {upstream}\n  Networks: {networks}",
    registry_waiting: "Waiting for registry at {endpoint}...",
    registry_catalog_empty: "No images cached yet",
    registry_catalog_header: "Repositories in '{name}':",
    registry_rollback_warning: "Failed to clean up registry '{name}' after error: {error}",
};
