use clap::Parser;

/// Startup configuration for the controller process. Every field can be
/// supplied as a flag or through its matching environment variable, so the
/// process can be launched unattended from a service manager.
#[derive(Parser, Debug)]
#[command(author, version, about = "Irrigation and environmental I/O controller")]
pub struct ControllerArgs {
    /// Path to the I/O point configuration document.
    #[arg(long, env = "CONTROLLER_CONFIG_PATH", default_value = "config/io.json")]
    pub config_path: String,

    /// Address the HTTP listener binds to.
    #[arg(long, env = "CONTROLLER_BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind_addr: String,

    /// Username for the pre-provisioned owner account.
    #[arg(long, env = "CONTROLLER_OWNER_USERNAME", default_value = "owner")]
    pub owner_username: String,

    /// Password for the pre-provisioned owner account.
    #[arg(long, env = "CONTROLLER_OWNER_PASSWORD")]
    pub owner_password: String,

    /// Username for the pre-provisioned read-only viewer account.
    #[arg(long, env = "CONTROLLER_VIEWER_USERNAME", default_value = "viewer")]
    pub viewer_username: String,

    /// Password for the pre-provisioned read-only viewer account.
    #[arg(long, env = "CONTROLLER_VIEWER_PASSWORD")]
    pub viewer_password: String,

    /// Maximum number of concurrently active sessions before the oldest is
    /// evicted.
    #[arg(long, env = "CONTROLLER_MAX_SESSIONS", default_value_t = 5)]
    pub max_concurrent_sessions: usize,
}
