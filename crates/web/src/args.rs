use std::path::PathBuf;

use argp::FromArgs;
use pipeline_monitor_core::config::Config;

// For argp::FromArgs
fn native_path(value: &str) -> Result<PathBuf, String> { Ok(PathBuf::from(value)) }

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// Real-time CI pipeline monitor with a WebSocket dashboard.
pub struct Args {
    #[argp(option, arg_name = "path", from_str_fn(native_path))]
    /// repository path (default: .)
    pub repo: Option<PathBuf>,
    #[argp(option, arg_name = "seconds")]
    /// check interval in seconds (default: 30)
    pub interval: Option<u64>,
    #[argp(option, arg_name = "port")]
    /// WebSocket server port (default: 8080)
    pub port: Option<u16>,
    #[argp(option, arg_name = "path", from_str_fn(native_path))]
    /// YAML config file
    pub config: Option<PathBuf>,
    #[argp(switch, short = 'v')]
    /// verbose logging
    pub verbose: bool,
}

impl Args {
    /// Override config values with any flags given on the command line.
    pub fn apply(&self, config: &mut Config) {
        if let Some(repo) = &self.repo {
            config.monitor.repo_path = repo.clone();
        }
        if let Some(interval) = self.interval {
            config.monitor.interval_secs = interval;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
    }
}
