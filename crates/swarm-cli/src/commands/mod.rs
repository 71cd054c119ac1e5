use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use std::path::PathBuf;

use swarm_config::{ConfigLoader, SwarmConfig};
use swarm_core::SwarmError;
use swarm_runtime::StatusReport;

mod networks;
mod start;

/// Swarm: Wi-Fi credentials replicated across an ad hoc mesh
#[derive(Parser)]
#[command(name = "swarm", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to swarm.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the node: bootstrap, join the mesh, serve the admin surface on demand
    Start {
        /// Open the admin surface immediately instead of waiting for the trigger
        #[arg(long)]
        admin: bool,
    },
    /// Show the status of a running node
    Status {
        /// Admin URL of the node (default: derived from [admin].listen)
        #[arg(long)]
        url: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Inspect or edit the stored networks (node should be stopped)
    Networks {
        #[command(subcommand)]
        action: NetworkAction,
    },
    /// Show current configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show version and build info
    Version,
    /// Generate shell completions for bash, zsh, or fish
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum NetworkAction {
    /// List stored networks
    List,
    /// Add a network, or replace the passphrase of a stored one
    Add {
        ssid: String,
        /// Passphrase (empty for open networks)
        #[arg(default_value = "")]
        passphrase: String,
    },
    /// Remove the network at INDEX (as shown by `list`)
    Remove { index: usize },
}

impl Cli {
    pub async fn run(self) -> swarm_core::Result<()> {
        let config_loader = ConfigLoader::load(self.config.as_deref())?;
        let config = config_loader.get();

        // --verbose > --quiet > --log-level > config; RUST_LOG beats all of them
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            self.log_level
                .as_deref()
                .unwrap_or(config.logging.level.as_str())
        };
        init_tracing(log_level, &config.logging.format);

        match self.command {
            Commands::Start { admin } => start::cmd_start(config, admin).await,
            Commands::Status { url, json } => Self::cmd_status(config, url, json).await,
            Commands::Networks { action } => networks::cmd_networks(&config, action),
            Commands::Config { json } => Self::cmd_config(config, json),
            Commands::Version => Self::cmd_version(),
            Commands::Completions { shell } => Self::cmd_completions(shell),
        }
    }

    async fn cmd_status(
        config: SwarmConfig,
        url: Option<String>,
        json: bool,
    ) -> swarm_core::Result<()> {
        let base = url.unwrap_or_else(|| local_admin_url(&config.admin.listen));
        let endpoint = format!("{}/api/v1/status", base.trim_end_matches('/'));

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        let report = match client.get(&endpoint).send().await {
            Ok(resp) if resp.status().is_success() => resp
                .json::<StatusReport>()
                .await
                .map_err(|e| SwarmError::Server(e.to_string()))?,
            Ok(resp) => {
                return Err(SwarmError::Server(format!(
                    "{endpoint} returned {}",
                    resp.status()
                )));
            }
            Err(_) => {
                // The admin surface only runs on demand; fall back to the stored document
                println!("Admin surface not reachable at {base}");
                println!("Stored document at {}:", config.document_path().display());
                return networks::print_document(&config);
            }
        };

        if json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print!("{}", render_status(&report));
        }
        Ok(())
    }

    fn cmd_config(config: SwarmConfig, json: bool) -> swarm_core::Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(&config)?);
        } else {
            println!(
                "{}",
                toml::to_string_pretty(&config).map_err(|e| SwarmError::Config(e.to_string()))?
            );
        }
        Ok(())
    }

    fn cmd_version() -> swarm_core::Result<()> {
        println!("swarm v{}", env!("CARGO_PKG_VERSION"));
        println!("   Rust edition: 2024");
        println!("   Target: {}", std::env::consts::ARCH);
        println!("   OS: {}", std::env::consts::OS);
        #[cfg(debug_assertions)]
        println!("   Profile: debug");
        #[cfg(not(debug_assertions))]
        println!("   Profile: release");
        Ok(())
    }

    fn cmd_completions(shell: Shell) -> swarm_core::Result<()> {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "swarm", &mut std::io::stdout());
        Ok(())
    }
}

fn init_tracing(level: &str, format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    if format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

/// URL a local client uses for an admin surface bound to `listen`.
fn local_admin_url(listen: &str) -> String {
    let addr = match listen.rsplit_once(':') {
        Some(("0.0.0.0", port)) | Some(("[::]", port)) => format!("127.0.0.1:{port}"),
        _ => listen.to_string(),
    };
    format!("http://{addr}")
}

fn render_status(report: &StatusReport) -> String {
    let link = match (report.online, report.ssid.as_deref()) {
        (true, Some(ssid)) => format!("online ({ssid})"),
        (true, None) => "online".to_string(),
        (false, _) => "offline".to_string(),
    };
    let mut out = String::new();
    out.push_str("Swarm node\n\n");
    out.push_str(&format!("   Node:       {}\n", report.node_id));
    out.push_str(&format!("   Role:       {}\n", report.role));
    out.push_str(&format!("   Link:       {link}\n"));
    out.push_str(&format!(
        "   Document:   v{} ({} networks)\n",
        report.version,
        report.networks.len()
    ));
    out.push_str(&format!(
        "   Mesh:       {} (sync {}, {} peers)\n",
        if report.mesh_active { "active" } else { "inactive" },
        report.sync_phase,
        report.peers.len()
    ));
    out.push_str(&format!(
        "   Started:    {} (up {}s)\n",
        report
            .started_at
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S"),
        report.uptime_secs
    ));
    for peer in &report.peers {
        out.push_str(&format!("     - {peer}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_core::NodeRole;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_networks_add() {
        let cli = Cli::try_parse_from(["swarm", "networks", "add", "home", "pw"]).unwrap();
        match cli.command {
            Commands::Networks {
                action: NetworkAction::Add { ssid, passphrase },
            } => {
                assert_eq!(ssid, "home");
                assert_eq!(passphrase, "pw");
            }
            _ => panic!("expected networks add"),
        }
    }

    #[test]
    fn test_parse_open_network_without_passphrase() {
        let cli = Cli::try_parse_from(["swarm", "networks", "add", "lobby"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Networks {
                action: NetworkAction::Add { ref passphrase, .. }
            } if passphrase.is_empty()
        ));
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["swarm", "-v", "-q", "version"]).is_err());
    }

    #[test]
    fn test_local_admin_url() {
        assert_eq!(local_admin_url("0.0.0.0:8000"), "http://127.0.0.1:8000");
        assert_eq!(local_admin_url("192.168.4.1:80"), "http://192.168.4.1:80");
    }

    #[test]
    fn test_render_status() {
        let report = StatusReport {
            node_id: "12D3KooWabc".into(),
            role: NodeRole::AlwaysOn,
            online: true,
            ssid: Some("home".into()),
            version: 4,
            networks: vec!["home".into(), "cafe".into()],
            mesh_active: true,
            peers: vec!["12D3KooWdef".into()],
            sync_phase: "synced".into(),
            admin_url: None,
            started_at: chrono::Utc::now(),
            uptime_secs: 42,
        };
        let text = render_status(&report);
        assert!(text.contains("online (home)"));
        assert!(text.contains("v4 (2 networks)"));
        assert!(text.contains("sync synced, 1 peers"));
        assert!(text.contains("- 12D3KooWdef"));
    }
}
