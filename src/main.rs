//! docscout - read-only document tools over MCP
//!
//! **Serve** (default): speaks MCP over stdin/stdout. Every tool call is run
//! by the invocation supervisor, which confines file access to the approved
//! roots and reports progress and logs back to the client.
//!
//! **Check** (`docscout check PATH`): runs the path authorizer once and
//! prints the decision, for testing a root configuration.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser as ClapParser, Subcommand};
use docscout::{
    config::{Config, ConfigError},
    mcp::DocscoutMcpServer,
    registry::RegistryError,
    roots::{Access, EmptyRootsPolicy, PathAuthorizer, RootsError},
    tools,
};
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// docscout - read-only document tools over MCP
///
/// Exposes word counting, text search and summarization of local files to an
/// MCP client, restricted to a set of approved root directories.
#[derive(ClapParser, Debug)]
#[command(name = "docscout", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(clap::Args, Debug, Default)]
struct RootArgs {
    /// Approved root directory (repeatable). Added to the configured roots.
    #[arg(long = "root", value_name = "PATH")]
    roots: Vec<PathBuf>,

    /// Config file (default: $XDG_CONFIG_HOME/docscout/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(clap::Args, Debug, Default)]
struct ServeArgs {
    #[command(flatten)]
    roots: RootArgs,

    /// Deny every path when no roots are configured
    #[arg(long)]
    deny_when_empty: bool,

    /// Compare paths case-insensitively (for case-insensitive filesystems)
    #[arg(long)]
    case_insensitive: bool,

    /// How long to wait for the client's model before falling back
    #[arg(long, value_name = "MS")]
    sampling_timeout_ms: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve MCP over stdio (the default)
    Serve(ServeArgs),

    /// Check whether a path would be allowed
    Check {
        /// Path to check
        path: PathBuf,

        #[command(flatten)]
        roots: RootArgs,
    },
}

#[derive(Error, Debug)]
pub enum DocscoutError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("invalid root: {0}")]
    Roots(#[from] RootsError),

    #[error("tool registration failed: {0}")]
    Registry(#[from] RegistryError),

    #[error("mcp service error: {0}")]
    Service(#[from] rmcp::RmcpError),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // stdout carries the protocol; all diagnostics go to stderr.
    init_tracing_stderr();

    let result = match cli.command {
        Some(Commands::Serve(args)) => run_serve(args).await.map(|()| ExitCode::SUCCESS),
        Some(Commands::Check { path, roots }) => run_check(path, roots),
        None => run_serve(cli.serve).await.map(|()| ExitCode::SUCCESS),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "docscout failed");
            eprintln!("docscout: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize tracing with stderr output.
///
/// MCP mode uses stdout for the JSON-RPC protocol, so all tracing MUST go
/// to stderr to avoid corrupting the protocol stream.
fn init_tracing_stderr() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "docscout=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Config file contents with command-line roots appended.
fn load_config(args: &RootArgs) -> Result<Config, DocscoutError> {
    let mut config = Config::resolve(args.config.as_deref())?;
    config.roots.extend(args.roots.iter().cloned());
    Ok(config)
}

async fn run_serve(args: ServeArgs) -> Result<(), DocscoutError> {
    let mut config = load_config(&args.roots)?;
    if args.deny_when_empty {
        config.access.empty_roots = EmptyRootsPolicy::Deny;
    }
    if args.case_insensitive {
        config.access.case_insensitive = true;
    }
    if let Some(ms) = args.sampling_timeout_ms {
        config.sampling.timeout_ms = ms;
    }
    config.validate()?;

    let authorizer = PathAuthorizer::new(config.permission_set()?);
    let registry = tools::builtin_registry(&config.sampling)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        tools = registry.len(),
        sampling_timeout_ms = config.sampling.timeout_ms,
        "docscout serving on stdio"
    );

    DocscoutMcpServer::new(registry, authorizer, config.sampling.timeout())
        .serve_stdio()
        .await?;

    tracing::info!("client disconnected, exiting");
    Ok(())
}

fn run_check(path: PathBuf, args: RootArgs) -> Result<ExitCode, DocscoutError> {
    let config = load_config(&args)?;
    let authorizer = PathAuthorizer::new(config.permission_set()?);
    match authorizer.check(&path) {
        Access::Allow(resolved) => {
            println!("allow {}", resolved.display());
            Ok(ExitCode::SUCCESS)
        }
        Access::Deny(denial) => {
            println!("deny {denial}");
            Ok(ExitCode::FAILURE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["docscout", "--root", "/srv/docs", "--deny-when-empty"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.serve.roots.roots, vec![PathBuf::from("/srv/docs")]);
        assert!(cli.serve.deny_when_empty);
    }

    #[test]
    fn serve_accepts_repeated_roots() {
        let cli = Cli::try_parse_from([
            "docscout",
            "serve",
            "--root",
            "/a",
            "--root",
            "/b",
            "--sampling-timeout-ms",
            "250",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Serve(args)) => {
                assert_eq!(args.roots.roots.len(), 2);
                assert_eq!(args.sampling_timeout_ms, Some(250));
            }
            other => panic!("expected serve, got {other:?}"),
        }
    }

    #[test]
    fn check_takes_a_path() {
        let cli = Cli::try_parse_from(["docscout", "check", "/etc/passwd", "--root", "/srv"]).unwrap();
        match cli.command {
            Some(Commands::Check { path, roots }) => {
                assert_eq!(path, PathBuf::from("/etc/passwd"));
                assert_eq!(roots.roots, vec![PathBuf::from("/srv")]);
            }
            other => panic!("expected check, got {other:?}"),
        }
    }
}
