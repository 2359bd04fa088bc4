use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::config::AppConfig;
use crate::demo;
use crate::dispatcher::Dispatcher;
use crate::logging::init_logging;
use crate::middleware::{MetricsMiddleware, Middleware, TracingMiddleware};
use crate::openapi::{emit, Document, OpenApiInfo};
use crate::router::RouteRegistry;
use crate::runtime_config::RuntimeConfig;
use crate::server::{AppService, HttpServer};

#[derive(Parser, Debug)]
#[command(name = "apiroute", version, about = "Typed API router with OpenAPI generation")]
pub struct Cli {
    /// YAML configuration file; defaults apply when omitted
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the registered routes over HTTP
    Serve {
        /// Overrides `http.addr` from the configuration
        #[arg(long)]
        addr: Option<String>,
    },
    /// Print or write the OpenAPI document
    Openapi {
        #[arg(long, value_enum, default_value_t = DocFormat::Json)]
        format: DocFormat,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Fail unless the document parses as OpenAPI
        #[arg(long, default_value_t = false)]
        check: bool,
    },
    /// List every method and path template with its handler
    Routes,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum DocFormat {
    Json,
    Yaml,
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => Ok(AppConfig::default()),
    }
}

fn demo_registry() -> Result<RouteRegistry> {
    let (events, templates) =
        demo::sample_services().context("failed to seed the demo stores")?;
    demo::registry(&events, &templates).context("failed to build the routing table")
}

fn render(document: &Document, format: DocFormat) -> Result<String> {
    Ok(match format {
        DocFormat::Json => document.to_json_pretty()?,
        DocFormat::Yaml => document.to_yaml()?,
    })
}

fn serve(config: &AppConfig, addr: Option<&str>) -> Result<()> {
    RuntimeConfig::from_env().apply();

    let registry = Arc::new(demo_registry()?);
    let document = emit(&registry, &OpenApiInfo::from(&config.openapi));

    let metrics = Arc::new(MetricsMiddleware::new());
    let mut dispatcher = Dispatcher::new(Arc::clone(&registry), config.dispatch.clone());
    dispatcher.add_middleware(Arc::new(TracingMiddleware));
    dispatcher.add_middleware(Arc::clone(&metrics) as Arc<dyn Middleware>);

    let mut service = AppService::new(Arc::new(dispatcher), &document)?;
    service.set_metrics_middleware(metrics);

    let addr = addr.unwrap_or(&config.http.addr);
    let handle = HttpServer(service)
        .start(addr)
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %handle.addr(), routes = registry.len(), "apiroute serving");
    handle
        .join()
        .map_err(|e| anyhow::anyhow!("server terminated abnormally: {e:?}"))
}

/// Run a parsed command line.
pub fn run_cli(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Serve { addr } => {
            init_logging(&config.logging.to_log_config())?;
            serve(&config, addr.as_deref())
        }
        Commands::Openapi {
            format,
            output,
            check,
        } => {
            let registry = demo_registry()?;
            let document = emit(&registry, &OpenApiInfo::from(&config.openapi));
            if check {
                document
                    .to_oas3()
                    .context("emitted document is not valid OpenAPI")?;
            }
            let text = render(&document, format)?;
            match output {
                Some(path) => fs::write(&path, text)
                    .with_context(|| format!("failed to write {}", path.display()))?,
                None => print!("{text}"),
            }
            Ok(())
        }
        Commands::Routes => {
            demo_registry()?.dump_routes();
            Ok(())
        }
    }
}
