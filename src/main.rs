use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use keypilot::executor::actions;
use keypilot::prelude::*;

/// Keypilot CLI
#[derive(Debug, Parser)]
#[command(
    name = keypilot::PKG_NAME,
    version = keypilot::PKG_VERSION,
    about = "Local HTTP backend that drives timed keyboard and mouse sequences"
)]
struct Args {
    /// Path to an optional JSON configuration file
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Address to listen on (e.g. 127.0.0.1:5000). Overrides the config file.
    #[arg(short = 'b', long = "bind")]
    bind: Option<String>,

    /// Enable dry-run mode (log actions instead of simulating input)
    #[arg(long = "dry-run")]
    dry_run: bool,

    /// Set log level (e.g., trace, debug, info, warn, error). Overrides RUST_LOG.
    #[arg(long = "log-level")]
    log_level: Option<String>,

    /// Print the JSON Schema for the configuration and exit
    #[arg(long = "print-schema")]
    print_schema: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    keypilot::init_tracing(args.log_level.as_deref());

    if args.print_schema {
        let schema = config::generate_schema();
        let json = serde_json::to_string_pretty(&schema)?;
        println!("{json}");
        return Ok(());
    }

    let mut cfg = match &args.config {
        Some(path) => config::load_from_path_async(path).await?,
        None => Config::default(),
    };
    if let Some(bind) = args.bind {
        cfg.bind = bind;
    }
    cfg.dry_run |= args.dry_run;
    config::validate_config(&cfg)?;
    let addr = config::bind_addr(&cfg)?;

    info!(
        version = keypilot::PKG_VERSION,
        bind = %addr,
        dry_run = cfg.dry_run,
        "Starting Keypilot"
    );

    let injector = build_injector(cfg.dry_run, &cfg.injector, cfg.dry_run_screen);
    match actions::blocking(&injector, |inj| inj.screen_size()).await {
        Ok((width, height)) => {
            info!(injector = injector.name(), width, height, "Input backend initialized")
        }
        Err(err) => warn!(
            injector = injector.name(),
            error = %err,
            "Could not query screen size; input injection may fail"
        ),
    }
    if !cfg.dry_run && cfg.injector.failsafe {
        info!("Fail-safe enabled: move the mouse to the top-left corner to block injection");
    }

    let runner = SequenceRunner::new(injector, cfg.stop_grace());
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on http://{addr}");

    server::serve(listener, runner).await?;

    info!("Keypilot exited");
    Ok(())
}
