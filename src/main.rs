//! nanogen - category-driven image generation service.

mod adapters;
mod cassette;
mod cli;
mod config;
mod context;
mod dispatch;
mod error;
mod fanout;
mod images;
mod job;
mod model_config;
mod output;
mod pipeline;
mod ports;
mod request;
mod resolver;
mod runner;
mod selector;
mod server;
#[cfg(test)]
mod testing;

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::context::{RecordingSession, ServiceContext};
use crate::error::PipelineError;
use crate::model_config::ModelConfigResolver;
use crate::pipeline::Pipeline;
use crate::resolver::RequestResolver;
use crate::runner::JobRunner;
use crate::selector::RandomSelector;
use crate::server::ServeOptions;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

async fn run(cli: Cli) -> Result<(), PipelineError> {
    let config_path = config::discover_config_path(cli.config.as_deref());
    let config = Config::load(&config_path)?;

    let (ctx, recording_session) = build_context(&config)?;

    match cli.command {
        Command::Serve { host, port } => {
            let options = ServeOptions {
                host: host.unwrap_or_else(|| config.server.host.clone()),
                port: match port {
                    Some(port) => port,
                    None => config.port()?,
                },
                workers: config.server.workers,
                queue_capacity: config.server.queue_capacity,
                auth_token: config.api_auth_token(),
            };
            if options.auth_token.is_none() {
                warn!("API_AUTH_TOKEN is not set; every /run request will be rejected");
            }
            let pipeline = Arc::new(build_pipeline(ctx, &config, config.output.dir.clone()));
            let result = server::serve(pipeline, options).await;
            finish_recording(recording_session);
            result
        }
        Command::Run(args) => {
            let output_dir =
                args.output_dir.as_deref().map_or_else(|| config.output.dir.clone(), PathBuf::from);
            let pipeline = build_pipeline(ctx, &config, output_dir);

            let mut first_error = None;
            for request in fanout::expand(vec![args.to_request()])? {
                match pipeline.run(&request).await {
                    Ok(report) => {
                        for path in &report.saved {
                            eprintln!("Saved: {}", path.display());
                        }
                        if report.failed_prompts > 0 {
                            warn!(failed = report.failed_prompts, "Some prompts failed");
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "Job failed");
                        first_error.get_or_insert(e);
                    }
                }
            }

            // Recording adapters live inside the pipeline.
            drop(pipeline);
            finish_recording(recording_session);
            first_error.map_or(Ok(()), Err)
        }
    }
}

/// Pick live, recording, or replaying adapters from the environment.
fn build_context(config: &Config) -> Result<(ServiceContext, Option<RecordingSession>), PipelineError> {
    let replay_path = std::env::var("NANOGEN_REPLAY").ok().filter(|p| !p.is_empty());
    let is_recording = std::env::var("NANOGEN_REC").is_ok_and(|v| v == "true" || v == "1");

    if let Some(ref cassette_path) = replay_path {
        info!(cassette = %cassette_path, "Replaying recorded interactions");
        Ok((ServiceContext::replaying(Path::new(cassette_path))?, None))
    } else if is_recording {
        let (ctx, session) = ServiceContext::recording(config)?;
        Ok((ctx, Some(session)))
    } else {
        Ok((ServiceContext::live(config)?, None))
    }
}

fn build_pipeline(ctx: ServiceContext, config: &Config, output_dir: PathBuf) -> Pipeline {
    let pinned = config.generation.pinned_category.clone();
    let selector = Arc::new(match config.generation.seed {
        Some(seed) => RandomSelector::seeded(seed, pinned),
        None => RandomSelector::new(pinned),
    });
    let resolver = RequestResolver::new(
        Arc::clone(&ctx.store),
        ctx.expander,
        ctx.storage.clone(),
        selector,
        config.generation.used_prefix.clone(),
    );
    let runner = JobRunner::new(ctx.generator, ctx.storage, output_dir, config.output.format.clone());
    Pipeline::new(
        resolver,
        ModelConfigResolver::new(ctx.store),
        runner,
        config.output.default_folder_id.clone(),
    )
}

fn finish_recording(session: Option<RecordingSession>) {
    if let Some(session) = session {
        match session.finish() {
            Ok(path) => eprintln!("Cassette saved: {}", path.display()),
            Err(e) => eprintln!("Warning: failed to save cassette: {e}"),
        }
    }
}
