//! talkhead: render a talking-head video through the remote render queue.
mod args;
mod console;
mod exit;
mod logging;

use std::io::{self, IsTerminal};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use talkhead_core::{BudgetCeiling, ConfirmationProvider, ConsolePrompt};
use talkhead_engine::{
    ElevenLabsClient, FalQueueService, JobController, LogProgressSink, MetadataProber, Pipeline,
    PipelineResult, ProgressSink, ReqwestFetcher,
};
use talkhead_logging::{
    level_from_verbosity, redact, talkhead_debug, talkhead_error, talkhead_warn,
};
use tokio_util::sync::CancellationToken;

use args::{Cli, Invocation};
use console::ConsoleProgress;

fn main() -> ExitCode {
    // Missing .env is fine; clap falls back to the real environment.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    logging::initialize(
        level_from_verbosity(cli.verbose, cli.quiet),
        cli.log_file.as_deref(),
    );

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            talkhead_error!("{err:#}");
            eprintln!("error: {err:#}");
            ExitCode::from(exit::STAGE_FAILURE)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<u8> {
    let invocation = match cli.invocation() {
        Ok(invocation) => invocation,
        Err(err) => {
            eprintln!("error: {err}");
            return Ok(exit::INPUT);
        }
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;
    let pipeline = {
        let _guard = runtime.enter();
        build_pipeline(&cli)?
    };

    let token = CancellationToken::new();
    let result = runtime.block_on(async {
        let watcher = tokio::spawn(cancel_on_ctrl_c(token.clone()));
        let result = match invocation {
            Invocation::Render(plan) => pipeline.run(plan, &token).await,
            Invocation::Resume { request_id, output } => {
                pipeline.resume(&request_id, &output, &token).await
            }
        };
        watcher.abort();
        result
    });

    // A declined or interrupted prompt can leave a stdin read parked on a blocking thread.
    runtime.shutdown_timeout(Duration::from_millis(250));
    Ok(report(result))
}

fn build_pipeline(cli: &Cli) -> anyhow::Result<Pipeline> {
    let settings = cli.render_settings();
    talkhead_debug!(
        "render queue {} endpoint {} (key {})",
        cli.queue_url,
        cli.endpoint,
        redact(&cli.fal_key)
    );

    let service = FalQueueService::new(cli.queue_config(), &settings)
        .context("failed to build the render service client")?;
    let fetcher = ReqwestFetcher::new(&settings).context("failed to build the download client")?;

    let confirmer: Arc<dyn ConfirmationProvider> = match cli.max_cost {
        Some(max_total) => Arc::new(BudgetCeiling::new(max_total)),
        None => Arc::new(ConsolePrompt::stdio()),
    };

    // Piped output gets progress through the log instead of status lines.
    let sink: Arc<dyn ProgressSink> = if io::stdout().is_terminal() {
        Arc::new(ConsoleProgress::stdout())
    } else {
        Arc::new(LogProgressSink)
    };

    let mut pipeline = Pipeline::new(
        JobController::new(Arc::new(service), Arc::new(fetcher), settings.clone()),
        Arc::new(MetadataProber::default()),
        confirmer,
        sink,
    );

    if cli.needs_synthesizer() {
        let key = cli.elevenlabs_key.clone().unwrap_or_default();
        talkhead_debug!("speech service {} (key {})", cli.elevenlabs_url, redact(&key));
        let synthesizer = ElevenLabsClient::new(cli.elevenlabs_url.clone(), key, &settings)
            .context("failed to build the speech client")?;
        pipeline = pipeline.with_synthesizer(Arc::new(synthesizer));
    }
    Ok(pipeline)
}

async fn cancel_on_ctrl_c(token: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        talkhead_warn!("interrupt received");
        token.cancel();
    }
}

fn report(result: PipelineResult) -> u8 {
    match result {
        Ok(report) => {
            if let Some(cost) = report.cost {
                println!("Estimated cost was {cost}");
            }
            if let Some(seconds) = report.rendered_duration {
                println!("Rendered {seconds:.1}s of video");
            }
            println!(
                "Done: {} (job {})",
                report.output.display(),
                report.request_id
            );
            exit::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            if let Some(request_id) = err.request_id.as_deref() {
                eprintln!("render job id: {request_id}");
            }
            if let Some(hint) = exit::resume_hint(&err) {
                eprintln!("{hint}");
            }
            exit::code_for(&err)
        }
    }
}
