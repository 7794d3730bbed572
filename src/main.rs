use std::{io::Write, process, sync::Arc};

use deskroute::{
    application::{
        access::Actor,
        engine::{AssignmentEngine, EngineParts},
        error::AppError,
        filters::{MAX_PER_PAGE, SpecializationFilter},
        outcome::{Fetched, Freshness},
    },
    config,
    infra::{memory::InMemoryBackend, notify::TracingNotifier, telemetry},
};
use serde::Serialize;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

/// CLI runs act with administrative rights on the local data set.
const CLI_ACTOR_ID: i64 = 0;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, report = %error.report("main").chain(), "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, report = %error.report("main").chain(), "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    let backend = Arc::new(InMemoryBackend::load(cli_args.command.data()).await?);
    let engine = AssignmentEngine::new(
        EngineParts::from_backend(backend, Arc::new(TracingNotifier)),
        settings.engine_options(),
    );
    let cleanup = engine.spawn_cleanup();

    let result = match cli_args.command {
        config::Command::Rank(args) => run_rank(&engine, args).await,
        config::Command::Workload(_) => run_workload(&engine).await,
        config::Command::Availability(args) => run_availability(&engine, args).await,
    };

    cleanup.abort();
    let _ = cleanup.await;

    result
}

async fn run_rank(engine: &AssignmentEngine, args: config::RankArgs) -> Result<(), AppError> {
    let filter = SpecializationFilter {
        category_id: args.category,
        per_page: MAX_PER_PAGE,
        ..SpecializationFilter::default()
    };
    let loaded = load_registry(engine, &filter).await?;

    let ranked = match args.category {
        Some(category_id) => engine
            .registry()
            .best_candidates(category_id, args.limit),
        None => {
            let mut ranked = engine.registry().ranked(&filter);
            ranked.truncate(args.limit);
            ranked
        }
    };
    info!(loaded, returned = ranked.len(), "Ranked candidates");
    print_json(&ranked)
}

async fn run_workload(engine: &AssignmentEngine) -> Result<(), AppError> {
    let stats = engine
        .registry()
        .fetch_workload_stats(&whole_registry(), false)
        .await?;
    warn_if_stale("workload", &stats);
    print_json(&stats.data)
}

async fn run_availability(
    engine: &AssignmentEngine,
    args: config::AvailabilityArgs,
) -> Result<(), AppError> {
    load_registry(engine, &whole_registry()).await?;

    let actor = Actor::admin(CLI_ACTOR_ID);
    let updated = engine
        .availability()
        .set_one(&actor, args.id, args.available)
        .await?;
    print_json(&updated)
}

fn whole_registry() -> SpecializationFilter {
    SpecializationFilter {
        per_page: MAX_PER_PAGE,
        ..SpecializationFilter::default()
    }
}

async fn load_registry(
    engine: &AssignmentEngine,
    filter: &SpecializationFilter,
) -> Result<usize, AppError> {
    let fetched = engine.fetch_specializations(filter, false).await?;
    warn_if_stale("specializations", &fetched);
    Ok(fetched.data)
}

fn warn_if_stale<T>(what: &'static str, fetched: &Fetched<T>) {
    if let Freshness::Stale { reason } = &fetched.freshness {
        warn!(what, reason = %reason, "serving stale data");
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to encode output: {err}")))?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{rendered}")
        .map_err(|err| AppError::unexpected(format!("failed to write output: {err}")))
}
