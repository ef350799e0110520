use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::sync::watch;
use tracing::{info, warn};

use kaizen_core::app::{MemoryLedger, Orchestrator, OrchestratorBuilder, SelfHealingCycle};
use kaizen_core::config::Settings;
use kaizen_core::domain::{Capability, NewTask, TaskSource};
use kaizen_core::impls::{
    CredentialPool, FanoutEventSink, GenerativeExecutor, GitWorkspace, HttpTextGenerator,
    LintRemediator, LinterHealthMonitor, PytestValidator, ServiceClient, SqliteTaskStore,
    TokioCommandRunner, TracingEventSink,
};
use kaizen_core::ports::{
    Clock, CommandRunner, GenerationService, SystemClock, TaskStore, UlidGenerator, Workspace,
    WorkspaceLock,
};
use kaizen_core::telemetry::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "kaizen", version, about = "Autonomous improvement loop")]
struct Cli {
    /// 設定ファイル（省略時は ./kaizen.toml があれば読む）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// タスクをキューに追加
    Enqueue {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, default_value = "operator")]
        source: TaskSource,
    },
    /// タスク 1 件 + health サイクル 1 回
    RunOnce,
    /// Ctrl-C まで回し続ける
    Run,
    /// キューとメトリクスを表示
    Status {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// health サイクルを 1 回だけ実行
    Heal,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("invalid configuration")?;

    let store = Arc::new(
        SqliteTaskStore::connect(&settings.store.url)
            .await
            .with_context(|| format!("task store unreachable: {}", settings.store.url))?,
    );
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    match cli.command {
        Commands::Enqueue {
            title,
            description,
            source,
        } => {
            let mut task = NewTask::new(title).with_source(source);
            if let Some(description) = description {
                task = task.with_description(description);
            }
            let id = store.add_task(task).await?;
            info!(task_id = %id, "task enqueued");
            println!("{id}");
        }
        Commands::RunOnce => {
            let orchestrator = wire(&settings, store, clock).await?;
            orchestrator.recover_interrupted().await?;
            let summary = orchestrator.run_cycle().await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Run => {
            let orchestrator = wire(&settings, store, clock).await?;
            let (tx, rx) = watch::channel(false);
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "failed to listen for ctrl-c");
                    return;
                }
                info!("shutdown requested, finishing the current step");
                let _ = tx.send(true);
            });
            orchestrator.run(rx).await?;
        }
        Commands::Status { limit } => {
            let ledger = MemoryLedger::open(&settings.memory.path, clock).await?;
            let counts = store.counts_by_status().await?;
            let recent = store.list_tasks(limit).await?;
            let workspace = GitWorkspace::new(Arc::new(TokioCommandRunner), settings.git_options());
            let dirty = match workspace.is_dirty().await {
                Ok(dirty) => Some(dirty),
                Err(e) => {
                    warn!(error = %e, "could not inspect workspace");
                    None
                }
            };
            let status = json!({
                "counts": counts,
                "metrics": ledger.metrics().await,
                "workspace_dirty": dirty,
                "recent": recent,
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Heal => {
            let orchestrator = wire(&settings, store, clock).await?;
            if let Some(report) = orchestrator.run_health_cycle().await {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }
    }

    Ok(())
}

/// 設定 → アダプタ → Orchestrator
async fn wire(
    settings: &Settings,
    store: Arc<SqliteTaskStore>,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<Orchestrator> {
    let runner: Arc<dyn CommandRunner> = Arc::new(TokioCommandRunner);
    let workspace: Arc<dyn Workspace> =
        Arc::new(GitWorkspace::new(runner.clone(), settings.git_options()));
    let lock = WorkspaceLock::new();

    let credentials = settings.credentials();
    if credentials.is_empty() {
        warn!("no service credentials configured, generation will return empty");
    }
    let backend = Arc::new(HttpTextGenerator::new(
        settings.service_base_url()?,
        settings.service.model.clone(),
    ));
    let service: Arc<dyn GenerationService> = Arc::new(ServiceClient::new(
        backend,
        CredentialPool::new(credentials),
        settings.service_timeout(),
    ));

    let mut ledger = MemoryLedger::open(&settings.memory.path, clock.clone())
        .await?
        .with_context_size(settings.memory.context_size);
    if settings.memory.summarize {
        ledger = ledger.with_summarizer(service.clone());
    }
    let ledger = Arc::new(ledger);

    let healing = SelfHealingCycle::new(
        Arc::new(LinterHealthMonitor::new(runner.clone(), settings.health_command()?)),
        Arc::new(LintRemediator::new(
            runner.clone(),
            settings.remediation_steps()?,
            workspace.clone(),
        )),
        Arc::new(PytestValidator::new(
            runner.clone(),
            settings.validation_command()?,
            settings.validation_report_path(),
            settings.validation.no_tests_exit_code,
        )),
        Arc::new(
            FanoutEventSink::new()
                .with(Arc::new(TracingEventSink))
                .with(ledger.clone()),
        ),
        Arc::new(UlidGenerator::new(SystemClock)),
        clock,
    );

    let mut builder = OrchestratorBuilder::new(store, ledger.clone())
        .workspace(workspace, lock)
        .healing(healing)
        .settings(settings.runtime_settings())
        .executor_timeout(settings.executor_timeout());
    for capability in Capability::ALL {
        let dir = match capability {
            Capability::Research => &settings.executors.research_dir,
            Capability::SiteBuild => &settings.executors.site_dir,
            Capability::FeatureBuild => &settings.executors.feature_dir,
        };
        let executor = GenerativeExecutor::new(
            capability,
            service.clone(),
            settings.workspace.root.join(dir),
            GenerativeExecutor::default_extension(capability),
        )
        .with_context(ledger.clone());
        builder = builder.register(Arc::new(executor))?;
    }

    Ok(builder.expect_capabilities(&Capability::ALL).build()?)
}
