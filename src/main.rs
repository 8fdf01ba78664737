mod cli;

use moshforged::{
    config,
    effects::Effect,
    events::{BroadcastConfig, Broadcaster, ChannelSink, EventSink, JsonLinesSink},
    ids::{JobId, SubscriberId},
    monitor::MonitorConfig,
    processor::{PoolConfig, SubmitRequest, WorkerPool},
    state::{JobRegistry, JobStatus},
};
use moshforged_riff::{riff::walk_tree, MoshParams};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "moshforged=trace,moshforged_riff=trace".to_string()
        } else {
            "moshforged=debug,moshforged_riff=debug".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Mosh {
            input,
            output_dir,
            effect,
            intensity,
            remove,
            duplicate,
            count,
            seed,
            events,
        } => {
            let params = MoshParams {
                intensity,
                remove_fragments: remove,
                duplicate_fragments: duplicate,
                duplication_count: count,
                seed,
            };
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(mosh_file(
                cli.config.as_deref(),
                input,
                output_dir,
                &effect,
                params,
                events,
            ))
        }
        Commands::Inspect { file, json } => inspect_file(&file, json),
        Commands::Batch {
            input,
            output_dir,
            effect,
            events,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_batch(
                cli.config.as_deref(),
                input,
                output_dir,
                &effect,
                events,
            ))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("moshforged {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn build_pool(config: &config::Config) -> WorkerPool {
    let events = Broadcaster::new(BroadcastConfig::from(&config.events));
    let registry = Arc::new(JobRegistry::new(events));
    WorkerPool::with_effects(
        PoolConfig::from(&config.pool),
        MonitorConfig::from(&config.monitor),
        registry,
    )
}

fn check_input(input: &Path) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file does not exist: {:?}", input);
    }
    Ok(())
}

async fn mosh_file(
    config_path: Option<&Path>,
    input: PathBuf,
    output_dir: Option<PathBuf>,
    effect: &str,
    params: MoshParams,
    print_events: bool,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    check_input(&input)?;
    let effect: Effect = effect.parse()?;
    let output_dir = output_dir.unwrap_or_else(|| config.output.dir.clone());

    tracing::info!("Moshing {:?} with {} into {:?}", input, effect, output_dir);

    let pool = build_pool(&config);
    let printer = EventPrinter::start(&pool, print_events);
    pool.start();

    let request = SubmitRequest::new(input, output_dir, effect).with_params(params);
    let submitted = pool.submit(request).await.map(|id| vec![id]);
    finish(&pool, printer, submitted?).await
}

async fn run_batch(
    config_path: Option<&Path>,
    input: PathBuf,
    output_dir: Option<PathBuf>,
    effect: &str,
    print_events: bool,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    check_input(&input)?;
    let effect: Effect = effect.parse()?;
    let output_dir = output_dir.unwrap_or_else(|| config.output.dir.clone());

    tracing::info!("Running {} presets of {} on {:?}", effect.presets().len(), effect, input);

    let pool = build_pool(&config);
    let printer = EventPrinter::start(&pool, print_events);
    pool.start();

    let ids = pool.submit_batch(input, output_dir, effect).await?;
    finish(&pool, printer, ids).await
}

/// Prints job events to stdout as JSON lines.
///
/// Events go through a local task so they can be flushed before exit.
struct EventPrinter {
    broadcaster: Broadcaster,
    subscriber: SubscriberId,
    task: tokio::task::JoinHandle<()>,
}

impl EventPrinter {
    fn start(pool: &WorkerPool, enabled: bool) -> Option<Self> {
        if !enabled {
            return None;
        }

        let broadcaster = pool.registry().events().clone();
        let (sink, mut rx) = ChannelSink::channel(256);
        let subscriber = broadcaster.subscribe(sink);
        let task = tokio::spawn(async move {
            let mut out = JsonLinesSink::new(tokio::io::stdout());
            while let Some(event) = rx.recv().await {
                if let Err(e) = out.send(&event).await {
                    tracing::warn!("Failed to print event: {}", e);
                    break;
                }
            }
        });

        Some(Self {
            broadcaster,
            subscriber,
            task,
        })
    }

    async fn flush(self) {
        self.broadcaster.unsubscribe(self.subscriber);
        let _ = self.task.await;
    }
}

/// Drain the pool and report the outcome of each job.
async fn finish(pool: &WorkerPool, printer: Option<EventPrinter>, ids: Vec<JobId>) -> Result<()> {
    pool.shutdown().await;
    if let Some(printer) = printer {
        printer.flush().await;
    }

    let mut failed = 0;
    for id in &ids {
        let job = pool
            .registry()
            .get(*id)
            .with_context(|| format!("Job {} disappeared", id))?;
        match job.status {
            JobStatus::Completed => {
                println!("✓ {} {} -> {}", job.id, job.effect, job.output_path.display())
            }
            _ => {
                failed += 1;
                println!(
                    "✗ {} {} failed: {}",
                    job.id,
                    job.effect,
                    job.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
    }

    let stats = pool.registry().stats();
    tracing::info!(
        "{} jobs finished ({:.0}% succeeded), {} bytes written",
        stats.completed + stats.failed,
        stats.success_rate(),
        stats.total_bytes_written
    );

    if failed > 0 {
        anyhow::bail!("{} of {} jobs failed", failed, ids.len());
    }
    Ok(())
}

fn inspect_file(file: &Path, json: bool) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let data = std::fs::read(file).with_context(|| format!("Failed to read {:?}", file))?;
    let tree = walk_tree(&data)?;

    if json {
        let json_str = serde_json::to_string_pretty(&tree)?;
        println!("{}", json_str);
        return Ok(());
    }

    println!("File: {}", file.display());
    println!("Size: {} bytes", data.len());
    println!();

    for chunk in &tree {
        let indent = "  ".repeat(chunk.depth);
        print!("{}{}", indent, chunk.fourcc);
        if let Some(ref list_type) = chunk.list_type {
            print!(" '{}'", list_type);
        }
        print!(" @{} ({} bytes)", chunk.offset, chunk.payload_len);
        if chunk.payload_fragment {
            print!(" [fragment]");
        }
        if let Some(nal) = chunk.nal {
            print!(" [{:?}]", nal);
        }
        if chunk.raw_tail {
            print!(" [raw tail]");
        }
        println!();
    }

    let fragments = tree.iter().filter(|c| c.payload_fragment).count();
    println!("\nChunks: {}", tree.len());
    println!("Video fragments: {}", fragments);

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    println!(
        "  Pool: {} workers, queue capacity {}",
        config.pool.workers, config.pool.queue_capacity
    );
    println!("  Monitor: polling every {} ms", config.monitor.poll_interval_ms);
    println!(
        "  Events: {} buffered per subscriber, {} ms write timeout",
        config.events.subscriber_buffer, config.events.write_timeout_ms
    );
    println!("  Output: {}", config.output.dir.display());

    Ok(())
}
