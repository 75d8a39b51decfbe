use clap::Parser;
use drm_agent::collectors::{self, render_text, timed_collect, CollectionResult, Collector};
use drm_agent::config::{Config, OutputFormat};
use drm_agent::logging;
use serde::Serialize;
use std::io::Write;

/// JSON line written per collection.
#[derive(Serialize)]
struct Report<'a> {
    agent_id: &'a str,
    #[serde(flatten)]
    result: &'a CollectionResult,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    logging::init(config.json_logs);

    let agent_id = config.resolved_agent_id();
    tracing::info!(
        agent_id = %agent_id,
        sys_path = %config.sys_path.display(),
        "starting drm agent"
    );

    let mut collectors = collectors::build(&config)?;
    if collectors.is_empty() {
        anyhow::bail!("no collectors enabled");
    }

    if config.once {
        let failures = run_cycle(&config, &agent_id, &mut collectors).await?;
        if failures > 0 {
            anyhow::bail!("{failures} collector(s) failed");
        }
        return Ok(());
    }

    let mut ticker = tokio::time::interval(config.collect_interval());
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_cycle(&config, &agent_id, &mut collectors).await?;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown requested");
                break;
            }
        }
    }

    Ok(())
}

/// Poll every collector once and write their samples to stdout. Returns the
/// number of collectors that failed; a failure drops only that collector's
/// samples for the cycle.
async fn run_cycle(
    config: &Config,
    agent_id: &str,
    collectors: &mut [Box<dyn Collector>],
) -> anyhow::Result<usize> {
    let mut failures = 0;

    for collector in collectors.iter_mut() {
        let name = collector.name();
        match timed_collect(collector.as_mut(), config.collect_timeout()).await {
            Ok(result) => {
                tracing::debug!(
                    collector = name,
                    samples = result.samples.len(),
                    latency_us = result.latency_us,
                    "collection finished"
                );
                let mut stdout = std::io::stdout().lock();
                match config.format {
                    OutputFormat::Text => {
                        stdout.write_all(render_text(&result.samples).as_bytes())?;
                    }
                    OutputFormat::Json => {
                        let report = Report {
                            agent_id,
                            result: &result,
                        };
                        serde_json::to_writer(&mut stdout, &report)?;
                        writeln!(stdout)?;
                    }
                }
                stdout.flush()?;
            }
            Err(e) => {
                failures += 1;
                tracing::warn!(collector = name, error = %e, "collection failed");
            }
        }
    }

    Ok(failures)
}
