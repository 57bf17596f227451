//! Command execution.

use std::io::Write;
use std::time::Duration;

use futures::future::join_all;
use mosaic_core::GlobalScope;
use mosaic_federation::{Loader, LoaderConfig, RemoteRegistry, RemotesConfig};
use mosaic_http::{HealthMonitor, HealthProbe, HttpImporter};
use nu_ansi_term::Color;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cli::{Cli, Command};
use crate::error::{Result, ShellError};
use crate::evaluator::DispatchEvaluator;
use crate::render;

/// Run one command, writing its output to `out`.
pub async fn execute<W: Write>(cli: Cli, out: &mut W) -> Result<()> {
    let config = RemotesConfig::load(&cli.config)?;
    let registry = RemoteRegistry::from_config(&config, cli.env)?;
    debug!(environment = %cli.env, remotes = registry.len(), "registry loaded");

    match cli.command {
        Command::Remotes => list_remotes(&registry, out),
        Command::Load { ref name, ref tenant } => {
            let loader = loader(&cli, registry)?;
            load(&loader, name, tenant.as_deref(), out).await
        }
        Command::Preload { ref names } => {
            let loader = loader(&cli, registry)?;
            preload(&loader, names, out).await
        }
        Command::Health {
            watch,
            interval,
            probe_timeout_ms,
        } => {
            let probe = HealthProbe::new(Duration::from_millis(probe_timeout_ms))?;
            if watch {
                watch_health(probe, registry, Duration::from_secs(interval.max(1)), out).await
            } else {
                check_health(&probe, &registry, out).await
            }
        }
    }
}

fn loader(cli: &Cli, registry: RemoteRegistry) -> Result<Loader> {
    let global = GlobalScope::new();
    let importer = HttpImporter::with_timeout(
        DispatchEvaluator::new(&global)?,
        Duration::from_millis(cli.timeout_ms),
    )?;
    Ok(Loader::new(
        registry,
        importer,
        LoaderConfig::for_environment(cli.env),
        &global,
    )?)
}

fn list_remotes<W: Write>(registry: &RemoteRegistry, out: &mut W) -> Result<()> {
    if registry.is_empty() {
        writeln!(out, "{}", Color::Yellow.paint("no remotes configured"))?;
    }
    for descriptor in registry.iter() {
        writeln!(out, "{}", render::remote(descriptor))?;
    }
    Ok(())
}

async fn load<W: Write>(
    loader: &Loader,
    name: &str,
    tenant: Option<&str>,
    out: &mut W,
) -> Result<()> {
    if let Some(tenant) = tenant {
        loader.store().set_tenant_id(Some(tenant.to_string()));
    }

    let result = loader.load_component(name).await;
    if let Some(state) = loader.store().remote_state(name) {
        writeln!(out, "{}", render::load_state(name, &state))?;
    }
    let component = result?;
    info!(remote = %name, kind = component.kind(), "component loaded");

    writeln!(out, "{}", render::component(&component))?;
    for style in loader.loaded_stylesheets() {
        writeln!(out, "{} {}", Color::DarkGray.paint("stylesheet"), style)?;
    }
    Ok(())
}

async fn preload<W: Write>(loader: &Loader, names: &[String], out: &mut W) -> Result<()> {
    let results = join_all(names.iter().map(|name| loader.prefetch(name))).await;

    let mut failed = 0;
    for (name, result) in names.iter().zip(results) {
        match result {
            Ok(()) => writeln!(out, "{} {}", Color::Green.paint("ok"), name)?,
            Err(error) => {
                failed += 1;
                writeln!(out, "{} {}: {}", Color::Red.paint("failed"), name, error)?;
            }
        }
    }

    if failed > 0 {
        return Err(ShellError::Preload {
            failed,
            total: names.len(),
        });
    }
    Ok(())
}

async fn check_health<W: Write>(
    probe: &HealthProbe,
    registry: &RemoteRegistry,
    out: &mut W,
) -> Result<()> {
    let results = probe.probe_all(registry).await;
    for health in &results {
        writeln!(out, "{}", render::health(health))?;
    }

    let down = results.iter().filter(|h| !h.status.is_up()).count();
    if down > 0 {
        return Err(ShellError::Unhealthy {
            down,
            total: results.len(),
        });
    }
    Ok(())
}

async fn watch_health<W: Write>(
    probe: HealthProbe,
    registry: RemoteRegistry,
    interval: Duration,
    out: &mut W,
) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let monitor = HealthMonitor::new(probe, registry, interval).spawn(move |health| {
        let _ = tx.send(health.clone());
    });

    loop {
        tokio::select! {
            changed = rx.recv() => match changed {
                Some(health) => {
                    writeln!(out, "{}", render::health(&health))?;
                    out.flush()?;
                }
                None => break,
            },
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
        }
    }

    monitor.stop().await;
    Ok(())
}
