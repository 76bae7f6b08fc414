//! Arbor entrypoint: load a graph document, run the layout+render pipeline
//! through the coordinator, and emit render data as JSON on stdout.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use core_config::Config;
use core_coordinator::{
    OperationCoordinator, TimeoutDefaults, lock, shared_layout_engine, shared_renderer,
    shared_state,
};
use core_layout::TieredLayout;
use core_render::DataRenderer;
use core_state::RenderConfigPatch;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "arbor", version, about = "Arbor graph pipeline")]
struct Args {
    /// Graph document (JSON: nodes, edges, containers).
    pub path: PathBuf,
    /// Optional configuration file path (overrides discovery of `arbor.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Also dump coordinator queue status alongside the render data.
    #[arg(long = "status")]
    pub status: bool,
    /// Skip the first-layout smart-collapse heuristic.
    #[arg(long = "no-smart-collapse")]
    pub no_smart_collapse: bool,
}

/// Install the tracing subscriber: `RUST_LOG`-filtered, non-blocking file
/// appender. The guard must live for the whole process or buffered log
/// lines are lost on exit.
fn configure_logging() -> Result<WorkerGuard> {
    let appender = tracing_appender::rolling::never(".", "arbor.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(guard)
}

fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        tracing::error!(target: "runtime", %panic_info, "panic");
        previous(panic_info);
    }));
}

fn timeout_defaults(config: &Config) -> TimeoutDefaults {
    let t = &config.file.timeouts;
    TimeoutDefaults {
        layout: Duration::from_millis(t.layout_ms),
        render: Duration::from_millis(t.render_ms),
        application_event: Duration::from_millis(t.application_event_ms),
        render_config: Duration::from_millis(t.render_config_ms),
        tree_op: Duration::from_millis(t.tree_op_ms),
    }
}

fn render_patch(config: &Config) -> RenderConfigPatch {
    let r = &config.file.render;
    RenderConfigPatch {
        long_labels_enabled: Some(r.long_labels_enabled),
        show_aggregated_edge_counts: Some(r.show_aggregated_edge_counts),
        fit_view_on_render: Some(r.fit_view_on_render),
        ..Default::default()
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let _log_guard = configure_logging()?;
    install_panic_hook();
    info!(target: "runtime", "startup");

    let args = Args::parse();
    let config = core_config::load_from(args.config.clone())?;

    let document = fs::read_to_string(&args.path)
        .with_context(|| format!("reading graph document {}", args.path.display()))?;
    let mut state = core_ingest::parse(&document)
        .with_context(|| format!("ingesting {}", args.path.display()))?;

    state.set_smart_collapse_budget(config.file.smart_collapse.budget);
    if args.no_smart_collapse || !config.file.smart_collapse.enabled {
        state.set_smart_collapse_enabled(false);
    }
    state.update_render_config(&render_patch(&config));

    let state = shared_state(state);
    let engine = shared_layout_engine(TieredLayout::new());
    let renderer = shared_renderer(DataRenderer::new());
    let coordinator = OperationCoordinator::with_timeouts(timeout_defaults(&config));

    let data = coordinator
        .execute_layout_and_render_pipeline(&state, &engine, &renderer)
        .await?;
    info!(
        target: "runtime",
        nodes = data.nodes.len(),
        edges = data.edges.len(),
        phase = %lock(&state).layout_phase(),
        "pipeline_complete"
    );

    if args.status {
        let dump = serde_json::json!({
            "render": data,
            "status": coordinator.queue_status(),
        });
        println!("{}", serde_json::to_string_pretty(&dump)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&data)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_mapping_uses_config_values() {
        let mut config = Config::default();
        config.file.timeouts.layout_ms = 123;
        let defaults = timeout_defaults(&config);
        assert_eq!(defaults.layout, Duration::from_millis(123));
        assert_eq!(defaults.render, Duration::from_millis(5_000));
    }

    #[test]
    fn render_patch_carries_config_section() {
        let mut config = Config::default();
        config.file.render.long_labels_enabled = false;
        let patch = render_patch(&config);
        assert_eq!(patch.long_labels_enabled, Some(false));
    }
}
