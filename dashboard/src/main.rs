use anyhow::Context;
use chrono::NaiveDate;
use clap::Parser;
use gui_bridge::bridge::GuiBridge;
use gui_bridge::model::TargetView;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use torwatchcore::model::{Sensitivity, SourceType, TargetState};
use workflow::config::{Backend, DashboardConfig, TargetConfig};
use workflow::runner::Runner;

mod generator;
mod gui_bridge;
mod workflow;

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

#[derive(Parser)]
#[command(author, version, about = "Tor user-count dashboard driver")]
struct Args {
    /// Load dashboard settings from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, value_enum)]
    backend: Option<Backend>,
    /// Base URL of the selected backend
    #[arg(long)]
    base_url: Option<String>,
    /// relay, bridge or all
    #[arg(long)]
    source_type: Option<SourceType>,
    #[arg(long)]
    from: Option<NaiveDate>,
    #[arg(long)]
    to: Option<NaiveDate>,
    /// Country of an ad hoc target; repeat for more countries
    #[arg(long = "country")]
    countries: Vec<String>,
    /// Name of the ad hoc target (defaults to its country codes)
    #[arg(long)]
    name: Option<String>,
    #[arg(long, default_value = "MEDIUM")]
    sensitivity: Sensitivity,
    /// Print the weekly heatmap grid of every target
    #[arg(long, default_value_t = false)]
    heatmap: bool,
    /// Keep the HTTP bridge alive for a presentation layer
    #[arg(long, default_value_t = false)]
    serve: bool,
    #[arg(long)]
    bind: Option<SocketAddr>,
}

fn apply_args(config: &mut DashboardConfig, args: &Args) {
    if let Some(backend) = args.backend {
        config.backend = backend;
    }
    if let Some(base_url) = &args.base_url {
        match config.backend {
            Backend::Api => config.api.base_url = base_url.clone(),
            Backend::Portal => config.portal.base_url = base_url.clone(),
            Backend::Synthetic => log::warn!("--base-url has no effect on the synthetic backend"),
        }
    }
    if let Some(source_type) = args.source_type {
        config.filter.source_type = source_type;
    }
    if args.from.is_some() {
        config.filter.from = args.from;
    }
    if args.to.is_some() {
        config.filter.to = args.to;
    }
    if !args.countries.is_empty() {
        config.targets.push(TargetConfig {
            name: args.name.clone(),
            countries: args.countries.clone(),
            sensitivity: args.sensitivity,
        });
    } else if let Some(name) = &args.name {
        log::warn!("--name {name:?} ignored: no --country given for an ad hoc target");
    }
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
}

fn print_target(view: &TargetView, heatmap: bool) {
    let status = match &view.status {
        TargetState::Failed(failure) => format!("failed ({})", failure.message),
        TargetState::Ready => "ready".to_string(),
        other => format!("{other:?}").to_lowercase(),
    };
    println!(
        "{} {} [{}] -> {} days, {} users, {} point / {} range anomalies",
        view.id,
        view.name,
        status,
        view.series.len(),
        view.total_users(),
        view.overlay.points.len(),
        view.overlay.ranges.len()
    );
    for span in &view.overlay.ranges {
        println!("    anomaly {} .. {}", span.start, span.end);
    }
    for point in &view.overlay.points {
        println!("    anomaly {}", point);
    }

    if heatmap && !view.weekly.is_empty() {
        println!("    week       {}", WEEKDAYS.join("      "));
        let mut row_start = None;
        let mut row = [None; 7];
        for cell in &view.weekly {
            if row_start.is_some_and(|week| week != cell.week_start) {
                print_week(row_start, &row);
                row = [None; 7];
            }
            row_start = Some(cell.week_start);
            row[usize::from(cell.weekday)] = Some(cell.count);
        }
        print_week(row_start, &row);
    }
}

fn print_week(week: Option<NaiveDate>, row: &[Option<u64>; 7]) {
    let Some(week) = week else { return };
    let cells: Vec<String> = row
        .iter()
        .map(|count| match count {
            Some(count) => format!("{count:>8}"),
            None => format!("{:>8}", "-"),
        })
        .collect();
    println!("    {} {}", week, cells.join(" "));
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = if let Some(path) = &args.config {
        DashboardConfig::load(path)?
    } else {
        DashboardConfig::default()
    };
    apply_args(&mut config, &args);

    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating dashboard runtime")?;

    runtime.block_on(async {
        let runner = Runner::new(&config)?;
        let specs = config.target_specs()?;
        if specs.is_empty() {
            log::warn!("no targets configured; add one with --country or via the HTTP bridge");
        }
        runner.load_targets(specs).await;

        let filter = runner.orchestrator().filter();
        println!(
            "Source {} from {} to {}",
            filter.source_type,
            filter.range.start(),
            filter.range.end()
        );
        for target in runner.orchestrator().targets() {
            print_target(&TargetView::from(&target), args.heatmap);
        }

        if args.serve {
            let gui_bridge = GuiBridge::new(runner.orchestrator().clone());
            gui_bridge.publish_status(&format!(
                "HTTP bridge running on {} (Ctrl+C to stop)...",
                config.bind
            ));
            tokio::select! {
                _ = gui_bridge.serve(config.bind) => {}
                result = signal::ctrl_c() => result.context("awaiting Ctrl+C to exit")?,
            }
        }
        Ok::<(), anyhow::Error>(())
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("dashboard").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn country_flags_add_an_ad_hoc_target() {
        let args = parse(&["--country", "ru", "--country", "by", "--name", "East"]);
        let mut config = DashboardConfig::default();
        apply_args(&mut config, &args);
        assert_eq!(config.targets.len(), 1);
        assert_eq!(config.targets[0].name.as_deref(), Some("East"));
        assert_eq!(config.targets[0].countries, vec!["ru", "by"]);
    }

    #[test]
    fn name_without_country_adds_nothing() {
        let args = parse(&["--name", "Lonely"]);
        let mut config = DashboardConfig::default();
        apply_args(&mut config, &args);
        assert!(config.targets.is_empty());
    }
}
