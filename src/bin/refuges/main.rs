use std::sync::Arc;

use anyhow::{Result, bail};
use clap::{Parser as CliParser, Subcommand};
use log::error;
use refuges_map::{
  Category, MapState,
  config::Config,
  fetch::{Detail, TimeoutSource, client::RefugesClient, coordinator::ViewportChange},
  relay,
};
use tracing_subscriber::EnvFilter;

#[derive(clap::Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Lists the points inside a bounding box.
  Bbox {
    /// Bounding box as west,south,east,north in degrees.
    bbox: String,

    /// Comma separated categories to show. Values: bivouac, cabane, gite, lac,
    /// pt_eau, pt_passage, refuge, sommet, other. Defaults to the configured ones.
    #[arg(short, long, value_delimiter = ',')]
    types: Vec<Category>,

    /// Shows every category present in the result.
    #[arg(short, long, default_value_t = false)]
    all: bool,

    /// Maximum number of points to request.
    #[arg(short, long)]
    max: Option<u32>,

    /// Detail level of the request. Values: simple, complete.
    #[arg(short, long)]
    detail: Option<Detail>,
  },
  /// Serves the relay endpoints on localhost.
  Serve {
    #[arg(short, long)]
    port: Option<u16>,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();
  init_logging(&args.command);
  let mut config = Config::new();

  match args.command {
    Command::Bbox {
      bbox,
      types,
      all,
      max,
      detail,
    } => {
      config.max_points = max.or(config.max_points);
      config.detail = detail.or(config.detail);
      list_bbox(&config, &bbox, types, all).await
    }
    Command::Serve { port } => {
      let client = RefugesClient::new(config.api_base(), config.request_timeout())?;
      relay::serve(client, port.unwrap_or(config.relay_port())).await
    }
  }
}

/// The relay logs through tracing, the one-shot listing through `env_logger`.
fn init_logging(command: &Command) {
  match command {
    Command::Bbox { .. } => env_logger::init(),
    Command::Serve { .. } => tracing_subscriber::fmt()
      .with_env_filter(EnvFilter::from_default_env())
      .init(),
  }
}

async fn list_bbox(config: &Config, bbox: &str, types: Vec<Category>, all: bool) -> Result<()> {
  let client = RefugesClient::new(config.api_base(), config.request_timeout())?;
  let source = TimeoutSource::new(client, config.request_timeout());
  let mut state = MapState::new(Arc::new(source), config);
  if all {
    state.set_selected_categories(std::iter::empty());
  } else if !types.is_empty() {
    state.set_selected_categories(types);
  }

  if state.on_bounds_changed(bbox) == ViewportChange::Ignored {
    bail!("Invalid bounding box: '{bbox}'. Expected west,south,east,north.");
  }
  state.settle().await;

  if let Some(e) = state.last_error() {
    error!("Fetching {bbox} failed.");
    bail!("{e}");
  }
  if all {
    state.seed_selection_from_observed();
  }

  let Some(filtered) = state.filtered() else {
    return Ok(());
  };
  for feature in &filtered.features {
    println!(
      "{}\t{}\t{}\t{}\t{}",
      feature.id(),
      refuges_map::classify(feature),
      state.color_for(feature),
      feature.name().unwrap_or("-"),
      feature
        .properties
        .altitude
        .map_or_else(|| "-".to_string(), |a| format!("{a:.0} m")),
    );
  }
  println!(
    "{} of {} points shown.",
    filtered.len(),
    state.current().map_or(0, |fc| fc.len())
  );
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use clap::CommandFactory;

  #[test]
  fn cli_is_well_formed() {
    Args::command().debug_assert();
  }

  #[test]
  fn parses_bbox_arguments() {
    let args = Args::parse_from([
      "refuges",
      "bbox",
      "5.7,45.1,6.2,45.4",
      "--types",
      "cabane,pt_eau",
      "--detail",
      "complete",
    ]);
    let Command::Bbox { types, detail, .. } = args.command else {
      panic!("expected the bbox subcommand");
    };
    assert_eq!(types, vec![Category::Cabane, Category::PtEau]);
    assert_eq!(detail, Some(Detail::Complete));
  }
}
