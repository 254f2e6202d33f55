mod app;
mod engine;
mod taxonomy;
mod util;

use std::path::PathBuf;

use clap::Parser;

use taxonomy::DatasetSource;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// JSON snapshot with `nodes` and `links`. Without it a demo taxonomy is
    /// generated.
    #[arg(long)]
    dataset: Option<PathBuf>,

    /// JSON document overriding any subset of the engine config.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value_t = 1000)]
    demo_nodes: usize,

    #[arg(long, default_value_t = 6)]
    demo_branching: usize,
}

fn main() -> eframe::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let source = match args.dataset {
        Some(path) => DatasetSource::File(path),
        None => DatasetSource::Demo {
            nodes: args.demo_nodes,
            branching: args.demo_branching,
        },
    };
    log::info!("starting with {source}");

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };

    eframe::run_native(
        "taxograph",
        options,
        Box::new(move |cc| {
            Ok(Box::new(app::TaxographApp::new(
                cc,
                source.clone(),
                args.config.clone(),
            )))
        }),
    )
}
