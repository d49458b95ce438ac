mod app;
mod config;
mod core;
mod error;
mod game;

use clap::Parser;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install logger immediately, then set runtime max level from config after loading it.
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Trace)
        .try_init();
    // Startup default when config is missing or malformed.
    log::set_max_level(log::LevelFilter::Warn);

    let opts = app::RunOptions::parse();
    let config = config::load(&opts.config_path);
    log::set_max_level(config.log_level.as_level_filter());
    if let Err(e) = app::run(&config, &opts) {
        log::error!("kickblips failed: {e}");
        return Err(e);
    }
    Ok(())
}
