//! radiod: loops per-station playlists of encoded tracks and relays them to
//! HTTP listeners at playback speed.
//!
//! ## Startup
//! 1. **Config**: TOML file (optional) overlaid with CLI flags.
//! 2. **Playlists**: each sub-directory of the cache becomes a station.
//! 3. **Engine**: one playback thread per station, paced to the output bitrate.
//! 4. **HTTP**: Actix serves the station index, now-playing lookups and streams.
//!
//! Ctrl-C stops the HTTP server, then every station thread is joined.

mod api;
mod cli;
mod config;
mod library;

use std::sync::Arc;

use actix_web::middleware::Logger;
use actix_web::{App, HttpServer, web};
use anyhow::{Context, Result};
use clap::Parser;
use radio_engine::{Player, StationConfig, format_bitrate};
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::ServerConfig;

#[actix_web::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,actix_web=info,radiod=info,radio_engine=info")
        }))
        .init();

    let mut cfg = ServerConfig::load_or_default(args.config.as_deref())?;
    cfg.apply_args(&args);

    let bind = cfg.bind_addr()?;
    let cache_dir = cfg.cache_dir();
    let format = cfg.output_format();
    let engine = cfg.engine_config();
    let station_cfg = StationConfig::from(&engine);
    tracing::info!(
        bind = %bind,
        cache_dir = %cache_dir.display(),
        format = %format,
        bitrate = %format_bitrate(station_cfg.bytes_per_second),
        buffer_window = station_cfg.buffer_window,
        "starting radiod"
    );

    let playlists = library::scan_stations(&cache_dir, &format)?;
    if playlists.is_empty() {
        tracing::warn!(cache_dir = %cache_dir.display(), "no stations found in cache");
    }

    let player = Arc::new(Player::new(engine));
    for (name, tracks) in playlists {
        tracing::info!(station = %name, tracks = tracks.len(), "registering station");
        player.add_station(&name, tracks);
    }

    let state = web::Data::new(AppState {
        player: player.clone(),
        content_type: cfg.content_type(),
        index_template: api::load_index_template(cfg.index_template.as_deref()),
    });

    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Logger::default().exclude("/health"))
            .configure(api::configure)
    })
    .disable_signals()
    .bind(bind)
    .with_context(|| format!("bind {bind}"))?
    .run();

    let handle = server.handle();
    let player_for_signal = player.clone();
    ctrlc::set_handler(move || {
        tracing::info!("shutdown signal received");
        player_for_signal.stop();
        // The command is queued on call; the returned future only awaits completion.
        drop(handle.stop(true));
    })
    .context("install signal handler")?;

    tracing::info!(bind = %bind, "http server listening");
    let served = server.await;

    player.shutdown();
    tracing::info!("server exited");
    served.context("http server")?;
    Ok(())
}
