//! HTTP API handlers.
//!
//! Defines the Actix routes for the station index, now-playing lookups and the
//! live audio streams.

use std::path::Path;
use std::sync::Arc;

use actix_web::http::header;
use actix_web::web::Bytes;
use actix_web::{Error, HttpResponse, Responder, get, web};
use futures_util::stream::unfold;
use radio_engine::{Listener, Player};
use serde::Serialize;

const STATIONS_PLACEHOLDER: &str = "{{STATIONS}}";
const BUILTIN_INDEX: &str = "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Stations</title></head>\n<body>\n<h1>Stations</h1>\n<ul>\n{{STATIONS}}\n</ul>\n</body>\n</html>\n";

/// Shared state handed to every handler.
pub struct AppState {
    pub player: Arc<Player>,
    pub content_type: &'static str,
    pub index_template: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct NowPlayingResponse {
    now: String,
}

/// Read the index template, falling back to the built-in page.
pub fn load_index_template(path: Option<&Path>) -> String {
    let Some(path) = path else {
        return BUILTIN_INDEX.to_string();
    };
    match std::fs::read_to_string(path) {
        Ok(raw) if raw.contains(STATIONS_PLACEHOLDER) => raw,
        Ok(_) => {
            tracing::warn!(
                path = %path.display(),
                "index template lacks the stations placeholder; using built-in page"
            );
            BUILTIN_INDEX.to_string()
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "fallback to built-in index template");
            BUILTIN_INDEX.to_string()
        }
    }
}

fn station_not_found() -> HttpResponse {
    HttpResponse::NotFound().json(serde_json::json!({ "error": "station not found" }))
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn render_index(template: &str, names: &[String]) -> String {
    let items = names
        .iter()
        .map(|name| {
            format!(
                "<li><a href=\"/stream/{}\">{}</a></li>",
                urlencoding::encode(name),
                escape_html(name)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    template.replacen(STATIONS_PLACEHOLDER, &items, 1)
}

#[get("/")]
/// HTML page linking every station stream.
pub async fn index(state: web::Data<AppState>) -> impl Responder {
    let page = render_index(&state.index_template, &state.player.station_names());
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(page)
}

#[get("/health")]
pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[get("/stations")]
/// JSON array of station names.
pub async fn stations_list(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(state.player.station_names())
}

#[get("/stations/{station}")]
/// Playback counters for one station.
pub async fn station_detail(state: web::Data<AppState>, name: web::Path<String>) -> impl Responder {
    match state.player.get(&name) {
        Some(station) => HttpResponse::Ok().json(station.stats()),
        None => station_not_found(),
    }
}

#[get("/nowplaying/{station}")]
/// Current track of a station.
pub async fn now_playing(state: web::Data<AppState>, name: web::Path<String>) -> impl Responder {
    match state.player.get(&name) {
        Some(station) => HttpResponse::Ok().json(NowPlayingResponse {
            now: station.now_playing(),
        }),
        None => station_not_found(),
    }
}

/// Stream state for one connected listener. Dropping it detaches the listener.
struct ListenerStreamState {
    station: String,
    listener: Listener,
}

impl Drop for ListenerStreamState {
    fn drop(&mut self) {
        self.listener.detach();
        tracing::info!(
            station = %self.station,
            listener = %self.listener.id(),
            "listener disconnected"
        );
    }
}

#[get("/stream/{station}")]
/// Live audio stream for a station.
pub async fn stream(state: web::Data<AppState>, name: web::Path<String>) -> impl Responder {
    let name = name.into_inner();
    let Some(station) = state.player.get(&name) else {
        return station_not_found();
    };
    let listener = station.add_listener();
    tracing::info!(
        station = %name,
        listener = %listener.id(),
        listeners = station.listener_count(),
        "listener connected"
    );

    let body = unfold(
        ListenerStreamState {
            station: name,
            listener,
        },
        |mut ctx| async move {
            let chunk = ctx.listener.recv_async().await?;
            Some((Ok::<Bytes, Error>(chunk), ctx))
        },
    );

    HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, state.content_type))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(body)
}

/// Register every route on an Actix service config.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(index)
        .service(health)
        .service(stations_list)
        .service(station_detail)
        .service(now_playing)
        .service(stream);
}
