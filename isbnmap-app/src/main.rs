use anyhow::Context;
use isbnmap::layers::dataset::load_catalog;
use isbnmap::prelude::*;
use isbnmap::tiles::FileFetcher;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Headless map driver.
///
/// Usage: `isbnmap-app <assets> [config.json]` where `<assets>` is a local
/// directory or an `http(s)://` base URL. Gesture events are read from stdin,
/// one JSON object per line, e.g. `{"type": "zoom", "delta": -1, "position": {"x": 500, "y": 400}}`.
/// A line `dataset <prefix>` highlights a dataset; a bare `dataset` clears it.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    isbnmap::init_debug_logging();

    let mut args = std::env::args().skip(1);
    let assets = args.next().unwrap_or_else(|| ".".to_string());
    let config = match args.next() {
        Some(path) => MapConfig::from_path(&path).with_context(|| format!("loading {}", path))?,
        None => MapConfig::default(),
    };

    let session = if assets.starts_with("http://") || assets.starts_with("https://") {
        open_session(config.clone(), HttpFetcher::new(assets.clone())).await?
    } else {
        open_session(config.clone(), FileFetcher::new(assets.clone())).await?
    };
    log::info!("serving map assets from {}", assets);

    session.on("tierchanged", |event| log::info!("{:?}", event));
    session.on("activate", |event| {
        if let MapEvent::Activate { isbn13, .. } = event {
            println!("activate {}", isbn13);
        }
    });
    session.on("hover", |event| {
        if let MapEvent::Hover { isbn13, zone, marker, .. } = event {
            println!(
                "{} {} {}",
                isbn13,
                zone.as_deref().unwrap_or("-"),
                marker.as_ref().map(|m| m.title.as_str()).unwrap_or("")
            );
        }
    });

    let renderer = |frame: &Frame| -> Result<()> {
        log::info!(
            "frame: {} level {} pan ({:.0}, {:.0}) tiles {}/{} zones {} markers {} dataset {} scale {} per {}px",
            frame.mode.name(),
            frame.tier.level,
            frame.transform.pan.x,
            frame.transform.pan.y,
            frame.visible_tiles.len(),
            frame.tile_report.requested,
            frame.visible_zones.len(),
            frame.visible_markers.len(),
            frame.dataset.as_ref().map(|d| d.prefix.as_str()).unwrap_or("-"),
            frame.scale_indicator().identifiers,
            frame.scale_indicator().length_px
        );
        Ok(())
    };
    let scheduler = FrameScheduler::new(session.clone(), Arc::new(renderer), &config.framerate);
    let (token, frames) = scheduler.spawn();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if let Some(rest) = line.strip_prefix("dataset") {
                    let prefix = Some(rest.trim()).filter(|p| !p.is_empty());
                    let shown = session.highlight_dataset(prefix);
                    println!("dataset {}", shown.as_deref().unwrap_or("-"));
                    continue;
                }
                match serde_json::from_str::<GestureEvent>(line) {
                    Ok(gesture) => {
                        session.handle_gesture(gesture);
                    }
                    Err(e) => log::warn!("ignoring gesture {:?}: {}", line, e),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    // Let the last gesture reach a frame before shutting down.
    tokio::time::sleep(config.framerate.frame_interval() * 2).await;
    token.dispose();
    let stats = frames.await?;
    log::info!("done: {:?}, tile cache {:?}", stats, session.tiles().stats());
    Ok(())
}

/// Build the session, filling an empty dataset catalog from `all_books.json`
/// next to the other assets when it is there.
async fn open_session<F>(mut config: MapConfig, fetcher: F) -> anyhow::Result<MapSession>
where
    F: ResourceFetcher<Resource = Vec<u8>> + Clone + 'static,
{
    if config.datasets.catalog.is_empty() {
        match load_catalog(fetcher.clone(), "all_books.json").await {
            Ok(catalog) => config.datasets.catalog = catalog,
            Err(e) => log::warn!("no dataset catalog: {}", e),
        }
    }
    Ok(MapSession::with_fetcher(&config, fetcher)?)
}
