use chrono::Utc;
use std::{error::Error, net::SocketAddr, sync::Arc};
use tap_counter::{
    AppState, Config, HttpBackend, TapSession,
    consent::{CONSENT_VERSION, ConsentRecord, ConsentStore, session_location},
    geo::GeoResolver,
    leaderboard::{display_name, rank_label},
    load_tap_data,
    models::Snapshot,
    router,
};
use tokio::{
    fs,
    io::{AsyncBufReadExt, BufReader},
    sync::watch,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env();
    match std::env::args().nth(1).as_deref() {
        None | Some("serve") => serve(config).await,
        Some("play") => play(config).await,
        Some(other) => Err(format!("unknown command '{other}', expected 'serve' or 'play'").into()),
    }
}

async fn serve(config: Config) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = config.data_path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let data = load_tap_data(&config.data_path).await;
    let app = router(AppState::new(config.data_path.clone(), data));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn play(config: Config) -> Result<(), Box<dyn Error>> {
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    let consent = ConsentStore::new(config.consent_path.clone());
    let record = match consent.get().await {
        Some(record) => record,
        None => {
            println!("Show your approximate country (from your IP address) on the global leaderboard?");
            println!("Declining still lets you play; your taps count for \"Unknown Region\". [y/N]");
            let answer = input.next_line().await?.unwrap_or_default();
            let accepted = matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes");
            match consent.set(accepted).await {
                Ok(record) => record,
                Err(err) => {
                    warn!("consent not saved, asking again next time: {err}");
                    ConsentRecord {
                        has_consented: accepted,
                        consent_date: Utc::now(),
                        consent_version: CONSENT_VERSION.to_string(),
                    }
                }
            }
        }
    };

    let country = session_location(Some(&record), &GeoResolver::new(config.geo_url.clone())).await;
    let backend = Arc::new(HttpBackend::new(config.server_url.clone())?);
    let session = TapSession::start(backend, &config.session, country);

    println!(
        "Tapping for {} {}. Enter taps, h hides the game, q quits.",
        session.country().flag(),
        display_name(session.country())
    );
    let renderer = tokio::spawn(render_view(session.view().subscribe()));

    loop {
        tokio::select! {
            line = input.next_line() => match line? {
                None => break,
                Some(line) => match line.trim() {
                    "" | "t" => {
                        session.press_start();
                        session.press_end();
                    }
                    "h" => session.visibility_changed(true).await,
                    "q" => break,
                    other => println!("unknown input '{other}'"),
                },
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    renderer.abort();
    session.teardown().await;
    Ok(())
}

async fn render_view(mut updates: watch::Receiver<Snapshot>) {
    while updates.changed().await.is_ok() {
        let snapshot = updates.borrow_and_update().clone();
        println!("Total taps: {}", snapshot.total);
        for (index, entry) in snapshot.leaderboard.iter().take(5).enumerate() {
            println!(
                "  {:>3} {} {:<20} {}",
                rank_label(index),
                entry.country_code.flag(),
                entry.display_name,
                entry.taps
            );
        }
    }
}
