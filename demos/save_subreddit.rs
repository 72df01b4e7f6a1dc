//! Save the media of a subreddit
//!
//! Walks the listing of one subreddit and stores every resolved file under
//! `<out_dir>/<author>/`. Links no resolver understands are appended to
//! `<out_dir>/<author>/links.txt`.
//!
//! ```bash
//! RUST_LOG=reddit_media_dl=debug cargo run --example save_subreddit -- pics 2 downloads
//! ```

use reddit_media_dl::{Config, Event, Layout, Session, normalize_page_count};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("reddit_media_dl=info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let Some(subreddit) = args.next() else {
        eprintln!("usage: save_subreddit <subreddit> [pages] [out_dir]");
        std::process::exit(2);
    };
    let pages = normalize_page_count(&args.next().unwrap_or_default());
    let out_dir = PathBuf::from(args.next().unwrap_or_else(|| "downloads".into()));

    let session = Session::new(Config::default())?;

    // Ctrl+C stops the batch after the current entry
    let token = session.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    let mut events = session.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::Downloaded { url, files } => println!("saved {url} ({} files)", files.len()),
                Event::Recorded { url, .. } => println!("noted {url}"),
                Event::Failed { url, error } => println!("failed {url}: {error}"),
                _ => {}
            }
        }
    });

    let entries = session.scrape_subreddit(&subreddit, pages).await?;
    println!("r/{subreddit}: {} entries", entries.len());

    let report = session
        .process_entries(&entries, &out_dir, Layout::PerAuthor)
        .await;
    println!(
        "done: {} downloaded, {} recorded, {} failed",
        report.downloaded, report.recorded, report.failed
    );

    Ok(())
}
