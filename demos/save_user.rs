//! Save the media posted by one user
//!
//! All files land in `<out_dir>/<user>/`, without per-author subfolders.
//!
//! ```bash
//! cargo run --example save_user -- some_user 0 downloads
//! ```

use reddit_media_dl::config::{Config, HttpConfig};
use reddit_media_dl::{Layout, Session, normalize_page_count};
use std::path::PathBuf;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let Some(user) = args.next() else {
        eprintln!("usage: save_user <user> [pages] [out_dir]");
        std::process::exit(2);
    };
    let pages = normalize_page_count(&args.next().unwrap_or_default());
    let out_dir = PathBuf::from(args.next().unwrap_or_else(|| "downloads".into()));

    let config = Config {
        http: HttpConfig {
            min_request_interval: Duration::from_secs(3),
            ..Default::default()
        },
        ..Default::default()
    };
    let session = Session::new(config)?;

    let entries = session.scrape_user(&user, pages).await?;
    let report = session
        .process_entries(&entries, &out_dir.join(&user), Layout::Flat)
        .await;

    println!(
        "u/{user}: {} of {} entries saved, {} failed",
        report.downloaded,
        report.total(),
        report.failed
    );
    Ok(())
}
