use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio::io::BufReader;
use tokio::sync::oneshot;

use wikibus::banner::{BannerInfo, print_banner, print_serve_summary};
use wikibus::bus::local::LocalBus;
use wikibus::bus::{Bus, BusMessage};
use wikibus::consts::{DEFAULT_API_URL, DEFAULT_GEO_RESULTS, DEFAULT_TOPIC};
use wikibus::handler::{HandlerConfig, ReferencesMode, RequestHandler};
use wikibus::lookup::wikipedia::{ClientConfig, WikipediaClient};
use wikibus::service::serve;
use wikibus::stdio;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum References {
    /// Repeat the coordinates (what existing callers expect)
    Coordinates,
    /// The article's external links
    Links,
}

impl From<References> for ReferencesMode {
    fn from(r: References) -> Self {
        match r {
            References::Coordinates => ReferencesMode::Coordinates,
            References::Links => ReferencesMode::Links,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "wikibus",
    version,
    about = "Wikipedia lookups over a message bus. Reads JSON requests from stdin, one per line."
)]
struct Cli {
    /// Bus topic to serve
    #[arg(short, long, env = "WIKIBUS_TOPIC", default_value = DEFAULT_TOPIC)]
    topic: String,

    /// MediaWiki API endpoint
    #[arg(long, env = "WIKIBUS_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Reply with the error only when a request is invalid
    #[arg(long, default_value_t = false)]
    strict: bool,

    /// What to answer under "references"
    #[arg(long, value_enum, default_value_t = References::Coordinates)]
    references: References,

    /// Number of titles a geosearch returns
    #[arg(long, default_value_t = DEFAULT_GEO_RESULTS)]
    geo_results: u32,

    /// Send a single request, print its replies and exit
    #[arg(short, long)]
    run: Option<String>,

    /// Seconds a --run request may take before giving up
    #[arg(long, default_value_t = 30)]
    reply_timeout: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries responses only
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .filter_module("reqwest", log::LevelFilter::Warn)
        .init();

    let cli = Cli::parse();

    let bus = Arc::new(LocalBus::default());
    let lookup = Arc::new(WikipediaClient::new(ClientConfig {
        api_url: cli.api_url.clone(),
        ..ClientConfig::default()
    })?);
    let config = HandlerConfig {
        strict: cli.strict,
        references: cli.references.into(),
        geo_results: cli.geo_results,
    };
    let handler = Arc::new(RequestHandler::new(bus.clone(), lookup, config));

    print_banner(&BannerInfo {
        topic: &cli.topic,
        api_url: &cli.api_url,
        mode: if cli.strict { "strict" } else { "lenient" },
        references: match cli.references {
            References::Coordinates => "coordinates",
            References::Links => "links",
        },
    });

    // Single request mode
    if let Some(request) = cli.run {
        let mut monitor = bus.monitor();
        let message = BusMessage::new(cli.topic.as_str(), request);

        let replies = tokio::time::timeout(
            Duration::from_secs(cli.reply_timeout),
            stdio::run_once(handler.as_ref(), &mut monitor, message),
        )
        .await
        .map_err(|_| anyhow::anyhow!("no answer within {}s", cli.reply_timeout))?;

        for reply in &replies {
            println!("{}", reply.content);
        }
        io::stdout().flush()?;
        return Ok(());
    }

    // Subscribe before anything can be published.
    let inbox = bus.subscribe(&cli.topic).await?;
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(serve(inbox, handler, async move {
        let _ = stop_rx.await;
    }));

    let printer = {
        let monitor = bus.monitor();
        tokio::spawn(async move {
            let mut stdout = tokio::io::stdout();
            stdio::print_responses(monitor, &mut stdout).await
        })
    };

    // Feed stdin until EOF or Ctrl+C
    let reader = BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = stdio::pump(reader, bus.clone(), &cli.topic) => {
            match result {
                Ok(sent) => log::info!("stdin closed after {sent} request(s)"),
                Err(e) => log::error!("input error: {e:#}"),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            eprintln!();
            log::info!("interrupted");
        }
    }

    let _ = stop_tx.send(());
    let stats = server.await??;

    // Last handle on the bus: dropping it lets the printer drain and finish.
    drop(bus);
    printer.await??;

    print_serve_summary(&stats);
    Ok(())
}
