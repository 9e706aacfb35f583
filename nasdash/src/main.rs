//! Entry point for nasdash. Parses args, resolves targets and runs the App.

use std::env;
use std::sync::Arc;

use nasdash::app::App;
use nasdash::config::{load_config, resolve_targets, save_config, validate_target};
use nasdash::fetch::HttpFetcher;
use nasdash::logging::init_logging;
use nasdash::poller::Poller;
use tracing::info;

const USAGE: &str = "[--hook URL|-H URL] [--no-hook] [--interval SECS|-i SECS] [--once] [--json] [--save] [TARGET_URL ...]";

#[derive(Debug, Default, PartialEq)]
struct ParsedArgs {
    targets: Vec<String>,
    hook: Option<String>,
    no_hook: bool,
    interval: Option<u64>,
    once: bool,
    json: bool,
    save: bool,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<ParsedArgs, String> {
    let mut it = args.into_iter();
    let prog = it.next().unwrap_or_else(|| "nasdash".into());
    let mut parsed = ParsedArgs::default();

    while let Some(arg) = it.next() {
        match arg.as_str() {
            "-h" | "--help" => return Err(format!("Usage: {prog} {USAGE}")),
            "--hook" | "-H" => parsed.hook = it.next(),
            "--no-hook" => parsed.no_hook = true,
            "--interval" | "-i" => {
                parsed.interval = Some(parse_secs(it.next().as_deref(), &prog)?);
            }
            "--once" => parsed.once = true,
            "--json" => parsed.json = true,
            "--save" => parsed.save = true,
            _ if arg.starts_with("--hook=") => {
                if let Some((_, v)) = arg.split_once('=') {
                    if !v.is_empty() {
                        parsed.hook = Some(v.to_string());
                    }
                }
            }
            _ if arg.starts_with("--interval=") => {
                parsed.interval = Some(parse_secs(arg.split_once('=').map(|(_, v)| v), &prog)?);
            }
            _ if arg.starts_with('-') => {
                return Err(format!("Unknown option {arg}. Usage: {prog} {USAGE}"));
            }
            _ => parsed.targets.push(arg),
        }
    }
    Ok(parsed)
}

fn parse_secs(v: Option<&str>, prog: &str) -> Result<u64, String> {
    match v.and_then(|s| s.parse::<u64>().ok()) {
        Some(n) if n > 0 => Ok(n),
        _ => Err(format!(
            "--interval expects a positive number of seconds. Usage: {prog} {USAGE}"
        )),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let parsed = match parse_args(env::args()) {
        Ok(v) => v,
        Err(msg) => {
            eprintln!("{msg}");
            return Ok(());
        }
    };
    init_logging();

    let mut cfg = load_config();
    for t in &parsed.targets {
        validate_target(t)?;
    }
    if parsed.save && !parsed.targets.is_empty() {
        cfg.targets = parsed.targets.clone();
        save_config(&cfg)?;
        info!(count = cfg.targets.len(), "saved target list");
    }
    if let Some(secs) = parsed.interval {
        cfg.scrape_interval_secs = secs;
    }

    let targets = resolve_targets(&parsed.targets, &cfg);
    let hook = if parsed.no_hook {
        None
    } else {
        parsed.hook.clone().or_else(|| cfg.effective_hook())
    };
    let settings = cfg.poll_settings();
    info!(targets = targets.len(), hook = ?hook, "starting nasdash");

    let fetcher = HttpFetcher::new(hook, settings.fetch_timeout)?;
    let poller = Poller::new(Arc::new(fetcher), settings);
    poller.set_targets(&targets).await;

    let mut app = App::new(poller, parsed.json);
    if parsed.once {
        app.run_once().await
    } else {
        app.run().await
    }
}
