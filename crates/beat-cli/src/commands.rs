use std::io::Write;
use std::sync::Arc;

use anyhow::Context as _;
use beat_net::Deadline;
use beat_session::{BeatConfig, Context, Lookup, TreeAnnouncer};
use beat_store::EntryKind;
use colored::Colorize;

use crate::cli::*;

pub async fn run_command(cli: Cli, command: Command) -> anyhow::Result<()> {
    let home = beat_session::home_dir()?;
    let config = BeatConfig::load(cli.config.as_deref(), &home)?;
    let announcer: TreeAnnouncer = Arc::new(|address, discovery| {
        eprintln!("{} {}", "key:".bold(), address.to_string().cyan());
        eprintln!("{} {}", "discovery:".bold(), discovery.to_string().dimmed());
    });
    let ctx = Context::new(cli.dir, home, config).with_announcer(announcer);

    match command {
        Command::Init => cmd_init(&ctx).await,
        Command::Add => cmd_add(&ctx).await,
        Command::Ls(args) => cmd_ls(&ctx, args).await,
        Command::Cat(args) => cmd_cat(&ctx, args).await,
        Command::Pin(args) => cmd_pin(&ctx, args).await,
        Command::Share(args) => cmd_share(&ctx, args).await,
    }
}

fn not_found(path: &str) {
    println!("{} {}", "not found:".yellow(), path);
}

async fn cmd_init(ctx: &Context) -> anyhow::Result<()> {
    let outcome = beat_session::init(ctx).await?;
    println!(
        "{} Initialized tree in {}",
        "✓".green().bold(),
        outcome.manifest_path.display().to_string().bold()
    );
    Ok(())
}

async fn cmd_add(ctx: &Context) -> anyhow::Result<()> {
    let outcome = beat_session::add(ctx).await?;
    for file in &outcome.files {
        println!("  {} {} ({} bytes)", "added:".green(), file.path, file.size);
    }
    println!(
        "{} {} files, version {}",
        "✓".green().bold(),
        outcome.files.len(),
        outcome.version.to_string().yellow()
    );
    Ok(())
}

async fn cmd_ls(ctx: &Context, args: PathArgs) -> anyhow::Result<()> {
    let outcome = beat_session::ls(ctx, &args.path).await?;
    match outcome.entries {
        Lookup::Found(entries) => {
            for (name, kind) in entries {
                match kind {
                    EntryKind::Directory => println!("{}", format!("{name}/").blue().bold()),
                    EntryKind::File => println!("{name}"),
                }
            }
        }
        Lookup::NotFound(path) => not_found(&path),
    }
    Ok(())
}

async fn cmd_cat(ctx: &Context, args: PathArgs) -> anyhow::Result<()> {
    let outcome = beat_session::cat(ctx, &args.path).await?;
    match outcome.content {
        Lookup::Found(bytes) => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes).context("writing to stdout")?;
            stdout.flush()?;
        }
        Lookup::NotFound(path) => not_found(&path),
    }
    Ok(())
}

async fn cmd_pin(ctx: &Context, args: PinArgs) -> anyhow::Result<()> {
    eprintln!("{}", "waiting for peers...".dimmed());
    let outcome = beat_session::pin(ctx, &args.key, Deadline::from_secs(args.timeout)).await?;
    println!(
        "{} Pinned version {} ({} blocks, {} bytes fetched)",
        "✓".green().bold(),
        outcome.report.version.to_string().yellow(),
        outcome.report.blocks_fetched,
        outcome.report.bytes_fetched
    );
    Ok(())
}

async fn cmd_share(ctx: &Context, args: ShareArgs) -> anyhow::Result<()> {
    let share = beat_session::share(ctx, args.key.as_deref(), Some(args.port)).await?;
    println!("{} Serving on {}", "✓".green().bold(), share.url().bold());
    println!("  {}", "press Ctrl-C to stop".dimmed());
    share
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await?;
    println!("{} Stopped sharing", "✓".green());
    Ok(())
}
