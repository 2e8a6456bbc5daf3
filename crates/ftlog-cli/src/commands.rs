use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use colored::Colorize;
use ftlog_core::{chain_files, LogMgr, LogMgrConfig, RotationMeta};
use ftlog_crypto::{ChunkChainVerifier, ContentHasher};
use ftlog_types::{LogEntry, NodeId, Timestamp};
use tracing::debug;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = cli.config.as_deref();
    match cli.command {
        Command::Append(args) => cmd_append(config, args),
        Command::Rotate(args) => cmd_rotate(config, cli.format, args),
        Command::Verify(args) => cmd_verify(config, cli.format, args),
        Command::Key(args) => cmd_key(args),
        Command::Utc(args) => cmd_utc(args),
    }
}

fn load_config(path: Option<&Path>, dir: Option<PathBuf>) -> anyhow::Result<LogMgrConfig> {
    let mut config = match path {
        Some(path) => LogMgrConfig::load(path)?,
        None => LogMgrConfig::default(),
    };
    if let Some(dir) = dir {
        config.log_dir = dir;
    }
    Ok(config)
}

fn cmd_append(config: Option<&Path>, args: AppendArgs) -> anyhow::Result<()> {
    let mgr = LogMgr::with_config(load_config(config, args.target.dir)?)?;
    let log = mgr.open(&args.target.name)?;
    debug!(log = %log.log_file_name().display(), count = args.messages.len(), "appending");
    for message in &args.messages {
        print!("{}", log.log(message)?);
    }
    mgr.shutdown()?;
    Ok(())
}

fn cmd_rotate(config: Option<&Path>, format: OutputFormat, args: RotateArgs) -> anyhow::Result<()> {
    let meta = RotationMeta {
        owner: NodeId::from_hex(&args.owner).context("--owner")?,
        src: NodeId::from_hex(&args.src).context("--src")?,
    };
    let mgr = LogMgr::with_config(load_config(config, args.target.dir)?)?;
    let header = mgr.open(&args.target.name)?.rotate(meta)?;
    mgr.shutdown()?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&header)?),
        OutputFormat::Text => {
            println!("{} Sealed {}", "✓".green().bold(), header.path().yellow());
            print_entry(&header);
        }
    }
    Ok(())
}

fn cmd_verify(config: Option<&Path>, format: OutputFormat, args: VerifyArgs) -> anyhow::Result<()> {
    let files = match &args.name {
        Some(name) => {
            let dir = load_config(config, args.dir.clone())?.log_dir;
            chain_files(&dir, name).with_context(|| format!("listing {}", dir.display()))?
        }
        None => args.chunks.clone(),
    };
    anyhow::ensure!(!files.is_empty(), "no chunks to verify");
    debug!(chunks = files.len(), "verifying chain");

    let chunks = files
        .iter()
        .map(|f| fs::read(f).with_context(|| format!("reading {}", f.display())))
        .collect::<anyhow::Result<Vec<_>>>()?;
    ChunkChainVerifier::verify_chain(&chunks)?;

    let headers = chunks
        .windows(2)
        .map(|pair| ChunkChainVerifier::verify_link(&pair[0], &pair[1]))
        .collect::<Result<Vec<_>, _>>()?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&headers)?),
        OutputFormat::Text => {
            for (file, header) in files.iter().skip(1).zip(&headers) {
                println!("  {} {} -> {}", "link".cyan(), header.path(), file.display());
            }
            println!(
                "{} Chain of {} chunk(s) verified",
                "✓".green().bold(),
                files.len()
            );
        }
    }
    Ok(())
}

fn cmd_key(args: KeyArgs) -> anyhow::Result<()> {
    let data = fs::read(&args.file).with_context(|| format!("reading {}", args.file.display()))?;
    let hasher = if args.short {
        ContentHasher::SHORT
    } else {
        ContentHasher::FULL
    };
    println!("{}", hasher.hash(&data));
    Ok(())
}

fn cmd_utc(args: UtcArgs) -> anyhow::Result<()> {
    match args.parse {
        Some(text) => println!("{}", Timestamp::parse_utc(&text)?.as_secs()),
        None => {
            let at = args.secs.map(Timestamp::from_secs).unwrap_or_else(Timestamp::now);
            println!("{}", at.to_utc_string());
        }
    }
    Ok(())
}

fn print_entry(entry: &LogEntry) {
    println!("  Time:   {}", entry.timestamp().to_utc_string());
    println!("  Key:    {}", entry.key().to_hex().cyan());
    println!("  Length: {}", entry.length());
    println!("  Owner:  {}", entry.owner().short_id());
    println!("  Source: {}", entry.src().short_id());
}
