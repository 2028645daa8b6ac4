use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use log::{error, info};
use pretty_bytes::converter::convert;

use tftp_stream::tftp::client;
use tftp_stream::tftp::SessionConfig;

/// Fetch or store a single file on a TFTP server.
#[derive(Parser, Debug)]
#[command(version = "1.0", author = "shakram02")]
struct Opts {
    /// UDP port the server accepts requests on.
    #[arg(short = 'p', long = "port", default_value_t = 69, global = true)]
    port: u16,
    /// Milliseconds to wait for each reply.
    #[arg(short = 't', long = "timeout", default_value_t = 5000, global = true)]
    timeout: u64,
    /// Attempts per block before giving up.
    #[arg(
        short = 'r',
        long = "retries",
        default_value_t = 3,
        global = true,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    retries: u32,
    #[command(subcommand)]
    subcmd: SubCommand,
}

#[derive(Subcommand, Debug)]
enum SubCommand {
    /// download a file from the server.
    Get(TransferArgs),
    /// upload a file to the server.
    Put(TransferArgs),
}

#[derive(Args, Debug)]
struct TransferArgs {
    /// Server host name or IP address.
    host: String,
    /// File to transfer, used as both the local and the remote name.
    file: String,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts: Opts = Opts::parse();
    // Transfer failures are reported, not turned into an exit status.
    if let Err(e) = run(opts) {
        error!("{:#}", e);
    }
}

fn run(opts: Opts) -> anyhow::Result<()> {
    let config = SessionConfig::default()
        .with_port(opts.port)
        .with_timeout(Duration::from_millis(opts.timeout))
        .with_retries(opts.retries);

    match opts.subcmd {
        SubCommand::Get(args) => {
            info!("[DOWNLOAD] FILE: ({}) SERVER: {}:{}", args.file, args.host, config.port);
            let bytes = client::get(&args.host, &args.file, Path::new(&args.file), config)
                .with_context(|| format!("Download of {} from {} failed", args.file, args.host))?;
            println!("Read {}", convert(bytes as f64));
        }
        SubCommand::Put(args) => {
            info!("[UPLOAD] FILE: ({}) TO SERVER: {}:{}", args.file, args.host, config.port);
            let bytes = client::put(&args.host, Path::new(&args.file), &args.file, config)
                .with_context(|| format!("Upload of {} to {} failed", args.file, args.host))?;
            println!("Wrote {}", convert(bytes as f64));
        }
    };

    Ok(())
}
