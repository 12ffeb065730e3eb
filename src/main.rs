use std::path::PathBuf;

use anyhow::Context;
use clap::{value_parser, Arg, ArgMatches, Command};
use tracing::info;
use tracing_subscriber::prelude::*;

use c9::storage::Region;
use c9::{create_buckets, run_buckets, Config, ManagerNode};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "c9=info,manager=info,registry=info,storage=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let matches = cli().get_matches();
    let config = load_config(&matches)?;

    match matches.subcommand() {
        Some(("manager", _)) => {
            info!("Starting c9 manager in region {}", config.manager_region);
            let node = ManagerNode::new(&config).await?;
            node.start().await?;
        }
        Some(("buckets", args)) => {
            let count = args
                .get_one::<usize>("count")
                .copied()
                .unwrap_or(config.bucket_count);
            let start_port = args
                .get_one::<u16>("start-port")
                .copied()
                .unwrap_or(config.bucket_start_port);
            let region = args.get_one::<Region>("region").copied();

            info!("Starting {} bucket(s) from port {}", count, start_port);
            let buckets = create_buckets(&config, count, start_port, region).await?;
            run_buckets(buckets).await?;
        }
        Some(("upload", args)) => {
            let path = required::<PathBuf>(args, "path")?;
            let filename = required::<String>(args, "filename")?;
            let result = c9::manager::client::upload(
                &config.host,
                config.manager_port,
                path,
                filename,
                network_timeout(&config),
            )
            .await
            .with_context(|| format!("uploading {}", path.display()))?;
            println!("{}", result);
        }
        Some(("download", args)) => {
            let filename = required::<String>(args, "filename")?;
            let output = args
                .get_one::<PathBuf>("output")
                .cloned()
                .unwrap_or_else(|| PathBuf::from(filename));
            let result = c9::manager::client::download(
                &config.host,
                config.manager_port,
                filename,
                &output,
                network_timeout(&config),
            )
            .await
            .with_context(|| format!("downloading {}", filename))?;
            println!("{}", result);
        }
        _ => anyhow::bail!("no command given, see --help"),
    }

    Ok(())
}

fn cli() -> Command {
    Command::new("c9")
        .version("0.1.0")
        .about("Minimal distributed object store")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("JSON configuration file"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .global(true)
                .help("Host to bind to, or of the manager when running client commands"),
        )
        .subcommand(Command::new("manager").about("Run the registry and the manager"))
        .subcommand(
            Command::new("buckets")
                .about("Run storage buckets until ctrl-c")
                .arg(
                    Arg::new("count")
                        .long("count")
                        .value_parser(value_parser!(usize))
                        .help("Number of buckets"),
                )
                .arg(
                    Arg::new("start-port")
                        .long("start-port")
                        .value_parser(value_parser!(u16))
                        .help("Port of the first bucket"),
                )
                .arg(
                    Arg::new("region")
                        .long("region")
                        .value_parser(|s: &str| s.parse::<Region>())
                        .help("Region of every bucket (random otherwise)"),
                ),
        )
        .subcommand(
            Command::new("upload")
                .about("Upload a file to the c9 cloud")
                .arg(
                    Arg::new("path")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(Arg::new("filename").required(true)),
        )
        .subcommand(
            Command::new("download")
                .about("Download a file from the c9 cloud")
                .arg(Arg::new("filename").required(true))
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .value_parser(value_parser!(PathBuf))
                        .help("Where to write the file (defaults to its name)"),
                ),
        )
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<Config> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(host) = matches.get_one::<String>("host") {
        config.host = host.clone();
        config.validate()?;
    }
    Ok(config)
}

fn required<'a, T>(args: &'a ArgMatches, name: &str) -> anyhow::Result<&'a T>
where
    T: Clone + Send + Sync + 'static,
{
    args.get_one::<T>(name)
        .with_context(|| format!("missing argument <{}>", name))
}

fn network_timeout(config: &Config) -> std::time::Duration {
    c9::network::Config::from(config).io_timeout()
}
