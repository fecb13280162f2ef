use clap::Parser;
use shardkv::config::Config;
use shardkv::{server, Error};

const USAGE: &str = "Usage: shardkv-server <max-clients> <database-shards> <user-shards>";

#[derive(Parser, Debug)]
struct Args {
    /// Maximum number of concurrently connected clients
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    max_clients: u64,
    /// Number of shards backing the data store
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    database_shards: u64,
    /// Number of shards backing the user store
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    user_shards: u64,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Missing or non-integer arguments get a single usage line, not clap's
    // multi-line error report, and nothing is bound.
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(_) => {
            println!("{}", USAGE);
            std::process::exit(1);
        }
    };

    let config = Config::new(
        args.max_clients as usize,
        args.database_shards as usize,
        args.user_shards as usize,
    );

    server::run(config).await
}
