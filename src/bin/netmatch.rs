//! netmatch: CLI for parsing, normalizing and matching IP networks.

use clap::{Parser, Subcommand};
use netmatch::{ops, NetworkGroups, Registry, Value};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "netmatch")]
#[command(author = "Kaitu.io")]
#[command(version = "0.1.0")]
#[command(about = "Parse, normalize and match IP addresses and CIDR networks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the address family (ipv4 or ipv6)
    Type {
        /// Address or network
        ip: String,
    },

    /// Print the canonical form
    Normalize {
        /// Address or network
        ip: String,
    },

    /// Print 1 if the text is a valid address or network, 0 otherwise
    Valid {
        /// Text to check
        ip: String,
    },

    /// Print 1 if both values have the same family, prefix and address
    Eq {
        /// First address or network
        a: String,
        /// Second address or network
        b: String,
    },

    /// Print 1 if the address lies in any of the networks
    Contained {
        /// Address to test
        #[arg(short, long)]
        ip: String,

        /// Networks to search
        #[arg(required = true)]
        networks: Vec<String>,
    },

    /// Print the groups whose networks contain the address
    Lookup {
        /// YAML file mapping group names to networks
        #[arg(short, long)]
        groups: PathBuf,

        /// Address to look up
        ip: String,

        /// Print the result as a JSON array
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let registry = Registry::new();

    let code = match run(&registry, cli.command) {
        Ok(output) => {
            println!("{}", output);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    let released = registry.release_all();
    log::debug!("released {} cached values at exit", released);
    std::process::exit(code);
}

fn flag(b: bool) -> String {
    if b { "1" } else { "0" }.to_string()
}

fn run(registry: &Registry, command: Commands) -> Result<String, Box<dyn std::error::Error>> {
    let value = |text: &str| Value::from_text(registry, text);

    let output = match command {
        Commands::Type { ip } => ops::family_of(&value(&ip))?.to_string(),
        Commands::Normalize { ip } => ops::normalize(&value(&ip))?.text().to_string(),
        Commands::Valid { ip } => flag(ops::is_valid(&value(&ip))),
        Commands::Eq { a, b } => flag(ops::equal(&value(&a), &value(&b))?),
        Commands::Contained { ip, networks } => {
            let networks = Value::list(registry, &networks);
            flag(ops::contained(&networks, &value(&ip))?)
        }
        Commands::Lookup { groups, ip, json } => {
            let groups = NetworkGroups::load(registry, &groups)?;
            let matched = groups.lookup(&value(&ip))?;
            log::debug!("{} of {} groups matched {}", matched.len(), groups.len(), ip);
            if json {
                serde_json::to_string(&matched)?
            } else {
                matched.join(" ")
            }
        }
    };

    Ok(output)
}
