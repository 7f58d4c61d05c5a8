use autobench_node::{AutobenchConfig, Node, NodeBlueprint, ProvisionError, SshClient};
use clap::{Parser, Subcommand};
use cmd_lib::CmdResult;
use log::kv::{self, Key, Value, VisitSource};
use log::{error, info};
use std::io::{self, Write};
use std::path::PathBuf;
use strum::AsRefStr;

#[derive(Parser)]
#[clap(
    name = "autobench-node",
    about = "Provision database server nodes for benchmark clusters"
)]
struct Cmd {
    #[clap(short = 'c', long, value_name = "FILE", help = "Cluster config (TOML)")]
    config: PathBuf,

    #[clap(long, help = "Only work on this host from the config")]
    host: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
enum Command {
    #[clap(about = "Install dependencies and a fresh copy of the server")]
    Provision {
        #[clap(long, help = "Server package to upload, overrides the config")]
        package: Option<PathBuf>,
    },

    #[clap(about = "Partition, format and mount the attached scratch volume")]
    Partition,

    #[clap(about = "Initialize the node with its data and index paths")]
    Init,

    #[clap(about = "Stop and disable the server on client hosts")]
    Disable,

    #[clap(about = "Enable direct root SSH login")]
    LoginAsRoot,
}

/// Appends structured fields such as `host=10.0.0.1` to the log line.
struct KvWriter<'a>(&'a mut String);

impl<'kvs> VisitSource<'kvs> for KvWriter<'_> {
    fn visit_pair(&mut self, key: Key<'kvs>, value: Value<'kvs>) -> Result<(), kv::Error> {
        self.0.push_str(&format!(" {key}={value}"));
        Ok(())
    }
}

#[cmd_lib::main]
fn main() -> CmdResult {
    env_logger::Builder::new()
        .format(|buf, record| {
            let timestamp = chrono::Local::now().format("%b %d %H:%M:%S").to_string();
            let process_name = std::env::current_exe()
                .ok()
                .and_then(|path| {
                    path.file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                })
                .unwrap_or_else(|| "autobench-node".to_string());
            let pid = std::process::id();
            let mut fields = String::new();
            let _ = record.key_values().visit(&mut KvWriter(&mut fields));
            writeln!(
                buf,
                "{} {}[{}]: {} {}{}",
                timestamp,
                process_name,
                pid,
                record.level(),
                record.args(),
                fields
            )
        })
        .filter(None, log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cmd = Cmd::parse();
    let config = AutobenchConfig::from_file(&cmd.config)?;
    let nodes = config.select_nodes(cmd.host.as_deref())?;
    let node_count = nodes.len();

    for blueprint in nodes {
        if let Err(e) = run_on_node(&cmd.command, &config, blueprint) {
            if e.is_fatal() {
                error!("{}: {e}", blueprint.host);
                std::process::exit(2);
            }
            return Err(io::Error::other(format!("{}: {e}", blueprint.host)));
        }
    }

    info!("{} done on {} node(s)", cmd.command.as_ref(), node_count);
    Ok(())
}

fn run_on_node(
    command: &Command,
    config: &AutobenchConfig,
    blueprint: &NodeBlueprint,
) -> Result<(), ProvisionError> {
    let channel = SshClient::connect(&blueprint.host, &config.ssh)?;
    let node = Node::new(blueprint.clone(), channel)?.with_settle_delay(config.settle_delay());

    let result = match command {
        Command::Provision { package } => {
            let package = package
                .as_ref()
                .or(config.package.as_ref())
                .ok_or_else(|| {
                    ProvisionError::MissingPackage(
                        "none given on the command line or in the config".to_string(),
                    )
                });
            package.and_then(|package| {
                node.provision(package)?;
                node.create_data_path()?;
                node.create_index_path()
            })
        }
        Command::Partition => node.partition_attached_volume().map(|outcome| {
            info!(host = blueprint.host.as_str(); "Partition outcome: {outcome:?}");
        }),
        Command::Init => node.initialize(),
        Command::Disable => node.disable(),
        Command::LoginAsRoot => node.login_as_root(),
    };

    // Release the connection even when the command failed
    let closed = node.close();
    result?;
    closed
}
