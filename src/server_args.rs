use std::{io::{Error, ErrorKind}, path::PathBuf, time::Duration};

use pdbcharges_web::config::ServerConfig;

/// Parse command line arguments for the server.
/// Returns `None` if the program should exit without starting the server.
pub fn parse_args() -> anyhow::Result<Option<ServerConfig>> {
    parse_args_from(std::env::args().skip(1))
}

fn missing(what: &str) -> Error {
    Error::new(ErrorKind::InvalidInput, format!("Missing argument for {what}"))
}

pub fn parse_args_from(args: impl IntoIterator<Item = String>) -> anyhow::Result<Option<ServerConfig>> {
    let args: Vec<String> = args.into_iter().collect();

    // The config file is the base, flags override it regardless of their position
    let mut config = match args.iter().position(|a| a == "-c" || a == "--config") {
        Some(idx) => {
            let Some(file) = args.get(idx + 1) else {
                return Err(missing("config file").into());
            };
            ServerConfig::load(file)?
        }
        None => ServerConfig::default(),
    };

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_ref() {
            "-c" | "--config" => {
                let _ = args.next();
            }
            "-ip" => {
                config.address = args.next().ok_or_else(|| missing("server ip address"))?;
            }
            "-p" | "--port" => {
                let Some(port) = args.next() else {
                    Err(missing("server port"))?;
                    unreachable!();
                };
                config.port = port.parse()?;
            }
            "--workers" => {
                let Some(n) = args.next() else {
                    Err(missing("number of workers"))?;
                    unreachable!();
                };
                config.workers = Some(n.parse()?);
            }
            "--cache" => {
                config.cache_dir = PathBuf::from(args.next().ok_or_else(|| missing("cache directory"))?);
            }
            "--remote" => {
                config.remote_url = args.next().ok_or_else(|| missing("remote url"))?;
            }
            "--timeout" => {
                let Some(secs) = args.next() else {
                    Err(missing("fetch timeout"))?;
                    unreachable!();
                };
                config.fetch_timeout = Duration::from_secs(secs.parse()?);
            }
            "--static" => {
                config.static_dir = Some(PathBuf::from(args.next().ok_or_else(|| missing("static directory"))?));
            }
            "--no-static" => {
                config.static_dir = None;
            }
            "--access-log" => {
                config.access_log = Some(PathBuf::from(args.next().ok_or_else(|| missing("access log file"))?));
            }
            "--rounding" => {
                let Some(rounding) = args.next() else {
                    Err(missing("charge rounding"))?;
                    unreachable!();
                };
                config.charge_rounding = rounding.parse()?;
            }
            "-h" | "--help" => {
                println!("{HELP_MSG}");
                return Ok(None);
            }
            _ => {
                Err(Error::new(
                    ErrorKind::InvalidInput,
                    format!("Unknown argument {arg}")
                ))?;
            }
        }
    }

    Ok(Some(config))
}

const HELP_MSG: &str = "
USAGE: pdbcharges-server [OPTIONS]

  OPTION          ARG       DESCRIPTION

  -c/--config     <file>    YAML file with server settings. Command line options
                            override values from the file.

  -ip             <IP>      IP address of server. Defaults to 127.0.0.1

  -p/--port       <port>    Port for the server to listen on. Defaults to 8080

  --workers       <n>       Number of HTTP workers. Defaults to the number of CPU cores.

  --cache         <dir>     Directory for downloaded results. Defaults to ./calculated_structures

  --remote        <url>     Base URL of the result store. A file:// URL reads from a local
                            mirror with the same layout. Defaults to the public PDBcharges bucket.

  --timeout       <secs>    Timeout for each remote request. Defaults to 30

  --static        <dir>     Directory served under /static. Nothing is served by default.

  --no-static               Don't serve static files, even if the config file sets a directory.

  --access-log    <file>    File to append lookups to. Defaults to {cache}/accesses.txt

  --rounding      <mode>    How total charges are shown: nearest (default) or unrounded.

  -h/--help                 Show this message and exit.
";
