use bytes::Bytes;
use clap::{Parser, Subcommand};
use registry::config::EndpointStoreType;
use registry::registry::ImportError;
use router::client::{SearchArea, TileBounds};
use router::operation::{FilePart, MultipartForm};
use router::{Client, FailoverRouter, ReqwestTransport, RouterError};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

mod config;
mod telemetry;

use config::{Config, ConfigError, LoggingConfig};

#[derive(Parser)]
#[command(name = "waypoint", version, about = "Failover client for the imagery data servers")]
struct Cli {
    /// YAML configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Keep the endpoint list in memory instead of the configured store
    #[arg(long)]
    ephemeral: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Process a snapshot band
    Process {
        #[arg(long)]
        snapshot_id: String,
        #[arg(long)]
        spectrum: String,
    },
    /// Search images within a bounding box
    Search {
        #[arg(long, allow_negative_numbers = true)]
        north: f64,
        #[arg(long, allow_negative_numbers = true)]
        south: f64,
        #[arg(long, allow_negative_numbers = true)]
        east: f64,
        #[arg(long, allow_negative_numbers = true)]
        west: f64,
    },
    /// Request an archive of the given bands
    Download {
        #[arg(long = "spectrum", required = true)]
        spectrums: Vec<String>,
    },
    /// Upload a file with optional form fields
    Upload {
        #[arg(long)]
        file: PathBuf,
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },
    /// List archives available on the servers
    Archives,
    /// Fetch an image description
    ViewImage { image_id: String },
    /// Fetch a tile of an image
    Tile {
        image_id: String,
        #[arg(long, allow_negative_numbers = true)]
        x1: f64,
        #[arg(long, allow_negative_numbers = true)]
        y1: f64,
        #[arg(long, allow_negative_numbers = true)]
        x2: f64,
        #[arg(long, allow_negative_numbers = true)]
        y2: f64,
    },
    /// Manage the endpoint registry
    #[command(subcommand)]
    Servers(ServersCommand),
}

#[derive(Subcommand)]
enum ServersCommand {
    /// Print the current endpoint list
    List,
    /// Replace the endpoint list with one read from a plaintext JSON file
    Import { path: PathBuf },
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Router(#[from] RouterError),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error("could not read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not serialize output: {0}")]
    Output(#[from] serde_json::Error),
}

fn parse_field(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got `{s}`"))
}

fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    match path {
        Some(path) => Config::from_file(path),
        None => Ok(Config::default()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if cli.ephemeral {
        config.registry.store = EndpointStoreType::Memory;
    }

    let logging = config.common.logging.as_ref();
    let _sentry = match telemetry::init_logging(logging.unwrap_or(&LoggingConfig::default())) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(metrics) = &config.common.metrics
        && let Err(e) = telemetry::init_metrics(metrics)
    {
        tracing::error!(error = %e, "Failed to initialize metrics");
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli.command, &config)) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: CliCommand, config: &Config) -> Result<String, CliError> {
    let registry = Arc::new(registry::from_config(&config.registry));
    let router = FailoverRouter::new(registry.clone(), Arc::new(ReqwestTransport::new()));
    let client = Client::new(Arc::new(router), &config.router);

    let body: Value = match command {
        CliCommand::Servers(command) => return servers(command, &registry),
        CliCommand::Process {
            snapshot_id,
            spectrum,
        } => client.process(&snapshot_id, &spectrum).await?,
        CliCommand::Search {
            north,
            south,
            east,
            west,
        } => {
            let area = SearchArea {
                north,
                south,
                east,
                west,
            };
            client.search(&area).await?
        }
        CliCommand::Download { spectrums } => client.download(&spectrums).await?,
        CliCommand::Upload { file, fields } => {
            client.upload(upload_form(&file, fields)?).await?
        }
        CliCommand::Archives => client.available_archives().await?,
        CliCommand::ViewImage { image_id } => client.view_image(&image_id).await?,
        CliCommand::Tile {
            image_id,
            x1,
            y1,
            x2,
            y2,
        } => {
            let bounds = TileBounds { x1, y1, x2, y2 };
            client.tile(&image_id, &bounds).await?
        }
    };

    Ok(serde_json::to_string_pretty(&body)?)
}

fn servers(
    command: ServersCommand,
    registry: &registry::EndpointRegistry,
) -> Result<String, CliError> {
    match command {
        ServersCommand::List => Ok(serde_json::to_string_pretty(&*registry.load())?),
        ServersCommand::Import { path } => {
            let count = registry.import_plaintext(&path)?;
            Ok(serde_json::json!({ "imported": count }).to_string())
        }
    }
}

fn upload_form(path: &Path, fields: Vec<(String, String)>) -> Result<MultipartForm, CliError> {
    let data = std::fs::read(path).map_err(|source| CliError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let form = fields
        .into_iter()
        .fold(MultipartForm::new(), |form, (key, value)| form.text(key, value));

    Ok(form.file(FilePart {
        field: "file".into(),
        filename,
        content_type: "application/octet-stream".into(),
        data: Bytes::from(data),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn cli_parses_operations() {
        let cli = Cli::try_parse_from([
            "waypoint", "--config", "w.yaml", "search", "--north", "55.5", "--south", "-10",
            "--east", "38", "--west", "37",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("w.yaml")));
        assert!(!cli.ephemeral);
        assert!(matches!(
            cli.command,
            CliCommand::Search { south, .. } if south == -10.0
        ));

        let cli = Cli::try_parse_from([
            "waypoint", "download", "--spectrum", "B04", "--spectrum", "B08",
        ])
        .unwrap();
        let CliCommand::Download { spectrums } = cli.command else {
            panic!("expected download");
        };
        assert_eq!(spectrums, ["B04", "B08"]);

        let cli = Cli::try_parse_from(["waypoint", "--ephemeral", "servers", "list"]).unwrap();
        assert!(cli.ephemeral);
        assert!(matches!(cli.command, CliCommand::Servers(ServersCommand::List)));

        assert!(Cli::try_parse_from(["waypoint", "download"]).is_err());
        assert!(Cli::try_parse_from(["waypoint", "upload", "--file", "x", "--field", "novalue"]).is_err());
    }

    #[test]
    fn cli_parses_negative_tile_window() {
        let cli = Cli::try_parse_from([
            "waypoint", "tile", "img", "--x1", "-256", "--y1", "-0.5", "--x2", "0", "--y2", "128",
        ])
        .unwrap();

        let CliCommand::Tile {
            image_id, x1, y1, x2, y2,
        } = cli.command
        else {
            panic!("expected tile");
        };
        assert_eq!(image_id, "img");
        assert_eq!((x1, y1, x2, y2), (-256.0, -0.5, 0.0, 128.0));
    }

    #[test]
    fn parse_field_splits_on_first_equals() {
        assert_eq!(
            parse_field("note=a=b"),
            Ok(("note".to_string(), "a=b".to_string()))
        );
        assert!(parse_field("missing").is_err());
    }

    #[test]
    fn upload_form_from_file() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"pixels").unwrap();

        let form = upload_form(
            tmp.path(),
            vec![("snapshot_id".to_string(), "S2A_1".to_string())],
        )
        .unwrap();

        assert_eq!(form.fields, [("snapshot_id".to_string(), "S2A_1".to_string())]);
        assert_eq!(form.files.len(), 1);
        assert_eq!(form.files[0].field, "file");
        assert_eq!(form.files[0].data.as_ref(), b"pixels");
        assert_eq!(
            form.files[0].filename,
            tmp.path().file_name().unwrap().to_string_lossy()
        );
    }

    #[test]
    fn upload_form_missing_file() {
        assert!(matches!(
            upload_form(Path::new("/nonexistent/B04.jp2"), vec![]),
            Err(CliError::ReadFile { .. })
        ));
    }

    #[tokio::test]
    async fn servers_import_then_list() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("servers.json");
        std::fs::write(
            &list,
            r#"[{"url": "http://b:1", "priority": 2}, {"url": "http://a:1", "priority": 1}]"#,
        )
        .unwrap();

        let yaml = format!(
            "registry:\n  store:\n    type: filesystem\n    base_dir: {}\n",
            dir.path().display()
        );
        let config: Config = serde_yaml::from_str(&yaml).unwrap();

        let output = run(
            CliCommand::Servers(ServersCommand::Import { path: list }),
            &config,
        )
        .await
        .unwrap();
        assert_eq!(output, r#"{"imported":2}"#);

        // A fresh registry reads the encrypted blob back
        let output = run(CliCommand::Servers(ServersCommand::List), &config)
            .await
            .unwrap();
        let listed: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(listed[0]["url"], "http://a:1");
        assert_eq!(listed[1]["url"], "http://b:1");
    }
}
