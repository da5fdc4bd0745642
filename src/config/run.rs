use crate::error::{ReconcileError, Result};
use crate::io::read_json_file;
use crate::reconciler::ReconcileParams;
use crate::tiling::TileMeta;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Deserialize)]
pub struct RunConfig {
    pub tiles: TileSource,
    /// Directory holding one `<tile_id>_<row>_<col>.txt` label file per patch.
    pub labels_dir: PathBuf,
    #[serde(default)]
    pub params: ReconcileParams,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Where tile metadata comes from.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum TileSource {
    Inline(Vec<TileMeta>),
    Manifest(PathBuf),
}

impl TileSource {
    pub fn load(&self) -> Result<Vec<TileMeta>> {
        match self {
            TileSource::Inline(tiles) => Ok(tiles.clone()),
            TileSource::Manifest(path) => read_json_file(path).map_err(|e| match e {
                ReconcileError::JsonFile { source, .. } => ReconcileError::Configuration(format!(
                    "failed to parse tile manifest {}: {source}",
                    path.display()
                )),
                other => other,
            }),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// GeoJSON destination. Batches spanning several CRSs write one file per
    /// CRS, suffixed with the CRS.
    pub geojson: Option<PathBuf>,
    pub report_json: Option<PathBuf>,
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Both,
}

impl OutputFormat {
    pub fn includes_text(self) -> bool {
        matches!(self, OutputFormat::Text | OutputFormat::Both)
    }

    pub fn includes_json(self) -> bool {
        matches!(self, OutputFormat::Json | OutputFormat::Both)
    }
}

/// Reads and validates a run configuration.
pub fn load_config(path: &Path) -> Result<RunConfig> {
    let contents = fs::read_to_string(path).map_err(|e| {
        ReconcileError::Configuration(format!("failed to read config {}: {e}", path.display()))
    })?;
    let config: RunConfig = serde_json::from_str(&contents).map_err(|e| {
        ReconcileError::Configuration(format!("failed to parse config {}: {e}", path.display()))
    })?;
    config.params.validate()?;
    Ok(config)
}

/// Expects exactly one argument, the config path.
pub fn parse_cli(program: &str) -> Result<RunConfig> {
    let mut args = env::args().skip(1);
    match (args.next(), args.next()) {
        (Some(path), None) if path != "-h" && path != "--help" => load_config(Path::new(&path)),
        _ => Err(ReconcileError::Configuration(format!(
            "usage: {program} <config.json>"
        ))),
    }
}
