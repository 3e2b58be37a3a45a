use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use tacmap_protocol::Coordinate;

use crate::map::{MapConfig, TileProvider, DEFAULT_ZOOM};

pub const DEFAULT_PORT: u16 = 39333;

#[derive(Debug, Clone, Parser)]
#[command(name = "tacmap-server", version, about = "Local tactical map server")]
pub struct Cli {
    /// Address to listen on.
    #[arg(long, env = "TACMAP_ADDR", default_value_t = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT))]
    pub addr: SocketAddr,
    /// SQLite database file. Defaults to ~/.tacmap/tacmap.db.
    #[arg(long = "db", env = "TACMAP_DB", value_name = "PATH")]
    pub db_path: Option<PathBuf>,
    #[arg(long, env = "TACMAP_MAP_CENTER_LAT", requires = "map_center_lng", allow_hyphen_values = true)]
    pub map_center_lat: Option<f64>,
    #[arg(long, env = "TACMAP_MAP_CENTER_LNG", requires = "map_center_lat", allow_hyphen_values = true)]
    pub map_center_lng: Option<f64>,
    #[arg(long, env = "TACMAP_MAP_ZOOM", default_value_t = DEFAULT_ZOOM,
          value_parser = clap::value_parser!(u8).range(0..=19))]
    pub map_zoom: u8,
    /// Keyed tile template, e.g. `https://tiles.example/{z}/{x}/{y}.png?key={key}`.
    /// OpenStreetMap tiles are used when unset.
    #[arg(long, env = "TACMAP_TILE_URL", value_name = "TEMPLATE")]
    pub tile_url: Option<String>,
    #[arg(long, env = "TACMAP_MAP_KEY", hide_env_values = true)]
    pub map_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub map: MapConfig,
}

pub fn default_db_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tacmap")
        .join("tacmap.db")
}

impl Cli {
    pub fn into_config(self) -> ServerConfig {
        let center = match (self.map_center_lat, self.map_center_lng) {
            (Some(lat), Some(lng)) => Some(Coordinate::new(lat, lng)),
            _ => None,
        };
        let provider = match self.tile_url {
            Some(url_template) => TileProvider::Keyed {
                url_template,
                api_key: self.map_key,
            },
            None => TileProvider::OpenStreetMap,
        };
        ServerConfig {
            addr: self.addr,
            db_path: self.db_path.unwrap_or_else(default_db_path),
            map: MapConfig {
                center,
                zoom: self.map_zoom,
                provider,
            },
        }
    }
}
