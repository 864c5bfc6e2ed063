use std::env;
use std::fs;

use log::warn;

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearingPolicy {
    #[serde(rename = "all")]
    All,
    #[serde(rename = "inDirection")]
    InDirection,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
pub struct NetworkConfig {
    pub peer_port: u16,
    pub snapshot_port: u16,
    pub assignment_port: u16,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
pub struct ElevatorConfig {
    pub num_floors: u8,
    pub door_open_duration: f64,
    pub clearing_policy: ClearingPolicy,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
pub struct ConfigFile {
    pub network: NetworkConfig,
    pub server: ServerConfig,
    pub elevator: ElevatorConfig,
}

impl Default for ConfigFile {
    fn default() -> Self {
        ConfigFile {
            network: NetworkConfig {
                peer_port: 19738,
                snapshot_port: 19739,
                assignment_port: 19740,
            },
            server: ServerConfig { port: 15657 },
            elevator: ElevatorConfig {
                num_floors: 4,
                door_open_duration: 3.0,
                clearing_policy: ClearingPolicy::InDirection,
            },
        }
    }
}

fn read_config_file() -> ConfigFile {
    let file_path = "config.json";
    match fs::read_to_string(file_path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(config) => config,
            Err(e) => {
                warn!("config file is malformed ({}), using default settings", e);
                ConfigFile::default()
            }
        },
        Err(_) => {
            warn!("no configuration file provided, using default settings");
            ConfigFile::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub id: String,
    pub network: NetworkConfig,
    pub server: ServerConfig,
    pub elevator: ElevatorConfig,
}

impl NodeConfig {
    pub fn get() -> Self {
        let config_file = read_config_file();
        let mut id = std::process::id().to_string();
        let mut serverport = config_file.server.port;

        let args: Vec<String> = env::args().collect();
        for arg_pair in args[1..].chunks_exact(2) {
            match arg_pair[0].as_str() {
                "--id" => id = arg_pair[1].clone(),
                "--serverport" => match arg_pair[1].parse::<u16>() {
                    Ok(port) => serverport = port,
                    Err(_) => warn!("port {} is not a number, skipping", arg_pair[1]),
                },
                other => warn!("illegal argument {}, skipping", other),
            }
        }

        NodeConfig {
            id,
            network: config_file.network,
            server: ServerConfig { port: serverport },
            elevator: config_file.elevator,
        }
    }
}
