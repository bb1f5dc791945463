use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use p2p_config::{CONFIG_FILE, TOPOLOGY_FILE};
use p2p_core::entities::PeerEndpoint;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("cannot read {file}: {source}")]
    Io {
        file: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("{file}:{line}: {reason}")]
    Malformed {
        file: &'static str,
        line: usize,
        reason: String,
    },
}

/// Peer id -> `(ip, control_port, advertised_rate)` from `config.txt`.
pub type PeerConfig = HashMap<u32, (String, u16, u32)>;
/// Peer id -> neighbor ids from `topologia.txt`.
pub type Topology = HashMap<u32, Vec<u32>>;

/// Parses `config.txt`, one peer per line:
/// `<id>: <ip>, <control_port>, <advertised_rate>`.
pub fn load_config(root: &Path) -> Result<PeerConfig, BootstrapError> {
    let text = read(root, CONFIG_FILE)?;
    let mut config = PeerConfig::new();
    for (number, line) in numbered_lines(&text) {
        let (id, rest) = split_id(line, CONFIG_FILE, number)?;
        let fields: Vec<&str> = rest.split(',').map(str::trim).collect();
        let &[ip, port, rate] = fields.as_slice() else {
            return Err(malformed(
                CONFIG_FILE,
                number,
                "expected `<ip>, <control_port>, <advertised_rate>`",
            ));
        };
        let port = port
            .parse()
            .map_err(|_| malformed(CONFIG_FILE, number, "control port is not a number"))?;
        let rate = rate
            .parse()
            .map_err(|_| malformed(CONFIG_FILE, number, "advertised rate is not a number"))?;
        config.insert(id, (ip.to_string(), port, rate));
    }
    Ok(config)
}

/// Parses `topologia.txt`, one peer per line:
/// `<id>: <neighbor_id>[, <neighbor_id>]*`.
pub fn load_topology(root: &Path) -> Result<Topology, BootstrapError> {
    let text = read(root, TOPOLOGY_FILE)?;
    let mut topology = Topology::new();
    for (number, line) in numbered_lines(&text) {
        let (id, rest) = split_id(line, TOPOLOGY_FILE, number)?;
        let mut neighbors = Vec::new();
        for token in rest.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let neighbor = token
                .parse()
                .map_err(|_| malformed(TOPOLOGY_FILE, number, "neighbor id is not a number"))?;
            neighbors.push(neighbor);
        }
        topology.insert(id, neighbors);
    }
    Ok(topology)
}

/// Resolves neighbor ids to control endpoints. Neighbor ids without a config
/// entry are skipped, matching how an incomplete config degrades elsewhere.
pub fn expand_topology(
    topology: &Topology,
    config: &PeerConfig,
) -> HashMap<u32, Vec<PeerEndpoint>> {
    let mut expanded = HashMap::new();
    for (peer_id, neighbor_ids) in topology {
        let mut neighbors = Vec::new();
        for neighbor_id in neighbor_ids {
            if let Some((ip, port, _)) = config.get(neighbor_id) {
                neighbors.push(PeerEndpoint::new(ip.clone(), *port));
            }
        }
        expanded.insert(*peer_id, neighbors);
    }
    expanded
}

fn read(root: &Path, file: &'static str) -> Result<String, BootstrapError> {
    fs::read_to_string(root.join(file)).map_err(|source| BootstrapError::Io { file, source })
}

fn numbered_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
}

fn split_id<'a>(
    line: &'a str,
    file: &'static str,
    number: usize,
) -> Result<(u32, &'a str), BootstrapError> {
    let (id, rest) = line
        .split_once(':')
        .ok_or_else(|| malformed(file, number, "missing `:` after peer id"))?;
    let id = id
        .trim()
        .parse()
        .map_err(|_| malformed(file, number, "peer id is not a number"))?;
    Ok((id, rest))
}

fn malformed(file: &'static str, line: usize, reason: &str) -> BootstrapError {
    BootstrapError::Malformed {
        file,
        line,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod unit_tests {
    use std::fs;

    use super::*;

    fn write_root(config: &str, topology: &str) -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join(CONFIG_FILE), config).unwrap();
        fs::write(root.path().join(TOPOLOGY_FILE), topology).unwrap();
        root
    }

    #[test]
    fn test_load_config_parses_every_line() {
        let root = write_root(
            "1: 127.0.0.1, 8000, 100\n2: 127.0.0.2, 8001, 50\n",
            "1: 2\n2: 1\n",
        );
        let config = load_config(root.path()).unwrap();
        assert_eq!(config[&1], (String::from("127.0.0.1"), 8000, 100));
        assert_eq!(config[&2], (String::from("127.0.0.2"), 8001, 50));
    }

    #[test]
    fn test_load_config_reports_line_numbers() {
        let root = write_root("1: 127.0.0.1, 8000, 100\n2: 127.0.0.2, 8001\n", "");
        match load_config(root.path()) {
            Err(BootstrapError::Malformed { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected a malformed-line error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_config_skips_blank_lines() {
        let root = write_root("\n1: 127.0.0.1, 8000, 100\n\n", "");
        assert_eq!(load_config(root.path()).unwrap().len(), 1);
    }

    #[test]
    fn test_load_topology_parses_neighbor_lists() {
        let root = write_root("", "1: 2, 3\n2: 1\n3:\n");
        let topology = load_topology(root.path()).unwrap();
        assert_eq!(topology[&1], vec![2, 3]);
        assert_eq!(topology[&2], vec![1]);
        assert_eq!(topology[&3], Vec::<u32>::new());
    }

    #[test]
    fn test_expand_topology_resolves_endpoints_and_skips_unknown_ids() {
        let root = write_root(
            "1: 127.0.0.1, 8000, 100\n2: 127.0.0.2, 8001, 50\n",
            "1: 2, 9\n",
        );
        let config = load_config(root.path()).unwrap();
        let topology = load_topology(root.path()).unwrap();

        let expanded = expand_topology(&topology, &config);
        assert_eq!(expanded[&1], vec![PeerEndpoint::new("127.0.0.2", 8001)]);
    }

    #[test]
    fn test_missing_files_surface_as_io_errors() {
        let root = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_config(root.path()),
            Err(BootstrapError::Io { .. })
        ));
        assert!(matches!(
            load_topology(root.path()),
            Err(BootstrapError::Io { .. })
        ));
    }
}
