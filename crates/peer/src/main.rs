use std::io;
use std::path::Path;
use std::process;

use clap::{value_parser, Arg, Command};
use p2p_config::{BASE_PATH, STREAM_PORT_OFFSET};
use p2p_core::entities::PeerIdentity;
use p2p_peer::bootstrap::{expand_topology, load_config, load_topology};
use p2p_peer::peer::Peer;
use p2p_peer::LOGGER;

fn create_command() -> Command {
    Command::new("p2p-peer")
        .about("Chunk-sharing peer: floods discovery queries over UDP and pulls missing chunks over TCP")
        .arg(
            Arg::new("PEER_ID")
                .help("Peer id as listed in config.txt and topologia.txt")
                .required(true)
                .value_parser(value_parser!(u32)),
        )
        .arg(
            Arg::new("FILE_NAMES")
                .help("Files to search on the network (metadata sidecar required)")
                .value_name("FILE_NAME")
                .required(true)
                .num_args(1..),
        )
}

fn main() -> io::Result<()> {
    let matches = create_command().get_matches();
    let peer_id = *matches.get_one::<u32>("PEER_ID").unwrap();
    let file_names: Vec<String> = matches
        .get_many::<String>("FILE_NAMES")
        .unwrap()
        .cloned()
        .collect();

    let root = Path::new(BASE_PATH);

    let config = load_config(root).map_err(io::Error::other)?;
    let Some((ip, control_port, rate)) = config.get(&peer_id).cloned() else {
        LOGGER.error(format!("peer {peer_id} is not present in config.txt"));
        process::exit(1);
    };

    let topology = load_topology(root).map_err(io::Error::other)?;
    if !topology.contains_key(&peer_id) {
        LOGGER.error(format!("peer {peer_id} is not present in topologia.txt"));
        process::exit(1);
    }
    let neighbors = expand_topology(&topology, &config)
        .remove(&peer_id)
        .unwrap_or_default();

    let identity = PeerIdentity {
        id: peer_id,
        stream_port: control_port + STREAM_PORT_OFFSET,
        ip,
        control_port,
        rate,
        neighbors,
    };
    LOGGER.info(format!(
        "peer {peer_id} starting at {}:{} ({} B/s, {} neighbors)",
        identity.ip,
        identity.control_port,
        identity.rate,
        identity.neighbors.len()
    ));

    let peer = Peer::bind(root, identity)?;
    peer.start(&file_names);
    Ok(())
}
