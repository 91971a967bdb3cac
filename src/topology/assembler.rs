//! Graph assembly from asset and port records.

use crate::db::{Port, TopologyAsset};
use crate::models::{DeviceType, Edge, Node, NodePort, Position};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

/// Builds nodes and edges from participating assets and their ports.
///
/// `ports` may include ports of assets outside `assets`; they are ignored.
/// A link is emitted once per unordered port pair with the lower asset id
/// first. Links to ports that are not loaded are dropped. Self links and
/// same-asset links are dropped with a warning. Coordinates are passed
/// through; a node is only placed when both are persisted.
#[must_use]
pub fn assemble(assets: &[TopologyAsset], ports: &[Port]) -> (Vec<Node>, Vec<Edge>) {
    let node_ids: HashSet<i64> = assets.iter().map(|a| a.id).collect();
    let ports: Vec<&Port> = ports
        .iter()
        .filter(|p| node_ids.contains(&p.asset_id))
        .collect();
    let by_id: HashMap<i64, &Port> = ports.iter().map(|p| (p.id, *p)).collect();

    let mut ports_by_asset: HashMap<i64, Vec<NodePort>> = HashMap::new();
    for port in &ports {
        ports_by_asset
            .entry(port.asset_id)
            .or_default()
            .push(NodePort::from(*port));
    }

    let mut nodes: Vec<Node> = assets
        .iter()
        .map(|asset| {
            let mut node_ports = ports_by_asset.remove(&asset.id).unwrap_or_default();
            node_ports.sort_by_key(|p| p.id);
            Node {
                id: asset.id,
                name: asset.name.clone(),
                category: asset.category.clone(),
                device_type: DeviceType::from_flags(asset.is_network_device, asset.is_terminal),
                status: asset.status.clone(),
                ip_address: asset.ip_address.clone(),
                ports: node_ports,
                position: match (asset.x_position, asset.y_position) {
                    (Some(x), Some(y)) => Some(Position { x, y }),
                    _ => None,
                },
            }
        })
        .collect();
    nodes.sort_by_key(|n| n.id);

    let mut edges: BTreeMap<(i64, i64), Edge> = BTreeMap::new();
    for port in &ports {
        let Some(peer_id) = port.peer_port_id else {
            continue;
        };
        let Some(peer) = by_id.get(&peer_id) else {
            debug!(port_id = port.id, peer_id, "Dropping link to a port outside the topology");
            continue;
        };
        if peer.id == port.id || peer.asset_id == port.asset_id {
            warn!(
                port_id = port.id,
                peer_id,
                asset_id = port.asset_id,
                "Dropping self or same-asset port link"
            );
            continue;
        }

        let key = (port.id.min(peer.id), port.id.max(peer.id));
        edges.entry(key).or_insert_with(|| {
            let (from, to) = if port.asset_id < peer.asset_id {
                (*port, *peer)
            } else {
                (*peer, *port)
            };
            Edge {
                from_asset_id: from.asset_id,
                to_asset_id: to.asset_id,
                from_port_id: from.id,
                from_port: from.name.clone(),
                to_port_id: to.id,
                to_port: to.name.clone(),
            }
        });
    }

    let mut edges: Vec<Edge> = edges.into_values().collect();
    edges.sort_by_key(|e| (e.from_asset_id, e.to_asset_id, e.from_port_id));

    (nodes, edges)
}
