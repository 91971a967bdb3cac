//! Inventory and topology tests.

use itops_client::{
    AssetStatus, ChangeStatusRequest, ConnectPortsRequest, CreateAssetRequest, CreatePortRequest,
    PositionUpdate, UpdatePortRequest,
};
use itops_tests::{admin_client, unique_code};

#[tokio::test]
#[ignore = "requires a running server"]
async fn test_link_two_devices_and_save_positions() {
    let client = admin_client().await.expect("Failed to log in");

    let categories = client
        .list_categories(true)
        .await
        .expect("Failed to list categories");
    let switch = categories
        .iter()
        .find(|c| c.code == "SWITCH")
        .expect("SWITCH category missing");
    let router = categories
        .iter()
        .find(|c| c.code == "ROUTER")
        .expect("ROUTER category missing");

    let mut asset_ids = Vec::new();
    for (prefix, category_id) in [("SW", switch.id), ("RT", router.id)] {
        let code = unique_code(prefix);
        let asset = client
            .create_asset(&CreateAssetRequest {
                asset_code: code.clone(),
                name: code,
                category_id,
                ..Default::default()
            })
            .await
            .expect("Failed to create asset");
        asset_ids.push(asset.id);
    }

    let mut port_ids = Vec::new();
    for asset_id in &asset_ids {
        let port = client
            .create_port(
                *asset_id,
                &CreatePortRequest {
                    name: "uplink".to_string(),
                    ..Default::default()
                },
            )
            .await
            .expect("Failed to create port");
        port_ids.push(port.id);
    }

    let linked = client
        .connect_ports(&ConnectPortsRequest {
            port_id: port_ids[0],
            peer_port_id: port_ids[1],
            cable_type: Some("fiber".to_string()),
        })
        .await
        .expect("Failed to connect ports");
    assert_eq!(linked.port.peer_port_id, Some(port_ids[1]));
    assert_eq!(linked.peer.peer_port_id, Some(port_ids[0]));

    let topology = client.get_topology().await.expect("Failed to get topology");
    assert!(topology.edges.iter().any(|e| {
        e.from_asset_id == asset_ids[0] && e.to_asset_id == asset_ids[1]
    }));

    let result = client
        .save_positions(vec![
            PositionUpdate {
                id: asset_ids[0],
                x: 120.0,
                y: 80.0,
            },
            PositionUpdate {
                id: i64::MAX,
                x: 0.0,
                y: 0.0,
            },
        ])
        .await
        .expect("Failed to save positions");
    assert_eq!(result.succeeded, vec![asset_ids[0]]);
    assert_eq!(result.failed[0].reason, "not found");

    // Clean up
    for asset_id in asset_ids {
        client
            .delete_asset(asset_id)
            .await
            .expect("Failed to delete asset");
    }
}

#[tokio::test]
#[ignore = "requires a running server"]
async fn test_topology_config() {
    let client = admin_client().await.expect("Failed to log in");

    let config = client
        .get_topology_config()
        .await
        .expect("Failed to get config");
    assert!(config.node_size > 0);
}

#[tokio::test]
#[ignore = "requires a running server"]
async fn test_search_and_edit_device() {
    let client = admin_client().await.expect("Failed to log in");

    let switch = client
        .list_categories(true)
        .await
        .expect("Failed to list categories")
        .into_iter()
        .find(|c| c.code == "SWITCH")
        .expect("SWITCH category missing");
    let code = unique_code("SRCH");
    let asset = client
        .create_asset(&CreateAssetRequest {
            asset_code: code.clone(),
            name: code.clone(),
            category_id: switch.id,
            ..Default::default()
        })
        .await
        .expect("Failed to create asset");

    let found = client
        .search_devices(&code)
        .await
        .expect("Failed to search devices");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, asset.id);

    let port = client
        .create_port(
            asset.id,
            &CreatePortRequest {
                name: "Gi0/1".to_string(),
                ..Default::default()
            },
        )
        .await
        .expect("Failed to create port");
    let port = client
        .update_port(
            port.id,
            &UpdatePortRequest {
                vlan_id: Some(42),
                ..Default::default()
            },
        )
        .await
        .expect("Failed to update port");
    assert_eq!(port.vlan_id, Some(42));

    let asset = client
        .change_asset_status(
            asset.id,
            &ChangeStatusRequest {
                status: AssetStatus::Maintenance,
                remark: Some("e2e".to_string()),
            },
        )
        .await
        .expect("Failed to change status");
    assert_eq!(asset.status, AssetStatus::Maintenance);

    client
        .delete_asset(asset.id)
        .await
        .expect("Failed to delete asset");
}
