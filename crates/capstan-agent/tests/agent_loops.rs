//! End-to-end: both loops running under one agent, from a fresh index to
//! an activated generation, driven through the consent mailbox.


use std::sync::Arc;
use std::time::Duration;

use capstan_agent::{AgentConfig, StatusRecord, UpdateAgent, UpdateStatus};
use capstan_install::InstallLayout;
use capstan_net::StaticTokenSource;
use capstan_tuf::target::sha256_hex;
use fixture::*;
use tokio_util::sync::CancellationToken;

fn read_status(layout: &InstallLayout) -> UpdateStatus {
    std::fs::read(layout.status_path())
        .ok()
        .and_then(|raw| serde_json::from_slice(&raw).ok())
        .unwrap_or_default()
}

#[tokio::test]
async fn poll_consent_apply_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("root");
    let layout = InstallLayout::new(&root, SERVICE);
    layout.ensure_directories().unwrap();
    // Trust was established on an earlier run.
    std::fs::write(layout.tmp_dir().join("root.json"), "{}").unwrap();
    std::fs::create_dir_all(tmp.path().join("links")).unwrap();

    let artifact = service_artifact("e2e");
    let artifact_url = artifact_server(artifact.clone()).await;
    let version = "v2025.03.01-sha.fade123";
    let index_body = format!(
        r#"{{"{SERVICE}":{{"version":"{version}","path":"{artifact_url}","hashes":{{"sha256":"{sha}"}}}}}}"#,
        sha = sha256_hex(&artifact),
    );
    let repo = Arc::new(MockRepo::new(
        &format!("{SERVICE}/{SERVICE}-index.json"),
        index_body.as_bytes(),
    ));

    let config = AgentConfig::new(
        &root,
        SERVICE,
        "https://repo.invalid/metadata/".parse().unwrap(),
        "https://repo.invalid/targets/".parse().unwrap(),
    )
    .with_bin_link(tmp.path().join("links/orion"))
    .with_config_link(tmp.path().join("links/orion.yml"))
    .with_poll_intervals(Duration::from_millis(50), Duration::from_millis(20));

    let controller = RecordingController::default();
    let cancel = CancellationToken::new();
    let agent = UpdateAgent::new(
        config,
        repo,
        Arc::new(StaticTokenSource::new(TOKEN)),
        Arc::new(controller.clone()),
        cancel.clone(),
    );
    let agent_task = tokio::spawn(agent.run());

    // The poller lands the fresh index and raises the flag.
    let raised = wait_for(
        || read_status(&layout).update_available == 1,
        Duration::from_secs(5),
    )
    .await;
    assert!(raised, "poller never raised update_available");
    // No consent yet: nothing applied.
    assert!(!layout.generation_dir(version).exists());

    // The operator consents.
    StatusRecord::new(layout.status_path())
        .update(|s| s.update_requested = 1)
        .await
        .unwrap();

    // The watcher applies and clears the mailbox.
    let applied = wait_for(
        || {
            layout.generation_bin(version).exists()
                && read_status(&layout) == UpdateStatus::default()
        },
        Duration::from_secs(5),
    )
    .await;
    assert!(applied, "watcher never finished the apply");

    assert_eq!(
        std::fs::read_link(tmp.path().join("links/orion")).unwrap(),
        layout.generation_bin(version)
    );
    assert!(controller
        .calls()
        .contains(&format!("restart {SERVICE}.service")));

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), agent_task)
        .await
        .expect("agent did not stop after cancellation")
        .unwrap()
        .unwrap();
}
