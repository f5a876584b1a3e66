use std::time::Duration;

use serde_json::json;

use super::*;
use crate::fake_wallet::{FakeWallet, DEPLOYED_ADDRESS};

fn artifact(bytecode: &str) -> ContractArtifact {
    ContractArtifact {
        contract_name: "BigBrotherVoting".to_string(),
        abi: vec![
            json!({ "type": "function", "name": "getContestants", "inputs": [] }),
            json!({
                "type": "function",
                "name": "likeContestant",
                "inputs": [{ "name": "_contestantId", "type": "uint256" }]
            }),
        ],
        bytecode: bytecode.to_string(),
    }
}

fn fast_policy() -> ConfirmationPolicy {
    ConfirmationPolicy {
        poll_interval: Duration::from_millis(1),
        timeout: None,
    }
}

#[tokio::test]
async fn deploys_bytecode_from_first_account_and_returns_address() {
    let wallet = FakeWallet::new()
        .with_authorized(&["0xdeployer", "0xother"])
        .into_arc();
    let factory = ContractFactory::new(artifact("0x6080604052"), wallet.clone());

    let deployed = factory.deploy(fast_policy()).await.expect("deploy");

    assert_eq!(deployed.name, "BigBrotherVoting");
    assert_eq!(
        deployed.address,
        Address::from_str(DEPLOYED_ADDRESS).expect("address")
    );
    assert_eq!(
        wallet.deployments(),
        vec![("0xdeployer".to_string(), "0x6080604052".to_string())]
    );
}

#[tokio::test]
async fn deploy_without_accounts_fails() {
    let wallet = FakeWallet::new().into_arc();
    let factory = ContractFactory::new(artifact("0x6080"), wallet);

    let err = factory.deploy(fast_policy()).await.expect_err("no account");
    assert!(matches!(err, DeployError::NoDeployer));
}

#[tokio::test]
async fn empty_bytecode_is_rejected_before_sending() {
    let wallet = FakeWallet::new().with_authorized(&["0xdeployer"]).into_arc();
    let factory = ContractFactory::new(artifact("0x"), wallet.clone());

    let err = factory.deploy(fast_policy()).await.expect_err("empty");
    assert!(matches!(err, DeployError::EmptyBytecode(_)));
    assert!(wallet.methods().is_empty());
}

#[test]
fn loads_hardhat_artifact_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("BigBrotherVoting.json");
    fs::write(
        &path,
        json!({
            "_format": "hh-sol-artifact-1",
            "contractName": "BigBrotherVoting",
            "sourceName": "contracts/BigBrotherVoting.sol",
            "abi": [{ "type": "function", "name": "getContestants", "inputs": [] }],
            "bytecode": "0x6080",
            "deployedBytecode": "0x6080",
            "linkReferences": {},
            "deployedLinkReferences": {}
        })
        .to_string(),
    )
    .expect("write");

    let artifact = ContractArtifact::load(&path).expect("load");

    assert_eq!(artifact.contract_name, "BigBrotherVoting");
    assert_eq!(artifact.bytecode().expect("code"), vec![0x60, 0x80]);
    assert_eq!(
        artifact.missing_functions(&ContractInterface::big_brother_voting()),
        vec!["likeContestant(uint256)".to_string()]
    );
}

#[test]
fn missing_artifact_reports_path() {
    let err = ContractArtifact::load(Path::new("/nonexistent/BigBrotherVoting.json"))
        .expect_err("missing");
    assert!(err.to_string().contains("/nonexistent/BigBrotherVoting.json"));
}
