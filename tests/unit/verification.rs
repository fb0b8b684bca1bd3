use std::time::Duration;
use pretty_assertions::assert_eq;

use crossvault_protocol::chain::Chain;
use crossvault_protocol::proof::ProofBackend;
use crossvault_protocol::rpc::{ChainClientError, EntityKind};
use crossvault_protocol::verification::{ChainVerificationStatus, VerificationOptions, MAX_ENTITY_ID_LEN};
use crossvault_protocol::Error;

use crate::common::{Harness, T0};

const VAULT: &str = "vault-42";

#[test_log::test(tokio::test)]
async fn consistent_vault_verifies_everywhere() {
    let harness = Harness::new();
    harness.seed_vault(VAULT, "0xabc", &Chain::ALL);

    let result = harness
        .service
        .verification()
        .verify_across_chains(VAULT, Chain::Eth, &[Chain::Sol, Chain::Ton, Chain::Btc], &VerificationOptions::default())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.verified_on, vec![Chain::Sol, Chain::Ton, Chain::Btc]);
    assert!(result.pending_on.is_empty());
    assert!(result.failed_on.is_empty());
    assert_eq!(result.consistency_score, 100);
    assert!(result.inconsistencies.is_empty());
    assert!(result.proofs.is_none());
    assert_eq!(result.executed_at, T0);
}

#[tokio::test]
async fn hash_mismatch_fails_the_chain() {
    let harness = Harness::new();
    harness.seed_vault(VAULT, "0xabc", &[Chain::Eth, Chain::Sol]);
    harness.seed_vault(VAULT, "0xdef", &[Chain::Ton]);

    let result = harness
        .service
        .verification()
        .verify_across_chains(VAULT, Chain::Eth, &[Chain::Sol, Chain::Ton], &VerificationOptions::default())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.verified_on, vec![Chain::Sol]);
    assert_eq!(result.failed_on, vec![Chain::Ton]);
    assert_eq!(result.consistency_score, 50);
    assert_eq!(result.inconsistencies.len(), 1);
    assert_eq!(result.inconsistencies[0].chain, Chain::Ton);
    assert_eq!(result.inconsistencies[0].expected_hash, "0xabc");
    assert_eq!(result.inconsistencies[0].observed_hash, "0xdef");
}

#[tokio::test]
async fn every_target_lands_in_exactly_one_set() {
    let harness = Harness::new();
    harness.seed_vault(VAULT, "0xabc", &[Chain::Eth, Chain::Sol, Chain::Btc]);
    harness.fake(Chain::Btc).set_delay(Duration::from_millis(600));

    let targets = [Chain::Sol, Chain::Ton, Chain::Btc, Chain::Polygon];
    let result = harness
        .service
        .verification()
        .verify_across_chains(VAULT, Chain::Eth, &targets, &VerificationOptions::default())
        .await
        .unwrap();

    assert_eq!(result.verified_on, vec![Chain::Sol]);
    assert_eq!(result.pending_on, vec![Chain::Btc]);
    assert_eq!(result.failed_on, vec![Chain::Ton, Chain::Polygon]);
    assert_eq!(result.chain_results.len(), targets.len());
    for chain in targets {
        let memberships = [&result.verified_on, &result.pending_on, &result.failed_on]
            .iter()
            .filter(|set| set.contains(&chain))
            .count();
        assert_eq!(memberships, 1, "{}", chain);
    }
    assert_eq!(result.consistency_score, 25);
}

#[tokio::test]
async fn require_all_chains_needs_every_target() {
    let harness = Harness::new();
    harness.seed_vault(VAULT, "0xabc", &[Chain::Eth, Chain::Sol]);
    let options = VerificationOptions {
        require_all_chains: true,
        ..VerificationOptions::default()
    };

    let result = harness
        .service
        .verification()
        .verify_across_chains(VAULT, Chain::Eth, &[Chain::Sol, Chain::Ton], &options)
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.verified_on, vec![Chain::Sol]);
}

#[tokio::test]
async fn nothing_verified_is_not_success() {
    let harness = Harness::new();
    let result = harness
        .service
        .verification()
        .verify_across_chains(VAULT, Chain::Eth, &[Chain::Sol], &VerificationOptions::default())
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.consistency_score, 0);
    assert_eq!(result.failed_on, vec![Chain::Sol]);
    assert!(result.chain_results[&Chain::Sol].error.as_deref().unwrap().contains("not found"));
}

#[tokio::test]
async fn unconfirmed_transaction_is_pending() {
    let harness = Harness::new();
    let sol = harness.fake(Chain::Sol);
    sol.insert_entity(EntityKind::Transaction, "tx-9", "0x01");
    sol.set_confirmations("tx-9", 10);
    let options = VerificationOptions {
        entity_kind: EntityKind::Transaction,
        ..VerificationOptions::default()
    };

    let result = harness
        .service
        .verification()
        .verify_across_chains("tx-9", Chain::Eth, &[Chain::Sol], &options)
        .await
        .unwrap();

    assert_eq!(result.pending_on, vec![Chain::Sol]);
    let sol_result = &result.chain_results[&Chain::Sol];
    assert_eq!(sol_result.status, ChainVerificationStatus::Pending);
    assert_eq!(sol_result.confirmations, 10);
    assert_eq!(sol_result.required_confirmations, 32);
}

#[tokio::test]
async fn per_chain_confirmation_override_applies() {
    let harness = Harness::new();
    let sol = harness.fake(Chain::Sol);
    sol.insert_entity(EntityKind::Transaction, "tx-9", "0x01");
    sol.set_confirmations("tx-9", 10);
    let mut options = VerificationOptions {
        entity_kind: EntityKind::Transaction,
        ..VerificationOptions::default()
    };
    options.required_confirmations.insert(Chain::Sol, 8);

    let result = harness
        .service
        .verification()
        .verify_across_chains("tx-9", Chain::Eth, &[Chain::Sol], &options)
        .await
        .unwrap();
    assert_eq!(result.verified_on, vec![Chain::Sol]);
}

#[tokio::test]
async fn per_request_timeout_overrides_default() {
    let harness = Harness::new();
    harness.seed_vault(VAULT, "0xabc", &[Chain::Eth, Chain::Sol]);
    harness.fake(Chain::Sol).set_delay(Duration::from_millis(80));
    let options = VerificationOptions {
        timeout: Some(Duration::from_millis(20)),
        ..VerificationOptions::default()
    };

    let result = harness
        .service
        .verification()
        .verify_across_chains(VAULT, Chain::Eth, &[Chain::Sol], &options)
        .await
        .unwrap();
    assert_eq!(result.pending_on, vec![Chain::Sol]);
}

#[tokio::test]
async fn permanent_chain_error_fails_the_chain() {
    let harness = Harness::new();
    harness.seed_vault(VAULT, "0xabc", &[Chain::Eth, Chain::Sol]);
    harness.fake(Chain::Sol).fail_next(ChainClientError::Unauthorized("api key".into()));

    let result = harness
        .service
        .verification()
        .verify_across_chains(VAULT, Chain::Eth, &[Chain::Sol], &VerificationOptions::default())
        .await
        .unwrap();
    assert_eq!(result.failed_on, vec![Chain::Sol]);
}

#[tokio::test]
async fn unreadable_source_skips_hash_comparison() {
    let harness = Harness::new();
    harness.seed_vault(VAULT, "0xabc", &[Chain::Sol]);
    harness.seed_vault(VAULT, "0xdef", &[Chain::Ton]);

    let result = harness
        .service
        .verification()
        .verify_across_chains(VAULT, Chain::Eth, &[Chain::Sol, Chain::Ton], &VerificationOptions::default())
        .await
        .unwrap();
    assert_eq!(result.verified_on, vec![Chain::Sol, Chain::Ton]);
    assert!(result.inconsistencies.is_empty());
}

#[tokio::test]
async fn duplicate_targets_are_verified_once() {
    let harness = Harness::new();
    harness.seed_vault(VAULT, "0xabc", &[Chain::Eth, Chain::Sol]);

    let result = harness
        .service
        .verification()
        .verify_across_chains(VAULT, Chain::Eth, &[Chain::Sol, Chain::Sol], &VerificationOptions::default())
        .await
        .unwrap();
    assert_eq!(result.verified_on, vec![Chain::Sol]);
    assert_eq!(result.consistency_score, 100);
}

#[tokio::test]
async fn proofs_are_attached_on_request() {
    let harness = Harness::new();
    harness.seed_vault(VAULT, "0xabc", &[Chain::Eth, Chain::Sol, Chain::Ton]);
    let options = VerificationOptions {
        include_proofs: true,
        ..VerificationOptions::default()
    };

    let result = harness
        .service
        .verification()
        .verify_across_chains(VAULT, Chain::Eth, &[Chain::Sol, Chain::Ton], &options)
        .await
        .unwrap();

    let proofs = result.proofs.unwrap();
    assert_eq!(proofs.keys().copied().collect::<Vec<_>>(), vec![Chain::Sol, Chain::Ton]);
    let backend = harness.service.proofs().backend();
    for proof in proofs.values() {
        assert!(backend.verify(proof).await.unwrap());
    }
}

#[tokio::test]
async fn malformed_input_is_rejected() {
    let harness = Harness::new();
    let verification = harness.service.verification();
    let options = VerificationOptions::default();

    let err = verification
        .verify_across_chains("", Chain::Eth, &[Chain::Sol], &options)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let long_id = "v".repeat(MAX_ENTITY_ID_LEN + 1);
    let err = verification
        .verify_across_chains(&long_id, Chain::Eth, &[Chain::Sol], &options)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let err = verification
        .verify_across_chains(VAULT, Chain::Eth, &[], &options)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    for fake in harness.fakes.values() {
        assert_eq!(fake.call_count(), 0);
    }
}
