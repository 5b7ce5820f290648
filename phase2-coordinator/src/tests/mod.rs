use crate::{
    environment::Settings,
    objects::{AuditEntry, ConnectionId, FailureReason, RejectionReason, Submission},
    storage::AuditLog,
    testing::prelude::*,
    verification::Dummy,
    Coordinator,
    CoordinatorError,
};

use rand::RngCore;
use std::{sync::Arc, thread, time::Duration};

#[inline]
fn random_contribution() -> Vec<u8> {
    let mut contribution = vec![0u8; 64];
    rand::thread_rng().fill_bytes(&mut contribution[..]);
    contribution
}

fn audit_entries(coordinator: &Coordinator) -> Vec<AuditEntry> {
    AuditLog::new(coordinator.environment().audit_log_path())
        .entries()
        .unwrap()
}

fn zkey_exists(file_name: &str) -> bool {
    TEST_ENVIRONMENT.zkeys_directory().join(file_name).exists()
}

#[test]
#[serial]
fn test_contributions_extend_the_chain() {
    initialize_test_environment();
    let coordinator = seeded_test_coordinator(&TEST_ENVIRONMENT, Box::new(Dummy)).unwrap();
    assert_eq!("test_0001.zkey", coordinator.latest_file_name().unwrap());

    let first = random_contribution();
    let submission = coordinator.submit("test_0001.zkey", &first, "alice", "a1b2").unwrap();
    assert_eq!(
        Submission::Accepted {
            file_name: "test_0002.zkey".to_string()
        },
        submission
    );
    assert_eq!(
        first,
        fs_err::read(TEST_ENVIRONMENT.zkeys_directory().join("test_0002.zkey")).unwrap()
    );

    let submission = coordinator
        .submit("test_0002.zkey", b"second contribution", "bob", "c3d4")
        .unwrap();
    assert_eq!(Some("test_0003.zkey"), submission.file_name());
    assert_eq!("test_0003.zkey", coordinator.latest_file_name().unwrap());

    let entries = audit_entries(&coordinator);
    assert_eq!(2, entries.len());
    assert_eq!("Contribution,alice,a1b2,test_0002.zkey", entries[0].to_string());
    assert_eq!("Contribution,bob,c3d4,test_0003.zkey", entries[1].to_string());

    let log = fs_err::read_to_string(TEST_ENVIRONMENT.audit_log_path()).unwrap();
    assert_eq!(
        "type,name,contributionHash,fileName\n\
         Contribution,alice,a1b2,test_0002.zkey\n\
         Contribution,bob,c3d4,test_0003.zkey\n",
        log
    );
}

#[test]
#[serial]
fn test_stale_contribution_is_rejected() {
    initialize_test_environment();
    let coordinator = seeded_test_coordinator(&TEST_ENVIRONMENT, Box::new(Dummy)).unwrap();

    assert!(coordinator
        .submit("test_0001.zkey", b"first", "alice", "a1")
        .unwrap()
        .is_accepted());

    // Bob built on the seed, which is no longer the latest version.
    let submission = coordinator.submit("test_0001.zkey", b"late", "bob", "b2").unwrap();
    assert_eq!(
        Submission::Rejected {
            reason: RejectionReason::OrderingViolated
        },
        submission
    );
    assert!(!zkey_exists("test_0003.zkey"));
    assert_eq!("test_0002.zkey", coordinator.latest_file_name().unwrap());
    assert_eq!(1, audit_entries(&coordinator).len());
}

#[test]
#[serial]
fn test_invalid_contribution_is_rejected() {
    initialize_test_environment();
    let coordinator = seeded_test_coordinator(&TEST_ENVIRONMENT, Box::new(RejectAll)).unwrap();

    let submission = coordinator.submit("test_0001.zkey", b"bogus", "mallory", "ff").unwrap();
    assert_eq!(
        Submission::Rejected {
            reason: RejectionReason::InvalidContribution
        },
        submission
    );
    assert!(!zkey_exists("test_0002.zkey"));
    assert!(audit_entries(&coordinator).is_empty());
}

#[test]
#[serial]
fn test_verifier_failure_is_reported() {
    initialize_test_environment();
    let coordinator = seeded_test_coordinator(&TEST_ENVIRONMENT, Box::new(FailingVerifier)).unwrap();

    let submission = coordinator.submit("test_0001.zkey", b"contribution", "alice", "a1").unwrap();
    assert_eq!(
        Submission::Failed {
            reason: FailureReason::VerificationError
        },
        submission
    );
    assert!(!zkey_exists("test_0002.zkey"));
}

#[test]
#[serial]
fn test_submit_without_seed_fails() {
    initialize_test_environment();
    let coordinator = test_coordinator(&TEST_ENVIRONMENT).unwrap();

    assert!(matches!(
        coordinator.submit("test_0001.zkey", b"contribution", "alice", "a1"),
        Err(CoordinatorError::ArtifactChainMissing(_))
    ));
}

#[test]
#[serial]
fn test_concurrent_contributions_on_the_same_version() {
    initialize_test_environment();
    let contributors = 4;
    let coordinator =
        Arc::new(seeded_test_coordinator(&TEST_ENVIRONMENT, Box::new(BarrierVerifier::new(contributors))).unwrap());

    // Every contributor passes verification before any of them writes.
    let handles = (0..contributors)
        .map(|index| {
            let coordinator = coordinator.clone();
            thread::spawn(move || {
                let name = format!("contributor-{}", index);
                coordinator
                    .submit("test_0001.zkey", name.as_bytes(), &name, "00")
                    .unwrap()
            })
        })
        .collect::<Vec<_>>();
    let submissions = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect::<Vec<_>>();

    let accepted = submissions.iter().filter(|s| s.is_accepted()).count();
    assert_eq!(1, accepted);
    for submission in submissions.iter().filter(|s| !s.is_accepted()) {
        assert_eq!(
            &Submission::Rejected {
                reason: RejectionReason::OrderingViolated
            },
            submission
        );
    }

    assert_eq!(2, coordinator.list_versions().unwrap().len());
    assert!(!zkey_exists("test_0003.zkey"));
    assert_eq!(1, audit_entries(&coordinator).len());
}

#[test]
#[serial]
fn test_independent_coordinators_on_the_same_version() {
    initialize_test_environment();
    let contributors = 4;
    let verifier = BarrierVerifier::new(contributors);

    // Each coordinator has its own chain lock, so only the exclusive create separates them.
    let mut coordinators = vec![Arc::new(
        seeded_test_coordinator(&TEST_ENVIRONMENT, Box::new(verifier.clone())).unwrap(),
    )];
    for _ in 1..contributors {
        coordinators.push(Arc::new(
            test_coordinator_with_verifier(&TEST_ENVIRONMENT, Box::new(verifier.clone())).unwrap(),
        ));
    }

    let handles = coordinators
        .iter()
        .enumerate()
        .map(|(index, coordinator)| {
            let coordinator = coordinator.clone();
            thread::spawn(move || {
                let name = format!("contributor-{}", index);
                coordinator
                    .submit("test_0001.zkey", name.as_bytes(), &name, "00")
                    .unwrap()
            })
        })
        .collect::<Vec<_>>();
    let submissions = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect::<Vec<_>>();

    assert_eq!(1, submissions.iter().filter(|s| s.is_accepted()).count());
    for submission in submissions.iter().filter(|s| !s.is_accepted()) {
        assert_eq!(
            &Submission::Rejected {
                reason: RejectionReason::OrderingViolated
            },
            submission
        );
    }

    assert_eq!("test_0002.zkey", coordinators[0].latest_file_name().unwrap());
    assert!(!zkey_exists("test_0003.zkey"));
    assert_eq!(1, audit_entries(&coordinators[0]).len());
}

#[test]
#[serial]
fn test_storage_failure_is_reported() {
    initialize_test_environment();

    // The seed name is exactly 255 bytes long, so the name of the next version is too long to create.
    let settings = Settings {
        ceremony_name: "a".repeat(245),
        seed_sequence_id: 9999,
        ..TEST_ENVIRONMENT.settings().clone()
    };
    let environment = TEST_ENVIRONMENT.clone().with_settings(settings);
    let coordinator = seeded_test_coordinator(&environment, Box::new(Dummy)).unwrap();
    let seed = coordinator.latest_file_name().unwrap();
    assert_eq!(255, seed.len());

    let submission = coordinator.submit(&seed, b"contribution", "alice", "a1").unwrap();
    assert_eq!(
        Submission::Failed {
            reason: FailureReason::StorageError
        },
        submission
    );

    assert_eq!(1, coordinator.list_versions().unwrap().len());
    assert_eq!(seed, coordinator.latest_file_name().unwrap());
    assert!(audit_entries(&coordinator).is_empty());
}

#[test]
#[serial]
fn test_missing_audit_log_does_not_block_contributions() {
    initialize_test_environment();
    let coordinator = seeded_test_coordinator(&TEST_ENVIRONMENT, Box::new(Dummy)).unwrap();
    fs_err::remove_file(TEST_ENVIRONMENT.audit_log_path()).unwrap();

    let submission = coordinator.submit("test_0001.zkey", b"first", "alice", "a1").unwrap();
    assert_eq!(
        Submission::Accepted {
            file_name: "test_0002.zkey".to_string()
        },
        submission
    );
    assert!(zkey_exists("test_0002.zkey"));

    // A restart recreates the log, and the rescan finds the unlogged version.
    assert!(coordinator.initialize().unwrap().is_some());
    assert_eq!(vec!["test_0002.zkey".to_string()], coordinator.unaudited_versions().unwrap());
}

#[test]
#[serial]
fn test_exhausted_chain_cannot_be_extended() {
    initialize_test_environment();
    let coordinator = test_coordinator(&TEST_ENVIRONMENT).unwrap();
    let last = "test_18446744073709551615.zkey";
    fs_err::write(TEST_ENVIRONMENT.zkeys_directory().join(last), b"last").unwrap();

    assert!(matches!(
        coordinator.submit(last, b"contribution", "alice", "a1"),
        Err(CoordinatorError::ArtifactNameInvalid(name)) if name == last
    ));
}

#[test]
#[serial]
fn test_directory_shaped_like_a_version_fails_loudly() {
    initialize_test_environment();
    let coordinator = seeded_test_coordinator(&TEST_ENVIRONMENT, Box::new(Dummy)).unwrap();
    fs_err::create_dir(TEST_ENVIRONMENT.zkeys_directory().join("test_0002.zkey")).unwrap();

    assert!(matches!(
        coordinator.submit("test_0001.zkey", b"contribution", "alice", "a1"),
        Err(CoordinatorError::ArtifactNameInvalid(name)) if name == "test_0002.zkey"
    ));
}

#[test]
#[serial]
fn test_finalized_ceremony_blocks_contributions() {
    initialize_test_environment();
    let coordinator = seeded_test_coordinator(&TEST_ENVIRONMENT, Box::new(Dummy)).unwrap();
    fs_err::write(TEST_ENVIRONMENT.zkeys_directory().join("test_final.zkey"), b"final").unwrap();

    assert!(matches!(
        coordinator.submit("test_0001.zkey", b"contribution", "alice", "a1"),
        Err(CoordinatorError::CeremonyFinalized(_))
    ));
    assert!(!zkey_exists("test_0002.zkey"));

    let report = coordinator.status_report().unwrap();
    assert!(report.contains("Finalized: test_final.zkey"));
}

#[test]
#[serial]
fn test_broken_chain_fails_listing() {
    initialize_test_environment();
    let coordinator = seeded_test_coordinator(&TEST_ENVIRONMENT, Box::new(Dummy)).unwrap();
    fs_err::write(TEST_ENVIRONMENT.zkeys_directory().join("test_0003.zkey"), b"orphan").unwrap();

    assert!(matches!(
        coordinator.latest(),
        Err(CoordinatorError::ArtifactChainBroken { expected: 2, found: 3 })
    ));
}

#[test]
#[serial]
fn test_seed_twice_fails() {
    initialize_test_environment();
    let coordinator = seeded_test_coordinator(&TEST_ENVIRONMENT, Box::new(Dummy)).unwrap();

    assert!(matches!(
        coordinator.seed(b"another seed"),
        Err(CoordinatorError::ArtifactChainExists(_))
    ));
}

#[test]
#[serial]
fn test_initialize_is_idempotent() {
    initialize_test_environment();
    let coordinator = seeded_test_coordinator(&TEST_ENVIRONMENT, Box::new(Dummy)).unwrap();
    assert!(coordinator.submit("test_0001.zkey", b"first", "alice", "a1").unwrap().is_accepted());

    let restarted = Coordinator::new(TEST_ENVIRONMENT.clone(), Box::new(Dummy)).unwrap();
    let latest = restarted.initialize().unwrap().unwrap();
    assert_eq!("test_0002.zkey", latest.file_name());

    // The existing log keeps its entries.
    assert_eq!(1, audit_entries(&restarted).len());
}

#[test]
#[serial]
fn test_unaudited_versions() {
    initialize_test_environment();
    let coordinator = seeded_test_coordinator(&TEST_ENVIRONMENT, Box::new(Dummy)).unwrap();
    assert!(coordinator.submit("test_0001.zkey", b"first", "alice", "a1").unwrap().is_accepted());
    assert!(coordinator.unaudited_versions().unwrap().is_empty());

    // A version written around the coordinator has no audit entry.
    fs_err::write(TEST_ENVIRONMENT.zkeys_directory().join("test_0003.zkey"), b"manual").unwrap();
    assert_eq!(vec!["test_0003.zkey".to_string()], coordinator.unaudited_versions().unwrap());
}

#[test]
#[serial]
fn test_queue_positions() {
    initialize_test_environment();
    let coordinator = test_coordinator(&TEST_ENVIRONMENT).unwrap();

    let connections = (0..3)
        .map(|index| ConnectionId::new(&format!("connection-{}", index)))
        .collect::<Vec<_>>();
    for (index, connection) in connections.iter().enumerate() {
        assert_eq!(index + 1, coordinator.admit(connection.clone()).unwrap());
    }

    // The head is promoted on admission.
    assert_eq!(Some(connections[0].clone()), coordinator.active().unwrap());
    assert!(coordinator.is_active(&connections[0]).unwrap());

    assert!(coordinator.withdraw(&connections[1]).unwrap());
    assert_eq!(Some(2), coordinator.position_of(&connections[2]).unwrap());
    assert_eq!(None, coordinator.position_of(&connections[1]).unwrap());
    assert!(!coordinator.withdraw(&connections[1]).unwrap());
}

#[test]
#[serial]
fn test_queue_capacity() {
    initialize_test_environment();
    let coordinator = test_coordinator(&TEST_ENVIRONMENT).unwrap();
    let capacity = TEST_ENVIRONMENT.maximum_queue_size();
    assert_eq!(25, capacity);

    for index in 0..capacity {
        coordinator.admit(ConnectionId::new(&format!("connection-{}", index))).unwrap();
    }
    assert!(matches!(
        coordinator.admit(ConnectionId::new("one-too-many")),
        Err(CoordinatorError::QueueFull(25))
    ));
    assert_eq!(
        "Too many connections (25). Try again later.",
        CoordinatorError::QueueFull(capacity).to_string()
    );

    // A departure frees a place.
    coordinator.withdraw(&ConnectionId::new("connection-0")).unwrap();
    assert_eq!(25, coordinator.admit(ConnectionId::new("one-too-many")).unwrap());
}

#[test]
#[serial]
fn test_withdrawing_active_promotes_next() {
    initialize_test_environment();
    let coordinator = test_coordinator(&TEST_ENVIRONMENT).unwrap();
    let alice = ConnectionId::new("alice");
    let bob = ConnectionId::new("bob");
    coordinator.admit(alice.clone()).unwrap();
    coordinator.admit(bob.clone()).unwrap();

    assert!(coordinator.withdraw(&alice).unwrap());
    assert_eq!(Some(bob.clone()), coordinator.head().unwrap());
    assert_eq!(Some(bob.clone()), coordinator.active().unwrap());
    assert_eq!(Some(1), coordinator.position_of(&bob).unwrap());
}

#[test]
#[serial]
fn test_set_active_requires_head() {
    initialize_test_environment();
    let coordinator = test_coordinator(&TEST_ENVIRONMENT).unwrap();
    let alice = ConnectionId::new("alice");
    let bob = ConnectionId::new("bob");
    coordinator.admit(alice.clone()).unwrap();
    coordinator.admit(bob.clone()).unwrap();

    assert!(matches!(
        coordinator.set_active(Some(bob.clone())),
        Err(CoordinatorError::NotQueueHead(_))
    ));

    coordinator.set_active(None).unwrap();
    assert_eq!(None, coordinator.active().unwrap());
    coordinator.set_active(Some(alice.clone())).unwrap();
    assert_eq!(Some(alice), coordinator.active().unwrap());
}

#[test]
#[serial]
fn test_update_releases_expired_connection() {
    initialize_test_environment();
    let coordinator = test_coordinator(&TEST_ENVIRONMENT).unwrap();
    let alice = ConnectionId::new("alice");
    let bob = ConnectionId::new("bob");
    coordinator.admit(alice.clone()).unwrap();
    coordinator.admit(bob.clone()).unwrap();

    // Within the timeout, nothing changes.
    coordinator.update().unwrap();
    assert_eq!(Some(alice.clone()), coordinator.active().unwrap());

    thread::sleep(TEST_ENVIRONMENT.contribution_timeout() + Duration::from_millis(50));
    coordinator.update().unwrap();

    assert_eq!(None, coordinator.position_of(&alice).unwrap());
    assert_eq!(Some(bob), coordinator.active().unwrap());
}

#[test]
#[serial]
fn test_contribute_requires_active_slot() {
    initialize_test_environment();
    let coordinator = seeded_test_coordinator(&TEST_ENVIRONMENT, Box::new(Dummy)).unwrap();
    let alice = ConnectionId::new("alice");
    let bob = ConnectionId::new("bob");
    coordinator.admit(alice.clone()).unwrap();
    coordinator.admit(bob.clone()).unwrap();

    assert!(matches!(
        coordinator.contribute(&bob, "test_0001.zkey", b"early", "bob", "b2"),
        Err(CoordinatorError::NotActive(_))
    ));
    assert_eq!(Some(2), coordinator.position_of(&bob).unwrap());

    let submission = coordinator
        .contribute(&alice, "test_0001.zkey", b"first", "alice", "a1")
        .unwrap();
    assert!(submission.is_accepted());

    // Alice leaves the queue and bob takes the active slot.
    assert_eq!(None, coordinator.position_of(&alice).unwrap());
    assert_eq!(Some(bob.clone()), coordinator.active().unwrap());

    let submission = coordinator
        .contribute(&bob, "test_0002.zkey", b"second", "bob", "b2")
        .unwrap();
    assert_eq!(Some("test_0003.zkey"), submission.file_name());
    assert!(coordinator.active().unwrap().is_none());
}

#[test]
#[serial]
fn test_rejected_contribution_releases_active_slot() {
    initialize_test_environment();
    let coordinator = seeded_test_coordinator(&TEST_ENVIRONMENT, Box::new(RejectAll)).unwrap();
    let alice = ConnectionId::new("alice");
    let bob = ConnectionId::new("bob");
    coordinator.admit(alice.clone()).unwrap();
    coordinator.admit(bob.clone()).unwrap();

    let submission = coordinator
        .contribute(&alice, "test_0001.zkey", b"bogus", "alice", "a1")
        .unwrap();
    assert!(!submission.is_accepted());
    assert_eq!(Some(bob), coordinator.active().unwrap());
}

#[test]
#[serial]
fn test_status_report() {
    initialize_test_environment();
    let coordinator = seeded_test_coordinator(&TEST_ENVIRONMENT, Box::new(Dummy)).unwrap();
    coordinator.admit(ConnectionId::new("alice")).unwrap();
    coordinator.admit(ConnectionId::new("bob")).unwrap();

    let report = coordinator.status_report().unwrap();
    assert!(report.contains("Ceremony: test (test)"));
    assert!(report.contains("Latest: test_0001.zkey (1 versions)"));
    assert!(report.contains("Queue: 2/25"));
    assert!(report.contains("Active: alice since"));
    assert!(report.contains("Waiting: alice, bob"));
}
