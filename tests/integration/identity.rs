//! First-run identity lifecycle against a real filesystem.

use mirror_core::{identity, Identity, IdentityError, PeerId};

#[test]
fn first_run_generates_persists_and_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".mirror_id");

    // Nothing on disk yet.
    assert!(matches!(
        Identity::load(&path),
        Err(IdentityError::NotFound(_))
    ));

    let generated = Identity::generate().unwrap();
    generated.persist(&path).unwrap();

    let reloaded = Identity::load(&path).unwrap();
    assert_eq!(reloaded.peer_id(), generated.peer_id());
    assert_eq!(
        reloaded.peer_id(),
        PeerId::from_public_key(&generated.public_key())
    );

    // A signature made before the restart verifies after it.
    let message = b"mirrornet boot marker";
    let signature = generated.sign(message);
    assert!(identity::verify(&reloaded.public_key(), message, &signature));
}

#[test]
fn persist_never_overwrites_an_existing_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".mirror_id");

    let first = Identity::generate().unwrap();
    first.persist(&path).unwrap();

    let second = Identity::generate().unwrap();
    assert!(matches!(
        second.persist(&path),
        Err(IdentityError::AlreadyExists(_))
    ));

    // The original survives intact.
    let reloaded = Identity::load(&path).unwrap();
    assert_eq!(reloaded.peer_id(), first.peer_id());
}

#[test]
fn two_fresh_nodes_never_share_a_peer_id() {
    let a = Identity::generate().unwrap();
    let b = Identity::generate().unwrap();
    assert_ne!(a.peer_id(), b.peer_id());
}
