use crate::session::{ConnectionId, InstanceId, InstanceRepository};

fn conn(value: u64) -> ConnectionId {
    ConnectionId::new(value)
}

fn inst(value: u32) -> InstanceId {
    InstanceId::new(value)
}

/// **VALUE**: Verifies that removing a connection's instances leaves every other
/// connection's instances alone.
///
/// **WHY THIS MATTERS**: Teardown of one client must never delete another client's
/// engines.
///
/// **BUG THIS CATCHES**: Would catch an off-by-one in the range computation that eats the
/// neighbour's first or last pair.
#[test]
fn given_interleaved_owners_when_removing_all_for_one_then_neighbours_untouched() {
    // GIVEN: Three connections with instances inserted out of order
    let mut repo = InstanceRepository::new();
    for (c, i) in [(2, 20), (1, 10), (3, 30), (2, 21), (1, 11), (2, 22)] {
        assert!(repo.insert(conn(c), inst(i)));
    }

    // WHEN: Removing everything owned by connection 2
    let removed = repo.remove_all(conn(2));

    // THEN: Exactly its three instances are gone
    assert_eq!(removed, vec![inst(20), inst(21), inst(22)]);
    assert_eq!(repo.instances_of(conn(1)), vec![inst(10), inst(11)]);
    assert_eq!(repo.instances_of(conn(3)), vec![inst(30)]);
    assert_eq!(repo.len(), 3);
}

/// **VALUE**: Verifies duplicate pairs are refused.
///
/// **WHY THIS MATTERS**: A duplicate would make teardown try to delete an engine twice.
///
/// **BUG THIS CATCHES**: Would catch `insert` skipping its membership check.
#[test]
fn given_existing_pair_when_inserted_again_then_rejected() {
    let mut repo = InstanceRepository::new();
    assert!(repo.insert(conn(1), inst(5)));
    assert!(!repo.insert(conn(1), inst(5)));
    assert_eq!(repo.len(), 1);
}

/// **VALUE**: Verifies ownership checks are per pair.
///
/// **WHY THIS MATTERS**: Handlers refuse to touch instances the caller does not own.
///
/// **BUG THIS CATCHES**: Would catch `contains` matching on the instance id alone.
#[test]
fn given_instance_owned_by_other_connection_when_checked_then_not_contained() {
    // GIVEN: Instance 5 owned by connection 1
    let mut repo = InstanceRepository::new();
    repo.insert(conn(1), inst(5));

    // WHEN / THEN: Connection 2 does not own it, and its owner is reported
    assert!(!repo.contains(conn(2), inst(5)));
    assert!(repo.contains(conn(1), inst(5)));
    assert_eq!(repo.owner_of(inst(5)), Some(conn(1)));
    assert_eq!(repo.owner_of(inst(6)), None);
}

/// **VALUE**: Verifies removal of a single pair and of a missing pair.
///
/// **WHY THIS MATTERS**: `DeleteInstance` for an unknown id must fail cleanly.
///
/// **BUG THIS CATCHES**: Would catch `remove` reporting success for absent pairs.
#[test]
fn given_pair_when_removed_twice_then_second_removal_reports_absent() {
    let mut repo = InstanceRepository::new();
    repo.insert(conn(4), inst(1));
    assert!(repo.remove(conn(4), inst(1)));
    assert!(!repo.remove(conn(4), inst(1)));
    assert!(repo.is_empty());
}

/// **VALUE**: Verifies bulk removal for a connection with nothing returns nothing.
///
/// **WHY THIS MATTERS**: Config and helper-manager clients own no instances but are torn
/// down through the same path.
///
/// **BUG THIS CATCHES**: Would catch an empty range being computed as the whole vector.
#[test]
fn given_connection_without_instances_when_removing_all_then_empty() {
    let mut repo = InstanceRepository::new();
    repo.insert(conn(1), inst(1));
    repo.insert(conn(3), inst(3));

    assert!(repo.remove_all(conn(2)).is_empty());
    assert_eq!(repo.len(), 2);
}
