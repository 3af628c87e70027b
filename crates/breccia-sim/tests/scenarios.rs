//! End-to-end scenarios driven through the log harness.
//!
//! Each test walks a short committed-log history and checks replies, state,
//! and the exact event sequences listeners receive.

use std::time::Duration;

use breccia_group::{Command, GroupEvent, Reply};
use breccia_sim::LogDriver;
use breccia_types::{MemberId, Term};
use bytes::Bytes;

fn member(id: u64) -> MemberId {
    MemberId::new(id)
}

#[test]
fn single_join_on_a_shared_log() {
    let mut driver = LogDriver::new();

    driver.submit(1, Command::listen()).unwrap();
    // Entries of other resources occupy indices 2..=6.
    driver.skip_to(7);
    let reply = driver.submit(1, Command::join()).unwrap();

    assert_eq!(reply, Reply::MemberId(member(7)));
    assert_eq!(driver.group().state().term(), Term::new(7));
    assert_eq!(driver.group().state().leader(), Some(member(7)));
    assert_eq!(
        driver.events_for(1),
        vec![
            GroupEvent::Join { member: member(7) },
            GroupEvent::Term { term: Term::new(7) },
            GroupEvent::Elect { member: member(7) },
        ]
    );
}

#[test]
fn leader_leave_hands_off_to_next_joiner() {
    let mut driver = LogDriver::new();

    driver.submit(1, Command::listen()).unwrap(); // idx 1
    driver.submit(1, Command::join()).unwrap(); // idx 2, leader
    assert_eq!(driver.group().state().term(), Term::new(2));

    driver.submit(2, Command::join()).unwrap(); // idx 3
    assert_eq!(driver.group().state().term(), Term::new(2)); // unchanged
    assert_eq!(driver.group().state().leader(), Some(member(2)));

    driver.submit(2, Command::leave(member(2))).unwrap(); // idx 4
    assert_eq!(driver.group().state().term(), Term::new(4));
    assert_eq!(driver.group().state().leader(), Some(member(3)));

    assert_eq!(
        driver.events_for(1),
        vec![
            GroupEvent::Join { member: member(2) },
            GroupEvent::Term { term: Term::new(2) },
            GroupEvent::Elect { member: member(2) },
            GroupEvent::Join { member: member(3) },
            GroupEvent::Resign { member: member(2) },
            GroupEvent::Term { term: Term::new(4) },
            GroupEvent::Elect { member: member(3) },
            GroupEvent::Leave { member: member(2) },
        ]
    );
}

#[test]
fn session_expiry_cascades_to_owned_members() {
    let mut driver = LogDriver::new();

    driver.submit(1, Command::listen()).unwrap(); // idx 1, session A
    driver.submit(2, Command::listen()).unwrap(); // idx 2, session B
    driver.submit(1, Command::join()).unwrap(); // idx 3, leader
    driver.submit(1, Command::join()).unwrap(); // idx 4
    driver.submit(2, Command::join()).unwrap(); // idx 5
    driver.expire_session(1); // idx 6

    assert_eq!(driver.group().state().member_ids(), [member(5)].into());
    assert_eq!(driver.group().state().leader(), Some(member(5)));
    assert!(driver.group().state().term() >= Term::new(6));

    // B watched the whole cascade: resignation and re-election first, then
    // one leave per departed member in ascending member order.
    assert_eq!(
        driver.events_for(2)[5..],
        [
            GroupEvent::Resign { member: member(3) },
            GroupEvent::Term { term: Term::new(6) },
            GroupEvent::Elect { member: member(5) },
            GroupEvent::Leave { member: member(3) },
            GroupEvent::Leave { member: member(4) },
        ]
    );

    // Only B's join commit is still retained.
    assert_eq!(driver.registry().live_count(), 1);
}

#[test]
fn property_roundtrip_with_replacement() {
    let mut driver = LogDriver::new();

    driver.submit(1, Command::join()).unwrap(); // idx 1
    driver
        .submit(1, Command::set_property(member(1), "k", "v1"))
        .unwrap(); // idx 2
    driver
        .submit(1, Command::set_property(member(1), "k", "v2"))
        .unwrap(); // idx 3

    // The displaced v1 commit was released the moment v2 landed.
    assert!(!driver.registry().is_live(2.into()));
    assert!(driver.registry().is_live(3.into()));

    let reply = driver
        .submit(1, Command::get_property(member(1), "k"))
        .unwrap();
    assert_eq!(reply, Reply::Property(Some(Bytes::from("v2"))));

    driver
        .submit(1, Command::remove_property(member(1), "k"))
        .unwrap();
    let reply = driver
        .submit(1, Command::get_property(member(1), "k"))
        .unwrap();
    assert_eq!(reply, Reply::Property(None));

    // Everything except the join has been released.
    assert_eq!(driver.registry().live_count(), 1);
}

#[test]
fn resigned_leader_is_eligible_again() {
    let mut driver = LogDriver::new();

    driver.submit(1, Command::join()).unwrap(); // idx 1, leader A
    driver.submit(2, Command::join()).unwrap(); // idx 2, B

    driver.submit(1, Command::resign(member(1))).unwrap(); // idx 3
    assert_eq!(driver.group().state().leader(), Some(member(2)));
    assert_eq!(driver.group().state().candidate_order(), vec![member(1)]);

    driver.submit(2, Command::leave(member(2))).unwrap(); // idx 4
    assert_eq!(driver.group().state().leader(), Some(member(1)));
}

#[test]
fn callback_scheduled_for_a_member_that_leaves_is_dropped() {
    let mut driver = LogDriver::new();

    driver.submit(1, Command::join()).unwrap(); // idx 1
    driver
        .submit(2, Command::schedule(member(1), 100, "cb"))
        .unwrap(); // idx 2
    driver.submit(1, Command::leave(member(1))).unwrap(); // idx 3

    driver.advance_time(Duration::from_millis(100));

    // No execute event reached anyone, and the schedule commit was released
    // exactly once.
    assert!(driver.events_for(1).is_empty());
    assert!(driver.events_for(2).is_empty());
    assert_eq!(driver.registry().live_count(), 0);
    assert_eq!(driver.registry().minted(), driver.registry().released());
}

#[test]
fn direct_message_reaches_the_owning_session() {
    let mut driver = LogDriver::new();

    driver.submit(1, Command::join()).unwrap(); // idx 1
    driver
        .submit(2, Command::send(member(1), "config", "reload"))
        .unwrap(); // idx 2

    assert_eq!(
        driver.events_for(1),
        vec![GroupEvent::Message {
            sender: member(1),
            topic: "config".to_string(),
            payload: Bytes::from("reload"),
        }]
    );
    assert!(driver.events_for(2).is_empty());
}

#[test]
fn delete_tears_down_everything() {
    let mut driver = LogDriver::new();

    driver.submit(1, Command::listen()).unwrap();
    driver.submit(1, Command::join()).unwrap();
    driver
        .submit(1, Command::set_property(member(2), "k", "v"))
        .unwrap();
    driver
        .submit(1, Command::schedule(member(2), 50, "cb"))
        .unwrap();
    assert_eq!(driver.registry().live_count(), 3);

    driver.delete();

    assert_eq!(driver.registry().live_count(), 0);
    assert_eq!(driver.group().state().member_count(), 0);

    let err = driver.submit(1, Command::join()).unwrap_err();
    assert_eq!(err, breccia_group::GroupError::Deleted);
}
