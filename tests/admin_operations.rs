mod common;

use chrono::Duration;

use common::{admin, ladder, start};
use rank_ladder::database::ChallengeStatus;
use rank_ladder::database::bot_state::ChannelKey;
use rank_ladder::errors::ErrorKind;
use rank_ladder::services::Actor;

#[test]
fn test_rank_is_held_by_one_player_only() {
    let ladder = ladder();
    ladder.seed(&["alice", "bob"]);

    let err = ladder.service.set_rank(&admin(), "carol", 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let err = ladder.service.set_rank(&admin(), "carol", 11).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    ladder.service.set_rank(&admin(), "bob", 5).unwrap();
    assert_eq!(ladder.rank("bob"), Some(5));
    ladder.service.set_rank(&admin(), "carol", 2).unwrap();
    assert_eq!(
        ladder.ranks(),
        vec![
            ("alice".to_string(), 1),
            ("carol".to_string(), 2),
            ("bob".to_string(), 5)
        ]
    );
}

#[test]
fn test_remove_rank_moves_everyone_below_up() {
    let ladder = ladder();
    ladder.seed(&["alice", "bob", "carol", "dave"]);

    let freed = ladder.service.remove_rank(&admin(), "bob").unwrap();
    assert_eq!(freed, 2);
    assert_eq!(
        ladder.ranks(),
        vec![
            ("alice".to_string(), 1),
            ("carol".to_string(), 2),
            ("dave".to_string(), 3)
        ]
    );
    assert_eq!(ladder.player("bob").highest_rank, Some(2));

    let err = ladder.service.remove_rank(&admin(), "bob").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn test_admin_operations_require_admin() {
    let ladder = ladder();
    let player = Actor::player("mallory");

    assert_eq!(
        ladder.service.set_rank(&player, "mallory", 1).unwrap_err().kind(),
        ErrorKind::Unauthorized
    );
    assert_eq!(
        ladder.service.set_cooldown_hours(&player, 0).unwrap_err().kind(),
        ErrorKind::Unauthorized
    );
    assert_eq!(
        ladder.service.pending_items(&player).unwrap_err().kind(),
        ErrorKind::Unauthorized
    );
}

#[test]
fn test_cooldown_override_applies_to_next_match() {
    let ladder = ladder();
    ladder.seed(&["bob", "alice"]);
    ladder.service.set_cooldown_hours(&admin(), 2).unwrap();
    assert_eq!(ladder.service.settings().unwrap().cooldown_hours, 2);

    let err = ladder.service.set_cooldown_hours(&admin(), 200).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let err = ladder.service.set_response_window_hours(&admin(), 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let outcome = ladder.service.force_result(&admin(), "alice", "bob", 0).unwrap();
    assert_eq!(outcome.cooldown_until, Some(start() + Duration::hours(2)));
    assert_eq!(ladder.rank("alice"), Some(1));
    assert_eq!(ladder.rank("bob"), Some(2));
}

#[test]
fn test_response_window_override_sets_expiry() {
    let ladder = ladder();
    ladder.seed(&["bob", "alice"]);
    ladder.service.set_response_window_hours(&admin(), 1).unwrap();

    let challenge = ladder
        .service
        .challenge(&Actor::player("alice"), "bob")
        .unwrap();
    assert_eq!(challenge.expires_at, start() + Duration::hours(1));
}

#[test]
fn test_force_result_leaves_lower_loser_alone() {
    let ladder = ladder();
    ladder.seed(&["alice", "bob"]);

    let outcome = ladder.service.force_result(&admin(), "alice", "bob", 0).unwrap();
    assert_eq!(outcome.winner_rank, Some(1));
    assert_eq!(ladder.rank("bob"), Some(2));

    let history = ladder.service.history("alice", 5).unwrap();
    assert_eq!(history[0].challenge_id, None);
    assert!(history[0].was_perfect);
    assert_eq!(ladder.player("alice").title_takes, 0);
}

#[test]
fn test_force_result_records_three_set_win() {
    let ladder = ladder();
    ladder.seed(&["bob", "alice"]);

    let outcome = ladder.service.force_result(&admin(), "alice", "bob", 1).unwrap();
    assert_eq!(outcome.winner_rank, Some(1));
    assert_eq!(ladder.rank("bob"), Some(2));

    let winner = &ladder.service.history("alice", 1).unwrap()[0];
    assert_eq!((winner.sets_won, winner.sets_lost), (2, 1));
    assert!(!winner.was_perfect);
    let loser = &ladder.service.history("bob", 1).unwrap()[0];
    assert_eq!((loser.sets_won, loser.sets_lost), (1, 2));

    let err = ladder
        .service
        .force_result(&admin(), "bob", "alice", 2)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(ladder.service.history("alice", 5).unwrap().len(), 1);
}

#[test]
fn test_cancel_and_void_change_nothing_else() {
    let ladder = ladder();
    ladder.seed(&["dave", "carol", "bob", "alice"]);

    let pending = ladder
        .service
        .challenge(&Actor::player("alice"), "bob")
        .unwrap();
    let cancelled = ladder.service.cancel(&admin(), pending.id).unwrap();
    assert_eq!(cancelled.status, ChallengeStatus::Cancelled);
    assert_eq!(
        ladder.service.void(&admin(), pending.id).unwrap_err().kind(),
        ErrorKind::Conflict
    );

    let accepted = ladder
        .service
        .challenge(&Actor::player("carol"), "dave")
        .unwrap();
    ladder
        .service
        .accept(&Actor::player("dave"), accepted.id)
        .unwrap();
    let voided = ladder.service.void(&admin(), accepted.id).unwrap();
    assert_eq!(voided.status, ChallengeStatus::Voided);

    assert_eq!(ladder.rank("alice"), Some(4));
    assert_eq!(ladder.rank("carol"), Some(2));
    assert_eq!(ladder.player("carol").cooldown_until, None);
    assert!(ladder.service.active_challenge("alice").unwrap().is_none());
}

#[test]
fn test_record_result_completes_accepted_challenge() {
    let ladder = ladder();
    ladder.seed(&["bob", "alice"]);
    let challenge = ladder
        .service
        .challenge(&Actor::player("alice"), "bob")
        .unwrap();

    let err = ladder
        .service
        .record_result(&admin(), challenge.id, &["10-5", "10-5"])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    ladder
        .service
        .accept(&Actor::player("bob"), challenge.id)
        .unwrap();
    let items = ladder.service.pending_items(&admin()).unwrap();
    assert_eq!(items.accepted.len(), 1);

    ladder
        .service
        .record_result(&admin(), challenge.id, &["10-5", "10-5"])
        .unwrap();
    assert_eq!(ladder.rank("alice"), Some(1));
    assert!(ladder.service.pending_items(&admin()).unwrap().accepted.is_empty());
}

#[test]
fn test_cooldowns_can_be_cleared() {
    let ladder = ladder();
    ladder.seed(&["bob", "alice"]);
    ladder.service.force_result(&admin(), "alice", "bob", 0).unwrap();
    assert!(ladder.player("bob").is_on_cooldown(start()));

    ladder.service.clear_cooldown(&admin(), "bob").unwrap();
    assert!(!ladder.player("bob").is_on_cooldown(start()));

    ladder.service.remove_my_cooldown(&Actor::player("alice")).unwrap();
    let err = ladder
        .service
        .remove_my_cooldown(&Actor::player("alice"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[test]
fn test_channel_handles_are_stored() {
    let ladder = ladder();
    ladder
        .service
        .set_channel(&admin(), ChannelKey::Disputes, "#disputes")
        .unwrap();
    assert_eq!(
        ladder.service.channel(ChannelKey::Disputes).unwrap().as_deref(),
        Some("#disputes")
    );
    assert_eq!(ladder.service.channel(ChannelKey::Logs).unwrap(), None);
}
