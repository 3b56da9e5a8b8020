mod common;

use chrono::Duration;

use common::{admin, ladder, start};
use rank_ladder::database::ChallengeStatus;
use rank_ladder::domain::Refusal;
use rank_ladder::errors::{ErrorKind, LadderError};
use rank_ladder::integrations::Audience;
use rank_ladder::services::Actor;

#[test]
fn test_challenger_upset_swaps_ranks_and_starts_cooldowns() {
    let ladder = ladder();
    ladder.seed(&["carol", "bob", "alice"]);
    let alice = Actor::player("alice");
    let bob = Actor::player("bob");

    let challenge = ladder.service.challenge(&alice, "bob").unwrap();
    assert_eq!(challenge.defender_rank, 2);
    ladder.service.accept(&bob, challenge.id).unwrap();

    ladder.clock.advance(Duration::hours(1));
    let result = ladder
        .service
        .submit_result(&alice, challenge.id, &["10-5", "10-7"])
        .unwrap();
    let outcome = ladder.service.confirm_result(&bob, result.id).unwrap();

    assert_eq!(outcome.winner_id, "alice");
    assert_eq!(outcome.winner_rank, Some(2));
    assert_eq!(outcome.loser_rank, Some(3));
    assert_eq!(ladder.rank("alice"), Some(2));
    assert_eq!(ladder.rank("bob"), Some(3));
    assert_eq!(ladder.rank("carol"), Some(1));

    let cooldown_end = start() + Duration::hours(9);
    assert_eq!(ladder.player("alice").cooldown_until, Some(cooldown_end));
    assert_eq!(ladder.player("bob").cooldown_until, Some(cooldown_end));
    assert_eq!(ladder.player("alice").title_takes, 1);
    assert_eq!(ladder.player("alice").total_points_scored, 20);

    let details = ladder.service.challenge_details(challenge.id).unwrap();
    assert_eq!(details.status, ChallengeStatus::Completed);

    let history = ladder.service.history("alice", 10).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].rank_before, Some(3));
    assert_eq!(history[0].rank_after, Some(2));
    assert_eq!(ladder.service.history("bob", 10).unwrap().len(), 1);
    assert_eq!(ladder.service.queued_refreshes(), 1);
}

#[test]
fn test_defender_holds_rank() {
    let ladder = ladder();
    ladder.seed(&["carol", "bob", "alice"]);
    let alice = Actor::player("alice");
    let bob = Actor::player("bob");

    let challenge = ladder.service.challenge(&alice, "bob").unwrap();
    ladder.service.accept(&bob, challenge.id).unwrap();
    let result = ladder
        .service
        .submit_result(&alice, challenge.id, &["5-10", "10-8", "6-10"])
        .unwrap();
    let outcome = ladder.service.confirm_result(&bob, result.id).unwrap();

    assert_eq!(outcome.winner_id, "bob");
    assert_eq!(ladder.rank("bob"), Some(2));
    assert_eq!(ladder.rank("alice"), Some(3));
    assert_eq!(ladder.player("bob").title_defenses, 1);
    assert_eq!(ladder.player("alice").loss_streak, 1);
    assert!(ladder.player("alice").cooldown_until.is_some());
}

#[test]
fn test_expired_challenge_is_forfeited_without_cooldown() {
    let ladder = ladder();
    ladder.seed(&["carol", "bob", "alice"]);
    let challenge = ladder
        .service
        .challenge(&Actor::player("alice"), "bob")
        .unwrap();

    ladder.clock.advance(Duration::hours(11));
    assert_eq!(ladder.service.sweep_expired().unwrap(), 0);

    ladder.clock.advance(Duration::hours(2));
    assert_eq!(ladder.service.sweep_expired().unwrap(), 1);
    assert_eq!(ladder.service.sweep_expired().unwrap(), 0);

    let details = ladder.service.challenge_details(challenge.id).unwrap();
    assert_eq!(details.status, ChallengeStatus::Expired);
    assert_eq!(ladder.rank("alice"), Some(2));
    assert_eq!(ladder.rank("bob"), Some(3));
    assert_eq!(ladder.player("alice").cooldown_until, None);
    assert_eq!(ladder.player("bob").cooldown_until, None);
    assert_eq!(ladder.service.history("alice", 10).unwrap().len(), 1);
}

#[test]
fn test_decline_counts_as_forfeit() {
    let ladder = ladder();
    ladder.seed(&["carol", "bob", "alice"]);
    let challenge = ladder
        .service
        .challenge(&Actor::player("alice"), "bob")
        .unwrap();

    let err = ladder
        .service
        .decline(&Actor::player("alice"), challenge.id)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    let outcome = ladder
        .service
        .decline(&Actor::player("bob"), challenge.id)
        .unwrap();
    assert_eq!(outcome.winner_id, "alice");
    assert_eq!(outcome.cooldown_until, None);
    assert_eq!(
        ladder.service.challenge_details(challenge.id).unwrap().status,
        ChallengeStatus::Forfeited
    );
}

#[test]
fn test_only_one_active_challenge_per_player() {
    let ladder = ladder();
    ladder.seed(&["dave", "carol", "bob", "alice"]);
    ladder
        .service
        .challenge(&Actor::player("alice"), "bob")
        .unwrap();

    let err = ladder
        .service
        .challenge(&Actor::player("bob"), "carol")
        .unwrap_err();
    assert!(matches!(err, LadderError::Ineligible(Refusal::ChallengerBusy)));

    let targets = ladder
        .service
        .eligible_targets(&Actor::player("carol"))
        .unwrap();
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].player.player_id, "dave");
}

#[test]
fn test_out_of_reach_and_self_challenges_are_refused() {
    let ladder = ladder();
    ladder.seed(&["carol", "bob", "alice"]);

    let err = ladder
        .service
        .challenge(&Actor::player("alice"), "carol")
        .unwrap_err();
    assert!(matches!(err, LadderError::Ineligible(Refusal::OutOfReach { .. })));

    let err = ladder
        .service
        .challenge(&Actor::player("alice"), "alice")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn test_newcomer_entering_pushes_ladder_down() {
    let ladder = ladder();
    let names: Vec<String> = (1..=10).map(|rank| format!("p{rank}")).collect();
    let seeded: Vec<&str> = names.iter().map(String::as_str).collect();
    ladder.seed(&seeded);

    let newcomer = Actor::player("newcomer");
    let challenge = ladder.service.challenge(&newcomer, "p9").unwrap();
    ladder
        .service
        .decline(&Actor::player("p9"), challenge.id)
        .unwrap();

    assert_eq!(ladder.rank("newcomer"), Some(9));
    assert_eq!(ladder.rank("p9"), Some(10));
    assert_eq!(ladder.rank("p10"), None);
    assert_eq!(ladder.rank("p8"), Some(8));
    assert_eq!(ladder.ranks().len(), 10);
}

#[test]
fn test_unranked_players_can_play_each_other() {
    let ladder = ladder();
    let challenge = ladder
        .service
        .challenge_unranked(&Actor::player("eve"), "finn")
        .unwrap();
    assert_eq!(challenge.defender_rank, 0);

    ladder
        .service
        .accept(&Actor::player("finn"), challenge.id)
        .unwrap();
    let result = ladder
        .service
        .submit_result(&Actor::player("eve"), challenge.id, &["10-2", "10-3"])
        .unwrap();
    ladder
        .service
        .confirm_result(&Actor::player("finn"), result.id)
        .unwrap();

    assert_eq!(ladder.rank("eve"), None);
    assert_eq!(ladder.player("eve").wins, 1);
    assert_eq!(ladder.player("eve").perfect_matches, 1);
    assert!(ladder.player("eve").elo > ladder.player("finn").elo);
}

#[test]
fn test_result_can_only_be_settled_once() {
    let ladder = ladder();
    ladder.seed(&["carol", "bob", "alice"]);
    let alice = Actor::player("alice");
    let bob = Actor::player("bob");

    let challenge = ladder.service.challenge(&alice, "bob").unwrap();
    ladder.service.accept(&bob, challenge.id).unwrap();
    let result = ladder
        .service
        .submit_result(&alice, challenge.id, &["10-5", "10-7"])
        .unwrap();

    ladder.service.confirm_result(&bob, result.id).unwrap();
    let again = ladder.service.confirm_result(&bob, result.id).unwrap_err();
    assert_eq!(again.kind(), ErrorKind::Conflict);
    let dispute = ladder.service.dispute_result(&bob, result.id).unwrap_err();
    assert_eq!(dispute.kind(), ErrorKind::Conflict);

    assert_eq!(ladder.rank("alice"), Some(2));
    assert_eq!(ladder.player("alice").wins, 1);
    assert_eq!(ladder.service.history("alice", 10).unwrap().len(), 1);
}

#[test]
fn test_invalid_scores_are_rejected_before_anything_is_stored() {
    let ladder = ladder();
    ladder.seed(&["carol", "bob", "alice"]);
    let alice = Actor::player("alice");
    let challenge = ladder.service.challenge(&alice, "bob").unwrap();
    ladder
        .service
        .accept(&Actor::player("bob"), challenge.id)
        .unwrap();

    for sets in [vec!["10-5"], vec!["10-10", "10-5"], vec!["10-5", "10-7", "10-2"], vec!["ten-five", "10-1"]] {
        let err = ladder
            .service
            .submit_result(&alice, challenge.id, &sets[..])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation, "{sets:?}");
    }

    let err = ladder
        .service
        .submit_result(&Actor::player("bob"), challenge.id, &["10-5", "10-7"])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}

#[test]
fn test_dispute_goes_to_reviewers_and_admin_resolves_it() {
    let ladder = ladder();
    ladder.seed(&["carol", "bob", "alice"]);
    let alice = Actor::player("alice");
    let bob = Actor::player("bob");

    let challenge = ladder.service.challenge(&alice, "bob").unwrap();
    ladder.service.accept(&bob, challenge.id).unwrap();
    let result = ladder
        .service
        .submit_result(&alice, challenge.id, &["10-5", "10-7"])
        .unwrap();
    ladder.service.dispute_result(&bob, result.id).unwrap();
    assert_eq!(ladder.notices.count_for(&Audience::Reviewers), 1);
    assert_eq!(ladder.rank("alice"), Some(3));

    let err = ladder
        .service
        .resolve_dispute(&alice, challenge.id, &["10-5", "10-7"])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    let outcome = ladder
        .service
        .resolve_dispute(&admin(), challenge.id, &["5-10", "10-7", "8-10"])
        .unwrap();
    assert_eq!(outcome.winner_id, "bob");
    assert_eq!(ladder.rank("bob"), Some(2));
    assert_eq!(
        ladder.service.challenge_details(challenge.id).unwrap().status,
        ChallengeStatus::Completed
    );
}

#[test]
fn test_corrections_keep_ladder_positions() {
    let ladder = ladder();
    ladder.seed(&["carol", "bob", "alice"]);
    let alice = Actor::player("alice");
    let bob = Actor::player("bob");

    let challenge = ladder.service.challenge(&alice, "bob").unwrap();
    ladder.service.accept(&bob, challenge.id).unwrap();
    let result = ladder
        .service
        .submit_result(&alice, challenge.id, &["10-5", "10-7"])
        .unwrap();
    ladder.service.confirm_result(&bob, result.id).unwrap();

    let correction = ladder
        .service
        .request_correction(&alice, challenge.id, &["10-8", "10-7"])
        .unwrap();
    let second = ladder
        .service
        .request_correction(&bob, challenge.id, &["10-8", "10-6"])
        .unwrap_err();
    assert_eq!(second.kind(), ErrorKind::Conflict);

    let own = ladder
        .service
        .approve_correction(&alice, correction.id)
        .unwrap_err();
    assert_eq!(own.kind(), ErrorKind::Unauthorized);

    ladder.service.approve_correction(&bob, correction.id).unwrap();
    assert_eq!(ladder.rank("alice"), Some(2));
    assert_eq!(ladder.rank("bob"), Some(3));
    assert_eq!(ladder.player("alice").wins, 1);
}

#[test]
fn test_predictions_resolve_when_match_completes() {
    let ladder = ladder();
    ladder.seed(&["carol", "bob", "alice"]);
    let alice = Actor::player("alice");
    let bob = Actor::player("bob");

    let challenge = ladder.service.challenge(&alice, "bob").unwrap();
    let early = ladder
        .service
        .predict(&Actor::player("carol"), challenge.id, "alice")
        .unwrap_err();
    assert_eq!(early.kind(), ErrorKind::Conflict);

    ladder.service.accept(&bob, challenge.id).unwrap();
    ladder
        .service
        .predict(&Actor::player("carol"), challenge.id, "bob")
        .unwrap();
    ladder
        .service
        .predict(&Actor::player("carol"), challenge.id, "alice")
        .unwrap();
    ladder
        .service
        .predict(&Actor::player("dave"), challenge.id, "bob")
        .unwrap();
    let own = ladder.service.predict(&alice, challenge.id, "alice").unwrap_err();
    assert_eq!(own.kind(), ErrorKind::Unauthorized);

    let result = ladder
        .service
        .submit_result(&alice, challenge.id, &["10-5", "10-7"])
        .unwrap();
    ladder.service.confirm_result(&bob, result.id).unwrap();

    let carol = ladder.service.prediction_stats("carol").unwrap();
    assert_eq!((carol.total, carol.correct), (1, 1));
    let dave = ladder.service.prediction_stats("dave").unwrap();
    assert_eq!((dave.total, dave.correct), (1, 0));
}

#[test]
fn test_reminders_are_sent_once_per_interval() {
    let ladder = ladder();
    ladder.seed(&["carol", "bob", "alice"]);
    let alice = Actor::player("alice");
    let bob = Actor::player("bob");

    let challenge = ladder.service.challenge(&alice, "bob").unwrap();
    ladder.service.accept(&bob, challenge.id).unwrap();

    ladder.clock.advance(Duration::minutes(5));
    let report = ladder.service.send_reminders().unwrap();
    assert_eq!(report.challenges, 1);
    assert_eq!(ladder.service.send_reminders().unwrap().total(), 0);

    ladder.clock.advance(Duration::minutes(29));
    assert_eq!(ladder.service.send_reminders().unwrap().total(), 0);
    ladder.clock.advance(Duration::minutes(1));
    assert_eq!(ladder.service.send_reminders().unwrap().challenges, 1);

    ladder
        .service
        .submit_result(&alice, challenge.id, &["10-5", "10-7"])
        .unwrap();
    ladder.clock.advance(Duration::minutes(31));
    let report = ladder.service.send_reminders().unwrap();
    assert_eq!(report.challenges, 0);
    assert_eq!(report.results, 1);
    assert_eq!(ladder.notices.count_for(&Audience::Player("bob".to_string())), 1);
}

#[test]
fn test_each_reminder_category_is_stamped_separately() {
    let ladder = ladder();
    ladder.seed(&["dave", "carol", "bob", "alice", "erin", "frank"]);
    let alice = Actor::player("alice");
    let bob = Actor::player("bob");
    let carol = Actor::player("carol");
    let dave = Actor::player("dave");
    let erin = Actor::player("erin");
    let frank = Actor::player("frank");

    // One challenge with no score, one with an unconfirmed score, one disputed.
    let scoreless = ladder.service.challenge(&alice, "bob").unwrap();
    ladder.service.accept(&bob, scoreless.id).unwrap();

    let unconfirmed = ladder.service.challenge(&carol, "dave").unwrap();
    ladder.service.accept(&dave, unconfirmed.id).unwrap();
    ladder
        .service
        .submit_result(&carol, unconfirmed.id, &["10-5", "10-7"])
        .unwrap();

    let disputed = ladder.service.challenge(&frank, "erin").unwrap();
    ladder.service.accept(&erin, disputed.id).unwrap();
    let result = ladder
        .service
        .submit_result(&frank, disputed.id, &["10-5", "10-7"])
        .unwrap();
    ladder.service.dispute_result(&erin, result.id).unwrap();
    let reviewer_alerts = ladder.notices.count_for(&Audience::Reviewers);

    let report = ladder.service.send_reminders().unwrap();
    assert_eq!(report.challenges, 1);
    assert_eq!(report.results, 0);
    assert_eq!(report.disputes, 1);
    assert_eq!(
        ladder.notices.count_for(&Audience::Reviewers),
        reviewer_alerts + 1
    );

    ladder.clock.advance(Duration::minutes(30));
    let report = ladder.service.send_reminders().unwrap();
    assert_eq!((report.challenges, report.results, report.disputes), (1, 1, 1));
    assert_eq!(ladder.notices.count_for(&Audience::Player("dave".to_string())), 1);

    assert_eq!(ladder.service.send_reminders().unwrap().total(), 0);
}

#[test]
fn test_leaderboard_refreshes_when_cooldown_ends() {
    let ladder = ladder();
    ladder.seed(&["bob", "alice"]);
    let alice = Actor::player("alice");
    let bob = Actor::player("bob");

    let challenge = ladder.service.challenge(&alice, "bob").unwrap();
    ladder.service.accept(&bob, challenge.id).unwrap();
    let result = ladder
        .service
        .submit_result(&alice, challenge.id, &["10-5", "10-7"])
        .unwrap();
    ladder.service.confirm_result(&bob, result.id).unwrap();

    let renders = ladder.renders.renders();
    assert!(!ladder.service.refresh_if_due());
    ladder.clock.advance(Duration::hours(8));
    assert!(ladder.service.refresh_if_due());
    assert_eq!(ladder.renders.renders(), renders + 1);
    assert_eq!(ladder.service.queued_refreshes(), 0);
}

#[test]
fn test_unranked_challenger_takes_open_rank_in_three_sets() {
    let ladder = ladder();
    let names: Vec<String> = (1..=10).map(|rank| format!("p{rank}")).collect();
    let seeded: Vec<&str> = names.iter().map(String::as_str).collect();
    ladder.seed(&seeded);
    let rookie = Actor::player("rookie");

    let challenge = ladder.service.challenge(&rookie, "p9").unwrap();
    ladder
        .service
        .accept(&Actor::player("p9"), challenge.id)
        .unwrap();
    let result = ladder
        .service
        .submit_result(&rookie, challenge.id, &["10-8", "7-10", "10-9"])
        .unwrap();
    ladder
        .service
        .confirm_result(&Actor::player("p9"), result.id)
        .unwrap();

    let player = ladder.player("rookie");
    assert_eq!(player.rank, Some(9));
    assert_eq!(player.win_streak, 1);
    assert_eq!(player.comeback_wins, 0);
    assert_eq!(player.perfect_matches, 0);
    assert_eq!(ladder.rank("p9"), Some(10));
    assert_eq!(ladder.rank("p10"), None);

    let history = ladder.service.history("rookie", 1).unwrap();
    assert_eq!((history[0].sets_won, history[0].sets_lost), (2, 1));
    assert!(!history[0].was_comeback);
}

#[test]
fn test_perfect_title_defense() {
    let ladder = ladder();
    ladder.seed(&["a", "b", "champ", "hopeful"]);
    let hopeful = Actor::player("hopeful");
    let champ = Actor::player("champ");

    let challenge = ladder.service.challenge(&hopeful, "champ").unwrap();
    ladder.service.accept(&champ, challenge.id).unwrap();
    let result = ladder
        .service
        .submit_result(&hopeful, challenge.id, &["3-10", "4-10"])
        .unwrap();
    ladder.service.confirm_result(&champ, result.id).unwrap();

    let defender = ladder.player("champ");
    assert_eq!(defender.rank, Some(3));
    assert_eq!(defender.title_defenses, 1);
    assert_eq!(defender.perfect_matches, 1);
    assert_eq!(defender.comeback_wins, 0);
    assert_eq!(ladder.rank("hopeful"), Some(4));
}
