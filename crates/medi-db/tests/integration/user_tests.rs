use chrono::{NaiveDate, TimeDelta, Utc};
use medi_core::gamification::{Achievement, ProgressEvent};
use medi_core::models::compute_hash;
use medi_core::user::{ProfileUpdate, Role, VerifiedIdentity};

use crate::integration::common::{create_user, setup_test_db};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
}

#[tokio::test]
async fn upsert_identity_is_idempotent() {
    let (db, _container) = setup_test_db().await;
    let repo = db.user_repo();

    let first = create_user(&db, "uid-1").await;
    assert_eq!(first.role, Role::Student);
    assert_eq!(first.level, 1);
    assert_eq!(first.xp, 0);

    let again = repo
        .upsert_identity(&VerifiedIdentity {
            uid: "uid-1".into(),
            email: Some("new@example.test".into()),
            display_name: Some("Other Name".into()),
            email_verified: true,
        })
        .await
        .unwrap();

    assert_eq!(again.id, first.id);
    assert_eq!(again.email.as_deref(), Some("new@example.test"));
    // Existing display name is kept.
    assert_eq!(again.display_name.as_deref(), Some("uid-1"));
}

#[tokio::test]
async fn sessions_expire_and_are_purged() {
    let (db, _container) = setup_test_db().await;
    let repo = db.user_repo();
    let user = create_user(&db, "uid-s").await;
    let now = Utc::now();

    let live = compute_hash("live-token");
    let stale = compute_hash("stale-token");
    repo.create_session(user.id, &live, now + TimeDelta::hours(1))
        .await
        .unwrap();
    repo.create_session(user.id, &stale, now - TimeDelta::hours(1))
        .await
        .unwrap();

    let found = repo.find_session_user(&live, now).await.unwrap().unwrap();
    assert_eq!(found.id, user.id);
    assert!(repo.find_session_user(&stale, now).await.unwrap().is_none());

    assert_eq!(repo.purge_expired_sessions(now).await.unwrap(), 1);
    assert!(repo.delete_session(&live).await.unwrap());
    assert!(!repo.delete_session(&live).await.unwrap());
    assert!(repo.find_session_user(&live, now).await.unwrap().is_none());
}

#[tokio::test]
async fn record_progress_updates_xp_level_and_streak() {
    let (db, _container) = setup_test_db().await;
    let repo = db.user_repo();
    let user = create_user(&db, "uid-p").await;

    let manual = ProgressEvent::manual(150, "welcome bonus").unwrap();
    let outcome = repo.record_progress(user.id, &manual, day(1)).await.unwrap();
    assert_eq!(outcome.update.xp_gained, 150);
    assert_eq!(outcome.update.xp, 150);
    assert_eq!(outcome.update.level, 2);
    assert!(outcome.update.leveled_up);
    assert_eq!(outcome.update.streak_days, 1);

    // Same day: streak unchanged. Next day: +1. Gap: reset.
    let study = ProgressEvent::study_time(30).unwrap();
    let same_day = repo.record_progress(user.id, &study, day(1)).await.unwrap();
    assert_eq!(same_day.update.streak_days, 1);
    let next_day = repo.record_progress(user.id, &study, day(2)).await.unwrap();
    assert_eq!(next_day.update.streak_days, 2);
    let after_gap = repo.record_progress(user.id, &study, day(5)).await.unwrap();
    assert_eq!(after_gap.update.streak_days, 1);

    let stored = repo.find_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(stored.xp, 150 + 3 * 30);
    assert_eq!(stored.study_minutes, 90);
    assert_eq!(stored.last_active_date, Some(day(5)));

    let activity = repo.list_activity(user.id, 10).await.unwrap();
    assert_eq!(activity.len(), 4);
    assert_eq!(activity.last().unwrap().kind, "xp_awarded");
}

#[tokio::test]
async fn achievements_unlock_once() {
    let (db, _container) = setup_test_db().await;
    let repo = db.user_repo();
    let user = create_user(&db, "uid-a").await;

    // 1600 XP reaches level 5.
    let big = ProgressEvent::manual(1000, "a").unwrap();
    repo.record_progress(user.id, &big, day(1)).await.unwrap();
    let second = repo
        .record_progress(user.id, &ProgressEvent::manual(600, "b").unwrap(), day(1))
        .await
        .unwrap();
    assert_eq!(second.update.level, 5);
    assert_eq!(second.unlocked, vec![Achievement::Level5]);

    let third = repo
        .record_progress(user.id, &ProgressEvent::manual(1, "c").unwrap(), day(1))
        .await
        .unwrap();
    assert!(third.unlocked.is_empty());

    let all = repo.list_achievements(user.id).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].code, "level_5");
    assert_eq!(all[0].title, "Level 5");
}

#[tokio::test]
async fn record_progress_for_unknown_user_is_not_found() {
    let (db, _container) = setup_test_db().await;
    let err = db
        .user_repo()
        .record_progress(uuid::Uuid::new_v4(), &ProgressEvent::CaseRated, day(1))
        .await
        .unwrap_err();
    assert!(matches!(err, medi_core::AppError::NotFound(_)));
}

#[tokio::test]
async fn profile_role_and_leaderboard() {
    let (db, _container) = setup_test_db().await;
    let repo = db.user_repo();
    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;

    let updated = repo
        .update_profile(
            alice.id,
            &ProfileUpdate {
                specialty: Some("Cardiology".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.specialty.as_deref(), Some("Cardiology"));
    assert_eq!(updated.display_name.as_deref(), Some("alice"));

    let promoted = repo
        .set_role("ALICE@example.test", Role::Educator)
        .await
        .unwrap();
    assert_eq!(promoted.id, alice.id);
    assert_eq!(promoted.role, Role::Educator);
    assert!(repo.set_role("nobody@example.test", Role::Admin).await.is_err());

    repo.record_progress(bob.id, &ProgressEvent::manual(50, "x").unwrap(), day(1))
        .await
        .unwrap();
    let board = repo.leaderboard(10).await.unwrap();
    assert_eq!(board[0].user_id, bob.id);
    assert_eq!(board[0].xp, 50);
    assert_eq!(board.len(), 2);
}
