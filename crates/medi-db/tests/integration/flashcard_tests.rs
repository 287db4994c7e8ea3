use chrono::{TimeDelta, Utc};
use medi_core::AppError;
use medi_core::flashcard::{CategoryDraft, FlashcardDraft, FlashcardFilter, NewFlashcardSession};
use medi_core::scheduling::Confidence;

use crate::integration::common::{create_user, setup_test_db};

fn card(front: &str) -> FlashcardDraft {
    FlashcardDraft {
        category_id: None,
        front: front.to_string(),
        back: "answer".into(),
        tags: vec![],
    }
}

fn category(name: &str) -> CategoryDraft {
    CategoryDraft {
        name: name.to_string(),
        description: None,
        color: Some("#ff0000".into()),
    }
}

#[tokio::test]
async fn confidence_schedules_next_review() {
    let (db, _container) = setup_test_db().await;
    let repo = db.flashcard_repo();
    let user = create_user(&db, "learner").await;
    let created = repo.create(user.id, &card("Normal K+ range?")).await.unwrap();
    assert_eq!(created.confidence, 0);
    assert!(created.next_review_at.is_none());

    let reviewed_at = Utc::now();
    let updated = repo
        .record_confidence(created.id, user.id, Confidence::parse(4).unwrap(), reviewed_at)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.confidence, 4);
    assert_eq!(updated.review_count, 1);
    let delta = updated.next_review_at.unwrap() - updated.last_reviewed_at.unwrap();
    assert_eq!(delta, TimeDelta::days(14));

    // Someone else's card is invisible to the update.
    let other = create_user(&db, "other").await;
    assert!(repo
        .record_confidence(created.id, other.id, Confidence::parse(1).unwrap(), reviewed_at)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn due_filter_lists_new_and_overdue_cards() {
    let (db, _container) = setup_test_db().await;
    let repo = db.flashcard_repo();
    let user = create_user(&db, "learner").await;
    let now = Utc::now();

    let fresh = repo.create(user.id, &card("fresh")).await.unwrap();
    let later = repo.create(user.id, &card("later")).await.unwrap();
    repo.record_confidence(later.id, user.id, Confidence::parse(5).unwrap(), now)
        .await
        .unwrap();

    let due = FlashcardFilter {
        due_only: true,
        limit: 20,
        ..Default::default()
    };
    let listed = repo.list(user.id, &due, now).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, fresh.id);

    let in_a_month = now + TimeDelta::days(31);
    assert_eq!(repo.list(user.id, &due, in_a_month).await.unwrap().len(), 2);
}

#[tokio::test]
async fn categories_are_unique_per_owner_and_count_cards() {
    let (db, _container) = setup_test_db().await;
    let repo = db.flashcard_repo();
    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;

    let renal = repo.create_category(alice.id, &category("Renal")).await.unwrap();
    assert_eq!(renal.card_count, 0);
    assert!(matches!(
        repo.create_category(alice.id, &category("Renal")).await,
        Err(AppError::Conflict(_))
    ));
    // Same name for another owner is fine.
    repo.create_category(bob.id, &category("Renal")).await.unwrap();

    let mut in_category = card("GFR formula?");
    in_category.category_id = Some(renal.id);
    let created = repo.create(alice.id, &in_category).await.unwrap();

    // Bob cannot file cards under Alice's category.
    assert!(matches!(
        repo.create(bob.id, &in_category).await,
        Err(AppError::Validation(_))
    ));

    let listed = repo.list_categories(alice.id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].card_count, 1);

    let filter = FlashcardFilter {
        category_id: Some(renal.id),
        limit: 20,
        ..Default::default()
    };
    assert_eq!(repo.list(alice.id, &filter, Utc::now()).await.unwrap().len(), 1);

    // Deleting the category keeps the card, uncategorized.
    assert!(repo.delete_category(renal.id, alice.id).await.unwrap());
    let card = repo.get(created.id).await.unwrap().unwrap();
    assert!(card.category_id.is_none());
}

#[tokio::test]
async fn update_and_delete_require_owner() {
    let (db, _container) = setup_test_db().await;
    let repo = db.flashcard_repo();
    let owner = create_user(&db, "owner").await;
    let stranger = create_user(&db, "stranger").await;
    let created = repo.create(owner.id, &card("Q")).await.unwrap();

    assert!(repo
        .update(created.id, stranger.id, &card("hijacked"))
        .await
        .unwrap()
        .is_none());
    let updated = repo
        .update(created.id, owner.id, &card("Q2"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.front, "Q2");

    assert!(!repo.delete(created.id, stranger.id).await.unwrap());
    assert!(repo.delete(created.id, owner.id).await.unwrap());
}

#[tokio::test]
async fn sessions_are_recorded_and_feed_stats() {
    let (db, _container) = setup_test_db().await;
    let repo = db.flashcard_repo();
    let user = create_user(&db, "learner").await;
    let now = Utc::now();

    let a = repo.create(user.id, &card("a")).await.unwrap();
    repo.create(user.id, &card("b")).await.unwrap();
    repo.record_confidence(a.id, user.id, Confidence::parse(5).unwrap(), now)
        .await
        .unwrap();

    let session = repo
        .create_session(
            user.id,
            &NewFlashcardSession {
                category_id: None,
                cards_studied: 10,
                correct_count: 7,
                duration_secs: 600,
            },
            now,
        )
        .await
        .unwrap();
    assert_eq!(session.ended_at - session.started_at, TimeDelta::seconds(600));
    assert_eq!(repo.list_sessions(user.id, 10).await.unwrap().len(), 1);

    let stats = db.stats_repo().compute(user.id, now).await.unwrap();
    assert_eq!(stats.total_cards, 2);
    assert_eq!(stats.due_cards, 1);
    assert_eq!(stats.mastered_cards, 1);
    assert_eq!(stats.average_confidence, 5.0);
    assert_eq!(stats.session_count, 1);
    assert_eq!(stats.cards_studied, 10);
    assert_eq!(stats.total_study_secs, 600);
    assert_eq!(stats.session_accuracy, 70.0);
    assert_eq!(stats.quiz_attempts, 0);
    assert_eq!(stats.computed_at, now);
}
