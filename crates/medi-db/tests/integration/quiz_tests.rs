use medi_core::models::Difficulty;
use medi_core::quiz::{Question, QuizDraft, QuizSource, analyze, grade};

use crate::integration::common::{create_user, setup_test_db};

fn questions() -> Vec<Question> {
    vec![
        Question {
            prompt: "First-line drug for anaphylaxis?".into(),
            options: vec!["Adrenaline".into(), "Chlorphenamine".into()],
            correct_index: 0,
            explanation: None,
        },
        Question {
            prompt: "Route?".into(),
            options: vec!["IV".into(), "IM".into(), "PO".into()],
            correct_index: 1,
            explanation: Some("IM into the anterolateral thigh".into()),
        },
    ]
}

fn quiz_draft(is_public: bool) -> QuizDraft {
    QuizDraft {
        title: "Anaphylaxis".into(),
        topic: "Emergency medicine".into(),
        difficulty: Difficulty::Beginner,
        case_id: None,
        questions: questions(),
        is_public,
        time_limit_secs: Some(300),
    }
}

#[tokio::test]
async fn quiz_roundtrips_questions_and_visibility() {
    let (db, _container) = setup_test_db().await;
    let repo = db.quiz_repo();
    let owner = create_user(&db, "owner").await;
    let other = create_user(&db, "other").await;

    let private = repo
        .create(owner.id, &quiz_draft(false), QuizSource::Manual)
        .await
        .unwrap();
    let public = repo
        .create(owner.id, &quiz_draft(true), QuizSource::Generated)
        .await
        .unwrap();

    let loaded = repo.get(private.id).await.unwrap().unwrap();
    assert_eq!(loaded.questions, questions());
    assert_eq!(loaded.time_limit_secs, Some(300));
    assert_eq!(public.source, QuizSource::Generated);

    assert_eq!(repo.list(owner.id, false, 20, 0).await.unwrap().len(), 2);
    let visible = repo.list(other.id, false, 20, 0).await.unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, public.id);
    assert!(repo.list(other.id, true, 20, 0).await.unwrap().is_empty());

    let mut changed = quiz_draft(true);
    changed.title = "Anaphylaxis v2".into();
    let updated = repo.update(private.id, &changed).await.unwrap().unwrap();
    assert_eq!(updated.title, "Anaphylaxis v2");
    assert!(updated.is_public);

    assert!(repo.delete(private.id).await.unwrap());
    assert!(repo.get(private.id).await.unwrap().is_none());
}

#[tokio::test]
async fn attempts_are_stored_and_analyzed() {
    let (db, _container) = setup_test_db().await;
    let repo = db.quiz_repo();
    let owner = create_user(&db, "owner").await;
    let learner = create_user(&db, "learner").await;
    let quiz = repo
        .create(owner.id, &quiz_draft(true), QuizSource::Manual)
        .await
        .unwrap();

    for (user, answers) in [
        (learner.id, vec![Some(0), Some(1)]),
        (learner.id, vec![Some(0), None]),
        (owner.id, vec![Some(1), Some(0)]),
    ] {
        let result = grade(&quiz.questions, &answers).unwrap();
        repo.record_attempt(quiz.id, user, &answers, &result, 60, 10)
            .await
            .unwrap();
    }

    let mine = repo.list_attempts(quiz.id, Some(learner.id)).await.unwrap();
    assert_eq!(mine.len(), 2);
    assert!(mine.iter().any(|a| a.answers == vec![Some(0), None]));

    let all = repo.list_attempts(quiz.id, None).await.unwrap();
    assert_eq!(all.len(), 3);

    let analytics = analyze(&quiz.questions, &all);
    assert_eq!(analytics.attempt_count, 3);
    assert_eq!(analytics.unique_participants, 2);
    assert_eq!(analytics.max_score, 100.0);
    assert_eq!(analytics.min_score, 0.0);
    assert_eq!(analytics.median_score, 50.0);

    // Attempts go with the quiz.
    repo.delete(quiz.id).await.unwrap();
    assert!(repo.list_attempts(quiz.id, None).await.unwrap().is_empty());
}
