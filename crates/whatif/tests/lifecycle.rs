//! End-to-end generation lifecycle: create, run, refine, feedback, publish.

mod common;

use std::sync::Arc;

use chrono::Utc;
use common::{RejectingProvider, TestHarness};
use whatif::db::generation_repo;
use whatif::service::{FeedbackRequest, PublishRequest, RefineRequest};
use whatif::{GenerationStatus, GenerationType};

fn rank(status: GenerationStatus) -> u8 {
    match status {
        GenerationStatus::Queued => 0,
        GenerationStatus::Running => 1,
        GenerationStatus::Complete | GenerationStatus::Failed => 2,
    }
}

#[tokio::test]
async fn test_image_round_trip_completes_with_assets() {
    let harness = TestHarness::new();
    let created = harness
        .create("what if whales could fly over Tokyo", GenerationType::Image)
        .await;
    assert_eq!(created.status, GenerationStatus::Queued);

    let report = harness.runner.process_queued().await.unwrap();
    assert_eq!(report.picked, 1);
    assert_eq!(report.succeeded, 1);

    let stored = harness.stored(&created.generation_id);
    assert_eq!(stored.status, GenerationStatus::Complete);
    assert!(stored.error.is_none());
    let urls = stored.asset_urls.clone().unwrap();
    assert!(!urls.is_empty());
    assert!(urls[0].starts_with("http://assets.test/assets/"));

    let key = urls[0].trim_start_matches("http://assets.test/assets/");
    assert!(harness.asset_dir().join(key).exists());

    let fetched = harness.service.get_generation(&created.generation_id).unwrap();
    assert!(fetched.asset_urls.unwrap()[0].contains("signature="));
}

#[tokio::test]
async fn test_video_round_trip_completes() {
    let harness = TestHarness::new();
    let created = harness
        .create("what if the tide carried lanterns", GenerationType::Video)
        .await;

    harness.runner.process_queued().await.unwrap();

    let stored = harness.stored(&created.generation_id);
    assert_eq!(stored.status, GenerationStatus::Complete);
    assert!(!stored.asset_urls.unwrap().is_empty());
    let metadata = stored.metadata.unwrap();
    assert!(metadata.contains_key("jobId"));
}

#[tokio::test]
async fn test_provider_failure_marks_failed() {
    let harness = TestHarness::with_media(Arc::new(RejectingProvider));
    let image = harness
        .create("what if whales could fly over Tokyo", GenerationType::Image)
        .await;
    let video = harness
        .create("what if the tide carried lanterns", GenerationType::Video)
        .await;

    let report = harness.runner.process_queued().await.unwrap();
    assert_eq!(report.failed, 2);

    for id in [&image.generation_id, &video.generation_id] {
        let stored = harness.stored(id);
        assert_eq!(stored.status, GenerationStatus::Failed);
        let error = stored.error.expect("error recorded");
        assert!(error.contains("quota exceeded"), "{}", error);
        assert!(stored.asset_urls.is_none());
    }
    assert_eq!(harness.runner.status().failed, 2);
}

#[tokio::test]
async fn test_status_never_moves_backward() {
    let harness = TestHarness::new();
    let mut ids = Vec::new();
    for prompt in [
        "what if whales could fly over Tokyo",
        "what if the moon were a lantern",
        "what if trees grew upside down",
    ] {
        ids.push(harness.create(prompt, GenerationType::Image).await.generation_id);
    }

    let mut last: Vec<u8> = ids.iter().map(|id| rank(harness.stored(id).status)).collect();
    for _ in 0..3 {
        harness.runner.process_queued().await.unwrap();
        for (i, id) in ids.iter().enumerate() {
            let now = rank(harness.stored(id).status);
            assert!(now >= last[i], "{} moved backward", id);
            last[i] = now;
        }
    }

    let finished = harness.stored(&ids[0]);
    assert_eq!(finished.status, GenerationStatus::Complete);
    assert!(generation_repo::transition_status(
        &harness.db,
        &ids[0],
        GenerationStatus::Complete,
        GenerationStatus::Running,
        Utc::now(),
    )
    .is_err());
    assert!(!generation_repo::transition_status(
        &harness.db,
        &ids[0],
        GenerationStatus::Queued,
        GenerationStatus::Running,
        Utc::now(),
    )
    .unwrap());

    // Later cycles leave completed rows alone.
    let report = harness.runner.process_queued().await.unwrap();
    assert_eq!(report.picked, 0);
    assert_eq!(harness.stored(&ids[0]).updated_at, finished.updated_at);
}

#[tokio::test]
async fn test_get_generation_is_idempotent() {
    let harness = TestHarness::new();
    let created = harness
        .create("what if whales could fly over Tokyo", GenerationType::Image)
        .await;
    harness.runner.process_queued().await.unwrap();

    let first = harness.service.get_generation(&created.generation_id).unwrap();
    let second = harness.service.get_generation(&created.generation_id).unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_refine_feedback_publish_journey() {
    let harness = TestHarness::new();
    let original = harness
        .create("what if the moon were a lantern", GenerationType::Image)
        .await;
    harness.runner.process_queued().await.unwrap();

    harness
        .service
        .submit_feedback(FeedbackRequest {
            generation_id: original.generation_id.clone(),
            matches_intent: false,
            note: Some("  needs more stars  ".to_string()),
        })
        .unwrap();
    let feedback = harness
        .stored(&original.generation_id)
        .alignment_feedback
        .unwrap();
    assert!(!feedback.matches_intent);
    assert_eq!(feedback.note.as_deref(), Some("needs more stars"));

    let refined = harness
        .service
        .refine_generation(
            &original.generation_id,
            RefineRequest {
                guidance: "add more stars and warmer lighting".to_string(),
                model: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(refined.refinement_of, original.generation_id);
    assert_eq!(refined.status, GenerationStatus::Queued);
    assert!(refined.improvements.iter().any(|i| i == "Added more detail"));

    harness.runner.process_queued().await.unwrap();
    let stored = harness.stored(&refined.generation_id);
    assert_eq!(stored.status, GenerationStatus::Complete);
    assert_eq!(stored.refinement_of.as_deref(), Some(original.generation_id.as_str()));

    let post = harness
        .service
        .publish(PublishRequest {
            generation_id: refined.generation_id.clone(),
            author_id: "author-1".to_string(),
            caption: Some("Lantern moon, take two".to_string()),
        })
        .unwrap();
    assert!(post.cover_url.as_deref().unwrap().contains("signature="));

    let page = harness.service.feed(None, None).unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].id, post.id);
    assert_eq!(page.next_offset, None);
}
