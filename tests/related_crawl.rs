mod common;

use common::{FlakyStorage, MockClient, settings, video};
use tempfile::TempDir;

use vidcrawl::models::RelatedConfig;
use vidcrawl::pipeline::{CrawlPhase, RelatedCrawler, StepOutcome};
use vidcrawl::storage::{LocalStorage, SnapshotStorage};
use vidcrawl::table::Table;

fn seeds(videos: Vec<vidcrawl::models::Record>) -> Table {
    Table::from_rows(videos)
}

#[tokio::test]
async fn test_step_keeps_matching_related_and_queues_them() {
    let dir = TempDir::new().unwrap();
    let storage = LocalStorage::new(dir.path());
    let client = MockClient::new().with_video(
        video("vid1", "pm", "Carney rally in Ottawa"),
        vec![
            video("vid2", "news", "Carney speech highlights"),
            video("vid3", "chef", "cooking tutorial"),
        ],
    );
    let keys = RelatedConfig::default();

    let mut crawler = RelatedCrawler::new(&client, &storage, settings(&["carney"]), keys.clone());
    crawler
        .load(&seeds(vec![video("vid1", "pm", "Carney rally in Ottawa")]))
        .await
        .unwrap();
    assert_eq!(crawler.queue().len(), 1);

    let outcome = crawler.step().await.unwrap();
    match outcome {
        StepOutcome::Merged { video_id, related, flushed } => {
            assert_eq!(video_id, "vid1");
            assert_eq!(related, 1);
            assert!(!flushed.any());
        }
        other => panic!("unexpected outcome {other:?}"),
    }

    assert_eq!(crawler.fetched().len(), 1);
    assert_eq!(crawler.related().len(), 1);
    assert_eq!(crawler.queue().len(), 1);
    assert_eq!(crawler.queue().peek_next().unwrap().video_id, "vid2");
    assert!(crawler.fetched().iter().all(|r| r.scrape_date().is_some()));
    assert_eq!(crawler.phase(), CrawlPhase::Idle);

    // Below the checkpoint threshold nothing is written yet.
    assert!(!storage.path(&keys.fetched).exists());
}

#[tokio::test]
async fn test_related_entry_for_fetched_video_is_dropped() {
    let dir = TempDir::new().unwrap();
    let storage = LocalStorage::new(dir.path());
    let client = MockClient::new().with_video(
        video("vid1", "pm", "carney rally"),
        vec![video("vid1", "pm", "carney rally")],
    );

    let mut crawler =
        RelatedCrawler::new(&client, &storage, settings(&["carney"]), RelatedConfig::default());
    crawler
        .load(&seeds(vec![video("vid1", "pm", "carney rally")]))
        .await
        .unwrap();
    crawler.step().await.unwrap();

    assert_eq!(crawler.fetched().len(), 1);
    assert_eq!(crawler.related().len(), 0);
    assert!(crawler.queue().is_empty());
}

#[tokio::test]
async fn test_fetch_error_skips_head_without_touching_stores() {
    let dir = TempDir::new().unwrap();
    let storage = LocalStorage::new(dir.path());
    let client = MockClient::new()
        .with_failure("vid1")
        .with_video(video("vid2", "news", "carney"), vec![video("vid9", "x", "carney")]);
    let keys = RelatedConfig::default();

    let mut crawler = RelatedCrawler::new(&client, &storage, settings(&["carney"]), keys.clone());
    crawler
        .load(&seeds(vec![
            video("vid1", "pm", "carney rally"),
            video("vid2", "news", "carney"),
        ]))
        .await
        .unwrap();
    assert_eq!(crawler.queue().len(), 2);

    let outcome = crawler.step().await.unwrap();
    assert!(matches!(outcome, StepOutcome::Skipped { ref video_id, .. } if video_id == "vid1"));
    assert_eq!(crawler.queue().len(), 1);
    assert_eq!(crawler.queue().peek_next().unwrap().video_id, "vid2");
    assert!(crawler.fetched().is_empty());
    assert!(crawler.related().is_empty());
    assert_eq!(crawler.summary().skipped, 1);
    assert!(!storage.path(&keys.fetched).exists());
}

#[tokio::test]
async fn test_empty_related_list_is_skipped() {
    let dir = TempDir::new().unwrap();
    let storage = LocalStorage::new(dir.path());
    let client = MockClient::new().with_video(video("vid1", "pm", "carney"), Vec::new());

    let mut crawler =
        RelatedCrawler::new(&client, &storage, settings(&["carney"]), RelatedConfig::default());
    crawler
        .load(&seeds(vec![video("vid1", "pm", "carney")]))
        .await
        .unwrap();

    let outcome = crawler.step().await.unwrap();
    assert!(matches!(outcome, StepOutcome::Skipped { .. }));
    assert!(crawler.fetched().is_empty());
    assert!(crawler.queue().is_empty());
}

#[tokio::test]
async fn test_checkpoint_threshold_writes_primary_snapshots() {
    let dir = TempDir::new().unwrap();
    let storage = LocalStorage::new(dir.path());
    let related: Vec<_> = (0..10)
        .map(|i| video(&format!("r{i}"), "news", "Carney on the trail"))
        .collect();
    let client = MockClient::new().with_video(video("vid1", "pm", "carney"), related);
    let keys = RelatedConfig::default();

    let mut crawler = RelatedCrawler::new(&client, &storage, settings(&["carney"]), keys.clone());
    crawler
        .load(&seeds(vec![video("vid1", "pm", "carney")]))
        .await
        .unwrap();

    match crawler.step().await.unwrap() {
        StepOutcome::Merged { related, flushed, .. } => {
            assert_eq!(related, 10);
            assert!(flushed.primary);
            assert!(!flushed.backup);
        }
        other => panic!("unexpected outcome {other:?}"),
    }

    let fetched = storage.read_table(&keys.fetched).await.unwrap().unwrap();
    let stored_related = storage.read_table(&keys.related).await.unwrap().unwrap();
    assert_eq!(fetched.len(), 1);
    assert_eq!(stored_related.len(), 10);
    assert!(!storage.path(&keys.backup_fetched).exists());
}

#[tokio::test]
async fn test_run_until_done_writes_final_snapshots() {
    let dir = TempDir::new().unwrap();
    let storage = LocalStorage::new(dir.path());
    let client = MockClient::new()
        .with_video(
            video("vid1", "pm", "carney rally"),
            vec![video("vid2", "news", "carney speech")],
        )
        .with_video(
            video("vid2", "news", "carney speech"),
            vec![video("vid1", "pm", "carney rally")],
        );
    let keys = RelatedConfig::default();

    let mut crawler = RelatedCrawler::new(&client, &storage, settings(&["carney"]), keys.clone());
    crawler
        .load(&seeds(vec![video("vid1", "pm", "carney rally")]))
        .await
        .unwrap();

    let summary = crawler.run().await.unwrap();
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.fetched_total, 2);
    assert_eq!(summary.related_total, 0);
    assert_eq!(crawler.phase(), CrawlPhase::Done);
    assert!(crawler.queue().peek_next().is_none());
    assert_eq!(crawler.step().await.unwrap(), StepOutcome::Done);

    let fetched = storage.read_table(&keys.fetched).await.unwrap().unwrap();
    assert_eq!(fetched.ids().len(), 2);
    assert_eq!(client.count_calls("detail:"), 2);
}

#[tokio::test]
async fn test_resume_skips_already_fetched_seeds() {
    let dir = TempDir::new().unwrap();
    let storage = LocalStorage::new(dir.path());
    let keys = RelatedConfig::default();
    storage
        .write_table(
            &keys.fetched,
            &Table::from_rows(vec![video("vid1", "pm", "carney rally")]),
        )
        .await
        .unwrap();
    storage
        .write_table(
            &keys.related,
            &Table::from_rows(vec![
                video("vid1", "pm", "carney rally"),
                video("vid7", "news", "carney town hall"),
            ]),
        )
        .await
        .unwrap();

    let client = MockClient::new();
    let mut crawler = RelatedCrawler::new(&client, &storage, settings(&["carney"]), keys);
    crawler
        .load(&seeds(vec![
            video("vid1", "pm", "carney rally"),
            video("vid5", "pm", "carney debate"),
        ]))
        .await
        .unwrap();

    assert_eq!(crawler.fetched().len(), 1);
    assert_eq!(crawler.related().ids().len(), 1);
    assert!(!crawler.queue().contains("vid1"));
    assert!(crawler.queue().contains("vid5"));
    assert!(crawler.queue().contains("vid7"));
    assert_eq!(crawler.queue().len(), 2);
}

#[tokio::test]
async fn test_damaged_store_restores_from_backup() {
    let dir = TempDir::new().unwrap();
    let storage = LocalStorage::new(dir.path());
    let keys = RelatedConfig::default();
    storage.write_bytes(&keys.fetched, b"truncated").await.unwrap();
    storage
        .write_table(
            &keys.backup_fetched,
            &Table::from_rows(vec![video("vid1", "pm", "carney rally")]),
        )
        .await
        .unwrap();

    let client = MockClient::new();
    let mut crawler = RelatedCrawler::new(&client, &storage, settings(&["carney"]), keys);
    crawler
        .load(&seeds(vec![video("vid1", "pm", "carney rally")]))
        .await
        .unwrap();

    assert_eq!(crawler.fetched().len(), 1);
    assert!(crawler.queue().is_empty());
}

#[tokio::test]
async fn test_damaged_store_without_backup_aborts() {
    let dir = TempDir::new().unwrap();
    let storage = LocalStorage::new(dir.path());
    let keys = RelatedConfig::default();
    storage.write_bytes(&keys.related, b"truncated").await.unwrap();

    let client = MockClient::new();
    let mut crawler = RelatedCrawler::new(&client, &storage, settings(&["carney"]), keys.clone());
    assert!(crawler.load(&Table::new()).await.is_err());
    assert_eq!(crawler.phase(), CrawlPhase::Aborted);
    assert!(crawler.step().await.is_err());

    // The damaged file is left as it was.
    let bytes = storage.read_bytes(&keys.related).await.unwrap().unwrap();
    assert_eq!(bytes, b"truncated");
}

#[tokio::test]
async fn test_skipped_video_is_not_queued_again() {
    let dir = TempDir::new().unwrap();
    let storage = LocalStorage::new(dir.path());
    let client = MockClient::new().with_failure("vid1").with_video(
        video("vid2", "news", "carney"),
        vec![video("vid1", "pm", "carney rally")],
    );

    let mut crawler =
        RelatedCrawler::new(&client, &storage, settings(&["carney"]), RelatedConfig::default());
    crawler
        .load(&seeds(vec![
            video("vid1", "pm", "carney rally"),
            video("vid2", "news", "carney"),
        ]))
        .await
        .unwrap();

    assert!(matches!(crawler.step().await.unwrap(), StepOutcome::Skipped { .. }));
    assert!(matches!(crawler.step().await.unwrap(), StepOutcome::Merged { .. }));
    assert!(!crawler.queue().contains("vid1"));
    assert!(crawler.queue().is_empty());
    assert_eq!(client.count_calls("detail:pm/vid1"), 1);
}

fn related_batch(prefix: &str, count: usize) -> Vec<vidcrawl::models::Record> {
    (0..count)
        .map(|i| video(&format!("{prefix}{i}"), "news", "Carney on the trail"))
        .collect()
}

#[tokio::test]
async fn test_backup_snapshots_written_at_backup_threshold() {
    let dir = TempDir::new().unwrap();
    let storage = LocalStorage::new(dir.path());
    let client = MockClient::new()
        .with_video(video("vid1", "pm", "carney rally"), related_batch("r", 10))
        .with_video(video("vid2", "pm", "carney debate"), related_batch("s", 10));
    let keys = RelatedConfig::default();
    let mut crawl_settings = settings(&["carney"]);
    crawl_settings.backup_threshold = 20;

    let mut crawler = RelatedCrawler::new(&client, &storage, crawl_settings, keys.clone());
    crawler
        .load(&seeds(vec![
            video("vid1", "pm", "carney rally"),
            video("vid2", "pm", "carney debate"),
        ]))
        .await
        .unwrap();

    match crawler.step().await.unwrap() {
        StepOutcome::Merged { flushed, .. } => assert!(flushed.primary && !flushed.backup),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(!storage.path(&keys.backup_fetched).exists());

    match crawler.step().await.unwrap() {
        StepOutcome::Merged { video_id, flushed, .. } => {
            assert_eq!(video_id, "vid2");
            assert!(flushed.primary && flushed.backup);
        }
        other => panic!("unexpected outcome {other:?}"),
    }

    let backup_fetched = storage.read_table(&keys.backup_fetched).await.unwrap().unwrap();
    let backup_related = storage.read_table(&keys.backup_related).await.unwrap().unwrap();
    assert_eq!(backup_fetched.ids().len(), 2);
    assert_eq!(backup_related.ids().len(), 20);
    assert_eq!(crawler.summary().backup_flushes, 1);
}

#[tokio::test]
async fn test_failed_checkpoint_write_is_retried_next_step() {
    let dir = TempDir::new().unwrap();
    let storage = FlakyStorage::new(LocalStorage::new(dir.path()));
    let client = MockClient::new()
        .with_video(video("vid1", "pm", "carney rally"), related_batch("r", 10))
        .with_video(
            video("vid2", "pm", "carney debate"),
            vec![video("s0", "news", "carney town hall")],
        );
    let keys = RelatedConfig::default();

    let mut crawler = RelatedCrawler::new(&client, &storage, settings(&["carney"]), keys.clone());
    crawler
        .load(&seeds(vec![
            video("vid1", "pm", "carney rally"),
            video("vid2", "pm", "carney debate"),
        ]))
        .await
        .unwrap();

    storage.fail_next_writes(1);
    match crawler.step().await.unwrap() {
        StepOutcome::Merged { flushed, .. } => assert!(!flushed.any()),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(!storage.inner().path(&keys.fetched).exists());
    assert_eq!(crawler.summary().primary_flushes, 0);

    // One more merged video is enough: the failed write left the counter due.
    match crawler.step().await.unwrap() {
        StepOutcome::Merged { related, flushed, .. } => {
            assert_eq!(related, 1);
            assert!(flushed.primary);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    let fetched = storage.read_table(&keys.fetched).await.unwrap().unwrap();
    let stored_related = storage.read_table(&keys.related).await.unwrap().unwrap();
    assert_eq!(fetched.ids().len(), 2);
    assert_eq!(stored_related.ids().len(), 11);
    assert_eq!(crawler.summary().primary_flushes, 1);
}
