//! Unit tests for the import queue engine

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::port::import_executor::mocks::{MockBehavior, MockImportExecutor};
    use crate::port::installation_tracker::mocks::RecordingInstallationTracker;
    use crate::port::preference_store::mocks::InMemoryPreferenceStore;
    use tempfile::TempDir;

    struct Harness {
        dir: TempDir,
        prefs: InMemoryPreferenceStore,
        executor: MockImportExecutor,
        tracker: RecordingInstallationTracker,
    }

    impl Harness {
        fn new(executor: MockImportExecutor) -> Self {
            Self {
                dir: TempDir::new().unwrap(),
                prefs: InMemoryPreferenceStore::new(),
                executor,
                tracker: RecordingInstallationTracker::new(),
            }
        }

        /// Create a file in the temp dir and return its path
        fn file(&self, name: &str) -> String {
            let path = self.dir.path().join(name);
            std::fs::write(&path, b"payload").unwrap();
            path.to_string_lossy().into_owned()
        }

        fn missing(&self, name: &str) -> String {
            self.dir.path().join(name).to_string_lossy().into_owned()
        }

        fn store(&self) -> PersistedQueueStore {
            PersistedQueueStore::new(Arc::new(self.prefs.clone()))
        }

        async fn engine(&self) -> ImportQueue {
            self.engine_with(self.executor.clone()).await
        }

        async fn engine_with(&self, executor: MockImportExecutor) -> ImportQueue {
            ImportQueue::load(
                self.store(),
                Arc::new(executor),
                Arc::new(self.tracker.clone()),
            )
            .await
            .unwrap()
        }

        async fn persisted(&self) -> QueueState {
            self.store().load().await
        }
    }

    fn finished_paths(rx: &mut broadcast::Receiver<QueueEvent>) -> Vec<String> {
        let mut paths = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let QueueEvent::ItemFinished { item } = event {
                paths.push(item.source_path().to_string());
            }
        }
        paths
    }

    // ------------------------------------------------------------------
    // Enqueue
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_enqueue_persists_and_never_starts() {
        let h = Harness::new(MockImportExecutor::new_complete());
        let mut queue = h.engine().await;
        let a = h.file("a.unitypackage");

        assert!(queue.enqueue(&a, "101").await.unwrap());

        assert_eq!(queue.remaining_count(), 1);
        assert!(!queue.is_processing());
        assert_eq!(queue.phase(), EnginePhase::Idle);
        assert_eq!(h.executor.call_count(), 0);
        assert_eq!(h.persisted().await.paths(), vec![a]);
    }

    #[tokio::test]
    async fn test_enqueue_ignores_empty_and_duplicate_paths() {
        let h = Harness::new(MockImportExecutor::new_complete());
        let mut queue = h.engine().await;
        let a = h.file("a.unitypackage");

        assert!(!queue.enqueue("", "101").await.unwrap());
        assert!(queue.enqueue(&a, "101").await.unwrap());
        assert!(!queue.enqueue(&a, "202").await.unwrap());

        assert_eq!(queue.list_paths(), vec![a]);
        assert_eq!(h.persisted().await.items[0].owner_id(), "101");
    }

    #[tokio::test]
    async fn test_enqueue_rejects_separator_in_path() {
        let h = Harness::new(MockImportExecutor::new_complete());
        let mut queue = h.engine().await;

        assert!(!queue.enqueue("/lib/odd|name.png", "1").await.unwrap());
        assert_eq!(queue.remaining_count(), 0);
    }

    #[tokio::test]
    async fn test_enqueue_many_persists_once() {
        let h = Harness::new(MockImportExecutor::new_complete());
        let mut queue = h.engine().await;
        let a = h.file("a.png");
        let b = h.file("b.png");

        let writes_before = h.prefs.write_count();
        let added = queue
            .enqueue_many(vec![a.clone(), String::new(), b.clone(), a.clone()], "7")
            .await
            .unwrap();

        assert_eq!(added, 2);
        assert_eq!(h.prefs.write_count() - writes_before, 1);
        assert_eq!(queue.list_paths(), vec![a, b]);
    }

    #[tokio::test]
    async fn test_enqueue_rolls_back_when_save_fails() {
        let h = Harness::new(MockImportExecutor::new_complete());
        let mut queue = h.engine().await;
        let a = h.file("a.png");
        let b = h.file("b.png");
        let c = h.file("c.png");
        queue.enqueue(&a, "1").await.unwrap();

        h.prefs.fail_write_at(h.prefs.write_count() + 1);
        assert!(queue.enqueue(&b, "2").await.is_err());
        assert_eq!(queue.list_paths(), vec![a.clone()]);

        h.prefs.fail_write_at(h.prefs.write_count() + 1);
        assert!(queue.enqueue_many([&b, &c], "2").await.is_err());
        assert_eq!(queue.list_paths(), vec![a.clone()]);

        // The rejected paths are not treated as duplicates afterwards
        assert_eq!(queue.enqueue_many([&b, &c], "2").await.unwrap(), 2);
        assert_eq!(h.persisted().await.paths(), vec![a, b, c]);
    }

    // ------------------------------------------------------------------
    // Processing
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_start_on_empty_queue_is_noop() {
        let h = Harness::new(MockImportExecutor::new_complete());
        let mut queue = h.engine().await;

        queue.start_processing().await.unwrap();

        assert!(!queue.is_processing());
        assert_eq!(queue.phase(), EnginePhase::Idle);
        assert_eq!(h.executor.call_count(), 0);
    }

    #[tokio::test]
    async fn test_processes_in_fifo_order_and_records_owners() {
        let h = Harness::new(MockImportExecutor::new_complete());
        let mut queue = h.engine().await;
        let mut events = queue.subscribe();
        let x = h.file("x.unitypackage");
        let y = h.file("y.unitypackage");
        let z = h.file("z.unitypackage");

        queue.enqueue(&x, "1").await.unwrap();
        queue.enqueue(&y, "2").await.unwrap();
        queue.enqueue(&z, "3").await.unwrap();
        queue.start_processing().await.unwrap();
        queue.run_until_idle().await.unwrap();

        assert_eq!(h.executor.dispatched_paths(), vec![x.clone(), y.clone(), z.clone()]);
        assert_eq!(h.tracker.calls(), vec!["1", "2", "3"]);
        assert_eq!(finished_paths(&mut events), vec![x, y, z]);

        assert_eq!(queue.phase(), EnginePhase::Idle);
        assert!(!queue.is_processing());
        let persisted = h.persisted().await;
        assert!(persisted.items.is_empty());
        assert!(!persisted.processing);
    }

    #[tokio::test]
    async fn test_only_one_item_in_flight() {
        let h = Harness::new(MockImportExecutor::new_holding());
        let mut queue = h.engine().await;
        let a = h.file("a.png");
        let b = h.file("b.png");

        queue.enqueue(&a, "1").await.unwrap();
        queue.enqueue(&b, "1").await.unwrap();
        queue.start_processing().await.unwrap();

        assert_eq!(queue.phase(), EnginePhase::Dispatched);
        assert_eq!(queue.current_path(), Some(a.as_str()));
        assert_eq!(queue.current_owner_id(), Some("1"));

        // Second start and stray ticks must not dispatch again
        queue.start_processing().await.unwrap();
        queue.handle_message(EngineMessage::Tick(Tick::Next)).await.unwrap();
        assert_eq!(h.executor.call_count(), 1);

        assert!(h.executor.resolve_next(ImportOutcome::Completed { name: "a.png".into() }));
        queue.run_until_idle().await.unwrap();

        assert_eq!(h.executor.dispatched_paths(), vec![a, b]);
        assert_eq!(queue.phase(), EnginePhase::Dispatched);
    }

    #[tokio::test]
    async fn test_in_flight_item_not_in_persisted_list() {
        let h = Harness::new(MockImportExecutor::new_holding());
        let mut queue = h.engine().await;
        let a = h.file("a.png");
        let b = h.file("b.png");

        queue.enqueue(&a, "1").await.unwrap();
        queue.enqueue(&b, "2").await.unwrap();
        queue.start_processing().await.unwrap();

        let persisted = h.persisted().await;
        assert_eq!(persisted.paths(), vec![b]);
        assert!(persisted.processing);
    }

    #[tokio::test]
    async fn test_next_item_waits_for_tick() {
        let h = Harness::new(MockImportExecutor::new_holding());
        let mut queue = h.engine().await;
        let a = h.file("a.png");
        let b = h.file("b.png");

        queue.enqueue(&a, "1").await.unwrap();
        queue.enqueue(&b, "1").await.unwrap();
        queue.start_processing().await.unwrap();

        h.executor.resolve_next(ImportOutcome::Completed { name: "a.png".into() });
        let message = queue.try_next_message().unwrap();
        assert!(matches!(message, EngineMessage::Outcome(_)));
        queue.handle_message(message).await.unwrap();

        // Outcome handled, but b is only dispatched once the tick runs
        assert_eq!(queue.phase(), EnginePhase::AwaitingNextTick);
        assert_eq!(h.executor.call_count(), 1);

        assert_eq!(queue.try_next_message(), Some(EngineMessage::Tick(Tick::Next)));
        queue.handle_message(EngineMessage::Tick(Tick::Next)).await.unwrap();
        assert_eq!(h.executor.call_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_file_skipped() {
        let h = Harness::new(MockImportExecutor::new_complete());
        let mut queue = h.engine().await;
        let gone = h.missing("gone.unitypackage");
        let ok = h.file("ok.unitypackage");

        queue.enqueue(&gone, "1").await.unwrap();
        queue.enqueue(&ok, "2").await.unwrap();
        queue.start_processing().await.unwrap();
        queue.run_until_idle().await.unwrap();

        assert_eq!(h.executor.dispatched_paths(), vec![ok]);
        assert_eq!(h.tracker.calls(), vec!["2"]);
        assert_eq!(queue.phase(), EnginePhase::Idle);
    }

    #[tokio::test]
    async fn test_only_missing_files_drains_to_idle() {
        let h = Harness::new(MockImportExecutor::new_complete());
        let mut queue = h.engine().await;

        queue.enqueue(&h.missing("a.png"), "1").await.unwrap();
        queue.start_processing().await.unwrap();

        assert_eq!(h.executor.call_count(), 0);
        assert_eq!(queue.phase(), EnginePhase::Idle);
        assert!(!h.persisted().await.processing);
    }

    #[tokio::test]
    async fn test_failures_and_cancellations_continue() {
        for behavior in [
            MockBehavior::Fail("disk full".into()),
            MockBehavior::Cancel,
            MockBehavior::Reject("no handler".into()),
            MockBehavior::Panic("executor bug".into()),
        ] {
            let h = Harness::new(MockImportExecutor::new(behavior.clone()));
            let mut queue = h.engine().await;
            let mut events = queue.subscribe();
            let a = h.file("a.png");
            let b = h.file("b.png");

            queue.enqueue(&a, "1").await.unwrap();
            queue.enqueue(&b, "2").await.unwrap();
            queue.start_processing().await.unwrap();
            queue.run_until_idle().await.unwrap();

            assert_eq!(h.executor.dispatched_paths(), vec![a, b], "{behavior:?}");
            assert!(h.tracker.calls().is_empty(), "{behavior:?}");
            assert!(finished_paths(&mut events).is_empty(), "{behavior:?}");
            assert_eq!(queue.phase(), EnginePhase::Idle, "{behavior:?}");
            assert!(!queue.is_processing(), "{behavior:?}");
        }
    }

    #[tokio::test]
    async fn test_anonymous_item_not_tracked() {
        let h = Harness::new(MockImportExecutor::new_complete());
        let mut queue = h.engine().await;
        let mut events = queue.subscribe();
        let a = h.file("a.png");

        queue.enqueue(&a, "").await.unwrap();
        queue.start_processing().await.unwrap();
        queue.run_until_idle().await.unwrap();

        assert!(h.tracker.calls().is_empty());
        assert_eq!(finished_paths(&mut events), vec![a]);
    }

    #[tokio::test]
    async fn test_stale_outcome_ignored() {
        let h = Harness::new(MockImportExecutor::new_holding());
        let mut queue = h.engine().await;
        let a = h.file("a.png");
        queue.enqueue(&a, "1").await.unwrap();
        queue.start_processing().await.unwrap();

        let (_, reporter) = h.executor.take_held().unwrap();
        let live_id = reporter.dispatch_id();

        OutcomeReporter::new(live_id + 100, queue.outcome_tx.clone()).completed("bogus");
        queue.run_until_idle().await.unwrap();
        assert_eq!(queue.phase(), EnginePhase::Dispatched);
        assert!(h.tracker.calls().is_empty());

        reporter.completed("a.png");
        queue.run_until_idle().await.unwrap();
        assert_eq!(queue.phase(), EnginePhase::Idle);
        assert_eq!(h.tracker.calls(), vec!["1"]);

        // A late duplicate for the finished dispatch changes nothing
        OutcomeReporter::new(live_id, queue.outcome_tx.clone()).completed("a.png");
        queue.run_until_idle().await.unwrap();
        assert_eq!(h.tracker.calls(), vec!["1"]);
    }

    #[tokio::test]
    async fn test_failed_flag_save_leaves_queue_startable() {
        let h = Harness::new(MockImportExecutor::new_complete());
        let mut queue = h.engine().await;
        let a = h.file("a.png");
        let b = h.file("b.png");
        queue.enqueue_many([&a, &b], "1").await.unwrap();

        h.prefs.fail_write_at(h.prefs.write_count() + 1);
        assert!(queue.start_processing().await.is_err());

        assert!(!queue.is_processing());
        assert_eq!(queue.phase(), EnginePhase::Idle);
        assert_eq!(queue.list_paths(), vec![a.clone(), b.clone()]);
        assert!(!h.persisted().await.processing);
        assert_eq!(h.executor.call_count(), 0);

        queue.start_processing().await.unwrap();
        queue.run_until_idle().await.unwrap();
        assert_eq!(h.executor.dispatched_paths(), vec![a, b]);
    }

    #[tokio::test]
    async fn test_failed_pop_save_keeps_head_item() {
        let h = Harness::new(MockImportExecutor::new_complete());
        let mut queue = h.engine().await;
        let a = h.file("a.png");
        let b = h.file("b.png");
        queue.enqueue_many([&a, &b], "1").await.unwrap();
        let mut events = queue.subscribe();

        // Write 1 sets the flag, write 2 removes the head item
        h.prefs.fail_write_at(h.prefs.write_count() + 2);
        assert!(queue.start_processing().await.is_err());

        assert_eq!(queue.remaining_count(), 2);
        assert_eq!(queue.list_paths(), vec![a.clone(), b.clone()]);
        assert!(!queue.is_processing());
        assert_eq!(queue.phase(), EnginePhase::Idle);
        assert!(queue.current_path().is_none());
        assert_eq!(h.executor.call_count(), 0);
        assert_eq!(
            events.try_recv().unwrap(),
            QueueEvent::ActivityChanged { active: true }
        );
        assert_eq!(
            events.try_recv().unwrap(),
            QueueEvent::ActivityChanged { active: false }
        );

        queue.start_processing().await.unwrap();
        queue.run_until_idle().await.unwrap();

        assert_eq!(h.executor.call_count(), 2);
        assert_eq!(h.executor.dispatched_paths(), vec![a, b]);
        let persisted = h.persisted().await;
        assert!(persisted.items.is_empty());
        assert!(!persisted.processing);
    }

    // ------------------------------------------------------------------
    // Clear
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_clear_without_dispatch() {
        let h = Harness::new(MockImportExecutor::new_complete());
        let mut queue = h.engine().await;
        queue.enqueue(&h.file("a.png"), "1").await.unwrap();
        queue.enqueue(&h.file("b.png"), "1").await.unwrap();

        queue.clear().await.unwrap();

        assert_eq!(queue.remaining_count(), 0);
        assert!(!queue.is_processing());
        let persisted = h.persisted().await;
        assert!(persisted.items.is_empty());
        assert!(!persisted.processing);
    }

    #[tokio::test]
    async fn test_clear_during_dispatch_lets_import_finish() {
        let h = Harness::new(MockImportExecutor::new_holding());
        let mut queue = h.engine().await;
        queue.enqueue(&h.file("a.png"), "1").await.unwrap();
        queue.enqueue(&h.file("b.png"), "2").await.unwrap();
        queue.start_processing().await.unwrap();

        queue.clear().await.unwrap();
        assert!(!queue.is_processing());
        assert_eq!(queue.current_owner_id(), Some("1"));

        // No second dispatch while the first is still out
        queue.start_processing().await.unwrap();
        assert_eq!(h.executor.call_count(), 1);

        h.executor.resolve_next(ImportOutcome::Completed { name: "a.png".into() });
        queue.run_until_idle().await.unwrap();

        assert_eq!(h.executor.call_count(), 1);
        assert_eq!(h.tracker.calls(), vec!["1"]);
        assert_eq!(queue.phase(), EnginePhase::Idle);
    }

    // ------------------------------------------------------------------
    // Restart recovery
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_restart_resumes_without_rerunning_interrupted_item() {
        let h = Harness::new(MockImportExecutor::new_holding());
        let x = h.file("x.unitypackage");
        let y = h.file("y.unitypackage");
        let z = h.file("z.unitypackage");

        {
            let mut queue = h.engine().await;
            queue.enqueue(&x, "1").await.unwrap();
            queue.enqueue(&y, "2").await.unwrap();
            queue.enqueue(&z, "3").await.unwrap();
            queue.start_processing().await.unwrap();
            assert_eq!(h.executor.dispatched_paths(), vec![x.clone()]);
            // Process dies here with x in flight
        }

        let restarted = MockImportExecutor::new_complete();
        let mut queue = h.engine_with(restarted.clone()).await;

        // Nothing is dispatched during construction
        assert_eq!(restarted.call_count(), 0);
        assert_eq!(queue.phase(), EnginePhase::AwaitingNextTick);
        assert_eq!(queue.list_paths(), vec![y.clone(), z.clone()]);

        queue.run_until_idle().await.unwrap();

        assert_eq!(restarted.dispatched_paths(), vec![y, z]);
        assert_eq!(h.tracker.calls(), vec!["2", "3"]);
        let persisted = h.persisted().await;
        assert!(persisted.items.is_empty());
        assert!(!persisted.processing);
    }

    #[tokio::test]
    async fn test_restart_with_stale_flag_and_empty_list() {
        let h = Harness::new(MockImportExecutor::new_complete());
        h.prefs.insert_raw(store::QUEUE_ITEMS_KEY, "");
        h.prefs.insert_raw(store::QUEUE_PROCESSING_KEY, "true");

        let mut queue = h.engine().await;

        assert!(!queue.is_processing());
        assert_eq!(queue.phase(), EnginePhase::Idle);
        assert!(!h.persisted().await.processing);
        assert_eq!(queue.try_next_message(), None);
    }

    #[tokio::test]
    async fn test_restart_when_idle_does_not_start() {
        let h = Harness::new(MockImportExecutor::new_complete());
        let a = h.file("a.png");
        {
            let mut queue = h.engine().await;
            queue.enqueue(&a, "1").await.unwrap();
        }

        let mut queue = h.engine().await;
        queue.run_until_idle().await.unwrap();

        assert_eq!(queue.list_paths(), vec![a]);
        assert_eq!(h.executor.call_count(), 0);
    }

    #[tokio::test]
    async fn test_resume_tick_after_fresh_dispatch_keeps_flag() {
        let h = Harness::new(MockImportExecutor::new_holding());
        let x = h.file("x.png");
        let a = h.file("a.png");
        h.prefs.insert_raw(store::QUEUE_ITEMS_KEY, &format!("{x}|1"));
        h.prefs.insert_raw(store::QUEUE_PROCESSING_KEY, "true");

        let mut queue = h.engine().await;
        assert_eq!(queue.phase(), EnginePhase::AwaitingNextTick);

        // A new run starts before the resume tick is handled
        queue.clear().await.unwrap();
        queue.enqueue(&a, "2").await.unwrap();
        queue.start_processing().await.unwrap();
        assert_eq!(h.executor.dispatched_paths(), vec![a.clone()]);

        queue.run_until_idle().await.unwrap();

        assert!(queue.is_processing());
        assert_eq!(queue.current_path(), Some(a.as_str()));
        assert_eq!(h.executor.call_count(), 1);
        assert!(h.persisted().await.processing);
    }

    // ------------------------------------------------------------------
    // Interactive flag and manual imports
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_interactive_flag_passed_and_persisted() {
        let h = Harness::new(MockImportExecutor::new_complete());
        let mut queue = h.engine().await;
        assert!(queue.interactive());

        queue.set_interactive(false).await.unwrap();
        queue.enqueue(&h.file("a.png"), "1").await.unwrap();
        queue.start_processing().await.unwrap();

        assert!(!h.executor.last_request().unwrap().interactive);
        assert!(!h.engine().await.interactive());
    }

    #[tokio::test]
    async fn test_manual_import_marks_activity_without_persisting() {
        let h = Harness::new(MockImportExecutor::new_complete());
        let mut queue = h.engine().await;
        let mut events = queue.subscribe();
        let writes_before = h.prefs.write_count();

        queue.manual_import_begin();
        assert!(queue.is_processing());
        queue.manual_import_end();
        assert!(!queue.is_processing());

        assert_eq!(h.prefs.write_count(), writes_before);
        assert_eq!(
            events.try_recv().unwrap(),
            QueueEvent::ActivityChanged { active: true }
        );
        assert_eq!(
            events.try_recv().unwrap(),
            QueueEvent::ActivityChanged { active: false }
        );
    }

    #[tokio::test]
    async fn test_tick_during_manual_import_is_reposted() {
        let h = Harness::new(MockImportExecutor::new_holding());
        let mut queue = h.engine().await;
        let a = h.file("a.png");
        let b = h.file("b.png");
        queue.enqueue(&a, "1").await.unwrap();
        queue.enqueue(&b, "2").await.unwrap();
        queue.start_processing().await.unwrap();
        h.executor.resolve_next(ImportOutcome::Completed { name: "a.png".into() });

        queue.manual_import_begin();
        queue.run_until_idle().await.unwrap();
        assert_eq!(h.executor.call_count(), 1);

        queue.manual_import_end();
        queue.run_until_idle().await.unwrap();
        assert_eq!(h.executor.dispatched_paths(), vec![a, b]);
    }

    #[tokio::test]
    async fn test_status_snapshot() {
        let h = Harness::new(MockImportExecutor::new_holding());
        let mut queue = h.engine().await;
        let a = h.file("a.png");
        let b = h.file("b.png");
        queue.enqueue(&a, "1").await.unwrap();
        queue.enqueue(&b, "2").await.unwrap();
        queue.start_processing().await.unwrap();

        let status = queue.status();
        assert_eq!(status.remaining, 1);
        assert!(status.processing);
        assert_eq!(status.phase, EnginePhase::Dispatched);
        assert_eq!(status.paths, vec![b]);
        assert_eq!(status.current_path, Some(a));
        assert_eq!(status.current_owner_id.as_deref(), Some("1"));
        assert!(status.interactive);
    }
}
