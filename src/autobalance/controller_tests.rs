use super::*;
use crate::autobalance::store::{JsonFileStore, MemoryStore};

fn controller_with(store: Arc<dyn AutobalanceStore>) -> AutobalanceController {
    AutobalanceController::new(store, &AutobalanceConfig::default())
}

fn feed(controller: &AutobalanceController, count: usize, x: f64, y: f64, z: f64) {
    for i in 0..count {
        controller
            .ingest(&SensorSample::new(x, y, z, i as u64))
            .unwrap();
    }
}

fn drain(rx: &mut broadcast::Receiver<AutobalanceEvent>) -> Vec<AutobalanceEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test(start_paused = true)]
async fn test_timeout_with_too_few_points_abandons_phase() {
    let controller = controller_with(Arc::new(MemoryStore::new()));
    let mut rx = controller.subscribe();

    controller.start(AutobalancePhase::Horizontal).unwrap();
    feed(&controller, 19, 1.0, 1.0, 0.0);

    tokio::time::sleep(Duration::from_secs(61)).await;

    assert_eq!(
        controller.phase_state(AutobalancePhase::Horizontal).unwrap(),
        PhaseState::NotStarted
    );
    assert_eq!(controller.collected(AutobalancePhase::Horizontal).unwrap(), 0);

    let events = drain(&mut rx);
    assert_eq!(events.first(), Some(&AutobalanceEvent::Started {
        phase: AutobalancePhase::Horizontal
    }));
    assert_eq!(
        events.last(),
        Some(&AutobalanceEvent::Abandoned {
            phase: AutobalancePhase::Horizontal,
            collected: 19,
            required: 20
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_timeout_with_enough_points_finishes() {
    let controller = controller_with(Arc::new(MemoryStore::new()));

    controller.start(AutobalancePhase::Horizontal).unwrap();
    feed(&controller, 20, 0.5, -1.5, 9.8);

    tokio::time::sleep(Duration::from_secs(59)).await;
    assert_eq!(
        controller.phase_state(AutobalancePhase::Horizontal).unwrap(),
        PhaseState::CollectingHorizontal
    );

    tokio::time::sleep(Duration::from_secs(2)).await;
    let state = controller.state().unwrap();
    assert_eq!(state.horizontal_phase, PhaseState::Finished);
    assert_eq!(state.horizontal_offset_x, -0.5);
    assert_eq!(state.horizontal_offset_y, 1.5);
}

#[tokio::test(start_paused = true)]
async fn test_auto_finish_cancels_timeout() {
    let controller = controller_with(Arc::new(MemoryStore::new()));
    let mut rx = controller.subscribe();

    controller.start(AutobalancePhase::Vertical).unwrap();
    feed(&controller, 40, 0.0, 0.0, 9.81);
    assert_eq!(
        controller.phase_state(AutobalancePhase::Vertical).unwrap(),
        PhaseState::Finished
    );

    tokio::time::sleep(Duration::from_secs(120)).await;

    let events = drain(&mut rx);
    let finished = events
        .iter()
        .filter(|e| matches!(e, AutobalanceEvent::Finished { .. }))
        .count();
    assert_eq!(finished, 1, "timeout must not finish the phase a second time");
    assert!(events.contains(&AutobalanceEvent::Progress {
        phase: AutobalancePhase::Vertical,
        collected: 40,
        target: 40
    }));
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_pending_timeout() {
    let controller = controller_with(Arc::new(MemoryStore::new()));
    let mut rx = controller.subscribe();

    controller.start(AutobalancePhase::Compass).unwrap();
    feed(&controller, 25, 1.0, 2.0, 3.0);
    assert_eq!(
        controller.stop().unwrap(),
        vec![AutobalancePhase::Compass]
    );

    // restart before the old timeout would have fired
    tokio::time::sleep(Duration::from_secs(30)).await;
    controller.start(AutobalancePhase::Compass).unwrap();
    feed(&controller, 5, 1.0, 2.0, 3.0);

    // old deadline passes; new run is untouched
    tokio::time::sleep(Duration::from_secs(35)).await;
    assert_eq!(
        controller.phase_state(AutobalancePhase::Compass).unwrap(),
        PhaseState::Started
    );
    assert_eq!(controller.collected(AutobalancePhase::Compass).unwrap(), 5);

    let events = drain(&mut rx);
    assert!(events.contains(&AutobalanceEvent::Stopped {
        phases: vec![AutobalancePhase::Compass]
    }));
    assert!(!events
        .iter()
        .any(|e| matches!(e, AutobalanceEvent::Abandoned { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_restarted_run_keeps_its_own_timeout() {
    let controller = controller_with(Arc::new(MemoryStore::new()));

    controller.start(AutobalancePhase::Vertical).unwrap();
    controller.stop().unwrap();
    controller.start(AutobalancePhase::Vertical).unwrap();
    feed(&controller, 3, 0.0, 0.0, 9.8);

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(
        controller.phase_state(AutobalancePhase::Vertical).unwrap(),
        PhaseState::NotStarted
    );
    assert_eq!(controller.collected(AutobalancePhase::Vertical).unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_start_stop_leaves_live_run_bounded() {
    let controller = controller_with(Arc::new(MemoryStore::new()));
    let runtime = tokio::runtime::Handle::current();

    std::thread::scope(|scope| {
        for _ in 0..4 {
            let controller = controller.clone();
            let runtime = runtime.clone();
            scope.spawn(move || {
                let _enter = runtime.enter();
                for _ in 0..50 {
                    controller.stop().unwrap();
                    controller.start(AutobalancePhase::Horizontal).unwrap();
                }
            });
        }
    });

    // the last start on some thread left a run collecting
    assert!(controller
        .phase_state(AutobalancePhase::Horizontal)
        .unwrap()
        .is_collecting());

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(
        controller.phase_state(AutobalancePhase::Horizontal).unwrap(),
        PhaseState::NotStarted
    );
}

#[tokio::test(start_paused = true)]
async fn test_save_persists_and_marks_saved() {
    let store = Arc::new(MemoryStore::new());
    let controller = controller_with(store.clone());

    controller.start(AutobalancePhase::Horizontal).unwrap();
    feed(&controller, 40, 2.0, 4.0, 0.0);

    assert_eq!(
        controller.save().unwrap(),
        vec![AutobalancePhase::Horizontal]
    );

    let persisted = store.load().unwrap().unwrap();
    assert_eq!(persisted.horizontal_phase, PhaseState::Saved);
    assert_eq!(persisted.horizontal_offset_x, -2.0);
    assert_eq!(persisted.horizontal_offset_y, -4.0);
    assert_eq!(persisted.vertical_phase, PhaseState::NotStarted);

    let corrected = controller
        .correct(&SensorSample::new(2.0, 4.0, 1.0, 0))
        .unwrap();
    assert_eq!((corrected.x, corrected.y, corrected.z), (0.0, 0.0, 1.0));
}

#[tokio::test(start_paused = true)]
async fn test_save_failure_keeps_in_memory_state() {
    let store = Arc::new(JsonFileStore::new(
        "/nonexistent_emf_probe_dir/autobalance.json",
    ));
    let controller = controller_with(store);

    controller.start(AutobalancePhase::Vertical).unwrap();
    feed(&controller, 40, 0.0, 0.0, 1.0);

    assert!(matches!(
        controller.save(),
        Err(AutobalanceError::PersistenceFailure { .. })
    ));
    assert_eq!(
        controller.phase_state(AutobalancePhase::Vertical).unwrap(),
        PhaseState::Saved
    );

    // retry is allowed and fails the same way
    assert!(controller.save().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_delete_all_clears_store() {
    let store = Arc::new(MemoryStore::new());
    let controller = controller_with(store.clone());

    controller.start(AutobalancePhase::Horizontal).unwrap();
    feed(&controller, 40, 1.0, 1.0, 1.0);
    controller.save().unwrap();
    controller.start(AutobalancePhase::Compass).unwrap();

    controller.delete_all().unwrap();

    assert_eq!(controller.state().unwrap(), AutobalanceState::default());
    assert_eq!(store.load().unwrap(), None);

    // compass timeout was cancelled with everything else
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(
        controller.phase_state(AutobalancePhase::Compass).unwrap(),
        PhaseState::NotStarted
    );
}

#[tokio::test(start_paused = true)]
async fn test_restore_loads_saved_document() {
    let saved = AutobalanceState {
        vertical_phase: PhaseState::Saved,
        vertical_offset_z: -9.81,
        last_calibration_timestamp: Some(42),
        ..Default::default()
    };
    let controller = controller_with(Arc::new(MemoryStore::with_state(saved.clone())));

    assert!(controller.restore().unwrap());
    assert_eq!(controller.state().unwrap(), saved);

    controller.start(AutobalancePhase::Horizontal).unwrap();
    assert_eq!(
        controller.restore(),
        Err(AutobalanceError::CalibrationAlreadyActive {
            phase: AutobalancePhase::Horizontal
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_manual_finish() {
    let controller = controller_with(Arc::new(MemoryStore::new()));
    controller.start(AutobalancePhase::Horizontal).unwrap();
    feed(&controller, 30, 3.0, 3.0, 3.0);

    let outcome = controller.finish(AutobalancePhase::Horizontal).unwrap();
    assert_eq!(
        outcome,
        PhaseOutcome::Finished {
            phase: AutobalancePhase::Horizontal,
            collected: 30
        }
    );
    assert!(matches!(
        controller.finish(AutobalancePhase::Horizontal),
        Err(AutobalanceError::NotActive { .. })
    ));
}
