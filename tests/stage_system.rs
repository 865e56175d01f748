//! Full-system scenarios on simulated axes.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

use stagekit::{
    Axis, AxisConfig, ConnectionState, EventFilter, Position, PositionEvent, SequenceConfig,
    StageEvent, StageSystem, TravelRange, Waypoint,
};

fn test_configs() -> Vec<AxisConfig> {
    Axis::ALL
        .into_iter()
        .map(|axis| AxisConfig {
            axis,
            device_id: format!("SIM-{axis}"),
            reference_mode: "FPL".to_string(),
            range: TravelRange::new(0.0, 25.0),
            default_velocity: 10.0,
            max_velocity: 20.0,
        })
        .collect()
}

fn record_events(system: &StageSystem) -> Arc<Mutex<Vec<String>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let log_clone = log.clone();
    system.bus.subscribe(EventFilter::All, move |event| {
        log_clone.lock().push(event.description());
    });
    log
}

#[tokio::test(start_paused = true)]
async fn safe_init_reaches_ready_with_referenced_positions() {
    let system = StageSystem::simulated(test_configs(), Handle::current()).unwrap();

    system.connection.connect().await.unwrap().unwrap();
    system.connection.initialize().unwrap().await.unwrap().unwrap();

    assert_eq!(system.connection.state().connection, ConnectionState::Ready);

    // Every axis sits at its simulated reference position (range.min).
    let position = system.manager.get_position_snapshot();
    assert_eq!((position.x, position.y, position.z), (0.0, 0.0, 0.0));
}

#[tokio::test(start_paused = true)]
async fn out_of_range_relative_move_is_clamped_and_warned() {
    let system = StageSystem::simulated(test_configs(), Handle::current()).unwrap();
    system.connection.connect().await.unwrap().unwrap();
    system.connection.initialize().unwrap().await.unwrap().unwrap();

    system
        .motion
        .move_axis_absolute(Axis::X, 12.5)
        .await
        .unwrap()
        .unwrap();

    let log = record_events(&system);
    let final_position = system
        .motion
        .move_axis_relative(Axis::X, 20.0)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(final_position, 25.0);
    assert!(log
        .lock()
        .iter()
        .any(|d| d == "Axis X target 32.500 clamped to 25.000"));
}

#[tokio::test(start_paused = true)]
async fn sequence_with_hold_parks_all_axes() {
    let system = StageSystem::simulated(test_configs(), Handle::current()).unwrap();
    system.connection.connect().await.unwrap().unwrap();
    system.connection.initialize().unwrap().await.unwrap().unwrap();

    let log = record_events(&system);
    let sequence = SequenceConfig {
        waypoints: vec![
            Waypoint::new(Position::new(10.0, 5.0, 20.0), Duration::from_secs(1)),
            Waypoint::new(Position::new(25.0, 15.0, 5.0), Duration::from_secs(1)),
        ],
        park_when_complete: true,
        park_position: 10.0,
    };

    system
        .motion
        .execute_sequence(sequence)
        .unwrap()
        .await
        .unwrap()
        .unwrap();

    let position = system.motion.get_position();
    assert_eq!((position.x, position.y, position.z), (10.0, 10.0, 10.0));

    let log = log.lock();
    let first = log.iter().position(|d| d == "Waypoint 0 reached").unwrap();
    let second = log.iter().position(|d| d == "Waypoint 1 reached").unwrap();
    let park = log
        .iter()
        .position(|d| d == "Parking all axes at 10.000")
        .unwrap();
    let done = log.iter().position(|d| d == "Sequence completed").unwrap();
    assert!(first < second && second < park && park < done);
}

#[tokio::test(start_paused = true)]
async fn position_polling_tracks_motion() {
    let system = StageSystem::simulated(test_configs(), Handle::current()).unwrap();
    system.connection.connect().await.unwrap().unwrap();
    system.connection.initialize().unwrap().await.unwrap().unwrap();

    let samples = Arc::new(Mutex::new(Vec::new()));
    let samples_clone = samples.clone();
    system.bus.subscribe(EventFilter::All, move |event| {
        if let StageEvent::Position(PositionEvent::Updated { position }) = event {
            samples_clone.lock().push(position.x);
        }
    });

    system.position.start(Duration::from_millis(100));
    let move_task = system.motion.move_axis_absolute(Axis::X, 20.0);
    move_task.await.unwrap().unwrap();
    system.position.stop();

    let samples = samples.lock();
    // The 2s move at 10mm/s was sampled mid-flight.
    assert!(samples.iter().any(|x| *x > 0.0 && *x < 20.0));
    assert!(*samples.last().unwrap() <= 20.0);
}

#[tokio::test(start_paused = true)]
async fn disconnect_from_ready_returns_to_disconnected() {
    let system = StageSystem::simulated(test_configs(), Handle::current()).unwrap();
    system.connection.connect().await.unwrap().unwrap();
    system.connection.initialize().unwrap().await.unwrap().unwrap();

    system.connection.disconnect().await.unwrap();
    assert_eq!(
        system.connection.state().connection,
        ConnectionState::Disconnected
    );
    for axis in Axis::ALL {
        assert!(!system.manager.get_controller(axis).unwrap().is_connected());
    }
}
