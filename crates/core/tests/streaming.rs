use std::sync::Arc;

use chrono::{TimeZone, Utc};
use lumen_core::{
    EffectConfig, EffectKind, FixtureHealth, Layer, ManualClock, ParamValue, Params, Playlist,
    PlaylistItem, Preset, Rule, Schedule, ScheduleEngine, SequenceItem, SessionSpec, SessionState,
    Supervisor, TimeSpec,
};
use lumen_fixtures::{Color, Fixture, FixtureCatalog, Target};
use parking_lot::RwLock;
use tokio::net::UdpSocket;
use tokio::time::{timeout, Duration};

fn fixture(id: &str, pixels: usize, port: u16) -> Fixture {
    Fixture {
        id: id.to_string(),
        name: id.to_uppercase(),
        address: "127.0.0.1".to_string(),
        udp_port: port,
        pixel_count: pixels,
        spans: Vec::new(),
    }
}

fn make_supervisor(fixtures: Vec<Fixture>) -> Supervisor {
    let mut catalog = FixtureCatalog::new();
    for f in fixtures {
        catalog.upsert_fixture(f).unwrap();
    }
    Supervisor::new(
        Arc::new(RwLock::new(catalog)),
        Arc::new(RwLock::new(Vec::new())),
        FixtureHealth::new(60),
    )
}

fn solid_red_layer() -> Layer {
    let mut effect = EffectConfig::new(EffectKind::Solid);
    effect.params = Params::new().with("colors", ParamValue::colors(vec![Color::rgb(255, 0, 0)]));
    Layer::new("layer-0", effect)
}

fn spec(targets: Vec<Target>, layers: Vec<Layer>) -> SessionSpec {
    SessionSpec {
        targets,
        layers,
        fps: 40,
        exclusive: false,
        excluded_fixtures: Vec::new(),
        playlist_id: None,
    }
}

async fn recv_packet(socket: &UdpSocket) -> Vec<u8> {
    let mut buf = [0u8; 4096];
    let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
        .await
        .expect("timed out waiting for DDP packet")
        .expect("recv failed");
    buf[..len].to_vec()
}

#[tokio::test]
async fn test_session_streams_and_blacks_out_on_stop() {
    let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = receiver.local_addr().unwrap().port();
    let supervisor = make_supervisor(vec![fixture("porch", 10, port)]);

    let info = supervisor
        .start_session(spec(
            vec![Target::Device("porch".to_string())],
            vec![solid_red_layer()],
        ))
        .await
        .unwrap();
    assert_eq!(info.state, SessionState::Active);

    let packet = recv_packet(&receiver).await;
    assert_eq!(packet.len(), 10 + 30);
    assert_eq!(packet[0] & 0x40, 0x40);
    assert!((1..=15).contains(&packet[1]));
    assert_eq!(packet[2], 0x0B);
    assert_eq!(packet[3], 0x01);
    assert_eq!(&packet[4..8], &[0, 0, 0, 0]);
    assert_eq!(&packet[8..10], &[0, 30]);
    for px in packet[10..].chunks(3) {
        assert_eq!(px, &[255, 0, 0]);
    }

    supervisor.stop_session(&info.id).await.unwrap();
    assert!(supervisor.sessions().is_empty());

    // The worker's final act is one all-zero frame with PUSH.
    let mut saw_blackout = false;
    for _ in 0..200 {
        let packet = recv_packet(&receiver).await;
        if packet[10..].iter().all(|&b| b == 0) {
            assert_eq!(packet[0] & 0x01, 0x01);
            saw_blackout = true;
            break;
        }
    }
    assert!(saw_blackout, "no blackout frame after stop");
}

#[tokio::test]
async fn test_pause_freezes_and_resume_continues() {
    let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = receiver.local_addr().unwrap().port();
    let supervisor = make_supervisor(vec![fixture("porch", 4, port)]);

    let info = supervisor
        .start_session(spec(
            vec![Target::Device("porch".to_string())],
            vec![solid_red_layer()],
        ))
        .await
        .unwrap();

    recv_packet(&receiver).await;
    let paused = supervisor.pause_session(&info.id).await.unwrap();
    // The pause command is applied between frames.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(supervisor.session(&info.id).unwrap().state, SessionState::Paused);
    assert_eq!(paused.id, info.id);

    let resumed = supervisor.resume_session(&info.id).await.unwrap();
    assert_eq!(resumed.id, info.id);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(supervisor.session(&info.id).unwrap().state, SessionState::Active);

    supervisor.stop_session(&info.id).await.unwrap();
}

#[tokio::test]
async fn test_exclusive_session_preempts_and_guards() {
    let _receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = _receiver.local_addr().unwrap().port();
    let supervisor = make_supervisor(vec![fixture("porch", 10, port)]);
    let target = || vec![Target::Device("porch".to_string())];

    let plain = supervisor
        .start_session(spec(target(), vec![solid_red_layer()]))
        .await
        .unwrap();

    let mut exclusive_spec = spec(target(), vec![solid_red_layer()]);
    exclusive_spec.exclusive = true;
    let exclusive = supervisor.start_session(exclusive_spec).await.unwrap();

    // The earlier session was preempted.
    assert!(supervisor.session(&plain.id).is_err());

    // A newcomer on the claimed spans is refused while the exclusive
    // session runs.
    let err = supervisor
        .start_session(spec(target(), vec![solid_red_layer()]))
        .await;
    assert!(matches!(err, Err(lumen_core::EngineError::Conflict(_))));

    supervisor.stop_session(&exclusive.id).await.unwrap();
}

#[tokio::test]
async fn test_stop_by_target_and_active_targets() {
    let _receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = _receiver.local_addr().unwrap().port();
    let supervisor = make_supervisor(vec![
        fixture("porch", 10, port),
        fixture("window", 10, port),
    ]);

    supervisor
        .start_session(spec(
            vec![Target::Device("porch".to_string())],
            vec![solid_red_layer()],
        ))
        .await
        .unwrap();
    supervisor
        .start_session(spec(
            vec![Target::Device("window".to_string())],
            vec![solid_red_layer()],
        ))
        .await
        .unwrap();

    let active = supervisor.active_targets();
    assert_eq!(active.devices, vec!["porch".to_string(), "window".to_string()]);

    let stopped = supervisor
        .stop_by_target(&Target::Device("porch".to_string()))
        .await
        .unwrap();
    assert_eq!(stopped, 1);
    assert_eq!(supervisor.sessions().len(), 1);

    supervisor.stop_all().await;
    assert!(supervisor.sessions().is_empty());
}

#[tokio::test]
async fn test_playlist_advances_and_ends() {
    let _receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = _receiver.local_addr().unwrap().port();
    let supervisor = make_supervisor(vec![fixture("porch", 6, port)]);

    let presets = Arc::new(RwLock::new(vec![
        Preset::Single {
            id: "red".to_string(),
            name: "Red".to_string(),
            effect: EffectConfig::new(EffectKind::Solid),
        },
        Preset::Single {
            id: "rainbow".to_string(),
            name: "Rainbow".to_string(),
            effect: EffectConfig::new(EffectKind::Rainbow),
        },
    ]));

    let playlist = Playlist {
        id: "evening".to_string(),
        name: "Evening".to_string(),
        items: vec![
            PlaylistItem {
                preset_id: "red".to_string(),
                duration_seconds: 0.2,
            },
            PlaylistItem {
                preset_id: "rainbow".to_string(),
                duration_seconds: 0.2,
            },
        ],
        looped: false,
        shuffle: false,
        targets: vec![Target::Device("porch".to_string())],
        fps: 40,
    };

    let handle = lumen_core::start_playlist(supervisor.clone(), presets, playlist)
        .await
        .unwrap();
    assert!(supervisor.active_playlist().is_some());

    tokio::time::sleep(Duration::from_millis(100)).await;
    let session_id = handle.session_id().expect("playlist session running");
    assert_eq!(
        supervisor.session(&session_id).unwrap().playlist_id,
        Some("evening".to_string())
    );

    // Both items play out, then the session stops and the handle clears.
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(supervisor.active_playlist().is_none());
    assert!(supervisor.sessions().is_empty());
}

#[tokio::test]
async fn test_schedule_rule_with_ramp_lifecycle() {
    let _receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = _receiver.local_addr().unwrap().port();
    let supervisor = make_supervisor(vec![fixture("porch", 6, port)]);

    let presets = Arc::new(RwLock::new(vec![Preset::Single {
        id: "warm".to_string(),
        name: "Warm".to_string(),
        effect: EffectConfig::new(EffectKind::Solid),
    }]));
    let schedules = Arc::new(RwLock::new(vec![Schedule {
        id: "evenings".to_string(),
        name: "Evenings".to_string(),
        enabled: true,
        priority: 0,
        created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        rules: vec![Rule {
            id: "dusk".to_string(),
            enabled: true,
            targets: vec![Target::Device("porch".to_string())],
            days_of_week: Vec::new(),
            dates: Vec::new(),
            holiday_filter: Default::default(),
            start: TimeSpec::Time {
                hour: 18,
                minute: 0,
            },
            end: None,
            duration_seconds: Some(3600),
            ramp_on_start: true,
            ramp_off_end: false,
            ramp_duration_seconds: 60,
            sequence: vec![SequenceItem {
                preset_id: "warm".to_string(),
                duration_seconds: 60.0,
            }],
            sequence_loop: false,
            sequence_shuffle: false,
            fps: 40,
            location: None,
        }],
    }]));
    let holidays = Arc::new(RwLock::new(Vec::new()));

    let clock = ManualClock::at(Utc.with_ymd_and_hms(2026, 3, 3, 17, 59, 0).unwrap());
    let mut engine = ScheduleEngine::new(
        supervisor.clone(),
        schedules,
        holidays,
        presets,
        Arc::new(clock.clone()),
        0.0,
        0.0,
        chrono_tz::UTC,
    );
    let active_rules = engine.active_rules_handle();

    // Before the window: nothing fires.
    engine.tick().await;
    assert!(supervisor.sessions().is_empty());

    // 18:00:00 - session starts, ramp begins at zero.
    clock.set(Utc.with_ymd_and_hms(2026, 3, 3, 18, 0, 0).unwrap());
    engine.tick().await;
    let sessions = supervisor.sessions();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].state, SessionState::Active);
    {
        let rows = active_rules.read();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].rule_id, "dusk");
        assert_eq!(rows[0].brightness, 0.0);
    }

    // Mid-ramp: half brightness. After the ramp: full.
    clock.set(Utc.with_ymd_and_hms(2026, 3, 3, 18, 0, 30).unwrap());
    engine.tick().await;
    assert_eq!(active_rules.read()[0].brightness, 0.5);

    clock.set(Utc.with_ymd_and_hms(2026, 3, 3, 18, 5, 0).unwrap());
    engine.tick().await;
    assert_eq!(active_rules.read()[0].brightness, 1.0);

    // 19:00:00 - window closes, the session is stopped and blacked out.
    clock.set(Utc.with_ymd_and_hms(2026, 3, 3, 19, 0, 0).unwrap());
    engine.tick().await;
    assert!(supervisor.sessions().is_empty());
    assert!(active_rules.read().is_empty());
}

#[tokio::test]
async fn test_schedule_priority_suspends_overlap() {
    let _receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = _receiver.local_addr().unwrap().port();
    let supervisor = make_supervisor(vec![fixture("porch", 6, port)]);

    let presets = Arc::new(RwLock::new(vec![Preset::Single {
        id: "warm".to_string(),
        name: "Warm".to_string(),
        effect: EffectConfig::new(EffectKind::Solid),
    }]));

    let rule = |id: &str| Rule {
        id: id.to_string(),
        enabled: true,
        targets: vec![Target::Device("porch".to_string())],
        days_of_week: Vec::new(),
        dates: Vec::new(),
        holiday_filter: Default::default(),
        start: TimeSpec::Time { hour: 0, minute: 0 },
        end: None,
        duration_seconds: Some(24 * 3600),
        ramp_on_start: false,
        ramp_off_end: false,
        ramp_duration_seconds: 0,
        sequence: vec![SequenceItem {
            preset_id: "warm".to_string(),
            duration_seconds: 60.0,
        }],
        sequence_loop: false,
        sequence_shuffle: false,
        fps: 40,
        location: None,
    };

    let schedules = Arc::new(RwLock::new(vec![
        Schedule {
            id: "low".to_string(),
            name: "Low".to_string(),
            enabled: true,
            priority: 1,
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            rules: vec![rule("low-rule")],
        },
        Schedule {
            id: "high".to_string(),
            name: "High".to_string(),
            enabled: true,
            priority: 5,
            created_at: Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap(),
            rules: vec![rule("high-rule")],
        },
    ]));

    let clock = ManualClock::at(Utc.with_ymd_and_hms(2026, 3, 3, 12, 0, 0).unwrap());
    let mut engine = ScheduleEngine::new(
        supervisor.clone(),
        schedules,
        Arc::new(RwLock::new(Vec::new())),
        presets,
        Arc::new(clock.clone()),
        0.0,
        0.0,
        chrono_tz::UTC,
    );
    let active_rules = engine.active_rules_handle();

    engine.tick().await;
    let rows = active_rules.read().clone();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].rule_id, "high-rule");
    assert_eq!(supervisor.sessions().len(), 1);

    supervisor.stop_all().await;
}
