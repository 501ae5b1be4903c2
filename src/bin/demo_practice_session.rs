// Headless walk-through of a practice session
// Run with: cargo run --bin demo_practice_session
//
// Simulated adapters stand in for real audio output and a simulated capture
// device for the microphone, so the whole flow runs without hardware.

use env_logger::Env;
use ringbuf::traits::Consumer;
use stemloop::messaging::create_notification_channel;
use stemloop::recording::encode_stereo_pcm16;
use stemloop::{
    EngineConfig, MemoryProjectStore, Notifier, PracticeSession, SessionParts, SimulatedBackend,
    SimulatedCapture,
};

/// Time step of the virtual clock (seconds)
const TICK: f64 = 0.05;

fn microphone_take(seconds: f64, sample_rate: u32) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let frames = (seconds * sample_rate as f64) as usize;
    let left: Vec<f32> = (0..frames)
        .map(|i| (i as f32 * 440.0 * std::f32::consts::TAU / sample_rate as f32).sin() * 0.3)
        .collect();
    let right = vec![0.0; frames];
    Ok(encode_stereo_pcm16(&left, &right, sample_rate)?)
}

fn run_for(session: &mut PracticeSession, backend: &SimulatedBackend, seconds: f64) {
    let mut elapsed = 0.0;
    while elapsed < seconds {
        backend.advance_all(TICK);
        session.dispatch_events();
        elapsed += TICK;
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    println!("🎵 Stemloop - Practice Session Demo");
    println!("===================================");

    let config = EngineConfig::load_or_default();
    let backend = SimulatedBackend::new(40.0)
        .with_duration("Drums", 42.0)
        .with_duration("Bass", 40.0)
        .with_duration("Guitar", 38.5);
    let store = MemoryProjectStore::new();
    let (notification_tx, mut notification_rx) =
        create_notification_channel(config.queues.notification_capacity);
    let take = microphone_take(3.0, config.recording.sample_rate)?;

    let parts = SessionParts {
        store: Box::new(store.clone()),
        playback: Box::new(backend.clone()),
        capture: Box::new(SimulatedCapture::with_take(take, Some("wav"))),
        notifier: Notifier::new(notification_tx),
    };
    let mut session = PracticeSession::create(config.clone(), "Demo Song", parts);

    for name in ["Drums", "Bass", "Guitar"] {
        session.import_track(name, b"RIFF");
    }
    session.dispatch_events();
    println!(
        "\n✅ Imported {} tracks, duration {:.1}s",
        session.tracks().len(),
        session.playback_state().duration
    );

    // Loop the chorus at 80% speed
    let (Some(start), Some(end)) = (session.add_marker(12.0), session.add_marker(16.0)) else {
        return Err("could not place markers".into());
    };
    let Some(chorus) = session.create_loop(start, end) else {
        return Err("could not create the loop".into());
    };
    session.set_playback_rate(0.8);
    session.toggle_loop_by_id(chorus);
    session.play();
    run_for(&mut session, &backend, 12.0);
    println!(
        "🔁 After 12s of practice the playhead is at {:.2}s (loop 12.0s - 16.0s)",
        session.clock().seconds()
    );
    session.pause();

    // Record a take over the verse
    let Some(vox) = session.add_recordable_track("Vocals") else {
        return Err("could not add the vocal track".into());
    };
    session.seek(4.0);
    session.arm_track(vox);
    session.play();
    run_for(&mut session, &backend, 3.0);
    session.pause();
    session.dispatch_events();

    if let Some(track) = session.tracks().get(vox) {
        println!(
            "\n🎤 Vocals recorded: source {:?}, recordable {}",
            track.source.as_ref().map(|s| s.as_str()),
            track.recordable
        );
    }

    // Reopen from the store
    let parts = SessionParts {
        store: Box::new(store.clone()),
        playback: Box::new(SimulatedBackend::new(40.0)),
        capture: Box::new(SimulatedCapture::with_take(Vec::new(), None)),
        notifier: Notifier::detached(),
    };
    let reopened = PracticeSession::open(config, session.project_id(), parts)?;
    println!(
        "\n📂 Reopened \"{}\": {} tracks, {} markers, {} loops, rate {:.2}",
        reopened.name(),
        reopened.tracks().len(),
        reopened.loop_state().markers().len(),
        reopened.loop_state().loops().len(),
        reopened.playback_state().playback_rate
    );
    println!("   - Settings saved {} times", store.save_count());

    println!("\n📣 Notifications:");
    while let Some(notification) = notification_rx.try_pop() {
        println!(
            "   - [{:?}/{:?}] {}",
            notification.level, notification.category, notification.message
        );
    }

    Ok(())
}
