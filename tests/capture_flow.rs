//! End-to-end capture flow without external processes
//!
//! Frames come from an in-memory decoder stream and time from scripted
//! authorities, so the whole pipeline runs offline.
//!
//! Run: `cargo test --test capture_flow`

use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use framestamp::capture::ingest::ingest;
use framestamp::capture::{FrameReader, PixelFormat, RawFrame};
use framestamp::clock::{AuthoritativeTimeClient, TimeAuthority};
use framestamp::input::{spawn_listener, LineSource, ShutdownSignal, Trigger};
use framestamp::pipeline::FrameStore;
use framestamp::snapshot::{CaptureController, CaptureOutcome, CaptureState, NoViewer};
use framestamp::{AppError, Config};

const WIDTH: u32 = 48;
const HEIGHT: u32 = 32;

// ── Scripted time authorities ────────────────────────────────────────

struct Steady {
    calls: AtomicUsize,
}

impl TimeAuthority for Steady {
    fn query(&self) -> framestamp::Result<DateTime<Utc>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) as i64;
        let base = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        Ok(base + TimeDelta::milliseconds(n * 120))
    }
}

struct Unreachable;

impl TimeAuthority for Unreachable {
    fn query(&self) -> framestamp::Result<DateTime<Utc>> {
        Err(AppError::time_sync("request timed out"))
    }
}

/// Answers the first query, then goes silent
struct FailsAfterFirst {
    calls: AtomicUsize,
}

impl TimeAuthority for FailsAfterFirst {
    fn query(&self) -> framestamp::Result<DateTime<Utc>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            Ok(Utc::now())
        } else {
            Err(AppError::time_sync("request timed out"))
        }
    }
}

// ── Shared helpers ───────────────────────────────────────────────────

fn steady() -> AuthoritativeTimeClient {
    AuthoritativeTimeClient::new(
        Steady {
            calls: AtomicUsize::new(0),
        },
        250.0,
    )
}

fn controller_for(
    clock: AuthoritativeTimeClient,
    store: Arc<FrameStore>,
    dir: &Path,
) -> (CaptureController, flume::Sender<Trigger>, ShutdownSignal) {
    let mut config = Config::default();
    config.output.path = dir.join("preview.jpg");
    let (tx, rx) = flume::unbounded();
    let shutdown = ShutdownSignal::new();
    let controller = CaptureController::new(
        clock,
        store,
        rx,
        shutdown.clone(),
        Box::new(NoViewer),
        &config.output,
    );
    (controller, tx, shutdown)
}

fn decoder_stream(values: &[u8]) -> Vec<u8> {
    let frame_len = (WIDTH * HEIGHT * 3) as usize;
    values
        .iter()
        .flat_map(|&v| std::iter::repeat(v).take(frame_len))
        .collect()
}

// ── Scenarios ────────────────────────────────────────────────────────

#[tokio::test]
async fn ingested_frame_is_captured_and_decodable() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FrameStore::new());

    let stream = decoder_stream(&[10, 80, 160]);
    let reader = FrameReader::new(&stream[..], (WIDTH * HEIGHT * 3) as usize);
    let summary = ingest(reader, WIDTH, HEIGHT, PixelFormat::Bgr24, &store).await;
    assert_eq!(summary.frames_published, 3);

    let (ctl, _tx, _) = controller_for(steady(), Arc::clone(&store), dir.path());
    let CaptureOutcome::Completed(report) = ctl.capture().unwrap() else {
        panic!("capture was abandoned");
    };

    assert_eq!(report.elapsed_ms, 120);
    let decoded = image::open(ctl.output_path()).unwrap().to_rgb8();
    assert_eq!(decoded.dimensions(), (WIDTH, HEIGHT));
    // Latest frame (160) survives, within JPEG tolerance
    let mean: f64 =
        decoded.as_raw().iter().map(|&b| b as f64).sum::<f64>() / decoded.as_raw().len() as f64;
    assert!((mean - 160.0).abs() < 4.0, "mean {mean}");
}

#[test]
fn capture_before_first_frame_reports_no_frame() {
    let dir = tempfile::tempdir().unwrap();
    let (mut ctl, tx, _) = controller_for(steady(), Arc::new(FrameStore::new()), dir.path());

    assert!(matches!(ctl.capture(), Err(AppError::NoFrameAvailable)));

    tx.send(Trigger::Capture(' ')).unwrap();
    assert_eq!(ctl.step(), CaptureState::Capturing);
    assert_eq!(ctl.step(), CaptureState::WaitingForTrigger);
    assert!(!ctl.output_path().exists());
}

#[test]
fn unreachable_time_authority_leaves_no_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FrameStore::new());
    store.publish(RawFrame::filled(WIDTH, HEIGHT, 50, 1));

    let clock = AuthoritativeTimeClient::new(Unreachable, 250.0);
    let (mut ctl, tx, _) = controller_for(clock, store, dir.path());

    assert!(matches!(
        ctl.capture(),
        Err(AppError::TimeSyncUnavailable(_))
    ));

    tx.send(Trigger::Capture(' ')).unwrap();
    ctl.step();
    assert_eq!(ctl.step(), CaptureState::WaitingForTrigger);
    assert!(!ctl.output_path().exists());
}

#[test]
fn failed_post_timestamp_leaves_no_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FrameStore::new());
    store.publish(RawFrame::filled(WIDTH, HEIGHT, 50, 1));

    let clock = AuthoritativeTimeClient::new(
        FailsAfterFirst {
            calls: AtomicUsize::new(0),
        },
        250.0,
    );
    let (ctl, _tx, _) = controller_for(clock, store, dir.path());

    assert!(matches!(
        ctl.capture(),
        Err(AppError::TimeSyncUnavailable(_))
    ));
    assert!(!ctl.output_path().exists());
}

#[test]
fn snapshot_after_second_publish_sees_only_second_frame() {
    let store = Arc::new(FrameStore::new());
    store.publish(RawFrame::filled(WIDTH, HEIGHT, 0, 1));
    store.publish(RawFrame::filled(WIDTH, HEIGHT, 255, 2));

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || store.snapshot().unwrap())
        })
        .collect();

    for reader in readers {
        let frame = reader.join().unwrap();
        assert!(frame.data.iter().all(|&b| b == 255));
    }
}

#[test]
fn quit_token_mid_capture_skips_persistence() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FrameStore::new());
    store.publish(RawFrame::filled(WIDTH, HEIGHT, 50, 1));

    // Capture token followed by the quit token
    let source = Box::new(LineSource::new(Cursor::new(" \nq\n")));
    let shutdown = ShutdownSignal::new();
    let (triggers, listener) = spawn_listener(source, 'q', shutdown.clone(), || {}).unwrap();
    listener.join().unwrap();

    let mut config = Config::default();
    config.output.path = dir.path().join("preview.jpg");
    let mut ctl = CaptureController::new(
        steady(),
        store,
        triggers,
        shutdown,
        Box::new(NoViewer),
        &config.output,
    );

    assert_eq!(ctl.step(), CaptureState::Capturing);
    // Quit already arrived, so the capture is discarded before it is stored
    assert_eq!(ctl.step(), CaptureState::Terminated);
    assert!(!ctl.output_path().exists());
}

#[test]
fn repeated_captures_overwrite_single_output() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FrameStore::new());
    let (ctl, _tx, _) = controller_for(steady(), Arc::clone(&store), dir.path());

    store.publish(RawFrame::filled(WIDTH, HEIGHT, 20, 1));
    ctl.capture().unwrap();
    store.publish(RawFrame::filled(WIDTH, HEIGHT, 220, 2));
    ctl.capture().unwrap();

    let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);
    let decoded = image::open(ctl.output_path()).unwrap().to_rgb8();
    assert!(decoded.get_pixel(0, 0)[0] > 200);
}
