//! Integration tests for routed playback
//!
//! A [`ThreadBackend`] drains the feed from its own thread the way a device
//! callback would, so these tests exercise routing, completion and
//! cancellation across threads.

use calibrate_core::domain::audio::{
    AudioError, DeviceId, PlaybackBackend, PlaybackHandle, PlaybackOutcome, PlaybackRequest,
};
use calibrate_core::domain::params::{ParamId, ParameterStore};
use calibrate_core::domain::stimulus::{synthesize_tone, DeviceSettings};
use calibrate_tests::{channel_samples, ThreadBackend};
use std::time::Duration;

const FS: f64 = 8000.0;

fn fast_backend() -> ThreadBackend {
    ThreadBackend {
        block_frames: 256,
        pacing: Duration::ZERO,
    }
}

#[test]
fn test_tone_routed_to_single_channel() {
    let mut params = ParameterStore::new();
    params.set(ParamId::Channels, "4").unwrap();
    params.set(ParamId::OutputChannel, "2").unwrap();
    params.set(ParamId::SampleRate, "8000").unwrap();

    let tone = synthesize_tone(440.0, 0.5, 0.25, FS);
    let request = DeviceSettings::from_params(&params)
        .playback_request(&tone)
        .unwrap();
    assert_eq!(request.channels, 4);
    assert_eq!(request.output_channel, 2);

    let playback = fast_backend().play(request).unwrap();
    let completion = playback.completion();
    let recorded = playback.join();

    assert_eq!(completion.try_recv(), Ok(PlaybackOutcome::Finished));

    let active = channel_samples(&recorded, 4, 1);
    let expected: Vec<f32> = tone.iter().map(|&s| s as f32).collect();
    assert_eq!(&active[..expected.len()], expected.as_slice());
    assert!(active[expected.len()..].iter().all(|&s| s == 0.0));

    for silent in [0, 2, 3] {
        assert!(channel_samples(&recorded, 4, silent).iter().all(|&s| s == 0.0));
    }
}

#[test]
fn test_cancel_midway_reports_cancelled() {
    let backend = ThreadBackend {
        block_frames: 64,
        pacing: Duration::from_millis(2),
    };
    let tone = synthesize_tone(1000.0, 1.0, 5.0, FS);
    let request = PlaybackRequest::new(DeviceId::new(0), 1, 1, FS, &tone).unwrap();

    let playback = backend.play(request).unwrap();
    let completion = playback.completion();
    std::thread::sleep(Duration::from_millis(20));
    assert!(playback.is_playing());

    playback.cancel();
    let outcome = completion.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(outcome, PlaybackOutcome::Cancelled);
    playback.wait_polling(Duration::from_millis(1));

    let recorded = playback.join();
    assert!(recorded.len() < tone.len());
}

#[test]
fn test_wait_polling_returns_after_finish() {
    let backend = ThreadBackend {
        block_frames: 128,
        pacing: Duration::from_millis(1),
    };
    let tone = synthesize_tone(250.0, 1.0, 0.1, FS);
    let request = PlaybackRequest::new(DeviceId::new(0), 2, 1, FS, &tone).unwrap();

    let playback = backend.play(request).unwrap();
    playback.wait_polling(Duration::from_millis(1));

    assert!(!playback.is_playing());
    assert_eq!(playback.completion().try_recv(), Ok(PlaybackOutcome::Finished));
}

#[test]
fn test_completion_arrives_once() {
    let tone = synthesize_tone(1000.0, 1.0, 0.05, FS);
    let request = PlaybackRequest::new(DeviceId::new(0), 1, 1, FS, &tone).unwrap();

    let playback = fast_backend().play(request).unwrap();
    let completion = playback.completion();
    let _ = playback.join();

    assert_eq!(completion.try_recv(), Ok(PlaybackOutcome::Finished));
    assert!(completion.try_recv().is_err());
}

#[test]
fn test_routing_beyond_channel_count_rejected() {
    let mut params = ParameterStore::new();
    params.set(ParamId::Channels, "2").unwrap();
    params.set(ParamId::OutputChannel, "3").unwrap();

    let err = DeviceSettings::from_params(&params)
        .playback_request(&[0.0; 16])
        .unwrap_err();

    assert!(matches!(
        err,
        AudioError::InvalidRouting {
            output_channel: 3,
            channels: 2
        }
    ));
}

#[test]
fn test_empty_waveform_finishes_immediately() {
    let request = PlaybackRequest::new(DeviceId::new(0), 1, 1, FS, &[]).unwrap();

    let playback = fast_backend().play(request).unwrap();
    let completion = playback.completion();
    let recorded = playback.join();

    assert_eq!(completion.try_recv(), Ok(PlaybackOutcome::Finished));
    assert!(recorded.iter().all(|&s| s == 0.0));
}
