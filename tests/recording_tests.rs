// Integration tests for voice note recording
//
// These tests drive the recording channel through the coordinator with a
// scripted capture backend and verify the voice note lifecycle.

mod common;

use anyhow::Result;
use common::{harness, harness_with_permissions, wait_until};
use loqa_companion::{
    AudioFile, Capability, Channel, RecordingStatus, SessionError, SessionEvent,
    StaticPermissionGate, StopOutcome,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_record_attaches_voice_note_to_draft() -> Result<()> {
    let h = harness()?;
    let c = &h.coordinator;

    c.start_recording().await?;
    assert!(matches!(
        c.status().await.recording,
        RecordingStatus::Recording { .. }
    ));

    let voice_ref = match c.stop_recording().await? {
        StopOutcome::Finalized(voice_ref) => voice_ref,
        other => panic!("expected Finalized, got {:?}", other),
    };

    assert!(voice_ref.as_str().starts_with("file://"));
    assert_eq!(c.composing().await.voice_ref(), Some(&voice_ref));
    assert_eq!(
        c.status().await.recording,
        RecordingStatus::Finalized {
            voice_ref: voice_ref.clone()
        }
    );

    // The note on disk holds the five scripted 100ms frames
    let path = voice_ref.as_str().trim_start_matches("file://");
    let note = AudioFile::open(path)?;
    assert_eq!(note.sample_rate, 16000);
    assert_eq!(note.channels, 1);
    assert_eq!(note.samples.len(), 5 * 1600);

    Ok(())
}

#[tokio::test]
async fn test_permission_denied_leaves_draft_unchanged() -> Result<()> {
    let h = harness_with_permissions(StaticPermissionGate::new(false, true))?;
    let c = &h.coordinator;
    let mut events = c.subscribe();

    c.set_text("draft").await;
    let before = c.composing().await;

    let result = c.start_recording().await;

    assert_eq!(
        result,
        Err(SessionError::PermissionDenied(Capability::Microphone))
    );
    assert_eq!(c.composing().await, before);
    assert_eq!(c.status().await.recording, RecordingStatus::Idle);
    assert_eq!(h.backend.starts.load(Ordering::SeqCst), 0);

    // set_text, then the notice
    assert!(matches!(events.recv().await?, SessionEvent::ComposingChanged { .. }));
    assert!(matches!(events.recv().await?, SessionEvent::Notice { .. }));

    Ok(())
}

#[tokio::test]
async fn test_permission_requested_on_every_attempt() -> Result<()> {
    let h = harness()?;
    let c = &h.coordinator;

    c.start_recording().await?;
    c.stop_recording().await?;
    c.start_recording().await?;
    c.stop_recording().await?;

    // The gate caches the grant, so only the first attempt prompts
    assert_eq!(h.permissions.prompt_count(), 1);
    assert_eq!(h.backend.starts.load(Ordering::SeqCst), 2);

    Ok(())
}

#[tokio::test]
async fn test_start_while_recording_is_rejected() -> Result<()> {
    let h = harness()?;
    let c = &h.coordinator;

    c.start_recording().await?;
    assert_eq!(
        c.start_recording().await,
        Err(SessionError::AlreadyActive(Channel::Recording))
    );
    assert_eq!(h.backend.starts.load(Ordering::SeqCst), 1);

    Ok(())
}

#[tokio::test]
async fn test_stop_when_idle_is_noop() -> Result<()> {
    let h = harness()?;
    let c = &h.coordinator;

    assert_eq!(c.stop_recording().await?, StopOutcome::NotRecording);
    assert_eq!(c.status().await.recording, RecordingStatus::Idle);
    assert!(c.composing().await.voice_ref().is_none());

    Ok(())
}

#[tokio::test]
async fn test_device_disconnect_during_stop_fails_cleanly() -> Result<()> {
    let h = harness()?;
    let c = &h.coordinator;

    c.start_recording().await?;
    h.backend.fail_stop.store(true, Ordering::SeqCst);

    let result = c.stop_recording().await;

    assert!(matches!(
        result,
        Err(SessionError::ResourceFailure {
            channel: Channel::Recording,
            ..
        })
    ));
    match c.status().await.recording {
        RecordingStatus::Failed { reason } => assert!(reason.contains("device disconnected")),
        other => panic!("expected Failed, got {:?}", other),
    }
    assert!(c.composing().await.voice_ref().is_none());

    // The partial note is discarded
    let leftover = std::fs::read_dir(h.recordings.path())?.count();
    assert_eq!(leftover, 0);

    // Not stuck: a new recording may start
    h.backend.fail_stop.store(false, Ordering::SeqCst);
    c.start_recording().await?;
    assert!(matches!(c.stop_recording().await?, StopOutcome::Finalized(_)));

    Ok(())
}

#[tokio::test]
async fn test_backend_start_failure() -> Result<()> {
    let h = harness()?;
    let c = &h.coordinator;
    h.backend.fail_start.store(true, Ordering::SeqCst);

    assert!(matches!(
        c.start_recording().await,
        Err(SessionError::ResourceFailure { .. })
    ));
    assert!(matches!(
        c.status().await.recording,
        RecordingStatus::Failed { .. }
    ));

    h.backend.fail_start.store(false, Ordering::SeqCst);
    c.start_recording().await?;

    Ok(())
}

#[tokio::test]
async fn test_empty_recording_fails() -> Result<()> {
    let h = harness()?;
    let c = &h.coordinator;
    h.backend.frames_per_start.store(0, Ordering::SeqCst);

    c.start_recording().await?;
    let result = c.stop_recording().await;

    match result {
        Err(SessionError::ResourceFailure { reason, .. }) => {
            assert!(reason.contains("No audio captured"))
        }
        other => panic!("expected ResourceFailure, got {:?}", other),
    }
    assert!(c.composing().await.voice_ref().is_none());

    Ok(())
}

#[tokio::test]
async fn test_hung_device_times_out_instead_of_hanging() -> Result<()> {
    let h = harness()?;
    let c = &h.coordinator;

    c.start_recording().await?;
    h.backend.hang_stop.store(true, Ordering::SeqCst);

    // finalize_timeout is 200ms in the test config
    let result = tokio::time::timeout(Duration::from_secs(2), c.stop_recording()).await?;

    assert!(matches!(result, Err(SessionError::ResourceFailure { .. })));
    assert!(matches!(
        c.status().await.recording,
        RecordingStatus::Failed { .. }
    ));

    Ok(())
}

#[tokio::test]
async fn test_stop_while_finalizing_still_terminates() -> Result<()> {
    let h = Arc::new(harness()?);

    h.coordinator.start_recording().await?;
    h.backend.hang_stop.store(true, Ordering::SeqCst);

    let first = {
        let h = Arc::clone(&h);
        tokio::spawn(async move { h.coordinator.stop_recording().await })
    };

    let c = &h.coordinator;
    let finalizing = wait_until(Duration::from_secs(1), move || async move {
        matches!(c.status().await.recording, RecordingStatus::Finalizing { .. })
    })
    .await;
    assert!(finalizing, "first stop should be finalizing");

    assert_eq!(
        h.coordinator.stop_recording().await?,
        StopOutcome::AlreadyFinalizing
    );
    assert_eq!(
        h.coordinator.start_recording().await,
        Err(SessionError::Busy(Channel::Recording))
    );

    // The in-flight stop reaches a terminal state
    let first = first.await?;
    assert!(first.is_err());
    assert!(matches!(
        h.coordinator.status().await.recording,
        RecordingStatus::Failed { .. }
    ));

    Ok(())
}

#[tokio::test]
async fn test_toggle_recording() -> Result<()> {
    let h = harness()?;
    let c = &h.coordinator;

    assert!(matches!(
        c.toggle_recording().await?,
        RecordingStatus::Recording { .. }
    ));
    assert!(matches!(
        c.toggle_recording().await?,
        RecordingStatus::Finalized { .. }
    ));
    assert!(c.composing().await.voice_ref().is_some());

    Ok(())
}

#[tokio::test]
async fn test_abandoned_stop_still_attaches_voice_note() -> Result<()> {
    let h = harness()?;
    let c = &h.coordinator;

    c.start_recording().await?;
    h.backend.stop_delay_ms.store(100, Ordering::SeqCst);

    let abandoned = tokio::time::timeout(Duration::from_millis(20), c.stop_recording()).await;
    assert!(abandoned.is_err());

    let attached = wait_until(Duration::from_secs(2), move || async move {
        c.composing().await.voice_ref().is_some()
    })
    .await;
    assert!(attached, "finalized note should reach the draft");
    assert!(matches!(
        c.status().await.recording,
        RecordingStatus::Finalized { .. }
    ));

    Ok(())
}

#[tokio::test]
async fn test_abandoned_stop_on_hung_device_recovers() -> Result<()> {
    let h = harness()?;
    let c = &h.coordinator;

    c.start_recording().await?;
    h.backend.hang_stop.store(true, Ordering::SeqCst);

    let abandoned = tokio::time::timeout(Duration::from_millis(20), c.stop_recording()).await;
    assert!(abandoned.is_err());
    h.backend.hang_stop.store(false, Ordering::SeqCst);

    // finalize_timeout is 200ms in the test config
    let failed = wait_until(Duration::from_secs(2), move || async move {
        matches!(c.status().await.recording, RecordingStatus::Failed { .. })
    })
    .await;
    assert!(failed, "finalize should time out without the caller");

    c.start_recording().await?;
    assert!(matches!(
        c.status().await.recording,
        RecordingStatus::Recording { .. }
    ));
    assert!(c.composing().await.voice_ref().is_none());

    Ok(())
}
