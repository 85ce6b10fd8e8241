//! End-to-end tests of the block driver against a recording sink.

mod scope_fixtures;

use phosphor_scope::audio::{trigger_pattern, SampleBlock};
use phosphor_scope::settings::SettingsError;
use phosphor_scope::{
    BlockOutcome, ConfigSnapshot, DriverState, FilterSettings, FrameDriver, Payload,
    PipelineError, SettingsSource,
};
use scope_fixtures::{
    base64_payload, circle_payload, init_logger, radii, stream, RecordingSink, BLOCK_LEN,
};

fn driver() -> FrameDriver {
    FrameDriver::new(stream(), FilterSettings::default()).unwrap()
}

/// Serves snapshots parsed from host JSON, one per block.
struct JsonSettings {
    documents: Vec<String>,
    served: usize,
}

impl SettingsSource for JsonSettings {
    async fn fetch(&mut self) -> Result<ConfigSnapshot, SettingsError> {
        let index = self.served.min(self.documents.len() - 1);
        self.served += 1;
        ConfigSnapshot::from_json(&self.documents[index])
    }
}

#[tokio::test]
async fn test_circle_stream_traces_constant_radius() {
    init_logger();
    let mut driver = driver();
    let mut settings = ConfigSnapshot::default();
    let mut sink = RecordingSink::default();

    for index in 0..4 {
        let outcome = driver
            .on_block(circle_payload(index), &mut settings, &mut sink)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            BlockOutcome::Drawn {
                resets: 0,
                points: 3073
            }
        );
    }

    // The first block is filtered against silence; later ones are steady.
    for trace in &sink.traces[1..] {
        assert_eq!(trace.x.len(), 3073);
        for radius in radii(&trace.x, &trace.y) {
            assert!((radius - 1.0).abs() < 2e-3, "radius {radius}");
        }
        assert!(trace.z.iter().all(|&z| z == 1.0));
    }
}

#[tokio::test]
async fn test_sweep_block_resets_twice() {
    init_logger();
    let mut driver = driver();
    let mut settings = ConfigSnapshot {
        sweep_on: true,
        sweep_ms_div: 0.1,
        sweep_trigger_value: 0.0,
        ..Default::default()
    };
    let mut sink = RecordingSink::default();

    let y = trigger_pattern(BLOCK_LEN, &[150, 275, 400], -1.0, 1.0);
    let block = SampleBlock::from_channels(vec![0.0; BLOCK_LEN], y, None);

    let outcome = driver
        .on_block(base64_payload(&block, 2), &mut settings, &mut sink)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        BlockOutcome::Drawn {
            resets: 2,
            points: 3073
        }
    );
    // The retained block carries the ramp, not the original X.
    assert!(driver.previous_block().x.iter().any(|&x| x != 0.0));
}

#[tokio::test]
async fn test_three_channel_stream_resamples_z() {
    let mut driver = driver();
    let mut settings = ConfigSnapshot {
        num_channels: 3,
        ..Default::default()
    };
    let mut sink = RecordingSink::default();

    let block = SampleBlock::from_channels(
        vec![0.1; BLOCK_LEN],
        vec![0.2; BLOCK_LEN],
        Some(vec![0.5; BLOCK_LEN]),
    );
    for _ in 0..2 {
        driver
            .on_block(base64_payload(&block, 3), &mut settings, &mut sink)
            .await
            .unwrap();
    }

    let trace = &sink.traces[1];
    assert!(trace.z.iter().all(|&z| (z - 0.5).abs() < 2e-3));
}

#[tokio::test]
async fn test_channel_mismatch_is_skipped() {
    let mut driver = driver();
    let mut settings = ConfigSnapshot {
        num_channels: 3,
        ..Default::default()
    };
    let mut sink = RecordingSink::default();

    // Two channels of data cannot fill three-channel frames.
    let outcome = driver
        .on_block(circle_payload(0), &mut settings, &mut sink)
        .await
        .unwrap();
    assert!(matches!(outcome, BlockOutcome::Skipped(_)));
    assert!(sink.traces.is_empty());

    let outcome = driver
        .on_block(Payload::Base64("not base64!".into()), &mut settings, &mut sink)
        .await
        .unwrap();
    assert!(matches!(outcome, BlockOutcome::Skipped(_)));
    assert_eq!(driver.state(), DriverState::AwaitingData);
}

#[tokio::test]
async fn test_settings_json_drives_each_block() {
    let mut driver = driver();
    let mut settings = JsonSettings {
        documents: vec![
            r#"{"brightness": 2.0, "invertXY": true}"#.into(),
            r#"{"brightness": 2.0, "freezeImage": true, "smudges": false}"#.into(),
        ],
        served: 0,
    };
    let mut sink = RecordingSink::default();

    let first = driver
        .on_block(circle_payload(0), &mut settings, &mut sink)
        .await
        .unwrap();
    assert!(matches!(first, BlockOutcome::Drawn { .. }));
    assert!(sink.traces[0].params.invert);

    let second = driver
        .on_block(circle_payload(1), &mut settings, &mut sink)
        .await
        .unwrap();
    assert_eq!(second, BlockOutcome::Frozen { resets: 0 });
    assert_eq!(sink.traces.len(), 1);
    assert_eq!(sink.overlays.len(), 2);
    assert!(!sink.overlays[1].smudges);

    driver.on_refresh(&mut sink, &()).unwrap();
    assert_eq!(sink.presents[0].exposure, 1.0);
}

#[tokio::test]
async fn test_malformed_settings_are_an_error() {
    let mut driver = driver();
    let mut settings = JsonSettings {
        documents: vec!["{ not json".into()],
        served: 0,
    };
    let mut sink = RecordingSink::default();

    let result = driver
        .on_block(circle_payload(0), &mut settings, &mut sink)
        .await;
    assert!(matches!(result, Err(PipelineError::Settings(_))));
    assert_eq!(driver.state(), DriverState::AwaitingData);
}

#[tokio::test]
async fn test_bad_channel_count_skips_for_every_source() {
    let mut driver = driver();
    let mut sink = RecordingSink::default();

    let mut direct = ConfigSnapshot {
        num_channels: 4,
        ..Default::default()
    };
    let outcome = driver
        .on_block(circle_payload(0), &mut direct, &mut sink)
        .await
        .unwrap();
    assert!(matches!(outcome, BlockOutcome::Skipped(_)));

    let mut json = JsonSettings {
        documents: vec![r#"{"numChannels": 4}"#.into()],
        served: 0,
    };
    let outcome = driver
        .on_block(circle_payload(1), &mut json, &mut sink)
        .await
        .unwrap();
    assert!(matches!(outcome, BlockOutcome::Skipped(_)));
    assert!(sink.traces.is_empty());
}

fn sweep_payload() -> Payload {
    let y = trigger_pattern(BLOCK_LEN, &[150, 275, 400], -1.0, 1.0);
    base64_payload(&SampleBlock::from_channels(vec![0.0; BLOCK_LEN], y, None), 2)
}

#[tokio::test]
async fn test_failed_draw_leaves_sweep_and_overlap_untouched() {
    let sweep_settings = || ConfigSnapshot {
        sweep_on: true,
        sweep_ms_div: 0.1,
        sweep_trigger_value: 0.0,
        ..Default::default()
    };

    // Reference run: two blocks drawn back to back.
    let mut reference = driver();
    let mut reference_sink = RecordingSink::default();
    let mut settings = sweep_settings();
    let mut expected = Vec::new();
    for _ in 0..2 {
        expected.push(
            reference
                .on_block(sweep_payload(), &mut settings, &mut reference_sink)
                .await
                .unwrap(),
        );
    }

    // Same blocks with a failed draw in between.
    let mut driver = driver();
    let mut sink = RecordingSink::default();
    let mut settings = sweep_settings();
    let first = driver
        .on_block(sweep_payload(), &mut settings, &mut sink)
        .await
        .unwrap();
    assert_eq!(first, expected[0]);

    let previous_x = driver.previous_block().x.clone();
    let position = driver.sweep().position();
    sink.fail_next_draw = true;
    let failed = driver
        .on_block(sweep_payload(), &mut settings, &mut sink)
        .await;
    assert!(matches!(failed, Err(PipelineError::Gpu(_))));
    assert_eq!(driver.state(), DriverState::AwaitingData);
    assert_eq!(driver.previous_block().x, previous_x);
    assert_eq!(driver.sweep().position(), position);

    let second = driver
        .on_block(sweep_payload(), &mut settings, &mut sink)
        .await
        .unwrap();
    assert_eq!(second, expected[1]);
    assert_eq!(sink.traces.len(), 2);
    assert_eq!(sink.traces[1].x, reference_sink.traces[1].x);
    assert_eq!(sink.traces[1].y, reference_sink.traces[1].y);
}

#[tokio::test]
async fn test_resize_is_forwarded() {
    let mut driver = driver();
    let mut sink = RecordingSink::default();
    driver.on_resize(&mut sink, 800, 600);
    assert_eq!(sink.resizes, vec![(800, 600)]);
}
