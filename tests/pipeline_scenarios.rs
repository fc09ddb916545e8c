use std::time::Duration;

use image::{Rgba, RgbaImage};

use hueflow::core_modules::color::{Rgb, hue_distance};
use hueflow::pipeline::{Analysis, AnalysisPipeline, EngineConfig};

fn test_config() -> EngineConfig {
    EngineConfig {
        grid_columns: 16,
        grid_rows: 9,
        histogram_average_frames: 1,
        analysis_period: Duration::from_millis(10),
        ..EngineConfig::default()
    }
}

fn solid_frame(color: Rgb) -> RgbaImage {
    RgbaImage::from_pixel(160, 90, Rgba([color.red, color.green, color.blue, 255]))
}

fn split_frame(left: Rgb, right: Rgb) -> RgbaImage {
    RgbaImage::from_fn(160, 90, |x, _y| {
        let color = if x < 80 { left } else { right };
        Rgba([color.red, color.green, color.blue, 255])
    })
}

#[test]
fn two_color_scene_targets_both_hues() {
    let mut pipeline = AnalysisPipeline::new(&test_config());
    let frame = split_frame(Rgb::new(255, 0, 0), Rgb::new(0, 255, 255));

    let Analysis::Retarget {
        targets,
        confidence,
        pace,
    } = pipeline.analyze(&frame, &[0.0, 0.0])
    else {
        panic!("expected a retarget for a vivid two-color frame");
    };
    assert_eq!(targets.len(), 2);
    assert!(pace > 0.0);
    assert!(confidence > 0.5, "confidence was {confidence}");

    let mut hues: Vec<f32> = targets
        .iter()
        .map(|t| t.expect("both channels should get a cluster").hue)
        .collect();
    hues.sort_by(|a, b| {
        hue_distance(*a, 0.0)
            .partial_cmp(&hue_distance(*b, 0.0))
            .unwrap()
    });
    assert!(hue_distance(hues[0], 0.0) < 0.05, "red channel got {}", hues[0]);
    assert!(hue_distance(hues[1], 0.5) < 0.05, "cyan channel got {}", hues[1]);
}

#[test]
fn dark_frames_carry_no_signal() {
    let mut pipeline = AnalysisPipeline::new(&test_config());
    assert_eq!(
        pipeline.analyze(&solid_frame(Rgb::BLACK), &[0.0, 0.0]),
        Analysis::NoSignal
    );
    // Gray is bright but colorless: still no signal.
    assert_eq!(
        pipeline.analyze(&solid_frame(Rgb::new(128, 128, 128)), &[0.0, 0.0]),
        Analysis::NoSignal
    );
}

#[test]
fn frozen_frames_replay_previous_targets() {
    let mut pipeline = AnalysisPipeline::new(&test_config());
    let frame = split_frame(Rgb::new(255, 0, 0), Rgb::new(0, 255, 255));

    let first = pipeline.analyze(&frame, &[0.0, 0.0]);
    assert!(matches!(first, Analysis::Retarget { .. }));

    let second = pipeline.analyze(&frame, &[0.0, 0.5]);
    assert!(
        matches!(second, Analysis::Unchanged { .. }),
        "identical frame should replay, got {second:?}"
    );
}

#[test]
fn single_color_scene_still_fills_both_channels() {
    let mut pipeline = AnalysisPipeline::new(&test_config());
    let frame = solid_frame(Rgb::new(0, 255, 0));

    let Analysis::Retarget { targets, .. } = pipeline.analyze(&frame, &[0.0, 0.0]) else {
        panic!("expected a retarget for a vivid single-color frame");
    };
    // The dominant cluster degrades to its border pair, so both channels get
    // a hue near green rather than one channel going dark.
    for target in &targets {
        let target = target.expect("both channels should be assigned");
        assert!(
            hue_distance(target.hue, 1.0 / 3.0) < 0.1,
            "channel strayed to hue {}",
            target.hue
        );
    }
}

#[test]
fn signal_recovers_after_dark_stretch() {
    let mut pipeline = AnalysisPipeline::new(&test_config());
    let vivid = split_frame(Rgb::new(255, 0, 0), Rgb::new(0, 255, 255));

    assert!(matches!(
        pipeline.analyze(&vivid, &[0.0, 0.0]),
        Analysis::Retarget { .. }
    ));
    for _ in 0..5 {
        assert_eq!(
            pipeline.analyze(&solid_frame(Rgb::BLACK), &[0.0, 0.5]),
            Analysis::NoSignal
        );
    }
    // The scene comes back unchanged: the reference frame is still the vivid
    // one, so this replays instead of retargeting.
    assert!(matches!(
        pipeline.analyze(&vivid, &[0.0, 0.5]),
        Analysis::Unchanged { .. }
    ));
}
