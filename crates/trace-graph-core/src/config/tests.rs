//! Tests for validation-argument resolution.

use crate::traits::Task;

use super::{checked_image_size, ValArgs, ValOverrides, ValPhase};

#[test]
fn test_defaults() {
    let args = ValArgs::default();
    assert_eq!(args.image_size, 640);
    assert_eq!(args.task, Task::Detect);
    assert!(!args.rect);
    assert_eq!(args.phase, ValPhase::Val);
}

#[test]
fn test_stored_args_beat_defaults() {
    let stored = ValArgs {
        image_size: 320,
        conf_threshold: 0.25,
        ..ValArgs::default()
    };
    let args = ValArgs::resolve(Some(&stored), &ValOverrides::default());
    assert_eq!(args.image_size, 320);
    assert_eq!(args.conf_threshold, 0.25);
}

#[test]
fn test_overrides_beat_stored_args() {
    let stored = ValArgs {
        image_size: 320,
        ..ValArgs::default()
    };
    let overrides = ValOverrides::default()
        .with_image_size(64)
        .with_conf_threshold(0.5);
    let args = ValArgs::resolve(Some(&stored), &overrides);
    assert_eq!(args.image_size, 64);
    assert_eq!(args.conf_threshold, 0.5);
    // Untouched fields still come from the stored arguments.
    assert_eq!(args.iou_threshold, stored.iou_threshold);
}

#[test]
fn test_resolve_without_stored_args_uses_defaults() {
    let args = ValArgs::resolve(None, &ValOverrides::default().with_task(Task::Segment));
    assert_eq!(args.image_size, 640);
    assert_eq!(args.task, Task::Segment);
}

#[test]
fn test_rect_and_phase_are_forced() {
    let stored = ValArgs {
        rect: true,
        phase: ValPhase::Train,
        ..ValArgs::default()
    };
    let args = ValArgs::resolve(Some(&stored), &ValOverrides::default());
    assert!(!args.rect);
    assert_eq!(args.phase, ValPhase::Val);
}

#[test]
fn test_checked_image_size_keeps_aligned_values() {
    assert_eq!(checked_image_size(640, 32), 640);
    assert_eq!(checked_image_size(64, 16), 64);
}

#[test]
fn test_checked_image_size_snaps_up() {
    assert_eq!(checked_image_size(630, 32), 640);
    assert_eq!(checked_image_size(1, 32), 32);
}

#[test]
fn test_val_args_serde_fills_defaults() {
    let args: ValArgs = serde_json::from_str("{\"image_size\": 128}").unwrap();
    assert_eq!(args.image_size, 128);
    assert_eq!(args.task, Task::Detect);
    assert_eq!(args.conf_threshold, 0.001);
}
