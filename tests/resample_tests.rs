//! Integration tests for kernel construction and block resampling.

mod scope_fixtures;

use phosphor_scope::audio::{
    circle_block, lissajous_block, FilterSettings, KernelTable, ResampleError, Resampler,
};
use scope_fixtures::{radii, BLOCK_LEN, SAMPLE_RATE};
use std::f64::consts::PI;

fn resampler() -> Resampler {
    Resampler::new(FilterSettings::default()).unwrap()
}

#[test]
fn test_kernel_is_deterministic() {
    let a = KernelTable::build(8, 6, 1.5).unwrap();
    let b = KernelTable::build(8, 6, 1.5).unwrap();
    assert_eq!(a.coefficients(), b.coefficients());
    assert_eq!(a.len(), 48);
    assert_eq!(a.coefficients()[0], 1.0);

    let other = KernelTable::build(4, 3, 1.0).unwrap();
    assert_eq!(other.len(), 12);
    assert_eq!(other.coefficients()[0], 1.0);
}

#[test]
fn test_output_length_for_any_block() {
    let mut r = resampler();
    for n in [23, 64, 100, 512, 1024] {
        let prev = vec![0.0; n];
        let cur = vec![0.25; n];
        assert_eq!(r.resample(&prev, &cur).unwrap().len(), n * 6 + 1);
    }
}

#[test]
fn test_dc_is_preserved() {
    let mut r = resampler();
    for v in [-1.0f32, 0.1, 0.7] {
        let block = vec![v; BLOCK_LEN];
        let out = r.resample(&block, &block).unwrap();
        for s in out {
            assert!((s - v).abs() <= 2e-3 * v.abs(), "{s} drifted from {v}");
        }
    }
}

#[test]
fn test_raw_samples_pass_through() {
    let mut r = resampler();
    let prev: Vec<f32> = (0..64).map(|i| (i as f32 * 0.3).sin()).collect();
    let cur: Vec<f32> = (0..64).map(|i| (i as f32 * 0.7).cos()).collect();
    let out = r.resample(&prev, &cur).unwrap();

    // Every sixth output is a raw sample, starting 16 samples into the window.
    assert_eq!(out[0], prev[64 - 16]);
    assert_eq!(out[6], prev[64 - 15]);
    assert_eq!(out[16 * 6], cur[0]);
    assert_eq!(*out.last().unwrap(), cur[64 - 16]);
}

#[test]
fn test_sine_is_continuous_across_blocks() {
    let mut r = resampler();
    let freq = 440.0;
    let blocks: Vec<Vec<f32>> = (0..5)
        .map(|k| lissajous_block(freq, freq, SAMPLE_RATE, BLOCK_LEN, k, 1.0).x)
        .collect();

    let mut joined: Vec<f32> = Vec::new();
    for k in 1..blocks.len() {
        let out = r.resample(&blocks[k - 1], &blocks[k]).unwrap();
        if let Some(&last) = joined.last() {
            // The first sample repeats the previous block's last one.
            assert_eq!(out[0], last);
            joined.extend_from_slice(&out[1..]);
        } else {
            joined.extend_from_slice(&out);
        }
    }

    // Output sample j sits at input position BLOCK_LEN - 16 + j / 6.
    for (j, &s) in joined.iter().enumerate() {
        let position = (BLOCK_LEN - 16) as f64 + j as f64 / 6.0;
        let expected = (2.0 * PI * freq as f64 * position / SAMPLE_RATE as f64).sin();
        assert!(
            (s as f64 - expected).abs() < 2e-3,
            "sample {j}: {s} vs {expected}"
        );
    }
}

#[test]
fn test_circle_keeps_constant_radius() {
    let mut r = resampler();
    let prev = circle_block(440.0, SAMPLE_RATE, BLOCK_LEN, 0);
    let cur = circle_block(440.0, SAMPLE_RATE, BLOCK_LEN, 1);

    let x = r.resample(&prev.x, &cur.x).unwrap();
    let y = r.resample(&prev.y, &cur.y).unwrap();
    assert_eq!(x.len(), 3073);
    assert_eq!(y.len(), 3073);

    for radius in radii(&x, &y) {
        assert!((radius - 1.0).abs() < 2e-3, "radius {radius}");
    }
}

#[test]
fn test_invalid_blocks_are_rejected() {
    let mut r = resampler();
    assert!(matches!(
        r.resample(&[0.0; 64], &[0.0; 32]),
        Err(ResampleError::LengthMismatch {
            previous: 64,
            current: 32
        })
    ));
    assert!(matches!(
        r.resample(&[0.0; 22], &[0.0; 22]),
        Err(ResampleError::BlockTooShort { len: 22, needed: 23 })
    ));
}
