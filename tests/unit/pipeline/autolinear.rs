use super::*;
use crate::{
    foundation::core::Resolution,
    pipeline::plugin::{ImagePipeline, PipelineEnv},
};

const ENV: PipelineEnv = PipelineEnv { gamma: 2.2 };

fn developed_film(luminances: &[f32], width: u32, height: u32) -> Film {
    let mut film = Film::new(Resolution::new(width, height).unwrap());
    for (i, &v) in luminances.iter().enumerate() {
        let x = i as u32 % width;
        let y = i as u32 / width;
        film.add_sample(x, y, Spectrum::splat(v), 1.0);
    }
    film.develop();
    film
}

#[test]
fn reference_scale_on_2x2_quad() {
    // Luminances {1,2,3,4}, all valid, gamma 2.2: mean Y = 2.5 and
    // scale = (1.25 / 2.5) * (118/255)^2.2.
    let mut film = developed_film(&[1.0, 2.0, 3.0, 4.0], 2, 2);
    let expected = (1.25 / 2.5) * (118.0f32 / 255.0).powf(2.2);
    assert!(expected > 0.0917 && expected < 0.0918);

    let mut plugin = AutoLinearToneMap::new();
    plugin.apply_host(&mut film, &ENV).unwrap();

    for (i, base) in [1.0f32, 2.0, 3.0, 4.0].iter().enumerate() {
        let got = film.tonemapped()[i].y();
        let want = base * expected;
        assert!(
            (got - want).abs() <= want * 1e-5,
            "pixel {i}: got {got}, want {want}"
        );
    }
}

#[test]
fn non_positive_mean_is_a_silent_no_op() {
    let mut film = developed_film(&[-1.0, 0.0, -3.0, 0.0], 2, 2);
    let before = film.tonemapped().to_vec();

    let mut plugin = AutoLinearToneMap::new();
    plugin.apply_host(&mut film, &ENV).unwrap();
    assert_eq!(film.tonemapped(), &before[..]);
}

#[test]
fn empty_mask_is_a_no_op() {
    let mut film = Film::new(Resolution::new(4, 4).unwrap());
    film.develop();
    let mut plugin = AutoLinearToneMap::new();
    plugin.apply_host(&mut film, &ENV).unwrap();
    assert!(film.tonemapped().iter().all(|c| c.is_black()));
}

#[test]
fn skipped_pixels_do_not_shrink_the_divisor() {
    // One valid pixel at y = 2 and one valid pixel at y = -1: the
    // negative pixel is excluded from the sum but the divisor stays at
    // the total pixel count, so the mean is 2 / 2 = 1.
    let mut film = developed_film(&[2.0, -1.0], 2, 1);
    let expected = AutoLinearToneMap::scale_for_mean(1.0, 2.2).unwrap();

    let mut plugin = AutoLinearToneMap::new();
    plugin.apply_host(&mut film, &ENV).unwrap();

    let got = film.tonemapped()[0].y() / 2.0;
    assert!((got - expected).abs() <= expected * 1e-5);
    // Valid pixels are scaled regardless of their own luminance.
    assert!((film.tonemapped()[1].y() - -expected).abs() <= expected * 1e-5);
}

#[test]
fn invalid_pixels_count_toward_the_divisor_but_not_the_sum() {
    let mut film = Film::new(Resolution::new(2, 1).unwrap());
    film.add_sample(0, 0, Spectrum::splat(1.0), 1.0);
    film.develop();

    // Mean is 1 / 2, not 1 / 1.
    let expected = AutoLinearToneMap::scale_for_mean(0.5, 2.2).unwrap();
    let mut plugin = AutoLinearToneMap::new();
    plugin.apply_host(&mut film, &ENV).unwrap();

    let got = film.tonemapped()[0].y();
    assert!((got - expected).abs() <= expected * 1e-5);
    assert!(film.tonemapped()[1].is_black());
}

#[test]
fn non_finite_pixels_are_excluded_without_corrupting_neighbors() {
    let mut film = developed_film(&[1.0, 1.0], 2, 1);
    film.tonemapped_mut()[1] = Spectrum::splat(f32::INFINITY);

    let mut plugin = AutoLinearToneMap::new();
    plugin.apply_host(&mut film, &ENV).unwrap();

    let expected = AutoLinearToneMap::scale_for_mean(0.5, 2.2).unwrap();
    let got = film.tonemapped()[0].y();
    assert!(got.is_finite());
    assert!((got - expected).abs() <= expected * 1e-5);
}

#[test]
fn repeated_application_is_stable_on_constant_input() {
    // Not self-idempotent: each pass resolves a new scale from the new
    // mean. On constant input the luminance lands on the fixed point
    // 1.25 * (118/255)^gamma after one pass and stays there.
    let mut film = developed_film(&[1.0; 16], 4, 4);
    let mut plugin = AutoLinearToneMap::new();

    let fixed_point = 1.25 * (118.0f32 / 255.0).powf(2.2);
    for _ in 0..10 {
        plugin.apply_host(&mut film, &ENV).unwrap();
        let y = film.tonemapped()[0].y();
        assert!(y.is_finite());
        assert!((y - fixed_point).abs() <= fixed_point * 1e-3);
    }
}

#[test]
fn scale_for_mean_guards_degenerate_input() {
    assert!(AutoLinearToneMap::scale_for_mean(0.0, 2.2).is_none());
    assert!(AutoLinearToneMap::scale_for_mean(-1.0, 2.2).is_none());
    assert!(AutoLinearToneMap::scale_for_mean(2.5, 2.2).is_some());
}

// ---------------------------------------------------------------------------
// Device path. These exercise a real adapter and skip when none exists.
// ---------------------------------------------------------------------------

fn try_context() -> Option<crate::device::context::DeviceContext> {
    match crate::device::context::DeviceContext::new() {
        Ok(ctx) => Some(ctx),
        Err(err) => {
            eprintln!("skipping device test: {err}");
            None
        }
    }
}

fn checkerboard_film(width: u32, height: u32) -> Film {
    let mut film = Film::new(Resolution::new(width, height).unwrap());
    for y in 0..height {
        for x in 0..width {
            // Leave every 7th pixel invalid, and mix in a negative one.
            let i = y * width + x;
            if i % 7 == 3 {
                continue;
            }
            let v = if i % 11 == 5 {
                -0.5
            } else {
                0.05 + (i % 13) as f32 * 0.35
            };
            film.add_sample(x, y, Spectrum::new(v, v * 0.5, v * 0.25), 1.0);
        }
    }
    film.develop();
    film
}

#[test]
fn device_path_matches_host_path() {
    let Some(ctx) = try_context() else { return };

    let mut host_film = checkerboard_film(64, 48);
    let mut device_film = checkerboard_film(64, 48);

    let mut host_plugin = AutoLinearToneMap::new();
    host_plugin.apply_host(&mut host_film, &ENV).unwrap();

    let mut pipeline = ImagePipeline::new();
    pipeline.push(Box::new(AutoLinearToneMap::new()));
    pipeline.execute_device(&mut device_film, &ctx).unwrap();

    for (i, (h, d)) in host_film
        .tonemapped()
        .iter()
        .zip(device_film.tonemapped())
        .enumerate()
    {
        let scale = h.y().abs().max(1e-3);
        assert!(
            (h.y() - d.y()).abs() <= scale * 1e-4,
            "pixel {i}: host {h:?} vs device {d:?}"
        );
    }
}

#[test]
fn kernel_cache_survives_repeated_invocations() {
    let Some(ctx) = try_context() else { return };

    let film = checkerboard_film(32, 32);
    let mut mirror =
        crate::film::device::DeviceFilm::new(&ctx, film.resolution()).unwrap();
    mirror.upload(&ctx, film.tonemapped(), film.mask());

    let mut plugin = AutoLinearToneMap::new();
    for _ in 0..3 {
        plugin.apply_device(&mut mirror, &ENV, &ctx).unwrap();
    }
    assert_eq!(plugin.device_build_count(), 1);

    // A gamma change refreshes the uniform without a rebuild.
    plugin
        .apply_device(&mut mirror, &PipelineEnv { gamma: 2.4 }, &ctx)
        .unwrap();
    assert_eq!(plugin.device_build_count(), 1);
}

#[test]
fn resolution_change_forces_exactly_one_rebuild() {
    let Some(ctx) = try_context() else { return };

    let film_a = checkerboard_film(32, 32);
    let mut mirror_a =
        crate::film::device::DeviceFilm::new(&ctx, film_a.resolution()).unwrap();
    mirror_a.upload(&ctx, film_a.tonemapped(), film_a.mask());

    let mut plugin = AutoLinearToneMap::new();
    plugin.apply_device(&mut mirror_a, &ENV, &ctx).unwrap();
    plugin.apply_device(&mut mirror_a, &ENV, &ctx).unwrap();
    assert_eq!(plugin.device_build_count(), 1);

    let film_b = checkerboard_film(64, 32);
    let mut mirror_b =
        crate::film::device::DeviceFilm::new(&ctx, film_b.resolution()).unwrap();
    mirror_b.upload(&ctx, film_b.tonemapped(), film_b.mask());

    plugin.apply_device(&mut mirror_b, &ENV, &ctx).unwrap();
    assert_eq!(plugin.device_build_count(), 2);
    plugin.apply_device(&mut mirror_b, &ENV, &ctx).unwrap();
    assert_eq!(plugin.device_build_count(), 2);
}
