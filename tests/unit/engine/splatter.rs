use super::*;
use crate::{
    engine::scene::PathSample,
    foundation::core::{Resolution, Spectrum},
};

fn sample_at(x: f32, y: f32) -> PathSample {
    PathSample {
        film_x: x,
        film_y: y,
        radiance: Spectrum::splat(1.0),
    }
}

#[test]
fn box_filter_weight_is_flat_inside_radius() {
    let f = PixelFilter::Box { radius: 0.5 };
    assert_eq!(f.eval(0.0, 0.0), 1.0);
    assert_eq!(f.eval(0.5, -0.5), 1.0);
    assert_eq!(f.eval(0.6, 0.0), 0.0);
}

#[test]
fn gaussian_filter_decays_and_vanishes_at_radius() {
    let f = PixelFilter::default_gaussian();
    let center = f.eval(0.0, 0.0);
    let mid = f.eval(0.75, 0.0);
    assert!(center > mid && mid > 0.0);
    assert_eq!(f.eval(1.5, 0.0), 0.0);
    assert_eq!(f.eval(0.0, 2.0), 0.0);
}

#[test]
fn box_splat_at_pixel_center_hits_one_pixel() {
    let splatter = SampleSplatter::new(PixelFilter::Box { radius: 0.5 });
    let mut film = Film::new(Resolution::new(3, 3).unwrap());
    splatter.splat(&mut film, &sample_at(1.5, 1.5));
    film.develop();

    assert_eq!(
        film.mask().iter().filter(|&&m| m).count(),
        1,
        "only the center pixel should receive weight"
    );
    assert_eq!(film.tonemapped()[4], Spectrum::splat(1.0));
}

#[test]
fn gaussian_splat_spreads_over_the_footprint() {
    let splatter = SampleSplatter::new(PixelFilter::default_gaussian());
    let mut film = Film::new(Resolution::new(5, 5).unwrap());
    splatter.splat(&mut film, &sample_at(2.5, 2.5));
    film.develop();

    let covered = film.mask().iter().filter(|&&m| m).count();
    assert!(covered > 1, "gaussian support covers neighbors");
    let center_w = film.weights()[12];
    assert!(film.weights().iter().all(|&w| w <= center_w));
}

#[test]
fn splats_near_the_border_are_clipped() {
    let splatter = SampleSplatter::new(PixelFilter::default_gaussian());
    let mut film = Film::new(Resolution::new(4, 4).unwrap());
    splatter.splat(&mut film, &sample_at(0.0, 0.0));
    splatter.splat(&mut film, &sample_at(-0.4, 3.9));
    film.develop();
    // Nothing panics and only in-bounds pixels accumulate.
    assert!(film.weights().iter().all(|&w| w >= 0.0));
}
