use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::RngCore;

use super::*;
use crate::{
    engine::scene::{CameraKind, PathContext, PathSample, SceneSource},
    engine::splatter::PixelFilter,
    foundation::core::{Resolution, Spectrum},
};

struct UniformScene {
    camera: CameraKind,
    radiance: Spectrum,
}

impl UniformScene {
    fn perspective() -> Arc<Self> {
        Arc::new(Self {
            camera: CameraKind::Perspective,
            radiance: Spectrum::splat(1.0),
        })
    }
}

impl SceneSource for UniformScene {
    fn camera(&self) -> CameraKind {
        self.camera
    }

    fn sample_path(&self, ctx: &PathContext, rng: &mut dyn RngCore) -> Vec<PathSample> {
        let u = rng.next_u32() as f32 / u32::MAX as f32;
        let v = rng.next_u32() as f32 / u32::MAX as f32;
        vec![PathSample {
            film_x: u * ctx.resolution.width as f32,
            film_y: v * ctx.resolution.height as f32,
            radiance: self.radiance,
        }]
    }
}

fn test_config() -> EngineConfig {
    EngineConfig {
        filter: PixelFilter::Box { radius: 0.5 },
        worker_count: 2,
        ..EngineConfig::default()
    }
}

fn film_8x8() -> Film {
    Film::new(Resolution::new(8, 8).unwrap())
}

fn wait_for_samples(engine: &LightTraceEngine) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while engine.total_samples() == 0 {
        assert!(Instant::now() < deadline, "workers produced no samples");
        std::thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn stereo_camera_is_rejected_at_construction() {
    let scene = Arc::new(UniformScene {
        camera: CameraKind::Stereo,
        radiance: Spectrum::splat(1.0),
    });
    let err = LightTraceEngine::new(test_config(), scene, film_8x8(), 1).unwrap_err();
    assert!(err.to_string().contains("configuration error"));
    assert!(err.to_string().contains("stereo"));
}

#[test]
fn start_samples_and_stop_joins_workers() {
    let mut engine =
        LightTraceEngine::new(test_config(), UniformScene::perspective(), film_8x8(), 7).unwrap();
    assert!(!engine.is_running());

    engine.start().unwrap();
    assert!(engine.is_running());
    assert!(engine.splatter_active());
    wait_for_samples(&engine);

    engine.stop().unwrap();
    assert!(!engine.is_running());
    assert!(!engine.splatter_active());

    // Every splatted sample is on the film once workers are joined.
    let splatted = engine.total_samples();
    assert!(splatted > 0);
    engine.with_film(|film| {
        film.develop();
        assert!(!film.is_empty());
    });

    // Sampling really stopped.
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(engine.total_samples(), splatted);
}

#[test]
fn start_while_running_is_a_configuration_error() {
    let mut engine =
        LightTraceEngine::new(test_config(), UniformScene::perspective(), film_8x8(), 7).unwrap();
    engine.start().unwrap();
    assert!(engine.start().is_err());
    engine.stop().unwrap();
}

#[test]
fn stop_without_start_is_a_configuration_error() {
    let mut engine =
        LightTraceEngine::new(test_config(), UniformScene::perspective(), film_8x8(), 7).unwrap();
    assert!(engine.stop().is_err());
}

#[test]
fn render_state_is_unavailable_while_running() {
    let mut engine =
        LightTraceEngine::new(test_config(), UniformScene::perspective(), film_8x8(), 7).unwrap();
    engine.start().unwrap();
    assert!(engine.render_state().is_err());
    engine.stop().unwrap();
    assert_eq!(engine.render_state().unwrap().bootstrap_seed(), 7);
}

#[test]
fn resume_bumps_the_seed_and_preserves_the_film() {
    let mut first =
        LightTraceEngine::new(test_config(), UniformScene::perspective(), film_8x8(), 42).unwrap();
    first.start().unwrap();
    wait_for_samples(&first);
    first.stop().unwrap();
    let state = first.render_state().unwrap();
    assert_eq!(state.bootstrap_seed(), 42);

    // A film carried over from the stopped run.
    let mut carried = film_8x8();
    carried.add_sample(3, 3, Spectrum::splat(9.0), 1.0);

    let mut second =
        LightTraceEngine::new(test_config(), UniformScene::perspective(), carried, 0).unwrap();
    second.resume(state).unwrap();
    assert_eq!(second.bootstrap_seed(), 43);
    assert!(second.film_preserved());
    second.stop().unwrap();

    // The pre-existing accumulation was continued, not cleared.
    second.with_film(|film| {
        assert!(film.weights()[3 * 8 + 3] >= 1.0);
    });
}

#[test]
fn fresh_start_clears_prior_film_content() {
    let mut carried = film_8x8();
    carried.add_sample(3, 3, Spectrum::splat(9.0), 1.0);

    let scene = Arc::new(UniformScene {
        camera: CameraKind::Perspective,
        radiance: Spectrum::BLACK,
    });
    let mut engine = LightTraceEngine::new(test_config(), scene, carried, 1).unwrap();
    engine.start().unwrap();
    engine.stop().unwrap();
    assert!(!engine.film_preserved());
    engine.with_film(|film| {
        // Black radiance still accumulates weight, but the carried
        // 9.0 sample is gone.
        film.develop();
        assert!(film.tonemapped().iter().all(|c| c.is_black()));
    });
}

#[test]
fn resume_rejects_a_foreign_engine_state() {
    let mut engine =
        LightTraceEngine::new(test_config(), UniformScene::perspective(), film_8x8(), 1).unwrap();
    let err = engine
        .resume(RenderState::new("bidir-trace", 9))
        .unwrap_err();
    assert!(err.to_string().contains("render state mismatch"));
    assert!(!engine.is_running());
}

#[test]
fn variance_clamp_bounds_sample_luminance() {
    let scene = Arc::new(UniformScene {
        camera: CameraKind::Perspective,
        radiance: Spectrum::splat(100.0),
    });
    let config = EngineConfig {
        variance_clamp_max: 2.0,
        ..test_config()
    };
    let mut engine = LightTraceEngine::new(config, scene, film_8x8(), 5).unwrap();
    engine.start().unwrap();
    wait_for_samples(&engine);
    engine.stop().unwrap();

    // Each sample was clamped to luminance 2^2 = 4 before splatting.
    engine.with_film(|film| {
        film.develop();
        for (c, &valid) in film.tonemapped().iter().zip(film.mask()) {
            if valid {
                assert!(c.y() <= 4.0 + 1e-3, "unclamped luminance {}", c.y());
            }
        }
    });
}

#[test]
fn to_properties_reports_the_engine_tag() {
    let engine =
        LightTraceEngine::new(test_config(), UniformScene::perspective(), film_8x8(), 1).unwrap();
    let props = engine.to_properties();
    assert_eq!(
        props.get_str(crate::engine::config::KEY_ENGINE_TYPE).unwrap(),
        Some(LIGHT_TRACE_TAG)
    );
    assert_eq!(engine.engine_tag(), LIGHT_TRACE_TAG);
}
