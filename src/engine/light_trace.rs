use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use rand::SeedableRng;
use rand::rngs::SmallRng;

use crate::{
    engine::config::EngineConfig,
    engine::properties::Properties,
    engine::scene::{CameraKind, PathContext, SceneSource},
    engine::splatter::SampleSplatter,
    engine::state::RenderState,
    film::store::Film,
    foundation::error::{LucentError, LucentResult},
};

/// Engine type tag carried by render states of this engine.
pub const LIGHT_TRACE_TAG: &str = "light-trace";

/// Paths each worker traces between film merges and stop checks.
const PATHS_PER_BATCH: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Configured,
    Running,
    Stopped,
}

/// Progressive light-tracing render engine.
///
/// Lifecycle: built in the configured state (configuration scalars
/// bound once, camera compatibility validated), then
/// [`start`](LightTraceEngine::start) -> running ->
/// [`stop`](LightTraceEngine::stop) -> stopped, after which a
/// [`RenderState`] can be extracted and moved into a fresh engine via
/// [`resume`](LightTraceEngine::resume) to continue the run without
/// discarding accumulated film content.
pub struct LightTraceEngine {
    config: EngineConfig,
    scene: Arc<dyn SceneSource>,
    film: Arc<Mutex<Film>>,
    phase: Phase,
    bootstrap_seed: u64,
    film_preserved: bool,
    splatter: Option<Arc<SampleSplatter>>,
    stop_flag: Arc<AtomicBool>,
    total_samples: Arc<AtomicU64>,
    workers: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for LightTraceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LightTraceEngine")
            .field("config", &self.config)
            .field("phase", &self.phase)
            .field("bootstrap_seed", &self.bootstrap_seed)
            .field("film_preserved", &self.film_preserved)
            .field("stop_flag", &self.stop_flag)
            .field("total_samples", &self.total_samples)
            .field("workers", &self.workers.len())
            .finish_non_exhaustive()
    }
}

fn lock_film(film: &Mutex<Film>) -> MutexGuard<'_, Film> {
    film.lock().unwrap_or_else(|e| e.into_inner())
}

impl LightTraceEngine {
    /// Build an engine over `scene`, accumulating into `film`.
    ///
    /// Fails immediately with a configuration error when the scene's
    /// camera family is unsupported; no compatible camera is ever
    /// silently substituted.
    pub fn new(
        config: EngineConfig,
        scene: Arc<dyn SceneSource>,
        film: Film,
        bootstrap_seed: u64,
    ) -> LucentResult<Self> {
        if scene.camera() == CameraKind::Stereo {
            return Err(LucentError::config(
                "light-trace engine does not support a stereo camera",
            ));
        }

        Ok(Self {
            config,
            scene,
            film: Arc::new(Mutex::new(film)),
            phase: Phase::Configured,
            bootstrap_seed,
            film_preserved: false,
            splatter: None,
            stop_flag: Arc::new(AtomicBool::new(false)),
            total_samples: Arc::new(AtomicU64::new(0)),
            workers: Vec::new(),
        })
    }

    /// Build an engine from a flat property set (see the `KEY_*`
    /// constants for the accepted keys).
    pub fn from_properties(
        props: &Properties,
        scene: Arc<dyn SceneSource>,
        film: Film,
        bootstrap_seed: u64,
    ) -> LucentResult<Self> {
        let config = EngineConfig::from_properties(props, LIGHT_TRACE_TAG)?;
        Self::new(config, scene, film, bootstrap_seed)
    }

    /// Engine type tag.
    pub fn engine_tag(&self) -> &'static str {
        LIGHT_TRACE_TAG
    }

    /// Configuration this run is bound to.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Flat property representation of the bound configuration.
    pub fn to_properties(&self) -> Properties {
        self.config.to_properties(LIGHT_TRACE_TAG)
    }

    /// Seed the current run draws its sample sequences from.
    pub fn bootstrap_seed(&self) -> u64 {
        self.bootstrap_seed
    }

    /// True while the sampling loop is active.
    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    /// True when the last start continued a prior run and kept the
    /// accumulated film content instead of clearing it.
    pub fn film_preserved(&self) -> bool {
        self.film_preserved
    }

    /// Total samples splatted so far across all workers.
    pub fn total_samples(&self) -> u64 {
        self.total_samples.load(Ordering::Relaxed)
    }

    /// True while the per-run sample splatter is alive. It is created
    /// at start and released at stop; it never outlives a stop.
    pub fn splatter_active(&self) -> bool {
        self.splatter.is_some()
    }

    /// Shared handle to the film this engine accumulates into.
    pub fn film(&self) -> Arc<Mutex<Film>> {
        Arc::clone(&self.film)
    }

    /// Run `f` with the film locked.
    pub fn with_film<R>(&self, f: impl FnOnce(&mut Film) -> R) -> R {
        f(&mut lock_film(&self.film))
    }

    /// Start sampling from scratch: the film is cleared and workers
    /// draw from the configured bootstrap seed.
    pub fn start(&mut self) -> LucentResult<()> {
        self.start_with(None)
    }

    /// Continue a prior run. The consumed state must carry this
    /// engine's tag; the new run draws from the prior seed plus one
    /// (a fresh but still reproducible sequence) and the accumulated
    /// film content is preserved.
    pub fn resume(&mut self, state: RenderState) -> LucentResult<()> {
        self.start_with(Some(state))
    }

    fn start_with(&mut self, prior: Option<RenderState>) -> LucentResult<()> {
        if self.phase == Phase::Running {
            return Err(LucentError::config("engine is already running"));
        }

        match prior {
            Some(state) => {
                state.check_engine_tag(LIGHT_TRACE_TAG)?;
                self.bootstrap_seed = state.bootstrap_seed() + 1;
                self.film_preserved = true;
                tracing::info!(
                    seed = self.bootstrap_seed,
                    "continuing light-trace render with a new seed"
                );
                // The prior state is consumed by the move and released here.
            }
            None => {
                self.film_preserved = false;
                lock_film(&self.film).clear();
            }
        }

        let resolution = lock_film(&self.film).resolution();
        let ctx = PathContext {
            resolution,
            max_path_depth: self.config.max_path_depth,
            rr_depth: self.config.rr_depth,
            rr_cap: self.config.rr_cap,
        };
        let luminance_cap = if self.config.variance_clamp_max > 0.0 {
            Some(self.config.variance_clamp_max * self.config.variance_clamp_max)
        } else {
            None
        };

        let splatter = Arc::new(SampleSplatter::new(self.config.filter));
        self.splatter = Some(Arc::clone(&splatter));
        self.stop_flag.store(false, Ordering::Relaxed);

        let worker_count = if self.config.worker_count == 0 {
            std::thread::available_parallelism().map_or(1, |n| n.get())
        } else {
            self.config.worker_count
        };

        for worker in 0..worker_count {
            let scene = Arc::clone(&self.scene);
            let film = Arc::clone(&self.film);
            let splatter = Arc::clone(&splatter);
            let stop = Arc::clone(&self.stop_flag);
            let total = Arc::clone(&self.total_samples);
            let seed = self.bootstrap_seed + worker as u64;

            self.workers.push(std::thread::spawn(move || {
                let mut rng = SmallRng::seed_from_u64(seed);
                let mut batch = Vec::new();
                while !stop.load(Ordering::Relaxed) {
                    batch.clear();
                    for _ in 0..PATHS_PER_BATCH {
                        batch.extend(scene.sample_path(&ctx, &mut rng));
                    }
                    if let Some(cap) = luminance_cap {
                        for s in &mut batch {
                            s.radiance = s.radiance.clamped_to_luminance(cap);
                        }
                    }
                    let mut film = lock_film(&film);
                    for s in &batch {
                        splatter.splat(&mut film, s);
                    }
                    drop(film);
                    total.fetch_add(batch.len() as u64, Ordering::Relaxed);
                }
            }));
        }

        tracing::info!(
            seed = self.bootstrap_seed,
            workers = worker_count,
            preserved = self.film_preserved,
            "light-trace sampling started"
        );
        self.phase = Phase::Running;
        Ok(())
    }

    /// Halt sampling. Blocks until every in-flight batch has been
    /// splatted, then releases the per-run splatter. Safe to call from
    /// outside the sampling loop.
    pub fn stop(&mut self) -> LucentResult<()> {
        if self.phase != Phase::Running {
            return Err(LucentError::config("engine is not running"));
        }

        self.stop_flag.store(true, Ordering::Relaxed);
        let mut panicked = false;
        for handle in self.workers.drain(..) {
            panicked |= handle.join().is_err();
        }

        // The splatter never outlives a stop, on any exit path.
        self.splatter = None;
        self.phase = Phase::Stopped;

        if panicked {
            return Err(LucentError::Other(anyhow::anyhow!(
                "a sampling worker panicked"
            )));
        }
        tracing::info!(samples = self.total_samples(), "light-trace sampling stopped");
        Ok(())
    }

    /// Extract a resumability snapshot. Only available while the
    /// engine is not running.
    pub fn render_state(&self) -> LucentResult<RenderState> {
        if self.phase == Phase::Running {
            return Err(LucentError::config(
                "stop the engine before extracting its render state",
            ));
        }
        Ok(RenderState::new(LIGHT_TRACE_TAG, self.bootstrap_seed))
    }
}

impl Drop for LightTraceEngine {
    fn drop(&mut self) {
        // Workers hold Arcs into the film; make sure none survive the
        // engine even when the caller forgot to stop.
        self.stop_flag.store(true, Ordering::Relaxed);
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/engine/light_trace.rs"]
mod tests;
