use crate::foundation::error::{LucentError, LucentResult};

/// Resumability snapshot of a render engine.
///
/// Owned by the engine while it runs; extracted after a stop for
/// persistence and moved into the engine that continues the run. The
/// receiving engine validates the tag before consuming the seed.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RenderState {
    engine_tag: String,
    bootstrap_seed: u64,
}

impl RenderState {
    /// Snapshot for `engine_tag` at `bootstrap_seed`.
    pub fn new(engine_tag: impl Into<String>, bootstrap_seed: u64) -> Self {
        Self {
            engine_tag: engine_tag.into(),
            bootstrap_seed,
        }
    }

    /// Tag of the engine type that produced this state.
    pub fn engine_tag(&self) -> &str {
        &self.engine_tag
    }

    /// Seed the producing run was bootstrapped with.
    pub fn bootstrap_seed(&self) -> u64 {
        self.bootstrap_seed
    }

    /// Fail unless this state was produced by an `expected` engine.
    pub fn check_engine_tag(&self, expected: &str) -> LucentResult<()> {
        if self.engine_tag != expected {
            return Err(LucentError::state_mismatch(format!(
                "state from engine '{}' cannot resume engine '{expected}'",
                self.engine_tag
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/engine/state.rs"]
mod tests;
