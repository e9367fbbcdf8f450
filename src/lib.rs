#[cfg(not(target_arch = "wasm32"))]
pub mod app;
pub mod model;

#[cfg(target_arch = "wasm32")]
use crate::model::{Collaborators, Engine, EngineConfig};
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
fn js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Browser host: the page drives `tick(now_ms)` from its own interval and
/// polls `snapshot_json()` to render. No persistence; events go to the log.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub struct Simulation {
    engine: Engine,
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
impl Simulation {
    #[wasm_bindgen(constructor)]
    pub fn new(seed: Option<u64>) -> Result<Simulation, JsValue> {
        console_error_panic_hook::set_once();

        let config = EngineConfig {
            seed: Some(seed.unwrap_or_else(|| js_sys::Date::now() as u64)),
            ..Default::default()
        };
        let engine = Engine::new(&config, Collaborators::default()).map_err(js_err)?;
        Ok(Simulation { engine })
    }

    pub fn tick(&mut self, now_ms: f64) {
        self.engine.tick_all(now_ms.max(0.0) as u64);
    }

    pub fn snapshot_json(&self, now_ms: f64) -> Result<String, JsValue> {
        serde_json::to_string(&self.engine.snapshot(now_ms.max(0.0) as u64)).map_err(js_err)
    }

    pub fn activate(&mut self, phase: &str, now_ms: f64) -> Result<(), JsValue> {
        self.engine
            .activate_phase(phase, now_ms.max(0.0) as u64)
            .map_err(js_err)
    }

    pub fn deactivate(&mut self, phase: &str) -> Result<(), JsValue> {
        self.engine.deactivate_phase(phase).map_err(js_err)
    }

    pub fn set_share(&mut self, pool: &str, name: &str, value: f64) -> Result<(), JsValue> {
        self.engine.set_share(pool, name, value).map_err(js_err)
    }

    pub fn unlock_capability(&mut self, id: &str) -> Result<u32, JsValue> {
        self.engine.unlock_capability(id).map_err(js_err)
    }

    pub fn activate_technique(&mut self, id: &str, now_ms: f64) -> Result<(), JsValue> {
        self.engine
            .activate_technique(id, now_ms.max(0.0) as u64)
            .map_err(js_err)
    }

    pub fn deactivate_technique(&mut self, id: &str) -> Result<bool, JsValue> {
        self.engine.deactivate_technique(id).map_err(js_err)
    }

    pub fn set_autonomous(&mut self, enabled: bool) {
        self.engine.set_autonomous(enabled);
    }
}
