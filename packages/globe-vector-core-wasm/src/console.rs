#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

// This allows us to access console.log from JS
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
extern "C" {
    // Use `js_namespace` to bind `console.log(..)` instead of just `log(..)`
    #[wasm_bindgen(js_namespace = console)]
    pub fn log(s: &str);
}

#[cfg(target_arch = "wasm32")]
pub fn warn(s: &str) {
    web_sys::console::warn_1(&JsValue::from_str(s));
}

// Native builds (tests, native hosts) have no JS console to talk to
#[cfg(not(target_arch = "wasm32"))]
pub fn log(s: &str) {
    tracing::debug!(target: "globe_vector_core", "{}", s);
}

#[cfg(not(target_arch = "wasm32"))]
pub fn warn(s: &str) {
    tracing::warn!(target: "globe_vector_core", "{}", s);
}

// Note: The console_log and console_warn macros are defined in lib.rs to avoid duplication
