// Logging sink behind the console_log! / console_warn! macros.
//
// In the browser everything goes to the JS console. Native builds (tests,
// producer threads) must not touch JS imports, so they go through the `log`
// facade instead and the embedding application picks the logger.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::JsValue;

#[cfg(target_arch = "wasm32")]
pub fn log(s: &str) {
    web_sys::console::log_1(&JsValue::from_str(s));
}

#[cfg(target_arch = "wasm32")]
pub fn warn(s: &str) {
    web_sys::console::warn_1(&JsValue::from_str(s));
}

#[cfg(not(target_arch = "wasm32"))]
pub fn log(s: &str) {
    log::info!(target: "osmgl", "{}", s);
}

#[cfg(not(target_arch = "wasm32"))]
pub fn warn(s: &str) {
    log::warn!(target: "osmgl", "{}", s);
}

// Note: The console_log and console_warn macros are defined in lib.rs
