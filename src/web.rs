//! Web-specific functionality for running XR sessions in a browser.
//!
//! Small helpers around `web_sys` used by the WebXR runtime and by hosts
//! setting up the WebGL canvas the XR layer renders into.

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

/// Spawn a future on the browser's event loop
pub fn spawn_local<F>(future: F)
where
    F: std::future::Future<Output = ()> + 'static,
{
    wasm_bindgen_futures::spawn_local(future);
}

/// Find a canvas element by id
pub fn find_canvas(canvas_id: &str) -> Option<web_sys::HtmlCanvasElement> {
    let document = web_sys::window()?.document()?;
    document.get_element_by_id(canvas_id)?.dyn_into().ok()
}

/// Create a WebGL2 context on `canvas` that an XR layer can render into
pub fn xr_compatible_webgl2(
    canvas: &web_sys::HtmlCanvasElement,
) -> Option<web_sys::WebGl2RenderingContext> {
    let options = js_sys::Object::new();
    js_sys::Reflect::set(&options, &JsValue::from_str("xrCompatible"), &JsValue::TRUE).ok()?;
    canvas
        .get_context_with_context_options("webgl2", &options)
        .ok()??
        .dyn_into()
        .ok()
}

/// The browser's `navigator.xr`, if it has one.
///
/// `Navigator::xr` does not check for presence, so look the property up first.
#[cfg(feature = "webxr")]
pub fn xr_system() -> Option<web_sys::XrSystem> {
    let navigator = web_sys::window()?.navigator();
    let xr = js_sys::Reflect::get(&navigator, &JsValue::from_str("xr")).ok()?;
    if xr.is_undefined() || xr.is_null() {
        return None;
    }
    Some(xr.unchecked_into())
}

/// Best-effort message for a rejected promise
pub fn describe_js_error(error: &JsValue) -> String {
    if let Some(message) = error.as_string() {
        return message;
    }
    js_sys::Reflect::get(error, &JsValue::from_str("message"))
        .ok()
        .and_then(|message| message.as_string())
        .unwrap_or_else(|| format!("{:?}", error))
}

/// Log a message to the browser console
#[wasm_bindgen]
pub fn console_log(msg: &str) {
    web_sys::console::log_1(&msg.into());
}

/// Log an error to the browser console
#[wasm_bindgen]
pub fn console_error(msg: &str) {
    web_sys::console::error_1(&msg.into());
}
