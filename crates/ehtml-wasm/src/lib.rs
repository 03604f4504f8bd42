//! WASM bindings for the EHTML template compiler.
//!
//! Exposes `render()` and `compileStandalone()` to JavaScript via
//! wasm-bindgen. Data and options cross the boundary as plain JS objects.

use ehtml_codegen::{compile_standalone, Options, Standalone, Value};
use serde::de::DeserializeOwned;
use wasm_bindgen::prelude::*;

/// Render a template with the given data object.
///
/// Throws a JS error if the template fails to compile or render.
#[wasm_bindgen]
pub fn render(source: &str, locals: JsValue) -> Result<String, JsError> {
    let locals: serde_json::Value = from_js(locals, "locals")?;
    render_json(source, locals).map_err(|e| JsError::new(&e.to_string()))
}

/// Compile a template to standalone template script.
///
/// Returns a JS object `{ code: string, map: string | undefined }`.
#[wasm_bindgen(js_name = compileStandalone)]
pub fn compile_standalone_js(source: &str, options: JsValue) -> Result<JsValue, JsError> {
    let options: Options = from_js(options, "options")?;
    let Standalone { code, map, .. } =
        compile_standalone(source, &options).map_err(|e| JsError::new(&e.to_string()))?;

    let js_obj = js_sys::Object::new();
    js_sys::Reflect::set(&js_obj, &"code".into(), &code.into())
        .map_err(|_| JsError::new("Failed to set code property"))?;
    let map = map.map_or(JsValue::UNDEFINED, JsValue::from);
    js_sys::Reflect::set(&js_obj, &"map".into(), &map)
        .map_err(|_| JsError::new("Failed to set map property"))?;

    Ok(js_obj.into())
}

/// Get the compiler version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// `undefined` and `null` mean "use the defaults".
fn from_js<T: DeserializeOwned + Default>(value: JsValue, what: &str) -> Result<T, JsError> {
    if value.is_undefined() || value.is_null() {
        return Ok(T::default());
    }
    serde_wasm_bindgen::from_value(value).map_err(|e| JsError::new(&format!("Invalid {what}: {e}")))
}

fn render_json(source: &str, locals: serde_json::Value) -> Result<String, ehtml_codegen::RenderError> {
    ehtml_codegen::render(source, &Value::from(locals), &Options::default())
}
