use crate::generator::JavaOptions;
use crate::hardware::HardwareConfig;
use wasm_bindgen::prelude::*;

fn hardware_from(json: Option<String>) -> Result<HardwareConfig, JsValue> {
    match json {
        Some(json) => HardwareConfig::from_json_str(&json).map_err(|e| JsValue::from_str(&format!("{:#}", e))),
        None => Ok(HardwareConfig::default()),
    }
}

#[wasm_bindgen]
pub fn render_javascript(source: &str, hardware_json: Option<String>) -> Result<String, JsValue> {
    let hardware = hardware_from(hardware_json)?;
    crate::render_javascript(source, &hardware).map_err(|e| JsValue::from_str(&format!("{:#}", e)))
}

#[wasm_bindgen]
pub fn render_java(
    source: &str,
    hardware_json: Option<String>,
    class_name: &str,
    package: &str,
) -> Result<String, JsValue> {
    let hardware = hardware_from(hardware_json)?;
    let options = JavaOptions {
        class_name: class_name.to_string(),
        package: package.to_string(),
    };
    crate::render_java(source, &hardware, &options).map_err(|e| JsValue::from_str(&format!("{:#}", e)))
}
