use std::path::Path;

use ndarray::{Array4, Axis};

use crate::detection::domain::oracle::OracleError;
use crate::shared::frame::Frame;

/// Return the preferred ONNX execution providers for the current platform.
///
/// Falls back to CPU if the platform-specific provider is unavailable.
pub fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

/// Open an ONNX model with the platform's execution providers.
pub fn load_session(model_path: &Path) -> Result<ort::session::Session, OracleError> {
    let load_err = |e: &dyn std::fmt::Display| {
        OracleError::Load(format!("{}: {e}", model_path.display()))
    };
    let session = ort::session::Session::builder()
        .map_err(|e| load_err(&e))?
        .with_execution_providers(preferred_execution_providers())
        .map_err(|e| load_err(&e))?
        .commit_from_file(model_path)
        .map_err(|e| load_err(&e))?;
    log::info!("loaded model {}", model_path.display());
    Ok(session)
}

/// `[1, H, W, 3]` float32 tensor of raw pixel values.
pub fn nhwc_tensor(frame: &Frame) -> Array4<f32> {
    frame.as_ndarray().mapv(f32::from).insert_axis(Axis(0))
}
