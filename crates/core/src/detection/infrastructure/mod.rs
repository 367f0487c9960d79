pub mod onnx_detection_model;
pub mod onnx_landmark_model;
pub mod session;
