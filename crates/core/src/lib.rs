//! Temporally stable face detection, landmarking and alignment.
//!
//! Frames go through [`pipeline::face_analyzer::FaceAnalyzer`], which
//! detects faces, predicts 68-point landmarks, stabilises both across
//! frames and warps faces into canonical crops on demand.

pub mod alignment {
    pub mod domain {
        pub mod alignment_error;
        pub mod face_warper;
        pub mod point_layout;
        pub mod template;
        pub mod transform;
        pub mod transform_solver;
    }
}

pub mod detection {
    pub mod domain {
        pub mod face_detector;
        pub mod five_points;
        pub mod landmark_adapter;
        pub mod oracle;
    }
    pub mod infrastructure;
}

pub mod tracking {
    pub mod domain {
        pub mod frame_change;
        pub mod temporal_tracker;
    }
}

pub mod pipeline {
    pub mod analysis_logger;
    pub mod face_analyzer;
}

pub mod shared {
    pub mod config;
    pub mod constants;
    pub mod frame;
    pub mod geometry;
}
