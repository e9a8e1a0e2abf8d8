//! gRPC front end for `facedetect-core`.

pub mod config;
pub mod lifecycle;
pub mod response_encoder;
pub mod service;
pub mod status_mapping;

pub mod proto {
    tonic::include_proto!("facedetection");
}
