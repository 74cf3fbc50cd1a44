//! Discovery, launch, health-check, capability probing, fan-out, and
//! shutdown for independent plugin executables speaking the small gRPC
//! service in `proto/plugin.proto`, plus the standard gRPC health service.

pub mod discovery;
pub mod error;
pub mod launch;
pub mod registry;
pub mod supervisor;

pub mod proto {
    tonic::include_proto!("pixie.plugin");
}

pub use error::PluginError;
pub use launch::LaunchedPlugin;
pub use registry::{Capabilities, PluginHandle, PluginRegistry};
pub use supervisor::{bootstrap, shutdown};
