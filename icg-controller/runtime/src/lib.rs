#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use icg_controller_core as core;
pub use icg_controller_k8s_api as k8s;

pub mod api;
mod args;
mod metrics;
mod server;
mod store;

pub use self::{
    api::{Api, ApiConfig},
    args::Args,
    metrics::ApiMetrics,
    server::serve,
    store::KubeStore,
};
