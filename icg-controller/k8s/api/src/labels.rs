use std::collections::BTreeMap;

pub type Map = BTreeMap<String, String>;

/// The label key that selects a subset's backing pods.
pub const VERSION: &str = "version";

pub const MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Value of [`MANAGED_BY`] on every resource this controller writes.
pub const CONTROLLER_NAME: &str = "icg-controller";

/// Labels attached to resources written by the controller.
pub fn managed() -> Map {
    [(MANAGED_BY.to_string(), CONTROLLER_NAME.to_string())]
        .into_iter()
        .collect()
}

/// The subset selector for a version label.
pub fn version(version: &str) -> Map {
    [(VERSION.to_string(), version.to_string())]
        .into_iter()
        .collect()
}
