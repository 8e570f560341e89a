//! Driver registry.
//!
//! Exactly one [`Driver`] instance exists per back-end category. The
//! built-in driver-manager category is constructed lazily on first use and
//! shared by all connections of that category; further categories (vendor
//! clients, test fakes) register themselves by name at runtime.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;

use super::Driver;
use crate::error::{DbError, MisuseError};
use crate::odbc::OdbcDriver;

/// Name of the built-in driver-manager category.
pub const DRIVER_MANAGER: &str = "odbc";

static REGISTRY: Lazy<Mutex<HashMap<String, Arc<dyn Driver>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Register a back-end category under a name, replacing any previous driver
/// of that name. Connections opened later through [`driver_for`] share this
/// one instance.
pub fn register(name: &str, driver: Arc<dyn Driver>) {
    REGISTRY
        .lock()
        .expect("driver registry lock")
        .insert(name.to_string(), driver);
}

/// Resolve the shared driver for a category, building the built-in
/// driver-manager driver on first use.
pub fn driver_for(name: &str) -> Result<Arc<dyn Driver>, DbError> {
    let mut registry = REGISTRY.lock().expect("driver registry lock");
    if let Some(driver) = registry.get(name) {
        return Ok(Arc::clone(driver));
    }
    if name == DRIVER_MANAGER {
        let driver: Arc<dyn Driver> = Arc::new(OdbcDriver::from_environment()?);
        registry.insert(name.to_string(), Arc::clone(&driver));
        return Ok(driver);
    }
    Err(DbError::Misuse(MisuseError::ParseFailed {
        what: "registered back-end name",
        text: name.to_string(),
    }))
}
