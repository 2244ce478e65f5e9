#![allow(dead_code)]

use std::sync::Arc;

use tacos_sched::{Config, Manager};

/// Shared record of events, written by kernel threads and checked by `main`.
pub type Log<T> = Arc<spin::Mutex<Vec<T>>>;

pub fn log<T>() -> Log<T> {
    Arc::new(spin::Mutex::new(Vec::new()))
}

pub fn boot() -> Arc<Manager> {
    boot_with(Config::default())
}

pub fn boot_with(config: Config) -> Arc<Manager> {
    let _ = env_logger::builder().is_test(true).try_init();
    Manager::boot(config).expect("boot failed")
}
