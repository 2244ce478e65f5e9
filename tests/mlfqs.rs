mod common;

use std::sync::Arc;

use tacos_sched::{Config, Manager, Policy, PRI_MAX};

fn boot() -> Arc<Manager> {
    common::boot_with(Config::default().with_policy(Policy::Mlfqs))
}

#[test]
fn priority_decays_every_fourth_tick() {
    let manager = boot();
    assert_eq!(manager.get_priority(), PRI_MAX);

    for _ in 0..3 {
        manager.timer_interrupt();
    }
    assert_eq!(manager.get_priority(), PRI_MAX);
    assert_eq!(manager.get_recent_cpu(), 300);

    manager.timer_interrupt();
    assert_eq!(manager.get_priority(), PRI_MAX - 1);
    assert_eq!(manager.get_recent_cpu(), 400);
}

#[test]
fn load_avg_after_one_second() {
    let manager = boot();
    assert_eq!(manager.get_load_avg(), 0);

    for _ in 0..100 {
        manager.timer_interrupt();
    }
    // (1/60) * 1 ready thread
    assert_eq!(manager.get_load_avg(), 2);
}

#[test]
fn idle_system_has_no_load() {
    let manager = boot();
    manager.sleep(100);
    assert_eq!(manager.get_load_avg(), 0);
    assert_eq!(manager.get_recent_cpu(), 0);
}

#[test]
fn nice_lowers_priority() {
    let manager = boot();

    manager.set_nice(5);
    assert_eq!(manager.get_nice(), 5);
    assert_eq!(manager.get_priority(), PRI_MAX - 10);

    manager.set_nice(-20);
    assert_eq!(manager.get_priority(), PRI_MAX);
}

#[test]
fn children_inherit_nice_and_recent_cpu() {
    let manager = boot();
    manager.set_nice(3);
    for _ in 0..4 {
        manager.timer_interrupt();
    }

    let child = manager.spawn("child", || {}).unwrap();
    assert_eq!(child.nice(), 3);
    assert_eq!(child.recent_cpu(), manager.current().recent_cpu());
    // 63 - 4/4 - 3*2
    assert_eq!(child.priority(), 56);
}

#[test]
fn set_priority_is_ignored() {
    let manager = boot();
    manager.set_priority(10);
    assert_eq!(manager.get_priority(), PRI_MAX);
    assert_eq!(manager.current().base_priority(), tacos_sched::PRI_DEFAULT);
}

#[test]
fn busy_thread_loses_to_fresh_one() {
    let manager = boot();
    let ran = common::log();

    for _ in 0..8 {
        manager.timer_interrupt();
    }
    assert_eq!(manager.get_priority(), PRI_MAX - 2);

    // The child inherits nice and recent_cpu, so it ties with main until
    // main gets nicer.
    manager.set_nice(1);
    let (m, r) = (manager.clone(), ran.clone());
    let child = manager
        .spawn("fresh", move || {
            r.lock().push(m.get_priority());
        })
        .unwrap();
    assert!(ran.lock().is_empty());
    assert_eq!(child.priority(), PRI_MAX - 4);

    manager.set_nice(5);
    assert_eq!(*ran.lock(), [PRI_MAX - 4]);
}

#[test]
#[should_panic(expected = "nice value 21 out of range")]
fn nice_out_of_range() {
    let manager = boot();
    manager.set_nice(21);
}
