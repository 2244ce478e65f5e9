mod common;

use std::sync::Arc;

use tacos_sched::{Builder, Condvar, Error, Lock, Mutex, Queue, Semaphore, Sleep, Status, PRI_DEFAULT};

#[test]
fn semaphore_ping_pong() {
    let manager = common::boot();
    let ping = Arc::new(Semaphore::new(&manager, 0));
    let pong = Arc::new(Semaphore::new(&manager, 0));
    let order = common::log();

    {
        let (ping, pong, order) = (ping.clone(), pong.clone(), order.clone());
        manager
            .spawn("pong", move || {
                for i in 0..3 {
                    ping.down();
                    order.lock().push(("pong", i));
                    pong.up();
                }
            })
            .unwrap();
    }

    for i in 0..3 {
        order.lock().push(("ping", i));
        ping.up();
        pong.down();
    }

    assert_eq!(
        *order.lock(),
        [("ping", 0), ("pong", 0), ("ping", 1), ("pong", 1), ("ping", 2), ("pong", 2)]
    );
    assert_eq!(ping.value(), 0);
    assert_eq!(pong.value(), 0);
}

#[test]
fn try_down_reports_busy() {
    let manager = common::boot();
    let sema = Semaphore::new(&manager, 1);

    assert!(sema.try_down().is_ok());
    assert!(matches!(sema.try_down(), Err(Error::Busy)));
    sema.up();
    assert_eq!(sema.value(), 1);
}

#[test]
fn up_wakes_highest_priority_waiter() {
    let manager = common::boot();
    let sema = Arc::new(Semaphore::new(&manager, 0));
    let order = common::log();

    manager.set_priority(5);
    for priority in [20, 10, 30] {
        let (sema, order) = (sema.clone(), order.clone());
        manager
            .create("waiter", priority, move || {
                sema.down();
                order.lock().push(priority);
            })
            .unwrap();
    }
    assert_eq!(sema.waiters().len(), 3);

    for _ in 0..3 {
        sema.up();
    }
    assert_eq!(*order.lock(), [30, 20, 10]);
}

#[test]
fn up_uses_priority_at_wake_time() {
    let manager = common::boot();
    let sema = Arc::new(Semaphore::new(&manager, 0));
    let lock = Arc::new(Sleep::new(&manager));
    let order = common::log();

    manager.set_priority(1);

    // Holds the lock while waiting on the semaphore.
    {
        let (sema, lock, order) = (sema.clone(), lock.clone(), order.clone());
        manager
            .create("holder", 10, move || {
                lock.acquire();
                sema.down();
                order.lock().push("holder");
                lock.release();
            })
            .unwrap();
    }
    {
        let (sema, order) = (sema.clone(), order.clone());
        manager
            .create("plain", 20, move || {
                sema.down();
                order.lock().push("plain");
            })
            .unwrap();
    }
    // Donates 30 to the holder while it sits in the wait list.
    {
        let (lock, order) = (lock.clone(), order.clone());
        manager
            .create("donor", 30, move || {
                lock.acquire();
                order.lock().push("donor");
                lock.release();
            })
            .unwrap();
    }

    sema.up();
    sema.up();
    assert_eq!(*order.lock(), ["holder", "donor", "plain"]);
}

#[test]
fn mutex_serializes_yielding_threads() {
    let manager = common::boot();
    let counter = Arc::new(Mutex::new(&manager, 0u32));
    let done = Arc::new(Semaphore::new(&manager, 0));

    for name in ["a", "b", "c"] {
        let (m, counter, done) = (manager.clone(), counter.clone(), done.clone());
        manager
            .spawn(name, move || {
                for _ in 0..5 {
                    let mut value = counter.lock();
                    let seen = *value;
                    m.yield_now();
                    *value = seen + 1;
                }
                done.up();
            })
            .unwrap();
    }

    for _ in 0..3 {
        done.down();
    }
    assert_eq!(*counter.lock(), 15);
}

#[test]
fn try_acquire() {
    let manager = common::boot();
    let lock = Arc::new(Sleep::new(&manager));
    let got = common::log();

    assert!(lock.try_acquire());
    assert!(lock.held_by_current_thread());

    {
        let (lock, got) = (lock.clone(), got.clone());
        manager
            .create("other", PRI_DEFAULT + 1, move || {
                got.lock().push(lock.try_acquire());
            })
            .unwrap();
    }
    assert_eq!(*got.lock(), [false]);

    lock.release();
    assert!(lock.holder().is_none());
}

#[test]
#[should_panic(expected = "does not hold")]
fn release_without_holding_is_fatal() {
    let manager = common::boot();
    let lock = Sleep::new(&manager);
    lock.release();
}

#[test]
#[should_panic(expected = "already holds")]
fn recursive_acquire_is_fatal() {
    let manager = common::boot();
    let lock = Sleep::new(&manager);
    lock.acquire();
    lock.acquire();
}

fn condvar_waiters(signal_all: bool) -> Vec<u32> {
    let manager = common::boot();
    let lock = Arc::new(Sleep::new(&manager));
    let cond = Arc::new(Condvar::new());
    let order = common::log();

    manager.set_priority(1);
    for priority in [10, 30, 20] {
        let (lock, cond, order) = (lock.clone(), cond.clone(), order.clone());
        manager
            .create("waiter", priority, move || {
                lock.acquire();
                cond.wait(&lock);
                order.lock().push(priority);
                lock.release();
            })
            .unwrap();
    }

    lock.acquire();
    if signal_all {
        cond.broadcast(&lock);
    } else {
        for _ in 0..3 {
            cond.signal(&lock);
        }
    }
    assert!(!cond.has_waiters());
    lock.release();

    let order = order.lock().clone();
    order
}

#[test]
fn condvar_signal_wakes_by_priority() {
    assert_eq!(condvar_waiters(false), [30, 20, 10]);
}

#[test]
fn condvar_broadcast_wakes_all() {
    assert_eq!(condvar_waiters(true), [30, 20, 10]);
}

#[test]
fn condvar_waiters_stay_asleep_until_signaled() {
    let manager = common::boot();
    let lock = Arc::new(Sleep::new(&manager));
    let cond = Arc::new(Condvar::new());
    let woken = common::log();

    manager.set_priority(1);
    let waiters: Vec<_> = [10, 20]
        .into_iter()
        .map(|priority| {
            let (lock, cond, woken) = (lock.clone(), cond.clone(), woken.clone());
            Builder::new(move || {
                lock.acquire();
                cond.wait(&lock);
                woken.lock().push(priority);
                lock.release();
            })
            .name("waiter")
            .priority(priority)
            .spawn(&manager)
            .unwrap()
        })
        .collect();

    let asleep = || {
        waiters
            .iter()
            .all(|t| t.status() == Status::Blocked && t.queue() == Queue::Wait)
    };
    assert!(woken.lock().is_empty());
    assert_eq!(cond.waiter_count(), 2);
    assert!(asleep());

    // Neither the lock changing hands nor time passing wakes anyone.
    lock.acquire();
    lock.release();
    manager.yield_now();
    for _ in 0..10 {
        manager.timer_interrupt();
    }
    assert!(woken.lock().is_empty());
    assert!(asleep());

    lock.acquire();
    cond.signal(&lock);
    lock.release();
    assert_eq!(*woken.lock(), [20]);
    assert_eq!(cond.waiter_count(), 1);
    assert!(manager.intr_get_level());
    assert_eq!(waiters[0].status(), Status::Blocked);
}

#[test]
fn condvar_with_mutex() {
    let manager = common::boot();
    let queue = Arc::new(Mutex::new(&manager, Vec::new()));
    let cond = Arc::new(Condvar::new());
    let taken = common::log();

    {
        let (queue, cond, taken) = (queue.clone(), cond.clone(), taken.clone());
        manager
            .create("consumer", PRI_DEFAULT + 1, move || {
                let mut items = queue.lock();
                while items.len() < 2 {
                    cond.wait(queue.raw());
                }
                taken.lock().extend(items.drain(..));
            })
            .unwrap();
    }

    for item in [1, 2] {
        let mut items = queue.lock();
        items.push(item);
        cond.signal(queue.raw());
    }

    assert_eq!(*taken.lock(), [1, 2]);
}

#[test]
#[should_panic(expected = "condition wait without holding lock")]
fn condvar_wait_without_lock_is_fatal() {
    let manager = common::boot();
    let lock = Sleep::new(&manager);
    Condvar::new().wait(&lock);
}
