use std::sync::{Mutex, MutexGuard};

use tracing::warn;

/// Lock `lock`, recovering the guard if a previous holder panicked.
pub(crate) fn mutex_lock<'a, T>(
    lock: &'a Mutex<T>,
    target: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                op,
                target_module = target,
                lock_kind = "mutex.lock",
                result = "poisoned_recovered",
                "Recovered from poisoned cache lock"
            );
            lock.clear_poison();
            poisoned.into_inner()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn poisoned_lock_is_recovered() {
        let shared = Arc::new(Mutex::new(1_u32));
        let cloned = shared.clone();
        let _ = std::thread::spawn(move || {
            let _guard = cloned.lock().expect("first lock");
            panic!("poison the lock");
        })
        .join();

        assert!(shared.is_poisoned());
        {
            let mut guard = mutex_lock(&shared, "cache::lock::tests", "recover");
            *guard += 1;
        }
        assert!(!shared.is_poisoned());
        assert_eq!(*mutex_lock(&shared, "cache::lock::tests", "read"), 2);
    }
}
