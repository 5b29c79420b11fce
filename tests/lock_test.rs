use phase_bench::lock;

#[test]
fn lock_acquire_and_release() {
    let dir = tempfile::tempdir().unwrap();
    let runtime_dir = dir.path().join(".phase-bench");

    let guard = lock::try_acquire(&runtime_dir).unwrap();

    let pid_contents = std::fs::read_to_string(runtime_dir.join("phase-bench.pid")).unwrap();
    assert_eq!(pid_contents.trim().parse::<u32>().unwrap(), std::process::id());

    drop(guard);

    assert!(!runtime_dir.join("phase-bench.pid").exists());
}

#[test]
fn lock_creates_directory_if_missing() {
    let dir = tempfile::tempdir().unwrap();
    let runtime_dir = dir.path().join("nested").join(".phase-bench");

    assert!(!runtime_dir.exists());
    let guard = lock::try_acquire(&runtime_dir).unwrap();
    assert!(runtime_dir.exists());
    drop(guard);
}

#[test]
fn lock_prevents_concurrent_acquisition() {
    let dir = tempfile::tempdir().unwrap();
    let runtime_dir = dir.path().join(".phase-bench");

    let _guard1 = lock::try_acquire(&runtime_dir).unwrap();

    let result = lock::try_acquire(&runtime_dir);
    assert!(result.is_err());
    let err = result.unwrap_err();
    assert!(
        err.contains("Another phase-bench instance"),
        "Error message should mention another instance: {}",
        err
    );
}

#[test]
fn lock_acquires_when_stale_pid_file_exists() {
    let dir = tempfile::tempdir().unwrap();
    let runtime_dir = dir.path().join(".phase-bench");
    std::fs::create_dir_all(&runtime_dir).unwrap();

    let pid_path = runtime_dir.join("phase-bench.pid");
    std::fs::write(&pid_path, "99999999").unwrap();

    let lock_path = runtime_dir.join("phase-bench.lock");
    std::fs::write(&lock_path, "").unwrap();

    let guard = lock::try_acquire(&runtime_dir).unwrap();

    let pid_contents = std::fs::read_to_string(&pid_path).unwrap();
    assert_eq!(pid_contents.trim().parse::<u32>().unwrap(), std::process::id());

    drop(guard);
}

#[test]
fn lock_acquires_when_garbage_pid_file_exists() {
    let dir = tempfile::tempdir().unwrap();
    let runtime_dir = dir.path().join(".phase-bench");
    std::fs::create_dir_all(&runtime_dir).unwrap();

    std::fs::write(runtime_dir.join("phase-bench.pid"), "not_a_number").unwrap();
    std::fs::write(runtime_dir.join("phase-bench.lock"), "").unwrap();

    let guard = lock::try_acquire(&runtime_dir).unwrap();
    drop(guard);
}

#[test]
fn lock_reacquire_after_release() {
    let dir = tempfile::tempdir().unwrap();
    let runtime_dir = dir.path().join(".phase-bench");

    let guard = lock::try_acquire(&runtime_dir).unwrap();
    drop(guard);

    let guard2 = lock::try_acquire(&runtime_dir).unwrap();
    drop(guard2);
}

#[test]
fn lock_contention_via_fslock_without_pid_file() {
    let dir = tempfile::tempdir().unwrap();
    let runtime_dir = dir.path().join(".phase-bench");
    std::fs::create_dir_all(&runtime_dir).unwrap();

    let lock_path = runtime_dir.join("phase-bench.lock");
    let mut external_lock = fslock::LockFile::open(&lock_path).unwrap();
    assert!(external_lock.try_lock().unwrap());

    let result = lock::try_acquire(&runtime_dir);
    assert!(result.is_err());
    let err = result.unwrap_err();
    assert!(err.contains("holds the lock"), "Error should mention held lock: {}", err);

    external_lock.unlock().unwrap();
}
