use driftwatch::config::MAX_BUCKETS_LIMIT;
use driftwatch::ffi::{
    driftwatch_adwin_new, driftwatch_free, driftwatch_observe, driftwatch_page_hinkley_new,
    driftwatch_reset,
};

#[test]
fn test_adwin_through_c_abi() {
    let handle = driftwatch_adwin_new(0.002, 5, 32, 10, 5);
    assert!(!handle.is_null());

    unsafe {
        for _ in 0..1000 {
            assert_eq!(driftwatch_observe(handle, 0.0), 0);
        }
        let mut detected = false;
        for _ in 0..200 {
            match driftwatch_observe(handle, 1.0) {
                1 => {
                    detected = true;
                    break;
                }
                0 => {}
                other => panic!("unexpected status {}", other),
            }
        }
        assert!(detected);

        assert_eq!(driftwatch_observe(handle, f64::NAN), -1);
        driftwatch_reset(handle);
        assert_eq!(driftwatch_observe(handle, 1.0), 0);
        driftwatch_free(handle);
    }
}

#[test]
fn test_invalid_configs_return_null() {
    assert!(driftwatch_adwin_new(0.0, 5, 32, 10, 5).is_null());
    assert!(driftwatch_adwin_new(0.002, 0, 32, 10, 5).is_null());
    assert!(driftwatch_page_hinkley_new(0.005, -1.0, 0.9999, 0).is_null());
}

#[test]
fn test_oversized_configs_return_null() {
    assert!(driftwatch_adwin_new(0.002, usize::MAX, 32, 10, 5).is_null());
    assert!(driftwatch_adwin_new(0.002, MAX_BUCKETS_LIMIT + 1, 32, 10, 5).is_null());
    assert!(driftwatch_adwin_new(0.002, 5, 1, 10, u64::MAX).is_null());

    let handle = driftwatch_adwin_new(0.002, MAX_BUCKETS_LIMIT, 1, 10, 5);
    assert!(!handle.is_null());
    unsafe {
        for i in 0..100 {
            assert_ne!(driftwatch_observe(handle, (i % 2) as f64), -1);
        }
        driftwatch_free(handle);
    }
}

#[test]
fn test_page_hinkley_through_c_abi() {
    let handle = driftwatch_page_hinkley_new(0.005, 50.0, 0.9999, 1);
    assert!(!handle.is_null());
    let signals: i32 = (0..600)
        .map(|i| unsafe { driftwatch_observe(handle, if i < 300 { 0.0 } else { 5.0 }) })
        .sum();
    assert!(signals >= 1);
    unsafe { driftwatch_free(handle) };
}

#[test]
fn test_null_handles_are_tolerated() {
    let null = std::ptr::null_mut();
    unsafe {
        assert_eq!(driftwatch_observe(null, 1.0), -1);
        driftwatch_reset(null);
        driftwatch_free(null);
    }
}
