//! C ABI for embedding detectors in non-Rust hosts.
//!
//! Handles are opaque; every handle returned by a constructor must be
//! released with `driftwatch_free`.

use crate::algo::adwin::Adwin;
use crate::algo::page_hinkley::PageHinkley;
use crate::config::{AdwinConfig, CumulativeMode, PageHinkleyConfig};
use crate::detector::DriftDetector;
use std::os::raw::{c_double, c_int, c_ulonglong};
use tracing::warn;

pub struct DetectorHandle {
    inner: Box<dyn DriftDetector>,
}

fn into_handle(detector: crate::error::Result<Box<dyn DriftDetector>>) -> *mut DetectorHandle {
    match detector {
        Ok(inner) => Box::into_raw(Box::new(DetectorHandle { inner })),
        Err(e) => {
            warn!(error = %e, "Rejected detector configuration");
            std::ptr::null_mut()
        }
    }
}

/// Returns null if the configuration is invalid.
#[unsafe(no_mangle)]
pub extern "C" fn driftwatch_adwin_new(
    delta: c_double,
    max_buckets: usize,
    min_clock: c_ulonglong,
    min_win_len: c_ulonglong,
    min_sub_win_len: c_ulonglong,
) -> *mut DetectorHandle {
    let config = AdwinConfig {
        delta,
        max_buckets,
        min_clock,
        min_win_len,
        min_sub_win_len,
    };
    into_handle(Adwin::new(config).map(|d| Box::new(d) as Box<dyn DriftDetector>))
}

/// `discounted != 0` selects the alpha-discounted cumulative sum.
#[unsafe(no_mangle)]
pub extern "C" fn driftwatch_page_hinkley_new(
    delta: c_double,
    lambda: c_double,
    alpha: c_double,
    discounted: c_int,
) -> *mut DetectorHandle {
    let config = PageHinkleyConfig {
        delta,
        lambda,
        alpha,
        mode: if discounted != 0 {
            CumulativeMode::Discounted
        } else {
            CumulativeMode::MinTracking
        },
    };
    into_handle(PageHinkley::new(config).map(|d| Box::new(d) as Box<dyn DriftDetector>))
}

/// 1 if drift was detected, 0 if not, -1 on a null handle or rejected value.
///
/// # Safety
///
/// `ptr` must be null or a live handle returned by one of the constructors,
/// not used concurrently from another thread.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn driftwatch_observe(ptr: *mut DetectorHandle, value: c_double) -> c_int {
    if ptr.is_null() {
        return -1;
    }
    let handle = unsafe { &mut *ptr };
    match handle.inner.observe(value) {
        Ok(true) => 1,
        Ok(false) => 0,
        Err(e) => {
            warn!(error = %e, "Observation rejected");
            -1
        }
    }
}

/// # Safety
///
/// Same contract as [`driftwatch_observe`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn driftwatch_reset(ptr: *mut DetectorHandle) {
    if ptr.is_null() {
        return;
    }
    let handle = unsafe { &mut *ptr };
    handle.inner.reset();
}

/// # Safety
///
/// `ptr` must be null or a handle returned by one of the constructors that
/// has not been freed yet. The handle is invalid afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn driftwatch_free(ptr: *mut DetectorHandle) {
    if ptr.is_null() {
        return;
    }
    unsafe {
        let _ = Box::from_raw(ptr);
    }
}
