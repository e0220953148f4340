use driftwatch::{Adwin, AdwinConfig, PageHinkley, PageHinkleyConfig};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_bucket_structure_is_consistent(
        values in prop::collection::vec(0.0f64..1.0, 1..1500),
        max_buckets in 1usize..7,
        min_clock in 1u64..40,
    ) {
        let config = AdwinConfig { max_buckets, min_clock, ..Default::default() };
        let mut adwin = Adwin::new(config).unwrap();

        for (i, value) in values.iter().enumerate() {
            adwin.observe(*value).unwrap();

            let mut length = 0u64;
            let mut sum = 0.0;
            for (level, row) in adwin.rows() {
                prop_assert!(
                    row.len() <= max_buckets,
                    "row {} holds {} buckets after {} observations",
                    level, row.len(), i + 1
                );
                length += row.len() as u64 * (1u64 << level);
                sum += row.sum();
            }
            prop_assert_eq!(length, adwin.window_length());
            prop_assert!((sum - adwin.window_sum()).abs() < 1e-6);
            prop_assert!(adwin.window_length() <= adwin.time());
            prop_assert!(adwin.check_invariants().is_ok());
        }
    }

    #[test]
    fn prop_unreduced_window_is_exact(
        values in prop::collection::vec(-10.0f64..10.0, 1..600),
    ) {
        // with no cut search the window is the whole stream
        let config = AdwinConfig { min_clock: u64::MAX, ..Default::default() };
        let mut adwin = Adwin::new(config).unwrap();
        for value in &values {
            adwin.observe(*value).unwrap();
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
        prop_assert_eq!(adwin.window_length(), values.len() as u64);
        prop_assert!((adwin.mean() - mean).abs() < 1e-9);
        prop_assert!((adwin.window_variance() - ss).abs() < 1e-6 * (1.0 + ss));
    }

    #[test]
    fn prop_page_hinkley_reset_is_total(
        prefix in prop::collection::vec(0.0f64..100.0, 0..200),
        followup in prop::collection::vec(0.0f64..100.0, 1..50),
    ) {
        let config = PageHinkleyConfig { lambda: 10.0, ..Default::default() };
        let mut ph = PageHinkley::new(config).unwrap();
        for v in &prefix {
            ph.observe(*v).unwrap();
        }
        ph.reset();

        let mut fresh = PageHinkley::new(config).unwrap();
        for v in &followup {
            prop_assert_eq!(ph.observe(*v).unwrap(), fresh.observe(*v).unwrap());
            prop_assert_eq!(ph.num(), fresh.num());
        }
    }
}
