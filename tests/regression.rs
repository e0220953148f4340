use driftwatch::simulation::{StreamGenerator, StreamKind};
use driftwatch::{Adwin, AdwinConfig, DetectorConfig, DriftDetector, PageHinkley, PageHinkleyConfig};

fn detections(detector: &mut dyn DriftDetector, values: impl IntoIterator<Item = f64>) -> Vec<u64> {
    values
        .into_iter()
        .zip(1u64..)
        .filter_map(|(v, t)| detector.observe(v).unwrap().then_some(t))
        .collect()
}

#[test]
fn test_constant_step_is_detected_promptly() {
    let config = AdwinConfig {
        delta: 0.002,
        max_buckets: 5,
        min_clock: 32,
        min_win_len: 10,
        min_sub_win_len: 5,
    };
    let mut adwin = Adwin::new(config).unwrap();
    let stream = std::iter::repeat_n(0.0, 2000).chain(std::iter::repeat_n(1.0, 2000));

    let hits = detections(&mut adwin, stream);
    assert!(!hits.is_empty(), "step from 0 to 1 was never detected");
    assert!(hits.iter().all(|&t| t > 2000), "drift before the step: {:?}", hits);
    assert!(hits[0] <= 2000 + 4 * 32, "first detection too late at {}", hits[0]);
    adwin.check_invariants().unwrap();
}

#[test]
fn test_detection_after_short_warmup() {
    let config = AdwinConfig::default();
    let switch = config.min_win_len as usize + 100;
    let mut adwin = Adwin::new(config).unwrap();
    let stream = std::iter::repeat_n(0.0, switch).chain(std::iter::repeat_n(1.0, 500));

    let hits = detections(&mut adwin, stream);
    assert!(hits.iter().all(|&t| t > switch as u64));
    let first = *hits.first().expect("shift must be detected");
    assert!(first <= switch as u64 + 8 * 32, "first detection at {}", first);
    assert_eq!(first % 32, 0);
}

#[test]
fn test_stationary_bernoulli_rarely_alarms() {
    let mut adwin = Adwin::new(AdwinConfig::default()).unwrap();
    let stream = StreamGenerator::new(StreamKind::Bernoulli { before: 0.3, after: 0.3 }, 0, 2024)
        .unwrap()
        .take(10_000);

    let hits = detections(&mut adwin, stream);
    assert!(hits.len() <= 3, "too many false alarms: {:?}", hits);
    // a stationary window keeps growing
    assert!(adwin.window_length() > 1000);
    assert!((adwin.mean() - 0.3).abs() < 0.05);
}

#[test]
fn test_bernoulli_shift_is_detected() {
    let mut adwin = Adwin::new(AdwinConfig::default()).unwrap();
    let stream = StreamGenerator::new(StreamKind::Bernoulli { before: 0.2, after: 0.8 }, 3000, 99)
        .unwrap()
        .take(4000);

    let hits = detections(&mut adwin, stream);
    assert!(hits.iter().any(|&t| t > 3000 && t <= 3300), "hits: {:?}", hits);
    // window adapted to the new regime
    assert!(adwin.mean() > 0.6);
}

#[test]
fn test_invariants_hold_on_noisy_stream() {
    let config = AdwinConfig {
        min_clock: 4,
        ..Default::default()
    };
    let mut adwin = Adwin::new(config).unwrap();
    let kind = StreamKind::Gaussian { before: 5.0, after: 9.0, std_dev: 2.0 };
    let mut drifts = 0;
    for value in StreamGenerator::new(kind, 1500, 5).unwrap().take(3000) {
        if adwin.observe(value).unwrap() {
            drifts += 1;
        }
        adwin.check_invariants().unwrap();
        for (_, row) in adwin.rows() {
            assert!(row.len() <= config.max_buckets);
        }
    }
    assert!(drifts >= 1);
}

#[test]
fn test_detectors_share_one_contract() {
    let configs = [
        DetectorConfig::Adwin(AdwinConfig::default()),
        DetectorConfig::PageHinkley(PageHinkleyConfig {
            lambda: 20.0,
            ..Default::default()
        }),
    ];
    for config in configs {
        let mut detector = config.build().unwrap();
        let stream = std::iter::repeat_n(0.0, 1000).chain(std::iter::repeat_n(1.0, 500));
        let hits = detections(detector.as_mut(), stream);
        assert!(
            hits.first().is_some_and(|&t| t > 1000),
            "{} hits: {:?}",
            detector.name(),
            hits
        );

        detector.reset();
        assert!(!detector.observe(1.0).unwrap());
    }
}

#[test]
fn test_page_hinkley_restarts_after_signal() {
    let mut ph = PageHinkley::new(PageHinkleyConfig::default()).unwrap();
    let stream = std::iter::repeat_n(0.0, 500)
        .chain(std::iter::repeat_n(10.0, 50))
        .chain(std::iter::repeat_n(0.0, 500))
        .chain(std::iter::repeat_n(10.0, 50));

    let hits = detections(&mut ph, stream);
    assert!(hits.len() >= 2, "hits: {:?}", hits);
    assert!(hits[0] > 500 && hits[0] <= 550);
    assert!(hits.iter().any(|&t| t > 1050));
}
