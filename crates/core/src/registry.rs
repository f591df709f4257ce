//! Process-wide composite metrics registry.
//!
//! [`MetricsRegistry`] implements [`metrics::Recorder`] and sits in front of
//! any number of sub-registries (for example the Prometheus text exposition
//! recorder). Each registration first passes through the filter chain, then
//! fans out to every attached sub-registry.
//!
//! The registry is created once at startup and shared by cloning; all clones
//! see the same sub-registries and filters. It can also be installed as the
//! `metrics` global recorder so the `metrics::counter!()` family of macros
//! records into it from anywhere in the process.
//!
//! Filters are applied when a metric is registered, never retroactively: a
//! handle obtained before a filter was added keeps its original key.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use metrics::{
    Counter, CounterFn, Gauge, GaugeFn, Histogram, HistogramFn, Key, KeyName, Metadata, Recorder,
    SharedString, Unit,
};

use crate::error::MonitoringError;

/// Stateless key rewrite applied at registration time.
pub type MeterFilter = Arc<dyn Fn(Key) -> Key + Send + Sync>;

type SubRegistry = Arc<dyn Recorder + Send + Sync>;

/// Shared metrics registry with a filter chain and attachable sub-registries.
#[derive(Clone, Default)]
pub struct MetricsRegistry {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    registries: RwLock<Vec<SubRegistry>>,
    filters: RwLock<Vec<MeterFilter>>,
}

impl MetricsRegistry {
    /// Create an empty registry. Until a sub-registry is attached,
    /// measurements are discarded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a sub-registry. Metrics registered from now on also record into it.
    pub fn add_registry<R>(&self, recorder: R)
    where
        R: Recorder + Send + Sync + 'static,
    {
        self.inner
            .registries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(recorder));
    }

    /// Append a filter to the chain. Filters run in insertion order.
    pub fn add_filter(&self, filter: MeterFilter) {
        self.inner
            .filters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(filter);
    }

    /// Number of attached sub-registries.
    pub fn registry_count(&self) -> usize {
        self.inner
            .registries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Install this registry as the process-wide `metrics` recorder.
    ///
    /// # Errors
    ///
    /// Returns [`MonitoringError::RecorderAlreadyInstalled`] if any global
    /// recorder was set before.
    pub fn install_global(&self) -> Result<(), MonitoringError> {
        metrics::set_global_recorder(self.clone())
            .map_err(|_| MonitoringError::RecorderAlreadyInstalled)
    }

    fn map_key(&self, key: &Key) -> Key {
        let filters = self
            .inner
            .filters
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        filters
            .iter()
            .fold(key.clone(), |key, filter| filter(key))
    }

    fn map_name(&self, name: KeyName) -> KeyName {
        let (name, _) = self.map_key(&Key::from_name(name)).into_parts();
        name
    }

    fn registries(&self) -> Vec<SubRegistry> {
        self.inner
            .registries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let filters = self
            .inner
            .filters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("MetricsRegistry")
            .field("registries", &self.registry_count())
            .field("filters", &filters)
            .finish()
    }
}

impl Recorder for MetricsRegistry {
    fn describe_counter(&self, key: KeyName, unit: Option<Unit>, description: SharedString) {
        let key = self.map_name(key);
        for registry in self.registries() {
            registry.describe_counter(key.clone(), unit, description.clone());
        }
    }

    fn describe_gauge(&self, key: KeyName, unit: Option<Unit>, description: SharedString) {
        let key = self.map_name(key);
        for registry in self.registries() {
            registry.describe_gauge(key.clone(), unit, description.clone());
        }
    }

    fn describe_histogram(&self, key: KeyName, unit: Option<Unit>, description: SharedString) {
        let key = self.map_name(key);
        for registry in self.registries() {
            registry.describe_histogram(key.clone(), unit, description.clone());
        }
    }

    fn register_counter(&self, key: &Key, metadata: &Metadata<'_>) -> Counter {
        let key = self.map_key(key);
        let mut counters: Vec<Counter> = self
            .registries()
            .iter()
            .map(|registry| registry.register_counter(&key, metadata))
            .collect();
        if counters.len() > 1 {
            Counter::from_arc(Arc::new(Fanout(counters)))
        } else {
            counters.pop().unwrap_or_else(Counter::noop)
        }
    }

    fn register_gauge(&self, key: &Key, metadata: &Metadata<'_>) -> Gauge {
        let key = self.map_key(key);
        let mut gauges: Vec<Gauge> = self
            .registries()
            .iter()
            .map(|registry| registry.register_gauge(&key, metadata))
            .collect();
        if gauges.len() > 1 {
            Gauge::from_arc(Arc::new(Fanout(gauges)))
        } else {
            gauges.pop().unwrap_or_else(Gauge::noop)
        }
    }

    fn register_histogram(&self, key: &Key, metadata: &Metadata<'_>) -> Histogram {
        let key = self.map_key(key);
        let mut histograms: Vec<Histogram> = self
            .registries()
            .iter()
            .map(|registry| registry.register_histogram(&key, metadata))
            .collect();
        if histograms.len() > 1 {
            Histogram::from_arc(Arc::new(Fanout(histograms)))
        } else {
            histograms.pop().unwrap_or_else(Histogram::noop)
        }
    }
}

/// Handle that forwards every update to one handle per sub-registry.
struct Fanout<T>(Vec<T>);

impl CounterFn for Fanout<Counter> {
    fn increment(&self, value: u64) {
        for counter in &self.0 {
            counter.increment(value);
        }
    }

    fn absolute(&self, value: u64) {
        for counter in &self.0 {
            counter.absolute(value);
        }
    }
}

impl GaugeFn for Fanout<Gauge> {
    fn increment(&self, value: f64) {
        for gauge in &self.0 {
            gauge.increment(value);
        }
    }

    fn decrement(&self, value: f64) {
        for gauge in &self.0 {
            gauge.decrement(value);
        }
    }

    fn set(&self, value: f64) {
        for gauge in &self.0 {
            gauge.set(value);
        }
    }
}

impl HistogramFn for Fanout<Histogram> {
    fn record(&self, value: f64) {
        for histogram in &self.0 {
            histogram.record(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;
    use crate::metrics::{NAMESPACE, namespace_filter};

    /// Sub-registry that keeps counters in memory for inspection.
    #[derive(Clone, Default)]
    struct Capture {
        counters: Arc<Mutex<HashMap<String, Arc<AtomicU64>>>>,
        gauges: Arc<Mutex<HashMap<String, Arc<AtomicU64>>>>,
        described: Arc<Mutex<Vec<String>>>,
    }

    impl Capture {
        fn counter(&self, name: &str) -> Option<u64> {
            self.counters
                .lock()
                .unwrap()
                .get(name)
                .map(|c| c.load(Ordering::SeqCst))
        }

        fn gauge(&self, name: &str) -> Option<f64> {
            self.gauges
                .lock()
                .unwrap()
                .get(name)
                .map(|g| f64::from_bits(g.load(Ordering::SeqCst)))
        }

        fn names(&self) -> Vec<String> {
            let mut names: Vec<String> = self.counters.lock().unwrap().keys().cloned().collect();
            names.sort();
            names
        }
    }

    impl Recorder for Capture {
        fn describe_counter(&self, key: KeyName, _: Option<Unit>, _: SharedString) {
            self.described.lock().unwrap().push(key.as_str().to_owned());
        }

        fn describe_gauge(&self, key: KeyName, _: Option<Unit>, _: SharedString) {
            self.described.lock().unwrap().push(key.as_str().to_owned());
        }

        fn describe_histogram(&self, key: KeyName, _: Option<Unit>, _: SharedString) {
            self.described.lock().unwrap().push(key.as_str().to_owned());
        }

        fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
            let counter = self
                .counters
                .lock()
                .unwrap()
                .entry(key.name().to_owned())
                .or_default()
                .clone();
            Counter::from_arc(counter)
        }

        fn register_gauge(&self, key: &Key, _: &Metadata<'_>) -> Gauge {
            let gauge = self
                .gauges
                .lock()
                .unwrap()
                .entry(key.name().to_owned())
                .or_default()
                .clone();
            Gauge::from_arc(gauge)
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    #[test]
    fn empty_registry_discards_measurements() {
        let registry = MetricsRegistry::new();
        metrics::with_local_recorder(&registry, || {
            metrics::counter!("requests_total").increment(1);
            metrics::gauge!("connections").set(3.0);
            metrics::histogram!("latency").record(0.5);
        });
        assert_eq!(registry.registry_count(), 0);
    }

    #[test]
    fn counter_fans_out_to_every_sub_registry() {
        let registry = MetricsRegistry::new();
        let first = Capture::default();
        let second = Capture::default();
        registry.add_registry(first.clone());
        registry.add_registry(second.clone());

        metrics::with_local_recorder(&registry, || {
            metrics::counter!("requests_total").increment(2);
        });

        assert_eq!(first.counter("requests_total"), Some(2));
        assert_eq!(second.counter("requests_total"), Some(2));
    }

    #[test]
    fn gauge_fans_out_to_every_sub_registry() {
        let registry = MetricsRegistry::new();
        let first = Capture::default();
        let second = Capture::default();
        registry.add_registry(first.clone());
        registry.add_registry(second.clone());

        metrics::with_local_recorder(&registry, || {
            metrics::gauge!("connections").set(4.0);
        });

        assert_eq!(first.gauge("connections"), Some(4.0));
        assert_eq!(second.gauge("connections"), Some(4.0));
    }

    #[test]
    fn filter_applies_only_to_later_registrations() {
        let registry = MetricsRegistry::new();
        let capture = Capture::default();
        registry.add_registry(capture.clone());

        let early = metrics::with_local_recorder(&registry, || metrics::counter!("early_total"));
        early.increment(1);

        registry.add_filter(namespace_filter(NAMESPACE));
        metrics::with_local_recorder(&registry, || {
            metrics::counter!("late_total").increment(1);
        });
        // the handle taken before the filter still records under its old name
        early.increment(1);

        assert_eq!(capture.names(), vec!["dshackle.late_total", "early_total"]);
        assert_eq!(capture.counter("early_total"), Some(2));
        assert_eq!(capture.counter("dshackle.late_total"), Some(1));
    }

    #[test]
    fn filters_run_in_insertion_order() {
        let registry = MetricsRegistry::new();
        let capture = Capture::default();
        registry.add_registry(capture.clone());
        registry.add_filter(namespace_filter("inner"));
        registry.add_filter(namespace_filter("outer"));

        metrics::with_local_recorder(&registry, || {
            metrics::counter!("x").increment(1);
        });

        assert_eq!(capture.names(), vec!["outer.inner.x"]);
    }

    #[test]
    fn descriptions_pass_through_filters() {
        let registry = MetricsRegistry::new();
        let capture = Capture::default();
        registry.add_registry(capture.clone());
        registry.add_filter(namespace_filter(NAMESPACE));

        metrics::with_local_recorder(&registry, || {
            metrics::describe_counter!("requests_total", "Total requests");
        });

        assert_eq!(
            *capture.described.lock().unwrap(),
            vec!["dshackle.requests_total".to_owned()]
        );
    }

    #[test]
    fn clones_share_sub_registries_and_filters() {
        let registry = MetricsRegistry::new();
        let shared = registry.clone();
        let capture = Capture::default();
        shared.add_registry(capture.clone());
        shared.add_filter(namespace_filter(NAMESPACE));

        metrics::with_local_recorder(&registry, || {
            metrics::counter!("requests_total").increment(1);
        });

        assert_eq!(registry.registry_count(), 1);
        assert_eq!(capture.counter("dshackle.requests_total"), Some(1));
    }

    #[test]
    fn debug_reports_counts() {
        let registry = MetricsRegistry::new();
        registry.add_filter(namespace_filter(NAMESPACE));
        let debug = format!("{:?}", registry);
        assert!(debug.contains("registries: 0"));
        assert!(debug.contains("filters: 1"));
    }
}
