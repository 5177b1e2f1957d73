//! Process-local counters and gauges, grounded directly in the reference
//! `MetricsService` singleton: a lock-protected counter/gauge map reachable
//! through a lazily-initialized instance, rather than a metrics service.

use std::collections::HashMap;
use std::sync::Mutex;

use once_cell::sync::OnceCell;

static INSTANCE: OnceCell<Metrics> = OnceCell::new();

#[derive(Default)]
pub struct Metrics {
    counters: Mutex<HashMap<String, i64>>,
    gauges: Mutex<HashMap<String, f64>>,
}

impl Metrics {
    /// Returns the process-wide singleton, initializing it on first use.
    pub fn global() -> &'static Metrics {
        INSTANCE.get_or_init(Metrics::default)
    }

    pub fn increment(&self, name: &str, value: i64) {
        let mut counters = self.counters.lock().unwrap();
        *counters.entry(name.to_string()).or_insert(0) += value;
    }

    pub fn get_counter(&self, name: &str) -> i64 {
        let counters = self.counters.lock().unwrap();
        *counters.get(name).unwrap_or(&0)
    }

    pub fn set_gauge(&self, name: &str, value: f64) {
        let mut gauges = self.gauges.lock().unwrap();
        gauges.insert(name.to_string(), value);
    }

    pub fn get_gauge(&self, name: &str) -> f64 {
        let gauges = self.gauges.lock().unwrap();
        *gauges.get(name).unwrap_or(&0.0)
    }

    pub fn snapshot(&self) -> HashMap<String, f64> {
        let counters = self.counters.lock().unwrap();
        let gauges = self.gauges.lock().unwrap();
        let mut out = HashMap::new();
        for (k, v) in counters.iter() {
            out.insert(k.clone(), *v as f64);
        }
        for (k, v) in gauges.iter() {
            out.insert(k.clone(), *v);
        }
        out
    }
}
