use std::collections::BTreeMap;
use texlipse_log::{Diagnostic, Severity};

/// Receiver for problem markers.
///
/// Markers are grouped by origin, normally the name of the runner that
/// produced them, so that one tool's markers can be replaced without
/// touching another's.
pub trait MarkerSink {
    fn clear(&mut self, origin: &str);
    fn add(&mut self, origin: &str, diagnostic: Diagnostic);
}

/// In-memory [`MarkerSink`].
#[derive(Debug, Default, Clone)]
pub struct MarkerStore {
    markers: BTreeMap<String, Vec<Diagnostic>>,
}

impl MarkerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, origin: &str) -> &[Diagnostic] {
        self.markers.get(origin).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Diagnostic)> {
        self.markers
            .iter()
            .flat_map(|(origin, list)| list.iter().map(move |d| (origin.as_str(), d)))
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.iter().filter(|(_, d)| d.severity == severity).count()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.values().all(Vec::is_empty)
    }
}

impl MarkerSink for MarkerStore {
    fn clear(&mut self, origin: &str) {
        self.markers.remove(origin);
    }

    fn add(&mut self, origin: &str, diagnostic: Diagnostic) {
        self.markers.entry(origin.to_string()).or_default().push(diagnostic);
    }
}
