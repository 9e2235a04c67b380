use std::fmt::Write as _;

use web_time::{Duration, Instant};

use tether_core::{Document, NodeId, NodeKind, RenderTree, Runtime, TickReport};

/// Running digest statistics.
pub struct Hud {
    pub enabled: bool,
    tick_count: u64,
    last_tick: Option<Instant>,
    tps_smooth: f32,
    pub metrics: Option<Metrics>,
}

impl Default for Hud {
    fn default() -> Self {
        Self::new()
    }
}

impl Hud {
    pub fn new() -> Self {
        Self {
            enabled: false,
            tick_count: 0,
            last_tick: None,
            tps_smooth: 0.0,
            metrics: None,
        }
    }

    pub fn toggle(&mut self) {
        self.enabled = !self.enabled;
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Ticks per second, smoothed.
    pub fn tps(&self) -> f32 {
        self.tps_smooth
    }

    pub fn record(&mut self, report: &TickReport, elapsed: Duration) {
        self.record_at(report, elapsed, Instant::now());
    }

    pub fn record_at(&mut self, report: &TickReport, elapsed: Duration, now: Instant) {
        self.tick_count += 1;
        if let Some(prev) = self.last_tick.replace(now) {
            let dt = (now - prev).as_secs_f32();
            if dt > 0.0 {
                let tps = 1.0 / dt;
                // simple EMA
                let a = 0.2;
                self.tps_smooth = if self.tps_smooth == 0.0 {
                    tps
                } else {
                    (1.0 - a) * self.tps_smooth + a * tps
                };
            }
        }
        let m = self.metrics.get_or_insert_with(Metrics::default);
        m.digest_ms = elapsed.as_secs_f32() * 1000.0;
        m.changed = report.changed.len();
        m.invoked = report.invoked;
        m.errors = report.errors.len();
        m.total_errors += report.errors.len();
        if !report.errors.is_empty() {
            log::debug!("hud: tick {} had {} error(s)", report.tick, m.errors);
        }
    }

    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!("tick: {}", self.tick_count),
            format!("tps: {:.1}", self.tps_smooth),
        ];
        if let Some(m) = &self.metrics {
            lines.push(format!("digest: {:.2} ms", m.digest_ms));
            lines.push(format!("changed: {}", m.changed));
            lines.push(format!("bindings: {}", m.invoked));
            lines.push(format!("errors: {}/{}", m.errors, m.total_errors));
        }
        lines.join("  |  ")
    }
}

/// Figures from the most recent tick, plus a running error total.
#[derive(Clone, Debug, Default)]
pub struct Metrics {
    pub digest_ms: f32,
    pub changed: usize,
    pub invoked: usize,
    pub errors: usize,
    pub total_errors: usize,
}

/// Indented outline of `root`: elements with their attributes and
/// listened-for events, text nodes quoted. Empty text nodes (repeat anchors)
/// are left out.
pub fn outline(doc: &Document, root: NodeId) -> String {
    let mut out = String::new();
    write_node(doc, root, 0, &mut out);
    out.truncate(out.trim_end().len());
    out
}

fn write_node(doc: &Document, node: NodeId, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    match doc.kind(node) {
        Some(NodeKind::Text) => {
            let data = doc.data(node).unwrap_or_default();
            if !data.is_empty() {
                let _ = writeln!(out, "{indent}{data:?}");
            }
        }
        Some(NodeKind::Element(tag)) => {
            let _ = write!(out, "{indent}<{tag}");
            for (name, value) in doc.attributes(node) {
                let _ = write!(out, " {name}={value:?}");
            }
            if let Some(value) = doc.value(node).filter(|v| !v.is_empty()) {
                let _ = write!(out, " .value={value:?}");
            }
            if doc.checked(node) {
                out.push_str(" .checked");
            }
            for kind in doc.events(node).kinds() {
                let _ = write!(out, " @{kind}");
            }
            out.push_str(">\n");
            for child in doc.children(node) {
                write_node(doc, child, depth + 1, out);
            }
        }
        None => {
            let _ = writeln!(out, "{indent}<disposed {node:?}>");
        }
    }
}

pub struct Inspector {
    pub hud: Hud,
}

impl Default for Inspector {
    fn default() -> Self {
        Self::new()
    }
}

impl Inspector {
    pub fn new() -> Self {
        Self { hud: Hud::new() }
    }

    /// Runs one tick on `rt`, timing it for the HUD.
    pub fn tick(&mut self, rt: &mut Runtime<Document>) -> TickReport {
        let start = Instant::now();
        let report = rt.tick();
        self.hud.record(&report, start.elapsed());
        report
    }

    /// Outline of the whole document followed by the HUD line, when enabled.
    pub fn dump(&self, rt: &Runtime<Document>) -> Option<String> {
        if !self.hud.enabled {
            return None;
        }
        let tree = rt.tree();
        Some(format!(
            "{}\n-- {}",
            outline(tree, tree.root()),
            self.hud.summary()
        ))
    }
}
