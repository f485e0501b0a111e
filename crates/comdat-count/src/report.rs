//! The COMDAT report builder (§4.8): filter entries with a single instance,
//! materialise sorted output points, merge points that are close in
//! log-log space, and emit the textual report.

use std::io::Write;

use crate::aggregate::AggregationEntry;

/// One surviving aggregation entry, reduced to the three numbers the report
/// prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct OutputPoint {
    pub largest: u64,
    pub instances: u32,
    pub wasted: u64,
}

/// Step 1: drop every entry with `instances <= 1` — a group instantiated
/// exactly once wastes nothing.
pub fn filter_single_instance(
    entries: impl IntoIterator<Item = AggregationEntry>,
) -> Vec<OutputPoint> {
    entries
        .into_iter()
        .filter(|e| e.instances > 1)
        .map(|e| OutputPoint {
            largest: e.largest,
            instances: e.instances,
            wasted: e.total_size - e.largest,
        })
        .collect()
}

/// Step 2: sort ascending by `(largest, instances, wasted)`.
pub fn sort_points(points: &mut [OutputPoint]) {
    points.sort();
}

const TRIM_RADIUS: f64 = 0.05;

fn log_position(point: &OutputPoint) -> (f64, f64) {
    ((point.largest.max(1) as f64).log10(), (point.instances.max(1) as f64).log10())
}

fn is_close(a: &OutputPoint, b: &OutputPoint) -> bool {
    let (ax, ay) = log_position(a);
    let (bx, by) = log_position(b);
    ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt() < TRIM_RADIUS
}

/// Step 3: merges points whose log-space positions are within [`TRIM_RADIUS`]
/// of each other. For each surviving point, scans the remaining tail; any
/// tail point within radius has its `wasted` folded (max) into the current
/// point and is then removed by swapping it past the active boundary — so
/// each removed point is only ever compared once more, against whatever was
/// swapped into its old slot.
///
/// Returns the number of points removed. Idempotent: running this again on
/// its own output removes nothing further, because no two surviving points
/// are within radius of each other by construction.
pub fn similarity_trim(points: &mut Vec<OutputPoint>) -> usize {
    let before = points.len();
    let mut active_len = points.len();
    let mut i = 0;
    while i < active_len {
        let mut j = i + 1;
        while j < active_len {
            if is_close(&points[i], &points[j]) {
                points[i].wasted = points[i].wasted.max(points[j].wasted);
                active_len -= 1;
                points.swap(j, active_len);
                // Re-examine slot `j`: it now holds whatever was at
                // `active_len`, which has not yet been checked against `i`.
            } else {
                j += 1;
            }
        }
        i += 1;
    }
    points.truncate(active_len);
    before - active_len
}

/// Everything the textual report needs, computed independently (§4.8: header
/// computation, filtering, and trimming may run concurrently).
pub struct Report {
    pub digest_hex: String,
    pub filtered_count: usize,
    pub trimmed_count: usize,
    pub points: Vec<OutputPoint>,
}

impl Report {
    pub fn build(
        raw_entries: Vec<AggregationEntry>,
        digest_hex: String,
    ) -> Self {
        let raw_count = raw_entries.len();
        let mut points = filter_single_instance(raw_entries);
        let filtered_count = raw_count - points.len();
        sort_points(&mut points);
        let trimmed_count = similarity_trim(&mut points);
        Report {
            digest_hex,
            filtered_count,
            trimmed_count,
            points,
        }
    }

    pub fn write_to<W: Write>(&self, mut out: W) -> std::io::Result<()> {
        writeln!(out, "# MD5: {}", self.digest_hex)?;
        writeln!(
            out,
            "# Filtered {} COMDATs with 1 instance",
            self.filtered_count
        )?;
        writeln!(out, "# Then trimmed {} similar points", self.trimmed_count)?;
        writeln!(out, "# Result has {} points", self.points.len())?;

        let total_actual: u64 = self
            .points
            .iter()
            .map(|p| p.wasted + p.largest)
            .sum();
        let total_waste: u64 = self.points.iter().map(|p| p.wasted).sum();
        writeln!(out, "#> Total:{total_actual}")?;
        writeln!(out, "#> Wasted:{total_waste}")?;

        writeln!(out, "Size Instances Total")?;
        for point in &self.points {
            writeln!(out, "{} {} {}", point.largest, point.instances, point.wasted)?;
        }
        Ok(())
    }
}
