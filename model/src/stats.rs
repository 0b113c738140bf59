/// Per-run diagnostic counters, threaded explicitly through every stage so
/// independent runs never share state. Dropped work degrades completeness,
/// not correctness, and these counters are how much got dropped.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    // Ingestion
    pub files_skipped: usize,
    pub rows_quarantined: usize,

    // Segmentation
    pub routes_skipped: usize,
    pub windows_processed: usize,
    pub segments_short: usize,
    pub segments_oversized: usize,
    pub segments_invalid: usize,
    pub segments_interleaved: usize,
    pub trips_degenerate: usize,
    pub trips_emitted: usize,

    // Warning assignment
    pub warnings_matched: usize,
    pub warnings_ambiguous: usize,
    pub warnings_unassigned: usize,
    pub overlapping_trip_windows: usize,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(
            f,
            "{} trips from {} assignment windows",
            self.trips_emitted, self.windows_processed
        )?;
        writeln!(
            f,
            "Segments dropped: {} short, {} oversized, {} invalid, {} interleaved, {} degenerate",
            self.segments_short,
            self.segments_oversized,
            self.segments_invalid,
            self.segments_interleaved,
            self.trips_degenerate
        )?;
        writeln!(
            f,
            "Warnings: {} matched ({} ambiguous), {} unassigned; {} overlapping trip windows",
            self.warnings_matched,
            self.warnings_ambiguous,
            self.warnings_unassigned,
            self.overlapping_trip_windows
        )?;
        write!(
            f,
            "Ingestion: {} files skipped, {} rows quarantined, {} routes without definitions",
            self.files_skipped, self.rows_quarantined, self.routes_skipped
        )
    }
}
