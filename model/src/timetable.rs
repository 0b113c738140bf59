use chrono::NaiveDateTime;

/// A sequence of something, with non-overlapping and sorted time intervals.
///
/// Intervals are "open", aka, it's fine for one interval to end right at 7am
/// and the next to start right at 7am.
pub struct Timetable<T>(pub Vec<(NaiveDateTime, NaiveDateTime, T)>);

impl<T> Timetable<T> {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn is_free(&self, check: (NaiveDateTime, NaiveDateTime)) -> bool {
        for (t1, t2, _) in &self.0 {
            if overlaps(check, (*t1, *t2)) {
                return false;
            }
        }
        true
    }

    // Assumes is_free is true. Maybe combine them?
    pub fn assign(&mut self, pair: (NaiveDateTime, NaiveDateTime), obj: T) {
        if let Some(idx) = self.0.iter().position(|(t1, _, _)| pair.1 <= *t1) {
            self.0.insert(idx, (pair.0, pair.1, obj));
        } else {
            self.0.push((pair.0, pair.1, obj));
        }
    }
}

fn overlaps(
    pair1: (NaiveDateTime, NaiveDateTime),
    pair2: (NaiveDateTime, NaiveDateTime),
) -> bool {
    fn contains(t: NaiveDateTime, pair: (NaiveDateTime, NaiveDateTime)) -> bool {
        t > pair.0 && t < pair.1
    }

    contains(pair1.0, pair2)
        || contains(pair1.1, pair2)
        || contains(pair2.0, pair1)
        || contains(pair2.1, pair1)
}
