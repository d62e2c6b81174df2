use chrono::{DateTime, Utc};

use crate::models::event::{BusyInterval, TimeSlot};

/// Compute the ordered free slots inside `[window_start, window_end)` left
/// over by `busy`. Busy intervals may arrive unordered and overlapping; the
/// cursor only ever advances via `max`, so overlaps are merged instead of
/// reopening already-covered time.
pub fn find_free_slots(
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    busy: &[BusyInterval],
) -> Vec<TimeSlot> {
    let mut sorted: Vec<BusyInterval> = busy.to_vec();
    sorted.sort_by_key(|interval| interval.start);

    let mut free = Vec::new();
    let mut current = window_start;

    for interval in sorted {
        if current >= window_end {
            break;
        }
        if current < interval.start {
            let gap_end = interval.start.min(window_end);
            if current < gap_end {
                free.push(TimeSlot::available(current, gap_end));
            }
        }
        current = current.max(interval.end);
    }

    if current < window_end {
        free.push(TimeSlot::available(current, window_end));
    }

    free
}
