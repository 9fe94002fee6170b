//! Gap-aware differencing of monotonic counters.
//!
//! A counter column is expected to be non-decreasing except where a zero marks
//! a missing sample or the counter resets. Deltas are only emitted between two
//! genuine samples that increase; the bins spanning a gap or a reset keep the
//! missing sentinel. The last input row has no successor, so the output is one
//! row shorter than the input.

use crate::grid::Grid;
use crate::timeseries::MISSING;

/// Difference every column of `counters` in time order.
pub fn counter_deltas(counters: &Grid<f64>) -> Grid<f64> {
    let rows = counters.rows().saturating_sub(1);
    let mut out = Grid::filled(rows, counters.cols(), MISSING);
    for col in 0..counters.cols() {
        column_deltas(counters.column(col), out.column_mut(col));
    }
    out
}

fn column_deltas(input: &[f64], out: &mut [f64]) {
    // last genuine counter value
    let mut prev_nonzero: Option<f64> = None;
    // true while spanning missing samples or a reset
    let mut searching = true;

    for (row, &value) in input.iter().enumerate() {
        if row == 0 {
            if value != 0.0 {
                prev_nonzero = Some(value);
            }
            continue;
        }

        if searching {
            if value == 0.0 {
                continue;
            }
            match prev_nonzero {
                Some(prev) if value >= prev => {
                    out[row - 1] = value - prev;
                    searching = false;
                }
                // counter came back lower than the last genuine value; this
                // sample becomes the new baseline
                _ => {}
            }
            prev_nonzero = Some(value);
        } else {
            let previous = input[row - 1];
            if value < previous {
                searching = true;
            } else {
                out[row - 1] = value - previous;
                prev_nonzero = Some(value);
            }
        }
    }
}
