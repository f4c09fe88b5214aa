use crate::table::{ReferenceTable, Row};
use crate::value::TimeConvention;

/// Smallest and largest parseable time observed in a column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidRange {
    pub min: f64,
    pub max: f64,
}

impl ValidRange {
    /// Both bounds are inclusive.
    pub fn contains(&self, time: f64) -> bool {
        time >= self.min && time <= self.max
    }
}

/// The rows nearest a query time on either side, by index into the table.
///
/// An exact hit fills both sides with the same index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bracket {
    pub lower: Option<usize>,
    pub upper: Option<usize>,
}

impl Bracket {
    pub fn is_empty(&self) -> bool {
        self.lower.is_none() && self.upper.is_none()
    }

    /// Two distinct rows straddle the query, so columns get interpolated.
    pub fn is_straddle(&self) -> bool {
        matches!((self.lower, self.upper), (Some(lo), Some(hi)) if lo != hi)
    }

    /// The single row to read directly: an exact match, or the only side
    /// found when the query sits past the edge of the data.
    pub fn single(&self) -> Option<usize> {
        if self.is_straddle() {
            None
        } else {
            self.lower.or(self.upper)
        }
    }
}

pub fn valid_range(
    table: &ReferenceTable,
    column: &str,
    convention: TimeConvention,
) -> Option<ValidRange> {
    let mut range: Option<ValidRange> = None;

    for value in column_values(table.rows(), column, convention) {
        range = Some(match range {
            Some(r) => ValidRange {
                min: r.min.min(value),
                max: r.max.max(value),
            },
            None => ValidRange {
                min: value,
                max: value,
            },
        });
    }

    range
}

/// Find the nearest row at or below `time` and the nearest at or above it.
/// Equal distances keep the first row in table order.
pub fn bracket(
    table: &ReferenceTable,
    column: &str,
    time: f64,
    convention: TimeConvention,
) -> Bracket {
    let mut found = Bracket::default();
    let mut lower_diff = f64::INFINITY;
    let mut upper_diff = f64::INFINITY;

    for (index, row) in table.rows().iter().enumerate() {
        let Some(value) = row.seconds(column, convention) else {
            continue;
        };
        let diff = value - time;

        if diff <= 0.0 && diff.abs() < lower_diff {
            lower_diff = diff.abs();
            found.lower = Some(index);
        }
        if diff >= 0.0 && diff.abs() < upper_diff {
            upper_diff = diff.abs();
            found.upper = Some(index);
        }
    }

    log::trace!(
        "[BRACKET] {} {:?} @ {:.3}: lower={:?} upper={:?}",
        table.kind(),
        column,
        time,
        found.lower,
        found.upper
    );

    found
}

fn column_values<'a>(
    rows: &'a [Row],
    column: &'a str,
    convention: TimeConvention,
) -> impl Iterator<Item = f64> + 'a {
    rows.iter().filter_map(move |row| row.seconds(column, convention))
}
