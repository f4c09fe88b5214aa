use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::distance::{Distance, Split, BRIDGE, SYNTHETIC};
use crate::range::{bracket, valid_range, Bracket};
use crate::table::{ReferenceTable, TableKind, TableStore};
use crate::value::TimeConvention;

/// Reasons a prediction could not be made. All of them are shown to the
/// user; none of them is fatal.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictError {
    #[error("Distance {input} not found in tables. Available distances: {valid}")]
    UnknownDistance { input: String, valid: String },
    #[error("Unable to determine valid range for {distance}")]
    RangeUndeterminable { distance: &'static str },
    #[error("Time is outside the valid range for {distance} - valid range is {min:.2}s to {max:.2}s")]
    OutOfValidatedRange {
        distance: &'static str,
        min: f64,
        max: f64,
    },
    #[error("Input time is outside the range of the data. Please enter a time within the performance tables range.")]
    OutOfBracketableRange,
    #[error("Data is still loading, please wait a moment and try again")]
    DataNotLoaded,
}

/// Predicted time for every split, plus the query that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub distance: Distance,
    pub time: f64,
    splits: BTreeMap<Split, f64>,
}

impl Prediction {
    pub fn get(&self, split: impl Into<Split>) -> Option<f64> {
        self.splits.get(&split.into()).copied()
    }

    /// Every split in display order, `None` where nothing could be derived.
    pub fn iter(&self) -> impl Iterator<Item = (Split, Option<f64>)> + '_ {
        Split::ALL.iter().map(move |s| (*s, self.get(*s)))
    }
}

/// Stateless split predictor over a loaded pair of tables.
#[derive(Debug, Clone)]
pub struct Predictor {
    store: Arc<TableStore>,
    convention: TimeConvention,
}

impl Predictor {
    pub fn new(store: Arc<TableStore>, convention: TimeConvention) -> Self {
        Self { store, convention }
    }

    /// Predict from a distance identifier such as "100" or "30-fly".
    pub fn predict_id(&self, distance_id: &str, time: f64) -> Result<Prediction, PredictError> {
        let distance: Distance = distance_id.parse()?;
        self.predict(distance, time)
    }

    pub fn predict(&self, distance: Distance, time: f64) -> Result<Prediction, PredictError> {
        let home = distance.home_table();
        let table = self.store.table(home);
        let column = distance
            .column(home)
            .ok_or_else(|| PredictError::UnknownDistance {
                input: distance.id().to_string(),
                valid: Distance::valid_ids(),
            })?;

        let range = valid_range(table, column, self.convention).ok_or(
            PredictError::RangeUndeterminable {
                distance: distance.label(),
            },
        )?;
        if !range.contains(time) {
            return Err(PredictError::OutOfValidatedRange {
                distance: distance.label(),
                min: range.min,
                max: range.max,
            });
        }

        let rows = bracket(table, column, time, self.convention);
        if rows.is_empty() {
            return Err(PredictError::OutOfBracketableRange);
        }

        let mut splits = BTreeMap::new();
        for (d, value) in self.read_columns(table, column, time, rows) {
            splits.insert(Split::from(d), value);
        }
        splits.insert(Split::from(distance), time);

        if let Some(&bridge_time) = splits.get(&Split::from(BRIDGE)) {
            self.bridge(home.other(), bridge_time, &mut splits);
        } else {
            log::debug!("[BRIDGE] No {} time from {} table, skipping", BRIDGE.label(), home);
        }

        // Bridging never touches the queried column, but keep the input verbatim.
        splits.insert(Split::from(distance), time);

        for (target, from, to) in SYNTHETIC {
            if let Some(value) = interpolate_split(&splits, *target, *from, *to) {
                splits.insert(*target, value);
            }
        }

        log::debug!(
            "[PREDICT] {} @ {:.2}s from {} table: {} of {} splits resolved",
            distance.label(),
            time,
            home,
            splits.len(),
            Split::ALL.len()
        );

        Ok(Prediction {
            distance,
            time,
            splits,
        })
    }

    /// Carry a 200 m time into `target` and copy the columns only that table has.
    fn bridge(&self, target: TableKind, bridge_time: f64, splits: &mut BTreeMap<Split, f64>) {
        let table = self.store.table(target);
        let Some(column) = BRIDGE.column(target) else {
            return;
        };

        let rows = bracket(table, column, bridge_time, self.convention);
        if rows.is_empty() {
            log::debug!(
                "[BRIDGE] {} table has no {} data, skipping",
                target,
                BRIDGE.label()
            );
            return;
        }

        let home = target.other();
        let mut copied = 0;
        for (d, value) in self.read_columns(table, column, bridge_time, rows) {
            if d.column(home).is_some() {
                continue;
            }
            splits.insert(Split::from(d), value);
            copied += 1;
        }

        log::debug!(
            "[BRIDGE] {} {:.2}s -> {} table: {} splits",
            BRIDGE.label(),
            bridge_time,
            target,
            copied
        );
    }

    /// Value of every column of `table` for a query on `column`.
    ///
    /// Two straddling rows are interpolated linearly; a single row (exact hit
    /// or edge of the data) is read as is. Cells that do not parse are left out.
    fn read_columns(
        &self,
        table: &ReferenceTable,
        column: &str,
        time: f64,
        rows: Bracket,
    ) -> Vec<(Distance, f64)> {
        let all = table.rows();
        let mut values = Vec::new();

        match (rows.lower, rows.upper) {
            (Some(lo), Some(hi)) if lo != hi => {
                let (lower, upper) = (&all[lo], &all[hi]);
                let (Some(x0), Some(x1)) = (
                    lower.seconds(column, self.convention),
                    upper.seconds(column, self.convention),
                ) else {
                    return values;
                };
                for (d, target) in table.kind().columns() {
                    let y0 = lower.seconds(target, self.convention);
                    let y1 = upper.seconds(target, self.convention);
                    match (y0, y1) {
                        (Some(y0), Some(y1)) => {
                            values.push((*d, interpolate(time, x0, x1, y0, y1)))
                        }
                        _ => log::trace!("[PREDICT] {:?} missing in bracket rows", target),
                    }
                }
            }
            _ => {
                let Some(index) = rows.single() else {
                    return values;
                };
                let row = &all[index];
                for (d, target) in table.kind().columns() {
                    if let Some(value) = row.seconds(target, self.convention) {
                        values.push((*d, value));
                    }
                }
            }
        }

        values
    }
}

fn interpolate(x: f64, x0: f64, x1: f64, y0: f64, y1: f64) -> f64 {
    if x1 == x0 {
        return y0;
    }
    y0 + (x - x0) * (y1 - y0) / (x1 - x0)
}

fn interpolate_split(
    splits: &BTreeMap<Split, f64>,
    target: Split,
    from: Split,
    to: Split,
) -> Option<f64> {
    let t1 = *splits.get(&from)?;
    let t2 = *splits.get(&to)?;
    let (d1, d2) = (from.meters(), to.meters());
    Some(t1 + (target.meters() - d1) * (t2 - t1) / (d2 - d1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SHORT: &str = "30m from Blocks,30m Fly,60m,100m,150m,200m,250m\n\
                         3.90,2.70,6.70,10.50,15.60,21.00,27.00\n\
                         4.10,2.90,7.00,11.00,16.40,22.20,28.60\n\
                         4.30,3.10,7.40,11.80,17.60,23.80,30.80\n\
                         4.50,3.30,7.80,12.50,18.80,25.40,33.00\n";

    const LONG: &str = "150m,200m,300m,400m,600m\n\
                        16.0,21.5,34.0,47.0,1:20.0\n\
                        17.1,23.0,36.5,50.5,1:26.0\n\
                        18.2,24.6,39.0,54.0,1:32.5\n\
                        19.5,26.5,42.0,58.5,1:40.0\n";

    fn predictor_for(short: &str, long: &str) -> Predictor {
        let store = TableStore::from_csv_strs(short, long).unwrap();
        Predictor::new(Arc::new(store), TimeConvention::DecimalSeconds)
    }

    fn predictor() -> Predictor {
        predictor_for(SHORT, LONG)
    }

    fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.unwrap_or_else(|| panic!("expected {}, got None", expected));
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn exact_match_reads_row_verbatim() {
        let p = predictor().predict(Distance::M100, 11.0).unwrap();
        assert_eq!(p.get(Distance::M100), Some(11.0));
        assert_eq!(p.get(Distance::M60), Some(7.0));
        assert_eq!(p.get(Distance::Blocks30), Some(4.1));
        assert_eq!(p.get(Distance::Fly30), Some(2.9));
        assert_eq!(p.get(Distance::M150), Some(16.4));
        assert_eq!(p.get(Distance::M200), Some(22.2));
        assert_eq!(p.get(Distance::M250), Some(28.6));
    }

    #[test]
    fn straddling_rows_are_interpolated() {
        let p = predictor().predict(Distance::M100, 11.4).unwrap();
        assert_eq!(p.get(Distance::M100), Some(11.4));
        assert_close(p.get(Distance::M60), 7.2);
        assert_close(p.get(Distance::M200), 23.0);
        assert_close(p.get(Distance::M250), 29.7);
    }

    #[test]
    fn short_query_bridges_into_long_table() {
        let p = predictor().predict(Distance::M100, 11.0).unwrap();
        // 200m = 22.2 sits between the long table's 21.5 and 23.0 rows.
        assert_close(p.get(Distance::M300), 34.0 + 0.7 * 2.5 / 1.5);
        assert_close(p.get(Distance::M400), 47.0 + 0.7 * 3.5 / 1.5);
        assert_close(p.get(Distance::M600), 80.0 + 0.7 * 6.0 / 1.5);
        // Shared columns stay with the queried table.
        assert_eq!(p.get(Distance::M150), Some(16.4));
    }

    #[test]
    fn long_query_bridges_into_short_table() {
        let p = predictor().predict(Distance::M400, 50.5).unwrap();
        assert_eq!(p.get(Distance::M400), Some(50.5));
        assert_eq!(p.get(Distance::M300), Some(36.5));
        assert_eq!(p.get(Distance::M600), Some(86.0));
        assert_eq!(p.get(Distance::M150), Some(17.1));
        assert_eq!(p.get(Distance::M200), Some(23.0));
        // 23.0 is halfway between the short table's 22.2 and 23.8 rows.
        assert_close(p.get(Distance::M100), 11.4);
        assert_close(p.get(Distance::M60), 7.2);
        assert_close(p.get(Distance::M250), 29.7);
    }

    #[test]
    fn bridge_clamps_to_nearest_row_past_the_edge() {
        // 200m = 21.0 is below every long-table 200m value.
        let p = predictor().predict(Distance::M100, 10.5).unwrap();
        assert_eq!(p.get(Distance::M200), Some(21.0));
        assert_eq!(p.get(Distance::M300), Some(34.0));
        assert_eq!(p.get(Distance::M600), Some(80.0));
    }

    #[test]
    fn synthetic_splits_lie_between_neighbours() {
        let p = predictor().predict(Distance::M400, 50.5).unwrap();
        assert_close(p.get(Split::M350), 43.5);
        assert_close(p.get(Split::M500), 68.25);
        assert_close(p.get(Split::M180), 17.1 + 30.0 * (23.0 - 17.1) / 50.0);
        let t120 = p.get(Split::M120).unwrap();
        assert!(p.get(Distance::M100).unwrap() < t120 && t120 < p.get(Distance::M150).unwrap());
    }

    #[test]
    fn single_row_scenario() {
        let p = predictor_for("60m,100m,150m\n8.0,12.5,17.0\n", "150m,200m,300m,400m,600m\n")
            .predict_id("100", 12.5)
            .unwrap();
        assert_eq!(p.get(Distance::M100), Some(12.5));
        assert_eq!(p.get(Distance::M60), Some(8.0));
        assert_eq!(p.get(Distance::M150), Some(17.0));
        let t120 = p.get(Split::M120).unwrap();
        assert!(12.5 < t120 && t120 < 17.0);
        assert_eq!(p.get(Distance::M400), None);
        assert_eq!(p.get(Split::M350), None);
        assert_eq!(p.iter().count(), Split::ALL.len());
    }

    #[test]
    fn unknown_distance_lists_valid_ids() {
        let err = predictor().predict_id("999", 10.0).unwrap_err();
        match &err {
            PredictError::UnknownDistance { input, valid } => {
                assert_eq!(input, "999");
                assert_eq!(valid, &Distance::valid_ids());
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(err.to_string().contains("30-fly, 30-blocks, 60"));
    }

    #[test]
    fn empty_column_has_no_range() {
        let short = "60m,100m,250m\n7.0,11.0,\n7.4,11.8,\n";
        let err = predictor_for(short, LONG).predict(Distance::M250, 30.0).unwrap_err();
        assert_eq!(err, PredictError::RangeUndeterminable { distance: "250m" });
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let p = predictor();
        assert!(p.predict(Distance::M100, 10.5).is_ok());
        assert!(p.predict(Distance::M100, 12.5).is_ok());

        let err = p.predict(Distance::M100, 10.49).unwrap_err();
        assert_eq!(
            err,
            PredictError::OutOfValidatedRange {
                distance: "100m",
                min: 10.5,
                max: 12.5
            }
        );
        assert_eq!(
            err.to_string(),
            "Time is outside the valid range for 100m - valid range is 10.50s to 12.50s"
        );
        assert!(matches!(
            p.predict(Distance::M100, 12.51),
            Err(PredictError::OutOfValidatedRange { .. })
        ));
        assert!(matches!(
            p.predict(Distance::Fly30, f64::NAN),
            Err(PredictError::OutOfValidatedRange { .. })
        ));
    }

    #[test]
    fn unbracketable_and_loading_messages() {
        assert_eq!(
            PredictError::OutOfBracketableRange.to_string(),
            "Input time is outside the range of the data. \
             Please enter a time within the performance tables range."
        );
        assert_eq!(
            PredictError::DataNotLoaded.to_string(),
            "Data is still loading, please wait a moment and try again"
        );
    }

    #[test]
    fn missing_cells_leave_splits_absent() {
        let short = "60m,100m,150m,200m\n7.0,11.0,,22.2\n7.4,11.8,17.6,23.8\n";
        let p = predictor_for(short, LONG).predict(Distance::M100, 11.4).unwrap();
        assert_close(p.get(Distance::M60), 7.2);
        assert_eq!(p.get(Distance::M150), None);
        assert_eq!(p.get(Split::M120), None);
        assert_eq!(p.get(Split::M180), None);
        assert!(p.get(Distance::M400).is_some());
    }

    #[test]
    fn bridge_round_trip_keeps_input_column() {
        let p = predictor();
        let there = p.predict(Distance::M200, 23.0).unwrap();
        assert_eq!(there.get(Distance::M200), Some(23.0));
        let back = p.predict(Distance::M400, there.get(Distance::M400).unwrap()).unwrap();
        assert_eq!(back.get(Distance::M400), there.get(Distance::M400));
    }

    #[test]
    fn minute_dot_second_tables() {
        let long = "150m,200m,300m,400m,600m\n16,21,34,47,1.20\n17,23,36,50,1.26\n";
        let store = TableStore::from_csv_strs(SHORT, long).unwrap();
        let p = Predictor::new(Arc::new(store), TimeConvention::MinuteDotSecond)
            .predict(Distance::M600, 86.0)
            .unwrap();
        assert_eq!(p.get(Distance::M600), Some(86.0));
        assert_eq!(p.get(Distance::M400), Some(50.0));
        assert_eq!(p.get(Distance::M200), Some(23.0));
    }

    fn in_range(distance: Distance) -> (f64, f64) {
        match distance {
            Distance::Blocks30 => (3.9, 4.5),
            Distance::Fly30 => (2.7, 3.3),
            Distance::M60 => (6.7, 7.8),
            Distance::M100 => (10.5, 12.5),
            Distance::M150 => (15.6, 18.8),
            Distance::M200 => (21.0, 25.4),
            Distance::M250 => (27.0, 33.0),
            Distance::M300 => (34.0, 42.0),
            Distance::M400 => (47.0, 58.5),
            Distance::M600 => (80.0, 100.0),
        }
    }

    proptest! {
        #[test]
        fn queried_split_is_passed_through(index in 0usize..10, frac in 0.0f64..=1.0) {
            let distance = Distance::ALL[index];
            let (lo, hi) = in_range(distance);
            let time = (lo + frac * (hi - lo)).min(hi);
            let p = predictor().predict(distance, time).unwrap();
            prop_assert_eq!(p.get(distance), Some(time));
        }

        #[test]
        fn synthetic_splits_stay_between_endpoints(frac in 0.0f64..=1.0) {
            let p = predictor().predict(Distance::M400, (47.0 + frac * 11.5).min(58.5)).unwrap();
            for (target, from, to) in SYNTHETIC {
                if let (Some(t), Some(a), Some(b)) = (p.get(*target), p.get(*from), p.get(*to)) {
                    prop_assert!(a.min(b) - 1e-9 <= t && t <= a.max(b) + 1e-9);
                }
            }
        }

        #[test]
        fn interpolation_follows_table_order(a in 11.0f64..11.8, b in 11.0f64..11.8) {
            let (t1, t2) = if a <= b { (a, b) } else { (b, a) };
            let p = predictor();
            let first = p.predict(Distance::M100, t1).unwrap();
            let second = p.predict(Distance::M100, t2).unwrap();
            for d in [Distance::M60, Distance::M150, Distance::M200, Distance::M250] {
                prop_assert!(first.get(d).unwrap() <= second.get(d).unwrap() + 1e-9);
            }
        }
    }
}
