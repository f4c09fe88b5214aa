use std::fmt;
use std::str::FromStr;

use crate::predictor::PredictError;
use crate::table::TableKind;

/// A distance that can be queried: a column of one of the reference tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Distance {
    Fly30,
    Blocks30,
    M60,
    M100,
    M150,
    M200,
    M250,
    M300,
    M400,
    M600,
}

/// Every distance that shows up in a prediction, in display order.
///
/// `M120`, `M180`, `M350` and `M500` are never table columns; they only
/// exist as interpolations between two neighbouring splits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Split {
    Fly30,
    Blocks30,
    M60,
    M100,
    M120,
    M150,
    M180,
    M200,
    M250,
    M300,
    M350,
    M400,
    M500,
    M600,
}

/// Columns of the short-distance table, keyed by distance.
pub const SHORT_COLUMNS: &[(Distance, &str)] = &[
    (Distance::Blocks30, "30m from Blocks"),
    (Distance::Fly30, "30m Fly"),
    (Distance::M60, "60m"),
    (Distance::M100, "100m"),
    (Distance::M150, "150m"),
    (Distance::M200, "200m"),
    (Distance::M250, "250m"),
];

/// Columns of the long-distance (endurance) table, keyed by distance.
pub const LONG_COLUMNS: &[(Distance, &str)] = &[
    (Distance::M150, "150m"),
    (Distance::M200, "200m"),
    (Distance::M300, "300m"),
    (Distance::M400, "400m"),
    (Distance::M600, "600m"),
];

/// The only distance both tables share in a way that is used for bridging.
pub const BRIDGE: Distance = Distance::M200;

/// Synthetic splits and the two real splits each is interpolated from.
/// Tuples are (target, lower neighbour, upper neighbour).
pub const SYNTHETIC: &[(Split, Split, Split)] = &[
    (Split::M120, Split::M100, Split::M150),
    (Split::M180, Split::M150, Split::M200),
    (Split::M350, Split::M300, Split::M400),
    (Split::M500, Split::M400, Split::M600),
];

impl Distance {
    pub const ALL: [Distance; 10] = [
        Distance::Fly30,
        Distance::Blocks30,
        Distance::M60,
        Distance::M100,
        Distance::M150,
        Distance::M200,
        Distance::M250,
        Distance::M300,
        Distance::M400,
        Distance::M600,
    ];

    /// Look up a distance given in whole meters. The 30 m splits have no
    /// plain meter form and must be named.
    pub fn from_meters(meters: u32) -> Option<Self> {
        match meters {
            60 => Some(Distance::M60),
            100 => Some(Distance::M100),
            150 => Some(Distance::M150),
            200 => Some(Distance::M200),
            250 => Some(Distance::M250),
            300 => Some(Distance::M300),
            400 => Some(Distance::M400),
            600 => Some(Distance::M600),
            _ => None,
        }
    }

    /// Identifier used on the command line and in error messages.
    pub fn id(&self) -> &'static str {
        match self {
            Distance::Fly30 => "30-fly",
            Distance::Blocks30 => "30-blocks",
            Distance::M60 => "60",
            Distance::M100 => "100",
            Distance::M150 => "150",
            Distance::M200 => "200",
            Distance::M250 => "250",
            Distance::M300 => "300",
            Distance::M400 => "400",
            Distance::M600 => "600",
        }
    }

    pub fn label(&self) -> &'static str {
        Split::from(*self).label()
    }

    /// The table a query on this distance is answered from. 150 m and 200 m
    /// appear in both tables; they resolve to the short table first.
    pub fn home_table(&self) -> TableKind {
        if column_in(SHORT_COLUMNS, *self).is_some() {
            TableKind::Short
        } else {
            TableKind::Long
        }
    }

    /// Column header for this distance in the given table, if it has one.
    pub fn column(&self, kind: TableKind) -> Option<&'static str> {
        column_in(kind.columns(), *self)
    }

    /// Comma separated list of every accepted identifier.
    pub fn valid_ids() -> String {
        Distance::ALL
            .iter()
            .map(|d| d.id())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn column_in(columns: &[(Distance, &'static str)], distance: Distance) -> Option<&'static str> {
    columns
        .iter()
        .find(|(d, _)| *d == distance)
        .map(|(_, column)| *column)
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Distance {
    type Err = PredictError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let unknown = || PredictError::UnknownDistance {
            input: s.trim().to_string(),
            valid: Distance::valid_ids(),
        };

        match normalized.as_str() {
            "30-fly" | "30m-fly" | "30 fly" => Ok(Distance::Fly30),
            "30-blocks" | "30m-blocks" | "30 blocks" => Ok(Distance::Blocks30),
            other => other
                .strip_suffix('m')
                .unwrap_or(other)
                .parse::<u32>()
                .ok()
                .and_then(Distance::from_meters)
                .ok_or_else(unknown),
        }
    }
}

impl Split {
    pub const ALL: [Split; 14] = [
        Split::Fly30,
        Split::Blocks30,
        Split::M60,
        Split::M100,
        Split::M120,
        Split::M150,
        Split::M180,
        Split::M200,
        Split::M250,
        Split::M300,
        Split::M350,
        Split::M400,
        Split::M500,
        Split::M600,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Split::Fly30 => "30m Fly",
            Split::Blocks30 => "30m Blocks",
            Split::M60 => "60m",
            Split::M100 => "100m",
            Split::M120 => "120m",
            Split::M150 => "150m",
            Split::M180 => "180m",
            Split::M200 => "200m",
            Split::M250 => "250m",
            Split::M300 => "300m",
            Split::M350 => "350m",
            Split::M400 => "400m",
            Split::M500 => "500m",
            Split::M600 => "600m",
        }
    }

    /// Distance in meters. Both 30 m splits report 30.
    pub fn meters(&self) -> f64 {
        match self {
            Split::Fly30 | Split::Blocks30 => 30.0,
            Split::M60 => 60.0,
            Split::M100 => 100.0,
            Split::M120 => 120.0,
            Split::M150 => 150.0,
            Split::M180 => 180.0,
            Split::M200 => 200.0,
            Split::M250 => 250.0,
            Split::M300 => 300.0,
            Split::M350 => 350.0,
            Split::M400 => 400.0,
            Split::M500 => 500.0,
            Split::M600 => 600.0,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        SYNTHETIC.iter().any(|(target, _, _)| target == self)
    }
}

impl From<Distance> for Split {
    fn from(distance: Distance) -> Self {
        match distance {
            Distance::Fly30 => Split::Fly30,
            Distance::Blocks30 => Split::Blocks30,
            Distance::M60 => Split::M60,
            Distance::M100 => Split::M100,
            Distance::M150 => Split::M150,
            Distance::M200 => Split::M200,
            Distance::M250 => Split::M250,
            Distance::M300 => Split::M300,
            Distance::M400 => Split::M400,
            Distance::M600 => Split::M600,
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_and_numeric_ids() {
        assert_eq!("30-fly".parse::<Distance>().unwrap(), Distance::Fly30);
        assert_eq!("30-Blocks".parse::<Distance>().unwrap(), Distance::Blocks30);
        assert_eq!("100".parse::<Distance>().unwrap(), Distance::M100);
        assert_eq!(" 400m ".parse::<Distance>().unwrap(), Distance::M400);
        assert_eq!(Distance::from_meters(600), Some(Distance::M600));
    }

    #[test]
    fn synthetic_and_unknown_ids_are_rejected() {
        for id in ["120", "500", "999", "", "fly"] {
            match id.parse::<Distance>() {
                Err(PredictError::UnknownDistance { valid, .. }) => {
                    assert!(valid.contains("30-fly"));
                    assert!(valid.contains("600"));
                }
                other => panic!("expected UnknownDistance for {:?}, got {:?}", id, other),
            }
        }
    }

    #[test]
    fn shared_columns_resolve_to_short_table() {
        assert_eq!(Distance::M150.home_table(), TableKind::Short);
        assert_eq!(Distance::M200.home_table(), TableKind::Short);
        assert_eq!(Distance::M250.home_table(), TableKind::Short);
        assert_eq!(Distance::M300.home_table(), TableKind::Long);
        assert_eq!(Distance::M200.column(TableKind::Long), Some("200m"));
        assert_eq!(Distance::M60.column(TableKind::Long), None);
    }

    #[test]
    fn every_distance_has_a_home_column() {
        for distance in Distance::ALL {
            assert!(distance.column(distance.home_table()).is_some());
            assert!(!Split::from(distance).is_synthetic());
        }
    }

    #[test]
    fn splits_sort_in_display_order() {
        let mut shuffled = vec![Split::M600, Split::M120, Split::Fly30, Split::M350];
        shuffled.sort();
        assert_eq!(shuffled, vec![Split::Fly30, Split::M120, Split::M350, Split::M600]);
    }
}
