/// How a period inside a table cell is read.
///
/// A colon always separates minutes from seconds ("6:49" is 409 s). The
/// convention only decides what a lone period means, so one process must
/// stick to one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeConvention {
    /// "6.49" is 6.49 seconds.
    #[default]
    DecimalSeconds,
    /// "6.49" is 6 minutes 49 seconds.
    MinuteDotSecond,
}

impl TimeConvention {
    pub fn name(&self) -> &'static str {
        match self {
            TimeConvention::DecimalSeconds => "decimal-seconds",
            TimeConvention::MinuteDotSecond => "minute.second",
        }
    }
}

/// Parse a raw table cell into seconds.
///
/// Empty cells and anything that does not read as a number come back as
/// `None`; a bad cell never becomes zero.
pub fn parse_time(raw: Option<&str>, convention: TimeConvention) -> Option<f64> {
    let text = raw?.trim();
    if text.is_empty() {
        return None;
    }

    let seconds = if let Some((min, sec)) = text.split_once(':') {
        minutes_and_seconds(min, sec)?
    } else {
        match convention {
            TimeConvention::DecimalSeconds => parse_number(text)?,
            TimeConvention::MinuteDotSecond => match text.split_once('.') {
                Some((min, sec)) => minutes_and_seconds(min, sec)?,
                None => parse_number(text)?,
            },
        }
    };

    if seconds.is_finite() {
        Some(seconds)
    } else {
        log::trace!("[VALUE] Non-finite cell {:?}", text);
        None
    }
}

fn minutes_and_seconds(min: &str, sec: &str) -> Option<f64> {
    let minutes = parse_number(min)?;
    let seconds = parse_number(sec)?;
    Some(minutes * 60.0 + seconds)
}

fn parse_number(text: &str) -> Option<f64> {
    match text.trim().parse::<f64>() {
        Ok(v) => Some(v),
        Err(_) => {
            log::trace!("[VALUE] Unparseable cell {:?}", text);
            None
        }
    }
}

/// Parse a time typed by the user: plain seconds or "M:SS.ss".
///
/// Entered times always use decimal seconds, whatever convention the tables use.
pub fn parse_entered_time(text: &str) -> Option<f64> {
    parse_time(Some(text), TimeConvention::DecimalSeconds).filter(|t| *t > 0.0)
}
