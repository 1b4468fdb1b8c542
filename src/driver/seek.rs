//! Seek targets and NPT parsing.

use std::fmt;
use std::str::FromStr;

use crate::error::{PlayerError, Result};
use crate::recording::Marker;

/// Small relative jump, in seconds.
pub const SMALL_STEP: f64 = 5.0;

/// Large relative jump, as a fraction of the duration.
pub const LARGE_STEP: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekTarget {
    /// Absolute position in seconds.
    Time(f64),
    /// Position as a percentage of the duration.
    Percent(f64),
    /// `<<` / `>>`: relative jump in seconds.
    Relative(f64),
    /// `<<<` / `>>>`: relative jump as a fraction of the duration.
    RelativeFraction(f64),
    Marker(MarkerRef),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerRef {
    Index(usize),
    Prev,
    Next,
}

impl SeekTarget {
    /// Resolve to an absolute time in `[0, duration]`.
    pub fn resolve(&self, current: f64, duration: f64, markers: &[Marker]) -> Result<f64> {
        let time = match *self {
            SeekTarget::Time(t) => t,
            SeekTarget::Percent(p) => p / 100.0 * duration,
            SeekTarget::Relative(delta) => current + delta,
            SeekTarget::RelativeFraction(fraction) => current + fraction * duration,
            SeekTarget::Marker(MarkerRef::Index(index)) => markers
                .get(index)
                .map(|m| m.time)
                .ok_or_else(|| PlayerError::InvalidSeekTarget(format!("no marker with index {index}")))?,
            SeekTarget::Marker(MarkerRef::Prev) => markers
                .iter()
                .rev()
                .find(|m| m.time < current)
                .map_or(0.0, |m| m.time),
            SeekTarget::Marker(MarkerRef::Next) => markers
                .iter()
                .find(|m| m.time > current)
                .map_or(duration, |m| m.time),
        };

        if time.is_nan() {
            return Err(PlayerError::InvalidSeekTarget(self.to_string()));
        }

        Ok(time.clamp(0.0, duration.max(0.0)))
    }
}

impl FromStr for SeekTarget {
    type Err = PlayerError;

    /// Accepts `<<`, `>>`, `<<<`, `>>>`, `NN%`, `marker:N`, `marker:prev`,
    /// `marker:next` and NPT times.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || PlayerError::InvalidSeekTarget(s.to_string());

        match s {
            "<<" => return Ok(SeekTarget::Relative(-SMALL_STEP)),
            ">>" => return Ok(SeekTarget::Relative(SMALL_STEP)),
            "<<<" => return Ok(SeekTarget::RelativeFraction(-LARGE_STEP)),
            ">>>" => return Ok(SeekTarget::RelativeFraction(LARGE_STEP)),
            _ => {}
        }

        if let Some(percent) = s.strip_suffix('%') {
            return percent.trim().parse().map(SeekTarget::Percent).map_err(|_| invalid());
        }

        if let Some(marker) = s.strip_prefix("marker:") {
            let marker = match marker {
                "prev" => MarkerRef::Prev,
                "next" => MarkerRef::Next,
                index => MarkerRef::Index(index.parse().map_err(|_| invalid())?),
            };
            return Ok(SeekTarget::Marker(marker));
        }

        parse_npt(s).map(SeekTarget::Time)
    }
}

impl fmt::Display for SeekTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeekTarget::Time(t) => write!(f, "{t}"),
            SeekTarget::Percent(p) => write!(f, "{p}%"),
            SeekTarget::Relative(d) if *d < 0.0 => write!(f, "<<"),
            SeekTarget::Relative(_) => write!(f, ">>"),
            SeekTarget::RelativeFraction(d) if *d < 0.0 => write!(f, "<<<"),
            SeekTarget::RelativeFraction(_) => write!(f, ">>>"),
            SeekTarget::Marker(MarkerRef::Index(i)) => write!(f, "marker:{i}"),
            SeekTarget::Marker(MarkerRef::Prev) => write!(f, "marker:prev"),
            SeekTarget::Marker(MarkerRef::Next) => write!(f, "marker:next"),
        }
    }
}

/// Parse normal play time: `ss`, `mm:ss` or `hh:mm:ss`, fractions allowed
/// in the last component.
pub fn parse_npt(s: &str) -> Result<f64> {
    let invalid = || PlayerError::InvalidSeekTarget(s.to_string());
    let parts: Vec<&str> = s.trim().split(':').collect();

    if parts.len() > 3 {
        return Err(invalid());
    }

    parts.iter().rev().enumerate().try_fold(0.0, |total, (i, part)| {
        let value: f64 = part.trim().parse().map_err(|_| invalid())?;
        if !value.is_finite() || value < 0.0 {
            return Err(invalid());
        }
        Ok(total + value * 60f64.powi(i as i32))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markers() -> Vec<Marker> {
        vec![Marker::new(0.5, "first"), Marker::new(1.1, "second")]
    }

    #[test]
    fn marker_index_resolves_to_marker_time() {
        let time = SeekTarget::Marker(MarkerRef::Index(1))
            .resolve(0.0, 10.0, &markers())
            .unwrap();
        assert_eq!(time, 1.1);
    }

    #[test]
    fn out_of_range_marker_is_rejected() {
        let err = SeekTarget::Marker(MarkerRef::Index(2))
            .resolve(0.0, 10.0, &markers())
            .unwrap_err();
        assert!(matches!(err, PlayerError::InvalidSeekTarget(_)));
    }

    #[test]
    fn prev_and_next_markers() {
        let m = markers();
        let prev = SeekTarget::Marker(MarkerRef::Prev);
        let next = SeekTarget::Marker(MarkerRef::Next);

        assert_eq!(next.resolve(0.0, 10.0, &m).unwrap(), 0.5);
        assert_eq!(next.resolve(0.5, 10.0, &m).unwrap(), 1.1);
        assert_eq!(next.resolve(1.1, 10.0, &m).unwrap(), 10.0);
        assert_eq!(prev.resolve(1.1, 10.0, &m).unwrap(), 0.5);
        assert_eq!(prev.resolve(0.5, 10.0, &m).unwrap(), 0.0);
        assert_eq!(prev.resolve(5.0, 10.0, &m).unwrap(), 1.1);
    }

    #[test]
    fn relative_targets_are_clamped() {
        assert_eq!(SeekTarget::Relative(-5.0).resolve(2.0, 10.0, &[]).unwrap(), 0.0);
        assert_eq!(SeekTarget::Relative(5.0).resolve(8.0, 10.0, &[]).unwrap(), 10.0);
        assert_eq!(SeekTarget::RelativeFraction(0.1).resolve(2.0, 10.0, &[]).unwrap(), 3.0);
        assert_eq!(SeekTarget::Percent(50.0).resolve(0.0, 10.0, &[]).unwrap(), 5.0);
        assert_eq!(SeekTarget::Time(99.0).resolve(0.0, 10.0, &[]).unwrap(), 10.0);
    }

    #[test]
    fn parses_seek_strings() {
        assert_eq!("<<".parse::<SeekTarget>().unwrap(), SeekTarget::Relative(-5.0));
        assert_eq!(">>>".parse::<SeekTarget>().unwrap(), SeekTarget::RelativeFraction(0.1));
        assert_eq!("25%".parse::<SeekTarget>().unwrap(), SeekTarget::Percent(25.0));
        assert_eq!(
            "marker:next".parse::<SeekTarget>().unwrap(),
            SeekTarget::Marker(MarkerRef::Next)
        );
        assert_eq!("marker:3".parse::<SeekTarget>().unwrap(), SeekTarget::Marker(MarkerRef::Index(3)));
        assert_eq!("1:30".parse::<SeekTarget>().unwrap(), SeekTarget::Time(90.0));
        assert!("marker:last".parse::<SeekTarget>().is_err());
        assert!("soon".parse::<SeekTarget>().is_err());
    }

    #[test]
    fn npt_formats() {
        assert_eq!(parse_npt("42").unwrap(), 42.0);
        assert_eq!(parse_npt("2.5").unwrap(), 2.5);
        assert_eq!(parse_npt("1:02:03").unwrap(), 3723.0);
        assert!(parse_npt("1:2:3:4").is_err());
        assert!(parse_npt("-1").is_err());
    }
}
