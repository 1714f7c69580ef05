use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::Serialize;

static GRANULE_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^ECOSTRESS_L2_CLOUD_(?P<orbit>\d{5})_(?P<scene>\d{3})_",
        r"(?P<year>\d{4})(?P<month>\d{2})(?P<day>\d{2})T(?P<hour>\d{2})(?P<minute>\d{2})(?P<second>\d{2})_",
        r"(?P<build>\d{4})_(?P<version>\d{2})\.h5$"
    ))
    .unwrap()
});

/// Fields encoded in an L2 cloud granule filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Granule {
    pub orbit: String,
    pub scene: String,
    pub acquired: NaiveDateTime,
    pub build: String,
    pub version: String,
}

impl Granule {
    /// Returns `None` for anything that is not a conforming granule name,
    /// including names whose digits do not form a real calendar date.
    pub fn parse(name: &str) -> Option<Self> {
        let captures = GRANULE_NAME_REGEX.captures(name)?;
        let field = |key: &str| captures[key].parse::<u32>().ok();

        let year = captures["year"].parse::<i32>().ok()?;
        let acquired = NaiveDate::from_ymd_opt(year, field("month")?, field("day")?)?
            .and_hms_opt(field("hour")?, field("minute")?, field("second")?)?;

        Some(Self {
            orbit: captures["orbit"].to_string(),
            scene: captures["scene"].to_string(),
            acquired,
            build: captures["build"].to_string(),
            version: captures["version"].to_string(),
        })
    }
}

pub fn parse_acquisition_time(name: &str) -> Option<NaiveDateTime> {
    Granule::parse(name).map(|granule| granule.acquired)
}
