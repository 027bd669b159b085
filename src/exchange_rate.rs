use chrono::NaiveDate;
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatePoint {
    pub date: NaiveDate,
    pub rate: f64,
}

/// Rates in ascending date order, serialized as `{"YYYY-MM-DD": rate, ...}`
/// with keys in the same order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RateSeries(pub Vec<RatePoint>);

impl Serialize for RateSeries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for point in &self.0 {
            map.serialize_entry(&point.date.format(DATE_FORMAT).to_string(), &point.rate)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_series_keeps_date_order_in_json() {
        let series = RateSeries(vec![
            RatePoint { date: date(2023, 8, 1), rate: 23.951 },
            RatePoint { date: date(2023, 8, 2), rate: 23.929 },
            RatePoint { date: date(2023, 8, 3), rate: 24.034 },
        ]);

        let json = serde_json::to_string(&series).unwrap();
        assert_eq!(
            json,
            r#"{"2023-08-01":23.951,"2023-08-02":23.929,"2023-08-03":24.034}"#
        );
    }

    #[test]
    fn test_empty_series_is_empty_object() {
        let json = serde_json::to_string(&RateSeries::default()).unwrap();
        assert_eq!(json, "{}");
    }
}
