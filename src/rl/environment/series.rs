//! Return Series
//!
//! Immutable table of per-asset simple returns indexed by date, exchanged as
//! CSV: a header row, a date column, then one column per risky asset.

use std::path::Path;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use ndarray::{Array2, ArrayView1};
use tracing::debug;

use crate::error::{Result, TradelabError};

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnSeries {
    dates: Vec<String>,
    assets: Vec<String>,
    returns: Array2<f64>,
}

impl ReturnSeries {
    /// Build a series, checking the shape of the return matrix
    pub fn new(dates: Vec<String>, assets: Vec<String>, returns: Array2<f64>) -> Result<Self> {
        TradelabError::check_len("return rows", dates.len(), returns.nrows())?;
        TradelabError::check_len("return columns", assets.len(), returns.ncols())?;
        if assets.is_empty() {
            return Err(TradelabError::InvalidMarketData(
                "return series has no asset columns".to_string(),
            ));
        }
        if let Some(((row, col), value)) = returns.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(TradelabError::InvalidMarketData(format!(
                "non-finite return {value} at row {row}, column {col}"
            )));
        }
        Ok(Self {
            dates,
            assets,
            returns,
        })
    }

    /// Series indexed by step number instead of dates
    pub fn from_matrix(assets: Vec<String>, returns: Array2<f64>) -> Result<Self> {
        let dates = (0..returns.nrows()).map(|i| i.to_string()).collect();
        Self::new(dates, assets, returns)
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[String] {
        &self.dates
    }

    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    pub fn returns(&self) -> &Array2<f64> {
        &self.returns
    }

    /// Relabel the rows with consecutive weekdays starting at `start`
    pub fn with_business_dates(mut self, start: NaiveDate) -> Self {
        let mut day = start;
        for date in self.dates.iter_mut() {
            while matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
                day += Duration::days(1);
            }
            *date = day.format("%Y-%m-%d").to_string();
            day += Duration::days(1);
        }
        self
    }

    pub fn row(&self, index: usize) -> Option<ArrayView1<'_, f64>> {
        (index < self.len()).then(|| self.returns.row(index))
    }

    /// Load a series from CSV
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = csv::Reader::from_path(path)?;
        let series = Self::from_reader(reader)?;
        debug!(
            path = %path.display(),
            rows = series.len(),
            assets = series.assets.len(),
            "Loaded return series"
        );
        Ok(series)
    }

    /// Parse a series from any CSV source
    pub fn from_reader<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Self> {
        let assets: Vec<String> = reader.headers()?.iter().skip(1).map(String::from).collect();

        let mut dates = Vec::new();
        let mut values = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record?;
            TradelabError::check_len("csv fields", assets.len() + 1, record.len())?;
            dates.push(record[0].to_string());
            for field in record.iter().skip(1) {
                let value: f64 = field.trim().parse().map_err(|_| {
                    TradelabError::InvalidMarketData(format!(
                        "row {}: cannot parse return {field:?}",
                        line + 1
                    ))
                })?;
                values.push(value);
            }
        }

        let returns = Array2::from_shape_vec((dates.len(), assets.len()), values)
            .map_err(|e| TradelabError::InvalidMarketData(e.to_string()))?;
        Self::new(dates, assets, returns)
    }

    /// Write the series as CSV with `index_label` heading the date column
    pub fn to_csv<P: AsRef<Path>>(&self, path: P, index_label: &str) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;

        let mut header = vec![index_label.to_string()];
        header.extend(self.assets.iter().cloned());
        writer.write_record(&header)?;

        for (date, row) in self.dates.iter().zip(self.returns.rows()) {
            let mut record = vec![date.clone()];
            record.extend(row.iter().map(|r| r.to_string()));
            writer.write_record(&record)?;
        }

        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    const SAMPLE: &str = "Date,SPY,TLT\n\
                          2016-01-04,0.01,-0.002\n\
                          2016-01-05,-0.005,0.003\n\
                          2016-01-06,0.002,0.0\n";

    #[test]
    fn test_parse_csv() {
        let reader = csv::Reader::from_reader(SAMPLE.as_bytes());
        let series = ReturnSeries::from_reader(reader).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.assets(), &["SPY".to_string(), "TLT".to_string()]);
        assert_eq!(series.dates()[1], "2016-01-05");
        assert_eq!(series.row(0).unwrap(), array![0.01, -0.002].view());
        assert!(series.row(3).is_none());
    }

    #[test]
    fn test_rejects_bad_values() {
        let bad = "Date,SPY\n2016-01-04,abc\n";
        let err = ReturnSeries::from_reader(csv::Reader::from_reader(bad.as_bytes())).unwrap_err();
        assert!(matches!(err, TradelabError::InvalidMarketData(_)));

        let nan = "Date,SPY\n2016-01-04,NaN\n";
        assert!(ReturnSeries::from_reader(csv::Reader::from_reader(nan.as_bytes())).is_err());
    }

    #[test]
    fn test_shape_checks() {
        assert!(ReturnSeries::from_matrix(vec!["A".into()], array![[0.1, 0.2]]).is_err());
        assert!(ReturnSeries::from_matrix(vec![], Array2::zeros((2, 0))).is_err());

        let series = ReturnSeries::from_matrix(vec!["A".into()], array![[0.1], [0.2]]).unwrap();
        assert_eq!(series.dates(), &["0".to_string(), "1".to_string()]);
    }

    #[test]
    fn test_business_dates_skip_weekends() {
        let series = ReturnSeries::from_matrix(vec!["A".into()], array![[0.1], [0.2], [0.3]])
            .unwrap()
            // a Friday
            .with_business_dates(NaiveDate::from_ymd_opt(2016, 1, 8).unwrap());
        assert_eq!(series.dates(), &["2016-01-08", "2016-01-11", "2016-01-12"]);
    }
}
