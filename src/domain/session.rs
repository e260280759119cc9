//! Session naming and output layout
//!
//! A session is identified by `{platform}-{domain}-{timestamp}` and owns one
//! products file and one variants file inside its own directory:
//!
//! ```text
//! <output_root>/<session>/Product-<session>.csv
//! <output_root>/<session>/Variant-<session>.csv
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};

use super::platform::PlatformKey;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d--%H-%M-%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub platform: PlatformKey,
    pub domain: String,
    pub timestamp: String,
    pub directory: PathBuf,
    pub products_path: PathBuf,
    pub variants_path: PathBuf,
}

impl Session {
    pub fn new<Tz>(output_root: &Path, platform: PlatformKey, domain: &str, started_at: &DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let timestamp = started_at.format(TIMESTAMP_FORMAT).to_string();
        let name = format!("{}-{}-{}", platform.as_str(), domain, timestamp);
        let directory = output_root.join(&name);

        Self {
            platform,
            domain: domain.to_string(),
            timestamp,
            products_path: directory.join(format!("Product-{name}.csv")),
            variants_path: directory.join(format!("Variant-{name}.csv")),
            directory,
        }
    }

    #[must_use]
    pub fn name(&self) -> String {
        format!("{}-{}-{}", self.platform.as_str(), self.domain, self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    #[test]
    fn test_session_layout() {
        let started = NaiveDate::from_ymd_opt(2025, 3, 9)
            .and_then(|d| d.and_hms_opt(14, 5, 7))
            .map(|naive| Utc.from_utc_datetime(&naive));
        let Some(started) = started else {
            panic!("valid timestamp");
        };

        let session = Session::new(Path::new("results"), PlatformKey::Amazon, "www.amazon.in", &started);

        assert_eq!(session.name(), "amazon-www.amazon.in-2025-03-09--14-05-07");
        assert_eq!(
            session.products_path,
            Path::new("results/amazon-www.amazon.in-2025-03-09--14-05-07/Product-amazon-www.amazon.in-2025-03-09--14-05-07.csv")
        );
        assert_eq!(
            session.variants_path.file_name().and_then(|n| n.to_str()),
            Some("Variant-amazon-www.amazon.in-2025-03-09--14-05-07.csv")
        );
    }
}
