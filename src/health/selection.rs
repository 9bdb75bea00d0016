//! Picking proxies for outbound configuration
//!
//! Only records whose derived status is online qualify; a stale `online` is
//! never served.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::models::ProxyRecord;

/// Derived-online records, optionally restricted to one country
pub fn online_records<'a>(
    records: &'a [ProxyRecord],
    country: Option<&str>,
    now: DateTime<Utc>,
) -> Vec<&'a ProxyRecord> {
    records
        .iter()
        .filter(|r| r.is_online(now))
        .filter(|r| match country {
            Some(c) => r.country.as_deref() == Some(c),
            None => true,
        })
        .collect()
}

/// `count` random picks (with replacement) from the qualifying records.
///
/// Empty when nothing qualifies.
pub fn pick_online<R: Rng + ?Sized>(
    records: &[ProxyRecord],
    country: Option<&str>,
    count: usize,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Vec<ProxyRecord> {
    let pool = online_records(records, country, now);
    if pool.is_empty() {
        return Vec::new();
    }

    (0..count)
        .filter_map(|_| pool.choose(rng).map(|r| (*r).clone()))
        .collect()
}

/// Sorted distinct non-empty country codes
pub fn countries(records: &[ProxyRecord]) -> Vec<String> {
    let mut codes: Vec<String> = records
        .iter()
        .filter_map(|r| r.country.as_deref())
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();
    codes.sort();
    codes.dedup();
    codes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProxyStatus;
    use chrono::TimeDelta;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn record(ip: &str, country: &str, status: ProxyStatus, ago_minutes: i64) -> ProxyRecord {
        let mut record = ProxyRecord::new(ip, "443", Some(country.to_string()), None);
        record.status = status;
        record.last_checked = Some(Utc::now() - TimeDelta::minutes(ago_minutes));
        record
    }

    fn sample() -> Vec<ProxyRecord> {
        vec![
            record("1.1.1.1", "US", ProxyStatus::Online, 1),
            record("2.2.2.2", "US", ProxyStatus::Online, 30),
            record("3.3.3.3", "SG", ProxyStatus::Online, 2),
            record("4.4.4.4", "SG", ProxyStatus::Offline, 2),
            record("5.5.5.5", "JP", ProxyStatus::Testing, 2),
        ]
    }

    #[test]
    fn test_online_records_skip_stale_and_offline() {
        let records = sample();
        let now = Utc::now();

        let ips: Vec<&str> = online_records(&records, None, now)
            .iter()
            .map(|r| r.proxy_ip.as_str())
            .collect();
        assert_eq!(ips, vec!["1.1.1.1", "3.3.3.3"]);

        let sg = online_records(&records, Some("SG"), now);
        assert_eq!(sg.len(), 1);
        assert_eq!(sg[0].proxy_ip, "3.3.3.3");
    }

    #[test]
    fn test_pick_online_draws_only_qualifying_records() {
        let records = sample();
        let mut rng = StdRng::seed_from_u64(7);

        let picks = pick_online(&records, None, 10, Utc::now(), &mut rng);
        assert_eq!(picks.len(), 10);
        assert!(picks
            .iter()
            .all(|r| r.proxy_ip == "1.1.1.1" || r.proxy_ip == "3.3.3.3"));
    }

    #[test]
    fn test_pick_online_nothing_qualifies() {
        let records = sample();
        let mut rng = StdRng::seed_from_u64(7);
        assert!(pick_online(&records, Some("JP"), 3, Utc::now(), &mut rng).is_empty());
    }

    #[test]
    fn test_countries_sorted_and_distinct() {
        let mut records = sample();
        records.push(ProxyRecord::new("6.6.6.6", "80", None, None));
        assert_eq!(countries(&records), vec!["JP", "SG", "US"]);
    }
}
