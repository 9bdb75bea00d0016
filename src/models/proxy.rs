use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::health::staleness;

/// Last known health of a proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProxyStatus {
    #[default]
    Unknown,
    /// In flight during a health check cycle; never a resting state
    Testing,
    Online,
    Offline,
}

impl ProxyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyStatus::Unknown => "unknown",
            ProxyStatus::Testing => "testing",
            ProxyStatus::Online => "online",
            ProxyStatus::Offline => "offline",
        }
    }
}

impl std::fmt::Display for ProxyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One proxy endpoint in the authoritative collection
///
/// Serialized with the field names the persisted list and the web UI share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRecord {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    #[serde(rename = "proxyIP")]
    pub proxy_ip: String,
    pub proxy_port: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub org: Option<String>,
    #[serde(default)]
    pub status: ProxyStatus,
    /// Milliseconds; 0 when unknown or failed
    #[serde(default, deserialize_with = "latency_from_number")]
    pub latency: u64,
    #[serde(default)]
    pub last_checked: Option<DateTime<Utc>>,
}

/// Whole milliseconds; negative and non-finite values become 0
pub fn round_latency(ms: f64) -> u64 {
    if ms.is_finite() && ms > 0.0 {
        ms.round() as u64
    } else {
        0
    }
}

// Clients may send numeric ids
fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

fn latency_from_number<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let latency = Option::<serde_json::Number>::deserialize(deserializer)?;
    Ok(latency
        .map(|n| match n.as_u64() {
            Some(whole) => whole,
            None => round_latency(n.as_f64().unwrap_or(0.0)),
        })
        .unwrap_or(0))
}

impl ProxyRecord {
    /// Fresh record as produced by an import
    pub fn new(
        proxy_ip: impl Into<String>,
        proxy_port: impl Into<String>,
        country: Option<String>,
        org: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            proxy_ip: proxy_ip.into(),
            proxy_port: proxy_port.into(),
            country,
            org,
            status: ProxyStatus::Unknown,
            latency: 0,
            last_checked: None,
        }
    }

    /// `ip:port`, the key probe results are matched on
    pub fn address(&self) -> String {
        format!("{}:{}", self.proxy_ip, self.proxy_port)
    }

    pub fn has_address(&self, address: &str) -> bool {
        address
            .rsplit_once(':')
            .map(|(ip, port)| ip == self.proxy_ip && port == self.proxy_port)
            .unwrap_or(false)
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        staleness::is_fresh(self.last_checked, now, staleness::STALENESS_TTL)
    }

    /// Status consumers must act on; see [`staleness::derived_status`]
    pub fn derived_status(&self, now: DateTime<Utc>) -> ProxyStatus {
        staleness::derived_status(self.status, self.last_checked, now)
    }

    pub fn is_online(&self, now: DateTime<Utc>) -> bool {
        self.derived_status(now) == ProxyStatus::Online
    }
}

/// Normalized result of probing one address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub address: String,
    pub success: bool,
    pub latency_ms: u64,
}

impl ProbeOutcome {
    pub fn online(address: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            address: address.into(),
            success: true,
            latency_ms,
        }
    }

    /// Failures always carry zero latency
    pub fn offline(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            success: false,
            latency_ms: 0,
        }
    }

    pub fn status(&self) -> ProxyStatus {
        if self.success {
            ProxyStatus::Online
        } else {
            ProxyStatus::Offline
        }
    }
}

/// Query parameters for listing proxies
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProxyListParams {
    pub country: Option<String>,
    /// `online` or `offline`; anything else is ignored
    pub status: Option<String>,
}

impl ProxyListParams {
    /// `offline` includes every stale record, whatever its stored status.
    pub fn matches(&self, record: &ProxyRecord, now: DateTime<Utc>) -> bool {
        if let Some(country) = self.country.as_deref().filter(|c| !c.is_empty()) {
            if record.country.as_deref() != Some(country) {
                return false;
            }
        }

        match self.status.as_deref() {
            Some("online") => record.is_online(now),
            Some("offline") => record.status == ProxyStatus::Offline || !record.is_fresh(now),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn checked(status: ProxyStatus, ago: TimeDelta, now: DateTime<Utc>) -> ProxyRecord {
        let mut record = ProxyRecord::new("1.2.3.4", "443", Some("SG".to_string()), None);
        record.status = status;
        record.latency = 42;
        record.last_checked = Some(now - ago);
        record
    }

    #[test]
    fn test_proxy_status_wire_names() {
        let status: ProxyStatus = serde_json::from_str(r#""testing""#).unwrap();
        assert_eq!(status, ProxyStatus::Testing);
        assert!(serde_json::from_str::<ProxyStatus>(r#""idle""#).is_err());
        assert_eq!(ProxyStatus::Offline.to_string(), "offline");
    }

    #[test]
    fn test_record_wire_format() {
        let json = r#"{
            "id": "abc",
            "proxyIP": "1.2.3.4",
            "proxyPort": "443",
            "country": "US",
            "org": null,
            "status": "online",
            "latency": 42,
            "lastChecked": "2024-05-01T10:00:00Z"
        }"#;

        let record: ProxyRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "abc");
        assert_eq!(record.address(), "1.2.3.4:443");
        assert_eq!(record.status, ProxyStatus::Online);
        assert!(record.last_checked.is_some());

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["proxyIP"], "1.2.3.4");
        assert_eq!(value["proxyPort"], "443");
        assert_eq!(value["lastChecked"], "2024-05-01T10:00:00Z");
    }

    #[test]
    fn test_record_missing_optional_fields_default() {
        let json = r#"{"id": "x", "proxyIP": "5.6.7.8", "proxyPort": "80"}"#;
        let record: ProxyRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.status, ProxyStatus::Unknown);
        assert_eq!(record.latency, 0);
        assert!(record.last_checked.is_none());
        assert!(record.country.is_none());
    }

    #[test]
    fn test_record_accepts_numeric_id_and_fractional_latency() {
        let json = r#"{"id": 7, "proxyIP": "5.6.7.8", "proxyPort": "80", "latency": 41.6}"#;
        let record: ProxyRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "7");
        assert_eq!(record.latency, 42);

        let json = r#"{"id": "y", "proxyIP": "5.6.7.8", "proxyPort": "80", "latency": -3.2}"#;
        let record: ProxyRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.latency, 0);

        let json = r#"{"id": "z", "proxyIP": "5.6.7.8", "proxyPort": "80", "latency": null}"#;
        let record: ProxyRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.latency, 0);

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["latency"], 0);
    }

    #[test]
    fn test_new_record_is_unknown_and_unique() {
        let a = ProxyRecord::new("1.1.1.1", "80", None, None);
        let b = ProxyRecord::new("1.1.1.1", "80", None, None);
        assert_ne!(a.id, b.id);
        assert_eq!(a.status, ProxyStatus::Unknown);
        assert_eq!(a.derived_status(Utc::now()), ProxyStatus::Unknown);
    }

    #[test]
    fn test_has_address() {
        let record = ProxyRecord::new("1.2.3.4", "443", None, None);
        assert!(record.has_address("1.2.3.4:443"));
        assert!(!record.has_address("1.2.3.4:80"));
        assert!(!record.has_address("1.2.3.4"));
    }

    #[test]
    fn test_stale_online_record_is_not_online() {
        let now = Utc::now();
        assert!(checked(ProxyStatus::Online, TimeDelta::minutes(2), now).is_online(now));
        assert!(!checked(ProxyStatus::Online, TimeDelta::minutes(15), now).is_online(now));
    }

    #[test]
    fn test_list_params_filtering() {
        let now = Utc::now();
        let fresh_online = checked(ProxyStatus::Online, TimeDelta::minutes(1), now);
        let stale_online = checked(ProxyStatus::Online, TimeDelta::minutes(30), now);
        let fresh_offline = checked(ProxyStatus::Offline, TimeDelta::minutes(1), now);

        let online = ProxyListParams {
            country: None,
            status: Some("online".to_string()),
        };
        assert!(online.matches(&fresh_online, now));
        assert!(!online.matches(&stale_online, now));
        assert!(!online.matches(&fresh_offline, now));

        let offline = ProxyListParams {
            country: None,
            status: Some("offline".to_string()),
        };
        assert!(!offline.matches(&fresh_online, now));
        assert!(offline.matches(&stale_online, now));
        assert!(offline.matches(&fresh_offline, now));

        let by_country = ProxyListParams {
            country: Some("JP".to_string()),
            status: None,
        };
        assert!(!by_country.matches(&fresh_online, now));
        assert!(ProxyListParams::default().matches(&fresh_online, now));
    }
}
