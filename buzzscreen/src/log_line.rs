//! The structured lines downstream pipelines reconstruct the funnels from.
//!
//! Each line is a [`slog::KV`] logged on the event logger,
//! optional fields are left out instead of written as `null`.
use chrono::{DateTime, Utc};
use primitives::{util::logging::line_type, Payload, ResourceType};
use serde::Serialize;
use slog::{Key, Record, SerdeValue, Serializer, Value, KV};

/// A click or an impression of a campaign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngagementLine {
    pub line_type: &'static str,
    pub device_id: i64,
    pub unit_id: i64,
    pub ifa: String,
    pub campaign_id: i64,
    pub ip: i64,
    pub unit_device_token: String,
    pub session_id: String,
    pub model_artifact: String,
    pub position: String,
    pub place: Option<String>,
    pub country: String,
    pub sex: Option<String>,
    pub year_of_birth: Option<i32>,
    /// Only set for impressions
    pub count: Option<i64>,
}

impl EngagementLine {
    /// A click with the country of the unit, see [`EngagementLine::with_payload`].
    pub fn click(device_id: i64, unit_id: i64, campaign_id: i64, country: &str) -> Self {
        Self {
            line_type: line_type::CLICK,
            device_id,
            unit_id,
            ifa: String::new(),
            campaign_id,
            ip: 0,
            unit_device_token: String::new(),
            session_id: String::new(),
            model_artifact: String::new(),
            position: String::new(),
            place: None,
            country: country.to_string(),
            sex: None,
            year_of_birth: None,
            count: None,
        }
    }

    pub fn impression(device_id: i64, unit_id: i64, campaign_id: i64, country: &str) -> Self {
        Self {
            line_type: line_type::IMPRESSION,
            count: Some(1),
            ..Self::click(device_id, unit_id, campaign_id, country)
        }
    }

    /// The payload country, when set, wins over the unit country and the
    /// demographics are taken from the payload.
    pub fn with_payload(mut self, payload: &Payload) -> Self {
        if !payload.country.is_empty() {
            self.country = payload.country.clone();
        }
        self.sex = payload.gender.clone();
        self.year_of_birth = payload.year_of_birth;

        self
    }
}

impl KV for EngagementLine {
    fn serialize(&self, _record: &Record<'_>, serializer: &mut dyn Serializer) -> slog::Result {
        serializer.emit_str("type", self.line_type)?;
        serializer.emit_i64("device_id", self.device_id)?;
        serializer.emit_i64("unit_id", self.unit_id)?;
        serializer.emit_str("ifa", &self.ifa)?;
        serializer.emit_i64("campaign_id", self.campaign_id)?;
        serializer.emit_i64("ip", self.ip)?;
        serializer.emit_str("unit_device_token", &self.unit_device_token)?;
        serializer.emit_str("session_id", &self.session_id)?;
        serializer.emit_str("model_artifact", &self.model_artifact)?;
        serializer.emit_str("position", &self.position)?;
        if let Some(place) = &self.place {
            serializer.emit_str("place", place)?;
        }
        serializer.emit_str("country", &self.country)?;
        if let Some(sex) = &self.sex {
            serializer.emit_str("sex", sex)?;
        }
        if let Some(year_of_birth) = self.year_of_birth {
            serializer.emit_i32("year_of_birth", year_of_birth)?;
        }
        if let Some(count) = self.count {
            serializer.emit_i64("count", count)?;
        }

        Ok(())
    }
}

/// Written whenever the identity cookies were (re)set.
///
/// The fields are nested under `payload`:
/// `{"type": "profile", "payload": {"cookie_id", "ifa", "user_agent"}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileLine {
    pub cookie_id: String,
    pub ifa: String,
    pub user_agent: String,
}

impl KV for ProfileLine {
    fn serialize(&self, _record: &Record<'_>, serializer: &mut dyn Serializer) -> slog::Result {
        serializer.emit_str("type", line_type::PROFILE)?;
        serializer.emit_serde("payload", self)
    }
}

impl Value for ProfileLine {
    fn serialize(
        &self,
        _record: &Record<'_>,
        key: Key,
        serializer: &mut dyn Serializer,
    ) -> slog::Result {
        serializer.emit_serde(key, self)
    }
}

impl SerdeValue for ProfileLine {
    fn as_serde(&self) -> &dyn erased_serde::Serialize {
        self
    }

    fn to_sendable(&self) -> Box<dyn SerdeValue + Send + 'static> {
        Box::new(self.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingUrlMethod {
    Save,
    Get,
}

/// Written on every save and every lookup of a tracking URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingUrlLine {
    pub method: TrackingUrlMethod,
    pub device_id: i64,
    pub resource_id: i64,
    pub resource_type: ResourceType,
    pub tracking_url: String,
    pub event_at: DateTime<Utc>,
}

impl KV for TrackingUrlLine {
    fn serialize(&self, _record: &Record<'_>, serializer: &mut dyn Serializer) -> slog::Result {
        let method = match self.method {
            TrackingUrlMethod::Save => "save",
            TrackingUrlMethod::Get => "get",
        };

        serializer.emit_str("type", line_type::TRACKING_URL_ACTIVITY)?;
        serializer.emit_str("method", method)?;
        serializer.emit_i64("device_id", self.device_id)?;
        serializer.emit_i64("resource_id", self.resource_id)?;
        serializer.emit_str("resource_type", &self.resource_type.to_string())?;
        serializer.emit_str("tracking_url", &self.tracking_url)?;
        serializer.emit_i64("event_at", self.event_at.timestamp())
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use primitives::test_util::{memory_event_logger, DUMMY_PAYLOAD, NOW};
    use serde_json::json;
    use slog::info;

    use super::*;

    #[test]
    fn click_line_fields() {
        let (logger, buffer) = memory_event_logger();

        let mut line = EngagementLine::click(7, 200, 2000, "JP").with_payload(&DUMMY_PAYLOAD);
        line.ip = 2_130_706_433;
        line.ifa = "ifa-0001".into();

        info!(&logger, "click"; line);

        let lines = buffer.json_lines();
        assert_eq!(1, lines.len());
        let line = &lines[0];
        assert_eq!(json!("click"), line["type"]);
        assert_eq!(json!("click"), line["msg"]);
        assert_eq!(json!(2_130_706_433_i64), line["ip"]);
        // the payload country wins
        assert_eq!(json!("KR"), line["country"]);
        assert_eq!(json!("F"), line["sex"]);
        assert_eq!(json!(1990), line["year_of_birth"]);
        assert_eq!(None, line.get("count"));
        assert_eq!(None, line.get("place"));
    }

    #[test]
    fn impression_line_without_demographics() {
        let (logger, buffer) = memory_event_logger();

        let payload = Payload {
            country: String::new(),
            gender: None,
            year_of_birth: None,
            ..DUMMY_PAYLOAD.clone()
        };
        let line = EngagementLine::impression(7, 200, 2000, "JP").with_payload(&payload);

        info!(&logger, "impression"; line);

        let line = &buffer.json_lines()[0];
        assert_eq!(json!("impression"), line["type"]);
        assert_eq!(json!("JP"), line["country"]);
        assert_eq!(json!(1), line["count"]);
        assert_eq!(None, line.get("sex"));
        assert_eq!(None, line.get("year_of_birth"));
    }

    #[test]
    fn tracking_url_line_fields() {
        let (logger, buffer) = memory_event_logger();

        let line = TrackingUrlLine {
            method: TrackingUrlMethod::Save,
            device_id: 7,
            resource_id: 42,
            resource_type: ResourceType::Ad,
            tracking_url: "http://buzzad.internal/track".into(),
            event_at: *NOW,
        };
        info!(&logger, "tracking url"; line);

        let line = &buffer.json_lines()[0];
        assert_eq!(json!("tracking_url_activity"), line["type"]);
        assert_eq!(json!("save"), line["method"]);
        assert_eq!(json!("ad"), line["resource_type"]);
        assert_eq!(json!(NOW.timestamp()), line["event_at"]);
    }
}
