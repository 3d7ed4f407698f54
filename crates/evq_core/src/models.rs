use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of the station document created when none is specified.
pub const DEFAULT_STATION_ID: &str = "1";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Waiting,
    Charging,
    Completed,
}

/// A parking spot's claim on the charger.
///
/// The aliases accept documents written with the older field names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChargingRequest {
    #[serde(alias = "parkingSpotId")]
    pub spot_id: String,
    pub status: RequestStatus,
    #[serde(alias = "requestedChargingTime")]
    pub requested_minutes: f64,
    /// 1-based rank in the waiting queue, 0 once the request left it.
    #[serde(default)]
    pub queue_position: u32,
    #[serde(
        default,
        alias = "remainingTime",
        skip_serializing_if = "Option::is_none"
    )]
    pub remaining_minutes: Option<f64>,
    #[serde(
        default,
        alias = "totalWaitingTime",
        skip_serializing_if = "Option::is_none"
    )]
    pub total_wait_minutes: Option<f64>,
    #[serde(alias = "timestamp", default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl ChargingRequest {
    pub(crate) fn charging(spot_id: &str, requested_minutes: f64, created_at: DateTime<Utc>) -> Self {
        ChargingRequest {
            spot_id: spot_id.to_string(),
            status: RequestStatus::Charging,
            requested_minutes,
            queue_position: 0,
            remaining_minutes: Some(requested_minutes),
            total_wait_minutes: None,
            created_at,
        }
    }

    pub(crate) fn waiting(spot_id: &str, requested_minutes: f64, created_at: DateTime<Utc>) -> Self {
        ChargingRequest {
            spot_id: spot_id.to_string(),
            status: RequestStatus::Waiting,
            requested_minutes,
            queue_position: 0,
            remaining_minutes: None,
            total_wait_minutes: None,
            created_at,
        }
    }

    /// Minutes this request still holds the charger for.
    ///
    /// A charging request that was never ticked counts its full duration,
    /// a completed one counts nothing.
    pub fn occupied_minutes(&self) -> f64 {
        match self.status {
            RequestStatus::Completed => 0.0,
            _ => self.remaining_minutes.unwrap_or(self.requested_minutes),
        }
    }

    /// Turn a waiting request into the active one with its full duration.
    pub(crate) fn start_charging(&mut self) {
        self.status = RequestStatus::Charging;
        self.remaining_minutes = Some(self.requested_minutes);
        self.total_wait_minutes = None;
        self.queue_position = 0;
    }
}

/// The shared station document: one charger, one FIFO queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    #[serde(default, alias = "_id")]
    pub id: String,
    #[serde(default, alias = "currentRequest")]
    pub active_request: Option<ChargingRequest>,
    #[serde(default)]
    pub queue: Vec<ChargingRequest>,
    #[serde(default = "default_available")]
    pub is_available: bool,
}

fn default_available() -> bool {
    true
}

impl Station {
    pub fn new(id: impl Into<String>) -> Self {
        Station {
            id: id.into(),
            active_request: None,
            queue: Vec::new(),
            is_available: true,
        }
    }

    /// True if the spot is the active request or anywhere in the queue.
    pub fn contains_spot(&self, spot_id: &str) -> bool {
        self.find(spot_id).is_some()
    }

    pub fn find(&self, spot_id: &str) -> Option<&ChargingRequest> {
        self.active_request
            .iter()
            .chain(self.queue.iter())
            .find(|request| request.spot_id == spot_id)
    }

    /// Renumber the queue and recompute every projected wait.
    ///
    /// A request waits for whatever the active request still occupies plus
    /// the full duration of everything ahead of it.
    pub(crate) fn refresh_queue(&mut self) {
        let mut ahead = self
            .active_request
            .as_ref()
            .map_or(0.0, ChargingRequest::occupied_minutes);
        for (idx, request) in self.queue.iter_mut().enumerate() {
            request.queue_position = idx as u32 + 1;
            request.total_wait_minutes = Some(ahead);
            ahead += request.requested_minutes;
        }
        self.is_available = self.active_request.is_none();
    }

    /// Repair a document that was written from outside the simulator.
    ///
    /// Queue entries become `waiting`, the active request keeps at most its
    /// requested duration, positions and waits are recomputed and
    /// `is_available` is derived from the active slot again.
    pub fn normalize(&mut self) {
        if let Some(active) = self.active_request.as_mut() {
            match active.status {
                RequestStatus::Waiting => active.start_charging(),
                RequestStatus::Charging => {
                    let remaining = active
                        .remaining_minutes
                        .unwrap_or(active.requested_minutes)
                        .clamp(0.0, active.requested_minutes);
                    active.remaining_minutes = Some(remaining);
                }
                RequestStatus::Completed => active.remaining_minutes = Some(0.0),
            }
            active.total_wait_minutes = None;
            active.queue_position = 0;
        }
        for request in self.queue.iter_mut() {
            request.status = RequestStatus::Waiting;
            request.remaining_minutes = None;
        }
        self.refresh_queue();
    }
}

/// Loosely shaped request record kept next to the station documents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RequestRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

impl RequestRecord {
    /// Assign a fresh UUID if the caller did not provide an id.
    pub fn with_generated_id(mut self) -> Self {
        if self.id.is_empty() {
            self.id = uuid::Uuid::new_v4().to_string();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_station_deserializes_legacy_document() {
        let json = r#"
        {
          "_id": "1",
          "currentRequest": {
            "parkingSpotId": "A001",
            "status": "charging",
            "requestedChargingTime": 30,
            "remainingTime": 12.5,
            "queuePosition": 0,
            "timestamp": "2024-05-01T08:00:00.000Z"
          },
          "queue": [
            {
              "parkingSpotId": "B002",
              "status": "waiting",
              "requestedChargingTime": 15,
              "queuePosition": 1,
              "totalWaitingTime": 12.5,
              "timestamp": "2024-05-01T08:03:00.000Z"
            }
          ],
          "isAvailable": false
        }
        "#;

        let station: Station = serde_json::from_str(json).unwrap();
        assert_eq!(station.id, "1");
        let active = station.active_request.as_ref().unwrap();
        assert_eq!(active.spot_id, "A001");
        assert_eq!(active.remaining_minutes, Some(12.5));
        assert_eq!(station.queue[0].spot_id, "B002");
        assert_eq!(station.queue[0].total_wait_minutes, Some(12.5));
        assert!(!station.is_available);
    }

    #[test]
    fn test_station_serializes_camel_case() {
        let station = Station::new(DEFAULT_STATION_ID);
        let value = serde_json::to_value(&station).unwrap();
        assert_eq!(value["id"], "1");
        assert_eq!(value["isAvailable"], true);
        assert!(value["activeRequest"].is_null());
        assert!(value["queue"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_normalize_repairs_external_document() {
        let now = Utc::now();
        let mut active = ChargingRequest::waiting("A001", 20.0, now);
        active.queue_position = 4;
        let mut queued = ChargingRequest::charging("B001", 10.0, now);
        queued.queue_position = 7;
        let mut station = Station {
            id: "1".into(),
            active_request: Some(active),
            queue: vec![queued, ChargingRequest::waiting("C001", 5.0, now)],
            is_available: true,
        };

        station.normalize();

        let active = station.active_request.as_ref().unwrap();
        assert_eq!(active.status, RequestStatus::Charging);
        assert_eq!(active.remaining_minutes, Some(20.0));
        assert_eq!(active.queue_position, 0);
        assert!(!station.is_available);

        assert_eq!(station.queue[0].status, RequestStatus::Waiting);
        assert_eq!(station.queue[0].remaining_minutes, None);
        assert_eq!(station.queue[0].queue_position, 1);
        assert_eq!(station.queue[0].total_wait_minutes, Some(20.0));
        assert_eq!(station.queue[1].queue_position, 2);
        assert_eq!(station.queue[1].total_wait_minutes, Some(30.0));
    }

    #[test]
    fn test_request_record_generates_missing_id() {
        let record = RequestRecord::default().with_generated_id();
        assert!(uuid::Uuid::parse_str(&record.id).is_ok());

        let record = RequestRecord {
            id: "fixed".into(),
            ..Default::default()
        }
        .with_generated_id();
        assert_eq!(record.id, "fixed");
    }
}
