use chrono::{DateTime, Utc};

use crate::{ChargingRequest, QueueError, RequestStatus, Station};

pub const MIN_REQUESTED_MINUTES: f64 = 1.0;
pub const MAX_REQUESTED_MINUTES: f64 = 120.0;

/// One simulated second, the step the ticker uses by default.
pub const SIMULATED_SECOND: f64 = 1.0 / 60.0;

/// Remaining time below this counts as finished.
const EPSILON: f64 = 1e-9;

/// What happened during a single [`tick_with_outcome`] step.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub station: Station,
    /// The active request that ran out of time, with status `completed`.
    pub completed: Option<ChargingRequest>,
    /// The queue head that took over the charger.
    pub promoted: Option<ChargingRequest>,
}

impl TickOutcome {
    /// True if the active slot changed hands.
    pub fn is_transition(&self) -> bool {
        self.completed.is_some() || self.promoted.is_some()
    }
}

/// Admit a spot to the station at the current time.
pub fn admit(
    station: &Station,
    spot_id: &str,
    requested_minutes: f64,
) -> Result<(Station, ChargingRequest), QueueError> {
    admit_at(station, spot_id, requested_minutes, Utc::now())
}

/// Admit a spot, either straight onto the charger or to the tail of the queue.
///
/// The charger is only taken directly when nothing is charging and nobody
/// is waiting, so a newcomer never overtakes a queued request.
pub fn admit_at(
    station: &Station,
    spot_id: &str,
    requested_minutes: f64,
    now: DateTime<Utc>,
) -> Result<(Station, ChargingRequest), QueueError> {
    if spot_id.trim().is_empty() {
        return Err(QueueError::UnknownSpot {
            spot_id: spot_id.to_string(),
        });
    }
    if !requested_minutes.is_finite()
        || !(MIN_REQUESTED_MINUTES..=MAX_REQUESTED_MINUTES).contains(&requested_minutes)
    {
        return Err(QueueError::InvalidDuration {
            minutes: requested_minutes,
        });
    }
    if station.contains_spot(spot_id) {
        return Err(QueueError::DuplicateSpot {
            spot_id: spot_id.to_string(),
        });
    }

    let mut next = station.clone();
    let admitted = if next.active_request.is_none() && next.queue.is_empty() {
        let request = ChargingRequest::charging(spot_id, requested_minutes, now);
        next.active_request = Some(request.clone());
        next.refresh_queue();
        tracing::info!("Spot {} started charging for {} min", spot_id, requested_minutes);
        request
    } else {
        let tail = next.queue.len();
        next.queue
            .push(ChargingRequest::waiting(spot_id, requested_minutes, now));
        next.refresh_queue();
        let request = next.queue[tail].clone();
        tracing::info!(
            "Spot {} queued at position {} ({:?} min wait)",
            spot_id,
            request.queue_position,
            request.total_wait_minutes
        );
        request
    };

    Ok((next, admitted))
}

/// Advance simulated time and return the new station state.
pub fn tick(station: &Station, elapsed_minutes: f64) -> Station {
    tick_with_outcome(station, elapsed_minutes).station
}

/// Advance simulated time by `elapsed_minutes`.
///
/// The active request counts down, clamped at zero. When it runs out the
/// queue head is promoted with its full requested duration, or the station
/// becomes available if nobody is waiting. An idle station with a waiting
/// queue (left behind by a departure) promotes its head without consuming
/// any time. A `completed` active request keeps the charger until the
/// driver departs.
pub fn tick_with_outcome(station: &Station, elapsed_minutes: f64) -> TickOutcome {
    let elapsed = elapsed_minutes.max(0.0);
    let mut next = station.clone();
    let mut completed = None;
    let mut promoted = None;

    match next.active_request.take() {
        None => promoted = promote_head(&mut next),
        Some(active) if active.status == RequestStatus::Completed => {
            next.active_request = Some(active);
        }
        Some(mut active) => {
            let remaining = (active.occupied_minutes().min(active.requested_minutes) - elapsed)
                .max(0.0);
            if remaining < EPSILON {
                active.status = RequestStatus::Completed;
                active.remaining_minutes = Some(0.0);
                tracing::info!("Spot {} finished charging", active.spot_id);
                completed = Some(active);
                promoted = promote_head(&mut next);
            } else {
                active.remaining_minutes = Some(remaining);
                next.active_request = Some(active);
            }
        }
    }

    next.refresh_queue();
    TickOutcome {
        station: next,
        completed,
        promoted,
    }
}

/// Move the head of the queue into the empty active slot.
fn promote_head(station: &mut Station) -> Option<ChargingRequest> {
    if station.queue.is_empty() {
        return None;
    }
    let mut head = station.queue.remove(0);
    head.start_charging();
    tracing::info!(
        "Spot {} promoted from the queue for {} min",
        head.spot_id,
        head.requested_minutes
    );
    station.active_request = Some(head.clone());
    Some(head)
}

/// Remove a spot's request from the station.
///
/// Clearing the active request does not promote anyone; the queue head
/// takes over on the next tick.
pub fn depart(station: &Station, spot_id: &str) -> Result<Station, QueueError> {
    let mut next = station.clone();
    if next
        .active_request
        .as_ref()
        .is_some_and(|request| request.spot_id == spot_id)
    {
        next.active_request = None;
    } else if let Some(idx) = next
        .queue
        .iter()
        .position(|request| request.spot_id == spot_id)
    {
        next.queue.remove(idx);
    } else {
        return Err(QueueError::RequestNotFound {
            spot_id: spot_id.to_string(),
        });
    }

    next.refresh_queue();
    tracing::info!("Spot {} left the station", spot_id);
    Ok(next)
}

#[cfg(test)]
mod test {
    use super::*;

    fn empty_station() -> Station {
        Station::new("1")
    }

    fn admit_all(requests: &[(&str, f64)]) -> Station {
        requests
            .iter()
            .fold(empty_station(), |station, (spot_id, minutes)| {
                admit(&station, spot_id, *minutes)
                    .expect("Could not admit the spot")
                    .0
            })
    }

    fn tick_times(station: &Station, times: usize) -> Station {
        (0..times).fold(station.clone(), |station, _| tick(&station, SIMULATED_SECOND))
    }

    fn queue_spots(station: &Station) -> Vec<String> {
        station.queue.iter().map(|r| r.spot_id.clone()).collect()
    }

    #[test]
    fn test_admit_on_available_station_starts_charging() {
        for minutes in [1.0, 15.0, 60.5, 120.0] {
            let (station, request) = admit(&empty_station(), "A001", minutes).unwrap();

            assert_eq!(request.status, RequestStatus::Charging);
            assert_eq!(request.remaining_minutes, Some(minutes));
            assert_eq!(station.active_request, Some(request));
            assert!(station.queue.is_empty());
            assert!(!station.is_available);
        }
    }

    #[test]
    fn test_admit_on_busy_station_appends_to_queue() {
        let station = admit_all(&[("A001", 30.0)]);
        let station = tick_times(&station, 90);

        let (station, b) = admit(&station, "B001", 15.0).unwrap();
        assert_eq!(b.status, RequestStatus::Waiting);
        assert_eq!(b.queue_position, 1);
        assert!((b.total_wait_minutes.unwrap() - 28.5).abs() < 1e-9);

        let (station, c) = admit(&station, "C001", 10.0).unwrap();
        assert_eq!(c.queue_position, 2);
        assert!((c.total_wait_minutes.unwrap() - 43.5).abs() < 1e-9);
        assert_eq!(queue_spots(&station), vec!["B001", "C001"]);
        assert_eq!(station.queue.last(), Some(&c));
    }

    #[test]
    fn test_admit_invalid_duration() {
        let station = empty_station();
        for minutes in [0.0, 0.5, 120.5, -3.0, f64::NAN, f64::INFINITY] {
            match admit(&station, "A001", minutes) {
                Err(QueueError::InvalidDuration { .. }) => {}
                other => panic!("Expected InvalidDuration error, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_admit_duplicate_spot() {
        let station = admit_all(&[("A001", 30.0), ("B001", 15.0)]);

        for spot_id in ["A001", "B001"] {
            let result = admit(&station, spot_id, 10.0);
            assert_eq!(
                result.unwrap_err(),
                QueueError::DuplicateSpot {
                    spot_id: spot_id.to_string()
                }
            );
        }
    }

    #[test]
    fn test_admit_blank_spot() {
        let result = admit(&empty_station(), "  ", 10.0);
        assert!(matches!(result, Err(QueueError::UnknownSpot { .. })));
    }

    #[test]
    fn test_admit_behind_idle_queue_keeps_fifo() {
        let station = admit_all(&[("A001", 10.0), ("B001", 10.0)]);
        let station = depart(&station, "A001").unwrap();

        let (station, c) = admit(&station, "C001", 5.0).unwrap();
        assert_eq!(c.status, RequestStatus::Waiting);
        assert_eq!(c.queue_position, 2);
        assert_eq!(c.total_wait_minutes, Some(10.0));
        assert!(station.active_request.is_none());
    }

    #[test]
    fn test_scenario_promotion_after_full_charge() {
        let (station, a) = admit(&empty_station(), "A001", 30.0).unwrap();
        assert_eq!(a.status, RequestStatus::Charging);
        assert_eq!(a.remaining_minutes, Some(30.0));

        let (station, b) = admit(&station, "B001", 15.0).unwrap();
        assert_eq!(b.status, RequestStatus::Waiting);
        assert_eq!(b.queue_position, 1);
        assert_eq!(b.total_wait_minutes, Some(30.0));

        let station = tick_times(&station, 30 * 60);

        let active = station.active_request.as_ref().unwrap();
        assert_eq!(active.spot_id, "B001");
        assert_eq!(active.status, RequestStatus::Charging);
        assert_eq!(active.remaining_minutes, Some(15.0));
        assert_eq!(active.total_wait_minutes, None);
        assert!(station.queue.is_empty());
        assert!(!station.is_available);
    }

    #[test]
    fn test_scenario_wait_times_accumulate() {
        let station = admit_all(&[("A001", 10.0), ("B001", 10.0), ("C001", 10.0)]);

        assert_eq!(station.queue[0].spot_id, "B001");
        assert_eq!(station.queue[0].total_wait_minutes, Some(10.0));
        assert_eq!(station.queue[1].spot_id, "C001");
        assert_eq!(station.queue[1].total_wait_minutes, Some(20.0));
    }

    #[test]
    fn test_tick_recomputes_wait_times() {
        let station = admit_all(&[("A001", 10.0), ("B001", 5.0), ("C001", 7.0)]);
        let station = tick_times(&station, 120);

        let remaining = station
            .active_request
            .as_ref()
            .and_then(|r| r.remaining_minutes)
            .unwrap();
        assert!((remaining - 8.0).abs() < 1e-9);
        assert!((station.queue[0].total_wait_minutes.unwrap() - 8.0).abs() < 1e-9);
        assert!((station.queue[1].total_wait_minutes.unwrap() - 13.0).abs() < 1e-9);
    }

    #[test]
    fn test_tick_preserves_queue_order() {
        let station = admit_all(&[
            ("A001", 2.0),
            ("B001", 1.0),
            ("C001", 3.0),
            ("D001", 1.0),
            ("E001", 2.0),
        ]);
        let mut expected = queue_spots(&station);

        let mut station = station;
        for _ in 0..(2 * 60 + 30) {
            let outcome = tick_with_outcome(&station, SIMULATED_SECOND);
            if outcome.promoted.is_some() {
                expected.remove(0);
            }
            station = outcome.station;
            assert_eq!(queue_spots(&station), expected);
            for (idx, request) in station.queue.iter().enumerate() {
                assert_eq!(request.queue_position, idx as u32 + 1);
            }
        }
        assert_eq!(
            station.active_request.as_ref().map(|r| r.spot_id.as_str()),
            Some("B001")
        );
    }

    #[test]
    fn test_tick_conservation_single_promotion() {
        for minutes in [1.0, 7.0, 45.0] {
            let station = admit_all(&[("A001", minutes), ("B001", 5.0)]);
            let mut station = station;
            let mut promotions = 0;
            let mut completions = Vec::new();
            for _ in 0..(minutes as usize * 60) {
                let outcome = tick_with_outcome(&station, SIMULATED_SECOND);
                promotions += outcome.promoted.iter().count();
                completions.extend(outcome.completed);
                station = outcome.station;
            }
            assert_eq!(promotions, 1);
            assert_eq!(completions.len(), 1);
            assert_eq!(completions[0].spot_id, "A001");
            assert_eq!(completions[0].status, RequestStatus::Completed);
            assert_eq!(completions[0].remaining_minutes, Some(0.0));
        }
    }

    #[test]
    fn test_tick_clears_active_with_empty_queue() {
        let station = admit_all(&[("A001", 3.0)]);
        let station = tick_times(&station, 3 * 60 - 1);
        assert!(!station.is_available);

        let outcome = tick_with_outcome(&station, SIMULATED_SECOND);
        assert!(outcome.is_transition());
        assert!(outcome.promoted.is_none());
        assert!(outcome.station.active_request.is_none());
        assert!(outcome.station.is_available);
    }

    #[test]
    fn test_tick_without_requests_is_noop() {
        let station = empty_station();
        assert_eq!(tick(&station, SIMULATED_SECOND), station);
    }

    #[test]
    fn test_tick_clamps_large_steps() {
        let station = admit_all(&[("A001", 5.0), ("B001", 10.0)]);
        let station = tick(&station, 60.0);

        let active = station.active_request.as_ref().unwrap();
        assert_eq!(active.spot_id, "B001");
        assert_eq!(active.remaining_minutes, Some(10.0));
    }

    #[test]
    fn test_tick_keeps_completed_request_until_departure() {
        let mut station = admit_all(&[("A001", 5.0), ("B001", 10.0)]);
        if let Some(active) = station.active_request.as_mut() {
            active.status = RequestStatus::Completed;
            active.remaining_minutes = Some(0.0);
        }

        let station = tick_times(&station, 10);
        assert_eq!(
            station.active_request.as_ref().map(|r| r.status),
            Some(RequestStatus::Completed)
        );
        assert_eq!(station.queue[0].total_wait_minutes, Some(0.0));
    }

    #[test]
    fn test_scenario_depart_completed_does_not_promote() {
        let mut station = admit_all(&[("A001", 5.0), ("B001", 10.0)]);
        if let Some(active) = station.active_request.as_mut() {
            active.status = RequestStatus::Completed;
            active.remaining_minutes = Some(0.0);
        }

        let station = depart(&station, "A001").unwrap();
        assert!(station.active_request.is_none());
        assert!(station.is_available);
        assert_eq!(station.queue[0].spot_id, "B001");
        assert_eq!(station.queue[0].status, RequestStatus::Waiting);

        let outcome = tick_with_outcome(&station, SIMULATED_SECOND);
        let active = outcome.station.active_request.as_ref().unwrap();
        assert_eq!(active.spot_id, "B001");
        assert_eq!(active.status, RequestStatus::Charging);
        assert_eq!(active.remaining_minutes, Some(10.0));
        assert!(outcome.completed.is_none());
        assert!(!outcome.station.is_available);
    }

    #[test]
    fn test_depart_from_queue_renumbers() {
        let station = admit_all(&[("A001", 10.0), ("B001", 5.0), ("C001", 5.0), ("D001", 5.0)]);
        let station = depart(&station, "C001").unwrap();

        assert_eq!(queue_spots(&station), vec!["B001", "D001"]);
        assert_eq!(station.queue[1].queue_position, 2);
        assert_eq!(station.queue[1].total_wait_minutes, Some(15.0));
        assert!(!station.is_available);
    }

    #[test]
    fn test_depart_unknown_spot_leaves_state_unchanged() {
        let station = admit_all(&[("A001", 10.0), ("B001", 5.0)]);
        let before = station.clone();

        let result = depart(&station, "Z999");
        assert_eq!(
            result.unwrap_err(),
            QueueError::RequestNotFound {
                spot_id: "Z999".into()
            }
        );
        assert_eq!(station, before);
    }
}
