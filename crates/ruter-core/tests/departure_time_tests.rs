//! Tests departure time selection and line/direction matching.

use ruter_core::Departure;
use serde_json::json;

fn departure(expected: Option<&str>, aimed: &str) -> Departure {
    let mut call = json!({ "AimedDepartureTime": aimed });
    if let Some(expected) = expected {
        call["ExpectedDepartureTime"] = json!(expected);
    }
    serde_json::from_value(json!({
        "RecordedAtTime": "2017-01-20T12:00:00+01:00",
        "MonitoringRef": "3010200",
        "MonitoredVehicleJourney": {
            "LineRef": "5",
            "DirectionRef": "1",
            "FramedVehicleJourneyRef": null,
            "PublishedLineName": "5",
            "DirectionName": null,
            "OperatorRef": null,
            "OriginName": "Ringen",
            "OriginRef": "3012551",
            "DestinationRef": "3012550",
            "DestinationName": "Vestli",
            "OriginAimedDepartureTime": "2017-01-20T11:40:00+01:00",
            "DestinationAimedArrivalTime": "2017-01-20T12:30:00+01:00",
            "Monitored": true,
            "InCongestion": false,
            "Delay": "PT0S",
            "TrainBlockPart": null,
            "BlockRef": null,
            "VehicleRef": null,
            "VehicleMode": 4,
            "VehicleJourneyName": "5",
            "MonitoredCall": call,
            "VehicleFeatureRef": null
        },
        "Extensions": {},
        "StopVisitNote": []
    }))
    .expect("departure fixture should decode")
}

#[test]
fn departure_time_tests_prefers_expected_over_aimed() {
    let late = departure(
        Some("2017-01-20T12:05:00+01:00"),
        "2017-01-20T12:03:00+01:00",
    );
    assert_eq!(late.departure_time_text(), Some("2017-01-20T12:05:00+01:00"));

    let unmonitored = departure(None, "2017-01-20T12:03:00+01:00");
    let time = unmonitored
        .departure_time()
        .expect("aimed time should parse")
        .expect("aimed time should be present");
    assert_eq!(time.minute(), 3);
}

#[test]
fn departure_time_tests_matches_line_and_direction() {
    let visit = departure(None, "2017-01-20T12:03:00+01:00");
    assert!(visit.serves_line("5"));
    assert!(!visit.serves_line("4"));
    assert!(visit.runs_in_direction("1"));
    assert!(!visit.runs_in_direction("2"));
}
