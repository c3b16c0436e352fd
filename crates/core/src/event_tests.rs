// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::flavor::Flavor;

fn spec() -> TroveSpec {
    TroveSpec::new("foo:source", "1", Flavor::empty())
}

#[test]
fn trove_state_json_format() {
    let event = Event::TroveStateUpdated {
        job_id: JobId::new("job-1"),
        trove: spec(),
        state: TroveState::Building,
        old_state: TroveState::Preparing,
        status: String::new(),
        payload: TrovePayload::Building {
            pid: 42,
            worker: None,
        },
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "trove:state");
    assert_eq!(json["state"], "building");
    assert_eq!(json["payload"]["kind"], "building");
    assert_eq!(json["payload"]["pid"], 42);
    assert!(json["payload"].get("worker").is_none());

    let parsed: Event = serde_json::from_value(json).unwrap();
    assert_eq!(parsed, event);
}

#[test]
fn job_state_omits_missing_reason() {
    let event = Event::JobStateUpdated {
        job_id: JobId::new("job-1"),
        state: JobState::Building,
        old_state: JobState::Loading,
        status: String::new(),
        reason: None,
    };
    let json = serde_json::to_string(&event).unwrap();
    assert_eq!(
        json,
        r#"{"type":"job:state","job_id":"job-1","state":"building","old_state":"loading","status":""}"#
    );
}

#[test]
fn payload_defaults_to_none_when_absent() {
    let json = r#"{"type":"trove:state","job_id":"j","trove":{"name":"a","version":"1","flavor":""},"state":"built","old_state":"building"}"#;
    let parsed: Event = serde_json::from_str(json).unwrap();
    match parsed {
        Event::TroveStateUpdated { payload, .. } => assert_eq!(payload, TrovePayload::None),
        other => panic!("unexpected event {other:?}"),
    }
}

#[yare::parameterized(
    job_log = { Event::JobLogUpdated { job_id: JobId::new("j"), message: "hi".into() }, EventKind::JobLogUpdated, "job:log" },
    troves_set = { Event::JobTrovesSet { job_id: JobId::new("j"), troves: vec![] }, EventKind::JobTrovesSet, "job:troves_set" },
    committed = { Event::JobCommitted { job_id: JobId::new("j"), artifacts: vec![] }, EventKind::JobCommitted, "job:committed" },
)]
fn kind_and_name(event: Event, kind: EventKind, name: &str) {
    assert_eq!(event.kind(), kind);
    assert_eq!(event.name(), name);
    assert_eq!(event.job_id(), "j");
    assert!(event.trove().is_none());
}

#[test]
fn log_summary_names_trove_and_transition() {
    let event = Event::TroveStateUpdated {
        job_id: JobId::new("job-1"),
        trove: spec(),
        state: TroveState::Built,
        old_state: TroveState::Building,
        status: String::new(),
        payload: TrovePayload::None,
    };
    assert_eq!(
        event.log_summary(),
        "trove:state id=job-1 trove=foo:source=1[] Building->Built"
    );
}
