//! Snapshot tests for tracked telemetry
//!
//! # Update snapshots
//!
//! ```
//! INSTA_UPDATE=always cargo test
//! ```

mod common;

use application_insights_sdk::{
    tags::{INTERNAL_SDK_VERSION, OPERATION_ID, OPERATION_NAME, SESSION_ID, USER_ID},
    ApplicationInsights, Config, Data, DependencyTelemetry, EventTelemetry, ExceptionTelemetry,
    InternalMessageId, ManualClock, MetricTelemetry, PageViewTelemetry, SeverityLevel, Tags,
    TelemetryItem, TraceTelemetry,
};
use common::{init_logging, RecordingChannel, INSTRUMENTATION_KEY};
use regex::Regex;
use std::{io, sync::Arc};

const START: i64 = 1_600_000_000_000;

fn setup() -> (ApplicationInsights, Arc<RecordingChannel>, Arc<ManualClock>) {
    init_logging();
    let channel = RecordingChannel::new("Sender", 1000);
    let clock = Arc::new(ManualClock::new(START));
    let ai = ApplicationInsights::builder(
        Config::new(INSTRUMENTATION_KEY).with_application_version("1.0.0"),
    )
    .with_clock(clock.clone())
    .with_channel(channel.clone())
    .build()
    .unwrap();
    (ai, channel, clock)
}

/// Serialize without the context tags, which carry random ids.
fn without_tags(item: &TelemetryItem) -> String {
    let mut item = item.clone();
    item.tags = Tags::new();
    serde_json::to_string_pretty(&item).unwrap()
}

#[test]
fn every_telemetry_type_reaches_the_channel() {
    let (ai, channel, _) = setup();
    ai.track_event(EventTelemetry::new("event")).unwrap();
    ai.track_trace(TraceTelemetry::new("trace").with_severity(SeverityLevel::Warning))
        .unwrap();
    ai.track_exception(ExceptionTelemetry::from_error(&io::Error::new(
        io::ErrorKind::Other,
        "disk full",
    )))
    .unwrap();
    ai.track_metric(MetricTelemetry::new("queue length", 3.0))
        .unwrap();
    ai.track_page_view(PageViewTelemetry::new("home").with_uri("https://example.com/"))
        .unwrap();
    ai.track_dependency_data(DependencyTelemetry {
        name: "GET /api/users".into(),
        target: Some("example.com".into()),
        dependency_type: Some("Ajax".into()),
        result_code: Some("200".into()),
        duration_ms: 42.0,
        success: Some(true),
        ..Default::default()
    })
    .unwrap();

    let items = channel.items();
    let summary: Vec<(String, Option<&str>)> = items
        .iter()
        .map(|item| (item.name.clone(), item.base_type()))
        .collect();
    let prefix = "Microsoft.ApplicationInsights.0fdcec700ce5408589d99ae8ead9af66";
    assert_eq!(
        vec![
            (format!("{}.Event", prefix), Some("EventData")),
            (format!("{}.Message", prefix), Some("MessageData")),
            (format!("{}.Exception", prefix), Some("ExceptionData")),
            (format!("{}.Metric", prefix), Some("MetricData")),
            (format!("{}.Pageview", prefix), Some("PageviewData")),
            (format!("{}.RemoteDependency", prefix), Some("RemoteDependencyData")),
        ],
        summary
    );

    let session_id = Regex::new("^[A-Za-z0-9+/]{22}$").unwrap();
    let operation_id = Regex::new("^[0-9a-f]{32}$").unwrap();
    for item in items.iter() {
        assert!(session_id.is_match(item.tags.get(SESSION_ID).unwrap()));
        assert!(session_id.is_match(item.tags.get(USER_ID).unwrap()));
        assert!(operation_id.is_match(item.tags.get(OPERATION_ID).unwrap()));
        assert!(item
            .tags
            .get(INTERNAL_SDK_VERSION)
            .unwrap()
            .starts_with("rust:"));
        assert_eq!(items[0].tags.get(SESSION_ID), item.tags.get(SESSION_ID));
    }

    match &items[5].data {
        Some(Data::RemoteDependency(data)) => {
            assert_eq!("00:00:00.042", data.duration);
            assert!(Regex::new("^[0-9a-f]{16}$")
                .unwrap()
                .is_match(data.id.as_deref().unwrap()));
        }
        other => panic!("unexpected data {:?}", other),
    }
}

#[test]
fn event_snapshot() {
    let (ai, channel, _) = setup();
    ai.track_event(
        EventTelemetry::new("checkout")
            .with_property("cart", "3 items")
            .with_property("ai.operation.name", "POST /checkout")
            .with_measurement("total", 99.5),
    )
    .unwrap();

    let item = &channel.items()[0];
    assert_eq!(Some("POST /checkout"), item.tags.get(OPERATION_NAME));
    assert_eq!(Some("1.0.0"), item.tags.get("ai.application.ver"));
    insta::assert_snapshot!(without_tags(item), @r###"
    {
      "name": "Microsoft.ApplicationInsights.0fdcec700ce5408589d99ae8ead9af66.Event",
      "time": "2020-09-13T12:26:40.000Z",
      "iKey": "0fdcec70-0ce5-4085-89d9-9ae8ead9af66",
      "ver": "4.0",
      "sampleRate": 100.0,
      "data": {
        "baseType": "EventData",
        "baseData": {
          "ver": 2,
          "name": "checkout",
          "properties": {
            "ai.operation.name": "POST /checkout",
            "cart": "3 items"
          },
          "measurements": {
            "total": 99.5
          }
        }
      }
    }
    "###);
}

#[test]
fn timed_event_and_page_view() {
    let (ai, channel, clock) = setup();
    ai.start_track_event("upload").unwrap();
    ai.start_track_page("settings").unwrap();
    clock.advance(1_500);
    ai.stop_track_event("upload", None, None).unwrap();
    clock.advance(500);
    ai.stop_track_page("settings", Some("https://example.com/settings"), None, None)
        .unwrap();

    let items = channel.items();
    assert_eq!(2, items.len());
    match &items[0].data {
        Some(Data::Event(data)) => assert_eq!(
            Some("1500"),
            data.properties
                .as_ref()
                .and_then(|p| p.get("duration"))
                .map(String::as_str)
        ),
        other => panic!("unexpected data {:?}", other),
    }
    match &items[1].data {
        Some(Data::PageView(data)) => {
            assert_eq!(Some("00:00:02.000"), data.duration.as_deref());
            assert_eq!(Some("https://example.com/settings"), data.url.as_deref());
        }
        other => panic!("unexpected data {:?}", other),
    }
}

#[test]
fn timer_misuse_is_reported() {
    let (ai, channel, _) = setup();
    let queued_before = ai.core().logger().queue().len();
    ai.start_track_event("twice").unwrap();
    ai.start_track_event("twice").unwrap();
    ai.stop_track_event("never started", None, None).unwrap();
    assert!(channel.items().is_empty());
    // Warnings are not queued at the default telemetry level.
    assert_eq!(queued_before, ai.core().logger().queue().len());

    let strict = ApplicationInsights::builder(
        Config::new(INSTRUMENTATION_KEY).with_debug_exceptions(true),
    )
    .with_channel(RecordingChannel::new("Sender", 1000))
    .build()
    .unwrap();
    let err = strict
        .stop_track_page("never started", None, None, None)
        .unwrap_err();
    assert!(err.to_string().contains("StopCalledWithoutStart"));
}

#[test]
fn page_view_starts_new_throttle_cycle() {
    let (ai, _, _) = setup();
    let logger = ai.core().logger();
    logger
        .critical_internal(InternalMessageId::FlushFailed, "x", None)
        .unwrap();
    assert_eq!(1, logger.message_count());
    ai.track_page_view(PageViewTelemetry::new("home")).unwrap();
    assert_eq!(0, logger.message_count());
}
