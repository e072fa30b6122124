//! End-to-end flow through the public API: wire events in, viewer out.

use gqlscope::daemon::WireEvent;
use gqlscope::{
    observe, CallRegistry, Column, Config, ExtractMode, Http1Analyzer, HttpService, IngestOutcome,
    IngestPipeline, RegistryObserver, SequenceId, TrafficEvent, ViewerFacade,
};
use std::sync::{mpsc, Arc};
use std::time::Duration;

const CAPTURE: &str = r#"
{"tool_flag":4,"is_request":true,"service":{"host":"shop.test","port":443,"protocol":"https"},"request":"POST /api/graphql HTTP/1.1\r\nHost: shop.test\r\n\r\n{\"operationName\":\"Cart\",\"query\":\"query Cart { cart { id } }\"}"}
{"tool_flag":4,"is_request":true,"service":{"host":"shop.test","port":443,"protocol":"https"},"request":"GET /static/app.js HTTP/1.1\r\nHost: shop.test\r\n\r\n"}
{"tool_flag":64,"is_request":true,"service":{"host":"shop.test","port":8443,"protocol":"https"},"request":"POST /GraphQL HTTP/1.1\r\nHost: shop.test\r\n\r\n[{\"query\":\"{a}\"},{\"operationName\":\"Batch\",\"query\":\"query Batch {b}\"}]"}
{"tool_flag":4,"is_request":false,"service":{"host":"shop.test","port":443,"protocol":"https"},"request":"POST /api/graphql HTTP/1.1\r\nHost: shop.test\r\n\r\n{}","response":"HTTP/1.1 200 OK\r\n\r\n{\"data\":{}}"}
{"tool_flag":64,"is_request":false,"service":{"host":"shop.test","port":8443,"protocol":"https"},"request":"POST /GraphQL HTTP/1.1\r\nHost: shop.test\r\n\r\n"}
"#;

struct Collect(mpsc::Sender<(char, SequenceId)>);

impl RegistryObserver for Collect {
    fn on_insert(&mut self, sequence_id: SequenceId) {
        let _ = self.0.send(('+', sequence_id));
    }

    fn on_update(&mut self, sequence_id: SequenceId) {
        let _ = self.0.send(('~', sequence_id));
    }
}

fn events() -> Vec<TrafficEvent> {
    CAPTURE
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str::<WireEvent>(l).unwrap().into())
        .collect()
}

#[test]
fn test_capture_replay() {
    let config = Config {
        extract_mode: ExtractMode::Structural,
        ..Config::default()
    };
    let registry = Arc::new(CallRegistry::new());
    let pipeline = IngestPipeline::with_config(Arc::clone(&registry), Arc::new(Http1Analyzer), &config);
    let viewer = ViewerFacade::new(Arc::clone(&registry));

    let (tx, rx) = mpsc::channel();
    let _observer = observe(&registry, Collect(tx));

    let outcomes: Vec<IngestOutcome> = events().iter().map(|e| pipeline.on_traffic_event(e)).collect();
    assert!(matches!(outcomes[0], IngestOutcome::Inserted(_)));
    assert_eq!(outcomes[1], IngestOutcome::Ignored);
    assert!(matches!(outcomes[2], IngestOutcome::Inserted(_)));
    assert!(matches!(outcomes[3], IngestOutcome::Updated(_)));
    assert!(matches!(outcomes[4], IngestOutcome::ResponseEmpty(_)));

    assert_eq!(viewer.row_count(), 2);
    let row = |r: usize| -> Vec<String> {
        Column::ALL
            .iter()
            .map(|c| viewer.field_at(r, *c).unwrap().to_string())
            .collect()
    };
    let first = row(0);
    assert_eq!(&first[1..], ["shop.test", "POST", "https://shop.test/api/graphql", "Cart", "200"]);
    let second = row(1);
    assert_eq!(&second[1..], ["shop.test", "POST", "https://shop.test:8443/GraphQL", "Batch", ""]);

    let detail = viewer.select_row(1).unwrap();
    assert_eq!(detail.tool_flag, 64);
    assert_eq!(viewer.selected_service(), Some(HttpService::new("shop.test", 8443, "https")));
    assert!(viewer.selected_response().is_none());
    assert!(viewer.select_row(2).is_none());

    let wait = Duration::from_secs(5);
    let seen: Vec<(char, SequenceId)> = (0..3).map(|_| rx.recv_timeout(wait).unwrap()).collect();
    let ids: Vec<SequenceId> = registry.snapshot().iter().map(|r| r.sequence_id).collect();
    assert_eq!(seen, vec![('+', ids[0]), ('+', ids[1]), ('~', ids[0])]);
}

#[test]
fn test_field_out_of_range_is_reported() {
    let viewer = ViewerFacade::new(Arc::new(CallRegistry::new()));
    assert!(viewer.field_at(0, Column::Url).is_err());
    assert!(viewer.select_row(0).is_none());
}
