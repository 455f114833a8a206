// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn register_event_serializes_with_type_tag() {
    let event = SourceEvent::RegisterResource { goal: Goal::new("test:mod:Thing", "a", true) };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "resource:register");

    let back: SourceEvent = serde_json::from_value(json).unwrap();
    assert_eq!(back, event);
}

#[test]
fn outputs_event_round_trips() {
    let mut outputs = PropertyMap::new();
    outputs.insert("endpoint".to_string(), crate::property::PropertyValue::string("https://x"));
    let event = SourceEvent::RegisterResourceOutputs {
        urn: Urn::from_parts("dev", "proj", "test:mod:Comp", "site"),
        outputs,
    };
    let json = serde_json::to_string(&event).unwrap();
    let back: SourceEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(back, event);
}

#[test]
fn event_log_fields_name_the_resource() {
    let event = SourceEvent::ReadResource {
        read: ReadRequest::new("test:mod:Thing", "ext", ResourceId::new("i-9")),
    };
    assert_eq!(event.name(), "read");
    let fields = event.fields();
    assert!(fields.contains(&("id", "i-9".to_string())));
}
