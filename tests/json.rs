// This file is part of oxidos.
// Copyright (c) 2023-2026 The oxidos developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use oxidos_remote::qmp::json;

fn buf(text: &str) -> Vec<u8> {
    text.as_bytes().to_vec()
}

#[test]
fn splits_first_complete_object() {
    let mut data = buf("{\"execute\": \"stop\"}{\"execute\": \"cont\"}");
    assert_eq!(
        json::next_object(&mut data),
        Some("{\"execute\": \"stop\"}".to_string())
    );
    assert_eq!(
        json::next_object(&mut data),
        Some("{\"execute\": \"cont\"}".to_string())
    );
    assert_eq!(json::next_object(&mut data), None);
}

#[test]
fn object_split_across_reads() {
    let mut data = buf("{\"execute\": \"send-key\", \"arguments\": {\"keys\": ");
    assert_eq!(json::next_object(&mut data), None);
    data.extend_from_slice(b"[{\"type\": \"qcode\", \"data\": \"a\"}]}}");
    let object = json::next_object(&mut data).unwrap();
    assert!(object.starts_with("{\"execute\""));
    assert!(object.ends_with("}}"));
    assert!(data.is_empty());
}

#[test]
fn braces_inside_strings_do_not_confuse_the_splitter() {
    let mut data = buf("{\"file\": \"a{b}c\\\"d\"}rest");
    assert_eq!(
        json::next_object(&mut data),
        Some("{\"file\": \"a{b}c\\\"d\"}".to_string())
    );
    // Trailing bytes stay queued for the next object.
    assert_eq!(data, b"rest".to_vec());
}

#[test]
fn leading_noise_is_discarded() {
    let mut data = buf("\r\n  {\"a\": 1}");
    assert_eq!(json::next_object(&mut data), Some("{\"a\": 1}".to_string()));
    let mut data = buf("no json here");
    assert_eq!(json::next_object(&mut data), None);
    assert!(data.is_empty());
}

#[test]
fn finds_string_fields() {
    let cmd = "{\"execute\": \"send-key\", \"arguments\": {\"file\": \"/tmp/x.png\"}}";
    assert_eq!(json::find_string(cmd, "execute"), Some("send-key".to_string()));
    assert_eq!(json::find_string(cmd, "file"), Some("/tmp/x.png".to_string()));
    assert_eq!(json::find_string(cmd, "missing"), None);
}

#[test]
fn finds_int_and_bool_fields() {
    let cmd = "{\"address\": 1024, \"size\": -3, \"flag\": true, \"other\": false}";
    assert_eq!(json::find_int(cmd, "address"), Some(1024));
    assert_eq!(json::find_int(cmd, "size"), Some(-3));
    assert_eq!(json::find_int(cmd, "flag"), None);
    assert_eq!(json::find_bool(cmd, "flag"), Some(true));
    assert_eq!(json::find_bool(cmd, "other"), Some(false));
    assert_eq!(json::find_bool(cmd, "address"), None);
}

#[test]
fn whitespace_after_colon_is_skipped() {
    let cmd = "{\"hold-time\" :\t 50}";
    assert_eq!(json::find_int(cmd, "hold-time"), Some(50));
}

#[test]
fn finds_nested_object() {
    let cmd = "{\"execute\": \"memdump\", \"arguments\": {\"address\": 0, \"size\": 4}}";
    let args = json::find_object(cmd, "arguments").unwrap();
    assert_eq!(args, "{\"address\": 0, \"size\": 4}");
    assert_eq!(json::find_int(&args, "address"), Some(0));
}

#[test]
fn finds_doubly_nested_object() {
    let event = "{\"type\": \"key\", \"data\": {\"down\": true, \
                 \"key\": {\"type\": \"qcode\", \"data\": \"ret\"}}}";
    let data = json::find_object(event, "data").unwrap();
    let key = json::find_object(&data, "key").unwrap();
    assert_eq!(json::find_string(&key, "type"), Some("qcode".to_string()));
    assert_eq!(json::find_string(&key, "data"), Some("ret".to_string()));
}

#[test]
fn array_yields_top_level_objects_only() {
    let cmd = "{\"keys\": [{\"type\": \"qcode\", \"data\": \"ctrl\"}, \
               {\"type\": \"qcode\", \"data\": \"alt\"}], \"hold-time\": 50}";
    let keys = json::find_array(cmd, "keys");
    assert_eq!(keys.len(), 2);
    assert_eq!(json::find_string(&keys[0], "data"), Some("ctrl".to_string()));
    assert_eq!(json::find_string(&keys[1], "data"), Some("alt".to_string()));
}

#[test]
fn array_respects_nested_objects_and_end_bracket() {
    let cmd = "{\"events\": [{\"type\": \"key\", \"data\": {\"down\": true, \
               \"key\": {\"type\": \"qcode\", \"data\": \"a\"}}}], \"later\": [{\"x\": 1}]}";
    let events = json::find_array(cmd, "events");
    assert_eq!(events.len(), 1);
    // The nested objects stay inside the single event element.
    assert!(events[0].contains("\"key\""));
    let later = json::find_array(cmd, "later");
    assert_eq!(later.len(), 1);
    assert_eq!(json::find_int(&later[0], "x"), Some(1));
}

#[test]
fn missing_or_empty_array() {
    assert!(json::find_array("{\"a\": 1}", "keys").is_empty());
    assert!(json::find_array("{\"keys\": []}", "keys").is_empty());
    assert!(json::find_array("{\"keys\": 5}", "keys").is_empty());
}
