// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use procon_api::Client;
use procon_app::{
    ArrayCommand, ArrayEvent, ArraySelector, ModalMode, PageRequest, PaginatedFetch, Record,
    SelectorCommand, SelectorEvent,
};
use procon_testkit::{GAME_API, PAGE_ID, game_binding};
use std::thread;
use std::time::Duration;
use tiny_http::{Header, Response, Server};

fn json_response(body: &str, status: u16) -> Response<std::io::Cursor<Vec<u8>>> {
    Response::from_string(body)
        .with_status_code(status)
        .with_header(
            Header::from_bytes("Content-Type", "application/json")
                .expect("valid content type header"),
        )
}

fn query_param(url: &str, key: &str) -> Option<String> {
    let parsed = url::Url::parse(&format!("http://localhost{url}")).ok()?;
    parsed
        .query_pairs()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.into_owned())
}

#[test]
fn unreachable_server_error_names_the_setting() {
    let mut client =
        Client::new("http://127.0.0.1:1", Duration::from_millis(50)).expect("client builds");
    let params = procon_app::ListParams::new(&Record::new(), &[], PageRequest::default());
    let error = client
        .fetch_page(PAGE_ID, GAME_API, &params)
        .expect_err("fetch should fail for unreachable endpoint");
    assert!(error.to_string().contains("api.base_url") || error.to_string().contains("timed out"));
}

#[test]
fn ping_reads_count_from_mock_server() -> Result<()> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let addr = format!("http://{}/api", server.server_addr());

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        assert!(request.url().starts_with("/api/p1/game?"));
        assert_eq!(query_param(request.url(), "limit").as_deref(), Some("1"));
        assert_eq!(query_param(request.url(), "skip").as_deref(), Some("0"));
        request
            .respond(json_response(r#"{"data":[{"id":1,"name":"x"}],"count":42}"#, 200))
            .expect("response should succeed");
    });

    let client = Client::new(&addr, Duration::from_secs(1))?;
    assert_eq!(client.ping(PAGE_ID, GAME_API)?, 42);

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn server_error_message_is_surfaced() -> Result<()> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let addr = format!("http://{}", server.server_addr());

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        request
            .respond(json_response(r#"{"message":"unknown api"}"#, 404))
            .expect("response should succeed");
    });

    let client = Client::new(&addr, Duration::from_secs(1))?;
    let error = client
        .ping(PAGE_ID, "nope")
        .expect_err("404 should become an error");
    assert_eq!(error.to_string(), "server error (404): unknown api");

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn view_mode_fetch_restricts_to_committed_ids() -> Result<()> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let addr = format!("http://{}", server.server_addr());

    let handle = thread::spawn(move || {
        let mut filters = Vec::new();
        for _ in 0..2 {
            let request = server.recv().expect("request expected");
            filters.push(query_param(request.url(), "queryInput").unwrap_or_default());
            let body = r#"{"data":[{"id":4,"name":"Iron Harbor"},{"id":9,"name":"Lost Tides"}],"count":2}"#;
            request
                .respond(json_response(body, 200))
                .expect("response should succeed");
        }
        filters
    });

    let mut client = Client::new(&addr, Duration::from_secs(1))?;
    let mut array = ArraySelector::new(&game_binding())?;
    for event in array.set_value(&serde_json::json!([9, 4])) {
        if let ArrayEvent::Selector(SelectorEvent::NamesRequested(request)) = event {
            array.apply_fetch(request.run(&mut client));
        }
    }
    assert_eq!(array.selector().display_text(), "Lost Tides, Iron Harbor");

    array.dispatch(ArrayCommand::Selector(SelectorCommand::Toggle(
        ModalMode::View,
    )));
    let result = array.fetch_data(&mut client, PageRequest::default(), &[], &Record::new())?;
    assert!(result.success);
    assert_eq!(result.total, 2);

    let filters = handle.join().expect("server thread should join");
    let names_filter: serde_json::Value = serde_json::from_str(&filters[0])?;
    assert_eq!(names_filter, serde_json::json!({"id": {"in": [9, 4]}}));
    let view_filter: serde_json::Value = serde_json::from_str(&filters[1])?;
    assert_eq!(view_filter, serde_json::json!({"id": {"in": [9, 4]}}));
    Ok(())
}
