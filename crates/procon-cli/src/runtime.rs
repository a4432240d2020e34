// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use procon_app::{ListParams, Page, PaginatedFetch, Record};
use procon_db::Store;
use tracing::info;

/// Where the console reads rows from and writes edits to.
pub enum Backend {
    Local(Store),
    Remote(procon_api::Client),
}

impl Backend {
    pub fn describe(&self) -> String {
        match self {
            Self::Local(_) => "local store".to_owned(),
            Self::Remote(client) => client.base_url().to_owned(),
        }
    }

    /// Row count of `api`, proving the backend answers.
    pub fn check(&mut self, page_id: &str, api: &str) -> Result<u64> {
        match self {
            Self::Local(store) => store.count(api),
            Self::Remote(client) => client.ping(page_id, api),
        }
    }
}

impl PaginatedFetch for Backend {
    fn fetch_page(&mut self, page_id: &str, api: &str, params: &ListParams) -> Result<Page> {
        match self {
            Self::Local(store) => store.fetch_page(page_id, api, params),
            Self::Remote(client) => client.fetch_page(page_id, api, params),
        }
    }
}

impl procon_tui::ConsoleRuntime for Backend {
    fn save_record(&mut self, api: &str, record: &Record) -> Result<()> {
        match self {
            Self::Local(store) => {
                let id = store
                    .upsert(api, record)
                    .with_context(|| format!("save {api} row"))?;
                info!(api, %id, "row saved");
                Ok(())
            }
            Self::Remote(client) => bail!(
                "{} is read-only from the console; the edit is kept until the next reload",
                client.base_url()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Backend;
    use anyhow::{Result, anyhow};
    use procon_app::{EntityId, ListParams, PageRequest, PaginatedFetch, Record};
    use procon_db::Store;
    use procon_testkit::{PAGE_ID, VOUCHER_API, record};
    use procon_tui::ConsoleRuntime;
    use serde_json::json;
    use std::thread;
    use std::time::Duration;
    use tiny_http::{Header, Response, Server};

    fn local() -> Result<Backend> {
        let store = Store::open_memory()?;
        store.bootstrap()?;
        Ok(Backend::Local(store))
    }

    #[test]
    fn local_saves_are_visible_to_the_next_fetch() -> Result<()> {
        let mut backend = local()?;
        backend.save_record(
            VOUCHER_API,
            &record(json!({"id": 3, "name": "Spring voucher 3", "salePrice": 80})),
        )?;
        backend.save_record(
            VOUCHER_API,
            &record(json!({"id": 3, "name": "Spring voucher 3", "salePrice": 70})),
        )?;

        let params = ListParams::new(&Record::new(), &[], PageRequest::default());
        let page = backend.fetch_page(PAGE_ID, VOUCHER_API, &params)?;
        assert_eq!(page.count, 1);
        assert_eq!(
            page.data[0].get("id").and_then(EntityId::from_value),
            Some(EntityId::new(3))
        );
        assert_eq!(page.data[0]["salePrice"], json!(70));
        assert_eq!(backend.check(PAGE_ID, VOUCHER_API)?, 1);
        assert_eq!(backend.describe(), "local store");
        Ok(())
    }

    #[test]
    fn remote_backend_refuses_saves_and_pings_for_check() -> Result<()> {
        let server =
            Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
        let addr = format!("http://{}/api", server.server_addr());
        let handle = thread::spawn(move || {
            let request = server.recv().expect("request expected");
            let response = Response::from_string(r#"{"data":[],"total":17}"#).with_header(
                Header::from_bytes("Content-Type", "application/json")
                    .expect("valid content type header"),
            );
            request.respond(response).expect("response should succeed");
        });

        let client = procon_api::Client::new(&addr, Duration::from_secs(1))?;
        let mut backend = Backend::Remote(client);
        assert_eq!(backend.check(PAGE_ID, VOUCHER_API)?, 17);
        handle.join().expect("server thread should join");

        let error = backend
            .save_record(VOUCHER_API, &record(json!({"id": 1})))
            .expect_err("remote save should fail");
        assert!(error.to_string().contains("read-only"));
        assert!(backend.describe().ends_with("/api"));
        Ok(())
    }
}
