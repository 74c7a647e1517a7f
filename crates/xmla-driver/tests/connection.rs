//! Connections against a mock XMLA endpoint.

use std::sync::Arc;

use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};
use xmla_cache::{CacheError, CacheStore, MemoryCache, SharedStore};
use xmla_client::TransportError;
use xmla_config::PropertyMap;
use xmla_driver::{Connection, DriverError, Value};

const SALES: &str = r#"<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/">
  <SOAP-ENV:Body>
    <ExecuteResponse xmlns="urn:schemas-microsoft-com:xml-analysis">
      <return>
        <root xmlns="urn:schemas-microsoft-com:xml-analysis:rowset"
              xmlns:xsd="http://www.w3.org/2001/XMLSchema"
              xmlns:sql="urn:schemas-microsoft-com:xml-sql">
          <xsd:schema>
            <xsd:complexType name="row">
              <xsd:sequence>
                <xsd:element sql:field="[Store].[Store Name]" name="_x005B_Store_x005D_" type="xsd:string"/>
                <xsd:element sql:field="[Measures].[Unit Sales]" name="_x005B_Measures_x005D_" type="xsd:double"/>
              </xsd:sequence>
            </xsd:complexType>
          </xsd:schema>
          <row><_x005B_Store_x005D_>Store 6</_x005B_Store_x005D_><_x005B_Measures_x005D_>21333</_x005B_Measures_x005D_></row>
          <row><_x005B_Store_x005D_>Store 7</_x005B_Store_x005D_><_x005B_Measures_x005D_>25663</_x005B_Measures_x005D_></row>
          <row><_x005B_Store_x005D_>Store 24</_x005B_Store_x005D_></row>
        </root>
      </return>
    </ExecuteResponse>
  </SOAP-ENV:Body>
</SOAP-ENV:Envelope>"#;

const CUBES: &str = r#"<root>
  <row><CATALOG_NAME>FoodMart</CATALOG_NAME><CUBE_NAME>Sales</CUBE_NAME></row>
  <row><CATALOG_NAME>FoodMart</CATALOG_NAME><CUBE_NAME>Warehouse</CUBE_NAME></row>
</root>"#;

const FAULT: &str = r#"<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/">
  <SOAP-ENV:Body><SOAP-ENV:Fault>
    <faultcode>SOAP-ENV:Server</faultcode><faultstring>MDX object '[Nope]' not found</faultstring>
  </SOAP-ENV:Fault></SOAP-ENV:Body></SOAP-ENV:Envelope>"#;

const MDX: &str = "SELECT [Measures].[Unit Sales] ON COLUMNS, [Store].Children ON ROWS FROM [Sales]";

fn props(server: &MockServer, extra: &[(&str, &str)]) -> PropertyMap {
    let mut props = PropertyMap::new();
    props.insert("Server".to_string(), format!("{}/xmla", server.uri()));
    props.insert("Catalog".to_string(), "FoodMart".to_string());
    for (k, v) in extra {
        props.insert(k.to_string(), v.to_string());
    }
    props
}

async fn sales_server(expected_calls: u64) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("SOAPAction", "\"urn:schemas-microsoft-com:xml-analysis:Execute\""))
        .and(body_string_contains("<Catalog>FoodMart</Catalog>"))
        .and(body_string_contains("<Format>Tabular</Format>"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SALES))
        .expect(expected_calls)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_execute_decodes_rowset() {
    let server = sales_server(1).await;
    let conn = Connection::open(&props(&server, &[])).unwrap();
    assert!(conn.cache_session().is_none());

    let mut cursor = conn.execute(MDX).await.unwrap();
    assert_eq!(
        cursor.columns(),
        ["[Store].[Store Name]", "[Measures].[Unit Sales]"]
    );
    assert_eq!(cursor.len(), 3);

    assert!(cursor.next());
    assert_eq!(cursor.get_string(1).unwrap().as_deref(), Some("Store 6"));
    assert_eq!(cursor.get_int("[Measures].[Unit Sales]").unwrap(), 21333);

    assert!(cursor.last());
    assert_eq!(cursor.get_double(2).unwrap(), 0.0);
    assert!(cursor.was_null());
}

#[tokio::test]
async fn test_memory_cache_answers_repeated_statements() {
    let server = sales_server(1).await;
    let conn = Connection::open(&props(&server, &[("Cache", "memory"), ("Cache.Size", "10")])).unwrap();
    assert!(conn.cache_session().is_some());

    let first = conn.execute(MDX).await.unwrap();
    let second = conn.execute(MDX).await.unwrap();
    assert_eq!(first.len(), second.len());
}

#[tokio::test]
async fn test_without_cache_every_statement_hits_the_server() {
    let server = sales_server(2).await;
    let conn = Connection::open(&props(&server, &[])).unwrap();

    conn.execute(MDX).await.unwrap();
    conn.execute(MDX).await.unwrap();
}

#[tokio::test]
async fn test_shared_store_isolates_unnamed_connections() {
    let server = sales_server(2).await;
    let store: SharedStore = Arc::new(MemoryCache::default());
    let a = Connection::open_with_store(&props(&server, &[("User", "a")]), store.clone()).unwrap();
    let b = Connection::open_with_store(&props(&server, &[("User", "a")]), store).unwrap();
    assert_ne!(a.cache_session(), b.cache_session());

    a.execute(MDX).await.unwrap();
    b.execute(MDX).await.unwrap();
}

#[tokio::test]
async fn test_shared_store_shares_named_partitions() {
    let server = sales_server(1).await;
    let store: SharedStore = Arc::new(MemoryCache::default());
    let named = [("Cache.Name", "team")];
    let a = Connection::open_with_store(&props(&server, &named), store.clone()).unwrap();
    let b = Connection::open_with_store(&props(&server, &named), store.clone()).unwrap();

    a.execute(MDX).await.unwrap();
    b.execute(MDX).await.unwrap();

    store.flush_all();
    assert_eq!(
        store
            .get(b.cache_session().unwrap(), &b.settings().server, b"anything")
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn test_replay_store_serves_a_new_connection() {
    let server = sales_server(1).await;
    let dir = TempDir::new().unwrap();
    let directory = dir.path().display().to_string();
    let replay = [("Cache", "replay"), ("Cache.Directory", directory.as_str())];

    {
        let recorder = Connection::open(&props(&server, &replay)).unwrap();
        recorder.execute(MDX).await.unwrap();
    }

    let replayer = Connection::open(&props(&server, &replay)).unwrap();
    let mut cursor = replayer.execute(MDX).await.unwrap();
    assert!(cursor.absolute(2));
    assert_eq!(
        cursor.get_object(1).unwrap(),
        Some(Value::Text("Store 7".to_string()))
    );
}

#[tokio::test]
async fn test_fault_is_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string(FAULT))
        .expect(2)
        .mount(&server)
        .await;

    let conn = Connection::open(&props(&server, &[("Cache", "memory")])).unwrap();
    for _ in 0..2 {
        let err = conn.execute("SELECT FROM [Nope]").await.unwrap_err();
        assert!(
            matches!(err, DriverError::Fault { ref message, .. } if message.contains("[Nope]")),
            "unexpected error: {err:?}"
        );
    }
}

#[tokio::test]
async fn test_gateway_page_is_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body>Gateway maintenance</body></html>"),
        )
        .expect(2)
        .mount(&server)
        .await;

    let conn = Connection::open(&props(&server, &[("Cache", "memory")])).unwrap();
    for _ in 0..2 {
        let err = conn.execute(MDX).await.unwrap_err();
        assert!(
            matches!(
                err,
                DriverError::Client(xmla_client::Error::Transport(TransportError::Malformed(_)))
            ),
            "unexpected error: {err:?}"
        );
    }
}

#[tokio::test]
async fn test_discover() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("SOAPAction", "\"urn:schemas-microsoft-com:xml-analysis:Discover\""))
        .and(body_string_contains("<RequestType>MDSCHEMA_CUBES</RequestType>"))
        .and(body_string_contains("<CATALOG_NAME>FoodMart</CATALOG_NAME>"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CUBES))
        .expect(1)
        .mount(&server)
        .await;

    let conn = Connection::open(&props(&server, &[])).unwrap();
    let mut cursor = conn
        .discover("MDSCHEMA_CUBES", &[("CATALOG_NAME", "FoodMart")])
        .await
        .unwrap();

    assert_eq!(cursor.columns(), ["CATALOG_NAME", "CUBE_NAME"]);
    let mut cubes = Vec::new();
    while cursor.next() {
        cubes.push(cursor.get_string("CUBE_NAME").unwrap().unwrap_or_default());
    }
    assert_eq!(cubes, ["Sales", "Warehouse"]);
}

#[tokio::test]
async fn test_closed_connection_rejects_requests() {
    let server = sales_server(0).await;
    let conn = Connection::open(&props(&server, &[("Cache", "memory")])).unwrap();
    assert!(conn.is_valid());

    conn.close();
    assert!(!conn.is_valid());
    assert!(matches!(conn.execute(MDX).await, Err(DriverError::Closed)));
    assert!(matches!(
        conn.discover("DISCOVER_DATASOURCES", &[]).await,
        Err(DriverError::Closed)
    ));
}

#[tokio::test]
async fn test_connect_string() {
    let server = sales_server(1).await;
    let conn = Connection::connect(&format!(
        "jdbc:xmla:Server={}/xmla;Catalog=FoodMart;Cache=memory;Cache.Mode=LFU",
        server.uri()
    ))
    .unwrap();

    assert_eq!(conn.properties().cache.get("Mode").unwrap(), "LFU");
    assert_eq!(conn.properties().connection.get("Cache").unwrap(), "memory");
    conn.execute(MDX).await.unwrap();
}

#[test]
fn test_open_errors() {
    let missing_server = PropertyMap::new();
    assert!(matches!(
        Connection::open(&missing_server),
        Err(DriverError::Config(_))
    ));

    let mut zero_timeout = PropertyMap::new();
    zero_timeout.insert("Server".to_string(), "http://localhost:1/xmla".to_string());
    zero_timeout.insert("Timeout".to_string(), "0".to_string());
    assert!(matches!(
        Connection::open(&zero_timeout),
        Err(DriverError::Config(_))
    ));

    let mut unknown_store = PropertyMap::new();
    unknown_store.insert("Server".to_string(), "http://localhost:1/xmla".to_string());
    unknown_store.insert("Cache".to_string(), "redis".to_string());
    assert!(matches!(
        Connection::open(&unknown_store),
        Err(DriverError::Cache(CacheError::UnknownStore(_)))
    ));

    let mut replay_without_dir = PropertyMap::new();
    replay_without_dir.insert("Server".to_string(), "http://localhost:1/xmla".to_string());
    replay_without_dir.insert("Cache".to_string(), "replay".to_string());
    assert!(matches!(
        Connection::open(&replay_without_dir),
        Err(DriverError::Cache(CacheError::MissingProperty(_)))
    ));
}
