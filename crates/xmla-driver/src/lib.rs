//! XMLA driver: connections, rowset decoding and scrollable cursors.
//!
//! A [`Connection`] turns MDX statements and Discover requests into SOAP
//! envelopes, sends them through a cache-aware transport and decodes the
//! tabular response into a [`RowCursor`].
//!
//! # Example
//!
//! ```no_run
//! use xmla_driver::Connection;
//!
//! # async fn example() -> xmla_driver::Result<()> {
//! let conn = Connection::connect(
//!     "jdbc:xmla:Server=http://localhost:8080/xmla;Catalog=FoodMart;Cache=memory;Cache.Size=100",
//! )?;
//!
//! let mut cursor = conn.execute("SELECT [Measures].[Unit Sales] ON COLUMNS FROM [Sales]").await?;
//! while cursor.next() {
//!     println!("{:?}", cursor.get_double(1).unwrap_or_default());
//! }
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod cursor;
pub mod error;
pub mod rowset;
pub mod value;

pub use connection::Connection;
pub use cursor::{ColumnRef, RowCursor};
pub use error::{CursorError, CursorResult, DriverError, Result};
pub use rowset::{ColumnKind, decode_rowset, decode_xml_name};
pub use value::Value;
