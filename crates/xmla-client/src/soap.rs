//! SOAP envelopes for the XMLA `Execute` and `Discover` methods.
//!
//! Envelopes are built as plain strings in a fixed layout. Identical inputs
//! always produce identical bytes, which is what lets the response cache
//! recognise a repeated request.

use bytes::Bytes;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{Error, Result};

/// SOAP 1.1 envelope namespace.
pub const SOAP_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// XMLA method namespace.
pub const XMLA_NS: &str = "urn:schemas-microsoft-com:xml-analysis";

/// `SOAPAction` of the Execute method.
pub const EXECUTE_ACTION: &str = "urn:schemas-microsoft-com:xml-analysis:Execute";

/// `SOAPAction` of the Discover method.
pub const DISCOVER_ACTION: &str = "urn:schemas-microsoft-com:xml-analysis:Discover";

/// A SOAP fault returned in place of a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapFault {
    /// `faultcode`.
    pub code: String,
    /// `faultstring`, or the XMLA error description when that is missing.
    pub message: String,
}

/// Build an Execute envelope for an MDX statement.
///
/// `properties` go into the `PropertyList` in the given order.
pub fn execute_envelope(statement: &str, properties: &[(&str, &str)]) -> Result<Bytes> {
    let mut body = String::from("<Command><Statement>");
    body.push_str(&escape(statement));
    body.push_str("</Statement></Command>");
    push_property_list(&mut body, properties)?;
    Ok(envelope("Execute", &body))
}

/// Build a Discover envelope.
///
/// `restrictions` and `properties` keep the given order.
pub fn discover_envelope(
    request_type: &str,
    restrictions: &[(&str, &str)],
    properties: &[(&str, &str)],
) -> Result<Bytes> {
    let mut body = String::from("<RequestType>");
    body.push_str(&escape(request_type));
    body.push_str("</RequestType><Restrictions><RestrictionList>");
    push_elements(&mut body, restrictions)?;
    body.push_str("</RestrictionList></Restrictions>");
    push_property_list(&mut body, properties)?;
    Ok(envelope("Discover", &body))
}

fn envelope(method: &str, body: &str) -> Bytes {
    Bytes::from(format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <SOAP-ENV:Envelope xmlns:SOAP-ENV=\"{SOAP_ENV_NS}\">\
         <SOAP-ENV:Body>\
         <{method} xmlns=\"{XMLA_NS}\">{body}</{method}>\
         </SOAP-ENV:Body>\
         </SOAP-ENV:Envelope>"
    ))
}

fn push_property_list(out: &mut String, properties: &[(&str, &str)]) -> Result<()> {
    out.push_str("<Properties><PropertyList>");
    push_elements(out, properties)?;
    out.push_str("</PropertyList></Properties>");
    Ok(())
}

fn push_elements(out: &mut String, pairs: &[(&str, &str)]) -> Result<()> {
    for (name, value) in pairs {
        if !is_xml_name(name) {
            return Err(Error::Config(format!("'{}' is not a valid XMLA property name", name)));
        }
        out.push('<');
        out.push_str(name);
        out.push('>');
        out.push_str(&escape(*value));
        out.push_str("</");
        out.push_str(name);
        out.push('>');
    }
    Ok(())
}

fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Extract the SOAP fault from a response body, if it carries one.
///
/// Only the first element of the SOAP body is inspected, so a large rowset
/// is not scanned. Bodies that are not SOAP envelopes are never faults.
pub fn check_fault(body: &[u8]) -> Option<SoapFault> {
    let mut reader = Reader::from_reader(body);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut state = FaultScan::Envelope;
    let mut field = None;
    let mut code = None;
    let mut message = None;
    let mut description = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = e.local_name();
                match (state, name.as_ref()) {
                    (FaultScan::Envelope, b"Envelope") => state = FaultScan::Body,
                    (FaultScan::Envelope, _) => return None,
                    (FaultScan::Body, b"Body") => state = FaultScan::FirstChild,
                    (FaultScan::FirstChild, b"Fault") => state = FaultScan::Fault,
                    (FaultScan::FirstChild, _) => return None,
                    (FaultScan::Fault, b"faultcode") => field = Some(FaultField::Code),
                    (FaultScan::Fault, b"faultstring") => field = Some(FaultField::Message),
                    (FaultScan::Fault, b"Error") => {
                        description = description.or_else(|| attribute(&e, b"Description"));
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => match (state, e.local_name().as_ref()) {
                (FaultScan::Envelope | FaultScan::FirstChild, _) => return None,
                (FaultScan::Fault, b"Error") => {
                    description = description.or_else(|| attribute(&e, b"Description"));
                }
                _ => {}
            },
            Ok(Event::Text(t)) => {
                if let Some(f) = field {
                    let text = t
                        .unescape()
                        .map(|s| s.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&t).into_owned());
                    match f {
                        FaultField::Code => code = Some(text),
                        FaultField::Message => message = Some(text),
                    }
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"Fault" if state == FaultScan::Fault => break,
                b"faultcode" | b"faultstring" => field = None,
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            Ok(_) => {}
        }
        buf.clear();
    }

    (state == FaultScan::Fault).then(|| SoapFault {
        code: code.unwrap_or_default(),
        message: message.or(description).unwrap_or_default(),
    })
}

/// Check that a response body is one complete XML document whose element
/// is a SOAP `Envelope` or a bare XMLA `root`.
///
/// Returns a short description of the first problem found: a foreign
/// document element, a syntax error, truncation or trailing content.
pub fn check_well_formed(body: &[u8]) -> std::result::Result<(), String> {
    let mut reader = Reader::from_reader(body);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut closed = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if closed {
                    return Err("content after the document element".to_string());
                }
                if depth == 0 && !matches!(e.local_name().as_ref(), b"Envelope" | b"root") {
                    return Err(format!(
                        "unexpected document element <{}>",
                        String::from_utf8_lossy(e.name().as_ref())
                    ));
                }
                depth += 1;
            }
            Ok(Event::Empty(e)) => {
                if closed || depth == 0 {
                    return Err(format!(
                        "unexpected empty element <{}>",
                        String::from_utf8_lossy(e.name().as_ref())
                    ));
                }
            }
            Ok(Event::End(_)) => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    closed = true;
                }
            }
            Ok(Event::Text(_) | Event::CData(_)) if depth == 0 => {
                return Err("text outside the document element".to_string());
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            Ok(_) => {}
        }
        buf.clear();
    }

    match (closed, depth) {
        (true, _) => Ok(()),
        (false, 0) => Err("no document element".to_string()),
        (false, _) => Err("document is truncated".to_string()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FaultScan {
    Envelope,
    Body,
    FirstChild,
    Fault,
}

#[derive(Debug, Clone, Copy)]
enum FaultField {
    Code,
    Message,
}

fn attribute(element: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(bytes: &Bytes) -> &str {
        std::str::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_execute_envelope_layout() {
        let envelope = execute_envelope(
            "SELECT FROM [Sales]",
            &[("Catalog", "FoodMart"), ("Format", "Tabular")],
        )
        .unwrap();
        let s = text(&envelope);

        assert!(s.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(s.contains("<Execute xmlns=\"urn:schemas-microsoft-com:xml-analysis\">"));
        assert!(s.contains("<Statement>SELECT FROM [Sales]</Statement>"));
        assert!(s.contains(
            "<PropertyList><Catalog>FoodMart</Catalog><Format>Tabular</Format></PropertyList>"
        ));
    }

    #[test]
    fn test_envelopes_are_deterministic() {
        let props = [("Catalog", "FoodMart"), ("Format", "Tabular")];
        assert_eq!(
            execute_envelope("SELECT 1", &props).unwrap(),
            execute_envelope("SELECT 1", &props).unwrap()
        );

        let reordered = [("Format", "Tabular"), ("Catalog", "FoodMart")];
        assert_ne!(
            execute_envelope("SELECT 1", &props).unwrap(),
            execute_envelope("SELECT 1", &reordered).unwrap()
        );
    }

    #[test]
    fn test_values_are_escaped() {
        let envelope = execute_envelope("a < b && c > \"d\"", &[("Catalog", "R&D")]).unwrap();
        let s = text(&envelope);
        assert!(s.contains("<Statement>a &lt; b &amp;&amp; c &gt; &quot;d&quot;</Statement>"));
        assert!(s.contains("<Catalog>R&amp;D</Catalog>"));
    }

    #[test]
    fn test_invalid_property_name() {
        let err = execute_envelope("SELECT 1", &[("Bad Name", "x")]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(discover_envelope("DISCOVER_DATASOURCES", &[("1x", "y")], &[]).is_err());
    }

    #[test]
    fn test_discover_envelope() {
        let envelope = discover_envelope(
            "MDSCHEMA_CUBES",
            &[("CATALOG_NAME", "FoodMart")],
            &[("Format", "Tabular")],
        )
        .unwrap();
        let s = text(&envelope);

        assert!(s.contains("<Discover xmlns=\"urn:schemas-microsoft-com:xml-analysis\">"));
        assert!(s.contains("<RequestType>MDSCHEMA_CUBES</RequestType>"));
        assert!(s.contains(
            "<Restrictions><RestrictionList><CATALOG_NAME>FoodMart</CATALOG_NAME></RestrictionList></Restrictions>"
        ));
        assert!(s.contains("<PropertyList><Format>Tabular</Format></PropertyList>"));
    }

    #[test]
    fn test_check_fault() {
        let body = br#"<?xml version="1.0"?>
            <SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/">
              <SOAP-ENV:Body>
                <SOAP-ENV:Fault>
                  <faultcode>SOAP-ENV:Server.00HSBE02</faultcode>
                  <faultstring>MDX parse error &amp; more</faultstring>
                </SOAP-ENV:Fault>
              </SOAP-ENV:Body>
            </SOAP-ENV:Envelope>"#;

        let fault = check_fault(body).unwrap();
        assert_eq!(fault.code, "SOAP-ENV:Server.00HSBE02");
        assert_eq!(fault.message, "MDX parse error & more");
    }

    #[test]
    fn test_check_fault_falls_back_to_error_description() {
        let body = br#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
              <soap:Body><soap:Fault>
                <faultcode>XMLAnalysisError.0xc10a0000</faultcode>
                <detail><Error ErrorCode="3238658052" Description="Cube not found"/></detail>
              </soap:Fault></soap:Body></soap:Envelope>"#;

        let fault = check_fault(body).unwrap();
        assert_eq!(fault.message, "Cube not found");
    }

    #[test]
    fn test_fault_with_bad_entity_keeps_raw_text() {
        let body = br#"<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/">
              <SOAP-ENV:Body><SOAP-ENV:Fault>
                <faultcode>SOAP-ENV:Server</faultcode>
                <faultstring>Member &bogus; not found</faultstring>
              </SOAP-ENV:Fault></SOAP-ENV:Body></SOAP-ENV:Envelope>"#;

        let fault = check_fault(body).unwrap();
        assert_eq!(fault.code, "SOAP-ENV:Server");
        assert!(fault.message.contains("&bogus;"));
    }

    #[test]
    fn test_well_formed_responses() {
        let envelope = br#"<?xml version="1.0"?>
            <SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/">
              <SOAP-ENV:Body><ExecuteResponse><return><root><row><A>1</A></row></root></return></ExecuteResponse></SOAP-ENV:Body>
            </SOAP-ENV:Envelope>"#;
        assert_eq!(check_well_formed(envelope), Ok(()));
        assert_eq!(check_well_formed(b"<root><row><A>1</A></row></root>\n"), Ok(()));
    }

    #[test]
    fn test_malformed_responses() {
        for body in [
            &b"<html><body>Gateway maintenance</body></html>"[..],
            b"Service Unavailable",
            b"",
            b"<root><row><A>1</A></row>",
            b"<root><row><A>1</A></row></root>garbage",
            b"<root/>",
            b"<root></root><root></root>",
            b"<root><row></root>",
        ] {
            assert!(
                check_well_formed(body).is_err(),
                "accepted {:?}",
                String::from_utf8_lossy(body)
            );
        }
    }

    #[test]
    fn test_results_are_not_faults() {
        let body = br#"<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/">
              <SOAP-ENV:Body><ExecuteResponse><return><root><row><A>1</A></row></root></return></ExecuteResponse></SOAP-ENV:Body>
            </SOAP-ENV:Envelope>"#;
        assert_eq!(check_fault(body), None);
        assert_eq!(check_fault(b"not xml at all"), None);
        assert_eq!(check_fault(b"<html><body>Fault</body></html>"), None);
    }
}
