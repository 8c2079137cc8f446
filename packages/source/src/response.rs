//! Portal response envelope parsing.
//!
//! The portal answers in XML by default:
//!
//! ```text
//! <response>
//!   <header><resultCode>000</resultCode><resultMsg>OK</resultMsg></header>
//!   <body><items><item>...</item></items><totalCount>1</totalCount></body>
//! </response>
//! ```
//!
//! The gateway in front of it reports key and quota problems in a different
//! XML envelope (`OpenAPI_ServiceResponse/cmmMsgHeader`). A JSON rendition
//! of the normal envelope is accepted too, where `item` is an array, a
//! single object when exactly one row matched, or missing / an empty string
//! when nothing matched.

use proptech_trade_models::TradeRecord;
use roxmltree::{Document, Node};
use serde_json::Value;

use crate::SourceError;
use crate::parsing::{get_text, parse_integer};
use crate::source_def::SourceDefinition;

/// Root element of gateway-level errors.
const GATEWAY_ERROR_ROOT: &str = "OpenAPI_ServiceResponse";

/// A decoded page.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPage {
    /// `resultCode` from the header.
    pub result_code: String,
    /// `resultMsg` from the header (empty if missing).
    pub result_msg: String,
    /// Declared total result count; `0` on rejection.
    pub total_count: u64,
    /// Normalized records in payload order.
    pub records: Vec<TradeRecord>,
    /// Items dropped as malformed.
    pub dropped: usize,
    /// Whether the status code is the feed's success sentinel.
    pub accepted: bool,
}

impl ParsedPage {
    /// `true` when the upstream API declared a non-success status.
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        !self.accepted
    }
}

/// Envelope fields common to both wire formats, before normalization.
#[derive(Debug, Default)]
struct Envelope {
    result_code: Option<String>,
    result_msg: Option<String>,
    total_count: Option<String>,
    items: Vec<Value>,
}

/// Decodes a raw page body for `source`.
///
/// XML is assumed when the first non-whitespace character is `<`,
/// otherwise JSON. A non-success status is a normal outcome: the page
/// comes back with `accepted = false`, no records, and `total_count = 0`.
///
/// # Errors
///
/// Returns [`SourceError`] if the payload is neither well-formed XML nor
/// JSON, or lacks a result code.
pub fn parse_response(source: &SourceDefinition, raw: &str) -> Result<ParsedPage, SourceError> {
    let envelope = if raw.trim_start().starts_with('<') {
        decode_xml(raw)?
    } else {
        decode_json(raw)?
    };

    let result_code = envelope.result_code.ok_or_else(|| SourceError::Parse {
        message: format!("{}: response has no resultCode", source.id()),
    })?;
    let result_msg = envelope.result_msg.unwrap_or_default();

    if result_code != source.endpoint.success_code {
        return Ok(ParsedPage {
            result_code,
            result_msg,
            total_count: 0,
            records: Vec::new(),
            dropped: 0,
            accepted: false,
        });
    }

    let total_count = envelope
        .total_count
        .and_then(|s| parse_integer(&s))
        .and_then(|n| u64::try_from(n).ok())
        .unwrap_or(0);

    let records = source.normalize_page(&envelope.items);
    let dropped = envelope.items.len() - records.len();

    Ok(ParsedPage {
        result_code,
        result_msg,
        total_count,
        records,
        dropped,
        accepted: true,
    })
}

// ── XML ──────────────────────────────────────────────────────────────────

fn decode_xml(raw: &str) -> Result<Envelope, SourceError> {
    let doc = Document::parse(raw.trim_start())?;
    let root = doc.root_element();

    if root.has_tag_name(GATEWAY_ERROR_ROOT) {
        let header = child(root, "cmmMsgHeader");
        return Ok(Envelope {
            result_code: header.and_then(|h| child_text(h, "returnReasonCode")),
            result_msg: header.and_then(|h| {
                child_text(h, "returnAuthMsg").or_else(|| child_text(h, "errMsg"))
            }),
            ..Envelope::default()
        });
    }

    let header = child(root, "header");
    let body = child(root, "body");

    let items = body
        .and_then(|b| child(b, "items"))
        .map(|items| {
            items
                .children()
                .filter(|n| n.has_tag_name("item"))
                .map(item_to_value)
                .collect()
        })
        .unwrap_or_default();

    Ok(Envelope {
        result_code: header.and_then(|h| child_text(h, "resultCode")),
        result_msg: header.and_then(|h| child_text(h, "resultMsg")),
        total_count: body.and_then(|b| child_text(b, "totalCount")),
        items,
    })
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name(name))
}

fn child_text(node: Node<'_, '_>, name: &str) -> Option<String> {
    let text = child(node, name)?.text()?.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Flattens `<item><aptNm>..</aptNm>..</item>` into a JSON object so both
/// wire formats share one field map.
fn item_to_value(item: Node<'_, '_>) -> Value {
    let fields = item
        .children()
        .filter(Node::is_element)
        .map(|field| {
            let text = field.text().unwrap_or_default().trim().to_string();
            (field.tag_name().name().to_string(), Value::String(text))
        })
        .collect::<serde_json::Map<_, _>>();
    Value::Object(fields)
}

// ── JSON ─────────────────────────────────────────────────────────────────

fn decode_json(raw: &str) -> Result<Envelope, SourceError> {
    let body: Value = serde_json::from_str(raw)?;
    let envelope = body.get("response").unwrap_or(&body);

    let header = envelope.get("header").unwrap_or(&Value::Null);
    let page_body = envelope.get("body").unwrap_or(&Value::Null);

    Ok(Envelope {
        result_code: get_text(header, "resultCode"),
        result_msg: get_text(header, "resultMsg"),
        total_count: get_text(page_body, "totalCount"),
        items: extract_items(page_body),
    })
}

/// Collects candidate items from `body.items`, tolerating the single-object
/// and empty renditions.
fn extract_items(page_body: &Value) -> Vec<Value> {
    let list = match page_body.get("items") {
        Some(Value::Object(obj)) => obj.get("item"),
        Some(items @ Value::Array(_)) => Some(items),
        _ => None,
    };

    match list {
        Some(Value::Array(arr)) => arr.clone(),
        Some(obj @ Value::Object(_)) => vec![obj.clone()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use proptech_trade_models::FieldValue;

    use super::*;
    use crate::registry::find_source;

    fn sale() -> SourceDefinition {
        find_source("apt_trade").unwrap()
    }

    fn envelope(code: &str, msg: &str, total: serde_json::Value, items: Value) -> String {
        serde_json::json!({
            "response": {
                "header": {"resultCode": code, "resultMsg": msg},
                "body": {
                    "items": items,
                    "numOfRows": 1000,
                    "pageNo": 1,
                    "totalCount": total
                }
            }
        })
        .to_string()
    }

    fn sale_item(apt: &str, amount: &str) -> Value {
        serde_json::json!({
            "sggCd": "50110",
            "umdNm": "연동",
            "aptNm": apt,
            "jibun": "1234",
            "dealYear": "2024",
            "dealMonth": "1",
            "dealDay": "5",
            "dealAmount": amount,
            "excluUseAr": "59.9",
            "floor": "7",
            "buildYear": "2005"
        })
    }

    #[test]
    fn parses_array_of_items() {
        let raw = envelope(
            "000",
            "OK",
            serde_json::json!(2),
            serde_json::json!({"item": [sale_item("A", "30,000"), sale_item("B", "41,500")]}),
        );
        let page = parse_response(&sale(), &raw).unwrap();
        assert!(page.accepted);
        assert_eq!(page.total_count, 2);
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.records[1].key.location.building_name, "B");
    }

    #[test]
    fn parses_single_object_item() {
        let raw = envelope(
            "000",
            "OK",
            serde_json::json!("1"),
            serde_json::json!({"item": sale_item("A", "30,000")}),
        );
        let page = parse_response(&sale(), &raw).unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.records.len(), 1);
    }

    #[test]
    fn empty_items_string_is_empty_page() {
        let raw = envelope("000", "OK", serde_json::json!(0), serde_json::json!(""));
        let page = parse_response(&sale(), &raw).unwrap();
        assert!(page.accepted);
        assert!(page.records.is_empty());
        assert_eq!(page.total_count, 0);
    }

    #[test]
    fn rejection_is_an_outcome_not_an_error() {
        let raw = envelope(
            "03",
            "no data",
            serde_json::json!(25),
            serde_json::json!({"item": [sale_item("A", "30,000")]}),
        );
        let page = parse_response(&sale(), &raw).unwrap();
        assert!(page.is_rejected());
        assert_eq!(page.result_code, "03");
        assert_eq!(page.result_msg, "no data");
        assert_eq!(page.total_count, 0);
        assert!(page.records.is_empty());
    }

    #[test]
    fn malformed_items_are_dropped() {
        let raw = envelope(
            "000",
            "OK",
            serde_json::json!(3),
            serde_json::json!({"item": [
                sale_item("A", "30,000"),
                sale_item("", "30,000"),
                sale_item("C", "")
            ]}),
        );
        let page = parse_response(&sale(), &raw).unwrap();
        assert_eq!(page.total_count, 3);
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.dropped, 2);
        for record in &page.records {
            assert!(!record.key.location.region_code.is_empty());
            assert!(!record.key.location.neighborhood.is_empty());
            assert!(!record.key.location.building_name.is_empty());
        }
    }

    #[test]
    fn unparseable_total_count_is_zero() {
        let raw = envelope(
            "000",
            "OK",
            serde_json::json!("many"),
            serde_json::json!({"item": [sale_item("A", "30,000")]}),
        );
        let page = parse_response(&sale(), &raw).unwrap();
        assert_eq!(page.total_count, 0);
        assert_eq!(page.records.len(), 1);
    }

    #[test]
    fn missing_result_code_is_an_error() {
        let raw = serde_json::json!({"response": {"header": {}}}).to_string();
        assert!(matches!(
            parse_response(&sale(), &raw),
            Err(SourceError::Parse { .. })
        ));
    }

    #[test]
    fn garbage_is_a_json_error() {
        assert!(matches!(
            parse_response(&sale(), "not a payload"),
            Err(SourceError::Json(_))
        ));
    }

    #[test]
    fn malformed_xml_is_an_error() {
        let raw = "<response><header><resultCode>000</resultCode></response>";
        assert!(matches!(
            parse_response(&sale(), raw),
            Err(SourceError::Xml(_))
        ));
    }

    const SALE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<response>
  <header>
    <resultCode>000</resultCode>
    <resultMsg>OK</resultMsg>
  </header>
  <body>
    <items>
      <item>
        <aptNm>노형아이파크</aptNm>
        <buildYear>2012</buildYear>
        <dealAmount>   54,000</dealAmount>
        <dealDay>12</dealDay>
        <dealMonth>3</dealMonth>
        <dealYear>2024</dealYear>
        <excluUseAr>84.97</excluUseAr>
        <floor>9</floor>
        <jibun>2950</jibun>
        <sggCd>50110</sggCd>
        <umdNm>노형동</umdNm>
        <slerGbn> </slerGbn>
      </item>
      <item>
        <aptNm>한라&amp;빌</aptNm>
        <dealAmount>31,000</dealAmount>
        <dealDay>3</dealDay>
        <dealMonth>3</dealMonth>
        <dealYear>2024</dealYear>
        <sggCd>50110</sggCd>
        <umdNm>연동</umdNm>
      </item>
      <item>
        <aptNm>이름만</aptNm>
        <sggCd>50110</sggCd>
      </item>
    </items>
    <numOfRows>1000</numOfRows>
    <pageNo>1</pageNo>
    <totalCount>3</totalCount>
  </body>
</response>"#;

    #[test]
    fn parses_xml_envelope() {
        let page = parse_response(&sale(), SALE_XML).unwrap();
        assert!(page.accepted);
        assert_eq!(page.result_msg, "OK");
        assert_eq!(page.total_count, 3);
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.dropped, 1);

        let first = &page.records[0];
        assert_eq!(first.key.location.region_code, "50110");
        assert_eq!(first.key.location.neighborhood, "노형동");
        assert_eq!(first.key.location.building_name, "노형아이파크");
        assert_eq!(first.key.location.lot_number.as_deref(), Some("2950"));
        assert_eq!(
            first.attribute("deal_amount_manwon"),
            Some(&FieldValue::Integer(54_000))
        );
        assert!(first.attribute("sler_gbn").is_none());

        assert_eq!(page.records[1].key.location.building_name, "한라&빌");
        assert_eq!(page.records[1].key.location.lot_number, None);
    }

    #[test]
    fn xml_rejection_is_an_outcome() {
        let raw = "<response><header><resultCode>03</resultCode>\
                   <resultMsg>NO_DATA</resultMsg></header><body><items/>\
                   <totalCount>0</totalCount></body></response>";
        let page = parse_response(&sale(), raw).unwrap();
        assert!(page.is_rejected());
        assert_eq!(page.result_code, "03");
        assert_eq!(page.result_msg, "NO_DATA");
        assert!(page.records.is_empty());
    }

    #[test]
    fn xml_empty_items_is_empty_page() {
        let raw = "\n  <response><header><resultCode>000</resultCode></header>\
                   <body><items/><totalCount>0</totalCount></body></response>";
        let page = parse_response(&sale(), raw).unwrap();
        assert!(page.accepted);
        assert!(page.records.is_empty());
        assert_eq!(page.dropped, 0);
    }

    #[test]
    fn gateway_error_is_a_rejection() {
        let raw = "<OpenAPI_ServiceResponse><cmmMsgHeader>\
                   <errMsg>SERVICE ERROR</errMsg>\
                   <returnAuthMsg>SERVICE_KEY_IS_NOT_REGISTERED_ERROR</returnAuthMsg>\
                   <returnReasonCode>30</returnReasonCode>\
                   </cmmMsgHeader></OpenAPI_ServiceResponse>";
        let page = parse_response(&sale(), raw).unwrap();
        assert!(page.is_rejected());
        assert_eq!(page.result_code, "30");
        assert_eq!(page.result_msg, "SERVICE_KEY_IS_NOT_REGISTERED_ERROR");
    }
}
