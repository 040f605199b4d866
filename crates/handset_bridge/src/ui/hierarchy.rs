//! Parsing and querying `uiautomator dump` output

use lazy_static::lazy_static;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use tracing::debug;

use super::node::{Bounds, UiNode, UiSelector};

lazy_static! {
    static ref ATTR_RE: Regex =
        Regex::new(r#"([A-Za-z_:-]+)="([^"]*)""#).expect("valid attribute regex");
}

/// Minimum length (in characters) for a node's text to count as a response body.
const MIN_RESPONSE_TEXT_CHARS: usize = 4;

fn apply_attr(node: &mut UiNode, key: &str, value: String) {
    match key {
        "class" => node.class_name = Some(value),
        "text" => node.text = Some(value),
        "resource-id" => node.resource_id = Some(value),
        "content-desc" => node.content_desc = Some(value),
        "package" => node.package = Some(value),
        "bounds" => node.bounds = Bounds::parse(&value),
        "clickable" => node.clickable = value == "true",
        _ => {}
    }
}

fn node_from_element(e: &BytesStart<'_>) -> UiNode {
    let mut node = UiNode::default();
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        if let Ok(value) = attr.unescape_value() {
            apply_attr(&mut node, &key, value.into_owned());
        }
    }
    node
}

fn parse_strict(xml: &str) -> std::result::Result<Vec<UiNode>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut nodes = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(ref e) | Event::Empty(ref e) if e.name().as_ref() == b"node" => {
                nodes.push(node_from_element(e));
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(nodes)
}

/// Attribute scan over `<node ` fragments for dumps that are not well formed
/// (truncated reads, vendor junk appended after the root).
fn parse_crude(xml: &str) -> Vec<UiNode> {
    xml.split("<node ")
        .skip(1)
        .map(|fragment| {
            let mut node = UiNode::default();
            for cap in ATTR_RE.captures_iter(fragment) {
                apply_attr(&mut node, &cap[1], unescape_entities(&cap[2]));
            }
            node
        })
        .collect()
}

fn unescape_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#10;", "\n")
        .replace("&amp;", "&")
}

/// Parse a UI hierarchy dump into a flat, document-ordered node list.
pub fn parse_hierarchy(xml: &str) -> Vec<UiNode> {
    let xml = match xml.find('<') {
        Some(start) => &xml[start..],
        None => return Vec::new(),
    };
    match parse_strict(xml) {
        Ok(nodes) => nodes,
        Err(e) => {
            debug!("UI dump is not well formed ({}), using attribute scan", e);
            parse_crude(xml)
        }
    }
}

/// First node matching `selector`.
pub fn search<'a>(nodes: &'a [UiNode], selector: &UiSelector) -> Option<&'a UiNode> {
    nodes.iter().find(|n| selector.matches(n))
}

/// Nodes that plausibly belong to a chooser dialog: buttons or text views
/// carrying a label or a tappable rectangle.
pub fn candidates(nodes: &[UiNode]) -> Vec<UiNode> {
    nodes
        .iter()
        .filter(|n| n.class_contains("Button") || n.class_contains("TextView"))
        .filter(|n| n.label().is_some() || n.bounds.map(|b| !b.is_empty()).unwrap_or(false))
        .cloned()
        .collect()
}

/// Generic button elements, in document order.
pub fn buttons(nodes: &[UiNode]) -> Vec<UiNode> {
    nodes
        .iter()
        .filter(|n| n.class_contains("Button"))
        .cloned()
        .collect()
}

fn label_score(node: &UiNode, labels: &[&str]) -> u8 {
    let label = match node.label() {
        Some(l) => l.to_lowercase(),
        None => return 0,
    };
    if labels.iter().any(|l| label == l.to_lowercase()) {
        2
    } else if labels.iter().any(|l| label.contains(&l.to_lowercase())) {
        1
    } else {
        0
    }
}

/// Best candidate whose label names one of `labels`. Exact matches beat
/// containment; ties go to the earliest node.
pub fn best_label_match(nodes: &[UiNode], labels: &[&str]) -> Option<UiNode> {
    let mut best: Option<(u8, &UiNode)> = None;
    let pool = candidates(nodes);
    for node in &pool {
        let score = label_score(node, labels);
        if score > 0 && best.map(|(s, _)| score > s).unwrap_or(true) {
            best = Some((score, node));
        }
    }
    best.map(|(_, n)| n.clone())
}

/// Longest text-bearing node, the presumed USSD response body.
pub fn longest_text(nodes: &[UiNode]) -> Option<String> {
    nodes
        .iter()
        .filter_map(|n| n.text.as_deref())
        .map(str::trim)
        .filter(|t| t.chars().count() >= MIN_RESPONSE_TEXT_CHARS)
        .fold(None, |best: Option<&str>, t| match best {
            Some(b) if b.chars().count() >= t.chars().count() => Some(b),
            _ => Some(t),
        })
        .map(str::to_string)
}
