//! UI element types shared by the automation backends and the wire protocol

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

lazy_static! {
    static ref BOUNDS_RE: Regex = Regex::new(r"\[(-?\d+),(-?\d+)\]").expect("valid bounds regex");
}

/// Element rectangle in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Parse the uiautomator form `[left,top][right,bottom]`.
    pub fn parse(s: &str) -> Option<Self> {
        let mut corners = BOUNDS_RE.captures_iter(s).filter_map(|cap| {
            let x = cap.get(1)?.as_str().parse::<i32>().ok()?;
            let y = cap.get(2)?.as_str().parse::<i32>().ok()?;
            Some((x, y))
        });
        let (left, top) = corners.next()?;
        let (right, bottom) = corners.next()?;
        Some(Self::new(left, top, right, bottom))
    }

    pub fn center(&self) -> (i32, i32) {
        (midpoint(self.left, self.right), midpoint(self.top, self.bottom))
    }

    pub fn is_empty(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }
}

/// The mean of two `i32`s always fits in `i32`; only the sum needs widening.
fn midpoint(a: i32, b: i32) -> i32 {
    ((i64::from(a) + i64::from(b)) / 2) as i32
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{},{}][{},{}]",
            self.left, self.top, self.right, self.bottom
        )
    }
}

impl Serialize for Bounds {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BoundsRepr {
    Text(String),
    Rect {
        left: i32,
        top: i32,
        right: i32,
        bottom: i32,
    },
}

impl<'de> Deserialize<'de> for Bounds {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match BoundsRepr::deserialize(deserializer)? {
            BoundsRepr::Text(s) => Bounds::parse(&s)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid bounds: {}", s))),
            BoundsRepr::Rect {
                left,
                top,
                right,
                bottom,
            } => Ok(Bounds::new(left, top, right, bottom)),
        }
    }
}

/// A single on-screen element.
///
/// Field names follow the uiautomator dump attributes so a node returned by
/// `find_ui` can be sent straight back in a `click_ui` request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiNode {
    #[serde(rename = "class", default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(rename = "resource-id", default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(rename = "content-desc", default, skip_serializing_if = "Option::is_none")]
    pub content_desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
    #[serde(default)]
    pub clickable: bool,
}

impl UiNode {
    /// Visible label: text first, then content description.
    pub fn label(&self) -> Option<&str> {
        [self.text.as_deref(), self.content_desc.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
    }

    pub fn class_contains(&self, needle: &str) -> bool {
        self.class_name
            .as_deref()
            .map(|c| c.contains(needle))
            .unwrap_or(false)
    }

    pub fn center(&self) -> Option<(i32, i32)> {
        self.bounds.map(|b| b.center())
    }
}

/// How a caller asks for an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiSelector {
    Text(String),
    ResourceId(String),
}

impl UiSelector {
    /// Build from the wire `by` field. Unknown strategies yield `None`.
    pub fn from_wire(by: &str, value: &str) -> Option<Self> {
        match by {
            "text" => Some(Self::Text(value.to_string())),
            "resource-id" | "resourceId" => Some(Self::ResourceId(value.to_string())),
            _ => None,
        }
    }

    /// Exact match, or substring match as uiautomator dumps often carry
    /// decorated text.
    pub fn matches(&self, node: &UiNode) -> bool {
        let (field, wanted) = match self {
            Self::Text(v) => (node.text.as_deref(), v),
            Self::ResourceId(v) => (node.resource_id.as_deref(), v),
        };
        match field {
            Some(actual) => actual == wanted || (!wanted.is_empty() && actual.contains(wanted.as_str())),
            None => false,
        }
    }
}
