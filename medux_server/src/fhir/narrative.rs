//! Human-readable narrative of a resource.
//!
//! The XHTML must be self-contained: no head or body, no external
//! stylesheets, no scripts, forms, frames or objects, and no event
//! attributes. Anything active would make it unsafe to render.

use std::fmt;
use std::str::FromStr;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use super::error::DatatypeError;

const FORBIDDEN_ELEMENTS: &[&str] = &[
    "html", "head", "body", "title", "meta", "base", "link", "style", "script", "noscript",
    "form", "input", "button", "select", "option", "textarea", "frame", "frameset", "iframe",
    "object", "embed", "applet", "param", "basefont", "font", "center", "dir", "isindex",
    "strike",
];

const URL_ATTRIBUTES: &[&str] = &[
    "href", "src", "cite", "longdesc", "usemap", "background", "action", "poster", "data",
];

const SCRIPT_SCHEMES: &[&str] = &["javascript:", "vbscript:"];

/// http://hl7.org/fhir/narrative-status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NarrativeStatus {
    Generated,
    Extensions,
    Additional,
    Empty,
}

impl NarrativeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generated => "generated",
            Self::Extensions => "extensions",
            Self::Additional => "additional",
            Self::Empty => "empty",
        }
    }
}

impl fmt::Display for NarrativeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NarrativeStatus {
    type Err = DatatypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generated" => Ok(Self::Generated),
            "extensions" => Ok(Self::Extensions),
            "additional" => Ok(Self::Additional),
            "empty" => Ok(Self::Empty),
            other => Err(DatatypeError::UnknownNarrativeStatus(other.to_string())),
        }
    }
}

/// Narrative text: a status plus a restricted XHTML `<div>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawNarrative")]
pub struct Narrative {
    status: NarrativeStatus,
    div: String,
}

#[derive(Deserialize)]
struct RawNarrative {
    status: NarrativeStatus,
    div: String,
}

impl TryFrom<RawNarrative> for Narrative {
    type Error = DatatypeError;

    fn try_from(raw: RawNarrative) -> Result<Self, Self::Error> {
        Self::new(raw.status, raw.div)
    }
}

impl Narrative {
    pub fn new(status: NarrativeStatus, div: impl Into<String>) -> Result<Self, DatatypeError> {
        let div = div.into();
        validate_xhtml(&div)?;
        Ok(Self { status, div })
    }

    pub fn status(&self) -> NarrativeStatus {
        self.status
    }

    pub fn div(&self) -> &str {
        &self.div
    }
}

/// Check that `div` is one well-formed `<div>` element free of active content.
pub fn validate_xhtml(div: &str) -> Result<(), DatatypeError> {
    let trimmed = div.trim();
    if trimmed.is_empty() {
        return Err(DatatypeError::Empty { kind: "narrative" });
    }

    let mut reader = Reader::from_str(trimmed);
    reader.config_mut().trim_text(true);

    let mut depth = 0usize;
    let mut roots = 0usize;
    loop {
        let event = reader
            .read_event()
            .map_err(|e| DatatypeError::MalformedXhtml(e.to_string()))?;
        match event {
            Event::Start(element) => {
                check_element(&element, depth, &mut roots)?;
                depth += 1;
            }
            Event::Empty(element) => check_element(&element, depth, &mut roots)?,
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Text(_) | Event::CData(_) if depth == 0 => {
                return Err(DatatypeError::NarrativeNotDiv)
            }
            Event::Text(_) | Event::CData(_) | Event::Comment(_) => {}
            Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {
                return Err(DatatypeError::MalformedXhtml(
                    "declarations and processing instructions are not allowed".to_string(),
                ))
            }
            Event::Eof => break,
        }
    }

    if depth != 0 {
        return Err(DatatypeError::MalformedXhtml("unclosed element".to_string()));
    }
    if roots != 1 {
        return Err(DatatypeError::NarrativeNotDiv);
    }
    Ok(())
}

fn check_element(
    element: &BytesStart<'_>,
    depth: usize,
    roots: &mut usize,
) -> Result<(), DatatypeError> {
    let name = String::from_utf8_lossy(element.local_name().as_ref()).to_ascii_lowercase();
    if depth == 0 {
        *roots += 1;
        if *roots > 1 || name != "div" {
            return Err(DatatypeError::NarrativeNotDiv);
        }
    }
    if FORBIDDEN_ELEMENTS.contains(&name.as_str()) {
        return Err(DatatypeError::ForbiddenElement(name));
    }

    for attribute in element.attributes() {
        let attribute = attribute.map_err(|e| DatatypeError::MalformedXhtml(e.to_string()))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).to_ascii_lowercase();
        let local = key.rsplit(':').next().unwrap_or(&key);
        if local.starts_with("on") || key.starts_with("xlink:") || key == "xmlns:xlink" {
            return Err(DatatypeError::ForbiddenAttribute(key));
        }
        if URL_ATTRIBUTES.contains(&local) {
            let value = attribute
                .unescape_value()
                .map_err(|e| DatatypeError::MalformedXhtml(e.to_string()))?;
            // browsers drop whitespace and control characters inside the scheme
            let url: String = value
                .chars()
                .filter(|c| !c.is_whitespace() && !c.is_control())
                .collect::<String>()
                .to_ascii_lowercase();
            if let Some(scheme) = SCRIPT_SCHEMES.iter().find(|s| url.starts_with(**s)) {
                return Err(DatatypeError::ForbiddenAttribute(format!("{scheme} url")));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const XHTML_NS: &str = r#"xmlns="http://www.w3.org/1999/xhtml""#;

    fn div(body: &str) -> String {
        format!("<div {XHTML_NS}>{body}</div>")
    }

    #[test]
    fn accepts_plain_markup() {
        let text = div("<p>Patient <b>Jane</b> reports <i>no</i> allergies.</p><table><tr><td>1</td></tr></table>");
        let narrative = Narrative::new(NarrativeStatus::Generated, text.clone()).unwrap();
        assert_eq!(narrative.div(), text);
        assert_eq!(narrative.status(), NarrativeStatus::Generated);
        assert!(validate_xhtml(&div(r#"<a href="http://hl7.org/fhir">FHIR</a>"#)).is_ok());
    }

    #[test]
    fn requires_a_single_div_root() {
        assert_eq!(validate_xhtml("<p>hi</p>"), Err(DatatypeError::NarrativeNotDiv));
        assert_eq!(validate_xhtml("hello <div>x</div>"), Err(DatatypeError::NarrativeNotDiv));
        assert!(matches!(
            validate_xhtml("<div>unterminated"),
            Err(DatatypeError::MalformedXhtml(_))
        ));
        assert_eq!(
            validate_xhtml("<div>a</div><div>b</div>"),
            Err(DatatypeError::NarrativeNotDiv)
        );
        assert_eq!(validate_xhtml("<div>a</div> trailing"), Err(DatatypeError::NarrativeNotDiv));
        assert_eq!(validate_xhtml("   "), Err(DatatypeError::Empty { kind: "narrative" }));
        assert!(validate_xhtml("  <DIV>upper case</DIV>\n").is_ok());
    }

    #[test]
    fn rejects_active_content() {
        assert_eq!(
            validate_xhtml(&div("<script>alert(1)</script>")),
            Err(DatatypeError::ForbiddenElement("script".into()))
        );
        assert_eq!(
            validate_xhtml(&div(r#"<IFRAME src="http://evil"></IFRAME>"#)),
            Err(DatatypeError::ForbiddenElement("iframe".into()))
        );
        assert_eq!(
            validate_xhtml(&div(r#"<link rel="stylesheet" href="x.css"/>"#)),
            Err(DatatypeError::ForbiddenElement("link".into()))
        );
        assert_eq!(
            validate_xhtml(&div(r#"<form action="/"></form>"#)),
            Err(DatatypeError::ForbiddenElement("form".into()))
        );
    }

    #[test]
    fn rejects_event_and_xlink_attributes() {
        assert_eq!(
            validate_xhtml(&div(r#"<p onClick="steal()">x</p>"#)),
            Err(DatatypeError::ForbiddenAttribute("onclick".into()))
        );
        assert_eq!(
            validate_xhtml(&div(r##"<a xlink:href="#x">x</a>"##)),
            Err(DatatypeError::ForbiddenAttribute("xlink:href".into()))
        );
        assert_eq!(
            validate_xhtml(&div(r#"<a href="javascript:alert(1)">x</a>"#)),
            Err(DatatypeError::ForbiddenAttribute("javascript: url".into()))
        );
        // a quoted ">" does not end the tag
        assert_eq!(
            validate_xhtml(&div(r#"<a title=">" onclick="alert(1)">x</a>"#)),
            Err(DatatypeError::ForbiddenAttribute("onclick".into()))
        );
        assert_eq!(
            validate_xhtml(&div(r#"<a href="&#106;avascript:alert(1)">x</a>"#)),
            Err(DatatypeError::ForbiddenAttribute("javascript: url".into()))
        );
        assert_eq!(
            validate_xhtml(&div("<img src=\" java\tscript:x\"/>")),
            Err(DatatypeError::ForbiddenAttribute("javascript: url".into()))
        );
        // "one" is an attribute value here, not an event handler.
        assert!(validate_xhtml(&div(r#"<span class="one">x</span>"#)).is_ok());
    }

    #[test]
    fn rejects_malformed_markup() {
        for bad in [
            "<div><p>x</div>",
            "<div><b>x</i></div>",
            r#"<div class="a" class="b">x</div>"#,
            "<?xml version=\"1.0\"?><div>x</div>",
        ] {
            assert!(
                matches!(validate_xhtml(bad), Err(DatatypeError::MalformedXhtml(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn status_parsing() {
        assert_eq!("empty".parse::<NarrativeStatus>(), Ok(NarrativeStatus::Empty));
        assert!(matches!(
            "final".parse::<NarrativeStatus>(),
            Err(DatatypeError::UnknownNarrativeStatus(_))
        ));
    }

    #[test]
    fn deserialization_runs_validation() {
        let ok: Narrative =
            serde_json::from_str(r#"{"status":"additional","div":"<div>ok</div>"}"#).unwrap();
        assert_eq!(ok.status(), NarrativeStatus::Additional);

        let err = serde_json::from_str::<Narrative>(
            r#"{"status":"generated","div":"<div><script/></div>"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("forbidden element"));
    }
}
