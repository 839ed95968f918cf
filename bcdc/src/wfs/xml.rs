//! Lecture des réponses XML du WFS (capabilities, hits, exceptions)

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{BcdcError, Result};

fn reader(xml: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    reader
}

fn attribute(element: &BytesStart, name: &[u8]) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| BcdcError::decode("XML attribute", e))?;
        if attr.key.local_name().as_ref() == name {
            let value = attr
                .unescape_value()
                .map_err(|e| BcdcError::decode("XML attribute", e))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Noms des couches publiées (`FeatureTypeList/FeatureType/Name`)
///
/// Le préfixe d'espace de noms (`pub:`) est retiré; la liste est triée.
pub fn parse_feature_type_names(xml: &str) -> Result<Vec<String>> {
    let mut reader = reader(xml);
    let mut names = Vec::new();
    let mut is_capabilities = false;
    let mut seen_feature_type = false;
    let mut in_feature_type = false;
    let mut in_name = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"WFS_Capabilities" => is_capabilities = true,
                b"FeatureType" => {
                    in_feature_type = true;
                    seen_feature_type = true;
                }
                b"Name" if in_feature_type => in_name = true,
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"FeatureType" => in_feature_type = false,
                b"Name" => in_name = false,
                _ => {}
            },
            Ok(Event::Text(t)) if in_name => {
                let text = t
                    .unescape()
                    .map_err(|e| BcdcError::decode("capabilities", e))?;
                let name = text.rsplit(':').next().unwrap_or(&text).trim();
                if !name.is_empty() {
                    names.push(name.to_string());
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(BcdcError::decode("capabilities", e)),
            _ => {}
        }
    }

    if !seen_feature_type {
        if let Some(message) = parse_exception_report(xml) {
            return Err(BcdcError::Service(message));
        }
        if !is_capabilities {
            return Err(BcdcError::decode("capabilities", "WFS_Capabilities element missing"));
        }
    }

    names.sort();
    names.dedup();
    Ok(names)
}

/// Valeur `numberMatched` d'une réponse `resultType=hits`
pub fn parse_number_matched(xml: &str) -> Result<u64> {
    let mut reader = reader(xml);

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"FeatureCollection" {
                    let value = attribute(&e, b"numberMatched")?
                        .ok_or_else(|| BcdcError::decode("hits", "numberMatched attribute missing"))?;
                    return value.parse::<u64>().map_err(|_| {
                        BcdcError::decode("hits", format!("numberMatched is not a count: {:?}", value))
                    });
                }
                if e.local_name().as_ref() == b"ExceptionReport" {
                    break;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(BcdcError::decode("hits", e)),
            _ => {}
        }
    }

    match parse_exception_report(xml) {
        Some(message) => Err(BcdcError::Service(message)),
        None => Err(BcdcError::decode("hits", "FeatureCollection element missing")),
    }
}

/// Texte d'un rapport d'exception OGC, si la réponse en est un
///
/// Couvre `ows:ExceptionReport` (WFS 2.0) et `ServiceExceptionReport` (WFS 1.x).
pub fn parse_exception_report(body: &str) -> Option<String> {
    let trimmed = body.trim_start();
    if !trimmed.starts_with('<') || !trimmed.contains("Exception") {
        return None;
    }

    let mut reader = reader(trimmed);
    let mut is_report = false;
    let mut in_text = false;
    let mut messages: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"ExceptionReport" | b"ServiceExceptionReport" => is_report = true,
                b"ExceptionText" | b"ServiceException" => in_text = true,
                _ => {}
            },
            Ok(Event::End(e)) => {
                if matches!(e.local_name().as_ref(), b"ExceptionText" | b"ServiceException") {
                    in_text = false;
                }
            }
            Ok(Event::Text(t)) if in_text => {
                if let Ok(text) = t.unescape() {
                    let text = text.trim();
                    if !text.is_empty() {
                        messages.push(text.to_string());
                    }
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }

    if !is_report {
        return None;
    }
    if messages.is_empty() {
        Some("unknown service exception".to_string())
    } else {
        Some(messages.join("; "))
    }
}
