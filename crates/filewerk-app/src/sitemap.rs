// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// sitemaps.org XML for the public tool pages.

use std::collections::HashSet;

use filewerk_core::error::{FilewerkError, Result};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::catalog::{ChangeFreq, Tool, join_url};

const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// A page outside the tool registry.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub path: String,
    pub priority: f32,
    pub changefreq: ChangeFreq,
}

impl Route {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            priority: 0.5,
            changefreq: ChangeFreq::Monthly,
        }
    }

    /// The landing page.
    pub fn home() -> Self {
        Self {
            path: "/".into(),
            priority: 1.0,
            changefreq: ChangeFreq::Weekly,
        }
    }
}

impl From<&Tool> for Route {
    fn from(tool: &Tool) -> Self {
        Self {
            path: tool.path(),
            priority: tool.priority,
            changefreq: tool.changefreq,
        }
    }
}

/// Render the sitemap: `extra_routes` first, then one entry per tool.
///
/// Paths that appear twice are listed once, at their first position.
pub fn sitemap_xml(base_url: &str, tools: &[Tool], extra_routes: &[Route]) -> Result<String> {
    let base = base_url.trim();
    if !(base.starts_with("https://") || base.starts_with("http://")) {
        return Err(FilewerkError::Validation(format!(
            "site base URL must start with http:// or https://, got {base:?}"
        )));
    }

    let routes = extra_routes.iter().cloned().chain(tools.iter().map(Route::from));
    let mut seen = HashSet::new();

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut urlset = BytesStart::new("urlset");
    urlset.push_attribute(("xmlns", SITEMAP_NS));
    writer.write_event(Event::Start(urlset))?;

    for route in routes {
        let loc = join_url(base, &route.path);
        if !seen.insert(loc.clone()) {
            continue;
        }
        writer.write_event(Event::Start(BytesStart::new("url")))?;
        text_element(&mut writer, "loc", &loc)?;
        text_element(&mut writer, "changefreq", route.changefreq.as_str())?;
        text_element(
            &mut writer,
            "priority",
            &format!("{:.1}", route.priority.clamp(0.0, 1.0)),
        )?;
        writer.write_event(Event::End(BytesEnd::new("url")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("urlset")))?;

    String::from_utf8(writer.into_inner())
        .map_err(|err| FilewerkError::Io(std::io::Error::other(err.to_string())))
}

fn text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TOOLS;

    #[test]
    fn lists_home_and_every_tool() {
        let xml = sitemap_xml("https://filewerk.example/", TOOLS, &[Route::home()]).expect("sitemap");

        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains(r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">"#));
        assert_eq!(xml.matches("<url>").count(), TOOLS.len() + 1);
        assert!(xml.contains("<loc>https://filewerk.example/</loc>"));
        assert!(xml.contains("<loc>https://filewerk.example/merge-pdf</loc>"));
        assert!(xml.trim_end().ends_with("</urlset>"));
    }

    #[test]
    fn priority_and_frequency_come_from_the_registry() {
        let xml = sitemap_xml("https://filewerk.example", &TOOLS[..1], &[]).expect("sitemap");
        assert!(xml.contains("<changefreq>weekly</changefreq>"));
        assert!(xml.contains("<priority>0.9</priority>"));
    }

    #[test]
    fn text_is_escaped() {
        let xml = sitemap_xml("https://filewerk.example", &[], &[Route::new("/search?a=1&b=2")])
            .expect("sitemap");
        assert!(xml.contains("<loc>https://filewerk.example/search?a=1&amp;b=2</loc>"));
    }

    #[test]
    fn duplicate_paths_are_listed_once() {
        let xml = sitemap_xml(
            "https://filewerk.example",
            &TOOLS[..2],
            &[Route::new("/image-convert"), Route::new("/about/")],
        )
        .expect("sitemap");
        assert_eq!(xml.matches("<loc>https://filewerk.example/image-convert</loc>").count(), 1);
        assert_eq!(xml.matches("<url>").count(), 3);
    }

    #[test]
    fn base_url_must_be_http() {
        assert!(matches!(
            sitemap_xml("filewerk.example", TOOLS, &[]),
            Err(FilewerkError::Validation(_))
        ));
    }
}
