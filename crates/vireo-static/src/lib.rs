//! Static renderer.
//!
//! Serializes a build pass straight to HTML with no prior-state comparison.
//! Component CSS is emitted at the end of `<head>` and component JS at the
//! end of `<body>`; documents without those elements get both appended
//! after the root.

use std::io::Write;

use vireo_core::{Attr, BuildResults, RenderError, RenderResult, Renderer, VNode, VNodeKind};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(tag))
}

fn is_raw_text(tag: &str) -> bool {
    tag.eq_ignore_ascii_case("script") || tag.eq_ignore_ascii_case("style")
}

/// Comment text that would end the comment early or not parse as one.
fn breaks_comment(text: &str) -> bool {
    text.starts_with('>')
        || text.starts_with("->")
        || text.ends_with("<!-")
        || ["<!--", "-->", "--!>"].iter().any(|s| text.contains(s))
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StaticRendererConfig {
    /// Emit `<!DOCTYPE html>` when the root element is `<html>`.
    pub doctype: bool,
    /// Put element-only children on their own indented lines.
    pub pretty: bool,
}

impl Default for StaticRendererConfig {
    fn default() -> Self {
        Self {
            doctype: true,
            pretty: false,
        }
    }
}

pub struct StaticRenderer<W: Write> {
    out: W,
    config: StaticRendererConfig,
}

impl<W: Write> StaticRenderer<W> {
    pub fn new(out: W) -> Self {
        Self::with_config(out, StaticRendererConfig::default())
    }

    pub fn with_config(out: W, config: StaticRendererConfig) -> Self {
        Self { out, config }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Renderer for StaticRenderer<W> {
    fn render(&mut self, results: &BuildResults) -> Result<(), RenderError> {
        let mut doc = Document {
            out: &mut self.out,
            results,
            config: &self.config,
            css_done: false,
            js_done: false,
        };
        doc.write_root()?;
        self.out.flush()?;
        Ok(())
    }
}

/// Renders `results` to a string with the default configuration.
pub fn render_to_string(results: &BuildResults) -> RenderResult<String> {
    render_to_string_with(results, StaticRendererConfig::default())
}

pub fn render_to_string_with(
    results: &BuildResults,
    config: StaticRendererConfig,
) -> RenderResult<String> {
    let mut r = StaticRenderer::with_config(Vec::new(), config);
    r.render(results)?;
    String::from_utf8(r.into_inner())
        .map_err(|e| RenderError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

struct Document<'a, W: Write> {
    out: &'a mut W,
    results: &'a BuildResults,
    config: &'a StaticRendererConfig,
    css_done: bool,
    js_done: bool,
}

impl<'a, W: Write> Document<'a, W> {
    fn write_root(&mut self) -> RenderResult<()> {
        let root = self.results.out()?.root()?;
        let top = self.flatten(std::slice::from_ref(root))?;
        if self.config.doctype && matches!(top.as_slice(), [n] if n.is_element("html")) {
            self.out.write_all(b"<!DOCTYPE html>")?;
            self.newline(0)?;
        }
        for n in &top {
            self.node(*n, 0, false)?;
        }

        if !self.css_done {
            let css = self.css()?;
            self.extras(&css, 0, false)?;
        }
        if !self.js_done {
            let js: Vec<&VNode> = self.results.js().collect();
            self.extras(&js, 0, false)?;
        }
        Ok(())
    }

    /// Expands fragments and component placeholders.
    fn flatten(&self, nodes: &'a [VNode]) -> RenderResult<Vec<&'a VNode>> {
        let mut out = Vec::with_capacity(nodes.len());
        let mut stack: Vec<&'a VNode> = nodes.iter().rev().collect();
        while let Some(n) = stack.pop() {
            match n.kind() {
                VNodeKind::Fragment => stack.extend(n.children().iter().rev()),
                VNodeKind::Component => {
                    let r = n
                        .component_ref()
                        .ok_or(RenderError::BadRoot(VNodeKind::Component))?;
                    stack.push(self.results.root_of(r)?);
                }
                _ => out.push(n),
            }
        }
        Ok(out)
    }

    fn css(&self) -> RenderResult<Vec<&'a VNode>> {
        let css: Vec<&'a VNode> = self.results.css().collect();
        if let Some(bad) = css
            .iter()
            .find(|c| !(c.is_element("style") || c.is_element("link")))
        {
            return Err(RenderError::BadCss(format!("{bad:?}")));
        }
        Ok(css)
    }

    fn newline(&mut self, depth: usize) -> RenderResult<()> {
        if self.config.pretty {
            writeln!(self.out)?;
            for _ in 0..depth {
                self.out.write_all(b"  ")?;
            }
        }
        Ok(())
    }

    fn extras(&mut self, nodes: &[&'a VNode], depth: usize, block: bool) -> RenderResult<()> {
        for n in nodes {
            if block {
                self.newline(depth)?;
            }
            self.node(*n, depth, false)?;
        }
        Ok(())
    }

    fn node(&mut self, n: &'a VNode, depth: usize, raw_text: bool) -> RenderResult<()> {
        match n.kind() {
            VNodeKind::Text if raw_text => self.out.write_all(n.data().as_bytes())?,
            VNodeKind::Text => self
                .out
                .write_all(html_escape::encode_text(n.data()).as_bytes())?,
            VNodeKind::Comment if breaks_comment(n.data()) => {
                return Err(RenderError::Unserializable(format!("comment {:?}", n.data())));
            }
            VNodeKind::Comment => write!(self.out, "<!--{}-->", n.data())?,
            VNodeKind::Element => self.element(n, depth)?,
            VNodeKind::Fragment | VNodeKind::Component => {
                for c in self.flatten(std::slice::from_ref(n))? {
                    self.node(c, depth, raw_text)?;
                }
            }
        }
        Ok(())
    }

    fn element(&mut self, n: &'a VNode, depth: usize) -> RenderResult<()> {
        let tag = n.tag();
        write!(self.out, "<{tag}")?;
        for a in n.attrs() {
            if !Attr::is_valid_name(&a.key) {
                return Err(RenderError::Unserializable(format!(
                    "attribute name {:?} on <{tag}>",
                    a.key
                )));
            }
            write!(
                self.out,
                " {}=\"{}\"",
                a.key,
                html_escape::encode_double_quoted_attribute(&a.value)
            )?;
        }
        self.out.write_all(b">")?;
        if is_void(tag) {
            if !n.children().is_empty() {
                log::warn!("dropping children of void element <{tag}>");
            }
            return Ok(());
        }

        if let Some(html) = n.raw_html() {
            self.out.write_all(html.as_bytes())?;
        } else {
            let kids = self.flatten(n.children())?;
            let extras: Vec<&'a VNode> = if n.is_element("head") && !self.css_done {
                self.css_done = true;
                self.css()?
            } else if n.is_element("body") && !self.js_done {
                self.js_done = true;
                self.results.js().collect()
            } else {
                Vec::new()
            };

            let block = self.config.pretty
                && !(kids.is_empty() && extras.is_empty())
                && kids
                    .iter()
                    .chain(&extras)
                    .all(|k| matches!(k.kind(), VNodeKind::Element | VNodeKind::Comment));
            let raw = is_raw_text(tag);
            for k in &kids {
                if block {
                    self.newline(depth + 1)?;
                }
                self.node(*k, depth + 1, raw)?;
            }
            self.extras(&extras, depth + 1, block)?;
            if block {
                self.newline(depth)?;
            }
        }
        write!(self.out, "</{tag}>")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests;
