//! Structure-aware HTML pass.
//!
//! # Responsibilities
//! - Strip `oncontextmenu` handlers
//! - Ensure a viewport meta tag
//! - Inject no-cache metas, styles and (for framesets) the helper script
//! - Annotate table cells with `data-label`
//!
//! # Design Decisions
//! - Two streaming passes: a read-only scan decides where the injection goes,
//!   the second pass performs every edit
//! - Injection happens once, into the first `<head>` (or `<body>`)

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use lol_html::errors::RewritingError;
use lol_html::html_content::{ContentType, EndTag};
use lol_html::{element, text, EndTagHandler, HandlerResult, HtmlRewriter, Settings};

use super::tables::TableAnnotator;

pub const VIEWPORT_META: &str =
    r#"<meta name="viewport" content="width=device-width,initial-scale=1">"#;

pub const NO_CACHE_METAS: &str = r#"
<meta http-equiv="Cache-Control" content="no-cache, no-store, must-revalidate">
<meta http-equiv="Pragma" content="no-cache">
<meta http-equiv="Expires" content="0">
<meta name="robots" content="noindex, nofollow, noarchive, nosnippet, noimageindex">
"#;

pub const ICON_LINK: &str = "<link rel='icon' href='/assets/img/icon.png' type='image/x-icon'>";

/// Markup injected into every rewritten page.
#[derive(Debug, Clone)]
pub struct InjectionPayload {
    pub style: String,
    pub script: String,
}

impl InjectionPayload {
    pub fn new(css: &str, js: &str) -> Self {
        Self {
            style: format!("\n<style>\n{}\n</style>", css),
            script: format!("\n<script>\n{}\n</script>", js),
        }
    }

    fn block(&self, shape: &DocumentShape) -> String {
        let mut out = String::from(NO_CACHE_METAS);
        if shape.has_frameset {
            out.push_str(ICON_LINK);
        }
        out.push_str(&self.style);
        if shape.has_frameset {
            out.push_str(&self.script);
        }
        out
    }
}

/// What the scan pass found.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DocumentShape {
    pub has_head: bool,
    pub has_head_end: bool,
    pub has_body: bool,
    pub has_frameset: bool,
    pub has_viewport: bool,
}

/// Outcome of the edit pass.
#[derive(Debug)]
pub struct DocumentEdit {
    pub html: Vec<u8>,
    pub shape: DocumentShape,
    pub labelled_cells: usize,
}

fn end_handler(f: impl FnOnce(&mut EndTag<'_>) -> HandlerResult + 'static) -> EndTagHandler<'static> {
    Box::new(f)
}

pub fn scan(html: &[u8]) -> Result<DocumentShape, RewritingError> {
    let shape = Rc::new(Cell::new(DocumentShape::default()));

    let on_head = shape.clone();
    let on_body = shape.clone();
    let on_frameset = shape.clone();
    let on_meta = shape.clone();

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![
                element!("head", move |el| {
                    let mut s = on_head.get();
                    s.has_head = true;
                    on_head.set(s);
                    let on_end = on_head.clone();
                    if let Some(handlers) = el.end_tag_handlers() {
                        handlers.push(end_handler(move |_end: &mut EndTag<'_>| {
                            let mut s = on_end.get();
                            s.has_head_end = true;
                            on_end.set(s);
                            Ok(())
                        }));
                    }
                    Ok(())
                }),
                element!("body", move |_el| {
                    let mut s = on_body.get();
                    s.has_body = true;
                    on_body.set(s);
                    Ok(())
                }),
                element!("frameset", move |_el| {
                    let mut s = on_frameset.get();
                    s.has_frameset = true;
                    on_frameset.set(s);
                    Ok(())
                }),
                element!("meta[name]", move |el| {
                    if el
                        .get_attribute("name")
                        .is_some_and(|n| n.trim().eq_ignore_ascii_case("viewport"))
                    {
                        let mut s = on_meta.get();
                        s.has_viewport = true;
                        on_meta.set(s);
                    }
                    Ok(())
                }),
            ],
            ..Settings::default()
        },
        |_: &[u8]| {},
    );

    rewriter.write(html)?;
    rewriter.end()?;
    Ok(shape.get())
}

/// Run the edit pass over `html` (URL substitution already applied).
pub fn edit(html: &[u8], payload: &InjectionPayload) -> Result<DocumentEdit, RewritingError> {
    let shape = scan(html)?;
    let block = payload.block(&shape);
    let inject_in_head = shape.has_head_end;
    let inject_in_body = !inject_in_head && shape.has_body;

    let tables = Rc::new(RefCell::new(TableAnnotator::new()));
    let head_seen = Rc::new(Cell::new(false));
    let body_seen = Rc::new(Cell::new(false));

    let head_block = block.clone();
    let body_block = if shape.has_viewport || shape.has_head {
        block.clone()
    } else {
        format!("{}{}", block, VIEWPORT_META)
    };
    let (t_table, t_thead, t_tbody, t_tr, t_th, t_th_text, t_td) = (
        tables.clone(),
        tables.clone(),
        tables.clone(),
        tables.clone(),
        tables.clone(),
        tables.clone(),
        tables.clone(),
    );

    let mut output = Vec::with_capacity(html.len() + block.len() + VIEWPORT_META.len());
    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![
                element!("[oncontextmenu]", |el| {
                    el.remove_attribute("oncontextmenu");
                    Ok(())
                }),
                element!("head", move |el| {
                    if head_seen.replace(true) {
                        return Ok(());
                    }
                    if !shape.has_viewport {
                        el.prepend(VIEWPORT_META, ContentType::Html);
                    }
                    if inject_in_head {
                        let block = head_block.clone();
                        if let Some(handlers) = el.end_tag_handlers() {
                            handlers.push(end_handler(move |end: &mut EndTag<'_>| {
                                end.before(&block, ContentType::Html);
                                Ok(())
                            }));
                        }
                    }
                    Ok(())
                }),
                element!("body", move |el| {
                    if inject_in_body && !body_seen.replace(true) {
                        el.prepend(&body_block, ContentType::Html);
                    }
                    Ok(())
                }),
                element!("table", move |el| {
                    t_table.borrow_mut().open_table();
                    let on_end = t_table.clone();
                    if let Some(handlers) = el.end_tag_handlers() {
                        handlers.push(end_handler(move |_end: &mut EndTag<'_>| {
                            on_end.borrow_mut().close_table();
                            Ok(())
                        }));
                    }
                    Ok(())
                }),
                element!("thead", move |el| {
                    t_thead.borrow_mut().enter_thead();
                    let on_end = t_thead.clone();
                    if let Some(handlers) = el.end_tag_handlers() {
                        handlers.push(end_handler(move |_end: &mut EndTag<'_>| {
                            on_end.borrow_mut().leave_thead();
                            Ok(())
                        }));
                    }
                    Ok(())
                }),
                element!("tbody", move |el| {
                    t_tbody.borrow_mut().enter_tbody();
                    let on_end = t_tbody.clone();
                    if let Some(handlers) = el.end_tag_handlers() {
                        handlers.push(end_handler(move |_end: &mut EndTag<'_>| {
                            on_end.borrow_mut().leave_tbody();
                            Ok(())
                        }));
                    }
                    Ok(())
                }),
                element!("tr", move |_el| {
                    t_tr.borrow_mut().start_row();
                    Ok(())
                }),
                element!("th", move |el| {
                    t_th.borrow_mut().open_header_cell();
                    let on_end = t_th.clone();
                    if let Some(handlers) = el.end_tag_handlers() {
                        handlers.push(end_handler(move |_end: &mut EndTag<'_>| {
                            on_end.borrow_mut().close_header_cell();
                            Ok(())
                        }));
                    }
                    Ok(())
                }),
                text!("th", move |chunk| {
                    t_th_text.borrow_mut().header_text(chunk.as_str());
                    Ok(())
                }),
                element!("td", move |el| {
                    let label = t_td.borrow_mut().data_cell_label();
                    if let Some(label) = label {
                        el.set_attribute("data-label", &label)?;
                    }
                    Ok(())
                }),
            ],
            ..Settings::default()
        },
        |chunk: &[u8]| output.extend_from_slice(chunk),
    );

    rewriter.write(html)?;
    rewriter.end()?;

    if !inject_in_head && !inject_in_body {
        let mut prefixed = Vec::with_capacity(output.len() + block.len() + VIEWPORT_META.len());
        prefixed.extend_from_slice(NO_CACHE_METAS.as_bytes());
        if !shape.has_viewport && !shape.has_head {
            prefixed.extend_from_slice(VIEWPORT_META.as_bytes());
        }
        prefixed.extend_from_slice(payload.style.as_bytes());
        if shape.has_frameset {
            prefixed.extend_from_slice(payload.script.as_bytes());
        }
        prefixed.extend_from_slice(&output);
        output = prefixed;
    }

    let labelled_cells = tables.borrow().labelled();
    Ok(DocumentEdit {
        html: output,
        shape,
        labelled_cells,
    })
}
