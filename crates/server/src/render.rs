//! HTML fragments patched into the dashboard.

use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
use tacmap_protocol::{MapObjectType, StatusKind};

use crate::menu::MenuView;
use crate::placement::Placement;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerRenderer {
    pub glyph: &'static str,
    pub class: &'static str,
    pub title: &'static str,
}

const RENDERERS: &[(&str, MarkerRenderer)] = &[
    ("soldier", MarkerRenderer { glyph: "S", class: "mk-soldier", title: "Soldier" }),
    ("unit", MarkerRenderer { glyph: "U", class: "mk-unit", title: "Unit" }),
    ("vehicle", MarkerRenderer { glyph: "V", class: "mk-vehicle", title: "Vehicle" }),
    ("location", MarkerRenderer { glyph: "L", class: "mk-location", title: "Location" }),
    ("base", MarkerRenderer { glyph: "B", class: "mk-base", title: "Base" }),
    ("mission", MarkerRenderer { glyph: "M", class: "mk-mission", title: "Mission" }),
    ("delivery", MarkerRenderer { glyph: "D", class: "mk-delivery", title: "Delivery" }),
    ("enemy", MarkerRenderer { glyph: "E", class: "mk-enemy", title: "Enemy" }),
];

pub const UNKNOWN_RENDERER: MarkerRenderer = MarkerRenderer {
    glyph: "?",
    class: "mk-unknown",
    title: "Unknown object type",
};

pub fn renderer_for(tag: &str) -> &'static MarkerRenderer {
    RENDERERS
        .iter()
        .find(|(t, _)| *t == tag)
        .map(|(_, r)| r)
        .unwrap_or(&UNKNOWN_RENDERER)
}

pub fn render_marker(tag: &str, label: &str) -> String {
    let r = renderer_for(tag);
    format!(
        "<div class=\"marker {}\" title=\"{}: {}\">{}</div>",
        r.class,
        attr(r.title),
        attr(label),
        text(r.glyph)
    )
}

pub fn render_add_control(placement: &Placement) -> String {
    let mut out = String::from("<div class=\"add\">");
    let label = if placement.selector_open() { "Close" } else { "Add" };
    out.push_str(&format!(
        "<button class=\"btn\" data-action=\"placement.toggle\">{label}</button>"
    ));
    if placement.selector_open() {
        out.push_str("<ul class=\"selector\">");
        for t in MapObjectType::ALL {
            let active = if placement.pending() == Some(t) { " active" } else { "" };
            out.push_str(&format!(
                "<li class=\"item{active}\" data-action=\"placement.select\" data-type=\"{}\">{}</li>",
                t.as_str(),
                text(t.label())
            ));
        }
        out.push_str("</ul>");
    }
    if let Some(t) = placement.pending() {
        out.push_str(&format!(
            "<div class=\"armed\"><span>Placing {}</span><button class=\"btn\" data-action=\"placement.cancel\">Cancel</button></div>",
            text(t.label())
        ));
    }
    out.push_str("</div>");
    out
}

pub fn render_hint(placement: &Placement) -> String {
    placement
        .hint()
        .map(|h| format!("<div class=\"hint\">{}</div>", text(&h)))
        .unwrap_or_default()
}

pub fn render_banner(message: Option<&str>) -> String {
    message
        .map(|m| format!("<div class=\"banner\">{}</div>", text(m)))
        .unwrap_or_default()
}

pub fn render_menu(view: &MenuView) -> String {
    let mut out = String::new();
    if let Some(status) = &view.status {
        let class = match status.kind {
            StatusKind::Success => "ok",
            StatusKind::Error => "bad",
        };
        out.push_str(&format!(
            "<div class=\"status {class}\">{}</div>",
            text(&status.message)
        ));
    }

    let Some(object_type) = view.object_type else {
        out.push_str("<div class=\"empty\">Select a type and click on the map.</div>");
        return out;
    };

    let heading = match &view.editing_id {
        Some(_) => format!("Edit {}", object_type.label()),
        None => format!("New {}", object_type.label()),
    };
    out.push_str(&format!("<h2>{}</h2>", text(&heading)));
    if let Some(label) = &view.coordinate_label {
        out.push_str(&format!("<div class=\"coord\">{}</div>", text(label)));
    }

    out.push_str("<form data-action=\"menu.submit\">");
    for f in &view.fields {
        let req = if f.required { " required" } else { "" };
        out.push_str(&format!(
            "<label>{}{}<input name=\"{}\" type=\"{}\" value=\"{}\"{req}></label>",
            text(f.label),
            if f.required { " *" } else { "" },
            f.name,
            f.input,
            attr(&f.value)
        ));
        if let Some(err) = &f.error {
            out.push_str(&format!("<div class=\"field-error\">{}</div>", text(err)));
        }
    }
    let disabled = if view.busy { " disabled" } else { "" };
    let submit = if view.editing_id.is_some() { "Update" } else { "Save" };
    out.push_str(&format!(
        "<button class=\"btn\" type=\"submit\"{disabled}>{submit}</button>\
         <button class=\"btn\" type=\"button\" data-action=\"menu.cancel\">Cancel</button></form>"
    ));

    out
}

/// Entities of the menu's type with their Edit/Delete actions.
pub fn render_entries(view: &MenuView) -> String {
    if view.object_type.is_none() {
        return String::new();
    }
    let mut out = String::new();
    if let Some(err) = &view.list_error {
        out.push_str(&format!("<div class=\"status bad\">{}</div>", text(err)));
    }
    let disabled = if view.busy { " disabled" } else { "" };
    out.push_str("<ul class=\"entries\">");
    for e in &view.entries {
        out.push_str(&format!(
            "<li><span>{}</span>\
             <button class=\"btn\" data-action=\"menu.edit\" data-id=\"{id}\"{disabled}>Edit</button>\
             <button class=\"btn\" data-action=\"menu.delete\" data-id=\"{id}\"{disabled}>Delete</button></li>",
            text(&e.summary),
            id = attr(&e.id),
        ));
    }
    out.push_str("</ul>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_type_has_its_own_renderer() {
        for t in MapObjectType::ALL {
            let r = renderer_for(t.as_str());
            assert_ne!(r, &UNKNOWN_RENDERER);
            assert_eq!(r.title, t.label());
        }
    }

    #[test]
    fn unknown_tag_gets_placeholder() {
        assert_eq!(renderer_for("tank").title, "Unknown object type");
        let html = render_marker("tank", "<b>x</b>");
        assert!(html.contains("mk-unknown"));
        assert!(!html.contains("<b>"));
    }

    #[test]
    fn add_control_lists_types_only_when_open() {
        let mut placement = Placement::default();
        assert!(!render_add_control(&placement).contains("data-type"));
        placement.toggle_selector();
        let html = render_add_control(&placement);
        for t in MapObjectType::ALL {
            assert!(html.contains(&format!("data-type=\"{}\"", t.as_str())));
        }
    }
}
