//! Pure loadout -> HTML fragment mapping shared by the panel and overlay
//! surfaces. Every interpolated string goes through `escape_html`; backend
//! and user supplied text must never reach the page as markup.

use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::model::{Item, Loadout, Weapon};
use crate::settings::ChannelSettings;
use crate::view::ViewState;

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Wraps a fragment in a minimal document shell. Styling lives with the
/// extension assets, not here.
pub fn page(title: &str, body: &str) -> String {
    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{}</title></head><body>{body}</body></html>",
        escape_html(title)
    )
}

/// Panel surface: a grid of up to five loadout cards.
pub fn render_panel(loadouts: &[Loadout]) -> String {
    if loadouts.is_empty() {
        return render_no_loadouts();
    }
    let mut out = String::from("<div class=\"loadouts-grid\">");
    for (index, loadout) in loadouts.iter().enumerate() {
        out.push_str(&render_loadout_card(loadout, index + 1));
    }
    out.push_str("</div>");
    out
}

pub fn render_no_loadouts() -> String {
    "<div class=\"no-loadouts\"><p>No loadouts available for this streamer</p></div>".to_owned()
}

pub fn render_error(message: &str) -> String {
    format!(
        "<div class=\"error-state\"><p class=\"error-message\">{}</p>\
         <button id=\"retryBtn\" class=\"retry-btn\">Retry</button></div>",
        escape_html(message)
    )
}

pub fn render_status_line(last_updated: Option<DateTime<Utc>>) -> String {
    match last_updated {
        Some(at) => format!(
            "<div class=\"status-line\">Updated {}</div>",
            at.format("%H:%M:%S UTC")
        ),
        None => String::new(),
    }
}

pub fn render_loading() -> String {
    "<div class=\"loading-state\"><div class=\"spinner\"></div><p>Loading loadouts…</p></div>"
        .to_owned()
}

fn render_loadout_card(loadout: &Loadout, number: usize) -> String {
    let mut out = String::from("<div class=\"loadout-card\">");
    let _ = write!(
        out,
        "<div class=\"loadout-header\"><div class=\"loadout-name\">{}</div>\
         <div class=\"loadout-number\">#{number}</div></div>",
        escape_html(&loadout.title(number))
    );

    out.push_str(&render_weapon_section("Primary", loadout.primary.as_ref()));
    out.push_str(&render_weapon_section(
        "Secondary",
        loadout.secondary.as_ref(),
    ));

    out.push_str("<div class=\"equipment-section\">");
    out.push_str(&render_equipment("Tactical", loadout.tactical.as_ref()));
    out.push_str(&render_equipment("Lethal", loadout.lethal.as_ref()));
    out.push_str(&render_equipment(
        "Field Upgrade",
        loadout.field_upgrade.as_ref(),
    ));
    out.push_str("</div>");

    out.push_str(&render_perks(&loadout.perks));
    out.push_str("</div>");
    out
}

fn render_weapon_section(label: &str, weapon: Option<&Weapon>) -> String {
    let Some(weapon) = weapon else {
        return format!(
            "<div class=\"weapon-section\"><div class=\"weapon-header\">{}</div>\
             <div class=\"weapon-name\">None</div></div>",
            escape_html(label)
        );
    };

    let mut out = String::from("<div class=\"weapon-section\">");
    let _ = write!(
        out,
        "<div class=\"weapon-header\">{}</div><div class=\"weapon-info\">",
        escape_html(label)
    );
    if let Some(url) = &weapon.image_url {
        // A dead image link degrades to hidden at display time, never an error.
        let _ = write!(
            out,
            "<img src=\"{}\" alt=\"{}\" class=\"weapon-image\" onerror=\"this.style.display='none'\">",
            escape_html(url),
            escape_html(&weapon.name)
        );
    }
    let _ = write!(
        out,
        "<div class=\"weapon-details\"><div class=\"weapon-name\">{}</div>\
         <div class=\"weapon-category\">{}</div></div></div>",
        escape_html(&weapon.name),
        escape_html(weapon.category.as_deref().unwrap_or("Unknown"))
    );

    let attachments: String = weapon
        .visible_attachments()
        .map(|(_, item)| format!("<span class=\"attachment\">{}</span>", escape_html(&item.name)))
        .collect();
    if !attachments.is_empty() {
        let _ = write!(out, "<div class=\"attachments\">{attachments}</div>");
    }
    out.push_str("</div>");
    out
}

fn render_equipment(label: &str, item: Option<&Item>) -> String {
    let name = item.map(|item| item.name.as_str()).unwrap_or("None");
    format!(
        "<div class=\"equipment-item\"><div class=\"equipment-label\">{}</div>\
         <div class=\"equipment-name\">{}</div></div>",
        escape_html(label),
        escape_html(name)
    )
}

fn render_perks(perks: &[Item]) -> String {
    let mut out =
        String::from("<div class=\"perks-section\"><div class=\"perks-header\">Perks</div><div class=\"perks-list\">");
    for perk in perks {
        out.push_str("<span class=\"perk\">");
        if let Some(url) = &perk.image_url {
            let _ = write!(
                out,
                "<img src=\"{}\" alt=\"\" class=\"perk-image\" onerror=\"this.style.display='none'\">",
                escape_html(url)
            );
        }
        out.push_str(&escape_html(&perk.name));
        out.push_str("</span>");
    }
    out.push_str("</div></div>");
    out
}

/// Overlay surface: a compact widget for the active loadout only, with a
/// 1-based counter and a collapse toggle.
pub fn render_overlay(view: &ViewState, expanded: bool) -> String {
    let collapsed_class = if expanded { "" } else { " collapsed" };
    let toggle_glyph = if expanded { "▼" } else { "▲" };

    let (title, counter) = match view.active_loadout() {
        Some(loadout) => (
            loadout.title(view.active_index().unwrap_or(0) + 1),
            view.counter_label(),
        ),
        None => ("No Loadouts".to_owned(), "0/0".to_owned()),
    };

    let mut out = String::from("<div class=\"overlay-widget\">");
    let _ = write!(
        out,
        "<div class=\"overlay-header\"><span class=\"loadout-title\">{}</span>\
         <span class=\"loadout-counter\">{}</span>\
         <button id=\"prevBtn\"{}>&lt;</button><button id=\"nextBtn\"{}>&gt;</button>\
         <button id=\"toggleBtn\">{toggle_glyph}</button></div>",
        escape_html(&title),
        escape_html(&counter),
        nav_disabled(view, NavDirection::Previous),
        nav_disabled(view, NavDirection::Next),
    );

    let _ = write!(out, "<div class=\"widget-content{collapsed_class}\">");
    if expanded {
        out.push_str(&render_overlay_body(view));
    }
    out.push_str("</div></div>");
    out
}

fn render_overlay_body(view: &ViewState) -> String {
    let Some(loadout) = view.active_loadout() else {
        return "<div class=\"overlay-empty\">No loadouts available</div>".to_owned();
    };

    let mut out = String::new();
    match &loadout.primary {
        Some(primary) => {
            out.push_str("<div class=\"primary-weapon\">");
            if let Some(url) = &primary.image_url {
                let _ = write!(
                    out,
                    "<img src=\"{}\" alt=\"{}\" class=\"primary-icon\" onerror=\"this.style.display='none'\">",
                    escape_html(url),
                    escape_html(&primary.name)
                );
            }
            let _ = write!(
                out,
                "<span class=\"primary-name\">{}</span><span class=\"primary-category\">{}</span>",
                escape_html(&primary.name),
                escape_html(primary.category.as_deref().unwrap_or(""))
            );
            // The compact layout only has room for one attachment callout.
            if let Some((slot, item)) = primary.visible_attachments().next() {
                let _ = write!(
                    out,
                    "<div class=\"key-attachment\"><span class=\"slot\">{}</span>\
                     <span class=\"value\">{}</span></div>",
                    escape_html(slot),
                    escape_html(&item.name)
                );
            }
            out.push_str("</div>");
        }
        None => out.push_str("<div class=\"primary-weapon\"><span class=\"primary-name\">None</span></div>"),
    }

    let secondary = loadout
        .secondary
        .as_ref()
        .map(|weapon| weapon.name.as_str())
        .unwrap_or("None");
    let tactical = loadout
        .tactical
        .as_ref()
        .map(|item| item.name.as_str())
        .unwrap_or("None");
    let lethal = loadout
        .lethal
        .as_ref()
        .map(|item| item.name.as_str())
        .unwrap_or("None");
    let _ = write!(
        out,
        "<div class=\"overlay-row\"><span class=\"label\">Secondary</span><span>{}</span></div>\
         <div class=\"overlay-row\"><span class=\"label\">Tactical</span><span>{}</span></div>\
         <div class=\"overlay-row\"><span class=\"label\">Lethal</span><span>{}</span></div>",
        escape_html(secondary),
        escape_html(tactical),
        escape_html(lethal)
    );
    out
}

enum NavDirection {
    Previous,
    Next,
}

fn nav_disabled(view: &ViewState, direction: NavDirection) -> &'static str {
    let enabled = match (view.active_index(), direction) {
        (Some(index), NavDirection::Previous) => index > 0,
        (Some(index), NavDirection::Next) => index + 1 < view.len(),
        (None, _) => false,
    };
    if enabled {
        ""
    } else {
        " disabled"
    }
}

/// Config surface: the settings form plus channel/backend diagnostics.
pub fn render_config_form(
    channel_id: &str,
    settings: &ChannelSettings,
    backend_ok: Option<bool>,
    loadout_count: Option<usize>,
) -> String {
    let backend_label = match backend_ok {
        Some(true) => "Connected",
        Some(false) => "Connection Failed",
        None => "Testing…",
    };
    let count_label = loadout_count
        .map(|count| count.to_string())
        .unwrap_or_else(|| "–".to_owned());
    let checked = if settings.overlay_enabled {
        " checked"
    } else {
        ""
    };

    let mut out = String::from("<form id=\"configForm\" class=\"config-form\">");
    let _ = write!(
        out,
        "<div class=\"channel-info\"><span class=\"label\">Channel</span><span>{}</span></div>\
         <div class=\"backend-status\"><span class=\"label\">Backend</span><span>{backend_label}</span></div>\
         <div class=\"loadout-count\"><span class=\"label\">Loadouts</span><span>{}</span></div>",
        escape_html(channel_id),
        escape_html(&count_label)
    );
    let _ = write!(
        out,
        "<label><input type=\"checkbox\" id=\"overlayEnabled\"{checked}> Show overlay</label>\
         <select id=\"refreshInterval\">{}</select>\
         <button id=\"saveBtn\" type=\"submit\">Save Configuration</button></form>",
        refresh_interval_options(settings.refresh_interval)
    );
    out
}

fn refresh_interval_options(selected: u32) -> String {
    [15u32, 30, 60, 120]
        .iter()
        .map(|secs| {
            let marker = if *secs == selected { " selected" } else { "" };
            format!("<option value=\"{secs}\"{marker}>{secs}s</option>")
        })
        .collect()
}
