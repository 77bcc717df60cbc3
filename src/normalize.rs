use serde_json::Value;

use crate::model::{Item, Loadout, Weapon};

/// Hard cap on the loadout list, applied here so no downstream consumer has
/// to re-check it.
pub const MAX_LOADOUTS: usize = 5;

/// Maps the heterogeneous backend payloads into the canonical shape. The
/// backend serves either an array of loadouts or a keyed object whose values
/// are loadouts; attachment/perk/equipment fields arrive as bare strings or
/// `{name, imageUrl}` objects. Anything missing or mistyped degrades to a
/// default instead of failing.
pub fn normalize(raw: &Value) -> Vec<Loadout> {
    let entries: Vec<&Value> = match raw {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => map.values().collect(),
        _ => Vec::new(),
    };

    entries
        .into_iter()
        .take(MAX_LOADOUTS)
        .map(normalize_loadout)
        .collect()
}

fn normalize_loadout(raw: &Value) -> Loadout {
    Loadout {
        name: raw
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_owned(),
        primary: raw.get("primary").and_then(normalize_weapon),
        secondary: raw.get("secondary").and_then(normalize_weapon),
        tactical: raw.get("tactical").and_then(normalize_item),
        lethal: raw.get("lethal").and_then(normalize_item),
        field_upgrade: raw.get("fieldUpgrade").and_then(normalize_item),
        perks: raw
            .get("perks")
            .and_then(Value::as_array)
            .map(|perks| perks.iter().filter_map(normalize_item).collect())
            .unwrap_or_default(),
    }
}

fn normalize_weapon(raw: &Value) -> Option<Weapon> {
    // A bare string weapon is just a name.
    if let Some(name) = raw.as_str() {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        return Some(Weapon {
            name: name.to_owned(),
            ..Weapon::default()
        });
    }

    let name = raw
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if name.is_empty() {
        return None;
    }

    let attachments = raw
        .get("attachmentSlots")
        .and_then(Value::as_object)
        .map(|slots| {
            slots
                .iter()
                .filter_map(|(slot, value)| {
                    normalize_item(value).map(|item| (slot.clone(), item))
                })
                .collect()
        })
        .unwrap_or_default();

    Some(Weapon {
        name: name.to_owned(),
        category: raw
            .get("category")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|category| !category.is_empty())
            .map(str::to_owned),
        image_url: absolute_image_url(raw.get("imageUrl")),
        attachments,
    })
}

/// The shared string-or-object rule: `"X"` and `{"name":"X"}` both become
/// `Item { name: "X", image_url: None }`. Unusable values are dropped; the
/// renderer supplies the "None" placeholder for absent fields.
fn normalize_item(raw: &Value) -> Option<Item> {
    match raw {
        Value::String(name) => {
            let name = name.trim();
            if name.is_empty() {
                None
            } else {
                Some(Item::named(name))
            }
        }
        Value::Object(map) => {
            let name = map
                .get("name")
                .and_then(Value::as_str)
                .map(str::trim)
                .unwrap_or_default();
            if name.is_empty() {
                return None;
            }
            Some(Item {
                name: name.to_owned(),
                image_url: absolute_image_url(map.get("imageUrl")),
            })
        }
        _ => None,
    }
}

/// Image URLs must be absolute; relative or non-http values are treated as
/// absent so surfaces never emit a broken or scheme-relative `src`.
fn absolute_image_url(raw: Option<&Value>) -> Option<String> {
    raw.and_then(Value::as_str)
        .map(str::trim)
        .filter(|url| url.starts_with("http"))
        .map(str::to_owned)
}
