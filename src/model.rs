use serde::Serialize;

/// Canonical form of the string-or-object polymorphism used by attachments,
/// equipment, and perks. Raw payloads carry either a bare name or
/// `{name, imageUrl}`; everything downstream sees only this shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    pub name: String,
    pub image_url: Option<String>,
}

impl Item {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image_url: None,
        }
    }

    pub fn is_none_placeholder(&self) -> bool {
        self.name.is_empty() || self.name == "None"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct Weapon {
    pub name: String,
    pub category: Option<String>,
    pub image_url: Option<String>,
    /// Slot name -> attachment, in document order.
    pub attachments: Vec<(String, Item)>,
}

impl Weapon {
    /// Attachments worth showing: slot filled with something other than the
    /// "None" placeholder.
    pub fn visible_attachments(&self) -> impl Iterator<Item = &(String, Item)> {
        self.attachments
            .iter()
            .filter(|(_, item)| !item.is_none_placeholder())
    }
}

/// One named weapon/equipment/perk configuration. Identity is positional
/// within the fetched list; there is no stable id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct Loadout {
    pub name: String,
    pub primary: Option<Weapon>,
    pub secondary: Option<Weapon>,
    pub tactical: Option<Item>,
    pub lethal: Option<Item>,
    pub field_upgrade: Option<Item>,
    pub perks: Vec<Item>,
}

impl Loadout {
    /// Display title, falling back to the 1-based position when unnamed.
    pub fn title(&self, number: usize) -> String {
        if self.name.is_empty() {
            format!("Loadout {number}")
        } else {
            self.name.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Item, Loadout, Weapon};

    #[test]
    fn none_placeholder_covers_empty_and_literal_none() {
        assert!(Item::named("").is_none_placeholder());
        assert!(Item::named("None").is_none_placeholder());
        assert!(!Item::named("Suppressor").is_none_placeholder());
    }

    #[test]
    fn visible_attachments_skip_none_slots() {
        let weapon = Weapon {
            name: "M4".to_owned(),
            category: None,
            image_url: None,
            attachments: vec![
                ("optic".to_owned(), Item::named("Red Dot")),
                ("barrel".to_owned(), Item::named("None")),
                ("stock".to_owned(), Item::named("Tactical Stock")),
            ],
        };
        let visible: Vec<&str> = weapon
            .visible_attachments()
            .map(|(slot, _)| slot.as_str())
            .collect();
        assert_eq!(visible, vec!["optic", "stock"]);
    }

    #[test]
    fn title_falls_back_to_position() {
        let unnamed = Loadout::default();
        assert_eq!(unnamed.title(3), "Loadout 3");
        let named = Loadout {
            name: "Rush".to_owned(),
            ..Loadout::default()
        };
        assert_eq!(named.title(3), "Rush");
    }
}
