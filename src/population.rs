use std::fmt;

use serde::{Serialize, Serializer};

/// Type tag given to populations which do not declare one.
pub const DEFAULT_POPULATION_TYPE: &str = "population";

/// An RGB triple. Alpha is never stored in PR files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Color of populations synthesized from the event stream.
    pub const GRAY: Rgb = Rgb {
        r: 128,
        g: 128,
        b: 128,
    };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    /// Unpacks `0xAARRGGBB`, ignoring the alpha byte.
    pub fn from_packed(value: i32) -> Self {
        let [_, r, g, b] = value.to_be_bytes();
        Rgb { r, g, b }
    }

    /// Parses `RRGGBB` or `#RRGGBB`. Characters past the sixth digit are ignored.
    pub fn from_hex(s: &str) -> Option<Self> {
        let digits = s.strip_prefix('#').unwrap_or(s).as_bytes().get(..6)?;
        if !digits.iter().all(u8::is_ascii_hexdigit) {
            return None;
        }
        let channel = |i: usize| {
            std::str::from_utf8(&digits[i..i + 2])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
        };

        Some(Rgb {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A (possibly nested) classification bucket that events are assigned to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopulationNode {
    pub id: i32,
    /// `None` only when the embedded XML explicitly marks the name as null.
    pub name: Option<String>,
    /// `None` only for XML populations which omit the color.
    pub color: Option<Rgb>,
    pub population_type: String,
    pub children: Vec<PopulationNode>,
}

impl PopulationNode {
    /// A flat population read from the binary population table.
    pub fn from_binary(id: i32, name: String, color: Rgb) -> Self {
        PopulationNode {
            id,
            name: Some(name),
            color: Some(color),
            population_type: DEFAULT_POPULATION_TYPE.to_owned(),
            children: Vec::new(),
        }
    }

    /// A placeholder population for an id that only appears in the event stream.
    pub fn synthesized(id: i32) -> Self {
        PopulationNode {
            id,
            name: Some(id.to_string()),
            color: Some(Rgb::GRAY),
            population_type: DEFAULT_POPULATION_TYPE.to_owned(),
            children: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Pre-order walk over this node and all of its descendants.
    pub fn iter(&self) -> PopulationIter<'_> {
        PopulationIter { stack: vec![self] }
    }

    /// Depth-first lookup by id, this node included.
    pub fn find(&self, id: i32) -> Option<&PopulationNode> {
        self.iter().find(|node| node.id == id)
    }
}

pub struct PopulationIter<'a> {
    stack: Vec<&'a PopulationNode>,
}

impl<'a> Iterator for PopulationIter<'a> {
    type Item = &'a PopulationNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Output of a single decode: the population of every event, and the population forest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedResult {
    /// One entry per event, in event order. Values refer to `PopulationNode::id`.
    pub event_population_ids: Vec<i32>,
    pub populations: Vec<PopulationNode>,
}

impl DecodedResult {
    pub fn event_count(&self) -> usize {
        self.event_population_ids.len()
    }

    /// Pre-order walk over every population in the forest.
    pub fn iter_populations(&self) -> impl Iterator<Item = &PopulationNode> {
        self.populations.iter().flat_map(PopulationNode::iter)
    }

    pub fn find_population(&self, id: i32) -> Option<&PopulationNode> {
        self.populations.iter().find_map(|root| root.find(id))
    }

    /// The population assigned to event `index`, if both exist.
    pub fn population_of_event(&self, index: usize) -> Option<&PopulationNode> {
        let id = *self.event_population_ids.get(index)?;
        self.find_population(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn node(id: i32, children: Vec<PopulationNode>) -> PopulationNode {
        PopulationNode {
            children,
            ..PopulationNode::synthesized(id)
        }
    }

    #[test]
    fn test_color_from_packed_ignores_alpha() {
        assert_eq!(Rgb::from_packed(0x7F_FF_80_00), Rgb::new(255, 128, 0));
        assert_eq!(Rgb::from_packed(-1), Rgb::new(255, 255, 255));
    }

    #[test]
    fn test_color_from_hex() {
        assert_eq!(Rgb::from_hex("#00ff7F"), Some(Rgb::new(0, 255, 127)));
        assert_eq!(Rgb::from_hex("102030"), Some(Rgb::new(16, 32, 48)));
        assert_eq!(Rgb::from_hex("#12"), None);
        assert_eq!(Rgb::from_hex("zzzzzz"), None);
        assert_eq!(Rgb::from_hex("+1+2+3"), None);
        assert_eq!(Rgb::from_hex("#-10000"), None);
        assert_eq!(
            Rgb::from_hex("#a0b0c0ff"),
            Some(Rgb::new(0xa0, 0xb0, 0xc0))
        );
    }

    #[test]
    fn test_color_display_and_serialize() {
        let color = Rgb::new(1, 171, 255);
        assert_eq!(color.to_string(), "#01abff");
        assert_eq!(serde_json::to_string(&color).unwrap(), "\"#01abff\"");
    }

    #[test]
    fn test_synthesized_population_defaults() {
        let p = PopulationNode::synthesized(42);
        assert_eq!(p.name.as_deref(), Some("42"));
        assert_eq!(p.color, Some(Rgb::GRAY));
        assert_eq!(p.population_type, DEFAULT_POPULATION_TYPE);
        assert!(p.is_leaf());
    }

    #[test]
    fn test_pre_order_walk_and_lookup() {
        let forest = DecodedResult {
            event_population_ids: vec![4, 1, 9],
            populations: vec![
                node(1, vec![node(2, vec![node(4, vec![])]), node(3, vec![])]),
                node(5, vec![]),
            ],
        };

        let order: Vec<i32> = forest.iter_populations().map(|p| p.id).collect();
        assert_eq!(order, vec![1, 2, 4, 3, 5]);

        assert_eq!(forest.population_of_event(0).map(|p| p.id), Some(4));
        assert_eq!(forest.population_of_event(2), None);
        assert_eq!(forest.population_of_event(3), None);
        assert_eq!(forest.event_count(), 3);
    }
}
