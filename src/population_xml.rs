use log::warn;

use crate::population::{DEFAULT_POPULATION_TYPE, PopulationNode, Rgb};
use crate::xml_tree::XmlElement;

pub const POPULATION_XML: &str = "population";
const ID_XML: &str = "id";
const NAME_XML: &str = "name";
const COLOR_XML: &str = "color";
const TYPE_XML: &str = "type";
const SUBPOPULATIONS_XML: &str = "subpopulations";
const NULL_ATTRIBUTE_XML: &str = "null";

/// Every outermost `population` element under `root` (or `root` itself), in document order.
pub fn populations_from_xml(root: &XmlElement) -> Vec<PopulationNode> {
    let mut out = Vec::new();
    collect_outermost(root, &mut out);
    out
}

fn collect_outermost(element: &XmlElement, out: &mut Vec<PopulationNode>) {
    if element.name == POPULATION_XML {
        out.push(population_from_element(element));
        return;
    }
    for child in &element.children {
        collect_outermost(child, out);
    }
}

pub fn population_from_element(element: &XmlElement) -> PopulationNode {
    let id = element
        .child(ID_XML)
        .and_then(|e| {
            let text = e.text_content();
            match text.trim().parse::<i32>() {
                Ok(id) => Some(id),
                Err(err) => {
                    warn!("Population id `{}` is not an integer ({}), using 0", text, err);
                    None
                }
            }
        })
        .unwrap_or(0);

    let name = match nullable_text(element, NAME_XML) {
        Some(name) => name,
        None => Some(id.to_string()),
    };

    let color = element.child(COLOR_XML).and_then(|e| {
        let text = e.text_content();
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let color = Rgb::from_hex(text);
        if color.is_none() {
            warn!("Population {} has an unreadable color `{}`", id, text);
        }
        color
    });

    let population_type = nullable_text(element, TYPE_XML)
        .flatten()
        .unwrap_or_else(|| DEFAULT_POPULATION_TYPE.to_owned());

    let children = element
        .child(SUBPOPULATIONS_XML)
        .map(|subpopulations| {
            subpopulations
                .children_named(POPULATION_XML)
                .map(population_from_element)
                .collect()
        })
        .unwrap_or_default();

    PopulationNode {
        id,
        name,
        color,
        population_type,
        children,
    }
}

/// `None` when the child is missing, `Some(None)` when it is explicitly null
/// (blank text with `null="true"`), otherwise its text.
fn nullable_text(element: &XmlElement, name: &str) -> Option<Option<String>> {
    let child = element.child(name)?;
    let text = child.text_content();

    if text.trim().is_empty()
        && child
            .attribute(NULL_ATTRIBUTE_XML)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    {
        return Some(None);
    }

    Some(Some(text.into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml_tree::parse_document;
    use pretty_assertions::assert_eq;

    fn parse(xml: &str) -> Vec<PopulationNode> {
        populations_from_xml(&parse_document(xml).unwrap())
    }

    #[test]
    fn test_reads_all_fields() {
        let populations = parse(
            "<resultOptions><population>\
                <id>7</id><name>Lymphocytes</name><color>#FF0080</color><type>gate</type>\
             </population></resultOptions>",
        );

        assert_eq!(
            populations,
            vec![PopulationNode {
                id: 7,
                name: Some("Lymphocytes".to_string()),
                color: Some(Rgb::new(255, 0, 128)),
                population_type: "gate".to_string(),
                children: vec![],
            }]
        );
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let populations = parse("<population><id> 12 </id></population>");
        assert_eq!(populations.len(), 1);
        let p = &populations[0];
        assert_eq!(p.id, 12);
        assert_eq!(p.name.as_deref(), Some("12"));
        assert_eq!(p.color, None);
        assert_eq!(p.population_type, DEFAULT_POPULATION_TYPE);
    }

    #[test]
    fn test_explicit_null_name() {
        let populations =
            parse("<population><id>1</id><name null=\"true\"/><color></color></population>");
        assert_eq!(populations[0].name, None);
        assert_eq!(populations[0].color, None);
    }

    #[test]
    fn test_empty_name_without_null_marker_is_kept() {
        let populations = parse("<population><id>1</id><name></name></population>");
        assert_eq!(populations[0].name.as_deref(), Some(""));
    }

    #[test]
    fn test_nested_subpopulations_keep_order() {
        let populations = parse(
            "<r><population><id>1</id><subpopulations>\
                <population><id>2</id><subpopulations>\
                    <population><id>4</id></population>\
                </subpopulations></population>\
                <population><id>3</id></population>\
             </subpopulations></population></r>",
        );

        assert_eq!(populations.len(), 1);
        let root = &populations[0];
        let ids: Vec<i32> = root.children.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(root.children[0].children[0].id, 4);
        assert!(root.children[1].is_leaf());
    }

    #[test]
    fn test_sibling_populations_form_a_forest() {
        let populations =
            parse("<r><population><id>1</id></population><population><id>2</id></population></r>");
        let ids: Vec<i32> = populations.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_unreadable_values_fall_back_to_defaults() {
        let populations =
            parse("<population><id>abc</id><color>#GG0000</color></population>");
        assert_eq!(populations[0].id, 0);
        assert_eq!(populations[0].name.as_deref(), Some("0"));
        assert_eq!(populations[0].color, None);
    }

    #[test]
    fn test_document_without_populations() {
        assert!(parse("<resultOptions><other/></resultOptions>").is_empty());
    }
}
