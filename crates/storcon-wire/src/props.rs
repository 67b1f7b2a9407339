//! Property sets: named collections of variables imported and exported as a
//! unit.
//!
//! On the wire a property set is a `<properties>` element wrapping zero or
//! more `<var>` elements. Import is deliberately tolerant: an entry that
//! fails to decode is dropped and logged, never propagated, so one malformed
//! property from a remote with a newer schema cannot block the rest.

use std::collections::BTreeMap;

use crate::document::Element;
use crate::variable::{parse_variable, Payload, Variable};

/// Wire tag for the container element holding a property set.
pub const PROPS_TAG: &str = "properties";

/// A set of variables keyed by name, iterated in name order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Props {
    vars: BTreeMap<String, Variable>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a variable, replacing any existing entry of the same name.
    /// Returns the replaced variable, if there was one.
    pub fn add(&mut self, var: Variable) -> Option<Variable> {
        self.vars.insert(var.name().to_string(), var)
    }

    /// The decoded payload of the named entry, or `None` if absent.
    pub fn get(&self, name: &str) -> Option<&Payload> {
        self.vars.get(name).map(Variable::payload)
    }

    /// The full variable (payload plus modifiers) of the named entry.
    pub fn var(&self, name: &str) -> Option<&Variable> {
        self.vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Variables in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.vars.values()
    }

    /// Encode as a `<properties>` element with one `<var>` child per entry.
    pub fn to_element(&self) -> Element {
        let mut props = Element::new(PROPS_TAG);
        for var in self.vars.values() {
            props.append(var.to_element());
        }
        props
    }

    /// Append the encoded property set under `parent`.
    pub fn export_into(&self, parent: &mut Element) {
        parent.append(self.to_element());
    }

    /// Import variables from the first `<properties>` child of `parent`.
    ///
    /// If `parent` has no properties container this is a no-op. Entries that
    /// fail to decode are skipped; previously imported entries are kept.
    pub fn import_from(&mut self, parent: &Element) -> &mut Self {
        let Some(props) = parent.find_child(PROPS_TAG) else {
            return self;
        };
        for node in props.children() {
            match parse_variable(node) {
                Ok(var) => {
                    self.add(var);
                }
                Err(err) => {
                    tracing::debug!("skipping property that failed to decode: {err}");
                }
            }
        }
        self
    }
}

impl FromIterator<Variable> for Props {
    fn from_iter<I: IntoIterator<Item = Variable>>(iter: I) -> Self {
        let mut props = Props::new();
        for var in iter {
            props.add(var);
        }
        props
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn add_replaces_same_name() {
        let mut props = Props::new();
        assert!(props.add(Variable::new("n", 1)).is_none());
        let replaced = props.add(Variable::new("n", 2)).unwrap();
        assert_eq!(replaced.payload().as_int(), Some(1));
        assert_eq!(props.get("n").unwrap().as_int(), Some(2));
        assert_eq!(props.len(), 1);
    }

    #[test]
    fn get_missing_is_none() {
        let props = Props::new();
        assert!(props.get("nope").is_none());
        assert!(!props.contains("nope"));
    }

    #[test]
    fn export_wraps_vars_in_properties() {
        let props: Props = [Variable::new("a", 1), Variable::new("b", "x")]
            .into_iter()
            .collect();

        let mut parent = Element::new("mapper");
        props.export_into(&mut parent);

        let container = parent.find_child(PROPS_TAG).unwrap();
        let names: Vec<&str> = container
            .child_elements()
            .map(|e| e.attr("name").unwrap())
            .collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn import_skips_malformed_entries() {
        let parent = Element::parse(
            br#"<mapper>
                  <properties>
                    <var name="good" type="int" value="7"/>
                    <var name="bad" type="int" value="not-a-number"/>
                    <var name="worse" type="no_such_type" value="x"/>
                  </properties>
                </mapper>"#,
        )
        .unwrap();

        let mut props = Props::new();
        props.import_from(&parent);
        assert_eq!(props.len(), 1);
        assert_eq!(props.get("good").unwrap().as_int(), Some(7));
        assert!(props.get("bad").is_none());
    }

    #[test]
    fn import_without_container_is_noop() {
        let parent = Element::new("mapper");
        let mut props: Props = [Variable::new("kept", true)].into_iter().collect();
        props.import_from(&parent);
        assert_eq!(props.len(), 1);
        assert!(props.contains("kept"));
    }

    #[test]
    fn import_reads_first_container() {
        let parent = Element::parse(
            br#"<mapper>
                  <properties><var name="a" type="int" value="1"/></properties>
                  <properties><var name="b" type="int" value="2"/></properties>
                </mapper>"#,
        )
        .unwrap();
        let mut props = Props::new();
        props.import_from(&parent);
        assert!(props.contains("a"));
        assert!(!props.contains("b"));
    }

    #[test]
    fn export_import_round_trip() {
        let props: Props = [
            Variable::new("size", 512).with_modifier("units", "MB"),
            Variable::new("mountable", true),
            Variable::new("label", "data"),
        ]
        .into_iter()
        .collect();

        let mut parent = Element::new("content");
        props.export_into(&mut parent);

        let mut back = Props::new();
        back.import_from(&parent);
        assert_eq!(back, props);
    }
}
